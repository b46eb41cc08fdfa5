#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod allocator;
mod error;
mod id;
mod ledger;
mod mutex;
mod recovery;
mod retry;
mod store;
mod time;

pub use crate::allocator::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::ledger::*;
pub use crate::recovery::*;
pub use crate::retry::*;
pub use crate::store::*;
pub use crate::time::*;
