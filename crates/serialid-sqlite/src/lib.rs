#![doc = include_str!("../README.md")]

mod backend;
mod database;
mod error;
mod ledger;
mod store;

pub use crate::backend::*;
pub use crate::database::*;
pub use crate::ledger::*;
pub use crate::store::*;
