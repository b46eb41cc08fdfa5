mod atomic;
mod interface;
mod lock;
mod partition;
mod partitions;
mod range;
mod status;

pub use atomic::*;
pub use interface::*;
pub use lock::*;
pub use partition::*;
pub(crate) use partitions::*;
pub use range::*;
pub use status::*;
