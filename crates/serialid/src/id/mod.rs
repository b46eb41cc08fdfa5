mod catalog;
mod codec;
mod identifier;
mod region;
#[cfg(feature = "serde")]
mod serde;

pub use catalog::*;
pub use codec::*;
pub use identifier::*;
pub use region::*;
