mod interface;
mod memory;
mod record;

pub use interface::*;
pub use memory::*;
pub use record::*;
