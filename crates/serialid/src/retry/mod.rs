mod backoff;
mod policy;
#[cfg(feature = "async")]
mod sleep;

pub(crate) use backoff::*;
pub use policy::*;
#[cfg_attr(docsrs, doc(cfg(feature = "async")))]
#[cfg(feature = "async")]
pub use sleep::*;
