mod config;
mod context;
mod service;
#[cfg(test)]
mod tests;

pub use config::*;
pub use context::*;
pub use service::*;
