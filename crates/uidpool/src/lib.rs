#![doc = include_str!("../README.md")]

mod background;
mod config;
mod error;
mod lock;
mod maintainer;
mod pool;
mod sleep;
mod source;
mod store;


pub use crate::background::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::lock::*;
pub use crate::maintainer::*;
pub use crate::pool::*;
pub use crate::sleep::*;
pub use crate::source::*;
pub use crate::store::*;

/// The identifier type stored in a pool.
///
/// Identifiers travel through the store as plain integers, so this matches the
/// native integer width of Redis (`i64`).
pub type Uid = i64;
