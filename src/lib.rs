pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod load;
pub mod parse;
pub mod row;
pub mod store;
pub mod tables;

pub use error::{Error, Result};
