//! Error helpers shared by the keeperlink crates.

pub mod error;

pub use error::FromMessage;
