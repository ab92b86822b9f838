//! Data models for Gmail entities

mod label;
mod message;

pub use label::*;
pub use message::*;
