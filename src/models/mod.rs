//! Data models for the Aliment service.
//!
//! Field names follow the JSON documents the web and mobile clients already exchange.

mod aliment;
mod user;

pub use aliment::*;
pub use user::*;
