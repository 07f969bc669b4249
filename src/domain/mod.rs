//! Domain layer types and invariants.

pub mod account;
pub mod error;
pub mod image;
pub mod name;
pub mod tags;
pub mod timing;
