//! Application services layer.

pub mod error;
pub mod images;
pub mod repos;
pub mod updates;
