pub mod build_status;
pub mod cache;
pub mod db;
pub mod error;
pub mod http;
pub mod read_through;
pub mod telemetry;
