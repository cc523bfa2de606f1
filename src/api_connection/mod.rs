pub mod connection;
pub mod endpoints;

pub use connection::{parse_body, ApiConnectionError, HttpBackend, PlanBackend};
