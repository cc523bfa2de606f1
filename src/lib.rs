pub mod api_connection;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod observability;
pub mod plan;
pub mod render;

pub use editor::{PlanEditor, PlanStore, RecomputeOrdering};
pub use error::{EditorError, Result};
