use thiserror::Error;

use crate::api_connection::ApiConnectionError;
use crate::editor::state::Rejection;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Api(#[from] ApiConnectionError),

    #[error("No weekly plan is loaded")]
    NotLoaded,

    #[error("No ingredient at day {day}, meal {meal}, ingredient {ingredient}")]
    InvalidIndex {
        day: usize,
        meal: usize,
        ingredient: usize,
    },

    #[error("Save rejected: {0}")]
    SaveRejected(Rejection),
}

pub type Result<T> = std::result::Result<T, EditorError>;
