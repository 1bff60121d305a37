//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{ErrorClass, StudioError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &StudioError) -> String {
    match e.class() {
        ErrorClass::Validation => format!("error: {}", e),
        _ => format!("error ({:?}): {}", e.class(), e),
    }
}
