//! API handlers and the helpers they share.

pub mod health;
pub mod root;
pub mod students;

use std::error::Error;

/// Human-readable `500` body: the error itself plus its underlying cause, when there is one.
pub(crate) fn failure_message(err: &dyn Error) -> String {
    match err.source() {
        Some(source) => format!("Error: {err} - {source}"),
        None => format!("Error: {err}"),
    }
}

#[cfg(test)]
mod tests;
