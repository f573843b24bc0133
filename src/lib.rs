//! # Students
//!
//! `students` serves create, read, update, delete and search operations over a single
//! `Student` record type.
//!
//! ## Layers
//!
//! - **`api`**: axum router, middleware and handlers. Handlers decode write bodies into a
//!   schema-less JSON field bag, validate it, and map every outcome to a status code:
//!   validation failures to `400`, unknown ids to `404`, anything else to `500`.
//! - **`student`**: the entity, paging types and the field bag validator. Pure, no I/O.
//! - **`storage`**: the `StudentRepository` trait with a PostgreSQL engine and an in-process
//!   engine used when no DSN is configured.
//! - **`cli`**: argument parsing, telemetry setup and the server action.
//!
//! ## Consistency
//!
//! Update and delete check existence with a read before writing, without a lock spanning both
//! steps. A concurrent delete landing in between makes the update answer `404`; callers that
//! need stricter guarantees must serialize writes to the same id themselves.

pub mod api;
pub mod cli;
pub mod storage;
pub mod student;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
