//! Storage access for students.
//!
//! Handlers only see [`StudentRepository`]; the concrete engine is chosen at startup:
//! [`PgStudentRepository`] when a DSN is configured, [`MemoryStudentRepository`] otherwise.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::student::{Page, PageRequest, Student};

pub use self::memory::MemoryStudentRepository;
pub use self::postgres::PgStudentRepository;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A save targeted an id that no longer exists.
    #[error("student {0} not found")]
    NotFound(i32),

    #[error("student ids exhausted")]
    IdsExhausted,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle injected into the router.
pub type DynStudentRepository = Arc<dyn StudentRepository>;

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// All students ordered by id.
    async fn find_all(&self) -> StorageResult<Vec<Student>>;

    /// `Ok(None)` when no student has `id`.
    async fn find_by_id(&self, id: i32) -> StorageResult<Option<Student>>;

    /// Case-insensitive substring match on `name`. An empty needle matches everything.
    async fn find_by_name_containing_ignore_case(&self, name: &str)
        -> StorageResult<Vec<Student>>;

    /// Inserts a draft without id (the store assigns one) or fully replaces the row with the
    /// draft's id. Returns the persisted record.
    ///
    /// # Errors
    /// [`StorageError::NotFound`] if the draft carries an id that is not stored.
    async fn save(&self, student: Student) -> StorageResult<Student>;

    /// Removes the student if present; absent ids are not an error.
    async fn delete_by_id(&self, id: i32) -> StorageResult<()>;

    async fn count(&self) -> StorageResult<i64>;

    async fn find_all_paginated(&self, request: PageRequest) -> StorageResult<Page<Student>>;
}
