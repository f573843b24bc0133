//! In-process student store.
//!
//! Used when the server starts without a DSN and by the handler tests. Ids are assigned from a
//! monotonically increasing counter and never reused, mirroring a `SERIAL` column.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{StorageError, StorageResult, StudentRepository};
use crate::student::{Page, PageRequest, Student};

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    rows: BTreeMap<i32, Student>,
}

#[derive(Debug, Default)]
pub struct MemoryStudentRepository {
    state: RwLock<State>,
}

impl MemoryStudentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentRepository for MemoryStudentRepository {
    async fn find_all(&self) -> StorageResult<Vec<Student>> {
        let state = self.state.read().await;
        Ok(state.rows.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> StorageResult<Option<Student>> {
        let state = self.state.read().await;
        Ok(state.rows.get(&id).cloned())
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        name: &str,
    ) -> StorageResult<Vec<Student>> {
        let needle = name.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .rows
            .values()
            .filter(|student| student.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn save(&self, student: Student) -> StorageResult<Student> {
        let mut state = self.state.write().await;
        let saved = match student.id {
            Some(id) => {
                let Some(row) = state.rows.get_mut(&id) else {
                    return Err(StorageError::NotFound(id));
                };
                *row = student;
                row.clone()
            }
            None => {
                let id = state
                    .last_id
                    .checked_add(1)
                    .ok_or(StorageError::IdsExhausted)?;
                state.last_id = id;
                let saved = student.with_id(id);
                state.rows.insert(id, saved.clone());
                saved
            }
        };
        Ok(saved)
    }

    async fn delete_by_id(&self, id: i32) -> StorageResult<()> {
        self.state.write().await.rows.remove(&id);
        Ok(())
    }

    async fn count(&self) -> StorageResult<i64> {
        let state = self.state.read().await;
        Ok(i64::try_from(state.rows.len()).unwrap_or(i64::MAX))
    }

    async fn find_all_paginated(&self, request: PageRequest) -> StorageResult<Page<Student>> {
        let state = self.state.read().await;
        let skip = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let content = state
            .rows
            .values()
            .skip(skip)
            .take(request.size() as usize)
            .cloned()
            .collect();
        let total = i64::try_from(state.rows.len()).unwrap_or(i64::MAX);
        Ok(Page::new(content, request, total))
    }
}
