//! PostgreSQL student store.
//!
//! Expects the `students` table from `sql/schema.sql`. Each operation is a single statement,
//! so an update is never observed half-applied.

use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::instrument;

use super::{StorageError, StorageResult, StudentRepository};
use crate::student::{Page, PageRequest, Student};

#[derive(Debug, Clone)]
pub struct PgStudentRepository {
    pool: PgPool,
}

impl PgStudentRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn student_from_row(row: &PgRow) -> Student {
    Student {
        id: Some(row.get("id")),
        name: row.get("name"),
        email: row.get("email"),
        age: row.get("age"),
    }
}

#[async_trait]
impl StudentRepository for PgStudentRepository {
    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn find_all(&self) -> StorageResult<Vec<Student>> {
        let query = r"
            SELECT id, name, email, age
            FROM students
            ORDER BY id
        ";
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(student_from_row).collect())
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn find_by_id(&self, id: i32) -> StorageResult<Option<Student>> {
        let query = r"
            SELECT id, name, email, age
            FROM students
            WHERE id = $1
        ";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(student_from_row))
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn find_by_name_containing_ignore_case(
        &self,
        name: &str,
    ) -> StorageResult<Vec<Student>> {
        // strpos avoids treating `%` and `_` in the needle as LIKE wildcards
        let query = r"
            SELECT id, name, email, age
            FROM students
            WHERE strpos(lower(name), lower($1)) > 0
            ORDER BY id
        ";
        let rows = sqlx::query(query)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(student_from_row).collect())
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn save(&self, student: Student) -> StorageResult<Student> {
        let Some(id) = student.id else {
            let query = r"
                INSERT INTO students (name, email, age)
                VALUES ($1, $2, $3)
                RETURNING id, name, email, age
            ";
            let row = sqlx::query(query)
                .bind(&student.name)
                .bind(&student.email)
                .bind(student.age)
                .fetch_one(&self.pool)
                .await?;
            return Ok(student_from_row(&row));
        };

        let query = r"
            UPDATE students
            SET name = $2, email = $3, age = $4
            WHERE id = $1
            RETURNING id, name, email, age
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(&student.name)
            .bind(&student.email)
            .bind(student.age)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(student_from_row)
            .ok_or(StorageError::NotFound(id))
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn delete_by_id(&self, id: i32) -> StorageResult<()> {
        sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn count(&self) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM students")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("total"))
    }

    #[instrument(skip(self), fields(db.system = "postgresql"))]
    async fn find_all_paginated(&self, request: PageRequest) -> StorageResult<Page<Student>> {
        let query = r"
            SELECT id, name, email, age
            FROM students
            ORDER BY id
            LIMIT $1 OFFSET $2
        ";
        let rows = sqlx::query(query)
            .bind(i64::from(request.size()))
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;
        let total = self.count().await?;
        Ok(Page::new(
            rows.iter().map(student_from_row).collect(),
            request,
            total,
        ))
    }
}
