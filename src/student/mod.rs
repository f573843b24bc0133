//! The `Student` entity and the paging types used to read it in slices.

pub mod validation;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use self::validation::{ValidationError, validate};

/// A student record.
///
/// `id` is `None` only for drafts that were never persisted; the store assigns it on insert
/// and it never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Student {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i32>,
    pub name: String,
    pub email: String,
    pub age: i32,
}

impl Student {
    /// Returns a copy of this record carrying `id`.
    #[must_use]
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

/// Zero-indexed page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Returns `None` when `size` is zero.
    #[must_use]
    pub const fn new(page: u32, size: u32) -> Option<Self> {
        if size == 0 {
            None
        } else {
            Some(Self { page, size })
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Number of rows preceding this page.
    #[must_use]
    pub const fn offset(&self) -> i64 {
        self.page as i64 * self.size as i64
    }
}

/// One slice of a larger result set plus the totals needed to navigate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: i64) -> Self {
        let size = i64::from(request.size());
        Self {
            content,
            page: request.page(),
            size: request.size(),
            total_elements,
            total_pages: (total_elements + size - 1) / size,
        }
    }
}
