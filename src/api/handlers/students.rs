//! Student CRUD endpoints.
//!
//! Flow Overview:
//! 1) Reads go straight to the repository; failures become `500` with an empty list (list and
//!    search routes) or an empty body (single-record routes).
//! 2) Writes decode the body into a schema-less field bag and run it through
//!    [`validate`](crate::student::validate) before touching storage.
//! 3) Update and delete read the target first so unknown ids get `404`.
//!
//! Every write helper returns `Result<_, ServiceError>`; the handler classifies the outcome
//! once through `ServiceError::into_response`.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

use super::failure_message;
use crate::{
    storage::{DynStudentRepository, StorageError, StudentRepository},
    student::{validate, Page, PageRequest, Student, ValidationError},
};

const DEFAULT_PAGE_SIZE: u32 = 10;

/// Write payload, documentation only. Handlers read the body as a schema-less JSON object and
/// any `id` is ignored.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct StudentRequest {
    /// Trimmed, must not be empty. Non-string scalars are taken as their JSON text.
    #[schema(value_type = Object, example = "Ana")]
    pub name: Option<Value>,
    /// Trimmed, must not be empty. Non-string scalars are taken as their JSON text.
    #[schema(value_type = Object, example = "ana@example.com")]
    pub email: Option<Value>,
    /// Integer, decimal (truncated) or numeric string; must be greater than 0.
    #[schema(value_type = Object, example = 20)]
    pub age: Option<Value>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NameQuery {
    /// Case-insensitive substring of the student name.
    pub name: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdQuery {
    pub id: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Zero-indexed page number, defaults to 0.
    pub page: Option<u32>,
    /// Page size, defaults to 10.
    pub size: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    pub total: i64,
}

#[derive(Debug)]
enum ServiceError {
    BadRequest(String),
    Validation(ValidationError),
    NotFound,
    Storage(StorageError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            // the row vanished between the existence check and the write
            StorageError::NotFound(_) => Self::NotFound,
            err => Self::Storage(err),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Storage(err) => {
                error!("Failed to handle student request: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, failure_message(&err)).into_response()
            }
        }
    }
}

fn field_bag(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ServiceError> {
    payload
        .map(|Json(fields)| fields)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}

#[utoipa::path(
    get,
    path = "/api/students",
    responses(
        (status = 200, description = "All students ordered by id.", body = [Student]),
        (status = 500, description = "Storage failure, empty list.", body = [Student]),
    ),
    tag = "students"
)]
pub async fn list_students(Extension(repo): Extension<DynStudentRepository>) -> impl IntoResponse {
    match repo.find_all().await {
        Ok(students) => (StatusCode::OK, Json(students)),
        Err(err) => {
            error!("Failed to list students: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/students/{id}",
    params(("id" = i32, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student detail.", body = Student),
        (status = 404, description = "Student not found."),
        (status = 500, description = "Storage failure."),
    ),
    tag = "students"
)]
pub async fn get_student(
    Path(id): Path<i32>,
    Extension(repo): Extension<DynStudentRepository>,
) -> impl IntoResponse {
    match repo.find_by_id(id).await {
        Ok(Some(student)) => (StatusCode::OK, Json(student)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch student {id}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/students/search",
    params(NameQuery),
    responses(
        (status = 200, description = "Students whose name contains the query, ignoring case.", body = [Student]),
        (status = 500, description = "Storage failure, empty list.", body = [Student]),
    ),
    tag = "students"
)]
pub async fn search_students(
    Query(query): Query<NameQuery>,
    Extension(repo): Extension<DynStudentRepository>,
) -> impl IntoResponse {
    match repo.find_by_name_containing_ignore_case(&query.name).await {
        Ok(students) => (StatusCode::OK, Json(students)),
        Err(err) => {
            error!("Failed to search students by name: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/students/search/id",
    params(IdQuery),
    responses(
        (status = 200, description = "Zero or one student with the given id.", body = [Student]),
        (status = 500, description = "Storage failure, empty list.", body = [Student]),
    ),
    tag = "students"
)]
pub async fn search_students_by_id(
    Query(query): Query<IdQuery>,
    Extension(repo): Extension<DynStudentRepository>,
) -> impl IntoResponse {
    match repo.find_by_id(query.id).await {
        Ok(student) => (StatusCode::OK, Json(student.into_iter().collect::<Vec<_>>())),
        Err(err) => {
            error!("Failed to search students by id: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::new()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/students/page",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of students ordered by id.", body = Page<Student>),
        (status = 400, description = "Page size is zero.", body = String),
        (status = 500, description = "Storage failure."),
    ),
    tag = "students"
)]
pub async fn list_students_page(
    Query(query): Query<PageQuery>,
    Extension(repo): Extension<DynStudentRepository>,
) -> impl IntoResponse {
    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    let Some(request) = PageRequest::new(page, size) else {
        return (StatusCode::BAD_REQUEST, "Page size must be greater than 0.").into_response();
    };

    match repo.find_all_paginated(request).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => {
            error!("Failed to fetch students page: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/students/count",
    responses(
        (status = 200, description = "Total number of students.", body = CountResponse),
        (status = 500, description = "Storage failure."),
    ),
    tag = "students"
)]
pub async fn count_students(Extension(repo): Extension<DynStudentRepository>) -> impl IntoResponse {
    match repo.count().await {
        Ok(total) => (StatusCode::OK, Json(CountResponse { total })).into_response(),
        Err(err) => {
            error!("Failed to count students: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/students",
    request_body = StudentRequest,
    responses(
        (status = 201, description = "Student created with a store-assigned id.", body = Student),
        (status = 400, description = "Invalid input.", body = String),
        (status = 500, description = "Storage failure.", body = String),
    ),
    tag = "students"
)]
pub async fn create_student(
    Extension(repo): Extension<DynStudentRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    match create(repo.as_ref(), field_bag(payload)).await {
        Ok(student) => (StatusCode::CREATED, Json(student)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/students/update/{id}",
    params(("id" = i32, Path, description = "Student id")),
    request_body = StudentRequest,
    responses(
        (status = 200, description = "Student replaced with the submitted fields.", body = Student),
        (status = 400, description = "Invalid input.", body = String),
        (status = 404, description = "Student not found."),
        (status = 500, description = "Storage failure.", body = String),
    ),
    tag = "students"
)]
pub async fn update_student(
    Path(id): Path<i32>,
    Extension(repo): Extension<DynStudentRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    match update(repo.as_ref(), id, field_bag(payload)).await {
        Ok(student) => (StatusCode::OK, Json(student)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/students/delete/{id}",
    params(("id" = i32, Path, description = "Student id")),
    responses(
        (status = 200, description = "Student deleted."),
        (status = 404, description = "Student not found."),
        (status = 500, description = "Storage failure.", body = String),
    ),
    tag = "students"
)]
pub async fn delete_student(
    Path(id): Path<i32>,
    Extension(repo): Extension<DynStudentRepository>,
) -> impl IntoResponse {
    match delete(repo.as_ref(), id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn create(
    repo: &dyn StudentRepository,
    fields: Result<Value, ServiceError>,
) -> Result<Student, ServiceError> {
    let draft = validate(&fields?, None)?;
    let student = repo.save(draft).await?;
    info!("Created student {:?}", student.id);
    Ok(student)
}

async fn update(
    repo: &dyn StudentRepository,
    id: i32,
    fields: Result<Value, ServiceError>,
) -> Result<Student, ServiceError> {
    let existing = repo.find_by_id(id).await?.ok_or(ServiceError::NotFound)?;
    let replacement = validate(&fields?, existing.id)?;
    let student = repo.save(replacement).await?;
    debug!("Updated student {id}");
    Ok(student)
}

async fn delete(repo: &dyn StudentRepository, id: i32) -> Result<(), ServiceError> {
    if repo.find_by_id(id).await?.is_none() {
        return Err(ServiceError::NotFound);
    }
    repo.delete_by_id(id).await?;
    debug!("Deleted student {id}");
    Ok(())
}
