//! Handler tests for the students API.
//!
//! These tests mount the full application router over the in-memory repository (or a
//! repository that always fails) and drive it with `tower::ServiceExt::oneshot`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{
    api::app,
    storage::{MemoryStudentRepository, StorageError, StorageResult, StudentRepository},
    student::{Page, PageRequest, Student},
};

/// Repository whose every call fails like an unreachable database.
struct FailingRepository;

fn unreachable() -> StorageError {
    StorageError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl StudentRepository for FailingRepository {
    async fn find_all(&self) -> StorageResult<Vec<Student>> {
        Err(unreachable())
    }

    async fn find_by_id(&self, _id: i32) -> StorageResult<Option<Student>> {
        Err(unreachable())
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        _name: &str,
    ) -> StorageResult<Vec<Student>> {
        Err(unreachable())
    }

    async fn save(&self, _student: Student) -> StorageResult<Student> {
        Err(unreachable())
    }

    async fn delete_by_id(&self, _id: i32) -> StorageResult<()> {
        Err(unreachable())
    }

    async fn count(&self) -> StorageResult<i64> {
        Err(unreachable())
    }

    async fn find_all_paginated(&self, _request: PageRequest) -> StorageResult<Page<Student>> {
        Err(unreachable())
    }
}

/// Reads succeed on an empty store, writes panic.
struct PanickingRepository;

#[async_trait]
impl StudentRepository for PanickingRepository {
    async fn find_all(&self) -> StorageResult<Vec<Student>> {
        Ok(Vec::new())
    }

    async fn find_by_id(&self, _id: i32) -> StorageResult<Option<Student>> {
        Ok(None)
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        _name: &str,
    ) -> StorageResult<Vec<Student>> {
        Ok(Vec::new())
    }

    async fn save(&self, _student: Student) -> StorageResult<Student> {
        panic!("driver exploded")
    }

    async fn delete_by_id(&self, _id: i32) -> StorageResult<()> {
        Ok(())
    }

    async fn count(&self) -> StorageResult<i64> {
        Ok(0)
    }

    async fn find_all_paginated(&self, request: PageRequest) -> StorageResult<Page<Student>> {
        Ok(Page::new(Vec::new(), request, 0))
    }
}

/// Reports every id as present but loses each save, like a row deleted between the
/// existence check and the write.
struct VanishingRepository;

#[async_trait]
impl StudentRepository for VanishingRepository {
    async fn find_all(&self) -> StorageResult<Vec<Student>> {
        Ok(Vec::new())
    }

    async fn find_by_id(&self, id: i32) -> StorageResult<Option<Student>> {
        Ok(Some(Student {
            id: Some(id),
            name: "Ana".to_string(),
            email: "a@x.com".to_string(),
            age: 20,
        }))
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        _name: &str,
    ) -> StorageResult<Vec<Student>> {
        Ok(Vec::new())
    }

    async fn save(&self, student: Student) -> StorageResult<Student> {
        Err(StorageError::NotFound(student.id.unwrap_or_default()))
    }

    async fn delete_by_id(&self, _id: i32) -> StorageResult<()> {
        Ok(())
    }

    async fn count(&self) -> StorageResult<i64> {
        Ok(0)
    }

    async fn find_all_paginated(&self, request: PageRequest) -> StorageResult<Page<Student>> {
        Ok(Page::new(Vec::new(), request, 0))
    }
}

fn memory_app() -> Router {
    app(Arc::new(MemoryStudentRepository::new()))
}

fn failing_app() -> Router {
    app(Arc::new(FailingRepository))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Vec<u8>)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await.context("request failed")?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .context("read body")?;
    Ok((status, bytes.to_vec()))
}

fn json_body(bytes: &[u8]) -> Result<Value> {
    serde_json::from_slice(bytes).context("body is not JSON")
}

fn text_body(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

async fn create(app: &Router, body: Value) -> Result<Value> {
    let (status, bytes) = send(app, Method::POST, "/api/students", Some(body)).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", text_body(&bytes));
    json_body(&bytes)
}

#[tokio::test]
async fn crud_scenario() -> Result<()> {
    let app = memory_app();

    let created = create(&app, json!({"name": "Ana", "email": "a@x.com", "age": 20})).await?;
    assert_eq!(
        created,
        json!({"id": 1, "name": "Ana", "email": "a@x.com", "age": 20})
    );

    let (status, bytes) = send(&app, Method::GET, "/api/students/1", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)?, created);

    let (status, bytes) = send(&app, Method::GET, "/api/students/search?name=an", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)?, json!([created]));

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students/update/1",
        Some(json!({"name": "Ana B", "email": "a@x.com", "age": 21})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&bytes)?,
        json!({"id": 1, "name": "Ana B", "email": "a@x.com", "age": 21})
    );

    let (status, bytes) = send(&app, Method::POST, "/api/students/delete/1", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(bytes.is_empty());

    let (status, _) = send(&app, Method::GET, "/api/students/1", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({"name": "", "email": "x", "age": 5})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text_body(&bytes), "Name must not be empty.");

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({"name": "X", "email": "x", "age": -1})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text_body(&bytes), "Age must be greater than 0.");

    Ok(())
}

#[tokio::test]
async fn create_ignores_client_id_and_trims() -> Result<()> {
    let app = memory_app();
    create(&app, json!({"name": "First", "email": "f@x.com", "age": 19})).await?;

    let created = create(
        &app,
        json!({"id": 1, "name": "  Binh ", "email": " b@x.com ", "age": "22"}),
    )
    .await?;
    assert_eq!(
        created,
        json!({"id": 2, "name": "Binh", "email": "b@x.com", "age": 22})
    );

    let (_, bytes) = send(&app, Method::GET, "/api/students/1", None).await?;
    assert_eq!(json_body(&bytes)?["name"], "First");
    Ok(())
}

#[tokio::test]
async fn validation_failures_do_not_write() -> Result<()> {
    let app = memory_app();

    let cases = [
        (json!({"email": "a@x.com", "age": 20}), "Name must not be empty."),
        (json!({"name": "Ana", "age": 20}), "Email must not be empty."),
        (
            json!({"name": "Ana", "email": "a@x.com", "age": "abc"}),
            "Age must be a valid integer.",
        ),
        (
            json!({"name": "Ana", "email": "a@x.com"}),
            "Age must be greater than 0.",
        ),
    ];

    for (body, message) in cases {
        let (status, bytes) = send(&app, Method::POST, "/api/students", Some(body)).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text_body(&bytes), message);
    }

    let (_, bytes) = send(&app, Method::GET, "/api/students/count", None).await?;
    assert_eq!(json_body(&bytes)?, json!({"total": 0}));
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_bad_request() -> Result<()> {
    let app = memory_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/students")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;

    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn update_unknown_id_is_not_found() -> Result<()> {
    let app = memory_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/students/update/7",
        Some(json!({"name": "Ana", "email": "a@x.com", "age": 20})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // existence is checked before the body is validated
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/students/update/7",
        Some(json!({"name": ""})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn update_losing_row_to_delete_is_not_found() -> Result<()> {
    let app = app(Arc::new(VanishingRepository));
    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students/update/4",
        Some(json!({"name": "Ana", "email": "a@x.com", "age": 21})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(bytes.is_empty());
    Ok(())
}

#[tokio::test]
async fn update_replaces_every_field() -> Result<()> {
    let app = memory_app();
    create(&app, json!({"name": "Ana", "email": "a@x.com", "age": 20})).await?;

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students/update/1",
        Some(json!({"name": "Ana", "age": 30})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(text_body(&bytes), "Email must not be empty.");

    let (_, bytes) = send(&app, Method::GET, "/api/students/1", None).await?;
    assert_eq!(json_body(&bytes)?["age"], 20);

    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students/update/1",
        Some(json!({"id": 99, "name": "Chi", "email": "c@x.com", "age": 30.7})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&bytes)?,
        json!({"id": 1, "name": "Chi", "email": "c@x.com", "age": 30})
    );
    Ok(())
}

#[tokio::test]
async fn delete_unknown_or_repeated_is_not_found() -> Result<()> {
    let app = memory_app();
    let (status, _) = send(&app, Method::POST, "/api/students/delete/3", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    create(&app, json!({"name": "Ana", "email": "a@x.com", "age": 20})).await?;
    let (status, _) = send(&app, Method::POST, "/api/students/delete/1", None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::POST, "/api/students/delete/1", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn list_search_and_search_by_id() -> Result<()> {
    let app = memory_app();
    for (name, age) in [("Ana", 20), ("Hanh", 21), ("Minh", 22)] {
        create(
            &app,
            json!({"name": name, "email": format!("{name}@x.com"), "age": age}),
        )
        .await?;
    }

    let (status, bytes) = send(&app, Method::GET, "/api/students", None).await?;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<Value> = json_body(&bytes)?
        .as_array()
        .map(|students| students.iter().map(|s| s["name"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(names, vec![json!("Ana"), json!("Hanh"), json!("Minh")]);

    let (_, bytes) = send(&app, Method::GET, "/api/students/search?name=AN", None).await?;
    assert_eq!(json_body(&bytes)?.as_array().map(Vec::len), Some(2));

    let (_, bytes) = send(&app, Method::GET, "/api/students/search?name=", None).await?;
    assert_eq!(json_body(&bytes)?.as_array().map(Vec::len), Some(3));

    let (status, bytes) = send(&app, Method::GET, "/api/students/search/id?id=2", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)?[0]["name"], "Hanh");

    let (status, bytes) = send(&app, Method::GET, "/api/students/search/id?id=9", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)?, json!([]));
    Ok(())
}

#[tokio::test]
async fn page_and_count() -> Result<()> {
    let app = memory_app();
    for index in 0..5 {
        create(
            &app,
            json!({"name": format!("S{index}"), "email": "s@x.com", "age": 18 + index}),
        )
        .await?;
    }

    let (status, bytes) = send(&app, Method::GET, "/api/students/page?page=1&size=2", None).await?;
    assert_eq!(status, StatusCode::OK);
    let page = json_body(&bytes)?;
    assert_eq!(page["page"], 1);
    assert_eq!(page["size"], 2);
    assert_eq!(page["total_elements"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["content"][0]["id"], 3);

    let (_, bytes) = send(&app, Method::GET, "/api/students/page", None).await?;
    assert_eq!(json_body(&bytes)?["content"].as_array().map(Vec::len), Some(5));

    let (status, _) = send(&app, Method::GET, "/api/students/page?size=0", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, bytes) = send(&app, Method::GET, "/api/students/count", None).await?;
    assert_eq!(json_body(&bytes)?, json!({"total": 5}));
    Ok(())
}

#[tokio::test]
async fn storage_failures_on_reads() -> Result<()> {
    let app = failing_app();

    for uri in [
        "/api/students",
        "/api/students/search?name=a",
        "/api/students/search/id?id=1",
    ] {
        let (status, bytes) = send(&app, Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(json_body(&bytes)?, json!([]), "{uri}");
    }

    for uri in ["/api/students/1", "/api/students/page", "/api/students/count"] {
        let (status, bytes) = send(&app, Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert!(bytes.is_empty(), "{uri}");
    }
    Ok(())
}

#[tokio::test]
async fn storage_failures_on_writes() -> Result<()> {
    let app = failing_app();
    let body = json!({"name": "Ana", "email": "a@x.com", "age": 20});

    for uri in [
        "/api/students",
        "/api/students/update/1",
        "/api/students/delete/1",
    ] {
        let (status, bytes) = send(&app, Method::POST, uri, Some(body.clone())).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        let message = text_body(&bytes);
        assert!(message.starts_with("Error: database error - "), "{message}");
    }

    // validation still wins over storage on create
    let (status, _) = send(&app, Method::POST, "/api/students", Some(json!({}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn panics_become_internal_errors() -> Result<()> {
    let app = app(Arc::new(PanickingRepository));
    let (status, bytes) = send(
        &app,
        Method::POST,
        "/api/students",
        Some(json!({"name": "Ana", "email": "a@x.com", "age": 20})),
    )
    .await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text_body(&bytes), "Error: driver exploded");

    // the router keeps serving after a panic
    let (status, _) = send(&app, Method::GET, "/api/students", None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn health_reports_storage() -> Result<()> {
    let (status, bytes) = send(&memory_app(), Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&bytes)?["storage"], "ok");

    let (status, bytes) = send(&failing_app(), Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(&bytes)?["storage"], "error");
    Ok(())
}

#[tokio::test]
async fn responses_carry_request_id() -> Result<()> {
    let request = Request::builder()
        .uri("/api/students")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = memory_app().oneshot(request).await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("req-123")
    );

    let response = memory_app()
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}

#[tokio::test]
async fn serves_openapi_document() -> Result<()> {
    let (status, bytes) = send(&memory_app(), Method::GET, "/api-docs/openapi.json", None).await?;
    assert_eq!(status, StatusCode::OK);
    let doc = json_body(&bytes)?;
    assert!(doc["paths"]["/api/students/{id}"].is_object());

    // write fields are coerced by the handler, not typed by the schema
    let age = &doc["components"]["schemas"]["StudentRequest"]["properties"]["age"];
    assert!(age.is_object());
    assert_ne!(age["type"], json!("integer"));
    Ok(())
}
