//! Test Helper Utilities
//!
//! Shared app setup, request builders and store doubles for geosect-server tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use geosect_common::{Error, NewSection, Result, Section};
use geosect_server::db::{self, SectionStore, SqliteSectionStore};
use geosect_server::services::{FileJobs, JobRegistry};
use geosect_server::{build_router, AppState};
use http_body_util::BodyExt;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "geosect-test-boundary";

/// App over an in-memory database; TempDir holds the export directory
pub async fn setup_app() -> (TempDir, AppState, Router) {
    let pool = db::init_memory_pool().await.expect("in-memory database");
    setup_app_with_store(Arc::new(SqliteSectionStore::new(pool, 1000)))
}

pub fn setup_app_with_store(store: Arc<dyn SectionStore>) -> (TempDir, AppState, Router) {
    let dir = TempDir::new().expect("temp dir");
    let jobs = FileJobs::new(store.clone(), JobRegistry::new(), dir.path().join("exports"));
    let state = AppState::new(store, jobs);
    let app = build_router(state.clone());
    (dir, state, app)
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// multipart/form-data upload with a single file part named `field`
pub fn multipart_request(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"sections.xlsx\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

/// Poll a job status endpoint until it leaves IN_PROGRESS
pub async fn wait_for_job(app: &Router, uri: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send_json(app, test_request("GET", uri)).await;
        assert_eq!(status, StatusCode::OK, "status poll failed: {}", body);
        if body["status"] != "IN_PROGRESS" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job at {} never finished", uri);
}

/// Workbook with the header row followed by `rows`
pub fn workbook(rows: &[&[&str]]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Section name").unwrap();
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string(r as u32 + 1, c as u16, *value).unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Store whose every operation fails
pub struct FailingStore;

#[async_trait]
impl SectionStore for FailingStore {
    async fn save(&self, _section: NewSection) -> Result<Section> {
        Err(Error::Internal("store offline".to_string()))
    }

    async fn save_all(&self, _sections: Vec<NewSection>) -> Result<Vec<Section>> {
        Err(Error::Internal("store offline".to_string()))
    }

    async fn find_all(&self) -> Result<Vec<Section>> {
        Err(Error::Internal("store offline".to_string()))
    }

    async fn find_by_class_code(&self, _code: &str) -> Result<Vec<Section>> {
        Err(Error::Internal("store offline".to_string()))
    }

    async fn find_by_id(&self, _id: i64) -> Result<Option<Section>> {
        Err(Error::Internal("store offline".to_string()))
    }

    async fn delete(&self, _id: i64) -> Result<bool> {
        Err(Error::Internal("store offline".to_string()))
    }
}
