//! In-process harness: the full router over an in-memory index with
//! deterministic embedding and completion fakes.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tower::ServiceExt;

use rfp_rag::api::API_PREFIX;
use rfp_rag::config::{AppConfig, EMBEDDING_DIMENSION};
use rfp_rag::database::MemoryVectorDB;
use rfp_rag::document::TextExtractor;
use rfp_rag::error::{Result, RfpError};
use rfp_rag::llm::{Embedder, ExtractionResult, FieldValue};
use rfp_rag::providers::{CompletionProvider, CompletionRequest};
use rfp_rag::{create_api, ApiLimits, AppState, Services};

const BOUNDARY: &str = "rfp-test-boundary";

pub struct FakeEmbedder;

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dimension = EMBEDDING_DIMENSION as usize;
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0; dimension];
                vector[0] = 1.0;
                for word in text.split_whitespace() {
                    let mut hasher = DefaultHasher::new();
                    word.to_lowercase().hash(&mut hasher);
                    vector[1 + (hasher.finish() as usize % (dimension - 1))] += 1.0;
                }
                vector
            })
            .collect())
    }
}

/// Treats uploaded bytes as UTF-8 text.
pub struct FakeExtractor;

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<String> {
        let text = String::from_utf8(bytes).map_err(|e| RfpError::ExtractionFailed(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(RfpError::ExtractionFailed(
                "No extractable text found in PDF".to_string(),
            ));
        }
        Ok(text)
    }
}

enum Reply {
    Fixed(String),
    /// Reads budget and deadline out of the retrieved passages.
    Analyst,
}

pub struct FakeCompletion {
    reply: Reply,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl FakeCompletion {
    pub fn analyst() -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Analyst,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fixed(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Reply::Fixed(reply.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }
}

fn passages(prompt: &str) -> &str {
    let start = prompt.find("Documents:\n").map(|i| i + "Documents:\n".len());
    let end = prompt.find("\nQuestion: ");
    match (start, end) {
        (Some(start), Some(end)) if start <= end => &prompt[start..end],
        _ => "",
    }
}

fn after<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let start = text.find(label)? + label.len();
    let rest = &text[start..];
    let end = rest.find(|c: char| c == '.' || c == '\n').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn analyst_reply(prompt: &str) -> String {
    let documents = passages(prompt);
    let mut result = ExtractionResult::blank();
    if let Some(budget) = after(documents, "Budget: ") {
        result.set("commercials", "budget", FieldValue::explicit(budget, 1.0));
    }
    if let Some(deadline) = after(documents, "Submission deadline: ") {
        result.set("key_dates", "submission_deadline", FieldValue::explicit(deadline, 1.0));
    }
    let json = serde_json::to_string_pretty(&result).unwrap_or_default();
    format!("```json\n{}\n```", json)
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let reply = match &self.reply {
            Reply::Fixed(text) => text.clone(),
            Reply::Analyst if request.prompt.contains("Documents:\n") => analyst_reply(&request.prompt),
            Reply::Analyst => "The budget is $500,000.".to_string(),
        };
        self.requests.lock().push(request);
        Ok(reply)
    }

    fn model(&self) -> &str {
        "fake"
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub backend: Arc<MemoryVectorDB>,
    pub completion: Arc<FakeCompletion>,
}

impl TestApp {
    pub fn new(completion: Arc<FakeCompletion>) -> Self {
        Self::with_config(AppConfig::local(), completion)
    }

    pub fn with_config(config: AppConfig, completion: Arc<FakeCompletion>) -> Self {
        let backend = Arc::new(MemoryVectorDB::new());
        let services = Services {
            backend: backend.clone(),
            embedder: Arc::new(FakeEmbedder),
            completion: completion.clone(),
            extractor: Arc::new(FakeExtractor),
        };
        let state = AppState::new(&config, services);
        let router = create_api(state.clone(), ApiLimits::default());
        Self {
            router,
            state,
            backend,
            completion,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let request = Request::get(format!("{}{}", API_PREFIX, path))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn post_json(&self, path: &str, payload: Value) -> (StatusCode, Value) {
        let request = Request::post(format!("{}{}", API_PREFIX, path))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    pub async fn upload(&self, file_name: &str, text: &str, session_id: Option<&str>) -> (StatusCode, Value) {
        let request = Request::post(format!("{}/upload_pdf", API_PREFIX))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(multipart_body(file_name, text.as_bytes(), session_id)))
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap())
    }
}

pub fn multipart_body(file_name: &str, contents: &[u8], session_id: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(id) = session_id {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{}\r\n",
                BOUNDARY, id
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
            BOUNDARY, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
