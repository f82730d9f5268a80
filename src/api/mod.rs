use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use validator::Validate;

use crate::config::{AppConfig, VectorIndexConfig, EMBEDDING_DIMENSION};
use crate::database::{
    compare_indexes, DocumentStore, DocumentWriter, IndexManager, Scope, VectorIndex,
};
use crate::document::{DocumentIngestor, TextExtractor};
use crate::error::{Result, RfpError};
use crate::llm::{Embedder, ExtractionResult, Retriever, RfpAnalyzer, RfpChatbot};
use crate::providers::CompletionProvider;
use crate::report::{matrix_workbook, report_workbook, BidMatrix, XLSX_CONTENT_TYPE};

pub const API_PREFIX: &str = "/api/v1/rfp";

/// External services the pipeline is built over.
pub struct Services {
    pub backend: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub completion: Arc<dyn CompletionProvider>,
    pub extractor: Arc<dyn TextExtractor>,
}

#[derive(Debug, Clone, Copy)]
pub struct ApiLimits {
    pub max_upload_bytes: usize,
    pub max_concurrent: usize,
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 25 * 1024 * 1024,
            max_concurrent: 64,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    index_config: Arc<VectorIndexConfig>,
    backend: Arc<dyn VectorIndex>,
    indexes: Arc<IndexManager>,
    documents: Arc<DocumentStore>,
    ingestor: Arc<DocumentIngestor>,
    analyzer: Arc<RfpAnalyzer>,
    chatbot: Arc<RfpChatbot>,
    global_uploads: bool,
}

impl AppState {
    pub fn new(config: &AppConfig, services: Services) -> Self {
        let Services {
            backend,
            embedder,
            completion,
            extractor,
        } = services;

        let indexes = Arc::new(IndexManager::new(
            backend.clone(),
            &config.index,
            config.timings.clone(),
        ));
        let documents = Arc::new(DocumentStore::default());
        let ingestor = DocumentIngestor::new(
            extractor,
            embedder.clone(),
            indexes.clone(),
            DocumentWriter::new(backend.clone(), &config.timings),
            documents.clone(),
        );
        let analyzer = RfpAnalyzer::new(
            embedder.clone(),
            Retriever::new(backend.clone()),
            completion.clone(),
        );
        let chatbot = RfpChatbot::new(embedder, Retriever::new(backend.clone()), completion);

        Self {
            index_config: Arc::new(config.index.clone()),
            backend,
            indexes,
            documents,
            ingestor: Arc::new(ingestor),
            analyzer: Arc::new(analyzer),
            chatbot: Arc::new(chatbot),
            global_uploads: config.global_uploads,
        }
    }

    pub fn indexes(&self) -> &Arc<IndexManager> {
        &self.indexes
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    doc_id: String,
    chunks: usize,
}

#[derive(Deserialize, Validate, Default)]
pub struct AnalyzeRequest {
    #[validate(length(min = 1, max = 64))]
    session_id: Option<String>,
    #[validate(length(max = 2000))]
    query: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    success: bool,
    result: ExtractionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc_id: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    question: String,
    #[validate(length(min = 1, max = 64))]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    success: bool,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    #[serde(rename = "rfpData", default)]
    rfp_data: Value,
}

#[derive(Deserialize, Validate)]
pub struct CleanupRequest {
    #[validate(length(min = 1, max = 64))]
    session_id: String,
}

#[derive(Serialize)]
struct CleanupResponse {
    success: bool,
    deleted: bool,
    message: String,
}

/// Create and configure the API router
pub fn create_api(state: AppState, limits: ApiLimits) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    let rfp = Router::new()
        .route("/upload_pdf", post(upload_pdf))
        .route("/analyze", post(analyze))
        .route("/chat", post(chat))
        .route("/matrix/:doc_id", get(matrix))
        .route("/download/:doc_id", get(download_matrix))
        .route("/download-report", post(download_report))
        .route("/compare-indexes", get(compare))
        .route("/cleanup_session", post(cleanup_session));

    Router::new()
        .nest(API_PREFIX, rfp)
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(limits.max_upload_bytes))
        .layer(ConcurrencyLimitLayer::new(limits.max_concurrent.max(1)))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| RfpError::InvalidInput(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| RfpError::InvalidInput(e.body_text()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "session_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| RfpError::InvalidInput(e.body_text()))?;
                session_id = Some(text.trim().to_string()).filter(|s| !s.is_empty());
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file
        .filter(|(name, _)| name.to_lowercase().ends_with(".pdf"))
        .ok_or_else(|| RfpError::InvalidInput("Invalid file".to_string()))?;

    let scope = match session_id {
        Some(id) => Scope::session(&id)?,
        None if state.global_uploads => {
            log::warn!("Upload of '{}' without session id goes to the global index", file_name);
            Scope::Global
        }
        None => Scope::session(&uuid::Uuid::new_v4().to_string())?,
    };

    let record = state.ingestor.ingest(&file_name, bytes, scope).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: "File uploaded and processed successfully".to_string(),
        session_id: record.session_id.clone(),
        doc_id: record.doc_id,
        chunks: record.chunk_count,
    }))
}

async fn analyze(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalyzeResponse>> {
    // Only an absent body means "global scope, default query"
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        AnalyzeRequest::default()
    } else {
        let Json(request) =
            Json::<AnalyzeRequest>::from_bytes(&body).map_err(|e| RfpError::InvalidInput(e.body_text()))?;
        request
    };
    request
        .validate()
        .map_err(|e| RfpError::InvalidInput(e.to_string()))?;

    let scope = Scope::from_optional(request.session_id.as_deref())?;
    let index = state.indexes.index_name(&scope);

    let result = state.analyzer.analyze(&index, request.query.as_deref()).await?;
    let doc_id = state.documents.attach_result(&scope, &result);

    Ok(Json(AnalyzeResponse {
        success: true,
        result,
        session_id: scope.session_id().map(str::to_string),
        doc_id,
    }))
}

async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let Json(request) = payload.map_err(|e| RfpError::InvalidInput(e.body_text()))?;
    request
        .validate()
        .map_err(|e| RfpError::InvalidInput(e.to_string()))?;

    let scope = Scope::from_optional(request.session_id.as_deref())?;
    let index = state.indexes.index_name(&scope);
    let reply = state.chatbot.answer(&index, &request.question).await?;

    Ok(Json(ChatResponse {
        answer: reply.answer,
        success: true,
    }))
}

fn matrix_for(state: &AppState, doc_id: &str) -> Result<BidMatrix> {
    let record = state
        .documents
        .get(doc_id)
        .ok_or_else(|| RfpError::NotFound(format!("Document {} not found", doc_id)))?;
    let result = record.latest_result.unwrap_or_else(ExtractionResult::empty);
    Ok(BidMatrix::from_result(&result))
}

async fn matrix(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<Value>> {
    let matrix = matrix_for(&state, &doc_id)?;
    Ok(Json(json!({
        "success": true,
        "doc_id": doc_id,
        "matrix": matrix,
    })))
}

async fn download_matrix(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Response> {
    let matrix = matrix_for(&state, &doc_id)?;
    let bytes = matrix_workbook(&matrix, &doc_id)?;
    Ok(xlsx_attachment(bytes, &format!("bid_matrix_{}.xlsx", doc_id)))
}

async fn download_report(
    payload: std::result::Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(request) = payload.map_err(|e| RfpError::InvalidInput(e.body_text()))?;
    let bytes = report_workbook(&request.rfp_data)?;
    Ok(xlsx_attachment(bytes, "rfp_analysis_report.xlsx"))
}

fn xlsx_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn compare(State(state): State<AppState>) -> Result<Json<Value>> {
    let source = &state.index_config.compare_source;
    let target = &state.index_config.compare_target;

    let comparison = compare_indexes(
        state.backend.as_ref(),
        source,
        target,
        EMBEDDING_DIMENSION as usize,
    )
    .await?;

    Ok(Json(match comparison {
        Some(c) => json!({
            "success": true,
            "similarity_score": c.similarity_score,
            "total_documents_compared": c.total_documents_compared,
        }),
        None => json!({
            "success": false,
            "error": format!("No vectors found in {} index", source),
        }),
    }))
}

async fn cleanup_session(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CleanupRequest>, JsonRejection>,
) -> Result<Json<CleanupResponse>> {
    let Json(request) = payload.map_err(|e| RfpError::InvalidInput(e.body_text()))?;
    request
        .validate()
        .map_err(|e| RfpError::InvalidInput(e.to_string()))?;

    let scope = Scope::session(&request.session_id)?;
    let deleted = {
        let _guard = state.indexes.lock(&scope).await;
        state.indexes.cleanup(&scope).await?
    };
    let forgotten = state.documents.forget_scope(&scope);
    log::info!(
        "Cleaned up session {} (index deleted: {}, documents dropped: {})",
        request.session_id,
        deleted,
        forgotten
    );

    let message = if deleted {
        format!("Session {} cleaned up", request.session_id)
    } else {
        format!("No index found for session {}", request.session_id)
    };

    Ok(Json(CleanupResponse {
        success: true,
        deleted,
        message,
    }))
}
