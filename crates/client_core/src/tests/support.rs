//! Test doubles: an in-process scripted backend and an HTTP fake served by axum.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use shared::{
    category::{category_for_detection, DETECTION_CONFIDENCE_THRESHOLD},
    domain::{LostItemId, StoredFilename},
    protocol::{
        AnalysisResult, AnalyzeRequest, CreateLostItemRequest, CreateLostItemResponse, LostItem,
        UploadResponse,
    },
};
use tokio::{net::TcpListener, sync::Mutex, sync::Notify};

use crate::{
    api::{LostFoundApi, UploadedFile},
    error::{ApiOperation, ClientError, Result},
};

pub(crate) fn stored_name(file_name: &str) -> StoredFilename {
    StoredFilename::new(format!("stored-{file_name}"))
}

pub(crate) fn analysis_for(filename: &StoredFilename) -> AnalysisResult {
    AnalysisResult {
        title: format!("Title for {filename}"),
        description: format!("Description for {filename}"),
        category: Some("Bags".to_string()),
        object_name: Some("backpack".to_string()),
        confidence: Some(0.87),
        filename: None,
    }
}

/// In-process backend whose calls can be held back or failed per file name.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    upload_gates: StdMutex<HashMap<String, Arc<Notify>>>,
    analyze_gates: StdMutex<HashMap<String, Arc<Notify>>>,
    failing_uploads: StdMutex<HashSet<String>>,
    failing_analyses: StdMutex<HashSet<String>>,
    fail_create: AtomicBool,
    pub(crate) uploads_started: StdMutex<Vec<String>>,
    pub(crate) uploads_finished: StdMutex<Vec<String>>,
    pub(crate) analyses: StdMutex<Vec<StoredFilename>>,
    pub(crate) creates: StdMutex<Vec<CreateLostItemRequest>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds the upload of `file_name` until the returned gate is notified.
    pub(crate) fn gate_upload(&self, file_name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.upload_gates
            .lock()
            .expect("gates")
            .insert(file_name.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn gate_analysis(&self, file_name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.analyze_gates
            .lock()
            .expect("gates")
            .insert(stored_name(file_name).to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn fail_upload_of(&self, file_name: &str) {
        self.failing_uploads
            .lock()
            .expect("failures")
            .insert(file_name.to_string());
    }

    pub(crate) fn fail_analysis_of(&self, file_name: &str) {
        self.failing_analyses
            .lock()
            .expect("failures")
            .insert(stored_name(file_name).to_string());
    }

    pub(crate) fn fail_creates(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn create_count(&self) -> usize {
        self.creates.lock().expect("creates").len()
    }
}

#[async_trait]
impl LostFoundApi for ScriptedApi {
    async fn upload(&self, file: UploadedFile) -> Result<StoredFilename> {
        let name = file.file_name.clone();
        self.uploads_started
            .lock()
            .expect("uploads")
            .push(name.clone());
        let gate = self.upload_gates.lock().expect("gates").get(&name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.uploads_finished
            .lock()
            .expect("uploads")
            .push(name.clone());
        if self.failing_uploads.lock().expect("failures").contains(&name) {
            return Err(ClientError::network(ApiOperation::Upload, "HTTP 500: disk full"));
        }
        Ok(stored_name(&name))
    }

    async fn analyze(&self, filename: &StoredFilename) -> Result<AnalysisResult> {
        self.analyses
            .lock()
            .expect("analyses")
            .push(filename.clone());
        let gate = self
            .analyze_gates
            .lock()
            .expect("gates")
            .get(filename.as_str())
            .cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self
            .failing_analyses
            .lock()
            .expect("failures")
            .contains(filename.as_str())
        {
            return Err(ClientError::network(
                ApiOperation::Analyze,
                "HTTP 503: model unavailable",
            ));
        }
        Ok(analysis_for(filename))
    }

    async fn create_item(&self, request: &CreateLostItemRequest) -> Result<CreateLostItemResponse> {
        let mut creates = self.creates.lock().expect("creates");
        creates.push(request.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ClientError::network(ApiOperation::Create, "HTTP 500"));
        }
        Ok(CreateLostItemResponse {
            id: LostItemId(creates.len() as i64),
            added_at: Some(Utc::now()),
        })
    }

    async fn create_item_from_file(
        &self,
        _file: UploadedFile,
        _found_location: Option<&str>,
    ) -> Result<CreateLostItemResponse> {
        Err(ClientError::network(ApiOperation::Create, "not scripted"))
    }

    async fn fetch_item(&self, _id: LostItemId) -> Result<Option<LostItem>> {
        Ok(None)
    }

    async fn list_items(&self) -> Result<Vec<LostItem>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeBackendState {
    files: HashMap<String, (String, Vec<u8>)>,
    items: Vec<LostItem>,
    fail_uploads: bool,
    fail_analysis: bool,
}

/// HTTP stand-in for the reporting backend.
#[derive(Clone, Default)]
pub(crate) struct FakeBackend {
    state: Arc<Mutex<FakeBackendState>>,
}

impl FakeBackend {
    pub(crate) async fn fail_uploads(&self, fail: bool) {
        self.state.lock().await.fail_uploads = fail;
    }

    pub(crate) async fn fail_analysis(&self, fail: bool) {
        self.state.lock().await.fail_analysis = fail;
    }

    pub(crate) async fn stored_bytes(&self, filename: &StoredFilename) -> Option<Vec<u8>> {
        self.state
            .lock()
            .await
            .files
            .get(filename.as_str())
            .map(|(_, bytes)| bytes.clone())
    }

    pub(crate) async fn items(&self) -> Vec<LostItem> {
        self.state.lock().await.items.clone()
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "detail": message }))).into_response()
}

/// Fake detector: the original file stem stands in for the detected label.
fn describe(original_name: &str) -> AnalysisResult {
    let label = original_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original_name)
        .replace(['_', '-'], " ")
        .to_ascii_lowercase();
    let confidence = 0.9;
    AnalysisResult {
        title: label.clone(),
        description: format!("A {label} handed in at the front desk"),
        category: Some(
            category_for_detection(&label, confidence, DETECTION_CONFIDENCE_THRESHOLD).to_string(),
        ),
        object_name: Some(label),
        confidence: Some(confidence),
        filename: None,
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> std::result::Result<(Option<(String, Vec<u8>)>, HashMap<String, String>), Response> {
    let mut file = None;
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| detail(StatusCode::BAD_REQUEST, &err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let original = field.file_name().unwrap_or("upload.bin").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| detail(StatusCode::BAD_REQUEST, &err.to_string()))?;
            file = Some((original, bytes.to_vec()));
        } else {
            let text = field
                .text()
                .await
                .map_err(|err| detail(StatusCode::BAD_REQUEST, &err.to_string()))?;
            fields.insert(name, text);
        }
    }
    Ok((file, fields))
}

fn store_file(state: &mut FakeBackendState, original: String, bytes: Vec<u8>) -> StoredFilename {
    let extension = original
        .rsplit_once('.')
        .map(|(_, ext)| format!(".{ext}"))
        .unwrap_or_default();
    let stored = format!("{}{extension}", uuid::Uuid::new_v4().simple());
    state.files.insert(stored.clone(), (original, bytes));
    StoredFilename::new(stored)
}

fn insert_item(state: &mut FakeBackendState, mut item: LostItem) -> CreateLostItemResponse {
    item.id = LostItemId(state.items.len() as i64 + 1);
    let response = CreateLostItemResponse {
        id: item.id,
        added_at: Some(item.added_at),
    };
    state.items.push(item);
    response
}

async fn upload(State(backend): State<FakeBackend>, multipart: Multipart) -> Response {
    let (file, _) = match read_multipart(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };
    let mut state = backend.state.lock().await;
    if state.fail_uploads {
        return detail(StatusCode::INTERNAL_SERVER_ERROR, "disk full");
    }
    let Some((original, bytes)) = file else {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "file part is required");
    };
    let filename = store_file(&mut state, original, bytes);
    Json(UploadResponse { filename }).into_response()
}

async fn analyze(State(backend): State<FakeBackend>, Json(request): Json<AnalyzeRequest>) -> Response {
    let state = backend.state.lock().await;
    if state.fail_analysis {
        return detail(StatusCode::SERVICE_UNAVAILABLE, "model unavailable");
    }
    match state.files.get(request.filename.as_str()) {
        Some((original, _)) => Json(describe(original)).into_response(),
        None => detail(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn create(State(backend): State<FakeBackend>, request: Request) -> Response {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = match Multipart::from_request(request, &()).await {
            Ok(multipart) => multipart,
            Err(rejection) => return rejection.into_response(),
        };
        let (file, fields) = match read_multipart(multipart).await {
            Ok(parts) => parts,
            Err(response) => return response,
        };
        let Some((original, bytes)) = file else {
            return detail(StatusCode::UNPROCESSABLE_ENTITY, "file part is required");
        };
        let analysis = describe(&original);
        let mut state = backend.state.lock().await;
        let filename = store_file(&mut state, original, bytes);
        let created = insert_item(
            &mut state,
            LostItem {
                id: LostItemId(0),
                title: analysis.title,
                description: analysis.description,
                category: analysis.category.unwrap_or_default(),
                found_location: fields.get("foundLocation").cloned().unwrap_or_default(),
                filename: Some(filename),
                added_at: Utc::now(),
                confidence: analysis.confidence,
                object_name: analysis.object_name,
            },
        );
        return Json(created).into_response();
    }

    let Json(payload) = match Json::<CreateLostItemRequest>::from_request(request, &()).await {
        Ok(payload) => payload,
        Err(rejection) => return rejection.into_response(),
    };
    if payload.title.trim().is_empty() || payload.description.trim().is_empty() {
        return detail(StatusCode::UNPROCESSABLE_ENTITY, "title and description are required");
    }
    let mut state = backend.state.lock().await;
    let created = insert_item(
        &mut state,
        LostItem {
            id: LostItemId(0),
            title: payload.title,
            description: payload.description,
            category: payload.category,
            found_location: payload.found_location,
            filename: payload.filename,
            added_at: Utc::now(),
            confidence: None,
            object_name: None,
        },
    );
    Json(created).into_response()
}

async fn list_items(State(backend): State<FakeBackend>) -> Json<Vec<LostItem>> {
    Json(backend.state.lock().await.items.clone())
}

async fn fetch_item(State(backend): State<FakeBackend>, Path(id): Path<i64>) -> Response {
    let state = backend.state.lock().await;
    match state.items.iter().find(|item| item.id.0 == id) {
        Some(item) => Json(item.clone()).into_response(),
        None => detail(StatusCode::NOT_FOUND, "Item not found"),
    }
}

pub(crate) async fn spawn_backend() -> anyhow::Result<(String, FakeBackend)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let backend = FakeBackend::default();
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/analyze-image", post(analyze))
        .route("/create-lost-item", post(create))
        .route("/lost-items", get(list_items))
        .route("/lost-items/:id", get(fetch_item))
        .with_state(backend.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), backend))
}
