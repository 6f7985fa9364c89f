//! In-memory collaborators for workflow and handler tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::inference::{
    ContentPart, FeedbackResponse, InferenceClient, InferenceError, MessageContent,
    ResponseMessage,
};
use crate::kv::{KeyValueStore, StoreError};
use crate::raster::{preview_file_name, RasterImage, RasterizeError, Rasterizer};
use crate::storage::{object_path, FileStorage, StorageError, StoredObject, UploadedFile};
use crate::workflow::state::{StatusReporter, WorkflowState};

pub fn pdf_file(name: &str) -> UploadedFile {
    UploadedFile::new(name, "application/pdf", &b"%PDF-1.7\n%fake resume\n"[..])
}

pub fn sample_feedback_json() -> String {
    serde_json::json!({
        "overallScore": 72,
        "ATS": {
            "score": 80,
            "tips": [
                { "type": "good", "tip": "Standard section headings" },
                { "type": "improve", "tip": "Add keywords from the job description" }
            ]
        },
        "toneAndStyle": {
            "score": 70,
            "tips": [{ "type": "good", "tip": "Confident voice", "explanation": "Active verbs throughout." }]
        },
        "content": {
            "score": 65,
            "tips": [{ "type": "improve", "tip": "Quantify impact", "explanation": "Most bullets lack numbers." }]
        },
        "structure": {
            "score": 75,
            "tips": [{ "type": "good", "tip": "One page", "explanation": "Fits on a single page." }]
        },
        "skills": {
            "score": 60,
            "tips": [{ "type": "improve", "tip": "Group skills", "explanation": "Split languages from tools." }]
        }
    })
    .to_string()
}

#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    uploaded: Mutex<Vec<String>>,
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl MemoryStorage {
    /// Fails the upload with the given zero-based call index.
    pub fn failing_on_call(index: usize) -> Self {
        Self {
            fail_on_call: Some(index),
            ..Self::default()
        }
    }

    pub fn upload_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn uploaded_names(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn upload(&self, file: &UploadedFile) -> Result<StoredObject, StorageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(call) {
            return Err(StorageError::Upload {
                name: file.file_name.clone(),
                detail: "simulated outage".to_string(),
            });
        }
        let path = object_path(&file.file_name);
        self.objects
            .lock()
            .unwrap()
            .insert(path.clone(), file.bytes.clone());
        self.uploaded.lock().unwrap().push(file.file_name.clone());
        Ok(StoredObject {
            path,
            size: file.bytes.len(),
        })
    }

    async fn download(&self, path: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::Download {
                path: path.to_string(),
                detail: "no such object".to_string(),
            })
    }
}

#[derive(Default)]
pub struct FakeRasterizer {
    calls: AtomicUsize,
    fail: bool,
}

impl FakeRasterizer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn convert(&self, document: &UploadedFile) -> Result<RasterImage, RasterizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RasterizeError::NoPages);
        }
        Ok(RasterImage {
            file: UploadedFile::new(
                preview_file_name(&document.file_name),
                "image/png",
                &b"\x89PNG\r\n\x1a\n"[..],
            ),
            width: 1,
            height: 1,
        })
    }
}

enum InferenceBehaviour {
    Respond(FeedbackResponse),
    Fail,
    CancelAndHang(CancellationToken),
}

pub struct FakeInference {
    behaviour: InferenceBehaviour,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeInference {
    fn with(behaviour: InferenceBehaviour) -> Self {
        Self {
            behaviour,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Responds with the sample feedback as a single-element part list.
    pub fn succeeding() -> Self {
        Self::with(InferenceBehaviour::Respond(FeedbackResponse {
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: MessageContent::Parts(vec![ContentPart {
                    kind: Some("text".to_string()),
                    text: Some(sample_feedback_json()),
                }]),
            },
        }))
    }

    /// Responds with the sample feedback as a plain string.
    pub fn succeeding_plain() -> Self {
        Self::returning_text(&sample_feedback_json())
    }

    pub fn returning_text(text: &str) -> Self {
        Self::with(InferenceBehaviour::Respond(FeedbackResponse {
            message: ResponseMessage {
                role: "assistant".to_string(),
                content: MessageContent::Text(text.to_string()),
            },
        }))
    }

    pub fn failing() -> Self {
        Self::with(InferenceBehaviour::Fail)
    }

    /// Cancels `token` when called, then never returns.
    pub fn cancelling(token: CancellationToken) -> Self {
        Self::with(InferenceBehaviour::CancelAndHang(token))
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn feedback(&self, path: &str, prompt: &str) -> Result<FeedbackResponse, InferenceError> {
        self.calls
            .lock()
            .unwrap()
            .push((path.to_string(), prompt.to_string()));
        match &self.behaviour {
            InferenceBehaviour::Respond(response) => Ok(response.clone()),
            InferenceBehaviour::Fail => Err(InferenceError::Api {
                status: 500,
                message: "simulated outage".to_string(),
            }),
            InferenceBehaviour::CancelAndHang(token) => {
                token.cancel();
                std::future::pending().await
            }
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    fail_on_write: Option<usize>,
    cancel_after_write: Option<(usize, CancellationToken)>,
}

impl MemoryStore {
    /// Fails the write with the given zero-based index.
    pub fn failing_on_write(index: usize) -> Self {
        Self {
            fail_on_write: Some(index),
            ..Self::default()
        }
    }

    /// Stores the write with the given index, then cancels `token` and yields
    /// before acknowledging it.
    pub fn cancelling_after_write(index: usize, token: CancellationToken) -> Self {
        Self {
            cancel_after_write: Some((index, token)),
            ..Self::default()
        }
    }

    /// Successful writes, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let index = {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_on_write == Some(writes.len()) {
                return Err(StoreError::Redis(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "simulated outage",
                ))));
            }
            writes.push((key.to_string(), value.to_string()));
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            writes.len() - 1
        };
        if let Some((at, token)) = &self.cancel_after_write {
            if *at == index {
                token.cancel();
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.value(key))
    }
}

#[derive(Default)]
pub struct RecordingReporter {
    states: Mutex<Vec<WorkflowState>>,
}

impl RecordingReporter {
    pub fn states(&self) -> Vec<WorkflowState> {
        self.states.lock().unwrap().clone()
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.states().iter().map(WorkflowState::label).collect()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&self, state: &WorkflowState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
