//! Scripted stand-ins for every external collaborator, for tests only.

use anyhow::Result;
use chrono::NaiveDate;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::FoodEntry;
use crate::services::database::FoodEntrySink;
use crate::services::ml_bridge::{BridgeError, ModelBridge, ModelStatus, PredictionRequest};
use crate::services::openrouter::{CompletionClient, CompletionError, CompletionRequest, ContentPart, MessageContent};
use crate::services::usda::{ReferenceDatabase, ReferenceDbError};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Unauthorized,
    Empty,
    Fail(String),
}

impl Reply {
    fn into_result(self) -> Result<String, CompletionError> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Unauthorized => Err(CompletionError::Unauthorized),
            Reply::Empty => Err(CompletionError::EmptyContent),
            Reply::Fail(message) => Err(CompletionError::Api { status: 500, message }),
        }
    }
}

/// Completion client that answers by substring match on the prompt text.
/// The first registered pattern that matches wins.
pub struct ScriptedCompletion {
    replies: Vec<(String, Reply)>,
    default_reply: Option<Reply>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            default_reply: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reply(mut self, prompt_contains: &str, reply: Reply) -> Self {
        self.replies.push((prompt_contains.to_lowercase(), reply));
        self
    }

    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default_reply = Some(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn prompt_text(request: &CompletionRequest) -> String {
        request
            .messages
            .iter()
            .filter(|m| m.role == "user")
            .map(|m| match &m.content {
                MessageContent::Text(text) => text.clone(),
                MessageContent::Parts(parts) => parts
                    .iter()
                    .filter_map(|p| match p {
                        ContentPart::Text { text, .. } => Some(text.clone()),
                        ContentPart::ImageUrl { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect::<Vec<_>>()
            .join("\n")
            .to_lowercase()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = Self::prompt_text(&request);
        self.requests.lock().unwrap().push(request);

        let reply = self
            .replies
            .iter()
            .find(|(pattern, _)| prompt.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.default_reply.clone())
            .unwrap_or_else(|| Reply::Fail(format!("no scripted reply for: {}", prompt)));

        reply.into_result()
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

enum Prediction {
    Value(Value),
    NoJson,
    Crash(String),
}

pub struct FakeBridge {
    status: Mutex<ModelStatus>,
    prediction: Prediction,
    pub predict_calls: AtomicUsize,
    pub train_calls: AtomicUsize,
    train_succeeds: bool,
    last_request: Mutex<Option<PredictionRequest>>,
}

impl FakeBridge {
    fn build(status: ModelStatus, prediction: Prediction) -> Self {
        Self {
            status: Mutex::new(status),
            prediction,
            predict_calls: AtomicUsize::new(0),
            train_calls: AtomicUsize::new(0),
            train_succeeds: false,
            last_request: Mutex::new(None),
        }
    }

    pub fn available(prediction: Value) -> Self {
        Self::build(ModelStatus::available(), Prediction::Value(prediction))
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::build(ModelStatus::unavailable(reason), Prediction::NoJson)
    }

    /// Available, but every prediction fails with the given error kind.
    pub fn failing(error: BridgeError) -> Self {
        let prediction = match error {
            BridgeError::NoJson | BridgeError::Parse(_) => Prediction::NoJson,
            other => Prediction::Crash(other.to_string()),
        };
        Self::build(ModelStatus::available(), prediction)
    }

    /// Successful training flips the bridge to available.
    pub fn with_training(mut self, succeeds: bool) -> Self {
        self.train_succeeds = succeeds;
        self
    }

    pub fn last_request(&self) -> Option<PredictionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelBridge for FakeBridge {
    async fn check_availability(&self) -> ModelStatus {
        self.status.lock().unwrap().clone()
    }

    async fn predict(&self, request: &PredictionRequest) -> Result<Value, BridgeError> {
        self.predict_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.prediction {
            Prediction::Value(value) => Ok(value.clone()),
            Prediction::NoJson => Err(BridgeError::NoJson),
            Prediction::Crash(stderr) => Err(BridgeError::Exit {
                code: Some(1),
                stderr: stderr.clone(),
            }),
        }
    }

    async fn train(&self) -> Result<String, BridgeError> {
        self.train_calls.fetch_add(1, Ordering::SeqCst);
        if self.train_succeeds {
            *self.status.lock().unwrap() = ModelStatus::available();
            Ok("trained".to_string())
        } else {
            Err(BridgeError::Exit {
                code: Some(1),
                stderr: "Dataset not found".to_string(),
            })
        }
    }
}

pub struct FakeReference {
    food: Option<Value>,
    pub calls: AtomicUsize,
}

impl FakeReference {
    pub fn empty() -> Self {
        Self {
            food: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_food(food: Value) -> Self {
        Self {
            food: Some(food),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl ReferenceDatabase for FakeReference {
    async fn search_first(&self, query: &str) -> Result<Option<Value>, ReferenceDbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if query.trim().is_empty() {
            return Err(ReferenceDbError::EmptyQuery);
        }
        Ok(self.food.clone())
    }
}

#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<FoodEntry>>,
}

impl MemorySink {
    pub fn stored(&self) -> Vec<FoodEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl FoodEntrySink for MemorySink {
    async fn store(&self, entry: &FoodEntry) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let id = entries.len() as i64 + 1;
        let mut entry = entry.clone();
        entry.id = Some(id);
        entries.push(entry);
        Ok(id)
    }

    async fn entries(&self, user_id: i64, range: Option<(NaiveDate, NaiveDate)>) -> Result<Vec<FoodEntry>> {
        let mut found: Vec<FoodEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .filter(|e| match range {
                Some((start, end)) => {
                    let day = e.created_at.date_naive();
                    day >= start && day <= end
                }
                None => true,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn delete(&self, user_id: i64, id: i64) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| !(e.id == Some(id) && e.user_id == user_id));
        Ok(entries.len() < before)
    }
}
