use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use actix_web::web;
use async_trait::async_trait;
use common::telemetry::{get_tracing_subscriber, init_tracing_subscriber};
use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use talent_hunter::{
    agent::graph::TalentHunterAgent,
    configuration::{get_configuration, Settings},
    domain::{
        entities::{
            chat_message::{ChatMessage, ToolCallRequest},
            record_point::{Embeddings, RecordMatch, RecordPoint},
        },
        services::talent_store::TalentStore,
    },
    ports::{
        chat_model::{ChatModel, ChatModelError, ModelReply, ToolSpec},
        embeddings_service::{EmbeddingError, EmbeddingsService},
        record_point_repository::{RecordPointRepository, StorageError},
    },
    startup::Application,
};

pub const VECTOR_SIZE: u64 = 32;

// Ensures that the `tracing` stack is only initialized once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    // The sink is part of the subscriber type: one branch for `stdout`, one for `sink`.
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing");
    } else {
        let subscriber =
            get_tracing_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_tracing_subscriber(subscriber).expect("Failed to init tracing");
    };
});

/// Bag-of-words embeddings: each lowercase word is hashed into one dimension
///
/// Texts sharing words end up close to each other, which is enough to rank search results.
#[derive(Default)]
pub struct FakeEmbeddingsService {
    pub nb_calls: AtomicUsize,
    pub stopped: AtomicBool,
}

#[async_trait]
impl EmbeddingsService for FakeEmbeddingsService {
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(EmbeddingError::ModelUnavailable);
        }
        self.nb_calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0; VECTOR_SIZE as usize];
        // Keeps empty texts away from the zero vector
        vector[0] = 0.1;

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            let digest = fnv_hash(&word.to_lowercase());
            vector[1 + (digest % (VECTOR_SIZE - 1)) as usize] += 1.0;
        }

        Ok(vector)
    }

    async fn shutdown(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn fnv_hash(word: &str) -> u64 {
    word.bytes()
        .fold(14695981039346656037, |hash, byte| {
            (hash ^ byte as u64).wrapping_mul(1099511628211)
        })
}

/// Brute-force cosine search over points kept in memory
#[derive(Default)]
pub struct InMemoryPointRepository {
    collections: Mutex<HashMap<String, BTreeMap<u64, RecordPoint>>>,
    pub nb_created_collections: AtomicUsize,
    pub unreachable: AtomicBool,
}

impl InMemoryPointRepository {
    pub fn points(&self, collection_name: &str) -> Vec<RecordPoint> {
        self.collections
            .lock()
            .unwrap()
            .get(collection_name)
            .map(|points| points.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn check_reachable(&self) -> Result<(), StorageError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError("connection refused".into()));
        }
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b)
}

#[async_trait]
impl RecordPointRepository for InMemoryPointRepository {
    async fn ensure_collection(
        &self,
        collection_name: &str,
        _vector_size: u64,
        _distance: &str,
    ) -> Result<(), StorageError> {
        self.check_reachable()?;

        let mut collections = self.collections.lock().unwrap();
        if !collections.contains_key(collection_name) {
            collections.insert(collection_name.to_string(), BTreeMap::new());
            self.nb_created_collections.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn upsert(&self, collection_name: &str, point: RecordPoint) -> Result<(), StorageError> {
        self.check_reachable()?;

        self.collections
            .lock()
            .unwrap()
            .get_mut(collection_name)
            .ok_or_else(|| StorageError::UnknownCollection(collection_name.to_string()))?
            .insert(point.id, point);
        Ok(())
    }

    async fn search(
        &self,
        collection_name: &str,
        vector: Embeddings,
        limit: u64,
    ) -> Result<Vec<RecordMatch>, StorageError> {
        self.check_reachable()?;

        let collections = self.collections.lock().unwrap();
        let points = collections
            .get(collection_name)
            .ok_or_else(|| StorageError::UnknownCollection(collection_name.to_string()))?;

        let mut matches: Vec<RecordMatch> = points
            .values()
            .map(|point| RecordMatch {
                id: point.id,
                score: cosine_similarity(&vector, &point.vector),
                payload: JsonValue::from(point.payload.clone()),
            })
            .collect();
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(limit as usize);

        Ok(matches)
    }
}

/// Answers with the queued replies, then with `fallback` forever
#[derive(Default)]
pub struct ScriptedChatModel {
    replies: Mutex<VecDeque<ModelReply>>,
    fallback: Option<ModelReply>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn repeating(reply: ModelReply) -> Self {
        Self {
            fallback: Some(reply),
            ..Default::default()
        }
    }

    /// Conversations received by the model, system prompt included
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
        _temperature: f32,
    ) -> Result<ModelReply, ChatModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or(ChatModelError::EmptyResponse)
    }
}

pub fn tool_call(id: &str, name: &str, arguments: JsonValue) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

pub fn test_settings() -> Settings {
    let mut c = get_configuration().expect("Failed to read configuration.");
    // Port 0: the OS picks an available port
    c.application.port = 0;
    c.qdrant.collection_vector_size = VECTOR_SIZE;
    c
}

pub struct TestTalentStore {
    pub store: TalentStore,
    pub repository: Arc<InMemoryPointRepository>,
    pub embeddings_service: Arc<FakeEmbeddingsService>,
}

pub fn build_talent_store() -> TestTalentStore {
    Lazy::force(&TRACING);

    let repository = Arc::new(InMemoryPointRepository::default());
    let embeddings_service = Arc::new(FakeEmbeddingsService::default());
    let store = TalentStore::new(
        embeddings_service.clone(),
        repository.clone(),
        &test_settings().qdrant,
    );

    TestTalentStore {
        store,
        repository,
        embeddings_service,
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub repository: Arc<InMemoryPointRepository>,
    pub chat_model: Arc<ScriptedChatModel>,
    pub agent: web::Data<TalentHunterAgent>,
}

impl TestApp {
    pub async fn post_chat(&self, body: &JsonValue) -> reqwest::Response {
        reqwest::Client::new()
            .post(&format!("{}/chat", &self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

/// Launches the server as a background task, with in-memory collections and a scripted model
///
/// tokio::test spins up a new runtime for each test case: the server is dropped at the end of the test.
pub async fn spawn_app(chat_model: ScriptedChatModel) -> TestApp {
    let TestTalentStore {
        store, repository, ..
    } = build_talent_store();
    let chat_model = Arc::new(chat_model);

    // Only one actix-web worker is needed for integration tests
    let application =
        Application::build_with_services(test_settings(), Some(1), store, chat_model.clone())
            .await
            .expect("Failed to build application.");

    let port = application.port();
    let agent = application.agent();

    let _ = tokio::spawn(application.run_until_stopped());

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        repository,
        chat_model,
        agent,
    }
}
