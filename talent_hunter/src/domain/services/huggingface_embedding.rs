use crate::{
    domain::entities::record_point::Embeddings,
    ports::embeddings_service::{EmbeddingError, EmbeddingsService},
};
use async_trait::async_trait;
use rust_bert::pipelines::sentence_embeddings::{
    SentenceEmbeddingsBuilder, SentenceEmbeddingsModel, SentenceEmbeddingsModelType,
};
use serde::Deserialize;
use std::{
    sync::Mutex,
    thread::{self, JoinHandle},
};
use tokio::{
    sync::{mpsc, oneshot},
    task,
};
use tracing::{error, info};

/// Sentence embeddings models that can be selected from the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingsModel {
    AllDistilrobertaV1,
    AllMiniLmL12V2,
    AllMiniLmL6V2,
    ParaphraseAlbertSmallV2,
}

impl EmbeddingsModel {
    /// Size of the vectors produced by the model
    pub fn dimension(&self) -> u64 {
        match self {
            EmbeddingsModel::AllDistilrobertaV1 => 768,
            EmbeddingsModel::AllMiniLmL12V2
            | EmbeddingsModel::AllMiniLmL6V2
            | EmbeddingsModel::ParaphraseAlbertSmallV2 => 384,
        }
    }
}

impl From<EmbeddingsModel> for SentenceEmbeddingsModelType {
    fn from(model: EmbeddingsModel) -> Self {
        match model {
            EmbeddingsModel::AllDistilrobertaV1 => SentenceEmbeddingsModelType::AllDistilrobertaV1,
            EmbeddingsModel::AllMiniLmL12V2 => SentenceEmbeddingsModelType::AllMiniLmL12V2,
            EmbeddingsModel::AllMiniLmL6V2 => SentenceEmbeddingsModelType::AllMiniLmL6V2,
            EmbeddingsModel::ParaphraseAlbertSmallV2 => {
                SentenceEmbeddingsModelType::ParaphraseAlbertSmallV2
            }
        }
    }
}

/// Turns one text into embeddings, on the runner thread
pub trait SentenceEncoder {
    fn encode_one(&self, text: &str) -> Result<Embeddings, EmbeddingError>;
}

impl SentenceEncoder for SentenceEmbeddingsModel {
    fn encode_one(&self, text: &str) -> Result<Embeddings, EmbeddingError> {
        self.encode(&[text])
            .map_err(|e| EmbeddingError::ModelError(e.to_string()))?
            .pop()
            .ok_or_else(|| EmbeddingError::ModelError("no embeddings generated".into()))
    }
}

/// Service to generate embeddings from a text, using models available from Hugging Face.
///
/// The model runs on its own thread. Requests are queued on a bounded channel and answered
/// one by one through a oneshot channel.
pub struct HuggingFaceEmbeddingsService {
    sender_to_runner: Mutex<Option<mpsc::Sender<RunnerMessage>>>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl HuggingFaceEmbeddingsService {
    /// Spawns the runner thread and waits for the model to be loaded
    #[tracing::instrument(name = "Loading embeddings model")]
    pub async fn try_new(model: EmbeddingsModel) -> Result<Self, EmbeddingError> {
        Self::start(move || {
            SentenceEmbeddingsBuilder::remote(model.into())
                .create_model()
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))
        })
        .await
    }

    /// `load_encoder` runs on the runner thread: the encoder never leaves it
    async fn start<E, L>(load_encoder: L) -> Result<Self, EmbeddingError>
    where
        E: SentenceEncoder,
        L: FnOnce() -> Result<E, EmbeddingError> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(100);
        let (ready_sender, ready_receiver) = oneshot::channel();

        let handle = thread::spawn(move || Self::runner(load_encoder, receiver, ready_sender));

        ready_receiver
            .await
            .map_err(|_| EmbeddingError::ModelUnavailable)??;

        Ok(Self {
            sender_to_runner: Mutex::new(Some(sender)),
            thread_handle: Mutex::new(Some(handle)),
        })
    }

    /// The embeddings generator runner itself
    ///
    /// Generating embeddings is CPU-bound: it runs in a sync thread, not in a future.
    /// Stops when every sender has been dropped.
    fn runner<E, L>(
        load_encoder: L,
        mut receiver: mpsc::Receiver<RunnerMessage>,
        ready_sender: oneshot::Sender<Result<(), EmbeddingError>>,
    ) where
        E: SentenceEncoder,
        L: FnOnce() -> Result<E, EmbeddingError>,
    {
        let encoder = match load_encoder() {
            Ok(encoder) => encoder,
            Err(error) => {
                let _ = ready_sender.send(Err(error));
                return;
            }
        };
        info!("Embeddings model loaded ✅");
        let _ = ready_sender.send(Ok(()));

        while let Some((text, sender)) = receiver.blocking_recv() {
            if sender.send(encoder.encode_one(&text)).is_err() {
                error!("Embeddings requester went away before getting its result");
            }
        }

        info!("Embeddings runner stopped");
    }
}

#[async_trait]
impl EmbeddingsService for HuggingFaceEmbeddingsService {
    #[tracing::instrument(name = "Generate embeddings", skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingError> {
        let sender_to_runner = self
            .sender_to_runner
            .lock()
            .map_err(|_| EmbeddingError::ModelUnavailable)?
            .clone()
            .ok_or(EmbeddingError::ModelUnavailable)?;

        let (sender, receiver) = oneshot::channel();

        // Waits for a free slot without blocking the runtime thread
        sender_to_runner
            .send((text.to_string(), sender))
            .await
            .map_err(|_| EmbeddingError::ModelUnavailable)?;

        receiver
            .await
            .map_err(|_| EmbeddingError::ModelUnavailable)?
    }

    #[tracing::instrument(name = "Stopping embeddings model", skip(self))]
    async fn shutdown(&self) {
        // Dropping the last sender ends the runner loop
        if let Ok(mut sender) = self.sender_to_runner.lock() {
            sender.take();
        }

        let handle = self
            .thread_handle
            .lock()
            .ok()
            .and_then(|mut handle| handle.take());

        if let Some(handle) = handle {
            if let Err(error) = task::spawn_blocking(move || handle.join()).await {
                error!(?error, "Failed to join the embeddings runner");
            }
        }
    }
}

/// Message type for internal channel, passing around the input text and the generated embeddings
type RunnerMessage = (String, oneshot::Sender<Result<Embeddings, EmbeddingError>>);
