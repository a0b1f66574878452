use crate::{
    agent::graph::TalentHunterAgent,
    configuration::{QdrantSettings, Settings},
    domain::services::{
        huggingface_embedding::HuggingFaceEmbeddingsService, record_adapter::RecordAdapterError,
        talent_store::TalentStore,
    },
    ports::{chat_model::{ChatModel, ChatModelError}, embeddings_service::EmbeddingError},
    repositories::{
        chat_model_openai_repository::ChatModelOpenAIRepository,
        record_point_qdrant_repository::RecordPointQdrantRepository,
    },
    routes::{chat, health_check},
};
use actix_web::{dev::Server, web, App, HttpServer};
use qdrant_client::prelude::{QdrantClient, QdrantClientConfig};
use std::{net::TcpListener, sync::Arc};
use tracing::info;
use tracing_actix_web::TracingLogger;

/// Holds the newly built server and the shared agent
pub struct Application {
    server: Server,
    port: u16,
    agent: web::Data<TalentHunterAgent>,
}

impl Application {
    /// Connects to Qdrant, loads the embeddings model and builds the server
    ///
    /// # Parameters
    /// - nb_workers: number of actix-web workers
    ///   if `None`, the number of available physical CPUs is used as the worker count.
    #[tracing::instrument(name = "Building application", skip(settings))]
    pub async fn build(
        settings: Settings,
        nb_workers: Option<usize>,
    ) -> Result<Self, ApplicationError> {
        let embeddings_model = settings.embeddings.model;
        if embeddings_model.dimension() != settings.qdrant.collection_vector_size {
            return Err(ApplicationError::EmbeddingError(
                EmbeddingError::DimensionMismatch {
                    expected: settings.qdrant.collection_vector_size,
                    actual: embeddings_model.dimension() as usize,
                },
            ));
        }

        let qdrant_client = get_qdrant_client(&settings.qdrant)?;
        let point_repository = Arc::new(RecordPointQdrantRepository::new(qdrant_client));

        let embeddings_service = Arc::new(HuggingFaceEmbeddingsService::try_new(embeddings_model).await?);

        let talent_store = TalentStore::new(embeddings_service, point_repository, &settings.qdrant);
        let chat_model = Arc::new(ChatModelOpenAIRepository::try_new(&settings.chat_model)?);

        Self::build_with_services(settings, nb_workers, talent_store, chat_model).await
    }

    /// Builds the server around an already constructed talent store and chat model
    ///
    /// The talent store collections are bootstrapped before the server starts listening.
    pub async fn build_with_services(
        settings: Settings,
        nb_workers: Option<usize>,
        talent_store: TalentStore,
        chat_model: Arc<dyn ChatModel>,
    ) -> Result<Self, ApplicationError> {
        talent_store.bootstrap_collections().await?;

        let agent = web::Data::new(TalentHunterAgent::new(
            chat_model,
            Arc::new(talent_store),
            settings.agent.recursion_limit,
        ));

        let address = format!(
            "{}:{}",
            settings.application.host, settings.application.port
        );
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, nb_workers, agent.clone())?;

        Ok(Self {
            server,
            port,
            agent,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Used by integration tests to check what the tools persisted
    pub fn agent(&self) -> web::Data<TalentHunterAgent> {
        self.agent.clone()
    }

    /// This function only returns when the application is stopped
    ///
    /// The embeddings model is released once the server is stopped.
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        info!("Running server ...");
        let result = self.server.await;

        self.agent.shutdown().await;
        info!("👋 Bye!");
        result
    }
}

/// listener: the consumer binds their own port
///
/// TracingLogger middleware: generates a `request_id` for each incoming request.
pub fn run(
    listener: TcpListener,
    nb_workers: Option<usize>,
    agent: web::Data<TalentHunterAgent>,
) -> Result<Server, std::io::Error> {
    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            // Path polled by the chat frontend
            .route("/healthcheck", web::get().to(health_check))
            .route("/chat", web::post().to(chat))
            .app_data(agent.clone())
    })
    .listen(listener)?;

    if let Some(nb_workers) = nb_workers {
        return Ok(server.workers(nb_workers).run());
    }

    Ok(server.run())
}

/// Set up a client to Qdrant
pub fn get_qdrant_client(config: &QdrantSettings) -> Result<QdrantClient, ApplicationError> {
    let mut qdrant_config = QdrantClientConfig::from_url(&config.endpoint);
    qdrant_config.api_key = config.api_key();

    QdrantClient::new(Some(qdrant_config)).map_err(|e| ApplicationError::QdrantError(e.to_string()))
}

#[derive(thiserror::Error, Debug)]
pub enum ApplicationError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    #[error("Error from Qdrant: {0}")]
    QdrantError(String),
    #[error(transparent)]
    EmbeddingError(#[from] EmbeddingError),
    #[error(transparent)]
    ChatModelError(#[from] ChatModelError),
    #[error(transparent)]
    RecordAdapterError(#[from] RecordAdapterError),
}
