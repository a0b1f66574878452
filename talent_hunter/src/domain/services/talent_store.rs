use std::sync::Arc;
use tracing::info;

use crate::{
    configuration::QdrantSettings,
    domain::{
        entities::record_point::RecordMatch,
        services::record_adapter::{RecordAdapter, RecordAdapterError},
    },
    ports::{embeddings_service::EmbeddingsService, record_point_repository::RecordPointRepository},
};

/// Candidates and companies registry, backed by one vector collection each
///
/// Built once at start-up and shared by every chat session, then stopped with `shutdown`.
pub struct TalentStore {
    adapter: RecordAdapter,
    candidates_collection: String,
    companies_collection: String,
    search_limit: u64,
}

impl TalentStore {
    pub fn new(
        embeddings_service: Arc<dyn EmbeddingsService>,
        point_repository: Arc<dyn RecordPointRepository>,
        settings: &QdrantSettings,
    ) -> Self {
        Self {
            adapter: RecordAdapter::new(
                embeddings_service,
                point_repository,
                settings.collection_vector_size,
                &settings.collection_distance,
            ),
            candidates_collection: settings.candidates_collection.clone(),
            companies_collection: settings.companies_collection.clone(),
            search_limit: settings.search_limit,
        }
    }

    /// Creates the candidates and companies collections if needed. Safe to call on every start.
    #[tracing::instrument(name = "Bootstrapping talent collections", skip(self))]
    pub async fn bootstrap_collections(&self) -> Result<(), RecordAdapterError> {
        self.adapter
            .ensure_collection(&self.candidates_collection)
            .await?;
        self.adapter
            .ensure_collection(&self.companies_collection)
            .await?;

        info!(
            candidates = %self.candidates_collection,
            companies = %self.companies_collection,
            "Collections are ready"
        );
        Ok(())
    }

    /// Registering the same name and email again replaces the previous resume
    #[tracing::instrument(name = "Upserting candidate", skip(self, resume))]
    pub async fn upsert_candidate(
        &self,
        name: &str,
        email: &str,
        resume: &str,
    ) -> Result<(), RecordAdapterError> {
        let point = self.adapter.build_candidate_point(name, email, resume).await?;
        self.adapter
            .upsert(point, &self.candidates_collection)
            .await
    }

    #[tracing::instrument(name = "Searching candidates", skip(self))]
    pub async fn search_candidates(&self, query: &str) -> Result<Vec<RecordMatch>, RecordAdapterError> {
        self.adapter
            .search(query, &self.candidates_collection, self.search_limit)
            .await
    }

    /// Registering the same company name and job title again replaces the previous query
    #[tracing::instrument(name = "Upserting company", skip(self, company_query))]
    pub async fn upsert_company(
        &self,
        company_name: &str,
        job_title: &str,
        company_query: &str,
    ) -> Result<(), RecordAdapterError> {
        let point = self
            .adapter
            .build_company_point(company_name, job_title, company_query)
            .await?;
        self.adapter.upsert(point, &self.companies_collection).await
    }

    #[tracing::instrument(name = "Searching companies", skip(self))]
    pub async fn search_companies(&self, query: &str) -> Result<Vec<RecordMatch>, RecordAdapterError> {
        self.adapter
            .search(query, &self.companies_collection, self.search_limit)
            .await
    }

    pub async fn shutdown(&self) {
        self.adapter.shutdown().await;
        info!("Talent store stopped");
    }
}
