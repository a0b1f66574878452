use common::helper::error_chain_fmt;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::{
    collections::BTreeMap,
    io::{self, Write},
    sync::Arc,
};
use tracing::info;

use crate::{
    domain::entities::{
        candidate::Candidate,
        company::Company,
        record_point::{Embeddings, RecordMatch, RecordPoint, RecordPointPayload},
        validation::ValidationError,
    },
    ports::{
        embeddings_service::{EmbeddingError, EmbeddingsService},
        record_point_repository::{RecordPointRepository, StorageError},
    },
};

/// Point ids are reduced to 10 decimal digits.
///
/// Changing it changes every id: already persisted points would not be overwritten anymore.
pub const POINT_ID_MODULUS: u128 = 10_000_000_000;

/// Separator of the candidate id key: `{name}__{email}`
pub const CANDIDATE_KEY_SEPARATOR: &str = "__";

/// Separator of the company id key: `{company_name}_{job_title}`
pub const COMPANY_KEY_SEPARATOR: &str = "_";

/// MD5 digest of `key`, read as a big-endian unsigned integer, modulo `POINT_ID_MODULUS`
pub fn derive_point_id(key: &str) -> u64 {
    let digest = md5::compute(key.as_bytes());
    (u128::from_be_bytes(digest.0) % POINT_ID_MODULUS) as u64
}

pub fn candidate_point_id(name: &str, email: &str) -> u64 {
    derive_point_id(&format!("{}{}{}", name, CANDIDATE_KEY_SEPARATOR, email))
}

pub fn company_point_id(company_name: &str, job_title: &str) -> u64 {
    derive_point_id(&format!(
        "{}{}{}",
        company_name, COMPANY_KEY_SEPARATOR, job_title
    ))
}

#[derive(Serialize)]
struct CandidateContent<'a> {
    resume: &'a str,
    email: &'a str,
    name: &'a str,
}

/// Writes JSON with `", "` and `": "` separators and non-ASCII characters escaped as `\uXXXX`
///
/// This is the format of the candidate contents already stored.
struct LegacyJsonFormatter;

impl Formatter for LegacyJsonFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for c in fragment.chars() {
            if c.is_ascii() && c != '\x7f' {
                writer.write_all(&[c as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

fn to_legacy_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, LegacyJsonFormatter);
    value.serialize(&mut serializer)?;

    // Only valid UTF-8 is ever written
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// `content` is the whole candidate as a JSON object string, keys in `resume`, `email`, `name` order
pub fn candidate_payload(candidate: &Candidate) -> Result<RecordPointPayload, serde_json::Error> {
    let content = to_legacy_json(&CandidateContent {
        resume: &candidate.resume,
        email: &candidate.email,
        name: &candidate.name,
    })?;

    Ok(RecordPointPayload {
        metadata: BTreeMap::from([
            ("name".to_string(), candidate.name.clone()),
            ("email".to_string(), candidate.email.clone()),
        ]),
        content,
    })
}

/// `content` is the raw company query, not JSON-encoded
pub fn company_payload(company: &Company) -> RecordPointPayload {
    RecordPointPayload {
        metadata: BTreeMap::from([
            ("name".to_string(), company.company_name.clone()),
            ("job_title".to_string(), company.job_title.clone()),
        ]),
        content: company.company_query.clone(),
    }
}

/// Converts candidates and companies into storage points, and runs similarity searches
///
/// Holds no mutable state: it can be shared between concurrent chat sessions.
pub struct RecordAdapter {
    embeddings_service: Arc<dyn EmbeddingsService>,
    point_repository: Arc<dyn RecordPointRepository>,
    vector_size: u64,
    distance: String,
}

impl RecordAdapter {
    pub fn new(
        embeddings_service: Arc<dyn EmbeddingsService>,
        point_repository: Arc<dyn RecordPointRepository>,
        vector_size: u64,
        distance: &str,
    ) -> Self {
        Self {
            embeddings_service,
            point_repository,
            vector_size,
            distance: distance.to_string(),
        }
    }

    /// Embeds a text and checks it fits the collections vector size
    #[tracing::instrument(name = "Embedding text", skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Embeddings, EmbeddingError> {
        let embeddings = self.embeddings_service.embed(text).await?;

        if embeddings.len() as u64 != self.vector_size {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.vector_size,
                actual: embeddings.len(),
            });
        }

        Ok(embeddings)
    }

    /// Only the resume is embedded. The id only depends on `name` and `email`.
    #[tracing::instrument(name = "Building candidate point", skip(self, resume))]
    pub async fn build_candidate_point(
        &self,
        name: &str,
        email: &str,
        resume: &str,
    ) -> Result<RecordPoint, RecordAdapterError> {
        let candidate = Candidate::parse(name, email, resume)?;
        let vector = self.embed(&candidate.resume).await?;

        Ok(RecordPoint {
            id: candidate_point_id(&candidate.name, &candidate.email),
            vector,
            payload: candidate_payload(&candidate)?,
        })
    }

    /// Only the company query is embedded. The id only depends on `company_name` and `job_title`.
    #[tracing::instrument(name = "Building company point", skip(self, company_query))]
    pub async fn build_company_point(
        &self,
        company_name: &str,
        job_title: &str,
        company_query: &str,
    ) -> Result<RecordPoint, RecordAdapterError> {
        let company = Company::parse(company_name, job_title, company_query)?;
        let vector = self.embed(&company.company_query).await?;

        Ok(RecordPoint {
            id: company_point_id(&company.company_name, &company.job_title),
            vector,
            payload: company_payload(&company),
        })
    }

    #[tracing::instrument(name = "Upserting point", skip(self, point), fields(point_id = point.id))]
    pub async fn upsert(
        &self,
        point: RecordPoint,
        collection_name: &str,
    ) -> Result<(), RecordAdapterError> {
        self.point_repository.upsert(collection_name, point).await?;

        info!("Upserted point");
        Ok(())
    }

    #[tracing::instrument(name = "Searching points", skip(self))]
    pub async fn search(
        &self,
        query: &str,
        collection_name: &str,
        limit: u64,
    ) -> Result<Vec<RecordMatch>, RecordAdapterError> {
        let vector = self.embed(query).await?;
        let matches = self
            .point_repository
            .search(collection_name, vector, limit)
            .await?;

        info!(nb_matches = matches.len(), "Found matching points");
        Ok(matches)
    }

    /// Idempotent
    pub async fn ensure_collection(&self, collection_name: &str) -> Result<(), RecordAdapterError> {
        self.point_repository
            .ensure_collection(collection_name, self.vector_size, &self.distance)
            .await?;

        Ok(())
    }

    pub async fn shutdown(&self) {
        self.embeddings_service.shutdown().await;
    }
}

#[derive(thiserror::Error)]
pub enum RecordAdapterError {
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
    #[error(transparent)]
    EmbeddingError(#[from] EmbeddingError),
    #[error(transparent)]
    StorageError(#[from] StorageError),
    #[error("Failed to encode the point content: {0}")]
    EncodingError(#[from] serde_json::Error),
}

impl std::fmt::Debug for RecordAdapterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
