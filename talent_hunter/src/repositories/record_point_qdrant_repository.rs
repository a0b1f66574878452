use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::{
    prelude::QdrantClient,
    qdrant::{
        self, point_id::PointIdOptions, value::Kind, vectors_config::Config, CreateCollection,
        Distance, ListValue, PointId, PointStruct, ScoredPoint, SearchPoints, Struct, VectorParams,
        VectorsConfig,
    },
};
use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};
use tracing::{info, warn};

use crate::{
    domain::entities::record_point::{Embeddings, RecordMatch, RecordPoint},
    ports::record_point_repository::{RecordPointRepository, StorageError},
};

/// Candidates and companies points persisted in Qdrant
pub struct RecordPointQdrantRepository {
    client: QdrantClient,
}

impl RecordPointQdrantRepository {
    pub fn new(client: QdrantClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordPointRepository for RecordPointQdrantRepository {
    #[tracing::instrument(name = "Ensuring Qdrant collection exists", skip(self))]
    async fn ensure_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
        distance: &str,
    ) -> Result<(), StorageError> {
        let distance = Distance::from_str_name(distance).ok_or_else(|| {
            StorageError::ConfigurationError(format!("Invalid Qdrant distance: {}", distance))
        })?;

        match self
            .client
            .create_collection(&CreateCollection {
                collection_name: collection_name.to_string(),
                vectors_config: Some(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: vector_size,
                        distance: distance as i32,
                        ..Default::default()
                    })),
                }),
                ..Default::default()
            })
            .await
        {
            Ok(_) => info!("Created collection"),
            Err(error) => {
                // Qdrant client only returns anyhow errors
                if !error.to_string().contains("already exists") {
                    warn!(?error, "Failed to create collection");
                    return Err(StorageError::BackendError(error.to_string()));
                }
                info!("Collection already exists");
            }
        };

        Ok(())
    }

    /// Waits for the write to be applied, so a following search sees it
    #[tracing::instrument(name = "Saving point to Qdrant", skip(self, point), fields(point_id = point.id))]
    async fn upsert(&self, collection_name: &str, point: RecordPoint) -> Result<(), StorageError> {
        self.client
            .upsert_points_blocking(collection_name, vec![PointStruct::from(point)], None)
            .await
            .map_err(|e| map_qdrant_error(collection_name, e))?;

        Ok(())
    }

    #[tracing::instrument(name = "Searching points in Qdrant", skip(self, vector))]
    async fn search(
        &self,
        collection_name: &str,
        vector: Embeddings,
        limit: u64,
    ) -> Result<Vec<RecordMatch>, StorageError> {
        let response = self
            .client
            .search_points(&SearchPoints {
                collection_name: collection_name.to_string(),
                vector,
                limit,
                with_payload: Some(true.into()),
                ..Default::default()
            })
            .await
            .map_err(|e| map_qdrant_error(collection_name, e))?;

        response
            .result
            .into_iter()
            .map(RecordMatch::try_from)
            .collect()
    }
}

fn map_qdrant_error(collection_name: &str, error: anyhow::Error) -> StorageError {
    let message = error.to_string();
    if message.contains("Not found: Collection") || message.contains("doesn't exist") {
        return StorageError::UnknownCollection(collection_name.to_string());
    }
    StorageError::BackendError(message)
}

impl From<RecordPoint> for PointStruct {
    fn from(point: RecordPoint) -> Self {
        let payload = match json_to_qdrant_value(point.payload.into()).kind {
            Some(Kind::StructValue(Struct { fields })) => fields,
            _ => HashMap::new(),
        };

        Self {
            id: Some(PointId::from(point.id)),
            vectors: Some(point.vector.into()),
            payload,
        }
    }
}

impl TryFrom<ScoredPoint> for RecordMatch {
    type Error = StorageError;

    fn try_from(scored_point: ScoredPoint) -> Result<Self, Self::Error> {
        let id = match scored_point.id.and_then(|id| id.point_id_options) {
            Some(PointIdOptions::Num(id)) => id,
            Some(PointIdOptions::Uuid(uuid)) => {
                return Err(StorageError::InvalidPoint(format!(
                    "expected a numeric id, got {}",
                    uuid
                )))
            }
            None => return Err(StorageError::InvalidPoint("missing point id".into())),
        };

        let payload = scored_point
            .payload
            .into_iter()
            .map(|(key, value)| (key, qdrant_value_to_json(value)))
            .collect::<JsonMap<String, JsonValue>>();

        Ok(Self {
            id,
            score: scored_point.score,
            payload: JsonValue::Object(payload),
        })
    }
}

fn json_to_qdrant_value(value: JsonValue) -> qdrant::Value {
    let kind = match value {
        JsonValue::Null => Kind::NullValue(qdrant::NullValue::NullValue as i32),
        JsonValue::Bool(value) => Kind::BoolValue(value),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => Kind::IntegerValue(integer),
            None => Kind::DoubleValue(number.as_f64().unwrap_or_default()),
        },
        JsonValue::String(value) => Kind::StringValue(value),
        JsonValue::Array(values) => Kind::ListValue(ListValue {
            values: values.into_iter().map(json_to_qdrant_value).collect(),
        }),
        JsonValue::Object(fields) => Kind::StructValue(Struct {
            fields: fields
                .into_iter()
                .map(|(key, value)| (key, json_to_qdrant_value(value)))
                .collect(),
        }),
    };

    qdrant::Value { kind: Some(kind) }
}

fn qdrant_value_to_json(value: qdrant::Value) -> JsonValue {
    match value.kind {
        None | Some(Kind::NullValue(_)) => JsonValue::Null,
        Some(Kind::BoolValue(value)) => JsonValue::Bool(value),
        Some(Kind::IntegerValue(value)) => JsonValue::Number(value.into()),
        Some(Kind::DoubleValue(value)) => JsonNumber::from_f64(value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Some(Kind::StringValue(value)) => JsonValue::String(value),
        Some(Kind::ListValue(list)) => {
            JsonValue::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(fields)) => JsonValue::Object(
            fields
                .fields
                .into_iter()
                .map(|(key, value)| (key, qdrant_value_to_json(value)))
                .collect(),
        ),
    }
}
