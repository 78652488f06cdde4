use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, with_payload_selector::SelectorOptions, Condition,
        CreateCollection, DeletePoints, Distance, Filter, PointId, PointStruct, PointsIdsList,
        PointsSelector, SearchPoints, UpsertPoints, Value, VectorParams, VectorsConfig,
        WithPayloadSelector,
    },
    Qdrant,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::database::qdrant_config::create_qdrant_client;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("No records provided for upsert.")]
    EmptyRecords,
}

/// A point to upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    Num(u64),
    Uuid(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    pub id: RecordId,
    pub payload: HashMap<String, serde_json::Value>,
    pub score: f32,
}

/// A named Qdrant collection with a fixed vector shape.
pub trait VectorCollection {
    fn collection_name(&self) -> &str;

    fn vector_size(&self) -> u64;

    fn distance(&self) -> Distance {
        Distance::Cosine
    }
}

/// Payload filter matching one keyword field.
pub fn field_equals(key: &str, value: &str) -> Filter {
    Filter::must([Condition::matches(key, value.to_string())])
}

fn to_qdrant_payload(payload: HashMap<String, serde_json::Value>) -> HashMap<String, Value> {
    payload.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

pub fn build_points(records: Vec<VectorRecord>) -> Result<Vec<PointStruct>, VectorDBError> {
    if records.is_empty() {
        return Err(VectorDBError::EmptyRecords);
    }

    Ok(records
        .into_iter()
        .map(|rec| PointStruct {
            id: Some(PointId::from(rec.id)),
            vectors: Some(rec.vector.into()),
            payload: to_qdrant_payload(rec.payload),
        })
        .collect())
}

#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
}

impl VectorDB {
    pub async fn new(url: &str) -> Result<Self, VectorDBError> {
        let client = create_qdrant_client(url).await?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool, VectorDBError> {
        let response = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;
        Ok(response.collections.iter().any(|c| c.name == name))
    }

    pub async fn create_collection(&self, name: &str, vector_size: u64) -> Result<(), VectorDBError> {
        self.create_collection_with(name, vector_size, Distance::Cosine).await
    }

    pub async fn create_collection_with(
        &self,
        name: &str,
        vector_size: u64,
        distance: Distance,
    ) -> Result<(), VectorDBError> {
        if self.collection_exists(name).await? {
            log::info!("Collection {} already exists, skipping creation", name);
            return Ok(());
        }

        let vectors_config = VectorParams {
            size: vector_size,
            distance: distance.into(),
            ..Default::default()
        };

        let create_collection = CreateCollection {
            collection_name: name.to_string(),
            vectors_config: Some(VectorsConfig {
                config: Some(qdrant_client::qdrant::vectors_config::Config::Params(vectors_config)),
            }),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => {
                log::info!("Created collection {} ({} dims)", name, vector_size);
                Ok(())
            }
            // Lost a race with another creator
            Err(e) if e.to_string().contains("already exists") => Ok(()),
            Err(e) => Err(VectorDBError::Operation(format!(
                "Failed to create collection '{}': {}",
                name, e
            ))),
        }
    }

    pub async fn ensure_collection<C: VectorCollection + ?Sized>(&self, collection: &C) -> Result<(), VectorDBError> {
        self.create_collection_with(collection.collection_name(), collection.vector_size(), collection.distance())
            .await
    }

    pub async fn add_records(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), VectorDBError> {
        let points = build_points(records)?;
        let count = points.len();

        let upsert_points = UpsertPoints {
            collection_name: collection.to_string(),
            points,
            ..Default::default()
        };

        self.client.upsert_points(upsert_points).await.map_err(|e| {
            VectorDBError::Operation(format!("Failed to upsert records into '{}': {}", collection, e))
        })?;

        log::debug!("Upserted {} points into {}", count, collection);
        Ok(())
    }

    pub async fn store_vector(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: HashMap<String, serde_json::Value>,
    ) -> Result<String, VectorDBError> {
        let point_id = Uuid::new_v4().to_string();

        let point = PointStruct {
            id: Some(PointId {
                point_id_options: Some(PointIdOptions::Uuid(point_id.clone())),
            }),
            vectors: Some(vector.into()),
            payload: to_qdrant_payload(payload),
        };

        let upsert_points = UpsertPoints {
            collection_name: collection.to_string(),
            points: vec![point],
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_points)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        Ok(point_id)
    }

    /// Nearest neighbours of `query_vector`; with a threshold only points
    /// scoring at or above it are returned.
    pub async fn search(
        &self,
        collection: &str,
        query_vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredRecord>, VectorDBError> {
        let request = SearchPoints {
            collection_name: collection.to_string(),
            vector: query_vector,
            limit,
            filter,
            score_threshold,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let results = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorDBError::Operation(format!("Search in '{}' failed: {}", collection, e)))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let id = match point.id.and_then(|id| id.point_id_options) {
                    Some(PointIdOptions::Num(n)) => RecordId::Num(n),
                    Some(PointIdOptions::Uuid(uuid)) => RecordId::Uuid(uuid),
                    None => RecordId::Uuid(String::new()),
                };
                let payload = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect();
                ScoredRecord {
                    id,
                    payload,
                    score: point.score,
                }
            })
            .collect())
    }

    pub async fn delete_vectors(&self, collection: &str, ids: Vec<RecordId>) -> Result<(), VectorDBError> {
        let ids = ids
            .into_iter()
            .map(|id| match id {
                RecordId::Num(n) => PointId::from(n),
                RecordId::Uuid(uuid) => PointId {
                    point_id_options: Some(PointIdOptions::Uuid(uuid)),
                },
            })
            .collect::<Vec<_>>();

        let points_selector = PointsSelector {
            points_selector_one_of: Some(
                qdrant_client::qdrant::points_selector::PointsSelectorOneOf::Points(PointsIdsList { ids }),
            ),
        };

        let delete_points = DeletePoints {
            collection_name: collection.to_string(),
            points: Some(points_selector),
            ..Default::default()
        };

        self.client
            .delete_points(delete_points)
            .await
            .map_err(|e| VectorDBError::Operation(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_record_batches_are_rejected() {
        assert!(matches!(build_points(Vec::new()), Err(VectorDBError::EmptyRecords)));
    }

    #[test]
    fn records_become_numbered_points() {
        let mut payload = HashMap::new();
        payload.insert("text".to_string(), json!("Module handbook"));
        let points = build_points(vec![VectorRecord {
            id: 42,
            vector: vec![0.1, 0.2],
            payload,
        }])
        .unwrap();

        assert_eq!(points.len(), 1);
        let id = points[0].id.clone().and_then(|id| id.point_id_options);
        assert_eq!(id, Some(PointIdOptions::Num(42)));
        assert!(points[0].payload.contains_key("text"));
    }

    #[test]
    fn record_ids_serialize_untagged() {
        assert_eq!(serde_json::to_value(RecordId::Num(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(RecordId::Uuid("a-b".to_string())).unwrap(), json!("a-b"));
    }
}
