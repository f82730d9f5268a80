use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, value::Kind, vectors_config::Config,
        vectors_output::VectorsOptions, with_payload_selector::SelectorOptions,
        with_vectors_selector, CollectionExistsRequest, CollectionStatus, Condition, CountPoints,
        CreateCollection, DeleteCollection, Distance, Filter, GetCollectionInfoRequest, PointId,
        PointStruct, ScoredPoint, SearchPoints, Struct, UpsertPoints, Value, VectorParams,
        VectorsConfig, WithPayloadSelector, WithVectorsSelector,
    },
    Qdrant, QdrantError,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::VectorIndexConfig;
use crate::database::qdrant_config::create_qdrant_client;

#[derive(Error, Debug)]
pub enum VectorDBError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Operation failed: {0}")]
    Operation(String),
    #[error("Collection exists: {0}")]
    CollectionExists(String),
    #[error("Index not found: {0}")]
    NotFound(String),
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl VectorDBError {
    /// Whether a retry of the same call can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, VectorDBError::Connection(_) | VectorDBError::Transient(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: u64,
    pub metric: Metric,
}

/// One stored passage: vector, text and flat string metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: HashMap<String, String>,
    /// Position in the write batch; breaks score ties.
    pub seq: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: HashMap<String, String>,
    pub seq: u64,
    pub vector: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions<'a> {
    pub filters: Option<&'a HashMap<String, String>>,
    pub include_vectors: bool,
}

/// Contract against the external vector index service.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>, VectorDBError>;

    async fn index_exists(&self, name: &str) -> Result<bool, VectorDBError>;

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), VectorDBError>;

    async fn is_ready(&self, name: &str) -> Result<bool, VectorDBError>;

    /// Fails with `NotFound` when there is nothing to delete.
    async fn delete_index(&self, name: &str) -> Result<(), VectorDBError>;

    async fn upsert(&self, name: &str, records: Vec<IndexRecord>) -> Result<(), VectorDBError>;

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: u64,
        options: QueryOptions<'_>,
    ) -> Result<Vec<IndexMatch>, VectorDBError>;

    async fn count(&self, name: &str) -> Result<u64, VectorDBError>;
}

const CONTENT_KEY: &str = "content";
const METADATA_KEY: &str = "metadata";
const SEQ_KEY: &str = "seq";

#[derive(Clone)]
pub struct VectorDB {
    client: Arc<Qdrant>,
}

impl VectorDB {
    pub async fn new(config: &VectorIndexConfig) -> Result<Self, VectorDBError> {
        let client = create_qdrant_client(&config.url, config.api_key.as_deref())
            .await
            .map_err(|e| VectorDBError::Connection(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
        })
    }
}

#[async_trait]
impl VectorIndex for VectorDB {
    async fn list_indexes(&self) -> Result<Vec<String>, VectorDBError> {
        let response = self.client.list_collections().await.map_err(classify)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn index_exists(&self, name: &str) -> Result<bool, VectorDBError> {
        self.client
            .collection_exists(CollectionExistsRequest {
                collection_name: name.to_string(),
            })
            .await
            .map_err(classify)
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<(), VectorDBError> {
        let distance = match spec.metric {
            Metric::Cosine => Distance::Cosine,
        };
        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: spec.dimension,
                distance: distance.into(),
                ..Default::default()
            })),
        };

        let create_collection = CreateCollection {
            collection_name: spec.name.clone(),
            vectors_config: Some(vectors_config),
            ..Default::default()
        };

        match self.client.create_collection(create_collection).await {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("already exists") => {
                Err(VectorDBError::CollectionExists(spec.name.clone()))
            }
            Err(e) => Err(classify(e)),
        }
    }

    async fn is_ready(&self, name: &str) -> Result<bool, VectorDBError> {
        let response = self
            .client
            .collection_info(GetCollectionInfoRequest {
                collection_name: name.to_string(),
            })
            .await
            .map_err(classify)?;

        Ok(response
            .result
            .map(|info| info.status == CollectionStatus::Green as i32)
            .unwrap_or(false))
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorDBError> {
        if !self.index_exists(name).await? {
            return Err(VectorDBError::NotFound(name.to_string()));
        }

        self.client
            .delete_collection(DeleteCollection {
                collection_name: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn upsert(&self, name: &str, records: Vec<IndexRecord>) -> Result<(), VectorDBError> {
        let points = records.into_iter().map(to_point).collect::<Vec<_>>();

        let upsert_points = UpsertPoints {
            collection_name: name.to_string(),
            wait: Some(true),
            points,
            ..Default::default()
        };

        self.client
            .upsert_points(upsert_points)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        top_k: u64,
        options: QueryOptions<'_>,
    ) -> Result<Vec<IndexMatch>, VectorDBError> {
        let filter = options.filters.filter(|f| !f.is_empty()).map(|filters| {
            Filter::must(
                filters
                    .iter()
                    .map(|(key, value)| Condition::matches(format!("{METADATA_KEY}.{key}"), value.clone())),
            )
        });

        let request = SearchPoints {
            collection_name: name.to_string(),
            vector: vector.to_vec(),
            limit: top_k,
            filter,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            with_vectors: Some(WithVectorsSelector {
                selector_options: Some(with_vectors_selector::SelectorOptions::Enable(
                    options.include_vectors,
                )),
            }),
            ..Default::default()
        };

        let results = self.client.search_points(request).await.map_err(classify)?;
        Ok(results.result.into_iter().map(from_scored_point).collect())
    }

    async fn count(&self, name: &str) -> Result<u64, VectorDBError> {
        let response = self
            .client
            .count(CountPoints {
                collection_name: name.to_string(),
                exact: Some(true),
                ..Default::default()
            })
            .await
            .map_err(classify)?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }
}

fn classify(err: QdrantError) -> VectorDBError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("not found") || lowered.contains("doesn't exist") {
        VectorDBError::NotFound(message)
    } else if lowered.contains("unavailable")
        || lowered.contains("deadline")
        || lowered.contains("timed out")
        || lowered.contains("connection")
    {
        VectorDBError::Transient(message)
    } else {
        VectorDBError::Operation(message)
    }
}

fn string_value(s: String) -> Value {
    Value {
        kind: Some(Kind::StringValue(s)),
    }
}

fn to_point(record: IndexRecord) -> PointStruct {
    let metadata = Struct {
        fields: record
            .metadata
            .into_iter()
            .map(|(k, v)| (k, string_value(v)))
            .collect(),
    };

    let mut payload = HashMap::new();
    payload.insert(CONTENT_KEY.to_string(), string_value(record.content));
    payload.insert(
        SEQ_KEY.to_string(),
        Value {
            kind: Some(Kind::IntegerValue(record.seq as i64)),
        },
    );
    payload.insert(
        METADATA_KEY.to_string(),
        Value {
            kind: Some(Kind::StructValue(metadata)),
        },
    );

    PointStruct {
        id: Some(PointId {
            point_id_options: Some(PointIdOptions::Uuid(record.id)),
        }),
        vectors: Some(record.vector.into()),
        payload,
    }
}

fn from_scored_point(point: ScoredPoint) -> IndexMatch {
    let id = match point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Uuid(uuid)) => uuid,
        Some(PointIdOptions::Num(num)) => num.to_string(),
        None => String::new(),
    };

    let content = point
        .payload
        .get(CONTENT_KEY)
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let seq = point
        .payload
        .get(SEQ_KEY)
        .and_then(|v| match v.kind {
            Some(Kind::IntegerValue(i)) => Some(i.max(0) as u64),
            _ => None,
        })
        .unwrap_or(0);

    let metadata = match point.payload.get(METADATA_KEY).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StructValue(fields)) => fields
            .fields
            .iter()
            .filter_map(|(k, v)| match &v.kind {
                Some(Kind::StringValue(s)) => Some((k.clone(), s.clone())),
                _ => None,
            })
            .collect(),
        _ => HashMap::new(),
    };

    #[allow(deprecated)]
    let vector = point
        .vectors
        .and_then(|v| v.vectors_options)
        .and_then(|options| match options {
            VectorsOptions::Vector(vector) => Some(vector.data),
            _ => None,
        });

    IndexMatch {
        id,
        score: point.score,
        content,
        metadata,
        seq,
        vector,
    }
}
