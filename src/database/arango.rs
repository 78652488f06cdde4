//! Minimal ArangoDB client over the HTTP API.
//!
//! Documents are schemaless JSON; collections are addressed by name through
//! [`ArangoCollection`]. Every call authenticates with basic auth.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_PORT: u16 = 8529;

#[derive(Error, Debug)]
pub enum ArangoError {
    #[error("Failed to connect to ArangoDB at {url}/{db_name}: {reason}")]
    Connection {
        url: String,
        db_name: String,
        reason: String,
    },
    #[error("Failed to create or access collection '{collection}': {reason}")]
    Collection { collection: String, reason: String },
    #[error("Failed to insert item into '{collection}': {reason}")]
    Insert { collection: String, reason: String },
    #[error("Failed to get item '{key}' from '{collection}': {reason}")]
    Get {
        collection: String,
        key: String,
        reason: String,
    },
    #[error("Failed to update item '{key}' in '{collection}': {reason}")]
    Update {
        collection: String,
        key: String,
        reason: String,
    },
    #[error("Failed to delete item '{key}' from '{collection}': {reason}")]
    Delete {
        collection: String,
        key: String,
        reason: String,
    },
    #[error("Failed to execute query: {0}")]
    Query(String),
}

/// A named collection in the structured store.
pub trait DocumentCollection {
    fn collection_name(&self) -> &str;

    fn is_edge_collection(&self) -> bool {
        false
    }
}

/// Adds the default ArangoDB port when `url` has none.
pub fn endpoint(url: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    if parsed.port().is_none() {
        // set_port only fails for cannot-be-a-base URLs, which parse() already rejected for http
        let _ = parsed.set_port(Some(DEFAULT_PORT));
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

async fn failure_reason(response: Response) -> String {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    match body.get("errorMessage").and_then(|m| m.as_str()) {
        Some(message) => format!("{} ({})", message, status),
        None => status.to_string(),
    }
}

#[derive(Clone)]
pub struct ArangoClient {
    http: Client,
    base_url: String,
    db_name: String,
    username: String,
    password: String,
}

impl ArangoClient {
    /// Connects to `db_name` and checks the server answers.
    pub async fn connect(url: &str, username: &str, password: &str, db_name: &str) -> Result<Self, ArangoError> {
        let connection_error = |reason: String| ArangoError::Connection {
            url: url.to_string(),
            db_name: db_name.to_string(),
            reason,
        };

        let base_url = endpoint(url).map_err(|e| connection_error(e.to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| connection_error(e.to_string()))?;

        let client = Self {
            http,
            base_url,
            db_name: db_name.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        };

        let response = client
            .request(Method::GET, "_api/version")
            .send()
            .await
            .map_err(|e| connection_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(connection_error(failure_reason(response).await));
        }

        log::info!("Connected to ArangoDB database {}", client.db_name);
        Ok(client)
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/_db/{}/{}",
            self.base_url,
            urlencoding::encode(&self.db_name),
            path
        );
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool, ArangoError> {
        let collection_error = |reason: String| ArangoError::Collection {
            collection: name.to_string(),
            reason,
        };

        let response = self
            .request(Method::GET, &format!("_api/collection/{}", urlencoding::encode(name)))
            .send()
            .await
            .map_err(|e| collection_error(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(collection_error(failure_reason(response).await)),
        }
    }

    pub async fn create_collection(&self, name: &str, edge: bool) -> Result<(), ArangoError> {
        let collection_error = |reason: String| ArangoError::Collection {
            collection: name.to_string(),
            reason,
        };

        // 2 = document collection, 3 = edge collection
        let kind = if edge { 3 } else { 2 };
        let response = self
            .request(Method::POST, "_api/collection")
            .json(&json!({ "name": name, "type": kind }))
            .send()
            .await
            .map_err(|e| collection_error(e.to_string()))?;

        match response.status() {
            // Duplicate name: someone else created it first
            StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => {
                log::info!("Created collection {}", name);
                Ok(())
            }
            _ => Err(collection_error(failure_reason(response).await)),
        }
    }

    /// Returns a handle to `collection`, creating it if it does not exist.
    pub async fn ensure_collection<C: DocumentCollection + ?Sized>(&self, collection: &C) -> Result<ArangoCollection, ArangoError> {
        let name = collection.collection_name();
        let edge = collection.is_edge_collection();
        if !self.has_collection(name).await? {
            self.create_collection(name, edge).await?;
        }
        Ok(ArangoCollection {
            client: self.clone(),
            name: name.to_string(),
        })
    }

    /// Runs an AQL query and drains every cursor batch.
    pub async fn query(&self, query: &str, bind_vars: Option<Map<String, Value>>, count: bool) -> Result<Vec<Value>, ArangoError> {
        let response = self
            .request(Method::POST, "_api/cursor")
            .json(&json!({
                "query": query,
                "bindVars": bind_vars.unwrap_or_default(),
                "count": count,
            }))
            .send()
            .await
            .map_err(|e| ArangoError::Query(e.to_string()))?;

        let mut batch = Self::cursor_batch(response).await?;
        let mut results = std::mem::take(&mut batch.result);

        while batch.has_more {
            let id = batch
                .id
                .take()
                .ok_or_else(|| ArangoError::Query("cursor has more results but no id".to_string()))?;
            let response = self
                .request(Method::POST, &format!("_api/cursor/{}", urlencoding::encode(&id)))
                .send()
                .await
                .map_err(|e| ArangoError::Query(e.to_string()))?;
            batch = Self::cursor_batch(response).await?;
            results.append(&mut batch.result);
        }

        Ok(results)
    }

    async fn cursor_batch(response: Response) -> Result<CursorBatch, ArangoError> {
        if !response.status().is_success() {
            return Err(ArangoError::Query(failure_reason(response).await));
        }
        let body: Value = response.json().await.map_err(|e| ArangoError::Query(e.to_string()))?;

        Ok(CursorBatch {
            result: body
                .get("result")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default(),
            has_more: body.get("hasMore").and_then(|h| h.as_bool()).unwrap_or(false),
            id: body.get("id").and_then(|i| i.as_str()).map(String::from),
        })
    }
}

struct CursorBatch {
    result: Vec<Value>,
    has_more: bool,
    id: Option<String>,
}

/// Handle to one existing collection.
#[derive(Clone)]
pub struct ArangoCollection {
    client: ArangoClient,
    name: String,
}

impl ArangoCollection {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn document_path(&self, key: Option<&str>) -> String {
        match key {
            Some(key) => format!(
                "_api/document/{}/{}",
                urlencoding::encode(&self.name),
                urlencoding::encode(key)
            ),
            None => format!("_api/document/{}", urlencoding::encode(&self.name)),
        }
    }

    /// Inserts `item`; a `_key` field is used when present. With `return_new`
    /// the stored document is included under `new`.
    pub async fn insert_item(&self, item: &Value, return_new: bool) -> Result<Value, ArangoError> {
        let insert_error = |reason: String| ArangoError::Insert {
            collection: self.name.clone(),
            reason,
        };

        let response = self
            .client
            .request(Method::POST, &self.document_path(None))
            .query(&[("returnNew", return_new)])
            .json(item)
            .send()
            .await
            .map_err(|e| insert_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(insert_error(failure_reason(response).await));
        }
        response.json().await.map_err(|e| insert_error(e.to_string()))
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<Value>, ArangoError> {
        let get_error = |reason: String| ArangoError::Get {
            collection: self.name.clone(),
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .request(Method::GET, &self.document_path(Some(key)))
            .send()
            .await
            .map_err(|e| get_error(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response.json().await.map(Some).map_err(|e| get_error(e.to_string())),
            _ => Err(get_error(failure_reason(response).await)),
        }
    }

    /// Patches only the given attributes; others stay untouched.
    pub async fn update_item(&self, key: &str, updates: &Value) -> Result<Value, ArangoError> {
        let update_error = |reason: String| ArangoError::Update {
            collection: self.name.clone(),
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .request(Method::PATCH, &self.document_path(Some(key)))
            .query(&[("returnNew", true)])
            .json(updates)
            .send()
            .await
            .map_err(|e| update_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(update_error(failure_reason(response).await));
        }
        response.json().await.map_err(|e| update_error(e.to_string()))
    }

    /// Returns false when no document has `key`.
    pub async fn delete_item(&self, key: &str) -> Result<bool, ArangoError> {
        let delete_error = |reason: String| ArangoError::Delete {
            collection: self.name.clone(),
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .request(Method::DELETE, &self.document_path(Some(key)))
            .send()
            .await
            .map_err(|e| delete_error(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(delete_error(failure_reason(response).await)),
        }
    }

    pub async fn find_all(&self, limit: u64, skip: u64) -> Result<Vec<Value>, ArangoError> {
        let mut bind_vars = Map::new();
        bind_vars.insert("@collection".to_string(), json!(self.name));
        bind_vars.insert("skip".to_string(), json!(skip));
        bind_vars.insert("limit".to_string(), json!(limit));

        self.client
            .query("FOR doc IN @@collection LIMIT @skip, @limit RETURN doc", Some(bind_vars), false)
            .await
    }

    pub async fn query(&self, query: &str, bind_vars: Option<Map<String, Value>>, count: bool) -> Result<Vec<Value>, ArangoError> {
        self.client.query(query, bind_vars, count).await
    }
}
