pub mod arango;
pub mod collections;
pub mod qdrant_config;
pub mod vector_db;

pub use arango::{ArangoClient, ArangoCollection, ArangoError, DocumentCollection};
pub use collections::{all_document_collections, CurriculaCollection};
pub use vector_db::{VectorCollection, VectorDB, VectorDBError};
