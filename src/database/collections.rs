//! Collection identities used by the advisor. Contents are schemaless.

use super::arango::DocumentCollection;
use super::vector_db::VectorCollection;

pub const PROGRAMS: &str = "programs";
pub const COURSES: &str = "courses";
pub const PROFILES: &str = "profiles";
pub const SESSIONS: &str = "sessions";
pub const CURRICULA: &str = "curricula";

/// A plain document collection addressed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedCollection(pub &'static str);

impl DocumentCollection for NamedCollection {
    fn collection_name(&self) -> &str {
        self.0
    }
}

pub fn all_document_collections() -> [NamedCollection; 4] {
    [
        NamedCollection(PROGRAMS),
        NamedCollection(COURSES),
        NamedCollection(PROFILES),
        NamedCollection(SESSIONS),
    ]
}

/// Curriculum passages searched for retrieval context.
#[derive(Debug, Clone, Copy)]
pub struct CurriculaCollection {
    pub vector_size: u64,
}

impl VectorCollection for CurriculaCollection {
    fn collection_name(&self) -> &str {
        CURRICULA
    }

    fn vector_size(&self) -> u64 {
        self.vector_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdrant_client::qdrant::Distance;

    #[test]
    fn four_document_collections() {
        let names: Vec<&str> = all_document_collections()
            .iter()
            .map(|c| c.0)
            .collect();
        assert_eq!(names, vec!["programs", "courses", "profiles", "sessions"]);
        assert!(all_document_collections().iter().all(|c| !c.is_edge_collection()));
    }

    #[test]
    fn curricula_uses_configured_size_and_cosine() {
        let curricula = CurriculaCollection { vector_size: 384 };
        assert_eq!(curricula.collection_name(), "curricula");
        assert_eq!(curricula.vector_size(), 384);
        assert_eq!(curricula.distance(), Distance::Cosine);
    }
}
