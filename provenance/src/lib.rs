//! # Provenance
//!
//! Builds a provenance graph for a directory entity: which activity
//! generated it, who it is attributed to, and which entities the activity
//! consumed. The resulting graph is [PROV](http://www.w3.org/TR/prov-n/)
//! compatible and can be rendered as PROV-N or PROV-JSON.
//!
//! ## Modules
//!
//! - [`graph`]: node and edge types, the graph itself, and its serializers
//! - [`builder`]: the build algorithm and per-build agent memoization
//!
//! ## Example
//!
//! ```ignore
//! use provenance::{build_provenance_graph, ProvFormat};
//!
//! let graph = build_provenance_graph(&client, "syn123", None, None).await?;
//! println!("{}", graph.to_provn());
//! let json = graph.serialize(ProvFormat::Json)?;
//! ```

pub mod builder;
pub mod graph;

pub use builder::{build_provenance_graph, flatten_annotation_value};
pub use graph::{
    ActivityNode, AgentNode, Edge, EntityNode, EntityRef, ProvFormat, ProvenanceGraph,
};

use directory::DirectoryError;
use thiserror::Error;

/// Errors that abort a graph build.
///
/// Failures fetching the root entity, its activity record, or a
/// contributor's profile are fatal. Failures fetching a used entity are
/// not; those references are skipped and logged by the builder.
#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("failed to fetch root entity {entity_id} (version {version:?}): {source}")]
    RootEntity {
        entity_id: String,
        version: Option<u64>,
        source: DirectoryError,
    },

    #[error("failed to fetch activity for entity {entity_id}: {source}")]
    Activity {
        entity_id: String,
        source: DirectoryError,
    },

    #[error("failed to fetch profile for user {user_id}: {source}")]
    AgentProfile {
        user_id: String,
        source: DirectoryError,
    },

    #[error("failed to serialize provenance graph: {0}")]
    Serialize(#[from] serde_json::Error),
}
