//! The graph build algorithm.
//!
//! One invocation of [`build_provenance_graph`] fetches the root entity and
//! its activity record, resolves every contributor through a per-build
//! [`AgentCache`], fans out over the activity's used references, and emits
//! the attribution, generation and usage edges.
//!
//! Failures fetching the root entity or its activity abort the build.
//! Failures resolving a single used reference do not: the reference is
//! logged and skipped, and the rest of the graph is still produced.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use futures::{stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use directory::{DirectoryClient, DirectoryError, Entity};

use crate::graph::{ActivityNode, AgentNode, Edge, EntityNode, EntityRef, ProvenanceGraph};
use crate::ProvenanceError;

/// Bound on concurrent used-entity fetches. `buffered` keeps results in
/// submission order, so the emitted graph is deterministic.
const USED_FETCH_CONCURRENCY: usize = 4;

/// Per-build memoization of agent nodes by user id.
///
/// The first resolution of a user fetches their profile; later resolutions
/// in the same build reuse the node. The cache lives exactly as long as one
/// build and its nodes are drained into the finished graph.
struct AgentCache {
    nodes: HashMap<String, AgentNode>,
}

impl AgentCache {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    async fn resolve(
        &mut self,
        client: &dyn DirectoryClient,
        user_id: &str,
    ) -> Result<&AgentNode, DirectoryError> {
        match self.nodes.entry(user_id.to_string()) {
            Entry::Occupied(entry) => {
                debug!(user_id, "agent cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let profile = client.get_user_profile(user_id).await?;
                Ok(entry.insert(AgentNode {
                    user_id: user_id.to_string(),
                    user_name: profile.user_name,
                    display_name: profile.display_name,
                }))
            }
        }
    }

    fn into_nodes(self) -> impl Iterator<Item = AgentNode> {
        self.nodes.into_values()
    }
}

/// Build the provenance graph rooted at an entity.
///
/// `annotation_keys`, when given, is an allow-list: only those annotation
/// keys are surfaced on entity nodes. Sequence-valued annotations keep only
/// their first element (see [`flatten_annotation_value`]); the entity's
/// display name is always attached as the node label.
pub async fn build_provenance_graph(
    client: &dyn DirectoryClient,
    entity_id: &str,
    version: Option<u64>,
    annotation_keys: Option<&[String]>,
) -> Result<ProvenanceGraph, ProvenanceError> {
    let root = client
        .get_entity(entity_id, version)
        .await
        .map_err(|source| ProvenanceError::RootEntity {
            entity_id: entity_id.to_string(),
            version,
            source,
        })?;
    let activity = client
        .get_provenance_activity(&root)
        .await
        .map_err(|source| ProvenanceError::Activity {
            entity_id: root.id.clone(),
            source,
        })?;

    let mut graph = ProvenanceGraph::new();
    let mut agents = AgentCache::new();

    let root_ref = EntityRef::new(&root.id, root.version_number);
    graph.add_entity(entity_node(root_ref.clone(), &root, annotation_keys));

    // No recorded activity: the graph is just the root entity node.
    if let Some(activity) = activity {
        agents
            .resolve(client, &activity.created_by)
            .await
            .map_err(|source| ProvenanceError::AgentProfile {
                user_id: activity.created_by.clone(),
                source,
            })?;
        graph.add_edge(Edge::WasAttributedTo {
            entity: root_ref.clone(),
            agent: activity.created_by.clone(),
        });

        let targets = validated_references(&activity.id, &activity.used);

        // Fetch each used entity once, bounded fan-out, results in
        // reference order.
        let mut to_fetch = Vec::new();
        let mut seen = HashSet::new();
        for target in &targets {
            if *target == root_ref || !seen.insert(target.clone()) {
                continue;
            }
            to_fetch.push(target.clone());
        }
        let fetched: Vec<(EntityRef, Result<Entity, DirectoryError>)> = stream::iter(to_fetch)
            .map(|target| async move {
                let result = client.get_entity(&target.id, Some(target.version)).await;
                (target, result)
            })
            .buffered(USED_FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut resolved: HashSet<EntityRef> = HashSet::from([root_ref.clone()]);
        for (target, result) in fetched {
            let entity = match result {
                Ok(entity) => entity,
                Err(error) => {
                    // A single bad upstream reference must not abort the
                    // whole graph.
                    warn!(reference = %target, %error, "skipping unresolvable used entity");
                    continue;
                }
            };
            graph.add_entity(entity_node(target.clone(), &entity, annotation_keys));
            agents
                .resolve(client, &entity.created_by)
                .await
                .map_err(|source| ProvenanceError::AgentProfile {
                    user_id: entity.created_by.clone(),
                    source,
                })?;
            graph.add_edge(Edge::WasAttributedTo {
                entity: target.clone(),
                agent: entity.created_by.clone(),
            });
            resolved.insert(target);
        }

        graph.set_activity(ActivityNode {
            id: activity.id.clone(),
            started_at: activity.created_on,
            ended_at: activity.created_on,
        });
        graph.add_edge(Edge::WasGeneratedBy {
            entity: root_ref,
            activity: activity.id.clone(),
        });
        for target in targets {
            if resolved.contains(&target) {
                graph.add_edge(Edge::Used {
                    activity: activity.id.clone(),
                    entity: target,
                });
            }
        }
    }

    for agent in agents.into_nodes() {
        graph.add_agent(agent);
    }
    Ok(graph)
}

/// Extract well-formed `(target id, target version)` pairs from an
/// activity's used records, logging and dropping malformed ones.
fn validated_references(
    activity_id: &str,
    used: &[directory::UsedEntity],
) -> Vec<EntityRef> {
    let mut targets = Vec::new();
    for record in used {
        let Some(reference) = record.reference.as_ref() else {
            warn!(activity_id, "used record carries no reference; skipping");
            continue;
        };
        match (&reference.target_id, reference.target_version_number) {
            (Some(id), Some(version)) => targets.push(EntityRef::new(id, version)),
            (None, _) => {
                warn!(activity_id, "used reference missing target id; skipping");
            }
            (Some(id), None) => {
                warn!(
                    activity_id,
                    target_id = %id,
                    "used reference missing target version; skipping"
                );
            }
        }
    }
    targets
}

/// Build an entity node, applying the allow-list and value flattening.
fn entity_node(
    reference: EntityRef,
    entity: &Entity,
    annotation_keys: Option<&[String]>,
) -> EntityNode {
    let mut annotations = BTreeMap::new();
    for (key, value) in &entity.annotations {
        if let Some(allowed) = annotation_keys {
            if !allowed.iter().any(|k| k == key) {
                continue;
            }
        }
        if let Some(flat) = flatten_annotation_value(value) {
            annotations.insert(key.clone(), flat);
        }
    }
    EntityNode {
        reference,
        label: entity.name.clone(),
        annotations,
    }
}

/// Normalize an annotation value for the graph.
///
/// The service stores annotations as sequences even for single values;
/// only the first element is retained. This is lossy for multi-valued
/// annotations and deliberate. An empty sequence has no first element and
/// yields `None`, dropping the key.
pub fn flatten_annotation_value(value: &Value) -> Option<Value> {
    match value {
        Value::Array(items) => items.first().cloned(),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use directory::MockDirectoryClient;
    use serde_json::json;

    #[test]
    fn test_flatten_takes_first_element() {
        assert_eq!(
            flatten_annotation_value(&json!(["human", "mouse"])),
            Some(json!("human"))
        );
        assert_eq!(flatten_annotation_value(&json!("human")), Some(json!("human")));
        assert_eq!(flatten_annotation_value(&json!(42)), Some(json!(42)));
        assert_eq!(flatten_annotation_value(&json!([])), None);
    }

    #[test]
    fn test_entity_node_filters_and_flattens() {
        let entity = Entity {
            id: "syn123".to_string(),
            name: "My dataset".to_string(),
            version_number: 1,
            created_by: "U1".to_string(),
            annotations: HashMap::from([
                ("species".to_string(), json!(["human", "mouse"])),
                ("samples".to_string(), json!(42)),
                ("internal".to_string(), json!("hidden")),
            ]),
        };
        let allow = vec!["species".to_string(), "samples".to_string(), "absent".to_string()];

        let node = entity_node(EntityRef::new("syn123", 1), &entity, Some(&allow));

        assert_eq!(node.label, "My dataset");
        assert_eq!(
            node.annotations,
            BTreeMap::from([
                ("species".to_string(), json!("human")),
                ("samples".to_string(), json!(42)),
            ])
        );
    }

    #[test]
    fn test_entity_node_without_allow_list_keeps_all_keys() {
        let entity = Entity {
            id: "syn123".to_string(),
            name: "My dataset".to_string(),
            version_number: 1,
            created_by: "U1".to_string(),
            annotations: HashMap::from([
                ("species".to_string(), json!(["human"])),
                ("samples".to_string(), json!(42)),
            ]),
        };

        let node = entity_node(EntityRef::new("syn123", 1), &entity, None);
        assert_eq!(node.annotations.len(), 2);
    }

    #[test]
    fn test_validated_references_drops_malformed() {
        let used = vec![
            directory::UsedEntity {
                reference: Some(directory::UsedReference {
                    target_id: Some("syn100".to_string()),
                    target_version_number: Some(1),
                }),
            },
            directory::UsedEntity {
                reference: Some(directory::UsedReference {
                    target_id: None,
                    target_version_number: Some(1),
                }),
            },
            directory::UsedEntity {
                reference: Some(directory::UsedReference {
                    target_id: Some("syn200".to_string()),
                    target_version_number: None,
                }),
            },
            directory::UsedEntity { reference: None },
        ];

        let targets = validated_references("987", &used);
        assert_eq!(targets, vec![EntityRef::new("syn100", 1)]);
    }

    #[tokio::test]
    async fn test_agent_cache_fetches_once() {
        let client = MockDirectoryClient::new();
        client.register_profile(directory::UserProfile {
            owner_id: "U1".to_string(),
            user_name: "jsmith".to_string(),
            display_name: Some("Jane Smith".to_string()),
        });

        let mut cache = AgentCache::new();
        let node = cache.resolve(&client, "U1").await.unwrap();
        assert_eq!(node.user_name, "jsmith");
        cache.resolve(&client, "U1").await.unwrap();
        cache.resolve(&client, "U1").await.unwrap();

        assert_eq!(client.profile_fetch_count("U1"), 1);
        assert_eq!(cache.into_nodes().count(), 1);
    }

    #[tokio::test]
    async fn test_agent_cache_unknown_user_propagates() {
        let client = MockDirectoryClient::new();
        let mut cache = AgentCache::new();

        let result = cache.resolve(&client, "U404").await;
        assert!(matches!(result, Err(DirectoryError::NotFound(_))));
    }
}
