//! Provenance graph model and serializers.
//!
//! The graph is the normalized intermediate form handed to callers: typed
//! nodes held in id-keyed maps, edges in emission order. Node maps double
//! as the dedup sets, so a graph can never hold two entity nodes for the
//! same `(id, version)` or two agent nodes for the same user.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Default namespace prefixes registered on every graph.
const DEFAULT_NAMESPACES: [(&str, &str); 3] = [
    ("entity", "https://www.directory.org/#Entity:"),
    ("user", "https://www.directory.org/#Profile:"),
    ("activity", "activity:"),
];

/// Identity of a versioned entity. The dedup key for entity nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub id: String,
    pub version: u64,
}

impl EntityRef {
    pub fn new(id: impl Into<String>, version: u64) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.version)
    }
}

/// An entity node: a versioned item with its display label and the
/// annotations that survived filtering and flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityNode {
    pub reference: EntityRef,
    pub label: String,
    pub annotations: BTreeMap<String, Value>,
}

/// An agent node: the user credited with creating an entity or recording
/// an activity.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentNode {
    pub user_id: String,
    pub user_name: String,
    pub display_name: Option<String>,
}

/// An activity node. The service records only a snapshot instant, so start
/// and end are always equal.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityNode {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// A directed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edge {
    WasAttributedTo { entity: EntityRef, agent: String },
    WasGeneratedBy { entity: EntityRef, activity: String },
    Used { activity: String, entity: EntityRef },
}

/// Registered serialization formats for [`ProvenanceGraph::serialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvFormat {
    /// PROV-N textual notation.
    Notation,
    /// PROV-JSON.
    Json,
}

/// A complete provenance graph rooted at one entity.
///
/// Built fresh per invocation of the builder and returned as a value;
/// nothing is shared across builds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvenanceGraph {
    namespaces: Vec<(String, String)>,
    entities: BTreeMap<EntityRef, EntityNode>,
    agents: BTreeMap<String, AgentNode>,
    activity: Option<ActivityNode>,
    edges: Vec<Edge>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self {
            namespaces: DEFAULT_NAMESPACES
                .iter()
                .map(|(p, u)| (p.to_string(), u.to_string()))
                .collect(),
            entities: BTreeMap::new(),
            agents: BTreeMap::new(),
            activity: None,
            edges: Vec::new(),
        }
    }

    /// Register an additional namespace emitted in both serializations.
    pub fn add_namespace(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.namespaces.push((prefix.into(), uri.into()));
    }

    /// Insert an entity node. A node already present for the same reference
    /// is kept unchanged.
    pub fn add_entity(&mut self, node: EntityNode) {
        self.entities.entry(node.reference.clone()).or_insert(node);
    }

    pub fn has_entity(&self, reference: &EntityRef) -> bool {
        self.entities.contains_key(reference)
    }

    /// Insert an agent node. A node already present for the same user id is
    /// kept unchanged.
    pub fn add_agent(&mut self, node: AgentNode) {
        self.agents.entry(node.user_id.clone()).or_insert(node);
    }

    pub fn set_activity(&mut self, node: ActivityNode) {
        self.activity = Some(node);
    }

    /// Record an edge, ignoring exact duplicates.
    pub fn add_edge(&mut self, edge: Edge) {
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn entity(&self, reference: &EntityRef) -> Option<&EntityNode> {
        self.entities.get(reference)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityNode> {
        self.entities.values()
    }

    pub fn agent(&self, user_id: &str) -> Option<&AgentNode> {
        self.agents.get(user_id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentNode> {
        self.agents.values()
    }

    pub fn activity(&self) -> Option<&ActivityNode> {
        self.activity.as_ref()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Render the graph in PROV-N textual notation.
    pub fn to_provn(&self) -> String {
        let mut out = String::from("document\n");
        for (prefix, uri) in &self.namespaces {
            out.push_str(&format!("prefix {} <{}>\n", prefix, uri));
        }
        out.push('\n');
        for node in self.entities.values() {
            let mut attrs = vec![format!("prov:label={}", provn_string(&node.label))];
            for (key, value) in &node.annotations {
                attrs.push(format!("entity:{}={}", key, provn_literal(value)));
            }
            out.push_str(&format!(
                "entity({}, [{}])\n",
                entity_qid(&node.reference),
                attrs.join(", ")
            ));
        }
        for node in self.agents.values() {
            let mut attrs = vec![format!("user:userName={}", provn_string(&node.user_name))];
            if let Some(display_name) = &node.display_name {
                attrs.push(format!("user:displayName={}", provn_string(display_name)));
            }
            out.push_str(&format!(
                "agent({}, [{}])\n",
                agent_qid(&node.user_id),
                attrs.join(", ")
            ));
        }
        if let Some(activity) = &self.activity {
            out.push_str(&format!(
                "activity({}, {}, {})\n",
                activity_qid(&activity.id),
                provn_time(&activity.started_at),
                provn_time(&activity.ended_at)
            ));
        }
        for edge in &self.edges {
            let line = match edge {
                Edge::WasAttributedTo { entity, agent } => format!(
                    "wasAttributedTo({}, {})",
                    entity_qid(entity),
                    agent_qid(agent)
                ),
                Edge::WasGeneratedBy { entity, activity } => format!(
                    "wasGeneratedBy({}, {})",
                    entity_qid(entity),
                    activity_qid(activity)
                ),
                Edge::Used { activity, entity } => {
                    format!("used({}, {})", activity_qid(activity), entity_qid(entity))
                }
            };
            out.push_str(&line);
            out.push('\n');
        }
        out.push_str("endDocument\n");
        out
    }

    /// Render the graph as PROV-JSON.
    pub fn to_prov_json(&self) -> Value {
        let mut prefix = Map::new();
        for (p, uri) in &self.namespaces {
            prefix.insert(p.clone(), Value::String(uri.clone()));
        }

        let mut entities = Map::new();
        for node in self.entities.values() {
            let mut attrs = Map::new();
            attrs.insert("prov:label".to_string(), Value::String(node.label.clone()));
            for (key, value) in &node.annotations {
                attrs.insert(format!("entity:{}", key), value.clone());
            }
            entities.insert(entity_qid(&node.reference), Value::Object(attrs));
        }

        let mut agents = Map::new();
        for node in self.agents.values() {
            let mut attrs = Map::new();
            attrs.insert(
                "user:userName".to_string(),
                Value::String(node.user_name.clone()),
            );
            if let Some(display_name) = &node.display_name {
                attrs.insert(
                    "user:displayName".to_string(),
                    Value::String(display_name.clone()),
                );
            }
            agents.insert(agent_qid(&node.user_id), Value::Object(attrs));
        }

        let mut activities = Map::new();
        if let Some(activity) = &self.activity {
            let mut attrs = Map::new();
            attrs.insert(
                "prov:startTime".to_string(),
                Value::String(provn_time(&activity.started_at)),
            );
            attrs.insert(
                "prov:endTime".to_string(),
                Value::String(provn_time(&activity.ended_at)),
            );
            activities.insert(activity_qid(&activity.id), Value::Object(attrs));
        }

        let mut attributions = Map::new();
        let mut generations = Map::new();
        let mut usages = Map::new();
        for (index, edge) in self.edges.iter().enumerate() {
            match edge {
                Edge::WasAttributedTo { entity, agent } => {
                    let mut rel = Map::new();
                    rel.insert("prov:entity".to_string(), Value::String(entity_qid(entity)));
                    rel.insert("prov:agent".to_string(), Value::String(agent_qid(agent)));
                    attributions.insert(format!("_:wAT{}", index), Value::Object(rel));
                }
                Edge::WasGeneratedBy { entity, activity } => {
                    let mut rel = Map::new();
                    rel.insert("prov:entity".to_string(), Value::String(entity_qid(entity)));
                    rel.insert(
                        "prov:activity".to_string(),
                        Value::String(activity_qid(activity)),
                    );
                    generations.insert(format!("_:wGB{}", index), Value::Object(rel));
                }
                Edge::Used { activity, entity } => {
                    let mut rel = Map::new();
                    rel.insert(
                        "prov:activity".to_string(),
                        Value::String(activity_qid(activity)),
                    );
                    rel.insert("prov:entity".to_string(), Value::String(entity_qid(entity)));
                    usages.insert(format!("_:u{}", index), Value::Object(rel));
                }
            }
        }

        let mut document = Map::new();
        document.insert("prefix".to_string(), Value::Object(prefix));
        document.insert("entity".to_string(), Value::Object(entities));
        document.insert("agent".to_string(), Value::Object(agents));
        document.insert("activity".to_string(), Value::Object(activities));
        document.insert("wasAttributedTo".to_string(), Value::Object(attributions));
        document.insert("wasGeneratedBy".to_string(), Value::Object(generations));
        document.insert("used".to_string(), Value::Object(usages));
        Value::Object(document)
    }

    /// Serialize the graph in one of the registered formats.
    pub fn serialize(&self, format: ProvFormat) -> Result<String, serde_json::Error> {
        match format {
            ProvFormat::Notation => Ok(self.to_provn()),
            ProvFormat::Json => serde_json::to_string_pretty(&self.to_prov_json()),
        }
    }
}

impl Default for ProvenanceGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn entity_qid(reference: &EntityRef) -> String {
    format!("entity:{}", reference)
}

fn agent_qid(user_id: &str) -> String {
    format!("user:{}", user_id)
}

fn activity_qid(activity_id: &str) -> String {
    format!("activity:{}", activity_id)
}

fn provn_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn provn_literal(value: &Value) -> String {
    match value {
        Value::String(s) => provn_string(s),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => provn_string(&other.to_string()),
    }
}

fn provn_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
