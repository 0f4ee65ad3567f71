//! Flow schemas and their evaluation
//!
//! A [`FlowSchema`] is a tree of namespaces whose leaves are flows. Nodes are
//! reference counted, so one sub-schema can hang off several parents.
//! [`evaluate_schema`] resolves the tree once, at startup, into a flat table
//! keyed by dotted path (`"billing.update_card"`), with the root flow under
//! [`ROOT_FLOW_KEY`].

use crate::error::ConfigError;
use crate::flow::Flow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Key of the root flow in the evaluated table and the state context map
pub const ROOT_FLOW_KEY: &str = "__root__";

/// A schema value: a flow or a nested namespace
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Flow(Arc<Flow>),
    Schema(Arc<FlowSchema>),
}

impl From<Flow> for SchemaNode {
    fn from(flow: Flow) -> Self {
        SchemaNode::Flow(Arc::new(flow))
    }
}

impl From<Arc<Flow>> for SchemaNode {
    fn from(flow: Arc<Flow>) -> Self {
        SchemaNode::Flow(flow)
    }
}

impl From<FlowSchema> for SchemaNode {
    fn from(schema: FlowSchema) -> Self {
        SchemaNode::Schema(Arc::new(schema))
    }
}

impl From<Arc<FlowSchema>> for SchemaNode {
    fn from(schema: Arc<FlowSchema>) -> Self {
        SchemaNode::Schema(schema)
    }
}

/// Named flows and sub-schemas, in insertion order
#[derive(Debug, Clone, Default)]
pub struct FlowSchema {
    entries: Vec<(String, SchemaNode)>,
}

impl FlowSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a schema from key/node pairs
    pub fn from_entries<K, N>(entries: impl IntoIterator<Item = (K, N)>) -> Result<Self, ConfigError>
    where
        K: Into<String>,
        N: Into<SchemaNode>,
    {
        let mut schema = Self::new();
        for (key, node) in entries {
            schema.insert(key, node)?;
        }
        Ok(schema)
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        node: impl Into<SchemaNode>,
    ) -> Result<&mut Self, ConfigError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigError::EmptySchemaKey);
        }
        if self.entries.iter().any(|(existing, _)| *existing == key) {
            return Err(ConfigError::DuplicateSchemaKey(key));
        }
        self.entries.push((key, node.into()));
        Ok(self)
    }

    /// Owned variant of [`FlowSchema::insert`]
    pub fn with(
        mut self,
        key: impl Into<String>,
        node: impl Into<SchemaNode>,
    ) -> Result<Self, ConfigError> {
        self.insert(key, node)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&SchemaNode> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }
}

/// Flat lookup table produced by [`evaluate_schema`]
#[derive(Debug, Clone)]
pub struct EvaluatedSchema {
    flows: HashMap<String, Arc<Flow>>,
}

impl EvaluatedSchema {
    /// Table holding only the root flow
    pub fn root_only(root: Arc<Flow>) -> Result<Self, ConfigError> {
        if root.is_empty() {
            return Err(ConfigError::EmptyFlow {
                path: ROOT_FLOW_KEY.to_string(),
            });
        }
        let mut flows = HashMap::new();
        flows.insert(ROOT_FLOW_KEY.to_string(), root);
        Ok(Self { flows })
    }

    pub fn root(&self) -> Option<&Arc<Flow>> {
        self.flows.get(ROOT_FLOW_KEY)
    }

    pub fn get(&self, path: &str) -> Option<&Arc<Flow>> {
        self.flows.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.flows.contains_key(path)
    }

    /// All flow paths, sorted, including [`ROOT_FLOW_KEY`]
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.flows.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// Flatten `schema` into dotted paths, with `root` under [`ROOT_FLOW_KEY`].
///
/// Fails on empty flows, empty (sub-)schemas and colliding paths. A
/// sub-schema shared between parents is walked once, under the first path
/// that reaches it.
pub fn evaluate_schema(root: Arc<Flow>, schema: &FlowSchema) -> Result<EvaluatedSchema, ConfigError> {
    let mut evaluated = EvaluatedSchema::root_only(root)?;
    let mut visited = HashSet::new();
    visit(schema, None, &mut visited, &mut evaluated.flows)?;
    tracing::debug!(flows = evaluated.len(), "Flow schema evaluated");
    Ok(evaluated)
}

fn visit(
    schema: &FlowSchema,
    prefix: Option<&str>,
    visited: &mut HashSet<*const FlowSchema>,
    flows: &mut HashMap<String, Arc<Flow>>,
) -> Result<(), ConfigError> {
    if !visited.insert(std::ptr::from_ref(schema)) {
        return Ok(());
    }
    if schema.is_empty() {
        return Err(ConfigError::EmptySchema {
            path: prefix.unwrap_or("<top>").to_string(),
        });
    }

    for (key, node) in schema.iter() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key.to_string(),
        };
        match node {
            SchemaNode::Flow(flow) => {
                if flow.is_empty() {
                    return Err(ConfigError::EmptyFlow { path });
                }
                if flows.contains_key(&path) {
                    return Err(ConfigError::DuplicateFlowPath { path });
                }
                flows.insert(path, Arc::clone(flow));
            }
            SchemaNode::Schema(nested) => visit(nested, Some(&path), visited, flows)?,
        }
    }
    Ok(())
}
