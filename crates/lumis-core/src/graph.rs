//! Call graph over stored units, built with best-effort lexical resolution

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::model::{CallEdge, CodeUnit, UnitKey};

/// Maps a raw call-site identifier to a unit identity.
///
/// A target matches a unit when the unit's identity equals it, or ends with
/// `::target`. Among several matches the smallest identity wins. This is
/// lexical matching, not symbol binding:
///
/// * false positives: same-named functions in unrelated files, and calls on
///   receivers of other types (`client.get()` matches any `get`);
/// * false negatives: calls through aliases, function values and imports that
///   rename the callee. Resolution also ignores age, so when a name exists in
///   both a recent and a legacy file and the recent identity sorts first, a
///   recent caller is linked to the recent unit and no legacy conflict is
///   reported for the legacy one.
#[derive(Debug, Default)]
pub struct LexicalResolver {
    by_match: HashMap<String, UnitKey>,
}

impl LexicalResolver {
    pub fn new<'a>(keys: impl IntoIterator<Item = &'a UnitKey>) -> Self {
        let mut by_match: HashMap<String, UnitKey> = HashMap::new();
        let mut offer = |name: &str, key: &UnitKey| {
            by_match
                .entry(name.to_string())
                .and_modify(|current| {
                    if key.identity() < current.identity() {
                        *current = key.clone();
                    }
                })
                .or_insert_with(|| key.clone());
        };

        for key in keys {
            let identity = key.identity();
            offer(&identity, key);
            for (idx, _) in identity.match_indices("::") {
                offer(&identity[idx + 2..], key);
            }
        }

        LexicalResolver { by_match }
    }

    pub fn resolve(&self, target_name: &str) -> Option<&UnitKey> {
        self.by_match.get(target_name)
    }
}

/// A directed graph of units. Edges are stored calls whose target resolved.
pub struct CallGraph {
    inner: StableDiGraph<UnitKey, String>,
    index: HashMap<UnitKey, NodeIndex>,
    unresolved: usize,
}

impl std::fmt::Debug for CallGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGraph")
            .field("node_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .field("unresolved", &self.unresolved)
            .finish()
    }
}

impl CallGraph {
    /// Build from one project's units and stored edges. Edges whose source is
    /// not a known unit, or whose target does not resolve, are counted as
    /// unresolved and left out.
    pub fn build(units: &[CodeUnit], edges: &[CallEdge]) -> Self {
        let mut inner = StableDiGraph::new();
        let mut index = HashMap::with_capacity(units.len());
        for unit in units {
            let idx = inner.add_node(unit.key.clone());
            index.insert(unit.key.clone(), idx);
        }

        let resolver = LexicalResolver::new(units.iter().map(|u| &u.key));
        let mut unresolved = 0;
        for edge in edges {
            let source = index.get(&edge.source);
            let target = resolver
                .resolve(&edge.target_name)
                .and_then(|key| index.get(key));
            match (source, target) {
                (Some(&s), Some(&t)) => {
                    inner.add_edge(s, t, edge.target_name.clone());
                }
                _ => unresolved += 1,
            }
        }

        CallGraph {
            inner,
            index,
            unresolved,
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Number of resolved call edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn unresolved_count(&self) -> usize {
        self.unresolved
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.index.contains_key(key)
    }

    /// Every resolved call as `(caller, callee)`.
    pub fn resolved_calls(&self) -> impl Iterator<Item = (&UnitKey, &UnitKey)> {
        self.inner.edge_indices().filter_map(move |idx| {
            let (s, t) = self.inner.edge_endpoints(idx)?;
            Some((self.inner.node_weight(s)?, self.inner.node_weight(t)?))
        })
    }

    /// Units called by `key`.
    pub fn callees(&self, key: &UnitKey) -> Vec<&UnitKey> {
        self.neighbors(key, Direction::Outgoing)
    }

    /// Units that call `key`.
    pub fn callers(&self, key: &UnitKey) -> Vec<&UnitKey> {
        self.neighbors(key, Direction::Incoming)
    }

    fn neighbors(&self, key: &UnitKey, direction: Direction) -> Vec<&UnitKey> {
        let Some(&idx) = self.index.get(key) else {
            return Vec::new();
        };
        let mut out: Vec<&UnitKey> = self
            .inner
            .edges_directed(idx, direction)
            .filter_map(|edge_ref| {
                let other = match direction {
                    Direction::Outgoing => edge_ref.target(),
                    Direction::Incoming => edge_ref.source(),
                };
                self.inner.node_weight(other)
            })
            .collect();
        out.sort();
        out.dedup();
        out
    }
}
