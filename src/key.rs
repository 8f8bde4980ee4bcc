//! Composite addressing for catalog entries.
//!
//! Every graph-scoped table in the catalog is addressed by a
//! (graph id, node name, index) triple. The composite form is the table key;
//! the encoded string form exists for diagnostics and audit output only.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier distinguishing one compiled graph instance from another within
/// a process. Repeated compilations of the same model receive fresh ids, so
/// concurrent executions never alias each other's catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphId(pub u32);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a node input or output within a compiled graph.
///
/// Structural equality and hashing make the composite form injective for all
/// field values; table lookups never go through the encoded string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    pub graph: GraphId,
    pub node: String,
    pub index: u32,
}

impl NodeKey {
    pub fn new(graph: GraphId, node: impl Into<String>, index: u32) -> Self {
        NodeKey {
            graph,
            node: node.into(),
            index,
        }
    }

    /// Canonical string form: `<graph>_<node>` when `index` is 0, otherwise
    /// `<graph>_<node>:<index>`.
    ///
    /// Producer and consumer sides derive keys through this one codec, so
    /// they always agree on addressing. Injective only for node names free of
    /// `:`; the source graph format reserves `:` as its output-slot
    /// delimiter, so legal node names never contain it.
    pub fn encode(&self) -> String {
        if self.index == 0 {
            format!("{}_{}", self.graph, self.node)
        } else {
            format!("{}_{}:{}", self.graph, self.node, self.index)
        }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_omits_suffix_for_index_zero() {
        assert_eq!(NodeKey::new(GraphId(7), "foo", 0).encode(), "7_foo");
        assert_eq!(NodeKey::new(GraphId(7), "foo", 2).encode(), "7_foo:2");
    }

    #[test]
    fn encode_is_injective_across_fields() {
        let keys = [
            NodeKey::new(GraphId(1), "A", 0),
            NodeKey::new(GraphId(1), "A", 1),
            NodeKey::new(GraphId(2), "A", 0),
            NodeKey::new(GraphId(1), "B", 0),
            NodeKey::new(GraphId(11), "A", 0),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a.encode(), b.encode(), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn composite_key_disambiguates_colon_names() {
        // The string forms collide here; the composite keys must not.
        let slot_in_name = NodeKey::new(GraphId(1), "A:2", 0);
        let indexed = NodeKey::new(GraphId(1), "A", 2);
        assert_eq!(slot_in_name.encode(), indexed.encode());
        assert_ne!(slot_in_name, indexed);
    }

    #[test]
    fn display_matches_encode() {
        let key = NodeKey::new(GraphId(3), "encap", 4);
        assert_eq!(key.to_string(), key.encode());
    }
}
