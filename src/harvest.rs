//! Corpus harvesting into per-kind field inventories
//!
//! Every node of every corpus program contributes the concrete value of each
//! of its fields to that kind's inventory entry. Field sequences are
//! appended independently in traversal order, so for one kind all field
//! sequences grow in lockstep with the occurrence count. Zero-field kinds
//! (`pass`, `break`, `continue`) are recorded as present but carry no data.

use std::collections::BTreeMap;

use crate::ast::{FieldValue, Node, NodeKind};

/// Per-kind entry: field name to the observed value sequence
#[derive(Debug, Clone, Default)]
pub struct KindEntry {
    /// Observed values, one appended per field per occurrence
    pub fields: BTreeMap<&'static str, Vec<FieldValue>>,
    /// How many occurrences of the kind were seen
    pub occurrences: usize,
}

impl KindEntry {
    /// Shortest field sequence length, the defensive pairing bound
    #[must_use]
    pub fn min_len(&self) -> usize {
        self.fields.values().map(Vec::len).min().unwrap_or(0)
    }
}

/// The harvested corpus: kind to field inventories
///
/// Built once per corpus load and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    entries: BTreeMap<NodeKind, KindEntry>,
}

impl Inventory {
    /// Entry for one kind, if any occurrence was harvested
    #[must_use]
    pub fn entry(&self, kind: NodeKind) -> Option<&KindEntry> {
        self.entries.get(&kind)
    }

    /// Iterate entries in kind order
    pub fn iter(&self) -> impl Iterator<Item = (NodeKind, &KindEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    /// Number of kinds with at least one occurrence
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.entries.len()
    }

    fn record(&mut self, node: &Node) {
        let entry = self.entries.entry(node.kind()).or_default();
        entry.occurrences += 1;
        for (name, value) in node.fields() {
            entry.fields.entry(name).or_default().push(value);
        }
    }
}

/// Harvest one parsed program into a fresh inventory
///
/// The walk visits every reachable node exactly once. Kind coverage is
/// enforced by the closed node enumeration, so there is no runtime
/// "unknown kind" path to recover from.
#[must_use]
pub fn harvest_one(program: &Node) -> Inventory {
    let mut inventory = Inventory::default();
    harvest_into(program, &mut inventory);
    inventory
}

fn harvest_into(node: &Node, inventory: &mut Inventory) {
    inventory.record(node);
    for child in node.children() {
        harvest_into(child, inventory);
    }
}

/// Merge per-program inventories by field-wise concatenation in input order
///
/// Kinds absent from an input simply do not contribute. Pure with respect to
/// its inputs; no state is shared between merges.
#[must_use]
pub fn merge(inventories: impl IntoIterator<Item = Inventory>) -> Inventory {
    let mut combined = Inventory::default();
    for inventory in inventories {
        for (kind, entry) in inventory.entries {
            let target = combined.entries.entry(kind).or_default();
            target.occurrences += entry.occurrences;
            for (name, mut values) in entry.fields {
                target.fields.entry(name).or_default().append(&mut values);
            }
        }
    }
    combined
}

/// Harvest a whole corpus into one combined inventory
#[must_use]
pub fn harvest(programs: &[Node]) -> Inventory {
    merge(programs.iter().map(harvest_one))
}
