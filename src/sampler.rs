//! Candidate sampling from the harvested inventory
//!
//! For every kind the bag zips the kind's field sequences positionally into
//! candidate rows, bounded by the shortest sequence so a misaligned
//! inventory can never pair values across occurrences. Each call to
//! [`ConceptBag::candidates`] re-shuffles the row order with the bag's
//! seeded rng and lazily yields freshly reconstructed nodes: the sequence is
//! finite, exhaustive without replacement, restartable per call, and
//! deterministic for a given seed.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::warn;

use crate::ast::{FieldValue, Node, NodeKind};
use crate::harvest::Inventory;

/// Shuffled, reconstructing candidate source built from an [`Inventory`]
///
/// Candidates are handed out as deep owned copies, so no node is ever
/// shared between the bag and a mutated tree, or between two positions of
/// one tree.
#[derive(Debug)]
pub struct ConceptBag {
    rows: BTreeMap<NodeKind, Vec<Vec<FieldValue>>>,
    rng: StdRng,
}

impl ConceptBag {
    /// Build the candidate rows once from `inventory`, seeding the rng
    #[must_use]
    pub fn new(inventory: &Inventory, seed: u64) -> Self {
        let mut rows = BTreeMap::new();
        for (kind, entry) in inventory.iter() {
            if entry.fields.is_empty() {
                continue;
            }
            let bound = entry.min_len();
            let kind_rows: Vec<Vec<FieldValue>> = (0..bound)
                .map(|i| entry.fields.values().map(|seq| seq[i].clone()).collect())
                .collect();
            rows.insert(kind, kind_rows);
        }
        Self {
            rows,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Number of candidate rows available for `kind`
    #[must_use]
    pub fn row_count(&self, kind: NodeKind) -> usize {
        self.rows.get(&kind).map_or(0, Vec::len)
    }

    /// A fresh shuffled pass over every candidate of `kind`
    ///
    /// Kinds with no harvested rows yield an empty sequence, which the
    /// transformer answers with its keep-the-original fallback.
    pub fn candidates(&mut self, kind: NodeKind) -> Candidates<'_> {
        let mut order: Vec<usize> = (0..self.row_count(kind)).collect();
        order.shuffle(&mut self.rng);
        Candidates {
            kind,
            rows: self.rows.get(&kind).map(Vec::as_slice).unwrap_or(&[]),
            order,
            next: 0,
        }
    }
}

/// Lazy candidate sequence for one kind, in shuffled order
#[derive(Debug)]
pub struct Candidates<'a> {
    kind: NodeKind,
    rows: &'a [Vec<FieldValue>],
    order: Vec<usize>,
    next: usize,
}

impl Iterator for Candidates<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        while self.next < self.order.len() {
            let row = &self.rows[self.order[self.next]];
            self.next += 1;
            match Node::from_fields(self.kind, row.clone()) {
                Some(node) => return Some(node),
                None => {
                    // rows are zipped from same-kind harvests, so a shape
                    // mismatch means the inventory was corrupted
                    warn!(kind = ?self.kind, "dropping malformed inventory row");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::harvest;

    fn name(id: &str) -> Node {
        Node::Name { id: id.to_string() }
    }

    fn sample_corpus() -> Vec<Node> {
        vec![
            Node::Module {
                body: vec![Node::Assign {
                    targets: vec![name("a")],
                    value: Box::new(Node::Constant {
                        value: Literal::Int(1),
                    }),
                }],
            },
            Node::Module {
                body: vec![Node::Assign {
                    targets: vec![name("b")],
                    value: Box::new(Node::Constant {
                        value: Literal::Int(2),
                    }),
                }],
            },
        ]
    }

    #[test]
    fn test_candidates_exhaustive_without_replacement() {
        let inventory = harvest::harvest(&sample_corpus());
        let mut bag = ConceptBag::new(&inventory, 7);
        let drawn: Vec<Node> = bag.candidates(NodeKind::Assign).collect();
        assert_eq!(drawn.len(), 2);
        assert_ne!(drawn[0], drawn[1]);
        for node in &drawn {
            assert_eq!(node.kind(), NodeKind::Assign);
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let inventory = harvest::harvest(&sample_corpus());
        let mut first = ConceptBag::new(&inventory, 42);
        let mut second = ConceptBag::new(&inventory, 42);
        for _ in 0..4 {
            let a: Vec<Node> = first.candidates(NodeKind::Assign).collect();
            let b: Vec<Node> = second.candidates(NodeKind::Assign).collect();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_absent_kind_yields_nothing() {
        let inventory = harvest::harvest(&sample_corpus());
        let mut bag = ConceptBag::new(&inventory, 1);
        assert_eq!(bag.candidates(NodeKind::While).count(), 0);
    }

    #[test]
    fn test_min_length_bounds_misaligned_inventory() {
        // Two assignments, then strip one value from the harvested "value"
        // sequence by merging with a partially-overlapping corpus: the
        // shorter sequence must bound the row count.
        let mut inventory = harvest::harvest(&sample_corpus());
        // simulate misalignment through a raw rebuild: harvest a corpus where
        // one kind appears with unequal field history
        let extra = harvest::harvest_one(&Node::Module {
            body: vec![Node::Assign {
                targets: vec![name("c")],
                value: Box::new(Node::Constant {
                    value: Literal::Int(3),
                }),
            }],
        });
        inventory = harvest::merge([inventory, extra]);
        let bag = ConceptBag::new(&inventory, 1);
        let entry_min = inventory.entry(NodeKind::Assign).unwrap().min_len();
        assert_eq!(bag.row_count(NodeKind::Assign), entry_min);
    }

    #[test]
    fn test_zero_field_kinds_have_no_rows() {
        let inventory = harvest::harvest_one(&Node::Module {
            body: vec![Node::Pass],
        });
        let mut bag = ConceptBag::new(&inventory, 1);
        assert_eq!(bag.candidates(NodeKind::Pass).count(), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Identical seeds induce identical shuffle sequences
            #[test]
            fn prop_seed_determinism(seed in any::<u64>()) {
                let inventory = harvest::harvest(&sample_corpus());
                let mut first = ConceptBag::new(&inventory, seed);
                let mut second = ConceptBag::new(&inventory, seed);
                let a: Vec<Node> = first.candidates(NodeKind::Name).collect();
                let b: Vec<Node> = second.candidates(NodeKind::Name).collect();
                prop_assert_eq!(a, b);
            }

            /// Every pass yields the full candidate set exactly once
            #[test]
            fn prop_exhaustive_per_pass(seed in any::<u64>()) {
                let inventory = harvest::harvest(&sample_corpus());
                let mut bag = ConceptBag::new(&inventory, seed);
                let expected = bag.row_count(NodeKind::Constant);
                let drawn: Vec<Node> = bag.candidates(NodeKind::Constant).collect();
                prop_assert_eq!(drawn.len(), expected);
            }
        }
    }
}
