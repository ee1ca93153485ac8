//! End-to-end pipeline tests: parse a corpus, harvest it, remix programs
//! and check the structural guarantees of the output.

use std::fs;
use std::path::{Path, PathBuf};

use remezclar::ast::{Node, NodeKind};
use remezclar::generate::{remix, Generator};
use remezclar::{corpus, emit, parser, Error};

const INT_FUNCTIONS: &str = "\
def double(n: int) -> int:
    return n * 2

def shift(n: int, amount: int) -> int:
    return n + amount

x = double(3)
y = shift(x, 1)
";

const MAIN_SCRIPT: &str = "\
def describe(count: int) -> str:
    if count > 1:
        return 'many'
    return 'few'

items = [1, 2, 3]
total = 0
for item in items:
    total += item
label = describe(total)
print(label)
";

fn write_corpus(dir: &Path) -> Vec<PathBuf> {
    let files = [("int_functions.py", INT_FUNCTIONS), ("main.py", MAIN_SCRIPT)];
    files
        .iter()
        .map(|(name, contents)| {
            let path = dir.join(name);
            fs::write(&path, contents).unwrap();
            path
        })
        .collect()
}

/// Every kind that appears in the output must also appear in the seed
/// program at the same position; substitutions never change a node's kind.
fn kinds_in(node: &Node, kinds: &mut Vec<NodeKind>) {
    kinds.push(node.kind());
    for child in node.children() {
        kinds_in(child, kinds);
    }
}

#[test]
fn test_corpus_to_generated_source() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let report = corpus::load(dir.path()).unwrap();
    assert_eq!(report.trees.len(), 2);
    assert!(report.syntax_errors.is_empty());

    let inventory = report.harvest();
    let mut generator = Generator::new(&inventory, 42);
    let seed_tree = generator.draw_module().unwrap();
    let source = generator.generate_source(&seed_tree).unwrap();

    // the output must itself be a valid corpus program
    parser::parse(&source).unwrap();
}

#[test]
fn test_generation_is_deterministic_per_seed() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path());

    let first = remix(&paths, 7).unwrap();
    let second = remix(&paths, 7).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_different_seeds_may_diverge_but_stay_valid() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path());

    for seed in 0..8 {
        let source = remix(&paths, seed).unwrap();
        parser::parse(&source).unwrap();
    }
}

#[test]
fn test_root_stays_a_module_and_kinds_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let report = corpus::load(dir.path()).unwrap();
    let inventory = report.harvest();
    let mut generator = Generator::new(&inventory, 11);
    let seed_tree = parser::parse(INT_FUNCTIONS).unwrap();
    let tree = generator.generate(&seed_tree).unwrap();

    assert_eq!(tree.kind(), NodeKind::Module);
    // same top-level statement count and kinds as the seed
    let (Node::Module { body: seed_body }, Node::Module { body }) = (&seed_tree, &tree) else {
        panic!("both trees must be modules");
    };
    assert_eq!(seed_body.len(), body.len());
    for (seed_stmt, stmt) in seed_body.iter().zip(body) {
        assert_eq!(seed_stmt.kind(), stmt.kind());
    }
}

#[test]
fn test_top_level_statement_kinds_match_seed() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let report = corpus::load(dir.path()).unwrap();
    let inventory = report.harvest();
    let mut generator = Generator::new(&inventory, 3);
    let seed_tree = parser::parse(MAIN_SCRIPT).unwrap();
    let tree = generator.generate(&seed_tree).unwrap();

    // a swap replaces a whole subtree, so kind sequences can differ below
    // swapped nodes, but the root statement kinds line up
    let (Node::Module { body: seed_body }, Node::Module { body }) = (&seed_tree, &tree) else {
        panic!("both trees must be modules");
    };
    let seed_kinds: Vec<NodeKind> = seed_body.iter().map(Node::kind).collect();
    let kinds: Vec<NodeKind> = body.iter().map(Node::kind).collect();
    assert_eq!(seed_kinds, kinds);
}

#[test]
fn test_output_reprints_stably() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_corpus(dir.path());

    // print -> parse -> print must be a fixed point
    let source = remix(&paths, 21).unwrap();
    let reparsed = parser::parse(&source).unwrap();
    let reprinted = emit::unparse(&reparsed).unwrap();
    assert_eq!(source, reprinted);
}

#[test]
fn test_generated_tree_stays_statement_structured() {
    let dir = tempfile::tempdir().unwrap();
    write_corpus(dir.path());

    let report = corpus::load(dir.path()).unwrap();
    let inventory = report.harvest();
    let mut generator = Generator::new(&inventory, 13);
    let seed_tree = parser::parse(MAIN_SCRIPT).unwrap();
    let tree = generator.generate(&seed_tree).unwrap();

    let mut kinds = Vec::new();
    kinds_in(&tree, &mut kinds);
    // sanity: the tree is non-trivial and still statement-structured
    assert!(kinds.len() > 5);
    assert!(kinds.contains(&NodeKind::For));
}

#[test]
fn test_empty_directory_is_empty_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let err = corpus::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::EmptyCorpus));
}
