//! Corpus loading from Python sources on disk
//!
//! A corpus is a directory tree (or an explicit file list) of `.py` files.
//! Loading parses each file independently: files the parser rejects are
//! recorded with their error and skipped, so one stale script never poisons
//! the harvest. Only a corpus with zero parseable programs is an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::ast::Node;
use crate::error::{Error, Result};
use crate::harvest::{self, Inventory};
use crate::parser;

/// Outcome of loading one corpus
#[derive(Debug)]
pub struct CorpusReport {
    /// Successfully parsed programs, in sorted path order
    pub trees: Vec<Node>,
    /// Files skipped, with the error that rejected each
    pub syntax_errors: Vec<(PathBuf, Error)>,
}

impl CorpusReport {
    /// Harvest every loaded program into one combined inventory
    #[must_use]
    pub fn harvest(&self) -> Inventory {
        harvest::harvest(&self.trees)
    }
}

/// Recursively collect the `.py` paths under `root`, sorted for
/// deterministic harvest order
pub fn discover(root: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    collect(root, &mut paths)?;
    paths.sort();
    Ok(paths)
}

fn collect(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "py") {
            paths.push(path);
        }
    }
    Ok(())
}

/// Load and parse every source file under `root`
pub fn load(root: &Path) -> Result<CorpusReport> {
    load_files(&discover(root)?)
}

/// Load and parse an explicit list of source files
pub fn load_files(paths: &[PathBuf]) -> Result<CorpusReport> {
    let mut trees = Vec::new();
    let mut syntax_errors = Vec::new();
    for path in paths {
        let source = fs::read_to_string(path)?;
        match parser::parse(&source) {
            Ok(tree) => trees.push(tree),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unparseable corpus file");
                syntax_errors.push((path.clone(), err));
            }
        }
    }
    if trees.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    info!(
        programs = trees.len(),
        skipped = syntax_errors.len(),
        "corpus loaded"
    );
    Ok(CorpusReport {
        trees,
        syntax_errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_discover_recurses_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write_file(dir.path(), "b.py", "x = 1\n");
        write_file(&dir.path().join("sub"), "a.py", "y = 2\n");
        write_file(dir.path(), "notes.txt", "not python\n");
        let paths = discover(dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("b.py"));
        assert!(paths[1].ends_with("sub/a.py"));
    }

    #[test]
    fn test_load_skips_and_records_syntax_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "good.py", "x = 1\n");
        write_file(dir.path(), "bad.py", "def broken(:\n");
        let report = load(dir.path()).unwrap();
        assert_eq!(report.trees.len(), 1);
        assert_eq!(report.syntax_errors.len(), 1);
        assert!(report.syntax_errors[0].0.ends_with("bad.py"));
        assert!(matches!(report.syntax_errors[0].1, Error::Syntax { .. }));
    }

    #[test]
    fn test_entirely_unparseable_corpus_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "bad.py", "def broken(:\n");
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyCorpus));
    }

    #[test]
    fn test_report_harvest_combines_programs() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.py", "x = 1\n");
        write_file(dir.path(), "b.py", "y = 2\n");
        let report = load(dir.path()).unwrap();
        let inventory = report.harvest();
        let entry = inventory.entry(crate::ast::NodeKind::Assign).unwrap();
        assert_eq!(entry.occurrences, 2);
    }
}
