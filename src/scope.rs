//! Lexical scope stack maintained during a tree rewrite
//!
//! Frames map identifier names to coarse type tags. Lookup walks from the
//! innermost frame outward, shadowing as it goes. Each frame optionally
//! overrides whether `return` statements are permitted: function bodies set
//! it to true, lambda bodies to false, and every other frame inherits from
//! its parent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Coarse type tag attached to a scope binding
///
/// This is a tag match, not a type system: annotations reduce to their
/// annotation name, unannotated bindings are `Any`, and declaration forms
/// carry a marker for what they declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    /// Unknown or explicitly `Any`
    Any,
    /// Seeded interpreter builtin
    Builtin,
    /// Declared by a `def`
    Function,
    /// Declared by a `class`
    Class,
    /// Concrete annotation name
    Named(String),
}

impl TypeTag {
    /// Build a tag from an annotation name, folding `Any` into [`TypeTag::Any`]
    #[must_use]
    pub fn from_annotation(name: &str) -> Self {
        if name == "Any" {
            Self::Any
        } else {
            Self::Named(name.to_string())
        }
    }
}

/// One lexical frame
#[derive(Debug, Clone, Default)]
pub struct ScopeFrame {
    bindings: BTreeMap<String, TypeTag>,
    /// `Some` overrides the inherited returns-permitted flag
    returns_permitted: Option<bool>,
}

/// Stack of lexical frames, innermost last
///
/// Owned by one transformer run. Frames are pushed and popped around
/// scope-introducing constructs and never shared across branches.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

/// Names seeded into the global frame with the [`TypeTag::Builtin`] tag
const BUILTINS: &[&str] = &[
    "abs", "bool", "dict", "enumerate", "float", "int", "len", "list", "max", "min", "print",
    "range", "set", "sorted", "str", "sum", "tuple", "zip",
];

impl ScopeStack {
    /// A stack holding only the global frame, returns not permitted
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![ScopeFrame {
                bindings: BTreeMap::new(),
                returns_permitted: Some(false),
            }],
        }
    }

    /// A fresh stack with the builtin names bound in the global frame
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut stack = Self::new();
        for name in BUILTINS {
            stack.bind(name, TypeTag::Builtin);
        }
        stack
    }

    /// Push a frame; `returns_permitted` of `None` inherits from the parent
    pub fn push(&mut self, returns_permitted: Option<bool>) {
        self.frames.push(ScopeFrame {
            bindings: BTreeMap::new(),
            returns_permitted,
        });
    }

    /// Pop the innermost frame; the global frame is never popped
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Bind `name` in the innermost frame
    pub fn bind(&mut self, name: &str, tag: TypeTag) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.to_string(), tag);
        }
    }

    /// Bind `name` in the frame enclosing the innermost one
    ///
    /// Used for a function's own name so recursive self-reference resolves
    /// and the binding survives the body frame's pop.
    pub fn bind_enclosing(&mut self, name: &str, tag: TypeTag) {
        let index = self.frames.len().saturating_sub(2);
        if let Some(frame) = self.frames.get_mut(index) {
            frame.bindings.insert(name.to_string(), tag);
        }
    }

    /// Innermost-first lookup
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&TypeTag> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    /// Whether `name` resolves in any frame
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Whether a `return` is currently permitted, per the innermost frame
    /// that sets the flag
    #[must_use]
    pub fn returns_permitted(&self) -> bool {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.returns_permitted)
            .unwrap_or(false)
    }

    /// Number of live frames
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Owned copy of every frame's bindings, outermost first
    #[must_use]
    pub fn snapshot(&self) -> Vec<BTreeMap<String, TypeTag>> {
        self.frames.iter().map(|f| f.bindings.clone()).collect()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let mut stack = ScopeStack::new();
        stack.bind("x", TypeTag::Named("int".to_string()));
        stack.push(None);
        assert_eq!(stack.lookup("x"), Some(&TypeTag::Named("int".to_string())));
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let mut stack = ScopeStack::new();
        stack.bind("x", TypeTag::Named("int".to_string()));
        stack.push(None);
        stack.bind("x", TypeTag::Any);
        assert_eq!(stack.lookup("x"), Some(&TypeTag::Any));
        stack.pop();
        assert_eq!(stack.lookup("x"), Some(&TypeTag::Named("int".to_string())));
    }

    #[test]
    fn test_pop_discards_frame_bindings() {
        let mut stack = ScopeStack::new();
        stack.push(None);
        stack.bind("local", TypeTag::Any);
        stack.pop();
        assert!(!stack.contains("local"));
    }

    #[test]
    fn test_returns_inherited_through_plain_frames() {
        let mut stack = ScopeStack::new();
        assert!(!stack.returns_permitted());
        stack.push(Some(true)); // function body
        stack.push(None); // e.g. a with block inside the function
        assert!(stack.returns_permitted());
        stack.push(Some(false)); // lambda inside the with block
        assert!(!stack.returns_permitted());
        stack.pop();
        assert!(stack.returns_permitted());
    }

    #[test]
    fn test_bind_enclosing_survives_pop() {
        let mut stack = ScopeStack::new();
        stack.push(Some(true));
        stack.bind_enclosing("f", TypeTag::Function);
        assert!(stack.contains("f"));
        stack.pop();
        assert_eq!(stack.lookup("f"), Some(&TypeTag::Function));
    }

    #[test]
    fn test_global_frame_never_popped() {
        let mut stack = ScopeStack::with_builtins();
        stack.pop();
        stack.pop();
        assert!(stack.contains("print"));
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_annotation_tag_folds_any() {
        assert_eq!(TypeTag::from_annotation("Any"), TypeTag::Any);
        assert_eq!(
            TypeTag::from_annotation("int"),
            TypeTag::Named("int".to_string())
        );
    }
}
