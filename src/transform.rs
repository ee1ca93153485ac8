//! Scope-aware randomized substitution
//!
//! The transformer walks a seed program top-down. At each node it draws
//! same-kind candidates from the [`ConceptBag`] in shuffled order and
//! substitutes the first one that validates against the live scope stack;
//! if none validates the original node is kept. It then recurses into the
//! chosen node's children, pushing and popping scope frames exactly as the
//! program's control structure nests lexically.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::ast::{Node, NodeKind};
use crate::error::{Error, Result};
use crate::extract;
use crate::guard;
use crate::sampler::ConceptBag;
use crate::scope::{ScopeStack, TypeTag};

/// Recursion ceiling for the rewrite walk
///
/// Reaching it returns nodes unchanged without recursing further: a safety
/// valve, not an error.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Scope bindings per frame, outermost first
pub type ScopeSnapshot = Vec<std::collections::BTreeMap<String, TypeTag>>;

/// Diagnostics sink owned by one generation run
///
/// Collects the identifier misses seen while rejecting candidates and an
/// ending-scope snapshot per processed node, for inspection in tests and
/// the CLI.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Candidate identifiers rejected because they were not in scope
    pub out_of_scope: BTreeSet<String>,
    /// `(kind, scope at node exit)` in visit-completion order
    pub scope_log: Vec<(NodeKind, ScopeSnapshot)>,
}

impl Diagnostics {
    /// Fresh, empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// One tree-walking rewrite over a seed program
pub struct Transformer<'a> {
    bag: &'a mut ConceptBag,
    diag: &'a mut Diagnostics,
    scope: ScopeStack,
    depth: usize,
    max_depth: usize,
}

impl<'a> Transformer<'a> {
    /// A transformer with a fresh builtin-seeded scope stack
    pub fn new(bag: &'a mut ConceptBag, diag: &'a mut Diagnostics) -> Self {
        Self {
            bag,
            diag,
            scope: ScopeStack::with_builtins(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the recursion ceiling
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rewrite one node and everything below it
    pub fn transform(&mut self, node: Node) -> Result<Node> {
        if self.depth > self.max_depth {
            trace!(kind = ?node.kind(), depth = self.depth, "depth ceiling, node kept");
            return Ok(node);
        }

        let kind = node.kind();
        // the program unit itself is never substituted, only its contents
        let node = if kind == NodeKind::Module {
            node
        } else {
            match self.select_candidate(&node) {
                Some(candidate) => {
                    debug!(kind = ?kind, "substituted node");
                    candidate
                }
                None => node,
            }
        };

        // a swapped parameter is taken whole, its annotation is not
        // re-randomized underneath it
        let result = if kind == NodeKind::Arg {
            node
        } else {
            self.depth += 1;
            let descended = self.descend(node);
            self.depth -= 1;
            descended?
        };

        self.diag.scope_log.push((kind, self.scope.snapshot()));
        Ok(result)
    }

    /// First candidate of the node's kind that validates, if any
    ///
    /// `None` is the defined fallback: keep the original node.
    fn select_candidate(&mut self, node: &Node) -> Option<Node> {
        let mut candidates = self.bag.candidates(node.kind());
        while let Some(candidate) = candidates.next() {
            if valid_swap(&self.scope, self.diag, node, &candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Kind-specific recursion, honoring each kind's scope recipe
    #[allow(clippy::too_many_lines)]
    fn descend(&mut self, node: Node) -> Result<Node> {
        match node {
            Node::FunctionDef {
                name,
                args,
                body,
                decorator_list,
                returns,
            } => {
                self.scope.push(Some(true));
                let decorator_list = self.transform_vec(decorator_list)?;
                let returns = self.transform_opt(returns)?;
                let args = Box::new(self.transform(*args)?);
                self.bind_parameters(&args);
                // the function's own name binds in the enclosing frame so
                // recursive self-reference resolves and the binding
                // survives the body frame
                self.scope.bind_enclosing(&name, TypeTag::Function);
                let body = self.transform_vec(body)?;
                self.scope.pop();
                Ok(Node::FunctionDef {
                    name,
                    args,
                    body,
                    decorator_list,
                    returns,
                })
            }
            Node::Lambda { args, body } => {
                self.scope.push(Some(false));
                let args = Box::new(self.transform(*args)?);
                self.bind_parameters(&args);
                let body = Box::new(self.transform(*body)?);
                self.scope.pop();
                Ok(Node::Lambda { args, body })
            }
            Node::With { items, body } => {
                self.scope.push(None);
                let mut rewritten = Vec::with_capacity(items.len());
                for item in items {
                    let item = self.transform(item)?;
                    if let Node::WithItem {
                        optional_vars: Some(captured),
                        ..
                    } = &item
                    {
                        // only simple-identifier capture is supported
                        if let Node::Name { id } = captured.as_ref() {
                            self.scope.bind(id, TypeTag::Any);
                        }
                    }
                    rewritten.push(item);
                }
                let body = self.transform_vec(body)?;
                self.scope.pop();
                Ok(Node::With {
                    items: rewritten,
                    body,
                })
            }
            Node::WithItem {
                context_expr,
                optional_vars,
            } => {
                // the captured name is a binder, not a reference
                let context_expr = Box::new(self.transform(*context_expr)?);
                Ok(Node::WithItem {
                    context_expr,
                    optional_vars,
                })
            }
            Node::Assign { targets, value } => {
                let value = Box::new(self.transform(*value)?);
                for target in &targets {
                    self.bind_assign_target(target);
                }
                Ok(Node::Assign { targets, value })
            }
            Node::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let iter = Box::new(self.transform(*iter)?);
                self.bind_assign_target(&target);
                let body = self.transform_vec(body)?;
                let orelse = self.transform_vec(orelse)?;
                Ok(Node::For {
                    target,
                    iter,
                    body,
                    orelse,
                })
            }
            Node::ListComp { elt, generators } => {
                self.scope.push(None);
                let generators = self.transform_vec(generators)?;
                let elt = Box::new(self.transform(*elt)?);
                self.scope.pop();
                Ok(Node::ListComp { elt, generators })
            }
            Node::SetComp { elt, generators } => {
                self.scope.push(None);
                let generators = self.transform_vec(generators)?;
                let elt = Box::new(self.transform(*elt)?);
                self.scope.pop();
                Ok(Node::SetComp { elt, generators })
            }
            Node::GeneratorExp { elt, generators } => {
                self.scope.push(None);
                let generators = self.transform_vec(generators)?;
                let elt = Box::new(self.transform(*elt)?);
                self.scope.pop();
                Ok(Node::GeneratorExp { elt, generators })
            }
            Node::DictComp {
                key,
                value,
                generators,
            } => {
                self.scope.push(None);
                let generators = self.transform_vec(generators)?;
                let key = Box::new(self.transform(*key)?);
                let value = Box::new(self.transform(*value)?);
                self.scope.pop();
                Ok(Node::DictComp {
                    key,
                    value,
                    generators,
                })
            }
            Node::Comprehension { target, iter, ifs } => {
                let iter = Box::new(self.transform(*iter)?);
                self.bind_comprehension_target(&target)?;
                let ifs = self.transform_vec(ifs)?;
                Ok(Node::Comprehension { target, iter, ifs })
            }
            Node::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorator_list,
            } => {
                // deliberately no frame for the class body
                let bases = self.transform_vec(bases)?;
                let keywords = self.transform_vec(keywords)?;
                let decorator_list = self.transform_vec(decorator_list)?;
                self.scope.bind(&name, TypeTag::Class);
                let body = self.transform_vec(body)?;
                Ok(Node::ClassDef {
                    name,
                    bases,
                    keywords,
                    body,
                    decorator_list,
                })
            }
            Node::ExceptHandler { typ, name, body } => {
                self.scope.push(None);
                let typ = self.transform_opt(typ)?;
                if let Some(captured) = &name {
                    self.scope.bind(captured, TypeTag::Any);
                }
                let body = self.transform_vec(body)?;
                self.scope.pop();
                Ok(Node::ExceptHandler { typ, name, body })
            }
            other => self.rewrite_children(other),
        }
    }

    /// Generic recursion for kinds without a scope recipe
    fn rewrite_children(&mut self, node: Node) -> Result<Node> {
        use crate::ast::FieldValue;

        let kind = node.kind();
        let fields = node.into_fields();
        let mut values = Vec::with_capacity(fields.len());
        for (_, value) in fields {
            values.push(match value {
                FieldValue::Node(child) => {
                    FieldValue::Node(Box::new(self.transform(*child)?))
                }
                FieldValue::Nodes(children) => {
                    FieldValue::Nodes(self.transform_vec(children)?)
                }
                FieldValue::OptNode(child) => FieldValue::OptNode(self.transform_opt(child)?),
                leaf => leaf,
            });
        }
        Node::from_fields(kind, values).ok_or(Error::Reconstruction { kind })
    }

    fn transform_vec(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>> {
        nodes.into_iter().map(|n| self.transform(n)).collect()
    }

    fn transform_opt(&mut self, node: Option<Box<Node>>) -> Result<Option<Box<Node>>> {
        match node {
            Some(n) => Ok(Some(Box::new(self.transform(*n)?))),
            None => Ok(None),
        }
    }

    /// Bind every declared parameter with its annotation tag, or `Any`
    fn bind_parameters(&mut self, args: &Node) {
        if let Node::Arguments { args } = args {
            for parameter in args {
                if let Node::Arg { arg, annotation } = parameter {
                    self.scope.bind(arg, annotation_tag(annotation.as_deref()));
                }
            }
        }
    }

    /// Assignment-style binding: simple names and one level of tuple or
    /// list destructuring bind as `Any`; complex targets bind nothing
    fn bind_assign_target(&mut self, target: &Node) {
        match target {
            Node::Name { id } => self.scope.bind(id, TypeTag::Any),
            Node::Tuple { elts } | Node::List { elts } => {
                for element in elts {
                    if let Node::Name { id } = element {
                        self.scope.bind(id, TypeTag::Any);
                    }
                }
            }
            Node::Starred { value } => self.bind_assign_target(value),
            _ => {}
        }
    }

    /// Comprehension targets are stricter: anything beyond a simple name or
    /// one level of name destructuring is a hard error, not a guess
    fn bind_comprehension_target(&mut self, target: &Node) -> Result<()> {
        match target {
            Node::Name { id } => {
                self.scope.bind(id, TypeTag::Any);
                Ok(())
            }
            Node::Tuple { elts } | Node::List { elts } => {
                for element in elts {
                    let Node::Name { id } = element else {
                        return Err(Error::ComprehensionTarget(format!("{element:?}")));
                    };
                    self.scope.bind(id, TypeTag::Any);
                }
                Ok(())
            }
            other => Err(Error::ComprehensionTarget(format!("{other:?}"))),
        }
    }
}

/// Validity policy for substituting `candidate` in place of `node`
///
/// Rules short-circuit on the first failure, in the order: structural
/// acyclicity, scope-defining and import exemptions, return placement, then
/// the kind-specific scope and type-tag rules.
#[must_use]
pub fn valid_swap(
    scope: &ScopeStack,
    diag: &mut Diagnostics,
    node: &Node,
    candidate: &Node,
) -> bool {
    if guard::is_cyclic(candidate) {
        return false;
    }

    let kind = node.kind();

    // kinds that define new scope objects are structurally valid as-is
    if matches!(kind, NodeKind::Module | NodeKind::Arguments) {
        return true;
    }

    // import-style declarations introduce new external names; there is
    // nothing yet for them to be out of scope relative to
    if matches!(kind, NodeKind::Import | NodeKind::ImportFrom | NodeKind::Alias) {
        return true;
    }

    if !scope.returns_permitted() && extract::contains_return(candidate) {
        trace!(kind = ?kind, "rejected: introduces return outside function body");
        return false;
    }

    match (node, candidate) {
        (
            Node::Arg { arg, annotation },
            Node::Arg {
                arg: candidate_name,
                annotation: candidate_annotation,
            },
        ) => {
            // `self` has special usage, never swap into or away from it
            if arg == "self" || candidate_name == "self" {
                return false;
            }
            let original = annotation_tag(annotation.as_deref());
            if original == TypeTag::Any {
                return true;
            }
            // strictly equal type swapping, no subtype relaxation
            annotation_tag(candidate_annotation.as_deref()) == original
        }
        (
            Node::Name { id },
            Node::Name {
                id: candidate_id, ..
            },
        ) => {
            if !scope.contains(candidate_id) {
                diag.out_of_scope.insert(candidate_id.clone());
                trace!(candidate = %candidate_id, "rejected: candidate out of scope");
                return false;
            }
            let type_to_match = scope.lookup(id).cloned().unwrap_or(TypeTag::Any);
            type_to_match == TypeTag::Any || scope.lookup(candidate_id) == Some(&type_to_match)
        }
        (
            _,
            Node::Call {
                func,
                args,
                keywords,
            },
        ) => {
            let mut names = extract::free_identifiers(func);
            for arg in args {
                names.extend(extract::free_identifiers(arg));
            }
            for keyword in keywords {
                if let Node::Keyword { value, .. } = keyword {
                    names.extend(extract::free_identifiers(value));
                }
            }
            all_in_scope(scope, diag, names)
        }
        _ => all_in_scope(scope, diag, extract::free_identifiers(candidate)),
    }
}

fn all_in_scope(scope: &ScopeStack, diag: &mut Diagnostics, names: Vec<String>) -> bool {
    for name in names {
        if !scope.contains(&name) {
            diag.out_of_scope.insert(name);
            return false;
        }
    }
    true
}

fn annotation_tag(annotation: Option<&Node>) -> TypeTag {
    match annotation {
        Some(Node::Name { id }) => TypeTag::from_annotation(id),
        // non-name annotations carry no tag the coarse match understands
        Some(_) | None => TypeTag::Any,
    }
}
