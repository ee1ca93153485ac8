//! Free-identifier extraction and return detection
//!
//! Two pure structural queries used by swap validation. Both are total over
//! the closed kind enumeration: the exhaustive matches below are what makes
//! "every kind handled" a compile-time guarantee instead of a runtime check.

use crate::ast::Node;

/// Iteration ceiling for the `contains_return` worklist
///
/// A shared or pathological tree that keeps the worklist alive past this
/// bound is treated as if it contained a return, which is the conservative
/// answer for validation.
const CONTAINS_RETURN_MAX_ITERS: usize = 10_000;

/// Collect the free identifiers referenced by `element`
///
/// "Free" means satisfied by an enclosing scope, not by the element itself:
/// lambda parameters are subtracted from their body, comprehension clauses
/// contribute only their iterable expressions (bound targets and filter
/// clauses are satisfied inside the comprehension), conditional constructs
/// contribute only their tests since their bodies may never run in a way the
/// enclosing scope must satisfy eagerly, and import-style nodes introduce
/// names rather than referencing them.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn free_identifiers(element: &Node) -> Vec<String> {
    match element {
        Node::Name { id } => vec![id.clone()],

        Node::Constant { .. } | Node::Pass | Node::Break | Node::Continue => Vec::new(),

        // Imports introduce new external names, nothing here is "free"
        Node::Import { .. } | Node::ImportFrom { .. } | Node::Alias { .. } => Vec::new(),

        Node::Attribute { value, .. }
        | Node::Subscript { value, .. }
        | Node::Starred { value }
        | Node::Expr { value } => free_identifiers(value),

        // Only the callee position: arguments get their own check in the
        // call-specific validation rule
        Node::Call { func, .. } => free_identifiers(func),

        Node::Lambda { args, body } => {
            let bound = parameter_names(args);
            free_identifiers(body)
                .into_iter()
                .filter(|id| !bound.contains(id))
                .collect()
        }

        Node::If { test, .. } | Node::While { test, .. } | Node::IfExp { test, .. } => {
            free_identifiers(test)
        }

        Node::UnaryOp { operand, .. } => free_identifiers(operand),
        Node::BinOp { left, right, .. } => {
            let mut out = free_identifiers(left);
            out.extend(free_identifiers(right));
            out
        }
        Node::BoolOp { values, .. } => union(values),
        Node::Compare {
            left, comparators, ..
        } => {
            let mut out = free_identifiers(left);
            out.extend(union(comparators));
            out
        }

        Node::Dict { keys, values } => {
            let mut out = union(keys);
            out.extend(union(values));
            out
        }
        Node::Set { elts } | Node::List { elts } | Node::Tuple { elts } => union(elts),

        // Comprehensions: only the iterables of the generator clauses are
        // satisfied by the enclosing scope
        Node::ListComp { generators, .. }
        | Node::SetComp { generators, .. }
        | Node::DictComp { generators, .. }
        | Node::GeneratorExp { generators, .. } => union(generators),
        Node::Comprehension { iter, .. } => free_identifiers(iter),

        Node::Yield { value } | Node::Return { value } => {
            value.as_deref().map(free_identifiers).unwrap_or_default()
        }
        Node::Raise { exc } => exc.as_deref().map(free_identifiers).unwrap_or_default(),

        Node::With { items, body } => {
            let mut out = union(items);
            out.extend(union(body));
            out
        }
        Node::WithItem { context_expr, .. } => free_identifiers(context_expr),

        Node::ClassDef {
            bases,
            decorator_list,
            keywords,
            ..
        } => {
            let mut out = union(bases);
            out.extend(union(decorator_list));
            out.extend(union(keywords));
            out
        }

        Node::FunctionDef {
            args,
            decorator_list,
            ..
        } => {
            let mut out = union(decorator_list);
            out.extend(free_identifiers(args));
            out
        }
        Node::Arguments { args } => union(args),
        Node::Arg { annotation, .. } => annotation
            .as_deref()
            .map(free_identifiers)
            .unwrap_or_default(),

        Node::Keyword { value, .. } => free_identifiers(value),

        Node::Assign { value, .. } => free_identifiers(value),
        Node::AugAssign { target, value, .. } => {
            let mut out = free_identifiers(target);
            out.extend(free_identifiers(value));
            out
        }

        // Handlers, orelse and finalbody run conditionally and are not
        // required eagerly by the enclosing scope
        Node::Try { body, .. } => union(body),
        Node::ExceptHandler { typ, body, .. } => {
            let mut out = typ.as_deref().map(free_identifiers).unwrap_or_default();
            out.extend(union(body));
            out
        }

        Node::Assert { test, .. } => free_identifiers(test),
        Node::For { iter, .. } => free_identifiers(iter),
        Node::Delete { targets } => union(targets),

        Node::Module { body } => union(body),
    }
}

fn union(elements: &[Node]) -> Vec<String> {
    elements.iter().flat_map(free_identifiers).collect()
}

/// Parameter names declared by an `Arguments` node
#[must_use]
pub fn parameter_names(args: &Node) -> Vec<String> {
    match args {
        Node::Arguments { args } => args
            .iter()
            .filter_map(|a| match a {
                Node::Arg { arg, .. } => Some(arg.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Whether a `return` statement is reachable inside `element`
///
/// Statement bodies are explored breadth-first, including nested definition
/// bodies. Exceeding the iteration ceiling answers `true`, the conservative
/// result for validation.
#[must_use]
pub fn contains_return(element: &Node) -> bool {
    use std::collections::VecDeque;

    let mut maybe_contained: VecDeque<&Node> = VecDeque::new();
    maybe_contained.push_back(element);

    for _ in 0..CONTAINS_RETURN_MAX_ITERS {
        let Some(element) = maybe_contained.pop_front() else {
            return false;
        };

        match element {
            Node::Return { .. } => return true,
            // Nested defs are scanned too: a swapped-in def whose body
            // returns counts as introducing a return here
            Node::FunctionDef { body, .. }
            | Node::ClassDef { body, .. }
            | Node::With { body, .. } => {
                maybe_contained.extend(body.iter());
            }
            Node::For { body, orelse, .. }
            | Node::While { body, orelse, .. }
            | Node::If { body, orelse, .. } => {
                maybe_contained.extend(body.iter());
                maybe_contained.extend(orelse.iter());
            }
            Node::Try {
                body,
                orelse,
                finalbody,
                ..
            } => {
                maybe_contained.extend(body.iter());
                maybe_contained.extend(orelse.iter());
                maybe_contained.extend(finalbody.iter());
            }
            Node::Module { body } => maybe_contained.extend(body.iter()),
            _ => {}
        }
    }

    true
}
