//! Field-wise decomposition and reconstruction of nodes
//!
//! Harvesting stores the concrete value of every field of every node
//! occurrence, per kind and per field. [`Node::into_fields`] flattens a node
//! into `(field name, value)` pairs in a canonical order (sorted by field
//! name, matching the sorted batches the inventory is zipped from) and
//! [`Node::from_fields`] rebuilds a node of a given kind from values in that
//! same order. The two are exact inverses for every kind.

use serde::{Deserialize, Serialize};

use super::{BinaryOp, BoolOpKind, CompareOp, Literal, Node, NodeKind, UnaryOpKind};

/// A single harvested field value
///
/// Fields hold either child nodes, leaf text, a literal, or an operator tag.
/// Operator tags are opaque to harvesting: they are carried whole, never
/// explored as children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// A single child node
    Node(Box<Node>),
    /// An ordered list of child nodes
    Nodes(Vec<Node>),
    /// An optional child node
    OptNode(Option<Box<Node>>),
    /// Identifier text
    Ident(String),
    /// Optional identifier text
    OptIdent(Option<String>),
    /// A literal value
    Literal(Literal),
    /// A binary operator tag
    Bin(BinaryOp),
    /// A boolean operator tag
    Bool(BoolOpKind),
    /// A unary operator tag
    Unary(UnaryOpKind),
    /// The operator-tag list of a chained comparison
    Cmps(Vec<CompareOp>),
}

type Fields = Vec<(&'static str, FieldValue)>;

fn one(n: Box<Node>) -> FieldValue {
    FieldValue::Node(n)
}

impl Node {
    /// Decompose into `(field name, value)` pairs in canonical order
    ///
    /// Zero-field kinds return an empty list.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn into_fields(self) -> Fields {
        use FieldValue as F;
        match self {
            Self::Module { body } => vec![("body", F::Nodes(body))],
            Self::FunctionDef {
                name,
                args,
                body,
                decorator_list,
                returns,
            } => vec![
                ("args", one(args)),
                ("body", F::Nodes(body)),
                ("decorator_list", F::Nodes(decorator_list)),
                ("name", F::Ident(name)),
                ("returns", F::OptNode(returns)),
            ],
            Self::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorator_list,
            } => vec![
                ("bases", F::Nodes(bases)),
                ("body", F::Nodes(body)),
                ("decorator_list", F::Nodes(decorator_list)),
                ("keywords", F::Nodes(keywords)),
                ("name", F::Ident(name)),
            ],
            Self::Return { value } => vec![("value", F::OptNode(value))],
            Self::Delete { targets } => vec![("targets", F::Nodes(targets))],
            Self::Assign { targets, value } => vec![
                ("targets", F::Nodes(targets)),
                ("value", one(value)),
            ],
            Self::AugAssign { target, op, value } => vec![
                ("op", F::Bin(op)),
                ("target", one(target)),
                ("value", one(value)),
            ],
            Self::For {
                target,
                iter,
                body,
                orelse,
            } => vec![
                ("body", F::Nodes(body)),
                ("iter", one(iter)),
                ("orelse", F::Nodes(orelse)),
                ("target", one(target)),
            ],
            Self::While { test, body, orelse } => vec![
                ("body", F::Nodes(body)),
                ("orelse", F::Nodes(orelse)),
                ("test", one(test)),
            ],
            Self::If { test, body, orelse } => vec![
                ("body", F::Nodes(body)),
                ("orelse", F::Nodes(orelse)),
                ("test", one(test)),
            ],
            Self::With { items, body } => vec![
                ("body", F::Nodes(body)),
                ("items", F::Nodes(items)),
            ],
            Self::Raise { exc } => vec![("exc", F::OptNode(exc))],
            Self::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => vec![
                ("body", F::Nodes(body)),
                ("finalbody", F::Nodes(finalbody)),
                ("handlers", F::Nodes(handlers)),
                ("orelse", F::Nodes(orelse)),
            ],
            Self::Assert { test, msg } => vec![
                ("msg", F::OptNode(msg)),
                ("test", one(test)),
            ],
            Self::Import { names } => vec![("names", F::Nodes(names))],
            Self::ImportFrom { module, names } => vec![
                ("module", F::OptIdent(module)),
                ("names", F::Nodes(names)),
            ],
            Self::Expr { value } => vec![("value", one(value))],
            Self::Pass | Self::Break | Self::Continue => Vec::new(),
            Self::BoolOp { op, values } => vec![
                ("op", F::Bool(op)),
                ("values", F::Nodes(values)),
            ],
            Self::BinOp { left, op, right } => vec![
                ("left", one(left)),
                ("op", F::Bin(op)),
                ("right", one(right)),
            ],
            Self::UnaryOp { op, operand } => vec![
                ("op", F::Unary(op)),
                ("operand", one(operand)),
            ],
            Self::Lambda { args, body } => vec![("args", one(args)), ("body", one(body))],
            Self::IfExp { test, body, orelse } => vec![
                ("body", one(body)),
                ("orelse", one(orelse)),
                ("test", one(test)),
            ],
            Self::Dict { keys, values } => vec![
                ("keys", F::Nodes(keys)),
                ("values", F::Nodes(values)),
            ],
            Self::Set { elts } => vec![("elts", F::Nodes(elts))],
            Self::ListComp { elt, generators } => vec![
                ("elt", one(elt)),
                ("generators", F::Nodes(generators)),
            ],
            Self::SetComp { elt, generators } => vec![
                ("elt", one(elt)),
                ("generators", F::Nodes(generators)),
            ],
            Self::DictComp {
                key,
                value,
                generators,
            } => vec![
                ("generators", F::Nodes(generators)),
                ("key", one(key)),
                ("value", one(value)),
            ],
            Self::GeneratorExp { elt, generators } => vec![
                ("elt", one(elt)),
                ("generators", F::Nodes(generators)),
            ],
            Self::Yield { value } => vec![("value", F::OptNode(value))],
            Self::Compare {
                left,
                ops,
                comparators,
            } => vec![
                ("comparators", F::Nodes(comparators)),
                ("left", one(left)),
                ("ops", F::Cmps(ops)),
            ],
            Self::Call {
                func,
                args,
                keywords,
            } => vec![
                ("args", F::Nodes(args)),
                ("func", one(func)),
                ("keywords", F::Nodes(keywords)),
            ],
            Self::Constant { value } => vec![("value", F::Literal(value))],
            Self::Attribute { value, attr } => vec![
                ("attr", F::Ident(attr)),
                ("value", one(value)),
            ],
            Self::Subscript { value, index } => vec![
                ("index", one(index)),
                ("value", one(value)),
            ],
            Self::Starred { value } => vec![("value", one(value))],
            Self::Name { id } => vec![("id", F::Ident(id))],
            Self::List { elts } => vec![("elts", F::Nodes(elts))],
            Self::Tuple { elts } => vec![("elts", F::Nodes(elts))],
            Self::Arguments { args } => vec![("args", F::Nodes(args))],
            Self::Arg { arg, annotation } => vec![
                ("annotation", F::OptNode(annotation)),
                ("arg", F::Ident(arg)),
            ],
            Self::Keyword { arg, value } => vec![
                ("arg", F::OptIdent(arg)),
                ("value", one(value)),
            ],
            Self::Alias { name, asname } => vec![
                ("asname", F::OptIdent(asname)),
                ("name", F::Ident(name)),
            ],
            Self::Comprehension { target, iter, ifs } => vec![
                ("ifs", F::Nodes(ifs)),
                ("iter", one(iter)),
                ("target", one(target)),
            ],
            Self::WithItem {
                context_expr,
                optional_vars,
            } => vec![
                ("context_expr", one(context_expr)),
                ("optional_vars", F::OptNode(optional_vars)),
            ],
            Self::ExceptHandler { typ, name, body } => vec![
                ("body", F::Nodes(body)),
                ("name", F::OptIdent(name)),
                ("type", F::OptNode(typ)),
            ],
        }
    }

    /// Clone-based view of [`Node::into_fields`]
    #[must_use]
    pub fn fields(&self) -> Fields {
        self.clone().into_fields()
    }

    /// Rebuild a node of `kind` from field values in canonical order
    ///
    /// Returns `None` if the values do not match the kind's field shapes,
    /// which cannot happen for rows zipped from same-kind harvests.
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_fields(kind: NodeKind, values: Vec<FieldValue>) -> Option<Node> {
        let mut it = values.into_iter();
        let node = match kind {
            NodeKind::Module => Node::Module { body: nodes(&mut it)? },
            NodeKind::FunctionDef => {
                let args = node(&mut it)?;
                let body = nodes(&mut it)?;
                let decorator_list = nodes(&mut it)?;
                let name = ident(&mut it)?;
                let returns = opt_node(&mut it)?;
                Node::FunctionDef {
                    name,
                    args,
                    body,
                    decorator_list,
                    returns,
                }
            }
            NodeKind::ClassDef => {
                let bases = nodes(&mut it)?;
                let body = nodes(&mut it)?;
                let decorator_list = nodes(&mut it)?;
                let keywords = nodes(&mut it)?;
                let name = ident(&mut it)?;
                Node::ClassDef {
                    name,
                    bases,
                    keywords,
                    body,
                    decorator_list,
                }
            }
            NodeKind::Return => Node::Return {
                value: opt_node(&mut it)?,
            },
            NodeKind::Delete => Node::Delete {
                targets: nodes(&mut it)?,
            },
            NodeKind::Assign => Node::Assign {
                targets: nodes(&mut it)?,
                value: node(&mut it)?,
            },
            NodeKind::AugAssign => {
                let op = bin(&mut it)?;
                let target = node(&mut it)?;
                let value = node(&mut it)?;
                Node::AugAssign { target, op, value }
            }
            NodeKind::For => {
                let body = nodes(&mut it)?;
                let iter = node(&mut it)?;
                let orelse = nodes(&mut it)?;
                let target = node(&mut it)?;
                Node::For {
                    target,
                    iter,
                    body,
                    orelse,
                }
            }
            NodeKind::While => {
                let body = nodes(&mut it)?;
                let orelse = nodes(&mut it)?;
                let test = node(&mut it)?;
                Node::While { test, body, orelse }
            }
            NodeKind::If => {
                let body = nodes(&mut it)?;
                let orelse = nodes(&mut it)?;
                let test = node(&mut it)?;
                Node::If { test, body, orelse }
            }
            NodeKind::With => {
                let body = nodes(&mut it)?;
                let items = nodes(&mut it)?;
                Node::With { items, body }
            }
            NodeKind::Raise => Node::Raise {
                exc: opt_node(&mut it)?,
            },
            NodeKind::Try => {
                let body = nodes(&mut it)?;
                let finalbody = nodes(&mut it)?;
                let handlers = nodes(&mut it)?;
                let orelse = nodes(&mut it)?;
                Node::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                }
            }
            NodeKind::Assert => {
                let msg = opt_node(&mut it)?;
                let test = node(&mut it)?;
                Node::Assert { test, msg }
            }
            NodeKind::Import => Node::Import {
                names: nodes(&mut it)?,
            },
            NodeKind::ImportFrom => {
                let module = opt_ident(&mut it)?;
                let names = nodes(&mut it)?;
                Node::ImportFrom { module, names }
            }
            NodeKind::Expr => Node::Expr {
                value: node(&mut it)?,
            },
            NodeKind::Pass => Node::Pass,
            NodeKind::Break => Node::Break,
            NodeKind::Continue => Node::Continue,
            NodeKind::BoolOp => {
                let op = boolk(&mut it)?;
                let values = nodes(&mut it)?;
                Node::BoolOp { op, values }
            }
            NodeKind::BinOp => {
                let left = node(&mut it)?;
                let op = bin(&mut it)?;
                let right = node(&mut it)?;
                Node::BinOp { left, op, right }
            }
            NodeKind::UnaryOp => {
                let op = unary(&mut it)?;
                let operand = node(&mut it)?;
                Node::UnaryOp { op, operand }
            }
            NodeKind::Lambda => {
                let args = node(&mut it)?;
                let body = node(&mut it)?;
                Node::Lambda { args, body }
            }
            NodeKind::IfExp => {
                let body = node(&mut it)?;
                let orelse = node(&mut it)?;
                let test = node(&mut it)?;
                Node::IfExp { test, body, orelse }
            }
            NodeKind::Dict => {
                let keys = nodes(&mut it)?;
                let values = nodes(&mut it)?;
                Node::Dict { keys, values }
            }
            NodeKind::Set => Node::Set {
                elts: nodes(&mut it)?,
            },
            NodeKind::ListComp => {
                let elt = node(&mut it)?;
                let generators = nodes(&mut it)?;
                Node::ListComp { elt, generators }
            }
            NodeKind::SetComp => {
                let elt = node(&mut it)?;
                let generators = nodes(&mut it)?;
                Node::SetComp { elt, generators }
            }
            NodeKind::DictComp => {
                let generators = nodes(&mut it)?;
                let key = node(&mut it)?;
                let value = node(&mut it)?;
                Node::DictComp {
                    key,
                    value,
                    generators,
                }
            }
            NodeKind::GeneratorExp => {
                let elt = node(&mut it)?;
                let generators = nodes(&mut it)?;
                Node::GeneratorExp { elt, generators }
            }
            NodeKind::Yield => Node::Yield {
                value: opt_node(&mut it)?,
            },
            NodeKind::Compare => {
                let comparators = nodes(&mut it)?;
                let left = node(&mut it)?;
                let ops = cmps(&mut it)?;
                Node::Compare {
                    left,
                    ops,
                    comparators,
                }
            }
            NodeKind::Call => {
                let args = nodes(&mut it)?;
                let func = node(&mut it)?;
                let keywords = nodes(&mut it)?;
                Node::Call {
                    func,
                    args,
                    keywords,
                }
            }
            NodeKind::Constant => Node::Constant {
                value: literal(&mut it)?,
            },
            NodeKind::Attribute => {
                let attr = ident(&mut it)?;
                let value = node(&mut it)?;
                Node::Attribute { value, attr }
            }
            NodeKind::Subscript => {
                let index = node(&mut it)?;
                let value = node(&mut it)?;
                Node::Subscript { value, index }
            }
            NodeKind::Starred => Node::Starred {
                value: node(&mut it)?,
            },
            NodeKind::Name => Node::Name { id: ident(&mut it)? },
            NodeKind::List => Node::List {
                elts: nodes(&mut it)?,
            },
            NodeKind::Tuple => Node::Tuple {
                elts: nodes(&mut it)?,
            },
            NodeKind::Arguments => Node::Arguments {
                args: nodes(&mut it)?,
            },
            NodeKind::Arg => {
                let annotation = opt_node(&mut it)?;
                let arg = ident(&mut it)?;
                Node::Arg { arg, annotation }
            }
            NodeKind::Keyword => {
                let arg = opt_ident(&mut it)?;
                let value = node(&mut it)?;
                Node::Keyword { arg, value }
            }
            NodeKind::Alias => {
                let asname = opt_ident(&mut it)?;
                let name = ident(&mut it)?;
                Node::Alias { name, asname }
            }
            NodeKind::Comprehension => {
                let ifs = nodes(&mut it)?;
                let iter = node(&mut it)?;
                let target = node(&mut it)?;
                Node::Comprehension { target, iter, ifs }
            }
            NodeKind::WithItem => {
                let context_expr = node(&mut it)?;
                let optional_vars = opt_node(&mut it)?;
                Node::WithItem {
                    context_expr,
                    optional_vars,
                }
            }
            NodeKind::ExceptHandler => {
                let body = nodes(&mut it)?;
                let name = opt_ident(&mut it)?;
                let typ = opt_node(&mut it)?;
                Node::ExceptHandler { typ, name, body }
            }
        };
        if it.next().is_some() {
            return None;
        }
        Some(node)
    }
}

type FieldIter = std::vec::IntoIter<FieldValue>;

fn node(it: &mut FieldIter) -> Option<Box<Node>> {
    match it.next()? {
        FieldValue::Node(n) => Some(n),
        _ => None,
    }
}

fn nodes(it: &mut FieldIter) -> Option<Vec<Node>> {
    match it.next()? {
        FieldValue::Nodes(ns) => Some(ns),
        _ => None,
    }
}

fn opt_node(it: &mut FieldIter) -> Option<Option<Box<Node>>> {
    match it.next()? {
        FieldValue::OptNode(o) => Some(o),
        _ => None,
    }
}

fn ident(it: &mut FieldIter) -> Option<String> {
    match it.next()? {
        FieldValue::Ident(s) => Some(s),
        _ => None,
    }
}

fn opt_ident(it: &mut FieldIter) -> Option<Option<String>> {
    match it.next()? {
        FieldValue::OptIdent(o) => Some(o),
        _ => None,
    }
}

fn literal(it: &mut FieldIter) -> Option<Literal> {
    match it.next()? {
        FieldValue::Literal(l) => Some(l),
        _ => None,
    }
}

fn bin(it: &mut FieldIter) -> Option<BinaryOp> {
    match it.next()? {
        FieldValue::Bin(op) => Some(op),
        _ => None,
    }
}

fn boolk(it: &mut FieldIter) -> Option<BoolOpKind> {
    match it.next()? {
        FieldValue::Bool(op) => Some(op),
        _ => None,
    }
}

fn unary(it: &mut FieldIter) -> Option<UnaryOpKind> {
    match it.next()? {
        FieldValue::Unary(op) => Some(op),
        _ => None,
    }
}

fn cmps(it: &mut FieldIter) -> Option<Vec<CompareOp>> {
    match it.next()? {
        FieldValue::Cmps(ops) => Some(ops),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(id: &str) -> Node {
        Node::Name { id: id.to_string() }
    }

    fn roundtrip(node: Node) {
        let kind = node.kind();
        let values: Vec<FieldValue> =
            node.clone().into_fields().into_iter().map(|(_, v)| v).collect();
        let rebuilt = Node::from_fields(kind, values).unwrap();
        assert_eq!(rebuilt, node);
    }

    #[test]
    fn test_roundtrip_statements() {
        roundtrip(Node::Assign {
            targets: vec![name("x")],
            value: Box::new(Node::Constant {
                value: Literal::Int(1),
            }),
        });
        roundtrip(Node::If {
            test: Box::new(name("cond")),
            body: vec![Node::Pass],
            orelse: vec![],
        });
        roundtrip(Node::Return {
            value: Some(Box::new(name("x"))),
        });
        roundtrip(Node::Pass);
    }

    #[test]
    fn test_roundtrip_function_def() {
        roundtrip(Node::FunctionDef {
            name: "f".to_string(),
            args: Box::new(Node::Arguments {
                args: vec![Node::Arg {
                    arg: "x".to_string(),
                    annotation: Some(Box::new(name("int"))),
                }],
            }),
            body: vec![Node::Return {
                value: Some(Box::new(name("x"))),
            }],
            decorator_list: vec![],
            returns: Some(Box::new(name("int"))),
        });
    }

    #[test]
    fn test_roundtrip_comprehension() {
        roundtrip(Node::ListComp {
            elt: Box::new(name("x")),
            generators: vec![Node::Comprehension {
                target: Box::new(name("x")),
                iter: Box::new(name("items")),
                ifs: vec![name("x")],
            }],
        });
    }

    #[test]
    fn test_roundtrip_compare_chain() {
        roundtrip(Node::Compare {
            left: Box::new(name("a")),
            ops: vec![CompareOp::Lt, CompareOp::LtE],
            comparators: vec![name("b"), name("c")],
        });
    }

    #[test]
    fn test_from_fields_rejects_wrong_shape() {
        let values = vec![FieldValue::Ident("x".to_string())];
        assert!(Node::from_fields(NodeKind::Assign, values).is_none());
    }

    #[test]
    fn test_zero_field_kinds_are_empty() {
        assert!(Node::Pass.fields().is_empty());
        assert!(Node::Break.fields().is_empty());
        assert!(Node::Continue.fields().is_empty());
    }

    #[test]
    fn test_field_names_are_sorted() {
        let f = Node::FunctionDef {
            name: "f".to_string(),
            args: Box::new(Node::Arguments { args: vec![] }),
            body: vec![Node::Pass],
            decorator_list: vec![],
            returns: None,
        };
        let names: Vec<_> = f.fields().into_iter().map(|(n, _)| n).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }
}
