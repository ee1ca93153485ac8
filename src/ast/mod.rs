//! Syntax tree for the Python subset the remixer understands
//!
//! The tree is a closed sum type: every node kind and its field set is fixed
//! at compile time, so kind dispatch throughout the crate is an exhaustive
//! `match` rather than a runtime registry. Harvesting, candidate
//! reconstruction, free-identifier extraction and printing all pattern-match
//! on [`Node`] and the compiler enforces that no kind goes unhandled.

mod fields;

pub use fields::FieldValue;

use serde::{Deserialize, Serialize};

/// Literal values carried by `Constant` nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Boolean literal
    Bool(bool),
    /// The `None` literal
    None,
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Sub,
    /// Multiplication (`*`)
    Mult,
    /// Division (`/`)
    Div,
    /// Floor division (`//`)
    FloorDiv,
    /// Modulo (`%`)
    Mod,
    /// Power (`**`)
    Pow,
}

impl BinaryOp {
    /// Convert to Python operator text
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }
}

/// Boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOpKind {
    /// Logical and (`and`)
    And,
    /// Logical or (`or`)
    Or,
}

impl BoolOpKind {
    /// Convert to Python operator text
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpKind {
    /// Logical not (`not x`)
    Not,
    /// Negation (`-x`)
    USub,
    /// Positive (`+x`)
    UAdd,
    /// Bitwise complement (`~x`)
    Invert,
}

impl UnaryOpKind {
    /// Convert to Python operator text
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::Not => "not ",
            Self::USub => "-",
            Self::UAdd => "+",
            Self::Invert => "~",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal (`==`)
    Eq,
    /// Not equal (`!=`)
    NotEq,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    LtE,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    GtE,
    /// Identity (`is`)
    Is,
    /// Negated identity (`is not`)
    IsNot,
    /// Membership (`in`)
    In,
    /// Negated membership (`not in`)
    NotIn,
}

impl CompareOp {
    /// Convert to Python operator text
    #[must_use]
    pub fn to_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }
}

/// Discriminant-only mirror of [`Node`]
///
/// Used wherever a kind must be named without holding a node: inventory
/// keys, candidate lookup, diagnostics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[allow(missing_docs)]
pub enum NodeKind {
    Module,
    FunctionDef,
    ClassDef,
    Return,
    Delete,
    Assign,
    AugAssign,
    For,
    While,
    If,
    With,
    Raise,
    Try,
    Assert,
    Import,
    ImportFrom,
    Expr,
    Pass,
    Break,
    Continue,
    BoolOp,
    BinOp,
    UnaryOp,
    Lambda,
    IfExp,
    Dict,
    Set,
    ListComp,
    SetComp,
    DictComp,
    GeneratorExp,
    Yield,
    Compare,
    Call,
    Constant,
    Attribute,
    Subscript,
    Starred,
    Name,
    List,
    Tuple,
    Arguments,
    Arg,
    Keyword,
    Alias,
    Comprehension,
    WithItem,
    ExceptHandler,
}

/// A node of the syntax tree
///
/// Field names follow the Python `ast` module so corpus inventories read the
/// same as the grammar they were harvested from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Node {
    /// Top-level program unit
    Module { body: Vec<Node> },
    /// `def name(args) -> returns:` with decorators
    FunctionDef {
        name: String,
        args: Box<Node>,
        body: Vec<Node>,
        decorator_list: Vec<Node>,
        returns: Option<Box<Node>>,
    },
    /// `class name(bases, **keywords):` with decorators
    ClassDef {
        name: String,
        bases: Vec<Node>,
        keywords: Vec<Node>,
        body: Vec<Node>,
        decorator_list: Vec<Node>,
    },
    /// `return [value]`
    Return { value: Option<Box<Node>> },
    /// `del targets`
    Delete { targets: Vec<Node> },
    /// `targets = value` (chained targets allowed)
    Assign { targets: Vec<Node>, value: Box<Node> },
    /// `target op= value`
    AugAssign {
        target: Box<Node>,
        op: BinaryOp,
        value: Box<Node>,
    },
    /// `for target in iter:` with optional `else`
    For {
        target: Box<Node>,
        iter: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `while test:` with optional `else`
    While {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `if test:` with `elif` desugared into `orelse`
    If {
        test: Box<Node>,
        body: Vec<Node>,
        orelse: Vec<Node>,
    },
    /// `with items:`
    With { items: Vec<Node>, body: Vec<Node> },
    /// `raise [exc]`
    Raise { exc: Option<Box<Node>> },
    /// `try:` with handlers, `else`, `finally`
    Try {
        body: Vec<Node>,
        handlers: Vec<Node>,
        orelse: Vec<Node>,
        finalbody: Vec<Node>,
    },
    /// `assert test[, msg]`
    Assert {
        test: Box<Node>,
        msg: Option<Box<Node>>,
    },
    /// `import names`
    Import { names: Vec<Node> },
    /// `from module import names`
    ImportFrom {
        module: Option<String>,
        names: Vec<Node>,
    },
    /// Expression used as a statement
    Expr { value: Box<Node> },
    /// `pass`
    Pass,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `values[0] op values[1] op ...`
    BoolOp { op: BoolOpKind, values: Vec<Node> },
    /// `left op right`
    BinOp {
        left: Box<Node>,
        op: BinaryOp,
        right: Box<Node>,
    },
    /// `op operand`
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Node>,
    },
    /// `lambda args: body`
    Lambda { args: Box<Node>, body: Box<Node> },
    /// `body if test else orelse`
    IfExp {
        test: Box<Node>,
        body: Box<Node>,
        orelse: Box<Node>,
    },
    /// `{keys[i]: values[i], ...}`
    Dict { keys: Vec<Node>, values: Vec<Node> },
    /// `{elts, ...}`
    Set { elts: Vec<Node> },
    /// `[elt for ... in ...]`
    ListComp { elt: Box<Node>, generators: Vec<Node> },
    /// `{elt for ... in ...}`
    SetComp { elt: Box<Node>, generators: Vec<Node> },
    /// `{key: value for ... in ...}`
    DictComp {
        key: Box<Node>,
        value: Box<Node>,
        generators: Vec<Node>,
    },
    /// `(elt for ... in ...)`
    GeneratorExp { elt: Box<Node>, generators: Vec<Node> },
    /// `yield [value]`
    Yield { value: Option<Box<Node>> },
    /// `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<Node>,
        ops: Vec<CompareOp>,
        comparators: Vec<Node>,
    },
    /// `func(args, keywords)`
    Call {
        func: Box<Node>,
        args: Vec<Node>,
        keywords: Vec<Node>,
    },
    /// Literal constant
    Constant { value: Literal },
    /// `value.attr`
    Attribute { value: Box<Node>, attr: String },
    /// `value[index]`
    Subscript { value: Box<Node>, index: Box<Node> },
    /// `*value`
    Starred { value: Box<Node> },
    /// Identifier reference
    Name { id: String },
    /// `[elts, ...]`
    List { elts: Vec<Node> },
    /// `(elts, ...)`
    Tuple { elts: Vec<Node> },
    /// Parameter list of a function or lambda
    Arguments { args: Vec<Node> },
    /// Single parameter declaration with optional annotation
    Arg {
        arg: String,
        annotation: Option<Box<Node>>,
    },
    /// Keyword argument in a call (`name=value` or `**value`)
    Keyword {
        arg: Option<String>,
        value: Box<Node>,
    },
    /// `name [as asname]` in an import
    Alias {
        name: String,
        asname: Option<String>,
    },
    /// One `for target in iter [if ...]` clause of a comprehension
    Comprehension {
        target: Box<Node>,
        iter: Box<Node>,
        ifs: Vec<Node>,
    },
    /// One `expr [as name]` item of a `with` statement
    WithItem {
        context_expr: Box<Node>,
        optional_vars: Option<Box<Node>>,
    },
    /// `except [type [as name]]:` clause
    ExceptHandler {
        #[serde(rename = "type")]
        typ: Option<Box<Node>>,
        name: Option<String>,
        body: Vec<Node>,
    },
}

impl Node {
    /// The kind discriminant of this node
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Module { .. } => NodeKind::Module,
            Self::FunctionDef { .. } => NodeKind::FunctionDef,
            Self::ClassDef { .. } => NodeKind::ClassDef,
            Self::Return { .. } => NodeKind::Return,
            Self::Delete { .. } => NodeKind::Delete,
            Self::Assign { .. } => NodeKind::Assign,
            Self::AugAssign { .. } => NodeKind::AugAssign,
            Self::For { .. } => NodeKind::For,
            Self::While { .. } => NodeKind::While,
            Self::If { .. } => NodeKind::If,
            Self::With { .. } => NodeKind::With,
            Self::Raise { .. } => NodeKind::Raise,
            Self::Try { .. } => NodeKind::Try,
            Self::Assert { .. } => NodeKind::Assert,
            Self::Import { .. } => NodeKind::Import,
            Self::ImportFrom { .. } => NodeKind::ImportFrom,
            Self::Expr { .. } => NodeKind::Expr,
            Self::Pass => NodeKind::Pass,
            Self::Break => NodeKind::Break,
            Self::Continue => NodeKind::Continue,
            Self::BoolOp { .. } => NodeKind::BoolOp,
            Self::BinOp { .. } => NodeKind::BinOp,
            Self::UnaryOp { .. } => NodeKind::UnaryOp,
            Self::Lambda { .. } => NodeKind::Lambda,
            Self::IfExp { .. } => NodeKind::IfExp,
            Self::Dict { .. } => NodeKind::Dict,
            Self::Set { .. } => NodeKind::Set,
            Self::ListComp { .. } => NodeKind::ListComp,
            Self::SetComp { .. } => NodeKind::SetComp,
            Self::DictComp { .. } => NodeKind::DictComp,
            Self::GeneratorExp { .. } => NodeKind::GeneratorExp,
            Self::Yield { .. } => NodeKind::Yield,
            Self::Compare { .. } => NodeKind::Compare,
            Self::Call { .. } => NodeKind::Call,
            Self::Constant { .. } => NodeKind::Constant,
            Self::Attribute { .. } => NodeKind::Attribute,
            Self::Subscript { .. } => NodeKind::Subscript,
            Self::Starred { .. } => NodeKind::Starred,
            Self::Name { .. } => NodeKind::Name,
            Self::List { .. } => NodeKind::List,
            Self::Tuple { .. } => NodeKind::Tuple,
            Self::Arguments { .. } => NodeKind::Arguments,
            Self::Arg { .. } => NodeKind::Arg,
            Self::Keyword { .. } => NodeKind::Keyword,
            Self::Alias { .. } => NodeKind::Alias,
            Self::Comprehension { .. } => NodeKind::Comprehension,
            Self::WithItem { .. } => NodeKind::WithItem,
            Self::ExceptHandler { .. } => NodeKind::ExceptHandler,
        }
    }

    /// References to every direct child node, in field order
    #[must_use]
    pub fn children(&self) -> Vec<&Node> {
        fn opt(o: &Option<Box<Node>>) -> Vec<&Node> {
            o.iter().map(AsRef::as_ref).collect()
        }
        match self {
            Self::Module { body } => body.iter().collect(),
            Self::FunctionDef {
                args,
                body,
                decorator_list,
                returns,
                ..
            } => {
                let mut out: Vec<&Node> = vec![args];
                out.extend(body.iter());
                out.extend(decorator_list.iter());
                out.extend(opt(returns));
                out
            }
            Self::ClassDef {
                bases,
                keywords,
                body,
                decorator_list,
                ..
            } => bases
                .iter()
                .chain(keywords.iter())
                .chain(body.iter())
                .chain(decorator_list.iter())
                .collect(),
            Self::Return { value } | Self::Yield { value } => opt(value),
            Self::Delete { targets } => targets.iter().collect(),
            Self::Assign { targets, value } => {
                let mut out: Vec<&Node> = targets.iter().collect();
                out.push(value);
                out
            }
            Self::AugAssign { target, value, .. } => vec![target, value],
            Self::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let mut out: Vec<&Node> = vec![target, iter];
                out.extend(body.iter());
                out.extend(orelse.iter());
                out
            }
            Self::While { test, body, orelse } | Self::If { test, body, orelse } => {
                let mut out: Vec<&Node> = vec![test];
                out.extend(body.iter());
                out.extend(orelse.iter());
                out
            }
            Self::With { items, body } => items.iter().chain(body.iter()).collect(),
            Self::Raise { exc } => opt(exc),
            Self::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => body
                .iter()
                .chain(handlers.iter())
                .chain(orelse.iter())
                .chain(finalbody.iter())
                .collect(),
            Self::Assert { test, msg } => {
                let mut out: Vec<&Node> = vec![test];
                out.extend(opt(msg));
                out
            }
            Self::Import { names } | Self::ImportFrom { names, .. } => names.iter().collect(),
            Self::Expr { value } | Self::Starred { value } => vec![value],
            Self::Pass | Self::Break | Self::Continue => Vec::new(),
            Self::BoolOp { values, .. } => values.iter().collect(),
            Self::BinOp { left, right, .. } => vec![left, right],
            Self::UnaryOp { operand, .. } => vec![operand],
            Self::Lambda { args, body } => vec![args, body],
            Self::IfExp { test, body, orelse } => vec![test, body, orelse],
            Self::Dict { keys, values } => keys.iter().chain(values.iter()).collect(),
            Self::Set { elts } | Self::List { elts } | Self::Tuple { elts } => {
                elts.iter().collect()
            }
            Self::ListComp { elt, generators }
            | Self::SetComp { elt, generators }
            | Self::GeneratorExp { elt, generators } => {
                let mut out: Vec<&Node> = vec![elt];
                out.extend(generators.iter());
                out
            }
            Self::DictComp {
                key,
                value,
                generators,
            } => {
                let mut out: Vec<&Node> = vec![key, value];
                out.extend(generators.iter());
                out
            }
            Self::Compare {
                left, comparators, ..
            } => {
                let mut out: Vec<&Node> = vec![left];
                out.extend(comparators.iter());
                out
            }
            Self::Call {
                func,
                args,
                keywords,
            } => {
                let mut out: Vec<&Node> = vec![func];
                out.extend(args.iter());
                out.extend(keywords.iter());
                out
            }
            Self::Constant { .. } | Self::Name { .. } | Self::Alias { .. } => Vec::new(),
            Self::Attribute { value, .. } => vec![value],
            Self::Subscript { value, index } => vec![value, index],
            Self::Arguments { args } => args.iter().collect(),
            Self::Arg { annotation, .. } => opt(annotation),
            Self::Keyword { value, .. } => vec![value],
            Self::Comprehension { target, iter, ifs } => {
                let mut out: Vec<&Node> = vec![target, iter];
                out.extend(ifs.iter());
                out
            }
            Self::WithItem {
                context_expr,
                optional_vars,
            } => {
                let mut out: Vec<&Node> = vec![context_expr];
                out.extend(opt(optional_vars));
                out
            }
            Self::ExceptHandler { typ, body, .. } => {
                let mut out = opt(typ);
                out.extend(body.iter());
                out
            }
        }
    }

    /// Total node count of this subtree, including the root
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(|c| c.size()).sum::<usize>()
    }
}
