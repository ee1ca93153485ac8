//! Source parsing for the supported Python subset
//!
//! Two stages: an indentation-aware lexer that turns source text into a
//! token stream with explicit `Indent`/`Dedent`/`Newline` markers, and a
//! recursive-descent parser over that stream. Lines continue implicitly
//! inside brackets and explicitly behind a trailing backslash; blank and
//! comment-only lines never reach the parser. Anything outside the subset
//! (defaults, slices, f-strings, async) is a [`Error::Syntax`], which the
//! corpus loader records and skips.

use crate::ast::{BinaryOp, BoolOpKind, CompareOp, Literal, Node, UnaryOpKind};
use crate::error::{Error, Result};

/// Parse one source file into a [`Node::Module`]
pub fn parse(source: &str) -> Result<Node> {
    let tokens = Lexer::new(source).run()?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut body = Vec::new();
    while !matches!(parser.tok(), Tok::EndOfFile) {
        body.push(parser.statement()?);
    }
    Ok(Node::Module { body })
}

const KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "while", "for", "in", "try", "except", "finally",
    "with", "as", "return", "raise", "assert", "del", "import", "from", "pass", "break",
    "continue", "and", "or", "not", "is", "lambda", "yield", "True", "False", "None",
];

/// Keywords that can begin an expression
const EXPR_KEYWORDS: &[&str] = &["not", "lambda", "yield", "True", "False", "None"];

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Indent,
    Dedent,
    Newline,
    EndOfFile,
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Sym(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    indents: Vec<usize>,
    depth: usize,
    fresh: bool,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            depth: 0,
            fresh: true,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token>> {
        loop {
            if self.fresh && self.depth == 0 {
                self.handle_indentation()?;
                self.fresh = false;
            }
            let Some(c) = self.peek() else { break };
            match c {
                '\n' => {
                    self.pos += 1;
                    if self.depth == 0 {
                        self.push(Tok::Newline);
                        self.fresh = true;
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' => self.pos += 1,
                '#' => self.skip_comment(),
                '\\' if self.chars.get(self.pos + 1) == Some(&'\n') => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\'' | '"' => self.string(c)?,
                '0'..='9' => self.number()?,
                c if c == '_' || c.is_ascii_alphabetic() => self.name(),
                _ => self.symbol()?,
            }
        }
        let needs_newline = matches!(
            self.tokens.last().map(|t| &t.tok),
            Some(Tok::Name(_) | Tok::Int(_) | Tok::Float(_) | Tok::Str(_) | Tok::Sym(_))
        );
        if needs_newline {
            self.push(Tok::Newline);
        }
        while self.indents.pop().is_some_and(|w| w > 0) {
            self.push(Tok::Dedent);
        }
        self.push(Tok::EndOfFile);
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn push(&mut self, tok: Tok) {
        self.tokens.push(Token {
            tok,
            line: self.line,
        });
    }

    fn err<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::Syntax {
            line: self.line,
            message: message.into(),
        })
    }

    /// Measure the new logical line's indentation and emit the matching
    /// `Indent`/`Dedent` tokens, skipping blank and comment-only lines
    fn handle_indentation(&mut self) -> Result<()> {
        loop {
            let mut width = 0;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 8 - width % 8,
                    _ => break,
                }
                self.pos += 1;
            }
            match self.peek() {
                None => return Ok(()),
                Some('#') => self.skip_comment(),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some(_) => {
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(Tok::Indent);
                    } else {
                        while self.indents.last().is_some_and(|w| *w > width) {
                            self.indents.pop();
                            self.push(Tok::Dedent);
                        }
                        if self.indents.last() != Some(&width) {
                            return self.err("inconsistent indentation");
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn string(&mut self, quote: char) -> Result<()> {
        self.pos += 1;
        let mut text = String::new();
        loop {
            match self.peek() {
                None => return self.err("unterminated string literal"),
                Some('\n') => return self.err("unterminated string literal"),
                Some('\\') => {
                    self.pos += 1;
                    let Some(escaped) = self.peek() else {
                        return self.err("unterminated string literal");
                    };
                    self.pos += 1;
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        'r' => text.push('\r'),
                        '0' => text.push('\0'),
                        '\\' | '\'' | '"' => text.push(escaped),
                        other => {
                            // unknown escapes are kept verbatim
                            text.push('\\');
                            text.push(other);
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    break;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
        self.push(Tok::Str(text));
        Ok(())
    }

    fn number(&mut self) -> Result<()> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let is_float = self.peek() == Some('.')
            && self
                .chars
                .get(self.pos + 1)
                .is_some_and(char::is_ascii_digit);
        if is_float {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            match text.parse::<f64>() {
                Ok(value) => self.push(Tok::Float(value)),
                Err(_) => return self.err(format!("invalid float literal {text}")),
            }
        } else {
            match text.parse::<i64>() {
                Ok(value) => self.push(Tok::Int(value)),
                Err(_) => return self.err(format!("integer literal {text} out of range")),
            }
        }
        Ok(())
    }

    fn name(&mut self) {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.push(Tok::Name(text));
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn symbol(&mut self) -> Result<()> {
        // longest match first
        const COMPOUND: &[&str] = &[
            "**=", "//=", "**", "//", "->", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=",
        ];
        for s in COMPOUND {
            if self.starts_with(s) {
                self.pos += s.len();
                self.push(Tok::Sym(s));
                return Ok(());
            }
        }
        let Some(c) = self.peek() else {
            return self.err("unexpected end of input");
        };
        let sym = match c {
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '~' => "~",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            '{' => "{",
            '}' => "}",
            ',' => ",",
            ':' => ":",
            '.' => ".",
            '@' => "@",
            other => return self.err(format!("unexpected character {other:?}")),
        };
        match c {
            '(' | '[' | '{' => self.depth += 1,
            ')' | ']' | '}' => self.depth = self.depth.saturating_sub(1),
            _ => {}
        }
        self.pos += 1;
        self.push(Tok::Sym(sym));
        Ok(())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn tok(&self) -> &Tok {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].tok
    }

    fn peek2(&self) -> &Tok {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)].tok
    }

    fn line(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].line
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tok().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(Error::Syntax {
            line: self.line(),
            message: message.into(),
        })
    }

    fn at_sym(&self, s: &str) -> bool {
        matches!(self.tok(), Tok::Sym(found) if *found == s)
    }

    fn eat_sym(&mut self, s: &str) -> bool {
        if self.at_sym(s) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, s: &str) -> Result<()> {
        if self.eat_sym(s) {
            Ok(())
        } else {
            self.err(format!("expected {s:?}, found {:?}", self.tok()))
        }
    }

    fn at_kw(&self, kw: &str) -> bool {
        matches!(self.tok(), Tok::Name(found) if found == kw)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.at_kw(kw) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            self.err(format!("expected {kw:?}, found {:?}", self.tok()))
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.tok() {
            Tok::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            other => self.err(format!("expected identifier, found {other:?}")),
        }
    }

    fn expect_newline(&mut self) -> Result<()> {
        match self.tok() {
            Tok::Newline => {
                self.bump();
                Ok(())
            }
            other => self.err(format!("expected end of line, found {other:?}")),
        }
    }

    /// Whether the current token can begin an expression
    fn starts_expr(&self) -> bool {
        match self.tok() {
            Tok::Int(_) | Tok::Float(_) | Tok::Str(_) => true,
            Tok::Sym(s) => matches!(*s, "(" | "[" | "{" | "-" | "+" | "~" | "*"),
            Tok::Name(n) => {
                !KEYWORDS.contains(&n.as_str()) || EXPR_KEYWORDS.contains(&n.as_str())
            }
            _ => false,
        }
    }

    // ---- statements ----

    fn statement(&mut self) -> Result<Node> {
        if self.at_sym("@") {
            return self.decorated();
        }
        if let Tok::Name(word) = self.tok() {
            match word.as_str() {
                "def" => return self.funcdef(vec![]),
                "class" => return self.classdef(vec![]),
                "if" => return self.if_stmt(),
                "while" => return self.while_stmt(),
                "for" => return self.for_stmt(),
                "try" => return self.try_stmt(),
                "with" => return self.with_stmt(),
                "return" => return self.return_stmt(),
                "raise" => return self.raise_stmt(),
                "assert" => return self.assert_stmt(),
                "del" => return self.del_stmt(),
                "import" => return self.import_stmt(),
                "from" => return self.from_import_stmt(),
                "pass" => {
                    self.bump();
                    self.expect_newline()?;
                    return Ok(Node::Pass);
                }
                "break" => {
                    self.bump();
                    self.expect_newline()?;
                    return Ok(Node::Break);
                }
                "continue" => {
                    self.bump();
                    self.expect_newline()?;
                    return Ok(Node::Continue);
                }
                _ => {}
            }
        }
        self.expr_statement()
    }

    fn decorated(&mut self) -> Result<Node> {
        let mut decorator_list = Vec::new();
        while self.eat_sym("@") {
            decorator_list.push(self.expr()?);
            self.expect_newline()?;
        }
        if self.at_kw("def") {
            self.funcdef(decorator_list)
        } else if self.at_kw("class") {
            self.classdef(decorator_list)
        } else {
            self.err("expected def or class after decorators")
        }
    }

    fn funcdef(&mut self, decorator_list: Vec<Node>) -> Result<Node> {
        self.bump();
        let name = self.expect_name()?;
        self.expect_sym("(")?;
        let args = self.parameters(")", true)?;
        self.expect_sym(")")?;
        let returns = if self.eat_sym("->") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        let body = self.suite()?;
        Ok(Node::FunctionDef {
            name,
            args: Box::new(args),
            body,
            decorator_list,
            returns,
        })
    }

    /// Plain named parameters up to `stop`; annotations only where the
    /// closing delimiter cannot be mistaken for one (lambdas end on `:`)
    fn parameters(&mut self, stop: &str, annotated: bool) -> Result<Node> {
        let mut args = Vec::new();
        while !self.at_sym(stop) {
            let arg = self.expect_name()?;
            let annotation = if annotated && self.eat_sym(":") {
                Some(Box::new(self.expr()?))
            } else {
                None
            };
            args.push(Node::Arg { arg, annotation });
            if !self.eat_sym(",") {
                break;
            }
        }
        Ok(Node::Arguments { args })
    }

    fn classdef(&mut self, decorator_list: Vec<Node>) -> Result<Node> {
        self.bump();
        let name = self.expect_name()?;
        let mut bases = Vec::new();
        let mut keywords = Vec::new();
        if self.eat_sym("(") {
            while !self.at_sym(")") {
                if self.eat_sym("**") {
                    keywords.push(Node::Keyword {
                        arg: None,
                        value: Box::new(self.expr()?),
                    });
                } else if matches!(self.tok(), Tok::Name(n) if !KEYWORDS.contains(&n.as_str()))
                    && matches!(self.peek2(), Tok::Sym("="))
                {
                    let arg = self.expect_name()?;
                    self.bump();
                    keywords.push(Node::Keyword {
                        arg: Some(arg),
                        value: Box::new(self.expr()?),
                    });
                } else {
                    bases.push(self.expr()?);
                }
                if !self.eat_sym(",") {
                    break;
                }
            }
            self.expect_sym(")")?;
        }
        let body = self.suite()?;
        Ok(Node::ClassDef {
            name,
            bases,
            keywords,
            body,
            decorator_list,
        })
    }

    fn suite(&mut self) -> Result<Vec<Node>> {
        self.expect_sym(":")?;
        if matches!(self.tok(), Tok::Newline) {
            self.bump();
            if !matches!(self.tok(), Tok::Indent) {
                return self.err("expected an indented block");
            }
            self.bump();
            let mut body = Vec::new();
            while !matches!(self.tok(), Tok::Dedent) {
                body.push(self.statement()?);
            }
            self.bump();
            Ok(body)
        } else {
            // single statement on the header line
            Ok(vec![self.statement()?])
        }
    }

    fn if_stmt(&mut self) -> Result<Node> {
        // entered on `if` or `elif`
        self.bump();
        let test = Box::new(self.expr()?);
        let body = self.suite()?;
        let orelse = if self.at_kw("elif") {
            vec![self.if_stmt()?]
        } else if self.eat_kw("else") {
            self.suite()?
        } else {
            vec![]
        };
        Ok(Node::If { test, body, orelse })
    }

    fn while_stmt(&mut self) -> Result<Node> {
        self.bump();
        let test = Box::new(self.expr()?);
        let body = self.suite()?;
        let orelse = if self.eat_kw("else") {
            self.suite()?
        } else {
            vec![]
        };
        Ok(Node::While { test, body, orelse })
    }

    fn for_stmt(&mut self) -> Result<Node> {
        self.bump();
        let target = Box::new(self.for_targets()?);
        self.expect_kw("in")?;
        let iter = Box::new(self.testlist()?);
        let body = self.suite()?;
        let orelse = if self.eat_kw("else") {
            self.suite()?
        } else {
            vec![]
        };
        Ok(Node::For {
            target,
            iter,
            body,
            orelse,
        })
    }

    fn try_stmt(&mut self) -> Result<Node> {
        self.bump();
        let body = self.suite()?;
        let mut handlers = Vec::new();
        while self.at_kw("except") {
            self.bump();
            let typ = if self.at_sym(":") {
                None
            } else {
                Some(Box::new(self.expr()?))
            };
            let name = if self.eat_kw("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            let handler_body = self.suite()?;
            handlers.push(Node::ExceptHandler {
                typ,
                name,
                body: handler_body,
            });
        }
        let orelse = if self.eat_kw("else") {
            self.suite()?
        } else {
            vec![]
        };
        let finalbody = if self.eat_kw("finally") {
            self.suite()?
        } else {
            vec![]
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return self.err("expected except or finally clause");
        }
        Ok(Node::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn with_stmt(&mut self) -> Result<Node> {
        self.bump();
        let mut items = Vec::new();
        loop {
            let context_expr = Box::new(self.expr()?);
            let optional_vars = if self.eat_kw("as") {
                Some(Box::new(self.target_atom()?))
            } else {
                None
            };
            items.push(Node::WithItem {
                context_expr,
                optional_vars,
            });
            if !self.eat_sym(",") {
                break;
            }
        }
        let body = self.suite()?;
        Ok(Node::With { items, body })
    }

    fn return_stmt(&mut self) -> Result<Node> {
        self.bump();
        let value = if self.starts_expr() {
            Some(Box::new(self.testlist()?))
        } else {
            None
        };
        self.expect_newline()?;
        Ok(Node::Return { value })
    }

    fn raise_stmt(&mut self) -> Result<Node> {
        self.bump();
        let exc = if self.starts_expr() {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_newline()?;
        Ok(Node::Raise { exc })
    }

    fn assert_stmt(&mut self) -> Result<Node> {
        self.bump();
        let test = Box::new(self.expr()?);
        let msg = if self.eat_sym(",") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_newline()?;
        Ok(Node::Assert { test, msg })
    }

    fn del_stmt(&mut self) -> Result<Node> {
        self.bump();
        let mut targets = vec![self.target_atom()?];
        while self.eat_sym(",") {
            targets.push(self.target_atom()?);
        }
        self.expect_newline()?;
        Ok(Node::Delete { targets })
    }

    fn import_stmt(&mut self) -> Result<Node> {
        self.bump();
        let names = self.alias_list()?;
        self.expect_newline()?;
        Ok(Node::Import { names })
    }

    fn from_import_stmt(&mut self) -> Result<Node> {
        self.bump();
        let module = if self.at_sym(".") {
            // relative import
            while self.eat_sym(".") {}
            None
        } else {
            Some(self.dotted_name()?)
        };
        self.expect_kw("import")?;
        let names = if self.eat_sym("*") {
            vec![Node::Alias {
                name: "*".to_string(),
                asname: None,
            }]
        } else {
            self.alias_list()?
        };
        self.expect_newline()?;
        Ok(Node::ImportFrom { module, names })
    }

    fn alias_list(&mut self) -> Result<Vec<Node>> {
        let mut names = Vec::new();
        loop {
            let name = self.dotted_name()?;
            let asname = if self.eat_kw("as") {
                Some(self.expect_name()?)
            } else {
                None
            };
            names.push(Node::Alias { name, asname });
            if !self.eat_sym(",") {
                break;
            }
        }
        Ok(names)
    }

    fn dotted_name(&mut self) -> Result<String> {
        let mut name = self.expect_name()?;
        while self.at_sym(".") {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn expr_statement(&mut self) -> Result<Node> {
        let first = self.testlist()?;
        if let &Tok::Sym(s) = self.tok() {
            if let Some(op) = aug_op(s) {
                self.bump();
                let value = Box::new(self.testlist()?);
                self.expect_newline()?;
                return Ok(Node::AugAssign {
                    target: Box::new(first),
                    op,
                    value,
                });
            }
        }
        if self.at_sym("=") {
            let mut targets = vec![first];
            let value = loop {
                self.bump();
                let next = self.testlist()?;
                if self.at_sym("=") {
                    targets.push(next);
                } else {
                    break next;
                }
            };
            self.expect_newline()?;
            return Ok(Node::Assign {
                targets,
                value: Box::new(value),
            });
        }
        self.expect_newline()?;
        Ok(Node::Expr {
            value: Box::new(first),
        })
    }

    // ---- expressions ----

    /// One or more comma-separated expressions; two or more form a tuple
    fn testlist(&mut self) -> Result<Node> {
        let first = self.expr()?;
        if !self.at_sym(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_sym(",") {
            if !self.starts_expr() {
                break;
            }
            elts.push(self.expr()?);
        }
        Ok(Node::Tuple { elts })
    }

    fn expr(&mut self) -> Result<Node> {
        if self.at_kw("lambda") {
            return self.lambda();
        }
        if self.eat_kw("yield") {
            let value = if self.starts_expr() {
                Some(Box::new(self.expr()?))
            } else {
                None
            };
            return Ok(Node::Yield { value });
        }
        let body = self.or_expr()?;
        if self.eat_kw("if") {
            let test = Box::new(self.or_expr()?);
            self.expect_kw("else")?;
            let orelse = Box::new(self.expr()?);
            return Ok(Node::IfExp {
                test,
                body: Box::new(body),
                orelse,
            });
        }
        Ok(body)
    }

    fn lambda(&mut self) -> Result<Node> {
        self.bump();
        let args = self.parameters(":", false)?;
        self.expect_sym(":")?;
        let body = Box::new(self.expr()?);
        Ok(Node::Lambda {
            args: Box::new(args),
            body,
        })
    }

    fn or_expr(&mut self) -> Result<Node> {
        let first = self.and_expr()?;
        if !self.at_kw("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("or") {
            values.push(self.and_expr()?);
        }
        Ok(Node::BoolOp {
            op: BoolOpKind::Or,
            values,
        })
    }

    fn and_expr(&mut self) -> Result<Node> {
        let first = self.not_expr()?;
        if !self.at_kw("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("and") {
            values.push(self.not_expr()?);
        }
        Ok(Node::BoolOp {
            op: BoolOpKind::And,
            values,
        })
    }

    fn not_expr(&mut self) -> Result<Node> {
        if self.at_kw("not") && !matches!(self.peek2(), Tok::Name(n) if n == "in") {
            self.bump();
            return Ok(Node::UnaryOp {
                op: UnaryOpKind::Not,
                operand: Box::new(self.not_expr()?),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Node> {
        let left = self.arith()?;
        let mut ops = Vec::new();
        let mut comparators = Vec::new();
        while let Some(op) = self.compare_op() {
            ops.push(op);
            comparators.push(self.arith()?);
        }
        if ops.is_empty() {
            Ok(left)
        } else {
            Ok(Node::Compare {
                left: Box::new(left),
                ops,
                comparators,
            })
        }
    }

    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.tok() {
            Tok::Sym("==") => CompareOp::Eq,
            Tok::Sym("!=") => CompareOp::NotEq,
            Tok::Sym("<") => CompareOp::Lt,
            Tok::Sym("<=") => CompareOp::LtE,
            Tok::Sym(">") => CompareOp::Gt,
            Tok::Sym(">=") => CompareOp::GtE,
            Tok::Name(n) if n == "in" => CompareOp::In,
            Tok::Name(n) if n == "not" && matches!(self.peek2(), Tok::Name(m) if m == "in") => {
                self.bump();
                CompareOp::NotIn
            }
            Tok::Name(n) if n == "is" => {
                self.bump();
                return Some(if self.eat_kw("not") {
                    CompareOp::IsNot
                } else {
                    CompareOp::Is
                });
            }
            _ => return None,
        };
        self.bump();
        Some(op)
    }

    fn arith(&mut self) -> Result<Node> {
        let mut left = self.term()?;
        loop {
            let op = match self.tok() {
                Tok::Sym("+") => BinaryOp::Add,
                Tok::Sym("-") => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            left = Node::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(self.term()?),
            };
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Node> {
        let mut left = self.factor()?;
        loop {
            let op = match self.tok() {
                Tok::Sym("*") => BinaryOp::Mult,
                Tok::Sym("/") => BinaryOp::Div,
                Tok::Sym("//") => BinaryOp::FloorDiv,
                Tok::Sym("%") => BinaryOp::Mod,
                _ => break,
            };
            self.bump();
            left = Node::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(self.factor()?),
            };
        }
        Ok(left)
    }

    fn factor(&mut self) -> Result<Node> {
        let op = match self.tok() {
            Tok::Sym("-") => UnaryOpKind::USub,
            Tok::Sym("+") => UnaryOpKind::UAdd,
            Tok::Sym("~") => UnaryOpKind::Invert,
            _ => return self.power(),
        };
        self.bump();
        Ok(Node::UnaryOp {
            op,
            operand: Box::new(self.factor()?),
        })
    }

    fn power(&mut self) -> Result<Node> {
        let base = self.postfix()?;
        if self.eat_sym("**") {
            // right associative
            return Ok(Node::BinOp {
                left: Box::new(base),
                op: BinaryOp::Pow,
                right: Box::new(self.factor()?),
            });
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Node> {
        let mut value = self.atom()?;
        loop {
            if self.eat_sym("(") {
                value = self.call_trailer(value)?;
            } else if self.eat_sym(".") {
                value = Node::Attribute {
                    value: Box::new(value),
                    attr: self.expect_name()?,
                };
            } else if self.eat_sym("[") {
                let index = Box::new(self.testlist()?);
                self.expect_sym("]")?;
                value = Node::Subscript {
                    value: Box::new(value),
                    index,
                };
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn call_trailer(&mut self, func: Node) -> Result<Node> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.at_sym(")") {
            if self.eat_sym("*") {
                args.push(Node::Starred {
                    value: Box::new(self.expr()?),
                });
            } else if self.eat_sym("**") {
                keywords.push(Node::Keyword {
                    arg: None,
                    value: Box::new(self.expr()?),
                });
            } else if matches!(self.tok(), Tok::Name(n) if !KEYWORDS.contains(&n.as_str()))
                && matches!(self.peek2(), Tok::Sym("="))
            {
                let arg = self.expect_name()?;
                self.bump();
                keywords.push(Node::Keyword {
                    arg: Some(arg),
                    value: Box::new(self.expr()?),
                });
            } else {
                args.push(self.expr()?);
            }
            if !self.eat_sym(",") {
                break;
            }
        }
        self.expect_sym(")")?;
        Ok(Node::Call {
            func: Box::new(func),
            args,
            keywords,
        })
    }

    fn atom(&mut self) -> Result<Node> {
        match self.tok().clone() {
            Tok::Int(n) => {
                self.bump();
                Ok(Node::Constant {
                    value: Literal::Int(n),
                })
            }
            Tok::Float(f) => {
                self.bump();
                Ok(Node::Constant {
                    value: Literal::Float(f),
                })
            }
            Tok::Str(s) => {
                self.bump();
                Ok(Node::Constant {
                    value: Literal::Str(s),
                })
            }
            Tok::Name(n) => match n.as_str() {
                "True" => {
                    self.bump();
                    Ok(Node::Constant {
                        value: Literal::Bool(true),
                    })
                }
                "False" => {
                    self.bump();
                    Ok(Node::Constant {
                        value: Literal::Bool(false),
                    })
                }
                "None" => {
                    self.bump();
                    Ok(Node::Constant {
                        value: Literal::None,
                    })
                }
                word if KEYWORDS.contains(&word) => {
                    self.err(format!("unexpected keyword {word:?}"))
                }
                _ => {
                    self.bump();
                    Ok(Node::Name { id: n })
                }
            },
            Tok::Sym("(") => self.paren_atom(),
            Tok::Sym("[") => self.list_atom(),
            Tok::Sym("{") => self.brace_atom(),
            Tok::Sym("*") => {
                self.bump();
                Ok(Node::Starred {
                    value: Box::new(self.postfix()?),
                })
            }
            other => self.err(format!("unexpected token {other:?}")),
        }
    }

    fn paren_atom(&mut self) -> Result<Node> {
        self.bump();
        if self.eat_sym(")") {
            return Ok(Node::Tuple { elts: vec![] });
        }
        let first = self.expr()?;
        if self.at_kw("for") {
            let generators = self.comp_clauses()?;
            self.expect_sym(")")?;
            return Ok(Node::GeneratorExp {
                elt: Box::new(first),
                generators,
            });
        }
        if self.at_sym(",") {
            let mut elts = vec![first];
            while self.eat_sym(",") {
                if self.at_sym(")") {
                    break;
                }
                elts.push(self.expr()?);
            }
            self.expect_sym(")")?;
            return Ok(Node::Tuple { elts });
        }
        self.expect_sym(")")?;
        Ok(first)
    }

    fn list_atom(&mut self) -> Result<Node> {
        self.bump();
        if self.eat_sym("]") {
            return Ok(Node::List { elts: vec![] });
        }
        let first = self.expr()?;
        if self.at_kw("for") {
            let generators = self.comp_clauses()?;
            self.expect_sym("]")?;
            return Ok(Node::ListComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut elts = vec![first];
        while self.eat_sym(",") {
            if self.at_sym("]") {
                break;
            }
            elts.push(self.expr()?);
        }
        self.expect_sym("]")?;
        Ok(Node::List { elts })
    }

    fn brace_atom(&mut self) -> Result<Node> {
        self.bump();
        if self.eat_sym("}") {
            return Ok(Node::Dict {
                keys: vec![],
                values: vec![],
            });
        }
        let first = self.expr()?;
        if self.eat_sym(":") {
            let first_value = self.expr()?;
            if self.at_kw("for") {
                let generators = self.comp_clauses()?;
                self.expect_sym("}")?;
                return Ok(Node::DictComp {
                    key: Box::new(first),
                    value: Box::new(first_value),
                    generators,
                });
            }
            let mut keys = vec![first];
            let mut values = vec![first_value];
            while self.eat_sym(",") {
                if self.at_sym("}") {
                    break;
                }
                keys.push(self.expr()?);
                self.expect_sym(":")?;
                values.push(self.expr()?);
            }
            self.expect_sym("}")?;
            return Ok(Node::Dict { keys, values });
        }
        if self.at_kw("for") {
            let generators = self.comp_clauses()?;
            self.expect_sym("}")?;
            return Ok(Node::SetComp {
                elt: Box::new(first),
                generators,
            });
        }
        let mut elts = vec![first];
        while self.eat_sym(",") {
            if self.at_sym("}") {
                break;
            }
            elts.push(self.expr()?);
        }
        self.expect_sym("}")?;
        Ok(Node::Set { elts })
    }

    fn comp_clauses(&mut self) -> Result<Vec<Node>> {
        let mut generators = Vec::new();
        while self.eat_kw("for") {
            let target = Box::new(self.for_targets()?);
            self.expect_kw("in")?;
            // `or_expr` here so a trailing `if` starts a filter clause
            let iter = Box::new(self.or_expr()?);
            let mut ifs = Vec::new();
            while self.eat_kw("if") {
                ifs.push(self.or_expr()?);
            }
            generators.push(Node::Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    /// Comma-separated binding targets, stopping before `in`
    fn for_targets(&mut self) -> Result<Node> {
        let first = self.target_atom()?;
        if !self.at_sym(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_sym(",") {
            if self.at_kw("in") {
                break;
            }
            elts.push(self.target_atom()?);
        }
        Ok(Node::Tuple { elts })
    }

    fn target_atom(&mut self) -> Result<Node> {
        if self.eat_sym("*") {
            return Ok(Node::Starred {
                value: Box::new(self.target_atom()?),
            });
        }
        if self.eat_sym("(") {
            let target = self.for_targets()?;
            self.expect_sym(")")?;
            return Ok(target);
        }
        if self.eat_sym("[") {
            let mut elts = Vec::new();
            while !self.at_sym("]") {
                elts.push(self.target_atom()?);
                if !self.eat_sym(",") {
                    break;
                }
            }
            self.expect_sym("]")?;
            return Ok(Node::List { elts });
        }
        self.postfix()
    }
}

fn aug_op(sym: &str) -> Option<BinaryOp> {
    match sym {
        "+=" => Some(BinaryOp::Add),
        "-=" => Some(BinaryOp::Sub),
        "*=" => Some(BinaryOp::Mult),
        "/=" => Some(BinaryOp::Div),
        "//=" => Some(BinaryOp::FloorDiv),
        "%=" => Some(BinaryOp::Mod),
        "**=" => Some(BinaryOp::Pow),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeKind;

    fn body_of(source: &str) -> Vec<Node> {
        let Node::Module { body } = parse(source).unwrap() else {
            panic!("parse must produce a module");
        };
        body
    }

    fn name(id: &str) -> Node {
        Node::Name { id: id.to_string() }
    }

    #[test]
    fn test_simple_assignment() {
        let body = body_of("x = 1\n");
        assert_eq!(
            body,
            vec![Node::Assign {
                targets: vec![name("x")],
                value: Box::new(Node::Constant {
                    value: Literal::Int(1),
                }),
            }]
        );
    }

    #[test]
    fn test_annotated_function_with_return_type() {
        let body = body_of("def add(a: int, b: int) -> int:\n    return a + b\n");
        let Node::FunctionDef {
            name: fname,
            args,
            body: fbody,
            returns,
            ..
        } = &body[0]
        else {
            panic!("expected function definition");
        };
        assert_eq!(fname, "add");
        assert_eq!(returns.as_deref(), Some(&name("int")));
        let Node::Arguments { args } = args.as_ref() else {
            panic!("expected parameter list");
        };
        assert_eq!(args.len(), 2);
        assert_eq!(
            args[0],
            Node::Arg {
                arg: "a".to_string(),
                annotation: Some(Box::new(name("int"))),
            }
        );
        assert!(matches!(&fbody[0], Node::Return { value: Some(_) }));
    }

    #[test]
    fn test_elif_desugars_into_orelse() {
        let body = body_of("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
        let Node::If { orelse, .. } = &body[0] else {
            panic!("expected conditional");
        };
        assert_eq!(orelse.len(), 1);
        let Node::If {
            orelse: inner_else, ..
        } = &orelse[0]
        else {
            panic!("elif must parse as a nested conditional");
        };
        assert_eq!(inner_else, &vec![Node::Pass]);
    }

    #[test]
    fn test_chained_comparison() {
        let body = body_of("ok = 0 < x <= 9\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::Compare {
            ops, comparators, ..
        } = value.as_ref()
        else {
            panic!("expected comparison");
        };
        assert_eq!(ops, &vec![CompareOp::Lt, CompareOp::LtE]);
        assert_eq!(comparators.len(), 2);
    }

    #[test]
    fn test_membership_and_identity_operators() {
        let body = body_of("r = a not in xs and b is not None\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::BoolOp { op, values } = value.as_ref() else {
            panic!("expected boolean expression");
        };
        assert_eq!(*op, BoolOpKind::And);
        assert!(
            matches!(&values[0], Node::Compare { ops, .. } if ops == &vec![CompareOp::NotIn])
        );
        assert!(
            matches!(&values[1], Node::Compare { ops, .. } if ops == &vec![CompareOp::IsNot])
        );
    }

    #[test]
    fn test_comprehension_forms() {
        let body = body_of(
            "a = [x for x in xs if x]\nb = {x for x in xs}\nc = {k: v for k, v in ps}\nd = (x for x in xs)\n",
        );
        let kinds: Vec<NodeKind> = body
            .iter()
            .map(|stmt| {
                let Node::Assign { value, .. } = stmt else {
                    panic!("expected assignment");
                };
                value.kind()
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::ListComp,
                NodeKind::SetComp,
                NodeKind::DictComp,
                NodeKind::GeneratorExp,
            ]
        );
    }

    #[test]
    fn test_comprehension_filter_not_swallowed_by_ifexp() {
        let body = body_of("a = [x for x in xs if x > 0]\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::ListComp { generators, .. } = value.as_ref() else {
            panic!("expected list comprehension");
        };
        let Node::Comprehension { ifs, .. } = &generators[0] else {
            panic!("expected comprehension clause");
        };
        assert_eq!(ifs.len(), 1);
    }

    #[test]
    fn test_with_as_and_try_except_as() {
        let body = body_of(
            "with open('f') as f:\n    pass\ntry:\n    pass\nexcept ValueError as e:\n    raise\n",
        );
        let Node::With { items, .. } = &body[0] else {
            panic!("expected with statement");
        };
        assert!(matches!(
            &items[0],
            Node::WithItem {
                optional_vars: Some(v),
                ..
            } if v.as_ref() == &name("f")
        ));
        let Node::Try { handlers, .. } = &body[1] else {
            panic!("expected try statement");
        };
        assert!(matches!(
            &handlers[0],
            Node::ExceptHandler {
                name: Some(n),
                typ: Some(_),
                ..
            } if n == "e"
        ));
    }

    #[test]
    fn test_imports() {
        let body = body_of("import os.path as p\nfrom math import sqrt, pi\n");
        assert_eq!(
            body[0],
            Node::Import {
                names: vec![Node::Alias {
                    name: "os.path".to_string(),
                    asname: Some("p".to_string()),
                }],
            }
        );
        let Node::ImportFrom { module, names } = &body[1] else {
            panic!("expected from-import");
        };
        assert_eq!(module.as_deref(), Some("math"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_call_with_keyword_and_star_args() {
        let body = body_of("f(1, x, key=2, *rest, **extra)\n");
        let Node::Expr { value } = &body[0] else {
            panic!("expected expression statement");
        };
        let Node::Call { args, keywords, .. } = value.as_ref() else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 3);
        assert!(matches!(&args[2], Node::Starred { .. }));
        assert_eq!(keywords.len(), 2);
        assert_eq!(
            keywords[1],
            Node::Keyword {
                arg: None,
                value: Box::new(name("extra")),
            }
        );
    }

    #[test]
    fn test_augmented_and_chained_assignment() {
        let body = body_of("x += 1\na = b = 2\n");
        assert!(matches!(
            &body[0],
            Node::AugAssign {
                op: BinaryOp::Add,
                ..
            }
        ));
        let Node::Assign { targets, .. } = &body[1] else {
            panic!("expected assignment");
        };
        assert_eq!(targets, &vec![name("a"), name("b")]);
    }

    #[test]
    fn test_tuple_unpacking_for_loop() {
        let body = body_of("for k, v in items:\n    pass\n");
        let Node::For { target, .. } = &body[0] else {
            panic!("expected for loop");
        };
        assert_eq!(
            target.as_ref(),
            &Node::Tuple {
                elts: vec![name("k"), name("v")],
            }
        );
    }

    #[test]
    fn test_operator_precedence() {
        let body = body_of("x = 1 + 2 * 3\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::BinOp { op, right, .. } = value.as_ref() else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(
            right.as_ref(),
            Node::BinOp {
                op: BinaryOp::Mult,
                ..
            }
        ));
    }

    #[test]
    fn test_lambda_and_conditional_expression() {
        let body = body_of("f = lambda a, b: a if a > b else b\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::Lambda { body: lbody, .. } = value.as_ref() else {
            panic!("expected lambda");
        };
        assert_eq!(lbody.kind(), NodeKind::IfExp);
    }

    #[test]
    fn test_decorated_function() {
        let body = body_of("@wraps(f)\ndef g():\n    pass\n");
        let Node::FunctionDef { decorator_list, .. } = &body[0] else {
            panic!("expected function definition");
        };
        assert_eq!(decorator_list.len(), 1);
        assert_eq!(decorator_list[0].kind(), NodeKind::Call);
    }

    #[test]
    fn test_string_escapes() {
        let body = body_of("s = 'a\\n\\t\\'b'\n");
        assert_eq!(
            body[0],
            Node::Assign {
                targets: vec![name("s")],
                value: Box::new(Node::Constant {
                    value: Literal::Str("a\n\t'b".to_string()),
                }),
            }
        );
    }

    #[test]
    fn test_bracket_continuation_and_comments() {
        let body = body_of("xs = [\n    1,  # first\n    2,\n]\n# trailing\n");
        let Node::Assign { value, .. } = &body[0] else {
            panic!("expected assignment");
        };
        let Node::List { elts } = value.as_ref() else {
            panic!("expected list display");
        };
        assert_eq!(elts.len(), 2);
    }

    #[test]
    fn test_syntax_error_carries_line() {
        let err = parse("x = 1\ny = (\n").unwrap_err();
        let Error::Syntax { line, .. } = err else {
            panic!("expected syntax error");
        };
        assert!(line >= 2);
    }

    #[test]
    fn test_inconsistent_dedent_rejected() {
        let err = parse("if a:\n        pass\n    pass\n").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
    }

    #[test]
    fn test_unterminated_string_rejected() {
        let err = parse("s = 'oops\n").unwrap_err();
        let Error::Syntax { line, .. } = err else {
            panic!("expected syntax error");
        };
        assert_eq!(line, 1);
    }

    #[test]
    fn test_class_with_base_and_keyword() {
        let body = body_of("class C(Base, metaclass=Meta):\n    pass\n");
        let Node::ClassDef {
            bases, keywords, ..
        } = &body[0]
        else {
            panic!("expected class definition");
        };
        assert_eq!(bases, &vec![name("Base")]);
        assert_eq!(keywords.len(), 1);
    }

    #[test]
    fn test_parse_unparse_round_trip() {
        let source = "def fib(n: int) -> int:\n    if n < 2:\n        return n\n    return fib(n - 1) + fib(n - 2)\n";
        let first = parse(source).unwrap();
        let printed = crate::emit::unparse(&first).unwrap();
        let second = parse(&printed).unwrap();
        assert_eq!(first, second);
    }
}
