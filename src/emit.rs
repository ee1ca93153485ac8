//! Tree-to-source conversion
//!
//! The final step of a generation: print the mutated tree back to Python
//! text. Printing carries a recursion ceiling; exceeding it returns
//! [`Error::UnparseDepth`], the signal the retry loop treats as "a cycle
//! escaped validation" rather than looping forever.

use crate::ast::{Literal, Node};
use crate::error::{Error, Result};

/// Recursion ceiling for printing
pub const UNPARSE_DEPTH_LIMIT: usize = 256;

/// Convert a tree to source text
pub fn unparse(root: &Node) -> Result<String> {
    let mut printer = Printer { depth: 0 };
    match root {
        Node::Module { body } => printer.block_at(body, 0),
        _ => {
            // single statements and bare expressions print too, mostly for
            // diagnostics and tests
            if is_statement(root) {
                printer.stmt(root, 0)
            } else {
                printer.expr(root)
            }
        }
    }
}

fn is_statement(node: &Node) -> bool {
    matches!(
        node,
        Node::Module { .. }
            | Node::FunctionDef { .. }
            | Node::ClassDef { .. }
            | Node::Return { .. }
            | Node::Delete { .. }
            | Node::Assign { .. }
            | Node::AugAssign { .. }
            | Node::For { .. }
            | Node::While { .. }
            | Node::If { .. }
            | Node::With { .. }
            | Node::Raise { .. }
            | Node::Try { .. }
            | Node::Assert { .. }
            | Node::Import { .. }
            | Node::ImportFrom { .. }
            | Node::Expr { .. }
            | Node::Pass
            | Node::Break
            | Node::Continue
    )
}

struct Printer {
    depth: usize,
}

impl Printer {
    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > UNPARSE_DEPTH_LIMIT {
            return Err(Error::UnparseDepth {
                limit: UNPARSE_DEPTH_LIMIT,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Indented statement block; an empty body prints `pass`
    fn block_at(&mut self, body: &[Node], indent: usize) -> Result<String> {
        if body.is_empty() {
            return Ok(format!("{}pass", "    ".repeat(indent)));
        }
        let lines = body
            .iter()
            .map(|s| self.stmt(s, indent))
            .collect::<Result<Vec<_>>>()?;
        Ok(lines.join("\n"))
    }

    #[allow(clippy::too_many_lines)]
    fn stmt(&mut self, node: &Node, indent: usize) -> Result<String> {
        self.enter()?;
        let pad = "    ".repeat(indent);
        let out = match node {
            Node::Module { body } => self.block_at(body, indent)?,
            Node::FunctionDef {
                name,
                args,
                body,
                decorator_list,
                returns,
            } => {
                let mut lines = Vec::new();
                for dec in decorator_list {
                    lines.push(format!("{pad}@{}", self.expr(dec)?));
                }
                let params = self.parameters(args)?;
                let arrow = match returns {
                    Some(r) => format!(" -> {}", self.expr(r)?),
                    None => String::new(),
                };
                lines.push(format!("{pad}def {name}({params}){arrow}:"));
                lines.push(self.block_at(body, indent + 1)?);
                lines.join("\n")
            }
            Node::ClassDef {
                name,
                bases,
                keywords,
                body,
                decorator_list,
            } => {
                let mut lines = Vec::new();
                for dec in decorator_list {
                    lines.push(format!("{pad}@{}", self.expr(dec)?));
                }
                let mut heads = Vec::new();
                for base in bases {
                    heads.push(self.expr(base)?);
                }
                for kw in keywords {
                    heads.push(self.expr(kw)?);
                }
                if heads.is_empty() {
                    lines.push(format!("{pad}class {name}:"));
                } else {
                    lines.push(format!("{pad}class {name}({}):", heads.join(", ")));
                }
                lines.push(self.block_at(body, indent + 1)?);
                lines.join("\n")
            }
            Node::Return { value } => match value {
                Some(v) => format!("{pad}return {}", self.expr(v)?),
                None => format!("{pad}return"),
            },
            Node::Delete { targets } => {
                format!("{pad}del {}", self.comma_list(targets)?)
            }
            Node::Assign { targets, value } => {
                let lhs = targets
                    .iter()
                    .map(|t| self.expr(t))
                    .collect::<Result<Vec<_>>>()?
                    .join(" = ");
                format!("{pad}{lhs} = {}", self.expr(value)?)
            }
            Node::AugAssign { target, op, value } => {
                format!(
                    "{pad}{} {}= {}",
                    self.expr(target)?,
                    op.to_str(),
                    self.expr(value)?
                )
            }
            Node::For {
                target,
                iter,
                body,
                orelse,
            } => {
                let mut out = format!(
                    "{pad}for {} in {}:\n{}",
                    self.target_expr(target)?,
                    self.expr(iter)?,
                    self.block_at(body, indent + 1)?
                );
                if !orelse.is_empty() {
                    out.push_str(&format!(
                        "\n{pad}else:\n{}",
                        self.block_at(orelse, indent + 1)?
                    ));
                }
                out
            }
            Node::While { test, body, orelse } => {
                let mut out = format!(
                    "{pad}while {}:\n{}",
                    self.expr(test)?,
                    self.block_at(body, indent + 1)?
                );
                if !orelse.is_empty() {
                    out.push_str(&format!(
                        "\n{pad}else:\n{}",
                        self.block_at(orelse, indent + 1)?
                    ));
                }
                out
            }
            Node::If { .. } => self.if_chain(node, indent, "if")?,
            Node::With { items, body } => {
                let rendered = items
                    .iter()
                    .map(|i| self.expr(i))
                    .collect::<Result<Vec<_>>>()?;
                format!(
                    "{pad}with {}:\n{}",
                    rendered.join(", "),
                    self.block_at(body, indent + 1)?
                )
            }
            Node::Raise { exc } => match exc {
                Some(e) => format!("{pad}raise {}", self.expr(e)?),
                None => format!("{pad}raise"),
            },
            Node::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                let mut out = format!("{pad}try:\n{}", self.block_at(body, indent + 1)?);
                for handler in handlers {
                    out.push_str(&format!("\n{}", self.handler(handler, indent)?));
                }
                if !orelse.is_empty() {
                    out.push_str(&format!(
                        "\n{pad}else:\n{}",
                        self.block_at(orelse, indent + 1)?
                    ));
                }
                if !finalbody.is_empty() {
                    out.push_str(&format!(
                        "\n{pad}finally:\n{}",
                        self.block_at(finalbody, indent + 1)?
                    ));
                }
                out
            }
            Node::Assert { test, msg } => match msg {
                Some(m) => format!("{pad}assert {}, {}", self.expr(test)?, self.expr(m)?),
                None => format!("{pad}assert {}", self.expr(test)?),
            },
            Node::Import { names } => {
                format!("{pad}import {}", self.alias_list(names)?)
            }
            Node::ImportFrom { module, names } => {
                let module = module.as_deref().unwrap_or(".");
                format!("{pad}from {module} import {}", self.alias_list(names)?)
            }
            Node::Expr { value } => format!("{pad}{}", self.expr(value)?),
            Node::Pass => format!("{pad}pass"),
            Node::Break => format!("{pad}break"),
            Node::Continue => format!("{pad}continue"),
            other => format!("{pad}{}", self.expr(other)?),
        };
        self.leave();
        Ok(out)
    }

    /// `if` / `elif` chains: a lone `If` in the else branch folds into `elif`
    fn if_chain(&mut self, node: &Node, indent: usize, keyword: &str) -> Result<String> {
        let pad = "    ".repeat(indent);
        let Node::If { test, body, orelse } = node else {
            return self.stmt(node, indent);
        };
        let mut out = format!(
            "{pad}{keyword} {}:\n{}",
            self.expr(test)?,
            self.block_at(body, indent + 1)?
        );
        match orelse.as_slice() {
            [] => {}
            [chained @ Node::If { .. }] => {
                out.push_str(&format!("\n{}", self.if_chain(chained, indent, "elif")?));
            }
            _ => {
                out.push_str(&format!(
                    "\n{pad}else:\n{}",
                    self.block_at(orelse, indent + 1)?
                ));
            }
        }
        Ok(out)
    }

    fn handler(&mut self, node: &Node, indent: usize) -> Result<String> {
        let pad = "    ".repeat(indent);
        let Node::ExceptHandler { typ, name, body } = node else {
            return self.stmt(node, indent);
        };
        let head = match (typ, name) {
            (Some(t), Some(n)) => format!("{pad}except {} as {n}:", self.expr(t)?),
            (Some(t), None) => format!("{pad}except {}:", self.expr(t)?),
            _ => format!("{pad}except:"),
        };
        Ok(format!("{head}\n{}", self.block_at(body, indent + 1)?))
    }

    #[allow(clippy::too_many_lines)]
    fn expr(&mut self, node: &Node) -> Result<String> {
        self.enter()?;
        let out = match node {
            Node::BoolOp { op, values } => {
                let parts = values
                    .iter()
                    .map(|v| self.expr(v))
                    .collect::<Result<Vec<_>>>()?;
                format!("({})", parts.join(&format!(" {} ", op.to_str())))
            }
            Node::BinOp { left, op, right } => {
                format!(
                    "({} {} {})",
                    self.expr(left)?,
                    op.to_str(),
                    self.expr(right)?
                )
            }
            Node::UnaryOp { op, operand } => {
                format!("({}{})", op.to_str(), self.expr(operand)?)
            }
            Node::Lambda { args, body } => {
                let params = self.parameters(args)?;
                if params.is_empty() {
                    format!("(lambda: {})", self.expr(body)?)
                } else {
                    format!("(lambda {params}: {})", self.expr(body)?)
                }
            }
            Node::IfExp { test, body, orelse } => {
                format!(
                    "({} if {} else {})",
                    self.expr(body)?,
                    self.expr(test)?,
                    self.expr(orelse)?
                )
            }
            Node::Dict { keys, values } => {
                let pairs = keys
                    .iter()
                    .zip(values.iter())
                    .map(|(k, v)| Ok(format!("{}: {}", self.expr(k)?, self.expr(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                format!("{{{}}}", pairs.join(", "))
            }
            Node::Set { elts } => {
                if elts.is_empty() {
                    "set()".to_string()
                } else {
                    format!("{{{}}}", self.comma_list(elts)?)
                }
            }
            Node::ListComp { elt, generators } => {
                format!("[{}{}]", self.expr(elt)?, self.generators(generators)?)
            }
            Node::SetComp { elt, generators } => {
                format!("{{{}{}}}", self.expr(elt)?, self.generators(generators)?)
            }
            Node::DictComp {
                key,
                value,
                generators,
            } => {
                format!(
                    "{{{}: {}{}}}",
                    self.expr(key)?,
                    self.expr(value)?,
                    self.generators(generators)?
                )
            }
            Node::GeneratorExp { elt, generators } => {
                format!("({}{})", self.expr(elt)?, self.generators(generators)?)
            }
            Node::Yield { value } => match value {
                Some(v) => format!("(yield {})", self.expr(v)?),
                None => "(yield)".to_string(),
            },
            Node::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut out = format!("({}", self.expr(left)?);
                for (op, comparator) in ops.iter().zip(comparators.iter()) {
                    out.push_str(&format!(" {} {}", op.to_str(), self.expr(comparator)?));
                }
                out.push(')');
                out
            }
            Node::Call {
                func,
                args,
                keywords,
            } => {
                let mut rendered = args
                    .iter()
                    .map(|a| self.expr(a))
                    .collect::<Result<Vec<_>>>()?;
                for kw in keywords {
                    rendered.push(self.expr(kw)?);
                }
                format!("{}({})", self.expr(func)?, rendered.join(", "))
            }
            Node::Keyword { arg, value } => match arg {
                Some(name) => format!("{name}={}", self.expr(value)?),
                None => format!("**{}", self.expr(value)?),
            },
            Node::Constant { value } => literal(value),
            Node::Attribute { value, attr } => format!("{}.{attr}", self.expr(value)?),
            Node::Subscript { value, index } => {
                format!("{}[{}]", self.expr(value)?, self.expr(index)?)
            }
            Node::Starred { value } => format!("*{}", self.expr(value)?),
            Node::Name { id } => id.clone(),
            Node::List { elts } => format!("[{}]", self.comma_list(elts)?),
            Node::Tuple { elts } => match elts.len() {
                0 => "()".to_string(),
                1 => format!("({},)", self.expr(&elts[0])?),
                _ => format!("({})", self.comma_list(elts)?),
            },
            Node::WithItem {
                context_expr,
                optional_vars,
            } => match optional_vars {
                Some(v) => format!("{} as {}", self.expr(context_expr)?, self.expr(v)?),
                None => self.expr(context_expr)?,
            },
            Node::Arguments { .. } => self.parameters(node)?,
            Node::Arg { arg, annotation } => match annotation {
                Some(a) => format!("{arg}: {}", self.expr(a)?),
                None => arg.clone(),
            },
            Node::Alias { name, asname } => match asname {
                Some(asname) => format!("{name} as {asname}"),
                None => name.clone(),
            },
            Node::Comprehension { target, iter, ifs } => {
                let mut out = format!(
                    " for {} in {}",
                    self.target_expr(target)?,
                    self.expr(iter)?
                );
                for cond in ifs {
                    out.push_str(&format!(" if {}", self.expr(cond)?));
                }
                out
            }
            Node::ExceptHandler { .. } => self.handler(node, 0)?,
            other => self.stmt(other, 0)?,
        };
        self.leave();
        Ok(out)
    }

    /// Loop and comprehension targets print without tuple parentheses
    fn target_expr(&mut self, node: &Node) -> Result<String> {
        match node {
            Node::Tuple { elts } if !elts.is_empty() => self.comma_list(elts),
            _ => self.expr(node),
        }
    }

    fn generators(&mut self, generators: &[Node]) -> Result<String> {
        let mut out = String::new();
        for generator in generators {
            out.push_str(&self.expr(generator)?);
        }
        Ok(out)
    }

    fn parameters(&mut self, args: &Node) -> Result<String> {
        let Node::Arguments { args } = args else {
            return self.expr(args);
        };
        let rendered = args
            .iter()
            .map(|a| self.expr(a))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }

    fn comma_list(&mut self, elements: &[Node]) -> Result<String> {
        let rendered = elements
            .iter()
            .map(|e| self.expr(e))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join(", "))
    }

    fn alias_list(&mut self, names: &[Node]) -> Result<String> {
        self.comma_list(names)
    }
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{f:.1}")
            } else {
                f.to_string()
            }
        }
        Literal::Str(s) => {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('\'', "\\'")
                .replace('\n', "\\n")
                .replace('\t', "\\t");
            format!("'{escaped}'")
        }
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::None => "None".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, CompareOp};

    fn name(id: &str) -> Node {
        Node::Name { id: id.to_string() }
    }

    fn int(n: i64) -> Node {
        Node::Constant {
            value: Literal::Int(n),
        }
    }

    #[test]
    fn test_assign_to_source() {
        let node = Node::Module {
            body: vec![Node::Assign {
                targets: vec![name("x")],
                value: Box::new(int(1)),
            }],
        };
        assert_eq!(unparse(&node).unwrap(), "x = 1");
    }

    #[test]
    fn test_binop_parenthesized() {
        let node = Node::BinOp {
            left: Box::new(name("a")),
            op: BinaryOp::Add,
            right: Box::new(name("b")),
        };
        assert_eq!(unparse(&node).unwrap(), "(a + b)");
    }

    #[test]
    fn test_function_def_to_source() {
        let node = Node::FunctionDef {
            name: "double".to_string(),
            args: Box::new(Node::Arguments {
                args: vec![Node::Arg {
                    arg: "x".to_string(),
                    annotation: Some(Box::new(name("int"))),
                }],
            }),
            body: vec![Node::Return {
                value: Some(Box::new(Node::BinOp {
                    left: Box::new(name("x")),
                    op: BinaryOp::Mult,
                    right: Box::new(int(2)),
                })),
            }],
            decorator_list: vec![],
            returns: Some(Box::new(name("int"))),
        };
        let code = unparse(&node).unwrap();
        assert!(code.contains("def double(x: int) -> int:"));
        assert!(code.contains("    return (x * 2)"));
    }

    #[test]
    fn test_elif_folding() {
        let node = Node::If {
            test: Box::new(name("a")),
            body: vec![Node::Pass],
            orelse: vec![Node::If {
                test: Box::new(name("b")),
                body: vec![Node::Pass],
                orelse: vec![Node::Break],
            }],
        };
        let code = unparse(&node).unwrap();
        assert!(code.contains("elif b:"));
        assert!(code.contains("else:"));
    }

    #[test]
    fn test_empty_body_prints_pass() {
        let node = Node::While {
            test: Box::new(name("x")),
            body: vec![],
            orelse: vec![],
        };
        assert_eq!(unparse(&node).unwrap(), "while x:\n    pass");
    }

    #[test]
    fn test_chained_compare() {
        let node = Node::Compare {
            left: Box::new(int(0)),
            ops: vec![CompareOp::Lt, CompareOp::LtE],
            comparators: vec![name("x"), int(9)],
        };
        assert_eq!(unparse(&node).unwrap(), "(0 < x <= 9)");
    }

    #[test]
    fn test_listcomp_to_source() {
        let node = Node::ListComp {
            elt: Box::new(name("x")),
            generators: vec![Node::Comprehension {
                target: Box::new(name("x")),
                iter: Box::new(name("items")),
                ifs: vec![name("x")],
            }],
        };
        assert_eq!(unparse(&node).unwrap(), "[x for x in items if x]");
    }

    #[test]
    fn test_depth_limit_reports_suspected_cycle() {
        let mut node = name("x");
        for _ in 0..(UNPARSE_DEPTH_LIMIT + 8) {
            node = Node::UnaryOp {
                op: crate::ast::UnaryOpKind::USub,
                operand: Box::new(node),
            };
        }
        let err = unparse(&node).unwrap_err();
        assert!(matches!(err, Error::UnparseDepth { .. }));
    }

    #[test]
    fn test_with_statement() {
        let node = Node::With {
            items: vec![Node::WithItem {
                context_expr: Box::new(Node::Call {
                    func: Box::new(name("open")),
                    args: vec![Node::Constant {
                        value: Literal::Str("f.txt".to_string()),
                    }],
                    keywords: vec![],
                }),
                optional_vars: Some(Box::new(name("f"))),
            }],
            body: vec![Node::Pass],
        };
        assert_eq!(
            unparse(&node).unwrap(),
            "with open('f.txt') as f:\n    pass"
        );
    }

    #[test]
    fn test_string_literal_escaping() {
        let node = Node::Constant {
            value: Literal::Str("it's\n".to_string()),
        };
        assert_eq!(unparse(&node).unwrap(), "'it\\'s\\n'");
    }
}
