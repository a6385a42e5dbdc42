//! Expression AST

use std::fmt;

use serde::Serialize;

/// Infix operator joining expression operands
///
/// `//` binds tighter than `->`, so `a -> b // c` sequences `a` before the
/// parallel pair `b // c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    /// `->`: operands run one after another
    Sequence,
    /// `//`: operands run concurrently
    Parallel,
}

impl Op {
    pub fn symbol(self) -> &'static str {
        match self {
            Op::Sequence => "->",
            Op::Parallel => "//",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One node of a parsed task expression
///
/// Siblings joined by the same operator are flattened into a single group,
/// so `a -> b -> c` is one three-way sequence rather than nested pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExprNode {
    /// A script reference with optional trailing arguments
    Task { script: String, args: Vec<String> },
    /// Operands joined by one operator
    Group { op: Op, tasks: Vec<ExprNode> },
}

impl ExprNode {
    /// Leaf constructor without arguments
    pub fn task(script: impl Into<String>) -> Self {
        ExprNode::Task {
            script: script.into(),
            args: Vec::new(),
        }
    }

    /// Leaf constructor with trailing arguments
    pub fn task_with_args(script: impl Into<String>, args: Vec<String>) -> Self {
        ExprNode::Task {
            script: script.into(),
            args,
        }
    }

    /// Group constructor
    pub fn group(op: Op, tasks: Vec<ExprNode>) -> Self {
        ExprNode::Group { op, tasks }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprNode::Task { script, args } => {
                write!(f, "{}", quote_term(script))?;
                for arg in args {
                    write!(f, " {}", quote_term(arg))?;
                }
                Ok(())
            }
            ExprNode::Group { op, tasks } => {
                for (i, task) in tasks.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    match task {
                        ExprNode::Group { .. } => write!(f, "({task})")?,
                        ExprNode::Task { .. } => write!(f, "{task}")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Quote a term for display if it contains syntax characters
fn quote_term(term: &str) -> String {
    let needs_quoting = term.is_empty()
        || term.chars().any(|c| {
            c.is_whitespace() || matches!(c, '(' | ')' | '\'' | '"' | '\\')
        })
        || term.contains("->")
        || term.contains("//");
    if needs_quoting {
        let escaped = term.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{escaped}'")
    } else {
        term.to_string()
    }
}
