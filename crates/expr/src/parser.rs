//! Recursive-descent expression parser
//!
//! Single pass over the token stream, maintaining a current node per root:
//! leaves join the tree through the pending operator, same-operator
//! siblings flatten into one group, and a differing operator either nests
//! (`//` inside a sequence) or wraps the built node (`->` after a parallel
//! run). Parenthesized sub-expressions parse recursively and behave as
//! closed atoms afterwards.

use convoy_core::{Error, Result};

use crate::ast::{ExprNode, Op};
use crate::lexer::{lex, SpannedToken, Token};

/// Parse an expression string into its top-level roots
///
/// Most inputs have exactly one root; independent expressions separated by
/// nothing but whitespace (e.g. two parenthesized groups back to back)
/// come out as separate roots.
pub fn parse(input: &str) -> Result<Vec<ExprNode>> {
    let tokens = lex(input)?;
    Parser { tokens, pos: 0 }.parse_roots()
}

/// Parser-internal node: the public AST plus the bookkeeping the pass
/// needs (whether a node is closed to further joining/arguments)
#[derive(Debug, Clone)]
enum PNode {
    Task {
        script: String,
        args: Vec<String>,
        closed: bool,
    },
    Group {
        op: Op,
        children: Vec<PNode>,
        closed: bool,
    },
}

impl PNode {
    fn leaf(script: String) -> Self {
        PNode::Task {
            script,
            args: Vec::new(),
            closed: false,
        }
    }

    fn close(&mut self) {
        match self {
            PNode::Task { closed, .. } => *closed = true,
            PNode::Group { closed, .. } => *closed = true,
        }
    }

    /// The open script leaf at the end of the right spine, if any; this is
    /// the attachment point for trailing arguments
    fn rightmost_open_task_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            PNode::Task {
                closed: false,
                args,
                ..
            } => Some(args),
            PNode::Group {
                closed: false,
                children,
                ..
            } => children
                .last_mut()
                .and_then(PNode::rightmost_open_task_mut),
            _ => None,
        }
    }

    fn into_expr(self) -> ExprNode {
        match self {
            PNode::Task { script, args, .. } => ExprNode::Task { script, args },
            PNode::Group { op, children, .. } => ExprNode::Group {
                op,
                tasks: children.into_iter().map(PNode::into_expr).collect(),
            },
        }
    }
}

/// Join `leaf` onto the tree built so far through `op`
///
/// Same operator: flatten into the existing group. `//` against a
/// sequence: nest around the sequence's last operand (parallel binds
/// tighter). `->` against a parallel group: the whole group becomes the
/// sequence's first operand.
fn join(cur: PNode, op: Op, leaf: PNode) -> PNode {
    match cur {
        PNode::Group {
            op: gop,
            mut children,
            closed: false,
        } => {
            if gop == op {
                children.push(leaf);
                PNode::Group {
                    op: gop,
                    children,
                    closed: false,
                }
            } else if op == Op::Parallel {
                let last = children.pop().expect("a group has at least one operand");
                children.push(join(last, op, leaf));
                PNode::Group {
                    op: gop,
                    children,
                    closed: false,
                }
            } else {
                PNode::Group {
                    op,
                    children: vec![
                        PNode::Group {
                            op: gop,
                            children,
                            closed: false,
                        },
                        leaf,
                    ],
                    closed: false,
                }
            }
        }
        other => PNode::Group {
            op,
            children: vec![other, leaf],
            closed: false,
        },
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn next(&mut self) -> Option<SpannedToken> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_roots(mut self) -> Result<Vec<ExprNode>> {
        let mut roots: Vec<PNode> = Vec::new();
        let mut current: Option<PNode> = None;
        let mut pending: Option<(Op, usize)> = None;

        while let Some(st) = self.next() {
            match st.token {
                Token::CloseParen => {
                    return Err(Error::parse(st.pos, "unexpected ')'"));
                }
                Token::OpenParen => {
                    let node = self.parse_group(st.pos)?;
                    place(&mut current, &mut pending, node, st.pos, Some(&mut roots))?;
                }
                Token::Arrow => operator(&current, &mut pending, Op::Sequence, st.pos)?,
                Token::Parallel => operator(&current, &mut pending, Op::Parallel, st.pos)?,
                Token::Term { text, .. } => {
                    term(&mut current, &mut pending, text, st.pos, Some(&mut roots))?;
                }
            }
        }

        if let Some((op, pos)) = pending {
            return Err(Error::parse(
                pos,
                format!("operator '{}' is missing its right-hand operand", op.symbol()),
            ));
        }
        if let Some(cur) = current {
            roots.push(cur);
        }
        Ok(roots.into_iter().map(PNode::into_expr).collect())
    }

    /// Parse a parenthesized sub-expression; the opening `(` has been
    /// consumed
    fn parse_group(&mut self, open_pos: usize) -> Result<PNode> {
        let mut current: Option<PNode> = None;
        let mut pending: Option<(Op, usize)> = None;

        loop {
            let Some(st) = self.next() else {
                return Err(Error::parse(open_pos, "missing closing ')'"));
            };
            match st.token {
                Token::CloseParen => {
                    if let Some((op, pos)) = pending {
                        return Err(Error::parse(
                            pos,
                            format!(
                                "operator '{}' is missing its right-hand operand",
                                op.symbol()
                            ),
                        ));
                    }
                    let Some(mut node) = current else {
                        return Err(Error::parse(open_pos, "empty group"));
                    };
                    node.close();
                    return Ok(node);
                }
                Token::OpenParen => {
                    let node = self.parse_group(st.pos)?;
                    place(&mut current, &mut pending, node, st.pos, None)?;
                }
                Token::Arrow => operator(&current, &mut pending, Op::Sequence, st.pos)?,
                Token::Parallel => operator(&current, &mut pending, Op::Parallel, st.pos)?,
                Token::Term { text, .. } => {
                    term(&mut current, &mut pending, text, st.pos, None)?;
                }
            }
        }
    }
}

fn operator(
    current: &Option<PNode>,
    pending: &mut Option<(Op, usize)>,
    op: Op,
    pos: usize,
) -> Result<()> {
    if current.is_none() || pending.is_some() {
        return Err(Error::parse(
            pos,
            format!("operator '{}' has no left-hand operand", op.symbol()),
        ));
    }
    *pending = Some((op, pos));
    Ok(())
}

fn term(
    current: &mut Option<PNode>,
    pending: &mut Option<(Op, usize)>,
    text: String,
    pos: usize,
    roots: Option<&mut Vec<PNode>>,
) -> Result<()> {
    // A term right after an open script leaf is a trailing argument
    if pending.is_none() {
        if let Some(args) = current
            .as_mut()
            .and_then(PNode::rightmost_open_task_mut)
        {
            args.push(text);
            return Ok(());
        }
    }
    place(current, pending, PNode::leaf(text), pos, roots)
}

fn place(
    current: &mut Option<PNode>,
    pending: &mut Option<(Op, usize)>,
    node: PNode,
    pos: usize,
    roots: Option<&mut Vec<PNode>>,
) -> Result<()> {
    match (current.take(), pending.take()) {
        (None, _) => {
            *current = Some(node);
        }
        (Some(cur), Some((op, _))) => {
            *current = Some(join(cur, op, node));
        }
        (Some(cur), None) => match roots {
            // A completed expression followed by a fresh term starts a new
            // top-level root
            Some(roots) => {
                roots.push(cur);
                *current = Some(node);
            }
            None => {
                return Err(Error::parse(pos, "expected an operator before this term"));
            }
        },
    }
    Ok(())
}
