//! Task expression language for convoy
//!
//! Parses command-line expressions like `build -> test // lint` into an
//! operator tree of script references. `->` sequences its operands, `//`
//! runs them in parallel, and parentheses group explicitly. The parser
//! only ever produces AST nodes; resolving them into runnable tasks is a
//! separate pass that lives with the workspace graph builder.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{ExprNode, Op};
pub use parser::parse;
