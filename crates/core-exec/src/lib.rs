//! core-exec: the expression evaluator and macro interpreter.
//!
//! The pipeline: [`lexer`] turns script text into tokens, [`parse`] builds a
//! directly executable statement tree, and [`interp`] runs it. Values are
//! [`datum::Datum`]; editor services (built-in commands, system variables,
//! regex matching, macro-buffer bookkeeping) reach the interpreter through
//! the [`interp::Host`] trait, implemented by the command layer.

pub mod datum;
pub mod interp;
pub mod lexer;
pub mod parse;

pub use datum::{Datum, DEFAULT_N};
pub use interp::{Host, Interp, HOOK_NAMES};
pub use parse::{parse_expression, parse_script, MacroDef};
