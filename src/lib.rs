// dynlisp: an embeddable Lisp with a dynamic class/behavior object system
//
// Source text goes through the reader, is analyzed into expression trees and
// evaluated by an `Interpreter`, which owns all runtime state.

pub mod types;
pub mod symbol;
pub mod error;
pub mod fastmap;
pub mod stack;
pub mod readtable;
pub mod reader;
pub mod printer;
pub mod env;
pub mod lambda_list;
pub mod analyzer;
pub mod quasi;
pub mod eval;
pub mod context;
pub mod counters;
pub mod primitives;
pub mod operators;
pub mod clos;
pub mod behavior;
pub mod interop;

pub use context::InterpreterConfig;
pub use error::{Error, EvalResult};
pub use eval::Interpreter;
pub use types::Value;
