// dynlisp error taxonomy
//
// Reader, binding, dispatch and runtime errors propagate unchanged in kind.
// Crossing a closure application wraps the error in `Error::Traced` once;
// later crossings only append frames.

use crate::types::Value;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Source position of a datum, recorded by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: Rc<str>,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: &str, line: u32) -> Self {
        Self {
            file: Rc::from(file),
            line,
        }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxErrorKind {
    #[error("unmatched closing delimiter '{0}'")]
    UnmatchedDelimiter(char),
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("malformed escape sequence '\\{0}'")]
    MalformedEscape(char),
    #[error("unknown package '{0}'")]
    UnknownPackage(String),
    #[error("unknown dispatch macro '#{0}'")]
    UnknownDispatch(char),
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
}

/// A reader failure, fatal to the current read.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{loc}: {kind}")]
pub struct SyntaxError {
    pub loc: SourceLoc,
    pub kind: SyntaxErrorKind,
}

impl SyntaxError {
    pub fn is_eof(&self) -> bool {
        self.kind == SyntaxErrorKind::UnexpectedEof
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    #[error("unbound variable '{0}'")]
    Unbound(String),
    #[error("cannot assign to constant '{0}'")]
    ConstantAssignment(String),
    #[error("cannot assign to keyword ':{0}'")]
    KeywordAssignment(String),
    #[error("constant '{0}' is already defined")]
    DuplicateConstant(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("no applicable method for operator '{operator}' with {args}")]
    NoApplicableMethod { operator: String, args: String },
    #[error("no behavior '{name}' for {class} with {args}")]
    NoBehavior {
        name: String,
        class: String,
        args: String,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("expected {expected}, got {found}")]
    Type {
        expected: &'static str,
        found: String,
    },
    #[error("{callable}: expected {expected} arguments, got {found}")]
    Arity {
        callable: String,
        expected: String,
        found: usize,
    },
    #[error("keyword arguments must come in pairs, got {0} trailing values")]
    UnpairedKeyword(usize),
    #[error("{0} is not callable")]
    NotCallable(String),
    #[error("no slot '{slot}' in {class}")]
    UnknownSlot { slot: String, class: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("evaluation depth limit of {0} exceeded")]
    DepthExceeded(usize),
    #[error("shift amount {amount} exceeds the limit of {limit} bits")]
    ShiftTooLarge { amount: i64, limit: usize },
    #[error("{0}")]
    Interop(String),
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    User(String),
}

/// One logical call frame of a backtrace.
#[derive(Debug, Clone)]
pub struct CallFrame {
    pub loc: Option<SourceLoc>,
    pub callable: String,
    pub args: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Malformed special form or parameter list, found during analysis
    #[error("{}{message}", loc_prefix(.loc))]
    Compile {
        message: String,
        loc: Option<SourceLoc>,
    },
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("{source}")]
    Traced {
        source: Box<Error>,
        /// Innermost first
        frames: Vec<CallFrame>,
    },
}

fn loc_prefix(loc: &Option<SourceLoc>) -> String {
    loc.as_ref().map(|l| format!("{l}: ")).unwrap_or_default()
}

impl Error {
    pub fn compile(message: impl Into<String>, loc: Option<SourceLoc>) -> Self {
        Error::Compile {
            message: message.into(),
            loc,
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Error::Runtime(RuntimeError::User(message.into()))
    }

    pub fn type_error(expected: &'static str, found: &Value) -> Self {
        Error::Runtime(RuntimeError::Type {
            expected,
            found: found.type_name().to_string(),
        })
    }

    /// Add a call frame, wrapping the error the first time.
    pub fn with_frame(self, frame: CallFrame) -> Self {
        match self {
            Error::Traced { source, mut frames } => {
                frames.push(frame);
                Error::Traced { source, frames }
            }
            other => Error::Traced {
                source: Box::new(other),
                frames: vec![frame],
            },
        }
    }

    /// The original error beneath any backtrace wrapper.
    pub fn root(&self) -> &Error {
        match self {
            Error::Traced { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn frames(&self) -> &[CallFrame] {
        match self {
            Error::Traced { frames, .. } => frames,
            _ => &[],
        }
    }
}

pub type EvalResult<T> = Result<T, Error>;
