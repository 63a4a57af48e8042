use crate::error::EvalResult;
use crate::eval::Interpreter;
use crate::lambda_list::LambdaMarkers;
use crate::symbol::{PackageId, SymbolId, SymbolTable};
use crate::types::Value;

/// Type for primitive functions
pub type PrimitiveFn = fn(&mut Interpreter, &[Value]) -> EvalResult<Value>;

/// Interpreter settings
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    /// Evaluate the bundled Lisp prelude on startup
    pub load_prelude: bool,
    /// Nested closure applications allowed before evaluation fails
    pub max_depth: usize,
    /// File name reported for code passed to `eval_str`
    pub source_name: String,
    /// Package that is current after startup
    pub package: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            load_prelude: true,
            max_depth: 10_000,
            source_name: "<eval>".to_string(),
            package: "user".to_string(),
        }
    }
}

/// Symbols recognized by the analyzer
#[derive(Debug, Clone)]
pub struct SpecialForms {
    pub quote: SymbolId,
    pub quasiquote: SymbolId,
    pub unquote: SymbolId,
    pub unquote_splicing: SymbolId,
    pub r#if: SymbolId,
    pub or: SymbolId,
    pub and: SymbolId,
    pub block: SymbolId,
    pub r#while: SymbolId,
    pub lambda: SymbolId,
    pub defmacro: SymbolId,
    pub set: SymbolId,
    pub dynamic_let: SymbolId,
    pub r#let: SymbolId,
    pub def: SymbolId,
    pub defconstant: SymbolId,
    pub call_next_method: SymbolId,
    pub next_method_p: SymbolId,
    pub defclass: SymbolId,
    pub defbehavior: SymbolId,
    pub optional: SymbolId,
    pub key: SymbolId,
    pub rest: SymbolId,
    /// Hidden first parameter of behavior methods; never exported
    pub next_method: SymbolId,
    pub before: SymbolId,
    pub after: SymbolId,
    pub around: SymbolId,
}

impl SpecialForms {
    pub fn new(symbols: &SymbolTable) -> Self {
        let intern_exported = |name: &str| {
            let sym = symbols.intern_in(name, PackageId::SYSTEM);
            symbols.export_symbol(sym);
            sym
        };

        Self {
            quote: intern_exported("quote"),
            quasiquote: intern_exported("quasiquote"),
            unquote: intern_exported("unquote"),
            unquote_splicing: intern_exported("unquote-splicing"),
            r#if: intern_exported("if"),
            or: intern_exported("or"),
            and: intern_exported("and"),
            block: intern_exported("block"),
            r#while: intern_exported("while"),
            lambda: intern_exported("lambda"),
            defmacro: intern_exported("defmacro"),
            set: intern_exported("set!"),
            dynamic_let: intern_exported("dynamic-let"),
            r#let: intern_exported("let"),
            def: intern_exported("def"),
            defconstant: intern_exported("defconstant"),
            call_next_method: intern_exported("call-next-method"),
            next_method_p: intern_exported("next-method-p"),
            defclass: intern_exported("defclass"),
            defbehavior: intern_exported("defbehavior"),
            optional: intern_exported("&optional"),
            key: intern_exported("&key"),
            rest: intern_exported("&rest"),
            next_method: symbols.intern_in("%next-method", PackageId::SYSTEM),
            before: symbols.intern_keyword("before"),
            after: symbols.intern_keyword("after"),
            around: symbols.intern_keyword("around"),
        }
    }

    pub fn lambda_markers(&self) -> LambdaMarkers {
        LambdaMarkers {
            optional: self.optional,
            key: self.key,
            rest: self.rest,
        }
    }
}
