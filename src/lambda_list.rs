// dynlisp Lambda Lists
//
// Parameter lists are flat: required names, then `&optional`, `&key` and
// `&rest` sections in that order. Optional and keyword parameters may be
// written `(name init)`.

use crate::analyzer::Expr;
use crate::error::{Error, EvalResult, SourceLoc};
use crate::symbol::{SymbolId, SymbolTable};
use crate::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParamKind {
    Required,
    Optional,
    Keyword,
    Rest,
}

/// Symbols that switch lambda-list sections
#[derive(Debug, Clone, Copy)]
pub struct LambdaMarkers {
    pub optional: SymbolId,
    pub key: SymbolId,
    pub rest: SymbolId,
}

/// A parameter as written, init form not yet analyzed
#[derive(Debug, Clone)]
pub struct RawParam {
    pub name: SymbolId,
    pub kind: ParamKind,
    pub init: Option<Value>,
    /// `:name` for keyword parameters
    pub keyword: Option<SymbolId>,
}

#[derive(Debug)]
pub struct Param {
    pub name: SymbolId,
    pub kind: ParamKind,
    /// Evaluated in the closure's defining environment
    pub init: Option<Expr>,
    pub keyword: Option<SymbolId>,
}

/// Analyzed parameter specification. Params are in declaration order, which
/// is also their slot order in the call frame.
#[derive(Debug, Default)]
pub struct ParamSpec {
    pub params: Vec<Param>,
    pub required: usize,
    pub optional: usize,
    pub keyword: usize,
    pub rest: bool,
}

impl ParamSpec {
    /// Only required parameters: calls can take the fast binding path.
    pub fn is_simple(&self) -> bool {
        self.optional == 0 && self.keyword == 0 && !self.rest
    }

    pub fn names(&self) -> Vec<SymbolId> {
        self.params.iter().map(|p| p.name).collect()
    }

    pub fn accepts_any_count(&self) -> bool {
        self.rest || self.keyword > 0
    }

    /// Human readable arity for error messages
    pub fn arity_description(&self) -> String {
        if self.accepts_any_count() {
            format!("at least {}", self.required)
        } else if self.optional > 0 {
            format!("{} to {}", self.required, self.required + self.optional)
        } else {
            self.required.to_string()
        }
    }
}

/// Parse a lambda list. Sections must appear in strict order; revisiting one
/// or naming more than one rest parameter is an error.
pub fn parse_lambda_list(
    symbols: &SymbolTable,
    markers: &LambdaMarkers,
    list: &Value,
    loc: Option<&SourceLoc>,
) -> EvalResult<Vec<RawParam>> {
    let fail = |msg: String| Error::compile(msg, loc.cloned());
    let items = list
        .list_to_vec()
        .ok_or_else(|| fail("parameter list must be a proper list".to_string()))?;

    let mut params = Vec::with_capacity(items.len());
    let mut section = ParamKind::Required;

    for item in items {
        if let Some(sym) = item.as_symbol() {
            let next_section = if sym == markers.optional {
                Some(ParamKind::Optional)
            } else if sym == markers.key {
                Some(ParamKind::Keyword)
            } else if sym == markers.rest {
                Some(ParamKind::Rest)
            } else {
                None
            };
            if let Some(next) = next_section {
                if next <= section {
                    return Err(fail(format!(
                        "{} out of order in parameter list",
                        symbols.symbol_name(sym)
                    )));
                }
                section = next;
                continue;
            }
        }

        let (name, init) = match &item {
            Value::Symbol(sym) => (*sym, None),
            Value::Cons(_) if matches!(section, ParamKind::Optional | ParamKind::Keyword) => {
                let parts = item.list_to_vec().unwrap_or_default();
                match parts.as_slice() {
                    [Value::Symbol(sym), init] => (*sym, Some(init.clone())),
                    [Value::Symbol(sym)] => (*sym, None),
                    _ => return Err(fail("malformed parameter with default".to_string())),
                }
            }
            other => {
                return Err(fail(format!(
                    "parameter must be a symbol, got {}",
                    other.type_name()
                )))
            }
        };

        if symbols.is_keyword(name) || symbols.get_symbol(name).is_some_and(|s| s.is_constant()) {
            return Err(fail(format!(
                "cannot use {} as a parameter",
                symbols.symbol_name(name)
            )));
        }

        if section == ParamKind::Rest && params.iter().any(|p: &RawParam| p.kind == ParamKind::Rest) {
            return Err(fail("more than one &rest parameter".to_string()));
        }

        let keyword = (section == ParamKind::Keyword)
            .then(|| symbols.intern_keyword(&symbols.symbol_name(name)));

        params.push(RawParam {
            name,
            kind: section,
            init,
            keyword,
        });
    }

    if section == ParamKind::Rest && !params.iter().any(|p| p.kind == ParamKind::Rest) {
        return Err(fail("&rest requires a parameter name".to_string()));
    }

    Ok(params)
}
