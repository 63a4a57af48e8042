// dynlisp Analyzer
//
// Turns data into an expression tree. Symbols are resolved to lexical slots,
// dynamic references or globals once, here; macros are expanded here too, so
// evaluation never sees a macro call.

use crate::behavior::Qualifier;
use crate::env::{Scope, VarRef};
use crate::error::{Error, EvalResult, SourceLoc};
use crate::eval::Interpreter;
use crate::lambda_list::{parse_lambda_list, Param, ParamKind, ParamSpec};
use crate::reader::SourceMap;
use crate::symbol::{SymbolId, SymbolKind};
use crate::types::Value;
use std::rc::Rc;
use std::sync::Arc;

/// Everything a `lambda` needs besides its environment
#[derive(Debug)]
pub struct LambdaTemplate {
    pub name: Option<SymbolId>,
    pub params: Rc<ParamSpec>,
    pub body: Rc<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructOp {
    List,
    /// Concatenate lists; the last part becomes the shared tail
    Append,
    /// Turn the single list part into a vector
    Vector,
}

#[derive(Debug)]
pub enum SlotInit {
    Constant(Value),
    /// Zero-argument lambda run on first read
    Computed(Rc<LambdaTemplate>),
}

#[derive(Debug)]
pub enum Expr {
    Literal(Value),
    Local {
        level: usize,
        index: usize,
        name: SymbolId,
    },
    Global(SymbolId),
    Dynamic(SymbolId),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Or(Vec<Expr>),
    And(Vec<Expr>),
    /// Two or more expressions, value of the last
    Block(Vec<Expr>),
    While(Box<Expr>, Box<Expr>),
    Lambda(Rc<LambdaTemplate>),
    DefMacro(SymbolId, Rc<LambdaTemplate>),
    Def(SymbolId, Box<Expr>),
    DefConstant(SymbolId, Box<Expr>),
    SetLocal {
        level: usize,
        index: usize,
        value: Box<Expr>,
    },
    SetGlobal(SymbolId, Box<Expr>),
    SetDynamic(SymbolId, Box<Expr>),
    SetMember {
        name: Arc<str>,
        object: Box<Expr>,
        value: Box<Expr>,
        loc: Option<SourceLoc>,
    },
    DynamicLet {
        bindings: Vec<(SymbolId, Expr)>,
        body: Box<Expr>,
    },
    Let {
        inits: Vec<Expr>,
        body: Box<Expr>,
    },
    Apply {
        callee: Box<Expr>,
        args: Vec<Expr>,
        loc: Option<SourceLoc>,
    },
    Member {
        name: Arc<str>,
        object: Box<Expr>,
        args: Vec<Expr>,
        loc: Option<SourceLoc>,
    },
    CallNext {
        next: Box<Expr>,
        /// `None` reuses the arguments of the current call
        args: Option<Vec<Expr>>,
        loc: Option<SourceLoc>,
    },
    NextMethodP(Box<Expr>),
    Construct(ConstructOp, Vec<Expr>),
    DefClass {
        name: SymbolId,
        parents: Vec<Expr>,
        slots: Vec<(Arc<str>, SlotInit)>,
    },
    DefBehavior {
        target: Box<Expr>,
        name: Arc<str>,
        qualifier: Qualifier,
        method: Rc<LambdaTemplate>,
    },
}

/// Per top-level form analysis state
#[derive(Debug, Default)]
pub struct AnalysisContext {
    pub scope: Scope,
    locations: SourceMap,
    /// Location of the macro call whose expansion is being analyzed
    fallback: Option<SourceLoc>,
}

impl AnalysisContext {
    pub fn new(locations: SourceMap) -> Self {
        Self {
            scope: Scope::new(),
            locations,
            fallback: None,
        }
    }

    pub fn loc_of(&self, form: &Value) -> Option<SourceLoc> {
        self.locations
            .location_of(form)
            .cloned()
            .or_else(|| self.fallback.clone())
    }
}

/// `.name` heads denote member access
pub fn member_name(name: &str) -> Option<&str> {
    let rest = name.strip_prefix('.')?;
    if rest.is_empty() || rest.starts_with('.') {
        return None;
    }
    Some(rest)
}

impl Interpreter {
    pub fn analyze(&mut self, form: &Value, cx: &mut AnalysisContext) -> EvalResult<Expr> {
        match form {
            Value::Symbol(sym) => self.analyze_symbol(*sym, cx),
            Value::Cons(_) => self.analyze_list(form, cx),
            other => Ok(Expr::Literal(other.clone())),
        }
    }

    fn analyze_symbol(&self, sym: SymbolId, cx: &AnalysisContext) -> EvalResult<Expr> {
        match self.symbols.kind(sym) {
            SymbolKind::Keyword => return Ok(Expr::Literal(Value::Symbol(sym))),
            SymbolKind::Constant => {
                if let Some(value) = self.globals.get(&sym) {
                    return Ok(Expr::Literal(value.clone()));
                }
            }
            SymbolKind::Plain => {}
        }
        if self.symbols.is_dynamic(sym) {
            return Ok(Expr::Dynamic(sym));
        }
        Ok(match cx.scope.lookup(sym) {
            VarRef::Local { level, index } => Expr::Local {
                level,
                index,
                name: sym,
            },
            VarRef::Global => Expr::Global(sym),
        })
    }

    /// Analyze a body: nothing is null, one form stands alone.
    pub(crate) fn analyze_body(&mut self, forms: &[Value], cx: &mut AnalysisContext) -> EvalResult<Expr> {
        match forms {
            [] => Ok(Expr::Literal(Value::Null)),
            [single] => self.analyze(single, cx),
            many => {
                let exprs = many
                    .iter()
                    .map(|f| self.analyze(f, cx))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Expr::Block(exprs))
            }
        }
    }

    fn analyze_all(&mut self, forms: &[Value], cx: &mut AnalysisContext) -> EvalResult<Vec<Expr>> {
        forms.iter().map(|f| self.analyze(f, cx)).collect()
    }

    fn analyze_list(&mut self, form: &Value, cx: &mut AnalysisContext) -> EvalResult<Expr> {
        let loc = cx.loc_of(form);
        let items = form
            .list_to_vec()
            .ok_or_else(|| Error::compile("cannot evaluate a dotted list", loc.clone()))?;
        let (head, args) = items
            .split_first()
            .ok_or_else(|| Error::compile("empty application", loc.clone()))?;

        if let Value::Symbol(sym) = head {
            let sym = *sym;
            if let Some(expr) = self.analyze_special(sym, args, &loc, cx)? {
                return Ok(expr);
            }
            if cx.scope.lookup(sym) == VarRef::Global {
                if let Some(Value::Macro(expander)) = self.globals.get(&sym).cloned() {
                    self.counters.macro_expansions += 1;
                    let expansion = self.apply_closure(&expander, args, loc.as_ref())?;
                    let saved = cx.fallback.take();
                    cx.fallback = loc.or_else(|| saved.clone());
                    let result = self.analyze(&expansion, cx);
                    cx.fallback = saved;
                    return result;
                }
            }
            let name = self.symbols.symbol_name(sym);
            if let Some(member) = member_name(&name) {
                let (object, rest) = args.split_first().ok_or_else(|| {
                    Error::compile(format!("{name} needs an object"), loc.clone())
                })?;
                return Ok(Expr::Member {
                    name: Arc::from(member),
                    object: Box::new(self.analyze(object, cx)?),
                    args: self.analyze_all(rest, cx)?,
                    loc,
                });
            }
        }

        Ok(Expr::Apply {
            callee: Box::new(self.analyze(head, cx)?),
            args: self.analyze_all(args, cx)?,
            loc,
        })
    }

    fn analyze_special(
        &mut self,
        sym: SymbolId,
        args: &[Value],
        loc: &Option<SourceLoc>,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Option<Expr>> {
        let sf = self.special_forms.clone();
        let fail = |msg: &str| Err(Error::compile(msg, loc.clone()));

        let expr = if sym == sf.quote {
            match args {
                [datum] => Expr::Literal(datum.clone()),
                _ => return fail("quote takes exactly one form"),
            }
        } else if sym == sf.quasiquote {
            match args {
                [template] => self.analyze_quasi(template, 1, cx)?,
                _ => return fail("quasiquote takes exactly one form"),
            }
        } else if sym == sf.unquote || sym == sf.unquote_splicing {
            return fail("unquote outside of quasiquote");
        } else if sym == sf.r#if {
            match args {
                [test, then] => Expr::If(
                    Box::new(self.analyze(test, cx)?),
                    Box::new(self.analyze(then, cx)?),
                    Box::new(Expr::Literal(Value::Null)),
                ),
                [test, then, otherwise] => Expr::If(
                    Box::new(self.analyze(test, cx)?),
                    Box::new(self.analyze(then, cx)?),
                    Box::new(self.analyze(otherwise, cx)?),
                ),
                _ => return fail("if takes a test, a then branch and an optional else branch"),
            }
        } else if sym == sf.or {
            match args {
                [] => Expr::Literal(Value::Null),
                [single] => self.analyze(single, cx)?,
                _ => Expr::Or(self.analyze_all(args, cx)?),
            }
        } else if sym == sf.and {
            match args {
                [] => Expr::Literal(Value::Bool(true)),
                [single] => self.analyze(single, cx)?,
                _ => Expr::And(self.analyze_all(args, cx)?),
            }
        } else if sym == sf.block {
            self.analyze_body(args, cx)?
        } else if sym == sf.r#while {
            let Some((test, body)) = args.split_first() else {
                return fail("while needs a test");
            };
            Expr::While(
                Box::new(self.analyze(test, cx)?),
                Box::new(self.analyze_body(body, cx)?),
            )
        } else if sym == sf.lambda {
            let Some((params, body)) = args.split_first() else {
                return fail("lambda needs a parameter list");
            };
            Expr::Lambda(self.analyze_lambda(None, params, body, None, loc, cx)?)
        } else if sym == sf.defmacro {
            let [name, params, body @ ..] = args else {
                return fail("defmacro needs a name and a parameter list");
            };
            let name = self.definition_name(name, loc)?;
            let template = self.analyze_lambda(Some(name), params, body, None, loc, cx)?;
            Expr::DefMacro(name, template)
        } else if sym == sf.def || sym == sf.defconstant {
            let (name, value) = match args {
                [name] => (self.definition_name(name, loc)?, Expr::Literal(Value::Null)),
                [name, value] => {
                    let name = self.definition_name(name, loc)?;
                    (name, self.analyze_named(name, value, cx)?)
                }
                _ => return fail("definition takes a name and one value"),
            };
            if sym == sf.def {
                Expr::Def(name, Box::new(value))
            } else {
                Expr::DefConstant(name, Box::new(value))
            }
        } else if sym == sf.set {
            let [target, value] = args else {
                return fail("set! takes a target and a value");
            };
            self.analyze_assignment(target, value, loc, cx)?
        } else if sym == sf.dynamic_let {
            let Some((bindings, body)) = args.split_first() else {
                return fail("dynamic-let needs a binding list");
            };
            let mut analyzed = Vec::new();
            for (name, init) in self.binding_pairs(bindings, loc)? {
                if !self.symbols.is_dynamic(name) {
                    return Err(Error::compile(
                        format!(
                            "dynamic-let binds dynamic variables like *{}*",
                            self.symbols.symbol_name(name)
                        ),
                        loc.clone(),
                    ));
                }
                analyzed.push((name, self.analyze(&init, cx)?));
            }
            Expr::DynamicLet {
                bindings: analyzed,
                body: Box::new(self.analyze_body(body, cx)?),
            }
        } else if sym == sf.r#let {
            let Some((bindings, body)) = args.split_first() else {
                return fail("let needs a binding list");
            };
            let pairs = self.binding_pairs(bindings, loc)?;
            let mut names = Vec::with_capacity(pairs.len());
            let mut inits = Vec::with_capacity(pairs.len());
            for (name, init) in pairs {
                self.check_lexical_name(name, loc)?;
                inits.push(self.analyze(&init, cx)?);
                names.push(name);
            }
            cx.scope.push(names);
            let body = self.analyze_body(body, cx);
            cx.scope.pop();
            Expr::Let {
                inits,
                body: Box::new(body?),
            }
        } else if sym == sf.call_next_method || sym == sf.next_method_p {
            let next = match cx.scope.lookup(sf.next_method) {
                VarRef::Local { level, index } => Expr::Local {
                    level,
                    index,
                    name: sf.next_method,
                },
                VarRef::Global => {
                    return Err(Error::compile(
                        format!("{} outside of a behavior", self.symbols.symbol_name(sym)),
                        loc.clone(),
                    ))
                }
            };
            if sym == sf.next_method_p {
                Expr::NextMethodP(Box::new(next))
            } else {
                Expr::CallNext {
                    next: Box::new(next),
                    args: if args.is_empty() {
                        None
                    } else {
                        Some(self.analyze_all(args, cx)?)
                    },
                    loc: loc.clone(),
                }
            }
        } else if sym == sf.defclass {
            self.analyze_defclass(args, loc, cx)?
        } else if sym == sf.defbehavior {
            self.analyze_defbehavior(args, loc, cx)?
        } else {
            return Ok(None);
        };
        Ok(Some(expr))
    }

    fn definition_name(&self, name: &Value, loc: &Option<SourceLoc>) -> EvalResult<SymbolId> {
        name.as_symbol()
            .ok_or_else(|| Error::compile("definition name must be a symbol", loc.clone()))
    }

    /// Analyze a definition value, naming it when it is a lambda
    fn analyze_named(&mut self, name: SymbolId, value: &Value, cx: &mut AnalysisContext) -> EvalResult<Expr> {
        if let Some(items) = value.list_to_vec() {
            if let [Value::Symbol(head), params, body @ ..] = items.as_slice() {
                if *head == self.special_forms.lambda {
                    let loc = cx.loc_of(value);
                    let template = self.analyze_lambda(Some(name), params, body, None, &loc, cx)?;
                    return Ok(Expr::Lambda(template));
                }
            }
        }
        self.analyze(value, cx)
    }

    fn check_lexical_name(&self, name: SymbolId, loc: &Option<SourceLoc>) -> EvalResult<()> {
        if self.symbols.is_dynamic(name) {
            return Err(Error::compile(
                format!(
                    "{} is a dynamic variable; bind it with dynamic-let",
                    self.symbols.symbol_name(name)
                ),
                loc.clone(),
            ));
        }
        Ok(())
    }

    /// `((a 1) b)` -> `[(a, 1), (b, null)]`
    fn binding_pairs(&self, bindings: &Value, loc: &Option<SourceLoc>) -> EvalResult<Vec<(SymbolId, Value)>> {
        let fail = || Error::compile("malformed binding list", loc.clone());
        let items = bindings.list_to_vec().ok_or_else(fail)?;
        items
            .iter()
            .map(|binding| match binding {
                Value::Symbol(name) => Ok((*name, Value::Null)),
                _ => match binding.list_to_vec().as_deref() {
                    Some([Value::Symbol(name)]) => Ok((*name, Value::Null)),
                    Some([Value::Symbol(name), init]) => Ok((*name, init.clone())),
                    _ => Err(fail()),
                },
            })
            .collect()
    }

    fn analyze_assignment(
        &mut self,
        target: &Value,
        value: &Value,
        loc: &Option<SourceLoc>,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Expr> {
        if let Value::Symbol(sym) = target {
            let sym = *sym;
            if let Err(e) = self.symbols.check_assignable(sym) {
                return Err(e.into());
            }
            let value = Box::new(self.analyze(value, cx)?);
            if self.symbols.is_dynamic(sym) {
                return Ok(Expr::SetDynamic(sym, value));
            }
            return Ok(match cx.scope.lookup(sym) {
                VarRef::Local { level, index } => Expr::SetLocal {
                    level,
                    index,
                    value,
                },
                VarRef::Global => Expr::SetGlobal(sym, value),
            });
        }

        // (set! (.slot obj) value), which is also what obj.slot reads as
        if let Some(items) = target.list_to_vec() {
            if let [Value::Symbol(head), object] = items.as_slice() {
                let name = self.symbols.symbol_name(*head);
                if let Some(member) = member_name(&name) {
                    return Ok(Expr::SetMember {
                        name: Arc::from(member),
                        object: Box::new(self.analyze(object, cx)?),
                        value: Box::new(self.analyze(value, cx)?),
                        loc: loc.clone(),
                    });
                }
            }
        }
        Err(Error::compile(
            "set! target must be a symbol or a member access",
            loc.clone(),
        ))
    }

    /// Analyze a lambda. `hidden` is prepended as an extra required
    /// parameter (the next-method continuation of behavior methods).
    pub(crate) fn analyze_lambda(
        &mut self,
        name: Option<SymbolId>,
        params: &Value,
        body: &[Value],
        hidden: Option<SymbolId>,
        loc: &Option<SourceLoc>,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Rc<LambdaTemplate>> {
        let markers = self.special_forms.lambda_markers();
        let raw = parse_lambda_list(&self.symbols, &markers, params, loc.as_ref())?;

        let mut spec = ParamSpec::default();
        if let Some(hidden) = hidden {
            spec.params.push(Param {
                name: hidden,
                kind: ParamKind::Required,
                init: None,
                keyword: None,
            });
            spec.required += 1;
        }
        for param in raw {
            self.check_lexical_name(param.name, loc)?;
            match param.kind {
                ParamKind::Required => spec.required += 1,
                ParamKind::Optional => spec.optional += 1,
                ParamKind::Keyword => spec.keyword += 1,
                ParamKind::Rest => spec.rest = true,
            }
            // Init forms see the defining scope, not earlier parameters
            let init = param.init.map(|form| self.analyze(&form, cx)).transpose()?;
            spec.params.push(Param {
                name: param.name,
                kind: param.kind,
                init,
                keyword: param.keyword,
            });
        }

        cx.scope.push(spec.names());
        let body = self.analyze_body(body, cx);
        cx.scope.pop();

        Ok(Rc::new(LambdaTemplate {
            name,
            params: Rc::new(spec),
            body: Rc::new(body?),
        }))
    }

    /// `(defclass Name (Parent...) (slot (slot default)...))`
    fn analyze_defclass(
        &mut self,
        args: &[Value],
        loc: &Option<SourceLoc>,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Expr> {
        let fail = |msg: &str| Error::compile(msg, loc.clone());
        let (name, parents, slots) = match args {
            [name, parents] => (name, parents, &Value::Null),
            [name, parents, slots] => (name, parents, slots),
            _ => return Err(fail("defclass takes a name, a parent list and a slot list")),
        };
        let name = self.definition_name(name, loc)?;
        let parents = parents
            .list_to_vec()
            .ok_or_else(|| fail("defclass parents must be a list"))?;
        let parents = self.analyze_all(&parents, cx)?;

        let mut slot_inits = Vec::new();
        for spec in slots.list_to_vec().ok_or_else(|| fail("defclass slots must be a list"))? {
            let (slot, init) = match &spec {
                Value::Symbol(s) => (*s, None),
                _ => match spec.list_to_vec().as_deref() {
                    Some([Value::Symbol(s)]) => (*s, None),
                    Some([Value::Symbol(s), init]) => (*s, Some(init.clone())),
                    _ => return Err(fail("malformed slot specification")),
                },
            };
            let init = match init {
                None => SlotInit::Constant(Value::Null),
                Some(form) => match self.analyze(&form, cx)? {
                    Expr::Literal(value) => SlotInit::Constant(value),
                    _ => SlotInit::Computed(self.analyze_lambda(
                        None,
                        &Value::Null,
                        std::slice::from_ref(&form),
                        None,
                        loc,
                        cx,
                    )?),
                },
            };
            slot_inits.push((Arc::from(&*self.symbols.symbol_name(slot)), init));
        }

        Ok(Expr::DefClass {
            name,
            parents,
            slots: slot_inits,
        })
    }

    /// `(defbehavior Class name [:before|:after|:around] (self args...) body...)`
    fn analyze_defbehavior(
        &mut self,
        args: &[Value],
        loc: &Option<SourceLoc>,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Expr> {
        let fail = |msg: &str| Error::compile(msg, loc.clone());
        let [target, Value::Symbol(name), rest @ ..] = args else {
            return Err(fail("defbehavior takes a class, a name and a parameter list"));
        };
        let sf = self.special_forms.clone();
        let (qualifier, params, body) = match rest {
            [Value::Symbol(q), params, body @ ..] if self.symbols.is_keyword(*q) => {
                let qualifier = if *q == sf.before {
                    Qualifier::Before
                } else if *q == sf.after {
                    Qualifier::After
                } else if *q == sf.around {
                    Qualifier::Around
                } else {
                    return Err(fail("behavior qualifier must be :before, :after or :around"));
                };
                (qualifier, params, body)
            }
            [params, body @ ..] => (Qualifier::Primary, params, body),
            [] => return Err(fail("defbehavior needs a parameter list")),
        };
        if params.list_to_vec().map_or(true, |p| p.is_empty()) {
            return Err(fail("behavior methods take the receiver as first parameter"));
        }

        let target = Box::new(self.analyze(target, cx)?);
        let method = self.analyze_lambda(Some(*name), params, body, Some(sf.next_method), loc, cx)?;
        Ok(Expr::DefBehavior {
            target,
            name: Arc::from(&*self.symbols.symbol_name(*name)),
            qualifier,
            method,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::InterpreterConfig;

    fn bare() -> Interpreter {
        Interpreter::new(InterpreterConfig {
            load_prelude: false,
            ..InterpreterConfig::default()
        })
    }

    fn analyze_str(interp: &mut Interpreter, text: &str) -> EvalResult<Expr> {
        let form = interp.read_str(text)?.remove(0);
        let mut cx = AnalysisContext::default();
        interp.analyze(&form, &mut cx)
    }

    #[test]
    fn test_block_shapes() {
        let mut interp = bare();
        assert!(matches!(analyze_str(&mut interp, "(block)").unwrap(), Expr::Literal(Value::Null)));
        assert!(matches!(analyze_str(&mut interp, "(block 5)").unwrap(), Expr::Literal(Value::Int(5))));
        match analyze_str(&mut interp, "(block 1 2 3)").unwrap() {
            Expr::Block(items) => assert_eq!(items.len(), 3),
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn test_symbol_resolution() {
        let mut interp = bare();
        match analyze_str(&mut interp, "(lambda (a b) (f b *depth*))").unwrap() {
            Expr::Lambda(t) => match &*t.body {
                Expr::Apply { callee, args, .. } => {
                    assert!(matches!(**callee, Expr::Global(_)));
                    assert!(matches!(args[0], Expr::Local { level: 0, index: 1, .. }));
                    assert!(matches!(args[1], Expr::Dynamic(_)));
                }
                other => panic!("expected application, got {other:?}"),
            },
            other => panic!("expected lambda, got {other:?}"),
        }
    }

    #[test]
    fn test_constants_fold_to_literals() {
        let mut interp = bare();
        assert!(matches!(analyze_str(&mut interp, "true").unwrap(), Expr::Literal(Value::Bool(true))));
        assert!(matches!(analyze_str(&mut interp, ":k").unwrap(), Expr::Literal(Value::Symbol(_))));
    }

    #[test]
    fn test_malformed_forms_are_compile_errors() {
        let mut interp = bare();
        for text in [
            "(if)",
            "(if 1 2 3 4)",
            "(quote)",
            "(lambda (&rest a &optional b) a)",
            "(set! 3 4)",
            "(call-next-method)",
            "(dynamic-let ((x 1)) x)",
            "(let ((*x* 1)) 1)",
            "(1 . 2)",
        ] {
            let err = analyze_str(&mut interp, text).unwrap_err();
            assert!(matches!(err, Error::Compile { .. }), "{text}: {err:?}");
        }
    }

    #[test]
    fn test_member_forms() {
        let mut interp = bare();
        assert!(matches!(
            analyze_str(&mut interp, "p.x").unwrap(),
            Expr::Member { ref name, .. } if &**name == "x"
        ));
        assert!(matches!(
            analyze_str(&mut interp, "(set! p.x 3)").unwrap(),
            Expr::SetMember { ref name, .. } if &**name == "x"
        ));
    }

    #[test]
    fn test_assigning_constants_is_rejected() {
        let mut interp = bare();
        let err = analyze_str(&mut interp, "(set! true 1)").unwrap_err();
        assert!(matches!(err, Error::Binding(_)));
    }

    #[test]
    fn test_member_name() {
        assert_eq!(member_name(".x"), Some("x"));
        assert_eq!(member_name("."), None);
        assert_eq!(member_name("..."), None);
        assert_eq!(member_name("x"), None);
    }
}
