// dynlisp Evaluator
//
// The interpreter owns every piece of mutable runtime state: globals, the
// lexical frame arena, the dynamic binding stack, classes and operator
// tables. Source text is read one top-level form at a time, analyzed into an
// `Expr` tree and evaluated against that state.

use crate::analyzer::{AnalysisContext, ConstructOp, Expr, LambdaTemplate, SlotInit};
use crate::clos::{ClassSpace, SlotDefault};
use crate::context::{InterpreterConfig, SpecialForms};
use crate::counters::EvalCounters;
use crate::env::{DynamicStack, EnvArena, EnvPin, EnvRef};
use crate::error::{BindingError, CallFrame, Error, EvalResult, RuntimeError, SourceLoc};
use crate::fastmap::HashMap;
use crate::interop::{host_type_name, Accessor, MemberResolver};
use crate::lambda_list::{ParamKind, ParamSpec};
use crate::operators::OperatorTable;
use crate::printer::{PrintOptions, Printer};
use crate::reader::{Reader, SourceMap};
use crate::readtable::Readtable;
use crate::stack::ensure_sufficient_stack;
use crate::symbol::{PackageId, SymbolId, SymbolTable};
use crate::types::Value;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

const PRELUDE: &str = include_str!("prelude.lisp");

/// Frames shown by `describe_error` before the rest are elided
const MAX_REPORTED_FRAMES: usize = 20;

/// A lambda closed over its defining frame
#[derive(Debug)]
pub struct Closure {
    pub name: Option<SymbolId>,
    pub params: Rc<ParamSpec>,
    pub body: Rc<Expr>,
    captured: Option<EnvPin>,
}

impl Closure {
    /// Defining environment
    pub fn env(&self) -> EnvRef {
        self.captured.as_ref().map(EnvPin::env)
    }
}

/// Shared in-memory output sink, mostly for tests and embedding hosts
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer(Rc<RefCell<Vec<u8>>>);

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    pub symbols: Arc<SymbolTable>,
    pub(crate) special_forms: SpecialForms,
    pub(crate) globals: HashMap<SymbolId, Value>,
    pub(crate) envs: EnvArena,
    pub(crate) dynamic: DynamicStack,
    pub classes: ClassSpace,
    pub operators: OperatorTable,
    pub readtable: Readtable,
    resolver: Option<Rc<dyn MemberResolver>>,
    pub config: InterpreterConfig,
    depth: usize,
    pub current_package: PackageId,
    pub counters: EvalCounters,
    output: Box<dyn Write>,
    gensym_counter: u64,
}

impl Interpreter {
    pub fn new(config: InterpreterConfig) -> Self {
        Self::with_symbols(Arc::new(SymbolTable::new()), config)
    }

    /// Create an interpreter sharing an existing symbol table
    pub fn with_symbols(symbols: Arc<SymbolTable>, config: InterpreterConfig) -> Self {
        let special_forms = SpecialForms::new(&symbols);
        let mut interp = Self {
            symbols,
            special_forms,
            globals: HashMap::default(),
            envs: EnvArena::new(),
            dynamic: DynamicStack::default(),
            classes: ClassSpace::new(),
            operators: OperatorTable::with_builtins(),
            readtable: Readtable::new(),
            resolver: None,
            config,
            depth: 0,
            current_package: PackageId::SYSTEM,
            counters: EvalCounters::default(),
            output: Box::new(std::io::stdout()),
            gensym_counter: 0,
        };

        for (name, value) in [
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
            ("null", Value::Null),
        ] {
            let sym = interp.symbols.intern_in(name, PackageId::SYSTEM);
            interp.symbols.export_symbol(sym);
            interp.globals.insert(sym, value);
            // Only fails when the table is shared and already has them
            let _ = interp.symbols.make_constant(sym);
        }
        let object = interp.symbols.intern_in("object", PackageId::SYSTEM);
        interp.symbols.export_symbol(object);
        interp.globals.insert(object, Value::Class(interp.classes.object()));

        interp.register_operators();
        interp.register_primitives();

        if interp.config.load_prelude {
            if let Err(err) = interp.eval_source(PRELUDE, "<prelude>") {
                log::warn!("prelude failed to load: {}", interp.describe_error(&err));
            }
        }

        let package = interp.config.package.clone();
        interp.current_package = match interp.symbols.find_package(&package) {
            Some(pkg) => pkg,
            None => {
                let pkg = interp.symbols.create_package(&package);
                interp.symbols.use_package(pkg, PackageId::SYSTEM);
                pkg
            }
        };
        interp
    }

    fn register_operators(&mut self) {
        let ops: Vec<_> = self
            .operators
            .iter()
            .map(|(id, op)| (id, op.name.clone()))
            .collect();
        for (id, name) in ops {
            let sym = self.symbols.intern_in(&name, PackageId::SYSTEM);
            self.symbols.export_symbol(sym);
            self.globals.insert(sym, Value::Operator(id));
        }
    }

    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    pub fn set_member_resolver(&mut self, resolver: Rc<dyn MemberResolver>) {
        self.resolver = Some(resolver);
    }

    pub(crate) fn write_output(&mut self, text: &str) -> EvalResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .map_err(|e| RuntimeError::Io(e.to_string()).into())
    }

    /// Intern `name` in the current package
    pub fn intern(&self, name: &str) -> EvalResult<SymbolId> {
        self.symbols
            .intern(name, self.current_package)
            .map_err(|pkg| Error::user(format!("unknown package {pkg}")))
    }

    /// Bind a global from host code
    pub fn define_global(&mut self, name: &str, value: Value) -> EvalResult<SymbolId> {
        let sym = self.intern(name)?;
        self.symbols.check_assignable(sym)?;
        self.globals.insert(sym, value);
        Ok(sym)
    }

    pub fn global_value(&self, name: &str) -> Option<Value> {
        let sym = self.symbols.find_symbol_in(name, self.current_package)?;
        self.globals.get(&sym).cloned()
    }

    pub(crate) fn gensym(&mut self, prefix: &str) -> SymbolId {
        self.gensym_counter += 1;
        self.symbols
            .make_symbol(&format!("{prefix}{}", self.gensym_counter))
    }

    /// Read every datum of `text` in the current package
    pub fn read_str(&self, text: &str) -> EvalResult<Vec<Value>> {
        let mut reader = Reader::new(
            text,
            &self.config.source_name,
            &self.symbols,
            &self.readtable,
            self.current_package,
        );
        let mut forms = Vec::new();
        while let Some(form) = reader.read()? {
            forms.push(form);
        }
        Ok(forms)
    }

    /// Evaluate all forms in `text`, returning the value of the last one
    pub fn eval_str(&mut self, text: &str) -> EvalResult<Value> {
        let name = self.config.source_name.clone();
        self.eval_source(text, &name)
    }

    /// Read and evaluate forms one at a time, so each form sees the
    /// definitions and package changes of the ones before it.
    pub fn eval_source(&mut self, text: &str, file: &str) -> EvalResult<Value> {
        let symbols = self.symbols.clone();
        let readtable = self.readtable.clone();
        let mut reader = Reader::new(text, file, &symbols, &readtable, self.current_package);
        let mut result = Value::Null;
        while let Some(form) = reader.read()? {
            let locations = reader.take_locations();
            let loc = locations
                .location_of(&form)
                .cloned()
                .unwrap_or_else(|| reader.loc());
            result = self
                .eval_toplevel(&form, locations)
                .map_err(|err| self.toplevel_frame(err, &form, loc))?;
            reader.set_package(self.current_package);
        }
        Ok(result)
    }

    /// Errors raised outside any call still report the form they came from.
    fn toplevel_frame(&self, err: Error, form: &Value, loc: SourceLoc) -> Error {
        if !err.frames().is_empty() {
            return err;
        }
        let (callable, args) = match form.list_to_vec() {
            Some(items) if !items.is_empty() => {
                (self.print_value(&items[0], true), items[1..].to_vec())
            }
            _ => (self.print_value(form, true), Vec::new()),
        };
        err.with_frame(CallFrame {
            loc: Some(loc),
            callable,
            args,
        })
    }

    pub fn eval_toplevel(&mut self, form: &Value, locations: SourceMap) -> EvalResult<Value> {
        let mut cx = AnalysisContext::new(locations);
        let expr = self.analyze(form, &mut cx)?;
        self.eval(&expr, None)
    }

    /// Evaluate a datum in the global environment
    pub fn eval_value(&mut self, form: &Value) -> EvalResult<Value> {
        self.eval_toplevel(form, SourceMap::default())
    }

    /// Evaluate every form of a file. The current package is restored
    /// afterwards.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> EvalResult<Value> {
        let path = path.as_ref();
        log::debug!("loading {}", path.display());
        let text = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::Io(format!("{}: {e}", path.display())))?;
        let saved = self.current_package;
        let result = self.eval_source(&text, &path.display().to_string());
        self.current_package = saved;
        result
    }

    pub fn print_value(&self, value: &Value, escape: bool) -> String {
        let options = if escape {
            PrintOptions::prin1()
        } else {
            PrintOptions::princ()
        };
        let mut printer = Printer::new(&self.symbols, options.in_package(self.current_package))
            .with_classes(&self.classes)
            .with_operators(&self.operators);
        printer.print(value);
        printer.into_string()
    }

    pub fn print_args(&self, args: &[Value]) -> String {
        let printed: Vec<String> = args.iter().map(|a| self.print_value(a, true)).collect();
        format!("({})", printed.join(" "))
    }

    /// Error message followed by the backtrace, innermost call first
    pub fn describe_error(&self, err: &Error) -> String {
        let mut out = format!("error: {}", err.root());
        let frames = err.frames();
        for frame in frames.iter().take(MAX_REPORTED_FRAMES) {
            let mut call = frame.callable.clone();
            for arg in &frame.args {
                call.push(' ');
                call.push_str(&self.print_value(arg, true));
            }
            match &frame.loc {
                Some(loc) => out.push_str(&format!("\n  in ({call}) at {loc}")),
                None => out.push_str(&format!("\n  in ({call})")),
            }
        }
        if frames.len() > MAX_REPORTED_FRAMES {
            out.push_str(&format!(
                "\n  ... {} more frames",
                frames.len() - MAX_REPORTED_FRAMES
            ));
        }
        out
    }

    pub fn apply_value(&mut self, function: &Value, args: &[Value]) -> EvalResult<Value> {
        self.apply_value_at(function, args, None)
    }

    pub fn apply_value_at(
        &mut self,
        function: &Value,
        args: &[Value],
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        match function {
            Value::Closure(closure) => self.apply_closure(closure, args, loc),
            Value::Primitive(prim) => {
                prim.arity.check(prim.name, args.len())?;
                (prim.func)(self, args)
            }
            Value::Operator(id) => self.apply_operator(*id, args),
            Value::NextMethod(next) => {
                let args = (!args.is_empty()).then(|| args.to_vec());
                self.call_next_method(next, args, loc)
            }
            Value::Class(class) => self.make_instance(*class, args),
            other => Err(RuntimeError::NotCallable(self.print_value(other, true)).into()),
        }
    }

    /// Call a closure. Errors leaving it gain a backtrace frame.
    pub fn apply_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: &[Value],
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        if self.depth >= self.config.max_depth {
            return Err(RuntimeError::DepthExceeded(self.config.max_depth).into());
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.call_closure(closure, args));
        self.depth -= 1;
        result.map_err(|err| {
            err.with_frame(CallFrame {
                loc: loc.cloned(),
                callable: self.closure_name(closure),
                args: self.visible_args(closure, args),
            })
        })
    }

    fn call_closure(&mut self, closure: &Closure, args: &[Value]) -> EvalResult<Value> {
        let slots = self.bind_arguments(closure, args)?;
        let frame = self.envs.alloc(slots, closure.env());
        let result = self.eval(&closure.body, Some(frame));
        self.envs.release(frame);
        result
    }

    fn closure_name(&self, closure: &Closure) -> String {
        match closure.name {
            Some(name) => self.symbols.symbol_name(name).to_string(),
            None => "lambda".to_string(),
        }
    }

    /// Arguments as the caller wrote them, without the hidden continuation
    fn visible_args(&self, closure: &Closure, args: &[Value]) -> Vec<Value> {
        let hidden = closure
            .params
            .params
            .first()
            .is_some_and(|p| p.name == self.special_forms.next_method);
        match args {
            [Value::NextMethod(_), rest @ ..] if hidden => rest.to_vec(),
            _ => args.to_vec(),
        }
    }

    fn arity_error(&self, closure: &Closure, found: usize) -> Error {
        RuntimeError::Arity {
            callable: self.closure_name(closure),
            expected: closure.params.arity_description(),
            found,
        }
        .into()
    }

    fn bind_arguments(
        &mut self,
        closure: &Closure,
        args: &[Value],
    ) -> EvalResult<SmallVec<[Value; 4]>> {
        let spec = &closure.params;
        if spec.is_simple() {
            if args.len() != spec.required {
                return Err(self.arity_error(closure, args.len()));
            }
            self.counters.fast_path_calls += 1;
            return Ok(SmallVec::from(args));
        }

        self.counters.general_path_calls += 1;
        let positional = spec.required + spec.optional;
        if args.len() < spec.required
            || (!spec.accepts_any_count() && args.len() > positional)
        {
            return Err(self.arity_error(closure, args.len()));
        }
        let remaining = args.get(positional..).unwrap_or(&[]);
        if spec.keyword > 0 && remaining.len() % 2 != 0 {
            return Err(RuntimeError::UnpairedKeyword(remaining.len()).into());
        }

        let mut slots = SmallVec::with_capacity(spec.params.len());
        for (i, param) in spec.params.iter().enumerate() {
            let value = match param.kind {
                ParamKind::Required => args[i].clone(),
                ParamKind::Optional => match args.get(i) {
                    Some(value) => value.clone(),
                    None => self.default_argument(param.init.as_ref(), closure.env())?,
                },
                ParamKind::Keyword => {
                    let found = remaining
                        .chunks(2)
                        .find(|pair| matches!(pair[0], Value::Symbol(k) if Some(k) == param.keyword))
                        .map(|pair| pair[1].clone());
                    match found {
                        Some(value) => value,
                        None => self.default_argument(param.init.as_ref(), closure.env())?,
                    }
                }
                ParamKind::Rest => {
                    self.counters.rest_lists += 1;
                    Value::list(remaining.to_vec())
                }
            };
            slots.push(value);
        }
        Ok(slots)
    }

    fn default_argument(&mut self, init: Option<&Expr>, env: EnvRef) -> EvalResult<Value> {
        match init {
            Some(expr) => self.eval(expr, env),
            None => Ok(Value::Null),
        }
    }

    pub(crate) fn make_closure(&mut self, template: &LambdaTemplate, env: EnvRef) -> Rc<Closure> {
        Rc::new(Closure {
            name: template.name,
            params: template.params.clone(),
            body: template.body.clone(),
            captured: self.envs.pin(env),
        })
    }

    fn unbound(&self, sym: SymbolId) -> Error {
        BindingError::Unbound(self.symbols.symbol_name(sym).to_string()).into()
    }

    pub fn eval(&mut self, expr: &Expr, env: EnvRef) -> EvalResult<Value> {
        ensure_sufficient_stack(|| self.eval_expr(expr, env))
    }

    fn eval_expr(&mut self, expr: &Expr, env: EnvRef) -> EvalResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Local { level, index, name } => self
                .envs
                .get(env, *level, *index)
                .cloned()
                .ok_or_else(|| self.unbound(*name)),
            Expr::Global(sym) => self
                .globals
                .get(sym)
                .cloned()
                .ok_or_else(|| self.unbound(*sym)),
            Expr::Dynamic(sym) => match self.dynamic.lookup(*sym) {
                Some(value) => Ok(value.clone()),
                None => self
                    .globals
                    .get(sym)
                    .cloned()
                    .ok_or_else(|| self.unbound(*sym)),
            },
            Expr::If(test, then, otherwise) => {
                if self.eval(test, env)?.is_truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Or(exprs) => {
                let mut last = Value::Null;
                for e in exprs {
                    last = self.eval(e, env)?;
                    if last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::And(exprs) => {
                let mut last = Value::Bool(true);
                for e in exprs {
                    last = self.eval(e, env)?;
                    if !last.is_truthy() {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Block(exprs) => {
                let mut last = Value::Null;
                for e in exprs {
                    last = self.eval(e, env)?;
                }
                Ok(last)
            }
            Expr::While(test, body) => {
                while self.eval(test, env)?.is_truthy() {
                    self.eval(body, env)?;
                }
                Ok(Value::Null)
            }
            Expr::Lambda(template) => Ok(Value::Closure(self.make_closure(template, env))),
            Expr::DefMacro(name, template) => {
                self.symbols.check_assignable(*name)?;
                let expander = self.make_closure(template, env);
                self.globals.insert(*name, Value::Macro(expander));
                Ok(Value::Symbol(*name))
            }
            Expr::Def(name, value) => {
                self.symbols.check_assignable(*name)?;
                let value = self.eval(value, env)?;
                self.globals.insert(*name, value);
                Ok(Value::Symbol(*name))
            }
            Expr::DefConstant(name, value) => {
                let value = self.eval(value, env)?;
                self.symbols.make_constant(*name)?;
                self.globals.insert(*name, value);
                Ok(Value::Symbol(*name))
            }
            Expr::SetLocal {
                level,
                index,
                value,
            } => {
                let value = self.eval(value, env)?;
                self.envs.set(env, *level, *index, value.clone());
                Ok(value)
            }
            Expr::SetGlobal(sym, value) => {
                let value = self.eval(value, env)?;
                match self.globals.get_mut(sym) {
                    Some(slot) => *slot = value.clone(),
                    None => return Err(self.unbound(*sym)),
                }
                Ok(value)
            }
            Expr::SetDynamic(sym, value) => {
                let value = self.eval(value, env)?;
                if !self.dynamic.assign(*sym, value.clone()) {
                    match self.globals.get_mut(sym) {
                        Some(slot) => *slot = value.clone(),
                        None => return Err(self.unbound(*sym)),
                    }
                }
                Ok(value)
            }
            Expr::SetMember {
                name,
                object,
                value,
                loc,
            } => {
                let object = self.eval(object, env)?;
                let value = self.eval(value, env)?;
                self.set_member(&object, name, value, loc.as_ref())
            }
            Expr::DynamicLet { bindings, body } => {
                let mut values = Vec::with_capacity(bindings.len());
                for (sym, init) in bindings {
                    values.push((*sym, self.eval(init, env)?));
                }
                let mark = self.dynamic.mark();
                for (sym, value) in values {
                    self.dynamic.push(sym, value);
                }
                let result = self.eval(body, env);
                self.dynamic.unwind(mark);
                result
            }
            Expr::Let { inits, body } => {
                let mut slots = SmallVec::with_capacity(inits.len());
                for init in inits {
                    slots.push(self.eval(init, env)?);
                }
                let frame = self.envs.alloc(slots, env);
                let result = self.eval(body, Some(frame));
                self.envs.release(frame);
                result
            }
            Expr::Apply { callee, args, loc } => {
                let function = self.eval(callee, env)?;
                let args = self.eval_args(args, env)?;
                self.apply_value_at(&function, &args, loc.as_ref())
            }
            Expr::Member {
                name,
                object,
                args,
                loc,
            } => {
                let object = self.eval(object, env)?;
                let args = self.eval_args(args, env)?;
                self.member_access(&object, name, &args, loc.as_ref())
            }
            Expr::CallNext { next, args, loc } => {
                let Value::NextMethod(next) = self.eval(next, env)? else {
                    return Err(Error::user("call-next-method outside of a behavior call"));
                };
                let args = match args {
                    Some(args) => Some(self.eval_args(args, env)?.into_vec()),
                    None => None,
                };
                self.call_next_method(&next, args, loc.as_ref())
            }
            Expr::NextMethodP(next) => match self.eval(next, env)? {
                Value::NextMethod(next) => Ok(Value::Bool(next.has_next())),
                _ => Ok(Value::Bool(false)),
            },
            Expr::Construct(op, parts) => {
                let values = self.eval_args(parts, env)?;
                construct(*op, values.into_vec())
            }
            Expr::DefClass {
                name,
                parents,
                slots,
            } => {
                self.symbols.check_assignable(*name)?;
                let mut parent_ids = Vec::with_capacity(parents.len());
                for parent in parents {
                    match self.eval(parent, env)? {
                        Value::Class(id) => parent_ids.push(id),
                        other => return Err(Error::type_error("class", &other)),
                    }
                }
                let slots = slots
                    .iter()
                    .map(|(slot, init)| {
                        let default = match init {
                            SlotInit::Constant(value) => SlotDefault::Constant(value.clone()),
                            SlotInit::Computed(template) => {
                                let thunk = self.make_closure(template, env);
                                SlotDefault::Computed(Value::Closure(thunk))
                            }
                        };
                        (slot.clone(), default)
                    })
                    .collect();
                let class_name = self.symbols.symbol_name(*name);
                let id = self.classes.define(&class_name, &parent_ids, slots)?;
                let class = Value::Class(id);
                self.globals.insert(*name, class.clone());
                Ok(class)
            }
            Expr::DefBehavior {
                target,
                name,
                qualifier,
                method,
            } => {
                let target = self.eval(target, env)?;
                let class = self.customization_target(&target)?;
                let method = Value::Closure(self.make_closure(method, env));
                self.classes.add_behavior(class, name, *qualifier, method.clone());
                Ok(method)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: EnvRef) -> EvalResult<SmallVec<[Value; 4]>> {
        let mut values = SmallVec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    /// `(.name object args...)`. Instances try behaviors, then slots (for
    /// plain reads); other values go to the host member resolver.
    pub fn member_access(
        &mut self,
        object: &Value,
        name: &str,
        args: &[Value],
        loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        if matches!(object, Value::Instance(_) | Value::Class(_)) {
            if args.is_empty()
                && matches!(object, Value::Instance(_))
                && !self.has_behavior(object, name)
            {
                return self.get_slot(object, name);
            }
            let mut argv = Vec::with_capacity(args.len() + 1);
            argv.push(object.clone());
            argv.extend_from_slice(args);
            return self.invoke_behavior(name, &argv, loc);
        }

        let accessor = self.resolve_host_member(object, name)?;
        if args.is_empty() {
            accessor.get(object)
        } else {
            accessor.invoke(object, args)
        }
    }

    fn set_member(
        &mut self,
        object: &Value,
        name: &str,
        value: Value,
        _loc: Option<&SourceLoc>,
    ) -> EvalResult<Value> {
        if let Value::Instance(_) = object {
            return self.set_slot(object, name, value);
        }
        let accessor = self.resolve_host_member(object, name)?;
        accessor.set(object, value.clone())?;
        Ok(value)
    }

    fn resolve_host_member(
        &self,
        object: &Value,
        name: &str,
    ) -> EvalResult<Rc<dyn Accessor>> {
        let type_name = host_type_name(object);
        self.resolver
            .as_ref()
            .and_then(|r| r.resolve_member(type_name, name))
            .ok_or_else(|| {
                RuntimeError::Interop(format!("no member '{name}' on {type_name}")).into()
            })
    }
}

fn construct(op: ConstructOp, mut values: Vec<Value>) -> EvalResult<Value> {
    match op {
        ConstructOp::List => Ok(Value::list(values)),
        ConstructOp::Vector => {
            let list = values.pop().unwrap_or_default();
            let items = list
                .list_to_vec()
                .ok_or_else(|| Error::type_error("list", &list))?;
            Ok(Value::vector(items))
        }
        ConstructOp::Append => {
            let tail = values.pop().unwrap_or_default();
            let mut items = Vec::new();
            for part in values {
                let part_items = part
                    .list_to_vec()
                    .ok_or_else(|| Error::type_error("list", &part))?;
                items.extend(part_items);
            }
            Ok(Value::list_with_tail(items, tail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bare() -> Interpreter {
        Interpreter::new(InterpreterConfig {
            load_prelude: false,
            ..InterpreterConfig::default()
        })
    }

    fn eval_print(interp: &mut Interpreter, text: &str) -> String {
        let value = interp.eval_str(text).unwrap();
        interp.print_value(&value, true)
    }

    #[test]
    fn test_if_and_block_results() {
        let mut interp = bare();
        assert_eq!(eval_print(&mut interp, "(if true 1 2)"), "1");
        assert_eq!(eval_print(&mut interp, "(if false 1 2)"), "2");
        assert_eq!(eval_print(&mut interp, "(if false 1)"), "null");
        assert_eq!(eval_print(&mut interp, "(block)"), "null");
        assert_eq!(eval_print(&mut interp, "(block 7)"), "7");
        assert_eq!(eval_print(&mut interp, "(block 1 2 3)"), "3");
    }

    #[test]
    fn test_or_and() {
        let mut interp = bare();
        assert_eq!(eval_print(&mut interp, "(or)"), "null");
        assert_eq!(eval_print(&mut interp, "(or false 3 4)"), "3");
        assert_eq!(eval_print(&mut interp, "(or false null)"), "null");
        assert_eq!(eval_print(&mut interp, "(and)"), "true");
        assert_eq!(eval_print(&mut interp, "(and 1 2)"), "2");
        assert_eq!(eval_print(&mut interp, "(and 1 false 2)"), "false");
    }

    #[test]
    fn test_closures_capture_frames() {
        let mut interp = bare();
        interp
            .eval_str("(def make-counter (lambda () (let ((n 0)) (lambda () (set! n (+ n 1))))))")
            .unwrap();
        interp.eval_str("(def c (make-counter))").unwrap();
        interp.eval_str("(c) (c)").unwrap();
        assert_eq!(eval_print(&mut interp, "(c)"), "3");
    }

    #[test]
    fn test_frames_are_recycled() {
        let mut interp = bare();
        interp.eval_str("(def f (lambda (x) (+ x 1)))").unwrap();
        interp.eval_str("(f 1)").unwrap();
        let live = interp.envs.live_frames();
        interp.eval_str("(f 2) (f 3) (f 4)").unwrap();
        assert_eq!(interp.envs.live_frames(), live);
    }

    #[test]
    fn test_dropped_closures_release_their_frames() {
        let mut interp = bare();
        interp
            .eval_str("(def make (lambda (n) (lambda () n))) (def keep (make 5)) (def i 0)")
            .unwrap();
        let live = interp.envs.live_frames();
        interp
            .eval_str("(while (< i 10000) (make i) (map (lambda (x) (+ x i)) '(1 2)) (set! i (+ i 1)))")
            .unwrap();
        assert_eq!(interp.envs.live_frames(), live);
        assert_eq!(eval_print(&mut interp, "(keep)"), "5");

        interp.eval_str("(def keep null)").unwrap();
        assert_eq!(interp.envs.live_frames(), live - 1);
    }

    #[test]
    fn test_optional_key_rest_binding() {
        let mut interp = bare();
        interp
            .eval_str("(def base 10) (def f (lambda (a &optional (b base) &key (c 3) &rest r) (list a b c r)))")
            .unwrap();
        assert_eq!(eval_print(&mut interp, "(f 1)"), "(1 10 3 null)");
        assert_eq!(eval_print(&mut interp, "(f 1 2 :c 4)"), "(1 2 4 (:c 4))");
        let err = interp.eval_str("(f 1 2 :c)").unwrap_err();
        assert!(matches!(err.root(), Error::Runtime(RuntimeError::UnpairedKeyword(1))));
    }

    #[test]
    fn test_arity_errors() {
        let mut interp = bare();
        interp.eval_str("(def f (lambda (a b) a)) (def g (lambda (a &optional b) a))").unwrap();
        for text in ["(f 1)", "(f 1 2 3)", "(g)", "(g 1 2 3)"] {
            let err = interp.eval_str(text).unwrap_err();
            assert!(
                matches!(err.root(), Error::Runtime(RuntimeError::Arity { .. })),
                "{text}: {err:?}"
            );
        }
    }

    #[test]
    fn test_set_on_undefined_global_fails() {
        let mut interp = bare();
        let err = interp.eval_str("(set! nowhere 1)").unwrap_err();
        assert!(matches!(err.root(), Error::Binding(BindingError::Unbound(_))));
        interp.eval_str("(def somewhere 1) (set! somewhere 2)").unwrap();
        assert_eq!(eval_print(&mut interp, "somewhere"), "2");
    }

    #[test]
    fn test_constants() {
        let mut interp = bare();
        interp.eval_str("(defconstant limit 5)").unwrap();
        assert_eq!(eval_print(&mut interp, "limit"), "5");
        let err = interp.eval_str("(defconstant limit 6)").unwrap_err();
        assert!(matches!(err.root(), Error::Binding(BindingError::DuplicateConstant(_))));
        let err = interp.eval_str("(def limit 6)").unwrap_err();
        assert!(matches!(err.root(), Error::Binding(BindingError::ConstantAssignment(_))));
    }

    #[test]
    fn test_dynamic_let_restores() {
        let mut interp = bare();
        interp
            .eval_str("(def *level* 1) (def show (lambda () *level*))")
            .unwrap();
        assert_eq!(eval_print(&mut interp, "(dynamic-let ((*level* 2)) (show))"), "2");
        assert_eq!(eval_print(&mut interp, "(show)"), "1");
        assert_eq!(interp.dynamic.depth(), 0);
    }

    #[test]
    fn test_depth_limit() {
        let mut interp = Interpreter::new(InterpreterConfig {
            load_prelude: false,
            max_depth: 50,
            ..InterpreterConfig::default()
        });
        interp.eval_str("(def loop (lambda (n) (loop (+ n 1))))").unwrap();
        let err = interp.eval_str("(loop 0)").unwrap_err();
        assert!(matches!(err.root(), Error::Runtime(RuntimeError::DepthExceeded(50))));
        assert!(interp.eval_str("(+ 1 1)").unwrap().is_truthy());
    }

    #[test]
    fn test_describe_error_lists_frames() {
        let mut interp = bare();
        interp.eval_str("(def f (lambda (x) (car x)))").unwrap();
        let err = interp.eval_str("(f 5)").unwrap_err();
        let text = interp.describe_error(&err);
        assert!(text.starts_with("error: "), "{text}");
        assert!(text.contains("in (f 5) at <eval>:1"), "{text}");
    }

    #[test]
    fn test_output_buffer() {
        let mut interp = bare();
        let out = OutputBuffer::new();
        interp.set_output(Box::new(out.clone()));
        interp.eval_str("(display \"hi\") (print 'x)").unwrap();
        assert_eq!(out.contents(), "hix\n");
    }
}
