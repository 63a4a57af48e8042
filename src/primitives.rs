// dynlisp Primitives - Built-in Functions
//
// Native functions bound in the `system` package. Arithmetic and comparison
// live in `operators`; everything else callable from Lisp is here.

use crate::clos::SlotDefault;
use crate::context::PrimitiveFn;
use crate::error::{Error, EvalResult, RuntimeError};
use crate::eval::Interpreter;
use crate::operators::{OperatorMethod, TypeTag};
use crate::printer;
use crate::symbol::PackageId;
use crate::types::{ClassId, Value};
use std::fmt;
use std::rc::Rc;

/// Accepted argument counts of a primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
}

impl Arity {
    pub fn check(self, name: &str, found: usize) -> EvalResult<()> {
        let (ok, expected) = match self {
            Arity::Exact(n) => (found == n, n.to_string()),
            Arity::AtLeast(n) => (found >= n, format!("at least {n}")),
            Arity::Range(lo, hi) => (found >= lo && found <= hi, format!("{lo} to {hi}")),
        };
        if ok {
            Ok(())
        } else {
            Err(RuntimeError::Arity {
                callable: name.to_string(),
                expected,
                found,
            }
            .into())
        }
    }
}

pub struct Primitive {
    pub name: &'static str,
    pub arity: Arity,
    pub func: PrimitiveFn,
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Interpreter {
    /// Bind a native function as an exported `system` symbol
    pub fn register_primitive(&mut self, name: &'static str, arity: Arity, func: PrimitiveFn) {
        let sym = self.symbols.intern_in(name, PackageId::SYSTEM);
        self.symbols.export_symbol(sym);
        self.globals
            .insert(sym, Value::Primitive(Rc::new(Primitive { name, arity, func })));
    }

    pub(crate) fn register_primitives(&mut self) {
        use Arity::*;

        // Lists
        self.register_primitive("cons", Exact(2), prim_cons);
        self.register_primitive("car", Exact(1), prim_car);
        self.register_primitive("cdr", Exact(1), prim_cdr);
        self.register_primitive("list", AtLeast(0), prim_list);
        self.register_primitive("append", AtLeast(0), prim_append);
        self.register_primitive("length", Exact(1), prim_length);
        self.register_primitive("nth", Exact(2), prim_nth);
        self.register_primitive("reverse", Exact(1), prim_reverse);
        self.register_primitive("map", Exact(2), prim_map);
        self.register_primitive("for-each", Exact(2), prim_for_each);
        self.register_primitive("filter", Exact(2), prim_filter);
        self.register_primitive("fold", Exact(3), prim_fold);

        // Predicates
        self.register_primitive("null?", Exact(1), prim_nullp);
        self.register_primitive("not", Exact(1), prim_not);
        self.register_primitive("eq?", Exact(2), prim_eqp);
        self.register_primitive("equal?", Exact(2), prim_equalp);
        self.register_primitive("number?", Exact(1), prim_numberp);
        self.register_primitive("integer?", Exact(1), prim_integerp);
        self.register_primitive("float?", Exact(1), prim_floatp);
        self.register_primitive("string?", Exact(1), prim_stringp);
        self.register_primitive("symbol?", Exact(1), prim_symbolp);
        self.register_primitive("keyword?", Exact(1), prim_keywordp);
        self.register_primitive("cons?", Exact(1), prim_consp);
        self.register_primitive("list?", Exact(1), prim_listp);
        self.register_primitive("vector?", Exact(1), prim_vectorp);
        self.register_primitive("function?", Exact(1), prim_functionp);

        // Strings and symbols
        self.register_primitive("str", AtLeast(0), prim_str);
        self.register_primitive("string-length", Exact(1), prim_string_length);
        self.register_primitive("substring", Range(2, 3), prim_substring);
        self.register_primitive("symbol->string", Exact(1), prim_symbol_to_string);
        self.register_primitive("string->symbol", Exact(1), prim_string_to_symbol);
        self.register_primitive("gensym", Range(0, 1), prim_gensym);

        // Output
        self.register_primitive("print", Exact(1), prim_print);
        self.register_primitive("println", AtLeast(0), prim_println);
        self.register_primitive("display", Exact(1), prim_display);
        self.register_primitive("format", AtLeast(1), prim_format);

        // Evaluation
        self.register_primitive("error", AtLeast(1), prim_error);
        self.register_primitive("apply", AtLeast(2), prim_apply);
        self.register_primitive("eval", Exact(1), prim_eval);
        self.register_primitive("macroexpand", Exact(1), prim_macroexpand);
        self.register_primitive("load", Exact(1), prim_load);

        // Vectors
        self.register_primitive("vector", AtLeast(0), prim_vector);
        self.register_primitive("vector-ref", Exact(2), prim_vector_ref);
        self.register_primitive("vector-set!", Exact(3), prim_vector_set);
        self.register_primitive("vector-length", Exact(1), prim_vector_length);
        self.register_primitive("list->vector", Exact(1), prim_list_to_vector);
        self.register_primitive("vector->list", Exact(1), prim_vector_to_list);

        // Packages
        self.register_primitive("make-package", Exact(1), prim_make_package);
        self.register_primitive("in-package", Exact(1), prim_in_package);
        self.register_primitive("use-package", Exact(1), prim_use_package);
        self.register_primitive("export", Exact(1), prim_export);
        self.register_primitive("find-symbol", Range(1, 2), prim_find_symbol);
        self.register_primitive("symbol-package", Exact(1), prim_symbol_package);

        // Objects
        self.register_primitive("new", AtLeast(1), prim_new);
        self.register_primitive("get-slot", Exact(2), prim_get_slot);
        self.register_primitive("set-slot!", Exact(3), prim_set_slot);
        self.register_primitive("slot-value", Exact(2), prim_slot_value);
        self.register_primitive("set-slot-value!", Exact(3), prim_set_slot_value);
        self.register_primitive("class-of", Exact(1), prim_class_of);
        self.register_primitive("class-name", Exact(1), prim_class_name);
        self.register_primitive("instance-of?", Exact(2), prim_instance_of);
        self.register_primitive("class-linearization", Exact(1), prim_class_linearization);
        self.register_primitive("slot-names", Exact(1), prim_slot_names);
        self.register_primitive("add-slot", Range(2, 3), prim_add_slot);
        self.register_primitive("remove-slot", Exact(2), prim_remove_slot);
        self.register_primitive("extend-class", AtLeast(2), prim_extend_class);
        self.register_primitive("send", AtLeast(2), prim_send);
        self.register_primitive("has-behavior?", Exact(2), prim_has_behavior);

        // Operators
        self.register_primitive("add-operator-method", Exact(4), prim_add_operator_method);
    }
}

fn expect_list(value: &Value) -> EvalResult<Vec<Value>> {
    value
        .list_to_vec()
        .ok_or_else(|| Error::type_error("list", value))
}

fn expect_index(value: &Value) -> EvalResult<usize> {
    match value {
        Value::Int(n) if *n >= 0 => Ok(*n as usize),
        other => Err(Error::type_error("non-negative integer", other)),
    }
}

fn expect_str(value: &Value) -> EvalResult<&str> {
    match value {
        Value::Str(s) => Ok(s),
        other => Err(Error::type_error("string", other)),
    }
}

fn expect_class(value: &Value) -> EvalResult<ClassId> {
    match value {
        Value::Class(id) => Ok(*id),
        other => Err(Error::type_error("class", other)),
    }
}

/// A string, or the name of a symbol
fn name_of(interp: &Interpreter, value: &Value) -> EvalResult<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        Value::Symbol(sym) => Ok(interp.symbols.symbol_name(*sym).to_string()),
        other => Err(Error::type_error("string or symbol", other)),
    }
}

// ---------------------------------------------------------------------------
// Lists

fn prim_cons(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::cons(args[0].clone(), args[1].clone()))
}

fn prim_car(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Cons(cell) => Ok(cell.car.clone()),
        other => Err(Error::type_error("list", other)),
    }
}

fn prim_cdr(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Cons(cell) => Ok(cell.cdr.clone()),
        other => Err(Error::type_error("list", other)),
    }
}

fn prim_list(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::list(args.to_vec()))
}

/// Copies every argument but the last, which becomes the shared tail
fn prim_append(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let Some((tail, heads)) = args.split_last() else {
        return Ok(Value::Null);
    };
    let mut items = Vec::new();
    for head in heads {
        items.extend(expect_list(head)?);
    }
    Ok(Value::list_with_tail(items, tail.clone()))
}

fn prim_length(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::Vector(v) => v.borrow().len(),
        other => expect_list(other)?.len(),
    };
    Ok(Value::Int(n as i64))
}

fn prim_nth(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let index = expect_index(&args[0])?;
    Ok(expect_list(&args[1])?
        .into_iter()
        .nth(index)
        .unwrap_or_default())
}

fn prim_reverse(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut items = expect_list(&args[0])?;
    items.reverse();
    Ok(Value::list(items))
}

fn prim_map(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut results = Vec::new();
    for item in expect_list(&args[1])? {
        results.push(interp.apply_value(&args[0], &[item])?);
    }
    Ok(Value::list(results))
}

fn prim_for_each(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    for item in expect_list(&args[1])? {
        interp.apply_value(&args[0], &[item])?;
    }
    Ok(Value::Null)
}

fn prim_filter(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut kept = Vec::new();
    for item in expect_list(&args[1])? {
        if interp.apply_value(&args[0], std::slice::from_ref(&item))?.is_truthy() {
            kept.push(item);
        }
    }
    Ok(Value::list(kept))
}

/// `(fold f init list)`, left to right: `(f (f init a) b)`
fn prim_fold(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut acc = args[1].clone();
    for item in expect_list(&args[2])? {
        acc = interp.apply_value(&args[0], &[acc, item])?;
    }
    Ok(acc)
}

// ---------------------------------------------------------------------------
// Predicates

fn prim_nullp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_null()))
}

fn prim_not(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn prim_eqp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].identical(&args[1])))
}

fn prim_equalp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].structurally_equal(&args[1])))
}

fn prim_numberp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(TypeTag::Number.is_assignable_from(TypeTag::of(&args[0]))))
}

fn prim_integerp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Int(_) | Value::BigInt(_))))
}

fn prim_floatp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Float(_))))
}

fn prim_stringp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Str(_))))
}

fn prim_symbolp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Symbol(_))))
}

fn prim_keywordp(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(
        args[0],
        Value::Symbol(sym) if interp.symbols.is_keyword(sym)
    )))
}

fn prim_consp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Cons(_))))
}

fn prim_listp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_list()))
}

fn prim_vectorp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(matches!(args[0], Value::Vector(_))))
}

fn prim_functionp(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Bool(args[0].is_callable()))
}

// ---------------------------------------------------------------------------
// Strings and symbols

fn prim_str(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&interp.print_value(arg, false));
    }
    Ok(Value::string(&out))
}

fn prim_string_length(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Int(expect_str(&args[0])?.chars().count() as i64))
}

/// Character indices; `end` defaults to the string length
fn prim_substring(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let s = expect_str(&args[0])?;
    let len = s.chars().count();
    let start = expect_index(&args[1])?;
    let end = match args.get(2) {
        Some(end) => expect_index(end)?,
        None => len,
    };
    if start > end || end > len {
        return Err(Error::user(format!(
            "substring bounds {start}..{end} out of range for length {len}"
        )));
    }
    let sub: String = s.chars().skip(start).take(end - start).collect();
    Ok(Value::string(&sub))
}

fn prim_symbol_to_string(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    match &args[0] {
        Value::Symbol(sym) => Ok(Value::string(&interp.symbols.symbol_name(*sym))),
        other => Err(Error::type_error("symbol", other)),
    }
}

fn prim_string_to_symbol(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = expect_str(&args[0])?;
    Ok(Value::Symbol(interp.intern(name)?))
}

fn prim_gensym(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let prefix = match args.first() {
        Some(prefix) => name_of(interp, prefix)?,
        None => "g".to_string(),
    };
    Ok(Value::Symbol(interp.gensym(&prefix)))
}

// ---------------------------------------------------------------------------
// Output

fn prim_print(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let text = interp.print_value(&args[0], true);
    interp.write_output(&text)?;
    interp.write_output("\n")?;
    Ok(args[0].clone())
}

fn prim_println(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let parts: Vec<String> = args.iter().map(|a| interp.print_value(a, false)).collect();
    interp.write_output(&parts.join(" "))?;
    interp.write_output("\n")?;
    Ok(Value::Null)
}

fn prim_display(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let text = interp.print_value(&args[0], false);
    interp.write_output(&text)?;
    Ok(Value::Null)
}

/// `(format control args...)` returns the formatted string
fn prim_format(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let control = expect_str(&args[0])?;
    let text = printer::format(control, &args[1..], |v, escape| interp.print_value(v, escape));
    Ok(Value::string(&text))
}

// ---------------------------------------------------------------------------
// Evaluation

fn prim_error(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let message = match &args[0] {
        Value::Str(control) => {
            printer::format(control, &args[1..], |v, escape| interp.print_value(v, escape))
        }
        other => interp.print_value(other, false),
    };
    Err(Error::user(message))
}

/// `(apply f a b '(c d))` spreads the last argument
fn prim_apply(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let (function, rest) = args.split_first().ok_or_else(|| Error::user("apply needs a function"))?;
    let Some((spread, fixed)) = rest.split_last() else {
        return interp.apply_value(function, &[]);
    };
    let mut argv = fixed.to_vec();
    argv.extend(expect_list(spread)?);
    interp.apply_value(function, &argv)
}

fn prim_eval(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    interp.eval_value(&args[0])
}

/// Expand a macro call once; anything else comes back unchanged
fn prim_macroexpand(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let form = &args[0];
    let Some(cell) = form.as_cons() else {
        return Ok(form.clone());
    };
    let Some(Value::Macro(expander)) = cell.car.as_symbol().and_then(|s| interp.globals.get(&s).cloned())
    else {
        return Ok(form.clone());
    };
    let margs = expect_list(&cell.cdr)?;
    interp.counters.macro_expansions += 1;
    interp.apply_closure(&expander, &margs, None)
}

fn prim_load(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let path = expect_str(&args[0])?.to_string();
    interp.load_file(path)
}

// ---------------------------------------------------------------------------
// Vectors

fn prim_vector(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::vector(args.to_vec()))
}

fn expect_vector(value: &Value) -> EvalResult<&Rc<std::cell::RefCell<Vec<Value>>>> {
    match value {
        Value::Vector(v) => Ok(v),
        other => Err(Error::type_error("vector", other)),
    }
}

fn out_of_range(index: usize, len: usize) -> Error {
    Error::user(format!("index {index} out of range for length {len}"))
}

fn prim_vector_ref(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let v = expect_vector(&args[0])?.borrow();
    let index = expect_index(&args[1])?;
    v.get(index).cloned().ok_or_else(|| out_of_range(index, v.len()))
}

fn prim_vector_set(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut v = expect_vector(&args[0])?.borrow_mut();
    let index = expect_index(&args[1])?;
    let len = v.len();
    let slot = v.get_mut(index).ok_or_else(|| out_of_range(index, len))?;
    *slot = args[2].clone();
    Ok(args[2].clone())
}

fn prim_vector_length(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Int(expect_vector(&args[0])?.borrow().len() as i64))
}

fn prim_list_to_vector(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::vector(expect_list(&args[0])?))
}

fn prim_vector_to_list(_: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(Value::list(expect_vector(&args[0])?.borrow().clone()))
}

// ---------------------------------------------------------------------------
// Packages

fn find_package(interp: &Interpreter, value: &Value) -> EvalResult<PackageId> {
    let name = name_of(interp, value)?;
    interp
        .symbols
        .find_package(&name)
        .ok_or_else(|| Error::user(format!("no package named {name}")))
}

/// New packages use `system`, like `user` does
fn prim_make_package(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = name_of(interp, &args[0])?;
    if interp.symbols.find_package(&name).is_none() {
        let pkg = interp.symbols.create_package(&name);
        interp.symbols.use_package(pkg, PackageId::SYSTEM);
    }
    Ok(Value::string(&name))
}

fn prim_in_package(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let pkg = find_package(interp, &args[0])?;
    interp.current_package = pkg;
    Ok(Value::string(
        &interp.symbols.package_name(pkg).unwrap_or_default(),
    ))
}

fn prim_use_package(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let used = find_package(interp, &args[0])?;
    interp.symbols.use_package(interp.current_package, used);
    Ok(Value::Bool(true))
}

/// Export a symbol or a list of symbols from their home packages
fn prim_export(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let symbols = match &args[0] {
        Value::Symbol(sym) => vec![Value::Symbol(*sym)],
        other => expect_list(other)?,
    };
    for sym in &symbols {
        match sym {
            Value::Symbol(sym) => interp.symbols.export_symbol(*sym),
            other => return Err(Error::type_error("symbol", other)),
        }
    }
    Ok(Value::Bool(true))
}

fn prim_find_symbol(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = name_of(interp, &args[0])?;
    let pkg = match args.get(1) {
        Some(pkg) => find_package(interp, pkg)?,
        None => interp.current_package,
    };
    Ok(interp
        .symbols
        .find_symbol_in(&name, pkg)
        .map(Value::Symbol)
        .unwrap_or_default())
}

fn prim_symbol_package(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    match &args[0] {
        Value::Symbol(sym) => Ok(interp
            .symbols
            .symbol_package(*sym)
            .and_then(|pkg| interp.symbols.package_name(pkg))
            .map(|name| Value::string(&name))
            .unwrap_or_default()),
        other => Err(Error::type_error("symbol", other)),
    }
}

// ---------------------------------------------------------------------------
// Objects

fn prim_new(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = expect_class(&args[0])?;
    interp.make_instance(class, &args[1..])
}

fn prim_get_slot(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = interp.slot_name(&args[1])?;
    interp.get_slot(&args[0], &name)
}

fn prim_set_slot(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = interp.slot_name(&args[1])?;
    interp.set_slot(&args[0], &name, args[2].clone())
}

fn prim_slot_value(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = interp.slot_name(&args[1])?;
    interp.slot_value(&args[0], &name)
}

fn prim_set_slot_value(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = interp.slot_name(&args[1])?;
    interp.set_slot_value(&args[0], &name, args[2].clone())
}

fn prim_class_of(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    Ok(interp
        .class_of(&args[0])
        .map(Value::Class)
        .unwrap_or_default())
}

fn prim_class_name(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = expect_class(&args[0])?;
    Ok(Value::string(interp.classes.class_name(class)))
}

fn prim_instance_of(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = expect_class(&args[1])?;
    Ok(Value::Bool(interp.instance_of(&args[0], class)))
}

fn prim_class_linearization(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = expect_class(&args[0])?;
    let order = interp.classes.linearization(class);
    Ok(Value::list(order.iter().map(|id| Value::Class(*id)).collect()))
}

/// Slot names visible on a class or instance, as strings
fn prim_slot_names(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let mut names: Vec<std::sync::Arc<str>> = Vec::new();
    let class = match &args[0] {
        Value::Class(id) => *id,
        Value::Instance(inst) => {
            let inst = inst.borrow();
            names.extend(inst.slots.keys().cloned());
            inst.effective_class()
        }
        other => return Err(Error::type_error("class or instance", other)),
    };
    for name in interp.classes.slot_names(class) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(Value::list(names.iter().map(|n| Value::string(n)).collect()))
}

fn prim_add_slot(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = interp.customization_target(&args[0])?;
    let name = interp.slot_name(&args[1])?;
    let default = args.get(2).cloned().unwrap_or_default();
    interp
        .classes
        .add_slot(class, &name, SlotDefault::Constant(default));
    Ok(Value::Null)
}

fn prim_remove_slot(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = interp.customization_target(&args[0])?;
    let name = interp.slot_name(&args[1])?;
    Ok(Value::Bool(interp.classes.remove_slot(class, &name)))
}

fn prim_extend_class(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let class = expect_class(&args[0])?;
    let parents = args[1..]
        .iter()
        .map(expect_class)
        .collect::<EvalResult<Vec<_>>>()?;
    interp.classes.extend(class, &parents)?;
    Ok(args[0].clone())
}

/// `(send obj 'name args...)`
fn prim_send(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = name_of(interp, &args[1])?;
    let mut argv = Vec::with_capacity(args.len() - 1);
    argv.push(args[0].clone());
    argv.extend_from_slice(&args[2..]);
    interp.invoke_behavior(&name, &argv, None)
}

fn prim_has_behavior(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let name = name_of(interp, &args[1])?;
    Ok(Value::Bool(interp.has_behavior(&args[0], &name)))
}

// ---------------------------------------------------------------------------
// Operators

/// `(add-operator-method + :string :integer f)`
fn prim_add_operator_method(interp: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
    let Value::Operator(id) = args[0] else {
        return Err(Error::type_error("operator", &args[0]));
    };
    let mut tags = [TypeTag::Object; 2];
    for (tag, arg) in tags.iter_mut().zip(&args[1..3]) {
        let name = name_of(interp, arg)?;
        *tag = TypeTag::from_name(&name)
            .ok_or_else(|| Error::user(format!("unknown operand type {name}")))?;
    }
    if !args[3].is_callable() {
        return Err(Error::type_error("function", &args[3]));
    }
    let op = interp
        .operators
        .get_mut(id)
        .ok_or_else(|| RuntimeError::NotCallable(format!("operator {}", id.0)))?;
    op.add_method(tags[0], tags[1], OperatorMethod::Lisp(args[3].clone()));
    log::debug!("operator {} gained a ({}, {}) method", op.name, tags[0].name(), tags[1].name());
    Ok(args[0].clone())
}
