// dynlisp Printer - Value Output
//
// `prin1` output reads back as the same datum for numbers, strings, symbols
// and lists; `princ` output is meant for people.

use crate::clos::ClassSpace;
use crate::operators::OperatorTable;
use crate::symbol::{PackageId, SymbolId, SymbolTable};
use crate::types::Value;

/// Print options
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Print readably (escape special chars)
    pub escape: bool,
    /// Symbols not accessible from this package get a `pkg@` prefix
    pub package: PackageId,
    /// Maximum depth to print
    pub max_depth: usize,
    /// Maximum list length to print
    pub max_length: usize,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            escape: true,
            package: PackageId::USER,
            max_depth: 100,
            max_length: 1000,
        }
    }
}

impl PrintOptions {
    /// For prin1 (readable)
    pub fn prin1() -> Self {
        Self::default()
    }

    /// For princ (human-readable)
    pub fn princ() -> Self {
        Self {
            escape: false,
            ..Self::default()
        }
    }

    pub fn in_package(mut self, package: PackageId) -> Self {
        self.package = package;
        self
    }
}

/// The dynlisp Printer
pub struct Printer<'a> {
    symbols: &'a SymbolTable,
    classes: Option<&'a ClassSpace>,
    operators: Option<&'a OperatorTable>,
    output: String,
    options: PrintOptions,
    current_depth: usize,
}

impl<'a> Printer<'a> {
    pub fn new(symbols: &'a SymbolTable, options: PrintOptions) -> Self {
        Self {
            symbols,
            classes: None,
            operators: None,
            output: String::new(),
            options,
            current_depth: 0,
        }
    }

    /// Resolve class names when printing classes and instances
    pub fn with_classes(mut self, classes: &'a ClassSpace) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn with_operators(mut self, operators: &'a OperatorTable) -> Self {
        self.operators = Some(operators);
        self
    }

    /// Print a value to string
    pub fn print(&mut self, value: &Value) -> &str {
        self.print_value(value);
        &self.output
    }

    pub fn into_string(self) -> String {
        self.output
    }

    fn print_value(&mut self, value: &Value) {
        if self.current_depth > self.options.max_depth {
            self.output.push_str("...");
            return;
        }

        self.current_depth += 1;
        match value {
            Value::Null => self.output.push_str("null"),
            Value::Bool(true) => self.output.push_str("true"),
            Value::Bool(false) => self.output.push_str("false"),
            Value::Int(n) => self.output.push_str(&n.to_string()),
            Value::BigInt(n) => self.output.push_str(&n.to_string()),
            Value::Float(f) => self.print_float(*f),
            Value::Str(s) => self.print_string(s),
            Value::Symbol(id) => self.print_symbol(*id),
            Value::Cons(_) => self.print_list(value),
            Value::Vector(items) => {
                self.output.push('[');
                let items = items.borrow();
                for (i, item) in items.iter().enumerate() {
                    if i >= self.options.max_length {
                        self.output.push_str(" ...");
                        break;
                    }
                    if i > 0 {
                        self.output.push(' ');
                    }
                    self.print_value(item);
                }
                self.output.push(']');
            }
            Value::Closure(c) => self.print_named("closure", c.name),
            Value::Macro(c) => self.print_named("macro", c.name),
            Value::Primitive(p) => {
                self.output.push_str("#<primitive ");
                self.output.push_str(p.name);
                self.output.push('>');
            }
            Value::Operator(id) => {
                let name = self
                    .operators
                    .and_then(|ops| ops.name(*id))
                    .map(str::to_string)
                    .unwrap_or_else(|| id.0.to_string());
                self.output.push_str(&format!("#<operator {name}>"));
            }
            Value::NextMethod(_) => self.output.push_str("#<next-method>"),
            Value::Class(id) => {
                let name = self.class_name(*id);
                self.output.push_str(&format!("#<class {name}>"));
            }
            Value::Instance(inst) => {
                let name = self.class_name(inst.borrow().class);
                self.output.push_str(&format!("#<{name} instance>"));
            }
            Value::Native(n) => {
                self.output.push_str(&format!("#<native {}>", n.type_name()));
            }
        }
        self.current_depth -= 1;
    }

    fn class_name(&self, id: crate::types::ClassId) -> String {
        self.classes
            .map(|c| c.class_name(id).to_string())
            .unwrap_or_else(|| id.0.to_string())
    }

    fn print_named(&mut self, kind: &str, name: Option<SymbolId>) {
        match name {
            Some(sym) => {
                let name = self.symbols.symbol_name(sym);
                self.output.push_str(&format!("#<{kind} {name}>"));
            }
            None => self.output.push_str(&format!("#<{kind}>")),
        }
    }

    fn print_float(&mut self, f: f64) {
        if f.is_nan() {
            self.output.push_str("NaN");
        } else if f.is_infinite() {
            self.output.push_str(if f > 0.0 { "+Inf" } else { "-Inf" });
        } else {
            // Debug formatting keeps the trailing ".0" so floats read back as floats
            self.output.push_str(&format!("{f:?}"));
        }
    }

    fn print_string(&mut self, s: &str) {
        if !self.options.escape {
            self.output.push_str(s);
            return;
        }
        self.output.push('"');
        for c in s.chars() {
            match c {
                '"' => self.output.push_str("\\\""),
                '\\' => self.output.push_str("\\\\"),
                '\n' => self.output.push_str("\\n"),
                '\t' => self.output.push_str("\\t"),
                '\r' => self.output.push_str("\\r"),
                c => self.output.push(c),
            }
        }
        self.output.push('"');
    }

    fn print_symbol(&mut self, id: SymbolId) {
        let Some(sym) = self.symbols.get_symbol(id) else {
            self.output.push_str(&format!("#<symbol {}>", id.0));
            return;
        };
        if sym.is_keyword() {
            self.output.push(':');
            self.output.push_str(&sym.name);
            return;
        }
        if self.options.escape {
            match sym.package {
                None => self.output.push_str("#:"),
                Some(pkg) => {
                    let accessible =
                        self.symbols.find_symbol_in(&sym.name, self.options.package) == Some(id);
                    if !accessible {
                        if let Some(pkg_name) = self.symbols.package_name(pkg) {
                            self.output.push_str(&pkg_name);
                            self.output.push('@');
                        }
                    }
                }
            }
        }
        self.output.push_str(&sym.name);
    }

    fn print_list(&mut self, list: &Value) {
        self.output.push('(');

        let mut current = list;
        let mut count = 0;

        loop {
            match current {
                Value::Cons(cell) => {
                    if count >= self.options.max_length {
                        self.output.push_str(" ...");
                        break;
                    }
                    if count > 0 {
                        self.output.push(' ');
                    }
                    self.print_value(&cell.car);
                    current = &cell.cdr;
                    count += 1;
                }
                Value::Null => break,
                tail => {
                    // Improper list
                    self.output.push_str(" . ");
                    self.print_value(tail);
                    break;
                }
            }
        }

        self.output.push(')');
    }
}

/// Print a value to string (like prin1-to-string)
pub fn print_to_string(symbols: &SymbolTable, value: &Value) -> String {
    let mut printer = Printer::new(symbols, PrintOptions::prin1());
    printer.print_value(value);
    printer.into_string()
}

/// Print a value without escapes (like princ-to-string)
pub fn princ_to_string(symbols: &SymbolTable, value: &Value) -> String {
    let mut printer = Printer::new(symbols, PrintOptions::princ());
    printer.print_value(value);
    printer.into_string()
}

/// Simple format function: `~a` princ, `~s` prin1, `~%` newline, `~~` tilde
pub fn format(control: &str, args: &[Value], mut render: impl FnMut(&Value, bool) -> String) -> String {
    let mut output = String::new();
    let mut chars = control.chars();
    let mut args = args.iter();

    while let Some(c) = chars.next() {
        if c != '~' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('a') | Some('A') => {
                if let Some(arg) = args.next() {
                    output.push_str(&render(arg, false));
                }
            }
            Some('s') | Some('S') | Some('d') | Some('D') => {
                if let Some(arg) = args.next() {
                    output.push_str(&render(arg, true));
                }
            }
            Some('%') => output.push('\n'),
            Some('~') => output.push('~'),
            Some(other) => {
                // Unknown directive, copy literally
                output.push('~');
                output.push(other);
            }
            None => output.push('~'),
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_from_string;

    fn reprint(symbols: &SymbolTable, text: &str) -> String {
        let value = read_from_string(text, symbols, PackageId::USER).unwrap().unwrap();
        print_to_string(symbols, &value)
    }

    #[test]
    fn test_print_atoms() {
        let symbols = SymbolTable::new();
        assert_eq!(print_to_string(&symbols, &Value::Int(42)), "42");
        assert_eq!(print_to_string(&symbols, &Value::Float(1.0)), "1.0");
        assert_eq!(print_to_string(&symbols, &Value::Null), "null");
        assert_eq!(print_to_string(&symbols, &Value::Bool(true)), "true");
    }

    #[test]
    fn test_print_string_escaping() {
        let symbols = SymbolTable::new();
        let s = Value::string("say \"hi\"\n");
        assert_eq!(print_to_string(&symbols, &s), r#""say \"hi\"\n""#);
        assert_eq!(princ_to_string(&symbols, &s), "say \"hi\"\n");
    }

    #[test]
    fn test_print_list_and_dotted_pair() {
        let symbols = SymbolTable::new();
        let list = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(print_to_string(&symbols, &list), "(1 2 3)");
        let pair = Value::cons(Value::Int(1), Value::Int(2));
        assert_eq!(print_to_string(&symbols, &pair), "(1 . 2)");
    }

    #[test]
    fn test_print_symbols_with_packages() {
        let symbols = SymbolTable::new();
        symbols.create_package("geo");
        assert_eq!(reprint(&symbols, ":key"), ":key");
        assert_eq!(reprint(&symbols, "plain"), "plain");
        assert_eq!(reprint(&symbols, "geo@point"), "geo@point");
    }

    #[test]
    fn test_read_print_idempotent() {
        let symbols = SymbolTable::new();
        for text in [
            "(a  b (c   \"d\\te\") 1 -2.5 (()))",
            "(define (f x) (* x 2.0))",
            "12345678901234567890123",
            "(\"quote\\\"d\" sym 7)",
        ] {
            let once = reprint(&symbols, text);
            let twice = reprint(&symbols, &once);
            assert_eq!(once, twice, "idempotence failed for {text}");
        }
    }

    #[test]
    fn test_format_directives() {
        let symbols = SymbolTable::new();
        let args = [Value::string("x"), Value::string("y")];
        let out = format("~a and ~s~%~~", &args, |v, escape| {
            if escape {
                print_to_string(&symbols, v)
            } else {
                princ_to_string(&symbols, v)
            }
        });
        assert_eq!(out, "x and \"y\"\n~");
    }
}
