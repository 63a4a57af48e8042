// dynlisp Reader - S-Expression Parser
//
// Turns text into data through the readtable. Source lines of compound data
// are kept in a side table keyed by object identity; the analyzer consumes it
// once per top-level form.

use crate::error::{SourceLoc, SyntaxError, SyntaxErrorKind};
use crate::fastmap::HashMap;
use crate::readtable::{Readtable, SyntaxType};
use crate::symbol::{PackageId, SymbolTable};
use crate::types::Value;
use std::rc::Rc;

pub type ReadResult<T> = Result<T, SyntaxError>;

/// Result of a reader macro: `None` when nothing was produced.
pub type MacroResult = ReadResult<Option<Value>>;

struct ReaderInput {
    chars: Vec<char>,
    index: usize,
    line: u32,
}

impl ReaderInput {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            index: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.chars.get(self.index).copied()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }
}

/// Identity-keyed source locations of compound data.
#[derive(Debug, Default)]
pub struct SourceMap {
    entries: HashMap<usize, SourceLoc>,
}

impl SourceMap {
    fn key(value: &Value) -> Option<usize> {
        match value {
            Value::Cons(c) => Some(Rc::as_ptr(c) as usize),
            Value::Vector(v) => Some(Rc::as_ptr(v) as *const () as usize),
            _ => None,
        }
    }

    pub fn record(&mut self, value: &Value, loc: SourceLoc) {
        if let Some(key) = Self::key(value) {
            self.entries.insert(key, loc);
        }
    }

    pub fn location_of(&self, value: &Value) -> Option<&SourceLoc> {
        Self::key(value).and_then(|k| self.entries.get(&k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Next {
    Datum(Value),
    Close,
    Eof,
}

/// The dynlisp Reader
pub struct Reader<'a> {
    input: ReaderInput,
    symbols: &'a SymbolTable,
    readtable: &'a Readtable,
    package: PackageId,
    file: Rc<str>,
    locations: SourceMap,
}

impl<'a> Reader<'a> {
    pub fn new(
        input: &str,
        file: &str,
        symbols: &'a SymbolTable,
        readtable: &'a Readtable,
        package: PackageId,
    ) -> Self {
        Self {
            input: ReaderInput::new(input),
            symbols,
            readtable,
            package,
            file: Rc::from(file),
            locations: SourceMap::default(),
        }
    }

    /// Read one datum. `Ok(None)` signals a clean end of input.
    pub fn read(&mut self) -> ReadResult<Option<Value>> {
        match self.read_next(None)? {
            Next::Datum(v) => Ok(Some(v)),
            Next::Eof => Ok(None),
            Next::Close => Err(self.error(SyntaxErrorKind::UnexpectedEof)),
        }
    }

    /// Hand over the locations recorded so far.
    pub fn take_locations(&mut self) -> SourceMap {
        std::mem::take(&mut self.locations)
    }

    /// Package for symbols read from here on
    pub fn set_package(&mut self, package: PackageId) {
        self.package = package;
    }

    pub fn line(&self) -> u32 {
        self.input.line
    }

    pub fn loc(&self) -> SourceLoc {
        SourceLoc {
            file: self.file.clone(),
            line: self.input.line,
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.input.peek()
    }

    pub fn next_char(&mut self) -> Option<char> {
        self.input.next()
    }

    pub fn error(&self, kind: SyntaxErrorKind) -> SyntaxError {
        SyntaxError {
            loc: self.loc(),
            kind,
        }
    }

    pub fn unmatched(&self, c: char) -> SyntaxError {
        self.error(SyntaxErrorKind::UnmatchedDelimiter(c))
    }

    fn read_next(&mut self, close: Option<char>) -> ReadResult<Next> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.input.peek() else {
                return Ok(Next::Eof);
            };
            if Some(c) == close {
                self.input.next();
                return Ok(Next::Close);
            }
            match self.readtable.get_syntax_type(c) {
                SyntaxType::TerminatingMacro | SyntaxType::NonTerminatingMacro => {
                    let Some(func) = self.readtable.get_macro_character(c) else {
                        return self.read_atom().map(Next::Datum);
                    };
                    self.input.next();
                    if let Some(datum) = func(self, c)? {
                        return Ok(Next::Datum(datum));
                    }
                }
                SyntaxType::Whitespace => {
                    self.input.next();
                }
                SyntaxType::Constituent => return self.read_atom().map(Next::Datum),
            }
        }
    }

    /// Read a datum that must be present.
    fn read_required(&mut self) -> ReadResult<Value> {
        match self.read_next(None)? {
            Next::Datum(v) => Ok(v),
            Next::Eof | Next::Close => Err(self.error(SyntaxErrorKind::UnexpectedEof)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.input.peek() {
            if self.readtable.is_whitespace(c) {
                self.input.next();
            } else {
                break;
            }
        }
    }

    pub(crate) fn skip_line_comment(&mut self) {
        while let Some(c) = self.input.next() {
            if c == '\n' {
                break;
            }
        }
    }

    /// Skip a `#| ... |#` comment; the opening marker is already consumed.
    pub(crate) fn skip_block_comment(&mut self) -> ReadResult<()> {
        let mut depth = 1;
        while depth > 0 {
            match self.input.next() {
                None => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
                Some('|') if self.input.peek() == Some('#') => {
                    self.input.next();
                    depth -= 1;
                }
                Some('#') if self.input.peek() == Some('|') => {
                    self.input.next();
                    depth += 1;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Read list elements up to `close`; the opening delimiter is consumed.
    pub(crate) fn read_list(&mut self, close: char) -> ReadResult<Value> {
        let start = self.loc();
        let mut elements = Vec::new();
        let mut tail = Value::Null;
        loop {
            self.skip_whitespace();
            if self.is_dot_marker() {
                if elements.is_empty() {
                    return Err(self.error(SyntaxErrorKind::UnexpectedChar('.')));
                }
                self.input.next();
                tail = self.read_required()?;
                match self.read_next(Some(close))? {
                    Next::Close => break,
                    Next::Eof => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
                    Next::Datum(_) => return Err(self.error(SyntaxErrorKind::UnexpectedChar('.'))),
                }
            }
            match self.read_next(Some(close))? {
                Next::Datum(v) => elements.push(v),
                Next::Close => break,
                Next::Eof => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
            }
        }
        if elements.is_empty() {
            return Ok(Value::Null);
        }
        let list = Value::list_with_tail(elements, tail);
        self.locations.record(&list, start);
        Ok(list)
    }

    fn is_dot_marker(&self) -> bool {
        self.input.peek() == Some('.')
            && self
                .input
                .peek_at(1)
                .map_or(true, |c| self.readtable.is_delimiter(c))
    }

    pub(crate) fn read_vector(&mut self, close: char) -> ReadResult<Value> {
        let start = self.loc();
        let mut elements = Vec::new();
        loop {
            match self.read_next(Some(close))? {
                Next::Datum(v) => elements.push(v),
                Next::Close => break,
                Next::Eof => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
            }
        }
        let vector = Value::vector(elements);
        self.locations.record(&vector, start);
        Ok(vector)
    }

    pub(crate) fn read_string(&mut self, delim: char) -> ReadResult<Value> {
        let mut s = String::new();
        loop {
            match self.input.next() {
                None => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
                Some(c) if c == delim => break,
                Some('\\') => {
                    let escaped = match self.input.next() {
                        None => return Err(self.error(SyntaxErrorKind::UnexpectedEof)),
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('n') => '\n',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(other) => {
                            return Err(self.error(SyntaxErrorKind::MalformedEscape(other)))
                        }
                    };
                    s.push(escaped);
                }
                Some(c) => s.push(c),
            }
        }
        Ok(Value::string(&s))
    }

    /// `'x` -> `(quote x)` and friends
    pub(crate) fn read_wrapped(&mut self, name: &str) -> ReadResult<Value> {
        let start = self.loc();
        let datum = self.read_required()?;
        let head = self.symbols.intern_in(name, PackageId::SYSTEM);
        let form = Value::list(vec![Value::Symbol(head), datum]);
        self.locations.record(&form, start);
        Ok(form)
    }

    pub(crate) fn read_dispatch(&mut self, disp: char) -> MacroResult {
        let Some(sub) = self.input.next() else {
            return Err(self.error(SyntaxErrorKind::UnexpectedEof));
        };
        match self.readtable.get_dispatch_macro_character(disp, sub) {
            Some(func) => func(self, sub),
            None => Err(self.error(SyntaxErrorKind::UnknownDispatch(sub))),
        }
    }

    fn read_atom(&mut self) -> ReadResult<Value> {
        let line = self.input.line;
        let mut token = String::new();
        while let Some(c) = self.input.peek() {
            if self.readtable.is_delimiter(c) {
                break;
            }
            token.push(c);
            self.input.next();
        }
        if token.is_empty() {
            let c = self.input.peek().unwrap_or(' ');
            return Err(self.error(SyntaxErrorKind::UnexpectedChar(c)));
        }
        self.parse_atom(&token, line)
    }

    fn parse_atom(&mut self, token: &str, line: u32) -> ReadResult<Value> {
        if let Some(n) = parse_integer(token) {
            return Ok(n);
        }
        if looks_like_float(token) {
            if let Ok(f) = token.parse::<f64>() {
                return Ok(Value::Float(f));
            }
        }
        if let Some(member_form) = self.split_member_access(token, line)? {
            return Ok(member_form);
        }
        self.parse_symbol(token)
    }

    fn parse_symbol(&self, token: &str) -> ReadResult<Value> {
        if let Some(name) = token.strip_prefix(':') {
            if !name.is_empty() {
                return Ok(Value::Symbol(self.symbols.intern_keyword(name)));
            }
        }
        self.symbols
            .intern(token, self.package)
            .map(Value::Symbol)
            .map_err(|pkg| self.error(SyntaxErrorKind::UnknownPackage(pkg)))
    }

    /// `obj.a.b` -> `(.b (.a obj))`
    fn split_member_access(&mut self, token: &str, line: u32) -> ReadResult<Option<Value>> {
        if token.starts_with('.') || token.starts_with(':') || !token.contains('.') {
            return Ok(None);
        }
        let parts: Vec<&str> = token.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Ok(None);
        }
        let loc = SourceLoc {
            file: self.file.clone(),
            line,
        };
        let mut form = match parse_integer(parts[0]) {
            Some(n) => n,
            None => self.parse_symbol(parts[0])?,
        };
        for member in &parts[1..] {
            let accessor = self.parse_symbol(&format!(".{member}"))?;
            form = Value::list(vec![accessor, form]);
            self.locations.record(&form, loc.clone());
        }
        Ok(Some(form))
    }
}

fn parse_integer(token: &str) -> Option<Value> {
    let digits = token
        .strip_prefix('-')
        .or_else(|| token.strip_prefix('+'))
        .unwrap_or(token);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if let Ok(n) = token.parse::<i64>() {
        return Some(Value::Int(n));
    }
    token.parse::<num_bigint::BigInt>().ok().map(Value::from)
}

/// Rejects tokens like `inf` or `nan` that Rust would happily parse.
fn looks_like_float(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
}

/// Convenience function to read a single datum from a string
pub fn read_from_string(
    input: &str,
    symbols: &SymbolTable,
    package: PackageId,
) -> ReadResult<Option<Value>> {
    let rt = Readtable::new();
    Reader::new(input, "<string>", symbols, &rt, package).read()
}

/// Read all data from a string
pub fn read_all(input: &str, symbols: &SymbolTable, package: PackageId) -> ReadResult<Vec<Value>> {
    let rt = Readtable::new();
    let mut reader = Reader::new(input, "<string>", symbols, &rt, package);
    let mut results = Vec::new();
    while let Some(datum) = reader.read()? {
        results.push(datum);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(input: &str) -> (Value, SymbolTable) {
        let symbols = SymbolTable::new();
        let value = read_from_string(input, &symbols, PackageId::USER)
            .unwrap()
            .unwrap();
        (value, symbols)
    }

    fn name_of(symbols: &SymbolTable, v: &Value) -> String {
        symbols.symbol_name(v.as_symbol().unwrap()).to_string()
    }

    #[test]
    fn test_read_numbers() {
        assert!(matches!(read_one("42").0, Value::Int(42)));
        assert!(matches!(read_one("-7").0, Value::Int(-7)));
        match read_one("3.25").0 {
            Value::Float(f) => assert!((f - 3.25).abs() < f64::EPSILON),
            other => panic!("expected float, got {other:?}"),
        }
        assert!(matches!(read_one("123456789012345678901234567890").0, Value::BigInt(_)));
    }

    #[test]
    fn test_read_symbol_like_tokens() {
        let (v, symbols) = read_one("inf");
        assert_eq!(name_of(&symbols, &v), "inf");
        let (v, symbols) = read_one("-");
        assert_eq!(name_of(&symbols, &v), "-");
        let (v, symbols) = read_one(":key");
        assert!(symbols.is_keyword(v.as_symbol().unwrap()));
    }

    #[test]
    fn test_read_empty_list() {
        assert!(read_one("()").0.is_null());
    }

    #[test]
    fn test_read_nested_list_and_vector() {
        let (v, _) = read_one("(a (b c) [1 2])");
        let items = v.list_to_vec().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].list_to_vec().unwrap().len(), 2);
        match &items[2] {
            Value::Vector(vec) => assert_eq!(vec.borrow().len(), 2),
            other => panic!("expected vector, got {other:?}"),
        }
    }

    #[test]
    fn test_read_dotted_pair() {
        let (v, _) = read_one("(1 . 2)");
        let c = v.as_cons().unwrap();
        assert!(matches!(c.car, Value::Int(1)));
        assert!(matches!(c.cdr, Value::Int(2)));
    }

    #[test]
    fn test_read_quote_family() {
        let (v, symbols) = read_one("'x");
        assert_eq!(name_of(&symbols, v.car().unwrap()), "quote");
        let (v, symbols) = read_one("`(a ,b ,@c)");
        assert_eq!(name_of(&symbols, v.car().unwrap()), "quasiquote");
        let inner = v.list_to_vec().unwrap()[1].list_to_vec().unwrap();
        assert_eq!(name_of(&symbols, inner[1].car().unwrap()), "unquote");
        assert_eq!(name_of(&symbols, inner[2].car().unwrap()), "unquote-splicing");
    }

    #[test]
    fn test_read_string_escapes() {
        match read_one(r#""a\tb\n\"q\"\\""#).0 {
            Value::Str(s) => assert_eq!(&*s, "a\tb\n\"q\"\\"),
            other => panic!("expected string, got {other:?}"),
        }
        let symbols = SymbolTable::new();
        let err = read_from_string(r#""bad\q""#, &symbols, PackageId::USER).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::MalformedEscape('q'));
    }

    #[test]
    fn test_comments_are_skipped() {
        let symbols = SymbolTable::new();
        let forms = read_all(
            "; line\n1 #| block #| nested |# |# 2 (3 ; inside\n)",
            &symbols,
            PackageId::USER,
        )
        .unwrap();
        assert_eq!(forms.len(), 3);
        assert_eq!(forms[2].list_to_vec().unwrap().len(), 1);
    }

    #[test]
    fn test_unmatched_delimiter_reports_line() {
        let symbols = SymbolTable::new();
        let err = read_all("(a)\n\n)", &symbols, PackageId::USER).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnmatchedDelimiter(')'));
        assert_eq!(err.loc.line, 3);

        let err = read_all("(a ]", &symbols, PackageId::USER).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnmatchedDelimiter(']'));
    }

    #[test]
    fn test_premature_eof() {
        let symbols = SymbolTable::new();
        let err = read_all("(a (b", &symbols, PackageId::USER).unwrap_err();
        assert!(err.is_eof());
        assert!(read_all("'", &symbols, PackageId::USER).unwrap_err().is_eof());
        assert!(read_all("\"open", &symbols, PackageId::USER).unwrap_err().is_eof());
    }

    #[test]
    fn test_member_access_split() {
        let (v, symbols) = read_one("point.x");
        let items = v.list_to_vec().unwrap();
        assert_eq!(name_of(&symbols, &items[0]), ".x");
        assert_eq!(name_of(&symbols, &items[1]), "point");

        let (v, symbols) = read_one("a.b.c");
        let items = v.list_to_vec().unwrap();
        assert_eq!(name_of(&symbols, &items[0]), ".c");
        assert!(items[1].is_list());

        let (v, symbols) = read_one(".method");
        assert_eq!(name_of(&symbols, &v), ".method");
    }

    #[test]
    fn test_locations_recorded_per_list() {
        let symbols = SymbolTable::new();
        let rt = Readtable::new();
        let mut reader = Reader::new("\n(f\n  (g 1))", "src.lisp", &symbols, &rt, PackageId::USER);
        let form = reader.read().unwrap().unwrap();
        let locations = reader.take_locations();
        assert_eq!(locations.location_of(&form).unwrap().line, 2);
        let inner = &form.list_to_vec().unwrap()[1];
        let loc = locations.location_of(inner).unwrap();
        assert_eq!(loc.line, 3);
        assert_eq!(&*loc.file, "src.lisp");
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_unknown_package_is_syntax_error() {
        let symbols = SymbolTable::new();
        let err = read_from_string("nowhere@x", &symbols, PackageId::USER).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::UnknownPackage("nowhere".into()));
    }
}
