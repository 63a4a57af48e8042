// dynlisp Readtables
//
// Character syntax types and the reader macro dispatch table. Embedders may
// override any entry before constructing a reader.

use crate::fastmap::HashMap;
use crate::reader::{MacroResult, Reader};

/// Character Syntax Types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxType {
    Constituent,
    Whitespace,
    /// Ends the token being read
    TerminatingMacro,
    /// Only acts as a macro at the start of a token
    NonTerminatingMacro,
}

/// Reader Macro Function Signature
///
/// Called with the triggering character already consumed. Returns `None`
/// when the macro produced no datum (comments).
pub type ReaderMacroFn = fn(&mut Reader<'_>, char) -> MacroResult;

#[derive(Clone)]
pub struct Readtable {
    syntax_types: HashMap<char, SyntaxType>,
    macro_functions: HashMap<char, ReaderMacroFn>,
    dispatch_tables: HashMap<char, HashMap<char, ReaderMacroFn>>,
}

impl Readtable {
    pub fn new() -> Self {
        let mut rt = Self {
            syntax_types: HashMap::default(),
            macro_functions: HashMap::default(),
            dispatch_tables: HashMap::default(),
        };
        rt.initialize_standard();
        rt
    }

    fn initialize_standard(&mut self) {
        for c in [' ', '\t', '\n', '\r', '\x0c'] {
            self.set_syntax_type(c, SyntaxType::Whitespace);
        }

        self.set_macro_character('(', Some(macro_left_paren), true);
        self.set_macro_character(')', Some(macro_right_delimiter), true);
        self.set_macro_character('[', Some(macro_left_bracket), true);
        self.set_macro_character(']', Some(macro_right_delimiter), true);
        self.set_macro_character('"', Some(macro_string), true);
        self.set_macro_character('\'', Some(macro_quote), true);
        self.set_macro_character('`', Some(macro_quasiquote), true);
        self.set_macro_character(',', Some(macro_unquote), true);
        self.set_macro_character(';', Some(macro_comment), true);
        self.set_macro_character('#', Some(macro_dispatch), false);

        self.set_dispatch_macro_character('#', '|', Some(macro_block_comment));
    }

    pub fn get_syntax_type(&self, c: char) -> SyntaxType {
        self.syntax_types
            .get(&c)
            .copied()
            .unwrap_or(SyntaxType::Constituent)
    }

    pub fn set_syntax_type(&mut self, c: char, syntax: SyntaxType) {
        self.syntax_types.insert(c, syntax);
    }

    pub fn get_macro_character(&self, c: char) -> Option<ReaderMacroFn> {
        self.macro_functions.get(&c).copied()
    }

    /// Install or remove a reader macro. Removing one turns the character
    /// back into a constituent.
    pub fn set_macro_character(&mut self, c: char, func: Option<ReaderMacroFn>, terminating: bool) {
        match func {
            Some(f) => {
                self.macro_functions.insert(c, f);
                let syntax = if terminating {
                    SyntaxType::TerminatingMacro
                } else {
                    SyntaxType::NonTerminatingMacro
                };
                self.set_syntax_type(c, syntax);
            }
            None => {
                self.macro_functions.remove(&c);
                self.syntax_types.remove(&c);
            }
        }
    }

    pub fn set_dispatch_macro_character(&mut self, disp: char, sub: char, func: Option<ReaderMacroFn>) {
        let table = self.dispatch_tables.entry(disp).or_default();
        match func {
            Some(f) => {
                table.insert(sub, f);
            }
            None => {
                table.remove(&sub);
            }
        }
    }

    pub fn get_dispatch_macro_character(&self, disp: char, sub: char) -> Option<ReaderMacroFn> {
        self.dispatch_tables.get(&disp).and_then(|t| t.get(&sub)).copied()
    }

    pub fn is_whitespace(&self, c: char) -> bool {
        self.get_syntax_type(c) == SyntaxType::Whitespace
    }

    /// Whitespace and terminating macro characters end a token.
    pub fn is_delimiter(&self, c: char) -> bool {
        matches!(
            self.get_syntax_type(c),
            SyntaxType::Whitespace | SyntaxType::TerminatingMacro
        )
    }
}

impl Default for Readtable {
    fn default() -> Self {
        Self::new()
    }
}

fn macro_left_paren(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.read_list(')').map(Some)
}

fn macro_left_bracket(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.read_vector(']').map(Some)
}

fn macro_right_delimiter(reader: &mut Reader<'_>, c: char) -> MacroResult {
    Err(reader.unmatched(c))
}

fn macro_string(reader: &mut Reader<'_>, c: char) -> MacroResult {
    reader.read_string(c).map(Some)
}

fn macro_quote(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.read_wrapped("quote").map(Some)
}

fn macro_quasiquote(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.read_wrapped("quasiquote").map(Some)
}

fn macro_unquote(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    if reader.peek_char() == Some('@') {
        reader.next_char();
        reader.read_wrapped("unquote-splicing").map(Some)
    } else {
        reader.read_wrapped("unquote").map(Some)
    }
}

fn macro_comment(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.skip_line_comment();
    Ok(None)
}

fn macro_dispatch(reader: &mut Reader<'_>, c: char) -> MacroResult {
    reader.read_dispatch(c)
}

fn macro_block_comment(reader: &mut Reader<'_>, _c: char) -> MacroResult {
    reader.skip_block_comment()?;
    Ok(None)
}
