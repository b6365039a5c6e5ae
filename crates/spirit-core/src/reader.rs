use std::collections::HashMap;
use std::sync::Arc;

use crate::ast::{Position, Value};
use crate::collections::{PersistentMap, PersistentVector, Set};
use crate::error::SpiritError;

/// A reader macro consumes input starting at its trigger character and
/// produces a form, or None for skipped input (comments, `#_`).
pub type ReaderMacro =
    Arc<dyn Fn(&mut Reader, Position) -> Result<Option<Value>, SpiritError> + Send + Sync>;

const DEFAULT_FILE: &str = "<string>";

/// Recursive-descent reader driven by a table of dispatch macros keyed
/// by first character. Tracks 1-based line and column positions.
pub struct Reader {
    chars: Vec<char>,
    index: usize,
    line: usize,
    col: usize,
    pub file: String,
    macros: HashMap<char, ReaderMacro>,
    dispatch: HashMap<char, ReaderMacro>,
}

impl Reader {
    pub fn new(source: &str) -> Self {
        Self::with_file(source, DEFAULT_FILE)
    }

    pub fn with_file(source: &str, file: &str) -> Self {
        let mut reader = Self {
            chars: source.chars().collect(),
            index: 0,
            line: 1,
            col: 1,
            file: file.to_string(),
            macros: HashMap::new(),
            dispatch: HashMap::new(),
        };
        reader.install_default_macros();
        reader
    }

    /// Registers or clears a reader macro. With `dispatch` the macro
    /// triggers on the character following `#`.
    pub fn set_macro(&mut self, ch: char, handler: Option<ReaderMacro>, dispatch: bool) {
        let table = if dispatch {
            &mut self.dispatch
        } else {
            &mut self.macros
        };
        match handler {
            Some(handler) => {
                table.insert(ch, handler);
            }
            None => {
                table.remove(&ch);
            }
        }
    }

    fn install_default_macros(&mut self) {
        self.set_macro('(', Some(Arc::new(read_list)), false);
        self.set_macro('[', Some(Arc::new(read_vector)), false);
        self.set_macro('{', Some(Arc::new(read_map)), false);
        self.set_macro('"', Some(Arc::new(read_string)), false);
        self.set_macro(';', Some(Arc::new(read_comment)), false);
        self.set_macro('\'', Some(Arc::new(read_quote)), false);
        self.set_macro('~', Some(Arc::new(read_unquote)), false);
        self.set_macro('`', Some(Arc::new(read_syntax_quote)), false);
        self.set_macro('\\', Some(Arc::new(read_character)), false);
        self.set_macro('@', Some(Arc::new(read_deref)), false);
        self.set_macro(':', Some(Arc::new(read_keyword)), false);
        self.set_macro('#', Some(Arc::new(read_dispatch)), false);
        self.set_macro('{', Some(Arc::new(read_set)), true);
        self.set_macro('_', Some(Arc::new(read_discard)), true);
    }

    /// Reads all top-level forms and returns them as a Module.
    pub fn all(&mut self) -> Result<Value, SpiritError> {
        let mut forms = Vec::new();
        self.skip_ws();
        while !self.eof() {
            if let Some(form) = self.read_form()? {
                forms.push(form);
            }
            self.skip_ws();
        }
        Ok(Value::Module(Arc::new(forms)))
    }

    /// Reads one form; None when the input was consumed without
    /// producing one (comment or discard).
    pub fn read_form(&mut self) -> Result<Option<Value>, SpiritError> {
        self.skip_ws();
        if self.eof() {
            return Err(self.eof_err());
        }
        let pos = self.position();
        let ch = self.current();
        if matches!(ch, ')' | ']' | '}') {
            return Err(self.read_err(format!("unexpected delimiter '{}'", ch)));
        }
        if let Some(handler) = self.macros.get(&ch).cloned() {
            return handler(self, pos);
        }
        if self.at_number_start() {
            return self.read_number(pos).map(Some);
        }
        self.read_symbol(pos).map(Some)
    }

    /// Reads the next non-skipped form; EOF here is a read error.
    pub fn read_required_form(&mut self) -> Result<Value, SpiritError> {
        loop {
            if let Some(form) = self.read_form()? {
                return Ok(form);
            }
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.file.clone(), self.line, self.col)
    }

    pub fn eof(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn current(&self) -> char {
        self.chars[self.index]
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.index];
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    /// Commas are whitespace, exactly.
    fn skip_ws(&mut self) {
        while !self.eof() && is_whitespace(self.current()) {
            self.advance();
        }
    }

    fn at_number_start(&self) -> bool {
        let ch = self.current();
        if ch.is_ascii_digit() {
            return true;
        }
        matches!(ch, '+' | '-') && self.peek().map_or(false, |next| next.is_ascii_digit())
    }

    fn read_token(&mut self) -> String {
        let mut token = String::new();
        while !self.eof() && is_symbol_char(self.current()) {
            token.push(self.advance());
        }
        token
    }

    fn read_number(&mut self, pos: Position) -> Result<Value, SpiritError> {
        let token = self.read_token();
        parse_number(&token).map(Value::Number).map_err(|msg| {
            SpiritError::read(format!("{} '{}'", msg, token)).with_pos(pos)
        })
    }

    fn read_symbol(&mut self, pos: Position) -> Result<Value, SpiritError> {
        let token = self.read_token();
        if token.is_empty() {
            let ch = self.current();
            return Err(self.read_err(format!("unexpected character '{}'", ch)));
        }
        Ok(match token.as_str() {
            "nil" => Value::Nil,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::symbol_at(token, pos),
        })
    }

    /// Collects forms until the closing delimiter; running out of
    /// input inside a collection is the EOF sentinel the REPL watches
    /// for.
    fn read_until(&mut self, closer: char) -> Result<Vec<Value>, SpiritError> {
        let mut forms = Vec::new();
        loop {
            self.skip_ws();
            if self.eof() {
                return Err(self.eof_err());
            }
            if self.current() == closer {
                self.advance();
                return Ok(forms);
            }
            if let Some(form) = self.read_form()? {
                forms.push(form);
            }
        }
    }

    fn read_err(&self, message: impl Into<String>) -> SpiritError {
        SpiritError::read(message).with_pos(self.position())
    }

    fn eof_err(&self) -> SpiritError {
        SpiritError::eof().with_pos(self.position())
    }
}

fn is_whitespace(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r' | ',')
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_alphanumeric()
        || matches!(
            ch,
            '+' | '-' | '*' | '/' | '?' | '!' | '<' | '>' | '=' | '&' | '%' | '.' | '_' | '$' | '#'
        )
}

fn read_list(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let forms = reader.read_until(')')?;
    Ok(Some(Value::list(forms, pos)))
}

fn read_vector(reader: &mut Reader, _pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let forms = reader.read_until(']')?;
    Ok(Some(Value::Vector(PersistentVector::from(forms))))
}

fn read_map(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let forms = reader.read_until('}')?;
    if forms.len() % 2 != 0 {
        return Err(SpiritError::read("odd number of forms in hash-map").with_pos(pos));
    }
    let mut map = PersistentMap::new();
    let mut iter = forms.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        if !key.is_hashable() {
            return Err(SpiritError::read(format!(
                "value of type '{}' is not hashable",
                key.type_name()
            ))
            .with_pos(pos));
        }
        map = map.set(key, value);
    }
    Ok(Some(Value::Map(map)))
}

fn read_set(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let forms = reader.read_until('}')?;
    let set: Set = forms.iter().cloned().collect();
    if set.size() != forms.len() {
        return Err(SpiritError::read("duplicate element in set literal").with_pos(pos));
    }
    Ok(Some(Value::Set(set)))
}

fn read_string(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let mut out = String::new();
    loop {
        if reader.eof() {
            return Err(SpiritError::eof().with_pos(pos));
        }
        match reader.advance() {
            '"' => return Ok(Some(Value::String(out))),
            '\\' => {
                if reader.eof() {
                    return Err(SpiritError::eof().with_pos(pos));
                }
                let escaped = reader.advance();
                out.push(match escaped {
                    '"' => '"',
                    '\\' => '\\',
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'b' => '\u{0008}',
                    'f' => '\u{000C}',
                    'a' => '\u{0007}',
                    'v' => '\u{000B}',
                    other => {
                        return Err(SpiritError::read(format!(
                            "illegal escape sequence '\\{}'",
                            other
                        ))
                        .with_pos(pos));
                    }
                });
            }
            other => out.push(other),
        }
    }
}

fn read_comment(reader: &mut Reader, _pos: Position) -> Result<Option<Value>, SpiritError> {
    while !reader.eof() && reader.current() != '\n' {
        reader.advance();
    }
    Ok(None)
}

fn read_quote(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    wrap_next(reader, pos, "quote")
}

fn read_unquote(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    if !reader.eof() && reader.current() == '@' {
        reader.advance();
        return wrap_next(reader, pos, "unquote-splice");
    }
    wrap_next(reader, pos, "unquote")
}

fn read_syntax_quote(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    wrap_next(reader, pos, "syntax-quote")
}

fn read_deref(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    wrap_next(reader, pos, "deref")
}

fn wrap_next(reader: &mut Reader, pos: Position, name: &str) -> Result<Option<Value>, SpiritError> {
    let form = reader.read_required_form()?;
    Ok(Some(Value::list(
        vec![Value::symbol_at(name, pos.clone()), form],
        pos,
    )))
}

fn read_character(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    if reader.eof() {
        return Err(SpiritError::eof().with_pos(pos));
    }
    let token = {
        // Single non-symbol characters like `\(` are valid literals.
        if !is_symbol_char(reader.current()) {
            reader.advance().to_string()
        } else {
            reader.read_token()
        }
    };
    let ch = match token.as_str() {
        "newline" => '\n',
        "tab" => '\t',
        "space" => ' ',
        "formfeed" => '\u{000C}',
        "backspace" => '\u{0008}',
        "return" => '\r',
        _ => {
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(first), None) => first,
                (Some('u'), Some(_)) if token.len() == 5 => {
                    let code = u32::from_str_radix(&token[1..], 16).map_err(|_| {
                        SpiritError::read(format!("invalid unicode literal '\\{}'", token))
                            .with_pos(pos.clone())
                    })?;
                    char::from_u32(code).ok_or_else(|| {
                        SpiritError::read(format!("invalid unicode literal '\\{}'", token))
                            .with_pos(pos.clone())
                    })?
                }
                _ => {
                    return Err(SpiritError::read(format!(
                        "unsupported character '\\{}'",
                        token
                    ))
                    .with_pos(pos));
                }
            }
        }
    };
    Ok(Some(Value::Char(ch)))
}

fn read_keyword(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    let token = reader.read_token();
    if token.is_empty() {
        return Err(SpiritError::read("invalid keyword").with_pos(pos));
    }
    Ok(Some(Value::Keyword(token)))
}

fn read_dispatch(reader: &mut Reader, pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    if reader.eof() {
        return Err(SpiritError::eof().with_pos(pos));
    }
    let ch = reader.current();
    match reader.dispatch.get(&ch).cloned() {
        Some(handler) => handler(reader, pos),
        None => Err(SpiritError::read(format!("unknown dispatch macro '#{}'", ch)).with_pos(pos)),
    }
}

fn read_discard(reader: &mut Reader, _pos: Position) -> Result<Option<Value>, SpiritError> {
    reader.advance();
    reader.read_required_form()?;
    Ok(None)
}

/// Number grammar: decimal with optional sign, fraction and scientific
/// exponent; `0x`/`0X` hex; `0b`/`0B` binary; leading-zero octal; and
/// `NrDDD` for radix N in 2..=36.
fn parse_number(token: &str) -> Result<f64, String> {
    let (sign, mag) = match token.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, token.strip_prefix('+').unwrap_or(token)),
    };

    if let Some(rest) = mag.strip_prefix("0x").or_else(|| mag.strip_prefix("0X")) {
        return i64::from_str_radix(rest, 16)
            .map(|n| sign * n as f64)
            .map_err(|_| "illegal hex number".to_string());
    }
    if let Some(rest) = mag.strip_prefix("0b").or_else(|| mag.strip_prefix("0B")) {
        return i64::from_str_radix(rest, 2)
            .map(|n| sign * n as f64)
            .map_err(|_| "illegal binary number".to_string());
    }
    if let Some((radix, digits)) = mag.split_once('r') {
        let radix: u32 = radix
            .parse()
            .map_err(|_| "illegal radix number".to_string())?;
        if !(2..=36).contains(&radix) {
            return Err("radix must be in range [2, 36] in".to_string());
        }
        return i64::from_str_radix(digits, radix)
            .map(|n| sign * n as f64)
            .map_err(|_| "illegal radix number".to_string());
    }
    if mag.len() > 1
        && mag.starts_with('0')
        && !mag.contains('.')
        && !mag.contains('e')
        && !mag.contains('E')
    {
        return i64::from_str_radix(&mag[1..], 8)
            .map(|n| sign * n as f64)
            .map_err(|_| "illegal octal number".to_string());
    }
    mag.parse::<f64>()
        .map(|n| sign * n)
        .map_err(|_| "illegal number format".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_one(src: &str) -> Value {
        let module = Reader::new(src).all().unwrap();
        match module {
            Value::Module(forms) => forms.first().cloned().expect("no forms read"),
            other => panic!("expected module, got {}", other),
        }
    }

    fn read_err(src: &str) -> SpiritError {
        Reader::new(src).all().unwrap_err()
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(read_one("nil"), Value::Nil);
        assert_eq!(read_one("true"), Value::Bool(true));
        assert_eq!(read_one("false"), Value::Bool(false));
        assert_eq!(read_one(":hello"), Value::Keyword("hello".into()));
        assert_eq!(read_one("\"hi\""), Value::String("hi".into()));
    }

    #[test]
    fn number_literals() {
        assert_eq!(read_one("42"), Value::Number(42.0));
        assert_eq!(read_one("-12.5"), Value::Number(-12.5));
        assert_eq!(read_one("+3"), Value::Number(3.0));
        assert_eq!(read_one("1e3"), Value::Number(1000.0));
        assert_eq!(read_one("1.5e-2"), Value::Number(0.015));
        assert_eq!(read_one("0x1F"), Value::Number(31.0));
        assert_eq!(read_one("0b101"), Value::Number(5.0));
        assert_eq!(read_one("0777"), Value::Number(511.0));
        assert_eq!(read_one("2r1010"), Value::Number(10.0));
        assert_eq!(read_one("36rZZ"), Value::Number(1295.0));
        assert_eq!(read_one("-0x10"), Value::Number(-16.0));
    }

    #[test]
    fn malformed_numbers_are_read_errors() {
        for src in ["08", "2r", "1e1.3", "9.3.2", "0b1.0", "0x", "37r10"] {
            let err = read_err(src);
            assert!(err.is_kind("ReadError"), "{} should be a ReadError", src);
        }
    }

    #[test]
    fn string_escapes() {
        assert_eq!(read_one(r#""a\nb""#), Value::String("a\nb".into()));
        assert_eq!(read_one(r#""a\"b""#), Value::String("a\"b".into()));
        assert_eq!(read_one(r#""a\\b""#), Value::String("a\\b".into()));
        assert!(read_err(r#""a\qb""#).is_kind("ReadError"));
    }

    #[test]
    fn unterminated_string_is_eof() {
        assert!(read_err("\"abc").is_eof());
    }

    #[test]
    fn character_literals() {
        assert_eq!(read_one("\\a"), Value::Char('a'));
        assert_eq!(read_one("\\newline"), Value::Char('\n'));
        assert_eq!(read_one("\\tab"), Value::Char('\t'));
        assert_eq!(read_one("\\space"), Value::Char(' '));
        assert_eq!(read_one("\\u0041"), Value::Char('A'));
    }

    #[test]
    fn commas_are_whitespace() {
        let form = read_one("[1, 2, 3]");
        match form {
            Value::Vector(vec) => assert_eq!(vec.size(), 3),
            other => panic!("expected vector, got {}", other),
        }
    }

    #[test]
    fn list_positions_point_at_open_paren() {
        let form = read_one("(do (if true 1))");
        match form {
            Value::List(list) => {
                assert_eq!(list.pos.line, 1);
                assert_eq!(list.pos.col, 1);
                let inner = &list.items()[1];
                assert_eq!(inner.position().unwrap().col, 5);
            }
            other => panic!("expected list, got {}", other),
        }
    }

    #[test]
    fn unbalanced_collections() {
        assert!(read_err("(1 2").is_eof());
        assert!(read_err("[1 2").is_eof());
        assert!(read_err("{:a 1").is_eof());
        assert!(read_err(")").is_kind("ReadError"));
        assert!(!read_err(")").is_eof());
    }

    #[test]
    fn map_literal_rules() {
        assert!(read_err("{:a}").is_kind("ReadError"));
        assert!(read_err("{[1] 2}").is_kind("ReadError"));
        let form = read_one("{:a 1 :b 2}");
        match form {
            Value::Map(map) => assert_eq!(map.size(), 2),
            other => panic!("expected map, got {}", other),
        }
    }

    #[test]
    fn set_literal_rejects_duplicates() {
        assert!(read_err("#{1 2 1}").is_kind("ReadError"));
        let form = read_one("#{1 2 3}");
        match form {
            Value::Set(set) => assert_eq!(set.size(), 3),
            other => panic!("expected set, got {}", other),
        }
    }

    #[test]
    fn quote_sugar() {
        assert_eq!(read_one("'x").to_string(), "(quote x)");
        assert_eq!(read_one("`x").to_string(), "(syntax-quote x)");
        assert_eq!(read_one("~x").to_string(), "(unquote x)");
        assert_eq!(read_one("~@x").to_string(), "(unquote-splice x)");
    }

    #[test]
    fn comments_and_discard() {
        let module = Reader::new("; a comment\n1 #_(2 3) 4").all().unwrap();
        match module {
            Value::Module(forms) => {
                assert_eq!(forms.len(), 2);
                assert_eq!(forms[0], Value::Number(1.0));
                assert_eq!(forms[1], Value::Number(4.0));
            }
            other => panic!("expected module, got {}", other),
        }
    }

    #[test]
    fn qualified_symbols_read_whole() {
        match read_one("core/map") {
            Value::Symbol(sym) => assert_eq!(sym.name, "core/map"),
            other => panic!("expected symbol, got {}", other),
        }
    }

    #[test]
    fn print_read_round_trip() {
        for src in [
            "(+ 1 2)",
            "[1 [2 3] \"x\"]",
            "{:a 1}",
            "(quote (a b c))",
            ":kw",
            "\\newline",
            "-42.5",
        ] {
            let form = read_one(src);
            let reprinted = read_one(&form.to_string());
            assert_eq!(form, reprinted, "round trip failed for {}", src);
        }
    }

    #[test]
    fn custom_reader_macro() {
        let mut reader = Reader::new("!x");
        reader.set_macro(
            '!',
            Some(Arc::new(|reader: &mut Reader, pos: Position| {
                reader.advance();
                let form = reader.read_required_form()?;
                Ok(Some(Value::list(
                    vec![Value::symbol_at("not", pos.clone()), form],
                    pos,
                )))
            })),
            false,
        );
        let module = reader.all().unwrap();
        match module {
            Value::Module(forms) => assert_eq!(forms[0].to_string(), "(not x)"),
            other => panic!("expected module, got {}", other),
        }
    }
}
