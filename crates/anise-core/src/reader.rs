use crate::ast::Value;
use crate::error::AniseError;
use crate::input::Input;

/// Recursive-descent parser over a byte-addressable input. There is no
/// token stream: delimiters and whitespace drive the descent directly, so
/// the parser can hand back completed top-level forms while a streaming
/// input is still being fed.
pub struct Reader {
    input: Input,
    pos: usize,
    line: usize,
    col: usize,
    pub source_name: Option<String>,
}

impl Reader {
    pub fn new(source: &str) -> Self {
        Self::with_input(Input::from_string(source), None)
    }

    pub fn with_input(input: Input, source_name: Option<String>) -> Self {
        Self {
            input,
            pos: 1,
            line: 1,
            col: 1,
            source_name,
        }
    }

    /// Collect every top-level form.
    pub fn read_all(&mut self) -> Result<Vec<Value>, AniseError> {
        let mut forms = Vec::new();
        self.skip_ws_and_comments()?;
        while self.peek()?.is_some() {
            forms.push(self.read_form()?);
            self.skip_ws_and_comments()?;
        }
        Ok(forms)
    }

    /// Dispatch mode: invoke the callback as each top-level form completes
    /// and release the consumed input prefix, so unbounded sources stay in
    /// bounded memory. Returns the number of forms read.
    pub fn read_dispatch(
        &mut self,
        mut on_form: impl FnMut(Value) -> Result<(), AniseError>,
    ) -> Result<usize, AniseError> {
        let mut count = 0usize;
        self.skip_ws_and_comments()?;
        while self.peek()?.is_some() {
            let form = self.read_form()?;
            on_form(form)?;
            count += 1;
            self.input.free(self.pos);
            self.skip_ws_and_comments()?;
        }
        Ok(count)
    }

    fn read_form(&mut self) -> Result<Value, AniseError> {
        self.skip_ws_and_comments()?;
        let Some(byte) = self.peek()? else {
            return self.parse_err("unexpected end of input");
        };
        match byte {
            b'(' => {
                let items = self.read_delimited(b'(', b')')?;
                Ok(Value::List(items))
            }
            b'[' => {
                let items = self.read_delimited(b'[', b']')?;
                Ok(Value::seq(items))
            }
            b'{' => {
                let items = self.read_delimited(b'{', b'}')?;
                Ok(Value::map_from_flat(items))
            }
            b'"' | b'\'' => self.read_string(byte),
            b')' | b']' | b'}' => {
                self.parse_err(format!("unexpected closing delimiter '{}'", byte as char))
            }
            _ => self.read_word(),
        }
    }

    fn read_delimited(&mut self, open: u8, close: u8) -> Result<Vec<Value>, AniseError> {
        self.bump(open);
        let mut items = Vec::new();
        loop {
            self.skip_ws_and_comments()?;
            match self.peek()? {
                None => {
                    return self.parse_err(format!(
                        "unterminated '{}': expected '{}'",
                        open as char, close as char
                    ));
                }
                Some(byte) if byte == close => {
                    self.bump(byte);
                    return Ok(items);
                }
                Some(byte) if matches!(byte, b')' | b']' | b'}') => {
                    return self.parse_err(format!(
                        "mismatched closing delimiter '{}': expected '{}'",
                        byte as char, close as char
                    ));
                }
                Some(_) => items.push(self.read_form()?),
            }
        }
    }

    fn read_string(&mut self, quote: u8) -> Result<Value, AniseError> {
        self.bump(quote);
        let mut bytes = Vec::new();
        loop {
            let Some(byte) = self.peek()? else {
                return self.parse_err("unterminated string");
            };
            self.bump(byte);
            if byte == quote {
                break;
            }
            if byte == b'\\' {
                let Some(escaped) = self.peek()? else {
                    return self.parse_err("unterminated escape");
                };
                self.bump(escaped);
                bytes.push(match escaped {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    other => other,
                });
                continue;
            }
            bytes.push(byte);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Ok(Value::String(text)),
            Err(_) => self.parse_err("string literal is not valid UTF-8"),
        }
    }

    fn read_word(&mut self) -> Result<Value, AniseError> {
        let mut bytes = Vec::new();
        while let Some(byte) = self.peek()? {
            if is_whitespace(byte) || is_delimiter(byte) || byte == b';' || byte == b'"' {
                break;
            }
            bytes.push(byte);
            self.bump(byte);
        }
        let word = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => return self.parse_err("symbol is not valid UTF-8"),
        };
        Ok(classify_word(word))
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), AniseError> {
        loop {
            match self.peek()? {
                Some(byte) if is_whitespace(byte) => self.bump(byte),
                Some(b';') => {
                    self.bump(b';');
                    while let Some(byte) = self.peek()? {
                        self.bump(byte);
                        if byte == b'\n' {
                            break;
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, AniseError> {
        self.input.byte(self.pos)
    }

    fn bump(&mut self, byte: u8) {
        self.pos += 1;
        if byte == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
    }

    fn parse_err<T>(&self, msg: impl Into<String>) -> Result<T, AniseError> {
        let file = self.source_name.as_deref().unwrap_or("unknown");
        Err(AniseError::parse(format!(
            "{}:{}:{} {}",
            file,
            self.line,
            self.col,
            msg.into()
        )))
    }
}

fn is_whitespace(byte: u8) -> bool {
    byte == b' ' || (9..=13).contains(&byte)
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'[' | b']' | b'{' | b'}')
}

fn classify_word(word: String) -> Value {
    match word.as_str() {
        "nil" => return Value::Nil,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if looks_numeric(&word) {
        if let Ok(n) = word.parse::<f64>() {
            return Value::Number(n);
        }
    }
    Value::Symbol(word)
}

// Guard the f64 parse so words like "inf" or "nan" stay symbols.
fn looks_numeric(word: &str) -> bool {
    let bytes = word.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'+' | b'-' | b'.') => bytes.iter().skip(1).any(|b| b.is_ascii_digit())
            && bytes[1..]
                .iter()
                .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Value;

    fn parse_one(src: &str) -> Value {
        let mut reader = Reader::new(src);
        let mut forms = reader.read_all().unwrap();
        assert_eq!(forms.len(), 1, "expected a single form for {}", src);
        forms.remove(0)
    }

    #[test]
    fn words_classify_to_scalars_numbers_and_symbols() {
        assert_eq!(parse_one("nil"), Value::Nil);
        assert_eq!(parse_one("true"), Value::Bool(true));
        assert_eq!(parse_one("false"), Value::Bool(false));
        assert_eq!(parse_one("42"), Value::Number(42.0));
        assert_eq!(parse_one("-1.5e2"), Value::Number(-150.0));
        assert_eq!(parse_one(".5"), Value::Number(0.5));
        assert_eq!(parse_one("+"), Value::sym("+"));
        assert_eq!(parse_one("..."), Value::sym("..."));
        assert_eq!(parse_one("inf"), Value::sym("inf"));
    }

    #[test]
    fn lists_vectors_and_maps_parse_to_their_shapes() {
        let form = parse_one("(f [1 2] {\"k\" 3})");
        let items = form.as_list().expect("list");
        assert_eq!(items[0], Value::sym("f"));
        assert_eq!(
            items[1].seq_items().expect("sequence").len(),
            2
        );
        assert_eq!(
            items[2].map_get(&Value::string("k")),
            Some(&Value::Number(3.0))
        );
    }

    #[test]
    fn nil_elements_do_not_shorten_sequences() {
        let form = parse_one("[1 nil 3]");
        let items = form.seq_items().expect("sequence");
        assert_eq!(items.len(), 3);
        assert_eq!(*items[1], Value::Nil);
    }

    #[test]
    fn strings_decode_escapes_and_odd_backslash_quotes() {
        assert_eq!(parse_one(r#""a\nb""#), Value::string("a\nb"));
        assert_eq!(parse_one(r#""say \"hi\"""#), Value::string("say \"hi\""));
        assert_eq!(parse_one(r#""tail\\""#), Value::string("tail\\"));
        assert_eq!(parse_one("'single'"), Value::string("single"));
    }

    #[test]
    fn comments_are_whitespace() {
        let mut reader = Reader::new("; leading\n(+ 1 2) ; trailing\n");
        let forms = reader.read_all().unwrap();
        assert_eq!(forms.len(), 1);
    }

    #[test]
    fn delimiters_terminate_words() {
        let form = parse_one("(a(b))");
        let items = form.as_list().unwrap();
        assert_eq!(items[0], Value::sym("a"));
        assert!(items[1].as_list().is_some());
    }

    #[test]
    fn mismatched_and_unterminated_delimiters_are_fatal() {
        assert!(matches!(
            Reader::new("(a]").read_all(),
            Err(AniseError::Parse(_))
        ));
        assert!(matches!(
            Reader::new("[1 2").read_all(),
            Err(AniseError::Parse(_))
        ));
        assert!(matches!(
            Reader::new(")").read_all(),
            Err(AniseError::Parse(_))
        ));
        assert!(matches!(
            Reader::new("\"open").read_all(),
            Err(AniseError::Parse(_))
        ));
    }

    #[test]
    fn parse_errors_carry_source_positions() {
        let mut reader = Reader::with_input(
            Input::from_string("(ok)\n  ]"),
            Some("main.an".to_string()),
        );
        let err = reader.read_all().unwrap_err();
        assert!(err.to_string().contains("main.an:2:3"), "got {}", err);
    }

    #[test]
    fn dispatch_mode_streams_forms_and_frees_input() {
        let mut chunks = vec![
            b"(var x 1) ".to_vec(),
            b"(set x 2)".to_vec(),
        ]
        .into_iter();
        let mut reader = Reader::with_input(
            Input::from_pull(Box::new(move || chunks.next())),
            Some("repl".to_string()),
        );
        let mut seen = Vec::new();
        let count = reader
            .read_dispatch(|form| {
                seen.push(form);
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen.len(), 2);
        assert!(seen[0].as_list().is_some());
    }
}
