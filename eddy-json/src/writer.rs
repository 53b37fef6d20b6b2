//! Incremental JSON writer.
//!
//! Tokens are appended to an in-memory buffer; the driver takes the
//! buffered bytes out between steps. The writer reports
//! [`TokenWrite::should_flush`] once the buffer reaches its threshold so
//! the engine can suspend at the next value boundary.

use eddy_format::{TokenKind, TokenWrite};

#[derive(Debug, Clone, Copy)]
enum Ctx {
    Object { first: bool, value_due: bool },
    Array { first: bool },
}

/// Buffering JSON writer with a flush threshold.
pub struct JsonWriter {
    out: Vec<u8>,
    ctx: Vec<Ctx>,
    flush_threshold: usize,
    last: Option<TokenKind>,
}

impl JsonWriter {
    /// A writer that flushes after roughly `flush_threshold` buffered
    /// bytes. Use `usize::MAX` for fully buffered output.
    pub fn new(flush_threshold: usize) -> Self {
        JsonWriter {
            out: Vec::new(),
            ctx: Vec::new(),
            flush_threshold,
            last: None,
        }
    }

    /// Take the buffered bytes, leaving the buffer empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Comma bookkeeping before a value is written at the current spot.
    fn before_value(&mut self) {
        match self.ctx.last_mut() {
            Some(Ctx::Array { first }) => {
                if !*first {
                    self.out.push(b',');
                }
                *first = false;
            }
            Some(Ctx::Object { value_due, .. }) => {
                // Separation happened in `property_name`.
                *value_due = false;
            }
            None => {}
        }
    }

    fn write_string(&mut self, s: &str) {
        self.out.push(b'"');
        for c in s.chars() {
            self.write_escaped_char(c);
        }
        self.out.push(b'"');
    }

    fn write_escaped_char(&mut self, c: char) {
        match c {
            '"' => self.out.extend_from_slice(b"\\\""),
            '\\' => self.out.extend_from_slice(b"\\\\"),
            '\n' => self.out.extend_from_slice(b"\\n"),
            '\r' => self.out.extend_from_slice(b"\\r"),
            '\t' => self.out.extend_from_slice(b"\\t"),
            '\u{08}' => self.out.extend_from_slice(b"\\b"),
            '\u{0C}' => self.out.extend_from_slice(b"\\f"),
            c if c.is_ascii_control() => {
                let code_point = c as u32;
                let to_hex = |d: u32| {
                    if d < 10 {
                        b'0' + d as u8
                    } else {
                        b'a' + (d - 10) as u8
                    }
                };
                let buf = [
                    b'\\',
                    b'u',
                    to_hex((code_point >> 12) & 0xF),
                    to_hex((code_point >> 8) & 0xF),
                    to_hex((code_point >> 4) & 0xF),
                    to_hex(code_point & 0xF),
                ];
                self.out.extend_from_slice(&buf);
            }
            c if c.is_ascii() => self.out.push(c as u8),
            c => {
                let mut buf = [0u8; 4];
                let len = c.encode_utf8(&mut buf).len();
                self.out.extend_from_slice(&buf[..len]);
            }
        }
    }
}

impl TokenWrite for JsonWriter {
    fn start_object(&mut self) {
        self.before_value();
        self.out.push(b'{');
        self.ctx.push(Ctx::Object {
            first: true,
            value_due: false,
        });
        self.last = Some(TokenKind::StartObject);
    }

    fn end_object(&mut self) {
        self.ctx.pop();
        self.out.push(b'}');
        self.last = Some(TokenKind::EndObject);
    }

    fn start_array(&mut self) {
        self.before_value();
        self.out.push(b'[');
        self.ctx.push(Ctx::Array { first: true });
        self.last = Some(TokenKind::StartArray);
    }

    fn end_array(&mut self) {
        self.ctx.pop();
        self.out.push(b']');
        self.last = Some(TokenKind::EndArray);
    }

    fn property_name(&mut self, name: &str) {
        if let Some(Ctx::Object { first, value_due }) = self.ctx.last_mut() {
            if !*first {
                self.out.push(b',');
            }
            *first = false;
            *value_due = true;
        }
        self.write_string(name);
        self.out.push(b':');
        self.last = Some(TokenKind::PropertyName);
    }

    fn null(&mut self) {
        self.before_value();
        self.out.extend_from_slice(b"null");
        self.last = Some(TokenKind::Null);
    }

    fn bool(&mut self, value: bool) {
        self.before_value();
        self.out
            .extend_from_slice(if value { b"true" } else { b"false" });
        self.last = Some(TokenKind::Bool);
    }

    fn i64(&mut self, value: i64) {
        self.before_value();
        self.out.extend_from_slice(value.to_string().as_bytes());
        self.last = Some(TokenKind::Number);
    }

    fn u64(&mut self, value: u64) {
        self.before_value();
        self.out.extend_from_slice(value.to_string().as_bytes());
        self.last = Some(TokenKind::Number);
    }

    fn f64(&mut self, value: f64) {
        self.before_value();
        if value.is_nan() || value.is_infinite() {
            // JSON has no representation for non-finite floats.
            self.out.extend_from_slice(b"null");
        } else {
            self.out.extend_from_slice(value.to_string().as_bytes());
        }
        self.last = Some(TokenKind::Number);
    }

    fn str(&mut self, value: &str) {
        self.before_value();
        self.write_string(value);
        self.last = Some(TokenKind::Str);
    }

    fn depth(&self) -> usize {
        self.ctx.len()
    }

    fn token_type(&self) -> Option<TokenKind> {
        self.last
    }

    fn bytes_pending(&self) -> usize {
        self.out.len()
    }

    fn should_flush(&self) -> bool {
        self.out.len() >= self.flush_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commas_and_colons_are_placed() {
        let mut w = JsonWriter::new(usize::MAX);
        w.start_object();
        w.property_name("a");
        w.start_array();
        w.u64(1);
        w.i64(-2);
        w.str("x");
        w.end_array();
        w.property_name("b");
        w.null();
        w.end_object();
        assert_eq!(w.take_output(), br#"{"a":[1,-2,"x"],"b":null}"#);
    }

    #[test]
    fn strings_are_escaped() {
        let mut w = JsonWriter::new(usize::MAX);
        w.str("a\"b\\c\nd\u{01}e");
        assert_eq!(w.take_output(), br#""a\"b\\c\nde""#);
    }

    #[test]
    fn non_finite_floats_become_null() {
        let mut w = JsonWriter::new(usize::MAX);
        w.start_array();
        w.f64(f64::NAN);
        w.f64(1.5);
        w.end_array();
        assert_eq!(w.take_output(), b"[null,1.5]");
    }

    #[test]
    fn flush_threshold_is_reported() {
        let mut w = JsonWriter::new(4);
        assert!(!w.should_flush());
        w.str("hello");
        assert!(w.should_flush());
        w.take_output();
        assert!(!w.should_flush());
    }
}
