//! Resumable JSON tokenizer.
//!
//! The tokenizer owns a growable byte buffer. [`JsonTokenizer::feed`]
//! appends input; [`JsonTokenizer::next`] scans the next token from the
//! current position. When the buffer ends inside a token (or before the
//! structural characters that introduce one), `next` reports
//! [`Step::Suspended`] without consuming anything, so the same call can be
//! replayed verbatim after more bytes arrive. Structural commas and colons
//! never surface as tokens; they are folded into the scan of whatever
//! follows them, which keeps the no-partial-consumption rule simple: a
//! `next` call either moves past a whole `,"name":` or `,value` group or
//! moves past nothing.
//!
//! `feed` discards the consumed prefix of the buffer. That is safe because
//! the engine rewinds every outstanding read-ahead before it suspends, so
//! no [`Checkpoint`] ever refers to bytes before the current position when
//! control is back with the caller.

use eddy_format::{Checkpoint, Error, ErrorKind, Step, Token, TokenKind, TokenRead};

#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjState {
    /// Just after `{`: expecting a property name or `}`.
    FirstKey,
    /// Just after `"name":`: expecting a value.
    MemberValue,
    /// Just after a member value: expecting `,` or `}`.
    AfterValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArrState {
    /// Just after `[`: expecting a value or `]`.
    FirstElem,
    /// Just after an element: expecting `,` or `]`.
    AfterElem,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Ctx {
    Object(ObjState),
    Array(ArrState),
}

/// A successfully scanned value and its effect on the context stack.
enum Scanned {
    Scalar(Token),
    Open(Ctx, Token),
}

/// Saved tokenizer position for [`TokenRead::rewind`].
#[derive(Clone)]
struct Mark {
    pos: usize,
    ctx: Vec<Ctx>,
    root_seen: bool,
    last: Option<TokenKind>,
}

/// Incremental tokenizer over a fed byte buffer.
pub struct JsonTokenizer {
    buf: Vec<u8>,
    pos: usize,
    /// Bytes discarded from the front of the buffer by `feed`.
    consumed: usize,
    ctx: Vec<Ctx>,
    root_seen: bool,
    final_input: bool,
    last: Option<TokenKind>,
}

impl JsonTokenizer {
    /// An empty tokenizer awaiting input.
    pub fn new() -> Self {
        JsonTokenizer {
            buf: Vec::new(),
            pos: 0,
            consumed: 0,
            ctx: Vec::new(),
            root_seen: false,
            final_input: false,
            last: None,
        }
    }

    /// A tokenizer over a complete document.
    pub fn from_slice(input: &[u8]) -> Self {
        let mut tokenizer = JsonTokenizer::new();
        tokenizer.feed(input);
        tokenizer.finish();
        tokenizer
    }

    /// Append more input. The consumed prefix of the buffer is discarded
    /// first.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.consumed += self.pos;
            self.pos = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Mark the input as complete: running dry is now end-of-document
    /// rather than a suspension.
    pub fn finish(&mut self) {
        self.final_input = true;
    }

    /// Whether a complete top-level value has been consumed.
    pub fn document_complete(&self) -> bool {
        self.root_seen && self.ctx.is_empty()
    }

    /// Whether everything left in the buffer is whitespace.
    pub fn only_whitespace_remains(&self) -> bool {
        self.buf[self.pos..]
            .iter()
            .all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
    }

    fn skip_ws(&self, cur: &mut usize) {
        while let Some(&b) = self.buf.get(*cur) {
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => *cur += 1,
                _ => break,
            }
        }
    }

    /// Out of buffered bytes: a suspension while more input may arrive, an
    /// EOF error once the input is final.
    fn starved<T>(&self, expected: &'static str) -> eddy_format::Result<Step<T>> {
        if self.final_input {
            Err(Error::new(ErrorKind::UnexpectedEof { expected }))
        } else {
            Ok(Step::Suspended)
        }
    }

    fn unexpected(&self, byte: u8, expected: &'static str) -> Error {
        Error::new(ErrorKind::Syntax {
            message: format!("unexpected character `{}`, expected {expected}", byte as char),
        })
    }

    /// Scan one value starting at `cur`. Only advances `cur`; the caller
    /// applies the context effect after the whole scan succeeded.
    fn scan_value(&self, cur: &mut usize) -> eddy_format::Result<Step<Scanned>> {
        let Some(&byte) = self.buf.get(*cur) else {
            return self.starved("a value");
        };
        match byte {
            b'{' => {
                *cur += 1;
                Ok(Step::Done(Scanned::Open(
                    Ctx::Object(ObjState::FirstKey),
                    Token::StartObject,
                )))
            }
            b'[' => {
                *cur += 1;
                Ok(Step::Done(Scanned::Open(
                    Ctx::Array(ArrState::FirstElem),
                    Token::StartArray,
                )))
            }
            b'"' => Ok(self.scan_string(cur)?.map(|s| Scanned::Scalar(Token::Str(s)))),
            b't' => Ok(self
                .scan_literal(cur, b"true")?
                .map(|()| Scanned::Scalar(Token::Bool(true)))),
            b'f' => Ok(self
                .scan_literal(cur, b"false")?
                .map(|()| Scanned::Scalar(Token::Bool(false)))),
            b'n' => Ok(self
                .scan_literal(cur, b"null")?
                .map(|()| Scanned::Scalar(Token::Null))),
            b'-' | b'0'..=b'9' => Ok(self.scan_number(cur)?.map(Scanned::Scalar)),
            other => Err(self.unexpected(other, "a value")),
        }
    }

    fn scan_literal(&self, cur: &mut usize, text: &'static [u8]) -> eddy_format::Result<Step<()>> {
        let end = *cur + text.len();
        let Some(slice) = self.buf.get(*cur..end) else {
            // The remainder may still become the literal once more bytes
            // arrive.
            return if text.starts_with(&self.buf[*cur..]) {
                self.starved("a literal")
            } else {
                Err(Error::new(ErrorKind::Syntax {
                    message: "invalid literal".to_owned(),
                }))
            };
        };
        if slice != text {
            return Err(Error::new(ErrorKind::Syntax {
                message: "invalid literal".to_owned(),
            }));
        }
        *cur = end;
        Ok(Step::Done(()))
    }

    /// Scan a string starting at the opening quote, decoding escapes.
    /// Unpaired surrogates in `\u` escapes decode to U+FFFD.
    fn scan_string(&self, cur: &mut usize) -> eddy_format::Result<Step<String>> {
        let mut i = *cur + 1;
        let mut out: Vec<u8> = Vec::new();
        loop {
            let Some(&byte) = self.buf.get(i) else {
                return self.starved("a closing `\"`");
            };
            match byte {
                b'"' => {
                    i += 1;
                    break;
                }
                b'\\' => {
                    let Some(&esc) = self.buf.get(i + 1) else {
                        return self.starved("an escape sequence");
                    };
                    i += 2;
                    match esc {
                        b'"' => out.push(b'"'),
                        b'\\' => out.push(b'\\'),
                        b'/' => out.push(b'/'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'u' => {
                            let high = match self.read_hex4(i)? {
                                Step::Done(v) => v,
                                Step::Suspended => return Ok(Step::Suspended),
                            };
                            i += 4;
                            let cp = if (0xD800..0xDC00).contains(&high) {
                                match (self.buf.get(i), self.buf.get(i + 1)) {
                                    (Some(&b'\\'), Some(&b'u')) => {
                                        let low = match self.read_hex4(i + 2)? {
                                            Step::Done(v) => v,
                                            Step::Suspended => return Ok(Step::Suspended),
                                        };
                                        if (0xDC00..0xE000).contains(&low) {
                                            i += 6;
                                            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                                        } else {
                                            // Unpaired high surrogate; the
                                            // second escape is left for the
                                            // next iteration.
                                            0xFFFD
                                        }
                                    }
                                    (Some(&b'\\'), None) | (None, _) if !self.final_input => {
                                        // Cannot yet tell whether a low
                                        // surrogate follows.
                                        return Ok(Step::Suspended);
                                    }
                                    _ => 0xFFFD,
                                }
                            } else if (0xDC00..0xE000).contains(&high) {
                                0xFFFD
                            } else {
                                high
                            };
                            let ch = char::from_u32(cp).unwrap_or('\u{FFFD}');
                            let mut tmp = [0u8; 4];
                            out.extend_from_slice(ch.encode_utf8(&mut tmp).as_bytes());
                        }
                        _ => {
                            return Err(Error::new(ErrorKind::Syntax {
                                message: format!("invalid escape `\\{}`", esc as char),
                            }));
                        }
                    }
                }
                _ => {
                    out.push(byte);
                    i += 1;
                }
            }
        }
        let text = String::from_utf8(out).map_err(|_| {
            Error::new(ErrorKind::Syntax {
                message: "invalid utf-8 in string".to_owned(),
            })
        })?;
        *cur = i;
        Ok(Step::Done(text))
    }

    fn read_hex4(&self, at: usize) -> eddy_format::Result<Step<u32>> {
        let Some(slice) = self.buf.get(at..at + 4) else {
            return self.starved("four hex digits");
        };
        let mut value = 0u32;
        for &b in slice {
            let digit = match b {
                b'0'..=b'9' => u32::from(b - b'0'),
                b'a'..=b'f' => u32::from(b - b'a') + 10,
                b'A'..=b'F' => u32::from(b - b'A') + 10,
                _ => {
                    return Err(Error::new(ErrorKind::Syntax {
                        message: "invalid hex digit in `\\u` escape".to_owned(),
                    }));
                }
            };
            value = value * 16 + digit;
        }
        Ok(Step::Done(value))
    }

    /// Scan a number. Non-negative integers come out as `U64`, negative
    /// ones as `I64`, anything with a fraction or exponent (or outside the
    /// integer ranges) as `F64`.
    fn scan_number(&self, cur: &mut usize) -> eddy_format::Result<Step<Token>> {
        let start = *cur;
        let mut i = start;
        if self.buf.get(i) == Some(&b'-') {
            i += 1;
        }
        let mut is_float = false;
        while let Some(&b) = self.buf.get(i) {
            match b {
                b'0'..=b'9' => i += 1,
                b'.' | b'e' | b'E' => {
                    is_float = true;
                    i += 1;
                }
                // Exponent signs; validity is settled by the parse below.
                b'+' | b'-' => i += 1,
                _ => break,
            }
        }
        if i == self.buf.len() && !self.final_input {
            // The number may continue in the next chunk.
            return Ok(Step::Suspended);
        }
        let text: String = self.buf[start..i].iter().map(|&b| b as char).collect();
        let invalid = || {
            Error::new(ErrorKind::Syntax {
                message: format!("invalid number `{text}`"),
            })
        };
        let token = if is_float {
            Token::F64(text.parse::<f64>().map_err(|_| invalid())?)
        } else if text.starts_with('-') {
            match text.parse::<i64>() {
                Ok(v) => Token::I64(v),
                Err(_) => Token::F64(text.parse::<f64>().map_err(|_| invalid())?),
            }
        } else {
            match text.parse::<u64>() {
                Ok(v) => Token::U64(v),
                Err(_) => Token::F64(text.parse::<f64>().map_err(|_| invalid())?),
            }
        };
        *cur = i;
        Ok(Step::Done(token))
    }

    /// Scan `"name"` plus the following colon as one unit.
    fn scan_member_name(&self, cur: &mut usize) -> eddy_format::Result<Step<String>> {
        let name = match self.scan_string(cur)? {
            Step::Done(name) => name,
            Step::Suspended => return Ok(Step::Suspended),
        };
        self.skip_ws(cur);
        match self.buf.get(*cur) {
            Some(b':') => {
                *cur += 1;
                Ok(Step::Done(name))
            }
            Some(&other) => Err(self.unexpected(other, "`:`")),
            None => self.starved("`:`"),
        }
    }

    /// Apply a scanned value's effect on the context stack, advancing the
    /// enclosing container first.
    fn commit_value(&mut self, scanned: Scanned) -> Token {
        match self.ctx.last_mut() {
            None => self.root_seen = true,
            Some(Ctx::Object(state)) => *state = ObjState::AfterValue,
            Some(Ctx::Array(state)) => *state = ArrState::AfterElem,
        }
        match scanned {
            Scanned::Scalar(token) => token,
            Scanned::Open(ctx, token) => {
                self.ctx.push(ctx);
                token
            }
        }
    }
}

impl Default for JsonTokenizer {
    fn default() -> Self {
        JsonTokenizer::new()
    }
}

impl JsonTokenizer {
    fn advance(&mut self) -> eddy_format::Result<Step<Token>> {
        let mut cur = self.pos;
        self.skip_ws(&mut cur);
        match self.ctx.last().copied() {
            None => {
                if self.root_seen {
                    return match self.buf.get(cur) {
                        None => self.starved("a token"),
                        Some(_) => Err(Error::new(ErrorKind::Syntax {
                            message: "unexpected characters after the top-level value".to_owned(),
                        })),
                    };
                }
                match self.scan_value(&mut cur)? {
                    Step::Done(scanned) => {
                        let token = self.commit_value(scanned);
                        self.pos = cur;
                        Ok(Step::Done(token))
                    }
                    Step::Suspended => Ok(Step::Suspended),
                }
            }
            Some(Ctx::Object(ObjState::FirstKey)) => match self.buf.get(cur) {
                None => self.starved("a property name or `}`"),
                Some(b'}') => {
                    self.ctx.pop();
                    self.pos = cur + 1;
                    Ok(Step::Done(Token::EndObject))
                }
                Some(b'"') => match self.scan_member_name(&mut cur)? {
                    Step::Done(name) => {
                        if let Some(Ctx::Object(state)) = self.ctx.last_mut() {
                            *state = ObjState::MemberValue;
                        }
                        self.pos = cur;
                        Ok(Step::Done(Token::PropertyName(name)))
                    }
                    Step::Suspended => Ok(Step::Suspended),
                },
                Some(&other) => Err(self.unexpected(other, "a property name or `}`")),
            },
            Some(Ctx::Object(ObjState::MemberValue)) => match self.scan_value(&mut cur)? {
                Step::Done(scanned) => {
                    let token = self.commit_value(scanned);
                    self.pos = cur;
                    Ok(Step::Done(token))
                }
                Step::Suspended => Ok(Step::Suspended),
            },
            Some(Ctx::Object(ObjState::AfterValue)) => match self.buf.get(cur) {
                None => self.starved("`,` or `}`"),
                Some(b'}') => {
                    self.ctx.pop();
                    self.pos = cur + 1;
                    Ok(Step::Done(Token::EndObject))
                }
                Some(b',') => {
                    cur += 1;
                    self.skip_ws(&mut cur);
                    match self.buf.get(cur) {
                        None => self.starved("a property name"),
                        Some(b'"') => match self.scan_member_name(&mut cur)? {
                            Step::Done(name) => {
                                if let Some(Ctx::Object(state)) = self.ctx.last_mut() {
                                    *state = ObjState::MemberValue;
                                }
                                self.pos = cur;
                                Ok(Step::Done(Token::PropertyName(name)))
                            }
                            Step::Suspended => Ok(Step::Suspended),
                        },
                        Some(&other) => Err(self.unexpected(other, "a property name")),
                    }
                }
                Some(&other) => Err(self.unexpected(other, "`,` or `}`")),
            },
            Some(Ctx::Array(ArrState::FirstElem)) => match self.buf.get(cur) {
                None => self.starved("a value or `]`"),
                Some(b']') => {
                    self.ctx.pop();
                    self.pos = cur + 1;
                    Ok(Step::Done(Token::EndArray))
                }
                Some(_) => match self.scan_value(&mut cur)? {
                    Step::Done(scanned) => {
                        let token = self.commit_value(scanned);
                        self.pos = cur;
                        Ok(Step::Done(token))
                    }
                    Step::Suspended => Ok(Step::Suspended),
                },
            },
            Some(Ctx::Array(ArrState::AfterElem)) => match self.buf.get(cur) {
                None => self.starved("`,` or `]`"),
                Some(b']') => {
                    self.ctx.pop();
                    self.pos = cur + 1;
                    Ok(Step::Done(Token::EndArray))
                }
                Some(b',') => {
                    cur += 1;
                    self.skip_ws(&mut cur);
                    match self.scan_value(&mut cur)? {
                        Step::Done(scanned) => {
                            let token = self.commit_value(scanned);
                            self.pos = cur;
                            Ok(Step::Done(token))
                        }
                        Step::Suspended => Ok(Step::Suspended),
                    }
                }
                Some(&other) => Err(self.unexpected(other, "`,` or `]`")),
            },
        }
    }
}

impl TokenRead for JsonTokenizer {
    fn next(&mut self) -> eddy_format::Result<Step<Token>> {
        let step = self.advance()?;
        if let Step::Done(token) = &step {
            self.last = Some(token.kind());
        }
        Ok(step)
    }

    fn depth(&self) -> usize {
        self.ctx.len()
    }

    fn token_type(&self) -> Option<TokenKind> {
        self.last
    }

    fn bytes_consumed(&self) -> usize {
        self.consumed + self.pos
    }

    fn is_final(&self) -> bool {
        self.final_input
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(Mark {
            pos: self.pos,
            ctx: self.ctx.clone(),
            root_seen: self.root_seen,
            last: self.last,
        })
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        if let Some(mark) = checkpoint.into_state::<Mark>() {
            self.pos = mark.pos;
            self.ctx = mark.ctx;
            self.root_seen = mark.root_seen;
            self.last = mark.last;
        } else {
            debug_assert!(false, "checkpoint from a different reader");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<Token> {
        let mut tokenizer = JsonTokenizer::from_slice(input.as_bytes());
        let mut out = Vec::new();
        loop {
            if tokenizer.document_complete() {
                break;
            }
            match tokenizer.next().unwrap() {
                Step::Done(token) => out.push(token),
                Step::Suspended => panic!("suspended on final input"),
            }
        }
        out
    }

    #[test]
    fn tokenizes_a_flat_object() {
        assert_eq!(
            collect(r#"{"a": 1, "b": true, "c": null}"#),
            vec![
                Token::StartObject,
                Token::PropertyName("a".into()),
                Token::U64(1),
                Token::PropertyName("b".into()),
                Token::Bool(true),
                Token::PropertyName("c".into()),
                Token::Null,
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn classifies_numbers() {
        assert_eq!(collect("[0, -3, 1.5, 2e3, 18446744073709551615]"), vec![
            Token::StartArray,
            Token::U64(0),
            Token::I64(-3),
            Token::F64(1.5),
            Token::F64(2e3),
            Token::U64(u64::MAX),
            Token::EndArray,
        ]);
    }

    #[test]
    fn integer_overflow_falls_back_to_float() {
        assert_eq!(
            collect("[18446744073709551616]"),
            vec![
                Token::StartArray,
                Token::F64(18446744073709551616.0),
                Token::EndArray,
            ]
        );
    }

    #[test]
    fn decodes_escapes_and_surrogate_pairs() {
        assert_eq!(
            collect(r#""a\n\"é😀b""#),
            vec![Token::Str("a\n\"\u{e9}\u{1f600}b".into())]
        );
    }

    #[test]
    fn unpaired_surrogate_becomes_replacement_char() {
        assert_eq!(
            collect(r#""x\ud800y""#),
            vec![Token::Str("x\u{fffd}y".into())]
        );
    }

    #[test]
    fn suspends_between_feeds_without_consuming() {
        let input = br#"{"key": "value", "n": 12}"#;
        let mut tokenizer = JsonTokenizer::new();
        let mut out = Vec::new();
        let mut fed = 0;
        while !tokenizer.document_complete() {
            match tokenizer.next().unwrap() {
                Step::Done(token) => out.push(token),
                Step::Suspended => {
                    assert!(fed < input.len(), "starved with all input fed");
                    tokenizer.feed(&input[fed..fed + 1]);
                    fed += 1;
                    if fed == input.len() {
                        tokenizer.finish();
                    }
                }
            }
        }
        assert_eq!(
            out,
            vec![
                Token::StartObject,
                Token::PropertyName("key".into()),
                Token::Str("value".into()),
                Token::PropertyName("n".into()),
                Token::U64(12),
                Token::EndObject,
            ]
        );
    }

    #[test]
    fn rewind_replays_tokens_across_containers() {
        let mut tokenizer = JsonTokenizer::from_slice(br#"[{"a": 1}]"#);
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartArray));
        let mark = tokenizer.checkpoint();
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartObject));
        assert_eq!(
            tokenizer.next().unwrap(),
            Step::Done(Token::PropertyName("a".into()))
        );
        assert_eq!(tokenizer.depth(), 2);
        tokenizer.rewind(mark);
        assert_eq!(tokenizer.depth(), 1);
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartObject));
    }

    #[test]
    fn trailing_characters_are_rejected() {
        let mut tokenizer = JsonTokenizer::from_slice(b"1 2");
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::U64(1)));
        assert_eq!(tokenizer.next().unwrap_err().code(), "syntax");
    }

    #[test]
    fn truncated_final_input_is_eof_not_suspension() {
        let mut tokenizer = JsonTokenizer::from_slice(br#"{"a": "#);
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartObject));
        assert_eq!(
            tokenizer.next().unwrap(),
            Step::Done(Token::PropertyName("a".into()))
        );
        assert_eq!(tokenizer.next().unwrap_err().code(), "unexpected_eof");
    }

    #[test]
    fn number_at_final_eof_completes() {
        let mut tokenizer = JsonTokenizer::new();
        tokenizer.feed(b"42");
        assert_eq!(tokenizer.next().unwrap(), Step::Suspended);
        tokenizer.finish();
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::U64(42)));
    }

    #[test]
    fn byte_and_token_progress_is_queryable() {
        let mut tokenizer = JsonTokenizer::from_slice(b"[1]");
        assert_eq!(tokenizer.bytes_consumed(), 0);
        assert_eq!(tokenizer.token_type(), None);

        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartArray));
        assert_eq!(tokenizer.bytes_consumed(), 1);
        assert_eq!(tokenizer.token_type(), Some(TokenKind::StartArray));

        let mark = tokenizer.checkpoint();
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::U64(1)));
        assert_eq!(tokenizer.bytes_consumed(), 2);
        assert_eq!(tokenizer.token_type(), Some(TokenKind::Number));

        // Rewinding rolls both counters back to the checkpoint.
        tokenizer.rewind(mark);
        assert_eq!(tokenizer.bytes_consumed(), 1);
        assert_eq!(tokenizer.token_type(), Some(TokenKind::StartArray));
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::U64(1)));
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::EndArray));
        assert_eq!(tokenizer.bytes_consumed(), 3);
    }

    #[test]
    fn progress_counts_across_feeds_and_not_across_suspensions() {
        let mut tokenizer = JsonTokenizer::new();
        tokenizer.feed(b"[12");
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::StartArray));
        assert_eq!(tokenizer.next().unwrap(), Step::Suspended);
        assert_eq!(tokenizer.bytes_consumed(), 1, "suspension consumes nothing");

        // Feeding compacts the consumed prefix without losing the count.
        tokenizer.feed(b"3]");
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::U64(123)));
        assert_eq!(tokenizer.bytes_consumed(), 4);
        assert_eq!(tokenizer.next().unwrap(), Step::Done(Token::EndArray));
        assert_eq!(tokenizer.bytes_consumed(), 5);
    }
}
