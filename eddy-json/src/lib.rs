//! JSON front-end for the eddy serialization engine.
//!
//! The buffered entry points ([`to_string`], [`to_vec`], [`from_str`],
//! [`from_slice`]) run a whole operation against in-memory buffers. The
//! incremental drivers ([`Serializer`], [`Deserializer`]) expose the
//! engine's suspension points: a serializer produces output in bounded
//! chunks and tolerates stream sources that are not ready; a deserializer
//! accepts input as it arrives and replays cleanly across feed boundaries.

#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

mod scanner;
mod writer;

pub use scanner::JsonTokenizer;
pub use writer::JsonWriter;

use eddy_core::{CancelToken, TypeTag, Value};
use eddy_format::{
    Error, ErrorKind, Options, ReadOperation, Result, Step, TokenWrite, WriteOperation,
};

/// Flush threshold for [`to_writer`] and the default [`Serializer`].
const DEFAULT_FLUSH_THRESHOLD: usize = 8 * 1024;

/// Serialize a value to a JSON string.
///
/// Fully buffered: a stream source that reports a pending fetch fails the
/// operation with [`ErrorKind::PendingSource`].
pub fn to_string(options: &Options, ty: TypeTag, value: Value) -> Result<String> {
    match String::from_utf8(to_vec(options, ty, value)?) {
        Ok(text) => Ok(text),
        Err(_) => unreachable!("the writer only emits valid utf-8"),
    }
}

/// Serialize a value to JSON bytes. Fully buffered, like [`to_string`].
pub fn to_vec(options: &Options, ty: TypeTag, value: Value) -> Result<Vec<u8>> {
    let mut out = JsonWriter::new(usize::MAX);
    let mut op = WriteOperation::new(options, ty, value, CancelToken::new());
    match op.step(options, &mut out)? {
        Step::Done(()) => Ok(out.take_output()),
        Step::Suspended => {
            // Only a pending stream fetch can suspend an unbounded writer.
            if let Err(disposal) = op.abandon() {
                log::warn!("disposal after pending source: {disposal}");
            }
            Err(Error::new(ErrorKind::PendingSource))
        }
    }
}

/// Serialize a value into an [`std::io::Write`] sink, flushing in bounded
/// chunks.
///
/// Stream sources are re-polled until they deliver, so a source that is
/// never ready stalls this driver; use a [`Serializer`] to interleave
/// other work with the polls.
pub fn to_writer<W: std::io::Write>(
    mut sink: W,
    options: &Options,
    ty: TypeTag,
    value: Value,
    cancel: CancelToken,
) -> Result<()> {
    let mut driver = Serializer::new(options, ty, value, cancel);
    loop {
        let step = driver.step()?;
        let chunk = driver.take_output();
        if !chunk.is_empty() {
            if let Err(err) = sink.write_all(&chunk) {
                if let Err(disposal) = driver.abandon() {
                    log::warn!("disposal after sink failure: {disposal}");
                }
                return Err(Error::new(ErrorKind::Io(err.to_string())));
            }
        }
        if step.is_done() {
            return Ok(());
        }
    }
}

/// Deserialize a JSON string into a value of declared type `ty`.
pub fn from_str(options: &Options, ty: TypeTag, input: &str) -> Result<Value> {
    from_slice(options, ty, input.as_bytes())
}

/// Deserialize JSON bytes into a value of declared type `ty`.
pub fn from_slice(options: &Options, ty: TypeTag, input: &[u8]) -> Result<Value> {
    let mut tokenizer = JsonTokenizer::from_slice(input);
    let mut op = ReadOperation::new(options, ty);
    match op.step(options, &mut tokenizer)? {
        Step::Done(value) => {
            if !tokenizer.only_whitespace_remains() {
                return Err(Error::new(ErrorKind::Syntax {
                    message: "unexpected characters after the top-level value".to_owned(),
                }));
            }
            Ok(value)
        }
        Step::Suspended => Err(Error::new(ErrorKind::UnexpectedEof {
            expected: "a complete document",
        })),
    }
}

/// Incremental serializer: drive with [`Serializer::step`], move the
/// buffered output out with [`Serializer::take_output`] between steps.
///
/// Dropping an unfinished serializer releases its stream sources; disposal
/// failures on that path are logged, not surfaced. Call
/// [`Serializer::abandon`] to observe them.
pub struct Serializer<'a> {
    options: &'a Options,
    op: WriteOperation,
    out: JsonWriter,
}

impl<'a> Serializer<'a> {
    /// Start a serialization with the default flush threshold.
    pub fn new(options: &'a Options, ty: TypeTag, value: Value, cancel: CancelToken) -> Self {
        Serializer::with_flush_threshold(options, ty, value, cancel, DEFAULT_FLUSH_THRESHOLD)
    }

    /// Start a serialization that suspends once roughly `flush_threshold`
    /// bytes are buffered.
    pub fn with_flush_threshold(
        options: &'a Options,
        ty: TypeTag,
        value: Value,
        cancel: CancelToken,
        flush_threshold: usize,
    ) -> Self {
        Serializer {
            options,
            op: WriteOperation::new(options, ty, value, cancel),
            out: JsonWriter::new(flush_threshold),
        }
    }

    /// Advance the walk until it completes, fills the output buffer, or
    /// hits a stream source that is not ready. Errors are terminal.
    pub fn step(&mut self) -> Result<Step<()>> {
        self.op.step(self.options, &mut self.out)
    }

    /// Take the bytes produced so far.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.out.take_output()
    }

    /// Bytes currently buffered.
    pub fn bytes_pending(&self) -> usize {
        self.out.bytes_pending()
    }

    /// Give up on the operation, disposing every stream source it opened.
    /// Idempotent.
    pub fn abandon(&mut self) -> Result<()> {
        self.op.abandon()
    }

    /// Whether the operation has completed, failed, or been abandoned.
    pub fn is_finished(&self) -> bool {
        self.op.is_finished()
    }
}

impl Drop for Serializer<'_> {
    fn drop(&mut self) {
        if !self.op.is_finished() {
            if let Err(disposal) = self.op.abandon() {
                log::warn!("disposal on serializer drop: {disposal}");
            }
        }
    }
}

/// Incremental deserializer: feed input chunks with
/// [`Deserializer::feed`], drive with [`Deserializer::poll`], and close
/// with [`Deserializer::finish`].
pub struct Deserializer<'a> {
    options: &'a Options,
    op: ReadOperation,
    tokenizer: JsonTokenizer,
    done: Option<Value>,
}

impl<'a> Deserializer<'a> {
    /// Start a deserialization of declared type `ty`.
    pub fn new(options: &'a Options, ty: TypeTag) -> Self {
        Deserializer {
            options,
            op: ReadOperation::new(options, ty),
            tokenizer: JsonTokenizer::new(),
            done: None,
        }
    }

    /// Append an input chunk.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.tokenizer.feed(bytes);
    }

    /// Advance the parse as far as the buffered input allows.
    pub fn poll(&mut self) -> Result<Step<()>> {
        if self.done.is_some() {
            return Ok(Step::Done(()));
        }
        match self.op.step(self.options, &mut self.tokenizer)? {
            Step::Done(value) => {
                self.done = Some(value);
                Ok(Step::Done(()))
            }
            Step::Suspended => Ok(Step::Suspended),
        }
    }

    /// Declare the input complete and take the value. Fails if the
    /// document is truncated or followed by trailing characters.
    pub fn finish(mut self) -> Result<Value> {
        self.tokenizer.finish();
        match self.poll()? {
            Step::Done(()) => {}
            Step::Suspended => {
                return Err(Error::new(ErrorKind::UnexpectedEof {
                    expected: "a complete document",
                }));
            }
        }
        if !self.tokenizer.only_whitespace_remains() {
            return Err(Error::new(ErrorKind::Syntax {
                message: "unexpected characters after the top-level value".to_owned(),
            }));
        }
        match self.done {
            Some(value) => Ok(value),
            None => unreachable!("poll reported done without a value"),
        }
    }
}
