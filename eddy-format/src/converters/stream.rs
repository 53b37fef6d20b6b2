//! Write-side conversion of externally driven value streams.

use eddy_core::{StreamPoll, TypeKind, TypeTag, Value};

use crate::converters::{Converter, ReadContext, WriteContext};
use crate::cursor::Step;
use crate::error::{Error, ErrorKind, Result};

/// Converter for stream types. Serializes as an array whose elements are
/// pulled cooperatively: a pending fetch suspends the whole walk, and the
/// in-flight fetch is drained before cancellation is honored. Disposal is
/// owed from the moment the stream starts and is drained by the driver on
/// every exit path.
pub(crate) struct StreamConverter;

fn element_of(tag: TypeTag, registry: &eddy_core::TypeRegistry) -> TypeTag {
    match registry.get(tag).kind {
        TypeKind::Stream { element } => element,
        _ => unreachable!("stream converter on non-stream tag"),
    }
}

impl Converter for StreamConverter {
    fn trusted(&self) -> bool {
        true
    }

    fn try_write(&self, cx: &mut WriteContext<'_, '_>, value: &Value) -> Result<Step<()>> {
        let Value::Stream(stream) = value else {
            return Err(Error::new(ErrorKind::TypeMismatch {
                expected: "stream",
                got: value.kind_name(),
            }));
        };
        if !cx.opened() {
            cx.schedule_disposal(stream.clone());
            if cx.frame().pending_ref_id.is_some() {
                cx.out().start_object();
                cx.emit_metadata();
                cx.out().property_name("$values");
                cx.out().start_array();
                cx.frame_mut().wrapped = true;
            } else {
                cx.out().start_array();
            }
            cx.mark_opened();
        }
        let element = element_of(cx.tag(), cx.registry());
        let cancel = cx.cancel();
        loop {
            // An already-fetched item is written before anything else.
            if let Some(item) = cx.frame_mut().pending_item.take() {
                if cx.should_flush() {
                    cx.frame_mut().pending_item = Some(item);
                    return Ok(Step::Suspended);
                }
                match cx.write_child(element, &item)? {
                    Step::Done(()) => {
                        cx.frame_mut().elem_index += 1;
                    }
                    Step::Suspended => {
                        cx.frame_mut().pending_item = Some(item);
                        return Ok(Step::Suspended);
                    }
                }
                continue;
            }
            // Cancellation boundary: only before starting a new fetch. An
            // in-flight fetch is drained first.
            if !cx.frame().fetch_pending && cancel.is_cancelled() {
                return Err(Error::new(ErrorKind::Cancelled));
            }
            match stream.borrow_mut().poll_next(&cancel) {
                StreamPoll::Item(item) => {
                    let frame = cx.frame_mut();
                    frame.fetch_pending = false;
                    frame.pending_item = Some(item);
                }
                StreamPoll::Pending => {
                    cx.frame_mut().fetch_pending = true;
                    return Ok(Step::Suspended);
                }
                StreamPoll::Done => {
                    cx.frame_mut().fetch_pending = false;
                    break;
                }
            }
        }
        cx.out().end_array();
        if cx.frame().wrapped {
            cx.out().end_object();
        }
        Ok(Step::Done(()))
    }

    fn try_read(&self, _cx: &mut ReadContext<'_, '_>) -> Result<Step<Value>> {
        Err(Error::new(ErrorKind::TypeMismatch {
            expected: "a deserializable type",
            got: "stream",
        }))
    }
}
