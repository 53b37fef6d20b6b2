//! Engine tests against in-memory token cursors, independent of any
//! concrete wire format.

use std::cell::RefCell;
use std::rc::Rc;

use eddy_core::{
    CancelToken, KnownType, Polymorphism, TypeRegistry, TypeTag, Value, VecStream, BOOL, I64,
    STRING,
};
use eddy_format::{
    Checkpoint, Options, ReadOperation, RefMode, Step, Token, TokenKind, TokenRead, TokenWrite,
    WriteOperation,
};

/// Token reader over a vector, with a movable availability horizon to
/// simulate input arriving in chunks.
struct VecReader {
    tokens: Vec<Token>,
    pos: usize,
    available: usize,
    depth: usize,
    last: Option<TokenKind>,
}

impl VecReader {
    fn new(tokens: Vec<Token>) -> Self {
        let available = tokens.len();
        VecReader {
            tokens,
            pos: 0,
            available,
            depth: 0,
            last: None,
        }
    }

    fn throttled(tokens: Vec<Token>) -> Self {
        VecReader {
            tokens,
            pos: 0,
            available: 0,
            depth: 0,
            last: None,
        }
    }

    fn reveal(&mut self, n: usize) {
        self.available = (self.available + n).min(self.tokens.len());
    }
}

impl TokenRead for VecReader {
    fn next(&mut self) -> eddy_format::Result<Step<Token>> {
        if self.pos >= self.available {
            return Ok(Step::Suspended);
        }
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        match token {
            Token::StartObject | Token::StartArray => self.depth += 1,
            Token::EndObject | Token::EndArray => self.depth -= 1,
            _ => {}
        }
        self.last = Some(token.kind());
        Ok(Step::Done(token))
    }

    fn depth(&self) -> usize {
        self.depth
    }

    fn token_type(&self) -> Option<TokenKind> {
        self.last
    }

    fn bytes_consumed(&self) -> usize {
        // One unit per token.
        self.pos
    }

    fn is_final(&self) -> bool {
        self.available == self.tokens.len()
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new((self.pos, self.depth, self.last))
    }

    fn rewind(&mut self, checkpoint: Checkpoint) {
        let (pos, depth, last) = checkpoint
            .into_state::<(usize, usize, Option<TokenKind>)>()
            .expect("foreign checkpoint");
        self.pos = pos;
        self.depth = depth;
        self.last = last;
    }
}

/// Token writer collecting into a vector, with a token-count flush
/// threshold to force suspensions.
struct VecWriter {
    tokens: Vec<Token>,
    depth: usize,
    since_flush: usize,
    flush_after: usize,
    last: Option<TokenKind>,
}

impl VecWriter {
    fn new() -> Self {
        Self::with_flush_after(usize::MAX)
    }

    fn with_flush_after(flush_after: usize) -> Self {
        VecWriter {
            tokens: Vec::new(),
            depth: 0,
            since_flush: 0,
            flush_after,
            last: None,
        }
    }

    fn drain(&mut self) {
        self.since_flush = 0;
    }

    fn push(&mut self, token: Token) {
        match token {
            Token::StartObject | Token::StartArray => self.depth += 1,
            Token::EndObject | Token::EndArray => self.depth -= 1,
            _ => {}
        }
        self.since_flush += 1;
        self.last = Some(token.kind());
        self.tokens.push(token);
    }
}

impl TokenWrite for VecWriter {
    fn start_object(&mut self) {
        self.push(Token::StartObject);
    }
    fn end_object(&mut self) {
        self.push(Token::EndObject);
    }
    fn start_array(&mut self) {
        self.push(Token::StartArray);
    }
    fn end_array(&mut self) {
        self.push(Token::EndArray);
    }
    fn property_name(&mut self, name: &str) {
        self.push(Token::PropertyName(name.to_owned()));
    }
    fn null(&mut self) {
        self.push(Token::Null);
    }
    fn bool(&mut self, value: bool) {
        self.push(Token::Bool(value));
    }
    fn i64(&mut self, value: i64) {
        self.push(Token::I64(value));
    }
    fn u64(&mut self, value: u64) {
        self.push(Token::U64(value));
    }
    fn f64(&mut self, value: f64) {
        self.push(Token::F64(value));
    }
    fn str(&mut self, value: &str) {
        self.push(Token::Str(value.to_owned()));
    }
    fn depth(&self) -> usize {
        self.depth
    }
    fn token_type(&self) -> Option<TokenKind> {
        self.last
    }
    fn bytes_pending(&self) -> usize {
        self.since_flush
    }
    fn should_flush(&self) -> bool {
        self.since_flush >= self.flush_after
    }
}

fn poly_registry() -> (TypeRegistry, TypeTag, TypeTag, TypeTag) {
    let mut reg = TypeRegistry::new();
    let base = reg.object("Base").abstract_().build().unwrap();
    let derived1 = reg
        .object("Derived1")
        .base(base)
        .property("Number", I64)
        .property("Flag", BOOL)
        .build()
        .unwrap();
    let derived2 = reg
        .object("Derived2")
        .base(base)
        .property("Label", STRING)
        .build()
        .unwrap();
    reg.attach_polymorphism(
        base,
        Polymorphism::with_discriminator("$type")
            .known(KnownType::with_id(derived1, "derived1"))
            .known(KnownType::with_id(derived2, "derived2")),
    )
    .unwrap();
    (reg, base, derived1, derived2)
}

fn derived1_value(reg: &TypeRegistry, derived1: TypeTag, number: i64, flag: bool) -> Value {
    let mut inst = reg.instantiate(derived1).unwrap();
    inst.set_slot(0, Value::I64(number));
    inst.set_slot(1, Value::Bool(flag));
    Value::object(inst)
}

fn write_all(options: &Options, ty: TypeTag, value: Value, flush_after: usize) -> Vec<Token> {
    let mut out = VecWriter::with_flush_after(flush_after);
    let mut op = WriteOperation::new(options, ty, value, CancelToken::new());
    loop {
        match op.step(options, &mut out).unwrap() {
            Step::Done(()) => break,
            Step::Suspended => out.drain(),
        }
    }
    out.tokens
}

#[test]
fn polymorphic_write_emits_discriminator_before_properties() {
    let (reg, base, derived1, _) = poly_registry();
    let value = derived1_value(&reg, derived1, 42, true);
    let options = Options::new(reg);

    let tokens = write_all(&options, base, value, usize::MAX);
    assert_eq!(
        tokens,
        vec![
            Token::StartObject,
            Token::PropertyName("$type".into()),
            Token::Str("derived1".into()),
            Token::PropertyName("Number".into()),
            Token::I64(42),
            Token::PropertyName("Flag".into()),
            Token::Bool(true),
            Token::EndObject,
        ]
    );
}

#[test]
fn chunked_write_output_is_identical_to_one_shot() {
    let (reg, base, derived1, _) = poly_registry();
    let value = derived1_value(&reg, derived1, 7, false);
    let options = Options::new(reg);

    let one_shot = write_all(&options, base, value.clone(), usize::MAX);
    for flush_after in 1..=one_shot.len() {
        let chunked = write_all(&options, base, value.clone(), flush_after);
        assert_eq!(chunked, one_shot, "flush_after = {flush_after}");
    }
}

#[test]
fn polymorphic_read_retargets_on_discriminator() {
    let (reg, base, derived1, _) = poly_registry();
    let options = Options::new(reg);
    let mut input = VecReader::new(vec![
        Token::StartObject,
        Token::PropertyName("$type".into()),
        Token::Str("derived1".into()),
        Token::PropertyName("Number".into()),
        Token::I64(42),
        Token::PropertyName("Flag".into()),
        Token::Bool(true),
        Token::EndObject,
    ]);
    let mut op = ReadOperation::new(&options, base);
    let value = match op.step(&options, &mut input).unwrap() {
        Step::Done(value) => value,
        Step::Suspended => panic!("fully buffered read suspended"),
    };
    let expected = derived1_value(options.registry(), derived1, 42, true);
    assert!(value.deep_eq(&expected));
}

#[test]
fn chunked_read_produces_the_same_value() {
    let (reg, base, derived1, _) = poly_registry();
    let options = Options::new(reg);
    let tokens = vec![
        Token::StartObject,
        Token::PropertyName("$type".into()),
        Token::Str("derived1".into()),
        Token::PropertyName("Number".into()),
        Token::I64(42),
        Token::PropertyName("Flag".into()),
        Token::Bool(true),
        Token::EndObject,
    ];
    let mut input = VecReader::throttled(tokens);
    let mut op = ReadOperation::new(&options, base);
    let mut steps = 0;
    let value = loop {
        match op.step(&options, &mut input).unwrap() {
            Step::Done(value) => break value,
            Step::Suspended => {
                input.reveal(1);
                steps += 1;
                assert!(steps < 100, "read did not make progress");
            }
        }
    };
    let expected = derived1_value(options.registry(), derived1, 42, true);
    assert!(value.deep_eq(&expected));
}

#[test]
fn unknown_discriminator_is_fatal() {
    let (reg, base, _, _) = poly_registry();
    let options = Options::new(reg);
    let mut input = VecReader::new(vec![
        Token::StartObject,
        Token::PropertyName("$type".into()),
        Token::Str("mystery".into()),
        Token::EndObject,
    ]);
    let mut op = ReadOperation::new(&options, base);
    let err = op.step(&options, &mut input).unwrap_err();
    assert_eq!(err.code(), "unknown_discriminator");
}

#[test]
fn non_string_discriminator_is_fatal() {
    let (reg, base, _, _) = poly_registry();
    let options = Options::new(reg);
    let mut input = VecReader::new(vec![
        Token::StartObject,
        Token::PropertyName("$type".into()),
        Token::I64(3),
        Token::EndObject,
    ]);
    let mut op = ReadOperation::new(&options, base);
    let err = op.step(&options, &mut input).unwrap_err();
    assert_eq!(err.code(), "invalid_discriminator");
}

#[test]
fn unknown_properties_are_skipped_resumably() {
    let (reg, base, derived1, _) = poly_registry();
    let options = Options::new(reg);
    let tokens = vec![
        Token::StartObject,
        Token::PropertyName("$type".into()),
        Token::Str("derived1".into()),
        Token::PropertyName("Extra".into()),
        Token::StartObject,
        Token::PropertyName("nested".into()),
        Token::StartArray,
        Token::I64(1),
        Token::I64(2),
        Token::EndArray,
        Token::EndObject,
        Token::PropertyName("Number".into()),
        Token::I64(5),
        Token::PropertyName("Flag".into()),
        Token::Bool(true),
        Token::EndObject,
    ];
    // Chunked, to exercise suspension inside the skipped subtree.
    let mut input = VecReader::throttled(tokens);
    let mut op = ReadOperation::new(&options, base);
    let value = loop {
        match op.step(&options, &mut input).unwrap() {
            Step::Done(value) => break value,
            Step::Suspended => input.reveal(1),
        }
    };
    let expected = derived1_value(options.registry(), derived1, 5, true);
    assert!(value.deep_eq(&expected));
}

#[test]
fn cycle_breaking_writes_null_at_the_cycle() {
    let mut reg = TypeRegistry::new();
    let node = reg
        .object("Node")
        .property("next", eddy_core::ANY)
        .build()
        .unwrap();
    let mut a = reg.instantiate(node).unwrap();
    let b = reg.instantiate(node).unwrap();
    let b_val = Value::object(b);
    a.set_slot(0, b_val.clone());
    let a_val = Value::object(a);
    if let Value::Object(b_obj) = &b_val {
        b_obj.borrow_mut().set_slot(0, a_val.clone());
    }

    let mut options = Options::new(reg);
    options.set_reference_mode(RefMode::CycleBreak).unwrap();

    let tokens = write_all(&options, node, a_val, usize::MAX);
    assert_eq!(
        tokens,
        vec![
            Token::StartObject,
            Token::PropertyName("next".into()),
            Token::StartObject,
            Token::PropertyName("next".into()),
            Token::Null,
            Token::EndObject,
            Token::EndObject,
        ]
    );
}

#[test]
fn preserve_mode_emits_id_then_ref_for_shared_values() {
    let mut reg = TypeRegistry::new();
    let item = reg.object("Item").property("n", I64).build().unwrap();
    let list = reg.array("Item[]", item).unwrap();

    let mut inst = reg.instantiate(item).unwrap();
    inst.set_slot(0, Value::I64(9));
    let shared = Value::object(inst);
    let arr = Value::array(vec![shared.clone(), shared]);

    let mut options = Options::new(reg);
    options.set_reference_mode(RefMode::Preserve).unwrap();

    let tokens = write_all(&options, list, arr, usize::MAX);
    assert_eq!(
        tokens,
        vec![
            Token::StartObject,
            Token::PropertyName("$id".into()),
            Token::Str("1".into()),
            Token::PropertyName("$values".into()),
            Token::StartArray,
            Token::StartObject,
            Token::PropertyName("$id".into()),
            Token::Str("2".into()),
            Token::PropertyName("n".into()),
            Token::I64(9),
            Token::EndObject,
            Token::StartObject,
            Token::PropertyName("$ref".into()),
            Token::Str("2".into()),
            Token::EndObject,
            Token::EndArray,
            Token::EndObject,
        ]
    );
}

#[test]
fn preserve_mode_read_restores_shared_identity() {
    let mut reg = TypeRegistry::new();
    let item = reg.object("Item").property("n", I64).build().unwrap();
    let list = reg.array("Item[]", item).unwrap();

    let mut options = Options::new(reg);
    options.set_reference_mode(RefMode::Preserve).unwrap();

    let tokens = vec![
        Token::StartObject,
        Token::PropertyName("$id".into()),
        Token::Str("1".into()),
        Token::PropertyName("$values".into()),
        Token::StartArray,
        Token::StartObject,
        Token::PropertyName("$id".into()),
        Token::Str("2".into()),
        Token::PropertyName("n".into()),
        Token::I64(9),
        Token::EndObject,
        Token::StartObject,
        Token::PropertyName("$ref".into()),
        Token::Str("2".into()),
        Token::EndObject,
        Token::EndArray,
        Token::EndObject,
    ];
    let mut input = VecReader::new(tokens);
    let mut op = ReadOperation::new(&options, list);
    let value = match op.step(&options, &mut input).unwrap() {
        Step::Done(value) => value,
        Step::Suspended => panic!("fully buffered read suspended"),
    };
    let arr = value.as_array().unwrap().borrow();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0].identity(), arr[1].identity());
}

#[test]
fn stream_write_drains_pending_fetches_and_disposes() {
    let mut reg = TypeRegistry::new();
    let nums = reg.stream("i64 stream", I64).unwrap();
    let source = Rc::new(RefCell::new(
        VecStream::new(vec![Value::I64(1), Value::I64(2), Value::I64(3)]).pending_every(2),
    ));
    let value = Value::Stream(source.clone());
    let options = Options::new(reg);

    let mut out = VecWriter::new();
    let mut op = WriteOperation::new(&options, nums, value, CancelToken::new());
    let mut suspensions = 0;
    loop {
        match op.step(&options, &mut out).unwrap() {
            Step::Done(()) => break,
            Step::Suspended => {
                suspensions += 1;
                assert!(suspensions < 10);
            }
        }
    }
    assert!(suspensions > 0, "pending fetch must suspend the walk");
    assert_eq!(
        out.tokens,
        vec![
            Token::StartArray,
            Token::I64(1),
            Token::I64(2),
            Token::I64(3),
            Token::EndArray,
        ]
    );
    assert!(source.borrow().is_disposed());
}

#[test]
fn cancellation_is_honored_at_the_next_fetch_boundary() {
    let mut reg = TypeRegistry::new();
    let nums = reg.stream("i64 stream", I64).unwrap();
    let source = Rc::new(RefCell::new(VecStream::new(vec![
        Value::I64(1),
        Value::I64(2),
    ])));
    let value = Value::Stream(source.clone());
    let options = Options::new(reg);

    let cancel = CancelToken::new();
    let mut out = VecWriter::with_flush_after(2);
    let mut op = WriteOperation::new(&options, nums, value, cancel.clone());

    // First step suspends at the flush threshold with one item written.
    assert_eq!(op.step(&options, &mut out).unwrap(), Step::Suspended);
    cancel.cancel();
    out.drain();
    let err = op.step(&options, &mut out).unwrap_err();
    assert_eq!(err.code(), "cancelled");
    // Abandonment still released the source.
    assert!(source.borrow().is_disposed());
}

#[test]
fn depth_limit_is_fatal_and_carries_a_path() {
    let mut reg = TypeRegistry::new();
    let cell = reg.object("Cell").property("next", eddy_core::ANY).build().unwrap();
    // A chain deeper than the limit, without cycles.
    let mut tail = Value::Null;
    for _ in 0..10 {
        let mut inst = reg.instantiate(cell).unwrap();
        inst.set_slot(0, tail);
        tail = Value::object(inst);
    }
    let mut options = Options::new(reg);
    options.set_max_depth(4).unwrap();

    let mut out = VecWriter::new();
    let mut op = WriteOperation::new(&options, cell, tail, CancelToken::new());
    let err = op.step(&options, &mut out).unwrap_err();
    assert_eq!(err.code(), "depth_limit_exceeded");
    assert!(err.path.as_deref().unwrap_or_default().starts_with("$"));
}

#[test]
fn sealed_options_reject_mutation_after_first_use() {
    let (reg, base, derived1, _) = poly_registry();
    let mut options = Options::new(reg);
    let value = derived1_value(options.registry(), derived1, 1, true);
    let mut out = VecWriter::new();
    let mut op = WriteOperation::new(&options, base, value, CancelToken::new());
    op.step(&options, &mut out).unwrap();

    assert!(options.is_sealed());
    assert!(options.set_reference_mode(RefMode::Preserve).is_err());
}
