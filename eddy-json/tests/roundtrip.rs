//! Buffered and chunked round-trips through the JSON front-end.

use eddy_core::{TypeRegistry, TypeTag, Value, ANY, I64, STRING};
use eddy_format::{Options, Step};
use eddy_json::{from_str, to_string, Deserializer, Serializer};

fn person_registry() -> (TypeRegistry, TypeTag) {
    let mut reg = TypeRegistry::new();
    let address = reg
        .object("Address")
        .property("city", STRING)
        .build()
        .unwrap();
    let tags = reg.array("string[]", STRING).unwrap();
    let person = reg
        .object("Person")
        .property("name", STRING)
        .property("age", I64)
        .property("address", address)
        .property("tags", tags)
        .build()
        .unwrap();
    (reg, person)
}

fn sample_person(reg: &TypeRegistry) -> Value {
    let address_ty = reg.lookup("Address").unwrap();
    let person_ty = reg.lookup("Person").unwrap();
    let mut address = reg.instantiate(address_ty).unwrap();
    address.set_slot(0, Value::Str("London".to_owned()));
    let mut person = reg.instantiate(person_ty).unwrap();
    person.set_slot(0, Value::Str("Ada".to_owned()));
    person.set_slot(1, Value::I64(36));
    person.set_slot(2, Value::object(address));
    person.set_slot(
        3,
        Value::array(vec![
            Value::Str("a".to_owned()),
            Value::Str("b".to_owned()),
        ]),
    );
    Value::object(person)
}

#[test]
fn object_graph_round_trips_byte_exact() {
    let (reg, person) = person_registry();
    let value = sample_person(&reg);
    let options = Options::new(reg);

    let text = to_string(&options, person, value.clone()).unwrap();
    assert_eq!(
        text,
        r#"{"name":"Ada","age":36,"address":{"city":"London"},"tags":["a","b"]}"#
    );

    let back = from_str(&options, person, &text).unwrap();
    assert!(back.deep_eq(&value));
}

#[test]
fn null_members_round_trip() {
    let (reg, person) = person_registry();
    let person_ty = person;
    let mut inst = reg.instantiate(person_ty).unwrap();
    inst.set_slot(0, Value::Str("Bob".to_owned()));
    inst.set_slot(1, Value::I64(1));
    // address and tags stay null
    let value = Value::object(inst);
    let options = Options::new(reg);

    let text = to_string(&options, person, value.clone()).unwrap();
    assert_eq!(text, r#"{"name":"Bob","age":1,"address":null,"tags":null}"#);
    let back = from_str(&options, person, &text).unwrap();
    assert!(back.deep_eq(&value));
}

#[test]
fn every_two_chunk_split_parses_identically() {
    let (reg, person) = person_registry();
    let value = sample_person(&reg);
    let options = Options::new(reg);
    let text = to_string(&options, person, value.clone()).unwrap();
    let bytes = text.as_bytes();

    for split in 0..=bytes.len() {
        let mut de = Deserializer::new(&options, person);
        de.feed(&bytes[..split]);
        de.poll().unwrap();
        de.feed(&bytes[split..]);
        let back = de.finish().unwrap();
        assert!(back.deep_eq(&value), "split at byte {split}");
    }
}

#[test]
fn byte_at_a_time_parse_matches_buffered() {
    let (reg, person) = person_registry();
    let value = sample_person(&reg);
    let options = Options::new(reg);
    let text = to_string(&options, person, value.clone()).unwrap();

    let mut de = Deserializer::new(&options, person);
    for &b in text.as_bytes() {
        de.feed(&[b]);
        de.poll().unwrap();
    }
    let back = de.finish().unwrap();
    assert!(back.deep_eq(&value));
}

#[test]
fn chunked_serializer_output_matches_buffered() {
    let (reg, person) = person_registry();
    let value = sample_person(&reg);
    let options = Options::new(reg);
    let expected = to_string(&options, person, value.clone()).unwrap();

    for threshold in [1, 2, 7, 64] {
        let mut driver = Serializer::with_flush_threshold(
            &options,
            person,
            value.clone(),
            eddy_core::CancelToken::new(),
            threshold,
        );
        let mut out = Vec::new();
        loop {
            let step = driver.step().unwrap();
            out.extend_from_slice(&driver.take_output());
            if step.is_done() {
                break;
            }
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            expected,
            "threshold {threshold}"
        );
    }
}

#[test]
fn strings_and_names_are_escaped_and_recovered() {
    let mut reg = TypeRegistry::new();
    let ty = reg
        .object("Note")
        .property("weird \"name\"", STRING)
        .build()
        .unwrap();
    let mut inst = reg.instantiate(ty).unwrap();
    inst.set_slot(0, Value::Str("a\"b\\c\nd\u{01}é😀".to_owned()));
    let value = Value::object(inst);
    let options = Options::new(reg);

    let text = to_string(&options, ty, value.clone()).unwrap();
    assert_eq!(text, "{\"weird \\\"name\\\"\":\"a\\\"b\\\\c\\nd\\u0001é😀\"}");
    let back = from_str(&options, ty, &text).unwrap();
    assert!(back.deep_eq(&value));
}

#[test]
fn parameterized_ctor_binds_out_of_order_properties() {
    let mut reg = TypeRegistry::new();
    let point = reg
        .object("Point")
        .property("x", I64)
        .property("y", I64)
        .ctor_params(&["x", "y"])
        .build()
        .unwrap();
    let options = Options::new(reg);

    let value = from_str(&options, point, r#"{"y":2,"x":1}"#).unwrap();
    let obj = value.as_object().unwrap().borrow();
    assert_eq!(obj.slot(0).as_i64(), Some(1));
    assert_eq!(obj.slot(1).as_i64(), Some(2));
}

#[test]
fn trailing_characters_are_rejected() {
    let reg = TypeRegistry::new();
    let options = Options::new(reg);
    let err = from_str(&options, I64, "1 2").unwrap_err();
    assert_eq!(err.code(), "syntax");
}

#[test]
fn truncated_document_is_eof() {
    let (reg, person) = person_registry();
    let options = Options::new(reg);
    let err = from_str(&options, person, r#"{"name":"Ada""#).unwrap_err();
    assert_eq!(err.code(), "unexpected_eof");
}

#[test]
fn read_depth_limit_is_enforced() {
    let reg = TypeRegistry::new();
    let mut options = Options::new(reg);
    options.set_max_depth(3).unwrap();
    let err = from_str(&options, ANY, "[[[1]]]").unwrap_err();
    assert_eq!(err.code(), "depth_limit_exceeded");
}

#[test]
fn errors_carry_the_json_path() {
    let mut reg = TypeRegistry::new();
    let inner = reg.object("Inner").property("n", I64).build().unwrap();
    let inner_arr = reg.array("Inner[]", inner).unwrap();
    let outer = reg
        .object("Outer")
        .property("odd name", inner_arr)
        .build()
        .unwrap();
    let options = Options::new(reg);

    let err = from_str(&options, outer, r#"{"odd name":[{"n":1},{"n":"x"}]}"#).unwrap_err();
    assert_eq!(err.code(), "type_mismatch");
    assert_eq!(err.path.as_deref(), Some("$['odd name'][1].n"));
}

#[test]
fn first_operation_seals_the_options() {
    let (reg, person) = person_registry();
    let value = sample_person(&reg);
    let mut options = Options::new(reg);
    to_string(&options, person, value).unwrap();
    assert!(options.is_sealed());
    assert!(options.set_max_depth(8).is_err());
}

#[test]
fn scalar_documents_round_trip() {
    let reg = TypeRegistry::new();
    let options = Options::new(reg);
    assert_eq!(to_string(&options, I64, Value::I64(-7)).unwrap(), "-7");
    assert!(from_str(&options, I64, "-7")
        .unwrap()
        .deep_eq(&Value::I64(-7)));
    assert!(from_str(&options, STRING, r#""hi""#)
        .unwrap()
        .deep_eq(&Value::Str("hi".to_owned())));
}

#[test]
fn deserializer_poll_reports_progress() {
    let reg = TypeRegistry::new();
    let options = Options::new(reg);
    let mut de = Deserializer::new(&options, I64);
    assert_eq!(de.poll().unwrap(), Step::Suspended);
    de.feed(b"12");
    // Still suspended: the number may continue in the next chunk.
    assert_eq!(de.poll().unwrap(), Step::Suspended);
    assert!(de.finish().unwrap().deep_eq(&Value::I64(12)));
}
