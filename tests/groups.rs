//! Repeating-group tests: count fidelity, resetCountToIndex, nesting,
//! skip/decoded-length stability, the dump, and the defensive dimension
//! check.

use sbecodec::{
    build, message_to_dump, CharacterEncoding, CodecError, Encoding, Endianness, PrimitiveType,
    PrimitiveValue, ResolvedSchema, SchemaIr, UnknownEnumPolicy,
};

/// A message with one fixed field, a `fuelFigures` group (speed u16,
/// mpg f64; block 10) and a `make` var-data field (u16 length prefix).
fn fuel_schema() -> ResolvedSchema {
    let e = Endianness::Little;
    let mut body = Vec::new();
    body.extend(build::field("speedLimit", 1, 0, 0, Encoding::new(PrimitiveType::U16, e)));
    let mut figures = Vec::new();
    figures.extend(build::field("speed", 10, 0, 0, Encoding::new(PrimitiveType::U16, e)));
    figures.extend(build::field("mpg", 11, 0, 2, Encoding::new(PrimitiveType::F64, e)));
    body.extend(build::group("fuelFigures", 20, 0, 10, build::dimension(e), figures));
    body.extend(build::var_data(
        "make",
        30,
        0,
        Encoding::new(PrimitiveType::U16, e),
        Encoding::new(PrimitiveType::Char, e).with_character_encoding(CharacterEncoding::Ascii),
    ));
    let ir = SchemaIr {
        id: 3,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Car", 1, 2, body)],
    };
    ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve")
}

const FIGURES: [(u16, f64); 3] = [(30, 35.9), (55, 49.0), (75, 40.0)];

fn encode_fuel(schema: &ResolvedSchema, buf: &mut [u8]) -> usize {
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(buf, 0).expect("wrap");
    enc.put("speedLimit", PrimitiveValue::U16(130)).unwrap();
    {
        let mut figures = enc.group("fuelFigures", FIGURES.len()).expect("group");
        for (speed, mpg) in FIGURES {
            figures.next().expect("next");
            figures.put("speed", PrimitiveValue::U16(speed)).unwrap();
            figures.put("mpg", PrimitiveValue::F64(mpg)).unwrap();
        }
    }
    enc.put_var_str("make", "Honda").unwrap();
    schema.header.encoded_length + enc.encoded_length()
}

#[test]
fn group_count_fidelity() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    encode_fuel(&schema, &mut buf);

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    let mut figures = dec.group("fuelFigures").expect("group");
    assert_eq!(figures.count(), 3);

    for (speed, mpg) in FIGURES {
        assert!(figures.has_next());
        figures.next().expect("next");
        assert_eq!(figures.get("speed").unwrap().as_u64(), Some(speed as u64));
        assert_eq!(figures.get("mpg").unwrap().as_f64(), Some(mpg));
    }
    assert!(!figures.has_next());
    assert!(matches!(
        figures.next(),
        Err(CodecError::NoSuchElement { count: 3, .. })
    ));
}

#[test]
fn encoder_next_beyond_declared_count_fails() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    let mut figures = enc.group("fuelFigures", 1).expect("group");
    figures.next().expect("first");
    assert!(matches!(
        figures.next(),
        Err(CodecError::NoSuchElement { count: 1, .. })
    ));
}

#[test]
fn encoder_count_outside_dimension_range_fails() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    // numInGroup is u16: max applicable count is 65534.
    assert!(matches!(
        enc.group("fuelFigures", 70_000),
        Err(CodecError::CountOutOfRange { count: 70_000, .. })
    ));
}

#[test]
fn reset_count_to_index_rewrites_the_dimension() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("speedLimit", PrimitiveValue::U16(130)).unwrap();
    {
        // Declare 5, emit 2, then shrink the count in place.
        let mut figures = enc.group("fuelFigures", 5).expect("group");
        for (speed, mpg) in &FIGURES[..2] {
            figures.next().expect("next");
            figures.put("speed", PrimitiveValue::U16(*speed)).unwrap();
            figures.put("mpg", PrimitiveValue::F64(*mpg)).unwrap();
        }
        assert_eq!(figures.reset_count_to_index().expect("reset"), 2);
    }
    enc.put_var_str("make", "Honda").unwrap();

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    let mut figures = dec.group("fuelFigures").expect("group");
    assert_eq!(figures.count(), 2);
    let mut seen = 0;
    while figures.has_next() {
        figures.next().expect("next");
        seen += 1;
    }
    assert_eq!(seen, 2);
    drop(figures);
    assert_eq!(dec.get_var_str("make").unwrap(), "Honda");
}

#[test]
fn decoded_length_matches_wire_arithmetic() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    let total = encode_fuel(&schema, &mut buf);

    // header(8) + block(2) + dimension(4) + 3×10 + lengthField(2) + "Honda"(5)
    assert_eq!(total, 8 + 2 + 4 + 30 + 2 + 5);

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    let body = 2 + 4 + 30 + 2 + 5;
    assert_eq!(dec.sbe_decoded_length().expect("measure"), body);
    // Stable when asked twice, and it must not disturb the decode below.
    assert_eq!(dec.sbe_decoded_length().expect("measure again"), body);

    let mut figures = dec.group("fuelFigures").expect("group");
    figures.next().expect("next");
    assert_eq!(figures.get("speed").unwrap().as_u64(), Some(30));
    drop(figures);

    // Measuring mid-iteration keeps the in-progress limit intact.
    let limit_before = dec.limit();
    assert_eq!(dec.sbe_decoded_length().expect("mid-measure"), body);
    assert_eq!(dec.limit(), limit_before);
}

#[test]
fn sbe_skip_consumes_the_whole_body() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    let total = encode_fuel(&schema, &mut buf);

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    dec.sbe_skip().expect("skip");
    assert_eq!(dec.encoded_length(), total - 8);
}

fn nested_schema() -> ResolvedSchema {
    let e = Endianness::Little;
    let mut leg = Vec::new();
    leg.extend(build::field("legId", 30, 0, 0, Encoding::new(PrimitiveType::U32, e)));
    leg.extend(build::var_data(
        "legNote",
        31,
        0,
        Encoding::new(PrimitiveType::U8, e),
        Encoding::new(PrimitiveType::Char, e).with_character_encoding(CharacterEncoding::Ascii),
    ));
    let mut order = Vec::new();
    order.extend(build::field("orderId", 20, 0, 0, Encoding::new(PrimitiveType::U64, e)));
    order.extend(build::group("legs", 21, 0, 4, build::dimension(e), leg));
    let mut body = Vec::new();
    body.extend(build::field("batchId", 1, 0, 0, Encoding::new(PrimitiveType::U32, e)));
    body.extend(build::group("orders", 10, 0, 8, build::dimension(e), order));
    let ir = SchemaIr {
        id: 3,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Batch", 2, 4, body)],
    };
    ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve")
}

#[test]
fn nested_groups_share_the_message_limit() {
    let schema = nested_schema();
    let mut buf = [0u8; 256];

    let mut enc = schema.encoder("Batch").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("batchId", PrimitiveValue::U32(77)).unwrap();
    {
        let mut orders = enc.group("orders", 2).expect("orders");
        for order_id in [100u64, 200] {
            orders.next().expect("next order");
            orders.put("orderId", PrimitiveValue::U64(order_id)).unwrap();
            let mut legs = orders.group("legs", 2).expect("legs");
            for leg in 0..2u32 {
                legs.next().expect("next leg");
                legs.put("legId", PrimitiveValue::U32(order_id as u32 + leg)).unwrap();
                legs.put_var_str("legNote", "ok").unwrap();
            }
        }
    }

    let mut dec = schema.decoder("Batch").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    assert_eq!(dec.get("batchId").unwrap().as_u64(), Some(77));
    let mut orders = dec.group("orders").expect("orders");
    assert_eq!(orders.count(), 2);
    for order_id in [100u64, 200] {
        orders.next().expect("next order");
        assert_eq!(orders.get("orderId").unwrap().as_u64(), Some(order_id));
        let mut legs = orders.group("legs").expect("legs");
        assert_eq!(legs.count(), 2);
        for leg in 0..2u64 {
            legs.next().expect("next leg");
            assert_eq!(legs.get("legId").unwrap().as_u64(), Some(order_id + leg));
            assert_eq!(legs.get_var_str("legNote").unwrap(), "ok");
        }
    }
}

#[test]
fn group_sbe_skip_jumps_over_nested_content() {
    let schema = nested_schema();
    let mut buf = [0u8; 256];
    let mut enc = schema.encoder("Batch").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("batchId", PrimitiveValue::U32(77)).unwrap();
    {
        let mut orders = enc.group("orders", 2).expect("orders");
        for order_id in [100u64, 200] {
            orders.next().expect("next");
            orders.put("orderId", PrimitiveValue::U64(order_id)).unwrap();
            let mut legs = orders.group("legs", 1).expect("legs");
            legs.next().expect("leg");
            legs.put("legId", PrimitiveValue::U32(1)).unwrap();
            legs.put_var_str("legNote", "note").unwrap();
        }
    }

    let mut dec = schema.decoder("Batch").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    let mut orders = dec.group("orders").expect("orders");
    orders.next().expect("first");
    // Skip the first order's legs wholesale, then land on the second.
    orders.sbe_skip().expect("skip nested");
    orders.next().expect("second");
    assert_eq!(orders.get("orderId").unwrap().as_u64(), Some(200));
}

#[test]
fn corrupt_dimension_block_length_is_rejected() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    encode_fuel(&schema, &mut buf);

    // The dimension header sits right after the fixed block: clamp its
    // blockLength below the version-0 field extent.
    let dim_offset = 8 + 2;
    buf[dim_offset] = 4;
    buf[dim_offset + 1] = 0;

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    assert!(matches!(
        dec.group("fuelFigures"),
        Err(CodecError::GroupBlockLengthTooSmall { actual: 4, min: 10, .. })
    ));
}

#[test]
fn dump_renders_groups_and_restores_the_limit() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    encode_fuel(&schema, &mut buf);

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    let limit_before = dec.limit();
    let text = message_to_dump(&mut dec).expect("dump");
    assert_eq!(dec.limit(), limit_before);

    assert!(text.contains("Car (template=1"));
    assert!(text.contains("speedLimit: 130"));
    assert!(text.contains("fuelFigures[3]"));
    assert!(text.contains("speed: 30"));
    assert!(text.contains("make: \"Honda\""));

    // The decode still works after dumping.
    let mut figures = dec.group("fuelFigures").expect("group");
    figures.next().expect("next");
    assert_eq!(figures.get("speed").unwrap().as_u64(), Some(30));
}

#[test]
fn var_data_accessor_variants_agree() {
    let schema = fuel_schema();
    let mut buf = [0u8; 128];
    encode_fuel(&schema, &mut buf);

    // Peek does not consume; each consuming variant advances identically.
    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    {
        let mut figures = dec.group("fuelFigures").expect("group");
        while figures.has_next() {
            figures.next().expect("next");
        }
    }
    assert_eq!(dec.var_data_length("make").unwrap(), 5);
    let limit_after_peek = dec.limit();
    assert_eq!(dec.var_data_length("make").unwrap(), 5);
    assert_eq!(dec.limit(), limit_after_peek);

    let slice = dec.var_data_slice("make").unwrap();
    assert_eq!(slice, b"Honda");
    let limit_after_slice = dec.limit();

    // Same field read through the copying variant.
    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    {
        let mut figures = dec.group("fuelFigures").expect("group");
        while figures.has_next() {
            figures.next().expect("next");
        }
    }
    let mut out = [0u8; 3];
    assert_eq!(dec.get_var_data("make", &mut out).unwrap(), 3);
    assert_eq!(&out, b"Hon");
    assert_eq!(dec.limit(), limit_after_slice);

    // And the skip variant.
    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    {
        let mut figures = dec.group("fuelFigures").expect("group");
        while figures.has_next() {
            figures.next().expect("next");
        }
    }
    assert_eq!(dec.skip_var_data("make").unwrap(), 5);
    assert_eq!(dec.limit(), limit_after_slice);
}

#[test]
fn var_data_encode_respects_length_field_maximum() {
    let e = Endianness::Little;
    let mut body = Vec::new();
    body.extend(build::field("id", 1, 0, 0, Encoding::new(PrimitiveType::U8, e)));
    body.extend(build::var_data(
        "blob",
        2,
        0,
        // u8 length prefix: at most 254 payload bytes.
        Encoding::new(PrimitiveType::U8, e),
        Encoding::new(PrimitiveType::U8, e),
    ));
    let ir = SchemaIr {
        id: 3,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Blobby", 5, 1, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let mut buf = [0u8; 512];
    let mut enc = schema.encoder("Blobby").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("id", PrimitiveValue::U8(1)).unwrap();
    let limit_before = enc.limit();
    let oversized = vec![0u8; 255];
    assert!(matches!(
        enc.put_var_data("blob", &oversized),
        Err(CodecError::LengthExceedsMax { length: 255, max: 254, .. })
    ));
    // Nothing was written for the failed field.
    assert_eq!(enc.limit(), limit_before);
    enc.put_var_data("blob", &[1, 2, 3]).unwrap();
    assert_eq!(enc.limit(), limit_before + 1 + 3);
}
