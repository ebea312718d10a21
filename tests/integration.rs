//! Integration tests: header apply, fixed fields, constants, char arrays,
//! enums, bit-sets, composites, byte order, and frame scanning.

use sbecodec::{
    build, scan_frame, CharacterEncoding, CodecError, Encoding, Endianness, PrimitiveType,
    PrimitiveValue, ResolvedSchema, SchemaIr, UnknownEnumPolicy,
};

fn car_ir(endianness: Endianness) -> SchemaIr {
    let e = endianness;
    let mut body = Vec::new();
    body.extend(build::field("capacity", 1, 0, 0, Encoding::new(PrimitiveType::U16, e)));
    body.extend(build::field("numCylinders", 2, 0, 2, Encoding::new(PrimitiveType::U8, e)));
    body.extend(build::field(
        "maxRpm",
        3,
        1,
        3,
        Encoding::new(PrimitiveType::U16, e).optional(),
    ));
    SchemaIr {
        id: 9,
        version: 1,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Car", 1, 5, body)],
    }
}

fn car_schema() -> ResolvedSchema {
    ResolvedSchema::resolve(car_ir(Endianness::Little), UnknownEnumPolicy::Error).expect("resolve")
}

#[test]
fn header_round_trip_and_body_fields() {
    let schema = car_schema();
    let mut buf = [0u8; 64];

    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("capacity", PrimitiveValue::U16(2000)).expect("capacity");
    enc.put("numCylinders", PrimitiveValue::U8(8)).expect("numCylinders");
    enc.put("maxRpm", PrimitiveValue::U16(9000)).expect("maxRpm");
    assert_eq!(enc.encoded_length(), 5);

    // Standard header: blockLength=5, templateId=1, schemaId=9, version=1.
    assert_eq!(&buf[..8], &[5, 0, 1, 0, 9, 0, 1, 0]);

    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap_and_apply_header(&buf, 0).expect("wrap");
    assert_eq!(dec.acting_block_length(), 5);
    assert_eq!(dec.acting_version(), 1);
    assert_eq!(dec.get("capacity").unwrap().as_u64(), Some(2000));
    assert_eq!(dec.get("numCylinders").unwrap().as_u64(), Some(8));
    assert_eq!(dec.get("maxRpm").unwrap().as_u64(), Some(9000));
}

#[test]
fn template_mismatch_is_fatal() {
    let schema = car_schema();
    let mut buf = [0u8; 64];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");

    // Corrupt the templateId field.
    buf[2] = 99;
    let mut dec = schema.decoder("Car").expect("decoder");
    match dec.wrap_and_apply_header(&buf, 0) {
        Err(CodecError::TemplateMismatch { expected, actual }) => {
            assert_eq!(expected, 1);
            assert_eq!(actual, 99);
        }
        other => panic!("expected template mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn car_version_scenario() {
    let schema = car_schema();
    let mut buf = [0u8; 64];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");
    enc.put("capacity", PrimitiveValue::U16(2000)).unwrap();
    enc.put("numCylinders", PrimitiveValue::U8(8)).unwrap();
    enc.put("maxRpm", PrimitiveValue::U16(9000)).unwrap();

    // Decoding as an acting version 0 consumer: maxRpm was introduced in
    // version 1 and must come back as the u16 null sentinel, untouched by
    // the bytes actually present.
    let mut dec = schema.decoder("Car").expect("decoder");
    dec.wrap(&buf, 8, 5, 0);
    assert_eq!(dec.get("capacity").unwrap().as_u64(), Some(2000));
    assert_eq!(dec.get("numCylinders").unwrap().as_u64(), Some(8));
    assert_eq!(dec.get("maxRpm").unwrap().as_u64(), Some(u16::MAX as u64));

    dec.wrap(&buf, 8, 5, 1);
    assert_eq!(dec.get("maxRpm").unwrap().as_u64(), Some(9000));
}

#[test]
fn constant_fields_take_no_wire_bytes() {
    let e = Endianness::Little;
    let mut body = Vec::new();
    body.extend(build::field("speed", 1, 0, 0, Encoding::new(PrimitiveType::U16, e)));
    body.extend(build::const_field(
        "wheels",
        2,
        0,
        Encoding::new(PrimitiveType::U8, e).constant(PrimitiveValue::U8(4)),
    ));
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        // Block length covers only the non-constant field.
        messages: vec![build::message("Vehicle", 1, 2, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let mut buf = [0xAAu8; 16];
    let mut enc = schema.encoder("Vehicle").expect("encoder");
    enc.wrap(&mut buf, 0);
    enc.put("speed", PrimitiveValue::U16(120)).unwrap();
    // Writing the constant is a no-op: nothing past the block changes.
    enc.put("wheels", PrimitiveValue::U8(6)).unwrap();
    assert_eq!(enc.encoded_length(), 2);
    assert_eq!(buf[2], 0xAA);

    let mut dec = schema.decoder("Vehicle").expect("decoder");
    dec.wrap(&buf, 0, 2, 0);
    assert_eq!(dec.get("wheels").unwrap().as_u64(), Some(4));
}

#[test]
fn char_array_accessors() {
    let e = Endianness::Little;
    let body = build::array_field(
        "symbol",
        1,
        0,
        0,
        Encoding::new(PrimitiveType::Char, e).with_character_encoding(CharacterEncoding::Ascii),
        6,
    );
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Instrument", 1, 6, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let mut buf = [0u8; 16];
    let mut enc = schema.encoder("Instrument").expect("encoder");
    enc.wrap(&mut buf, 0);
    enc.put_str("symbol", "MSFT").unwrap();
    assert_eq!(&buf[..6], b"MSFT\0\0");

    let mut dec = schema.decoder("Instrument").expect("decoder");
    dec.wrap(&buf, 0, 6, 0);
    // Whole-string accessor stops at the first NUL.
    assert_eq!(dec.get_string("symbol").unwrap(), "MSFT");
    // Indexed element access.
    assert_eq!(dec.get_at("symbol", 0).unwrap(), PrimitiveValue::Char(b'M'));
    assert_eq!(dec.get_at("symbol", 3).unwrap(), PrimitiveValue::Char(b'T'));
    assert!(matches!(
        dec.get_at("symbol", 6),
        Err(CodecError::IndexOutOfRange { index: 6, length: 6, .. })
    ));
    // Bulk copy-out returns the lesser of destination and array extent.
    let mut out = [0u8; 4];
    assert_eq!(dec.get_bytes("symbol", &mut out).unwrap(), 4);
    assert_eq!(&out, b"MSFT");

    // Oversized source and non-ASCII text are rejected.
    let mut enc2 = schema.encoder("Instrument").expect("encoder");
    let mut buf2 = [0u8; 16];
    enc2.wrap(&mut buf2, 0);
    assert!(matches!(
        enc2.put_str("symbol", "TOOLONGNAME"),
        Err(CodecError::LengthExceedsMax { .. })
    ));
    assert!(matches!(
        enc2.put_str("symbol", "é"),
        Err(CodecError::TextEncoding { .. })
    ));
}

#[test]
fn unsigned_widening_never_goes_negative() {
    let e = Endianness::Little;
    let body = build::field("counter", 1, 0, 0, Encoding::new(PrimitiveType::U32, e));
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Stats", 1, 4, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let buf = [0xFFu8, 0xFF, 0xFF, 0xFF];
    let mut dec = schema.decoder("Stats").expect("decoder");
    dec.wrap(&buf, 0, 4, 0);
    let v = dec.get("counter").unwrap();
    assert_eq!(v, PrimitiveValue::U32(u32::MAX));
    assert_eq!(v.as_u64(), Some(4_294_967_295));
}

#[test]
fn byte_order_produces_distinct_wire_bytes() {
    for (endianness, expected) in [
        (Endianness::Big, [0x01u8, 0x02, 0x03, 0x04]),
        (Endianness::Little, [0x04u8, 0x03, 0x02, 0x01]),
    ] {
        let body = build::field("value", 1, 0, 0, Encoding::new(PrimitiveType::U32, endianness));
        let ir = SchemaIr {
            id: 1,
            version: 0,
            endianness,
            header: vec![],
            messages: vec![build::message("Word", 1, 4, body)],
        };
        let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

        let mut buf = [0u8; 8];
        let mut enc = schema.encoder("Word").expect("encoder");
        enc.wrap(&mut buf, 0);
        enc.put("value", PrimitiveValue::U32(0x0102_0304)).unwrap();
        assert_eq!(&buf[..4], &expected);

        let mut dec = schema.decoder("Word").expect("decoder");
        dec.wrap(&buf, 0, 4, 0);
        assert_eq!(dec.get("value").unwrap().as_u64(), Some(0x0102_0304));
    }
}

fn side_ir(e: Endianness) -> SchemaIr {
    let body = build::typed_field(
        "side",
        1,
        0,
        0,
        build::enum_type(
            "Side",
            Encoding::new(PrimitiveType::U8, e),
            &[("Buy", PrimitiveValue::U8(1)), ("Sell", PrimitiveValue::U8(2))],
        ),
    );
    SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Order", 1, 1, body)],
    }
}

#[test]
fn enum_round_trip_and_unknown_policies() {
    let e = Endianness::Little;
    let strict = ResolvedSchema::resolve(side_ir(e), UnknownEnumPolicy::Error).expect("resolve");
    let lenient = ResolvedSchema::resolve(side_ir(e), UnknownEnumPolicy::Sentinel).expect("resolve");

    let mut buf = [0u8; 8];
    let mut enc = strict.encoder("Order").expect("encoder");
    enc.wrap(&mut buf, 0);
    enc.put_enum("side", "Sell").unwrap();
    assert!(matches!(
        enc.put_enum("side", "Hold"),
        Err(CodecError::UnknownEnumVariant { .. })
    ));

    let mut dec = strict.decoder("Order").expect("decoder");
    dec.wrap(&buf, 0, 1, 0);
    assert_eq!(dec.enum_value("side").unwrap().name(), Some("Sell"));

    // An unrecognised wire value: fatal under Error, sentinel under Sentinel.
    buf[0] = 9;
    let mut dec = strict.decoder("Order").expect("decoder");
    dec.wrap(&buf, 0, 1, 0);
    assert!(matches!(
        dec.enum_value("side"),
        Err(CodecError::UnknownEnumValue { value: 9, .. })
    ));
    let mut dec = lenient.decoder("Order").expect("decoder");
    dec.wrap(&buf, 0, 1, 0);
    assert_eq!(
        dec.enum_value("side").unwrap(),
        sbecodec::EnumValue::Unknown(PrimitiveValue::U8(9))
    );

    // The null value always decodes as Null.
    buf[0] = u8::MAX;
    let mut dec = strict.decoder("Order").expect("decoder");
    dec.wrap(&buf, 0, 1, 0);
    assert!(dec.enum_value("side").unwrap().is_null());
}

#[test]
fn bit_set_choices() {
    let e = Endianness::Little;
    let body = build::typed_field(
        "extras",
        1,
        0,
        0,
        build::set_type(
            "Extras",
            Encoding::new(PrimitiveType::U8, e),
            &[("sunRoof", 0), ("sportsPack", 1), ("cruiseControl", 2)],
        ),
    );
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Options", 1, 1, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let mut buf = [0u8; 4];
    let mut enc = schema.encoder("Options").expect("encoder");
    enc.wrap(&mut buf, 0);
    enc.clear_set("extras").unwrap();
    enc.set_choice("extras", "sunRoof", true).unwrap();
    enc.set_choice("extras", "cruiseControl", true).unwrap();
    assert_eq!(buf[0], 0b101);

    let mut dec = schema.decoder("Options").expect("decoder");
    dec.wrap(&buf, 0, 1, 0);
    assert!(dec.choice("extras", "sunRoof").unwrap());
    assert!(!dec.choice("extras", "sportsPack").unwrap());
    assert!(dec.choice("extras", "cruiseControl").unwrap());
    assert!(matches!(
        dec.choice("extras", "heatedSeats"),
        Err(CodecError::UnknownChoice { .. })
    ));
}

#[test]
fn composite_field_round_trip() {
    let e = Endianness::Little;
    let price = build::composite_type(
        "Decimal",
        9,
        vec![
            build::encoding_member("mantissa", 0, Encoding::new(PrimitiveType::I64, e)),
            build::encoding_member("exponent", 8, Encoding::new(PrimitiveType::I8, e)),
        ],
    );
    let body = build::typed_field("price", 1, 0, 0, price);
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Quote", 1, 9, body)],
    };
    let schema = ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error).expect("resolve");

    let mut buf = [0u8; 16];
    let mut enc = schema.encoder("Quote").expect("encoder");
    enc.wrap(&mut buf, 0);
    {
        let mut price = enc.composite("price").unwrap();
        price.put("mantissa", PrimitiveValue::I64(-123456)).unwrap();
        price.put("exponent", PrimitiveValue::I8(-2)).unwrap();
    }

    let mut dec = schema.decoder("Quote").expect("decoder");
    dec.wrap(&buf, 0, 9, 0);
    let price = dec.composite("price").unwrap().expect("present");
    assert_eq!(price.get("mantissa").unwrap().as_i64(), Some(-123456));
    assert_eq!(price.get("exponent").unwrap().as_i64(), Some(-2));
    assert_eq!(price.encoded_length(), 9);
}

#[test]
fn frame_scan_locates_consecutive_messages() {
    let schema = car_schema();
    let mut buf = [0u8; 64];

    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap first");
    enc.put("capacity", PrimitiveValue::U16(1000)).unwrap();
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 13).expect("wrap second");
    enc.put("capacity", PrimitiveValue::U16(2000)).unwrap();

    let result = scan_frame(&schema, &buf[..26]).expect("scan");
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.messages[0].byte_range, (0, 13));
    assert_eq!(result.messages[1].byte_range, (13, 26));
    assert_eq!(result.messages[0].name, "Car");
    assert_eq!(result.messages[1].template_id, 1);
}

#[test]
fn schema_id_mismatch_fails_frame_scan() {
    let schema = car_schema();
    let mut buf = [0u8; 32];
    let mut enc = schema.encoder("Car").expect("encoder");
    enc.wrap_and_apply_header(&mut buf, 0).expect("wrap");

    buf[4] = 77;
    assert!(matches!(
        scan_frame(&schema, &buf[..13]),
        Err(CodecError::SchemaIdMismatch { expected: 9, actual: 77 })
    ));
}
