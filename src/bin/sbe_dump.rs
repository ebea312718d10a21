//! Encode a sample message with an in-code schema, then decode and dump it.
//!
//! Usage:
//!   sbe_dump
//!
//! Demonstrates the full flyweight cycle: header apply, fixed fields,
//! repeating group, var-data, frame scan, and the display dump.

use anyhow::Result;
use sbecodec::{
    build, message_to_dump, scan_frame, Encoding, Endianness, PrimitiveType, PrimitiveValue,
    ResolvedSchema, SchemaIr, UnknownEnumPolicy,
};

fn car_schema() -> Result<ResolvedSchema> {
    let e = Endianness::Little;
    let mut body = Vec::new();
    body.extend(build::field(
        "capacity",
        1,
        0,
        0,
        Encoding::new(PrimitiveType::U16, e),
    ));
    body.extend(build::field(
        "numCylinders",
        2,
        0,
        2,
        Encoding::new(PrimitiveType::U8, e),
    ));
    body.extend(build::field(
        "maxRpm",
        3,
        1,
        3,
        Encoding::new(PrimitiveType::U16, e).optional(),
    ));
    body.extend(build::typed_field(
        "fuel",
        4,
        0,
        5,
        build::enum_type(
            "FuelKind",
            Encoding::new(PrimitiveType::U8, e),
            &[
                ("Petrol", PrimitiveValue::U8(0)),
                ("Diesel", PrimitiveValue::U8(1)),
                ("Electric", PrimitiveValue::U8(2)),
            ],
        ),
    ));
    let mut figures = Vec::new();
    figures.extend(build::field(
        "speed",
        10,
        0,
        0,
        Encoding::new(PrimitiveType::U16, e),
    ));
    figures.extend(build::field(
        "mpg",
        11,
        0,
        2,
        Encoding::new(PrimitiveType::F64, e),
    ));
    body.extend(build::group("fuelFigures", 20, 0, 10, build::dimension(e), figures));
    body.extend(build::var_data(
        "make",
        30,
        0,
        Encoding::new(PrimitiveType::U16, e),
        Encoding::new(PrimitiveType::Char, e)
            .with_character_encoding(sbecodec::CharacterEncoding::Ascii),
    ));

    let ir = SchemaIr {
        id: 7,
        version: 1,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Car", 1, 6, body)],
    };
    Ok(ResolvedSchema::resolve(ir, UnknownEnumPolicy::Error)?)
}

fn main() -> Result<()> {
    let schema = car_schema()?;
    let mut buf = vec![0u8; 256];

    let mut enc = schema.encoder("Car")?;
    enc.wrap_and_apply_header(&mut buf, 0)?;
    enc.put("capacity", PrimitiveValue::U16(2000))?;
    enc.put("numCylinders", PrimitiveValue::U8(8))?;
    enc.put("maxRpm", PrimitiveValue::U16(9000))?;
    enc.put_enum("fuel", "Petrol")?;
    {
        let mut figures = enc.group("fuelFigures", 3)?;
        for (speed, mpg) in [(30u16, 35.9f64), (55, 49.0), (75, 40.0)] {
            figures.next()?;
            figures.put("speed", PrimitiveValue::U16(speed))?;
            figures.put("mpg", PrimitiveValue::F64(mpg))?;
        }
    }
    enc.put_var_str("make", "Honda")?;
    let total = schema.header.encoded_length + enc.encoded_length();
    buf.truncate(total);

    println!("encoded {} bytes", total);
    for msg in scan_frame(&schema, &buf)?.messages {
        println!(
            "frame: {} template={} bytes {}..{}",
            msg.name, msg.template_id, msg.byte_range.0, msg.byte_range.1
        );
    }

    let mut dec = schema.decoder("Car")?;
    dec.wrap_and_apply_header(&buf, 0)?;
    print!("{}", message_to_dump(&mut dec)?);
    Ok(())
}
