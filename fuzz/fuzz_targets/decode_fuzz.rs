//! Decode fuzz target: feed arbitrary bytes to the header decode + skip
//! path. The codec must not panic; short or corrupt input should come back
//! as Err(CodecError).
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn fuzz_schema() -> sbecodec::ResolvedSchema {
    use sbecodec::{
        build, Encoding, Endianness, PrimitiveType, ResolvedSchema, SchemaIr, UnknownEnumPolicy,
    };
    let e = Endianness::Little;
    let mut body = Vec::new();
    body.extend(build::field("a", 1, 0, 0, Encoding::new(PrimitiveType::U32, e)));
    body.extend(build::field("b", 2, 0, 4, Encoding::new(PrimitiveType::I16, e)));
    let mut inner = Vec::new();
    inner.extend(build::field("x", 10, 0, 0, Encoding::new(PrimitiveType::U64, e)));
    inner.extend(build::var_data(
        "note",
        11,
        0,
        Encoding::new(PrimitiveType::U8, e),
        Encoding::new(PrimitiveType::Char, e),
    ));
    body.extend(build::group("items", 20, 0, 8, build::dimension(e), inner));
    body.extend(build::var_data(
        "tail",
        30,
        0,
        Encoding::new(PrimitiveType::U16, e),
        Encoding::new(PrimitiveType::Char, e),
    ));
    let ir = SchemaIr {
        id: 1,
        version: 0,
        endianness: e,
        header: vec![],
        messages: vec![build::message("Fuzzed", 1, 6, body)],
    };
    ResolvedSchema::resolve(ir, UnknownEnumPolicy::Sentinel).expect("static schema resolves")
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let schema = fuzz_schema();
    let _ = sbecodec::scan_frame(&schema, data);
    let mut dec = match schema.decoder("Fuzzed") {
        Ok(d) => d,
        Err(_) => return,
    };
    if dec.wrap_and_apply_header(data, 0).is_ok() {
        let _ = dec.sbe_decoded_length();
        let _ = dec.get("a");
        let _ = dec.get_var_str("tail");
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
