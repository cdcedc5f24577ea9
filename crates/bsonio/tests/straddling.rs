//! 跨块边界的编解码场景
//!
//! 用填充字符串把后续元素推到 16 KiB 块边界附近,让边界依次落在类型字节、
//! 名称、长度前缀和值载荷的每一个字节上,解码再编码后必须逐字节一致。

use bsonio::{
    doc, from_bson_bytes, to_bson_bytes, Binary, BinaryReaderSettings, BinarySubtype,
    BinaryWriterSettings, Bson, BsonBinaryReader, BsonBinaryWriter, BsonReader, BsonWriter,
    ChunkedBuffer, DateTime, Document, JavaScriptWithScope, ObjectId, Regex, Timestamp,
};
use proptest::prelude::*;

const CHUNK: usize = 16 * 1024;

/// `{ "x" : <pad> }` 的前缀字节数:长度 4 + 类型 1 + "x\0" 2 + 字符串长度 4 + NUL 1
const PREFIX: usize = 12;

fn padded(pad_len: usize, name: &str, value: Bson) -> Document {
    let mut document = Document::new();
    document.push("x", "x".repeat(pad_len));
    document.push(name, value);
    document
}

fn element_len(name: &str, value: &Bson) -> usize {
    let mut single = Document::new();
    single.push(name, value.clone());
    // 去掉文档长度和结尾 NUL
    to_bson_bytes(&single).unwrap().len() - 5
}

/// 让元素起点依次位于边界前 0..=len 字节处
fn assert_straddles(name: &str, value: Bson) {
    let len = element_len(name, &value);
    for shift in 0..=len {
        let pad_len = CHUNK - shift - PREFIX;
        let document = padded(pad_len, name, value.clone());
        let bytes = to_bson_bytes(&document).unwrap();
        assert_eq!(bytes[PREFIX + pad_len - 1], 0, "padding terminator");

        let decoded = from_bson_bytes(&bytes).unwrap();
        assert_eq!(decoded.get(name), Some(&value), "{} shifted by {}", name, shift);
        assert_eq!(to_bson_bytes(&decoded).unwrap(), bytes, "{} shifted by {}", name, shift);
    }
}

#[test]
fn test_end_to_end_name_straddles_boundary() {
    let document = doc! { "x": ("x".repeat(16368)), "yyyyyyyy": 1 };
    let bytes = to_bson_bytes(&document).unwrap();
    // 类型字节在 16380,名称跨越 16384
    assert_eq!(bytes[16380], 0x10);
    assert_eq!(&bytes[16381..16389], b"yyyyyyyy");
    assert_eq!(to_bson_bytes(&from_bson_bytes(&bytes).unwrap()).unwrap(), bytes);
}

#[test]
fn test_straddle_name() {
    assert_straddles("a_rather_long_element_name", Bson::Int32(7));
}

#[test]
fn test_straddle_double() {
    assert_straddles("d", Bson::Double(std::f64::consts::PI));
}

#[test]
fn test_straddle_int32() {
    assert_straddles("i", Bson::Int32(-123_456_789));
}

#[test]
fn test_straddle_int64() {
    assert_straddles("l", Bson::Int64(0x0102_0304_0506_0708));
}

#[test]
fn test_straddle_date_time() {
    assert_straddles("dt", Bson::DateTime(DateTime::from_millis(1_356_998_399_500)));
}

#[test]
fn test_straddle_timestamp() {
    assert_straddles("ts", Bson::Timestamp(Timestamp::new(1_700_000_000, 42)));
}

#[test]
fn test_straddle_object_id() {
    let id = ObjectId::from_bytes([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    assert_straddles("_id", Bson::ObjectId(id));
}

#[test]
fn test_straddle_string() {
    assert_straddles("s", Bson::String("straddled string value".into()));
    assert_straddles("u", Bson::String("多字节字符跨越边界".into()));
}

#[test]
fn test_straddle_symbol() {
    assert_straddles("sym", Bson::Symbol("symbol".into()));
}

#[test]
fn test_straddle_javascript() {
    assert_straddles("js", Bson::JavaScript("function() { return 1; }".into()));
}

#[test]
fn test_straddle_javascript_with_scope() {
    let js = JavaScriptWithScope {
        code: "function() { return x; }".into(),
        scope: doc! { "x": 1 },
    };
    assert_straddles("jsws", Bson::JavaScriptWithScope(js));
}

#[test]
fn test_straddle_binary() {
    assert_straddles("bin", Bson::Binary(Binary::new(BinarySubtype::GENERIC, vec![1u8; 20])));
    assert_straddles("old", Bson::Binary(Binary::new(BinarySubtype::BINARY_OLD, vec![2u8; 9])));
    assert_straddles("uuid", Bson::Binary(Binary::new(BinarySubtype::UUID, [3u8; 16])));
}

#[test]
fn test_straddle_regular_expression() {
    assert_straddles("re", Bson::RegularExpression(Regex::new("^a.*b$", "mi")));
}

#[test]
fn test_straddle_document_and_array_lengths() {
    assert_straddles("doc", Bson::Document(doc! { "a": 1, "b": "c" }));
    assert_straddles("arr", Bson::Array(vec![Bson::Int32(1), Bson::Boolean(true), Bson::Null]));
}

#[test]
fn test_straddle_valueless_types() {
    for (name, value) in [
        ("undefined", Bson::Undefined),
        ("null", Bson::Null),
        ("min", Bson::MinKey),
        ("max", Bson::MaxKey),
        ("bool", Bson::Boolean(true)),
    ] {
        assert_straddles(name, value);
    }
}

fn everything() -> Document {
    doc! {
        "double": 1.5,
        "string": "value",
        "document": { "nested": [1, 2, { "deep": "yes" }] },
        "binary": (Binary::new(BinarySubtype::USER_DEFINED, vec![9u8; 33])),
        "undefined": (Bson::Undefined),
        "oid": (ObjectId::from_bytes([7u8; 12])),
        "bool": false,
        "date": (DateTime::from_millis(-1)),
        "null": null,
        "regex": (Regex::new("a/b", "x")),
        "code": (Bson::JavaScript("f()".into())),
        "symbol": (Bson::Symbol("s".into())),
        "scope": (JavaScriptWithScope { code: "g()".into(), scope: doc! { "y": [true] } }),
        "int32": 32,
        "timestamp": (Timestamp::new(5, 6)),
        "int64": 64i64,
        "min": (Bson::MinKey),
        "max": (Bson::MaxKey),
    }
}

fn write_with_chunk_size(document: &Document, chunk_size: usize) -> ChunkedBuffer {
    let settings = BinaryWriterSettings {
        chunk_size,
        ..BinaryWriterSettings::default()
    };
    let mut writer = BsonBinaryWriter::new(settings);
    writer.write_document(document).unwrap();
    writer.into_buffer().unwrap()
}

proptest! {
    #[test]
    fn prop_chunk_size_independence(chunk_size in 1usize..96) {
        let document = everything();
        let reference = to_bson_bytes(&document).unwrap();

        let buffer = write_with_chunk_size(&document, chunk_size);
        prop_assert_eq!(buffer.to_vec(), reference.clone());

        // 写入器交出的缓冲区直接交给读取器
        let settings = BinaryReaderSettings {
            chunk_size,
            ..BinaryReaderSettings::default()
        };
        let mut reader = BsonBinaryReader::new(buffer, settings.clone());
        prop_assert_eq!(reader.read_document().unwrap(), document.clone());

        let mut reader = BsonBinaryReader::from_slice(&reference, settings);
        prop_assert_eq!(reader.read_document().unwrap(), document);
    }

    #[test]
    fn prop_string_round_trip_any_chunk(s in "\\PC{0,64}", chunk_size in 1usize..32) {
        let document = doc! { "s": (s.as_str()) };
        let buffer = write_with_chunk_size(&document, chunk_size);
        let settings = BinaryReaderSettings {
            chunk_size,
            ..BinaryReaderSettings::default()
        };
        let mut reader = BsonBinaryReader::new(buffer, settings);
        prop_assert_eq!(reader.read_document().unwrap(), document);
    }
}
