//! JSON 方言场景
//!
//! 同一逻辑值在 Strict、Shell、TenGen 下只有字面语法不同,任何一种方言读回后
//! 得到相同的内存值;数值格式化必须逐字符精确。

use bsonio::{
    bson_to_json, doc, from_json, json_to_bson, to_bson_bytes, to_json, Binary, BinarySubtype,
    Bson, DateTime, Document, JavaScriptWithScope, JsonOutputMode, JsonWriterSettings, ObjectId,
    Regex, Timestamp,
};

const MODES: [JsonOutputMode; 3] = [
    JsonOutputMode::Strict,
    JsonOutputMode::Shell,
    JsonOutputMode::TenGen,
];

fn render(value: &Bson, mode: JsonOutputMode) -> String {
    to_json(value, &JsonWriterSettings::new(mode)).unwrap()
}

fn all_types() -> Document {
    let uuid = uuid::Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
    doc! {
        "_id": (ObjectId::from_hex("4d0ce088e447ad08b4721a37").unwrap()),
        "zero": 0.0,
        "half": 0.5,
        "big": 1e300,
        "tiny": (f64::from_bits(1)),
        "inf": (f64::INFINITY),
        "ninf": (f64::NEG_INFINITY),
        "string": "quote \" slash \\ tab \t line\u{2028}sep 中文",
        "nested": { "array": [1, [], {}, [null, true]] },
        "binary": (Binary::new(BinarySubtype::GENERIC, vec![1u8, 2, 3])),
        "old": (Binary::new(BinarySubtype::BINARY_OLD, vec![4u8, 5])),
        "uuid": uuid,
        "undefined": (Bson::Undefined),
        "bool": false,
        "date": (DateTime::from_millis(1_356_998_399_500)),
        "epoch": (DateTime::from_millis(0)),
        "far": (DateTime::MIN),
        "null": null,
        "regex": (Regex::new("a/b", "mi")),
        "empty_regex": (Regex::new("", "")),
        "code": (Bson::JavaScript("function() { return 1; }".into())),
        "symbol": (Bson::Symbol("sym".into())),
        "scope": (JavaScriptWithScope { code: "f(x)".into(), scope: doc! { "x": { "y": 1 } } }),
        "int32": (i32::MIN),
        "timestamp": (Timestamp::new(1_700_000_000, 7)),
        "small_long": 5i64,
        "int32_max_long": 2147483647i64,
        "wide_long": 2147483648i64,
        "safe_long": 9007199254740991i64,
        "unsafe_long": 9007199254740992i64,
        "max_long": (i64::MAX),
        "min_long": (i64::MIN),
        "min": (Bson::MinKey),
        "max": (Bson::MaxKey),
    }
}

#[test]
fn test_every_dialect_reads_back_identically() {
    let value = Bson::Document(all_types());
    for mode in MODES {
        let text = render(&value, mode);
        assert_eq!(from_json(&text).unwrap(), value, "{:?}: {}", mode, text);
    }
}

#[test]
fn test_indented_output_reads_back_identically() {
    let value = Bson::Document(all_types());
    for mode in MODES {
        let settings = JsonWriterSettings::new(mode).indented(true);
        let text = to_json(&value, &settings).unwrap();
        assert!(text.contains("\r\n  \"_id\""));
        assert_eq!(from_json(&text).unwrap(), value, "{:?}", mode);
    }
}

#[test]
fn test_binary_bytes_survive_every_dialect() {
    let bytes = to_bson_bytes(&all_types()).unwrap();
    for mode in MODES {
        let text = bson_to_json(&bytes, &JsonWriterSettings::new(mode)).unwrap();
        assert_eq!(json_to_bson(&text).unwrap(), bytes, "{:?}", mode);
    }
}

#[test]
fn test_dialects_differ_only_in_literal_syntax() {
    let value = Bson::Document(doc! { "a": 1, "b": "two", "c": [3.5, true, null] });
    let outputs: Vec<String> = MODES.iter().map(|mode| render(&value, *mode)).collect();
    assert!(outputs.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(outputs[0], r#"{ "a" : 1, "b" : "two", "c" : [3.5, true, null] }"#);
}

#[test]
fn test_handwritten_dialects_agree() {
    let strict = r#"{
        "_id" : { "$oid" : "4d0ce088e447ad08b4721a37" },
        "n" : { "$numberLong" : "5" },
        "d" : { "$date" : 1356998399500 },
        "b" : { "$type" : "00", "$binary" : "AQID" },
        "r" : { "$regex" : "a/b", "$options" : "im" },
        "t" : { "$timestamp" : { "t" : 1, "i" : 2 } },
        "u" : { "$undefined" : true },
        "lo" : { "$minKey" : 1 }
    }"#;
    let shell = r#"{
        _id : ObjectId("4d0ce088e447ad08b4721a37"),
        n : NumberLong(5),
        d : ISODate("2012-12-31T23:59:59.5Z"),
        b : new BinData(0, "AQID"),
        r : /a\/b/mi,
        t : Timestamp(1, 2),
        u : undefined,
        lo : MinKey
    }"#;
    let tengen = r#"{
        '_id' : ObjectId('4d0ce088e447ad08b4721a37'),
        'n' : NumberLong("5"),
        'd' : new Date(1356998399500),
        'b' : BinData(0, 'AQID'),
        'r' : /a\/b/im,
        't' : Timestamp(1, 2),
        'u' : undefined,
        'lo' : MinKey()
    }"#;
    let expected = from_json(strict).unwrap();
    assert_eq!(from_json(shell).unwrap(), expected);
    assert_eq!(from_json(tengen).unwrap(), expected);
    assert_eq!(
        expected.as_document().and_then(|d| d.get("n")),
        Some(&Bson::Int64(5))
    );
}

#[test]
fn test_double_formatting_exactness() {
    let cases = [
        (0.0, "0.0"),
        (-0.0, "-0.0"),
        (1.0, "1.0"),
        (0.1, "0.1"),
        (1.5e300, "1.5E+300"),
        (f64::from_bits(1), "4.94065645841247E-324"),
        (f64::MAX, "1.7976931348623157E+308"),
        (f64::INFINITY, "Infinity"),
        (f64::NEG_INFINITY, "-Infinity"),
        (f64::NAN, "NaN"),
    ];
    for (value, expected) in cases {
        for mode in MODES {
            assert_eq!(render(&Bson::Double(value), mode), expected, "{:?}", mode);
        }
    }
    assert!(from_json("NaN").unwrap().as_f64().unwrap().is_nan());
}

#[test]
fn test_number_long_int32_boundary() {
    assert_eq!(render(&Bson::Int64(2147483647), JsonOutputMode::Shell), "NumberLong(2147483647)");
    assert_eq!(
        render(&Bson::Int64(2147483648), JsonOutputMode::Shell),
        r#"NumberLong("2147483648")"#
    );
    assert_eq!(render(&Bson::Int64(-2147483648), JsonOutputMode::Shell), "NumberLong(-2147483648)");
    assert_eq!(
        render(&Bson::Int64(-2147483649), JsonOutputMode::Shell),
        r#"NumberLong("-2147483649")"#
    );
    for text in ["NumberLong(2147483647)", r#"NumberLong("2147483648")"#, "2147483648"] {
        assert!(matches!(from_json(text).unwrap(), Bson::Int64(_)), "{}", text);
    }
    assert_eq!(from_json("2147483647").unwrap(), Bson::Int32(2147483647));
}

#[test]
fn test_strict_int64_keeps_its_type() {
    let cases = [
        (2147483648i64, r#"{ "$numberLong" : "2147483648" }"#),
        (-2147483648, r#"{ "$numberLong" : "-2147483648" }"#),
        (-2147483649, r#"{ "$numberLong" : "-2147483649" }"#),
        (9007199254740992, r#"{ "$numberLong" : "9007199254740992" }"#),
        (-9007199254740992, r#"{ "$numberLong" : "-9007199254740992" }"#),
    ];
    for (value, expected) in cases {
        let text = render(&Bson::Int64(value), JsonOutputMode::Strict);
        assert_eq!(text, expected);
        assert_eq!(from_json(&text).unwrap(), Bson::Int64(value), "{}", text);
    }
    for value in [0i64, 5, 2147483647, 9007199254740991, i64::MIN] {
        let text = render(&Bson::Int64(value), JsonOutputMode::Strict);
        assert!(text.starts_with(r#"{ "$numberLong" : ""#), "{}", text);
        assert_eq!(from_json(&text).unwrap(), Bson::Int64(value), "{}", text);
    }
}
