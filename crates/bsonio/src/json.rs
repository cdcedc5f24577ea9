//! Bson 与 serde_json 互转模块
//!
//! serde_json 的类型系统比 BSON 小,扩展类型转换为 Strict 方言的 `$` 包装对象。
//! 反方向把 JSON 值交给 JSON 读取器解析,因此识别的包装形式与文本输入完全一致。

use crate::document::Document;
use crate::value::Bson;
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Map, Number, Value as JsonValue};

/// 将 Bson 转换为 serde_json 值
///
/// # Brief
/// 基础类型映射为 JSON 原生类型,扩展类型使用 Strict 方言的包装对象
///
/// # 扩展 JSON 格式
/// - ObjectId: `{"$oid": "507f1f77bcf86cd799439011"}`
/// - DateTime: `{"$date": 1234567890000}`
/// - Regex: `{"$regex": "pattern", "$options": "i"}`
/// - Binary: `{"$binary": "base64", "$type": "00"}`
/// - 非有限浮点: `{"$numberDouble": "NaN"}`
/// - Int64: `{"$numberLong": "5"}`
///
/// 字段顺序与文档一致。JSON 对象不能表达重复名称,重复时只保留第一个,
/// 与 [`Document::get`] 的结果相同。
///
/// # Arguments
/// * `value` - 要转换的 Bson 值
pub fn to_json_value(value: &Bson) -> JsonValue {
    match value {
        Bson::Double(f) => match Number::from_f64(*f) {
            Some(n) => JsonValue::Number(n),
            None => json!({ "$numberDouble": non_finite_name(*f) }),
        },
        Bson::String(s) => JsonValue::String(s.to_string()),
        Bson::Document(doc) => document_to_json_value(doc),
        Bson::Array(arr) => JsonValue::Array(arr.iter().map(to_json_value).collect()),
        Bson::Binary(binary) => json!({
            "$binary": STANDARD.encode(&binary.bytes),
            "$type": format!("{:02x}", binary.subtype.0),
        }),
        Bson::Undefined => json!({ "$undefined": true }),
        Bson::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::DateTime(dt) => json!({ "$date": dt.timestamp_millis() }),
        Bson::Null => JsonValue::Null,
        Bson::RegularExpression(regex) => json!({
            "$regex": regex.pattern.as_str(),
            "$options": regex.options.as_str(),
        }),
        Bson::JavaScript(code) => json!({ "$code": code.as_str() }),
        Bson::Symbol(symbol) => json!({ "$symbol": symbol.as_str() }),
        Bson::JavaScriptWithScope(js) => json!({
            "$code": js.code.as_str(),
            "$scope": document_to_json_value(&js.scope),
        }),
        Bson::Int32(n) => JsonValue::Number((*n).into()),
        Bson::Timestamp(ts) => json!({
            "$timestamp": { "t": ts.seconds(), "i": ts.increment() }
        }),
        // 裸数字读回会变成 Int32 或 Double
        Bson::Int64(n) => json!({ "$numberLong": n.to_string() }),
        Bson::MinKey => json!({ "$minKey": 1 }),
        Bson::MaxKey => json!({ "$maxKey": 1 }),
    }
}

fn document_to_json_value(doc: &Document) -> JsonValue {
    let mut object = Map::new();
    for (name, value) in doc {
        if !object.contains_key(name) {
            object.insert(name.to_string(), to_json_value(value));
        }
    }
    JsonValue::Object(object)
}

fn non_finite_name(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f > 0.0 {
        "Infinity"
    } else {
        "-Infinity"
    }
}

/// 从 serde_json 值转换为 Bson
///
/// # Brief
/// 识别扩展 JSON 包装对象,规则与 JSON 读取器相同
///
/// # Arguments
/// * `value` - JSON 值
///
/// # Returns
/// 成功返回 Bson 值,包装对象不合法时返回错误
pub fn from_json_value(value: &JsonValue) -> BsonResult<Bson> {
    crate::codec::from_json(&value.to_string())
}

impl From<&Bson> for JsonValue {
    fn from(value: &Bson) -> Self {
        to_json_value(value)
    }
}

impl From<Bson> for JsonValue {
    fn from(value: Bson) -> Self {
        to_json_value(&value)
    }
}

impl TryFrom<JsonValue> for Bson {
    type Error = BsonError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        from_json_value(&value)
    }
}

impl TryFrom<JsonValue> for Document {
    type Error = BsonError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> {
        match from_json_value(&value)? {
            Bson::Document(doc) => Ok(doc),
            other => Err(BsonError::invalid_operation(format!(
                "Expected a JSON object but found {}",
                other.bson_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::BinarySubtype;
    use crate::value::{Binary, Regex};
    use crate::{bson, doc};
    use bsonio_common::{ObjectId, Timestamp};

    #[test]
    fn test_to_json_value() {
        let oid = ObjectId::from_hex("4d0ce088e447ad08b4721a37").unwrap();
        let doc = doc! {
            "id": oid,
            "n": 1,
            "big": 5_000_000_000i64,
            "small": 5i64,
            "bin": (Binary::new(BinarySubtype::GENERIC, vec![1u8])),
        };
        let value = to_json_value(&Bson::Document(doc));
        assert_eq!(
            value,
            json!({
                "id": { "$oid": "4d0ce088e447ad08b4721a37" },
                "n": 1,
                "big": { "$numberLong": "5000000000" },
                "small": { "$numberLong": "5" },
                "bin": { "$binary": "AQ==", "$type": "00" },
            })
        );
    }

    #[test]
    fn test_non_finite_double() {
        assert_eq!(
            to_json_value(&Bson::Double(f64::NEG_INFINITY)),
            json!({ "$numberDouble": "-Infinity" })
        );
        match from_json_value(&json!({ "$numberDouble": "NaN" })).unwrap() {
            Bson::Double(f) => assert!(f.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_round_trip_through_json_value() {
        let doc = doc! {
            "regex": (Regex::new("^a", "i")),
            "ts": (Timestamp::new(7, 9)),
            "arr": [1, "two", null],
            "nested": { "long": (i64::MAX), "min": (Bson::MinKey) },
        };
        let value = to_json_value(&Bson::Document(doc.clone()));
        let back = Document::try_from(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_field_order_survives() {
        let doc = doc! { "b": 1, "a": 2, "z": { "y": 1, "x": 2 } };
        let value = to_json_value(&Bson::Document(doc.clone()));
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "z"]);
        assert_eq!(Document::try_from(value).unwrap(), doc);
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let mut doc = Document::new();
        doc.push("x", 1);
        doc.push("y", 2);
        doc.push("x", 3);
        let value = to_json_value(&Bson::Document(doc));
        assert_eq!(value.to_string(), r#"{"x":1,"y":2}"#);
    }

    #[test]
    fn test_try_from_non_object() {
        assert!(Document::try_from(json!([1, 2])).is_err());
        assert_eq!(Bson::try_from(json!([1, 2])).unwrap(), bson!([1, 2]));
    }
}
