//! BSON 值类型定义模块
//!
//! 每个 BsonType(除 EndOfDocument 外)对应 `Bson` 的一个变体,
//! 线上类型字节即判别式。字符串使用 `CompactString` 优化短字符串的内存占用。

use crate::document::Document;
use crate::spec::{BinarySubtype, BsonType};
use bsonio_common::{DateTime, JsonWriterSettings, ObjectId, Timestamp};
use compact_str::CompactString;
use std::fmt;

/// BSON 值的枚举类型
///
/// # 示例
///
/// ```rust,ignore
/// use bsonio::Bson;
///
/// let value = Bson::String("hello".into());
/// assert_eq!(value.bson_type(), bsonio::BsonType::String);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Bson {
    /// 64位浮点数
    Double(f64),
    /// UTF-8 字符串
    String(CompactString),
    /// 嵌套文档
    Document(Document),
    /// 数组,线上名称为 "0","1",...
    Array(Vec<Bson>),
    /// 二进制数据
    Binary(Binary),
    /// 已废弃的 undefined
    Undefined,
    /// 12字节的唯一对象标识符
    ObjectId(ObjectId),
    /// 布尔值
    Boolean(bool),
    /// 自 Unix 纪元起的毫秒数
    DateTime(DateTime),
    /// 空值
    Null,
    /// 正则表达式
    RegularExpression(Regex),
    /// JavaScript 代码
    JavaScript(CompactString),
    /// 符号
    Symbol(CompactString),
    /// 带作用域的 JavaScript 代码
    JavaScriptWithScope(JavaScriptWithScope),
    /// 32位有符号整数
    Int32(i32),
    /// 内部时间戳
    Timestamp(Timestamp),
    /// 64位有符号整数
    Int64(i64),
    /// 比任何值都小的哨兵
    MinKey,
    /// 比任何值都大的哨兵
    MaxKey,
}

/// 二进制数据和子类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: BinarySubtype,
    pub bytes: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: BinarySubtype, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

/// 正则表达式值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex {
    /// 正则表达式模式
    pub pattern: CompactString,
    /// 正则表达式选项,按字符排序
    pub options: CompactString,
}

impl Regex {
    /// 创建正则表达式,选项字符会被排序
    pub fn new(pattern: impl Into<CompactString>, options: &str) -> Self {
        let mut chars: Vec<char> = options.chars().collect();
        chars.sort_unstable();
        Self {
            pattern: pattern.into(),
            options: chars.into_iter().collect(),
        }
    }
}

/// 带作用域的 JavaScript 代码
#[derive(Debug, Clone, PartialEq)]
pub struct JavaScriptWithScope {
    pub code: CompactString,
    pub scope: Document,
}

impl Bson {
    /// 获取值对应的线上类型
    pub fn bson_type(&self) -> BsonType {
        match self {
            Bson::Double(_) => BsonType::Double,
            Bson::String(_) => BsonType::String,
            Bson::Document(_) => BsonType::Document,
            Bson::Array(_) => BsonType::Array,
            Bson::Binary(_) => BsonType::Binary,
            Bson::Undefined => BsonType::Undefined,
            Bson::ObjectId(_) => BsonType::ObjectId,
            Bson::Boolean(_) => BsonType::Boolean,
            Bson::DateTime(_) => BsonType::DateTime,
            Bson::Null => BsonType::Null,
            Bson::RegularExpression(_) => BsonType::RegularExpression,
            Bson::JavaScript(_) => BsonType::JavaScript,
            Bson::Symbol(_) => BsonType::Symbol,
            Bson::JavaScriptWithScope(_) => BsonType::JavaScriptWithScope,
            Bson::Int32(_) => BsonType::Int32,
            Bson::Timestamp(_) => BsonType::Timestamp,
            Bson::Int64(_) => BsonType::Int64,
            Bson::MinKey => BsonType::MinKey,
            Bson::MaxKey => BsonType::MaxKey,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Bson::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Bson::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Bson::Int32(n) => Some(*n),
            _ => None,
        }
    }

    /// 获取 64 位整数,Int32 会被加宽
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Bson::Int32(n) => Some(*n as i64),
            Bson::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Bson::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bson::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Bson>> {
        match self {
            Bson::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Bson::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Bson::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime> {
        match self {
            Bson::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// 以 JSON 文本表示
    ///
    /// # Arguments
    /// * `settings` - 输出方言与缩进
    pub fn to_json_string(&self, settings: &JsonWriterSettings) -> String {
        match crate::codec::to_json(self, settings) {
            Ok(text) => text,
            Err(e) => format!("<invalid: {}>", e),
        }
    }
}

impl Default for Bson {
    fn default() -> Self {
        Bson::Null
    }
}

impl fmt::Display for Bson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json_string(&JsonWriterSettings::default()))
    }
}

// ============================================================================
// From 特征实现 - 支持从各种 Rust 类型转换为 Bson
// ============================================================================

impl From<bool> for Bson {
    fn from(v: bool) -> Self {
        Bson::Boolean(v)
    }
}

impl From<i32> for Bson {
    fn from(v: i32) -> Self {
        Bson::Int32(v)
    }
}

impl From<i64> for Bson {
    fn from(v: i64) -> Self {
        Bson::Int64(v)
    }
}

impl From<f64> for Bson {
    fn from(v: f64) -> Self {
        Bson::Double(v)
    }
}

impl From<&str> for Bson {
    fn from(v: &str) -> Self {
        Bson::String(CompactString::from(v))
    }
}

impl From<String> for Bson {
    fn from(v: String) -> Self {
        Bson::String(CompactString::from(v))
    }
}

impl From<CompactString> for Bson {
    fn from(v: CompactString) -> Self {
        Bson::String(v)
    }
}

impl From<Binary> for Bson {
    fn from(v: Binary) -> Self {
        Bson::Binary(v)
    }
}

impl From<ObjectId> for Bson {
    fn from(v: ObjectId) -> Self {
        Bson::ObjectId(v)
    }
}

impl From<DateTime> for Bson {
    fn from(v: DateTime) -> Self {
        Bson::DateTime(v)
    }
}

impl From<Timestamp> for Bson {
    fn from(v: Timestamp) -> Self {
        Bson::Timestamp(v)
    }
}

impl From<Regex> for Bson {
    fn from(v: Regex) -> Self {
        Bson::RegularExpression(v)
    }
}

impl From<JavaScriptWithScope> for Bson {
    fn from(v: JavaScriptWithScope) -> Self {
        Bson::JavaScriptWithScope(v)
    }
}

impl From<Document> for Bson {
    fn from(v: Document) -> Self {
        Bson::Document(v)
    }
}

impl From<uuid::Uuid> for Bson {
    fn from(v: uuid::Uuid) -> Self {
        Bson::Binary(Binary::new(BinarySubtype::UUID, v.as_bytes().to_vec()))
    }
}

impl<T: Into<Bson>> From<Vec<T>> for Bson {
    fn from(v: Vec<T>) -> Self {
        Bson::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Bson>> From<Option<T>> for Bson {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Bson::Null,
        }
    }
}

/// 构造 Bson 值的宏
///
/// 负数需要加括号,例如 `bson!((-1))`。
#[macro_export]
macro_rules! bson {
    (null) => {
        $crate::Bson::Null
    };
    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Bson::Array(vec![ $($crate::bson!($elem)),* ])
    };
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::Bson::Document($crate::doc! { $($key : $value),* })
    };
    ($e:expr) => {
        $crate::Bson::from($e)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_bson_type() {
        assert_eq!(Bson::from(1).bson_type(), BsonType::Int32);
        assert_eq!(Bson::from(1i64).bson_type(), BsonType::Int64);
        assert_eq!(Bson::from("a").bson_type(), BsonType::String);
        assert_eq!(Bson::MinKey.bson_type(), BsonType::MinKey);
        assert_eq!(bson!([1, 2]).bson_type(), BsonType::Array);
    }

    #[test]
    fn test_regex_options_sorted() {
        let regex = Regex::new("a", "xmi");
        assert_eq!(regex.options, "imx");
    }

    #[test]
    fn test_bson_macro() {
        let value = bson!({ "a": [1, null, "x"], "b": { "c": true } });
        let doc = value.as_document().unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Bson::Array(vec![Bson::Int32(1), Bson::Null, Bson::from("x")]))
        );
        assert_eq!(doc.get("b"), Some(&Bson::Document(doc! { "c": true })));
        assert_eq!(bson!((-1)), Bson::Int32(-1));
    }

    #[test]
    fn test_display_uses_shell_syntax() {
        assert_eq!(Bson::Int64(5).to_string(), "NumberLong(5)");
        assert_eq!(bson!([1, 2]).to_string(), "[1, 2]");
        assert_eq!(Bson::Double(1.0).to_string(), "1.0");
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = uuid::Uuid::nil();
        match Bson::from(uuid) {
            Bson::Binary(binary) => {
                assert_eq!(binary.subtype, BinarySubtype::UUID);
                assert_eq!(binary.bytes.len(), 16);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
