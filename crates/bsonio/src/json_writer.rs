//! JSON 写入器
//!
//! 与二进制写入器共享 [`BsonWriter`] 接口,输出 Strict、Shell、TenGen 三种方言。
//! 扩展类型在 Strict 下写成 `$` 包装对象,在 Shell/TenGen 下写成构造函数调用。
//!
//! 排版规则:
//! - 空文档 `{ }`,非空文档 `{ "a" : 1, "b" : 2 }`
//! - 数组始终单行 `[1, 2]`
//! - 开启缩进时文档的每个元素独占一行,按嵌套层级缩进

use crate::spec::BinarySubtype;
use crate::state::{ContextType, WriterState};
use crate::writer::{check_state, BsonWriter};
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bsonio_common::{DateTime, JsonOutputMode, JsonWriterSettings, ObjectId, Timestamp};
use smallvec::SmallVec;
use std::fmt::Write as _;

#[derive(Debug, Clone)]
struct JsonWriterFrame {
    context_type: ContextType,
    /// 本层元素的缩进
    indentation: String,
    has_elements: bool,
}

/// JSON 文本写入器
pub struct JsonWriter {
    output: String,
    settings: JsonWriterSettings,
    state: WriterState,
    frames: SmallVec<[JsonWriterFrame; 8]>,
    name: Option<String>,
}

impl JsonWriter {
    pub fn new(settings: JsonWriterSettings) -> Self {
        Self {
            output: String::new(),
            settings,
            state: WriterState::Initial,
            frames: SmallVec::new(),
            name: None,
        }
    }

    pub fn settings(&self) -> &JsonWriterSettings {
        &self.settings
    }

    /// 已写出的文本
    pub fn as_str(&self) -> &str {
        &self.output
    }

    /// 取出文本,要求所有容器都已关闭
    pub fn into_string(self) -> BsonResult<String> {
        if !self.frames.is_empty() {
            return Err(BsonError::invalid_operation(format!(
                "JsonWriter still has {} open container(s)",
                self.frames.len()
            )));
        }
        Ok(self.output)
    }

    fn context_type(&self) -> ContextType {
        self.frames
            .last()
            .map(|frame| frame.context_type)
            .unwrap_or(ContextType::TopLevel)
    }

    fn next_state(&self) -> WriterState {
        match self.context_type() {
            ContextType::Array => WriterState::Value,
            ContextType::TopLevel => WriterState::Done,
            _ => WriterState::Name,
        }
    }

    fn parent_indentation(&self) -> &str {
        self.frames
            .last()
            .map(|frame| frame.indentation.as_str())
            .unwrap_or("")
    }

    fn is_shell(&self) -> bool {
        self.settings.output_mode != JsonOutputMode::Strict
    }

    /// 写值之前的分隔符、换行缩进以及元素名
    fn begin_value(&mut self, method: &str) -> BsonResult<()> {
        check_state(
            method,
            self.state,
            &[WriterState::Initial, WriterState::Done, WriterState::Value],
        )?;
        if self.state == WriterState::Done {
            self.output.push_str(&self.settings.new_line_chars);
        }
        let indent = self.settings.indent;
        let Some(frame) = self.frames.last_mut() else {
            return Ok(());
        };
        match frame.context_type {
            ContextType::Array => {
                if frame.has_elements {
                    self.output.push_str(", ");
                }
            }
            ContextType::Document | ContextType::ScopeDocument => {
                if frame.has_elements {
                    self.output.push(',');
                }
                if indent {
                    self.output.push_str(&self.settings.new_line_chars);
                    self.output.push_str(&frame.indentation);
                } else {
                    self.output.push(' ');
                }
                let name = self.name.take().ok_or_else(|| {
                    BsonError::invalid_operation(format!("{} called before WriteName", method))
                })?;
                write_string_literal(&mut self.output, &name);
                self.output.push_str(" : ");
            }
            ContextType::JavaScriptWithScope | ContextType::TopLevel => {}
        }
        frame.has_elements = true;
        Ok(())
    }

    fn end_value(&mut self) {
        self.state = self.next_state();
    }

    fn push_frame(&mut self, context_type: ContextType) -> BsonResult<()> {
        let depth = self
            .frames
            .iter()
            .filter(|frame| frame.context_type != ContextType::JavaScriptWithScope)
            .count();
        if depth >= self.settings.max_serialization_depth {
            return Err(BsonError::NestingTooDeep(
                self.settings.max_serialization_depth,
            ));
        }
        let indentation = format!("{}{}", self.parent_indentation(), self.settings.indent_chars);
        self.frames.push(JsonWriterFrame {
            context_type,
            indentation,
            has_elements: false,
        });
        Ok(())
    }

    fn write_scalar(&mut self, method: &str, text: &str) -> BsonResult<()> {
        self.begin_value(method)?;
        self.output.push_str(text);
        self.end_value();
        Ok(())
    }

    /// 写入 `{ "$key" : value }` 形式的单键包装
    fn write_wrapper(&mut self, method: &str, key: &str, value: &str) -> BsonResult<()> {
        let text = format!("{{ \"{}\" : {} }}", key, value);
        self.write_scalar(method, &text)
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new(JsonWriterSettings::default())
    }
}

impl BsonWriter for JsonWriter {
    fn state(&self) -> WriterState {
        self.state
    }

    fn write_name(&mut self, name: &str) -> BsonResult<()> {
        check_state("WriteName", self.state, &[WriterState::Name])?;
        self.name = Some(name.to_string());
        self.state = WriterState::Value;
        Ok(())
    }

    fn write_start_document(&mut self) -> BsonResult<()> {
        let context_type = if self.state == WriterState::ScopeDocument {
            ContextType::ScopeDocument
        } else {
            self.begin_value("WriteStartDocument")?;
            ContextType::Document
        };
        self.push_frame(context_type)?;
        self.output.push('{');
        self.state = WriterState::Name;
        Ok(())
    }

    fn write_end_document(&mut self) -> BsonResult<()> {
        check_state("WriteEndDocument", self.state, &[WriterState::Name])?;
        let context_type = self.context_type();
        if !context_type.has_names() {
            return Err(BsonError::invalid_operation(format!(
                "WriteEndDocument cannot be called when ContextType is {:?}",
                context_type
            )));
        }
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| BsonError::invalid_operation("No open document to close"))?;
        if frame.has_elements && self.settings.indent {
            let indentation = self.parent_indentation().to_string();
            self.output.push_str(&self.settings.new_line_chars);
            self.output.push_str(&indentation);
            self.output.push('}');
        } else {
            self.output.push_str(" }");
        }
        if frame.context_type == ContextType::ScopeDocument {
            self.frames.pop();
            self.output.push_str(" }");
        }
        self.end_value();
        Ok(())
    }

    fn write_start_array(&mut self) -> BsonResult<()> {
        self.begin_value("WriteStartArray")?;
        self.push_frame(ContextType::Array)?;
        self.output.push('[');
        self.state = WriterState::Value;
        Ok(())
    }

    fn write_end_array(&mut self) -> BsonResult<()> {
        check_state("WriteEndArray", self.state, &[WriterState::Value])?;
        if self.context_type() != ContextType::Array {
            return Err(BsonError::invalid_operation(format!(
                "WriteEndArray cannot be called when ContextType is {:?}",
                self.context_type()
            )));
        }
        self.frames.pop();
        self.output.push(']');
        self.end_value();
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> BsonResult<()> {
        self.write_scalar("WriteDouble", &format_double(value))
    }

    fn write_string(&mut self, value: &str) -> BsonResult<()> {
        let mut text = String::with_capacity(value.len() + 2);
        write_string_literal(&mut text, value);
        self.write_scalar("WriteString", &text)
    }

    fn write_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> BsonResult<()> {
        let encoded = STANDARD.encode(bytes);
        if !self.is_shell() {
            let text = format!(
                "{{ \"$binary\" : \"{}\", \"$type\" : \"{:02x}\" }}",
                encoded, subtype.0
            );
            return self.write_scalar("WriteBinaryData", &text);
        }
        let text = match uuid::Uuid::from_slice(bytes) {
            Ok(uuid) if subtype == BinarySubtype::UUID => format!("UUID(\"{}\")", uuid),
            _ => format!("new BinData({}, \"{}\")", subtype.0, encoded),
        };
        self.write_scalar("WriteBinaryData", &text)
    }

    fn write_undefined(&mut self) -> BsonResult<()> {
        if self.is_shell() {
            self.write_scalar("WriteUndefined", "undefined")
        } else {
            self.write_wrapper("WriteUndefined", "$undefined", "true")
        }
    }

    fn write_object_id(&mut self, value: ObjectId) -> BsonResult<()> {
        if self.is_shell() {
            self.write_scalar("WriteObjectId", &format!("ObjectId(\"{}\")", value.to_hex()))
        } else {
            self.write_wrapper("WriteObjectId", "$oid", &format!("\"{}\"", value.to_hex()))
        }
    }

    fn write_boolean(&mut self, value: bool) -> BsonResult<()> {
        self.write_scalar("WriteBoolean", if value { "true" } else { "false" })
    }

    fn write_date_time(&mut self, value: DateTime) -> BsonResult<()> {
        let millis = value.timestamp_millis();
        let text = match self.settings.output_mode {
            JsonOutputMode::Strict => format!("{{ \"$date\" : {} }}", millis),
            JsonOutputMode::Shell => match value.to_iso_string() {
                Some(iso) => format!("ISODate(\"{}\")", iso),
                None => format!("new Date({})", millis),
            },
            JsonOutputMode::TenGen => format!("new Date({})", millis),
        };
        self.write_scalar("WriteDateTime", &text)
    }

    fn write_null(&mut self) -> BsonResult<()> {
        self.write_scalar("WriteNull", "null")
    }

    fn write_regular_expression(&mut self, pattern: &str, options: &str) -> BsonResult<()> {
        if self.is_shell() {
            let escaped = if pattern.is_empty() {
                "(?:)".to_string()
            } else {
                pattern.replace('/', "\\/")
            };
            return self.write_scalar("WriteRegularExpression", &format!("/{}/{}", escaped, options));
        }
        let mut text = String::from("{ \"$regex\" : ");
        write_string_literal(&mut text, pattern);
        text.push_str(", \"$options\" : ");
        write_string_literal(&mut text, options);
        text.push_str(" }");
        self.write_scalar("WriteRegularExpression", &text)
    }

    fn write_javascript(&mut self, code: &str) -> BsonResult<()> {
        let mut literal = String::new();
        write_string_literal(&mut literal, code);
        self.write_wrapper("WriteJavaScript", "$code", &literal)
    }

    fn write_symbol(&mut self, value: &str) -> BsonResult<()> {
        let mut literal = String::new();
        write_string_literal(&mut literal, value);
        self.write_wrapper("WriteSymbol", "$symbol", &literal)
    }

    fn write_javascript_with_scope(&mut self, code: &str) -> BsonResult<()> {
        self.begin_value("WriteJavaScriptWithScope")?;
        self.output.push_str("{ \"$code\" : ");
        write_string_literal(&mut self.output, code);
        self.output.push_str(", \"$scope\" : ");
        let indentation = self.parent_indentation().to_string();
        self.frames.push(JsonWriterFrame {
            context_type: ContextType::JavaScriptWithScope,
            indentation,
            has_elements: false,
        });
        self.state = WriterState::ScopeDocument;
        Ok(())
    }

    fn write_int32(&mut self, value: i32) -> BsonResult<()> {
        self.write_scalar("WriteInt32", &value.to_string())
    }

    fn write_timestamp(&mut self, value: Timestamp) -> BsonResult<()> {
        let text = if self.is_shell() {
            format!("Timestamp({}, {})", value.seconds(), value.increment())
        } else {
            format!(
                "{{ \"$timestamp\" : {{ \"t\" : {}, \"i\" : {} }} }}",
                value.seconds(),
                value.increment()
            )
        };
        self.write_scalar("WriteTimestamp", &text)
    }

    fn write_int64(&mut self, value: i64) -> BsonResult<()> {
        let text = if self.is_shell() {
            if i32::try_from(value).is_ok() {
                format!("NumberLong({})", value)
            } else {
                format!("NumberLong(\"{}\")", value)
            }
        } else {
            // Strict 下所有 Int64 都包装
            format!("{{ \"$numberLong\" : \"{}\" }}", value)
        };
        self.write_scalar("WriteInt64", &text)
    }

    fn write_min_key(&mut self) -> BsonResult<()> {
        if self.is_shell() {
            self.write_scalar("WriteMinKey", "MinKey")
        } else {
            self.write_wrapper("WriteMinKey", "$minKey", "1")
        }
    }

    fn write_max_key(&mut self) -> BsonResult<()> {
        if self.is_shell() {
            self.write_scalar("WriteMaxKey", "MaxKey")
        } else {
            self.write_wrapper("WriteMaxKey", "$maxKey", "1")
        }
    }

    fn close(&mut self) -> BsonResult<()> {
        self.state = WriterState::Closed;
        Ok(())
    }
}

/// 写出带引号并转义的字符串
pub(crate) fn write_string_literal(out: &mut String, value: &str) {
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' | '\u{2029}' | '\u{FEFF}' => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// 浮点数的往返格式
///
/// # Brief
/// 先用 15 位有效数字,读回不相等时改用 17 位。结果总带小数点或指数,
/// 保证重新解析后仍是浮点数。非有限值写成裸的 `NaN`/`Infinity`/`-Infinity`。
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let mut text = format_general(value, 15);
    if text.parse::<f64>().ok() != Some(value) {
        text = format_general(value, 17);
    }
    if !text.contains('.') && !text.contains('E') {
        text.push_str(".0");
    }
    text
}

/// 按有效数字位数格式化,指数在 (-5, precision) 内用定点表示,否则用 `d.dddE+XX`
fn format_general(value: f64, precision: usize) -> String {
    let scientific = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some(parts) => parts,
        None => return scientific,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let all_digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    let trimmed = all_digits.trim_end_matches('0');
    let digits = if trimmed.is_empty() { "0" } else { trimmed };

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if exponent > -5 && exponent < precision as i32 {
        if exponent >= 0 {
            let int_len = exponent as usize + 1;
            if digits.len() <= int_len {
                out.push_str(digits);
                out.extend(std::iter::repeat('0').take(int_len - digits.len()));
            } else {
                out.push_str(&digits[..int_len]);
                out.push('.');
                out.push_str(&digits[int_len..]);
            }
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take((-exponent - 1) as usize));
            out.push_str(digits);
        }
    } else {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        let _ = write!(out, "E{}{:02}", sign, exponent.abs());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bson, doc, Bson};

    fn render(value: &Bson, mode: JsonOutputMode) -> String {
        let mut writer = JsonWriter::new(JsonWriterSettings::new(mode));
        writer.write_value(value).unwrap();
        writer.into_string().unwrap()
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(0.0), "0.0");
        assert_eq!(format_double(-0.0), "-0.0");
        assert_eq!(format_double(1.0), "1.0");
        assert_eq!(format_double(1.5), "1.5");
        assert_eq!(format_double(-123.456), "-123.456");
        assert_eq!(format_double(0.1), "0.1");
        assert_eq!(format_double(0.0001), "0.0001");
        assert_eq!(format_double(0.00001), "1E-05");
        assert_eq!(format_double(1e15), "1E+15");
        assert_eq!(format_double(123456789012345.0), "123456789012345.0");
        assert_eq!(format_double(f64::MAX), "1.7976931348623157E+308");
        assert_eq!(format_double(f64::MIN_POSITIVE * f64::EPSILON), "4.94065645841247E-324");
        assert_eq!(format_double(f64::NAN), "NaN");
        assert_eq!(format_double(f64::INFINITY), "Infinity");
        assert_eq!(format_double(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_double_round_trips() {
        for value in [0.1 + 0.2, 1.0 / 3.0, 2.5e-300, 6.02214076e23, -9.87654321e-7] {
            assert_eq!(format_double(value).parse::<f64>().unwrap(), value);
        }
    }

    #[test]
    fn test_string_escapes() {
        let mut out = String::new();
        write_string_literal(&mut out, "a\"b\\c\u{8}\u{c}\n\r\t\u{1}\u{2028}é");
        assert_eq!(out, r#""a\"b\\c\b\f\n\r\t\u0001\u2028é""#);
    }

    #[test]
    fn test_document_layout() {
        assert_eq!(render(&bson!({}), JsonOutputMode::Shell), "{ }");
        assert_eq!(
            render(&bson!({ "a": 1, "b": [1, 2], "c": {} }), JsonOutputMode::Shell),
            r#"{ "a" : 1, "b" : [1, 2], "c" : { } }"#
        );
        assert_eq!(render(&bson!([]), JsonOutputMode::Shell), "[]");
    }

    #[test]
    fn test_indented_layout() {
        let settings = JsonWriterSettings::new(JsonOutputMode::Shell).indented(true);
        let mut writer = JsonWriter::new(settings);
        writer
            .write_document(&doc! { "a": 1, "b": { "c": [1, 2] }, "d": {} })
            .unwrap();
        assert_eq!(
            writer.into_string().unwrap(),
            "{\r\n  \"a\" : 1,\r\n  \"b\" : {\r\n    \"c\" : [1, 2]\r\n  },\r\n  \"d\" : { }\r\n}"
        );
    }

    #[test]
    fn test_int64_modes() {
        let cases = [
            (0i64, "NumberLong(0)", r#"{ "$numberLong" : "0" }"#),
            (2147483647, "NumberLong(2147483647)", r#"{ "$numberLong" : "2147483647" }"#),
            (2147483648, r#"NumberLong("2147483648")"#, r#"{ "$numberLong" : "2147483648" }"#),
            (-2147483648, "NumberLong(-2147483648)", r#"{ "$numberLong" : "-2147483648" }"#),
            (-2147483649, r#"NumberLong("-2147483649")"#, r#"{ "$numberLong" : "-2147483649" }"#),
            (
                9007199254740992,
                r#"NumberLong("9007199254740992")"#,
                r#"{ "$numberLong" : "9007199254740992" }"#,
            ),
            (
                i64::MAX,
                r#"NumberLong("9223372036854775807")"#,
                r#"{ "$numberLong" : "9223372036854775807" }"#,
            ),
        ];
        for (value, shell, strict) in cases {
            assert_eq!(render(&Bson::Int64(value), JsonOutputMode::Shell), shell);
            assert_eq!(render(&Bson::Int64(value), JsonOutputMode::TenGen), shell);
            assert_eq!(render(&Bson::Int64(value), JsonOutputMode::Strict), strict);
        }
    }

    #[test]
    fn test_date_time_modes() {
        let value = Bson::DateTime(DateTime::from_millis(1_356_998_399_500));
        assert_eq!(render(&value, JsonOutputMode::Strict), r#"{ "$date" : 1356998399500 }"#);
        assert_eq!(
            render(&value, JsonOutputMode::Shell),
            r#"ISODate("2012-12-31T23:59:59.5Z")"#
        );
        assert_eq!(render(&value, JsonOutputMode::TenGen), "new Date(1356998399500)");
        let far = Bson::DateTime(DateTime::MIN);
        assert_eq!(
            render(&far, JsonOutputMode::Shell),
            format!("new Date({})", i64::MIN)
        );
    }

    #[test]
    fn test_extension_types() {
        let oid = ObjectId::from_hex("4d0ce088e447ad08b4721a37").unwrap();
        assert_eq!(
            render(&Bson::ObjectId(oid), JsonOutputMode::Shell),
            r#"ObjectId("4d0ce088e447ad08b4721a37")"#
        );
        assert_eq!(
            render(&Bson::ObjectId(oid), JsonOutputMode::Strict),
            r#"{ "$oid" : "4d0ce088e447ad08b4721a37" }"#
        );
        let binary = Bson::Binary(crate::Binary::new(BinarySubtype::GENERIC, vec![1u8, 2, 3]));
        assert_eq!(render(&binary, JsonOutputMode::Shell), r#"new BinData(0, "AQID")"#);
        assert_eq!(
            render(&binary, JsonOutputMode::Strict),
            r#"{ "$binary" : "AQID", "$type" : "00" }"#
        );
        let ts = Bson::Timestamp(Timestamp::new(1, 2));
        assert_eq!(render(&ts, JsonOutputMode::Shell), "Timestamp(1, 2)");
        assert_eq!(
            render(&ts, JsonOutputMode::Strict),
            r#"{ "$timestamp" : { "t" : 1, "i" : 2 } }"#
        );
        assert_eq!(render(&Bson::MinKey, JsonOutputMode::Shell), "MinKey");
        assert_eq!(render(&Bson::MaxKey, JsonOutputMode::Strict), r#"{ "$maxKey" : 1 }"#);
        assert_eq!(render(&Bson::Undefined, JsonOutputMode::Shell), "undefined");
        assert_eq!(
            render(&Bson::Symbol("s".into()), JsonOutputMode::Shell),
            r#"{ "$symbol" : "s" }"#
        );
    }

    #[test]
    fn test_uuid_binary() {
        let uuid = uuid::Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let value = Bson::from(uuid);
        assert_eq!(
            render(&value, JsonOutputMode::Shell),
            r#"UUID("01020304-0506-0708-090a-0b0c0d0e0f10")"#
        );
        assert_eq!(
            render(&value, JsonOutputMode::Strict),
            r#"{ "$binary" : "AQIDBAUGBwgJCgsMDQ4PEA==", "$type" : "04" }"#
        );
    }

    #[test]
    fn test_regex_shell_escaping() {
        let value = Bson::RegularExpression(crate::Regex::new("a/b", "mi"));
        assert_eq!(render(&value, JsonOutputMode::Shell), r"/a\/b/im");
        let empty = Bson::RegularExpression(crate::Regex::new("", ""));
        assert_eq!(render(&empty, JsonOutputMode::Shell), "/(?:)/");
        assert_eq!(
            render(&value, JsonOutputMode::Strict),
            r#"{ "$regex" : "a/b", "$options" : "im" }"#
        );
    }

    #[test]
    fn test_javascript_with_scope() {
        let value = Bson::JavaScriptWithScope(crate::JavaScriptWithScope {
            code: "x".into(),
            scope: doc! { "x": 1 },
        });
        assert_eq!(
            render(&bson!({ "f": value }), JsonOutputMode::Shell),
            r#"{ "f" : { "$code" : "x", "$scope" : { "x" : 1 } } }"#
        );
    }

    #[test]
    fn test_multiple_top_level_values() {
        let mut writer = JsonWriter::default();
        writer.write_document(&doc! { "x": 1 }).unwrap();
        writer.write_document(&doc! { "x": 2 }).unwrap();
        assert_eq!(writer.into_string().unwrap(), "{ \"x\" : 1 }\r\n{ \"x\" : 2 }");
    }

    #[test]
    fn test_state_violations() {
        let mut writer = JsonWriter::default();
        writer.write_start_document().unwrap();
        assert!(matches!(writer.write_int32(1), Err(BsonError::InvalidOperation(_))));
        assert!(writer.write_end_array().is_err());
        writer.write_end_document().unwrap();
        assert!(writer.write_end_document().is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let mut settings = JsonWriterSettings::default();
        settings.max_serialization_depth = 2;
        let mut writer = JsonWriter::new(settings);
        writer.write_start_document().unwrap();
        writer.write_name("a").unwrap();
        writer.write_start_array().unwrap();
        assert!(matches!(
            writer.write_start_document(),
            Err(BsonError::NestingTooDeep(2))
        ));
    }
}
