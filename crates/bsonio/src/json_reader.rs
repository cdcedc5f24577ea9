//! JSON 读取器
//!
//! 在 [`JsonScanner`] 的词法单元流上实现 [`BsonReader`]。`read_bson_type` 一次解析完
//! 整个标量(包括 `$` 包装对象和 shell 构造函数),值暂存在读取器里,
//! 随后的 `read_xxx` 只做类型检查并取出。容器只消费开括号,元素在后续调用中逐个读取。
//!
//! 输入方言自动识别:Strict 包装对象、Shell/TenGen 构造函数、正则字面量可以混用。

use crate::json_scanner::{JsonScanner, JsonToken, SpannedToken};
use crate::reader::{check_bson_type, check_state, needs_type, BsonReader};
use crate::spec::{BinarySubtype, BsonType};
use crate::state::{ContextType, ReaderState};
use crate::value::{Binary, Bson, Regex};
use crate::{BsonError, BsonResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bsonio_common::{DateTime, ObjectId, Timestamp};
use serde_json::{Map, Number, Value as JsonValue};
use smallvec::SmallVec;
use std::io::Read;
use tracing::trace;

/// 作为包装对象首键时触发扩展 JSON 解析的键
const WRAPPER_KEYS: &[&str] = &[
    "$oid",
    "$date",
    "$binary",
    "$type",
    "$regex",
    "$options",
    "$code",
    "$scope",
    "$symbol",
    "$timestamp",
    "$maxKey",
    "$maxkey",
    "$minKey",
    "$minkey",
    "$undefined",
    "$numberLong",
    "$numberDouble",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JsonReaderFrame {
    context_type: ContextType,
    /// 数组内下一个元素的下标
    index: usize,
    /// 作用域写在 `$code` 之前时,读完作用域后跳回的偏移
    scope_end: Option<usize>,
}

/// JSON 读取器书签
#[derive(Debug, Clone, PartialEq)]
pub struct JsonReaderBookmark {
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    current_value: Option<Bson>,
    frames: SmallVec<[JsonReaderFrame; 8]>,
    pushed_token: Option<SpannedToken>,
    pending_scope_end: Option<usize>,
    position: usize,
}

/// JSON 文本读取器
pub struct JsonReader {
    scanner: JsonScanner,
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    current_value: Option<Bson>,
    frames: SmallVec<[JsonReaderFrame; 8]>,
    pushed_token: Option<SpannedToken>,
    /// 已解析但尚未读取的 `$scope` 在前的 JavaScriptWithScope 的结尾偏移
    pending_scope_end: Option<usize>,
}

impl JsonReader {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            scanner: JsonScanner::new(source),
            state: ReaderState::Initial,
            current_bson_type: None,
            current_name: None,
            current_value: None,
            frames: SmallVec::new(),
            pushed_token: None,
            pending_scope_end: None,
        }
    }

    /// 从字节源读入全部文本
    pub fn from_reader<R: Read>(reader: &mut R) -> BsonResult<Self> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        Ok(Self::new(source))
    }

    /// 要求输入已经耗尽,否则在多余内容处报语法错误
    pub fn expect_end_of_input(&mut self) -> BsonResult<()> {
        self.expect(JsonToken::EndOfFile).map(|_| ())
    }

    fn context_type(&self) -> ContextType {
        self.frames
            .last()
            .map(|frame| frame.context_type)
            .unwrap_or(ContextType::TopLevel)
    }

    fn next_state(&self) -> ReaderState {
        match self.context_type() {
            ContextType::TopLevel => ReaderState::Done,
            _ => ReaderState::Type,
        }
    }

    fn pop_token(&mut self) -> BsonResult<SpannedToken> {
        match self.pushed_token.take() {
            Some(token) => Ok(token),
            None => self.scanner.next_token(),
        }
    }

    fn push_token(&mut self, token: SpannedToken) {
        self.pushed_token = Some(token);
    }

    fn error_at(&self, token: &SpannedToken, message: impl Into<String>) -> BsonError {
        self.scanner.error_at(token.span.start, message)
    }

    fn unexpected(&self, token: &SpannedToken, expected: &str) -> BsonError {
        self.error_at(
            token,
            format!("Expected {} but found '{}'", expected, token.token),
        )
    }

    fn expect(&mut self, expected: JsonToken) -> BsonResult<SpannedToken> {
        let token = self.pop_token()?;
        if token.token != expected {
            return Err(self.unexpected(&token, &format!("'{}'", expected)));
        }
        Ok(token)
    }

    fn expect_name(&mut self) -> BsonResult<String> {
        let token = self.pop_token()?;
        match token.token {
            JsonToken::String(name) | JsonToken::UnquotedString(name) => Ok(name),
            _ => Err(self.unexpected(&token, "a name")),
        }
    }

    fn verify_bson_type(&mut self, method: &str, expected: BsonType) -> BsonResult<()> {
        if needs_type(self.state) {
            self.read_bson_type()?;
        }
        check_bson_type(method, self.state, self.current_bson_type, expected)
    }

    /// 校验类型后取出 `read_bson_type` 暂存的值
    fn read_scalar<T>(
        &mut self,
        method: &str,
        expected: BsonType,
        extract: impl FnOnce(Bson) -> Option<T>,
    ) -> BsonResult<T> {
        self.verify_bson_type(method, expected)?;
        let value = self
            .current_value
            .take()
            .and_then(extract)
            .ok_or_else(|| BsonError::invalid_operation(format!("{} has no value to read", method)))?;
        self.state = self.next_state();
        Ok(value)
    }

    /// 跳过一个已消费开括号的容器
    fn skip_container(&mut self) -> BsonResult<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.pop_token()?;
            match token.token {
                JsonToken::BeginObject | JsonToken::BeginArray => depth += 1,
                JsonToken::EndObject | JsonToken::EndArray => depth -= 1,
                JsonToken::EndOfFile => {
                    return Err(self.error_at(&token, "Unexpected end of input"))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// 解析一个值的开头
    ///
    /// # Returns
    /// 值的类型和标量值;文档与数组只消费开括号,值为 None
    fn parse_value(&mut self, token: SpannedToken) -> BsonResult<(BsonType, Option<Bson>)> {
        self.pending_scope_end = None;
        let value = match token.token {
            JsonToken::BeginObject => return self.parse_document_start(),
            JsonToken::BeginArray => return Ok((BsonType::Array, None)),
            JsonToken::String(s) => Bson::String(s.into()),
            JsonToken::Integer(n) => match i32::try_from(n) {
                Ok(v) => Bson::Int32(v),
                Err(_) => Bson::Int64(n),
            },
            JsonToken::FloatingPoint(f) => Bson::Double(f),
            JsonToken::Boolean(b) => Bson::Boolean(b),
            JsonToken::Null => Bson::Null,
            JsonToken::RegularExpression(regex) => Bson::RegularExpression(regex),
            JsonToken::UnquotedString(ref ident) => {
                let ident = ident.clone();
                self.parse_keyword(&ident, &token)?
            }
            JsonToken::EndOfFile => return Err(self.error_at(&token, "Unexpected end of input")),
            _ => return Err(self.unexpected(&token, "a value")),
        };
        Ok((value.bson_type(), Some(value)))
    }

    /// `{` 之后:首键是已知的 `$` 键时按包装对象解析,否则是普通文档
    fn parse_document_start(&mut self) -> BsonResult<(BsonType, Option<Bson>)> {
        let token = self.pop_token()?;
        let head = match &token.token {
            JsonToken::String(name) | JsonToken::UnquotedString(name)
                if WRAPPER_KEYS.contains(&name.as_str()) =>
            {
                Some(name.clone())
            }
            _ => None,
        };
        let Some(head) = head else {
            self.push_token(token);
            return Ok((BsonType::Document, None));
        };
        trace!(key = %head, "extended JSON wrapper");
        match head.as_str() {
            "$code" => return self.parse_code_wrapper(),
            "$scope" => return self.parse_scope_first_wrapper(),
            _ => {}
        }
        self.expect(JsonToken::Colon)?;
        let mut fields = Map::new();
        let first = self.parse_plain_value()?;
        fields.insert(head.clone(), first);
        loop {
            let token = self.pop_token()?;
            match token.token {
                JsonToken::EndObject => break,
                JsonToken::Comma => {
                    let name = self.expect_name()?;
                    self.expect(JsonToken::Colon)?;
                    let value = self.parse_plain_value()?;
                    fields.insert(name, value);
                }
                _ => return Err(self.unexpected(&token, "',' or '}'")),
            }
        }
        let value = wrapper_to_bson(&head, &fields)?;
        Ok((value.bson_type(), Some(value)))
    }

    /// `{ "$code" : "..." }` 或 `{ "$code" : "...", "$scope" : { ... } }`
    ///
    /// 带作用域时停在作用域文档之前,作用域由调用方流式读取
    fn parse_code_wrapper(&mut self) -> BsonResult<(BsonType, Option<Bson>)> {
        self.expect(JsonToken::Colon)?;
        let token = self.pop_token()?;
        let code = match token.token {
            JsonToken::String(code) => code,
            _ => {
                return Err(BsonError::InvalidExtendedJson {
                    key: "$code".into(),
                    message: "expected a string".into(),
                })
            }
        };
        let token = self.pop_token()?;
        match token.token {
            JsonToken::EndObject => Ok((BsonType::JavaScript, Some(Bson::JavaScript(code.into())))),
            JsonToken::Comma => {
                let name = self.expect_name()?;
                if name != "$scope" {
                    return Err(BsonError::InvalidExtendedJson {
                        key: name,
                        message: "unexpected key in $code wrapper".into(),
                    });
                }
                self.expect(JsonToken::Colon)?;
                Ok((
                    BsonType::JavaScriptWithScope,
                    Some(Bson::JavaScript(code.into())),
                ))
            }
            _ => Err(self.unexpected(&token, "',' or '}'")),
        }
    }

    /// `{ "$scope" : { ... }, "$code" : "..." }`
    ///
    /// 先越过作用域取得代码,再把扫描器拨回作用域开头,作用域仍按流式读取。
    /// 作用域读完后从记录的结尾偏移继续。
    fn parse_scope_first_wrapper(&mut self) -> BsonResult<(BsonType, Option<Bson>)> {
        self.expect(JsonToken::Colon)?;
        let scope_start = self.expect(JsonToken::BeginObject)?.span.start;
        self.skip_container()?;
        self.expect(JsonToken::Comma)?;
        let name = self.expect_name()?;
        if name != "$code" {
            return Err(invalid_wrapper(&name, "unexpected key in $scope wrapper"));
        }
        self.expect(JsonToken::Colon)?;
        let token = self.pop_token()?;
        let code = match token.token {
            JsonToken::String(code) => code,
            _ => return Err(invalid_wrapper("$code", "expected a string")),
        };
        let end = self.expect(JsonToken::EndObject)?.span.end;
        self.pending_scope_end = Some(end);
        self.scanner.set_position(scope_start);
        Ok((
            BsonType::JavaScriptWithScope,
            Some(Bson::JavaScript(code.into())),
        ))
    }

    /// 跳到 `$scope` 在前的包装对象结尾
    fn jump_to(&mut self, position: usize) {
        self.pushed_token = None;
        self.scanner.set_position(position);
    }

    /// 包装对象内部的普通 JSON 值
    fn parse_plain_value(&mut self) -> BsonResult<JsonValue> {
        let token = self.pop_token()?;
        match token.token {
            JsonToken::String(s) => Ok(JsonValue::String(s)),
            JsonToken::Integer(n) => Ok(JsonValue::from(n)),
            JsonToken::FloatingPoint(f) => match Number::from_f64(f) {
                Some(n) => Ok(JsonValue::Number(n)),
                None => Err(self.error_at(&token, "Non-finite number inside a wrapper")),
            },
            JsonToken::Boolean(b) => Ok(JsonValue::Bool(b)),
            JsonToken::Null => Ok(JsonValue::Null),
            JsonToken::BeginObject => {
                let mut map = Map::new();
                loop {
                    let token = self.pop_token()?;
                    match token.token {
                        JsonToken::EndObject => return Ok(JsonValue::Object(map)),
                        JsonToken::Comma => continue,
                        JsonToken::String(name) | JsonToken::UnquotedString(name) => {
                            self.expect(JsonToken::Colon)?;
                            let value = self.parse_plain_value()?;
                            map.insert(name, value);
                        }
                        _ => return Err(self.unexpected(&token, "a name")),
                    }
                }
            }
            _ => Err(self.unexpected(&token, "a JSON value")),
        }
    }

    /// 未加引号的标识符:shell 字面量和构造函数
    fn parse_keyword(&mut self, ident: &str, token: &SpannedToken) -> BsonResult<Bson> {
        match ident {
            "Infinity" => Ok(Bson::Double(f64::INFINITY)),
            "NaN" => Ok(Bson::Double(f64::NAN)),
            "undefined" => Ok(Bson::Undefined),
            "MinKey" | "MaxKey" => {
                let next = self.pop_token()?;
                if next.token == JsonToken::LeftParen {
                    self.expect(JsonToken::RightParen)?;
                } else {
                    self.push_token(next);
                }
                Ok(if ident == "MinKey" { Bson::MinKey } else { Bson::MaxKey })
            }
            "new" => {
                let next = self.pop_token()?;
                match next.token {
                    JsonToken::UnquotedString(ref name) => {
                        let name = name.clone();
                        self.parse_constructor(&name, &next)
                    }
                    _ => Err(self.unexpected(&next, "a constructor name")),
                }
            }
            _ => self.parse_constructor(ident, token),
        }
    }

    /// 构造函数的参数表,参数只能是字符串或数字
    fn constructor_args(&mut self) -> BsonResult<Vec<JsonToken>> {
        self.expect(JsonToken::LeftParen)?;
        let mut args = Vec::new();
        let mut token = self.pop_token()?;
        if token.token == JsonToken::RightParen {
            return Ok(args);
        }
        loop {
            match token.token {
                JsonToken::String(_) | JsonToken::Integer(_) | JsonToken::FloatingPoint(_) => {
                    args.push(token.token)
                }
                _ => return Err(self.unexpected(&token, "a constructor argument")),
            }
            let separator = self.pop_token()?;
            match separator.token {
                JsonToken::Comma => token = self.pop_token()?,
                JsonToken::RightParen => return Ok(args),
                _ => return Err(self.unexpected(&separator, "',' or ')'")),
            }
        }
    }

    fn parse_constructor(&mut self, name: &str, token: &SpannedToken) -> BsonResult<Bson> {
        const CONSTRUCTORS: &[&str] = &[
            "ObjectId",
            "ISODate",
            "Date",
            "NumberLong",
            "NumberInt",
            "BinData",
            "HexData",
            "UUID",
            "Timestamp",
        ];
        if !CONSTRUCTORS.contains(&name) {
            return Err(self.error_at(token, format!("Invalid JSON token '{}'", name)));
        }
        let args = self.constructor_args()?;
        let invalid = |reader: &Self, message: String| reader.error_at(token, message);
        let value = match (name, args.as_slice()) {
            ("ObjectId", [JsonToken::String(hex)]) => {
                Bson::ObjectId(ObjectId::from_hex(hex).map_err(|e| invalid(self, e.to_string()))?)
            }
            ("ISODate", [JsonToken::String(iso)]) | ("Date", [JsonToken::String(iso)]) => {
                Bson::DateTime(DateTime::parse_iso(iso).map_err(|e| invalid(self, e.to_string()))?)
            }
            ("Date", [JsonToken::Integer(ms)]) => Bson::DateTime(DateTime::from_millis(*ms)),
            ("Date", [JsonToken::FloatingPoint(ms)]) => {
                Bson::DateTime(DateTime::from_millis(*ms as i64))
            }
            ("Date", []) => Bson::DateTime(DateTime::now()),
            ("NumberLong", [JsonToken::Integer(n)]) => Bson::Int64(*n),
            ("NumberLong", [JsonToken::String(s)]) => Bson::Int64(
                s.parse()
                    .map_err(|_| invalid(self, format!("Invalid NumberLong '{}'", s)))?,
            ),
            ("NumberInt", [JsonToken::Integer(n)]) => Bson::Int32(
                i32::try_from(*n)
                    .map_err(|_| invalid(self, format!("NumberInt {} out of range", n)))?,
            ),
            ("NumberInt", [JsonToken::String(s)]) => Bson::Int32(
                s.parse()
                    .map_err(|_| invalid(self, format!("Invalid NumberInt '{}'", s)))?,
            ),
            ("BinData", [JsonToken::Integer(subtype), JsonToken::String(b64)]) => {
                let subtype = u8::try_from(*subtype)
                    .map_err(|_| invalid(self, format!("Invalid subtype {}", subtype)))?;
                let bytes = STANDARD
                    .decode(b64)
                    .map_err(|e| invalid(self, format!("Invalid base64: {}", e)))?;
                Bson::Binary(Binary::new(BinarySubtype(subtype), bytes))
            }
            ("HexData", [JsonToken::Integer(subtype), JsonToken::String(text)]) => {
                let subtype = u8::try_from(*subtype)
                    .map_err(|_| invalid(self, format!("Invalid subtype {}", subtype)))?;
                let bytes = hex::decode(text)
                    .map_err(|e| invalid(self, format!("Invalid hex: {}", e)))?;
                Bson::Binary(Binary::new(BinarySubtype(subtype), bytes))
            }
            ("UUID", [JsonToken::String(text)]) => {
                let uuid = uuid::Uuid::parse_str(text)
                    .map_err(|e| invalid(self, format!("Invalid UUID: {}", e)))?;
                Bson::from(uuid)
            }
            ("Timestamp", [JsonToken::Integer(seconds), JsonToken::Integer(increment)]) => {
                let seconds = u32::try_from(*seconds)
                    .map_err(|_| invalid(self, "Timestamp seconds out of range".into()))?;
                let increment = u32::try_from(*increment)
                    .map_err(|_| invalid(self, "Timestamp increment out of range".into()))?;
                Bson::Timestamp(Timestamp::new(seconds, increment))
            }
            _ => return Err(invalid(self, format!("Invalid arguments for {}", name))),
        };
        Ok(value)
    }
}

impl BsonReader for JsonReader {
    type Bookmark = JsonReaderBookmark;

    fn state(&self) -> ReaderState {
        self.state
    }

    fn current_bson_type(&self) -> Option<BsonType> {
        self.current_bson_type
    }

    fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    fn is_at_end_of_file(&mut self) -> BsonResult<bool> {
        if !matches!(self.state, ReaderState::Initial | ReaderState::Done) {
            return Ok(false);
        }
        let token = self.pop_token()?;
        let at_end = token.token == JsonToken::EndOfFile;
        self.push_token(token);
        Ok(at_end)
    }

    fn read_bson_type(&mut self) -> BsonResult<BsonType> {
        match self.state {
            ReaderState::Initial | ReaderState::Done => {
                let token = self.pop_token()?;
                let (bson_type, value) = self.parse_value(token)?;
                self.current_name = None;
                self.current_value = value;
                self.current_bson_type = Some(bson_type);
                self.state = ReaderState::Value;
                return Ok(bson_type);
            }
            ReaderState::ScopeDocument => {
                self.expect(JsonToken::BeginObject)?;
                self.current_value = None;
                self.current_bson_type = Some(BsonType::Document);
                self.state = ReaderState::Value;
                return Ok(BsonType::Document);
            }
            _ => check_state("ReadBsonType", self.state, &[ReaderState::Type])?,
        }

        let mut token = self.pop_token()?;
        if token.token == JsonToken::Comma {
            token = self.pop_token()?;
        }
        let context_type = self.context_type();
        if context_type == ContextType::Array {
            if token.token == JsonToken::EndArray {
                self.current_bson_type = Some(BsonType::EndOfDocument);
                self.state = ReaderState::EndOfArray;
                return Ok(BsonType::EndOfDocument);
            }
            let (bson_type, value) = self.parse_value(token)?;
            if let Some(frame) = self.frames.last_mut() {
                self.current_name = Some(frame.index.to_string());
                frame.index += 1;
            }
            self.current_value = value;
            self.current_bson_type = Some(bson_type);
            self.state = ReaderState::Value;
            return Ok(bson_type);
        }

        let name = match token.token {
            JsonToken::EndObject => {
                self.current_bson_type = Some(BsonType::EndOfDocument);
                self.state = ReaderState::EndOfDocument;
                return Ok(BsonType::EndOfDocument);
            }
            JsonToken::String(ref name) | JsonToken::UnquotedString(ref name) => name.clone(),
            _ => return Err(self.unexpected(&token, "a name")),
        };
        self.expect(JsonToken::Colon)?;
        let token = self.pop_token()?;
        let (bson_type, value) = self.parse_value(token)?;
        self.current_name = Some(name);
        self.current_value = value;
        self.current_bson_type = Some(bson_type);
        self.state = ReaderState::Name;
        Ok(bson_type)
    }

    fn read_name(&mut self) -> BsonResult<String> {
        check_state("ReadName", self.state, &[ReaderState::Name])?;
        self.state = ReaderState::Value;
        self.current_name
            .clone()
            .ok_or_else(|| BsonError::invalid_operation("ReadName without a current name"))
    }

    fn skip_name(&mut self) -> BsonResult<()> {
        check_state("SkipName", self.state, &[ReaderState::Name])?;
        self.state = ReaderState::Value;
        Ok(())
    }

    fn skip_value(&mut self) -> BsonResult<()> {
        check_state("SkipValue", self.state, &[ReaderState::Value])?;
        match self.current_bson_type {
            Some(BsonType::Document) | Some(BsonType::Array) => self.skip_container()?,
            Some(BsonType::JavaScriptWithScope) => match self.pending_scope_end.take() {
                Some(end) => self.jump_to(end),
                None => {
                    self.expect(JsonToken::BeginObject)?;
                    self.skip_container()?;
                    self.expect(JsonToken::EndObject)?;
                }
            },
            _ => {}
        }
        self.current_value = None;
        self.state = self.next_state();
        Ok(())
    }

    fn read_start_document(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadStartDocument", BsonType::Document)?;
        let context_type = if self.context_type() == ContextType::JavaScriptWithScope {
            ContextType::ScopeDocument
        } else {
            ContextType::Document
        };
        self.frames.push(JsonReaderFrame {
            context_type,
            index: 0,
            scope_end: None,
        });
        self.state = ReaderState::Type;
        Ok(())
    }

    fn read_end_document(&mut self) -> BsonResult<()> {
        let context_type = self.context_type();
        if !context_type.has_names() {
            return Err(BsonError::invalid_operation(format!(
                "ReadEndDocument cannot be called when ContextType is {:?}",
                context_type
            )));
        }
        check_state("ReadEndDocument", self.state, &[ReaderState::EndOfDocument])?;
        self.frames.pop();
        if context_type == ContextType::ScopeDocument {
            // 关闭 `{ "$code" : ..., "$scope" : ... }` 外层
            match self.frames.pop().and_then(|frame| frame.scope_end) {
                Some(end) => self.jump_to(end),
                None => {
                    self.expect(JsonToken::EndObject)?;
                }
            }
        }
        self.state = self.next_state();
        Ok(())
    }

    fn read_start_array(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadStartArray", BsonType::Array)?;
        self.frames.push(JsonReaderFrame {
            context_type: ContextType::Array,
            index: 0,
            scope_end: None,
        });
        self.state = ReaderState::Type;
        Ok(())
    }

    fn read_end_array(&mut self) -> BsonResult<()> {
        if self.context_type() != ContextType::Array {
            return Err(BsonError::invalid_operation(format!(
                "ReadEndArray cannot be called when ContextType is {:?}",
                self.context_type()
            )));
        }
        check_state("ReadEndArray", self.state, &[ReaderState::EndOfArray])?;
        self.frames.pop();
        self.state = self.next_state();
        Ok(())
    }

    fn read_double(&mut self) -> BsonResult<f64> {
        self.read_scalar("ReadDouble", BsonType::Double, |v| match v {
            Bson::Double(v) => Some(v),
            _ => None,
        })
    }

    fn read_string(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadString", BsonType::String, |v| match v {
            Bson::String(v) => Some(v.into()),
            _ => None,
        })
    }

    fn read_binary(&mut self) -> BsonResult<Binary> {
        self.read_scalar("ReadBinaryData", BsonType::Binary, |v| match v {
            Bson::Binary(v) => Some(v),
            _ => None,
        })
    }

    fn read_undefined(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadUndefined", BsonType::Undefined, |_| Some(()))
    }

    fn read_object_id(&mut self) -> BsonResult<ObjectId> {
        self.read_scalar("ReadObjectId", BsonType::ObjectId, |v| v.as_object_id())
    }

    fn read_boolean(&mut self) -> BsonResult<bool> {
        self.read_scalar("ReadBoolean", BsonType::Boolean, |v| v.as_bool())
    }

    fn read_date_time(&mut self) -> BsonResult<DateTime> {
        self.read_scalar("ReadDateTime", BsonType::DateTime, |v| v.as_datetime())
    }

    fn read_null(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadNull", BsonType::Null, |_| Some(()))
    }

    fn read_regular_expression(&mut self) -> BsonResult<Regex> {
        self.read_scalar("ReadRegularExpression", BsonType::RegularExpression, |v| match v {
            Bson::RegularExpression(v) => Some(v),
            _ => None,
        })
    }

    fn read_javascript(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadJavaScript", BsonType::JavaScript, |v| match v {
            Bson::JavaScript(v) => Some(v.into()),
            _ => None,
        })
    }

    fn read_symbol(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadSymbol", BsonType::Symbol, |v| match v {
            Bson::Symbol(v) => Some(v.into()),
            _ => None,
        })
    }

    fn read_javascript_with_scope(&mut self) -> BsonResult<String> {
        let code = self.read_scalar(
            "ReadJavaScriptWithScope",
            BsonType::JavaScriptWithScope,
            |v| match v {
                Bson::JavaScript(v) => Some(String::from(v)),
                _ => None,
            },
        )?;
        let scope_end = self.pending_scope_end.take();
        self.frames.push(JsonReaderFrame {
            context_type: ContextType::JavaScriptWithScope,
            index: 0,
            scope_end,
        });
        self.state = ReaderState::ScopeDocument;
        Ok(code)
    }

    fn read_int32(&mut self) -> BsonResult<i32> {
        self.read_scalar("ReadInt32", BsonType::Int32, |v| match v {
            Bson::Int32(v) => Some(v),
            _ => None,
        })
    }

    fn read_timestamp(&mut self) -> BsonResult<Timestamp> {
        self.read_scalar("ReadTimestamp", BsonType::Timestamp, |v| match v {
            Bson::Timestamp(v) => Some(v),
            _ => None,
        })
    }

    fn read_int64(&mut self) -> BsonResult<i64> {
        self.read_scalar("ReadInt64", BsonType::Int64, |v| match v {
            Bson::Int64(v) => Some(v),
            _ => None,
        })
    }

    fn read_min_key(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadMinKey", BsonType::MinKey, |_| Some(()))
    }

    fn read_max_key(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadMaxKey", BsonType::MaxKey, |_| Some(()))
    }

    fn get_bookmark(&self) -> JsonReaderBookmark {
        JsonReaderBookmark {
            state: self.state,
            current_bson_type: self.current_bson_type,
            current_name: self.current_name.clone(),
            current_value: self.current_value.clone(),
            frames: self.frames.clone(),
            pushed_token: self.pushed_token.clone(),
            pending_scope_end: self.pending_scope_end,
            position: self.scanner.position(),
        }
    }

    fn return_to_bookmark(&mut self, bookmark: &JsonReaderBookmark) {
        trace!(position = bookmark.position, depth = bookmark.frames.len(), "return to bookmark");
        self.state = bookmark.state;
        self.current_bson_type = bookmark.current_bson_type;
        self.current_name = bookmark.current_name.clone();
        self.current_value = bookmark.current_value.clone();
        self.frames = bookmark.frames.clone();
        self.pushed_token = bookmark.pushed_token.clone();
        self.pending_scope_end = bookmark.pending_scope_end;
        self.scanner.set_position(bookmark.position);
    }

    fn close(&mut self) {
        self.state = ReaderState::Closed;
    }
}

fn invalid_wrapper(key: &str, message: impl Into<String>) -> BsonError {
    BsonError::InvalidExtendedJson {
        key: key.to_string(),
        message: message.into(),
    }
}

/// 包装对象只允许出现指定的键
fn only_keys(fields: &Map<String, JsonValue>, allowed: &[&str]) -> BsonResult<()> {
    match fields.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_wrapper(
            key,
            format!("unexpected key in {} wrapper", allowed[0]),
        )),
        None => Ok(()),
    }
}

fn str_field<'a>(fields: &'a Map<String, JsonValue>, key: &str) -> BsonResult<&'a str> {
    match fields.get(key) {
        Some(JsonValue::String(s)) => Ok(s.as_str()),
        Some(_) => Err(invalid_wrapper(key, "expected a string")),
        None => Err(invalid_wrapper(key, "missing required key")),
    }
}

fn integer_value(key: &str, value: &JsonValue) -> BsonResult<i64> {
    match value {
        JsonValue::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid_wrapper(key, format!("{} is not an integer", n))),
        JsonValue::String(s) => s
            .parse()
            .map_err(|_| invalid_wrapper(key, format!("'{}' is not an integer", s))),
        _ => Err(invalid_wrapper(key, "expected an integer")),
    }
}

fn u32_field(fields: &Map<String, JsonValue>, key: &str) -> BsonResult<u32> {
    let value = fields
        .get(key)
        .ok_or_else(|| invalid_wrapper(key, "missing required key"))?;
    let n = integer_value(key, value)?;
    u32::try_from(n).map_err(|_| invalid_wrapper(key, format!("{} is out of range", n)))
}

/// 把收集到的包装对象键值转换为 Bson
///
/// 键的出现顺序不影响结果
fn wrapper_to_bson(head: &str, fields: &Map<String, JsonValue>) -> BsonResult<Bson> {
    match head {
        "$oid" => {
            only_keys(fields, &["$oid"])?;
            let oid = ObjectId::from_hex(str_field(fields, "$oid")?)
                .map_err(|e| invalid_wrapper("$oid", e.to_string()))?;
            Ok(Bson::ObjectId(oid))
        }
        "$date" => {
            only_keys(fields, &["$date"])?;
            let millis = match &fields["$date"] {
                JsonValue::Number(n) => match n.as_i64() {
                    Some(ms) => ms,
                    None => n.as_f64().unwrap_or_default() as i64,
                },
                JsonValue::String(iso) => DateTime::parse_iso(iso)
                    .map_err(|e| invalid_wrapper("$date", e.to_string()))?
                    .timestamp_millis(),
                JsonValue::Object(inner) => {
                    only_keys(inner, &["$numberLong"])?;
                    let value = inner
                        .get("$numberLong")
                        .ok_or_else(|| invalid_wrapper("$numberLong", "missing required key"))?;
                    integer_value("$numberLong", value)?
                }
                _ => return Err(invalid_wrapper("$date", "expected a number or string")),
            };
            Ok(Bson::DateTime(DateTime::from_millis(millis)))
        }
        "$binary" | "$type" => {
            only_keys(fields, &["$binary", "$type"])?;
            let bytes = STANDARD
                .decode(str_field(fields, "$binary")?)
                .map_err(|e| invalid_wrapper("$binary", e.to_string()))?;
            let subtype = match fields.get("$type") {
                Some(JsonValue::String(s)) => u8::from_str_radix(s, 16)
                    .map_err(|_| invalid_wrapper("$type", format!("'{}' is not a hex byte", s)))?,
                Some(JsonValue::Number(n)) => n
                    .as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .ok_or_else(|| invalid_wrapper("$type", format!("{} is out of range", n)))?,
                Some(_) => return Err(invalid_wrapper("$type", "expected a string")),
                None => return Err(invalid_wrapper("$type", "missing required key")),
            };
            Ok(Bson::Binary(Binary::new(BinarySubtype(subtype), bytes)))
        }
        "$regex" | "$options" => {
            only_keys(fields, &["$regex", "$options"])?;
            let pattern = str_field(fields, "$regex")?;
            let options = match fields.get("$options") {
                Some(_) => str_field(fields, "$options")?,
                None => "",
            };
            Ok(Bson::RegularExpression(Regex::new(pattern, options)))
        }
        "$symbol" => {
            only_keys(fields, &["$symbol"])?;
            Ok(Bson::Symbol(str_field(fields, "$symbol")?.into()))
        }
        "$timestamp" => {
            only_keys(fields, &["$timestamp"])?;
            match &fields["$timestamp"] {
                JsonValue::Object(inner) => {
                    only_keys(inner, &["t", "i"])?;
                    let seconds = u32_field(inner, "t")?;
                    let increment = u32_field(inner, "i")?;
                    Ok(Bson::Timestamp(Timestamp::new(seconds, increment)))
                }
                other => Ok(Bson::Timestamp(Timestamp::from_raw(integer_value(
                    "$timestamp",
                    other,
                )?))),
            }
        }
        "$maxKey" | "$maxkey" => {
            only_keys(fields, &[head])?;
            Ok(Bson::MaxKey)
        }
        "$minKey" | "$minkey" => {
            only_keys(fields, &[head])?;
            Ok(Bson::MinKey)
        }
        "$undefined" => {
            only_keys(fields, &["$undefined"])?;
            Ok(Bson::Undefined)
        }
        "$numberLong" => {
            only_keys(fields, &["$numberLong"])?;
            Ok(Bson::Int64(integer_value("$numberLong", &fields["$numberLong"])?))
        }
        "$numberDouble" => {
            only_keys(fields, &["$numberDouble"])?;
            let text = str_field(fields, "$numberDouble")?;
            let value = match text {
                "NaN" => f64::NAN,
                "Infinity" => f64::INFINITY,
                "-Infinity" => f64::NEG_INFINITY,
                other => other
                    .parse()
                    .map_err(|_| invalid_wrapper("$numberDouble", format!("'{}' is not a double", other)))?,
            };
            Ok(Bson::Double(value))
        }
        other => Err(invalid_wrapper(other, "unsupported wrapper")),
    }
}
