//! 写入器公共接口
//!
//! [`BsonWriter`] 与 [`BsonReader`] 的事件一一对应,`pipe_value` 把任意读取器的
//! 事件泵入任意写入器,用于 BSON 与 JSON 之间的直接转码。

use crate::document::Document;
use crate::reader::BsonReader;
use crate::spec::{BinarySubtype, BsonType};
use crate::state::{ContextType, ReaderState, WriterState};
use crate::value::{Binary, Bson, Regex};
use crate::{BsonError, BsonResult};
use bsonio_common::{DateTime, ObjectId, Timestamp};
use smallvec::SmallVec;

/// 基于显式状态机的 BSON 写入器
pub trait BsonWriter {
    fn state(&self) -> WriterState;

    /// 写入下一个元素的名称;数组内名称由写入器按下标生成
    fn write_name(&mut self, name: &str) -> BsonResult<()>;

    fn write_start_document(&mut self) -> BsonResult<()>;
    fn write_end_document(&mut self) -> BsonResult<()>;
    fn write_start_array(&mut self) -> BsonResult<()>;
    fn write_end_array(&mut self) -> BsonResult<()>;

    fn write_double(&mut self, value: f64) -> BsonResult<()>;
    fn write_string(&mut self, value: &str) -> BsonResult<()>;
    fn write_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> BsonResult<()>;
    fn write_undefined(&mut self) -> BsonResult<()>;
    fn write_object_id(&mut self, value: ObjectId) -> BsonResult<()>;
    fn write_boolean(&mut self, value: bool) -> BsonResult<()>;
    fn write_date_time(&mut self, value: DateTime) -> BsonResult<()>;
    fn write_null(&mut self) -> BsonResult<()>;
    fn write_regular_expression(&mut self, pattern: &str, options: &str) -> BsonResult<()>;
    fn write_javascript(&mut self, code: &str) -> BsonResult<()>;
    fn write_symbol(&mut self, value: &str) -> BsonResult<()>;

    /// 写入代码部分,随后必须写入作用域文档
    fn write_javascript_with_scope(&mut self, code: &str) -> BsonResult<()>;

    fn write_int32(&mut self, value: i32) -> BsonResult<()>;
    fn write_timestamp(&mut self, value: Timestamp) -> BsonResult<()>;
    fn write_int64(&mut self, value: i64) -> BsonResult<()>;
    fn write_min_key(&mut self) -> BsonResult<()>;
    fn write_max_key(&mut self) -> BsonResult<()>;

    fn flush(&mut self) -> BsonResult<()> {
        Ok(())
    }

    fn close(&mut self) -> BsonResult<()>;

    /// 写入名称和值
    fn write_element(&mut self, name: &str, value: &Bson) -> BsonResult<()> {
        self.write_name(name)?;
        self.write_value(value)
    }

    /// 写入一个完整的值
    fn write_value(&mut self, value: &Bson) -> BsonResult<()> {
        match value {
            Bson::Double(v) => self.write_double(*v),
            Bson::String(v) => self.write_string(v),
            Bson::Document(doc) => self.write_document(doc),
            Bson::Array(values) => {
                self.write_start_array()?;
                for value in values {
                    self.write_value(value)?;
                }
                self.write_end_array()
            }
            Bson::Binary(binary) => self.write_binary(binary.subtype, &binary.bytes),
            Bson::Undefined => self.write_undefined(),
            Bson::ObjectId(v) => self.write_object_id(*v),
            Bson::Boolean(v) => self.write_boolean(*v),
            Bson::DateTime(v) => self.write_date_time(*v),
            Bson::Null => self.write_null(),
            Bson::RegularExpression(regex) => {
                self.write_regular_expression(&regex.pattern, &regex.options)
            }
            Bson::JavaScript(code) => self.write_javascript(code),
            Bson::Symbol(v) => self.write_symbol(v),
            Bson::JavaScriptWithScope(js) => {
                self.write_javascript_with_scope(&js.code)?;
                self.write_document(&js.scope)
            }
            Bson::Int32(v) => self.write_int32(*v),
            Bson::Timestamp(v) => self.write_timestamp(*v),
            Bson::Int64(v) => self.write_int64(*v),
            Bson::MinKey => self.write_min_key(),
            Bson::MaxKey => self.write_max_key(),
        }
    }

    fn write_document(&mut self, document: &Document) -> BsonResult<()> {
        self.write_start_document()?;
        for (name, value) in document {
            self.write_name(name)?;
            self.write_value(value)?;
        }
        self.write_end_document()
    }

    /// 把读取器的当前值原样泵入本写入器
    ///
    /// # Brief
    /// 用显式帧栈遍历嵌套容器,不经过中间的 Document。
    /// 读取器处于 Initial/Done/ScopeDocument 时先读取类型;
    /// 若当前值位于文档中,调用方需已写好名称。
    fn pipe_value<R: BsonReader>(&mut self, reader: &mut R) -> BsonResult<()>
    where
        Self: Sized,
    {
        if matches!(
            reader.state(),
            ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument
        ) {
            reader.read_bson_type()?;
        }
        let mut bson_type = reader
            .current_bson_type()
            .ok_or_else(|| BsonError::invalid_operation("PipeValue requires a current value"))?;
        let mut frames: SmallVec<[ContextType; 8]> = SmallVec::new();
        loop {
            match bson_type {
                BsonType::Document => {
                    reader.read_start_document()?;
                    self.write_start_document()?;
                    frames.push(ContextType::Document);
                }
                BsonType::Array => {
                    reader.read_start_array()?;
                    self.write_start_array()?;
                    frames.push(ContextType::Array);
                }
                BsonType::JavaScriptWithScope => {
                    let code = reader.read_javascript_with_scope()?;
                    self.write_javascript_with_scope(&code)?;
                    reader.read_start_document()?;
                    self.write_start_document()?;
                    frames.push(ContextType::ScopeDocument);
                }
                scalar => pipe_scalar(scalar, reader, self)?,
            }

            // 推进到下一个值,沿途关闭已读完的容器
            loop {
                let Some(&context) = frames.last() else {
                    return Ok(());
                };
                let next = reader.read_bson_type()?;
                if next == BsonType::EndOfDocument {
                    if context == ContextType::Array {
                        reader.read_end_array()?;
                        self.write_end_array()?;
                    } else {
                        reader.read_end_document()?;
                        self.write_end_document()?;
                    }
                    frames.pop();
                    continue;
                }
                if context != ContextType::Array {
                    let name = reader.read_name()?;
                    self.write_name(&name)?;
                }
                bson_type = next;
                break;
            }
        }
    }
}

fn pipe_scalar<R: BsonReader, W: BsonWriter>(
    bson_type: BsonType,
    reader: &mut R,
    writer: &mut W,
) -> BsonResult<()> {
    match bson_type {
        BsonType::Double => writer.write_double(reader.read_double()?),
        BsonType::String => writer.write_string(&reader.read_string()?),
        BsonType::Binary => {
            let Binary { subtype, bytes } = reader.read_binary()?;
            writer.write_binary(subtype, &bytes)
        }
        BsonType::Undefined => {
            reader.read_undefined()?;
            writer.write_undefined()
        }
        BsonType::ObjectId => writer.write_object_id(reader.read_object_id()?),
        BsonType::Boolean => writer.write_boolean(reader.read_boolean()?),
        BsonType::DateTime => writer.write_date_time(reader.read_date_time()?),
        BsonType::Null => {
            reader.read_null()?;
            writer.write_null()
        }
        BsonType::RegularExpression => {
            let Regex { pattern, options } = reader.read_regular_expression()?;
            writer.write_regular_expression(&pattern, &options)
        }
        BsonType::JavaScript => writer.write_javascript(&reader.read_javascript()?),
        BsonType::Symbol => writer.write_symbol(&reader.read_symbol()?),
        BsonType::Int32 => writer.write_int32(reader.read_int32()?),
        BsonType::Timestamp => writer.write_timestamp(reader.read_timestamp()?),
        BsonType::Int64 => writer.write_int64(reader.read_int64()?),
        BsonType::MinKey => {
            reader.read_min_key()?;
            writer.write_min_key()
        }
        BsonType::MaxKey => {
            reader.read_max_key()?;
            writer.write_max_key()
        }
        BsonType::Document | BsonType::Array | BsonType::JavaScriptWithScope
        | BsonType::EndOfDocument => Err(BsonError::invalid_operation(format!(
            "{} is not a scalar type",
            bson_type
        ))),
    }
}

/// 写入器中检查状态的公共逻辑
pub(crate) fn check_state(
    method: &str,
    state: WriterState,
    expected: &[WriterState],
) -> BsonResult<()> {
    if expected.contains(&state) {
        Ok(())
    } else {
        Err(BsonError::invalid_operation(format!(
            "{} cannot be called when State is {:?}",
            method, state
        )))
    }
}
