//! BSON 二进制写入器
//!
//! 写入到分块缓冲区。打开文档/数组时预留 4 字节长度并压入帧,
//! 关闭时写入结束字节,再回填 `当前偏移 - 预留偏移`。

use crate::buffer::ChunkedBuffer;
use crate::spec::{BinarySubtype, BsonType};
use crate::state::{ContextType, WriterState};
use crate::stream::ByteBufferStream;
use crate::writer::{check_state, BsonWriter};
use crate::{BsonError, BsonResult};
use bsonio_common::{BinaryWriterSettings, DateTime, ObjectId, Timestamp};
use smallvec::SmallVec;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct BinaryWriterFrame {
    context_type: ContextType,
    /// 尚未回填的长度前缀所在偏移
    start_position: usize,
    /// 数组内下一个元素的下标
    index: usize,
}

/// BSON 二进制写入器
pub struct BsonBinaryWriter {
    stream: ByteBufferStream,
    settings: BinaryWriterSettings,
    state: WriterState,
    frames: SmallVec<[BinaryWriterFrame; 8]>,
    name: Option<String>,
}

impl BsonBinaryWriter {
    pub fn new(settings: BinaryWriterSettings) -> Self {
        let buffer = ChunkedBuffer::new(settings.chunk_size);
        Self::with_buffer(buffer, settings)
    }

    /// 追加写入到已有缓冲区的末尾
    pub fn with_buffer(buffer: ChunkedBuffer, settings: BinaryWriterSettings) -> Self {
        let mut stream = ByteBufferStream::new(buffer);
        stream.set_position(stream.len());
        Self {
            stream,
            settings,
            state: WriterState::Initial,
            frames: SmallVec::new(),
            name: None,
        }
    }

    pub fn settings(&self) -> &BinaryWriterSettings {
        &self.settings
    }

    pub fn position(&self) -> usize {
        self.stream.position()
    }

    /// 交出缓冲区
    ///
    /// # Returns
    /// 仍有未关闭的容器时返回错误
    pub fn into_buffer(self) -> BsonResult<ChunkedBuffer> {
        if !self.frames.is_empty() {
            return Err(BsonError::invalid_operation(format!(
                "Cannot hand off buffer with {} unclosed container(s)",
                self.frames.len()
            )));
        }
        Ok(self.stream.into_buffer())
    }

    pub fn into_bytes(self) -> BsonResult<Vec<u8>> {
        Ok(self.into_buffer()?.to_vec())
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

    fn depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.context_type != ContextType::JavaScriptWithScope)
            .count()
    }

    /// 写入类型字节和元素名
    ///
    /// 名称在写入任何字节之前校验,失败时缓冲区、待写名称和数组下标都保持不变
    fn write_type_and_name(&mut self, method: &str, bson_type: BsonType) -> BsonResult<()> {
        check_state(method, self.state, &[WriterState::Value])?;
        let name = match self.frames.last() {
            Some(frame) if frame.context_type == ContextType::Array => frame.index.to_string(),
            Some(_) => {
                let name = self.name.as_deref().ok_or_else(|| {
                    BsonError::invalid_operation(format!("{} called before WriteName", method))
                })?;
                check_element_name(name)?;
                name.to_string()
            }
            None => {
                return Err(BsonError::invalid_operation(format!(
                    "{} cannot write a top-level {} value in BSON",
                    method, bson_type
                )))
            }
        };

        match self.frames.last_mut() {
            Some(frame) if frame.context_type == ContextType::Array => frame.index += 1,
            _ => self.name = None,
        }
        self.stream.write_u8(bson_type.as_u8());
        self.stream.write_cstring(&name)
    }

    fn push_frame(&mut self, context_type: ContextType) {
        let start_position = self.stream.position();
        self.frames.push(BinaryWriterFrame {
            context_type,
            start_position,
            index: 0,
        });
        self.stream.write_i32(0);
    }

    /// 写入结束字节,弹出帧并回填长度
    ///
    /// 关闭作用域文档时连同外层 JavaScriptWithScope 一起关闭。
    /// 长度检查在写入结束字节之前完成,超限时帧栈和缓冲区都保持不变。
    fn close_frame(&mut self) -> BsonResult<BinaryWriterFrame> {
        let closing = match self.frames.last() {
            Some(frame) if frame.context_type == ContextType::ScopeDocument => 2,
            Some(_) => 1,
            None => return Err(BsonError::invalid_operation("No open container to close")),
        };
        let end = self.stream.position() + 1;
        for frame in self.frames.iter().rev().take(closing) {
            let size = end - frame.start_position;
            if size > self.settings.max_document_size {
                return Err(BsonError::DocumentTooLarge {
                    size,
                    max: self.settings.max_document_size,
                });
            }
        }

        self.stream.write_u8(0);
        let mut innermost = None;
        for _ in 0..closing {
            if let Some(frame) = self.frames.pop() {
                let size = end - frame.start_position;
                self.stream.write_i32_at(frame.start_position, size as i32);
                innermost.get_or_insert(frame);
            }
        }
        innermost.ok_or_else(|| BsonError::invalid_operation("No open container to close"))
    }

    fn scalar_prefix(&mut self, method: &str, bson_type: BsonType) -> BsonResult<()> {
        self.write_type_and_name(method, bson_type)
    }

    fn finish_value(&mut self) {
        self.state = self.next_state();
    }
}

fn check_element_name(name: &str) -> BsonResult<()> {
    if name.as_bytes().contains(&0) {
        return Err(BsonError::invalid_operation(format!(
            "Element name cannot contain null bytes: {:?}",
            name
        )));
    }
    Ok(())
}

impl Default for BsonBinaryWriter {
    fn default() -> Self {
        Self::new(BinaryWriterSettings::default())
    }
}

impl BsonWriter for BsonBinaryWriter {
    fn state(&self) -> WriterState {
        self.state
    }

    fn write_name(&mut self, name: &str) -> BsonResult<()> {
        check_state("WriteName", self.state, &[WriterState::Name])?;
        check_element_name(name)?;
        self.name = Some(name.to_string());
        self.state = WriterState::Value;
        Ok(())
    }

    fn write_start_document(&mut self) -> BsonResult<()> {
        check_state(
            "WriteStartDocument",
            self.state,
            &[
                WriterState::Initial,
                WriterState::Done,
                WriterState::Value,
                WriterState::ScopeDocument,
            ],
        )?;
        if self.depth() >= self.settings.max_serialization_depth {
            return Err(BsonError::NestingTooDeep(
                self.settings.max_serialization_depth,
            ));
        }
        let context_type = match self.state {
            WriterState::Value => {
                self.write_type_and_name("WriteStartDocument", BsonType::Document)?;
                ContextType::Document
            }
            WriterState::ScopeDocument => ContextType::ScopeDocument,
            _ => ContextType::Document,
        };
        self.push_frame(context_type);
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
        let frame = self.close_frame()?;
        if self.frames.is_empty() {
            debug!(
                size = self.stream.position() - frame.start_position,
                "top-level document written"
            );
        }
        self.finish_value();
        Ok(())
    }

    fn write_start_array(&mut self) -> BsonResult<()> {
        if self.depth() >= self.settings.max_serialization_depth {
            return Err(BsonError::NestingTooDeep(
                self.settings.max_serialization_depth,
            ));
        }
        self.write_type_and_name("WriteStartArray", BsonType::Array)?;
        self.push_frame(ContextType::Array);
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
        self.close_frame()?;
        self.finish_value();
        Ok(())
    }

    fn write_double(&mut self, value: f64) -> BsonResult<()> {
        self.scalar_prefix("WriteDouble", BsonType::Double)?;
        self.stream.write_f64(value);
        self.finish_value();
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> BsonResult<()> {
        self.scalar_prefix("WriteString", BsonType::String)?;
        self.stream.write_string(value);
        self.finish_value();
        Ok(())
    }

    fn write_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> BsonResult<()> {
        self.scalar_prefix("WriteBinaryData", BsonType::Binary)?;
        if subtype == BinarySubtype::BINARY_OLD {
            self.stream.write_i32(bytes.len() as i32 + 4);
            self.stream.write_u8(subtype.0);
            self.stream.write_i32(bytes.len() as i32);
        } else {
            self.stream.write_i32(bytes.len() as i32);
            self.stream.write_u8(subtype.0);
        }
        self.stream.write_bytes(bytes);
        self.finish_value();
        Ok(())
    }

    fn write_undefined(&mut self) -> BsonResult<()> {
        self.scalar_prefix("WriteUndefined", BsonType::Undefined)?;
        self.finish_value();
        Ok(())
    }

    fn write_object_id(&mut self, value: ObjectId) -> BsonResult<()> {
        self.scalar_prefix("WriteObjectId", BsonType::ObjectId)?;
        self.stream.write_bytes(value.as_bytes());
        self.finish_value();
        Ok(())
    }

    fn write_boolean(&mut self, value: bool) -> BsonResult<()> {
        self.scalar_prefix("WriteBoolean", BsonType::Boolean)?;
        self.stream.write_u8(value as u8);
        self.finish_value();
        Ok(())
    }

    fn write_date_time(&mut self, value: DateTime) -> BsonResult<()> {
        self.scalar_prefix("WriteDateTime", BsonType::DateTime)?;
        self.stream.write_i64(value.timestamp_millis());
        self.finish_value();
        Ok(())
    }

    fn write_null(&mut self) -> BsonResult<()> {
        self.scalar_prefix("WriteNull", BsonType::Null)?;
        self.finish_value();
        Ok(())
    }

    fn write_regular_expression(&mut self, pattern: &str, options: &str) -> BsonResult<()> {
        self.scalar_prefix("WriteRegularExpression", BsonType::RegularExpression)?;
        self.stream.write_cstring(pattern)?;
        self.stream.write_cstring(options)?;
        self.finish_value();
        Ok(())
    }

    fn write_javascript(&mut self, code: &str) -> BsonResult<()> {
        self.scalar_prefix("WriteJavaScript", BsonType::JavaScript)?;
        self.stream.write_string(code);
        self.finish_value();
        Ok(())
    }

    fn write_symbol(&mut self, value: &str) -> BsonResult<()> {
        self.scalar_prefix("WriteSymbol", BsonType::Symbol)?;
        self.stream.write_string(value);
        self.finish_value();
        Ok(())
    }

    fn write_javascript_with_scope(&mut self, code: &str) -> BsonResult<()> {
        self.scalar_prefix("WriteJavaScriptWithScope", BsonType::JavaScriptWithScope)?;
        self.push_frame(ContextType::JavaScriptWithScope);
        self.stream.write_string(code);
        self.state = WriterState::ScopeDocument;
        Ok(())
    }

    fn write_int32(&mut self, value: i32) -> BsonResult<()> {
        self.scalar_prefix("WriteInt32", BsonType::Int32)?;
        self.stream.write_i32(value);
        self.finish_value();
        Ok(())
    }

    fn write_timestamp(&mut self, value: Timestamp) -> BsonResult<()> {
        self.scalar_prefix("WriteTimestamp", BsonType::Timestamp)?;
        self.stream.write_i64(value.raw());
        self.finish_value();
        Ok(())
    }

    fn write_int64(&mut self, value: i64) -> BsonResult<()> {
        self.scalar_prefix("WriteInt64", BsonType::Int64)?;
        self.stream.write_i64(value);
        self.finish_value();
        Ok(())
    }

    fn write_min_key(&mut self) -> BsonResult<()> {
        self.scalar_prefix("WriteMinKey", BsonType::MinKey)?;
        self.finish_value();
        Ok(())
    }

    fn write_max_key(&mut self) -> BsonResult<()> {
        self.scalar_prefix("WriteMaxKey", BsonType::MaxKey)?;
        self.finish_value();
        Ok(())
    }

    fn close(&mut self) -> BsonResult<()> {
        self.state = WriterState::Closed;
        Ok(())
    }
}
