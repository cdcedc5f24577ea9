//! BSON 二进制读取器
//!
//! 从分块缓冲区读取。每打开一个容器压入一帧,记录其起始偏移和声明长度;
//! 关闭时校验实际消费的字节数与声明一致。书签按值复制整个帧栈,
//! 因此同一个书签可以任意多次恢复。

use crate::buffer::ChunkedBuffer;
use crate::reader::{check_bson_type, check_state, needs_type, BsonReader};
use crate::spec::{BinarySubtype, BsonType, MIN_DOCUMENT_SIZE};
use crate::state::{ContextType, ReaderState};
use crate::stream::ByteBufferStream;
use crate::value::{Binary, Regex};
use crate::{BsonError, BsonResult};
use bsonio_common::{BinaryReaderSettings, DateTime, ObjectId, Timestamp};
use bytes::Buf;
use smallvec::SmallVec;
use std::io::Read;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BinaryReaderFrame {
    context_type: ContextType,
    /// 长度前缀所在偏移
    start_position: usize,
    /// 声明的容器长度(含长度前缀)
    size: usize,
}

impl BinaryReaderFrame {
    fn end_position(&self) -> usize {
        self.start_position + self.size
    }
}

/// 二进制读取器书签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryReaderBookmark {
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    frames: SmallVec<[BinaryReaderFrame; 8]>,
    position: usize,
}

/// BSON 二进制读取器
pub struct BsonBinaryReader {
    stream: ByteBufferStream,
    settings: BinaryReaderSettings,
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    frames: SmallVec<[BinaryReaderFrame; 8]>,
}

impl BsonBinaryReader {
    /// 读取已有缓冲区,通常来自写入器的交接
    pub fn new(buffer: ChunkedBuffer, settings: BinaryReaderSettings) -> Self {
        Self {
            stream: ByteBufferStream::new(buffer),
            settings,
            state: ReaderState::Initial,
            current_bson_type: None,
            current_name: None,
            frames: SmallVec::new(),
        }
    }

    pub fn from_slice(bytes: &[u8], settings: BinaryReaderSettings) -> Self {
        let buffer = ChunkedBuffer::from_slice(bytes, settings.chunk_size);
        Self::new(buffer, settings)
    }

    /// 从字节源读入全部内容
    pub fn from_reader<R: Read>(reader: &mut R, settings: BinaryReaderSettings) -> BsonResult<Self> {
        let buffer = ChunkedBuffer::read_from(reader, settings.chunk_size)?;
        Ok(Self::new(buffer, settings))
    }

    pub fn position(&self) -> usize {
        self.stream.position()
    }

    pub fn into_buffer(self) -> ChunkedBuffer {
        self.stream.into_buffer()
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

    fn verify_bson_type(&mut self, method: &str, expected: BsonType) -> BsonResult<()> {
        if needs_type(self.state) {
            self.read_bson_type()?;
        }
        check_bson_type(method, self.state, self.current_bson_type, expected)
    }

    /// 读取并校验容器长度前缀
    fn read_size(&mut self) -> BsonResult<(usize, usize)> {
        let start = self.stream.position();
        let size = self.stream.read_i32()?;
        if size < MIN_DOCUMENT_SIZE as i32 {
            return Err(BsonError::format(
                format!("Invalid document size: {}", size),
                start,
            ));
        }
        let size = size as usize;
        if size > self.settings.max_document_size {
            return Err(BsonError::DocumentTooLarge {
                size,
                max: self.settings.max_document_size,
            });
        }
        if let Some(parent) = self.frames.last() {
            if start + size > parent.end_position() {
                return Err(BsonError::format(
                    format!("Document size {} exceeds its container", size),
                    start,
                ));
            }
        }
        Ok((start, size))
    }

    fn push_container(&mut self, context_type: ContextType) -> BsonResult<()> {
        let (start_position, size) = self.read_size()?;
        self.frames.push(BinaryReaderFrame {
            context_type,
            start_position,
            size,
        });
        Ok(())
    }

    /// 弹出帧并校验消费的字节数
    fn pop_container(&mut self) -> BsonResult<BinaryReaderFrame> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| BsonError::invalid_operation("No open container to close"))?;
        let consumed = self.stream.position() - frame.start_position;
        if consumed != frame.size {
            return Err(BsonError::format(
                format!(
                    "Document size was incorrect: declared {}, actual {}",
                    frame.size, consumed
                ),
                frame.start_position,
            ));
        }
        Ok(frame)
    }

    fn scalar_done(&mut self) {
        self.state = self.next_state();
    }
}

impl BsonReader for BsonBinaryReader {
    type Bookmark = BinaryReaderBookmark;

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
        Ok(matches!(self.state, ReaderState::Initial | ReaderState::Done)
            && self.stream.remaining() == 0)
    }

    fn read_bson_type(&mut self) -> BsonResult<BsonType> {
        if matches!(
            self.state,
            ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument
        ) {
            // 顶层值和作用域总是文档
            self.current_bson_type = Some(BsonType::Document);
            self.state = ReaderState::Value;
            return Ok(BsonType::Document);
        }
        check_state("ReadBsonType", self.state, &[ReaderState::Type])?;

        let position = self.stream.position();
        let byte = self.stream.read_u8()?;
        let bson_type = BsonType::from_u8(byte)
            .ok_or(BsonError::InvalidBsonType { byte, position })?;
        self.current_bson_type = Some(bson_type);

        if bson_type == BsonType::EndOfDocument {
            self.state = match self.context_type() {
                ContextType::Array => ReaderState::EndOfArray,
                ContextType::Document | ContextType::ScopeDocument => ReaderState::EndOfDocument,
                other => {
                    return Err(BsonError::format(
                        format!("Unexpected end of document in {:?}", other),
                        position,
                    ))
                }
            };
            return Ok(bson_type);
        }

        if self.context_type() == ContextType::Array {
            self.current_name = Some(self.stream.read_cstring()?);
            self.state = ReaderState::Value;
        } else {
            self.state = ReaderState::Name;
        }
        Ok(bson_type)
    }

    fn read_name(&mut self) -> BsonResult<String> {
        check_state("ReadName", self.state, &[ReaderState::Name])?;
        let name = self.stream.read_cstring()?;
        self.current_name = Some(name.clone());
        self.state = ReaderState::Value;
        Ok(name)
    }

    fn skip_name(&mut self) -> BsonResult<()> {
        check_state("SkipName", self.state, &[ReaderState::Name])?;
        self.stream.skip_cstring()?;
        self.current_name = None;
        self.state = ReaderState::Value;
        Ok(())
    }

    fn skip_value(&mut self) -> BsonResult<()> {
        check_state("SkipValue", self.state, &[ReaderState::Value])?;
        let bson_type = self
            .current_bson_type
            .ok_or_else(|| BsonError::invalid_operation("SkipValue without a current type"))?;
        match bson_type {
            BsonType::Document | BsonType::Array | BsonType::JavaScriptWithScope => {
                let (_, size) = self.read_size()?;
                self.stream.skip(size - 4)?;
            }
            BsonType::Binary => {
                let length = self.stream.read_i32()?;
                self.stream.skip(1 + length.max(0) as usize)?;
            }
            BsonType::String | BsonType::JavaScript | BsonType::Symbol => {
                let length = self.stream.read_i32()?;
                self.stream.skip(length.max(0) as usize)?;
            }
            BsonType::RegularExpression => {
                self.stream.skip_cstring()?;
                self.stream.skip_cstring()?;
            }
            BsonType::ObjectId => self.stream.skip(12)?,
            BsonType::Boolean => self.stream.skip(1)?,
            BsonType::DateTime | BsonType::Double | BsonType::Int64 | BsonType::Timestamp => {
                self.stream.skip(8)?
            }
            BsonType::Int32 => self.stream.skip(4)?,
            BsonType::Null | BsonType::Undefined | BsonType::MinKey | BsonType::MaxKey => {}
            BsonType::EndOfDocument => {
                return Err(BsonError::invalid_operation("SkipValue at end of document"))
            }
        }
        self.scalar_done();
        Ok(())
    }

    fn read_start_document(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadStartDocument", BsonType::Document)?;
        let context_type = if self.context_type() == ContextType::JavaScriptWithScope {
            ContextType::ScopeDocument
        } else {
            ContextType::Document
        };
        self.push_container(context_type)?;
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
        let frame = self.pop_container()?;
        if frame.context_type == ContextType::ScopeDocument {
            self.pop_container()?;
        }
        self.scalar_done();
        Ok(())
    }

    fn read_start_array(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadStartArray", BsonType::Array)?;
        self.push_container(ContextType::Array)?;
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
        self.pop_container()?;
        self.scalar_done();
        Ok(())
    }

    fn read_double(&mut self) -> BsonResult<f64> {
        self.verify_bson_type("ReadDouble", BsonType::Double)?;
        let value = self.stream.read_f64()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_string(&mut self) -> BsonResult<String> {
        self.verify_bson_type("ReadString", BsonType::String)?;
        let value = self.stream.read_string()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_binary(&mut self) -> BsonResult<Binary> {
        self.verify_bson_type("ReadBinaryData", BsonType::Binary)?;
        let start = self.stream.position();
        let length = self.stream.read_i32()?;
        if length < 0 {
            return Err(BsonError::format(
                format!("Invalid binary length: {}", length),
                start,
            ));
        }
        let subtype = BinarySubtype(self.stream.read_u8()?);
        let mut length = length as usize;
        if subtype == BinarySubtype::BINARY_OLD {
            let inner = self.stream.read_i32()?;
            if inner < 0 || inner as usize + 4 != length {
                return Err(BsonError::format(
                    format!("Old binary inner length {} does not match {}", inner, length),
                    start,
                ));
            }
            length = inner as usize;
        }
        let bytes = self.stream.read_bytes(length)?;
        self.scalar_done();
        Ok(Binary { subtype, bytes })
    }

    fn read_undefined(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadUndefined", BsonType::Undefined)?;
        self.scalar_done();
        Ok(())
    }

    fn read_object_id(&mut self) -> BsonResult<ObjectId> {
        self.verify_bson_type("ReadObjectId", BsonType::ObjectId)?;
        let bytes = self.stream.read_array::<12>()?;
        self.scalar_done();
        Ok(ObjectId::from_bytes(bytes))
    }

    fn read_boolean(&mut self) -> BsonResult<bool> {
        self.verify_bson_type("ReadBoolean", BsonType::Boolean)?;
        let position = self.stream.position();
        let value = match self.stream.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(BsonError::format(
                    format!("Invalid boolean byte: {}", other),
                    position,
                ))
            }
        };
        self.scalar_done();
        Ok(value)
    }

    fn read_date_time(&mut self) -> BsonResult<DateTime> {
        self.verify_bson_type("ReadDateTime", BsonType::DateTime)?;
        let value = self.stream.read_i64()?;
        self.scalar_done();
        Ok(DateTime::from_millis(value))
    }

    fn read_null(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadNull", BsonType::Null)?;
        self.scalar_done();
        Ok(())
    }

    fn read_regular_expression(&mut self) -> BsonResult<Regex> {
        self.verify_bson_type("ReadRegularExpression", BsonType::RegularExpression)?;
        let pattern = self.stream.read_cstring()?;
        let options = self.stream.read_cstring()?;
        self.scalar_done();
        Ok(Regex {
            pattern: pattern.into(),
            options: options.into(),
        })
    }

    fn read_javascript(&mut self) -> BsonResult<String> {
        self.verify_bson_type("ReadJavaScript", BsonType::JavaScript)?;
        let value = self.stream.read_string()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_symbol(&mut self) -> BsonResult<String> {
        self.verify_bson_type("ReadSymbol", BsonType::Symbol)?;
        let value = self.stream.read_string()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_javascript_with_scope(&mut self) -> BsonResult<String> {
        self.verify_bson_type("ReadJavaScriptWithScope", BsonType::JavaScriptWithScope)?;
        self.push_container(ContextType::JavaScriptWithScope)?;
        let code = self.stream.read_string()?;
        self.state = ReaderState::ScopeDocument;
        Ok(code)
    }

    fn read_int32(&mut self) -> BsonResult<i32> {
        self.verify_bson_type("ReadInt32", BsonType::Int32)?;
        let value = self.stream.read_i32()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_timestamp(&mut self) -> BsonResult<Timestamp> {
        self.verify_bson_type("ReadTimestamp", BsonType::Timestamp)?;
        let value = self.stream.read_i64()?;
        self.scalar_done();
        Ok(Timestamp::from_raw(value))
    }

    fn read_int64(&mut self) -> BsonResult<i64> {
        self.verify_bson_type("ReadInt64", BsonType::Int64)?;
        let value = self.stream.read_i64()?;
        self.scalar_done();
        Ok(value)
    }

    fn read_min_key(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadMinKey", BsonType::MinKey)?;
        self.scalar_done();
        Ok(())
    }

    fn read_max_key(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadMaxKey", BsonType::MaxKey)?;
        self.scalar_done();
        Ok(())
    }

    fn get_bookmark(&self) -> BinaryReaderBookmark {
        BinaryReaderBookmark {
            state: self.state,
            current_bson_type: self.current_bson_type,
            current_name: self.current_name.clone(),
            frames: self.frames.clone(),
            position: self.stream.position(),
        }
    }

    fn return_to_bookmark(&mut self, bookmark: &BinaryReaderBookmark) {
        trace!(position = bookmark.position, depth = bookmark.frames.len(), "return to bookmark");
        self.state = bookmark.state;
        self.current_bson_type = bookmark.current_bson_type;
        self.current_name = bookmark.current_name.clone();
        self.frames = bookmark.frames.clone();
        self.stream.set_position(bookmark.position);
    }

    fn close(&mut self) {
        self.state = ReaderState::Closed;
    }
}
