//! # bsonio - BSON 编解码引擎
//!
//! 在内存文档模型与 BSON 线上格式之间互相转换,并提供扩展 JSON 文本表示。
//!
//! - **分块缓冲区**:按固定大小的块增长,任意标量都可以跨越块边界
//! - **显式状态机**:读写器用帧栈而不是调用栈记录嵌套,支持书签回退
//! - **统一接口**:二进制、JSON、内存文档三种读写器实现同一组 trait,
//!   任意读取器都可以泵入任意写入器完成转码
//! - **三种 JSON 方言**:Strict、Shell、TenGen,可选缩进
//!
//! ## 快速开始
//!
//! ```rust,ignore
//! use bsonio::{doc, to_bson_bytes, from_bson_bytes};
//!
//! let document = doc! { "name": "bsonio", "version": 1 };
//! let bytes = to_bson_bytes(&document).unwrap();
//! assert_eq!(from_bson_bytes(&bytes).unwrap(), document);
//! ```

pub mod spec;
pub mod value;
pub mod document;
pub mod json;
pub mod buffer;
pub mod stream;
pub mod state;
pub mod reader;
pub mod writer;
pub mod binary_reader;
pub mod binary_writer;
pub mod json_scanner;
pub mod json_reader;
pub mod json_writer;
pub mod document_reader;
pub mod document_writer;
pub mod codec;

pub use binary_reader::{BsonBinaryReader, BinaryReaderBookmark};
pub use binary_writer::BsonBinaryWriter;
pub use buffer::ChunkedBuffer;
pub use codec::{
    bson_to_json, bson_to_json_with, document_to_json, from_bson_bytes, from_json, json_to_bson,
    json_to_bson_with, json_to_json, to_bson_bytes, to_json, transcode,
};
pub use document::Document;
pub use document_reader::{BsonDocumentReader, DocumentReaderBookmark};
pub use document_writer::BsonDocumentWriter;
pub use json_reader::{JsonReader, JsonReaderBookmark};
pub use json_scanner::{JsonScanner, JsonToken};
pub use json_writer::JsonWriter;
pub use reader::BsonReader;
pub use spec::{BinarySubtype, BsonType};
pub use state::{ContextType, ReaderState, WriterState};
pub use value::{Binary, Bson, JavaScriptWithScope, Regex};
pub use writer::BsonWriter;

pub use bsonio_common::{
    BinaryReaderSettings, BinaryWriterSettings, CodecSettings, DateTime, JsonOutputMode,
    JsonWriterSettings, ObjectId, Timestamp,
};

use thiserror::Error;

/// 编解码错误类型
///
/// 覆盖四类失败:调用顺序错误(InvalidOperation)、格式错误(带字节偏移或行列号)、
/// 扩展 JSON 语义错误(指明出错的键)以及容量限制。
#[derive(Error, Debug)]
pub enum BsonError {
    /// IO 操作错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 读写器状态机拒绝的调用
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// 无效的类型标记字节
    #[error("Invalid BsonType {byte:#04x} at byte {position}")]
    InvalidBsonType { byte: u8, position: usize },

    /// 字符串不是有效的 UTF-8 编码
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// 意外的输入结束
    #[error("Unexpected end of input at byte {0}")]
    UnexpectedEof(usize),

    /// 二进制格式错误
    #[error("Format error at byte {position}: {message}")]
    Format { message: String, position: usize },

    /// JSON 语法错误
    #[error("JSON syntax error at line {line}, column {column}: {message}")]
    Json {
        message: String,
        line: usize,
        column: usize,
    },

    /// 扩展 JSON 包装对象不合法
    #[error("Invalid extended JSON for '{key}': {message}")]
    InvalidExtendedJson { key: String, message: String },

    /// 嵌套层级过深
    #[error("Nesting too deep: max {0}")]
    NestingTooDeep(usize),

    /// 文档体积超出限制
    #[error("Document too large: {size} bytes exceeds max {max}")]
    DocumentTooLarge { size: usize, max: usize },

    /// 公共类型错误
    #[error(transparent)]
    Common(#[from] bsonio_common::CommonError),
}

impl BsonError {
    pub(crate) fn invalid_operation(message: impl Into<String>) -> Self {
        BsonError::InvalidOperation(message.into())
    }

    pub(crate) fn format(message: impl Into<String>, position: usize) -> Self {
        BsonError::Format {
            message: message.into(),
            position,
        }
    }
}

/// 编解码 Result 类型别名
pub type BsonResult<T> = Result<T, BsonError>;
