//! 编解码配置模块
//!
//! 二进制读写器与 JSON 写入器的可调参数。所有字段都有默认值,
//! 可以直接从 TOML/JSON 配置中部分反序列化。

use crate::error::{CommonError, CommonResult};
use serde::{Deserialize, Serialize};

/// 默认缓冲区块大小(16 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
/// 默认最大文档大小(16 MiB)
pub const DEFAULT_MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;
/// 默认最大嵌套深度
pub const DEFAULT_MAX_SERIALIZATION_DEPTH: usize = 100;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_document_size() -> usize {
    DEFAULT_MAX_DOCUMENT_SIZE
}

fn default_max_serialization_depth() -> usize {
    DEFAULT_MAX_SERIALIZATION_DEPTH
}

fn default_indent_chars() -> String {
    "  ".to_string()
}

fn default_new_line_chars() -> String {
    "\r\n".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryReaderSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,
}

impl Default for BinaryReaderSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_document_size: default_max_document_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryWriterSettings {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_document_size")]
    pub max_document_size: usize,
    #[serde(default = "default_max_serialization_depth")]
    pub max_serialization_depth: usize,
}

impl Default for BinaryWriterSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_document_size: default_max_document_size(),
            max_serialization_depth: default_max_serialization_depth(),
        }
    }
}

/// JSON 输出方言
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonOutputMode {
    /// 纯 JSON,扩展类型使用 `$` 前缀包装对象
    Strict,
    /// Mongo shell 构造函数语法
    #[default]
    Shell,
    /// 旧版 shell 语法,日期写作 `new Date(ms)`
    TenGen,
}

impl std::str::FromStr for JsonOutputMode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "shell" => Ok(Self::Shell),
            "tengen" => Ok(Self::TenGen),
            other => Err(CommonError::InvalidSettings(format!(
                "Unknown JSON output mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWriterSettings {
    #[serde(default)]
    pub output_mode: JsonOutputMode,
    #[serde(default)]
    pub indent: bool,
    #[serde(default = "default_indent_chars")]
    pub indent_chars: String,
    #[serde(default = "default_new_line_chars")]
    pub new_line_chars: String,
    #[serde(default = "default_max_serialization_depth")]
    pub max_serialization_depth: usize,
}

impl JsonWriterSettings {
    pub fn new(output_mode: JsonOutputMode) -> Self {
        Self {
            output_mode,
            ..Self::default()
        }
    }

    pub fn indented(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }
}

impl Default for JsonWriterSettings {
    fn default() -> Self {
        Self {
            output_mode: JsonOutputMode::default(),
            indent: false,
            indent_chars: default_indent_chars(),
            new_line_chars: default_new_line_chars(),
            max_serialization_depth: default_max_serialization_depth(),
        }
    }
}

/// 聚合配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecSettings {
    #[serde(default)]
    pub binary_reader: BinaryReaderSettings,
    #[serde(default)]
    pub binary_writer: BinaryWriterSettings,
    #[serde(default)]
    pub json_writer: JsonWriterSettings,
}

impl CodecSettings {
    /// 检查配置取值是否可用
    pub fn validate(&self) -> CommonResult<()> {
        if self.binary_reader.chunk_size == 0 || self.binary_writer.chunk_size == 0 {
            return Err(CommonError::InvalidSettings(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.binary_writer.max_serialization_depth == 0 {
            return Err(CommonError::InvalidSettings(
                "max_serialization_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
