//! bsonio 命令行转码工具的库部分
//!
//! 负责配置加载、日志初始化以及输入输出格式之间的转换,`main.rs` 只做参数解析。

use bsonio::{
    json_to_json, transcode, BsonBinaryReader, BsonBinaryWriter, BsonError, CodecSettings,
    JsonReader, JsonWriter,
};
use bsonio_common::CommonError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// 输入输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bson,
    Json,
}

impl Format {
    /// 根据文件扩展名推断格式
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }

    /// 转换的默认目标格式
    pub fn opposite(self) -> Self {
        match self {
            Format::Bson => Format::Json,
            Format::Json => Format::Bson,
        }
    }
}

impl FromStr for Format {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bson" => Ok(Format::Bson),
            "json" => Ok(Format::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// 命令行配置文件
///
/// 编解码设置的各个表直接位于文件顶层,`log_level` 可选
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(flatten)]
    pub codec: CodecSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            codec: CodecSettings::default(),
        }
    }
}

impl Config {
    /// # Brief
    /// 从 TOML 文件加载配置
    ///
    /// # Arguments
    /// * `path` - 配置文件路径
    ///
    /// # Returns
    /// 解析并校验后的配置
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {}", e)))?;
        config.codec.validate()?;
        Ok(config)
    }

    /// 让读写两侧使用同一个块大小
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.codec.binary_reader.chunk_size = chunk_size;
        self.codec.binary_writer.chunk_size = chunk_size;
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] BsonError),

    #[error(transparent)]
    Settings(#[from] CommonError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown format '{0}', expected bson or json")]
    UnknownFormat(String),
}

pub type CliResult<T> = Result<T, CliError>;

/// 初始化日志
///
/// `RUST_LOG` 优先于传入的级别,日志写到标准错误以免混入转换输出
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// 把输入中的全部顶层文档转换为目标格式
///
/// # Arguments
/// * `input` - 字节源
/// * `from` - 输入格式
/// * `to` - 输出格式
/// * `settings` - 编解码设置
///
/// # Returns
/// 转换后的完整输出
pub fn convert<R: Read>(
    input: &mut R,
    from: Format,
    to: Format,
    settings: &CodecSettings,
) -> CliResult<Vec<u8>> {
    let output = match (from, to) {
        (Format::Bson, Format::Json) => {
            let mut reader = BsonBinaryReader::from_reader(input, settings.binary_reader.clone())?;
            let mut writer = JsonWriter::new(settings.json_writer.clone());
            let count = transcode(&mut reader, &mut writer)?;
            debug!(count, "bson documents converted");
            writer.into_string()?.into_bytes()
        }
        (Format::Json, Format::Bson) => {
            let mut reader = JsonReader::from_reader(input)?;
            let mut writer = BsonBinaryWriter::new(settings.binary_writer.clone());
            let count = transcode(&mut reader, &mut writer)?;
            debug!(count, "json values converted");
            writer.into_bytes()?
        }
        (Format::Json, Format::Json) => {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            json_to_json(&text, &settings.json_writer)?.into_bytes()
        }
        (Format::Bson, Format::Bson) => {
            let mut reader = BsonBinaryReader::from_reader(input, settings.binary_reader.clone())?;
            let mut writer = BsonBinaryWriter::new(settings.binary_writer.clone());
            transcode(&mut reader, &mut writer)?;
            writer.into_bytes()?
        }
    };
    Ok(output)
}
