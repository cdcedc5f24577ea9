//! 转码辅助模块
//!
//! 把读写器组合成一次性的编解码函数。二进制与 JSON 之间的互转直接把读取器泵入写入器,
//! 不经过中间的 [`Document`]。

use crate::binary_reader::BsonBinaryReader;
use crate::binary_writer::BsonBinaryWriter;
use crate::document::Document;
use crate::document_reader::BsonDocumentReader;
use crate::json_reader::JsonReader;
use crate::json_writer::JsonWriter;
use crate::reader::BsonReader;
use crate::value::Bson;
use crate::writer::BsonWriter;
use crate::{BsonError, BsonResult};
use bsonio_common::{BinaryReaderSettings, BinaryWriterSettings, CodecSettings, JsonWriterSettings};
use tracing::debug;

/// 编码文档为 BSON 字节
///
/// # Brief
/// 使用默认的二进制写入器设置,把文档写成一个顶层 BSON 文档
///
/// # Arguments
/// * `document` - 要编码的文档
///
/// # Returns
/// 成功返回字节向量, 超出嵌套深度或文档大小限制时返回错误
pub fn to_bson_bytes(document: &Document) -> BsonResult<Vec<u8>> {
    let mut writer = BsonBinaryWriter::new(BinaryWriterSettings::default());
    writer.write_document(document)?;
    writer.into_bytes()
}

/// 解码 BSON 字节为文档
///
/// # Brief
/// 输入必须恰好是一个顶层文档,其后的多余字节视为格式错误
///
/// # Arguments
/// * `bytes` - BSON 字节
///
/// # Returns
/// 成功返回文档, 格式错误时返回带字节偏移的错误
pub fn from_bson_bytes(bytes: &[u8]) -> BsonResult<Document> {
    let mut reader = BsonBinaryReader::from_slice(bytes, BinaryReaderSettings::default());
    let document = reader.read_document()?;
    if !reader.is_at_end_of_file()? {
        return Err(BsonError::format(
            "Unexpected bytes after the document",
            reader.position(),
        ));
    }
    Ok(document)
}

/// 把任意值写成 JSON 文本
pub fn to_json(value: &Bson, settings: &JsonWriterSettings) -> BsonResult<String> {
    let mut writer = JsonWriter::new(settings.clone());
    writer.write_value(value)?;
    writer.into_string()
}

/// 解析一个 JSON 值
///
/// # Brief
/// 接受全部三种方言的输入;值之后只允许空白
pub fn from_json(text: &str) -> BsonResult<Bson> {
    let mut reader = JsonReader::new(text);
    let value = reader.read_value()?;
    reader.expect_end_of_input()?;
    Ok(value)
}

/// 把读取器中的全部顶层值依次泵入写入器
///
/// # Arguments
/// * `reader` - 任意读取器
/// * `writer` - 任意写入器
///
/// # Returns
/// 成功返回转写的顶层值个数
pub fn transcode<R, W>(reader: &mut R, writer: &mut W) -> BsonResult<usize>
where
    R: BsonReader,
    W: BsonWriter,
{
    let mut count = 0;
    while !reader.is_at_end_of_file()? {
        writer.pipe_value(reader)?;
        count += 1;
    }
    debug!(count, "transcode finished");
    Ok(count)
}

/// BSON 字节流转 JSON 文本
///
/// 输入可以是若干首尾相接的文档,输出中每个文档之间以换行分隔
pub fn bson_to_json(bytes: &[u8], settings: &JsonWriterSettings) -> BsonResult<String> {
    let settings = CodecSettings {
        json_writer: settings.clone(),
        ..CodecSettings::default()
    };
    bson_to_json_with(bytes, &settings)
}

/// 按完整的编解码设置把 BSON 字节流转为 JSON 文本
pub fn bson_to_json_with(bytes: &[u8], settings: &CodecSettings) -> BsonResult<String> {
    let mut reader = BsonBinaryReader::from_slice(bytes, settings.binary_reader.clone());
    let mut writer = JsonWriter::new(settings.json_writer.clone());
    transcode(&mut reader, &mut writer)?;
    writer.into_string()
}

/// JSON 文本转 BSON 字节流
///
/// 每个顶层值都必须是文档
pub fn json_to_bson(text: &str) -> BsonResult<Vec<u8>> {
    json_to_bson_with(text, &CodecSettings::default())
}

/// 按完整的编解码设置把 JSON 文本转为 BSON 字节流
pub fn json_to_bson_with(text: &str, settings: &CodecSettings) -> BsonResult<Vec<u8>> {
    let mut reader = JsonReader::new(text);
    let mut writer = BsonBinaryWriter::new(settings.binary_writer.clone());
    transcode(&mut reader, &mut writer)?;
    writer.into_bytes()
}

/// JSON 文本在方言之间转换
pub fn json_to_json(text: &str, settings: &JsonWriterSettings) -> BsonResult<String> {
    let mut reader = JsonReader::new(text);
    let mut writer = JsonWriter::new(settings.clone());
    transcode(&mut reader, &mut writer)?;
    writer.into_string()
}

/// 经由内存文档读取器重新编码
pub fn document_to_json(document: &Document, settings: &JsonWriterSettings) -> BsonResult<String> {
    let mut reader = BsonDocumentReader::new(document.clone());
    let mut writer = JsonWriter::new(settings.clone());
    writer.pipe_value(&mut reader)?;
    writer.into_string()
}
