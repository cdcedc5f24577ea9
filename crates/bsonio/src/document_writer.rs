//! 内存文档写入器
//!
//! 把写入事件直接组装成 [`Bson`] 值树,不经过字节缓冲区。
//! 读取器的 `read_value` 以及任意读取器到内存模型的转换都经过这里。

use crate::document::Document;
use crate::spec::BinarySubtype;
use crate::state::WriterState;
use crate::value::{Binary, Bson, JavaScriptWithScope, Regex};
use crate::writer::{check_state, BsonWriter};
use crate::{BsonError, BsonResult};
use bsonio_common::{DateTime, ObjectId, Timestamp, DEFAULT_MAX_SERIALIZATION_DEPTH};

#[derive(Debug)]
enum DocumentWriterFrame {
    Document {
        name: Option<String>,
        document: Document,
    },
    Array {
        name: Option<String>,
        values: Vec<Bson>,
    },
    JavaScriptWithScope {
        name: Option<String>,
        code: String,
    },
    ScopeDocument {
        document: Document,
    },
}

/// 内存文档写入器
#[derive(Debug)]
pub struct BsonDocumentWriter {
    state: WriterState,
    frames: Vec<DocumentWriterFrame>,
    name: Option<String>,
    root: Option<Bson>,
    max_depth: usize,
}

impl BsonDocumentWriter {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_SERIALIZATION_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            state: WriterState::Initial,
            frames: Vec::new(),
            name: None,
            root: None,
            max_depth,
        }
    }

    /// 取出写入的顶层值
    pub fn into_value(self) -> BsonResult<Bson> {
        if !self.frames.is_empty() {
            return Err(BsonError::invalid_operation(format!(
                "BsonDocumentWriter still has {} open container(s)",
                self.frames.len()
            )));
        }
        self.root
            .ok_or_else(|| BsonError::invalid_operation("BsonDocumentWriter has no value"))
    }

    /// 取出写入的顶层文档
    pub fn into_document(self) -> BsonResult<Document> {
        match self.into_value()? {
            Bson::Document(document) => Ok(document),
            other => Err(BsonError::invalid_operation(format!(
                "BsonDocumentWriter holds a {} instead of a Document",
                other.bson_type()
            ))),
        }
    }

    fn next_state(&self) -> WriterState {
        match self.frames.last() {
            None => WriterState::Done,
            Some(DocumentWriterFrame::Array { .. }) => WriterState::Value,
            Some(_) => WriterState::Name,
        }
    }

    fn depth(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| !matches!(frame, DocumentWriterFrame::JavaScriptWithScope { .. }))
            .count()
    }

    fn check_depth(&self) -> BsonResult<()> {
        if self.depth() >= self.max_depth {
            return Err(BsonError::NestingTooDeep(self.max_depth));
        }
        Ok(())
    }

    /// 取出当前值的名称;数组内和顶层没有名称
    fn take_name(&mut self, method: &str) -> BsonResult<Option<String>> {
        check_state(method, self.state, &[WriterState::Initial, WriterState::Value])?;
        match self.frames.last() {
            Some(DocumentWriterFrame::Document { .. })
            | Some(DocumentWriterFrame::ScopeDocument { .. }) => {
                self.name.take().map(Some).ok_or_else(|| {
                    BsonError::invalid_operation(format!("{} called before WriteName", method))
                })
            }
            _ => Ok(None),
        }
    }

    /// 把完成的值挂到父容器上
    fn attach(&mut self, name: Option<String>, value: Bson) -> BsonResult<()> {
        match self.frames.last_mut() {
            None => self.root = Some(value),
            Some(DocumentWriterFrame::Document { document, .. })
            | Some(DocumentWriterFrame::ScopeDocument { document }) => {
                let name = name.ok_or_else(|| {
                    BsonError::invalid_operation("Document element written without a name")
                })?;
                document.push(name, value);
            }
            Some(DocumentWriterFrame::Array { values, .. }) => values.push(value),
            Some(DocumentWriterFrame::JavaScriptWithScope { .. }) => {
                return Err(BsonError::invalid_operation(
                    "JavaScriptWithScope expects its scope document",
                ))
            }
        }
        self.state = self.next_state();
        Ok(())
    }

    fn write_scalar(&mut self, method: &str, value: Bson) -> BsonResult<()> {
        let name = self.take_name(method)?;
        self.attach(name, value)
    }
}

impl Default for BsonDocumentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BsonWriter for BsonDocumentWriter {
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
        self.check_depth()?;
        if self.state == WriterState::ScopeDocument {
            self.frames.push(DocumentWriterFrame::ScopeDocument {
                document: Document::new(),
            });
        } else {
            let name = self.take_name("WriteStartDocument")?;
            self.frames.push(DocumentWriterFrame::Document {
                name,
                document: Document::new(),
            });
        }
        self.state = WriterState::Name;
        Ok(())
    }

    fn write_end_document(&mut self) -> BsonResult<()> {
        check_state("WriteEndDocument", self.state, &[WriterState::Name])?;
        match self.frames.pop() {
            Some(DocumentWriterFrame::Document { name, document }) => {
                self.attach(name, Bson::Document(document))
            }
            Some(DocumentWriterFrame::ScopeDocument { document }) => match self.frames.pop() {
                Some(DocumentWriterFrame::JavaScriptWithScope { name, code }) => self.attach(
                    name,
                    Bson::JavaScriptWithScope(JavaScriptWithScope {
                        code: code.into(),
                        scope: document,
                    }),
                ),
                _ => Err(BsonError::invalid_operation(
                    "Scope document without JavaScriptWithScope",
                )),
            },
            Some(frame) => {
                self.frames.push(frame);
                Err(BsonError::invalid_operation(
                    "WriteEndDocument cannot be called when ContextType is not a document",
                ))
            }
            None => Err(BsonError::invalid_operation("No open document to close")),
        }
    }

    fn write_start_array(&mut self) -> BsonResult<()> {
        self.check_depth()?;
        let name = self.take_name("WriteStartArray")?;
        self.frames.push(DocumentWriterFrame::Array {
            name,
            values: Vec::new(),
        });
        self.state = WriterState::Value;
        Ok(())
    }

    fn write_end_array(&mut self) -> BsonResult<()> {
        check_state("WriteEndArray", self.state, &[WriterState::Value])?;
        match self.frames.pop() {
            Some(DocumentWriterFrame::Array { name, values }) => {
                self.attach(name, Bson::Array(values))
            }
            Some(frame) => {
                self.frames.push(frame);
                Err(BsonError::invalid_operation(
                    "WriteEndArray cannot be called when ContextType is not an array",
                ))
            }
            None => Err(BsonError::invalid_operation("No open array to close")),
        }
    }

    fn write_double(&mut self, value: f64) -> BsonResult<()> {
        self.write_scalar("WriteDouble", Bson::Double(value))
    }

    fn write_string(&mut self, value: &str) -> BsonResult<()> {
        self.write_scalar("WriteString", Bson::String(value.into()))
    }

    fn write_binary(&mut self, subtype: BinarySubtype, bytes: &[u8]) -> BsonResult<()> {
        self.write_scalar("WriteBinaryData", Bson::Binary(Binary::new(subtype, bytes)))
    }

    fn write_undefined(&mut self) -> BsonResult<()> {
        self.write_scalar("WriteUndefined", Bson::Undefined)
    }

    fn write_object_id(&mut self, value: ObjectId) -> BsonResult<()> {
        self.write_scalar("WriteObjectId", Bson::ObjectId(value))
    }

    fn write_boolean(&mut self, value: bool) -> BsonResult<()> {
        self.write_scalar("WriteBoolean", Bson::Boolean(value))
    }

    fn write_date_time(&mut self, value: DateTime) -> BsonResult<()> {
        self.write_scalar("WriteDateTime", Bson::DateTime(value))
    }

    fn write_null(&mut self) -> BsonResult<()> {
        self.write_scalar("WriteNull", Bson::Null)
    }

    fn write_regular_expression(&mut self, pattern: &str, options: &str) -> BsonResult<()> {
        let regex = Regex {
            pattern: pattern.into(),
            options: options.into(),
        };
        self.write_scalar("WriteRegularExpression", Bson::RegularExpression(regex))
    }

    fn write_javascript(&mut self, code: &str) -> BsonResult<()> {
        self.write_scalar("WriteJavaScript", Bson::JavaScript(code.into()))
    }

    fn write_symbol(&mut self, value: &str) -> BsonResult<()> {
        self.write_scalar("WriteSymbol", Bson::Symbol(value.into()))
    }

    fn write_javascript_with_scope(&mut self, code: &str) -> BsonResult<()> {
        let name = self.take_name("WriteJavaScriptWithScope")?;
        self.frames.push(DocumentWriterFrame::JavaScriptWithScope {
            name,
            code: code.to_string(),
        });
        self.state = WriterState::ScopeDocument;
        Ok(())
    }

    fn write_int32(&mut self, value: i32) -> BsonResult<()> {
        self.write_scalar("WriteInt32", Bson::Int32(value))
    }

    fn write_timestamp(&mut self, value: Timestamp) -> BsonResult<()> {
        self.write_scalar("WriteTimestamp", Bson::Timestamp(value))
    }

    fn write_int64(&mut self, value: i64) -> BsonResult<()> {
        self.write_scalar("WriteInt64", Bson::Int64(value))
    }

    fn write_min_key(&mut self) -> BsonResult<()> {
        self.write_scalar("WriteMinKey", Bson::MinKey)
    }

    fn write_max_key(&mut self) -> BsonResult<()> {
        self.write_scalar("WriteMaxKey", Bson::MaxKey)
    }

    fn close(&mut self) -> BsonResult<()> {
        self.state = WriterState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_build_nested_document() {
        let mut writer = BsonDocumentWriter::new();
        writer.write_start_document().unwrap();
        writer.write_name("a").unwrap();
        writer.write_int32(1).unwrap();
        writer.write_name("b").unwrap();
        writer.write_start_array().unwrap();
        writer.write_string("x").unwrap();
        writer.write_start_document().unwrap();
        writer.write_end_document().unwrap();
        writer.write_end_array().unwrap();
        writer.write_name("f").unwrap();
        writer.write_javascript_with_scope("code").unwrap();
        writer.write_start_document().unwrap();
        writer.write_name("y").unwrap();
        writer.write_boolean(true).unwrap();
        writer.write_end_document().unwrap();
        writer.write_end_document().unwrap();
        assert_eq!(writer.state(), WriterState::Done);

        let expected = doc! {
            "a": 1,
            "b": ["x", {}],
            "f": (JavaScriptWithScope { code: "code".into(), scope: doc! { "y": true } }),
        };
        assert_eq!(writer.into_document().unwrap(), expected);
    }

    #[test]
    fn test_top_level_scalar() {
        let mut writer = BsonDocumentWriter::new();
        writer.write_int64(5).unwrap();
        assert_eq!(writer.into_value().unwrap(), Bson::Int64(5));
    }

    #[test]
    fn test_duplicate_names_preserved() {
        let mut writer = BsonDocumentWriter::new();
        writer
            .write_document(&doc! { "a": 1, "a": 2 })
            .unwrap();
        let document = writer.into_document().unwrap();
        assert_eq!(document.len(), 2);
        assert_eq!(document.get_i32("a"), Some(1));
    }

    #[test]
    fn test_state_violations() {
        let mut writer = BsonDocumentWriter::new();
        writer.write_start_document().unwrap();
        assert!(writer.write_int32(1).is_err());
        assert!(writer.write_end_array().is_err());
        writer.write_end_document().unwrap();
        assert!(writer.write_end_document().is_err());
    }

    #[test]
    fn test_unfinished_value() {
        let mut writer = BsonDocumentWriter::new();
        writer.write_start_document().unwrap();
        assert!(writer.into_value().is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut writer = BsonDocumentWriter::with_max_depth(1);
        writer.write_start_document().unwrap();
        writer.write_name("a").unwrap();
        assert!(matches!(
            writer.write_start_document(),
            Err(BsonError::NestingTooDeep(1))
        ));
    }
}
