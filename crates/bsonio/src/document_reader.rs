//! 内存文档读取器
//!
//! 直接遍历 [`Bson`] 值树。帧栈只记录每层容器的类型和下一个元素下标,
//! 当前容器每次从根沿下标路径重新定位,因此书签就是这条下标路径。

use crate::document::Document;
use crate::reader::{check_bson_type, check_state, BsonReader};
use crate::spec::BsonType;
use crate::state::{ContextType, ReaderState};
use crate::value::{Binary, Bson, Regex};
use crate::{BsonError, BsonResult};
use bsonio_common::{DateTime, ObjectId, Timestamp};
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DocumentReaderFrame {
    context_type: ContextType,
    /// 下一个元素的下标;已读元素是 `index - 1`
    index: usize,
}

/// 内存文档读取器书签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReaderBookmark {
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    frames: SmallVec<[DocumentReaderFrame; 8]>,
}

#[derive(Debug, Clone, Copy)]
enum Container<'a> {
    Document(&'a Document),
    Array(&'a [Bson]),
}

impl<'a> Container<'a> {
    fn len(&self) -> usize {
        match self {
            Container::Document(document) => document.len(),
            Container::Array(values) => values.len(),
        }
    }

    fn get(&self, index: usize) -> Option<(Option<&'a str>, &'a Bson)> {
        match *self {
            Container::Document(document) => {
                document.get_index(index).map(|(name, value)| (Some(name), value))
            }
            Container::Array(values) => values.get(index).map(|value| (None, value)),
        }
    }
}

/// 内存文档读取器
pub struct BsonDocumentReader {
    root: Bson,
    state: ReaderState,
    current_bson_type: Option<BsonType>,
    current_name: Option<String>,
    frames: SmallVec<[DocumentReaderFrame; 8]>,
}

impl BsonDocumentReader {
    pub fn new(document: Document) -> Self {
        Self::from_value(Bson::Document(document))
    }

    /// 读取任意顶层值
    pub fn from_value(root: Bson) -> Self {
        Self {
            root,
            state: ReaderState::Initial,
            current_bson_type: None,
            current_name: None,
            frames: SmallVec::new(),
        }
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

    fn corrupt(message: &str) -> BsonError {
        BsonError::invalid_operation(format!("Document reader frame stack is invalid: {}", message))
    }

    /// 从根沿下标路径定位栈顶容器
    fn container(&self) -> BsonResult<Container<'_>> {
        let mut value = &self.root;
        let mut container: Option<Container<'_>> = None;
        let mut pending: Option<usize> = None;
        for frame in &self.frames {
            if let (Some(parent), Some(index)) = (container, pending.take()) {
                value = parent
                    .get(index)
                    .map(|(_, child)| child)
                    .ok_or_else(|| Self::corrupt("index out of range"))?;
            }
            container = Some(match (frame.context_type, value) {
                (ContextType::Document, Bson::Document(document)) => Container::Document(document),
                (ContextType::Array, Bson::Array(values)) => Container::Array(values),
                (ContextType::ScopeDocument, Bson::JavaScriptWithScope(js)) => {
                    Container::Document(&js.scope)
                }
                // 作用域帧紧跟在 JavaScriptWithScope 帧之后,指向同一个值
                (ContextType::JavaScriptWithScope, Bson::JavaScriptWithScope(_)) => continue,
                _ => return Err(Self::corrupt("container type mismatch")),
            });
            pending = frame.index.checked_sub(1);
        }
        container.ok_or_else(|| Self::corrupt("no open container"))
    }

    /// 最近一次 `read_bson_type` 定位到的值
    fn current_value(&self) -> BsonResult<&Bson> {
        let Some(frame) = self.frames.last() else {
            return Ok(&self.root);
        };
        let index = frame
            .index
            .checked_sub(1)
            .ok_or_else(|| Self::corrupt("no current element"))?;
        self.container()?
            .get(index)
            .map(|(_, value)| value)
            .ok_or_else(|| Self::corrupt("index out of range"))
    }

    fn verify_bson_type(&mut self, method: &str, expected: BsonType) -> BsonResult<()> {
        if matches!(self.state, ReaderState::Initial | ReaderState::ScopeDocument) {
            self.read_bson_type()?;
        }
        check_bson_type(method, self.state, self.current_bson_type, expected)
    }

    fn read_scalar<T>(
        &mut self,
        method: &str,
        expected: BsonType,
        extract: impl FnOnce(&Bson) -> Option<T>,
    ) -> BsonResult<T> {
        self.verify_bson_type(method, expected)?;
        let value = extract(self.current_value()?)
            .ok_or_else(|| BsonError::invalid_operation(format!("{} found a different value", method)))?;
        self.state = self.next_state();
        Ok(value)
    }

    fn push_frame(&mut self, context_type: ContextType) {
        self.frames.push(DocumentReaderFrame {
            context_type,
            index: 0,
        });
    }
}

impl BsonReader for BsonDocumentReader {
    type Bookmark = DocumentReaderBookmark;

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
        Ok(self.state == ReaderState::Done)
    }

    fn read_bson_type(&mut self) -> BsonResult<BsonType> {
        match self.state {
            ReaderState::Initial => {
                let bson_type = self.root.bson_type();
                self.current_bson_type = Some(bson_type);
                self.current_name = None;
                self.state = ReaderState::Value;
                return Ok(bson_type);
            }
            ReaderState::ScopeDocument => {
                self.current_bson_type = Some(BsonType::Document);
                self.state = ReaderState::Value;
                return Ok(BsonType::Document);
            }
            _ => check_state("ReadBsonType", self.state, &[ReaderState::Type])?,
        }

        let container = self.container()?;
        let Some(frame) = self.frames.last() else {
            return Err(Self::corrupt("no open container"));
        };
        let index = frame.index;
        let is_array = frame.context_type == ContextType::Array;
        if index >= container.len() {
            self.current_bson_type = Some(BsonType::EndOfDocument);
            self.state = if is_array {
                ReaderState::EndOfArray
            } else {
                ReaderState::EndOfDocument
            };
            return Ok(BsonType::EndOfDocument);
        }
        let (name, value) = container
            .get(index)
            .ok_or_else(|| Self::corrupt("index out of range"))?;
        let bson_type = value.bson_type();
        let name = match name {
            Some(name) => name.to_string(),
            None => index.to_string(),
        };

        if let Some(frame) = self.frames.last_mut() {
            frame.index += 1;
        }
        self.current_name = Some(name);
        self.current_bson_type = Some(bson_type);
        self.state = if is_array {
            ReaderState::Value
        } else {
            ReaderState::Name
        };
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
        self.push_frame(context_type);
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
            self.frames.pop();
        }
        self.state = self.next_state();
        Ok(())
    }

    fn read_start_array(&mut self) -> BsonResult<()> {
        self.verify_bson_type("ReadStartArray", BsonType::Array)?;
        self.push_frame(ContextType::Array);
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
        self.read_scalar("ReadDouble", BsonType::Double, Bson::as_f64)
    }

    fn read_string(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadString", BsonType::String, |v| v.as_str().map(String::from))
    }

    fn read_binary(&mut self) -> BsonResult<Binary> {
        self.read_scalar("ReadBinaryData", BsonType::Binary, |v| match v {
            Bson::Binary(binary) => Some(binary.clone()),
            _ => None,
        })
    }

    fn read_undefined(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadUndefined", BsonType::Undefined, |_| Some(()))
    }

    fn read_object_id(&mut self) -> BsonResult<ObjectId> {
        self.read_scalar("ReadObjectId", BsonType::ObjectId, Bson::as_object_id)
    }

    fn read_boolean(&mut self) -> BsonResult<bool> {
        self.read_scalar("ReadBoolean", BsonType::Boolean, Bson::as_bool)
    }

    fn read_date_time(&mut self) -> BsonResult<DateTime> {
        self.read_scalar("ReadDateTime", BsonType::DateTime, Bson::as_datetime)
    }

    fn read_null(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadNull", BsonType::Null, |_| Some(()))
    }

    fn read_regular_expression(&mut self) -> BsonResult<Regex> {
        self.read_scalar("ReadRegularExpression", BsonType::RegularExpression, |v| match v {
            Bson::RegularExpression(regex) => Some(regex.clone()),
            _ => None,
        })
    }

    fn read_javascript(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadJavaScript", BsonType::JavaScript, |v| match v {
            Bson::JavaScript(code) => Some(code.to_string()),
            _ => None,
        })
    }

    fn read_symbol(&mut self) -> BsonResult<String> {
        self.read_scalar("ReadSymbol", BsonType::Symbol, |v| match v {
            Bson::Symbol(symbol) => Some(symbol.to_string()),
            _ => None,
        })
    }

    fn read_javascript_with_scope(&mut self) -> BsonResult<String> {
        let code = self.read_scalar(
            "ReadJavaScriptWithScope",
            BsonType::JavaScriptWithScope,
            |v| match v {
                Bson::JavaScriptWithScope(js) => Some(js.code.to_string()),
                _ => None,
            },
        )?;
        // 作用域帧要从当前元素进入,read_scalar 推进的状态在这里被覆盖
        self.push_frame(ContextType::JavaScriptWithScope);
        self.state = ReaderState::ScopeDocument;
        Ok(code)
    }

    fn read_int32(&mut self) -> BsonResult<i32> {
        self.read_scalar("ReadInt32", BsonType::Int32, |v| match v {
            Bson::Int32(n) => Some(*n),
            _ => None,
        })
    }

    fn read_timestamp(&mut self) -> BsonResult<Timestamp> {
        self.read_scalar("ReadTimestamp", BsonType::Timestamp, |v| match v {
            Bson::Timestamp(ts) => Some(*ts),
            _ => None,
        })
    }

    fn read_int64(&mut self) -> BsonResult<i64> {
        self.read_scalar("ReadInt64", BsonType::Int64, |v| match v {
            Bson::Int64(n) => Some(*n),
            _ => None,
        })
    }

    fn read_min_key(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadMinKey", BsonType::MinKey, |_| Some(()))
    }

    fn read_max_key(&mut self) -> BsonResult<()> {
        self.read_scalar("ReadMaxKey", BsonType::MaxKey, |_| Some(()))
    }

    fn get_bookmark(&self) -> DocumentReaderBookmark {
        DocumentReaderBookmark {
            state: self.state,
            current_bson_type: self.current_bson_type,
            current_name: self.current_name.clone(),
            frames: self.frames.clone(),
        }
    }

    fn return_to_bookmark(&mut self, bookmark: &DocumentReaderBookmark) {
        trace!(depth = bookmark.frames.len(), "return to bookmark");
        self.state = bookmark.state;
        self.current_bson_type = bookmark.current_bson_type;
        self.current_name = bookmark.current_name.clone();
        self.frames = bookmark.frames.clone();
    }

    fn close(&mut self) {
        self.state = ReaderState::Closed;
    }
}
