//! 读取器公共接口
//!
//! 二进制、JSON、内存文档三种读取器实现同一个 [`BsonReader`] trait,
//! 上层遍历代码不关心底层是字节还是文本。

use crate::document::Document;
use crate::document_writer::BsonDocumentWriter;
use crate::spec::BsonType;
use crate::state::ReaderState;
use crate::value::{Binary, Bson, Regex};
use crate::writer::BsonWriter;
use crate::{BsonError, BsonResult};
use bsonio_common::{DateTime, ObjectId, Timestamp};

/// 基于显式状态机的 BSON 读取器
///
/// 调用顺序:`read_bson_type` → (文档内)`read_name` → `read_xxx`。
/// 乱序调用返回 `BsonError::InvalidOperation`。
pub trait BsonReader {
    /// 书签:可以反复恢复的读取位置快照
    type Bookmark: Clone;

    fn state(&self) -> ReaderState;

    /// 最近一次 `read_bson_type` 得到的类型
    fn current_bson_type(&self) -> Option<BsonType>;

    /// 最近一次读到的元素名称
    fn current_name(&self) -> Option<&str>;

    /// 顶层是否已无更多输入
    fn is_at_end_of_file(&mut self) -> BsonResult<bool>;

    /// 读取下一个元素的类型
    ///
    /// # Returns
    /// 容器结束时返回 `BsonType::EndOfDocument`;数组内会顺带消费元素名并直接进入 Value 状态
    fn read_bson_type(&mut self) -> BsonResult<BsonType>;

    fn read_name(&mut self) -> BsonResult<String>;
    fn skip_name(&mut self) -> BsonResult<()>;
    fn skip_value(&mut self) -> BsonResult<()>;

    fn read_start_document(&mut self) -> BsonResult<()>;
    fn read_end_document(&mut self) -> BsonResult<()>;
    fn read_start_array(&mut self) -> BsonResult<()>;
    fn read_end_array(&mut self) -> BsonResult<()>;

    fn read_double(&mut self) -> BsonResult<f64>;
    fn read_string(&mut self) -> BsonResult<String>;
    fn read_binary(&mut self) -> BsonResult<Binary>;
    fn read_undefined(&mut self) -> BsonResult<()>;
    fn read_object_id(&mut self) -> BsonResult<ObjectId>;
    fn read_boolean(&mut self) -> BsonResult<bool>;
    fn read_date_time(&mut self) -> BsonResult<DateTime>;
    fn read_null(&mut self) -> BsonResult<()>;
    fn read_regular_expression(&mut self) -> BsonResult<Regex>;
    fn read_javascript(&mut self) -> BsonResult<String>;
    fn read_symbol(&mut self) -> BsonResult<String>;

    /// 读取代码部分,随后进入 ScopeDocument 状态,由调用方读取作用域文档
    fn read_javascript_with_scope(&mut self) -> BsonResult<String>;

    fn read_int32(&mut self) -> BsonResult<i32>;
    fn read_timestamp(&mut self) -> BsonResult<Timestamp>;
    fn read_int64(&mut self) -> BsonResult<i64>;
    fn read_min_key(&mut self) -> BsonResult<()>;
    fn read_max_key(&mut self) -> BsonResult<()>;

    fn get_bookmark(&self) -> Self::Bookmark;
    fn return_to_bookmark(&mut self, bookmark: &Self::Bookmark);

    fn close(&mut self);

    /// 在当前文档中向前查找元素
    ///
    /// # Brief
    /// 跳过不匹配的元素;找到时停在该元素的 Value 状态,找不到时停在 EndOfDocument 状态
    ///
    /// # Arguments
    /// * `name` - 元素名
    fn find_element(&mut self, name: &str) -> BsonResult<bool> {
        loop {
            if self.read_bson_type()? == BsonType::EndOfDocument {
                return Ok(false);
            }
            if self.read_name()? == name {
                return Ok(true);
            }
            self.skip_value()?;
        }
    }

    /// 在当前文档中查找字符串类型的元素
    fn find_string_element(&mut self, name: &str) -> BsonResult<Option<String>> {
        loop {
            let bson_type = self.read_bson_type()?;
            if bson_type == BsonType::EndOfDocument {
                return Ok(None);
            }
            if self.read_name()? == name && bson_type == BsonType::String {
                return self.read_string().map(Some);
            }
            self.skip_value()?;
        }
    }

    /// 把当前值读成内存模型
    fn read_value(&mut self) -> BsonResult<Bson>
    where
        Self: Sized,
    {
        let mut writer = BsonDocumentWriter::new();
        writer.pipe_value(self)?;
        writer.into_value()
    }

    /// 读取一个完整文档
    fn read_document(&mut self) -> BsonResult<Document>
    where
        Self: Sized,
    {
        if matches!(
            self.state(),
            ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument
        ) {
            self.read_bson_type()?;
        }
        match self.read_value()? {
            Bson::Document(document) => Ok(document),
            other => Err(BsonError::invalid_operation(format!(
                "ReadDocument found a {} instead of a Document",
                other.bson_type()
            ))),
        }
    }
}

/// 检查当前状态是否允许读取指定类型的值
pub(crate) fn check_bson_type(
    method: &str,
    state: ReaderState,
    current: Option<BsonType>,
    expected: BsonType,
) -> BsonResult<()> {
    if state != ReaderState::Value {
        return Err(BsonError::invalid_operation(format!(
            "{} can only be called when State is Value, not when State is {:?}",
            method, state
        )));
    }
    if current != Some(expected) {
        return Err(BsonError::invalid_operation(format!(
            "{} can only be called when CurrentBsonType is {}, not when CurrentBsonType is {:?}",
            method, expected, current
        )));
    }
    Ok(())
}

/// 检查当前状态是否为期望值之一
pub(crate) fn check_state(
    method: &str,
    state: ReaderState,
    expected: &[ReaderState],
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

/// 读取器进入类型自动探测的状态
pub(crate) fn needs_type(state: ReaderState) -> bool {
    matches!(
        state,
        ReaderState::Initial | ReaderState::Done | ReaderState::ScopeDocument
    )
}
