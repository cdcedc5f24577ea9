//! BSON 文档结构模块
//!
//! 文档是有序的 (名称, 值) 序列。插入顺序在往返编解码中保持不变,
//! 模型不强制名称唯一:重复名称按写入时的样子保留,按名称查找返回第一个匹配。

use crate::value::Bson;
use crate::BsonResult;
use compact_str::CompactString;

/// BSON 文档
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    elements: Vec<(CompactString, Bson)>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    /// 设置字段
    ///
    /// # Brief
    /// 若已存在同名字段则替换第一个匹配的值,否则追加到末尾
    ///
    /// # Arguments
    /// * `key` - 字段名
    /// * `value` - 字段值
    ///
    /// # Returns
    /// 被替换的旧值
    pub fn insert(&mut self, key: impl Into<CompactString>, value: impl Into<Bson>) -> Option<Bson> {
        let key = key.into();
        let value = value.into();
        match self.elements.iter_mut().find(|(name, _)| *name == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.elements.push((key, value));
                None
            }
        }
    }

    /// 无条件追加字段,允许重复名称
    pub fn push(&mut self, key: impl Into<CompactString>, value: impl Into<Bson>) {
        self.elements.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.elements
            .iter()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.elements
            .iter_mut()
            .find(|(name, _)| name.as_str() == key)
            .map(|(_, value)| value)
    }

    /// 按位置获取元素
    pub fn get_index(&self, index: usize) -> Option<(&str, &Bson)> {
        self.elements
            .get(index)
            .map(|(name, value)| (name.as_str(), value))
    }

    /// 删除第一个同名字段
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        let index = self.elements.iter().position(|(name, _)| name.as_str() == key)?;
        Some(self.elements.remove(index).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.elements.iter().any(|(name, _)| name.as_str() == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Bson> {
        self.elements.iter().map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.elements
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key)?.as_i32()
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_f64()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn get_array(&self, key: &str) -> Option<&Vec<Bson>> {
        self.get(key)?.as_array()
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key)?.as_document()
    }

    /// 编码为 BSON 字节
    pub fn to_bson_bytes(&self) -> BsonResult<Vec<u8>> {
        crate::codec::to_bson_bytes(self)
    }

    /// 从 BSON 字节解码
    pub fn from_bson_bytes(bytes: &[u8]) -> BsonResult<Self> {
        crate::codec::from_bson_bytes(bytes)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Bson 的 Display 走 JSON 写入器
        let text = Bson::Document(self.clone()).to_string();
        f.write_str(&text)
    }
}

impl<K: Into<CompactString>, V: Into<Bson>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            elements: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = (CompactString, Bson);
    type IntoIter = std::vec::IntoIter<(CompactString, Bson)>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a str, &'a Bson);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (CompactString, Bson)>,
        fn(&'a (CompactString, Bson)) -> (&'a str, &'a Bson),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.elements
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

/// 便捷的文档创建宏
///
/// # Brief
/// 使用类似 JSON 的语法创建 Document,字段按书写顺序排列
///
/// # 示例
/// ```rust,ignore
/// let doc = doc! {
///     "name": "bsonio",
///     "tags": ["bson", "json"],
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::Document::new()
    };
    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::Document::new();
            $(
                doc.push($key, $crate::bson!($value));
            )*
            doc
        }
    };
}
