//! BSON 线上格式常量与类型标记

pub const MIN_DOCUMENT_SIZE: usize = 5;

/// 元素类型标记,线上占一个字节
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BsonType {
    EndOfDocument = 0x00,
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    Undefined = 0x06,
    ObjectId = 0x07,
    Boolean = 0x08,
    DateTime = 0x09,
    Null = 0x0A,
    RegularExpression = 0x0B,
    JavaScript = 0x0D,
    Symbol = 0x0E,
    JavaScriptWithScope = 0x0F,
    Int32 = 0x10,
    Timestamp = 0x11,
    Int64 = 0x12,
    MaxKey = 0x7F,
    MinKey = 0xFF,
}

impl BsonType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::EndOfDocument),
            0x01 => Some(Self::Double),
            0x02 => Some(Self::String),
            0x03 => Some(Self::Document),
            0x04 => Some(Self::Array),
            0x05 => Some(Self::Binary),
            0x06 => Some(Self::Undefined),
            0x07 => Some(Self::ObjectId),
            0x08 => Some(Self::Boolean),
            0x09 => Some(Self::DateTime),
            0x0A => Some(Self::Null),
            0x0B => Some(Self::RegularExpression),
            0x0D => Some(Self::JavaScript),
            0x0E => Some(Self::Symbol),
            0x0F => Some(Self::JavaScriptWithScope),
            0x10 => Some(Self::Int32),
            0x11 => Some(Self::Timestamp),
            0x12 => Some(Self::Int64),
            0x7F => Some(Self::MaxKey),
            0xFF => Some(Self::MinKey),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 该类型是否为容器(文档、数组或带作用域的 JavaScript)
    pub fn is_container(self) -> bool {
        matches!(
            self,
            Self::Document | Self::Array | Self::JavaScriptWithScope
        )
    }
}

impl std::fmt::Display for BsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 二进制子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinarySubtype(pub u8);

impl BinarySubtype {
    pub const GENERIC: BinarySubtype = BinarySubtype(0x00);
    pub const FUNCTION: BinarySubtype = BinarySubtype(0x01);
    /// 旧版二进制,线上在数据前多一个 int32 长度
    pub const BINARY_OLD: BinarySubtype = BinarySubtype(0x02);
    pub const UUID_OLD: BinarySubtype = BinarySubtype(0x03);
    pub const UUID: BinarySubtype = BinarySubtype(0x04);
    pub const MD5: BinarySubtype = BinarySubtype(0x05);
    pub const USER_DEFINED: BinarySubtype = BinarySubtype(0x80);
}

impl From<u8> for BinarySubtype {
    fn from(byte: u8) -> Self {
        BinarySubtype(byte)
    }
}
