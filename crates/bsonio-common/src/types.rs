//! 公共类型定义模块
//!
//! 定义 BSON 编解码共用的标量类型:
//! - ObjectId: 12 字节唯一标识符(4 字节时间戳 + 5 字节进程标识 + 3 字节计数器)
//! - Timestamp: 64 位内部时间戳(高 32 位秒数 + 低 32 位自增序号)
//! - DateTime: 毫秒级 UTC 日期时间

use crate::error::{CommonError, CommonResult};
use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// ObjectId - 12 字节唯一标识符
///
/// 格式:
/// - 前 4 字节: 时间戳(秒,大端)
/// - 中 5 字节: 进程级随机标识
/// - 后 3 字节: 计数器(大端,随机起点)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let process = *PROCESS_UNIQUE.get_or_init(rand::random::<[u8; 5]>);
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::random::<u32>() & 0x00FF_FFFF))
            .fetch_add(1, Ordering::Relaxed);
        Self::from_parts(timestamp, process, counter)
    }

    /// 由各组成部分构造 ObjectId
    ///
    /// # Arguments
    /// * `timestamp` - 秒级时间戳
    /// * `process` - 5 字节进程标识
    /// * `counter` - 计数器,仅使用低 24 位
    pub fn from_parts(timestamp: u32, process: [u8; 5], counter: u32) -> Self {
        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(&process);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn process_id(&self) -> [u8; 5] {
        let mut process = [0u8; 5];
        process.copy_from_slice(&self.0[4..9]);
        process
    }

    pub fn counter(&self) -> u32 {
        u32::from_be_bytes([0, self.0[9], self.0[10], self.0[11]])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> CommonResult<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| CommonError::InvalidObjectId(format!("Invalid hex '{}': {}", s, e)))?;
        let arr: [u8; 12] = bytes.try_into().map_err(|_| {
            CommonError::InvalidObjectId(format!("ObjectId must be 12 bytes: '{}'", s))
        })?;
        Ok(Self(arr))
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// BSON 内部时间戳
///
/// 线上格式为单个 int64。部分调用方把它当作不透明的 64 位值,
/// 另一部分把它拆成 (秒数, 自增序号) 两个 32 位字段;两种视图都提供,
/// 调用方需自行清楚使用的是哪一种。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(i64);

impl Timestamp {
    /// 由 (秒数, 自增序号) 构造,raw = seconds << 32 | increment
    pub fn new(seconds: u32, increment: u32) -> Self {
        Self((((seconds as u64) << 32) | increment as u64) as i64)
    }

    /// 由不透明的 64 位原始值构造
    pub fn from_raw(value: i64) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }

    pub fn seconds(&self) -> u32 {
        ((self.0 as u64) >> 32) as u32
    }

    pub fn increment(&self) -> u32 {
        self.0 as u64 as u32
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Timestamp({}, {})", self.seconds(), self.increment())
    }
}

/// BSON 日期时间 - 自 Unix 纪元起的有符号毫秒数
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateTime(i64);

impl DateTime {
    pub const MIN: DateTime = DateTime(i64::MIN);
    pub const MAX: DateTime = DateTime(i64::MAX);

    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    pub fn to_chrono(&self) -> Option<chrono::DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    pub fn from_chrono(dt: chrono::DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    /// 格式化为 ISO-8601 字符串
    ///
    /// # Brief
    /// 形如 `2012-12-31T23:59:59.5Z`,毫秒部分去掉末尾的 0,为 0 时整体省略。
    ///
    /// # Returns
    /// 年份不在 1..=9999 范围内时返回 None
    pub fn to_iso_string(&self) -> Option<String> {
        let dt = self.to_chrono()?;
        let year = chrono::Datelike::year(&dt);
        if !(1..=9999).contains(&year) {
            return None;
        }
        let mut s = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
        let millis = self.0.rem_euclid(1000);
        if millis != 0 {
            let fraction = format!("{:03}", millis);
            s.push('.');
            s.push_str(fraction.trim_end_matches('0'));
        }
        s.push('Z');
        Some(s)
    }

    /// 解析 ISO-8601 字符串
    ///
    /// 接受 RFC 3339 格式、不带时区的日期时间(按 UTC 处理)以及纯日期。
    pub fn parse_iso(s: &str) -> CommonResult<Self> {
        if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
            return Ok(Self(dt.timestamp_millis()));
        }
        let trimmed = s.trim_end_matches('Z');
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(Self(naive.and_utc().timestamp_millis()));
            }
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Self(naive.and_utc().timestamp_millis()));
            }
        }
        Err(CommonError::InvalidDateTime(format!("Cannot parse '{}'", s)))
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_iso_string() {
            Some(iso) => write!(f, "{}", iso),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl From<chrono::DateTime<Utc>> for DateTime {
    fn from(dt: chrono::DateTime<Utc>) -> Self {
        Self::from_chrono(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_layout() {
        let id = ObjectId::from_parts(0x01020304, [5, 6, 7, 8, 9], 0x0a0b0c);
        assert_eq!(id.to_hex(), "0102030405060708090a0b0c");
        assert_eq!(id.timestamp(), 0x01020304);
        assert_eq!(id.process_id(), [5, 6, 7, 8, 9]);
        assert_eq!(id.counter(), 0x0a0b0c);
    }

    #[test]
    fn test_object_id_counter_increments() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_eq!(a.process_id(), b.process_id());
        assert_eq!((a.counter() + 1) & 0x00FF_FFFF, b.counter());
    }

    #[test]
    fn test_object_id_hex() {
        let id: ObjectId = "4d0ce088e447ad08b4721a37".parse().unwrap();
        assert_eq!(id.to_string(), "4d0ce088e447ad08b4721a37");
        assert!(ObjectId::from_hex("4d0ce088").is_err());
        assert!(ObjectId::from_hex("zz0ce088e447ad08b4721a37").is_err());
    }

    #[test]
    fn test_timestamp_views() {
        let ts = Timestamp::new(1, 2);
        assert_eq!(ts.raw(), 0x0000_0001_0000_0002);
        assert_eq!(ts.seconds(), 1);
        assert_eq!(ts.increment(), 2);

        let raw = Timestamp::from_raw(-1);
        assert_eq!(raw.seconds(), u32::MAX);
        assert_eq!(raw.increment(), u32::MAX);
        assert_eq!(Timestamp::new(u32::MAX, u32::MAX), raw);
    }

    #[test]
    fn test_datetime_iso() {
        assert_eq!(
            DateTime::from_millis(0).to_iso_string().unwrap(),
            "1970-01-01T00:00:00Z"
        );
        assert_eq!(
            DateTime::from_millis(1500).to_iso_string().unwrap(),
            "1970-01-01T00:00:01.5Z"
        );
        assert_eq!(
            DateTime::from_millis(-1).to_iso_string().unwrap(),
            "1969-12-31T23:59:59.999Z"
        );
        assert!(DateTime::MIN.to_iso_string().is_none());
        assert!(DateTime::MAX.to_iso_string().is_none());
    }

    #[test]
    fn test_datetime_parse() {
        let dt = DateTime::parse_iso("1970-01-01T00:00:01.5Z").unwrap();
        assert_eq!(dt.timestamp_millis(), 1500);
        let dt = DateTime::parse_iso("1970-01-02").unwrap();
        assert_eq!(dt.timestamp_millis(), 86_400_000);
        let dt = DateTime::parse_iso("1970-01-01T01:00:00+01:00").unwrap();
        assert_eq!(dt.timestamp_millis(), 0);
        assert!(DateTime::parse_iso("yesterday").is_err());
    }
}
