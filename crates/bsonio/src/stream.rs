//! 字节流模块
//!
//! 在 [`ChunkedBuffer`] 之上维护一个读写游标,提供 BSON 需要的小端定长读写、
//! C 字符串、带长度前缀的字符串以及长度回填。读取前先检查剩余字节数,
//! 截断的输入表现为 `UnexpectedEof` 而不是缓冲区断言。

use crate::buffer::ChunkedBuffer;
use crate::{BsonError, BsonResult};
use bytes::Buf;

/// 分块缓冲区上的读写游标
#[derive(Debug, Clone)]
pub struct ByteBufferStream {
    buffer: ChunkedBuffer,
    position: usize,
}

impl ByteBufferStream {
    pub fn new(buffer: ChunkedBuffer) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// 移动游标,允许指向末尾之后(写入时零填充)
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn buffer(&self) -> &ChunkedBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> ChunkedBuffer {
        self.buffer
    }

    fn require(&self, n: usize) -> BsonResult<()> {
        if Buf::remaining(self) < n {
            return Err(BsonError::UnexpectedEof(self.position));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 读取
    // ------------------------------------------------------------------

    pub fn read_u8(&mut self) -> BsonResult<u8> {
        self.require(1)?;
        Ok(self.get_u8())
    }

    pub fn read_i32(&mut self) -> BsonResult<i32> {
        self.require(4)?;
        Ok(self.get_i32_le())
    }

    pub fn read_i64(&mut self) -> BsonResult<i64> {
        self.require(8)?;
        Ok(self.get_i64_le())
    }

    pub fn read_f64(&mut self) -> BsonResult<f64> {
        self.require(8)?;
        Ok(self.get_f64_le())
    }

    pub fn read_bytes(&mut self, n: usize) -> BsonResult<Vec<u8>> {
        self.require(n)?;
        let bytes = self.buffer.read_at(self.position, n);
        self.position += n;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> BsonResult<[u8; N]> {
        self.require(N)?;
        let mut out = [0u8; N];
        self.copy_to_slice(&mut out);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> BsonResult<()> {
        self.require(n)?;
        self.position += n;
        Ok(())
    }

    /// 查找从当前位置起第一个 0 字节的绝对偏移
    fn find_nul(&self) -> BsonResult<usize> {
        let mut offset = self.position;
        loop {
            let slice = self.buffer.contiguous_at(offset);
            if slice.is_empty() {
                return Err(BsonError::UnexpectedEof(self.position));
            }
            if let Some(index) = slice.iter().position(|&b| b == 0) {
                return Ok(offset + index);
            }
            offset += slice.len();
        }
    }

    /// 读取以 0 结尾的 UTF-8 字符串
    pub fn read_cstring(&mut self) -> BsonResult<String> {
        let nul = self.find_nul()?;
        let bytes = self.buffer.read_at(self.position, nul - self.position);
        self.position = nul + 1;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn skip_cstring(&mut self) -> BsonResult<()> {
        let nul = self.find_nul()?;
        self.position = nul + 1;
        Ok(())
    }

    /// 读取 int32 长度前缀的字符串
    ///
    /// # Brief
    /// 长度包含结尾的 0,且结尾字节必须是 0
    pub fn read_string(&mut self) -> BsonResult<String> {
        let start = self.position;
        let length = self.read_i32()?;
        if length < 1 {
            return Err(BsonError::format(
                format!("Invalid string length: {}", length),
                start,
            ));
        }
        let bytes = self.read_bytes(length as usize - 1)?;
        let terminator = self.read_u8()?;
        if terminator != 0 {
            return Err(BsonError::format(
                "String is missing null terminator",
                self.position - 1,
            ));
        }
        Ok(String::from_utf8(bytes)?)
    }

    // ------------------------------------------------------------------
    // 写入
    // ------------------------------------------------------------------

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.write_at(self.position, data);
        self.position += data.len();
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// 在指定位置回填 int32,游标不动
    pub fn write_i32_at(&mut self, position: usize, value: i32) {
        self.buffer.write_at(position, &value.to_le_bytes());
    }

    /// 写入以 0 结尾的字符串,内容不能包含 0 字节
    pub fn write_cstring(&mut self, value: &str) -> BsonResult<()> {
        if value.as_bytes().contains(&0) {
            return Err(BsonError::invalid_operation(format!(
                "CString cannot contain null bytes: {:?}",
                value
            )));
        }
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32 + 1);
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }
}

impl Buf for ByteBufferStream {
    fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn chunk(&self) -> &[u8] {
        self.buffer.contiguous_at(self.position)
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= Buf::remaining(self),
            "advance past end of stream: {} > {}",
            cnt,
            Buf::remaining(self)
        );
        self.position += cnt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_over(data: &[u8], chunk_size: usize) -> ByteBufferStream {
        ByteBufferStream::new(ChunkedBuffer::from_slice(data, chunk_size))
    }

    #[test]
    fn test_numbers_across_chunk_boundary() {
        let mut writer = ByteBufferStream::new(ChunkedBuffer::new(3));
        writer.write_u8(0xEE);
        writer.write_i32(-2);
        writer.write_i64(i64::MIN + 7);
        writer.write_f64(3.25);
        let mut reader = ByteBufferStream::new(writer.into_buffer());
        assert_eq!(reader.read_u8().unwrap(), 0xEE);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.read_i64().unwrap(), i64::MIN + 7);
        assert_eq!(reader.read_f64().unwrap(), 3.25);
        assert!(matches!(reader.read_u8(), Err(BsonError::UnexpectedEof(21))));
    }

    #[test]
    fn test_cstring_across_chunks() {
        let mut stream = stream_over(b"abcdefg\0h\0", 2);
        assert_eq!(stream.read_cstring().unwrap(), "abcdefg");
        stream.skip_cstring().unwrap();
        assert_eq!(stream.position(), 10);
    }

    #[test]
    fn test_cstring_missing_terminator() {
        let mut stream = stream_over(b"abc", 2);
        assert!(matches!(
            stream.read_cstring(),
            Err(BsonError::UnexpectedEof(0))
        ));
    }

    #[test]
    fn test_write_cstring_rejects_nul() {
        let mut stream = ByteBufferStream::new(ChunkedBuffer::new(4));
        assert!(stream.write_cstring("a\0b").is_err());
    }

    #[test]
    fn test_string_round_trip() {
        let mut writer = ByteBufferStream::new(ChunkedBuffer::new(5));
        writer.write_string("héllo");
        let mut reader = ByteBufferStream::new(writer.into_buffer());
        assert_eq!(reader.read_string().unwrap(), "héllo");
    }

    #[test]
    fn test_string_bad_terminator() {
        let mut stream = stream_over(&[2, 0, 0, 0, b'a', b'b'], 4);
        assert!(matches!(
            stream.read_string(),
            Err(BsonError::Format { position: 5, .. })
        ));
    }

    #[test]
    fn test_backpatch() {
        let mut stream = ByteBufferStream::new(ChunkedBuffer::new(2));
        stream.write_i32(0);
        stream.write_u8(7);
        stream.write_i32_at(0, 5);
        assert_eq!(stream.position(), 5);
        assert_eq!(stream.buffer().to_vec(), vec![5, 0, 0, 0, 7]);
    }

    #[test]
    fn test_truncated_int() {
        let mut stream = stream_over(&[1, 2], 4);
        assert!(matches!(stream.read_i32(), Err(BsonError::UnexpectedEof(0))));
        assert_eq!(stream.position(), 0);
    }
}
