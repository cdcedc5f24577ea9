//! 分块缓冲区模块
//!
//! 按固定大小的块分配内存的可增长字节缓冲区。增长时只追加新块,
//! 已有块从不重新分配或拷贝,拷贝代价与新增字节数成正比。
//! 这是唯一感知块边界的组件:跨块的读写在这里被透明地拆分。

use std::io::Read;
use tracing::trace;

/// 分块缓冲区
#[derive(Debug, Clone)]
pub struct ChunkedBuffer {
    chunks: Vec<Box<[u8]>>,
    chunk_size: usize,
    len: usize,
}

impl ChunkedBuffer {
    /// 创建空缓冲区
    ///
    /// # Arguments
    /// * `chunk_size` - 每个块的字节数,必须大于 0
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        Self {
            chunks: Vec::new(),
            chunk_size,
            len: 0,
        }
    }

    /// 复制一段字节构造缓冲区
    pub fn from_slice(data: &[u8], chunk_size: usize) -> Self {
        let mut buffer = Self::new(chunk_size);
        buffer.write_at(0, data);
        buffer
    }

    /// 从 `Read` 源读入全部字节
    ///
    /// # Brief
    /// 直接读进块的空闲尾部,不经过中间缓冲
    pub fn read_from<R: Read>(reader: &mut R, chunk_size: usize) -> std::io::Result<Self> {
        let mut buffer = Self::new(chunk_size);
        loop {
            buffer.ensure_capacity(buffer.len + 1);
            let chunk_index = buffer.len / chunk_size;
            let offset = buffer.len % chunk_size;
            let n = reader.read(&mut buffer.chunks[chunk_index][offset..])?;
            if n == 0 {
                break;
            }
            buffer.len += n;
        }
        Ok(buffer)
    }

    /// 逻辑长度
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// 已分配的总容量
    pub fn capacity(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    /// 保证容量至少为 n 字节,按需追加新块
    pub fn ensure_capacity(&mut self, n: usize) {
        while self.capacity() < n {
            self.chunks
                .push(vec![0u8; self.chunk_size].into_boxed_slice());
            trace!(
                chunks = self.chunks.len(),
                chunk_size = self.chunk_size,
                "allocated buffer chunk"
            );
        }
    }

    /// 在任意逻辑偏移写入
    ///
    /// # Brief
    /// 偏移可以超过当前长度,中间未写过的字节保持为 0
    pub fn write_at(&mut self, offset: usize, data: &[u8]) {
        let end = offset + data.len();
        self.ensure_capacity(end);
        let mut position = offset;
        let mut remaining = data;
        while !remaining.is_empty() {
            let chunk_index = position / self.chunk_size;
            let within = position % self.chunk_size;
            let n = remaining.len().min(self.chunk_size - within);
            self.chunks[chunk_index][within..within + n].copy_from_slice(&remaining[..n]);
            position += n;
            remaining = &remaining[n..];
        }
        self.len = self.len.max(end);
    }

    /// 读取到调用方提供的切片
    ///
    /// # Panics
    /// 读取超出逻辑长度时 panic;调用方负责跟踪已声明的长度
    pub fn read_into(&self, offset: usize, out: &mut [u8]) {
        assert!(
            offset + out.len() <= self.len,
            "read past end of buffer: offset {} + {} > length {}",
            offset,
            out.len(),
            self.len
        );
        let mut position = offset;
        let mut filled = 0;
        while filled < out.len() {
            let chunk_index = position / self.chunk_size;
            let within = position % self.chunk_size;
            let n = (out.len() - filled).min(self.chunk_size - within);
            out[filled..filled + n].copy_from_slice(&self.chunks[chunk_index][within..within + n]);
            position += n;
            filled += n;
        }
    }

    /// 读取一段字节
    ///
    /// # Panics
    /// 同 [`ChunkedBuffer::read_into`]
    pub fn read_at(&self, offset: usize, length: usize) -> Vec<u8> {
        let mut out = vec![0u8; length];
        self.read_into(offset, &mut out);
        out
    }

    /// 从 offset 开始、到所在块末尾(或逻辑末尾)为止的连续字节
    pub fn contiguous_at(&self, offset: usize) -> &[u8] {
        if offset >= self.len {
            return &[];
        }
        let chunk_index = offset / self.chunk_size;
        let within = offset % self.chunk_size;
        let chunk_end = (self.len - chunk_index * self.chunk_size).min(self.chunk_size);
        &self.chunks[chunk_index][within..chunk_end]
    }

    /// 拷贝出全部内容
    pub fn to_vec(&self) -> Vec<u8> {
        self.read_at(0, self.len)
    }
}

impl Default for ChunkedBuffer {
    fn default() -> Self {
        Self::new(bsonio_common::DEFAULT_CHUNK_SIZE)
    }
}

impl PartialEq for ChunkedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.to_vec() == other.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_across_chunks() {
        let mut buffer = ChunkedBuffer::new(4);
        buffer.write_at(0, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(buffer.len(), 10);
        assert_eq!(buffer.chunk_count(), 3);
        assert_eq!(buffer.read_at(2, 5), vec![3, 4, 5, 6, 7]);
        assert_eq!(buffer.to_vec(), (1..=10).collect::<Vec<u8>>());
    }

    #[test]
    fn test_sparse_write_zero_fills() {
        let mut buffer = ChunkedBuffer::new(4);
        buffer.write_at(6, &[9]);
        assert_eq!(buffer.len(), 7);
        assert_eq!(buffer.to_vec(), vec![0, 0, 0, 0, 0, 0, 9]);
    }

    #[test]
    fn test_backward_write() {
        let mut buffer = ChunkedBuffer::new(3);
        buffer.write_at(0, &[0; 8]);
        buffer.write_at(2, &[0xAA, 0xBB, 0xCC]);
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.to_vec(), vec![0, 0, 0xAA, 0xBB, 0xCC, 0, 0, 0]);
    }

    #[test]
    fn test_growth_keeps_existing_chunks() {
        let mut buffer = ChunkedBuffer::new(4);
        buffer.write_at(0, &[1, 2, 3, 4]);
        let first = buffer.chunks[0].as_ptr();
        buffer.write_at(4, &[5; 100]);
        assert_eq!(buffer.chunks[0].as_ptr(), first);
        assert_eq!(buffer.read_at(0, 5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_contiguous_at() {
        let buffer = ChunkedBuffer::from_slice(&[1, 2, 3, 4, 5, 6], 4);
        assert_eq!(buffer.contiguous_at(1), &[2, 3, 4]);
        assert_eq!(buffer.contiguous_at(4), &[5, 6]);
        assert!(buffer.contiguous_at(6).is_empty());
    }

    #[test]
    fn test_read_from() {
        let data: Vec<u8> = (0..50).collect();
        let buffer = ChunkedBuffer::read_from(&mut data.as_slice(), 7).unwrap();
        assert_eq!(buffer.len(), 50);
        assert_eq!(buffer.to_vec(), data);
    }

    #[test]
    #[should_panic(expected = "read past end of buffer")]
    fn test_read_past_end_panics() {
        let buffer = ChunkedBuffer::from_slice(&[1, 2, 3], 2);
        buffer.read_at(2, 2);
    }
}
