//! 字节通道桩：内存内的源与汇，附带调用计数以断言零拷贝路径。

use crate::stream::{ByteSink, ByteSource};
use crate::CoreError;
use crate::error::codes;
use bytes::Bytes;
use alloc::vec::Vec;

/// 完整缓冲的内存源：`read_str` 一次性零拷贝借出整段剩余数据。
///
/// - **意图 (Why)**：验证 `read_full_str` 的零拷贝快路径——对已缓冲的源
///   应当恰好一次 `read_str`、零次 `read`；
/// - **实现 (How)**：内部持有 [`Bytes`]，借出即 `split_to`，与调用方共享
///   底层分配；两个计数器记录两条路径各自被触达的次数。
pub struct BufferedByteSource {
    data: Bytes,
    pub read_calls: usize,
    pub read_str_calls: usize,
}

impl BufferedByteSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            read_calls: 0,
            read_str_calls: 0,
        }
    }
}

impl ByteSource for BufferedByteSource {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, CoreError> {
        self.read_calls += 1;
        let n = dst.len().min(self.data.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        self.data = self.data.slice(n..);
        Ok(n)
    }

    fn read_str(&mut self, max: usize) -> Result<Bytes, CoreError> {
        self.read_str_calls += 1;
        let n = max.min(self.data.len());
        Ok(self.data.split_to(n))
    }

    fn eof(&self) -> bool {
        self.data.is_empty()
    }
}

/// 在产出 `fail_after` 字节后报告 I/O 故障的源，用于验证错误透传。
pub struct FailingByteSource {
    remaining: usize,
}

impl FailingByteSource {
    pub fn new(fail_after: usize) -> Self {
        Self {
            remaining: fail_after,
        }
    }
}

impl ByteSource for FailingByteSource {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, CoreError> {
        if self.remaining == 0 {
            return Err(CoreError::new(codes::STREAM_IO, "injected transport fault"));
        }
        let n = dst.len().min(self.remaining);
        for byte in dst[..n].iter_mut() {
            *byte = 0xAB;
        }
        self.remaining -= n;
        Ok(n)
    }

    fn read_str(&mut self, _max: usize) -> Result<Bytes, CoreError> {
        Ok(Bytes::new())
    }

    fn eof(&self) -> bool {
        false
    }
}

/// 收集写入内容的内存汇；`put_str` 零拷贝保留传入的 [`Bytes`] 段。
#[derive(Default)]
pub struct CollectingByteSink {
    pub segments: Vec<Bytes>,
    pub write_calls: usize,
    pub put_str_calls: usize,
}

impl CollectingByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 拼接全部已接受内容，供断言使用。
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for segment in &self.segments {
            out.extend_from_slice(segment);
        }
        out
    }
}

impl ByteSink for CollectingByteSink {
    fn write(&mut self, src: &[u8]) -> Result<usize, CoreError> {
        self.write_calls += 1;
        self.segments.push(Bytes::copy_from_slice(src));
        Ok(src.len())
    }

    fn put_str(&mut self, data: Bytes) -> Result<usize, CoreError> {
        self.put_str_calls += 1;
        let n = data.len();
        self.segments.push(data);
        Ok(n)
    }
}
