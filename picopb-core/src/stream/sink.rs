use crate::{CoreError, sealed::Sealed};
use bytes::Bytes;

/// `ByteSink` 定义对象安全的推式字节汇契约，是 [`ByteSource`](super::ByteSource)
/// 的对偶接口。
///
/// # 设计背景（Why）
/// - 编码侧同样需要区分“拷贝写入”与“所有权移交”两条路径：网络缓冲、
///   写入聚合器等实现可以直接保留 [`Bytes`] 的引用计数句柄，省去复制；
/// - 与源侧一致，错误经 `Result` 传播并携带稳定错误码。
///
/// # 契约说明（What）
/// - **输入/前置条件**：`write(src)` 不得修改 `src`；`put_str(data)` 转移
///   `data` 的所有权，实现可以长期持有其缓冲；
/// - **返回值/后置条件**：两个方法都返回本次接受的字节数；短写（返回值
///   小于输入长度）是合法结果，由调用方决定重试策略。
///
/// # 设计考量（Trade-offs）
/// - `put_str` 按值接收 [`Bytes`] 而非切片，短写场景实现侧可先行
///   `slice`/`split` 再保留剩余部分；这把一次潜在拷贝换成了引用计数操作。
pub trait ByteSink: Send + Sealed {
    /// 写入 `src` 中至多 `src.len()` 字节，返回实际接受的字节数。
    fn write(&mut self, src: &[u8]) -> Result<usize, CoreError>;

    /// 移交整条字节串；实现可以零拷贝地接管其缓冲。
    fn put_str(&mut self, data: Bytes) -> Result<usize, CoreError>;

    /// 汇是否已不再接受任何字节。默认恒为 `false`。
    fn eof(&self) -> bool {
        false
    }
}
