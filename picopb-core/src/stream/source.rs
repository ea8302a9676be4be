use super::DEFAULT_READ_CHUNK;
use crate::{CoreError, sealed::Sealed};
use bytes::{Bytes, BytesMut};

/// `ByteSource` 定义对象安全的拉式字节源契约。
///
/// # 设计背景（Why）
/// - 解码侧需要统一的读取视图，既兼容传统“填充调用方切片”的 API，也允许
///   内存映射、预缓冲等实现以零拷贝方式借出内部缓冲；
/// - 借鉴 Tokio `AsyncRead` 与 Netty `ByteBuf` 的经验，把 EOF 与错误状态
///   分离成两条独立通道，避免调用方用魔数区分语义。
///
/// # 逻辑解析（How）
/// - `read` 是拷贝路径：把字节写入调用方提供的切片；
/// - `read_str` 是借出路径：返回 [`Bytes`]，实现可以直接切分内部缓冲，
///   引用计数保证借出的数据在消费期间有效；
/// - `read_full_str` 是默认组合：先做一次最大化的 `read_str` 以启用零拷贝，
///   未到 EOF 再按块拷贝补齐。
///
/// # 契约说明（What）
/// - **输入/前置条件**：
///   - `read(dst)` 的 `dst` 由调用方分配；实现不得越界写入；
///   - `read_str(max)` 的 `max` 为本次借出的字节数上限。
/// - **返回值/后置条件**：
///   - `read` 返回本次写入的字节数；`Ok(0)` 在未到 EOF 时表示“暂无进展”，
///     是合法状态而非错误；
///   - `read_str` 可能返回空串；到达流尾时实现必须令 `eof()` 为真；
///   - 任何 `Err` 都必须携带稳定错误码（`stream.io` 族），错误与 EOF 互不
///     蕴含。
///
/// # 设计考量（Trade-offs & Gotchas）
/// - 放弃泛型化零成本抽象换取对象安全，解码器可以通过
///   `&mut dyn ByteSource` 在运行时组合不同来源；
/// - `read_str` 的借出语义要求实现返回的 [`Bytes`] 与后续读取互不干扰；
///   做不到零拷贝的实现直接退化为拷贝构造即可，契约不强制共享。
pub trait ByteSource: Send + Sealed {
    /// 将至多 `dst.len()` 字节写入 `dst`，返回实际写入的字节数。
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, CoreError>;

    /// 借出至多 `max` 字节；实现可以共享内部缓冲以避免拷贝。
    fn read_str(&mut self, max: usize) -> Result<Bytes, CoreError>;

    /// 是否已到达流尾。独立于错误状态。
    fn eof(&self) -> bool;

    /// 读取剩余的整条流，优先走零拷贝路径。
    ///
    /// # 执行逻辑（How）
    /// 1. 先以最大上限调用一次 [`read_str`](Self::read_str)：已完整缓冲的
    ///    源可以在这一步把整条流零拷贝地交出来；
    /// 2. 若尚未到达 EOF，把已得数据转入可增长缓冲，按
    ///    [`DEFAULT_READ_CHUNK`] 步长反复 `read` 直至流尾；
    /// 3. 最终截断到准确长度并冻结为 [`Bytes`]。
    ///
    /// # 契约说明（What）
    /// - **后置条件**：返回串与源将产出的全部剩余字节逐字节一致；
    /// - 任一步读取失败时，源的错误原样向上传播，已读数据被丢弃。
    fn read_full_str(&mut self) -> Result<Bytes, CoreError> {
        self.read_full_str_with_chunk(DEFAULT_READ_CHUNK)
    }

    /// 与 [`read_full_str`](Self::read_full_str) 相同，但允许调用方指定
    /// 回退路径的增长步长以权衡读取次数与过量分配。
    fn read_full_str_with_chunk(&mut self, chunk: usize) -> Result<Bytes, CoreError> {
        let chunk = chunk.max(1);
        let head = self.read_str(usize::MAX)?;
        if self.eof() {
            return Ok(head);
        }
        let mut buf = BytesMut::with_capacity(head.len() + chunk);
        buf.extend_from_slice(&head);
        while !self.eof() {
            let len = buf.len();
            buf.resize(len + chunk, 0);
            let read = self.read(&mut buf[len..])?;
            buf.truncate(len + read);
        }
        Ok(buf.freeze())
    }
}
