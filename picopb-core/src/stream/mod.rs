//! 字节通道：解码器与编码器赖以工作的拉式/推式字节接口。
//!
//! # 模块定位（Why）
//! - 把“字节从哪里来、到哪里去”与“事件如何被消费”彻底解耦：本模块只定义
//!   字节源与字节汇的对象安全契约，具体实现（文件、套接字、内存映射）由
//!   宿主提供；
//! - 契约显式区分“零拷贝借出”与“拷贝读取”两条路径，允许已缓冲的源直接
//!   共享内部缓冲区。
//!
//! # 契约说明（What）
//! - 错误统一以 [`CoreError`](crate::CoreError) 经 `Result` 传播；
//! - 流结束（EOF）不是错误，经由独立的布尔标志暴露。

mod sink;
mod source;

pub use sink::ByteSink;
pub use source::ByteSource;

/// `read_full_str` 回退拷贝路径的默认增长步长（字节）。
///
/// 该值权衡底层 `read` 调用次数与尾部过量分配：更大的步长减少调用次数，
/// 但在流即将结束时浪费更多容量。
pub const DEFAULT_READ_CHUNK: usize = 4096;
