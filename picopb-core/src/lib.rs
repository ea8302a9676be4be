#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![allow(private_bounds)]
#![doc = "picopb-core：极简 Protocol Buffers 库的运行时核心。"]
#![doc = ""]
#![doc = "本 crate 只承载两块硬核心：其一是把线级字节源/汇与结构化事件消费者解耦的流式分发框架（字节通道 + 处理器集合 + 嵌套感知分发器）；其二是面向定义对象图的分组式引用计数子系统（保守合并 + 冻结期强连通分量精确化）。"]
#![doc = ""]
#![doc = "== 协作者边界 =="]
#![doc = "线格式编解码表、描述符解析、具体字节源实现（文件、套接字、内存映射）均为外部协作者；本 crate 只消费它们实现的契约（`ByteSource`/`ByteSink`/`HandlerSet`/`Refcounted`）。"]
#![doc = ""]
#![doc = "== 内存分配依赖 =="]
#![doc = "核心契约依赖 [`alloc`] 中的 `Box`、`Arc`、`Vec` 支撑投递单元传递、组链表与冻结簿记；纯 `no_std`（无分配器）环境暂不支持。"]

extern crate alloc;

mod sealed;

pub mod arc_swap;
pub mod dispatch;
pub mod error;
pub mod observability;
pub mod prelude;
pub mod refcount;
pub mod stream;
/// 测试桩命名空间，集中暴露官方维护的 `Noop`/`Recording` 实现，供集成
/// 测试与示例复用。
pub mod test_stubs;

pub use dispatch::{
    Closure, Dispatcher, FieldKey, Flow, HandlerSet, Handlers, MAX_NESTING, WireValue,
};
pub use error::{CoreError, ErrorCause, Result, codes};
pub use observability::{
    AttributeSet, AttributeValue, KeyValue, LogRecord, LogSeverity, Logger,
};
pub use refcount::{
    FreezeOptions, OwnerId, RefBase, Refcounted, RefcountedRef, acquire, check, donate, freeze,
    group_count, group_size, individual_count, is_frozen, link, release, same_group, unlink,
};
pub use stream::{ByteSink, ByteSource, DEFAULT_READ_CHUNK};

use alloc::boxed::Box;
use core::fmt;

/// 本 crate 所有错误必须实现的 `no_std` 基础 Trait。
///
/// # 设计背景（Why）
/// - `std::error::Error` 在 `no_std` 环境不可用，需要一个对象安全、与
///   平台无关的错误抽象来串联底层错误链；
/// - 该 Trait 是所有错误类型的最小公共接口，支撑 `alloc` 场景下的跨
///   模块错误传递。
///
/// # 逻辑解析（How）
/// - 约束实现者提供 `Debug` 与 `Display`，便于日志收集；
/// - `source` 递归返回链路上游错误，与 `std::error::Error::source` 语义
///   一致，从而兼容现有生态的错误处理约定。
///
/// # 契约说明（What）
/// - **前置条件**：实现类型须为 `'static` 生命周期；
/// - **返回契约**：`source` 返回的引用生命周期受限于 `self`，防止悬垂。
pub trait Error: fmt::Debug + fmt::Display + crate::sealed::Sealed {
    /// 返回当前错误的上游来源。
    fn source(&self) -> Option<&(dyn Error + 'static)>;
}

impl<E> Error for Box<E>
where
    E: Error + ?Sized,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        (**self).source()
    }
}
