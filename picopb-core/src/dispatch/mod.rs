//! 事件分发层：把解码产物路由到处理器集合的嵌套感知状态机。
//!
//! # 模块定位（Why）
//! - 解码器只负责还原“消息开始/字段值/子消息边界”这类结构化事件，本模块
//!   负责把它们送达当前生效的处理器集合，并在子消息边界正确完成委托交接；
//! - 深度受编译期常量约束：面对攻击者可控输入时，无界递归是拒绝服务风险。
//!
//! # 组成（What）
//! - [`Flow`]：处理器回调用于操控分发进程的返回值；
//! - [`FieldKey`] / [`WireValue`]：事件携带的字段标识与标量载荷；
//! - [`HandlerSet`] / [`Handlers`] / [`Closure`]：回调表、其用户态闭包与
//!   两者打包成的按值传递单元；
//! - [`Dispatcher`]：有界帧栈状态机本体。

mod dispatcher;
mod handler;

pub use dispatcher::{Dispatcher, MAX_NESTING};
pub use handler::{Closure, HandlerSet, Handlers};

use bytes::Bytes;
use core::num::NonZeroU32;

/// 处理器回调用来操控分发进程的流向枚举。
///
/// # 契约说明（What）
/// - `Continue`：继续向当前处理器集合投递事件；
/// - `SkipSubmessage`：请求解码侧跳过当前子消息的剩余部分；
/// - `Break`：请求解码侧停止整个分发过程；
/// - `Delegate`：仅允许从 [`HandlerSet::on_start_submsg`] 返回，表示子
///   消息交由出参填入的新处理器集合消费。
///
/// # 风险提示（Trade-offs）
/// - 解码侧永远不会观察到 `Delegate`：分发器在完成压栈后会把它改写为
///   `Continue`，两者不可混同。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    SkipSubmessage,
    Break,
    Delegate,
}

/// 字段标识：分发器只负责转交，从不解释其语义。
///
/// Protocol Buffers 的字段编号从 1 起始，故以 `NonZeroU32` 承载，使
/// `Option<FieldKey>` 保持与裸 `u32` 相同的布局。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FieldKey(NonZeroU32);

impl FieldKey {
    /// 由字段编号构造；`0` 不是合法编号。
    pub fn new(number: u32) -> Option<Self> {
        NonZeroU32::new(number).map(Self)
    }

    /// 取回字段编号。
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

/// 事件携带的标量载荷，覆盖线格式可直接还原的全部标量种类。
///
/// # 设计背景（Why）
/// - 分发层对载荷保持透明：变体集合即协议标量类型的并集，字节类载荷以
///   [`Bytes`] 承载以维持零拷贝传递。
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum WireValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Bool(bool),
    Bytes(Bytes),
}
