//! 内部 sealed 模块，用于控制对外 Trait 的扩展边界。
//!
//! # 设计背景（Why）
//! - 本 crate 对外暴露若干可实现的契约（字节通道、事件处理器、引用计数参与者），
//!   需要在 SemVer 约束下为未来追加默认方法或强化约束保留空间。
//! - 统一的 `Sealed` 标记让我们可以在不破坏公开签名的前提下演进这些契约。
//!
//! # 逻辑解析（How）
//! - 定义 crate 私有 Trait `Sealed` 并对所有类型提供 blanket 实现；
//! - 公开 Trait 通过 `: crate::sealed::Sealed` 间接依赖该标记；
//! - 未来若需收紧实现者集合，仅需修改此处的 blanket 条件。
//!
//! # 契约说明（What）
//! - 调用方无需显式实现 `Sealed`，任何类型默认满足；
//! - 各公开 Trait 的前置/后置条件仍在各自定义处描述，本模块只承载“实现许可”。
//!
//! # 风险与考量（Trade-offs）
//! - 当前的 blanket 实现并不真正限制实现者，属于面向演进的防御姿态；
//!   若日后收紧，需要同步发布兼容性公告。
pub(crate) trait Sealed {}

impl<T: ?Sized> Sealed for T {}
