//! 官方维护的测试桩集合，供集成测试与示例复用。
//!
//! # 设计定位（Why）
//! - 合约测试经常需要满足 [`ByteSource`](crate::ByteSource)、
//!   [`HandlerSet`](crate::HandlerSet)、[`Refcounted`](crate::Refcounted)
//!   等契约的最小实现，但多数场景只关注调用顺序与计数行为；
//! - 过去的经验是各测试文件重复定义桩类型，接口演进时极易漏改；集中
//!   维护可以把适配成本压到单点。
//!
//! # 使用方式（How）
//! - 通过 `use picopb_core::test_stubs::stream::*;` 等语句引入所需桩；
//! - 所有桩在 `no_std + alloc` 环境同样可用，记录型桩以自旋锁保护内部
//!   状态，可跨线程共享。
//!
//! # 契约说明（What）
//! - **前置条件**：桩仅面向测试与示例环境；生产代码若依赖应显式说明；
//! - **后置条件**：Noop 桩不产生副作用，Recording 桩只做内存内记录。

pub mod graph;
pub mod handler;
pub mod observability;
pub mod stream;
