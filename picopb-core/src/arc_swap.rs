//! 条件性 `ArcSwap` 适配层。
//!
//! # 设计初衷（Why）
//! - 引用计数图的“组指针”需要在冻结后支持无锁读取：`std` 轨道直接复用社区
//!   成熟的 [`arc-swap`](https://crates.io/crates/arc-swap) 实现；
//! - 在 `no_std + alloc` 轨道，该三方库的相应能力尚需 nightly 特性，不符合
//!   本仓库稳定版基线，因此提供一个接口相同的轻量回退实现。
//!
//! # 使用方式（How）
//! - 业务代码统一通过 `crate::arc_swap::ArcSwap` 导入类型；
//! - `std` 构建 `pub use` 第三方实现；纯 `alloc` 构建使用内部以
//!   `spin::RwLock` 封装的仿制结构。
//!
//! # 契约说明（What）
//! - API 限定为 `new`、`from_pointee`、`load_full`、`store` 四个方法，
//!   两个轨道行为一致；
//! - 回退实现保证线程安全与 `Arc` 快照语义，但读路径不再是锁自由的。
//!
//! # 权衡与注意事项（Trade-offs）
//! - 回退实现以自旋锁换取 `no_std` 可用性，会牺牲部分读性能；受限环境
//!   通常接受以正确性优先；
//! - 一旦上游库在稳定版提供 `no_std` 支持，可移除回退并恢复单一依赖。

#[cfg(feature = "std")]
pub use ::arc_swap::ArcSwap;

#[cfg(not(feature = "std"))]
mod fallback {
    use alloc::sync::Arc;
    use core::fmt;
    use spin::RwLock;

    /// `no_std` 环境下的精简 `ArcSwap` 仿制实现。
    ///
    /// - **意图（Why）**：未启用 `std` 时维持与上层契约兼容的 API，避免在
    ///   引用计数路径铺开条件编译分支。
    /// - **逻辑（How）**：内部以 `spin::RwLock<Arc<T>>` 保存快照；读操作取
    ///   共享锁并克隆 `Arc`，写操作取独占锁并替换。
    /// - **契约（What）**：`load_full` 返回的 `Arc<T>` 与最近一次 `store`
    ///   写入值一致；跨线程共享要求 `T: Send + Sync`。
    /// - **注意事项（Trade-offs）**：写操作会短暂阻塞读者，极端低延迟场景
    ///   应优先选择 `std` 轨道。
    pub struct ArcSwap<T> {
        inner: RwLock<Arc<T>>,
    }

    impl<T> ArcSwap<T> {
        /// 构造新的交换容器。
        pub fn new(initial: Arc<T>) -> Self {
            Self {
                inner: RwLock::new(initial),
            }
        }

        /// 以值语义构造容器，内部自动封装为 `Arc`。
        pub fn from_pointee(value: T) -> Self {
            Self::new(Arc::new(value))
        }

        /// 读取当前快照；克隆仅增加引用计数，不复制 `T`。
        pub fn load_full(&self) -> Arc<T> {
            self.inner.read().clone()
        }

        /// 用新的快照替换当前值，旧快照在所有持有者释放后回收。
        pub fn store(&self, value: Arc<T>) {
            *self.inner.write() = value;
        }
    }

    impl<T: fmt::Debug> fmt::Debug for ArcSwap<T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("ArcSwap")
                .field("inner", &self.inner.read())
                .finish()
        }
    }
}

#[cfg(not(feature = "std"))]
pub use fallback::ArcSwap;
