//! 引用计数图桩：携带可配置出边与释放日志的最小参与者。

use crate::refcount::{self, RefBase, Refcounted, RefcountedRef, OwnerId};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// 多个节点共享的释放日志，按 [`Refcounted::release`] 的调用顺序记录
/// 节点标签。
pub type ReleaseLog = Arc<Mutex<Vec<String>>>;

/// 构造一份空释放日志。
pub fn release_log() -> ReleaseLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// 最小的图参与者：标签 + 出边集合 + 共享释放日志。
///
/// # 行为说明（How）
/// - 出边以 `Arc` 句柄存于自旋锁内，[`Refcounted::visit`] 逐一上报；
/// - [`Refcounted::release`] 把标签写入共享日志并清空出边句柄——离组
///   引用的计数平衡由回收流程负责，这里只丢所有权。
pub struct StubNode {
    base: RefBase,
    label: String,
    edges: Mutex<Vec<RefcountedRef>>,
    log: ReleaseLog,
}

impl StubNode {
    /// 创建节点并把唯一的外部引用记账给 `owner`。
    #[track_caller]
    pub fn create(label: impl Into<String>, owner: OwnerId, log: &ReleaseLog) -> Arc<Self> {
        Arc::new(Self {
            base: RefBase::new(owner),
            label: label.into(),
            edges: Mutex::new(Vec::new()),
            log: log.clone(),
        })
    }

    /// 建立 `from → target` 的对象间引用并登记出边句柄。
    #[track_caller]
    pub fn link_edge(from: &Arc<Self>, target: &RefcountedRef) {
        let from_dyn: RefcountedRef = from.clone();
        refcount::link(target, &from_dyn);
        from.edges.lock().push(target.clone());
    }

    /// 解除 `from → target` 的对象间引用并移除出边句柄。
    pub fn unlink_edge(from: &Arc<Self>, target: &RefcountedRef) {
        let from_dyn: RefcountedRef = from.clone();
        refcount::unlink(target, &from_dyn);
        from.edges
            .lock()
            .retain(|edge| !Arc::ptr_eq(edge, target));
    }

    /// 节点标签。
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Refcounted for StubNode {
    fn base(&self) -> &RefBase {
        &self.base
    }

    fn visit(&self, emit: &mut dyn FnMut(&RefcountedRef)) {
        for edge in self.edges.lock().iter() {
            emit(edge);
        }
    }

    fn release(&self) {
        self.log.lock().push(self.label.clone());
        self.edges.lock().clear();
    }
}
