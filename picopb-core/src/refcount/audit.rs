//! 追踪引用审计表（`audit` 特性）。
//!
//! # 模块定位（Why）
//! - 引用计数的所有权规则（谁取的引用谁归还、同一归属者不得重复取引用）
//!   违例时症状往往远离现场；为每个引用记下归属者与取引用的代码位置，
//!   可以把泄漏与错还直接归因到肇事调用点；
//! - 记账同时覆盖对象间引用的出边集合，冻结前与 [`Refcounted::visit`]
//!   （见 [`super::Refcounted`]）的实际输出比对，尽早暴露“漏报/多报边”
//!   一类实现缺陷。
//!
//! # 契约说明（What）
//! - 本模块纯诊断：关闭特性时全部入口退化为空操作，不改变可观察行为；
//! - 断言在 release 构建同样生效——启用特性即表示接受这笔开销。

use super::OwnerId;
use alloc::collections::BTreeMap;
use core::panic::Location;
use core::sync::atomic::{AtomicU32, Ordering};
use spin::Mutex;

/// 单条被追踪引用的记录。
#[derive(Clone, Copy, Debug)]
struct TrackedRef {
    /// 取引用的代码位置，用于泄漏归因。
    location: &'static Location<'static>,
    /// 是否为对象间引用（入边）。
    is_ref2: bool,
}

/// 每个对象随 [`RefBase`](super::RefBase) 携带的审计表。
///
/// - `refs`：归属者 → 入向引用记录（外部引用与对象间入边共用一张表）；
/// - `ref2s`：出向对象间引用的目标集合；
/// - `untracked`：哨兵归属者的引用仅计数、不归因。
pub(crate) struct AuditTables {
    refs: Mutex<BTreeMap<usize, TrackedRef>>,
    ref2s: Mutex<BTreeMap<usize, u32>>,
    untracked: AtomicU32,
}

impl AuditTables {
    pub(crate) fn new() -> Self {
        Self {
            refs: Mutex::new(BTreeMap::new()),
            ref2s: Mutex::new(BTreeMap::new()),
            untracked: AtomicU32::new(0),
        }
    }

    pub(crate) fn track_ref1(&self, owner: OwnerId, location: &'static Location<'static>) {
        if owner.is_untracked() {
            self.untracked.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let prev = self.refs.lock().insert(
            owner.0,
            TrackedRef {
                location,
                is_ref2: false,
            },
        );
        if let Some(previous) = prev {
            panic!(
                "owner already holds a tracked ref to this object (first taken at {})",
                previous.location
            );
        }
    }

    pub(crate) fn untrack_ref1(&self, owner: OwnerId) {
        if owner.is_untracked() {
            let prev = self.untracked.fetch_sub(1, Ordering::Relaxed);
            assert!(prev > 0, "untracked ref released more often than acquired");
            return;
        }
        let removed = self.refs.lock().remove(&owner.0);
        assert!(
            matches!(removed, Some(record) if !record.is_ref2),
            "owner does not hold a tracked external ref"
        );
    }

    pub(crate) fn move_ref1(
        &self,
        from: OwnerId,
        to: OwnerId,
        location: &'static Location<'static>,
    ) {
        self.untrack_ref1(from);
        self.track_ref1(to, location);
    }

    pub(crate) fn check_ref1(&self, owner: OwnerId) {
        if owner.is_untracked() {
            assert!(
                self.untracked.load(Ordering::Relaxed) > 0,
                "no untracked ref is currently held"
            );
            return;
        }
        assert!(
            matches!(self.refs.lock().get(&owner.0), Some(record) if !record.is_ref2),
            "owner does not hold a tracked external ref"
        );
    }

    pub(crate) fn track_ref2_incoming(
        &self,
        from: OwnerId,
        location: &'static Location<'static>,
    ) {
        let prev = self.refs.lock().insert(
            from.0,
            TrackedRef {
                location,
                is_ref2: true,
            },
        );
        if let Some(previous) = prev {
            panic!(
                "source object already holds a ref to this target (first taken at {})",
                previous.location
            );
        }
    }

    pub(crate) fn untrack_ref2_incoming(&self, from: OwnerId) {
        let removed = self.refs.lock().remove(&from.0);
        assert!(
            matches!(removed, Some(record) if record.is_ref2),
            "source object does not hold a tracked edge to this target"
        );
    }

    pub(crate) fn record_outgoing(&self, target: usize) {
        let prev = self.ref2s.lock().insert(target, 1);
        assert!(prev.is_none(), "duplicate outgoing edge to the same target");
    }

    pub(crate) fn remove_outgoing(&self, target: usize) {
        let removed = self.ref2s.lock().remove(&target);
        assert!(removed.is_some(), "outgoing edge was never recorded");
    }

    /// 比对记账的出边集合与 `visit` 的实际输出。
    pub(crate) fn assert_outgoing_matches(&self, observed: &BTreeMap<usize, u32>) {
        let recorded = self.ref2s.lock();
        assert!(
            *recorded == *observed,
            "visit output disagrees with tracked outgoing edges"
        );
    }
}
