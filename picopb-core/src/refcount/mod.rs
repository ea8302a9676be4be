//! 可循环引用的分组式引用计数图。
//!
//! # 模块定位（Why）
//! - 消息、字段、枚举等定义对象之间可以构成任意有向图（包括环），传统的
//!   逐对象引用计数无法回收环；追踪式 GC 又超出一个被动库的本分；
//! - 解法是把对象划分成“组”：组内引用彼此抵消，整组共享一个计数，计数
//!   统计的是从组外进入的引用总数。环一旦整体不可达，组计数归零，全组
//!   一次性回收；
//! - 可变阶段的分组是保守的——两个对象之间只要出现过一条对象间引用，就
//!   永久同组（合并从不拆分）；冻结（[`freeze`]）是精确化的摊还点：一次
//!   强连通分量划分之后，每个组恰好是一个 SCC，此后计数精确、回收即时，
//!   且冻结对象可跨线程无锁共享。
//!
//! # 引用的两个种类（What）
//! - **外部引用**（[`acquire`] / [`release`]）：由应用根（非图内对象）持
//!   有，以 [`OwnerId`] 标识归属；
//! - **对象间引用**（[`link`] / [`unlink`]）：由图内对象指向图内对象，
//!   可能成环。可变阶段 `link` 触发组合并，`unlink` 在结构上是空操作
//!   （保守分组在冻结前不回收，这是明确的设计决定）；冻结阶段跨组的
//!   `link`/`unlink` 退化为对目标组计数的原子增减。
//!
//! # 并发模型（How）
//! - 可变图的所有操作都在模块级全局锁下执行：组合并会触碰无界的成员
//!   链表，细粒度锁在组身份随合并漂移时无法建立稳定的加锁顺序；
//! - 冻结对象的 `acquire`/`release` 走无锁路径：组指针经
//!   [`ArcSwap`](crate::arc_swap::ArcSwap) 快照读取，计数为原子增减。
//!
//! # 内存锚定（Gotchas）
//! - 组的环状 `next` 链持有成员的 `Arc` 句柄，因此“组计数 > 0”即可保证
//!   成员存活，与外部是否还留着 `Arc` 无关；
//! - 组回收先沿链收集成员、对离组边做计数平衡，再断链并逐个调用
//!   [`Refcounted::release`]；实际内存在最后一个 `Arc` 句柄消失时由
//!   `Arc` 归还。泄漏语义与手工计数一致：外部引用不配平，对象就不死。

#[cfg(feature = "audit")]
mod audit;
mod freeze;

pub use freeze::{FreezeOptions, freeze};

use crate::arc_swap::ArcSwap;
use crate::sealed::Sealed;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::panic::Location;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering, fence};
use spin::Mutex;

/// 参与引用计数图的对象句柄。
pub type RefcountedRef = Arc<dyn Refcounted>;

/// 外部引用的归属标识。
///
/// # 设计背景（Why）
/// - 每个外部引用都记账到一个稳定的归属者，调试审计（`audit` 特性）据此
///   把引用泄漏归因到取引用的代码位置而非对象创建处；
/// - 拿不到稳定指针时可使用 [`OwnerId::UNTRACKED`]，它与任何真实指针值
///   可区分，引用照常计数、只是不再归因。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
    /// 不做归因的哨兵归属者。
    pub const UNTRACKED: OwnerId = OwnerId(usize::MAX);

    /// 以任意对象的地址构造归属标识。
    pub fn of<T: ?Sized>(owner: &T) -> Self {
        Self(owner as *const T as *const () as usize)
    }

    /// 是否为哨兵归属者。
    pub fn is_untracked(self) -> bool {
        self == Self::UNTRACKED
    }
}

/// 整组共享的 32 位引用计数单元。
///
/// 可变阶段在全局锁下更新，冻结阶段只做原子增减；`sub_one` 在归零时
/// 插入 Acquire 栅栏，保证回收线程观察到其余线程对组的全部写入。
#[derive(Debug)]
pub(crate) struct GroupCell {
    count: AtomicU32,
}

impl GroupCell {
    pub(crate) fn with_count(count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
        }
    }

    pub(crate) fn get(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub(crate) fn add(&self, n: u32) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// 自减一并返回余量；归零的调用方负责发起组回收。
    pub(crate) fn sub_one(&self) -> u32 {
        let prev = self.count.fetch_sub(1, Ordering::Release);
        debug_assert!(prev > 0, "group count underflow");
        if prev == 1 {
            fence(Ordering::Acquire);
        }
        prev - 1
    }
}

/// 每个参与类型内嵌的引用计数基座。
///
/// # 字段语义（What）
/// - `group`：指向整组共享的计数单元，组合并与冻结会整体重写该指针；
/// - `next`：组内成员的环状单链；`None` 编码单元素组的自环；
/// - `individual_count`：仅在可变阶段有意义的本对象外部引用数，组计数
///   恒等于组内成员该值之和；
/// - `frozen`：一次性的可变 → 冻结迁移标志，置位后图拓扑不再变化。
pub struct RefBase {
    group: ArcSwap<GroupCell>,
    next: Mutex<Option<RefcountedRef>>,
    individual_count: AtomicU32,
    frozen: AtomicBool,
    #[cfg(feature = "audit")]
    audit: audit::AuditTables,
}

impl RefBase {
    /// 创建单元素组：计数为 1，唯一一个外部引用记账给 `owner`。
    #[track_caller]
    pub fn new(owner: OwnerId) -> Self {
        let location = Location::caller();
        let base = Self {
            group: ArcSwap::from_pointee(GroupCell::with_count(1)),
            next: Mutex::new(None),
            individual_count: AtomicU32::new(1),
            frozen: AtomicBool::new(false),
            #[cfg(feature = "audit")]
            audit: audit::AuditTables::new(),
        };
        audit_track_ref1(&base, owner, location);
        base
    }

    /// 对象是否已冻结。冻结是单向迁移。
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

impl fmt::Debug for RefBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefBase")
            .field("group_count", &self.group.load_full().get())
            .field(
                "individual_count",
                &self.individual_count.load(Ordering::Relaxed),
            )
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

/// 引用计数图的参与者契约。
///
/// # 契约说明（What）
/// - [`base`](Self::base) 暴露内嵌的 [`RefBase`]，实现者应把它作为结构体
///   字段直接持有；
/// - [`visit`](Self::visit) 必须枚举当前经由 [`link`] 持有的全部出边目标
///   ——不多也不少。该方法会被冻结与回收路径反复调用，实现不得跨 `emit`
///   回调持有不可重入的内部状态；
/// - [`release`](Self::release) 在对象所在组死亡时恰好被调用一次：释放
///   自身资源并丢弃全部出边句柄。此处**不得**调用 [`unlink`]，离组边的
///   计数平衡由回收流程统一完成。
///
/// # 风险提示（Trade-offs）
/// - `visit` 的输出与真实出边不一致会直接破坏冻结划分与回收的正确性；
///   `audit` 特性会在冻结前比对记账的边集并断言一致。
pub trait Refcounted: Send + Sync + 'static + Sealed {
    /// 暴露内嵌的引用计数基座。
    fn base(&self) -> &RefBase;

    /// 枚举当前持有的全部对象间引用目标。
    fn visit(&self, emit: &mut dyn FnMut(&RefcountedRef));

    /// 释放自身资源与出边句柄；每对象恰好调用一次。
    fn release(&self);
}

// 可变图的全局互斥：组合并触碰无界链表，组身份又随合并漂移，无法为
// 细粒度锁建立稳定顺序，因此可变路径整体串行化。
static MUTABLE_GRAPH_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn lock_mutable_graph() -> spin::MutexGuard<'static, ()> {
    MUTABLE_GRAPH_LOCK.lock()
}

/// 以数据指针标识对象身份；胖指针的 vtable 分量被有意丢弃。
pub(crate) fn ident(obj: &RefcountedRef) -> usize {
    Arc::as_ptr(obj) as *const () as usize
}

/// 对象是否已冻结。
pub fn is_frozen(obj: &RefcountedRef) -> bool {
    obj.base().is_frozen()
}

/// 为 `owner` 增加一个外部引用。
///
/// 冻结路径无锁：快照组指针后原子自增；可变路径在全局锁下同时维护
/// `individual_count` 与组计数（两者之和不变式由锁保证原子可见）。
#[track_caller]
pub fn acquire(obj: &RefcountedRef, owner: OwnerId) {
    let location = Location::caller();
    let base = obj.base();
    if base.is_frozen() {
        base.group.load_full().add(1);
    } else {
        let _guard = lock_mutable_graph();
        base.individual_count.fetch_add(1, Ordering::Relaxed);
        base.group.load_full().add(1);
    }
    audit_track_ref1(base, owner, location);
}

/// 归还 `owner` 持有的外部引用；组计数归零时回收整组。
///
/// # 契约说明（What）
/// - **前置条件**：`owner` 确实持有一个经由 [`RefBase::new`]、[`acquire`]
///   或 [`donate`] 获得的引用（`audit` 特性下断言）；
/// - **后置条件**：若这是组的最后一个外部引用，组内每个成员的
///   [`Refcounted::release`] 恰好执行一次，离组引用被逐一平衡，可能级联
///   回收下游组。
pub fn release(obj: &RefcountedRef, owner: OwnerId) {
    let base = obj.base();
    audit_untrack_ref1(base, owner);
    if base.is_frozen() {
        if base.group.load_full().sub_one() == 0 {
            teardown_group(obj);
        }
    } else {
        let dead = {
            let _guard = lock_mutable_graph();
            let prev = base.individual_count.fetch_sub(1, Ordering::Relaxed);
            debug_assert!(prev > 0, "external ref underflow");
            base.group.load_full().sub_one() == 0
        };
        // 用户的 release 回调在锁外执行，避免回调内的冻结路径操作与
        // 全局锁发生不必要的嵌套。
        if dead {
            teardown_group(obj);
        }
    }
}

/// 把一个既有外部引用的归属从 `from` 移交给 `to`，总计数不变。
///
/// `from` 可以是 [`OwnerId::UNTRACKED`]；`to` 必须是真实归属者。关闭
/// `audit` 特性时本操作没有可观察效果。
#[track_caller]
pub fn donate(obj: &RefcountedRef, from: OwnerId, to: OwnerId) {
    debug_assert!(!to.is_untracked(), "donation target must be a real owner");
    if from == to {
        return;
    }
    audit_move_ref1(obj.base(), from, to, Location::caller());
}

/// 校验 `owner` 当前持有对 `obj` 的外部引用；仅 `audit` 特性下生效。
pub fn check(obj: &RefcountedRef, owner: OwnerId) {
    audit_check_ref1(obj.base(), owner);
}

/// 建立对象间引用：`from` 此后经由 [`Refcounted::visit`] 报告指向
/// `target` 的出边。
///
/// # 契约说明（What）
/// - **前置条件**：`from` 必须是可变对象（冻结对象的拓扑不可再变）；
///   `from` 不得已持有指向同一 `target` 的对象间引用；
/// - **后置条件**：两端均可变时两组合并为一组（计数相加、链表拼接），
///   `target` 已冻结时其组计数原子加一；
/// - 该引用无需在 `from` 的 [`Refcounted::release`] 中显式归还。
#[track_caller]
pub fn link(target: &RefcountedRef, from: &RefcountedRef) {
    let location = Location::caller();
    debug_assert!(!from.base().is_frozen(), "link source must be mutable");
    if target.base().is_frozen() {
        target.base().group.load_full().add(1);
    } else {
        let _guard = lock_mutable_graph();
        merge(target, from);
    }
    audit_track_ref2(target, from, location);
}

/// 解除对象间引用。
///
/// 可变目标：结构上是空操作——保守分组在冻结前不回收，组既不拆分、
/// 计数也不变化；冻结目标：原子递减其组计数，归零时回收。仅当 `from`
/// 已不再指向 `target` 且二者都继续存活时才需要调用本函数；
/// [`Refcounted::release`] 内部不得调用。
pub fn unlink(target: &RefcountedRef, from: &RefcountedRef) {
    debug_assert!(!from.base().is_frozen(), "unlink source must be mutable");
    audit_untrack_ref2(target, from);
    if target.base().is_frozen()
        && target.base().group.load_full().sub_one() == 0
    {
        teardown_group(target);
    }
}

/// 组计数观察器，供诊断与测试断言不变式。
pub fn group_count(obj: &RefcountedRef) -> u32 {
    obj.base().group.load_full().get()
}

/// 本对象的外部引用数；仅在可变阶段有意义。
pub fn individual_count(obj: &RefcountedRef) -> u32 {
    obj.base().individual_count.load(Ordering::Relaxed)
}

/// 两个对象当前是否同组。
pub fn same_group(a: &RefcountedRef, b: &RefcountedRef) -> bool {
    Arc::ptr_eq(&a.base().group.load_full(), &b.base().group.load_full())
}

/// 当前组的成员数。
pub fn group_size(obj: &RefcountedRef) -> usize {
    group_members(obj).len()
}

/// 沿环状链收集组内全部成员，起点在首位。
pub(crate) fn group_members(start: &RefcountedRef) -> Vec<RefcountedRef> {
    let mut members: Vec<RefcountedRef> = Vec::new();
    members.push(start.clone());
    let mut cursor = start.base().next.lock().clone();
    while let Some(node) = cursor {
        if ident(&node) == ident(start) {
            break;
        }
        let next = node.base().next.lock().clone();
        members.push(node);
        cursor = next;
    }
    members
}

/// 组合并（调用方持有全局锁，两端均可变）。
///
/// 同组时直接返回；否则把 `target` 所在组的计数并入 `from` 所在组、
/// 重写其全体成员的组指针，最后把两条环状链在 `target`/`from` 处拼接。
fn merge(target: &RefcountedRef, from: &RefcountedRef) {
    let target_group = target.base().group.load_full();
    let from_group = from.base().group.load_full();
    if Arc::ptr_eq(&target_group, &from_group) {
        return;
    }
    from_group.add(target_group.get());
    for member in group_members(target) {
        member.base().group.store(from_group.clone());
    }
    let target_next = target
        .base()
        .next
        .lock()
        .take()
        .unwrap_or_else(|| target.clone());
    let from_next = from
        .base()
        .next
        .lock()
        .take()
        .unwrap_or_else(|| from.clone());
    *target.base().next.lock() = Some(from_next);
    *from.base().next.lock() = Some(target_next);
}

/// 回收计数已归零的组，必要时级联回收下游组。
///
/// # 执行逻辑（How）
/// 1. 沿环状链收集成员；
/// 2. 平衡离组引用：对每条指向组外的出边递减目标组计数，归零的目标组
///    进入工作队列（循环而非递归，避免深链打穿调用栈）；
/// 3. 断开环状链（成员从此只由外部 `Arc` 句柄锚定）；
/// 4. 逐成员调用 [`Refcounted::release`]。
///
/// 离组边的目标必然已冻结：可变阶段的对象间引用总在组内。
fn teardown_group(seed: &RefcountedRef) {
    let mut dead_groups: Vec<RefcountedRef> = Vec::new();
    dead_groups.push(seed.clone());
    while let Some(start) = dead_groups.pop() {
        let members = group_members(&start);
        for member in &members {
            let member_group = member.base().group.load_full();
            member.visit(&mut |subobj| {
                let sub_group = subobj.base().group.load_full();
                if !Arc::ptr_eq(&member_group, &sub_group) {
                    debug_assert!(
                        subobj.base().is_frozen(),
                        "cross-group edges must target frozen objects"
                    );
                    audit_untrack_ref2(subobj, member);
                    if sub_group.sub_one() == 0 {
                        dead_groups.push(subobj.clone());
                    }
                }
            });
        }
        for member in &members {
            *member.base().next.lock() = None;
        }
        for member in &members {
            member.release();
        }
    }
}

#[cfg(feature = "audit")]
fn audit_track_ref1(base: &RefBase, owner: OwnerId, location: &'static Location<'static>) {
    base.audit.track_ref1(owner, location);
}

#[cfg(not(feature = "audit"))]
fn audit_track_ref1(_base: &RefBase, _owner: OwnerId, _location: &'static Location<'static>) {}

#[cfg(feature = "audit")]
fn audit_untrack_ref1(base: &RefBase, owner: OwnerId) {
    base.audit.untrack_ref1(owner);
}

#[cfg(not(feature = "audit"))]
fn audit_untrack_ref1(_base: &RefBase, _owner: OwnerId) {}

#[cfg(feature = "audit")]
fn audit_move_ref1(
    base: &RefBase,
    from: OwnerId,
    to: OwnerId,
    location: &'static Location<'static>,
) {
    base.audit.move_ref1(from, to, location);
}

#[cfg(not(feature = "audit"))]
fn audit_move_ref1(
    _base: &RefBase,
    _from: OwnerId,
    _to: OwnerId,
    _location: &'static Location<'static>,
) {
}

#[cfg(feature = "audit")]
fn audit_check_ref1(base: &RefBase, owner: OwnerId) {
    base.audit.check_ref1(owner);
}

#[cfg(not(feature = "audit"))]
fn audit_check_ref1(_base: &RefBase, _owner: OwnerId) {}

#[cfg(feature = "audit")]
fn audit_track_ref2(
    target: &RefcountedRef,
    from: &RefcountedRef,
    location: &'static Location<'static>,
) {
    target
        .base()
        .audit
        .track_ref2_incoming(OwnerId(ident(from)), location);
    from.base().audit.record_outgoing(ident(target));
}

#[cfg(not(feature = "audit"))]
fn audit_track_ref2(
    _target: &RefcountedRef,
    _from: &RefcountedRef,
    _location: &'static Location<'static>,
) {
}

#[cfg(feature = "audit")]
fn audit_untrack_ref2(target: &RefcountedRef, from: &RefcountedRef) {
    target
        .base()
        .audit
        .untrack_ref2_incoming(OwnerId(ident(from)));
    from.base().audit.remove_outgoing(ident(target));
}

#[cfg(not(feature = "audit"))]
fn audit_untrack_ref2(_target: &RefcountedRef, _from: &RefcountedRef) {}

#[cfg(feature = "audit")]
pub(crate) fn audit_verify_edges(obj: &RefcountedRef) {
    use alloc::collections::BTreeMap;
    let mut observed: BTreeMap<usize, u32> = BTreeMap::new();
    obj.visit(&mut |subobj| {
        *observed.entry(ident(subobj)).or_insert(0) += 1;
    });
    obj.base().audit.assert_outgoing_matches(&observed);
}

#[cfg(not(feature = "audit"))]
pub(crate) fn audit_verify_edges(_obj: &RefcountedRef) {}
