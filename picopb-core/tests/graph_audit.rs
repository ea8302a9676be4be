#![cfg(feature = "audit")]
//! 追踪引用审计层的契约测试（`audit` 特性）。
//!
//! - **核心目标 (Why)**：审计层承诺把所有权违例就地断言——同一归属者
//!   重复取引用、归还未持有的引用、`visit` 输出与记账边集失配；同时
//!   校验关闭特性时的主路径语义不受记账影响（由其余测试文件覆盖）。
//! - **设计手法 (How)**：违例路径以 `#[should_panic]` 钉住断言消息前缀；
//!   合法路径复用 `StubNode` 驱动完整的取还与冻结流程。

use picopb_core::refcount::{self, FreezeOptions, OwnerId, RefcountedRef, freeze};
use picopb_core::test_stubs::graph::{StubNode, release_log};

/// - **意图 (Why)**：合法的取还与移交全程不触发断言，`check` 能确认当前持有者。
/// - **实现说明 (How)**：创建 → 追加引用 → 移交 → 逐一归还，途中多次 `check`。
/// - **契约 (What)**：流程顺利走完且对象恰好释放一次。
#[test]
fn balanced_ownership_passes_audit() {
    let log = release_log();
    let first = 0u8;
    let second = 0u8;
    let owner = OwnerId::of(&first);
    let extra = OwnerId::of(&second);

    let node = StubNode::create("audited", owner, &log);
    let node_dyn: RefcountedRef = node.clone();
    refcount::check(&node_dyn, owner);

    refcount::acquire(&node_dyn, extra);
    refcount::check(&node_dyn, extra);
    refcount::release(&node_dyn, extra);

    refcount::donate(&node_dyn, owner, extra);
    refcount::check(&node_dyn, extra);
    refcount::release(&node_dyn, extra);
    assert_eq!(log.lock().as_slice(), &["audited"]);
}

/// - **意图 (Why)**：同一归属者不得重复持有同一对象的引用，违例必须立即暴露。
#[test]
#[should_panic(expected = "already holds a tracked ref")]
fn double_ref_by_same_owner_asserts() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);
    let node = StubNode::create("dup", owner, &log);
    let node_dyn: RefcountedRef = node.clone();
    refcount::acquire(&node_dyn, owner);
}

/// - **意图 (Why)**：归还从未持有的引用是所有权违例，而非静默的计数扰动。
#[test]
#[should_panic(expected = "does not hold a tracked external ref")]
fn releasing_foreign_ref_asserts() {
    let log = release_log();
    let holder = 0u8;
    let stranger = 0u8;
    let owner = OwnerId::of(&holder);
    let node = StubNode::create("foreign", owner, &log);
    let node_dyn: RefcountedRef = node.clone();
    refcount::release(&node_dyn, OwnerId::of(&stranger));
}

/// - **意图 (Why)**：冻结前比对 `visit` 输出与记账边集，漏报边的实现必须被拦下。
/// - **实现说明 (How)**：正常建边的节点冻结应当通过比对。
#[test]
fn freeze_verifies_recorded_edges() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let a = StubNode::create("a", owner, &log);
    let b = StubNode::create("b", owner, &log);
    let a_dyn: RefcountedRef = a.clone();
    let b_dyn: RefcountedRef = b.clone();
    StubNode::link_edge(&a, &b_dyn);

    freeze(&[a_dyn.clone(), b_dyn.clone()], &FreezeOptions::new())
        .expect("consistent edges pass the audit pre-check");

    refcount::release(&b_dyn, owner);
    refcount::release(&a_dyn, owner);
    assert_eq!(log.lock().len(), 2);
}
