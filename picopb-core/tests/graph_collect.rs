//! 引用计数图端到端回收场景。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：钉住三条生命周期主线——保守分组下的链式回收、
//!   可变环的整组回收、冻结后精确分组带来的独立回收；并覆盖所有权移交
//!   与冻结失败的事务性。
//! - **设计手法 (How)**：`StubNode` 把每次 `release` 追加到共享日志，
//!   测试以日志内容与 `group_*` 观察器共同断言回收时点与组结构。
//! - **契约 (What)**：每个对象恰好释放一次；冻结失败时图在观察上不变。

use picopb_core::refcount::{
    self, FreezeOptions, OwnerId, RefcountedRef, freeze, group_count, group_size, is_frozen,
    same_group,
};
use picopb_core::codes;
use picopb_core::test_stubs::graph::{StubNode, release_log};
use picopb_core::test_stubs::observability::RecordingLogger;
use picopb_core::LogSeverity;

/// - **意图 (Why)**：链 A→B→C 在可变阶段被保守地并成一组，最后一个外部引用消失时全组一起回收。
/// - **实现说明 (How)**：建链后先归还 A、B 的创建引用，仅凭 C 的引用维持整组存活。
/// - **契约 (What)**：提前归还不触发任何释放；归还 C 后三个对象各释放一次。
#[test]
fn linear_chain_collects_as_one_group() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let a = StubNode::create("a", owner, &log);
    let b = StubNode::create("b", owner, &log);
    let c = StubNode::create("c", owner, &log);
    let a_dyn: RefcountedRef = a.clone();
    let b_dyn: RefcountedRef = b.clone();
    let c_dyn: RefcountedRef = c.clone();

    StubNode::link_edge(&a, &b_dyn);
    StubNode::link_edge(&b, &c_dyn);
    assert!(same_group(&a_dyn, &c_dyn));
    assert_eq!(group_size(&a_dyn), 3);
    assert_eq!(group_count(&a_dyn), 3);

    refcount::release(&a_dyn, owner);
    refcount::release(&b_dyn, owner);
    assert!(log.lock().is_empty(), "group must survive on c's ref alone");
    assert_eq!(group_count(&c_dyn), 1);

    refcount::release(&c_dyn, owner);
    let mut released = log.lock().clone();
    released.sort();
    assert_eq!(released.as_slice(), &["a", "b", "c"]);
}

/// - **意图 (Why)**：环是分组式计数存在的理由——两个互指对象必须在最后一个外部引用消失时一起回收。
/// - **实现说明 (How)**：X↔Y 互指，仅保留 X 的外部引用，随后归还。
/// - **契约 (What)**：两个对象各释放一次，不多不少。
#[test]
fn mutable_cycle_collects_with_last_external_ref() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let x = StubNode::create("x", owner, &log);
    let y = StubNode::create("y", owner, &log);
    let x_dyn: RefcountedRef = x.clone();
    let y_dyn: RefcountedRef = y.clone();

    StubNode::link_edge(&x, &y_dyn);
    StubNode::link_edge(&y, &x_dyn);
    assert!(same_group(&x_dyn, &y_dyn));

    refcount::release(&y_dyn, owner);
    assert!(log.lock().is_empty());

    refcount::release(&x_dyn, owner);
    let mut released = log.lock().clone();
    released.sort();
    assert_eq!(released.as_slice(), &["x", "y"]);
}

/// - **意图 (Why)**：解除可变对象间引用在结构上是空操作——保守分组在冻结前永不回收。
/// - **实现说明 (How)**：建边又拆边，断言组结构与计数纹丝不动。
/// - **契约 (What)**：组大小与组计数都保持合并后的取值。
#[test]
fn mutable_unlink_is_structurally_inert() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let m = StubNode::create("m", owner, &log);
    let n = StubNode::create("n", owner, &log);
    let m_dyn: RefcountedRef = m.clone();
    let n_dyn: RefcountedRef = n.clone();

    StubNode::link_edge(&m, &n_dyn);
    assert_eq!(group_size(&m_dyn), 2);

    StubNode::unlink_edge(&m, &n_dyn);
    assert_eq!(group_size(&m_dyn), 2, "conservative grouping never splits");
    assert_eq!(group_count(&m_dyn), 2);
    assert!(same_group(&m_dyn, &n_dyn));

    refcount::release(&m_dyn, owner);
    refcount::release(&n_dyn, owner);
    assert_eq!(log.lock().len(), 2);
}

/// - **意图 (Why)**：冻结把保守大组拆成精确 SCC——环 {P,Q} 与悬挂节点 {R} 此后生命周期独立。
/// - **实现说明 (How)**：P↔Q 成环、R→Q 单向边并成一个可变组；以 {P,R} 为根冻结后先归还 R。
/// - **契约 (What)**：归还 R 只释放 R；环组计数被 R 的离组边平衡一次；随后归还 P、Q 释放环组。
#[test]
fn freeze_splits_conservative_group_into_sccs() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let p = StubNode::create("p", owner, &log);
    let q = StubNode::create("q", owner, &log);
    let r = StubNode::create("r", owner, &log);
    let p_dyn: RefcountedRef = p.clone();
    let q_dyn: RefcountedRef = q.clone();
    let r_dyn: RefcountedRef = r.clone();

    StubNode::link_edge(&p, &q_dyn);
    StubNode::link_edge(&q, &p_dyn);
    StubNode::link_edge(&r, &q_dyn);
    assert_eq!(group_size(&p_dyn), 3, "one conservative group before freeze");

    let diagnostics = RecordingLogger::new();
    freeze(
        &[p_dyn.clone(), r_dyn.clone()],
        &FreezeOptions::new().with_logger(diagnostics.clone()),
    )
    .expect("freeze succeeds within limits");

    assert!(is_frozen(&p_dyn) && is_frozen(&q_dyn) && is_frozen(&r_dyn));
    assert!(same_group(&p_dyn, &q_dyn), "cycle stays one group");
    assert!(!same_group(&r_dyn, &q_dyn), "dangling node splits off");
    assert_eq!(group_size(&p_dyn), 2);
    assert_eq!(group_size(&r_dyn), 1);
    // 环组：P、Q 各一个外部引用，外加 R→Q 的跨组入边。
    assert_eq!(group_count(&p_dyn), 3);
    assert_eq!(group_count(&r_dyn), 1);
    assert!(
        diagnostics
            .entries()
            .iter()
            .any(|(severity, _)| *severity == LogSeverity::Debug),
        "successful freeze reports partition stats"
    );

    refcount::release(&r_dyn, owner);
    assert_eq!(log.lock().as_slice(), &["r"], "r collects alone");
    assert_eq!(group_count(&p_dyn), 2, "r's outgoing edge was balanced");

    refcount::release(&p_dyn, owner);
    assert!(log.lock().len() == 1, "cycle still held by q's ref");
    refcount::release(&q_dyn, owner);
    let mut released = log.lock().clone();
    released.sort();
    assert_eq!(released.as_slice(), &["p", "q", "r"]);
}

/// - **意图 (Why)**：冻结链上的跨组边以“入边计数”的形式精确化，回收按拓扑序级联。
/// - **实现说明 (How)**：A→B→C 冻结成三个单元素组后按 a、b、c 的顺序归还外部引用。
/// - **契约 (What)**：每次归还都恰好级联到下一环，释放日志按链序排列。
#[test]
fn frozen_chain_cascades_in_topological_order() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let a = StubNode::create("a", owner, &log);
    let b = StubNode::create("b", owner, &log);
    let c = StubNode::create("c", owner, &log);
    let a_dyn: RefcountedRef = a.clone();
    let b_dyn: RefcountedRef = b.clone();
    let c_dyn: RefcountedRef = c.clone();

    StubNode::link_edge(&a, &b_dyn);
    StubNode::link_edge(&b, &c_dyn);

    freeze(
        &[a_dyn.clone(), b_dyn.clone(), c_dyn.clone()],
        &FreezeOptions::new(),
    )
    .expect("freeze succeeds within limits");

    assert_eq!(group_count(&a_dyn), 1);
    assert_eq!(group_count(&b_dyn), 2, "owner ref plus a's incoming edge");
    assert_eq!(group_count(&c_dyn), 2, "owner ref plus b's incoming edge");

    refcount::release(&b_dyn, owner);
    refcount::release(&c_dyn, owner);
    assert!(log.lock().is_empty(), "chain is pinned by a alone");

    refcount::release(&a_dyn, owner);
    assert_eq!(log.lock().as_slice(), &["a", "b", "c"]);
}

/// - **意图 (Why)**：冻结失败必须是事务性的——深度越界后图保持可变且分组不变。
/// - **实现说明 (How)**：四节点链配 `max_depth = 2`，断言错误码与图状态。
/// - **契约 (What)**：返回 `graph.max_depth`；对象未冻结、组结构保持保守合并结果。
#[test]
fn freeze_depth_overflow_leaves_graph_unchanged() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);

    let nodes: Vec<_> = ["d1", "d2", "d3", "d4"]
        .iter()
        .map(|label| StubNode::create(*label, owner, &log))
        .collect();
    let dyns: Vec<RefcountedRef> = nodes
        .iter()
        .map(|n| -> RefcountedRef { n.clone() })
        .collect();
    for i in 0..3 {
        StubNode::link_edge(&nodes[i], &dyns[i + 1]);
    }

    let err = freeze(
        &dyns,
        &FreezeOptions::new().with_max_depth(2),
    )
    .expect_err("chain of four exceeds depth 2");
    assert_eq!(err.code(), codes::GRAPH_MAX_DEPTH);

    for obj in &dyns {
        assert!(!is_frozen(obj), "failed freeze must not flip the frozen bit");
    }
    assert_eq!(group_size(&dyns[0]), 4, "conservative group is untouched");
    assert_eq!(group_count(&dyns[0]), 4);

    for obj in &dyns {
        refcount::release(obj, owner);
    }
    assert_eq!(log.lock().len(), 4);
}

/// - **意图 (Why)**：所有权移交不改变总计数，移交后新归属者可以正常归还。
/// - **实现说明 (How)**：创建节点后 `donate` 给另一归属者并由其归还。
/// - **契约 (What)**：计数全程为 1，归还后对象释放一次。
#[test]
fn donation_transfers_ownership_without_count_change() {
    let log = release_log();
    let first = 0u8;
    let second = 0u8;
    let from = OwnerId::of(&first);
    let to = OwnerId::of(&second);

    let node = StubNode::create("donated", from, &log);
    let node_dyn: RefcountedRef = node.clone();
    assert_eq!(group_count(&node_dyn), 1);

    refcount::donate(&node_dyn, from, to);
    assert_eq!(group_count(&node_dyn), 1);
    refcount::check(&node_dyn, to);

    refcount::release(&node_dyn, to);
    assert_eq!(log.lock().as_slice(), &["donated"]);
}

/// - **意图 (Why)**：冻结对象的外部引用走无锁原子路径，增减配平后组照常回收。
/// - **实现说明 (How)**：冻结单节点后反复 `acquire`/`release`，最后归还创建引用。
/// - **契约 (What)**：计数轨迹精确，释放仍然恰好一次。
#[test]
fn frozen_refcounts_stay_balanced() {
    let log = release_log();
    let holder = 0u8;
    let owner = OwnerId::of(&holder);
    let extra = 0u8;
    let extra_owner = OwnerId::of(&extra);

    let node = StubNode::create("lone", owner, &log);
    let node_dyn: RefcountedRef = node.clone();
    freeze(&[node_dyn.clone()], &FreezeOptions::new()).expect("single node freeze");
    assert!(is_frozen(&node_dyn));

    refcount::acquire(&node_dyn, extra_owner);
    assert_eq!(group_count(&node_dyn), 2);
    refcount::release(&node_dyn, extra_owner);
    assert_eq!(group_count(&node_dyn), 1);

    refcount::release(&node_dyn, owner);
    assert_eq!(log.lock().as_slice(), &["lone"]);
}
