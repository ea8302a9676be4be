//! 冻结：把保守分组一次性精确化为强连通分量划分。
//!
//! # 设计背景（Why）
//! - 可变阶段为了省去每次改边的全图分析，把“出现过引用”的对象统统并进
//!   一组——代价是组可能远大于真实的环；
//! - 冻结是摊还点：一次 O(V+E) 的 Tarjan 强连通分量划分之后，每组恰好
//!   是一个环簇，计数从此精确，对象也获得跨线程不可变共享的资格；
//! - 划分分两个阶段执行：分析阶段只读不写，任何失败（深度越界、对象数
//!   越界）都让图保持原样；提交阶段不再有失败路径。

use super::{
    GroupCell, RefcountedRef, audit_verify_edges, group_members, ident, lock_mutable_graph,
};
use crate::CoreError;
use crate::error::codes;
use crate::observability::{AttributeValue, KeyValue, Logger};
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

/// 冻结遍历的默认最大深度。
const DEFAULT_MAX_DEPTH: usize = 64;

/// [`freeze`] 的调用选项。
///
/// # 契约说明（What）
/// - `max_depth` 约束深度优先遍历的栈深：定义图的深度通常与消息类型的
///   嵌套层数同阶，攻击者可控的定义输入同样需要深度上限兜底；
/// - `logger` 为可选诊断出口，记录划分规模或失败原因。
#[derive(Clone, Default)]
pub struct FreezeOptions {
    max_depth: Option<usize>,
    logger: Option<Arc<dyn Logger>>,
}

impl FreezeOptions {
    /// 全默认选项。
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖遍历深度上限。
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// 附加诊断日志出口。
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// 生效的深度上限。
    pub fn max_depth(&self) -> usize {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }
}

/// 冻结从 `roots` 出发、经对象间引用可达的全部可变对象。
///
/// # 契约说明（What）
/// - **前置条件**：
///   - 调用方对每个根持有外部引用；
///   - 根均为可变对象；
///   - `roots` 必须覆盖每个受影响保守组的全部成员（组是合并的产物，
///     漏掉成员会让残余可变对象的计数失去锚点；调试构建下逐组断言）。
/// - **返回/后置条件**：
///   - 成功时每个强连通分量成为一个独立组，组计数等于成员外部引用数
///     之和再加上来自其它新冻结组的入边数；所有对象 `is_frozen` 为真；
///   - 失败（`graph.max_depth` / `graph.too_many_objects`）时图在观察上
///     完全不变。
///
/// # 执行逻辑（How）
/// 1. 全局锁下做迭代式 Tarjan（显式栈，不消耗调用栈深度），只遍历可变
///    对象，冻结目标不再展开；
/// 2. `audit` 特性下比对每个可达对象记账的出边集合；
/// 3. 提交：逐 SCC 分配新计数单元、重写组指针、重建环状链、置冻结位；
/// 4. 跨组修正：重访每条出边，凡指向本次新冻结的异组目标者计数加一
///    ——指向先前已冻结对象的边在建边当时就已计入，不重复计数；
/// 5. 旧计数单元随最后一个引用者消失自动回收。
pub fn freeze(roots: &[RefcountedRef], options: &FreezeOptions) -> Result<(), CoreError> {
    let _guard = lock_mutable_graph();
    let analysis = match analyze(roots, options.max_depth()) {
        Ok(analysis) => analysis,
        Err(err) => {
            if let Some(logger) = &options.logger {
                logger.error(
                    "graph freeze aborted; graph left unchanged",
                    Some(&err as &dyn crate::Error),
                );
            }
            return Err(err);
        }
    };
    for info in analysis.states.values() {
        audit_verify_edges(&info.obj);
    }
    commit(&analysis);
    if let Some(logger) = &options.logger {
        logger.debug_with_fields(
            "graph freeze partitioned reachable objects",
            &[
                KeyValue {
                    key: "graph.objects",
                    value: AttributeValue::U64(analysis.states.len() as u64),
                },
                KeyValue {
                    key: "graph.groups",
                    value: AttributeValue::U64(analysis.sccs.len() as u64),
                },
            ],
        );
    }
    Ok(())
}

struct NodeInfo {
    index: u32,
    lowlink: u32,
    on_stack: bool,
    obj: RefcountedRef,
}

struct Analysis {
    states: BTreeMap<usize, NodeInfo>,
    sccs: Vec<Vec<RefcountedRef>>,
}

struct DfsFrame {
    obj: RefcountedRef,
    edges: Vec<RefcountedRef>,
    cursor: usize,
}

fn depth_exceeded(max_depth: usize) -> CoreError {
    CoreError::new(
        codes::GRAPH_MAX_DEPTH,
        format!("freeze traversal exceeded max depth {max_depth}"),
    )
}

/// 收集仍可变的出边目标；已冻结的目标不参与本次划分。
fn mutable_edges(obj: &RefcountedRef) -> Vec<RefcountedRef> {
    let mut edges = Vec::new();
    obj.visit(&mut |subobj| {
        if !subobj.base().is_frozen() {
            edges.push(subobj.clone());
        }
    });
    edges
}

fn open_node(
    obj: &RefcountedRef,
    next_index: &mut u32,
    states: &mut BTreeMap<usize, NodeInfo>,
    scc_stack: &mut Vec<RefcountedRef>,
) -> Result<DfsFrame, CoreError> {
    if *next_index > i32::MAX as u32 {
        return Err(CoreError::new(
            codes::GRAPH_TOO_MANY_OBJECTS,
            "more than 2^31 objects reachable from freeze roots",
        ));
    }
    states.insert(
        ident(obj),
        NodeInfo {
            index: *next_index,
            lowlink: *next_index,
            on_stack: true,
            obj: obj.clone(),
        },
    );
    *next_index += 1;
    scc_stack.push(obj.clone());
    Ok(DfsFrame {
        obj: obj.clone(),
        edges: mutable_edges(obj),
        cursor: 0,
    })
}

/// 迭代式 Tarjan。只读分析：除内部簿记外不触碰任何对象状态。
fn analyze(roots: &[RefcountedRef], max_depth: usize) -> Result<Analysis, CoreError> {
    let mut states: BTreeMap<usize, NodeInfo> = BTreeMap::new();
    let mut sccs: Vec<Vec<RefcountedRef>> = Vec::new();
    let mut scc_stack: Vec<RefcountedRef> = Vec::new();
    let mut next_index: u32 = 0;

    enum Step {
        Child(RefcountedRef, usize),
        Close,
    }

    for root in roots {
        debug_assert!(!root.base().is_frozen(), "freeze roots must be mutable");
        if root.base().is_frozen() || states.contains_key(&ident(root)) {
            continue;
        }
        let mut dfs: Vec<DfsFrame> = Vec::new();
        dfs.push(open_node(root, &mut next_index, &mut states, &mut scc_stack)?);
        if dfs.len() > max_depth {
            return Err(depth_exceeded(max_depth));
        }

        loop {
            let step = match dfs.last_mut() {
                None => break,
                Some(frame) => {
                    if frame.cursor < frame.edges.len() {
                        let child = frame.edges[frame.cursor].clone();
                        frame.cursor += 1;
                        Step::Child(child, ident(&frame.obj))
                    } else {
                        Step::Close
                    }
                }
            };
            match step {
                Step::Child(child, parent_key) => match states.get(&ident(&child)) {
                    None => {
                        if dfs.len() >= max_depth {
                            return Err(depth_exceeded(max_depth));
                        }
                        dfs.push(open_node(
                            &child,
                            &mut next_index,
                            &mut states,
                            &mut scc_stack,
                        )?);
                    }
                    Some(info) if info.on_stack => {
                        let child_index = info.index;
                        if let Some(parent) = states.get_mut(&parent_key) {
                            parent.lowlink = parent.lowlink.min(child_index);
                        }
                    }
                    Some(_) => {}
                },
                Step::Close => {
                    if let Some(frame) = dfs.pop() {
                        let key = ident(&frame.obj);
                        let (my_index, my_lowlink) = {
                            let info = &states[&key];
                            (info.index, info.lowlink)
                        };
                        if let Some(parent) = dfs.last() {
                            let parent_key = ident(&parent.obj);
                            if let Some(parent_info) = states.get_mut(&parent_key) {
                                parent_info.lowlink = parent_info.lowlink.min(my_lowlink);
                            }
                        }
                        if my_lowlink == my_index {
                            let mut scc: Vec<RefcountedRef> = Vec::new();
                            while let Some(member) = scc_stack.pop() {
                                let member_key = ident(&member);
                                if let Some(info) = states.get_mut(&member_key) {
                                    info.on_stack = false;
                                }
                                let is_root = member_key == key;
                                scc.push(member);
                                if is_root {
                                    break;
                                }
                            }
                            sccs.push(scc);
                        }
                    }
                }
            }
        }
    }

    // 根集合必须覆盖每个受影响保守组的全部成员；残缺的覆盖会让漏掉的
    // 可变成员失去计数锚点。
    if cfg!(debug_assertions) {
        for info in states.values() {
            for member in group_members(&info.obj) {
                debug_assert!(
                    states.contains_key(&ident(&member)),
                    "freeze roots must cover every member of each mutable group"
                );
            }
        }
    }

    Ok(Analysis { states, sccs })
}

/// 提交阶段：无失败路径。
fn commit(analysis: &Analysis) {
    for scc in &analysis.sccs {
        let total: u32 = scc
            .iter()
            .map(|member| member.base().individual_count.load(Ordering::Relaxed))
            .sum();
        let cell = Arc::new(GroupCell::with_count(total));
        for member in scc {
            member.base().group.store(cell.clone());
            member.base().frozen.store(true, Ordering::Release);
        }
        if scc.len() == 1 {
            *scc[0].base().next.lock() = None;
        } else {
            for (i, member) in scc.iter().enumerate() {
                let next = scc[(i + 1) % scc.len()].clone();
                *member.base().next.lock() = Some(next);
            }
        }
    }
    // 跨组修正：仅统计指向“本次新冻结、且异组”目标的出边。指向先前已
    // 冻结对象的边在建边当时已计入目标组。
    for info in analysis.states.values() {
        let my_group = info.obj.base().group.load_full();
        info.obj.visit(&mut |subobj| {
            if analysis.states.contains_key(&ident(subobj)) {
                let sub_group = subobj.base().group.load_full();
                if !Arc::ptr_eq(&my_group, &sub_group) {
                    sub_group.add(1);
                }
            }
        });
    }
}
