use super::{FieldKey, Flow, Handlers, WireValue};
use crate::error::codes;
use crate::observability::Logger;
use crate::CoreError;
use alloc::format;
use alloc::sync::Arc;

/// 分发器帧栈的编译期容量：子消息嵌套与委托层级之和不得超过该值。
///
/// 深度上限是刻意为之：对攻击者可控的输入做无界嵌套展开属于拒绝服务
/// 风险，实现必须保留该上限。
pub const MAX_NESTING: usize = 64;

/// 单个分发帧：当前生效的投递单元与它覆盖的嵌套层数。
///
/// `depth` 统计的是“同一处理器集合连续消费的子消息层数”：委托产生
/// 深度为 0 的新帧，此后每进入一层子消息自增一次。
#[derive(Clone, Debug, Default)]
struct Frame {
    handlers: Handlers,
    depth: u32,
}

/// `Dispatcher` 是把解码事件路由到处理器集合的有界栈状态机。
///
/// # 设计背景（Why）
/// - 子消息可以任意深度嵌套，且任一层都可能把事件子流委托给另一张回调
///   表；状态机用“(投递单元, 深度)”帧显式记录这两种嵌套，保证交接与
///   交还总是成对出现；
/// - 栈内嵌在结构体中且容量固定（[`MAX_NESTING`]），分发路径自身不做
///   任何堆分配，也没有内部失败模式——唯一的错误是压栈越界，并在压栈
///   发生前返回给调用方。
///
/// # 逻辑解析（How）
/// - [`reset`](Self::reset) 把栈恢复为单帧初始态，基帧深度为 1，从而
///   最外层的 `end_submsg` 永远不会试图弹出基帧；
/// - [`start_submsg`](Self::start_submsg) 询问当前表是否委托：委托则压入
///   深度为 0 的新帧并立即投递新表的 `on_start_msg`，随后把结果改写为
///   [`Flow::Continue`]——解码侧不感知委托；
/// - [`end_submsg`](Self::end_submsg) 先自减栈顶深度，归零说明被委托的
///   子树结束：投递该表的 `on_end_msg` 并弹帧，然后把 `on_end_submsg`
///   交还给父级表。
///
/// # 契约说明（What）
/// - **前置条件**：事件序列来自结构良好的消息流，且每次使用前已调用
///   `reset`；
/// - **后置条件**：对任意配平的事件序列，最外层 `end_msg` 发生时栈恢复
///   单帧、深度为 1；
/// - 事件按调用顺序原样送达，委托不会跨子消息边界重排事件。
///
/// # 风险提示（Trade-offs）
/// - 调用方必须在投递 `start_submsg` 前处理深度越界错误；忽略错误继续
///   投递属于契约违例，调试构建会触发断言。
pub struct Dispatcher {
    stack: [Frame; MAX_NESTING],
    top: usize,
    logger: Option<Arc<dyn Logger>>,
}

impl Dispatcher {
    /// 构造处于未注册状态的分发器；使用前必须 [`reset`](Self::reset)。
    pub fn new() -> Self {
        Self {
            stack: core::array::from_fn(|_| Frame::default()),
            top: 0,
            logger: None,
        }
    }

    /// 附加诊断日志出口。
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// 以给定投递单元重置到初始态。
    ///
    /// 基帧深度置 1 而非 0：最外层消息没有对应的“委托交还”，深度 1
    /// 保证顶层 `end_submsg` 的自减不会触发弹帧。
    pub fn reset(&mut self, handlers: Handlers) {
        self.top = 0;
        self.stack[0] = Frame { handlers, depth: 1 };
        for frame in &mut self.stack[1..] {
            *frame = Frame::default();
        }
    }

    /// 当前栈帧数（含基帧），供调用方与测试观察。
    pub fn frame_count(&self) -> usize {
        self.top + 1
    }

    /// 栈顶帧覆盖的嵌套层数。
    pub fn current_depth(&self) -> u32 {
        self.stack[self.top].depth
    }

    /// 投递顶层消息开始事件。仅允许在基帧上调用。
    pub fn start_msg(&self) {
        debug_assert_eq!(self.top, 0, "start_msg only fires on the base frame");
        self.stack[self.top].handlers.emit_start_msg();
    }

    /// 投递顶层消息结束事件。仅允许在基帧上调用。
    pub fn end_msg(&self) {
        debug_assert_eq!(self.top, 0, "end_msg only fires on the base frame");
        self.stack[self.top].handlers.emit_end_msg();
    }

    /// 投递子消息开始事件，并执行委托协议。
    ///
    /// # 执行逻辑（How）
    /// 1. 以空投递单元作为出参询问当前表；
    /// 2. 校验“返回 [`Flow::Delegate`] 当且仅当出参非空”；
    /// 3. 委托时压入深度 0 的新帧、投递新表的 `on_start_msg`，并把结果
    ///    改写为 [`Flow::Continue`]；
    /// 4. 无论是否委托，自增（可能刚更换的）栈顶深度。
    ///
    /// # 错误（What）
    /// - 压栈将越界时返回 `dispatch.depth_exceeded`，此时栈未被修改，
    ///   受托表也未观察到任何事件（委托从未部分生效）。
    pub fn start_submsg(&mut self, field: FieldKey) -> Result<Flow, CoreError> {
        let mut delegate = Handlers::empty();
        let mut flow = self.stack[self.top].handlers.emit_start_submsg(field, &mut delegate);
        debug_assert_eq!(
            flow == Flow::Delegate,
            !delegate.is_empty(),
            "delegate flow and non-empty handlers must coincide"
        );
        if flow == Flow::Delegate {
            if self.top + 1 >= MAX_NESTING {
                let err = CoreError::new(
                    codes::DISPATCH_DEPTH_EXCEEDED,
                    format!("submessage nesting exceeds MAX_NESTING ({MAX_NESTING})"),
                );
                if let Some(logger) = &self.logger {
                    logger.error(
                        "dispatcher frame stack exhausted",
                        Some(&err as &dyn crate::Error),
                    );
                }
                return Err(err);
            }
            self.top += 1;
            self.stack[self.top] = Frame {
                handlers: delegate,
                depth: 0,
            };
            self.stack[self.top].handlers.emit_start_msg();
            flow = Flow::Continue;
        }
        self.stack[self.top].depth += 1;
        Ok(flow)
    }

    /// 投递子消息结束事件，并在委托子树收尾时完成交还。
    pub fn end_submsg(&mut self) -> Flow {
        let frame = &mut self.stack[self.top];
        debug_assert!(frame.depth > 0, "unbalanced end_submsg");
        frame.depth -= 1;
        if frame.depth == 0 {
            frame.handlers.emit_end_msg();
            debug_assert!(self.top > 0, "base frame can never be popped");
            self.stack[self.top] = Frame::default();
            self.top -= 1;
        }
        self.stack[self.top].handlers.emit_end_submsg()
    }

    /// 投递已知字段的标量值事件。
    pub fn value(&self, field: FieldKey, value: WireValue) -> Flow {
        self.stack[self.top].handlers.emit_value(field, value)
    }

    /// 投递未知字段事件。
    pub fn unknown(&self, field_number: u32, value: WireValue) -> Flow {
        self.stack[self.top].handlers.emit_unknown(field_number, value)
    }

    /// 剩余可用的委托层数，供调用方在压栈前自检。
    pub fn remaining_capacity(&self) -> usize {
        MAX_NESTING - 1 - self.top
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.reset(Handlers::empty());
        dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Closure, HandlerSet};
    use alloc::sync::Arc;
    use alloc::vec::Vec;
    use spin::Mutex;

    #[derive(Default)]
    struct CountingSet {
        submsgs: Mutex<Vec<u32>>,
    }

    impl HandlerSet for CountingSet {
        fn on_start_msg(&self, _closure: &Closure) {}
        fn on_end_msg(&self, _closure: &Closure) {}
        fn on_start_submsg(
            &self,
            _closure: &Closure,
            field: FieldKey,
            _delegate: &mut Handlers,
        ) -> Flow {
            self.submsgs.lock().push(field.get());
            Flow::Continue
        }
        fn on_end_submsg(&self, _closure: &Closure) -> Flow {
            Flow::Continue
        }
        fn on_value(&self, _closure: &Closure, _field: FieldKey, _value: WireValue) -> Flow {
            Flow::Continue
        }
        fn on_unknown(&self, _closure: &Closure, _field_number: u32, _value: WireValue) -> Flow {
            Flow::Continue
        }
    }

    fn field(number: u32) -> FieldKey {
        FieldKey::new(number).expect("non-zero field number")
    }

    /// - **意图 (Why)**：非委托嵌套只应改变栈顶深度，帧数保持不变，这是委托协议的对照组。
    /// - **实现说明 (How)**：同一张表连续进入两层子消息，逐步断言 `current_depth` 的 1→2→3→2→1 轨迹。
    /// - **契约 (What)**：事件配平后分发器回到单帧、深度 1 的初始态。
    #[test]
    fn plain_nesting_only_moves_depth() {
        let set = Arc::new(CountingSet::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.reset(Handlers::new(set.clone(), Closure::empty()));

        dispatcher.start_msg();
        assert_eq!((dispatcher.frame_count(), dispatcher.current_depth()), (1, 1));

        assert_eq!(dispatcher.start_submsg(field(1)).unwrap(), Flow::Continue);
        assert_eq!((dispatcher.frame_count(), dispatcher.current_depth()), (1, 2));

        assert_eq!(dispatcher.start_submsg(field(2)).unwrap(), Flow::Continue);
        assert_eq!((dispatcher.frame_count(), dispatcher.current_depth()), (1, 3));

        dispatcher.end_submsg();
        assert_eq!((dispatcher.frame_count(), dispatcher.current_depth()), (1, 2));

        dispatcher.end_submsg();
        dispatcher.end_msg();
        assert_eq!((dispatcher.frame_count(), dispatcher.current_depth()), (1, 1));
        assert_eq!(set.submsgs.lock().as_slice(), &[1, 2]);
    }

    /// - **意图 (Why)**：`reset` 必须抹掉上一条消息留下的全部帧状态，避免跨消息串扰。
    /// - **实现说明 (How)**：构造一次嵌套后重置，断言帧数与深度回到初始值。
    /// - **契约 (What)**：重置后分发器与新建实例不可区分。
    #[test]
    fn reset_restores_initial_state() {
        let set = Arc::new(CountingSet::default());
        let mut dispatcher = Dispatcher::new();
        dispatcher.reset(Handlers::new(set.clone(), Closure::empty()));
        dispatcher.start_msg();
        dispatcher.start_submsg(field(9)).unwrap();

        dispatcher.reset(Handlers::new(set, Closure::empty()));
        assert_eq!(dispatcher.frame_count(), 1);
        assert_eq!(dispatcher.current_depth(), 1);
        assert_eq!(dispatcher.remaining_capacity(), MAX_NESTING - 1);
    }
}
