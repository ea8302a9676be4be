//! 事件处理器桩：按到达顺序记录回调，并可配置委托行为。

use crate::dispatch::{Closure, FieldKey, Flow, HandlerSet, Handlers, WireValue};
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// 多个处理器集合共享的调用日志。
///
/// 日志行格式为 `<集合名>.<回调名>`，必要时附带字段编号，便于测试直接
/// 断言跨集合的全序。
pub type CallJournal = Arc<Mutex<Vec<String>>>;

/// 构造一份空日志。
pub fn journal() -> CallJournal {
    Arc::new(Mutex::new(Vec::new()))
}

/// 记录型处理器集合。
///
/// # 行为说明（How）
/// - 每个回调把 `<name>.<callback>` 追加进共享日志后返回预设流向；
/// - [`delegate_on_submsg`](Self::delegate_on_submsg) 配置后，
///   `on_start_submsg` 会把该投递单元填入出参并返回 [`Flow::Delegate`]，
///   用于驱动委托协议。
pub struct RecordingHandlerSet {
    name: &'static str,
    journal: CallJournal,
    delegate: Mutex<Option<Handlers>>,
    submsg_flow: Mutex<Flow>,
}

impl RecordingHandlerSet {
    pub fn new(name: &'static str, journal: CallJournal) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal,
            delegate: Mutex::new(None),
            submsg_flow: Mutex::new(Flow::Continue),
        })
    }

    /// 让后续的 `on_start_submsg` 把子消息委托给 `handlers`。
    pub fn delegate_on_submsg(&self, handlers: Handlers) {
        *self.delegate.lock() = Some(handlers);
    }

    /// 配置非委托场景下 `on_start_submsg` 的返回流向。
    pub fn submsg_flow(&self, flow: Flow) {
        *self.submsg_flow.lock() = flow;
    }

    fn log(&self, entry: &str) {
        self.journal.lock().push(format!("{}.{}", self.name, entry));
    }
}

impl HandlerSet for RecordingHandlerSet {
    fn on_start_msg(&self, _closure: &Closure) {
        self.log("start_msg");
    }

    fn on_end_msg(&self, _closure: &Closure) {
        self.log("end_msg");
    }

    fn on_start_submsg(
        &self,
        _closure: &Closure,
        field: FieldKey,
        delegate: &mut Handlers,
    ) -> Flow {
        self.log(&format!("start_submsg({})", field.get()));
        if let Some(handlers) = self.delegate.lock().clone() {
            *delegate = handlers;
            return Flow::Delegate;
        }
        *self.submsg_flow.lock()
    }

    fn on_end_submsg(&self, _closure: &Closure) -> Flow {
        self.log("end_submsg");
        Flow::Continue
    }

    fn on_value(&self, _closure: &Closure, field: FieldKey, _value: WireValue) -> Flow {
        self.log(&format!("value({})", field.get()));
        Flow::Continue
    }

    fn on_unknown(&self, _closure: &Closure, field_number: u32, _value: WireValue) -> Flow {
        self.log(&format!("unknown({field_number})"));
        Flow::Continue
    }
}
