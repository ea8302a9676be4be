use super::{FieldKey, Flow, WireValue};
use crate::sealed::Sealed;
use alloc::sync::Arc;
use core::any::Any;
use core::fmt;

/// `Closure` 是随处理器集合一起传递的用户态状态句柄。
///
/// # 设计背景（Why）
/// - 同一张回调表经常要服务多个并行的消费上下文（例如同一消息类型的
///   不同实例），把状态从表中拆出来按值传递，表本身即可注册一次、处处
///   复用；
/// - 以类型擦除的 `Arc<dyn Any>` 承载，处理器在回调中按需向下转型。
///
/// # 契约说明（What）
/// - 克隆仅复制引用计数；空闭包是合法值，表示处理器不需要外部状态；
/// - 需要可变状态的处理器应在闭包内部使用内部可变性原语。
#[derive(Clone, Default)]
pub struct Closure(Option<Arc<dyn Any + Send + Sync>>);

impl Closure {
    /// 包装一份共享状态。
    pub fn new<T: Any + Send + Sync>(state: Arc<T>) -> Self {
        Self(Some(state))
    }

    /// 构造空闭包。
    pub fn empty() -> Self {
        Self(None)
    }

    /// 是否未携带任何状态。
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// 尝试以具体类型借用内部状态。
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Closure")
            .field(&self.0.as_ref().map(|_| "..."))
            .finish()
    }
}

/// 结构化事件的回调表契约。
///
/// # 设计背景（Why）
/// - 对标 SAX 式推模型：解码器产出事件、处理器消费事件，两侧通过这张
///   完整的回调表解耦；表是全量的，六个入口都必须实现，避免“部分表”
///   在委托交接时出现语义空洞；
/// - 回调均取 `&self`：表注册后不可变，可被任意多个分发帧并发引用，
///   可变状态经由 [`Closure`] 或实现内部可变性承载。
///
/// # 契约说明（What）
/// - `on_start_msg` / `on_end_msg` 括住一个（子）消息的完整事件子流；
/// - `on_start_submsg` 可以通过出参 `delegate` 填入非空的 [`Handlers`]
///   并返回 [`Flow::Delegate`]，把子消息交给另一张表消费；两者必须
///   同真同假，分发器在调试构建下校验该约束；
/// - `on_end_submsg` 属于父级表：即使子消息被委托，交还点仍由父级观察；
/// - `on_unknown` 接收无法与任何已知字段对应的编号与载荷。
///
/// # 风险提示（Trade-offs）
/// - 回调在分发线程同步执行，不得阻塞；耗时处理应移交宿主调度。
pub trait HandlerSet: Send + Sync + 'static + Sealed {
    /// 消息开始。
    fn on_start_msg(&self, closure: &Closure);

    /// 消息结束。
    fn on_end_msg(&self, closure: &Closure);

    /// 子消息开始；可通过 `delegate` 发起委托。
    fn on_start_submsg(&self, closure: &Closure, field: FieldKey, delegate: &mut Handlers)
    -> Flow;

    /// 子消息结束（委托交还点，总是投递给父级表）。
    fn on_end_submsg(&self, closure: &Closure) -> Flow;

    /// 已知字段的标量值。
    fn on_value(&self, closure: &Closure, field: FieldKey, value: WireValue) -> Flow;

    /// 未知字段的标量值。
    fn on_unknown(&self, closure: &Closure, field_number: u32, value: WireValue) -> Flow;
}

/// `Handlers` 把回调表与其闭包打包成按值传递的投递单元。
///
/// # 逻辑解析（How）
/// - 分发器的每个栈帧持有一份 `Handlers`；克隆只涉及两次引用计数操作；
/// - 空值（表与闭包均缺省）用于 `on_start_submsg` 的出参初始状态，
///   也是“未委托”的判定依据。
///
/// # 契约说明（What）
/// - 经由空 `Handlers` 投递事件是受支持的空操作：流向类回调返回
///   [`Flow::Continue`]，通知类回调直接返回。
#[derive(Clone, Default)]
pub struct Handlers {
    set: Option<Arc<dyn HandlerSet>>,
    closure: Closure,
}

impl Handlers {
    /// 以回调表与闭包构造投递单元。
    pub fn new(set: Arc<dyn HandlerSet>, closure: Closure) -> Self {
        Self {
            set: Some(set),
            closure,
        }
    }

    /// 构造空单元。
    pub fn empty() -> Self {
        Self::default()
    }

    /// 表与闭包是否均未注册。
    pub fn is_empty(&self) -> bool {
        self.set.is_none() && self.closure.is_empty()
    }

    /// 注册回调表，保留现有闭包。
    pub fn register_set(&mut self, set: Arc<dyn HandlerSet>) {
        self.set = Some(set);
    }

    /// 替换闭包，保留现有回调表。
    pub fn set_closure(&mut self, closure: Closure) {
        self.closure = closure;
    }

    pub(crate) fn emit_start_msg(&self) {
        if let Some(set) = &self.set {
            set.on_start_msg(&self.closure);
        }
    }

    pub(crate) fn emit_end_msg(&self) {
        if let Some(set) = &self.set {
            set.on_end_msg(&self.closure);
        }
    }

    pub(crate) fn emit_start_submsg(&self, field: FieldKey, delegate: &mut Handlers) -> Flow {
        match &self.set {
            Some(set) => set.on_start_submsg(&self.closure, field, delegate),
            None => Flow::Continue,
        }
    }

    pub(crate) fn emit_end_submsg(&self) -> Flow {
        match &self.set {
            Some(set) => set.on_end_submsg(&self.closure),
            None => Flow::Continue,
        }
    }

    pub(crate) fn emit_value(&self, field: FieldKey, value: WireValue) -> Flow {
        match &self.set {
            Some(set) => set.on_value(&self.closure, field, value),
            None => Flow::Continue,
        }
    }

    pub(crate) fn emit_unknown(&self, field_number: u32, value: WireValue) -> Flow {
        match &self.set {
            Some(set) => set.on_unknown(&self.closure, field_number, value),
            None => Flow::Continue,
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("set", &self.set.as_ref().map(|_| "..."))
            .field("closure", &self.closure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SilentSet;

    impl HandlerSet for SilentSet {
        fn on_start_msg(&self, _closure: &Closure) {}
        fn on_end_msg(&self, _closure: &Closure) {}
        fn on_start_submsg(
            &self,
            _closure: &Closure,
            _field: FieldKey,
            _delegate: &mut Handlers,
        ) -> Flow {
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

    /// - **意图 (Why)**：空值判定是委托协议的基石，必须同时覆盖表与闭包两个分量。
    /// - **实现说明 (How)**：分别构造缺表、缺闭包与全空的组合并断言 `is_empty` 的取值。
    /// - **契约 (What)**：只有两个分量都缺省时才视为空。
    #[test]
    fn emptiness_requires_both_components_absent() {
        assert!(Handlers::empty().is_empty());

        let mut only_closure = Handlers::empty();
        only_closure.set_closure(Closure::new(Arc::new(7u32)));
        assert!(!only_closure.is_empty());

        let only_set = Handlers::new(Arc::new(SilentSet), Closure::empty());
        assert!(!only_set.is_empty());
    }

    /// - **意图 (Why)**：确认闭包的类型擦除与向下转型往返无损。
    /// - **实现说明 (How)**：包装具体类型后分别以正确与错误的类型转型。
    /// - **契约 (What)**：匹配的类型返回共享引用，不匹配的类型返回 `None`。
    #[test]
    fn closure_downcast_round_trip() {
        let closure = Closure::new(Arc::new(42u64));
        assert_eq!(closure.downcast_ref::<u64>(), Some(&42));
        assert!(closure.downcast_ref::<u32>().is_none());
        assert!(!closure.is_empty());
    }
}
