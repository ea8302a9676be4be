use crate::Error;
use alloc::borrow::Cow;
use alloc::boxed::Box;
use core::fmt;

/// 统一的结果别名，错误端默认为 [`CoreError`]。
pub type Result<T, E = CoreError> = core::result::Result<T, E>;

/// 可跨线程传递的底层原因封装。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// 核心稳定错误码集合。
///
/// # 设计背景（Why）
/// - 流式读取、事件分发与图冻结在不同层次产生的故障需要合流为稳定错误码，
///   以便日志与上层补救逻辑做精确分类；
/// - 错误码遵循 `<领域>.<语义>` 命名约定，方便在跨组件日志中检索与聚合。
///
/// # 契约说明（What）
/// - **使用前提**：错误码应由实现者封装进 [`CoreError`]，并在构造时附带
///   面向排障人员的消息；
/// - **返回承诺**：调用方收到这些错误码后可据此决定重试、拒绝输入或终止冻结。
///
/// # 设计取舍（Trade-offs）
/// - 粒度保持适中：足以区分资源、IO 与图遍历三类故障，又避免枚举过细导致
///   实现者难以判定场景。
pub mod codes {
    /// 内存分配失败（初始化、缓冲增长或冻结簿记）。
    pub const RESOURCE_OOM: &str = "resource.oom";
    /// 具体字节源/汇报告的 I/O 故障，核心只负责透传。
    pub const STREAM_IO: &str = "stream.io";
    /// 事件分发器的委托栈超过编译期深度上限。
    pub const DISPATCH_DEPTH_EXCEEDED: &str = "dispatch.depth_exceeded";
    /// 冻结遍历超过调用方给定的最大深度。
    pub const GRAPH_MAX_DEPTH: &str = "graph.max_depth";
    /// 冻结遍历发现的可达对象数超过 2^31。
    pub const GRAPH_TOO_MANY_OBJECTS: &str = "graph.too_many_objects";
}

/// `CoreError` 是本 crate 所有可观察错误的最终形态。
///
/// # 设计背景（Why）
/// - 字节通道、分发器与引用计数图的故障需要统一出口，避免每个模块各自发明
///   错误类型导致调用方层层转换；
/// - crate 需兼容 `no_std + alloc` 场景，因此不依赖 `std::error::Error`，
///   而是实现 crate 级的对象安全 [`Error`] 契约。
///
/// # 逻辑解析（How）
/// - 错误码 `code` 始终为 `'static` 字符串，承载稳定语义；`message` 面向
///   排障人员；`cause` 以 Builder 风格追加，形成可递归的根因链路。
///
/// # 契约说明（What）
/// - **前置条件**：调用方必须使用 [`codes`] 模块或遵循 `<域>.<语义>` 约定的
///   自定义码值；
/// - **返回值**：构造函数返回拥有所有权的 `CoreError`，满足
///   `Send + Sync + 'static`，可安全跨线程移动；
/// - **后置条件**：除非显式调用 `with_cause`，错误不含底层原因。
///
/// # 设计取舍与风险（Trade-offs）
/// - 采用 `Cow<'static, str>` 保存消息，静态文案零分配，动态描述仅一次堆分配；
/// - 本类型只负责承载信息，不执行任何日志或指标上报，调用方需自行处理。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CoreError {
    /// 构造核心错误。
    ///
    /// # 契约说明
    /// - **输入参数**：`code` 为稳定错误码；`message` 可为静态或动态字符串，
    ///   不应包含敏感信息；
    /// - **后置条件**：返回值不含底层原因，可继续通过 [`with_cause`](Self::with_cause)
    ///   补充链路。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的核心错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 为现有错误设置底层原因。
    pub fn set_cause(&mut self, cause: impl Error + Send + Sync + 'static) {
        self.cause = Some(Box::new(cause));
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::ToString;

    /// - **意图 (Why)**：确认错误码与消息按 `<码>: <消息>` 的稳定格式呈现，供日志检索依赖。
    /// - **实现说明 (How)**：分别使用静态与动态消息构造错误并断言 `Display` 输出。
    /// - **契约 (What)**：测试通过意味着错误格式可以被上层告警规则安全匹配。
    #[test]
    fn display_renders_code_and_message() {
        let err = CoreError::new(codes::STREAM_IO, "connection reset");
        assert_eq!(err.to_string(), "stream.io: connection reset");

        let err = CoreError::new(codes::GRAPH_MAX_DEPTH, format!("depth {} exceeded", 65));
        assert_eq!(err.code(), codes::GRAPH_MAX_DEPTH);
        assert_eq!(err.message(), "depth 65 exceeded");
    }

    /// - **意图 (Why)**：验证根因链路通过 `source()` 逐层暴露，与对象安全的 [`Error`] 契约一致。
    /// - **实现说明 (How)**：嵌套两层错误后沿 `source()` 下钻并检查内层错误码。
    /// - **契约 (What)**：链路深度与构造顺序一致，且不产生循环。
    #[test]
    fn cause_chain_is_traversable() {
        let inner = CoreError::new(codes::STREAM_IO, "short read");
        let outer = CoreError::new(codes::RESOURCE_OOM, "buffer growth failed").with_cause(inner);

        let source = outer.source().expect("outer must expose its cause");
        assert!(source.to_string().contains("short read"));
        assert!(outer.cause().is_some());
    }
}
