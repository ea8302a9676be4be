//! 观测性契约：结构化日志的最小接口集。
//!
//! # 模块定位（Why）
//! - 核心库是被动组件，不应绑定任何具体日志后端；通过对象安全的 [`Logger`]
//!   契约，宿主可以对接 `tracing`、syslog 或自研管线；
//! - 冻结与分发路径只产生低频诊断事件，接口刻意保持轻量，避免在热路径
//!   引入分配。
//!
//! # 使用方式（How）
//! - 需要日志的入口（如冻结选项、分发器）接收 `Arc<dyn Logger>`；
//! - 调用侧优先使用 `debug`/`warn` 等便捷方法，统一经由 `log` 落地。
//!
//! # 契约说明（What）
//! - 字段集合采用借用切片，记录提交给 [`Logger`] 后视为不可变；
//! - 实现应尽量保证非阻塞，必要时在实现侧异步化。

use crate::Error;
use alloc::borrow::Cow;

/// 日志级别枚举，取 OpenTelemetry `SeverityNumber` 与 `tracing` 的交集。
///
/// # 契约说明（What）
/// - `Info` 表示常规事件，`Warn` 表示潜在风险，`Error` 表示故障；
/// - 导出器可依据级别映射到目标系统的阈值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// 结构化字段的取值。
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttributeValue<'a> {
    Str(&'a str),
    U64(u64),
    I64(i64),
    Bool(bool),
}

/// 单个结构化键值对。
///
/// - **前置条件**：键应遵循低基数原则，避免日志存储爆炸。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyValue<'a> {
    pub key: &'a str,
    pub value: AttributeValue<'a>,
}

/// 结构化日志字段集合。
pub type AttributeSet<'a> = &'a [KeyValue<'a>];

/// 单条结构化日志记录。
///
/// # 设计背景（Why）
/// - 借鉴 OpenTelemetry Log Data Model，将消息、级别、目标与结构化字段
///   打包成单一结构，便于实现方一次性消费。
///
/// # 契约说明（What）
/// - **前置条件**：`attributes` 在 [`Logger::log`] 返回前必须保持有效；
/// - **后置条件**：记录仅包含引用，不进行任何复制。
#[derive(Debug)]
pub struct LogRecord<'a> {
    pub message: Cow<'a, str>,
    pub severity: LogSeverity,
    pub target: Option<Cow<'a, str>>,
    pub error: Option<&'a dyn Error>,
    pub attributes: AttributeSet<'a>,
}

impl<'a> LogRecord<'a> {
    /// 构建新的日志记录。
    pub fn new(
        message: impl Into<Cow<'a, str>>,
        severity: LogSeverity,
        target: Option<impl Into<Cow<'a, str>>>,
        error: Option<&'a dyn Error>,
        attributes: AttributeSet<'a>,
    ) -> Self {
        Self {
            message: message.into(),
            severity,
            target: target.map(Into::into),
            error,
            attributes,
        }
    }
}

/// 日志接口的核心契约。
///
/// # 逻辑解析（How）
/// - `log` 为唯一必需方法；便捷方法内部构造 [`LogRecord`] 再调用 `log`，
///   确保所有路径共享相同逻辑。
///
/// # 风险提示（Trade-offs）
/// - 高吞吐场景应避免在实现内重复分配，建议批处理或环形缓冲。
pub trait Logger: Send + Sync + 'static {
    /// 提交结构化日志。
    fn log(&self, record: &LogRecord<'_>);

    /// 输出带字段的 DEBUG 日志。
    fn debug_with_fields(&self, message: &str, attributes: AttributeSet<'_>) {
        let record = LogRecord::new(
            message,
            LogSeverity::Debug,
            None::<Cow<'_, str>>,
            None,
            attributes,
        );
        self.log(&record);
    }

    /// 输出 DEBUG 日志（无额外字段）。
    fn debug(&self, message: &str) {
        self.debug_with_fields(message, &[]);
    }

    /// 输出带字段的 WARN 日志。
    fn warn_with_fields(&self, message: &str, attributes: AttributeSet<'_>) {
        let record = LogRecord::new(
            message,
            LogSeverity::Warn,
            None::<Cow<'_, str>>,
            None,
            attributes,
        );
        self.log(&record);
    }

    /// 输出 WARN 日志（无额外字段）。
    fn warn(&self, message: &str) {
        self.warn_with_fields(message, &[]);
    }

    /// 输出 ERROR 日志，可附带根因。
    fn error(&self, message: &str, error: Option<&dyn Error>) {
        let record = LogRecord::new(
            message,
            LogSeverity::Error,
            None::<Cow<'_, str>>,
            error,
            &[],
        );
        self.log(&record);
    }
}
