//! 观测性桩：`Noop` 与记录型日志实现。

use crate::observability::{LogRecord, LogSeverity, Logger};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

/// 丢弃一切输入的日志桩，满足依赖注入需求。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: &LogRecord<'_>) {}
}

/// 记录型日志桩：保留级别与消息，供断言诊断路径被正确触达。
#[derive(Default)]
pub struct RecordingLogger {
    entries: Mutex<Vec<(LogSeverity, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 取回已记录的条目快照。
    pub fn entries(&self) -> Vec<(LogSeverity, String)> {
        self.entries.lock().clone()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, record: &LogRecord<'_>) {
        self.entries
            .lock()
            .push((record.severity, record.message.to_string()));
    }
}
