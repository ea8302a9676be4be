//! 常用契约与类型的一站式导入。
//!
//! 面向“实现一个协作者”或“驱动一次分发/冻结”的典型场景，按需挑选的
//! 最小集合；低频类型请从具体模块导入。

pub use crate::dispatch::{
    Closure, Dispatcher, FieldKey, Flow, HandlerSet, Handlers, MAX_NESTING, WireValue,
};
pub use crate::error::{CoreError, Result, codes};
pub use crate::observability::Logger;
pub use crate::refcount::{
    FreezeOptions, OwnerId, RefBase, Refcounted, RefcountedRef, acquire, freeze, link, release,
    unlink,
};
pub use crate::stream::{ByteSink, ByteSource};
pub use crate::Error;
