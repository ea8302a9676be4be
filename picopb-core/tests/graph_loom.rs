#![cfg(loom)]
//! 冻结组计数协议的 Loom 并发模型。
//!
//! ## 教案级导览
//!
//! - **核心目标 (Why)**：冻结后 `acquire`/`release` 走无锁原子路径，
//!   最后一个归还者负责回收整组。本模型穷举调度交错，验证“恰好一次
//!   回收”与“回收者可见全部在先写入”两条性质。
//! - **设计手法 (Why)**：与生产代码解耦——以 `loom` 原子量复刻组计数
//!   单元的递减协议（Release 递减 + 归零后 Acquire 栅栏），而非直接驱动
//!   生产类型；模型失败意味着协议本身（而非某次实现）有缺陷。
//!
//! ## 契约与边界 (What)
//!
//! - **输入**：两个归还线程共享计数为 2 的组单元；
//! - **断言**：模型结束时回收次数恰为 1，且回收者观察到两个线程各自的
//!   负载写入。

use loom::model;
use loom::sync::Arc;
use loom::sync::atomic::{AtomicU32, AtomicUsize, Ordering, fence};
use loom::thread;

/// 组计数单元的无锁递减协议模型。
struct LoomGroupCell {
    count: AtomicU32,
    payload_writes: AtomicUsize,
    teardowns: AtomicUsize,
}

impl LoomGroupCell {
    fn new(count: u32) -> Self {
        Self {
            count: AtomicU32::new(count),
            payload_writes: AtomicUsize::new(0),
            teardowns: AtomicUsize::new(0),
        }
    }

    /// 归还一个引用；归零者插入 Acquire 栅栏后执行回收。
    fn release(&self) {
        self.payload_writes.fetch_add(1, Ordering::Relaxed);
        let prev = self.count.fetch_sub(1, Ordering::Release);
        assert!(prev > 0, "group count underflow");
        if prev == 1 {
            fence(Ordering::Acquire);
            let writes = self.payload_writes.load(Ordering::Relaxed);
            assert_eq!(writes, 2, "collector must observe every prior write");
            self.teardowns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[test]
fn last_releaser_tears_down_exactly_once() {
    model(|| {
        let cell = Arc::new(LoomGroupCell::new(2));

        let left = {
            let cell = cell.clone();
            thread::spawn(move || cell.release())
        };
        let right = {
            let cell = cell.clone();
            thread::spawn(move || cell.release())
        };
        left.join().unwrap();
        right.join().unwrap();

        assert_eq!(cell.teardowns.load(Ordering::Relaxed), 1);
        assert_eq!(cell.count.load(Ordering::Relaxed), 0);
    });
}
