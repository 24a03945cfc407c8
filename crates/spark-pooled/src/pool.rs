use std::{
    ptr,
    sync::{
        Arc, Weak,
        atomic::{AtomicUsize, Ordering},
    },
};

use spin::Mutex;
use tracing::trace;

use crate::config::PoolConfig;

/// 能够报告自身所属池的池化实例。
///
/// # 设计初衷（Why）
/// - 池只接收自己借出的实例：外来实例若被 `free` 放入闲置集合，或被 `forget` 冲减借出计数，
///   真正仍在外的实例就会从泄漏信号中消失；
/// - 实例在工厂中获得指向池的弱引用，归还时池以指针比对确认归属，无需额外的登记表。
///
/// # 契约定义（What）
/// - `owner` 返回构造该实例的池；直接构造、不属于任何池的实例返回 `None`；
/// - 返回值在实例生命周期内不得改变。
pub trait Recyclable: Sized {
    fn owner(&self) -> Option<&Weak<ObjectPool<Self>>>;
}

/// `ObjectPool` 是带工厂函数的有界闲置实例缓存，即“回收池”。
///
/// # 模块角色（Why）
/// - 为 [`ArrayBuilder`](crate::ArrayBuilder)、[`PooledHashSet`](crate::PooledHashSet)
///   等短生命周期的临时缓冲提供统一来源，避免热路径上反复向堆申请内存；
/// - 池本身不理解实例内容：清空、容量判定等回收策略由实例在 `free` 时自行决定，
///   池只负责“保留或丢弃”。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Vec<P>>` 作为闲置集合（自由链表），`allocate` 弹出、`free` 压入；
/// - 闲置集合为空时调用工厂新建实例；工厂通过 [`ObjectPool::new_cyclic`] 获得指向池自身的弱引用，
///   使实例知道应归还到哪里，而池并不因此拥有借出的实例；
/// - `free`/`forget` 借助 [`Recyclable::owner`] 拒绝外来实例，账目只反映本池借出的实例；
/// - `PoolMetrics` 以原子计数记录新建、复用、归还、丢弃、遗忘与借出中的数量。
///
/// # 契约说明（What）
/// - **线程安全**：闲置集合由锁保护，计数为原子，满足 `Send + Sync`（要求 `P: Send`）；
/// - **唯一性**：实例在交出前已从闲置集合移除，所有权随之转移，不可能被同时借出两次；
/// - **顺序**：复用顺序未作保证，调用方不得依赖。
///
/// # 设计权衡（Trade-offs）
/// - 延续自旋锁而非阻塞锁：临界区只有一次 `push`/`pop`，持锁时间极短；
/// - 闲置集合已满时直接丢弃实例，交由所有权系统回收内存，不做任何排队或阻塞。
pub struct ObjectPool<P> {
    idle: Mutex<Vec<P>>,
    factory: Box<dyn Fn() -> P + Send + Sync>,
    config: PoolConfig,
    metrics: PoolMetrics,
}

impl<P> ObjectPool<P> {
    fn with_config(config: PoolConfig, factory: impl Fn() -> P + Send + Sync + 'static) -> Self {
        debug_assert!(
            config.validate().is_ok(),
            "invalid pool configuration: {config:?}"
        );
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            config,
            metrics: PoolMetrics::default(),
        }
    }

    /// 创建一个工厂能够拿到池自身弱引用的池。
    ///
    /// # 参数与契约
    /// - `make`：每次未命中时调用，入参为指向本池的 `Weak` 句柄；
    /// - **前置条件**：`config` 自洽（见 [`PoolConfig::validate`]），调试构建下不自洽的配置立即 panic；
    /// - **后置条件**：返回的 `Arc` 是池的唯一强引用来源，实例持有的 `Weak` 不会延长池的生命周期。
    pub fn new_cyclic(
        config: PoolConfig,
        make: impl Fn(Weak<ObjectPool<P>>) -> P + Send + Sync + 'static,
    ) -> Arc<Self>
    where
        P: Send + 'static,
    {
        Arc::new_cyclic(|weak: &Weak<ObjectPool<P>>| {
            let weak = weak.clone();
            ObjectPool::with_config(config, move || make(weak.clone()))
        })
    }

    /// 借出一个实例：优先复用闲置实例，否则调用工厂新建。
    pub fn allocate(&self) -> P {
        let reused = self.idle.lock().pop();
        let item = match reused {
            Some(item) => {
                self.metrics.reused.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.metrics.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        };
        self.metrics.outstanding.fetch_add(1, Ordering::Relaxed);
        item
    }

    /// 当前闲置实例数量。
    pub fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    /// 闲置集合的保留上限。
    pub fn max_idle(&self) -> usize {
        self.config.max_idle
    }

    /// 池的配置快照。
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.idle_len(),
            max_idle: self.config.max_idle,
            created: self.metrics.created.load(Ordering::Relaxed),
            reused: self.metrics.reused.load(Ordering::Relaxed),
            returned: self.metrics.returned.load(Ordering::Relaxed),
            dropped: self.metrics.dropped.load(Ordering::Relaxed),
            forgotten: self.metrics.forgotten.load(Ordering::Relaxed),
            outstanding: self.metrics.outstanding.load(Ordering::Relaxed),
        }
    }
}

impl<P: Recyclable> ObjectPool<P> {
    /// 归还实例。
    ///
    /// - **前置条件**：调用方已将实例恢复为可复用状态（例如清空内容）；
    /// - **后置条件**：闲置集合未满时实例进入集合；否则实例被丢弃并计入 `dropped`；
    ///   不属于本池的实例直接丢弃，账目保持不变。
    pub fn free(&self, item: P) {
        if !self.owns(&item) {
            trace!("rejecting instance that does not belong to this pool");
            return;
        }
        self.metrics.release_outstanding();
        let rejected = {
            let mut idle = self.idle.lock();
            if idle.len() < self.config.max_idle {
                idle.push(item);
                None
            } else {
                Some(item)
            }
        };
        match rejected {
            None => {
                self.metrics.returned.fetch_add(1, Ordering::Relaxed);
            }
            Some(item) => {
                self.metrics.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(max_idle = self.config.max_idle, "idle set full, dropping returned instance");
                drop(item);
            }
        }
    }

    /// 将实例从池的账目中移除，且不回收。
    ///
    /// 用于实例主动放弃回收（例如容量超过保留阈值）。不属于本池的实例不在账目中，
    /// 此时账目保持不变，仅丢弃该实例。
    pub fn forget(&self, item: P) {
        if self.owns(&item) && self.metrics.release_outstanding() {
            self.metrics.forgotten.fetch_add(1, Ordering::Relaxed);
        }
        drop(item);
    }

    fn owns(&self, item: &P) -> bool {
        item.owner()
            .is_some_and(|owner| ptr::eq(owner.as_ptr(), self))
    }
}

/// 池统计快照，供监控与测试断言使用。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 当前闲置实例数。
    pub idle: usize,
    /// 闲置集合上限。
    pub max_idle: usize,
    /// 工厂新建次数（未命中）。
    pub created: usize,
    /// 复用闲置实例次数（命中）。
    pub reused: usize,
    /// 成功进入闲置集合的归还次数。
    pub returned: usize,
    /// 因闲置集合已满而丢弃的归还次数。
    pub dropped: usize,
    /// 通过 `forget` 移出账目的实例数。
    pub forgotten: usize,
    /// 已借出且尚未归还或遗忘的实例数。
    pub outstanding: usize,
}

impl PoolStats {
    /// 命中率，取值 0.0 ~ 1.0；尚无借出记录时为 0。
    pub fn hit_rate(&self) -> f64 {
        let total = self.reused + self.created;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct PoolMetrics {
    created: AtomicUsize,
    reused: AtomicUsize,
    returned: AtomicUsize,
    dropped: AtomicUsize,
    forgotten: AtomicUsize,
    outstanding: AtomicUsize,
}

impl PoolMetrics {
    /// 借出计数减一；计数已为 0 时保持不变并返回 `false`。
    fn release_outstanding(&self) -> bool {
        self.outstanding
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| prev.checked_sub(1))
            .is_ok()
    }
}
