//! `spark-pooled` 提供面向热路径临时缓冲的对象池与池化数组构建器。
//!
//! # 模块定位（Why）
//! - 编解码、路由匹配等热路径会频繁创建“只活几微秒”的临时集合，
//!   反复向堆申请与归还内存会放大分配器压力与尾延迟；
//! - 本 crate 让这类临时缓冲从共享池借出、用完归还，并以容量阈值拒绝回收离群的大实例，
//!   避免闲置集合被少数大请求撑大。
//!
//! # 设计概要（How）
//! - [`ObjectPool`]：有界闲置集合 + 工厂函数，`allocate`/`free`/`forget` 三个入口；
//! - [`shared_pool`]：按类型惰性创建、进程级存活的默认池登记表；
//! - [`ArrayBuilder`]：可增长序列，持有所属池的弱引用，`free` 时按 [`RETENTION_THRESHOLD`]
//!   决定回收或丢弃；
//! - [`PooledHashSet`]：去重类操作使用的池化集合；
//! - [`ImmutableArray`]：构建器冻结后的只读快照。
//!
//! # 错误约定（What）
//! - 越界索引、`clip` 超长等前置条件违例立即 panic，信息携带 `pool.*` 错误码；
//! - 需要自行处理的调用方可使用对应的 `try_*` 方法获得 [`PoolError`]。

mod array_builder;
mod config;
mod error;
mod hash_set;
mod immutable;
mod pool;
mod registry;

pub use array_builder::{ArrayBuilder, InstanceId};
pub use config::{DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_IDLE, PoolConfig, RETENTION_THRESHOLD};
pub use error::PoolError;
pub use hash_set::PooledHashSet;
pub use immutable::ImmutableArray;
pub use pool::{ObjectPool, PoolStats, Recyclable};
pub use registry::{Poolable, shared_pool};
