use std::{
    any::{Any, TypeId},
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;
use tracing::debug;

use crate::{config::PoolConfig, pool::ObjectPool};

/// 可被进程级共享池托管的类型。
///
/// # 设计初衷（Why）
/// - Rust 不支持泛型静态变量，无法像“每个元素类型一个静态字段”那样直接声明默认池；
/// - 通过该 trait 让类型自行描述如何构造自己的池，再由 [`shared_pool`] 按 `TypeId` 统一缓存。
///
/// # 契约定义（What）
/// - `create_pool` 每个类型在进程内至多被调用一次（并发首次访问时也只有一个结果被保留）；
/// - 返回的池应当以 [`ObjectPool::new_cyclic`] 构造，使实例能够归还到该池。
pub trait Poolable: Sized + Send + 'static {
    fn create_pool(config: &PoolConfig) -> Arc<ObjectPool<Self>>;
}

type PoolRegistry = DashMap<TypeId, Arc<dyn Any + Send + Sync>>;

static SHARED_POOLS: OnceLock<PoolRegistry> = OnceLock::new();

/// 获取类型 `P` 的进程级默认池，首次访问时惰性创建。
///
/// # 执行逻辑（How）
/// 1. 读路径：按 `TypeId` 查表，命中则克隆 `Arc` 返回；
/// 2. 未命中时经由 `entry` API 在分片写锁内创建，保证并发首次访问只保留一个池；
/// 3. 池一经登记便随进程存活，不提供拆除入口。
pub fn shared_pool<P: Poolable>() -> Arc<ObjectPool<P>> {
    let registry = SHARED_POOLS.get_or_init(DashMap::new);
    let key = TypeId::of::<P>();
    let existing = registry.get(&key).map(|entry| Arc::clone(entry.value()));
    let erased = match existing {
        Some(pool) => pool,
        None => Arc::clone(
            registry
                .entry(key)
                .or_insert_with(|| {
                    debug!(pooled_type = std::any::type_name::<P>(), "creating shared pool");
                    let pool: Arc<dyn Any + Send + Sync> = P::create_pool(&PoolConfig::default());
                    pool
                })
                .value(),
        ),
    };
    match erased.downcast::<ObjectPool<P>>() {
        Ok(pool) => pool,
        Err(_) => unreachable!("shared pool registry is keyed by TypeId"),
    }
}
