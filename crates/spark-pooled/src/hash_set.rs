use std::{
    collections::HashSet,
    hash::Hash,
    sync::{Arc, Weak},
};

use crate::{
    config::PoolConfig,
    pool::{ObjectPool, Recyclable},
    registry::{Poolable, shared_pool},
};

/// 池化的哈希集合，是 [`ArrayBuilder`](crate::ArrayBuilder) 的集合形态。
///
/// # 角色定位（Why）
/// - 去重类操作（`remove_duplicates`、`select_distinct`）需要一个临时集合，
///   若每次都新建 `HashSet`，热路径上的分配与哈希表扩容开销不可忽视；
/// - 集合同样从自己的共享池借出、用完即还，保证临时状态不会泄漏给下一位使用者。
///
/// # 契约说明（What）
/// - `add` 返回 `true` 表示元素首次插入；
/// - `free` 清空后归还；容量达到保留阈值的集合被遗忘而非回收。
pub struct PooledHashSet<T> {
    set: HashSet<T>,
    pool: Option<Weak<ObjectPool<PooledHashSet<T>>>>,
}

impl<T: Eq + Hash + Send + 'static> PooledHashSet<T> {
    /// 从该元素类型的共享池借出一个空集合。
    pub fn get_instance() -> Self {
        let set = shared_pool::<Self>().allocate();
        debug_assert!(set.is_empty());
        set
    }

    /// 插入元素，首次出现时返回 `true`。
    pub fn add(&mut self, item: T) -> bool {
        self.set.insert(item)
    }

    pub fn contains(&self, item: &T) -> bool {
        self.set.contains(item)
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// 清空并归还到所属池；不属于任何池的集合直接释放。
    pub fn free(mut self) {
        let Some(pool) = self.pool.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        if self.set.capacity() < pool.config().retention_threshold {
            self.set.clear();
            pool.free(self);
        } else {
            pool.forget(self);
        }
    }
}

impl<T> Recyclable for PooledHashSet<T> {
    fn owner(&self) -> Option<&Weak<ObjectPool<Self>>> {
        self.pool.as_ref()
    }
}

impl<T: Eq + Hash + Send + 'static> Poolable for PooledHashSet<T> {
    fn create_pool(config: &PoolConfig) -> Arc<ObjectPool<Self>> {
        ObjectPool::new_cyclic(*config, |pool| PooledHashSet {
            set: HashSet::new(),
            pool: Some(pool),
        })
    }
}
