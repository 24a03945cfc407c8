//! 池化数组构建器。
//!
//! # 模块定位（Why）
//! - 热路径上大量出现“临时收集若干元素、冻结成结果、立即丢弃”的模式；
//!   `ArrayBuilder` 让这类临时缓冲从共享池借出并归还，省去反复的堆分配；
//! - 模块只负责池化生命周期与构建器本身的可变操作，批量追加与派生操作分别位于
//!   [`range`] 与 [`derived`] 子模块。
//!
//! # 生命周期（What）
//! - `Idle`（位于池中）→ `CheckedOut`（调用方独占）→ `free` 后依容量回到 `Idle` 或被丢弃；
//! - 从未 `free` 的构建器在离开作用域时直接释放内存，池的借出计数不会回落，
//!   可通过 [`PoolStats::outstanding`](crate::PoolStats::outstanding) 观测这类泄漏。

mod derived;
mod range;

use std::{
    cmp::Ordering as CmpOrdering,
    fmt,
    ops::{Deref, DerefMut},
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use tracing::trace;

use crate::{
    config::{DEFAULT_INITIAL_CAPACITY, PoolConfig},
    error::{PoolError, check_window, fail_fast},
    immutable::ImmutableArray,
    pool::{ObjectPool, Recyclable},
    registry::{Poolable, shared_pool},
};

/// 构建器实例在进程内的唯一编号，用于诊断与身份断言。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// `ArrayBuilder` 是可从共享池借出的可增长序列。
///
/// # 设计动机（Why）
/// - 大多数构建器只容纳极少元素，借出 + 归还的成本远低于一次堆分配；
/// - 借助池弱引用，构建器在 `free` 时知道该回到哪个池，而池并不拥有借出中的实例。
///
/// # 架构关系（How）
/// - `items`：底层 `Vec<T>`，长度与容量即构建器的长度与容量；
/// - `pool`：可选的池弱引用。直接构造（[`ArrayBuilder::new`]）的构建器没有池，`free` 即释放；
/// - `id`：实例编号，随实例在池中往返保持不变。
///
/// # 契约说明（What）
/// - **独占**：借出期间由持有者独占；`free(self)` 消耗所有权，借用规则保证不会出现二次归还；
/// - **归还即清空**：回到闲置集合的实例长度必为 0；
/// - **容量只增不减**：常规操作不会收缩容量，`clear` 仅重置长度。
///
/// # 风险与取舍（Trade-offs）
/// - 容量达到保留阈值的实例在 `free` 时被遗忘而不是清空回收，见 [`ArrayBuilder::free`]；
/// - 零大小类型的 `Vec` 容量恒为 `usize::MAX`，此类构建器总会被丢弃。
pub struct ArrayBuilder<T> {
    items: Vec<T>,
    pool: Option<Weak<ObjectPool<ArrayBuilder<T>>>>,
    id: InstanceId,
}

impl<T> ArrayBuilder<T> {
    /// 创建不属于任何池的构建器，初始容量为 [`DEFAULT_INITIAL_CAPACITY`]。
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_INITIAL_CAPACITY)
    }

    /// 创建不属于任何池、预分配 `capacity` 个槽位的构建器。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            pool: None,
            id: InstanceId::next(),
        }
    }

    fn pooled(pool: Weak<ObjectPool<ArrayBuilder<T>>>, capacity: usize) -> Self {
        Self {
            pool: Some(pool),
            ..Self::with_capacity(capacity)
        }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.id
    }

    /// 是否关联了所属池（池已销毁时仍返回 `true`，此时 `free` 等同于释放）。
    pub fn has_pool(&self) -> bool {
        self.pool.is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// 确保容量至少为 `capacity`，不会收缩。
    pub fn ensure_capacity(&mut self, capacity: usize) {
        if self.items.capacity() < capacity {
            self.items.reserve_exact(capacity - self.items.len());
        }
    }

    /// 长度归零，容量保留。
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 直接设置长度：缩短时截断，增长时以默认值补齐。
    pub fn set_count(&mut self, count: usize)
    where
        T: Default,
    {
        self.items.resize_with(count, T::default);
    }

    /// 追加到末尾，均摊 O(1)。
    pub fn add(&mut self, item: T) {
        self.items.push(item);
    }

    /// 在 `index` 处插入，后续元素右移；`index` 必须位于 `[0, len]`。
    #[track_caller]
    pub fn insert(&mut self, index: usize, item: T) {
        if let Err(err) = self.try_insert(index, item) {
            fail_fast(err);
        }
    }

    pub fn try_insert(&mut self, index: usize, item: T) -> Result<(), PoolError> {
        if index > self.items.len() {
            return Err(PoolError::IndexOutOfRange {
                operation: "insert",
                index,
                len: self.items.len(),
            });
        }
        self.items.insert(index, item);
        Ok(())
    }

    /// 写入 `index` 处的槽位。
    ///
    /// - `index == len` 时等同于追加；
    /// - `index > len` 时先以默认值填满 `[len, index)` 再写入；
    /// - 对任何 `index` 都不会失败。
    pub fn set_item(&mut self, index: usize, value: T)
    where
        T: Default,
    {
        if let Some(slot) = self.items.get_mut(index) {
            *slot = value;
            return;
        }
        self.items.resize_with(index, T::default);
        self.items.push(value);
    }

    /// 移除并返回 `index` 处的元素，后续元素左移。
    #[track_caller]
    pub fn remove_at(&mut self, index: usize) -> T {
        match self.try_remove_at(index) {
            Ok(item) => item,
            Err(err) => fail_fast(err),
        }
    }

    pub fn try_remove_at(&mut self, index: usize) -> Result<T, PoolError> {
        if index >= self.items.len() {
            return Err(PoolError::IndexOutOfRange {
                operation: "remove_at",
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    /// 移除并返回最后一个元素；空构建器上调用属于前置条件违例。
    #[track_caller]
    pub fn remove_last(&mut self) -> T {
        match self.try_remove_last() {
            Ok(item) => item,
            Err(err) => fail_fast(err),
        }
    }

    pub fn try_remove_last(&mut self) -> Result<T, PoolError> {
        self.items.pop().ok_or(PoolError::EmptyBuilder {
            operation: "remove_last",
        })
    }

    /// 线性查找第一个等于 `item` 的位置。
    pub fn index_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.items.iter().position(|candidate| candidate == item)
    }

    /// 使用自定义相等判定查找。
    pub fn index_of_by(&self, item: &T, mut eq: impl FnMut(&T, &T) -> bool) -> Option<usize> {
        self.items.iter().position(|candidate| eq(candidate, item))
    }

    /// 仅在 `[start, start + count)` 窗口内查找，返回值为整体下标。
    #[track_caller]
    pub fn index_of_in(&self, item: &T, start: usize, count: usize) -> Option<usize>
    where
        T: PartialEq,
    {
        self.find_in_window("index_of", start, count, |candidate| candidate == item)
    }

    pub fn find_index(&self, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.items.iter().position(predicate)
    }

    /// 从 `start` 开始查找到末尾。
    #[track_caller]
    pub fn find_index_from(&self, start: usize, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        let count = self.items.len().saturating_sub(start);
        self.find_index_in(start, count, predicate)
    }

    /// 在 `[start, start + count)` 窗口内查找满足谓词的第一个下标。
    #[track_caller]
    pub fn find_index_in(
        &self,
        start: usize,
        count: usize,
        predicate: impl FnMut(&T) -> bool,
    ) -> Option<usize> {
        self.find_in_window("find_index", start, count, predicate)
    }

    #[track_caller]
    fn find_in_window(
        &self,
        operation: &'static str,
        start: usize,
        count: usize,
        predicate: impl FnMut(&T) -> bool,
    ) -> Option<usize> {
        if let Err(err) = check_window(operation, start, count, self.items.len()) {
            fail_fast(err);
        }
        self.items[start..start + count]
            .iter()
            .position(predicate)
            .map(|offset| start + offset)
    }

    pub fn sort(&mut self)
    where
        T: Ord,
    {
        self.items.sort();
    }

    pub fn sort_by(&mut self, compare: impl FnMut(&T, &T) -> CmpOrdering) {
        self.items.sort_by(compare);
    }

    /// 只对 `[start, len)` 排序，前缀保持不变。
    #[track_caller]
    pub fn sort_from(&mut self, start: usize, compare: impl FnMut(&T, &T) -> CmpOrdering) {
        let len = self.items.len();
        if start > len {
            fail_fast(PoolError::IndexOutOfRange {
                operation: "sort_from",
                index: start,
                len,
            });
        }
        self.items[start..].sort_by(compare);
    }

    pub fn reverse_contents(&mut self) {
        self.items.reverse();
    }

    /// 将长度截断为 `limit`；`limit` 大于当前长度属于编程错误，立即失败。
    #[track_caller]
    pub fn clip(&mut self, limit: usize) {
        if let Err(err) = self.try_clip(limit) {
            fail_fast(err);
        }
    }

    pub fn try_clip(&mut self, limit: usize) -> Result<(), PoolError> {
        if limit > self.items.len() {
            return Err(PoolError::ClipBeyondLength {
                limit,
                len: self.items.len(),
            });
        }
        self.items.truncate(limit);
        Ok(())
    }

    /// 清空后把长度设为 `count`，所有槽位均为默认值。
    pub fn zero_init(&mut self, count: usize)
    where
        T: Default,
    {
        self.items.clear();
        self.items.resize_with(count, T::default);
    }

    /// 追加 `count` 个 `item` 的副本。
    pub fn add_many(&mut self, item: T, count: usize)
    where
        T: Clone,
    {
        self.items.extend(std::iter::repeat_n(item, count));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// 复制当前内容为只读快照，构建器本身不变。
    pub fn to_immutable(&self) -> ImmutableArray<T>
    where
        T: Clone,
    {
        ImmutableArray::from(self.items.clone())
    }

    /// 空构建器返回 `None`，否则返回快照。
    pub fn to_immutable_or_none(&self) -> Option<ImmutableArray<T>>
    where
        T: Clone,
    {
        if self.items.is_empty() {
            None
        } else {
            Some(self.to_immutable())
        }
    }

    /// 将内容移入快照后归还构建器。
    ///
    /// 元素被直接移出而非复制，构建器的容量随实例一同回到池中。
    pub fn to_immutable_and_free(mut self) -> ImmutableArray<T> {
        let snapshot: ImmutableArray<T> = self.items.drain(..).collect();
        self.free();
        snapshot
    }

    /// 将内容移入新的 `Vec` 后归还构建器。
    pub fn to_vec_and_free(mut self) -> Vec<T> {
        let items: Vec<T> = self.items.drain(..).collect();
        self.free();
        items
    }

    /// 把全部元素复制到 `dst[start..start + len]`。
    #[track_caller]
    pub fn copy_to(&self, dst: &mut [T], start: usize)
    where
        T: Clone,
    {
        let len = self.items.len();
        if let Err(err) = check_window("copy_to", start, len, dst.len()) {
            fail_fast(err);
        }
        dst[start..start + len].clone_from_slice(&self.items);
    }

    /// 按保留策略处置构建器。
    ///
    /// # 执行逻辑（How）
    /// 1. 没有所属池（直接构造）或池已销毁：直接释放；
    /// 2. 容量低于池的 `retention_threshold`：清空后归还闲置集合；
    /// 3. 否则调用 [`ObjectPool::forget`] 将其移出账目，内容不清空，交由所有权系统回收。
    ///
    /// # 设计权衡（Trade-offs）
    /// - 超大实例被再次以同等规模使用的概率很低，保留它们会让闲置集合被少数大请求撑大；
    ///   因此小实例积极回收、离群的大实例直接牺牲。
    pub fn free(mut self) {
        let Some(pool) = self.pool.as_ref().and_then(Weak::upgrade) else {
            return;
        };
        let threshold = pool.config().retention_threshold;
        if self.items.capacity() < threshold {
            self.items.clear();
            pool.free(self);
        } else {
            trace!(
                instance = self.id.get(),
                capacity = self.items.capacity(),
                threshold,
                "discarding oversized builder instead of recycling"
            );
            pool.forget(self);
        }
    }
}

impl<T: Send + 'static> ArrayBuilder<T> {
    /// 从元素类型 `T` 的共享池借出一个空构建器。
    pub fn get_instance() -> Self {
        Self::get_instance_from(&shared_pool::<Self>())
    }

    /// 借出并预留至少 `capacity` 个槽位。
    pub fn get_instance_with_capacity(capacity: usize) -> Self {
        let mut builder = Self::get_instance();
        builder.ensure_capacity(capacity);
        builder
    }

    /// 借出并填充 `capacity` 个 `fill` 的副本，返回时长度等于 `capacity`。
    pub fn get_instance_filled(capacity: usize, fill: T) -> Self
    where
        T: Clone,
    {
        let mut builder = Self::get_instance_with_capacity(capacity);
        builder.add_many(fill, capacity);
        builder
    }

    /// 从指定池借出一个空构建器。
    pub fn get_instance_from(pool: &ObjectPool<Self>) -> Self {
        let builder = pool.allocate();
        debug_assert!(builder.is_empty(), "pooled builder returned with contents");
        builder
    }
}

impl<T: Send + 'static> Poolable for ArrayBuilder<T> {
    fn create_pool(config: &PoolConfig) -> Arc<ObjectPool<Self>> {
        let initial_capacity = config.initial_capacity;
        ObjectPool::new_cyclic(*config, move |pool| ArrayBuilder::pooled(pool, initial_capacity))
    }
}

impl<T> Recyclable for ArrayBuilder<T> {
    fn owner(&self) -> Option<&Weak<ObjectPool<Self>>> {
        self.pool.as_ref()
    }
}

impl<T> Default for ArrayBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for ArrayBuilder<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for ArrayBuilder<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<'a, T> IntoIterator for &'a ArrayBuilder<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> Extend<T> for ArrayBuilder<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T: fmt::Debug> fmt::Debug for ArrayBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::config::RETENTION_THRESHOLD;

    #[test]
    #[traced_test]
    fn oversized_discard_is_traced() {
        let pool = ArrayBuilder::<u8>::create_pool(&PoolConfig::default());
        let mut builder = ArrayBuilder::get_instance_from(&pool);
        builder.ensure_capacity(RETENTION_THRESHOLD);
        builder.free();
        assert!(logs_contain("discarding oversized builder"));
        assert_eq!(pool.idle_len(), 0);
    }

    #[test]
    fn to_immutable_and_free_recycles_capacity() {
        let pool = ArrayBuilder::<String>::create_pool(&PoolConfig::default());
        let mut builder = ArrayBuilder::get_instance_from(&pool);
        let id = builder.instance_id();
        builder.add("a".to_owned());
        builder.add("b".to_owned());
        let snapshot = builder.to_immutable_and_free();
        assert_eq!(snapshot, ["a".to_owned(), "b".to_owned()]);

        let reused = ArrayBuilder::get_instance_from(&pool);
        assert_eq!(reused.instance_id(), id);
        assert!(reused.is_empty());
    }

    fn builder_of(values: &[i32]) -> ArrayBuilder<i32> {
        let mut builder = ArrayBuilder::new();
        builder.add_slice(values);
        builder
    }

    #[test]
    fn set_item_fills_gap_with_defaults() {
        let mut builder = ArrayBuilder::<i32>::new();
        builder.set_item(3, 9);
        assert_eq!(&builder[..], &[0, 0, 0, 9]);

        builder.set_item(4, 5);
        builder.set_item(0, 1);
        assert_eq!(&builder[..], &[1, 0, 0, 9, 5]);
    }

    #[test]
    fn insert_and_remove_shift_elements() {
        let mut builder = builder_of(&[1, 3]);
        builder.insert(1, 2);
        builder.insert(3, 4);
        assert_eq!(&builder[..], &[1, 2, 3, 4]);
        assert_eq!(builder.remove_at(0), 1);
        assert_eq!(builder.remove_last(), 4);
        assert_eq!(&builder[..], &[2, 3]);
    }

    #[test]
    fn try_variants_report_violations() {
        let mut builder = builder_of(&[1]);
        assert_eq!(
            builder.try_insert(3, 0),
            Err(PoolError::IndexOutOfRange {
                operation: "insert",
                index: 3,
                len: 1
            })
        );
        assert!(builder.try_remove_at(1).is_err());
        assert_eq!(builder.try_remove_last(), Ok(1));
        assert_eq!(
            builder.try_remove_last(),
            Err(PoolError::EmptyBuilder {
                operation: "remove_last"
            })
        );
    }

    #[test]
    #[should_panic(expected = "pool.empty_builder")]
    fn remove_last_on_empty_fails_fast() {
        ArrayBuilder::<u8>::new().remove_last();
    }

    #[test]
    #[should_panic(expected = "pool.index_out_of_range")]
    fn insert_past_end_fails_fast() {
        builder_of(&[1, 2]).insert(3, 0);
    }

    #[test]
    fn search_respects_windows() {
        let builder = builder_of(&[5, 1, 5, 2, 5]);
        assert_eq!(builder.index_of(&5), Some(0));
        assert_eq!(builder.index_of(&7), None);
        assert_eq!(builder.index_of_in(&5, 1, 3), Some(2));
        assert_eq!(builder.index_of_in(&5, 1, 1), None);
        assert_eq!(builder.index_of_by(&-2, |a, b| a.abs() == b.abs()), Some(3));
        assert_eq!(builder.find_index(|v| *v < 3), Some(1));
        assert_eq!(builder.find_index_from(3, |v| *v == 5), Some(4));
        assert_eq!(builder.find_index_from(5, |_| true), None);
    }

    #[test]
    #[should_panic(expected = "pool.window_out_of_range")]
    fn search_window_past_end_fails_fast() {
        builder_of(&[1, 2]).find_index_in(1, 2, |_| true);
    }

    #[test]
    #[should_panic(expected = "index_of: window [1, 1 + 2) exceeds length 2")]
    fn index_of_window_failure_names_index_of() {
        builder_of(&[1, 2]).index_of_in(&2, 1, 2);
    }

    #[test]
    #[should_panic(expected = "find_index: window [3, 3 + 0) exceeds length 2")]
    fn find_index_from_failure_names_find_index() {
        builder_of(&[1, 2]).find_index_from(3, |_| true);
    }

    #[test]
    fn sort_variants() {
        let mut builder = builder_of(&[4, 3, 9, 1, 7]);
        builder.sort_from(2, |a, b| a.cmp(b));
        assert_eq!(&builder[..], &[4, 3, 1, 7, 9]);
        builder.sort_by(|a, b| b.cmp(a));
        assert_eq!(&builder[..], &[9, 7, 4, 3, 1]);
        builder.sort();
        assert_eq!(&builder[..], &[1, 3, 4, 7, 9]);
        builder.reverse_contents();
        assert_eq!(&builder[..], &[9, 7, 4, 3, 1]);
    }

    #[test]
    fn clip_truncates_and_keeps_capacity() {
        let mut builder = builder_of(&[1, 2, 3, 4]);
        let capacity = builder.capacity();
        builder.clip(2);
        assert_eq!(&builder[..], &[1, 2]);
        assert_eq!(builder.capacity(), capacity);
        assert_eq!(
            builder.try_clip(3),
            Err(PoolError::ClipBeyondLength { limit: 3, len: 2 })
        );
        assert_eq!(builder.len(), 2, "失败的 clip 不得改变长度");
    }

    #[test]
    #[should_panic(expected = "pool.clip_beyond_length")]
    fn clip_beyond_length_fails_fast() {
        builder_of(&[1]).clip(2);
    }

    #[test]
    fn zero_init_and_set_count_use_defaults() {
        let mut builder = builder_of(&[7, 7]);
        builder.zero_init(3);
        assert_eq!(&builder[..], &[0, 0, 0]);
        builder.set_count(1);
        assert_eq!(&builder[..], &[0]);
        builder.set_count(2);
        assert_eq!(&builder[..], &[0, 0]);
    }

    #[test]
    fn add_many_and_copy_to() {
        let mut builder = ArrayBuilder::new();
        builder.add_many('x', 3);
        let mut dst = ['-'; 5];
        builder.copy_to(&mut dst, 1);
        assert_eq!(dst, ['-', 'x', 'x', 'x', '-']);
    }

    #[test]
    fn ensure_capacity_never_shrinks() {
        let mut builder = ArrayBuilder::<u64>::with_capacity(32);
        builder.ensure_capacity(4);
        assert!(builder.capacity() >= 32);
        builder.ensure_capacity(64);
        assert!(builder.capacity() >= 64);
    }

    #[test]
    fn unpooled_free_is_plain_drop() {
        let mut builder = ArrayBuilder::new();
        builder.add(1u8);
        assert!(!builder.has_pool());
        builder.free();
    }

    #[test]
    fn to_immutable_leaves_builder_intact() {
        let builder = builder_of(&[1, 2]);
        let snapshot = builder.to_immutable();
        assert_eq!(snapshot, [1, 2]);
        assert_eq!(builder.len(), 2);
        assert!(ArrayBuilder::<i32>::new().to_immutable_or_none().is_none());
    }
}
