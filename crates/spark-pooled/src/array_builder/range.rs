//! 批量追加。所有变体都按源序列的原有顺序追加到末尾。

use crate::{
    error::{check_window, fail_fast},
    immutable::ImmutableArray,
};

use super::ArrayBuilder;

impl<T> ArrayBuilder<T> {
    /// 追加另一个构建器的全部元素。
    pub fn add_builder(&mut self, other: &ArrayBuilder<T>)
    where
        T: Clone,
    {
        self.items.extend_from_slice(&other.items);
    }

    /// 追加快照的全部元素。
    pub fn add_immutable(&mut self, items: &ImmutableArray<T>)
    where
        T: Clone,
    {
        self.items.extend_from_slice(items);
    }

    /// 仅追加快照的前 `length` 个元素。
    #[track_caller]
    pub fn add_immutable_prefix(&mut self, items: &ImmutableArray<T>, length: usize)
    where
        T: Clone,
    {
        self.add_slice_window(items, 0, length);
    }

    pub fn add_slice(&mut self, items: &[T])
    where
        T: Clone,
    {
        self.items.extend_from_slice(items);
    }

    /// 追加 `items[start..start + length]`；窗口越界属于前置条件违例。
    #[track_caller]
    pub fn add_slice_window(&mut self, items: &[T], start: usize, length: usize)
    where
        T: Clone,
    {
        if let Err(err) = check_window("add_range", start, length, items.len()) {
            fail_fast(err);
        }
        self.items.extend_from_slice(&items[start..start + length]);
    }

    /// 追加任意有限序列。
    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// 追加可转换为 `T` 的元素序列，逐个转换后写入。
    ///
    /// 对应“把子类型数组加入父类型构建器”的场景：不做零拷贝的重解释，而是逐元素转换，
    /// 避免两个不同类型的视图别名同一块内存。
    pub fn add_range_converted<U: Into<T>>(&mut self, items: impl IntoIterator<Item = U>) {
        self.items.extend(items.into_iter().map(Into::into));
    }
}
