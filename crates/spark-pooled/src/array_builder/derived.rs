//! 派生操作：去重、投影去重、分组与类型转换快照。
//!
//! 这些操作内部用到的临时集合与临时构建器同样从各自的共享池借出，
//! 并在返回前全部归还（包括转换失败的提前返回路径）。

use std::{
    collections::{HashMap, hash_map::RandomState},
    hash::{BuildHasher, Hash},
};

use crate::{hash_set::PooledHashSet, immutable::ImmutableArray};

use super::ArrayBuilder;

impl<T> ArrayBuilder<T> {
    /// 就地稳定去重：保留每个元素第一次出现的位置，长度截断为不同元素的数量。
    pub fn remove_duplicates(&mut self)
    where
        T: Eq + Hash + Clone + Send + 'static,
    {
        let mut seen = PooledHashSet::<T>::get_instance();
        self.items.retain(|item| seen.add(item.clone()));
        seen.free();
    }

    /// 对每个元素投影后去重，按投影值首次出现的顺序返回；构建器本身不变。
    pub fn select_distinct<S>(&self, mut selector: impl FnMut(&T) -> S) -> ImmutableArray<S>
    where
        S: Eq + Hash + Clone + Send + 'static,
    {
        let mut result = ArrayBuilder::<S>::get_instance_with_capacity(self.items.len());
        let mut seen = PooledHashSet::<S>::get_instance();
        for item in &self.items {
            let selected = selector(item);
            if seen.add(selected.clone()) {
                result.add(selected);
            }
        }
        seen.free();
        result.to_immutable_and_free()
    }

    /// 按键分组，每组保持元素原有的相对顺序。
    pub fn to_dictionary<K>(&self, key_selector: impl FnMut(&T) -> K) -> HashMap<K, ImmutableArray<T>>
    where
        K: Eq + Hash,
        T: Clone + Send + 'static,
    {
        self.to_dictionary_with_hasher(key_selector, RandomState::new())
    }

    /// 与 [`to_dictionary`](Self::to_dictionary) 相同，但由调用方提供键的哈希策略。
    ///
    /// # 执行逻辑（How）
    /// 1. 0 个和 1 个元素走直通路径，不借用任何临时构建器；
    /// 2. 否则为每个键借出一个构建器作为桶，桶表按元素数量预留（键数不会更多）；
    /// 3. 冻结阶段逐桶 `to_immutable_and_free`，桶全部回到池中。
    pub fn to_dictionary_with_hasher<K, S>(
        &self,
        mut key_selector: impl FnMut(&T) -> K,
        hasher: S,
    ) -> HashMap<K, ImmutableArray<T>, S>
    where
        K: Eq + Hash,
        S: BuildHasher + Clone,
        T: Clone + Send + 'static,
    {
        match self.items.as_slice() {
            [] => HashMap::with_hasher(hasher),
            [only] => {
                let mut dictionary = HashMap::with_capacity_and_hasher(1, hasher);
                dictionary.insert(key_selector(only), ImmutableArray::from(vec![only.clone()]));
                dictionary
            }
            items => {
                // bucketize
                let mut buckets: HashMap<K, ArrayBuilder<T>, S> =
                    HashMap::with_capacity_and_hasher(items.len(), hasher.clone());
                for item in items {
                    buckets
                        .entry(key_selector(item))
                        .or_insert_with(ArrayBuilder::get_instance)
                        .add(item.clone());
                }

                // freeze
                let mut dictionary = HashMap::with_capacity_and_hasher(buckets.len(), hasher);
                for (key, bucket) in buckets {
                    dictionary.insert(key, bucket.to_immutable_and_free());
                }
                dictionary
            }
        }
    }

    /// 逐元素转换为 `U` 并生成快照；任一元素转换失败时返回该错误，临时构建器照常归还。
    pub fn try_to_downcast_immutable<U>(&self) -> Result<ImmutableArray<U>, U::Error>
    where
        T: Clone,
        U: TryFrom<T> + Send + 'static,
    {
        if self.items.is_empty() {
            return Ok(ImmutableArray::empty());
        }
        let mut converted = ArrayBuilder::<U>::get_instance_with_capacity(self.items.len());
        for item in &self.items {
            match U::try_from(item.clone()) {
                Ok(value) => converted.add(value),
                Err(err) => {
                    converted.free();
                    return Err(err);
                }
            }
        }
        Ok(converted.to_immutable_and_free())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_duplicates_keeps_first_occurrence() {
        let mut builder = ArrayBuilder::<i32>::get_instance();
        builder.add_slice(&[3, 1, 3, 2, 1]);
        builder.remove_duplicates();
        assert_eq!(&builder[..], &[3, 1, 2]);
        builder.free();
    }

    #[test]
    fn select_distinct_projects_then_dedupes() {
        let mut builder = ArrayBuilder::<&'static str>::get_instance();
        builder.add_slice(&["aa", "b", "bb", "c"]);
        let lengths = builder.select_distinct(|s| s.len());
        assert_eq!(lengths, [2, 1]);
        assert_eq!(builder.len(), 4, "select_distinct 不得修改构建器");
        builder.free();
    }

    #[test]
    fn to_dictionary_groups_by_key() {
        let mut builder = ArrayBuilder::<u32>::get_instance();
        builder.add_slice(&[1, 2, 3, 4]);
        let groups = builder.to_dictionary(|v| v % 2 == 0);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&true], [2, 4]);
        assert_eq!(groups[&false], [1, 3]);
        builder.free();
    }

    #[test]
    fn to_dictionary_handles_trivial_sizes() {
        let empty = ArrayBuilder::<u32>::new();
        assert!(empty.to_dictionary(|v| *v).is_empty());

        let mut single = ArrayBuilder::<u32>::new();
        single.add(7);
        let groups = single.to_dictionary(|v| v % 3);
        assert_eq!(groups[&1], [7]);
    }

    #[test]
    fn downcast_reports_first_failure() {
        let mut builder = ArrayBuilder::<i64>::new();
        builder.add_slice(&[1, 2, 3]);
        let narrowed = builder.try_to_downcast_immutable::<u8>().expect("全部可转换");
        assert_eq!(narrowed, [1u8, 2, 3]);

        builder.add(-1);
        assert!(builder.try_to_downcast_immutable::<u8>().is_err());
    }
}
