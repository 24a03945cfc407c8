use std::{fmt, ops::Deref, sync::Arc};

/// 构建器冻结后的只读快照。
///
/// - 内容在构造后不可变，长度固定，与产生它的构建器互不影响；
/// - 克隆仅增加引用计数，适合在多处共享同一结果。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ImmutableArray<T> {
    items: Arc<[T]>,
}

impl<T> ImmutableArray<T> {
    /// 空快照。
    pub fn empty() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T> Default for ImmutableArray<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Deref for ImmutableArray<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> From<Vec<T>> for ImmutableArray<T> {
    fn from(items: Vec<T>) -> Self {
        Self {
            items: Arc::from(items),
        }
    }
}

impl<T> FromIterator<T> for ImmutableArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a ImmutableArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: PartialEq> PartialEq<[T]> for ImmutableArray<T> {
    fn eq(&self, other: &[T]) -> bool {
        *self.items == *other
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T; N]> for ImmutableArray<T> {
    fn eq(&self, other: &[T; N]) -> bool {
        *self.items == other[..]
    }
}

impl<T: PartialEq> PartialEq<Vec<T>> for ImmutableArray<T> {
    fn eq(&self, other: &Vec<T>) -> bool {
        *self.items == other[..]
    }
}

impl<T: fmt::Debug> fmt::Debug for ImmutableArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_storage() {
        let snapshot = ImmutableArray::from(vec![1, 2, 3]);
        let copy = snapshot.clone();
        assert_eq!(copy, [1, 2, 3]);
        assert!(std::ptr::eq(snapshot.as_slice(), copy.as_slice()));
    }

    #[test]
    fn empty_has_no_items() {
        let empty: ImmutableArray<String> = ImmutableArray::default();
        assert!(empty.is_empty());
        assert_eq!(empty.len(), 0);
    }
}
