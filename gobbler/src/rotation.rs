// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Round robin selection from a fixed set of values.

/// A non-empty list of values handed out in order, wrapping around at the end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationSet<T> {
    items: Vec<T>,
    cursor: usize,
}

impl<T: Copy + PartialEq> RotationSet<T> {
    /// A rotation over `items`, or `None` if there are none.
    #[must_use]
    pub fn new(items: Vec<T>) -> Option<RotationSet<T>> {
        if items.is_empty() {
            return None;
        }
        Some(RotationSet { items, cursor: 0 })
    }

    /// The value under the cursor.  The cursor moves on to the next one.
    pub fn next_value(&mut self) -> T {
        let value = self.items[self.cursor];
        self.cursor = (self.cursor + 1) % self.items.len();
        value
    }

    /// Replace every occurrence of `from` by `to`.  Returns the number replaced.
    pub fn replace(&mut self, from: T, to: T) -> usize {
        let mut replaced = 0;
        for item in self.items.iter_mut().filter(|item| **item == from) {
            *item = to;
            replaced += 1;
        }
        replaced
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Never true for a constructed set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sets_do_not_exist() {
        assert!(RotationSet::<u16>::new(vec![]).is_none());
    }

    #[test]
    fn values_wrap_around() {
        let mut set = RotationSet::new(vec![10u16, 20, 30]).unwrap();
        let drawn: Vec<_> = (0..7).map(|_| set.next_value()).collect();
        assert_eq!(drawn, vec![10, 20, 30, 10, 20, 30, 10]);
    }

    #[test]
    fn single_value_repeats() {
        let mut set = RotationSet::new(vec![5u8]).unwrap();
        assert_eq!(set.next_value(), 5);
        assert_eq!(set.next_value(), 5);
    }

    #[test]
    fn replace_keeps_position() {
        let mut set = RotationSet::new(vec![0u8, 1, 0]).unwrap();
        assert_eq!(set.next_value(), 0);
        assert_eq!(set.replace(0, 9), 2);
        assert_eq!(set.items(), &[9, 1, 9]);
        assert_eq!(set.next_value(), 1);
        assert_eq!(set.next_value(), 9);
        assert_eq!(set.len(), 3);
    }
}
