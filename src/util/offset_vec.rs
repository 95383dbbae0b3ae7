use std::fmt::{Debug, Error, Formatter};
use std::iter::{DoubleEndedIterator, Enumerate, Extend, FromIterator};
use std::result::Result;
use std::slice::Iter;
use std::vec::IntoIter as VecIntoIter;

/// Elements with a width (eg. when used in an `OffsetVec`)
///
/// On the JVM, `long` and `double` values are 2 slots wide, while everything else is 1 slot.
pub trait Width {
    fn width(&self) -> usize;
}

/// A vector of elements of different logical "widths", where offsets into the vector are given in
/// terms of the sum of the widths of the previous elements (as opposed to the number of preceding
/// elements).
///
/// This is the representation of an operand stack: pushing a `long` adds one entry but grows the
/// offset length by two, and the JVM limits (`max_stack`) are expressed in offsets.
#[derive(Clone)]
pub struct OffsetVec<T: Sized> {
    /// Entries, along with their offset
    entries: Vec<(Offset, T)>,

    /// Offset of the next element to be added
    offset_len: Offset,
}

/// Offset into an `OffsetVec`
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Offset(pub usize);

impl<T: Sized + Width> OffsetVec<T> {
    /// New empty offset vector
    pub fn new() -> OffsetVec<T> {
        OffsetVec {
            entries: vec![],
            offset_len: Offset(0),
        }
    }

    /// Length of the `OffsetVec` (aka. number of entries)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current offset size of the `OffsetVec` (aka. offset of the next element
    /// to be added)
    pub fn offset_len(&self) -> Offset {
        self.offset_len
    }

    /// Add an entry to the back
    pub fn push(&mut self, slot: T) -> Offset {
        let offset = self.offset_len;
        self.offset_len.0 += slot.width();
        self.entries.push((offset, slot));

        offset
    }

    /// Remove an entry from the back
    pub fn pop(&mut self) -> Option<T> {
        self.entries.pop().map(|(off, elem)| {
            self.offset_len = off;
            elem
        })
    }

    /// Empty the vector
    pub fn clear(&mut self) {
        self.entries.clear();
        self.offset_len = Offset(0);
    }

    /// Get an entry (and its offset) by its position in the vector
    pub fn get_index(&self, index: usize) -> Option<(Offset, &T)> {
        self.entries.get(index).map(|(offset, t)| (*offset, t))
    }

    /// Replace the entry at some position in the vector
    ///
    /// If the width changes, the offsets of all of the following entries are shifted.
    pub fn set_index(&mut self, index: usize, value: T) -> Option<T> {
        let (_, slot) = self.entries.get_mut(index)?;
        let width_changed = slot.width() != value.width();
        let replaced = std::mem::replace(slot, value);
        if width_changed {
            self.recompute_offsets(index);
        }
        Some(replaced)
    }

    fn recompute_offsets(&mut self, from_index: usize) {
        let mut offset = match from_index.checked_sub(1) {
            None => Offset(0),
            Some(prev) => {
                let (off, elem) = &self.entries[prev];
                Offset(off.0 + elem.width())
            }
        };
        for (off, elem) in &mut self.entries[from_index..] {
            *off = offset;
            offset.0 += elem.width();
        }
        self.offset_len = offset;
    }

    pub fn iter(&self) -> OffsetVecIter<'_, T> {
        self.into_iter()
    }
}

impl<A: PartialEq> PartialEq for OffsetVec<A> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<A: Eq> Eq for OffsetVec<A> {}

impl<A: Width> Default for OffsetVec<A> {
    fn default() -> Self {
        OffsetVec::new()
    }
}

/// Iterator for owned `OffsetVec`
pub struct OffsetVecIntoIter<T>(VecIntoIter<(Offset, T)>);

impl<T> Iterator for OffsetVecIntoIter<T> {
    type Item = (Offset, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl<T> IntoIterator for OffsetVec<T> {
    type Item = (Offset, T);
    type IntoIter = OffsetVecIntoIter<T>;

    fn into_iter(self) -> OffsetVecIntoIter<T> {
        OffsetVecIntoIter(self.entries.into_iter())
    }
}

/// Iterator for borrowed `OffsetVec`
pub struct OffsetVecIter<'a, T>(Enumerate<Iter<'a, (Offset, T)>>);

impl<'a, T> Iterator for OffsetVecIter<'a, T> {
    type Item = (Offset, usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next().map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> DoubleEndedIterator for OffsetVecIter<'a, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.0
            .next_back()
            .map(|(idx, (off, elem))| (*off, idx, elem))
    }
}

impl<'a, T> IntoIterator for &'a OffsetVec<T> {
    type Item = (Offset, usize, &'a T);
    type IntoIter = OffsetVecIter<'a, T>;

    fn into_iter(self) -> OffsetVecIter<'a, T> {
        OffsetVecIter(self.entries.iter().enumerate())
    }
}

impl<T: Width> FromIterator<T> for OffsetVec<T> {
    fn from_iter<A: IntoIterator<Item = T>>(elems: A) -> Self {
        let mut offset_vec = OffsetVec::new();
        offset_vec.extend(elems);
        offset_vec
    }
}

impl<T: Width> Extend<T> for OffsetVec<T> {
    fn extend<U: IntoIterator<Item = T>>(&mut self, iter: U) {
        for elem in iter {
            self.push(elem);
        }
    }
}

impl<T: Debug> Debug for OffsetVec<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        let mut list = f.debug_list();
        for (off, elem) in &self.entries {
            list.entry(&format_args!("#{} = {:?}", off.0, elem));
        }
        list.finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Copy, Clone, Eq, PartialEq, Debug)]
    enum Slot {
        Narrow(u8),
        Wide(u8),
    }

    impl Width for Slot {
        fn width(&self) -> usize {
            match self {
                Slot::Narrow(_) => 1,
                Slot::Wide(_) => 2,
            }
        }
    }

    fn offsets(slots: &OffsetVec<Slot>) -> Vec<(usize, Slot)> {
        slots.iter().map(|(off, _, slot)| (off.0, *slot)).collect()
    }

    #[test]
    fn push_and_pop_track_offsets() {
        let mut slots: OffsetVec<Slot> = OffsetVec::new();
        slots.push(Slot::Narrow(1));
        slots.push(Slot::Wide(2));
        slots.push(Slot::Narrow(3));
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.offset_len(), Offset(4));
        assert_eq!(
            offsets(&slots),
            vec![(0, Slot::Narrow(1)), (1, Slot::Wide(2)), (3, Slot::Narrow(3))]
        );

        assert_eq!(slots.pop(), Some(Slot::Narrow(3)));
        assert_eq!(slots.offset_len(), Offset(3));
        assert_eq!(slots.pop(), Some(Slot::Wide(2)));
        assert_eq!(slots.offset_len(), Offset(1));
        assert_eq!(offsets(&slots), vec![(0, Slot::Narrow(1))]);

        slots.clear();
        assert!(slots.is_empty());
        assert_eq!(slots.pop(), None);
        assert_eq!(slots.offset_len(), Offset(0));
    }

    #[test]
    fn replacing_with_different_width_shifts_offsets() {
        let mut slots: OffsetVec<Slot> = vec![Slot::Narrow(1), Slot::Wide(2), Slot::Narrow(3)]
            .into_iter()
            .collect();

        assert_eq!(slots.set_index(1, Slot::Wide(4)), Some(Slot::Wide(2)));
        assert_eq!(slots.offset_len(), Offset(4));

        assert_eq!(slots.set_index(1, Slot::Narrow(5)), Some(Slot::Wide(4)));
        assert_eq!(
            offsets(&slots),
            vec![(0, Slot::Narrow(1)), (1, Slot::Narrow(5)), (2, Slot::Narrow(3))]
        );
        assert_eq!(slots.offset_len(), Offset(3));

        assert_eq!(slots.set_index(0, Slot::Wide(6)), Some(Slot::Narrow(1)));
        assert_eq!(
            offsets(&slots),
            vec![(0, Slot::Wide(6)), (2, Slot::Narrow(5)), (3, Slot::Narrow(3))]
        );
        assert_eq!(slots.set_index(3, Slot::Narrow(7)), None);
    }

    #[test]
    fn equality_compares_entries() {
        let a: OffsetVec<Slot> = vec![Slot::Wide(1)].into_iter().collect();
        let b: OffsetVec<Slot> = vec![Slot::Wide(1)].into_iter().collect();
        let c: OffsetVec<Slot> = vec![Slot::Narrow(1), Slot::Narrow(1)].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.offset_len(), c.offset_len());
    }
}
