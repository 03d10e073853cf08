//! Priority bitmap management for fast highest-ready lookup
//!
//! This module implements the priority table using a bitmap approach.
//! Bit `p % 32` of word `p / 32` marks priority `p`; since higher values are
//! more urgent, the lookup scans from the last word down and uses the
//! leading-zero count of the first non-empty word.

use crate::config::CFG_PRIO_MAX;
use crate::types::OsPrio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = (CFG_PRIO_MAX + 31) / 32;

/// Priority bitmap table
///
/// Each bit represents a priority level. A set bit means there's at least
/// one ready task at that priority.
#[derive(Debug, Clone, Copy)]
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    /// Insert a priority into the bitmap
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);

        let (word_idx, bit_pos) = Self::locate(prio);
        self.bitmap[word_idx] |= 1 << bit_pos;
    }

    /// Remove a priority from the bitmap
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        debug_assert!((prio as usize) < CFG_PRIO_MAX);

        let (word_idx, bit_pos) = Self::locate(prio);
        self.bitmap[word_idx] &= !(1 << bit_pos);
    }

    /// Get the most urgent priority with a ready task
    #[inline]
    pub fn get_highest(&self) -> Option<OsPrio> {
        for (word_idx, &word) in self.bitmap.iter().enumerate().rev() {
            if word != 0 {
                let bit_pos = 31 - word.leading_zeros() as usize;
                return Some((word_idx * 32 + bit_pos) as OsPrio);
            }
        }
        None
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        let (word_idx, bit_pos) = Self::locate(prio);
        (self.bitmap[word_idx] & (1 << bit_pos)) != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }

    #[inline]
    fn locate(prio: OsPrio) -> (usize, u32) {
        ((prio / 32) as usize, (prio % 32) as u32)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), None);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), Some(5));

        table.insert(3);
        assert_eq!(table.get_highest(), Some(5));

        table.insert(9);
        assert_eq!(table.get_highest(), Some(9));

        table.remove(9);
        assert_eq!(table.get_highest(), Some(5));

        table.remove(5);
        table.remove(3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_priority_order() {
        let mut table = PrioTable::new();

        for prio in [10, 5, 20, 0, 15] {
            table.insert(prio);
        }

        assert_eq!(table.get_highest(), Some(20));

        table.remove(20);
        assert_eq!(table.get_highest(), Some(15));

        table.remove(15);
        assert_eq!(table.get_highest(), Some(10));
    }

    #[test]
    fn test_top_priority() {
        let mut table = PrioTable::new();
        let top = (CFG_PRIO_MAX - 1) as OsPrio;

        table.insert(0);
        table.insert(top);
        assert_eq!(table.get_highest(), Some(top));

        table.remove(top);
        assert_eq!(table.get_highest(), Some(0));
    }
}
