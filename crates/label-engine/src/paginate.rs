//! Multi-up pagination

use crate::instance::PlacementUnit;
use std::num::NonZeroUsize;

/// Units sharing one printed page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T = PlacementUnit> {
    /// Zero-based page index
    pub index: usize,
    /// Maximum number of units on the page
    pub capacity: usize,
    pub units: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_full(&self) -> bool {
        self.units.len() == self.capacity
    }

    /// Blank slots left at the end of the page
    pub fn free_slots(&self) -> usize {
        self.capacity - self.units.len()
    }
}

/// Tile units into pages of fixed capacity, in order
///
/// A page closes as soon as it holds `per_page` units; only the last page may
/// be partly filled.
pub fn paginate<T>(units: Vec<T>, per_page: NonZeroUsize) -> Vec<Page<T>> {
    let capacity = per_page.get();
    let mut pages: Vec<Page<T>> = Vec::with_capacity(units.len().div_ceil(capacity));

    for unit in units {
        if pages.last().map_or(true, Page::is_full) {
            pages.push(Page {
                index: pages.len(),
                capacity,
                units: Vec::with_capacity(capacity),
            });
        }
        if let Some(page) = pages.last_mut() {
            page.units.push(unit);
        }
    }

    pages
}
