//! Prefetch window over a fixed, ordered list of pages

use std::collections::HashMap;
use std::hash::Hash;

use ahash::RandomState;

/// Ordered page universe plus how far to look behind and ahead
#[derive(Debug, Clone)]
pub struct PageWindow<P> {
    pages: Vec<P>,
    index: HashMap<P, usize, RandomState>,
    previous: usize,
    next: usize,
}

impl<P> PageWindow<P>
where
    P: Hash + Eq + Clone,
{
    /// Build a window over `pages`
    ///
    /// If a page appears more than once, its first position wins.
    pub fn new(pages: Vec<P>, previous: usize, next: usize) -> Self {
        let mut index = HashMap::with_capacity_and_hasher(pages.len(), RandomState::new());
        for (i, page) in pages.iter().enumerate() {
            index.entry(page.clone()).or_insert(i);
        }

        Self {
            pages,
            index,
            previous,
            next,
        }
    }

    /// Position of `page` in the ordered list
    pub fn index_of(&self, page: &P) -> Option<usize> {
        self.index.get(page).copied()
    }

    /// Pages to warm around `page`, nearest first: forward, then backward
    ///
    /// The window is clipped to the list bounds. An unknown page has no
    /// neighbours.
    pub fn neighbours(&self, page: &P) -> Vec<P> {
        let Some(i) = self.index_of(page) else {
            return Vec::new();
        };

        let last = self.pages.len() - 1;
        let forward = (i + 1)..=last.min(i.saturating_add(self.next));
        let backward = (i.saturating_sub(self.previous)..i).rev();

        forward
            .chain(backward)
            .map(|j| self.pages[j].clone())
            .collect()
    }
}

impl<P> PageWindow<P> {
    /// The ordered page list
    pub fn pages(&self) -> &[P] {
        &self.pages
    }

    /// How many pages before the requested one are warmed
    pub fn previous(&self) -> usize {
        self.previous
    }

    /// How many pages after the requested one are warmed
    pub fn next(&self) -> usize {
        self.next
    }
}
