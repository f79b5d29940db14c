// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Absolute selection over an arbitrarily large label collection with a
//! bounded, scroll-following window for rendering.

pub const DEFAULT_VIEWPORT_HEIGHT: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualList {
    labels: Vec<String>,
    selected: usize,
    window_start: usize,
    viewport_height: usize,
}

impl Default for VirtualList {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_HEIGHT)
    }
}

impl VirtualList {
    pub fn new(viewport_height: usize) -> Self {
        Self {
            labels: Vec::new(),
            selected: 0,
            window_start: 0,
            viewport_height: viewport_height.max(1),
        }
    }

    /// Replaces the backing collection. The absolute selection is kept and
    /// clamped to the new bounds; the window re-derives around it.
    pub fn set_items(&mut self, labels: Vec<String>) {
        self.labels = labels;
        self.clamp();
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height.max(1);
        self.clamp();
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn up(&mut self) {
        if self.labels.is_empty() {
            return;
        }
        self.selected = self.selected.saturating_sub(1);
        self.follow_selection();
    }

    pub fn down(&mut self) {
        if self.labels.is_empty() {
            return;
        }
        self.selected = (self.selected + 1).min(self.labels.len() - 1);
        self.follow_selection();
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
        self.clamp();
    }

    /// Absolute index of the selection, `None` when the list is empty.
    pub fn selected(&self) -> Option<usize> {
        (!self.labels.is_empty()).then_some(self.selected)
    }

    pub fn window_start(&self) -> usize {
        self.window_start
    }

    pub fn relative_to_absolute(&self, relative: usize) -> usize {
        self.window_start + relative
    }

    pub fn is_selected(&self, absolute: usize) -> bool {
        self.selected() == Some(absolute)
    }

    pub fn visible(&self) -> &[String] {
        let end = (self.window_start + self.viewport_height).min(self.labels.len());
        &self.labels[self.window_start.min(end)..end]
    }

    fn clamp(&mut self) {
        if self.labels.is_empty() {
            self.selected = 0;
            self.window_start = 0;
            return;
        }
        self.selected = self.selected.min(self.labels.len() - 1);
        self.window_start = self.window_start.min(self.max_window_start());
        self.follow_selection();
    }

    fn follow_selection(&mut self) {
        if self.selected < self.window_start {
            self.window_start = self.selected;
        } else if self.selected >= self.window_start + self.viewport_height {
            self.window_start = self.selected + 1 - self.viewport_height;
        }
        self.window_start = self.window_start.min(self.max_window_start());
    }

    fn max_window_start(&self) -> usize {
        self.labels.len().saturating_sub(self.viewport_height)
    }
}

#[cfg(test)]
mod tests {
    use super::VirtualList;
    use recdesk_testkit::Lcg;

    fn labels(count: usize) -> Vec<String> {
        (0..count).map(|index| format!("row {index}")).collect()
    }

    fn assert_window_invariants(list: &VirtualList) {
        let Some(selected) = list.selected() else {
            assert_eq!(list.window_start(), 0);
            assert!(list.visible().is_empty());
            return;
        };
        let height = list.viewport_height();
        assert!(list.window_start() <= selected);
        assert!(selected < list.window_start() + height);
        assert!(list.window_start() <= list.len().saturating_sub(height));
    }

    #[test]
    fn empty_list_has_no_selection_or_window() {
        let mut list = VirtualList::new(5);
        assert_eq!(list.selected(), None);
        list.down();
        list.up();
        assert_eq!(list.selected(), None);
        assert!(list.visible().is_empty());
    }

    #[test]
    fn no_wraparound_at_either_end() {
        let mut list = VirtualList::new(3);
        list.set_items(labels(4));
        list.up();
        assert_eq!(list.selected(), Some(0));
        for _ in 0..10 {
            list.down();
        }
        assert_eq!(list.selected(), Some(3));
        list.down();
        assert_eq!(list.selected(), Some(3));
    }

    #[test]
    fn window_scrolls_minimally() {
        let mut list = VirtualList::new(3);
        list.set_items(labels(10));
        list.down();
        list.down();
        assert_eq!(list.window_start(), 0);
        list.down();
        assert_eq!(list.selected(), Some(3));
        assert_eq!(list.window_start(), 1);
        assert_eq!(list.visible(), &labels(10)[1..4]);
        list.up();
        list.up();
        assert_eq!(list.window_start(), 1);
        list.up();
        assert_eq!(list.window_start(), 0);
        assert!(list.is_selected(0));
        assert_eq!(list.relative_to_absolute(2), 2);
    }

    #[test]
    fn shrinking_collection_clamps_selection() {
        let mut list = VirtualList::new(4);
        list.set_items(labels(20));
        list.select(17);
        assert_eq!(list.window_start(), 14);

        list.set_items(labels(5));
        assert_eq!(list.selected(), Some(4));
        assert_eq!(list.window_start(), 1);
        assert_window_invariants(&list);

        list.set_items(Vec::new());
        assert_eq!(list.selected(), None);
        assert_eq!(list.window_start(), 0);
    }

    #[test]
    fn random_walks_preserve_window_invariants() {
        let mut rng = Lcg::new(7);
        for size in [1, 2, 3, 9, 40] {
            for height in [1, 3, 10] {
                let mut list = VirtualList::new(height);
                list.set_items(labels(size));
                for _ in 0..200 {
                    match rng.int_n(5) {
                        0 | 1 => list.down(),
                        2 | 3 => list.up(),
                        _ => list.set_items(labels(rng.int_n(size) + 1)),
                    }
                    assert_window_invariants(&list);
                }
            }
        }
    }
}
