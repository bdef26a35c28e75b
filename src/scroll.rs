//! Virtual scroll window manager.
//!
//! Keeps a prefix-sum table of resolved item heights so a scroll update is a
//! binary search rather than a walk over every item. Height changes rebuild
//! the table in one pass. The visible range and total height are published
//! through watch channels for UI bindings.
//!
//! Height resolution priority for each item:
//! measured > explicit > `estimated_item_height` > `item_height`.
//! Non-positive heights count as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::watch;

/// Item identifier, unique within one list.
pub type ItemId = String;

/// One entry of a virtualized list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollItem {
    pub id: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default)]
    pub data: Value,
}

impl ScrollItem {
    pub fn new(id: impl Into<ItemId>, data: Value) -> Self {
        Self {
            id: id.into(),
            height: None,
            data,
        }
    }

    #[must_use]
    pub fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }
}

/// Viewport geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VirtualScrollConfig {
    /// Fallback height for items with no better information.
    pub item_height: f64,
    /// Extra items kept on each side of the viewport.
    pub overscan: usize,
    pub container_height: f64,
    #[serde(default)]
    pub estimated_item_height: Option<f64>,
}

impl Default for VirtualScrollConfig {
    fn default() -> Self {
        Self {
            item_height: 48.0,
            overscan: 5,
            container_height: 600.0,
            estimated_item_height: None,
        }
    }
}

/// Inclusive index range of items to render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisibleRange {
    pub start: usize,
    pub end: usize,
}

/// A measured height for one item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HeightUpdate {
    pub id: ItemId,
    pub height: f64,
}

fn positive(height: Option<f64>) -> Option<f64> {
    height.filter(|h| *h > 0.0)
}

/// Computes which items of a long list intersect the viewport.
#[derive(Debug)]
pub struct VirtualScrollManager {
    config: VirtualScrollConfig,
    items: Vec<ScrollItem>,
    measured: HashMap<ItemId, f64>,
    /// `offsets[i]` is the top of item `i`; `offsets[len]` is the total height.
    offsets: Vec<f64>,
    scroll_top: f64,
    range: watch::Sender<VisibleRange>,
    total_height: watch::Sender<f64>,
}

impl VirtualScrollManager {
    pub fn new(config: VirtualScrollConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            measured: HashMap::new(),
            offsets: vec![0.0],
            scroll_top: 0.0,
            range: watch::Sender::new(VisibleRange::default()),
            total_height: watch::Sender::new(0.0),
        }
    }

    /// Replace the whole list.
    pub fn set_items(&mut self, items: Vec<ScrollItem>) {
        self.items = items;
        self.recalculate();
    }

    pub fn update_scroll_top(&mut self, scroll_top: f64) {
        self.scroll_top = scroll_top.max(0.0);
        self.update_visible_range();
    }

    /// Record a measured height for one item.
    pub fn update_item_height(&mut self, id: impl Into<ItemId>, height: f64) {
        self.measured.insert(id.into(), height);
        self.recalculate();
    }

    /// Record several measured heights with a single recomputation.
    pub fn batch_update<I>(&mut self, updates: I)
    where
        I: IntoIterator<Item = HeightUpdate>,
    {
        for update in updates {
            self.measured.insert(update.id, update.height);
        }
        self.recalculate();
    }

    pub fn set_container_height(&mut self, container_height: f64) {
        self.config.container_height = container_height;
        self.update_visible_range();
    }

    /// Rebuild offsets and the visible range from scratch.
    pub fn recalculate(&mut self) {
        self.rebuild_offsets();
        self.update_visible_range();
    }

    /// Drop all items and measurements.
    pub fn cleanup(&mut self) {
        self.measured.clear();
        self.items.clear();
        self.recalculate();
    }

    pub fn config(&self) -> &VirtualScrollConfig {
        &self.config
    }

    pub fn items(&self) -> &[ScrollItem] {
        &self.items
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn total_height(&self) -> f64 {
        *self.total_height.borrow()
    }

    pub fn visible_range(&self) -> VisibleRange {
        *self.range.borrow()
    }

    /// Items inside the current visible range.
    pub fn visible_items(&self) -> &[ScrollItem] {
        if self.items.is_empty() {
            return &[];
        }
        let VisibleRange { start, end } = self.visible_range();
        &self.items[start..=end]
    }

    /// Top offset of the item at `index`. Indices past the end give the
    /// total height.
    pub fn item_offset(&self, index: usize) -> f64 {
        self.offsets[index.min(self.items.len())]
    }

    pub fn subscribe_range(&self) -> watch::Receiver<VisibleRange> {
        self.range.subscribe()
    }

    pub fn subscribe_total_height(&self) -> watch::Receiver<f64> {
        self.total_height.subscribe()
    }

    fn resolved_height(&self, item: &ScrollItem) -> f64 {
        positive(self.measured.get(&item.id).copied())
            .or_else(|| positive(item.height))
            .or_else(|| positive(self.config.estimated_item_height))
            .unwrap_or(self.config.item_height)
    }

    fn rebuild_offsets(&mut self) {
        let mut offsets = Vec::with_capacity(self.items.len() + 1);
        let mut top = 0.0;
        offsets.push(top);
        for item in &self.items {
            top += self.resolved_height(item);
            offsets.push(top);
        }
        self.offsets = offsets;
        self.total_height.send_replace(top);
    }

    fn update_visible_range(&mut self) {
        let range = self.compute_range();
        self.range.send_if_modified(|current| {
            let changed = *current != range;
            *current = range;
            changed
        });
    }

    fn compute_range(&self) -> VisibleRange {
        let len = self.items.len();
        if len == 0 {
            return VisibleRange::default();
        }
        let last = len - 1;
        let overscan = self.config.overscan;
        let viewport_bottom = self.scroll_top + self.config.container_height;

        // First item whose bottom edge is below the scroll offset. When the
        // offset is past the content, keep the tail in view.
        let bottoms = &self.offsets[1..];
        let first = bottoms
            .partition_point(|bottom| *bottom <= self.scroll_top)
            .min(last);
        let start = first.saturating_sub(overscan);

        // First item at or after `start` whose top edge is below the viewport.
        let tops = &self.offsets[start..len];
        let beyond = tops.partition_point(|top| *top <= viewport_bottom);
        let end = if beyond < tops.len() {
            (start + beyond + overscan).min(last)
        } else {
            let per_view = (self.config.container_height / self.config.item_height).ceil();
            let per_view = if per_view.is_finite() && per_view > 0.0 {
                per_view as usize
            } else {
                0
            };
            (start + per_view + overscan).min(last)
        };

        VisibleRange { start, end }
    }
}
