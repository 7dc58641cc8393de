use std::collections::HashSet;

use kurbo::Rect;

use crate::{config::CanvasConfig, store::{Coord, RegionKey}, viewport::Viewport};

/// Minimum spacing between throttled visibility passes, in seconds.
pub const VISIBILITY_THROTTLE: f64 = 0.1;

/// Period of the exact-rectangle reconciliation pass, in seconds.
pub const RECONCILE_INTERVAL: f64 = 2.0;

/// Base streaming padding around the view rectangle, in region side lengths.
pub const BASE_PADDING_REGIONS: f64 = 2.0;

/// Inclusive rectangle of region indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl RegionRect {
    pub fn count(&self) -> u32 {
        (self.x1 - self.x0 + 1) * (self.y1 - self.y0 + 1)
    }

    pub fn contains(&self, key: RegionKey) -> bool {
        key.x >= self.x0 && key.x <= self.x1 && key.y >= self.y0 && key.y <= self.y1
    }

    pub fn keys(&self) -> impl Iterator<Item = RegionKey> + '_ {
        let (x0, x1, y0) = (self.x0, self.x1, self.y0);
        (y0..=self.y1).flat_map(move |y| (x0..=x1).map(move |x| RegionKey::new(x, y)))
    }
}

fn region_rect_for(world: Rect, config: &CanvasConfig) -> RegionRect {
    let rs = f64::from(config.region_size);
    let last = config.regions_per_side() - 1;
    // The top edge is exclusive: a rect ending exactly on a region boundary
    // does not pull in the next region.
    let idx = |v: f64, exclusive_end: bool| -> u32 {
        let v = if exclusive_end { v - 1e-9 } else { v };
        ((v / rs).floor().max(0.0) as u32).min(last)
    };
    RegionRect {
        x0: idx(world.x0, false),
        y0: idx(world.y0, false),
        x1: idx(world.x1, true),
        y1: idx(world.y1, true),
    }
}

/// Padded region rectangle covering the viewport. The padding grows when
/// zoomed out, since one screen-unit of panning then covers more world
/// distance: base padding of two region sides scaled by `1/zoom` clamped to
/// `[0.5, 2.0]`, clipped to the region grid.
pub fn visible_regions(viewport: &Viewport, config: &CanvasConfig) -> RegionRect {
    let factor = (1.0 / viewport.zoom()).clamp(0.5, 2.0);
    let pad = BASE_PADDING_REGIONS * f64::from(config.region_size) * factor;
    region_rect_for(viewport.view_rect().inflate(pad, pad), config)
}

/// Unpadded region rectangle — the reconciliation pass's ground truth.
pub fn exact_visible_regions(viewport: &Viewport, config: &CanvasConfig) -> RegionRect {
    region_rect_for(viewport.view_rect(), config)
}

/// Streaming state: which regions have resolved, plus the throttle and
/// reconciliation clocks. The loaded set is monotonic for the session (no
/// eviction); a region is marked only after its fetch resolves and merges, so
/// a failed fetch is retried by the next natural pass. There is deliberately
/// no in-flight set below the already-loaded check: a tight double trigger can
/// duplicate a fetch, and merging twice is idempotent.
#[derive(Debug, Default)]
pub struct RegionTracker {
    loaded: HashSet<RegionKey>,
    last_pass_at: Option<f64>,
    last_reconcile_at: Option<f64>,
    bypass_throttle: bool,
}

impl RegionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self, key: RegionKey) -> bool {
        self.loaded.contains(&key)
    }

    pub fn mark_loaded(&mut self, key: RegionKey) {
        self.loaded.insert(key);
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Let the next `ensure_visible` run regardless of the throttle window.
    /// Called when a drag ends or a zoom settles.
    pub fn request_immediate_pass(&mut self) {
        self.bypass_throttle = true;
    }

    /// Throttled visibility pass: at most one every [`VISIBILITY_THROTTLE`]
    /// seconds unless bypassed. Returns the padded-visible regions that still
    /// need a fetch.
    pub fn ensure_visible(
        &mut self,
        viewport: &Viewport,
        config: &CanvasConfig,
        now: f64,
    ) -> Vec<RegionKey> {
        let throttled = match self.last_pass_at {
            Some(t) => now - t < VISIBILITY_THROTTLE,
            None => false,
        };
        if throttled && !self.bypass_throttle {
            return Vec::new();
        }
        self.bypass_throttle = false;
        self.last_pass_at = Some(now);

        let rect = visible_regions(viewport, config);
        let missing: Vec<_> = rect.keys().filter(|k| !self.loaded.contains(k)).collect();
        if !missing.is_empty() {
            tracing::debug!(count = missing.len(), "visibility pass found unloaded regions");
        }
        missing
    }

    /// Periodic second line of defense: recompute the exact unpadded rectangle
    /// and return anything a throttle window or event race may have dropped.
    pub fn reconcile(
        &mut self,
        viewport: &Viewport,
        config: &CanvasConfig,
        now: f64,
    ) -> Vec<RegionKey> {
        let due = match self.last_reconcile_at {
            Some(t) => now - t >= RECONCILE_INTERVAL,
            None => true,
        };
        if !due {
            return Vec::new();
        }
        self.last_reconcile_at = Some(now);

        let rect = exact_visible_regions(viewport, config);
        let missing: Vec<_> = rect.keys().filter(|k| !self.loaded.contains(k)).collect();
        if !missing.is_empty() {
            tracing::warn!(count = missing.len(), "reconciliation caught dropped regions");
        }
        missing
    }

    /// Immediate demand for the region owning one coordinate (hover or click
    /// target). Ignores the throttle entirely: an interaction must never fail
    /// because its region has not streamed yet.
    pub fn ensure_coord(&self, coord: Coord, config: &CanvasConfig) -> Option<RegionKey> {
        let key = RegionKey::containing(coord, config.region_size);
        (!self.loaded.contains(&key)).then_some(key)
    }
}
