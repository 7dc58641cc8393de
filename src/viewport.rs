use kurbo::{Point, Rect, Size, Vec2};

/// Hard ceiling on magnification, in screen pixels per world unit.
pub const MAX_ZOOM: f64 = 50.0;

/// Substituted whenever zoom math degenerates (zero, negative, or non-finite).
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Camera over the canvas: a world-space center and a zoom scalar, clamped so
/// the derived view rectangle always lies inside `[0, canvas_size]` on both
/// axes. All mutating operations re-clamp before returning.
#[derive(Clone, Copy, Debug)]
pub struct Viewport {
    center: Point,
    zoom: f64,
    screen: Size,
    canvas_size: f64,
}

impl Viewport {
    pub fn new(canvas_size: u32, screen_width: f64, screen_height: f64) -> Self {
        let canvas = f64::from(canvas_size);
        let mut vp = Self {
            center: Point::new(canvas / 2.0, canvas / 2.0),
            zoom: DEFAULT_ZOOM,
            screen: Size::new(screen_width.max(1.0), screen_height.max(1.0)),
            canvas_size: canvas,
        };
        vp.zoom = vp.sanitize_zoom(vp.zoom);
        vp.clamp_bounds();
        vp
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn screen(&self) -> Size {
        self.screen
    }

    /// Smallest zoom at which the view rectangle still fits inside the canvas.
    pub fn min_zoom(&self) -> f64 {
        (self.screen.width.max(self.screen.height) / self.canvas_size).min(MAX_ZOOM)
    }

    fn sanitize_zoom(&self, zoom: f64) -> f64 {
        let zoom = if zoom.is_finite() && zoom > 0.0 {
            zoom
        } else {
            DEFAULT_ZOOM
        };
        zoom.clamp(self.min_zoom(), MAX_ZOOM)
    }

    /// Pan by a screen-space delta. Screen distance maps to world distance
    /// through the current zoom.
    pub fn pan(&mut self, dx_screen: f64, dy_screen: f64) {
        self.center += Vec2::new(dx_screen / self.zoom, dy_screen / self.zoom);
        self.clamp_bounds();
    }

    /// Anchor-preserving zoom: the world point under `(sx, sy)` stays under the
    /// cursor across the zoom change. Degenerate factors fall back to
    /// [`DEFAULT_ZOOM`] before any dependent math runs.
    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64) {
        let anchor = self.screen_to_world(sx, sy);
        self.zoom = self.sanitize_zoom(self.zoom * factor);
        let half = Vec2::new(self.screen.width / 2.0, self.screen.height / 2.0);
        let cursor = Vec2::new(sx, sy);
        self.center = anchor - (cursor - half) / self.zoom;
        self.clamp_bounds();
    }

    pub fn resize(&mut self, screen_width: f64, screen_height: f64) {
        self.screen = Size::new(screen_width.max(1.0), screen_height.max(1.0));
        self.zoom = self.sanitize_zoom(self.zoom);
        self.clamp_bounds();
    }

    /// Force the camera back inside the canvas. Half extents derive from the
    /// current zoom; an axis whose view span covers the whole canvas pins to
    /// the canvas midpoint.
    pub fn clamp_bounds(&mut self) {
        let half_w = self.screen.width / (2.0 * self.zoom);
        let half_h = self.screen.height / (2.0 * self.zoom);
        self.center.x = clamp_axis(self.center.x, half_w, self.canvas_size);
        self.center.y = clamp_axis(self.center.y, half_h, self.canvas_size);
    }

    /// World rectangle currently on screen.
    pub fn view_rect(&self) -> Rect {
        let half_w = self.screen.width / (2.0 * self.zoom);
        let half_h = self.screen.height / (2.0 * self.zoom);
        Rect::new(
            self.center.x - half_w,
            self.center.y - half_h,
            self.center.x + half_w,
            self.center.y + half_h,
        )
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> Point {
        Point::new(
            self.center.x + (sx - self.screen.width / 2.0) / self.zoom,
            self.center.y + (sy - self.screen.height / 2.0) / self.zoom,
        )
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.center.x) * self.zoom + self.screen.width / 2.0,
            (p.y - self.center.y) * self.zoom + self.screen.height / 2.0,
        )
    }
}

fn clamp_axis(value: f64, half_extent: f64, canvas: f64) -> f64 {
    if half_extent * 2.0 >= canvas {
        canvas / 2.0
    } else {
        value.clamp(half_extent, canvas - half_extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vp() -> Viewport {
        Viewport::new(8192, 1024.0, 768.0)
    }

    fn assert_contained(vp: &Viewport) {
        let r = vp.view_rect();
        assert!(r.x0 >= -1e-9 && r.y0 >= -1e-9, "view rect {r:?} underflows");
        assert!(
            r.x1 <= 8192.0 + 1e-9 && r.y1 <= 8192.0 + 1e-9,
            "view rect {r:?} overflows"
        );
    }

    #[test]
    fn pan_clamps_to_canvas_edges() {
        let mut vp = vp();
        vp.pan(-1.0e7, -1.0e7);
        assert_contained(&vp);
        vp.pan(1.0e9, 1.0e9);
        assert_contained(&vp);
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut vp = vp();
        vp.zoom_at(512.0, 384.0, 1.0e9);
        assert_eq!(vp.zoom(), MAX_ZOOM);
        vp.zoom_at(512.0, 384.0, 1.0e-12);
        assert!((vp.zoom() - vp.min_zoom()).abs() < 1e-12);
        assert_contained(&vp);
    }

    #[test]
    fn degenerate_zoom_falls_back_to_default() {
        let mut vp = vp();
        vp.zoom_at(0.0, 0.0, f64::NAN);
        assert_eq!(vp.zoom(), DEFAULT_ZOOM);
        assert_contained(&vp);
        vp.zoom_at(0.0, 0.0, f64::INFINITY);
        assert_eq!(vp.zoom(), DEFAULT_ZOOM);
        vp.zoom_at(0.0, 0.0, -3.0);
        assert_eq!(vp.zoom(), DEFAULT_ZOOM);
    }

    #[test]
    fn zoom_preserves_anchor_world_point() {
        let mut vp = vp();
        vp.pan(900.0, 700.0);
        let before = vp.screen_to_world(200.0, 150.0);
        vp.zoom_at(200.0, 150.0, 2.0);
        let after = vp.screen_to_world(200.0, 150.0);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn projection_roundtrip() {
        let mut vp = vp();
        vp.zoom_at(100.0, 100.0, 3.0);
        vp.pan(40.0, -25.0);
        let w = vp.screen_to_world(333.0, 444.0);
        let s = vp.world_to_screen(w);
        assert!((s.x - 333.0).abs() < 1e-9);
        assert!((s.y - 444.0).abs() < 1e-9);
    }

    #[test]
    fn containment_holds_across_a_random_walk() {
        let mut vp = vp();
        let mut state = 0x9E3779B97F4A7C15u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f64 / (1u64 << 31) as f64) - 1.0
        };
        for _ in 0..500 {
            vp.pan(next() * 4000.0, next() * 4000.0);
            vp.zoom_at(next().abs() * 1024.0, next().abs() * 768.0, 0.5 + next().abs() * 3.0);
            if next() > 0.9 {
                vp.resize(640.0 + next().abs() * 1280.0, 480.0 + next().abs() * 960.0);
            }
            assert_contained(&vp);
        }
    }
}
