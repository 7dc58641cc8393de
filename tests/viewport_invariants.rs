use pixelport::{Viewport, viewport::MAX_ZOOM};

fn assert_inside_canvas(vp: &Viewport, canvas: f64) {
    let r = vp.view_rect();
    assert!(r.x0 >= -1e-9 && r.y0 >= -1e-9, "view rect {r:?} underflows");
    assert!(
        r.x1 <= canvas + 1e-9 && r.y1 <= canvas + 1e-9,
        "view rect {r:?} overflows canvas {canvas}"
    );
}

#[test]
fn fresh_viewport_is_centered_and_contained() {
    let vp = Viewport::new(8192, 1920.0, 1080.0);
    assert_eq!(vp.center(), kurbo::Point::new(4096.0, 4096.0));
    assert_inside_canvas(&vp, 8192.0);
}

#[test]
fn min_zoom_pins_the_wide_axis_to_the_canvas() {
    let mut vp = Viewport::new(8192, 1920.0, 1080.0);
    vp.zoom_at(0.0, 0.0, 1.0e-9);
    // At minimum zoom the wider screen axis spans the whole canvas.
    let r = vp.view_rect();
    assert!((r.width() - 8192.0).abs() < 1e-6);
    assert!(r.height() < 8192.0);
    assert_inside_canvas(&vp, 8192.0);
    // That axis is pinned: panning along it is a no-op.
    let before = vp.center();
    vp.pan(5000.0, 0.0);
    assert!((vp.center().x - before.x).abs() < 1e-9);
}

#[test]
fn zoom_ceiling_holds_under_repeated_magnification() {
    let mut vp = Viewport::new(8192, 1024.0, 768.0);
    for _ in 0..64 {
        vp.zoom_at(512.0, 384.0, 2.0);
    }
    assert_eq!(vp.zoom(), MAX_ZOOM);
    assert_inside_canvas(&vp, 8192.0);
}

#[test]
fn anchor_zoom_near_the_edge_still_clamps() {
    let mut vp = Viewport::new(8192, 1024.0, 768.0);
    // Drag the camera into the top-left corner, then zoom out around it.
    vp.pan(-1.0e7, -1.0e7);
    vp.zoom_at(0.0, 0.0, 0.25);
    assert_inside_canvas(&vp, 8192.0);
    vp.zoom_at(0.0, 0.0, 4.0);
    assert_inside_canvas(&vp, 8192.0);
}

#[test]
fn resize_reclamps_zoom_and_bounds() {
    let mut vp = Viewport::new(1024, 256.0, 256.0);
    vp.zoom_at(128.0, 128.0, 0.25);
    // Growing the screen raises the zoom floor above the current zoom.
    vp.resize(2048.0, 2048.0);
    assert!(vp.zoom() >= vp.min_zoom() - 1e-12);
    assert_inside_canvas(&vp, 1024.0);
}

#[test]
fn projections_are_consistent_after_heavy_manipulation() {
    let mut vp = Viewport::new(8192, 1440.0, 900.0);
    vp.zoom_at(700.0, 450.0, 6.0);
    vp.pan(-320.0, 180.0);
    vp.zoom_at(10.0, 890.0, 0.7);
    for &(sx, sy) in &[(0.0, 0.0), (1440.0, 900.0), (720.0, 450.0), (33.0, 871.0)] {
        let w = vp.screen_to_world(sx, sy);
        let s = vp.world_to_screen(w);
        assert!((s.x - sx).abs() < 1e-9 && (s.y - sy).abs() < 1e-9);
    }
}
