//! The per-frame raster pipeline: background, grid, base pixels, effect
//! passes, bulk preview. Drawing is a pure function of the passed-in state —
//! it never mutates the store and performs no I/O; missing regions are
//! backfilled asynchronously by the loader, which schedules a follow-up frame.

use kurbo::{Point, Rect};

use crate::{
    bulk::{BulkPhase, BulkSession},
    color::{Color, PixelEffect},
    store::{Coord, PixelStore},
    viewport::Viewport,
};

/// Below this zoom a one-world-unit grid would be sub-pixel noise.
pub const GRID_ZOOM_THRESHOLD: f64 = 4.0;

/// Glow halo radius in screen pixels per unit of zoom.
pub const GLOW_RADIUS_ZOOM: f64 = 2.5;

/// Spark twinkles are skipped entirely below this intensity.
pub const SPARK_INTENSITY_FLOOR: f64 = 0.3;

/// Sparks gain a colored outline once individual pixels are this large.
pub const SPARK_OUTLINE_ZOOM: f64 = 8.0;

pub const BACKGROUND: Color = Color::new(18, 20, 28);
const GRID_COLOR: Color = Color::new(255, 255, 255);
const GRID_ALPHA: f64 = 0.08;
const PREVIEW_FLAT_ALPHA: f64 = 0.5;

/// One stop of a radial gradient: offset along the radius in `0..=1`, color,
/// straight alpha.
#[derive(Clone, Copy, Debug)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Color,
    pub alpha: f64,
}

/// The render-target boundary: an addressable 2D raster sized to the viewport.
/// Filled rectangles, stroked rectangles, and radial gradient fills are the
/// only operations the pipeline needs. Coordinates are screen-space pixels;
/// rectangles may extend past the surface and are clipped by the
/// implementation.
pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn clear(&mut self, color: Color);
    fn fill_rect(&mut self, rect: Rect, color: Color, alpha: f64);
    fn stroke_rect(&mut self, rect: Rect, color: Color, alpha: f64, line_width: f64);
    /// `additive` selects additive blending (used by the glow pass) instead of
    /// source-over.
    fn fill_radial_gradient(
        &mut self,
        center: Point,
        radius: f64,
        stops: &[GradientStop],
        additive: bool,
    );
}

/// Everything one frame reads. Snapshot references only; the renderer holds no
/// state of its own.
pub struct FrameInput<'a> {
    pub viewport: &'a Viewport,
    pub store: &'a PixelStore,
    pub bulk: &'a BulkSession,
    pub now: f64,
}

/// Draw one frame. Pass order: background, grid, base pixels, effects, bulk
/// preview.
#[tracing::instrument(skip_all, fields(zoom = input.viewport.zoom()))]
pub fn render_frame(input: &FrameInput<'_>, surface: &mut dyn Surface) {
    surface.clear(BACKGROUND);

    if input.viewport.zoom() >= GRID_ZOOM_THRESHOLD {
        draw_grid(input.viewport, surface);
    }

    // Base pass; effect-tagged pixels defer to the effect pass so halos and
    // twinkles layer over their neighbors.
    let view = input.viewport.view_rect();
    let mut deferred: Vec<(Coord, Color, PixelEffect)> = Vec::new();
    for (coord, pixel) in input.store.pixels_in(view) {
        match pixel.effect {
            Some(effect) => deferred.push((*coord, pixel.color, effect)),
            None => {
                surface.fill_rect(pixel_rect(input.viewport, *coord), pixel.color, 1.0);
            }
        }
    }

    for (coord, color, effect) in deferred {
        match effect {
            PixelEffect::Glow => draw_glow(input.viewport, coord, color, surface),
            PixelEffect::Spark => draw_spark(input.viewport, coord, color, input.now, surface),
        }
    }

    if input.bulk.phase() != BulkPhase::Idle && input.bulk.preview_len() > 0 {
        draw_preview(input, surface);
    }
}

/// Screen-space square covering one world pixel.
fn pixel_rect(viewport: &Viewport, coord: Coord) -> Rect {
    let zoom = viewport.zoom();
    let origin = viewport.world_to_screen(Point::new(f64::from(coord.x), f64::from(coord.y)));
    Rect::new(origin.x, origin.y, origin.x + zoom, origin.y + zoom)
}

fn draw_grid(viewport: &Viewport, surface: &mut dyn Surface) {
    let view = viewport.view_rect();
    let screen = viewport.screen();

    let mut x = view.x0.ceil();
    while x <= view.x1 {
        let sx = viewport.world_to_screen(Point::new(x, 0.0)).x;
        surface.fill_rect(
            Rect::new(sx, 0.0, sx + 1.0, screen.height),
            GRID_COLOR,
            GRID_ALPHA,
        );
        x += 1.0;
    }
    let mut y = view.y0.ceil();
    while y <= view.y1 {
        let sy = viewport.world_to_screen(Point::new(0.0, y)).y;
        surface.fill_rect(
            Rect::new(0.0, sy, screen.width, sy + 1.0),
            GRID_COLOR,
            GRID_ALPHA,
        );
        y += 1.0;
    }
}

fn draw_glow(viewport: &Viewport, coord: Coord, color: Color, surface: &mut dyn Surface) {
    let rect = pixel_rect(viewport, coord);
    let center = rect.center();
    let radius = GLOW_RADIUS_ZOOM * viewport.zoom();
    let stops = [
        GradientStop {
            offset: 0.0,
            color,
            alpha: 1.0,
        },
        GradientStop {
            offset: 0.4,
            color,
            alpha: 0.45,
        },
        GradientStop {
            offset: 1.0,
            color,
            alpha: 0.0,
        },
    ];
    surface.fill_radial_gradient(center, radius, &stops, true);
    surface.fill_rect(rect, color, 1.0);
}

/// Time-and-position-seeded twinkle intensity in `0..=1`.
pub fn spark_intensity(coord: Coord, now: f64) -> f64 {
    let seed = f64::from(coord.x) * 12.9898 + f64::from(coord.y) * 78.233;
    0.5 + 0.5 * (now * 6.0 + seed).sin()
}

fn draw_spark(
    viewport: &Viewport,
    coord: Coord,
    color: Color,
    now: f64,
    surface: &mut dyn Surface,
) {
    let rect = pixel_rect(viewport, coord);
    surface.fill_rect(rect, color, 1.0);

    let intensity = spark_intensity(coord, now);
    if intensity < SPARK_INTENSITY_FLOOR {
        return;
    }

    let core = Color::new(
        lerp_u8(color.r, 255, intensity),
        lerp_u8(color.g, 255, intensity),
        lerp_u8(color.b, 255, intensity),
    );
    // Bright core square scaled by intensity, centered on the pixel.
    let inset = rect.width() * (1.0 - intensity) / 2.0;
    surface.fill_rect(rect.inset(-inset), core, intensity);
    if viewport.zoom() >= SPARK_OUTLINE_ZOOM {
        surface.stroke_rect(rect, color, intensity, 1.0);
    }
}

fn draw_preview(input: &FrameInput<'_>, surface: &mut dyn Surface) {
    let viewport = input.viewport;
    if input.bulk.use_flat_preview() {
        // Cheap mode: per-pixel animated borders would blow the frame budget
        // on large selections.
        for (coord, color) in input.bulk.preview() {
            surface.fill_rect(pixel_rect(viewport, *coord), *color, PREVIEW_FLAT_ALPHA);
        }
        return;
    }

    let pulse = 0.5 + 0.5 * (input.now * 4.0).sin();
    let fill_alpha = 0.35 + 0.35 * pulse;
    for (coord, color) in input.bulk.preview() {
        let rect = pixel_rect(viewport, *coord);
        surface.fill_rect(rect, *color, fill_alpha);
        surface.stroke_rect(rect, Color::new(255, 255, 255), 0.3 + 0.5 * pulse, 1.0);
        if pulse > 0.8 {
            let s = (rect.width() * 0.25).max(1.0);
            surface.fill_rect(
                Rect::new(rect.x0, rect.y0, rect.x0 + s, rect.y0 + s),
                Color::new(255, 255, 255),
                pulse,
            );
        }
    }
}

fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
    (f64::from(a) + (f64::from(b) - f64::from(a)) * t.clamp(0.0, 1.0)).round() as u8
}

/// CPU raster surface: straight-alpha RGBA8 over an opaque background. Backs
/// the tests and the CLI's PNG snapshots.
pub struct RasterSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    fn clip(&self, rect: Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = rect.x0.floor().max(0.0) as u32;
        let y0 = rect.y0.floor().max(0.0) as u32;
        let x1 = rect.x1.ceil().min(f64::from(self.width)) as u32;
        let y1 = rect.y1.ceil().min(f64::from(self.height)) as u32;
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn blend_over(&mut self, x: u32, y: u32, color: Color, alpha: f64) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let a = alpha.clamp(0.0, 1.0);
        let mix = |dst: u8, src: u8| -> u8 {
            (f64::from(src) * a + f64::from(dst) * (1.0 - a)).round() as u8
        };
        self.data[i] = mix(self.data[i], color.r);
        self.data[i + 1] = mix(self.data[i + 1], color.g);
        self.data[i + 2] = mix(self.data[i + 2], color.b);
        self.data[i + 3] = 255;
    }

    fn blend_add(&mut self, x: u32, y: u32, color: Color, alpha: f64) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let a = alpha.clamp(0.0, 1.0);
        let add = |dst: u8, src: u8| -> u8 {
            (f64::from(dst) + f64::from(src) * a).min(255.0).round() as u8
        };
        self.data[i] = add(self.data[i], color.r);
        self.data[i + 1] = add(self.data[i + 1], color.g);
        self.data[i + 2] = add(self.data[i + 2], color.b);
        self.data[i + 3] = 255;
    }
}

impl Surface for RasterSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Color) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&[color.r, color.g, color.b, 255]);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color, alpha: f64) {
        let Some((x0, y0, x1, y1)) = self.clip(rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend_over(x, y, color, alpha);
            }
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, alpha: f64, line_width: f64) {
        let lw = line_width.max(1.0);
        let edges = [
            Rect::new(rect.x0, rect.y0, rect.x1, rect.y0 + lw),
            Rect::new(rect.x0, rect.y1 - lw, rect.x1, rect.y1),
            Rect::new(rect.x0, rect.y0 + lw, rect.x0 + lw, rect.y1 - lw),
            Rect::new(rect.x1 - lw, rect.y0 + lw, rect.x1, rect.y1 - lw),
        ];
        for edge in edges {
            self.fill_rect(edge, color, alpha);
        }
    }

    fn fill_radial_gradient(
        &mut self,
        center: Point,
        radius: f64,
        stops: &[GradientStop],
        additive: bool,
    ) {
        if radius <= 0.0 || stops.is_empty() {
            return;
        }
        let bounds = Rect::new(
            center.x - radius,
            center.y - radius,
            center.x + radius,
            center.y + radius,
        );
        let Some((x0, y0, x1, y1)) = self.clip(bounds) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let dx = f64::from(x) + 0.5 - center.x;
                let dy = f64::from(y) + 0.5 - center.y;
                let t = (dx * dx + dy * dy).sqrt() / radius;
                if t > 1.0 {
                    continue;
                }
                let (color, alpha) = sample_stops(stops, t);
                if alpha <= 0.0 {
                    continue;
                }
                if additive {
                    self.blend_add(x, y, color, alpha);
                } else {
                    self.blend_over(x, y, color, alpha);
                }
            }
        }
    }
}

fn sample_stops(stops: &[GradientStop], t: f64) -> (Color, f64) {
    let first = stops[0];
    if t <= first.offset {
        return (first.color, first.alpha);
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.offset {
            let span = (b.offset - a.offset).max(f64::EPSILON);
            let k = (t - a.offset) / span;
            let color = Color::new(
                lerp_u8(a.color.r, b.color.r, k),
                lerp_u8(a.color.g, b.color.g, k),
                lerp_u8(a.color.b, b.color.b, k),
            );
            return (color, a.alpha + (b.alpha - a.alpha) * k);
        }
    }
    let last = stops[stops.len() - 1];
    (last.color, last.alpha)
}
