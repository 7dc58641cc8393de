use std::collections::HashMap;

use kurbo::Rect;

use crate::color::{Color, PixelEffect, resolve_effect};

/// Global integer canvas coordinate, `0 <= x,y < canvas_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
}

impl Coord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Index of one streaming region: `(floor(x / region_size), floor(y / region_size))`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct RegionKey {
    pub x: u32,
    pub y: u32,
}

impl RegionKey {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn containing(coord: Coord, region_size: u32) -> Self {
        Self {
            x: coord.x / region_size,
            y: coord.y / region_size,
        }
    }

    /// World origin of this region's top-left corner.
    pub fn origin(&self, region_size: u32) -> Coord {
        Coord::new(self.x * region_size, self.y * region_size)
    }
}

/// One canvas pixel. Immutable once constructed; updates replace the whole
/// record. Never deleted — the canvas is append/overwrite-only.
#[derive(Clone, Debug, PartialEq)]
pub struct Pixel {
    pub color: Color,
    pub placed_at: f64,
    pub owner: String,
    pub effect: Option<PixelEffect>,
}

impl Pixel {
    /// Build a record from wire fields, resolving the effect tag through the
    /// shared lookup (explicit tag wins, color inference second).
    pub fn from_wire(
        color: Color,
        placed_at: f64,
        owner: String,
        explicit_effect: Option<PixelEffect>,
    ) -> Self {
        Self {
            effect: resolve_effect(explicit_effect, color),
            color,
            placed_at,
            owner,
        }
    }
}

/// Sparse canvas contents: O(1) point lookup, unbounded, written only by the
/// logic thread (the renderer just reads).
#[derive(Debug, Default)]
pub struct PixelStore {
    pixels: HashMap<Coord, Pixel>,
}

impl PixelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, coord: Coord) -> Option<&Pixel> {
        self.pixels.get(&coord)
    }

    pub fn set(&mut self, coord: Coord, pixel: Pixel) {
        self.pixels.insert(coord, pixel);
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Coord, &Pixel)> {
        self.pixels.iter()
    }

    /// Stored pixels whose unit square intersects `rect` (world space).
    pub fn pixels_in<'a>(&'a self, rect: Rect) -> impl Iterator<Item = (&'a Coord, &'a Pixel)> {
        self.pixels.iter().filter(move |(c, _)| {
            let x = f64::from(c.x);
            let y = f64::from(c.y);
            x + 1.0 > rect.x0 && x < rect.x1 && y + 1.0 > rect.y0 && y < rect.y1
        })
    }

    /// Overwrite-merge a region snapshot. Local coordinates convert through
    /// `global = region_index * region_size + local`. Re-merging identical data
    /// is a no-op in effect, which is what makes duplicate fetches benign.
    pub fn merge_region(
        &mut self,
        key: RegionKey,
        region_size: u32,
        pixels: impl IntoIterator<Item = (Coord, Pixel)>,
    ) {
        let origin = key.origin(region_size);
        for (local, pixel) in pixels {
            let global = Coord::new(origin.x + local.x, origin.y + local.y);
            self.pixels.insert(global, pixel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(color: Color, at: f64) -> Pixel {
        Pixel::from_wire(color, at, "tester".to_string(), None)
    }

    #[test]
    fn region_key_math() {
        assert_eq!(
            RegionKey::containing(Coord::new(0, 0), 512),
            RegionKey::new(0, 0)
        );
        assert_eq!(
            RegionKey::containing(Coord::new(511, 512), 512),
            RegionKey::new(0, 1)
        );
        assert_eq!(
            RegionKey::containing(Coord::new(8191, 8191), 512),
            RegionKey::new(15, 15)
        );
        assert_eq!(RegionKey::new(3, 2).origin(512), Coord::new(1536, 1024));
    }

    #[test]
    fn later_write_wins() {
        let mut store = PixelStore::new();
        let c = Coord::new(10, 20);
        store.set(c, px(Color::new(1, 1, 1), 1.0));
        store.set(c, px(Color::new(2, 2, 2), 2.0));
        assert_eq!(store.get(c).unwrap().color, Color::new(2, 2, 2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn merge_region_converts_local_to_global() {
        let mut store = PixelStore::new();
        let key = RegionKey::new(2, 1);
        store.merge_region(
            key,
            512,
            vec![(Coord::new(5, 7), px(Color::new(9, 9, 9), 1.0))],
        );
        assert!(store.get(Coord::new(1029, 519)).is_some());
        assert!(store.get(Coord::new(5, 7)).is_none());
    }

    #[test]
    fn duplicate_merge_is_idempotent() {
        let snapshot = vec![
            (Coord::new(0, 0), px(Color::new(1, 2, 3), 1.0)),
            (Coord::new(3, 4), px(Color::new(4, 5, 6), 2.0)),
        ];
        let mut once = PixelStore::new();
        once.merge_region(RegionKey::new(1, 1), 512, snapshot.clone());
        let mut twice = PixelStore::new();
        twice.merge_region(RegionKey::new(1, 1), 512, snapshot.clone());
        twice.merge_region(RegionKey::new(1, 1), 512, snapshot);
        assert_eq!(once.len(), twice.len());
        for (c, p) in once.iter() {
            assert_eq!(twice.get(*c), Some(p));
        }
    }

    #[test]
    fn pixels_in_uses_unit_square_intersection() {
        let mut store = PixelStore::new();
        store.set(Coord::new(9, 9), px(Color::new(1, 1, 1), 1.0));
        store.set(Coord::new(10, 10), px(Color::new(2, 2, 2), 1.0));
        store.set(Coord::new(30, 30), px(Color::new(3, 3, 3), 1.0));
        let hits: Vec<_> = store
            .pixels_in(Rect::new(9.5, 9.5, 20.0, 20.0))
            .map(|(c, _)| *c)
            .collect();
        assert!(hits.contains(&Coord::new(9, 9)));
        assert!(hits.contains(&Coord::new(10, 10)));
        assert!(!hits.contains(&Coord::new(30, 30)));
    }

    #[test]
    fn wire_effect_resolution_applies_on_construction() {
        let gold = Color::from_hex("#FFD700").unwrap();
        let p = Pixel::from_wire(gold, 0.0, "a".into(), None);
        assert_eq!(p.effect, Some(PixelEffect::Glow));
        let forced = Pixel::from_wire(gold, 0.0, "a".into(), Some(PixelEffect::Spark));
        assert_eq!(forced.effect, Some(PixelEffect::Spark));
    }
}
