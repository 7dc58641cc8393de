use crate::error::{PixelportError, PixelportResult};

/// Canvas configuration served by `GET config`. Nothing in the engine runs
/// before one of these has been fetched and validated.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct CanvasConfig {
    /// Side length of the square canvas in world units (pixels).
    pub canvas_size: u32,
    /// Side length of one streaming region. Must divide `canvas_size`.
    pub region_size: u32,
    /// Seconds for the server to refill one placement credit.
    pub pixel_refill_rate: f64,
    /// Placement-budget ceiling.
    pub max_pixel_bag: u32,
    /// Budget granted to a fresh session.
    pub initial_pixel_bag: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            canvas_size: 8192,
            region_size: 512,
            pixel_refill_rate: 3.0,
            max_pixel_bag: 10,
            initial_pixel_bag: 3,
        }
    }
}

impl CanvasConfig {
    pub fn validate(&self) -> PixelportResult<()> {
        if self.canvas_size == 0 || self.region_size == 0 {
            return Err(PixelportError::config(
                "canvas_size and region_size must be > 0",
            ));
        }
        if self.region_size > self.canvas_size {
            return Err(PixelportError::config(
                "region_size must not exceed canvas_size",
            ));
        }
        if !self.canvas_size.is_multiple_of(self.region_size) {
            return Err(PixelportError::config(
                "region_size must evenly divide canvas_size",
            ));
        }
        if !self.pixel_refill_rate.is_finite() || self.pixel_refill_rate <= 0.0 {
            return Err(PixelportError::config(
                "pixel_refill_rate must be finite and > 0",
            ));
        }
        if self.max_pixel_bag == 0 || self.initial_pixel_bag > self.max_pixel_bag {
            return Err(PixelportError::config(
                "pixel bag bounds must satisfy 0 < initial <= max",
            ));
        }
        Ok(())
    }

    pub fn regions_per_side(&self) -> u32 {
        self.canvas_size / self.region_size
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.canvas_size) && y < i64::from(self.canvas_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_server_constants() {
        let cfg = CanvasConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.regions_per_side(), 16);
    }

    #[test]
    fn rejects_non_dividing_region_size() {
        let cfg = CanvasConfig {
            region_size: 500,
            ..CanvasConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_bag_bounds() {
        let cfg = CanvasConfig {
            initial_pixel_bag: 11,
            ..CanvasConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_roundtrip() {
        let cfg = CanvasConfig::default();
        let s = serde_json::to_string(&cfg).unwrap();
        let de: CanvasConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(de.canvas_size, 8192);
        assert_eq!(de.region_size, 512);
    }
}
