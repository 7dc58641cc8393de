use crate::config::CanvasConfig;

/// Advisory mirror of the server-authoritative placement budget (the "pixel
/// bag"). Everything here is UI feedback: the countdown is an estimate, the
/// fast-fail is optimistic, and any server-pushed value overwrites the mirror
/// unconditionally.
#[derive(Clone, Copy, Debug)]
pub struct PixelBag {
    current: u32,
    max: u32,
    refill_rate: f64,
    next_refill_in: f64,
    last_tick_at: Option<f64>,
}

impl PixelBag {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            current: config.initial_pixel_bag,
            max: config.max_pixel_bag,
            refill_rate: config.pixel_refill_rate,
            next_refill_in: config.pixel_refill_rate,
            last_tick_at: None,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Seconds until the next estimated refill; drives a progress display.
    pub fn next_refill_in(&self) -> f64 {
        self.next_refill_in.max(0.0)
    }

    /// Advance the countdown. When the estimate expires and the bag is not
    /// known to be full, the mirror wants a server resync instead of crediting
    /// itself; the countdown restarts so the request repeats at most once per
    /// refill interval.
    pub fn tick(&mut self, now: f64) -> bool {
        let dt = match self.last_tick_at {
            Some(t) => (now - t).max(0.0),
            None => 0.0,
        };
        self.last_tick_at = Some(now);

        if self.current >= self.max {
            self.next_refill_in = self.refill_rate;
            return false;
        }

        self.next_refill_in -= dt;
        if self.next_refill_in <= 0.0 {
            self.next_refill_in = self.refill_rate;
            return true;
        }
        false
    }

    /// Server state always wins; the local estimate restarts from scratch.
    pub fn apply_sync(&mut self, current: u32, max: u32) {
        self.current = current.min(max);
        self.max = max;
        self.next_refill_in = self.refill_rate;
    }

    /// Optimistic fast-fail for a placement of `cost` pixels. A `false` here
    /// is transient UI feedback only — the server independently rejects
    /// over-budget placement even if a stale mirror said yes.
    pub fn try_spend(&mut self, cost: u32) -> bool {
        if self.current < cost {
            return false;
        }
        self.current -= cost;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag() -> PixelBag {
        PixelBag::new(&CanvasConfig::default())
    }

    #[test]
    fn starts_from_config() {
        let b = bag();
        assert_eq!(b.current(), 3);
        assert_eq!(b.max(), 10);
        assert_eq!(b.next_refill_in(), 3.0);
    }

    #[test]
    fn countdown_expiry_requests_resync_once_per_interval() {
        let mut b = bag();
        assert!(!b.tick(0.0));
        assert!(!b.tick(1.0));
        assert!(b.tick(3.5));
        // Countdown restarted; no immediate re-request.
        assert!(!b.tick(4.0));
        assert!(b.tick(7.0));
    }

    #[test]
    fn full_bag_never_asks_for_resync() {
        let mut b = bag();
        b.apply_sync(10, 10);
        assert!(!b.tick(0.0));
        assert!(!b.tick(100.0));
    }

    #[test]
    fn server_sync_overwrites_unconditionally() {
        let mut b = bag();
        b.try_spend(3);
        b.apply_sync(9, 12);
        assert_eq!(b.current(), 9);
        assert_eq!(b.max(), 12);
        // A sync above the pushed max clamps rather than overflowing the UI.
        b.apply_sync(99, 10);
        assert_eq!(b.current(), 10);
    }

    #[test]
    fn spend_fast_fails_without_going_negative() {
        let mut b = bag();
        assert!(b.try_spend(2));
        assert!(b.try_spend(1));
        assert!(!b.try_spend(1));
        assert_eq!(b.current(), 0);
    }
}
