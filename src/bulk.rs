use std::collections::{BTreeMap, HashSet};

use crate::{color::Color, protocol::WirePlacement, store::Coord};

/// Minimum interval between accepted drag candidates, in seconds. Paces
/// continuous pointer input.
pub const INPUT_THROTTLE: f64 = 0.02;

/// How long the preview stays rendered after the authoritative completion
/// report, so partial-success messaging remains legible.
pub const CLEAR_DELAY: f64 = 1.5;

/// Above this many buffered candidates the renderer switches to the cheap flat
/// preview instead of the animated treatment.
pub const FLAT_PREVIEW_THRESHOLD: usize = 250;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkPhase {
    Idle,
    Active,
    Flushing,
}

/// Why a candidate was or was not buffered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateOutcome {
    Accepted,
    Throttled,
    Duplicate,
    Inactive,
}

/// Informational status derived from a completion report. Partial placement is
/// surfaced as a notice, never an error.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkStatus {
    pub placed: u32,
    pub requested: u32,
    pub partial: bool,
}

impl BulkStatus {
    pub fn message(&self) -> String {
        if self.partial {
            format!(
                "placed {} of {} pixels (budget capped the rest)",
                self.placed, self.requested
            )
        } else {
            format!("placed {} pixels", self.placed)
        }
    }
}

/// Optimistic local buffer for one bulk-placement session.
///
/// State machine: `Idle -> Active` on the start trigger, `Active -> Flushing`
/// when the accumulated preview is handed off as one batch, `Flushing -> Idle`
/// a fixed delay after the authoritative completion report. The preview map
/// and the de-dup set live exactly as long as the session.
#[derive(Debug)]
pub struct BulkSession {
    phase: BulkPhase,
    preview: BTreeMap<Coord, Color>,
    seen: HashSet<Coord>,
    last_accepted_at: Option<f64>,
    clear_at: Option<f64>,
}

impl Default for BulkSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkSession {
    pub fn new() -> Self {
        Self {
            phase: BulkPhase::Idle,
            preview: BTreeMap::new(),
            seen: HashSet::new(),
            last_accepted_at: None,
            clear_at: None,
        }
    }

    pub fn phase(&self) -> BulkPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == BulkPhase::Active
    }

    /// Candidates currently buffered (also the renderer's preview source).
    pub fn preview(&self) -> impl Iterator<Item = (&Coord, &Color)> {
        self.preview.iter()
    }

    pub fn preview_len(&self) -> usize {
        self.preview.len()
    }

    /// Frame-budget guard: large selections render as flat fills.
    pub fn use_flat_preview(&self) -> bool {
        self.preview.len() > FLAT_PREVIEW_THRESHOLD
    }

    /// Start trigger. Both session buffers start empty.
    pub fn begin(&mut self) {
        self.phase = BulkPhase::Active;
        self.preview.clear();
        self.seen.clear();
        self.last_accepted_at = None;
        self.clear_at = None;
    }

    /// Buffer one drag candidate. Rejected while throttled (minimum spacing
    /// since the last accepted candidate) or when the coordinate was already
    /// added this session; a back-and-forth drag therefore stabilizes instead
    /// of churning the buffer.
    pub fn add_candidate(&mut self, coord: Coord, color: Color, now: f64) -> CandidateOutcome {
        if self.phase != BulkPhase::Active {
            return CandidateOutcome::Inactive;
        }
        if let Some(t) = self.last_accepted_at
            && now - t < INPUT_THROTTLE
        {
            return CandidateOutcome::Throttled;
        }
        if self.seen.contains(&coord) {
            return CandidateOutcome::Duplicate;
        }
        self.last_accepted_at = Some(now);
        self.seen.insert(coord);
        self.preview.insert(coord, color);
        CandidateOutcome::Accepted
    }

    /// End trigger: serialize the whole preview as one ordered batch. The
    /// preview keeps rendering until the completion report (plus the clear
    /// delay). An empty session just returns to idle.
    pub fn flush(&mut self) -> Option<Vec<WirePlacement>> {
        if self.phase != BulkPhase::Active {
            return None;
        }
        if self.preview.is_empty() {
            self.phase = BulkPhase::Idle;
            return None;
        }
        self.phase = BulkPhase::Flushing;
        let batch = self
            .preview
            .iter()
            .map(|(c, color)| WirePlacement {
                x: c.x,
                y: c.y,
                color: *color,
            })
            .collect();
        tracing::debug!(pixels = self.preview.len(), "bulk batch flushed");
        Some(batch)
    }

    /// Authoritative completion. The report carries aggregate counts only; no
    /// per-coordinate diffing happens here — later pixel updates correct any
    /// individually rejected pixel. The preview clear is deferred.
    pub fn complete(&mut self, placed: u32, requested: u32, now: f64) -> BulkStatus {
        if self.phase == BulkPhase::Flushing {
            self.clear_at = Some(now + CLEAR_DELAY);
        }
        BulkStatus {
            placed,
            requested,
            partial: placed < requested,
        }
    }

    /// Abandon the session immediately; both buffers empty.
    pub fn cancel(&mut self) {
        self.phase = BulkPhase::Idle;
        self.preview.clear();
        self.seen.clear();
        self.last_accepted_at = None;
        self.clear_at = None;
    }

    /// Perform the deferred clear once its deadline passes. Returns true when
    /// the session ended on this tick.
    pub fn tick(&mut self, now: f64) -> bool {
        if let Some(t) = self.clear_at
            && now >= t
        {
            self.cancel();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> Color {
        Color::new(0x12, 0x34, 0x56)
    }

    #[test]
    fn candidates_require_an_active_session() {
        let mut s = BulkSession::new();
        assert_eq!(
            s.add_candidate(Coord::new(1, 1), color(), 0.0),
            CandidateOutcome::Inactive
        );
    }

    #[test]
    fn throttle_paces_drag_input() {
        let mut s = BulkSession::new();
        s.begin();
        assert_eq!(
            s.add_candidate(Coord::new(1, 1), color(), 0.0),
            CandidateOutcome::Accepted
        );
        assert_eq!(
            s.add_candidate(Coord::new(2, 1), color(), 0.005),
            CandidateOutcome::Throttled
        );
        assert_eq!(
            s.add_candidate(Coord::new(2, 1), color(), 0.05),
            CandidateOutcome::Accepted
        );
    }

    #[test]
    fn duplicates_never_grow_the_buffers() {
        let mut s = BulkSession::new();
        s.begin();
        s.add_candidate(Coord::new(5, 5), color(), 0.0);
        assert_eq!(
            s.add_candidate(Coord::new(5, 5), Color::new(9, 9, 9), 1.0),
            CandidateOutcome::Duplicate
        );
        assert_eq!(s.preview_len(), 1);
        assert_eq!(s.preview().next().unwrap().1, &color());
    }

    #[test]
    fn flush_serializes_one_ordered_batch() {
        let mut s = BulkSession::new();
        s.begin();
        s.add_candidate(Coord::new(7, 3), color(), 0.0);
        s.add_candidate(Coord::new(2, 1), color(), 1.0);
        s.add_candidate(Coord::new(2, 9), color(), 2.0);
        let batch = s.flush().unwrap();
        let coords: Vec<_> = batch.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(coords, vec![(2, 1), (2, 9), (7, 3)]);
        assert_eq!(s.phase(), BulkPhase::Flushing);
        // Preview survives the flush for rendering.
        assert_eq!(s.preview_len(), 3);
    }

    #[test]
    fn empty_flush_returns_to_idle() {
        let mut s = BulkSession::new();
        s.begin();
        assert!(s.flush().is_none());
        assert_eq!(s.phase(), BulkPhase::Idle);
    }

    #[test]
    fn completion_defers_the_clear() {
        let mut s = BulkSession::new();
        s.begin();
        s.add_candidate(Coord::new(1, 1), color(), 0.0);
        s.flush().unwrap();
        let status = s.complete(7, 10, 100.0);
        assert!(status.partial);
        assert!(status.message().contains("7 of 10"));
        assert!(!s.tick(100.0 + CLEAR_DELAY / 2.0));
        assert_eq!(s.preview_len(), 1);
        assert!(s.tick(100.0 + CLEAR_DELAY));
        assert_eq!(s.preview_len(), 0);
        assert_eq!(s.phase(), BulkPhase::Idle);
    }

    #[test]
    fn session_end_empties_both_buffers() {
        let mut s = BulkSession::new();
        s.begin();
        s.add_candidate(Coord::new(1, 1), color(), 0.0);
        s.cancel();
        assert_eq!(s.preview_len(), 0);
        s.begin();
        // The de-dup set was cleared too: the same coord is accepted again.
        assert_eq!(
            s.add_candidate(Coord::new(1, 1), color(), 10.0),
            CandidateOutcome::Accepted
        );
    }

    #[test]
    fn fidelity_switch_uses_the_250_threshold() {
        let mut s = BulkSession::new();
        s.begin();
        let mut t = 0.0;
        for i in 0..300u32 {
            t += INPUT_THROTTLE;
            assert_eq!(
                s.add_candidate(Coord::new(i % 512, i / 512), color(), t),
                CandidateOutcome::Accepted
            );
        }
        assert!(s.use_flat_preview());
    }
}
