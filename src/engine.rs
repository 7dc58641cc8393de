//! The engine context: one object owning every piece of mutable canvas state
//! (camera, store, streaming tracker, bulk session, budget mirror), driven by
//! explicit calls from one logical thread. Network I/O is modeled sans-IO —
//! the engine emits [`Command`]s and the embedder resumes it with completions,
//! so every suspension point in the protocol becomes an ordinary method call.

use std::collections::VecDeque;

use kurbo::Point;

use crate::{
    budget::PixelBag,
    bulk::{BulkSession, BulkStatus, CandidateOutcome},
    color::Color,
    config::CanvasConfig,
    error::PixelportResult,
    protocol::{ClientMessage, PixelUpdate, RegionPayload, ServerMessage, WireRegion},
    regions::RegionTracker,
    render::{FrameInput, Surface, render_frame},
    store::{Coord, Pixel, PixelStore, RegionKey},
    viewport::Viewport,
};

/// Seconds between latency probes.
pub const PING_INTERVAL: f64 = 10.0;

/// Work the engine wants the embedder to perform. Fetches carry no cancellation
/// handle: a late response for an off-screen region is still merged (wasted but
/// harmless work).
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `GET canvas/{x}/{y}`; resume with [`CanvasEngine::complete_region_fetch`].
    FetchRegion(RegionKey),
    /// Frame and send one message over the session channel.
    Send(ClientMessage),
    /// Refresh the budget mirror over REST; resume with
    /// [`CanvasEngine::apply_budget_sync`].
    SyncBudget,
}

/// Non-fatal, user-facing notices. Nothing in here ever halts rendering or
/// input handling.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    BulkOutcome(BulkStatus),
    BudgetBlocked { available: u32 },
    ServerError { message: String },
}

pub struct CanvasEngine {
    config: CanvasConfig,
    viewport: Viewport,
    store: PixelStore,
    tracker: RegionTracker,
    bulk: BulkSession,
    bag: PixelBag,
    commands: VecDeque<Command>,
    notices: Vec<Notice>,
    last_position_region: Option<RegionKey>,
    last_region_signature: Vec<RegionKey>,
    last_ping_at: Option<f64>,
    latency_ms: Option<f64>,
    presence: u32,
    needs_render: bool,
}

impl CanvasEngine {
    /// Requires a fetched-and-valid config; nothing downstream runs without it.
    pub fn new(config: CanvasConfig, screen_width: f64, screen_height: f64) -> PixelportResult<Self> {
        config.validate()?;
        Ok(Self {
            viewport: Viewport::new(config.canvas_size, screen_width, screen_height),
            store: PixelStore::new(),
            tracker: RegionTracker::new(),
            bulk: BulkSession::new(),
            bag: PixelBag::new(&config),
            config,
            commands: VecDeque::new(),
            notices: Vec::new(),
            last_position_region: None,
            last_region_signature: Vec::new(),
            last_ping_at: None,
            latency_ms: None,
            presence: 0,
            needs_render: true,
        })
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn store(&self) -> &PixelStore {
        &self.store
    }

    pub fn bulk(&self) -> &BulkSession {
        &self.bulk
    }

    pub fn bag(&self) -> &PixelBag {
        &self.bag
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn users_in_region(&self) -> u32 {
        self.presence
    }

    /// Drain queued embedder work.
    pub fn take_commands(&mut self) -> Vec<Command> {
        self.commands.drain(..).collect()
    }

    /// Drain pending user-facing notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Whether state changed since the last [`render`](Self::render).
    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    // ---- input ----------------------------------------------------------

    pub fn pan(&mut self, dx_screen: f64, dy_screen: f64, now: f64) {
        self.viewport.pan(dx_screen, dy_screen);
        self.needs_render = true;
        self.pump_streaming(now);
    }

    /// Drag ended: bypass the visibility throttle once.
    pub fn pan_ended(&mut self, now: f64) {
        self.tracker.request_immediate_pass();
        self.pump_streaming(now);
    }

    pub fn zoom_at(&mut self, sx: f64, sy: f64, factor: f64, now: f64) {
        self.viewport.zoom_at(sx, sy, factor);
        self.needs_render = true;
        self.pump_streaming(now);
    }

    /// Zoom settled (wheel momentum over, pinch released).
    pub fn zoom_settled(&mut self, now: f64) {
        self.tracker.request_immediate_pass();
        self.pump_streaming(now);
    }

    pub fn resize(&mut self, screen_width: f64, screen_height: f64, now: f64) {
        self.viewport.resize(screen_width, screen_height);
        self.needs_render = true;
        self.tracker.request_immediate_pass();
        self.pump_streaming(now);
    }

    /// A coordinate about to be interacted with must never miss its region, so
    /// hovering demands a load regardless of the padded rectangle.
    pub fn hover(&mut self, sx: f64, sy: f64) {
        if let Some(coord) = self.screen_to_coord(sx, sy) {
            self.demand_region(coord);
        }
    }

    /// Single placement: optimistic local fast-fail on the budget mirror, then
    /// hand the message to the channel. The painted result arrives back as an
    /// authoritative `pixel_update`.
    pub fn click_place(&mut self, sx: f64, sy: f64, color: Color, _now: f64) {
        let Some(coord) = self.screen_to_coord(sx, sy) else {
            return;
        };
        self.demand_region(coord);
        if !self.bag.try_spend(1) {
            self.notices.push(Notice::BudgetBlocked {
                available: self.bag.current(),
            });
            return;
        }
        self.commands.push_back(Command::Send(ClientMessage::PixelPlace {
            x: coord.x,
            y: coord.y,
            color,
        }));
    }

    // ---- bulk placement --------------------------------------------------

    pub fn bulk_begin(&mut self) {
        self.bulk.begin();
        self.needs_render = true;
    }

    pub fn bulk_extend(&mut self, sx: f64, sy: f64, color: Color, now: f64) -> CandidateOutcome {
        let Some(coord) = self.screen_to_coord(sx, sy) else {
            return CandidateOutcome::Inactive;
        };
        let outcome = self.bulk.add_candidate(coord, color, now);
        if outcome == CandidateOutcome::Accepted {
            self.demand_region(coord);
            self.needs_render = true;
        }
        outcome
    }

    /// End trigger: the whole preview goes out as one batch. With an empty
    /// budget the flush is blocked locally (the session stays active); the
    /// server would reject it anyway.
    pub fn bulk_flush(&mut self, _now: f64) {
        if self.bulk.is_active() && self.bulk.preview_len() > 0 && self.bag.current() == 0 {
            self.notices.push(Notice::BudgetBlocked { available: 0 });
            return;
        }
        if let Some(pixels) = self.bulk.flush() {
            self.commands
                .push_back(Command::Send(ClientMessage::BulkPixelPlace { pixels }));
        }
        self.needs_render = true;
    }

    pub fn bulk_cancel(&mut self) {
        self.bulk.cancel();
        self.needs_render = true;
    }

    // ---- network ---------------------------------------------------------

    /// Decode and dispatch one channel frame.
    pub fn handle_frame(&mut self, raw: &str, now: f64) -> PixelportResult<()> {
        let msg = crate::protocol::decode_server_message(raw)?;
        self.handle_message(msg, now);
        Ok(())
    }

    #[tracing::instrument(skip(self, msg))]
    pub fn handle_message(&mut self, msg: ServerMessage, now: f64) {
        match msg {
            ServerMessage::RegionData(payload) => self.ingest_region(payload),
            ServerMessage::PixelUpdate(update) => self.apply_update(update),
            ServerMessage::PixelBatchUpdate { updates } => {
                // Identical store-then-render path as single updates.
                for update in updates {
                    self.apply_update(update);
                }
            }
            ServerMessage::BulkComplete(report) => {
                let status = self.bulk.complete(report.placed, report.requested, now);
                tracing::debug!(placed = report.placed, requested = report.requested, "bulk complete");
                self.notices.push(Notice::BulkOutcome(status));
                if let Some(remaining) = report.remaining {
                    self.bag.apply_sync(remaining, self.bag.max());
                }
                self.needs_render = true;
            }
            ServerMessage::Pong { timestamp } => {
                self.latency_ms = Some(((now - timestamp) * 1000.0).max(0.0));
            }
            ServerMessage::Error { message } => {
                self.notices.push(Notice::ServerError { message });
            }
            ServerMessage::UserJoin { users_in_region, .. }
            | ServerMessage::UserLeave { users_in_region, .. } => {
                self.presence = users_in_region;
            }
            ServerMessage::Unknown => {
                tracing::debug!("ignoring unhandled message type");
            }
        }
    }

    /// Resume a region fetch. Failures leave the region unmarked so the next
    /// visibility or reconciliation pass retries it; no user-visible error.
    pub fn complete_region_fetch(
        &mut self,
        key: RegionKey,
        result: PixelportResult<RegionPayload>,
    ) {
        match result {
            Ok(payload) => {
                if payload.key() != key {
                    tracing::warn!(?key, got = ?payload.key(), "region fetch answered with mismatched key");
                }
                self.ingest_region(payload);
            }
            Err(err) => {
                tracing::warn!(?key, %err, "region fetch failed; will retry on a later pass");
            }
        }
    }

    /// Server-authoritative budget snapshot (REST resync or server push).
    pub fn apply_budget_sync(&mut self, current: u32, max: u32) {
        self.bag.apply_sync(current, max);
    }

    // ---- time ------------------------------------------------------------

    /// Periodic housekeeping: throttled visibility pass, reconciliation,
    /// budget countdown, deferred preview clear, latency probe.
    pub fn tick(&mut self, now: f64) {
        self.pump_streaming(now);
        let missing = self.tracker.reconcile(&self.viewport, &self.config, now);
        self.request_fetches(missing);

        if self.bag.tick(now) {
            self.commands.push_back(Command::SyncBudget);
        }
        if self.bulk.tick(now) {
            self.needs_render = true;
        }

        let ping_due = match self.last_ping_at {
            Some(t) => now - t >= PING_INTERVAL,
            None => true,
        };
        if ping_due {
            self.last_ping_at = Some(now);
            self.commands
                .push_back(Command::Send(ClientMessage::Ping { timestamp: now }));
        }
    }

    /// Draw the current state. Reads only; the one flag it touches is the
    /// dirty marker cleared by producing this frame.
    pub fn render(&mut self, surface: &mut dyn Surface, now: f64) {
        let input = FrameInput {
            viewport: &self.viewport,
            store: &self.store,
            bulk: &self.bulk,
            now,
        };
        render_frame(&input, surface);
        self.needs_render = false;
    }

    // ---- internals -------------------------------------------------------

    fn ingest_region(&mut self, payload: RegionPayload) {
        let key = payload.key();
        let grid = self.config.regions_per_side();
        if key.x >= grid || key.y >= grid {
            tracing::warn!(?key, "dropping region outside the grid");
            return;
        }
        match payload.local_pixels(self.config.region_size) {
            Ok(locals) => {
                self.store.merge_region(key, self.config.region_size, locals);
                self.tracker.mark_loaded(key);
                self.needs_render = true;
            }
            Err(err) => {
                // Leave the region unmarked; a later pass refetches it.
                tracing::warn!(?key, %err, "malformed region payload");
            }
        }
    }

    fn apply_update(&mut self, update: PixelUpdate) {
        if !self
            .config
            .in_bounds(i64::from(update.x), i64::from(update.y))
        {
            tracing::warn!(x = update.x, y = update.y, "dropping out-of-bounds update");
            return;
        }
        let coord = Coord::new(update.x, update.y);
        self.store.set(
            coord,
            Pixel::from_wire(update.color, update.timestamp, update.user_id, update.effect),
        );
        self.needs_render = true;
    }

    /// One throttled visibility pass plus the outbound position/viewport
    /// signaling tied to it. Every camera mutation funnels through here.
    fn pump_streaming(&mut self, now: f64) {
        let missing = self.tracker.ensure_visible(&self.viewport, &self.config, now);
        self.request_fetches(missing);
        self.sync_outbound_viewport();
    }

    fn request_fetches(&mut self, keys: Vec<RegionKey>) {
        for key in keys {
            self.commands.push_back(Command::FetchRegion(key));
        }
    }

    fn demand_region(&mut self, coord: Coord) {
        if let Some(key) = self.tracker.ensure_coord(coord, &self.config) {
            self.commands.push_back(Command::FetchRegion(key));
        }
    }

    fn sync_outbound_viewport(&mut self) {
        let center = self.viewport.center();
        let camera_region = self.region_of_point(center);
        if Some(camera_region) != self.last_position_region {
            self.last_position_region = Some(camera_region);
            self.commands
                .push_back(Command::Send(ClientMessage::UserPosition {
                    region_x: camera_region.x,
                    region_y: camera_region.y,
                }));
        }

        let rect = crate::regions::visible_regions(&self.viewport, &self.config);
        let mut signature: Vec<RegionKey> = rect.keys().collect();
        signature.sort();
        if signature != self.last_region_signature {
            self.last_region_signature = signature.clone();
            self.commands
                .push_back(Command::Send(ClientMessage::ViewportRegions {
                    regions: signature.into_iter().map(WireRegion::from).collect(),
                }));
        }
    }

    fn region_of_point(&self, p: Point) -> RegionKey {
        let last = self.config.regions_per_side() - 1;
        let clamp = |v: f64| -> u32 {
            (v.max(0.0) as u32 / self.config.region_size).min(last)
        };
        RegionKey::new(clamp(p.x), clamp(p.y))
    }

    fn screen_to_coord(&self, sx: f64, sy: f64) -> Option<Coord> {
        let world = self.viewport.screen_to_world(sx, sy);
        let (x, y) = (world.x.floor() as i64, world.y.floor() as i64);
        self.config
            .in_bounds(x, y)
            .then(|| Coord::new(x as u32, y as u32))
    }
}
