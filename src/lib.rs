#![forbid(unsafe_code)]

//! Client-side engine for a shared, collaboratively edited pixel canvas:
//! viewport math, region streaming, a sparse pixel store, the layered raster
//! pipeline, bulk placement, and the advisory placement budget. All I/O is
//! modeled sans-IO through [`engine::Command`]s.

pub mod budget;
pub mod bulk;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod regions;
pub mod render;
pub mod store;
pub mod viewport;

pub use budget::PixelBag;
pub use bulk::{BulkPhase, BulkSession, BulkStatus, CandidateOutcome};
pub use color::{Color, PixelEffect};
pub use config::CanvasConfig;
pub use engine::{CanvasEngine, Command, Notice};
pub use error::{PixelportError, PixelportResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use regions::{RegionRect, RegionTracker};
pub use render::{RasterSurface, Surface, render_frame};
pub use store::{Coord, Pixel, PixelStore, RegionKey};
pub use viewport::Viewport;
