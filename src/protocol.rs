//! JSON wire types for the canvas server: the framed bidirectional channel
//! plus the two REST payloads (`GET config`, `GET canvas/{rx}/{ry}`).
//!
//! Region pixel maps are keyed by region-local `"x,y"` strings; conversion to
//! global coordinates happens at the store boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    color::{Color, PixelEffect},
    error::{PixelportError, PixelportResult},
    store::{Coord, Pixel, RegionKey},
};

/// One `{x, y}` region index on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRegion {
    pub x: u32,
    pub y: u32,
}

impl From<RegionKey> for WireRegion {
    fn from(key: RegionKey) -> Self {
        Self { x: key.x, y: key.y }
    }
}

/// One candidate placement inside a bulk batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePlacement {
    pub x: u32,
    pub y: u32,
    pub color: Color,
}

/// Messages the client sends over the session channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sent only when the camera's current region changes.
    UserPosition { region_x: u32, region_y: u32 },
    /// Sent only when the sorted visible-region signature changes.
    ViewportRegions { regions: Vec<WireRegion> },
    PixelPlace { x: u32, y: u32, color: Color },
    BulkPixelPlace { pixels: Vec<WirePlacement> },
    Ping { timestamp: f64 },
}

/// A single authoritative pixel change. Also the element type of
/// `pixel_batch_update`, which funnels into the identical store path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelUpdate {
    pub x: u32,
    pub y: u32,
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<PixelEffect>,
    pub user_id: String,
    #[serde(default)]
    pub timestamp: f64,
}

/// Authoritative completion report for one bulk batch. The server may have
/// capped placement against the remaining budget, so `placed <= requested`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkComplete {
    pub placed: u32,
    pub requested: u32,
    pub available_at_start: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

/// Messages the server pushes over the session channel. Message types this
/// client has no behavior for (chat broadcasts and the like) decode to
/// [`ServerMessage::Unknown`] instead of failing the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RegionData(RegionPayload),
    PixelUpdate(PixelUpdate),
    PixelBatchUpdate { updates: Vec<PixelUpdate> },
    BulkComplete(BulkComplete),
    Pong { timestamp: f64 },
    Error { message: String },
    UserJoin {
        user_id: String,
        #[serde(default)]
        users_in_region: u32,
    },
    UserLeave {
        user_id: String,
        #[serde(default)]
        users_in_region: u32,
    },
    #[serde(other)]
    Unknown,
}

/// Full region snapshot: both the channel's `region_data` push and the REST
/// `GET canvas/{rx}/{ry}` response carry this shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionPayload {
    pub region_x: u32,
    pub region_y: u32,
    /// Region-local `"x,y"` keys. BTreeMap keeps serialization order stable.
    #[serde(default)]
    pub pixels: BTreeMap<String, WirePixel>,
    #[serde(default)]
    pub users_in_region: Vec<String>,
    /// Chat rides along in the snapshot; the engine parses but ignores it.
    #[serde(default)]
    pub chat_history: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WirePixel {
    pub color: Color,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<PixelEffect>,
}

impl RegionPayload {
    pub fn key(&self) -> RegionKey {
        RegionKey::new(self.region_x, self.region_y)
    }

    /// Decode the sparse pixel map into region-local records. Malformed keys
    /// or out-of-range locals are protocol errors.
    pub fn local_pixels(&self, region_size: u32) -> PixelportResult<Vec<(Coord, Pixel)>> {
        let mut out = Vec::with_capacity(self.pixels.len());
        for (key, wire) in &self.pixels {
            let local = parse_local_key(key)?;
            if local.x >= region_size || local.y >= region_size {
                return Err(PixelportError::protocol(format!(
                    "local coordinate {key} outside region of size {region_size}"
                )));
            }
            out.push((
                local,
                Pixel::from_wire(wire.color, wire.timestamp, wire.user_id.clone(), wire.effect),
            ));
        }
        Ok(out)
    }
}

fn parse_local_key(key: &str) -> PixelportResult<Coord> {
    let (x, y) = key
        .split_once(',')
        .ok_or_else(|| PixelportError::protocol(format!("malformed pixel key '{key}'")))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|_| PixelportError::protocol(format!("malformed pixel key '{key}'")))
    };
    Ok(Coord::new(parse(x)?, parse(y)?))
}

/// Frame one outbound message as a JSON string.
pub fn encode_client_message(msg: &ClientMessage) -> PixelportResult<String> {
    serde_json::to_string(msg).map_err(|e| PixelportError::protocol(e.to_string()))
}

/// Decode one inbound frame.
pub fn decode_server_message(raw: &str) -> PixelportResult<ServerMessage> {
    serde_json::from_str(raw).map_err(|e| PixelportError::protocol(e.to_string()))
}
