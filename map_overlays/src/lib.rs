#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod canvas;
mod circle;
mod gps;
mod item;
mod list;
mod marker;
pub mod mercator;
mod overlay;
mod position;
mod primitives;
mod projector;
mod viewport;
mod way;
mod zoom;

pub use canvas::{Canvas, Style, StyleKind};
pub use circle::{CircleOverlay, Circles, OverlayCircle};
pub use gps::{Gps, GpsOverlay};
pub use item::{ItemizedOverlay, Items, OverlayItem};
pub use list::OverlayList;
pub use marker::{Anchor, Dot, Icon, Marker, MarkerError};
pub use overlay::{
    AnyOverlay, EventType, HitHandler, Layer, Overlay, OverlayError, OverlayOptions, OverlayStats,
    Pass,
};
pub use position::{Pixels, PixelsExt, Position, lat_lon, lon_lat};
pub use primitives::{HasPrimitives, PrimitiveRef, Primitives};
pub use projector::{Projection, Projector};
pub use viewport::{MapPosition, MapView, Viewport};
pub use way::{OverlayWay, WayOverlay, Ways};
pub use zoom::{InvalidZoom, MAX_ZOOM, Zoom};
