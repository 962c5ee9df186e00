use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use egui::{Context, Vec2};

use crate::{
    InvalidZoom, Position,
    mercator::{project, unproject},
    projector::Projector,
    zoom::Zoom,
};

/// Center and zoom level of the map, read together so that they are consistent with each other.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct MapPosition {
    pub center: Position,
    pub zoom: u8,
}

/// The map, as seen by overlays. Overlay threads hold onto it while attached, therefore it needs
/// to be shareable between threads.
pub trait Viewport: Send + Sync {
    /// Current center and zoom level.
    fn map_position(&self) -> MapPosition;

    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Projection matching the current state of the viewport.
    fn projection(&self) -> Projector;

    /// Ask for the viewport to be painted again, on its own thread.
    fn request_repaint(&self);

    /// Whether an animated zoom is in progress.
    fn is_zoom_animating(&self) -> bool;
}

#[derive(Debug, Clone)]
struct MapState {
    center: Position,
    zoom: Zoom,
    width: u32,
    height: u32,
    zoom_animating: bool,
}

/// Thread-safe state of a map view. Can be shared with overlays through an `Arc` and mutated
/// from the UI thread.
///
/// Repaint requests are forwarded to the egui [`Context`], if one was given, and counted.
pub struct MapView {
    state: Mutex<MapState>,
    egui_ctx: Option<Context>,
    repaints: AtomicUsize,
}

impl MapView {
    /// Create a view of `width` x `height` pixels, centered at `center`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidZoom`] if `zoom` is above the maximum level.
    pub fn new(center: Position, zoom: u8, width: u32, height: u32) -> Result<Self, InvalidZoom> {
        Ok(Self {
            state: Mutex::new(MapState {
                center,
                zoom: Zoom::try_from(zoom)?,
                width,
                height,
                zoom_animating: false,
            }),
            egui_ctx: None,
            repaints: AtomicUsize::new(0),
        })
    }

    /// Forward repaint requests to egui.
    pub fn with_egui_context(mut self, egui_ctx: Context) -> Self {
        self.egui_ctx = Some(egui_ctx);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Center exactly at the given position.
    pub fn center_at(&self, position: Position) {
        self.state().center = position;
    }

    /// Pan the map by the given number of screen pixels. Positive `offset` moves the center
    /// towards east and south.
    pub fn move_by(&self, offset: Vec2) {
        let mut state = self.state();
        let zoom = state.zoom.level();
        if let Some(center) = project(state.center, zoom) {
            let shifted = center + crate::Pixels::new(offset.x as f64, offset.y as f64);
            state.center = unproject(shifted, zoom);
        } else {
            log::warn!("Cannot pan, center {:?} is not projectable.", state.center);
        }
    }

    /// Try to zoom in, returning `Err(InvalidZoom)` if already at maximum.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidZoom`] when already at the maximum zoom level.
    pub fn zoom_in(&self) -> Result<(), InvalidZoom> {
        self.state().zoom.zoom_in()
    }

    /// Try to zoom out, returning `Err(InvalidZoom)` if already at minimum.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidZoom`] when already at zoom level 0.
    pub fn zoom_out(&self) -> Result<(), InvalidZoom> {
        self.state().zoom.zoom_out()
    }

    /// Set exact zoom level.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidZoom`] if `zoom` is above the maximum level.
    pub fn set_zoom(&self, zoom: u8) -> Result<(), InvalidZoom> {
        self.state().zoom = Zoom::try_from(zoom)?;
        Ok(())
    }

    /// Change the dimensions. Overlays need to be told about it separately, see
    /// [`crate::OverlayList::on_size_changed`].
    pub fn set_size(&self, width: u32, height: u32) {
        let mut state = self.state();
        state.width = width;
        state.height = height;
    }

    pub fn set_zoom_animating(&self, animating: bool) {
        self.state().zoom_animating = animating;
    }

    /// Number of repaints requested so far.
    pub fn repaints(&self) -> usize {
        self.repaints.load(Ordering::SeqCst)
    }
}

impl Viewport for MapView {
    fn map_position(&self) -> MapPosition {
        let state = self.state();
        MapPosition {
            center: state.center,
            zoom: state.zoom.level(),
        }
    }

    fn size(&self) -> (u32, u32) {
        let state = self.state();
        (state.width, state.height)
    }

    fn projection(&self) -> Projector {
        let state = self.state();
        Projector::new(state.width, state.height, state.center, state.zoom.level())
    }

    fn request_repaint(&self) {
        self.repaints.fetch_add(1, Ordering::SeqCst);
        if let Some(egui_ctx) = &self.egui_ctx {
            log::trace!("Requesting repaint of the map.");
            egui_ctx.request_repaint();
        }
    }

    fn is_zoom_animating(&self) -> bool {
        self.state().zoom_animating
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lat_lon, projector::Projection as _};
    use egui::{pos2, vec2};

    fn map_view() -> MapView {
        MapView::new(lat_lon(51.1, 17.0), 16, 200, 100).unwrap()
    }

    #[test]
    fn creating_view_with_invalid_zoom_fails() {
        assert!(MapView::new(lat_lon(51.1, 17.0), 20, 200, 100).is_err());
    }

    #[test]
    fn zooming() {
        let view = map_view();
        assert!(view.zoom_in().is_ok());
        assert_eq!(view.map_position().zoom, 17);
        assert!(view.zoom_out().is_ok());
        assert!(view.zoom_out().is_ok());
        assert_eq!(view.map_position().zoom, 15);

        assert!(view.set_zoom(19).is_ok());
        assert_eq!(Err(InvalidZoom), view.zoom_in());
        assert_eq!(view.map_position().zoom, 19);
    }

    #[test]
    fn moving_the_view_shifts_the_center_by_the_given_pixels() {
        let view = map_view();
        let before = view.projection();
        let center = view.map_position().center;

        view.move_by(vec2(10., -20.));

        // Old center is now 10 pixels to the left and 20 pixels below the middle.
        let moved = view.projection().to_pixels(center).unwrap();
        approx::assert_relative_eq!(moved.x, 90., epsilon = 0.01);
        approx::assert_relative_eq!(moved.y, 70., epsilon = 0.01);
        assert_eq!(before.to_pixels(center), Some(pos2(100., 50.)));
    }

    #[test]
    fn resizing_changes_the_projection() {
        let view = map_view();
        view.set_size(300, 300);
        assert_eq!(view.size(), (300, 300));
        let center = view.map_position().center;
        assert_eq!(view.projection().to_pixels(center), Some(pos2(150., 150.)));
    }

    #[test]
    fn repaint_requests_are_counted() {
        let view = map_view().with_egui_context(Context::default());
        assert_eq!(view.repaints(), 0);
        view.request_repaint();
        view.request_repaint();
        assert_eq!(view.repaints(), 2);
    }

    #[test]
    fn zoom_animation_flag() {
        let view = map_view();
        assert!(!view.is_zoom_animating());
        view.set_zoom_animating(true);
        assert!(view.is_zoom_animating());
    }
}
