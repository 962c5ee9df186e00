use std::sync::Arc;

use crate::{
    Position,
    canvas::Canvas,
    overlay::{AnyOverlay, OverlayError},
    viewport::Viewport,
};

/// Overlays of a single viewport, in painting order. Every overlay in the list has its thread
/// running, bound to the viewport.
///
/// Overlays are started when added, unless already running, and interrupted when removed.
/// Interrupted overlay cannot be started again, so adding one which was removed is a programming
/// error and panics.
pub struct OverlayList {
    viewport: Arc<dyn Viewport>,
    overlays: Vec<Box<dyn AnyOverlay>>,
}

impl OverlayList {
    pub fn new(viewport: Arc<dyn Viewport>) -> Self {
        Self {
            viewport,
            overlays: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&dyn AnyOverlay> {
        self.overlays.get(index).map(|overlay| overlay.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn AnyOverlay> {
        self.overlays.iter().map(|overlay| overlay.as_ref())
    }

    /// Add an overlay on top of the others.
    pub fn push(&mut self, overlay: impl AnyOverlay + 'static) {
        self.start(&overlay);
        self.overlays.push(Box::new(overlay));
        self.viewport.request_repaint();
    }

    /// Add an overlay at `index`, below the ones which follow it.
    ///
    /// # Panics
    ///
    /// If `index > len`, or the overlay cannot be started.
    pub fn insert(&mut self, index: usize, overlay: impl AnyOverlay + 'static) {
        assert!(index <= self.overlays.len(), "index {index} is out of bounds");
        self.start(&overlay);
        self.overlays.insert(index, Box::new(overlay));
        self.viewport.request_repaint();
    }

    /// Replace the overlay at `index`, interrupting the old one.
    ///
    /// # Panics
    ///
    /// If `index` is out of bounds, or the overlay cannot be started.
    pub fn set(&mut self, index: usize, overlay: impl AnyOverlay + 'static) -> Box<dyn AnyOverlay> {
        assert!(index < self.overlays.len(), "index {index} is out of bounds");
        self.start(&overlay);
        let old = std::mem::replace(&mut self.overlays[index], Box::new(overlay));
        old.interrupt();
        self.viewport.request_repaint();
        old
    }

    /// Remove and interrupt the overlay at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn AnyOverlay>> {
        if index >= self.overlays.len() {
            return None;
        }

        let overlay = self.overlays.remove(index);
        overlay.interrupt();
        self.viewport.request_repaint();
        Some(overlay)
    }

    /// Remove and interrupt all overlays.
    pub fn clear(&mut self) {
        for overlay in &self.overlays {
            overlay.interrupt();
        }
        self.overlays.clear();
        self.viewport.request_repaint();
    }

    fn start(&self, overlay: &dyn AnyOverlay) {
        if let Err(err) = overlay.attach(Arc::clone(&self.viewport)) {
            fail(&overlay.name(), &err);
        }
    }

    /// Paint the front buffers of all overlays, bottom to top.
    pub fn draw(&self, canvas: &mut dyn Canvas) {
        for overlay in &self.overlays {
            overlay.draw(canvas);
        }
    }

    /// Must be called after the viewport changes its size.
    pub fn on_size_changed(&self) {
        for overlay in &self.overlays {
            overlay.on_size_changed();
        }
    }

    pub fn matrix_post_scale(&self, scale_x: f32, scale_y: f32, pivot_x: f32, pivot_y: f32) {
        for overlay in &self.overlays {
            overlay.matrix_post_scale(scale_x, scale_y, pivot_x, pivot_y);
        }
    }

    pub fn matrix_post_translate(&self, translate_x: f32, translate_y: f32) {
        for overlay in &self.overlays {
            overlay.matrix_post_translate(translate_x, translate_y);
        }
    }

    /// Deliver a tap to the overlays, top to bottom, until one of them handles it.
    pub fn on_tap(&self, position: Position) -> bool {
        self.overlays
            .iter()
            .rev()
            .any(|overlay| overlay.on_tap(position))
    }

    /// Deliver a long press to the overlays, top to bottom, until one of them handles it.
    pub fn on_long_press(&self, position: Position) -> bool {
        self.overlays
            .iter()
            .rev()
            .any(|overlay| overlay.on_long_press(position))
    }
}

fn fail(name: &str, err: &OverlayError) -> ! {
    log::error!("{name} cannot be started: {err}");
    panic!("cannot attach overlay: {err}");
}

impl Drop for OverlayList {
    fn drop(&mut self) {
        for overlay in &self.overlays {
            overlay.interrupt();
        }

        for overlay in &self.overlays {
            overlay.join();
        }

        log::debug!("All overlay threads are down.");
    }
}
