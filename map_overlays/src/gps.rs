//! Current GPS fix and the track recorded so far.

use std::sync::{Arc, Mutex};

use egui::{Pos2, Rect, Vec2, vec2};
use tiny_skia::PathBuilder;

use crate::{
    Position,
    canvas::{Canvas, Style},
    circle::OverlayCircle,
    marker::Marker,
    overlay::{Layer, Overlay, Pass},
    position::PixelsExt as _,
    primitives::lock,
    way::{OverlayWay, assemble_path},
};

/// Draws the GPS fix as a circle as big as its accuracy, with a marker in the middle. Track,
/// if any, is drawn below, with the outline style.
pub struct Gps {
    fill: Option<Style>,
    outline: Option<Style>,
    marker: Option<Arc<dyn Marker>>,
    fix: Mutex<OverlayCircle>,
    track: Mutex<OverlayWay>,
}

pub type GpsOverlay = Overlay<Gps>;

impl Gps {
    pub fn new(
        fill: Option<Style>,
        outline: Option<Style>,
        marker: Option<Arc<dyn Marker>>,
    ) -> Self {
        Self {
            fill,
            outline,
            marker,
            fix: Mutex::new(OverlayCircle::default()),
            track: Mutex::new(OverlayWay::default()),
        }
    }

    /// Position of the current fix.
    pub fn position(&self) -> Option<Position> {
        lock(&self.fix).center()
    }

    /// Number of recorded track points.
    pub fn track_len(&self) -> usize {
        lock(&self.track).nodes().iter().map(Vec::len).sum()
    }

    fn draw_track(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        let Some(outline) = &self.outline else {
            return;
        };

        let mut track = lock(&self.track);
        if track.nodes().iter().map(Vec::len).sum::<usize>() < 2 {
            return;
        }

        let Some(nodes) = track.world_nodes(pass.projection, pass.zoom) else {
            return;
        };
        if let Some(path) = assemble_path(nodes, pass.origin) {
            canvas.draw_path(&path, outline);
        }
    }

    fn draw_fix(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        let mut fix = lock(&self.fix);
        if !fix.is_drawable() {
            return;
        }
        let Some((center, radius)) = fix.world(pass.projection, pass.zoom) else {
            return;
        };

        let canvas_rect = Rect::from_min_size(
            Pos2::ZERO,
            vec2(canvas.width() as f32, canvas.height() as f32),
        );
        let center = center.relative_to(pass.origin);
        let has_style = self.fill.is_some() || self.outline.is_some();
        if has_style
            && radius > 0.
            && Rect::from_center_size(center, Vec2::splat(radius * 2.)).intersects(canvas_rect)
            && let Some(path) = PathBuilder::from_circle(center.x, center.y, radius)
        {
            if let Some(outline) = &self.outline {
                canvas.draw_path(&path, outline);
            }
            if let Some(fill) = &self.fill {
                canvas.draw_path(&path, fill);
            }
        }

        if let Some(marker) = &self.marker {
            let bounds = marker.bounds().translate(center.to_vec2());
            if bounds.intersects(canvas_rect) {
                marker.draw(canvas, bounds);
            }
        }
    }
}

impl Layer for Gps {
    fn thread_name(&self) -> &str {
        "GpsOverlay"
    }

    fn size(&self) -> usize {
        usize::from(self.position().is_some())
    }

    fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        self.draw_track(canvas, pass);
        if pass.is_cancelled() {
            return;
        }
        self.draw_fix(canvas, pass);
    }
}

impl Overlay<Gps> {
    /// Move the fix. `accuracy` is in meters.
    pub fn set_position(&self, position: Position, accuracy: f32) {
        {
            let mut fix = lock(&self.layer().fix);
            fix.set_center(Some(position));
            fix.set_radius(accuracy);
        }
        self.populate();
    }

    pub fn clear_position(&self) {
        lock(&self.layer().fix).set_center(None);
        self.populate();
    }

    pub fn push_track_point(&self, position: Position) {
        lock(&self.layer().track).push_node(position);
        self.populate();
    }

    pub fn set_track(&self, track: Vec<Position>) {
        lock(&self.layer().track).set_nodes(vec![track]);
        self.populate();
    }

    pub fn clear_track(&self) {
        lock(&self.layer().track).set_nodes(Vec::new());
        self.populate();
    }
}
