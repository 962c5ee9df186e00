//! Circles with a radius in meters, like GPS accuracy.

use std::sync::Mutex;

use egui::{Pos2, Rect, Vec2, vec2};
use tiny_skia::PathBuilder;

use crate::{
    Position,
    canvas::{Canvas, Style},
    overlay::{EventType, HitHandler, Layer, Overlay, Pass},
    position::{Pixels, PixelsExt as _},
    primitives::{HasPrimitives, Primitives, ZoomCache, lock},
    projector::Projection,
};

#[derive(Debug, Clone, Default)]
pub struct OverlayCircle {
    center: Option<Position>,
    radius: f32,
    pub fill: Option<Style>,
    pub outline: Option<Style>,

    /// Center in world pixels and radius in pixels.
    cache: ZoomCache<(Pixels, f32)>,

    /// Pixel radius of the last projection. Survives changes, so that the circle stays tappable
    /// until it is drawn again.
    drawn_radius: Option<f32>,
}

impl OverlayCircle {
    /// Circle of `radius` meters. Negative radius hides the circle.
    pub fn new(center: Position, radius: f32) -> Self {
        Self {
            center: Some(center),
            radius,
            ..Default::default()
        }
    }

    pub fn with_fill(mut self, fill: Style) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_outline(mut self, outline: Style) -> Self {
        self.outline = Some(outline);
        self
    }

    pub fn center(&self) -> Option<Position> {
        self.center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn set_center(&mut self, center: Option<Position>) {
        self.center = center;
        self.cache.invalidate();
    }

    pub fn set_radius(&mut self, radius: f32) {
        self.radius = radius;
        self.cache.invalidate();
    }

    pub(crate) fn is_drawable(&self) -> bool {
        self.center.is_some() && self.radius >= 0.
    }

    pub(crate) fn world(
        &mut self,
        projection: &dyn Projection,
        zoom: u8,
    ) -> Option<(Pixels, f32)> {
        let center = self.center?;
        let radius = self.radius;
        let world = self
            .cache
            .get_or_compute(zoom, || {
                let center = projection.to_point(center, zoom)?;
                Some((center, projection.meters_to_pixels(radius, zoom)))
            })
            .copied()?;
        self.drawn_radius = Some(world.1);
        Some(world)
    }
}

/// Draws [`OverlayCircle`]s and lets them be tapped.
pub struct Circles {
    default_fill: Option<Style>,
    default_outline: Option<Style>,
    circles: Primitives<OverlayCircle>,
    visible: Mutex<Vec<usize>>,
    handler: Option<HitHandler>,
}

pub type CircleOverlay = Overlay<Circles>;

impl Circles {
    /// Circles without their own styles use these.
    pub fn new(default_fill: Option<Style>, default_outline: Option<Style>) -> Self {
        Self {
            default_fill,
            default_outline,
            circles: Primitives::default(),
            visible: Mutex::new(Vec::new()),
            handler: None,
        }
    }

    pub fn with_handler(
        mut self,
        handler: impl Fn(EventType, usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Indices of the circles drawn by the last completed pass, in drawing order.
    pub fn visible(&self) -> Vec<usize> {
        lock(&self.visible).clone()
    }

    fn styles(&self, circle: &OverlayCircle) -> (Option<Style>, Option<Style>) {
        if circle.fill.is_some() || circle.outline.is_some() {
            (circle.fill, circle.outline)
        } else {
            (self.default_fill, self.default_outline)
        }
    }

    fn is_hit(&self, index: usize, point: Pos2, projection: &dyn Projection) -> bool {
        let Some(circle) = self.circles.get(index) else {
            return false;
        };
        let circle = lock(&circle);

        let Some(center) = circle.center.filter(|_| circle.is_drawable()) else {
            return false;
        };
        let Some(radius) = circle.drawn_radius else {
            return false;
        };

        projection
            .to_pixels(center)
            .is_some_and(|center| center.distance(point) <= radius)
    }
}

impl HasPrimitives for Circles {
    type Primitive = OverlayCircle;

    fn primitives(&self) -> &Primitives<OverlayCircle> {
        &self.circles
    }
}

impl Layer for Circles {
    fn thread_name(&self) -> &str {
        "CircleOverlay"
    }

    fn size(&self) -> usize {
        self.circles.len()
    }

    fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        let canvas_rect = Rect::from_min_size(
            Pos2::ZERO,
            vec2(canvas.width() as f32, canvas.height() as f32),
        );
        let mut visible = Vec::new();

        for (index, circle) in self.circles.snapshot().iter().enumerate() {
            if pass.is_cancelled() {
                return;
            }

            let mut circle = lock(circle);
            if !circle.is_drawable() {
                continue;
            }

            let Some((center, radius)) = circle.world(pass.projection, pass.zoom) else {
                continue;
            };

            let center = center.relative_to(pass.origin);
            let bounds = Rect::from_center_size(center, Vec2::splat(radius * 2.));
            if !bounds.intersects(canvas_rect) {
                continue;
            }

            let (fill, outline) = self.styles(&circle);
            if fill.is_none() && outline.is_none() {
                continue;
            }

            // Degenerate circle has no path, but it still counts as visible.
            if let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) {
                if let Some(outline) = &outline {
                    canvas.draw_path(&path, outline);
                }
                if let Some(fill) = &fill {
                    canvas.draw_path(&path, fill);
                }
            }
            visible.push(index);
        }

        *lock(&self.visible) = visible;
    }

    fn hit(&self, position: Position, projection: &dyn Projection, event: EventType) -> bool {
        let Some(handler) = &self.handler else {
            return false;
        };
        let Some(point) = projection.to_pixels(position) else {
            return false;
        };

        for index in self.visible().into_iter().rev() {
            if self.is_hit(index, point, projection) && handler(event, index) {
                return true;
            }
        }
        false
    }
}
