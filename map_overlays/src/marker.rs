//! Markers drawn at positions of overlay items.

use egui::{Rect, Vec2, pos2, vec2};
use tiny_skia::{ColorU8, PathBuilder, Pixmap, Transform};

use crate::canvas::{Canvas, Style};

#[derive(thiserror::Error, Debug)]
pub enum MarkerError {
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("image of {0}x{1} pixels cannot be used as an icon")]
    InvalidSize(u32, u32),
}

/// Where the anchor point (i.e. the item's position) lies within the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    /// In the middle of the marker.
    #[default]
    Center,
    /// In the middle of the bottom edge, like for a pin.
    BottomCenter,
}

impl Anchor {
    /// Bounds of a marker of the given size, relative to the anchor point.
    pub fn bounds(self, size: Vec2) -> Rect {
        match self {
            Self::Center => Rect::from_center_size(pos2(0., 0.), size),
            Self::BottomCenter => {
                Rect::from_min_max(pos2(-size.x / 2., -size.y), pos2(size.x / 2., 0.))
            }
        }
    }
}

/// Visual representation of an overlay item.
///
/// Markers are shared between many items, so they never change while drawing. Instead, each
/// draw call gets the screen-space bounds the marker should occupy.
pub trait Marker: Send + Sync {
    /// Bounds relative to the anchor point.
    fn bounds(&self) -> Rect;

    /// Draw the marker so that it fills `bounds`.
    fn draw(&self, canvas: &mut dyn Canvas, bounds: Rect);
}

/// Marker made out of a bitmap.
pub struct Icon {
    pixmap: Pixmap,
    bounds: Rect,
}

impl Icon {
    pub fn new(pixmap: Pixmap, anchor: Anchor) -> Self {
        let bounds = anchor.bounds(vec2(pixmap.width() as f32, pixmap.height() as f32));
        Self { pixmap, bounds }
    }

    /// Decode a PNG or JPEG image.
    ///
    /// # Errors
    ///
    /// Fails if the image cannot be decoded or is empty.
    pub fn from_image_bytes(bytes: &[u8], anchor: Anchor) -> Result<Self, MarkerError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = image.dimensions();
        let mut pixmap =
            Pixmap::new(width, height).ok_or(MarkerError::InvalidSize(width, height))?;

        // Pixmap keeps premultiplied colors.
        for (target, source) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = source.0;
            *target = ColorU8::from_rgba(r, g, b, a).premultiply();
        }

        Ok(Self::new(pixmap, anchor))
    }
}

impl Marker for Icon {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn draw(&self, canvas: &mut dyn Canvas, bounds: Rect) {
        let scale_x = bounds.width() / self.pixmap.width() as f32;
        let scale_y = bounds.height() / self.pixmap.height() as f32;
        let transform =
            Transform::from_scale(scale_x, scale_y).post_translate(bounds.min.x, bounds.min.y);
        canvas.draw_bitmap(&self.pixmap, transform);
    }
}

/// Round marker drawn with paths.
#[derive(Debug, Clone)]
pub struct Dot {
    pub radius: f32,
    pub fill: Option<Style>,
    pub outline: Option<Style>,
}

impl Marker for Dot {
    fn bounds(&self) -> Rect {
        Anchor::Center.bounds(Vec2::splat(self.radius * 2.))
    }

    fn draw(&self, canvas: &mut dyn Canvas, bounds: Rect) {
        let center = bounds.center();
        let radius = bounds.width().min(bounds.height()) / 2.;
        let Some(path) = PathBuilder::from_circle(center.x, center.y, radius) else {
            return;
        };

        if let Some(fill) = &self.fill {
            canvas.draw_path(&path, fill);
        }
        if let Some(outline) = &self.outline {
            canvas.draw_path(&path, outline);
        }
    }
}
