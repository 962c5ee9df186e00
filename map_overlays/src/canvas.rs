//! Drawing surface of the overlays.

use egui::Color32;
use tiny_skia::{FillRule, Paint, Path, Pixmap, PixmapPaint, Stroke, Transform};

/// How a path gets painted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum StyleKind {
    /// Fill the inside of the path, using the even-odd rule, so that inner rings become holes.
    Fill,
    /// Draw the outline of the path.
    Stroke { width: f32 },
}

/// Paint descriptor. It is immutable and cheap to copy, so a single one can be shared by any
/// number of primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Style {
    pub color: Color32,
    pub kind: StyleKind,
    pub anti_alias: bool,
}

impl Style {
    pub fn fill(color: Color32) -> Self {
        Self {
            color,
            kind: StyleKind::Fill,
            anti_alias: true,
        }
    }

    pub fn stroke(color: Color32, width: f32) -> Self {
        Self {
            color,
            kind: StyleKind::Stroke { width },
            anti_alias: true,
        }
    }

    fn paint(&self) -> Paint<'static> {
        let [r, g, b, a] = self.color.to_srgba_unmultiplied();
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = self.anti_alias;
        paint
    }
}

/// Something overlays can draw on. Offscreen buffers of the overlays are plain [`Pixmap`]s, but
/// the trait allows painting the result onto anything else.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Paint `path` with the given style. Fills use the even-odd rule.
    fn draw_path(&mut self, path: &Path, style: &Style);

    /// Blit `bitmap` through `transform`.
    fn draw_bitmap(&mut self, bitmap: &Pixmap, transform: Transform);
}

impl Canvas for Pixmap {
    fn width(&self) -> u32 {
        Self::width(self)
    }

    fn height(&self) -> u32 {
        Self::height(self)
    }

    fn draw_path(&mut self, path: &Path, style: &Style) {
        let paint = style.paint();
        match style.kind {
            StyleKind::Fill => {
                self.fill_path(path, &paint, FillRule::EvenOdd, Transform::identity(), None);
            }
            StyleKind::Stroke { width } => {
                let stroke = Stroke {
                    width,
                    ..Default::default()
                };
                self.stroke_path(path, &paint, &stroke, Transform::identity(), None);
            }
        }
    }

    fn draw_bitmap(&mut self, bitmap: &Pixmap, transform: Transform) {
        self.draw_pixmap(
            0,
            0,
            bitmap.as_ref(),
            &PixmapPaint::default(),
            transform,
            None,
        );
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Alpha of the pixel, or 0 if outside of the pixmap.
    pub fn alpha_at(pixmap: &Pixmap, x: f32, y: f32) -> u8 {
        if x < 0. || y < 0. {
            return 0;
        }
        pixmap
            .pixel(x as u32, y as u32)
            .map(|pixel| pixel.alpha())
            .unwrap_or(0)
    }

    /// Canvas which only records what was drawn.
    #[derive(Default)]
    pub struct RecordingCanvas {
        pub width: u32,
        pub height: u32,
        pub paths: Vec<(Path, Style)>,
        pub bitmaps: Vec<Transform>,
    }

    impl RecordingCanvas {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                ..Default::default()
            }
        }
    }

    impl Canvas for RecordingCanvas {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn draw_path(&mut self, path: &Path, style: &Style) {
            self.paths.push((path.clone(), *style));
        }

        fn draw_bitmap(&mut self, _bitmap: &Pixmap, transform: Transform) {
            self.bitmaps.push(transform);
        }
    }
}
