use egui::Pos2;

use crate::{
    mercator::{pixels_per_meter, project, unproject},
    position::{Pixels, PixelsExt as _, Position},
};

/// Conversions between geographical positions and pixels, used by the overlays while drawing and
/// hit-testing. Implementations return `None` when a position cannot be projected, in which case
/// the affected primitive is skipped.
pub trait Projection {
    /// Position on the "world bitmap" at the given zoom level.
    fn to_point(&self, position: Position, zoom: u8) -> Option<Pixels>;

    /// Position on the screen, i.e. relative to the top-left corner of the viewport.
    fn to_pixels(&self, position: Position) -> Option<Pos2>;

    /// Geographical position under the given screen pixel.
    fn from_pixels(&self, pixels: Pos2) -> Option<Position>;

    /// Length of `meters` expressed in pixels at the given zoom level.
    fn meters_to_pixels(&self, meters: f32, zoom: u8) -> f32;
}

/// Projects geographical position into pixels of a viewport, as it was at the moment this
/// projector was created.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    width: u32,
    height: u32,
    center: Position,
    zoom: u8,
}

impl Projector {
    pub fn new(width: u32, height: u32, center: Position, zoom: u8) -> Self {
        Self {
            width,
            height,
            center,
            zoom,
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn center(&self) -> Position {
        self.center
    }

    /// World pixel of the viewport's top-left corner. This is where overlays put the origin of
    /// their canvas.
    pub fn origin(&self) -> Option<Pixels> {
        project(self.center, self.zoom).map(|center| top_left(center, self.width, self.height))
    }
}

/// Top-left corner of a `width` x `height` canvas centered at `center`.
pub(crate) fn top_left(center: Pixels, width: u32, height: u32) -> Pixels {
    // Integer halves, so that odd sizes round the same way everywhere.
    center - Pixels::new((width / 2) as f64, (height / 2) as f64)
}

impl Projection for Projector {
    fn to_point(&self, position: Position, zoom: u8) -> Option<Pixels> {
        project(position, zoom)
    }

    fn to_pixels(&self, position: Position) -> Option<Pos2> {
        let origin = self.origin()?;
        Some(project(position, self.zoom)?.relative_to(origin))
    }

    fn from_pixels(&self, pixels: Pos2) -> Option<Position> {
        // Despite being in pixel space, `origin` is sufficiently large that we must do the
        // arithmetic in f64 to avoid imprecision.
        let origin = self.origin()?;
        let x = origin.x() + pixels.x as f64;
        let y = origin.y() + pixels.y as f64;
        Some(unproject(Pixels::new(x, y), self.zoom))
    }

    fn meters_to_pixels(&self, meters: f32, zoom: u8) -> f32 {
        // return f32 for ergonomics, as the result is typically used for drawing
        (meters as f64 * pixels_per_meter(self.center.y(), zoom)) as f32
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lat_lon, lon_lat, mercator};
    use egui::pos2;

    fn assert_approx_eq(a: f64, b: f64) {
        let diff = (a - b).abs();
        let tolerance = 0.0001;
        assert!(
            diff < tolerance,
            "Values differ by more than {tolerance}: {a} vs {b}"
        );
    }

    #[test]
    fn center_is_projected_to_the_middle_of_the_viewport() {
        let center = lon_lat(21., 52.);
        let projector = Projector::new(100, 50, center, 10);
        assert_eq!(projector.to_pixels(center), Some(pos2(50., 25.)));
    }

    #[test]
    fn test_unproject_precision() {
        let original = lon_lat(21., 52.);
        let projector = Projector::new(100, 100, original, 18);

        let mut projected = projector.to_pixels(original).unwrap();
        let mut prev_x = 0.0;
        for offset in 0..10 {
            projected.x += offset as f32;
            let unprojected = projector.from_pixels(projected).unwrap();
            assert_ne!(
                prev_x,
                unprojected.x(),
                "Input was different but projection remained the same"
            );
            prev_x = unprojected.x();
        }
    }

    #[test]
    fn unproject_is_inverse_of_project() {
        let original = lon_lat(21., 52.);
        let projector = Projector::new(100, 100, lon_lat(21.001, 52.001), 10);

        let projected = projector.to_pixels(original).unwrap();
        let unprojected = projector.from_pixels(projected).unwrap();

        assert_approx_eq(original.x(), unprojected.x());
        assert_approx_eq(original.y(), unprojected.y());
    }

    #[test]
    fn positions_outside_of_mercator_are_not_projected() {
        let projector = Projector::new(100, 100, lon_lat(21., 52.), 10);
        assert_eq!(projector.to_pixels(lat_lon(89.9, 0.)), None);
        assert_eq!(projector.to_point(lat_lon(89.9, 0.), 10), None);
    }

    #[test]
    fn meters_are_converted_at_the_latitude_of_the_center() {
        let projector = Projector::new(100, 100, lat_lon(52., 21.), 15);
        let expected = 50. * mercator::pixels_per_meter(52., 15);
        approx::assert_relative_eq!(
            projector.meters_to_pixels(50., 15) as f64,
            expected,
            max_relative = 1e-6
        );
    }
}
