//! Types and functions for working with positions.

use egui::{Pos2, Vec2, pos2};

/// Geographical position with latitude and longitude.
pub type Position = geo_types::Point;

/// Construct `Position` from latitude and longitude.
pub fn lat_lon(lat: f64, lon: f64) -> Position {
    Position::new(lon, lat)
}

/// Construct `Position` from longitude and latitude. Note that it is common standard to write
/// coordinates starting with the latitude instead (e.g. `51.104465719934176, 17.075169894118684` is
/// the [Wrocław's zoo](https://zoo.wroclaw.pl/en/)).
pub fn lon_lat(lon: f64, lat: f64) -> Position {
    Position::new(lon, lat)
}

/// Location on the "world bitmap", i.e. the whole map rendered at some zoom level. These numbers
/// get large quickly, so they are kept in `f64` until made relative to a canvas.
pub type Pixels = geo_types::Point;

pub trait PixelsExt {
    /// Position relative to `origin`, suitable for drawing on a canvas whose top-left corner is
    /// at `origin`.
    fn relative_to(&self, origin: Pixels) -> Pos2;
    fn to_vec2(&self) -> Vec2;
}

impl PixelsExt for Pixels {
    fn relative_to(&self, origin: Pixels) -> Pos2 {
        // Subtract first, while still in f64.
        let relative = *self - origin;
        pos2(relative.x() as f32, relative.y() as f32)
    }

    fn to_vec2(&self) -> Vec2 {
        Vec2::new(self.x() as f32, self.y() as f32)
    }
}
