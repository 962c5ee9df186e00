//! Project the lat/lon coordinates into a 2D x/y using the Web Mercator.
//! <https://en.wikipedia.org/wiki/Web_Mercator_projection>
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>

use crate::position::{Pixels, Position, lon_lat};
use std::f64::consts::PI;

/// Size of a single tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// Web Mercator cuts the world at this latitude, so that the map is a square.
pub const LATITUDE_MAX: f64 = 85.051_128_779_806_59;

const EARTH_CIRCUMFERENCE: f64 = 40_075_016.686;

/// Zoom specifies how many pixels are in the whole map. For example, zoom 0 means that the whole
/// map is just one 256x256 tile, zoom 1 means that it is 2x2 tiles, and so on.
pub fn total_pixels(zoom: u8) -> f64 {
    2f64.powi(zoom as i32) * (TILE_SIZE as f64)
}

/// Whether `position` lies on the projectable part of the globe.
pub fn projectable(position: Position) -> bool {
    position.x().is_finite()
        && position.y().is_finite()
        && (-180. ..=180.).contains(&position.x())
        && (-LATITUDE_MAX..=LATITUDE_MAX).contains(&position.y())
}

/// Project the position into the Mercator projection and normalize it to 0-1 range.
fn mercator_normalized(position: Position) -> (f64, f64) {
    // Project into Mercator (cylindrical map projection).
    let x = position.x().to_radians();
    let y = position.y().to_radians().tan().asinh();

    // Scale both x and y to 0-1 range.
    let x = (1. + (x / PI)) / 2.;
    let y = (1. - (y / PI)) / 2.;

    (x, y)
}

/// Project geographical position into a 2D plane using Mercator. Returns `None` for positions
/// outside of [`projectable`] range.
pub fn project(position: Position, zoom: u8) -> Option<Pixels> {
    if !projectable(position) {
        return None;
    }

    let total_pixels = total_pixels(zoom);
    let (x, y) = mercator_normalized(position);
    Some(Pixels::new(x * total_pixels, y * total_pixels))
}

/// Transforms world pixels into a geographical position.
pub fn unproject(pixels: Pixels, zoom: u8) -> Position {
    let number_of_pixels = total_pixels(zoom);

    let lon = pixels.x();
    let lon = lon / number_of_pixels;
    let lon = (lon * 2. - 1.) * PI;
    let lon = lon.to_degrees();

    let lat = pixels.y();
    let lat = lat / number_of_pixels;
    let lat = (-lat * 2. + 1.) * PI;
    let lat = lat.sinh().atan().to_degrees();

    lon_lat(lon, lat)
}

/// How many pixels one meter takes at the given latitude and zoom level.
pub fn pixels_per_meter(latitude: f64, zoom: u8) -> f64 {
    let pixel_per_meter_equator = total_pixels(zoom) / EARTH_CIRCUMFERENCE;
    let latitude_rad = latitude.abs().to_radians();
    pixel_per_meter_equator / latitude_rad.cos()
}
