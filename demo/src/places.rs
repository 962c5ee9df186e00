//! Few common places in the city of Wrocław, used in the demo.

use map_overlays::{Position, lon_lat};

/// Main train station of the city of Wrocław.
/// https://en.wikipedia.org/wiki/Wroc%C5%82aw_G%C5%82%C3%B3wny_railway_station
pub fn wroclaw_glowny() -> Position {
    lon_lat(17.03664, 51.09916)
}

/// Taking a public bus (line 106) is probably the cheapest option to get from
/// the train station to the airport.
pub fn dworcowa_bus_stop() -> Position {
    lon_lat(17.03940, 51.10005)
}

/// Musical Theatre Capitol.
/// https://www.teatr-capitol.pl/
pub fn capitol() -> Position {
    lon_lat(17.03018, 51.10073)
}

/// Shopping center, and the main intercity bus station.
pub fn wroclavia() -> Position {
    lon_lat(17.03471, 51.09648)
}
