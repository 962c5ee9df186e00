#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid zoom level")]
pub struct InvalidZoom;

/// Highest zoom level. Mapnik-style sources go up to 19.
/// <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames#Zoom_levels>
pub const MAX_ZOOM: u8 = 19;

/// Discrete zoom level of the map. Overlays cache projected positions per level, so unlike the
/// smooth zoom of an interactive widget, this one only takes whole steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Zoom(u8);

impl TryFrom<u8> for Zoom {
    type Error = InvalidZoom;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > MAX_ZOOM {
            Err(InvalidZoom)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<Zoom> for u8 {
    fn from(zoom: Zoom) -> Self {
        zoom.0
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(16)
    }
}

impl Zoom {
    pub fn level(&self) -> u8 {
        self.0
    }

    pub fn zoom_in(&mut self) -> Result<(), InvalidZoom> {
        *self = Self::try_from(self.0.checked_add(1).ok_or(InvalidZoom)?)?;
        Ok(())
    }

    pub fn zoom_out(&mut self) -> Result<(), InvalidZoom> {
        *self = Self::try_from(self.0.checked_sub(1).ok_or(InvalidZoom)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructing_zoom() {
        assert_eq!(16, Zoom::default().level());
        assert_eq!(19, Zoom::try_from(19).unwrap().level());
        assert_eq!(InvalidZoom, Zoom::try_from(20).unwrap_err());
    }

    #[test]
    fn test_zooming_in() {
        let mut zoom = Zoom::try_from(18).unwrap();
        assert!(zoom.zoom_in().is_ok());
        assert_eq!(19, zoom.level());
        assert_eq!(Err(InvalidZoom), zoom.zoom_in());
        assert_eq!(19, zoom.level());
    }

    #[test]
    fn test_zooming_out() {
        let mut zoom = Zoom::try_from(1).unwrap();
        assert!(zoom.zoom_out().is_ok());
        assert_eq!(0, zoom.level());
        assert_eq!(Err(InvalidZoom), zoom.zoom_out());
    }
}
