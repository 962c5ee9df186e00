//! Point markers.

use std::sync::{Arc, Mutex};

use egui::{Pos2, Rect, vec2};

use crate::{
    Position,
    canvas::Canvas,
    marker::Marker,
    overlay::{EventType, HitHandler, Layer, Overlay, Pass},
    position::{Pixels, PixelsExt as _},
    primitives::{HasPrimitives, Primitives, ZoomCache, lock},
    projector::Projection,
};

/// Single point of interest, drawn with a marker.
#[derive(Clone, Default)]
pub struct OverlayItem {
    position: Option<Position>,
    marker: Option<Arc<dyn Marker>>,
    pub title: Option<String>,
    pub snippet: Option<String>,
    cache: ZoomCache<Pixels>,
}

impl OverlayItem {
    pub fn new(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    /// Use this marker instead of the overlay's default one.
    pub fn with_marker(mut self, marker: Arc<dyn Marker>) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    /// Move the item. `None` hides it.
    pub fn set_position(&mut self, position: Option<Position>) {
        self.position = position;
        self.cache.invalidate();
    }

    pub fn set_marker(&mut self, marker: Option<Arc<dyn Marker>>) {
        self.marker = marker;
    }

    fn world_position(&mut self, projection: &dyn Projection, zoom: u8) -> Option<Pixels> {
        let position = self.position?;
        self.cache
            .get_or_compute(zoom, || projection.to_point(position, zoom))
            .copied()
    }
}

/// Draws [`OverlayItem`]s with their markers and lets them be tapped.
pub struct Items {
    default_marker: Option<Arc<dyn Marker>>,
    items: Primitives<OverlayItem>,
    visible: Mutex<Vec<usize>>,
    handler: Option<HitHandler>,
}

pub type ItemizedOverlay = Overlay<Items>;

impl Items {
    /// Items without their own marker use `default_marker`. Ones without any marker are not
    /// drawn.
    pub fn new(default_marker: Option<Arc<dyn Marker>>) -> Self {
        Self {
            default_marker,
            items: Primitives::default(),
            visible: Mutex::new(Vec::new()),
            handler: None,
        }
    }

    /// Handle taps and long presses on the items.
    pub fn with_handler(
        mut self,
        handler: impl Fn(EventType, usize) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Indices of the items drawn by the last completed pass, in drawing order.
    pub fn visible(&self) -> Vec<usize> {
        lock(&self.visible).clone()
    }

    fn marker<'a>(&'a self, item: &'a OverlayItem) -> Option<&'a dyn Marker> {
        item.marker.as_deref().or(self.default_marker.as_deref())
    }

    /// Whether `point` lies within the item's marker, as drawn with `projection`.
    fn is_hit(&self, index: usize, point: Pos2, projection: &dyn Projection) -> bool {
        let Some(item) = self.items.get(index) else {
            return false;
        };
        let item = lock(&item);

        let Some(marker) = self.marker(&item) else {
            return false;
        };

        item.position
            .and_then(|position| projection.to_pixels(position))
            .is_some_and(|pixels| marker.bounds().translate(pixels.to_vec2()).contains(point))
    }
}

impl HasPrimitives for Items {
    type Primitive = OverlayItem;

    fn primitives(&self) -> &Primitives<OverlayItem> {
        &self.items
    }
}

impl Layer for Items {
    fn thread_name(&self) -> &str {
        "ItemizedOverlay"
    }

    fn size(&self) -> usize {
        self.items.len()
    }

    fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        let canvas_rect = Rect::from_min_size(
            Pos2::ZERO,
            vec2(canvas.width() as f32, canvas.height() as f32),
        );
        let mut visible = Vec::new();

        for (index, item) in self.items.snapshot().iter().enumerate() {
            if pass.is_cancelled() {
                return;
            }

            let mut item = lock(item);
            let Some(world) = item.world_position(pass.projection, pass.zoom) else {
                continue;
            };
            let Some(marker) = self.marker(&item) else {
                continue;
            };

            let bounds = marker
                .bounds()
                .translate(world.relative_to(pass.origin).to_vec2());
            if !bounds.intersects(canvas_rect) {
                continue;
            }

            marker.draw(canvas, bounds);
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

        // Topmost first.
        for index in self.visible().into_iter().rev() {
            if self.is_hit(index, point, projection) && handler(event, index) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use egui::Color32;
    use tiny_skia::Pixmap;

    use super::*;
    use crate::{
        canvas::{
            Style,
            testing::{RecordingCanvas, alpha_at},
        },
        lat_lon, lon_lat,
        marker::Dot,
        overlay::{AnyOverlay, testing::eventually},
        projector::{
            Projector,
            testing::{CountingProjection, Flat},
        },
        viewport::{MapView, Viewport},
    };

    const CENTER: (f64, f64) = (51.1, 17.0);

    fn projector(zoom: u8) -> Projector {
        Projector::new(100, 100, lat_lon(CENTER.0, CENTER.1), zoom)
    }

    fn dot(radius: f32) -> Arc<dyn Marker> {
        Arc::new(Dot {
            radius,
            fill: Some(Style::fill(Color32::RED)),
            outline: None,
        })
    }

    /// Position `dx`, `dy` pixels away from the center of a 100x100 viewport at `zoom`.
    fn offset(dx: f32, dy: f32, zoom: u8) -> Position {
        projector(zoom)
            .from_pixels(egui::pos2(50. + dx, 50. + dy))
            .unwrap()
    }

    fn draw(items: &Items, projection: &dyn Projection, zoom: u8) -> Pixmap {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        let origin = projector(zoom).origin().unwrap();
        items.draw(&mut pixmap, &Pass::new(origin, zoom, projection));
        pixmap
    }

    #[test]
    fn items_are_drawn_with_their_markers() {
        let items = Items::new(Some(dot(5.)));
        items.items.extend([
            OverlayItem::new(offset(0., 0., 16)),
            OverlayItem::new(offset(30., 30., 16)).with_marker(dot(2.)),
        ]);

        let pixmap = draw(&items, &projector(16), 16);
        assert_eq!(alpha_at(&pixmap, 50., 50.), 255);
        assert_eq!(alpha_at(&pixmap, 52., 50.), 255);
        assert_eq!(alpha_at(&pixmap, 80., 80.), 255);
        assert_eq!(alpha_at(&pixmap, 83.5, 80.), 0, "own marker is smaller");
        assert_eq!(items.visible(), vec![0, 1]);
    }

    #[test]
    fn items_without_position_or_marker_are_skipped() {
        let items = Items::new(None);
        items.items.extend([
            OverlayItem::default().with_marker(dot(5.)),
            OverlayItem::new(offset(0., 0., 16)),
            OverlayItem::new(offset(0., 0., 16)).with_marker(dot(5.)),
        ]);

        let mut canvas = RecordingCanvas::new(100, 100);
        let origin = projector(16).origin().unwrap();
        items.draw(&mut canvas, &Pass::new(origin, 16, &projector(16)));

        assert_eq!(canvas.paths.len(), 1);
        assert_eq!(items.visible(), vec![2]);
    }

    fn draw_flat(items: &Items) {
        let mut canvas = RecordingCanvas::new(100, 100);
        items.draw(&mut canvas, &Pass::new(Pixels::new(0., 0.), 16, &Flat));
    }

    #[test]
    fn items_outside_of_canvas_are_not_visible() {
        let items = Items::new(Some(dot(5.)));
        items.items.extend([
            OverlayItem::new(lon_lat(-10., 50.)),
            // Touches the edge.
            OverlayItem::new(lon_lat(105., 50.)),
            OverlayItem::new(lon_lat(50., 120.)),
            OverlayItem::new(lon_lat(50., -5.5)),
        ]);

        draw_flat(&items);
        assert_eq!(items.visible(), vec![1]);
    }

    #[test]
    fn positions_are_recomputed_only_when_zoom_changes() {
        let items = Items::new(Some(dot(5.)));
        items.items.extend([
            OverlayItem::new(lat_lon(CENTER.0, CENTER.1)),
            OverlayItem::new(lat_lon(CENTER.0, CENTER.1)),
        ]);

        let projection = CountingProjection::new(projector(16));
        draw(&items, &projection, 16);
        draw(&items, &projection, 16);
        assert_eq!(projection.calls(), 2);

        draw(&items, &projection, 15);
        assert_eq!(projection.calls(), 4);

        // Moving an item invalidates its cache.
        lock(&items.items.get(0).unwrap()).set_position(Some(offset(1., 1., 16)));
        draw(&items, &projection, 15);
        assert_eq!(projection.calls(), 5);
    }

    #[test]
    fn unprojectable_items_are_skipped() {
        let items = Items::new(Some(dot(5.)));
        items.items.extend([
            OverlayItem::new(lat_lon(89.9, 17.)),
            OverlayItem::new(lat_lon(CENTER.0, CENTER.1)),
        ]);

        draw(&items, &projector(16), 16);
        assert_eq!(items.visible(), vec![1]);
    }

    fn tappable(hits: Arc<Mutex<Vec<(EventType, usize)>>>, handled: bool) -> Items {
        Items::new(Some(dot(10.))).with_handler(move |event, index| {
            lock(&hits).push((event, index));
            handled
        })
    }

    #[test]
    fn later_item_wins_when_markers_overlap() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let items = tappable(Arc::clone(&hits), true);
        items.items.extend([
            OverlayItem::new(offset(0., 0., 16)),
            OverlayItem::new(offset(5., 0., 16)),
            OverlayItem::new(offset(40., 40., 16)),
        ]);
        draw(&items, &projector(16), 16);

        assert!(items.hit(offset(3., 0., 16), &projector(16), EventType::Tap));
        assert!(items.hit(offset(3., 0., 16), &projector(16), EventType::LongPress));
        assert_eq!(
            *lock(&hits),
            vec![(EventType::Tap, 1), (EventType::LongPress, 1)]
        );
    }

    #[test]
    fn unhandled_hit_propagates_to_items_below() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let items = tappable(Arc::clone(&hits), false);
        items.items.extend([
            OverlayItem::new(offset(0., 0., 16)),
            OverlayItem::new(offset(5., 0., 16)),
        ]);
        draw(&items, &projector(16), 16);

        assert!(!items.hit(offset(3., 0., 16), &projector(16), EventType::Tap));
        assert_eq!(
            *lock(&hits),
            vec![(EventType::Tap, 1), (EventType::Tap, 0)]
        );
    }

    #[test]
    fn marker_bounds_are_inclusive() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let items = tappable(Arc::clone(&hits), true);
        items.items.push(OverlayItem::new(lon_lat(50., 50.)));
        draw_flat(&items);

        assert!(items.hit(lon_lat(60., 60.), &Flat, EventType::Tap));
        assert!(items.hit(lon_lat(40., 40.), &Flat, EventType::Tap));
        assert!(!items.hit(lon_lat(60.5, 50.), &Flat, EventType::Tap));
        assert_eq!(lock(&hits).len(), 2);
    }

    #[test]
    fn only_visible_items_can_be_hit() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let items = tappable(Arc::clone(&hits), true);

        // Not drawn yet.
        items.items.push(OverlayItem::new(offset(0., 0., 16)));
        assert!(!items.hit(offset(0., 0., 16), &projector(16), EventType::Tap));

        draw(&items, &projector(16), 16);
        assert!(items.hit(offset(0., 0., 16), &projector(16), EventType::Tap));

        // Removed after being drawn.
        items.items.clear();
        assert!(!items.hit(offset(0., 0., 16), &projector(16), EventType::Tap));
    }

    #[test]
    fn removing_all_items_empties_the_visible_list() {
        let items = Items::new(Some(dot(5.)));
        for dx in 0..5 {
            items.items.push(OverlayItem::new(offset(dx as f32 * 5., 0., 16)));
        }
        draw(&items, &projector(16), 16);
        assert_eq!(items.visible().len(), 5);

        while items.size() > 0 {
            items.items.remove(0);
        }
        draw(&items, &projector(16), 16);
        assert!(items.visible().is_empty());
    }

    #[test]
    fn changes_made_through_the_overlay_are_redrawn() {
        let _ = env_logger::try_init();

        let view = Arc::new(MapView::new(lat_lon(CENTER.0, CENTER.1), 16, 100, 100).unwrap());
        let overlay = ItemizedOverlay::new(Items::new(Some(dot(5.))));
        overlay
            .attach(Arc::clone(&view) as Arc<dyn Viewport>)
            .unwrap();

        overlay.add(OverlayItem::new(offset(0., 0., 16)));
        overlay.add_all((1..5).map(|dx| OverlayItem::new(offset(dx as f32 * 5., 0., 16))));
        assert_eq!(overlay.len(), 5);
        assert_eq!(overlay.layer().size(), 5);
        eventually("all items drawn", || overlay.layer().visible().len() == 5);

        for _ in 0..5 {
            assert!(overlay.remove(0).is_some());
        }
        assert!(overlay.remove(0).is_none());
        assert!(overlay.is_empty());
        eventually("visible list emptied", || {
            overlay.layer().visible().is_empty()
        });

        overlay.add_all([
            OverlayItem::new(offset(0., 0., 16)),
            OverlayItem::new(offset(10., 10., 16)),
        ]);
        eventually("new items drawn", || overlay.layer().visible().len() == 2);
        assert!(overlay.get(1).is_some());

        overlay.clear();
        assert_eq!(overlay.len(), 0);
        eventually("visible list emptied after clear", || {
            overlay.layer().visible().is_empty()
        });

        overlay.interrupt();
        overlay.join();
    }

    #[test]
    fn item_metadata() {
        let item = OverlayItem::new(lat_lon(CENTER.0, CENTER.1))
            .with_title("Zoo")
            .with_snippet("Open daily");
        assert_eq!(item.title.as_deref(), Some("Zoo"));
        assert_eq!(item.snippet.as_deref(), Some("Open daily"));
        assert_eq!(item.position(), Some(lat_lon(CENTER.0, CENTER.1)));
    }
}
