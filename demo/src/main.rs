//! Draws a few overlays above the center of Wrocław and saves the composited frame as PNG.
//!
//! Usage: `demo [output.png]`. Set `RUST_LOG=debug` to see the overlay threads at work.

mod places;

use std::{
    error::Error,
    sync::Arc,
    time::{Duration, Instant},
};

use egui::Color32;
use map_overlays::{
    CircleOverlay, Circles, Dot, Gps, GpsOverlay, ItemizedOverlay, Items, MapView, OverlayCircle,
    OverlayItem, OverlayList, OverlayStats, OverlayWay, Style, Viewport, WayOverlay, Ways,
};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

const NAMES: [&str; 4] = ["Wrocław Główny", "Dworcowa", "Capitol", "Wroclavia"];

fn items() -> ItemizedOverlay {
    let marker = Dot {
        radius: 8.,
        fill: Some(Style::fill(Color32::from_rgb(200, 30, 30))),
        outline: Some(Style::stroke(Color32::WHITE, 2.)),
    };

    let items = ItemizedOverlay::new(Items::new(Some(Arc::new(marker))).with_handler(
        |event, index| {
            log::info!("{event:?} on {}.", NAMES.get(index).unwrap_or(&"?"));
            true
        },
    ));

    items.add_all(
        [
            places::wroclaw_glowny(),
            places::dworcowa_bus_stop(),
            places::capitol(),
            places::wroclavia(),
        ]
        .into_iter()
        .zip(NAMES)
        .map(|(position, name)| OverlayItem::new(position).with_title(name)),
    );
    items
}

fn ways() -> WayOverlay {
    let ways = WayOverlay::new(Ways::new(
        Some(Style::fill(Color32::from_rgba_unmultiplied(0, 120, 0, 60))),
        Some(Style::stroke(Color32::DARK_GREEN, 3.)),
    ));

    ways.add(OverlayWay::line([
        places::capitol(),
        places::dworcowa_bus_stop(),
        places::wroclaw_glowny(),
        places::wroclavia(),
        places::capitol(),
    ]));
    ways
}

fn circles() -> CircleOverlay {
    let circles = CircleOverlay::new(Circles::new(
        Some(Style::fill(Color32::from_rgba_unmultiplied(30, 30, 200, 50))),
        Some(Style::stroke(Color32::DARK_BLUE, 1.)),
    ));
    circles.add(OverlayCircle::new(places::capitol(), 80.));
    circles
}

fn gps() -> GpsOverlay {
    let marker = Dot {
        radius: 5.,
        fill: Some(Style::fill(Color32::LIGHT_BLUE)),
        outline: Some(Style::stroke(Color32::BLACK, 1.)),
    };
    let gps = GpsOverlay::new(Gps::new(
        Some(Style::fill(Color32::from_rgba_unmultiplied(0, 150, 255, 40))),
        Some(Style::stroke(Color32::from_rgb(0, 150, 255), 2.)),
        Some(Arc::new(marker)),
    ));

    gps.set_track(vec![places::wroclavia(), places::wroclaw_glowny()]);
    gps.push_track_point(places::dworcowa_bus_stop());
    gps.set_position(places::dworcowa_bus_stop(), 25.);
    gps
}

/// Wait until every overlay has something in its front buffer.
fn wait_for_first_frames(stats: &[&dyn Fn() -> OverlayStats]) -> Result<(), Box<dyn Error>> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while stats.iter().any(|stats| stats().passes_committed == 0) {
        if Instant::now() > deadline {
            return Err("overlays did not draw anything in time".into());
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "overlays.png".to_owned());

    let view = Arc::new(MapView::new(places::wroclaw_glowny(), 16, WIDTH, HEIGHT)?);
    let mut overlays = OverlayList::new(Arc::clone(&view) as Arc<dyn Viewport>);

    let (ways, circles, gps, items) = (ways(), circles(), gps(), items());
    overlays.push(ways.clone());
    overlays.push(circles.clone());
    overlays.push(gps.clone());
    overlays.push(items.clone());

    wait_for_first_frames(&[
        &|| ways.stats(),
        &|| circles.stats(),
        &|| gps.stats(),
        &|| items.stats(),
    ])?;

    // Markers are on top, so they get the tap first.
    if !overlays.on_tap(places::capitol()) {
        log::warn!("Nothing was tapped.");
    }

    let mut frame = tiny_skia::Pixmap::new(WIDTH, HEIGHT).ok_or("invalid frame size")?;
    frame.fill(tiny_skia::Color::from_rgba8(240, 235, 225, 255));
    overlays.draw(&mut frame);
    frame.save_png(&output)?;

    for overlay in overlays.iter() {
        log::info!("{} is alive: {}.", overlay.name(), overlay.is_alive());
    }
    log::info!("Items: {:?}", items.stats());
    log::info!("Saved {output}, {} repaints requested.", view.repaints());

    Ok(())
}
