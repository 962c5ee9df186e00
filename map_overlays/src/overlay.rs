//! Redraw engine shared by all overlays.
//!
//! Each attached overlay owns a thread which sleeps until the viewport changes its size or the
//! overlay's data changes. Then it rasterizes the primitives into the back buffer, swaps it with
//! the front one and asks the viewport to repaint. Painting on the UI thread only ever touches
//! the front buffer, through a transform which compensates for the map movement that happened
//! during the pass.

use std::{
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::JoinHandle,
};

use tiny_skia::{Color, Pixmap, Transform};

use crate::{
    Position,
    canvas::Canvas,
    position::Pixels,
    primitives::lock,
    projector::{Projection, top_left},
    viewport::Viewport,
};

const THREAD_NAME: &str = "Overlay";

/// Kind of a gesture delivered to the overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    LongPress,
    Tap,
}

/// Called with the kind of the gesture and the index of the hit primitive. Returns whether the
/// gesture was handled.
pub type HitHandler = Box<dyn Fn(EventType, usize) -> bool + Send + Sync>;

#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    #[error("overlay thread already destroyed")]
    Destroyed,
    #[error("could not start the overlay thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Configuration of the overlay thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct OverlayOptions {
    /// Name of the thread. Defaults to the layer's [`Layer::thread_name`].
    pub thread_name: Option<String>,

    /// Stack size of the thread. Defaults to the standard library's default.
    pub stack_size: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayStats {
    /// Passes which ended up in the front buffer.
    pub passes_committed: usize,

    /// Passes which were started, but thrown away because they got stale.
    pub passes_abandoned: usize,

    pub buffers_allocated: usize,
    pub buffers_released: usize,
}

/// Parameters of a single draw pass.
pub struct Pass<'a> {
    /// World pixel of the canvas' top-left corner.
    pub origin: Pixels,

    /// Zoom level at which the primitives are to be projected.
    pub zoom: u8,

    pub projection: &'a dyn Projection,

    cancelled: Option<&'a dyn Fn() -> bool>,
}

impl<'a> Pass<'a> {
    /// Pass which is never cancelled.
    pub fn new(origin: Pixels, zoom: u8, projection: &'a dyn Projection) -> Self {
        Self {
            origin,
            zoom,
            projection,
            cancelled: None,
        }
    }

    /// Whether the overlay got interrupted or resized. Layers should check it between
    /// primitives and stop drawing if it returns `true`.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_some_and(|cancelled| cancelled())
    }
}

/// Drawing and hit-testing strategy of an overlay. The redraw engine ([`Overlay`]) takes care
/// of threading and buffering.
pub trait Layer: Send + Sync + 'static {
    fn thread_name(&self) -> &str {
        THREAD_NAME
    }

    /// Number of primitives. Informational, the engine only logs it.
    fn size(&self) -> usize;

    /// Draw all primitives on `canvas`, whose top-left corner is at `pass.origin`.
    fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>);

    /// Handle a gesture at `position`. Returns whether it was handled, which stops its
    /// propagation to other overlays.
    fn hit(&self, _position: Position, _projection: &dyn Projection, _event: EventType) -> bool {
        false
    }
}

/// Operations the viewport and [`crate::OverlayList`] perform on overlays, regardless of their
/// layer.
pub trait AnyOverlay: Send + Sync {
    fn name(&self) -> String;

    /// Start the overlay thread and bind it to the viewport. Overlay whose thread is already
    /// running is just bound to the new viewport and resized.
    ///
    /// # Errors
    ///
    /// Fails if the overlay got interrupted, or its thread could not be started.
    fn attach(&self, viewport: Arc<dyn Viewport>) -> Result<(), OverlayError>;

    /// Whether the overlay thread is running.
    fn is_alive(&self) -> bool;

    /// Stop the overlay thread. It exits as soon as possible, releasing its buffers. Interrupted
    /// overlay cannot be attached again.
    fn interrupt(&self);

    /// Wait for the overlay thread to exit.
    fn join(&self);

    /// Schedule a new draw pass.
    fn request_redraw(&self);

    /// Schedule reallocation of the buffers, according to the viewport's size.
    fn on_size_changed(&self);

    /// Paint the front buffer on `canvas`. Meant to be called on the UI thread.
    fn draw(&self, canvas: &mut dyn Canvas);

    fn matrix_post_scale(&self, scale_x: f32, scale_y: f32, pivot_x: f32, pivot_y: f32);

    fn matrix_post_translate(&self, translate_x: f32, translate_y: f32);

    fn on_tap(&self, position: Position) -> bool;

    fn on_long_press(&self, position: Position) -> bool;

    /// Free the buffers right away, without waiting for the thread to exit.
    fn dispose(&self);
}

#[derive(Default)]
struct Signals {
    attached: bool,
    interrupted: bool,
    changed_size: bool,
    redraw: bool,
}

struct Frame {
    front: Option<Pixmap>,
    back: Option<Pixmap>,
    matrix: Transform,

    /// Bumped whenever buffers are released. Buffer taken out for drawing under an older epoch
    /// must not be put back.
    epoch: u64,
}

struct Inner<L> {
    layer: L,
    options: OverlayOptions,
    signals: Mutex<Signals>,
    wakeup: Condvar,
    frame: Mutex<Frame>,
    viewport: Mutex<Option<Arc<dyn Viewport>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    stats: Mutex<OverlayStats>,
}

/// Independently redrawing layer of annotations, drawn above the map. Cloning gives another
/// handle to the same overlay.
pub struct Overlay<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for Overlay<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: Layer> Overlay<L> {
    pub fn new(layer: L) -> Self {
        Self::with_options(layer, OverlayOptions::default())
    }

    pub fn with_options(layer: L, options: OverlayOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                layer,
                options,
                signals: Mutex::new(Signals::default()),
                wakeup: Condvar::new(),
                frame: Mutex::new(Frame {
                    front: None,
                    back: None,
                    matrix: Transform::identity(),
                    epoch: 0,
                }),
                viewport: Mutex::new(None),
                thread: Mutex::new(None),
                stats: Mutex::new(OverlayStats::default()),
            }),
        }
    }

    pub fn layer(&self) -> &L {
        &self.inner.layer
    }

    pub fn stats(&self) -> OverlayStats {
        lock(&self.inner.stats).clone()
    }

    /// Same as [`AnyOverlay::request_redraw`]. Should be called after the primitives change.
    pub(crate) fn populate(&self) {
        self.inner.request_redraw();
    }
}

impl<L: Layer> Inner<L> {
    fn signals(&self) -> MutexGuard<'_, Signals> {
        lock(&self.signals)
    }

    fn viewport(&self) -> Option<Arc<dyn Viewport>> {
        lock(&self.viewport).clone()
    }

    fn thread_name(&self) -> String {
        self.options
            .thread_name
            .clone()
            .unwrap_or_else(|| self.layer.thread_name().to_owned())
    }

    fn request_redraw(&self) {
        self.signals().redraw = true;
        self.wakeup.notify_all();
    }

    fn on_size_changed(&self) {
        self.signals().changed_size = true;
        self.wakeup.notify_all();
    }

    fn interrupt(&self) {
        self.signals().interrupted = true;
        self.wakeup.notify_all();
    }

    /// Checked while drawing the primitives.
    fn interrupted_or_resized(&self) -> bool {
        let signals = self.signals();
        signals.interrupted || signals.changed_size
    }

    /// Whether the pass in progress is stale. A newer redraw request makes it stale too, since
    /// a fresh pass is going to follow anyway.
    fn superseded(&self) -> bool {
        let signals = self.signals();
        signals.interrupted || signals.changed_size || signals.redraw
    }

    fn run(&self) {
        log::debug!("{} thread started.", self.thread_name());
        let mut has_valid_dimensions = false;

        loop {
            let changed_size = {
                let mut signals = self.signals();
                while !signals.interrupted && !signals.changed_size && !signals.redraw {
                    signals = self
                        .wakeup
                        .wait(signals)
                        .unwrap_or_else(PoisonError::into_inner);
                }

                if signals.interrupted {
                    break;
                }

                std::mem::take(&mut signals.changed_size)
            };

            if changed_size {
                has_valid_dimensions = self.change_size();
            }

            let redraw = std::mem::take(&mut self.signals().redraw);
            if redraw && has_valid_dimensions {
                self.redraw();
            }
        }

        *lock(&self.viewport) = None;
        self.release_buffers();
        log::debug!("{} thread is down.", self.thread_name());
    }

    /// Reallocate buffers according to the viewport's size. Returns whether there is anything
    /// to draw on.
    fn change_size(&self) -> bool {
        self.release_buffers();

        let Some(viewport) = self.viewport() else {
            log::error!("{} is not attached to any viewport.", self.thread_name());
            return false;
        };

        let (width, height) = viewport.size();
        if width == 0 || height == 0 {
            log::debug!("Viewport is {width}x{height}, there is nothing to draw on.");
            return false;
        }

        let (Some(front), Some(back)) = (Pixmap::new(width, height), Pixmap::new(width, height))
        else {
            log::warn!("Could not allocate {width}x{height} overlay buffers.");
            return false;
        };

        {
            let mut frame = lock(&self.frame);
            frame.front = Some(front);
            frame.back = Some(back);
            frame.matrix = Transform::identity();
        }

        lock(&self.stats).buffers_allocated += 2;
        log::debug!("Allocated {width}x{height} buffers for {}.", self.thread_name());

        // Force the first pass on the new buffers.
        self.signals().redraw = true;
        true
    }

    /// Free both buffers. Safe to call when they are already gone.
    fn release_buffers(&self) {
        let released = {
            let mut frame = lock(&self.frame);
            frame.epoch += 1;
            usize::from(frame.front.take().is_some()) + usize::from(frame.back.take().is_some())
        };

        if released > 0 {
            log::debug!("Released {released} buffers of {}.", self.thread_name());
            lock(&self.stats).buffers_released += released;
        }
    }

    fn redraw(&self) {
        let Some(viewport) = self.viewport() else {
            return;
        };

        let (back, epoch) = {
            let mut frame = lock(&self.frame);
            (frame.back.take(), frame.epoch)
        };

        let Some(mut back) = back else {
            log::debug!("{} has no buffer to draw on.", self.thread_name());
            return;
        };

        // Save the zoom level and map position before drawing.
        let projection = viewport.projection();
        let zoom_before = projection.zoom();
        let Some(position_before) = projection.to_point(projection.center(), zoom_before) else {
            log::warn!("Map center {:?} cannot be projected.", projection.center());
            self.put_back(back, epoch);
            return;
        };

        back.fill(Color::TRANSPARENT);
        let origin = top_left(position_before, back.width(), back.height());

        if self.superseded() {
            self.abandon(back, epoch);
            return;
        }

        let cancelled = || self.interrupted_or_resized();
        let pass = Pass {
            origin,
            zoom: zoom_before,
            projection: &projection,
            cancelled: Some(&cancelled),
        };
        self.layer.draw(&mut back, &pass);

        if self.superseded() {
            self.abandon(back, epoch);
            return;
        }

        // Save the zoom level and map position after drawing. Position is projected at the
        // old zoom level, so that the difference is expressed in pixels of the drawn buffer.
        let after = viewport.map_position();
        let position_after = projection
            .to_point(after.center, zoom_before)
            .unwrap_or(position_before);

        if self.superseded() {
            self.abandon(back, epoch);
            return;
        }

        if viewport.is_zoom_animating() {
            // Do not disturb the ongoing animation.
            self.abandon(back, epoch);
            return;
        }

        let shift = position_before - position_after;
        let zoom_difference = after.zoom as i32 - zoom_before as i32;
        if self.commit(back, epoch, shift, zoom_difference) {
            lock(&self.stats).passes_committed += 1;
            log::trace!(
                "{} committed a new frame of {} primitives.",
                self.thread_name(),
                self.layer.size()
            );
            viewport.request_repaint();
        }
    }

    /// Make `buffer` the front one. Returns `false` if the buffers were released in the meantime.
    fn commit(&self, buffer: Pixmap, epoch: u64, shift: Pixels, zoom_difference: i32) -> bool {
        let mut frame = lock(&self.frame);
        if frame.epoch != epoch {
            drop(frame);
            self.discard(buffer);
            return false;
        }

        let mut matrix = Transform::from_translate(shift.x() as f32, shift.y() as f32);
        if zoom_difference != 0 {
            let scale = 2f32.powi(zoom_difference);
            matrix = post_scale_around(
                matrix,
                scale,
                scale,
                (buffer.width() / 2) as f32,
                (buffer.height() / 2) as f32,
            );
        }

        frame.matrix = matrix;
        frame.back = frame.front.replace(buffer);
        true
    }

    fn abandon(&self, buffer: Pixmap, epoch: u64) {
        log::debug!("{} abandoned a stale pass.", self.thread_name());
        lock(&self.stats).passes_abandoned += 1;
        self.put_back(buffer, epoch);
    }

    fn put_back(&self, buffer: Pixmap, epoch: u64) {
        let mut frame = lock(&self.frame);
        if frame.epoch == epoch && frame.back.is_none() {
            frame.back = Some(buffer);
        } else {
            drop(frame);
            self.discard(buffer);
        }
    }

    fn discard(&self, buffer: Pixmap) {
        drop(buffer);
        lock(&self.stats).buffers_released += 1;
    }

    fn hit(&self, position: Position, event: EventType) -> bool {
        let Some(viewport) = self.viewport() else {
            return false;
        };
        self.layer.hit(position, &viewport.projection(), event)
    }
}

fn post_scale_around(
    transform: Transform,
    scale_x: f32,
    scale_y: f32,
    pivot_x: f32,
    pivot_y: f32,
) -> Transform {
    transform
        .post_translate(-pivot_x, -pivot_y)
        .post_scale(scale_x, scale_y)
        .post_translate(pivot_x, pivot_y)
}

impl<L: Layer> AnyOverlay for Overlay<L> {
    fn name(&self) -> String {
        self.inner.thread_name()
    }

    fn attach(&self, viewport: Arc<dyn Viewport>) -> Result<(), OverlayError> {
        let mut signals = self.inner.signals();
        if signals.interrupted {
            return Err(OverlayError::Destroyed);
        }

        *lock(&self.inner.viewport) = Some(viewport);

        if signals.attached {
            log::debug!("{} is already running, rebinding.", self.inner.thread_name());
            signals.changed_size = true;
            self.inner.wakeup.notify_all();
            return Ok(());
        }

        let mut builder = std::thread::Builder::new().name(self.inner.thread_name());
        if let Some(stack_size) = self.inner.options.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let inner = Arc::clone(&self.inner);
        match builder.spawn(move || inner.run()) {
            Ok(join_handle) => {
                *lock(&self.inner.thread) = Some(join_handle);
            }
            Err(err) => {
                *lock(&self.inner.viewport) = None;
                return Err(err.into());
            }
        }

        signals.attached = true;
        signals.changed_size = true;
        self.inner.wakeup.notify_all();
        Ok(())
    }

    fn is_alive(&self) -> bool {
        lock(&self.inner.thread)
            .as_ref()
            .is_some_and(|join_handle| !join_handle.is_finished())
    }

    fn interrupt(&self) {
        self.inner.interrupt();
    }

    fn join(&self) {
        let Some(join_handle) = lock(&self.inner.thread).take() else {
            return;
        };

        if join_handle.thread().id() == std::thread::current().id() {
            log::warn!("{} thread cannot join itself.", self.name());
            return;
        }

        log::debug!("Waiting for the {} thread to exit.", self.name());
        // Thread might have panicked, nothing to do in this case.
        let _ = join_handle.join();
    }

    fn request_redraw(&self) {
        self.inner.request_redraw();
    }

    fn on_size_changed(&self) {
        self.inner.on_size_changed();
    }

    fn draw(&self, canvas: &mut dyn Canvas) {
        let frame = lock(&self.inner.frame);
        if let Some(front) = &frame.front {
            canvas.draw_bitmap(front, frame.matrix);
        }
    }

    fn matrix_post_scale(&self, scale_x: f32, scale_y: f32, pivot_x: f32, pivot_y: f32) {
        let mut frame = lock(&self.inner.frame);
        frame.matrix = post_scale_around(frame.matrix, scale_x, scale_y, pivot_x, pivot_y);
    }

    fn matrix_post_translate(&self, translate_x: f32, translate_y: f32) {
        let mut frame = lock(&self.inner.frame);
        frame.matrix = frame.matrix.post_translate(translate_x, translate_y);
    }

    fn on_tap(&self, position: Position) -> bool {
        self.inner.hit(position, EventType::Tap)
    }

    fn on_long_press(&self, position: Position) -> bool {
        self.inner.hit(position, EventType::LongPress)
    }

    fn dispose(&self) {
        self.inner.release_buffers();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc,
        },
        time::{Duration, Instant},
    };

    use egui::Color32;
    use tiny_skia::PathBuilder;

    use super::*;
    use crate::canvas::Style;

    /// Wait until `condition` holds, failing the test if it takes too long.
    pub fn eventually(description: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {description}");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Holds a chosen pass until released.
    pub struct Gate {
        pub pass: usize,
        pub started: mpsc::Sender<()>,
        pub release: mpsc::Receiver<()>,
    }

    /// Layer which paints the whole canvas on its first pass and nothing on later ones.
    #[derive(Default)]
    pub struct TestLayer {
        pub passes: AtomicUsize,
        pub taps: AtomicUsize,
        pub handles_taps: bool,
        pub gate: Mutex<Option<Gate>>,
    }

    impl TestLayer {
        pub fn gated(pass: usize) -> (Self, mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (started_tx, started_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let layer = Self {
                gate: Mutex::new(Some(Gate {
                    pass,
                    started: started_tx,
                    release: release_rx,
                })),
                ..Default::default()
            };
            (layer, started_rx, release_tx)
        }

        pub fn passes(&self) -> usize {
            self.passes.load(Ordering::SeqCst)
        }
    }

    impl Layer for TestLayer {
        fn thread_name(&self) -> &str {
            "TestOverlay"
        }

        fn size(&self) -> usize {
            1
        }

        fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
            let number = self.passes.fetch_add(1, Ordering::SeqCst) + 1;

            if let Some(gate) = lock(&self.gate).as_ref().filter(|gate| gate.pass == number) {
                let _ = gate.started.send(());
                loop {
                    if pass.is_cancelled() {
                        return;
                    }
                    match gate.release.recv_timeout(Duration::from_millis(5)) {
                        Err(mpsc::RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
            }

            if number == 1 {
                let rect =
                    tiny_skia::Rect::from_xywh(0., 0., canvas.width() as f32, canvas.height() as f32);
                if let Some(rect) = rect {
                    canvas.draw_path(&PathBuilder::from_rect(rect), &Style::fill(Color32::RED));
                }
            }
        }

        fn hit(&self, _position: Position, _projection: &dyn Projection, event: EventType) -> bool {
            if event == EventType::Tap {
                self.taps.fetch_add(1, Ordering::SeqCst);
            }
            self.handles_taps
        }
    }
}
