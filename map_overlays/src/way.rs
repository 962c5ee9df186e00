//! Polylines and polygons.

use tiny_skia::{Path, PathBuilder};

use crate::{
    Position,
    canvas::{Canvas, Style},
    overlay::{Layer, Overlay, Pass},
    position::{Pixels, PixelsExt as _},
    primitives::{HasPrimitives, Primitives, ZoomCache, lock},
    projector::Projection,
};

/// Way made of one or more rings of nodes. With a fill, inner rings become holes.
#[derive(Debug, Clone, Default)]
pub struct OverlayWay {
    nodes: Vec<Vec<Position>>,
    pub fill: Option<Style>,
    pub outline: Option<Style>,
    cache: ZoomCache<Vec<Vec<Pixels>>>,
}

impl OverlayWay {
    pub fn new(nodes: Vec<Vec<Position>>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    /// Way with a single ring.
    pub fn line(nodes: impl IntoIterator<Item = Position>) -> Self {
        Self::new(vec![nodes.into_iter().collect()])
    }

    pub fn with_fill(mut self, fill: Style) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn with_outline(mut self, outline: Style) -> Self {
        self.outline = Some(outline);
        self
    }

    pub fn nodes(&self) -> &[Vec<Position>] {
        &self.nodes
    }

    pub fn set_nodes(&mut self, nodes: Vec<Vec<Position>>) {
        self.nodes = nodes;
        self.cache.invalidate();
    }

    /// Append a node to the last ring.
    pub fn push_node(&mut self, node: Position) {
        match self.nodes.last_mut() {
            Some(ring) => ring.push(node),
            None => self.nodes.push(vec![node]),
        }
        self.cache.invalidate();
    }

    pub(crate) fn has_nodes(&self) -> bool {
        self.nodes.iter().any(|ring| !ring.is_empty())
    }

    /// Nodes projected at `zoom`, or `None` if any of them cannot be projected.
    pub(crate) fn world_nodes(
        &mut self,
        projection: &dyn Projection,
        zoom: u8,
    ) -> Option<&[Vec<Pixels>]> {
        let nodes = &self.nodes;
        self.cache
            .get_or_compute(zoom, || {
                nodes
                    .iter()
                    .map(|ring| {
                        ring.iter()
                            .map(|node| projection.to_point(*node, zoom))
                            .collect::<Option<Vec<_>>>()
                    })
                    .collect()
            })
            .map(Vec::as_slice)
    }
}

/// One path with a contour per ring.
pub(crate) fn assemble_path(rings: &[Vec<Pixels>], origin: Pixels) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for ring in rings {
        let mut points = ring.iter().map(|point| point.relative_to(origin));
        let Some(first) = points.next() else {
            continue;
        };

        builder.move_to(first.x, first.y);
        for point in points {
            builder.line_to(point.x, point.y);
        }
    }
    builder.finish()
}

/// Draws [`OverlayWay`]s.
pub struct Ways {
    default_fill: Option<Style>,
    default_outline: Option<Style>,
    ways: Primitives<OverlayWay>,
}

pub type WayOverlay = Overlay<Ways>;

impl Ways {
    /// Ways without their own styles use these.
    pub fn new(default_fill: Option<Style>, default_outline: Option<Style>) -> Self {
        Self {
            default_fill,
            default_outline,
            ways: Primitives::default(),
        }
    }
}

impl HasPrimitives for Ways {
    type Primitive = OverlayWay;

    fn primitives(&self) -> &Primitives<OverlayWay> {
        &self.ways
    }
}

impl Layer for Ways {
    fn thread_name(&self) -> &str {
        "WayOverlay"
    }

    fn size(&self) -> usize {
        self.ways.len()
    }

    fn draw(&self, canvas: &mut dyn Canvas, pass: &Pass<'_>) {
        for way in self.ways.snapshot() {
            if pass.is_cancelled() {
                return;
            }

            let mut way = lock(&way);
            if !way.has_nodes() {
                continue;
            }

            let (fill, outline) = if way.fill.is_some() || way.outline.is_some() {
                (way.fill, way.outline)
            } else {
                (self.default_fill, self.default_outline)
            };

            let Some(nodes) = way.world_nodes(pass.projection, pass.zoom) else {
                continue;
            };
            let Some(path) = assemble_path(nodes, pass.origin) else {
                continue;
            };

            if let Some(outline) = &outline {
                canvas.draw_path(&path, outline);
            }
            if let Some(fill) = &fill {
                canvas.draw_path(&path, fill);
            }
        }
    }
}
