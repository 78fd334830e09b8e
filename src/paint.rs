pub mod canvas;
pub mod filters;
pub mod roads;
pub mod style;

use std::rc::Rc;

use self::canvas::Canvas;
use self::filters::Filter;
use self::style::{Color, LineStyle};
use crate::data::{Map, MapBuilder};

/// A painter issues draw calls for a map onto a canvas. Painters are
/// cheap handles to shared closures, so the combinators below can stack
/// and filter them freely.
#[derive(Clone)]
pub struct Painter {
    draw: Rc<dyn Fn(&Map, &mut dyn Canvas)>,
}

impl Painter {
    pub fn new(draw: impl Fn(&Map, &mut dyn Canvas) + 'static) -> Painter {
        Painter {
            draw: Rc::new(draw),
        }
    }

    /// Draws nothing; the neutral element for `above`.
    pub fn empty() -> Painter {
        Painter::new(|_, _| {})
    }

    pub fn draw_map(&self, map: &Map, canvas: &mut dyn Canvas) {
        (self.draw)(map, canvas);
    }

    /// Restricts this painter to the elements accepted by `filter`.
    pub fn when(&self, filter: Filter) -> Painter {
        let inner = self.clone();
        Painter::new(move |map, canvas| {
            let mut reduced = MapBuilder::new();
            for polyline in map.polylines() {
                if filter(polyline.attributes()) {
                    reduced.add_polyline(polyline.clone());
                }
            }
            for polygon in map.polygons() {
                if filter(polygon.attributes()) {
                    reduced.add_polygon(polygon.clone());
                }
            }
            inner.draw_map(&reduced.build(), canvas);
        })
    }

    /// Draws `below` first, then this painter on top of it.
    pub fn above(&self, below: &Painter) -> Painter {
        let top = self.clone();
        let bottom = below.clone();
        Painter::new(move |map, canvas| {
            bottom.draw_map(map, canvas);
            top.draw_map(map, canvas);
        })
    }

    /// Splits the painter into one pass per layer from -5 (bottom) to +5
    /// (top). Elements without a layer tag land on layer 0; layers
    /// outside the range are never drawn.
    pub fn layered(&self) -> Painter {
        let mut painter = Painter::empty();
        for layer in -5..=5 {
            painter = self.when(filters::on_layer(layer)).above(&painter);
        }
        painter
    }
}

/// Fills every polygon of the map with a fixed color.
pub fn polygon(color: Color) -> Painter {
    Painter::new(move |map, canvas| {
        for attributed in map.polygons() {
            canvas.draw_polygon(attributed.value(), color);
        }
    })
}

/// Strokes every polyline of the map with a fixed line style.
pub fn line(style: LineStyle) -> Painter {
    Painter::new(move |map, canvas| {
        for attributed in map.polylines() {
            canvas.draw_polyline(attributed.value(), &style);
        }
    })
}

/// Strokes the shell and every hole of each polygon.
pub fn outline(style: LineStyle) -> Painter {
    Painter::new(move |map, canvas| {
        for attributed in map.polygons() {
            let value = attributed.value();
            canvas.draw_polyline(value.shell(), &style);
            for hole in value.holes() {
                canvas.draw_polyline(hole, &style);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::{Point, PolyLine, Polygon};
    use crate::data::{Attributed, AttributesBuilder};

    /// Records draw calls instead of rasterizing, identified by the
    /// first point's x coordinate.
    struct RecordingCanvas {
        events: Vec<String>,
    }

    impl RecordingCanvas {
        fn new() -> RecordingCanvas {
            RecordingCanvas { events: Vec::new() }
        }
    }

    impl Canvas for RecordingCanvas {
        fn draw_polyline(&mut self, polyline: &PolyLine, _style: &LineStyle) {
            self.events.push(format!("line@{}", polyline.first_point().x));
        }

        fn draw_polygon(&mut self, polygon: &Polygon, _color: Color) {
            self.events
                .push(format!("polygon@{}", polygon.shell().first_point().x));
        }
    }

    fn polyline_at(x: f64, tags: &[(&str, &str)]) -> Attributed<PolyLine> {
        let mut attributes = AttributesBuilder::new();
        for (key, value) in tags {
            attributes.put(key, value);
        }
        Attributed::new(
            PolyLine::open(vec![Point::new(x, 0.0), Point::new(x, 1.0)]).unwrap(),
            attributes.build(),
        )
    }

    fn map_of(polylines: Vec<Attributed<PolyLine>>) -> Map {
        let mut builder = MapBuilder::new();
        for polyline in polylines {
            builder.add_polyline(polyline);
        }
        builder.build()
    }

    fn style() -> LineStyle {
        LineStyle::solid(1.0, Color::BLACK)
    }

    #[test]
    fn when_discards_filtered_elements() {
        let map = map_of(vec![
            polyline_at(1.0, &[("highway", "residential")]),
            polyline_at(2.0, &[("railway", "rail")]),
        ]);
        let mut canvas = RecordingCanvas::new();
        line(style()).when(filters::tagged("highway")).draw_map(&map, &mut canvas);
        assert_eq!(canvas.events, vec!["line@1"]);
    }

    #[test]
    fn above_draws_the_lower_painter_first() {
        let map = map_of(vec![
            polyline_at(1.0, &[("highway", "x")]),
            polyline_at(2.0, &[("railway", "x")]),
        ]);
        let top = line(style()).when(filters::tagged("highway"));
        let bottom = line(style()).when(filters::tagged("railway"));
        let mut canvas = RecordingCanvas::new();
        top.above(&bottom).draw_map(&map, &mut canvas);
        assert_eq!(canvas.events, vec!["line@2", "line@1"]);
    }

    #[test]
    fn layered_draws_ascending_layers() {
        let map = map_of(vec![
            polyline_at(1.0, &[("highway", "x"), ("layer", "1")]),
            polyline_at(2.0, &[("highway", "x"), ("layer", "-1")]),
            polyline_at(3.0, &[("highway", "x")]),
        ]);
        let mut canvas = RecordingCanvas::new();
        line(style()).layered().draw_map(&map, &mut canvas);
        // Layer -1 first, then the untagged element on layer 0, then +1.
        assert_eq!(canvas.events, vec!["line@2", "line@3", "line@1"]);
    }

    #[test]
    fn layered_skips_out_of_range_layers() {
        let map = map_of(vec![polyline_at(1.0, &[("highway", "x"), ("layer", "7")])]);
        let mut canvas = RecordingCanvas::new();
        line(style()).layered().draw_map(&map, &mut canvas);
        assert!(canvas.events.is_empty());
    }

    #[test]
    fn outline_strokes_shell_and_holes() {
        let shell = PolyLine::closed(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])
        .unwrap();
        let hole = PolyLine::closed(vec![
            Point::new(4.0, 4.0),
            Point::new(6.0, 4.0),
            Point::new(6.0, 6.0),
            Point::new(4.0, 6.0),
        ])
        .unwrap();
        let mut builder = MapBuilder::new();
        builder.add_polygon(Attributed::new(
            Polygon::new(shell, vec![hole]).unwrap(),
            AttributesBuilder::new().build(),
        ));

        let mut canvas = RecordingCanvas::new();
        outline(style()).draw_map(&builder.build(), &mut canvas);
        assert_eq!(canvas.events, vec!["line@0", "line@4"]);
    }
}
