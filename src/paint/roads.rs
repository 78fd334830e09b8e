use crate::paint::filters::{self, Filter};
use crate::paint::style::{Color, LineCap, LineJoin, LineStyle};
use crate::paint::{line, Painter};

/// Describes how one class of roads is drawn: the interior stroke and
/// the casing stroke around it.
pub struct RoadSpec {
    pub filter: Filter,
    pub interior_width: f32,
    pub interior_color: Color,
    pub casing_width: f32,
    pub casing_color: Color,
}

impl RoadSpec {
    fn interior_style(&self) -> LineStyle {
        LineStyle::new(
            self.interior_width,
            self.interior_color,
            LineCap::Round,
            LineJoin::Round,
            Vec::new(),
        )
    }

    fn casing_style(&self) -> LineStyle {
        LineStyle::new(
            self.interior_width + 2.0 * self.casing_width,
            self.casing_color,
            LineCap::Butt,
            LineJoin::Round,
            Vec::new(),
        )
    }

    fn tunnel_style(&self) -> LineStyle {
        LineStyle::new(
            self.interior_width / 2.0,
            self.casing_color,
            LineCap::Butt,
            LineJoin::Round,
            vec![2.0 * self.interior_width, 2.0 * self.interior_width],
        )
    }
}

/// Builds the painter for a road network from a list of road classes.
///
/// Roads are drawn in five passes, from bottom to top: tunnels, then
/// the casings and interiors of ordinary roads, then the casings and
/// interiors of bridges, so that bridges always cover the roads they
/// span and road interiors of one class merge seamlessly at junctions.
pub fn painter_for_roads(specs: Vec<RoadSpec>) -> Painter {
    let bridge = filters::tagged("bridge");
    let tunnel = filters::tagged("tunnel");
    let on_ground = filters::and(
        filters::not(bridge.clone()),
        filters::not(tunnel.clone()),
    );

    let mut bridge_interiors = Painter::empty();
    let mut bridge_casings = Painter::empty();
    let mut road_interiors = Painter::empty();
    let mut road_casings = Painter::empty();
    let mut tunnels = Painter::empty();

    for spec in specs {
        let is_bridge = filters::and(spec.filter.clone(), bridge.clone());
        let is_tunnel = filters::and(spec.filter.clone(), tunnel.clone());
        let is_road = filters::and(spec.filter.clone(), on_ground.clone());

        // Earlier-listed classes stack above later ones, so the most
        // important roads win at untagged crossings.
        bridge_interiors = bridge_interiors.above(&line(spec.interior_style()).when(is_bridge.clone()));
        bridge_casings = bridge_casings.above(&line(spec.casing_style()).when(is_bridge));
        road_interiors = road_interiors.above(&line(spec.interior_style()).when(is_road.clone()));
        road_casings =
            road_casings.above(&line(spec.casing_style().with_cap(LineCap::Round)).when(is_road));
        tunnels = tunnels.above(&line(spec.tunnel_style()).when(is_tunnel));
    }

    bridge_interiors
        .above(&bridge_casings)
        .above(&road_interiors)
        .above(&road_casings)
        .above(&tunnels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::{Point, PolyLine, Polygon};
    use crate::data::{Attributed, AttributesBuilder, MapBuilder};
    use crate::paint::canvas::Canvas;

    struct WidthRecorder {
        widths: Vec<f32>,
    }

    impl Canvas for WidthRecorder {
        fn draw_polyline(&mut self, _polyline: &PolyLine, style: &LineStyle) {
            self.widths.push(style.width);
        }

        fn draw_polygon(&mut self, _polygon: &Polygon, _color: Color) {
            panic!("roads never fill polygons");
        }
    }

    fn road(tags: &[(&str, &str)]) -> Attributed<PolyLine> {
        let mut builder = AttributesBuilder::new();
        for (key, value) in tags {
            builder.put(key, value);
        }
        let points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)];
        Attributed::new(PolyLine::open(points).unwrap(), builder.build())
    }

    fn spec() -> RoadSpec {
        RoadSpec {
            filter: filters::tagged_any("highway", &["residential"]),
            interior_width: 2.0,
            interior_color: Color::WHITE,
            casing_width: 0.5,
            casing_color: Color::BLACK,
        }
    }

    #[test]
    fn ordinary_road_gets_casing_then_interior() {
        let mut map_builder = MapBuilder::new();
        map_builder.add_polyline(road(&[("highway", "residential")]));
        let map = map_builder.build();

        let mut canvas = WidthRecorder { widths: Vec::new() };
        painter_for_roads(vec![spec()]).draw_map(&map, &mut canvas);

        // Casing (2.0 + 2 * 0.5 = 3.0) below the interior (2.0).
        assert_eq!(canvas.widths, vec![3.0, 2.0]);
    }

    #[test]
    fn bridges_are_drawn_above_ordinary_roads() {
        let mut map_builder = MapBuilder::new();
        map_builder.add_polyline(road(&[("highway", "residential")]));
        map_builder.add_polyline(road(&[("highway", "residential"), ("bridge", "yes")]));
        let map = map_builder.build();

        let mut canvas = WidthRecorder { widths: Vec::new() };
        painter_for_roads(vec![spec()]).draw_map(&map, &mut canvas);

        // Ground road casing and interior first, then the bridge's.
        assert_eq!(canvas.widths, vec![3.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn tunnels_are_dashed_half_width_strokes_below_everything() {
        let mut map_builder = MapBuilder::new();
        map_builder.add_polyline(road(&[("highway", "residential"), ("tunnel", "yes")]));
        map_builder.add_polyline(road(&[("highway", "residential")]));
        let map = map_builder.build();

        let mut canvas = WidthRecorder { widths: Vec::new() };
        painter_for_roads(vec![spec()]).draw_map(&map, &mut canvas);

        assert_eq!(canvas.widths, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn earlier_listed_road_classes_are_drawn_on_top() {
        let motorways = RoadSpec {
            filter: filters::tagged_any("highway", &["motorway"]),
            interior_width: 10.0,
            interior_color: Color::WHITE,
            casing_width: 1.0,
            casing_color: Color::BLACK,
        };
        let service_roads = RoadSpec {
            filter: filters::tagged_any("highway", &["service"]),
            interior_width: 1.0,
            interior_color: Color::WHITE,
            casing_width: 1.0,
            casing_color: Color::BLACK,
        };
        let mut map_builder = MapBuilder::new();
        map_builder.add_polyline(road(&[("highway", "motorway")]));
        map_builder.add_polyline(road(&[("highway", "service")]));
        let map = map_builder.build();

        let mut canvas = WidthRecorder { widths: Vec::new() };
        painter_for_roads(vec![motorways, service_roads]).draw_map(&map, &mut canvas);

        // Per pass the service road goes first, so the motorway interior
        // (10.0) covers it at crossings.
        assert_eq!(canvas.widths, vec![3.0, 12.0, 1.0, 10.0]);
    }

    #[test]
    fn tunnel_dash_pattern_scales_with_interior_width() {
        let style = spec().tunnel_style();
        assert_eq!(style.dash_pattern, vec![4.0, 4.0]);
        assert_eq!(style.width, 1.0);
    }
}
