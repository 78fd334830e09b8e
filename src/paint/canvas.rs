use raqote::{
    DrawOptions, DrawTarget, Path, PathBuilder, SolidSource, Source, StrokeStyle, Winding,
};

use crate::data::geometry::{Point, PolyLine, Polygon};
use crate::errors::Result;
use crate::paint::style::{Color, LineCap, LineJoin, LineStyle};

/// The drawing surface painters target. Coordinates are in the map
/// plane; implementations decide how they land on the output.
pub trait Canvas {
    fn draw_polyline(&mut self, polyline: &PolyLine, style: &LineStyle);
    fn draw_polygon(&mut self, polygon: &Polygon, color: Color);
}

/// A canvas rasterizing through raqote. The visible region of the map
/// plane is pinned to the image corners, and stroke widths and dash
/// patterns scale with the output resolution.
pub struct RaqoteCanvas {
    target: DrawTarget,
    to_pixels: Box<dyn Fn(Point) -> Point>,
    resolution: f32,
}

impl RaqoteCanvas {
    pub fn new(
        bottom_left: Point,
        top_right: Point,
        width: i32,
        height: i32,
        dpi: f64,
        background: Color,
    ) -> Result<RaqoteCanvas> {
        let to_pixels = Point::aligned_coordinate_change(
            bottom_left,
            Point::new(0.0, height as f64),
            top_right,
            Point::new(width as f64, 0.0),
        )?;
        let mut target = DrawTarget::new(width, height);
        target.clear(solid(background));
        Ok(RaqoteCanvas {
            target,
            to_pixels: Box::new(to_pixels),
            resolution: (dpi / 72.0) as f32,
        })
    }

    pub fn width(&self) -> i32 {
        self.target.width()
    }

    pub fn height(&self) -> i32 {
        self.target.height()
    }

    /// The rendered pixels, one packed ARGB word per pixel, row-major
    /// from the top-left corner.
    pub fn data(&self) -> &[u32] {
        self.target.get_data()
    }

    fn add_ring(&self, path: &mut PathBuilder, polyline: &PolyLine) {
        let mut points = polyline.points().iter();
        if let Some(first) = points.next() {
            let pixel = (self.to_pixels)(*first);
            path.move_to(pixel.x as f32, pixel.y as f32);
        }
        for point in points {
            let pixel = (self.to_pixels)(*point);
            path.line_to(pixel.x as f32, pixel.y as f32);
        }
        if polyline.is_closed() {
            path.close();
        }
    }
}

impl Canvas for RaqoteCanvas {
    fn draw_polyline(&mut self, polyline: &PolyLine, style: &LineStyle) {
        let mut path = PathBuilder::new();
        self.add_ring(&mut path, polyline);
        let stroke = StrokeStyle {
            width: style.width * self.resolution,
            cap: match style.cap {
                LineCap::Butt => raqote::LineCap::Butt,
                LineCap::Round => raqote::LineCap::Round,
                LineCap::Square => raqote::LineCap::Square,
            },
            join: match style.join {
                LineJoin::Bevel => raqote::LineJoin::Bevel,
                LineJoin::Miter => raqote::LineJoin::Miter,
                LineJoin::Round => raqote::LineJoin::Round,
            },
            miter_limit: 10.0,
            dash_array: style
                .dash_pattern
                .iter()
                .map(|dash| dash * self.resolution)
                .collect(),
            dash_offset: 0.0,
        };
        self.target.stroke(
            &path.finish(),
            &Source::Solid(solid(style.color)),
            &stroke,
            &DrawOptions::new(),
        );
    }

    fn draw_polygon(&mut self, polygon: &Polygon, color: Color) {
        let mut path = PathBuilder::new();
        self.add_ring(&mut path, polygon.shell());
        for hole in polygon.holes() {
            self.add_ring(&mut path, hole);
        }
        let mut path: Path = path.finish();
        // Holes punch through the shell regardless of ring orientation.
        path.winding = Winding::EvenOdd;
        self.target.fill(
            &path,
            &Source::Solid(solid(color)),
            &DrawOptions::new(),
        );
    }
}

fn solid(color: Color) -> SolidSource {
    let (r, g, b) = color.to_rgb8();
    SolidSource::from_unpremultiplied_argb(0xff, r, g, b)
}
