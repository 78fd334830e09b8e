use crate::errors::Result;
use crate::paint::filters::{tagged, tagged_any};
use crate::paint::roads::{painter_for_roads, RoadSpec};
use crate::paint::{line, polygon, Painter};

/// An RGB color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    r: f64,
    g: f64,
    b: f64,
}

impl Color {
    pub const RED: Color = Color { r: 1.0, g: 0.0, b: 0.0 };
    pub const GREEN: Color = Color { r: 0.0, g: 1.0, b: 0.0 };
    pub const BLUE: Color = Color { r: 0.0, g: 0.0, b: 1.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    pub fn rgb(r: f64, g: f64, b: f64) -> Result<Color> {
        for (name, component) in [("red", r), ("green", g), ("blue", b)] {
            if !(0.0..=1.0).contains(&component) {
                return Err(format!("Invalid {} component: {}", name, component).into());
            }
        }
        Ok(Color { r, g, b })
    }

    pub fn gray(value: f64) -> Result<Color> {
        Color::rgb(value, value, value)
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn g(&self) -> f64 {
        self.g
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn multiply(&self, other: &Color) -> Color {
        Color {
            r: self.r * other.r,
            g: self.g * other.g,
            b: self.b * other.b,
        }
    }

    pub fn to_rgb8(&self) -> (u8, u8, u8) {
        (
            (self.r * 255.0).round() as u8,
            (self.g * 255.0).round() as u8,
            (self.b * 255.0).round() as u8,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Bevel,
    Miter,
    Round,
}

/// The full stroke description of a polyline: width (in typographic
/// points, scaled by the canvas resolution), color, end caps, joins and
/// an optional dash pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub width: f32,
    pub color: Color,
    pub cap: LineCap,
    pub join: LineJoin,
    pub dash_pattern: Vec<f32>,
}

impl LineStyle {
    pub fn new(
        width: f32,
        color: Color,
        cap: LineCap,
        join: LineJoin,
        dash_pattern: Vec<f32>,
    ) -> LineStyle {
        LineStyle {
            width,
            color,
            cap,
            join,
            dash_pattern,
        }
    }

    /// A plain stroke: butt caps, bevel joins, no dashes.
    pub fn solid(width: f32, color: Color) -> LineStyle {
        LineStyle::new(width, color, LineCap::Butt, LineJoin::Bevel, Vec::new())
    }

    pub fn with_cap(mut self, cap: LineCap) -> LineStyle {
        self.cap = cap;
        self
    }
}

/// The fixed style sheet: vegetation and land use at the bottom, then
/// water, buildings, rail and roads, the whole thing split by layer.
pub fn map_style() -> Result<Painter> {
    let dark_gray = Color::gray(0.2)?;
    let light_gray = Color::gray(0.9)?;
    let dark_green = Color::rgb(0.75, 0.85, 0.7)?;
    let light_green = Color::rgb(0.85, 0.9, 0.85)?;
    let dark_blue = Color::rgb(0.45, 0.7, 0.8)?;
    let orange = Color::rgb(1.0, 0.75, 0.2)?;
    let light_yellow = Color::rgb(1.0, 1.0, 0.5)?;
    let light_red = Color::rgb(0.95, 0.7, 0.6)?;

    let ground = polygon(light_gray)
        .when(tagged_any("landuse", &["residential", "industrial", "retail"]))
        .above(
            &polygon(dark_green)
                .when(tagged_any("landuse", &["forest"]))
                .above(&polygon(dark_green).when(tagged_any("natural", &["wood", "scrub"])))
                .above(&polygon(light_green).when(tagged_any(
                    "landuse",
                    &["grass", "meadow", "cemetery", "orchard", "vineyard"],
                )))
                .above(&polygon(light_green).when(tagged_any(
                    "leisure",
                    &["park", "garden", "pitch", "golf_course"],
                ))),
        );

    let water = line(LineStyle::solid(1.5, dark_blue))
        .when(tagged_any("waterway", &["river", "stream", "canal"]))
        .above(&polygon(dark_blue).when(tagged("waterway")))
        .above(&polygon(dark_blue).when(tagged_any("natural", &["water", "bay"])))
        .above(&polygon(dark_blue).when(tagged_any("landuse", &["reservoir", "basin"])));

    let buildings = polygon(dark_gray).when(tagged("building"));

    let rail = line(LineStyle::new(
        0.7,
        Color::BLACK,
        LineCap::Butt,
        LineJoin::Round,
        Vec::new(),
    ))
    .when(tagged_any("railway", &["rail", "narrow_gauge"]));

    let footways = line(LineStyle::new(
        0.5,
        Color::BLACK,
        LineCap::Round,
        LineJoin::Round,
        vec![1.0, 2.0],
    ))
    .when(tagged_any("highway", &["footway", "path", "steps", "track"]));

    let roads = painter_for_roads(vec![
        RoadSpec {
            filter: tagged_any("highway", &["motorway", "trunk"]),
            interior_width: 2.0,
            interior_color: orange,
            casing_width: 0.5,
            casing_color: Color::BLACK,
        },
        RoadSpec {
            filter: tagged_any("highway", &["primary"]),
            interior_width: 1.7,
            interior_color: light_yellow,
            casing_width: 0.35,
            casing_color: dark_gray,
        },
        RoadSpec {
            filter: tagged_any("highway", &["secondary"]),
            interior_width: 1.7,
            interior_color: light_red,
            casing_width: 0.35,
            casing_color: dark_gray,
        },
        RoadSpec {
            filter: tagged_any("highway", &["tertiary"]),
            interior_width: 1.7,
            interior_color: Color::WHITE,
            casing_width: 0.35,
            casing_color: dark_gray,
        },
        RoadSpec {
            filter: tagged_any(
                "highway",
                &["residential", "living_street", "unclassified"],
            ),
            interior_width: 1.2,
            interior_color: Color::WHITE,
            casing_width: 0.15,
            casing_color: dark_gray,
        },
        RoadSpec {
            filter: tagged_any("highway", &["service", "pedestrian"]),
            interior_width: 0.5,
            interior_color: Color::WHITE,
            casing_width: 0.15,
            casing_color: dark_gray,
        },
    ]);

    Ok(roads
        .above(&footways)
        .above(&rail)
        .above(&buildings)
        .above(&water)
        .above(&ground)
        .layered())
}
