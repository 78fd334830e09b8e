use std::f64::consts::PI;

use crate::errors::Result;

/// A point in projected plane coordinates (meters, not degrees).
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    /// Builds the affine change of coordinates mapping `from_a` to `to_a`
    /// and `from_b` to `to_b`. The two source anchors must not share a
    /// horizontal or vertical coordinate.
    pub fn aligned_coordinate_change(
        from_a: Point,
        to_a: Point,
        from_b: Point,
        to_b: Point,
    ) -> Result<impl Fn(Point) -> Point> {
        if from_a.x == from_b.x || from_a.y == from_b.y {
            return Err("Aligned coordinate change needs anchors on a proper diagonal.".into());
        }
        let alpha_x = (to_b.x - to_a.x) / (from_b.x - from_a.x);
        let alpha_y = (to_b.y - to_a.y) / (from_b.y - from_a.y);
        let beta_x = to_a.x - from_a.x * alpha_x;
        let beta_y = to_a.y - from_a.y * alpha_y;
        Ok(move |point: Point| Point::new(alpha_x * point.x + beta_x, alpha_y * point.y + beta_y))
    }
}

/// A point in spherical geographic coordinates, in radians.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PointGeo {
    longitude: f64,
    latitude: f64,
}

impl PointGeo {
    /// Longitude must lie in [-π, π] and latitude in [-π/2, π/2].
    pub fn new(longitude: f64, latitude: f64) -> Result<PointGeo> {
        if longitude.abs() > PI || latitude.abs() > PI / 2.0 {
            return Err(format!(
                "Geographic point out of bounds: longitude {}, latitude {}.",
                longitude, latitude
            )
            .into());
        }
        Ok(PointGeo {
            longitude,
            latitude,
        })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }
}

/// A vector in R3, used for surface normals and the light direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3 { x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
}

/// An ordered, non-empty sequence of plane points. The closed variant
/// implicitly joins the last point back to the first and gains the
/// area and containment operations.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub enum PolyLine {
    Open(Vec<Point>),
    Closed(Vec<Point>),
}

impl PolyLine {
    pub fn open(points: Vec<Point>) -> Result<PolyLine> {
        if points.is_empty() {
            return Err("A polyline needs at least one point.".into());
        }
        Ok(PolyLine::Open(points))
    }

    pub fn closed(points: Vec<Point>) -> Result<PolyLine> {
        if points.is_empty() {
            return Err("A polyline needs at least one point.".into());
        }
        Ok(PolyLine::Closed(points))
    }

    pub fn points(&self) -> &[Point] {
        match self {
            PolyLine::Open(points) | PolyLine::Closed(points) => points,
        }
    }

    pub fn first_point(&self) -> Point {
        self.points()[0]
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PolyLine::Closed(_))
    }

    /// Absolute shoelace area. Only closed polylines enclose an area.
    pub fn area(&self) -> Option<f64> {
        match self {
            PolyLine::Open(_) => None,
            PolyLine::Closed(points) => Some(ring_area(points)),
        }
    }

    /// Point-in-polygon test by winding number. An open polyline contains
    /// no point.
    pub fn contains_point(&self, point: Point) -> bool {
        match self {
            PolyLine::Open(_) => false,
            PolyLine::Closed(points) => ring_contains(points, point),
        }
    }
}

pub(crate) fn ring_area(points: &[Point]) -> f64 {
    let mut doubled = 0.0;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        doubled += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    (doubled / 2.0).abs()
}

pub(crate) fn ring_contains(points: &[Point], p: Point) -> bool {
    let mut winding = 0i32;
    for i in 0..points.len() {
        let j = (i + 1) % points.len();
        let (a, b) = (points[i], points[j]);
        let cross_left = (a.x - p.x) * (b.y - p.y);
        let cross_right = (b.x - p.x) * (a.y - p.y);
        if a.y <= p.y {
            if b.y > p.y && cross_left > cross_right {
                winding += 1;
            }
        } else if b.y <= p.y && cross_left <= cross_right {
            winding -= 1;
        }
    }
    winding != 0
}

/// A filled area: one closed shell plus zero or more closed holes. Holes
/// are not checked for mutual disjointness.
#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone, PartialEq)]
pub struct Polygon {
    shell: PolyLine,
    holes: Vec<PolyLine>,
}

impl Polygon {
    pub fn new(shell: PolyLine, holes: Vec<PolyLine>) -> Result<Polygon> {
        if !shell.is_closed() || holes.iter().any(|hole| !hole.is_closed()) {
            return Err("Polygon shell and holes must be closed polylines.".into());
        }
        Ok(Polygon { shell, holes })
    }

    pub fn with_shell(shell: PolyLine) -> Result<Polygon> {
        Polygon::new(shell, Vec::new())
    }

    pub fn shell(&self) -> &PolyLine {
        &self.shell
    }

    pub fn holes(&self) -> &[PolyLine] {
        &self.holes
    }

    /// True when the point is inside the shell and outside every hole.
    pub fn contains_point(&self, point: Point) -> bool {
        self.shell.contains_point(point)
            && !self.holes.iter().any(|hole| hole.contains_point(point))
    }
}
