use crate::data::geometry::{Point, PointGeo};
use crate::errors::Result;

/// A map projection: plane and geographic coordinates are exact inverses
/// of each other up to floating-point tolerance.
pub trait Projection {
    fn project(&self, point: &PointGeo) -> Point;
    fn inverse(&self, point: &Point) -> Result<PointGeo>;
}

/// The swisstopo CH1903 approximation formulas. Accurate to about a meter
/// inside Switzerland, which is plenty for rendering.
pub struct Ch1903Projection;

impl Projection for Ch1903Projection {
    fn project(&self, point: &PointGeo) -> Point {
        let lambda = (point.longitude().to_degrees() * 3600.0 - 26_782.5) / 10_000.0;
        let phi = (point.latitude().to_degrees() * 3600.0 - 169_028.66) / 10_000.0;
        let x = 600_072.37
            + 211_455.93 * lambda
            - 10_938.51 * lambda * phi
            - 0.36 * lambda * phi.powi(2)
            - 44.54 * lambda.powi(3);
        let y = 200_147.07
            + 308_807.95 * phi
            + 3_745.25 * lambda.powi(2)
            + 76.63 * phi.powi(2)
            - 194.56 * lambda.powi(2) * phi
            + 119.79 * phi.powi(3);
        Point::new(x, y)
    }

    fn inverse(&self, point: &Point) -> Result<PointGeo> {
        let x = (point.x - 600_000.0) / 1_000_000.0;
        let y = (point.y - 200_000.0) / 1_000_000.0;
        let lambda = 2.677_909_4
            + 4.728_982 * x
            + 0.791_484 * x * y
            + 0.130_6 * x * y.powi(2)
            - 0.043_6 * x.powi(3);
        let phi = 16.902_389_2
            + 3.238_272 * y
            - 0.270_978 * x.powi(2)
            - 0.002_528 * y.powi(2)
            - 0.044_7 * x.powi(2) * y
            - 0.014_0 * y.powi(3);
        PointGeo::new(
            (lambda * 100.0 / 36.0).to_radians(),
            (phi * 100.0 / 36.0).to_radians(),
        )
    }
}

/// The identity projection: plane coordinates are longitude/latitude in
/// radians. Mostly useful for tests and non-Swiss extracts.
pub struct EquirectangularProjection;

impl Projection for EquirectangularProjection {
    fn project(&self, point: &PointGeo) -> Point {
        Point::new(point.longitude(), point.latitude())
    }

    fn inverse(&self, point: &Point) -> Result<PointGeo> {
        PointGeo::new(point.x, point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equirectangular_round_trips_exactly() {
        let projection = EquirectangularProjection;
        let geo = PointGeo::new(0.12, 0.81).unwrap();
        let back = projection.inverse(&projection.project(&geo)).unwrap();
        assert_eq!(back, geo);
    }

    #[test]
    fn ch1903_round_trips_within_tolerance() {
        let projection = Ch1903Projection;
        // Lausanne, roughly.
        let geo = PointGeo::new(6.63_f64.to_radians(), 46.52_f64.to_radians()).unwrap();
        let back = projection.inverse(&projection.project(&geo)).unwrap();
        assert!((back.longitude() - geo.longitude()).abs() < 1e-4);
        assert!((back.latitude() - geo.latitude()).abs() < 1e-4);
    }

    #[test]
    fn ch1903_hits_the_bern_reference_frame() {
        let projection = Ch1903Projection;
        // The projection origin is close to the old Bern observatory.
        let bern = PointGeo::new(7.439_583_f64.to_radians(), 46.951_083_f64.to_radians()).unwrap();
        let plane = projection.project(&bern);
        assert!((plane.x - 600_000.0).abs() < 500.0);
        assert!((plane.y - 200_000.0).abs() < 500.0);
    }
}
