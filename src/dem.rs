use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use regex::Regex;

use crate::data::geometry::{Point, PointGeo, Vector3};
use crate::errors::Result;
use crate::projection::Projection;

/// Mean equatorial radius of the Earth, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// A terrain model able to report the surface normal at a geographic
/// point. The normal does not have to be normalized.
pub trait ElevationModel {
    fn normal_at(&self, point: &PointGeo) -> Result<Vector3>;
}

/// An elevation model backed by a memory-mapped SRTM `.hgt` tile. The
/// tile covers one degree of latitude and longitude; its south-west
/// corner is encoded in the file name (e.g. `N46E007.hgt`), and samples
/// are big-endian 16-bit integers, row-major from the north-west corner.
pub struct HgtElevationModel {
    mmap: Mmap,
    south_west: PointGeo,
    side: usize,
    delta: f64,
    cell_size: f64,
}

impl HgtElevationModel {
    pub fn open(path: &Path) -> Result<HgtElevationModel> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| format!("Invalid HGT path: {:?}", path))?;
        let pattern = Regex::new(r"^([NS])(\d{2})([EW])(\d{3})\.hgt$")?;
        let captures = pattern
            .captures(name)
            .ok_or_else(|| format!("Invalid HGT file name: {}", name))?;
        let mut latitude: f64 = captures[2].parse::<u32>()?.into();
        if &captures[1] == "S" {
            latitude = -latitude;
        }
        let mut longitude: f64 = captures[4].parse::<u32>()?.into();
        if &captures[3] == "W" {
            longitude = -longitude;
        }
        let south_west = PointGeo::new(longitude.to_radians(), latitude.to_radians())?;

        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() % 2 != 0 {
            return Err(format!("Truncated HGT file: {} bytes", mmap.len()).into());
        }
        let samples = mmap.len() / 2;
        let side = (samples as f64).sqrt() as usize;
        if side < 2 || side * side != samples {
            return Err(format!("HGT file does not hold a square grid: {} samples", samples).into());
        }
        let delta = 1f64.to_radians() / (side - 1) as f64;
        Ok(HgtElevationModel {
            mmap,
            south_west,
            side,
            delta,
            cell_size: delta * EARTH_RADIUS,
        })
    }

    fn sample(&self, i: usize, j: usize) -> f64 {
        let offset = 2 * (j * self.side + i);
        let bytes = [self.mmap[offset], self.mmap[offset + 1]];
        f64::from(i16::from_be_bytes(bytes))
    }
}

impl ElevationModel for HgtElevationModel {
    fn normal_at(&self, point: &PointGeo) -> Result<Vector3> {
        let i = ((point.longitude() - self.south_west.longitude()) / self.delta).floor();
        let j = (self.side - 1) as f64
            - ((point.latitude() - self.south_west.latitude()) / self.delta).ceil();
        if i < 0.0 || j < 0.0 || i + 1.0 > (self.side - 1) as f64 || j + 1.0 > (self.side - 1) as f64
        {
            return Err(format!(
                "Point ({}, {}) outside of HGT tile coverage.",
                point.longitude().to_degrees(),
                point.latitude().to_degrees()
            )
            .into());
        }
        let (i, j) = (i as usize, j as usize);
        let z00 = self.sample(i, j);
        let z10 = self.sample(i + 1, j);
        let z01 = self.sample(i, j + 1);
        let z11 = self.sample(i + 1, j + 1);
        let s = self.cell_size;
        Ok(Vector3::new(
            0.5 * s * (z01 - z11 + z00 - z10),
            0.5 * s * (z01 + z11 - z00 - z10),
            s * s,
        ))
    }
}

/// Computes a shaded relief image from an elevation model: Lambertian
/// shading of the terrain normals, softened by a Gaussian blur.
pub struct ReliefShader<'a> {
    projection: &'a dyn Projection,
    model: &'a dyn ElevationModel,
    light_direction: Vector3,
}

impl<'a> ReliefShader<'a> {
    pub fn new(
        projection: &'a dyn Projection,
        model: &'a dyn ElevationModel,
        light_direction: Vector3,
    ) -> ReliefShader<'a> {
        ReliefShader {
            projection,
            model,
            light_direction,
        }
    }

    /// Renders the relief of the plane rectangle spanned by
    /// `bottom_left` and `top_right` into a `width` x `height` raster
    /// of packed ARGB pixels, blurred with the given radius in pixels.
    ///
    /// The raster is computed with a margin of `ceil(radius)` pixels on
    /// every side and cropped afterwards, so the blur never has to read
    /// past the edge of the image.
    pub fn shaded_relief(
        &self,
        bottom_left: Point,
        top_right: Point,
        width: usize,
        height: usize,
        radius: f64,
    ) -> Result<Vec<u32>> {
        if radius < 0.0 {
            return Err(format!("Invalid blur radius: {}", radius).into());
        }
        if width == 0 || height == 0 {
            return Err(format!("Empty relief raster: {} x {}", width, height).into());
        }
        let pad = radius.ceil() as usize;
        let raw_width = width + 2 * pad;
        let raw_height = height + 2 * pad;
        let to_plane = Point::aligned_coordinate_change(
            Point::new(pad as f64, (height - 1 + pad) as f64),
            bottom_left,
            Point::new((width - 1 + pad) as f64, pad as f64),
            top_right,
        )?;

        let mut raw = self.raw_relief(&to_plane, raw_width, raw_height)?;
        if radius > 0.0 {
            let kernel = gaussian_kernel(radius);
            raw = blur_pass(&raw, raw_width, raw_height, &kernel, true);
            raw = blur_pass(&raw, raw_width, raw_height, &kernel, false);
        }

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b] = raw[(y + pad) * raw_width + x + pad];
                pixels.push(pack_argb(r, g, b));
            }
        }
        Ok(pixels)
    }

    fn raw_relief(
        &self,
        to_plane: &impl Fn(Point) -> Point,
        width: usize,
        height: usize,
    ) -> Result<Vec<[f64; 3]>> {
        let light_norm = self.light_direction.norm();
        let mut raw = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let plane = to_plane(Point::new(x as f64, y as f64));
                let geo = self.projection.inverse(&plane)?;
                let normal = self.model.normal_at(&geo)?;
                let cos = normal.dot(&self.light_direction) / (normal.norm() * light_norm);
                raw.push([0.5 * (cos + 1.0), 0.5 * (cos + 1.0), 0.5 * (0.7 * cos + 1.0)]);
            }
        }
        Ok(raw)
    }
}

/// The one-dimensional Gaussian kernel for the given blur radius:
/// `2 * ceil(radius) + 1` taps with a standard deviation of one third
/// of the radius, normalized to sum to one.
fn gaussian_kernel(radius: f64) -> Vec<f64> {
    let half = radius.ceil() as i64;
    let sigma = radius / 3.0;
    let mut kernel: Vec<f64> = (-half..=half)
        .map(|x| (-((x * x) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= total;
    }
    kernel
}

/// One separable blur pass. Taps falling outside the image are dropped
/// and the remaining weights renormalized.
fn blur_pass(
    source: &[[f64; 3]],
    width: usize,
    height: usize,
    kernel: &[f64],
    horizontal: bool,
) -> Vec<[f64; 3]> {
    let half = (kernel.len() / 2) as i64;
    let mut blurred = Vec::with_capacity(source.len());
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let mut sum = [0.0; 3];
            let mut weight_sum = 0.0;
            for (tap, weight) in kernel.iter().enumerate() {
                let offset = tap as i64 - half;
                let (tx, ty) = if horizontal { (x + offset, y) } else { (x, y + offset) };
                if tx < 0 || tx >= width as i64 || ty < 0 || ty >= height as i64 {
                    continue;
                }
                let pixel = source[(ty * width as i64 + tx) as usize];
                for channel in 0..3 {
                    sum[channel] += weight * pixel[channel];
                }
                weight_sum += weight;
            }
            for channel in &mut sum {
                *channel /= weight_sum;
            }
            blurred.push(sum);
        }
    }
    blurred
}

fn pack_argb(r: f64, g: f64, b: f64) -> u32 {
    let to_byte = |channel: f64| (channel.clamp(0.0, 1.0) * 255.0).round() as u32;
    0xff00_0000 | (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}
