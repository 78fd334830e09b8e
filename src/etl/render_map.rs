use std::fs::{self, File};
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};

use log::info;

use crate::data::geometry::{Point, PointGeo, Vector3};
use crate::data::Map;
use crate::dem::{HgtElevationModel, ReliefShader, EARTH_RADIUS};
use crate::errors::Result;
use crate::etl::{vector_map, Etl};
use crate::paint::canvas::RaqoteCanvas;
use crate::paint::style::{self, Color};
use crate::projection::Projection;
use crate::UserConfig;

pub const ETL_NAME: &str = "render_map";
pub const OUTPUT_FILE_NAME: &str = "map.png";

const METERS_PER_INCH: f64 = 0.0254;
const MAP_SCALE: f64 = 25_000.0;
/// Blur radius of the relief layer, in meters on the printed map.
const BLUR_RADIUS_METERS: f64 = 0.0017;

/// Final pipeline stage: rasterizes the vector map, shades the terrain
/// relief and writes the composite of the two as a PNG.
pub struct RenderMapEtl<'a> {
    config: &'a UserConfig,
    projection: &'a dyn Projection,
}

pub struct RenderedImage {
    width: usize,
    height: usize,
    rgb: Vec<u8>,
}

impl<'a> RenderMapEtl<'a> {
    pub fn new(config: &'a UserConfig, projection: &'a dyn Projection) -> RenderMapEtl<'a> {
        RenderMapEtl { config, projection }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }
}

/// Computes the output size in pixels: the height follows from the
/// latitude span at a 1:25000 print scale, the width from the aspect
/// ratio of the projected rectangle.
fn image_size(
    bottom_left: Point,
    top_right: Point,
    delta_latitude: f64,
    dpi: f64,
) -> Result<(usize, usize)> {
    let pixels_per_meter = dpi / METERS_PER_INCH;
    let height = (pixels_per_meter / MAP_SCALE * delta_latitude * EARTH_RADIUS).round();
    let width = (height * (top_right.x - bottom_left.x) / (top_right.y - bottom_left.y)).round();
    if !height.is_finite() || !width.is_finite() || height < 1.0 || width < 1.0 {
        return Err(format!("Degenerate output image size: {} x {}", width, height).into());
    }
    Ok((width as usize, height as usize))
}

/// Multiplies the map raster with the relief raster channel by channel,
/// producing packed RGB bytes.
fn blend(map_pixels: &[u32], relief_pixels: &[u32]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(3 * map_pixels.len());
    for (map_pixel, relief_pixel) in map_pixels.iter().zip(relief_pixels) {
        for shift in [16, 8, 0] {
            let map_channel = (map_pixel >> shift) & 0xff;
            let relief_channel = (relief_pixel >> shift) & 0xff;
            rgb.push((map_channel * relief_channel / 255) as u8);
        }
    }
    rgb
}

impl Etl for RenderMapEtl<'_> {
    type Input = Map;
    type Output = RenderedImage;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).exists())
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        fs::remove_file(Self::output_path(dir))?;
        Ok(())
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let mut input_file = File::open(dir.join(vector_map::OUTPUT_FILE_NAME))?;
        let mut buf = Vec::new();
        input_file.read_to_end(&mut buf)?;
        let map: Map = unsafe { rkyv::from_bytes_unchecked(&buf).map_err(|err| err.to_string())? };
        Ok(map)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let bottom_left_geo = PointGeo::new(
            self.config.bottom_left_lon.to_radians(),
            self.config.bottom_left_lat.to_radians(),
        )?;
        let top_right_geo = PointGeo::new(
            self.config.top_right_lon.to_radians(),
            self.config.top_right_lat.to_radians(),
        )?;
        let bottom_left = self.projection.project(&bottom_left_geo);
        let top_right = self.projection.project(&top_right_geo);
        let delta_latitude = top_right_geo.latitude() - bottom_left_geo.latitude();
        let (width, height) = image_size(bottom_left, top_right, delta_latitude, self.config.dpi)?;
        info!(etl_name = ETL_NAME, width = width, height = height; "Rendering image");

        let mut canvas = RaqoteCanvas::new(
            bottom_left,
            top_right,
            width as i32,
            height as i32,
            self.config.dpi,
            Color::WHITE,
        )?;
        style::map_style()?.draw_map(&input, &mut canvas);

        let model = HgtElevationModel::open(Path::new(&self.config.hgt_path))?;
        let shader = ReliefShader::new(self.projection, &model, Vector3::new(-1.0, 1.0, 1.0));
        let blur_radius = BLUR_RADIUS_METERS * self.config.dpi / METERS_PER_INCH;
        let relief = shader.shaded_relief(bottom_left, top_right, width, height, blur_radius)?;

        Ok(RenderedImage {
            width,
            height,
            rgb: blend(canvas.data(), &relief),
        })
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let file = File::create(Self::output_path(dir))?;
        let mut encoder = png::Encoder::new(
            BufWriter::new(file),
            output.width as u32,
            output.height as u32,
        );
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&output.rgb)?;
        Ok(())
    }
}
