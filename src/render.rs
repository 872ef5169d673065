//! PNG rendering of generated maps
//!
//! Cells are drawn as pointy-top hexagons placed with [`HexLayout::center`],
//! so the picture shares the neighbor model's offset rule. A tile's feature
//! and resource names are printed inside its hex, one per line.
//!
//! [`HexLayout::center`]: crate::grid::HexLayout::center

use std::fs;
use std::io::Cursor;
use std::path::Path;

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::{ImageBuffer, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_polygon_mut, draw_polygon_mut, draw_text_mut, text_size};
use imageproc::point::Point;
use thiserror::Error;

use crate::grid::{HexMap, TilePos};
use crate::terrain::{TerrainKind, Tile};

static LABEL_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

const OUTLINE: Rgb<u8> = Rgb([20, 20, 20]);
const BACKGROUND: Rgb<u8> = Rgb([250, 250, 250]);
const LABEL: Rgb<u8> = Rgb([10, 10, 10]);
const MAX_PIXELS: u64 = 64_000_000;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("hex radius must be at least 4 pixels, got {0}")]
    RadiusTooSmall(u32),
    #[error("{width}x{height} image exceeds the pixel limit")]
    ImageTooLarge { width: u32, height: u32 },
    #[error("unable to load label font: {0}")]
    Font(#[from] InvalidFont),
    #[error("unable to write image: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to encode image: {0}")]
    Image(#[from] image::ImageError),
}

/// Consumer of a generated map.
pub trait Renderer {
    fn render(&self, map: &HexMap, path: &Path) -> Result<(), RenderError>;
}

pub fn terrain_color(terrain: TerrainKind) -> Rgb<u8> {
    match terrain {
        TerrainKind::Grass => Rgb([34, 139, 34]),
        TerrainKind::Plains => Rgb([238, 221, 90]),
        TerrainKind::Desert => Rgb([240, 230, 140]),
        TerrainKind::Snow => Rgb([255, 255, 255]),
        TerrainKind::Tundra => Rgb([152, 251, 152]),
        TerrainKind::Water => Rgb([30, 80, 200]),
        TerrainKind::Mountain => Rgb([128, 118, 110]),
        TerrainKind::Wetland => Rgb([85, 107, 47]),
    }
}

/// Lines printed inside a tile's hex: the feature, then the resource.
pub fn tile_labels(tile: &Tile) -> Vec<&str> {
    [tile.terrain_feature.as_deref(), tile.resource.as_deref()]
        .into_iter()
        .flatten()
        .collect()
}

#[derive(Debug, Clone, Copy)]
pub struct PngRenderer {
    radius: u32,
    margin: u32,
}

impl Default for PngRenderer {
    fn default() -> Self {
        Self::new(18)
    }
}

impl PngRenderer {
    pub fn new(radius: u32) -> Self {
        Self {
            radius,
            margin: radius / 2,
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    fn hex_width(&self) -> f64 {
        3f64.sqrt() * self.radius as f64
    }

    fn label_scale(&self) -> PxScale {
        PxScale::from((self.radius as f32 * 0.42).max(6.0))
    }

    pub fn image_size(&self, map: &HexMap) -> (u32, u32) {
        let radius = self.radius as f64;
        let width = (map.cols() as f64 + 0.5) * self.hex_width() + 2.0 * self.margin as f64;
        let height = (map.rows() as f64 - 1.0) * 1.5 * radius
            + 2.0 * radius
            + 2.0 * self.margin as f64;
        (width.ceil() as u32, height.ceil() as u32)
    }

    fn pixel_center(&self, map: &HexMap, pos: TilePos) -> (f64, f64) {
        let (x, y) = map.layout().center(pos);
        let width = self.hex_width();
        let margin = self.margin as f64;
        (
            margin + width / 2.0 + x * width,
            margin + self.radius as f64 + y * width,
        )
    }

    /// Corners of a pointy-top hex, clockwise from the upper right.
    fn corners(&self, cx: f64, cy: f64) -> [(f64, f64); 6] {
        let radius = self.radius as f64;
        std::array::from_fn(|i| {
            let angle = (60.0 * i as f64 - 30.0).to_radians();
            (cx + radius * angle.cos(), cy + radius * angle.sin())
        })
    }

    pub fn draw(&self, map: &HexMap) -> Result<RgbImage, RenderError> {
        if self.radius < 4 {
            return Err(RenderError::RadiusTooSmall(self.radius));
        }
        let (width, height) = self.image_size(map);
        if width as u64 * height as u64 > MAX_PIXELS {
            return Err(RenderError::ImageTooLarge { width, height });
        }

        let font = FontRef::try_from_slice(LABEL_FONT)?;
        let scale = self.label_scale();
        let mut img: RgbImage = ImageBuffer::from_pixel(width, height, BACKGROUND);

        for (pos, tile) in map.iter() {
            let (cx, cy) = self.pixel_center(map, pos);
            let corners = self.corners(cx, cy);

            let fill: Vec<Point<i32>> = corners
                .iter()
                .map(|&(x, y)| Point::new(x.round() as i32, y.round() as i32))
                .collect();
            draw_polygon_mut(&mut img, &fill, terrain_color(tile.terrain_type));

            let outline: Vec<Point<f32>> = corners
                .iter()
                .map(|&(x, y)| Point::new(x as f32, y as f32))
                .collect();
            draw_hollow_polygon_mut(&mut img, &outline, OUTLINE);
        }

        // labels go on last so neighboring fills never cover overflowing text
        for (pos, tile) in map.iter() {
            let lines = tile_labels(tile);
            if lines.is_empty() {
                continue;
            }
            let (cx, cy) = self.pixel_center(map, pos);
            let line_height = scale.y.ceil() as i32;
            let mut y = cy.round() as i32 - line_height * lines.len() as i32 / 2;
            for line in lines {
                let (text_width, _) = text_size(scale, &font, line);
                let x = cx.round() as i32 - text_width as i32 / 2;
                draw_text_mut(&mut img, LABEL, x, y, scale, &font, line);
                y += line_height;
            }
        }

        Ok(img)
    }

    /// Encode the map as PNG bytes without touching the filesystem.
    pub fn encode_png(&self, map: &HexMap) -> Result<Vec<u8>, RenderError> {
        let img = self.draw(map)?;
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }
}

impl Renderer for PngRenderer {
    fn render(&self, map: &HexMap, path: &Path) -> Result<(), RenderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let img = self.draw(map)?;
        img.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}
