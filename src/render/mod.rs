//! Компоновка растра
//!
//! Каждый слой рисуется на собственном прозрачном RGBA-буфере размера растра, все
//! слои используют одно и то же аффинное преобразование графа в пиксели. Слои
//! независимы и при фиче `parallel` рисуются параллельно, а затем накладываются на фон
//! в фиксированном порядке:
//!
//! `Terrain → Rivers → Coastlines → Borders → Roads → Features → Labels`
//!
//! Береговые линии и границы регионов рисуются изломанными рёбрами; заливка рельефа
//! повторяет те же изломы.

pub mod font;
pub mod labels;
pub mod noisy;
pub mod palette;
pub mod stamps;
pub mod strokes;
pub mod terrain;

use std::collections::BTreeMap;
use std::sync::Mutex;

use image::{ImageBuffer, RgbaImage, imageops};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::biome::BiomeMap;
use crate::elevation::ElevationField;
use crate::error::GenerationError;
use crate::features::{FeatureLayout, RoadNetwork};
use crate::mesh::{Graph, Point, SiteIndex};
use crate::region::{RegionMap, build_region_graph, greedy_coloring};
use crate::rivers::Hydrology;

pub use labels::{LabelKind, LabelPlacement};
pub use noisy::NoisyEdges;
pub use palette::{Palette, StylePalette, parse_hex};

/// Равномерное масштабирование пространства графа в пиксели с центрированием.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Transform {
    #[must_use]
    pub fn fit(graph_width: f64, graph_height: f64, width: u32, height: u32) -> Self {
        let scale = (f64::from(width) / graph_width).min(f64::from(height) / graph_height);
        Self {
            scale,
            offset_x: (f64::from(width) - graph_width * scale) * 0.5,
            offset_y: (f64::from(height) - graph_height * scale) * 0.5,
        }
    }

    #[must_use]
    pub fn to_pixel(&self, p: Point) -> (f32, f32) {
        (
            (p.x * self.scale + self.offset_x) as f32,
            (p.y * self.scale + self.offset_y) as f32,
        )
    }

    /// Точка графа под центром пикселя `(x, y)`.
    #[must_use]
    pub fn to_graph(&self, x: u32, y: u32) -> Point {
        Point::new(
            (f64::from(x) + 0.5 - self.offset_x) / self.scale,
            (f64::from(y) + 0.5 - self.offset_y) / self.scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Layer {
    Terrain,
    Rivers,
    Coastlines,
    Borders,
    Roads,
    Features,
    Labels,
}

impl Layer {
    /// Порядок наложения
    pub const ALL: [Layer; 7] = [
        Layer::Terrain,
        Layer::Rivers,
        Layer::Coastlines,
        Layer::Borders,
        Layer::Roads,
        Layer::Features,
        Layer::Labels,
    ];
}

/// Итоговый RGBA8-растр
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Raster {
    #[must_use]
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
        }
    }

    pub fn save_as_png(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let img: RgbaImage = ImageBuffer::from_raw(self.width, self.height, self.data.clone())
            .ok_or("Failed to create image buffer")?;
        img.save(path)?;
        Ok(())
    }
}

/// Всё, что нужно компоновщику
pub struct RenderInput<'a> {
    pub graph: &'a Graph,
    pub elevation: &'a ElevationField,
    pub hydrology: &'a Hydrology,
    pub biomes: &'a BiomeMap,
    pub regions: &'a RegionMap,
    pub features: &'a FeatureLayout,
    pub roads: &'a RoadNetwork,
    pub settlement_names: &'a BTreeMap<usize, String>,
    pub river_flow_threshold: f64,
    pub min_feature_spacing: f64,
    /// Сид изломов рёбер
    pub edge_seed: u64,
}

/// Общие для всех слоёв данные
pub struct Frame<'a> {
    pub input: &'a RenderInput<'a>,
    pub palette: &'a Palette,
    pub transform: Transform,
    pub noisy: &'a NoisyEdges,
    pub width: u32,
    pub height: u32,
}

impl Frame<'_> {
    #[must_use]
    pub fn blank(&self) -> RgbaImage {
        RgbaImage::new(self.width, self.height)
    }
}

pub struct Composite {
    pub raster: Raster,
    pub labels: Vec<LabelPlacement>,
}

fn render_layer(
    frame: &Frame<'_>,
    layer: Layer,
    sites: &SiteIndex,
    tints: &[Option<image::Rgba<u8>>],
) -> Result<(RgbaImage, Vec<LabelPlacement>), GenerationError> {
    Ok(match layer {
        Layer::Terrain => (terrain::render_terrain(frame, sites, tints)?, Vec::new()),
        Layer::Rivers => (strokes::render_rivers(frame), Vec::new()),
        Layer::Coastlines => (strokes::render_coastlines(frame), Vec::new()),
        Layer::Borders => (strokes::render_borders(frame), Vec::new()),
        Layer::Roads => (strokes::render_roads(frame), Vec::new()),
        Layer::Features => (stamps::render_features(frame), Vec::new()),
        Layer::Labels => labels::render_labels(frame),
    })
}

/// Рисует все слои и накладывает их на фон.
///
/// `progress` получает долю готовых слоёв (строго меньше 1); вызовы сериализованы,
/// доли монотонны.
///
/// # Ошибки
/// `GenerationFailure`, если буфер слоя не удалось собрать.
pub fn compose(
    input: &RenderInput<'_>,
    width: u32,
    height: u32,
    palette: &Palette,
    progress: &(dyn Fn(f64) + Sync),
) -> Result<Composite, GenerationError> {
    let graph = input.graph;
    let transform = Transform::fit(graph.width, graph.height, width, height);
    let mut bent = strokes::coast_edges(input);
    bent.extend(input.regions.boundary_edges(graph));
    let noisy = NoisyEdges::build(
        graph,
        bent,
        input.edge_seed,
        palette.noisy_edge_length / transform.scale,
    );
    let frame = Frame {
        input,
        palette,
        transform,
        noisy: &noisy,
        width,
        height,
    };
    let sites = SiteIndex::new(graph);

    // Оттенки регионов по жадной раскраске графа смежности
    let tints: Vec<Option<image::Rgba<u8>>> = if palette.region_tint_strength > 0.0 {
        let colors = greedy_coloring(&build_region_graph(graph, input.regions));
        input
            .regions
            .cell_region
            .iter()
            .map(|r| r.map(|r| palette.region_tint(colors[r])))
            .collect()
    } else {
        vec![None; graph.cells.len()]
    };

    let total = Layer::ALL.len() + 1;
    let done = Mutex::new(0usize);
    let render_one = |layer: Layer| {
        let result = render_layer(&frame, layer, &sites, &tints);
        if let Ok(mut count) = done.lock() {
            *count += 1;
            progress(*count as f64 / total as f64);
        }
        result
    };

    #[cfg(feature = "parallel")]
    let rendered: Vec<_> = Layer::ALL.par_iter().map(|&l| render_one(l)).collect();
    #[cfg(not(feature = "parallel"))]
    let rendered: Vec<_> = Layer::ALL.iter().map(|&l| render_one(l)).collect();

    let mut canvas = RgbaImage::from_pixel(width, height, palette.background);
    let mut labels = Vec::new();
    for result in rendered {
        let (image, placed) = result?;
        imageops::overlay(&mut canvas, &image, 0, 0);
        labels.extend(placed);
    }

    Ok(Composite {
        raster: Raster::from_image(canvas),
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_maps_corners_of_the_graph() {
        let t = Transform::fit(1000.0, 750.0, 800, 600);
        assert!((t.scale - 0.8).abs() < 1e-12);
        let (x, y) = t.to_pixel(Point::new(1000.0, 750.0));
        assert!((x - 800.0).abs() < 1e-3 && (y - 600.0).abs() < 1e-3);
        let p = t.to_graph(0, 0);
        assert!((p.x - 0.625).abs() < 1e-9 && (p.y - 0.625).abs() < 1e-9);
    }

    #[test]
    fn mismatched_aspect_is_centered() {
        let t = Transform::fit(100.0, 100.0, 200, 100);
        assert!((t.scale - 1.0).abs() < 1e-12);
        assert!((t.offset_x - 50.0).abs() < 1e-12);
        assert!(t.offset_y.abs() < 1e-12);
    }

    #[test]
    fn layer_order_is_fixed() {
        assert_eq!(Layer::ALL[0], Layer::Terrain);
        assert_eq!(Layer::ALL[4], Layer::Roads);
        assert_eq!(Layer::ALL[6], Layer::Labels);
    }

    #[test]
    fn raster_round_trips_through_png() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, image::Rgba([10, 20, 30, 255]));
        let raster = Raster::from_image(img);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.png");
        raster.save_as_png(path.to_str().unwrap()).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.into_raw(), raster.data);
    }
}
