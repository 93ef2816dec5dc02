//! Поле высот на углах и ячейках графа
//!
//! Высота угла: фрактальный шум (`fastnoise-lite`, OpenSimplex2 + FBm), смещённый формой
//! суши и нормализованный в `[0, 1]`. Высота ячейки: среднее её углов, взвешенное по
//! площади. Затем ячейки делятся на сушу и воду по порогу (равенство порогу: суша),
//! а вода, связанная с краем карты, становится океаном; остальная вода: озёра.

use std::collections::VecDeque;

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::LandShape;
use crate::error::GenerationError;
use crate::mesh::{Graph, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterType {
    Ocean,
    Lake,
    Land,
}

impl WaterType {
    #[must_use]
    pub fn is_water(self) -> bool {
        !matches!(self, WaterType::Land)
    }
}

/// Параметры шума и формы суши
#[derive(Debug, Clone, Copy)]
pub struct ElevationSettings {
    pub noise_seed: i32,
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub frequency: f32,
    pub land_shape: LandShape,
    pub shape_bias: f64,
    pub ocean_threshold: f64,
}

/// Высоты и классификация воды
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationField {
    pub corner_elevation: Vec<f64>,
    pub cell_elevation: Vec<f64>,
    pub cell_water: Vec<WaterType>,
    /// Угол касается хотя бы одной водной ячейки
    pub corner_water: Vec<bool>,
    /// Угол касается океанской ячейки
    pub corner_ocean: Vec<bool>,
    /// Угол касается и суши, и воды
    pub corner_coast: Vec<bool>,
}

impl ElevationField {
    #[must_use]
    pub fn is_land(&self, cell: usize) -> bool {
        self.cell_water[cell] == WaterType::Land
    }
}

fn build_noise(settings: &ElevationSettings) -> FastNoiseLite {
    let mut noise = FastNoiseLite::new();
    noise.set_seed(Some(settings.noise_seed));
    noise.set_noise_type(Some(NoiseType::OpenSimplex2));
    noise.set_fractal_type(Some(FractalType::FBm));
    noise.set_fractal_octaves(Some(settings.octaves as i32));
    noise.set_fractal_gain(Some(settings.persistence));
    noise.set_fractal_lacunarity(Some(settings.lacunarity));
    noise.set_frequency(Some(settings.frequency));
    noise
}

/// Сырая (ненормализованная) высота в точке.
fn sample_raw(noise: &FastNoiseLite, settings: &ElevationSettings, graph: &Graph, p: Point) -> f64 {
    let scale = graph.width.max(graph.height);
    let n = f64::from(noise.get_noise_2d((p.x / scale) as f32, (p.y / scale) as f32));
    let value = (n + 1.0) * 0.5;

    let half_w = graph.width * 0.5;
    let half_h = graph.height * 0.5;
    let dx = (p.x - half_w) / half_w;
    let dy = (p.y - half_h) / half_h;
    let d = (dx * dx + dy * dy).sqrt();

    value - settings.shape_bias * settings.land_shape.falloff(d)
}

/// Строит поле высот для всего графа.
///
/// # Ошибки
/// `GenerationFailure`, если шум вернул не-конечное значение.
pub fn generate_elevation(
    graph: &Graph,
    settings: &ElevationSettings,
) -> Result<ElevationField, GenerationError> {
    let noise = build_noise(settings);
    let positions: Vec<Point> = graph.corners.iter().map(|c| c.position).collect();

    // === 1. Шум на углах ===
    #[cfg(feature = "parallel")]
    let mut corner_elevation: Vec<f64> = positions
        .par_iter()
        .map(|&p| sample_raw(&noise, settings, graph, p))
        .collect();
    #[cfg(not(feature = "parallel"))]
    let mut corner_elevation: Vec<f64> = positions
        .iter()
        .map(|&p| sample_raw(&noise, settings, graph, p))
        .collect();

    if let Some(bad) = corner_elevation.iter().position(|v| !v.is_finite()) {
        return Err(GenerationError::failure(
            "elevation",
            format!("noise produced a non-finite value at corner {bad}"),
        ));
    }

    // === 2. Нормализация ===
    normalize(&mut corner_elevation);

    // === 3. Высоты ячеек ===
    let cell_elevation = cell_elevations(graph, &corner_elevation);

    // === 4. Суша, океан, озёра ===
    let cell_water = classify_water(graph, &cell_elevation, settings.ocean_threshold);
    let (corner_water, corner_ocean, corner_coast) = corner_flags(graph, &cell_water);

    let land = cell_water.iter().filter(|w| !w.is_water()).count();
    log::debug!(
        "суша: {land} из {} ячеек ({:.1}%)",
        graph.cells.len(),
        100.0 * land as f64 / graph.cells.len().max(1) as f64
    );

    Ok(ElevationField {
        corner_elevation,
        cell_elevation,
        cell_water,
        corner_water,
        corner_ocean,
        corner_coast,
    })
}

/// Линейно растягивает значения в `[0, 1]`.
pub fn normalize(values: &mut [f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > min {
        for v in values.iter_mut() {
            *v = (*v - min) / (max - min);
        }
    } else {
        values.iter_mut().for_each(|v| *v = 0.5);
    }
}

/// Высота ячейки: среднее углов с весом площади двух треугольников веера из центроида,
/// которым принадлежит угол.
#[must_use]
pub fn cell_elevations(graph: &Graph, corner_elevation: &[f64]) -> Vec<f64> {
    graph
        .cells
        .iter()
        .map(|cell| {
            let n = cell.corners.len();
            let c = cell.centroid;
            let tri_area = |i: usize| {
                let a = graph.corners[cell.corners[i]].position;
                let b = graph.corners[cell.corners[(i + 1) % n]].position;
                crate::mesh::cross(c, a, b).abs() * 0.5
            };
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            for i in 0..n {
                let w = 0.5 * (tri_area((i + n - 1) % n) + tri_area(i));
                sum += w * corner_elevation[cell.corners[i]];
                weight_sum += w;
            }
            if weight_sum > 0.0 {
                sum / weight_sum
            } else {
                cell.corners.iter().map(|&k| corner_elevation[k]).sum::<f64>() / n.max(1) as f64
            }
        })
        .collect()
}

/// Классифицирует ячейки: ниже порога: вода, граничные ячейки: всегда вода.
///
/// Заливка от краёв карты по водным ячейкам помечает океан; недостижимая вода: озёра.
#[must_use]
pub fn classify_water(graph: &Graph, cell_elevation: &[f64], threshold: f64) -> Vec<WaterType> {
    let total = graph.cells.len();
    let is_water: Vec<bool> = graph
        .cells
        .iter()
        .map(|c| c.border || cell_elevation[c.id] < threshold)
        .collect();

    let mut water_type = vec![WaterType::Land; total];
    let mut queue = VecDeque::new();

    // Все граничные ячейки: источники океана
    for cell in graph.cells.iter().filter(|c| c.border) {
        water_type[cell.id] = WaterType::Ocean;
        queue.push_back(cell.id);
    }

    while let Some(id) = queue.pop_front() {
        for &n in &graph.cells[id].neighbors {
            if is_water[n] && water_type[n] == WaterType::Land {
                water_type[n] = WaterType::Ocean;
                queue.push_back(n);
            }
        }
    }

    // Всё остальное под порогом: озёра
    for i in 0..total {
        if is_water[i] && water_type[i] == WaterType::Land {
            water_type[i] = WaterType::Lake;
        }
    }
    water_type
}

/// Флаги углов `(water, ocean, coast)` по классификации ячеек.
#[must_use]
pub fn corner_flags(graph: &Graph, cell_water: &[WaterType]) -> (Vec<bool>, Vec<bool>, Vec<bool>) {
    let mut water = vec![false; graph.corners.len()];
    let mut ocean = vec![false; graph.corners.len()];
    let mut coast = vec![false; graph.corners.len()];
    for corner in &graph.corners {
        let any_water = corner.touches.iter().any(|&c| cell_water[c].is_water());
        let any_land = corner.touches.iter().any(|&c| !cell_water[c].is_water());
        water[corner.id] = any_water;
        ocean[corner.id] = corner.touches.iter().any(|&c| cell_water[c] == WaterType::Ocean);
        coast[corner.id] = any_water && any_land;
    }
    (water, ocean, coast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshSettings, generate_mesh};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn graph() -> Graph {
        let settings = MeshSettings {
            point_count: 200,
            relaxation_iterations: 1,
            jittered_grid: false,
            width: 500.0,
            height: 400.0,
        };
        generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(21)).unwrap()
    }

    fn settings() -> ElevationSettings {
        ElevationSettings {
            noise_seed: 77,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            frequency: 3.0,
            land_shape: LandShape::Continent,
            shape_bias: 0.8,
            ocean_threshold: 0.45,
        }
    }

    #[test]
    fn elevations_are_normalized_and_deterministic() {
        let g = graph();
        let a = generate_elevation(&g, &settings()).unwrap();
        let b = generate_elevation(&g, &settings()).unwrap();
        assert_eq!(a, b);
        assert!(a.corner_elevation.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(a.cell_elevation.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(a.cell_elevation.len(), g.cells.len());
    }

    #[test]
    fn border_cells_are_ocean() {
        let g = graph();
        let field = generate_elevation(&g, &settings()).unwrap();
        for cell in g.cells.iter().filter(|c| c.border) {
            assert_eq!(field.cell_water[cell.id], WaterType::Ocean);
        }
    }

    #[test]
    fn threshold_tie_resolves_to_land() {
        let g = graph();
        let interior = g
            .cells
            .iter()
            .find(|c| !c.border && c.neighbors.iter().all(|&n| !g.cells[n].border))
            .unwrap()
            .id;
        let mut elevation = vec![0.9; g.cells.len()];
        elevation[interior] = 0.45;
        let water = classify_water(&g, &elevation, 0.45);
        assert_eq!(water[interior], WaterType::Land);

        elevation[interior] = 0.449_999;
        let water = classify_water(&g, &elevation, 0.45);
        assert_eq!(water[interior], WaterType::Lake);
    }

    #[test]
    fn water_touching_the_ocean_is_ocean() {
        let g = graph();
        let border_neighbor = g
            .cells
            .iter()
            .find(|c| !c.border && c.neighbors.iter().any(|&n| g.cells[n].border))
            .unwrap()
            .id;
        let mut elevation = vec![0.9; g.cells.len()];
        elevation[border_neighbor] = 0.1;
        let water = classify_water(&g, &elevation, 0.45);
        assert_eq!(water[border_neighbor], WaterType::Ocean);
    }

    #[test]
    fn cell_average_of_constant_field_is_constant() {
        let g = graph();
        let cells = cell_elevations(&g, &vec![0.3; g.corners.len()]);
        assert!(cells.iter().all(|v| (v - 0.3).abs() < 1e-12));
    }
}
