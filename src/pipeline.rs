//! Конвейер генерации
//!
//! Стадии выполняются строго по порядку; граф из первой стадии дальше только читается.
//! Отмена проверяется на границах стадий и после последней, прогресс сообщается в
//! начале (0.0) и в конце (1.0) каждой стадии, компоновщик добавляет промежуточные доли.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::biome::{BiomeMap, assign_biomes};
use crate::climate::cell_temperatures;
use crate::config::GenerationParams;
use crate::elevation::{ElevationField, ElevationSettings, generate_elevation};
use crate::error::GenerationError;
use crate::features::{
    FeatureKind, FeatureLayout, PlacementContext, PlacementSettings, RoadNetwork, RoadSettings,
    build_roads, place_features,
};
use crate::mesh::{Graph, MeshSettings, generate_mesh};
use crate::naming::{Toponyms, name_places};
use crate::region::{RegionMap, build_regions};
use crate::render::{LabelPlacement, Raster, RenderInput, compose};
use crate::rivers::{Hydrology, HydrologySettings, solve_hydrology};
use crate::rng::StageSeeds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Mesh,
    Elevation,
    Hydrology,
    Biomes,
    Regions,
    Features,
    Toponyms,
    Compositing,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Mesh,
        Stage::Elevation,
        Stage::Hydrology,
        Stage::Biomes,
        Stage::Regions,
        Stage::Features,
        Stage::Toponyms,
        Stage::Compositing,
    ];

    /// Номер стадии, начиная с 1
    #[must_use]
    pub fn index(self) -> usize {
        self as usize + 1
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Stage::Mesh => "mesh",
            Stage::Elevation => "elevation",
            Stage::Hydrology => "hydrology",
            Stage::Biomes => "biomes",
            Stage::Regions => "regions",
            Stage::Features => "features",
            Stage::Toponyms => "toponyms",
            Stage::Compositing => "compositing",
        }
    }

    /// Фаза генератора случайных чисел стадии
    fn phase(self) -> u64 {
        self.index() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageProgress {
    pub index: usize,
    pub total: usize,
    pub name: &'static str,
    pub fraction: f64,
    /// Стадия завершилась ошибкой; такое сообщение последнее (`fraction == 1.0`)
    pub failed: bool,
}

/// Получатель прогресса. Может вызываться из рабочих потоков.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: StageProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(StageProgress) + Send + Sync,
{
    fn report(&self, progress: StageProgress) {
        self(progress);
    }
}

/// Флаг отмены, общий для вызывающего и конвейера
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Всё, что получено за запуск, кроме растра
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapData {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub graph: Graph,
    pub elevation: ElevationField,
    pub hydrology: Hydrology,
    pub temperature: Vec<f64>,
    pub biomes: BiomeMap,
    pub regions: RegionMap,
    pub features: FeatureLayout,
    pub roads: RoadNetwork,
    pub toponyms: Toponyms,
    pub labels: Vec<LabelPlacement>,
}

#[derive(Debug, Clone)]
pub struct GeneratedMap {
    pub data: MapData,
    pub raster: Raster,
}

/// Генератор с необязательными прогрессом и отменой
#[derive(Default)]
pub struct MapGenerator {
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: Option<CancellationToken>,
}

impl MapGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn report(&self, stage: Stage, fraction: f64) {
        self.send(stage, fraction, false);
    }

    fn send(&self, stage: Stage, fraction: f64, failed: bool) {
        if let Some(sink) = &self.progress {
            sink.report(StageProgress {
                index: stage.index(),
                total: Stage::ALL.len(),
                name: stage.name(),
                fraction,
                failed,
            });
        }
    }

    fn check_cancelled(&self) -> Result<(), GenerationError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(GenerationError::Cancelled),
            _ => Ok(()),
        }
    }

    /// Запускает одну стадию: отмена, прогресс 0.0, работа, прогресс 1.0, лог времени.
    /// Начатая стадия всегда получает завершающее сообщение, в том числе при ошибке.
    fn stage<T>(
        &self,
        stage: Stage,
        work: impl FnOnce() -> Result<T, GenerationError>,
    ) -> Result<T, GenerationError> {
        self.check_cancelled()?;
        self.report(stage, 0.0);
        let started = Instant::now();
        let output = match work() {
            Ok(output) => output,
            Err(err) => {
                self.send(stage, 1.0, true);
                return Err(err);
            }
        };
        self.report(stage, 1.0);
        info!(
            "стадия {}/{} '{}' за {:.2?}",
            stage.index(),
            Stage::ALL.len(),
            stage.name(),
            started.elapsed()
        );
        Ok(output)
    }

    /// Генерирует карту.
    ///
    /// # Ошибки
    /// - `InvalidParameters`, `ResourceExhausted`: до первой стадии, прогресса нет
    /// - `GenerationFailure`: стадия нарушила инвариант, частичный результат отброшен
    /// - `Cancelled`: отмена замечена на границе стадий
    pub fn generate(
        &self,
        seed: u64,
        width: u32,
        height: u32,
        params: &GenerationParams,
    ) -> Result<GeneratedMap, GenerationError> {
        params.validate(width, height)?;
        let result = self.run(seed, width, height, params);
        if let Err(err @ GenerationError::GenerationFailure { .. }) = &result {
            error!("{err}; seed = {seed}, {width}x{height}, params = {params:?}");
        }
        result
    }

    fn run(
        &self,
        seed: u64,
        width: u32,
        height: u32,
        params: &GenerationParams,
    ) -> Result<GeneratedMap, GenerationError> {
        let seeds = StageSeeds::new(seed);
        let palette = params.style_palette.resolve()?;
        let graph_height = params.graph_height(width, height);

        let graph = self.stage(Stage::Mesh, || {
            let settings = MeshSettings {
                point_count: params.point_count,
                relaxation_iterations: params.relaxation_iterations,
                jittered_grid: params.jittered_grid,
                width: params.graph_width,
                height: graph_height,
            };
            generate_mesh(&settings, &mut seeds.rng(Stage::Mesh.phase()))
        })?;

        let elevation = self.stage(Stage::Elevation, || {
            let settings = ElevationSettings {
                noise_seed: seeds.noise_seed(Stage::Elevation.phase()),
                octaves: params.noise_octaves,
                persistence: params.noise_persistence,
                lacunarity: params.noise_lacunarity,
                frequency: params.noise_frequency,
                land_shape: params.land_shape,
                shape_bias: params.shape_bias,
                ocean_threshold: params.ocean_threshold,
            };
            generate_elevation(&graph, &settings)
        })?;

        let hydrology = self.stage(Stage::Hydrology, || {
            let settings = HydrologySettings {
                river_flow_threshold: params.river_flow_threshold,
                max_flow_hops: params.max_flow_hops,
                max_lake_corners: params.max_lake_corners,
                moisture: params.moisture.clone(),
            };
            solve_hydrology(&graph, &elevation, &settings)
        })?;
        if let Some(message) =
            reroute_warning(hydrology.rerouted_corners, seed, width, height, params)
        {
            warn!("{message}");
        }

        let (temperature, biomes) = self.stage(Stage::Biomes, || {
            let temperature =
                cell_temperatures(&graph, &elevation, params.ocean_threshold, &params.climate);
            let biomes = assign_biomes(&elevation, &hydrology, &temperature, &params.biome_table);
            Ok((temperature, biomes))
        })?;

        let mut regions = self.stage(Stage::Regions, || {
            let is_land: Vec<bool> = (0..graph.cells.len())
                .map(|cell| !hydrology.is_water(&elevation, cell))
                .collect();
            Ok(build_regions(
                &graph,
                &is_land,
                params.region_count,
                params.min_region_cells,
                &mut seeds.rng(Stage::Regions.phase()),
            ))
        })?;

        let (features, roads) = self.stage(Stage::Features, || {
            let ctx = PlacementContext {
                graph: &graph,
                elevation: &elevation,
                hydrology: &hydrology,
                biomes: &biomes,
                regions: &regions,
            };
            let settings = PlacementSettings {
                min_feature_spacing: params.min_feature_spacing,
                settlement_count: params.settlement_count,
                settlement_spacing: params.settlement_spacing,
            };
            let mut rng = seeds.rng(Stage::Features.phase());
            let features = place_features(&ctx, &params.feature_density_table, &settings, &mut rng);
            let roads = build_roads(
                &ctx,
                &features,
                &RoadSettings {
                    elevation_weight: params.road_elevation_weight,
                    max_neighbors: params.max_road_neighbors,
                },
                &mut rng,
            );
            Ok((features, roads))
        })?;

        let mut hydrology = hydrology;
        let toponyms = self.stage(Stage::Toponyms, || {
            let settlements: Vec<usize> = features
                .instances
                .iter()
                .enumerate()
                .filter(|(_, f)| f.kind == FeatureKind::Settlement)
                .map(|(i, _)| i)
                .collect();
            name_places(
                &params.name_grammar,
                params.name_retry_limit,
                regions.regions.len(),
                &settlements,
                &hydrology.rivers,
                params.min_named_river_length,
                &mut seeds.rng(Stage::Toponyms.phase()),
            )
        })?;
        for (region, name) in regions.regions.iter_mut().zip(&toponyms.regions) {
            region.name.clone_from(name);
        }
        for (region, capital) in regions.regions.iter_mut().zip(&features.capitals) {
            region.capital = *capital;
        }
        for river in &mut hydrology.rivers {
            river.name = toponyms.rivers.get(&river.id).cloned();
        }

        let composite = self.stage(Stage::Compositing, || {
            let input = RenderInput {
                graph: &graph,
                elevation: &elevation,
                hydrology: &hydrology,
                biomes: &biomes,
                regions: &regions,
                features: &features,
                roads: &roads,
                settlement_names: &toponyms.settlements,
                river_flow_threshold: params.river_flow_threshold,
                min_feature_spacing: params.min_feature_spacing,
                edge_seed: seeds.seed_for(Stage::Compositing.phase()),
            };
            let progress = |fraction: f64| self.report(Stage::Compositing, fraction);
            compose(&input, width, height, &palette, &progress)
        })?;
        self.check_cancelled()?;

        Ok(GeneratedMap {
            data: MapData {
                seed,
                width,
                height,
                graph,
                elevation,
                hydrology,
                temperature,
                biomes,
                regions,
                features,
                roads,
                toponyms,
                labels: composite.labels,
            },
            raster: composite.raster,
        })
    }
}

/// Предупреждение о разрыве циклов стока с данными для воспроизведения запуска.
fn reroute_warning(
    rerouted: usize,
    seed: u64,
    width: u32,
    height: u32,
    params: &GenerationParams,
) -> Option<String> {
    (rerouted > 0).then(|| {
        format!(
            "разорваны циклы стока ({rerouted} углов); seed = {seed}, {width}x{height}, params = {params:?}"
        )
    })
}

/// Генерация без прогресса и отмены.
pub fn generate(
    seed: u64,
    width: u32,
    height: u32,
    params: &GenerationParams,
) -> Result<GeneratedMap, GenerationError> {
    MapGenerator::new().generate(seed, width, height, params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_indices_are_one_based_and_ordered() {
        let indices: Vec<usize> = Stage::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, (1..=8).collect::<Vec<_>>());
        assert_eq!(Stage::Compositing.name(), "compositing");
    }

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn reroute_warning_names_the_seed() {
        let params = GenerationParams::default();
        assert!(reroute_warning(0, 9, 640, 480, &params).is_none());
        let message = reroute_warning(3, 9, 640, 480, &params).unwrap();
        assert!(message.contains("3 углов"));
        assert!(message.contains("seed = 9"));
        assert!(message.contains("640x480"));
        assert!(message.contains("point_count"));
    }

    #[test]
    fn cancelled_before_start_runs_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let generator = MapGenerator::new().with_cancellation(token);
        let params = GenerationParams {
            point_count: 50,
            ..GenerationParams::default()
        };
        assert!(matches!(
            generator.generate(1, 64, 48, &params),
            Err(GenerationError::Cancelled)
        ));
    }
}
