//! Небольшой мир для тестов размещения объектов и дорог

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::biome::{BiomeMap, BiomeTable, assign_biomes};
use crate::climate::cell_temperatures;
use crate::config::{ClimateSettings, LandShape, MoistureSettings};
use crate::elevation::{ElevationField, ElevationSettings, generate_elevation};
use crate::features::{PlacementContext, PlacementSettings};
use crate::mesh::{Graph, MeshSettings, generate_mesh};
use crate::region::{RegionMap, build_regions};
use crate::rivers::{Hydrology, HydrologySettings, solve_hydrology};

pub struct World {
    pub graph: Graph,
    pub elevation: ElevationField,
    pub hydrology: Hydrology,
    pub biomes: BiomeMap,
    pub regions: RegionMap,
}

impl World {
    pub fn new(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let graph = generate_mesh(
            &MeshSettings {
                point_count: 500,
                relaxation_iterations: 2,
                jittered_grid: false,
                width: 800.0,
                height: 600.0,
            },
            &mut rng,
        )
        .unwrap();
        let ocean_threshold = 0.4;
        let elevation = generate_elevation(
            &graph,
            &ElevationSettings {
                noise_seed: seed as i32,
                octaves: 5,
                persistence: 0.5,
                lacunarity: 2.0,
                frequency: 3.0,
                land_shape: LandShape::Continent,
                shape_bias: 0.8,
                ocean_threshold,
            },
        )
        .unwrap();
        let hydrology = solve_hydrology(
            &graph,
            &elevation,
            &HydrologySettings {
                river_flow_threshold: 6.0,
                max_flow_hops: 4096,
                max_lake_corners: 64,
                moisture: MoistureSettings::default(),
            },
        )
        .unwrap();
        let temperature =
            cell_temperatures(&graph, &elevation, ocean_threshold, &ClimateSettings::default());
        let biomes = assign_biomes(&elevation, &hydrology, &temperature, &BiomeTable::default());
        let is_land: Vec<bool> = (0..graph.cells.len())
            .map(|c| !hydrology.is_water(&elevation, c))
            .collect();
        let regions = build_regions(&graph, &is_land, 4, 4, &mut rng);
        Self {
            graph,
            elevation,
            hydrology,
            biomes,
            regions,
        }
    }

    pub fn context(&self) -> PlacementContext<'_> {
        PlacementContext {
            graph: &self.graph,
            elevation: &self.elevation,
            hydrology: &self.hydrology,
            biomes: &self.biomes,
            regions: &self.regions,
        }
    }
}

pub fn settings() -> PlacementSettings {
    PlacementSettings {
        min_feature_spacing: 10.0,
        settlement_count: 10,
        settlement_spacing: 60.0,
    }
}
