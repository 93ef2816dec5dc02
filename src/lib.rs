pub mod biome;
pub mod climate;
pub mod config;
pub mod elevation;
pub mod error;
pub mod features;
pub mod mesh;
pub mod naming;
pub mod pipeline;
pub mod region;
pub mod render;
pub mod rivers;
pub mod rng;

pub use config::{ClimateSettings, GenerationParams, LandShape, MoistureSettings, ResourceLimits};
pub use error::{ConfigError, GenerationError};
pub use pipeline::{
    CancellationToken, GeneratedMap, MapData, MapGenerator, ProgressSink, Stage, StageProgress,
    generate,
};
pub use render::Raster;
