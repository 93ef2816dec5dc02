// src/config.rs
//! Конфигурация генерации карты
//!
//! Этот модуль определяет все параметры, управляющие процедурной генерацией:
//! - Построение сетки (количество точек, релаксация)
//! - Шум рельефа и форма суши
//! - Гидрология, климат и таблица биомов
//! - Плотность объектов, имена и палитра отрисовки
//!
//! Все структуры сериализуются в TOML/JSON. Неизвестные ключи отвергаются
//! (`deny_unknown_fields`), а не игнорируются молча.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::biome::BiomeTable;
use crate::error::{ConfigError, GenerationError};
use crate::features::FeatureDensityTable;
use crate::naming::NameGrammar;
use crate::render::StylePalette;

/// Форма суши, которой смещается шум высот
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LandShape {
    /// Один центральный континент: сильное радиальное затухание к краям
    #[default]
    Continent,
    /// Россыпь островов: затухание начинается только у самых краёв
    Archipelago,
    /// Чистый шум без смещения (края всё равно становятся океаном)
    Noise,
}

impl LandShape {
    /// Смещение высоты для точки на нормализованном расстоянии `d` от центра карты.
    ///
    /// # Возвращает
    /// Величину в `[0, 1]`, которая вычитается из шума с весом `shape_bias`.
    #[must_use]
    pub fn falloff(self, d: f64) -> f64 {
        let d = d.clamp(0.0, 1.0);
        match self {
            LandShape::Continent => d * d,
            LandShape::Archipelago => d.powi(4),
            LandShape::Noise => 0.0,
        }
    }
}

/// Климатические параметры
///
/// Температура зависит от широты (линейно между верхним и нижним краем карты) и высоты.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClimateSettings {
    /// Широта верхнего края карты в градусах (-90..90)
    #[serde(default = "default_latitude_top")]
    pub latitude_top: f64,

    /// Широта нижнего края карты в градусах (-90..90)
    #[serde(default = "default_latitude_bottom")]
    pub latitude_bottom: f64,

    /// Охлаждение на единицу высоты над уровнем моря (0 = высота не влияет)
    #[serde(default = "default_elevation_cooling")]
    pub elevation_cooling: f64,

    /// Глобальный сдвиг температуры (-1.0 = очень холодно, +1.0 = очень жарко)
    #[serde(default)]
    pub temperature_offset: f64,
}

fn default_latitude_top() -> f64 {
    60.0
}
fn default_latitude_bottom() -> f64 {
    10.0
}
fn default_elevation_cooling() -> f64 {
    0.5
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            latitude_top: 60.0,
            latitude_bottom: 10.0,
            elevation_cooling: 0.5,
            temperature_offset: 0.0,
        }
    }
}

/// Источники влажности и её затухание с расстоянием
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MoistureSettings {
    /// Влажность, которую даёт океанское побережье
    #[serde(default = "default_ocean_moisture")]
    pub ocean_moisture: f64,

    /// Влажность, которую даёт берег озера
    #[serde(default = "default_lake_moisture")]
    pub lake_moisture: f64,

    /// Влажность вдоль рек (растёт с расходом, но не выше этого значения)
    #[serde(default = "default_river_moisture")]
    pub river_moisture: f64,

    /// Множитель затухания на каждый шаг по графу, `(0, 1)`
    #[serde(default = "default_moisture_decay")]
    pub moisture_decay: f64,
}

fn default_ocean_moisture() -> f64 {
    0.6
}
fn default_lake_moisture() -> f64 {
    1.0
}
fn default_river_moisture() -> f64 {
    1.0
}
fn default_moisture_decay() -> f64 {
    0.85
}

impl Default for MoistureSettings {
    fn default() -> Self {
        Self {
            ocean_moisture: 0.6,
            lake_moisture: 1.0,
            river_moisture: 1.0,
            moisture_decay: 0.85,
        }
    }
}

/// Потолки ресурсов: запросы сверх них отвергаются до выделения памяти
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResourceLimits {
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    /// Максимальное число пикселей итогового растра (`width × height`)
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

fn default_max_points() -> usize {
    200_000
}
fn default_max_pixels() -> u64 {
    64 * 1024 * 1024
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            max_pixels: default_max_pixels(),
        }
    }
}

/// Основные параметры генерации карты
///
/// Полная конфигурация одного запуска, кроме сида и разрешения растра (они передаются
/// в [`crate::generate`] отдельно). Поддерживает загрузку из TOML-файлов.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenerationParams {
    /// Количество ячеек Вороного
    #[serde(default = "default_point_count")]
    pub point_count: usize,

    /// Количество итераций релаксации Ллойда
    #[serde(default = "default_relaxation_iterations")]
    pub relaxation_iterations: usize,

    /// Сеять точки по дрожащей сетке вместо равномерного случайного разброса
    #[serde(default)]
    pub jittered_grid: bool,

    /// Ширина внутреннего пространства графа; высота следует пропорциям растра
    #[serde(default = "default_graph_width")]
    pub graph_width: f64,

    /// Количество октав фрактального шума
    #[serde(default = "default_noise_octaves")]
    pub noise_octaves: u32,

    /// Затухание амплитуды между октавами
    #[serde(default = "default_noise_persistence")]
    pub noise_persistence: f32,

    /// Рост частоты между октавами
    #[serde(default = "default_noise_lacunarity")]
    pub noise_lacunarity: f32,

    /// Базовая частота шума (примерное число «пятен» суши на ширину карты)
    #[serde(default = "default_noise_frequency")]
    pub noise_frequency: f32,

    #[serde(default)]
    pub land_shape: LandShape,

    /// Вес смещения формы суши (0 = только шум)
    #[serde(default = "default_shape_bias")]
    pub shape_bias: f64,

    /// Порог нормализованной высоты: ниже: вода, равно или выше: суша
    #[serde(default = "default_ocean_threshold")]
    pub ocean_threshold: f64,

    /// Накопленный поток, начиная с которого угол становится частью реки
    #[serde(default = "default_river_flow_threshold")]
    pub river_flow_threshold: f64,

    /// Предел шагов при поиске стока из котловины
    #[serde(default = "default_max_flow_hops")]
    pub max_flow_hops: usize,

    /// Предельный размер котловины озера; больше: бессточное озеро
    #[serde(default = "default_max_lake_corners")]
    pub max_lake_corners: usize,

    #[serde(default)]
    pub moisture: MoistureSettings,

    #[serde(default)]
    pub climate: ClimateSettings,

    #[serde(default)]
    pub biome_table: BiomeTable,

    #[serde(default)]
    pub feature_density_table: FeatureDensityTable,

    /// Минимальное расстояние между взаимоисключающими объектами (в единицах графа)
    #[serde(default = "default_min_feature_spacing")]
    pub min_feature_spacing: f64,

    #[serde(default = "default_settlement_count")]
    pub settlement_count: usize,

    /// Минимальное расстояние между поселениями
    #[serde(default = "default_settlement_spacing")]
    pub settlement_spacing: f64,

    /// Насколько дороги избегают крутых переходов (0 = кратчайший путь)
    #[serde(default = "default_road_elevation_weight")]
    pub road_elevation_weight: f64,

    /// Со сколькими ближайшими поселениями соединяется каждое (0 = без дорог)
    #[serde(default = "default_max_road_neighbors")]
    pub max_road_neighbors: usize,

    /// Желаемое количество политических регионов
    #[serde(default = "default_region_count")]
    pub region_count: usize,

    /// Массивы суши меньше этого размера не образуют регион
    #[serde(default = "default_min_region_cells")]
    pub min_region_cells: usize,

    #[serde(default)]
    pub name_grammar: NameGrammar,

    /// Сколько раз пересэмплировать имя при коллизии до добавления суффикса
    #[serde(default = "default_name_retry_limit")]
    pub name_retry_limit: u32,

    /// Реки короче (в углах) не получают имени
    #[serde(default = "default_min_named_river_length")]
    pub min_named_river_length: usize,

    #[serde(default)]
    pub style_palette: StylePalette,

    #[serde(default)]
    pub limits: ResourceLimits,
}

fn default_point_count() -> usize {
    2000
}
fn default_relaxation_iterations() -> usize {
    2
}
fn default_graph_width() -> f64 {
    1000.0
}
fn default_noise_octaves() -> u32 {
    5
}
fn default_noise_persistence() -> f32 {
    0.5
}
fn default_noise_lacunarity() -> f32 {
    2.0
}
fn default_noise_frequency() -> f32 {
    3.0
}
fn default_shape_bias() -> f64 {
    0.8
}
fn default_ocean_threshold() -> f64 {
    0.45
}
fn default_river_flow_threshold() -> f64 {
    12.0
}
fn default_max_flow_hops() -> usize {
    4096
}
fn default_max_lake_corners() -> usize {
    64
}
fn default_min_feature_spacing() -> f64 {
    12.0
}
fn default_settlement_count() -> usize {
    12
}
fn default_settlement_spacing() -> f64 {
    60.0
}
fn default_road_elevation_weight() -> f64 {
    1.0
}
fn default_max_road_neighbors() -> usize {
    2
}
fn default_region_count() -> usize {
    8
}
fn default_min_region_cells() -> usize {
    6
}
fn default_name_retry_limit() -> u32 {
    20
}
fn default_min_named_river_length() -> usize {
    6
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            point_count: default_point_count(),
            relaxation_iterations: default_relaxation_iterations(),
            jittered_grid: false,
            graph_width: default_graph_width(),
            noise_octaves: default_noise_octaves(),
            noise_persistence: default_noise_persistence(),
            noise_lacunarity: default_noise_lacunarity(),
            noise_frequency: default_noise_frequency(),
            land_shape: LandShape::Continent,
            shape_bias: default_shape_bias(),
            ocean_threshold: default_ocean_threshold(),
            river_flow_threshold: default_river_flow_threshold(),
            max_flow_hops: default_max_flow_hops(),
            max_lake_corners: default_max_lake_corners(),
            moisture: MoistureSettings::default(),
            climate: ClimateSettings::default(),
            biome_table: BiomeTable::default(),
            feature_density_table: FeatureDensityTable::default(),
            min_feature_spacing: default_min_feature_spacing(),
            settlement_count: default_settlement_count(),
            settlement_spacing: default_settlement_spacing(),
            road_elevation_weight: default_road_elevation_weight(),
            max_road_neighbors: default_max_road_neighbors(),
            region_count: default_region_count(),
            min_region_cells: default_min_region_cells(),
            name_grammar: NameGrammar::default(),
            name_retry_limit: default_name_retry_limit(),
            min_named_river_length: default_min_named_river_length(),
            style_palette: StylePalette::default(),
            limits: ResourceLimits::default(),
        }
    }
}

impl GenerationParams {
    /// Загружает параметры из TOML-файла
    ///
    /// # Пример
    /// ```toml
    /// # map.toml
    /// point_count = 3000
    /// land_shape = "Archipelago"
    ///
    /// [climate]
    /// latitude_top = 70.0
    /// ```
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Высота пространства графа для растра заданных пропорций.
    #[must_use]
    pub fn graph_height(&self, width: u32, height: u32) -> f64 {
        self.graph_width * f64::from(height) / f64::from(width.max(1))
    }

    /// Проверяет параметры до запуска любой стадии.
    ///
    /// # Ошибки
    /// - `InvalidParameters`: значение вне допустимого диапазона
    /// - `ResourceExhausted`: запрос превышает `limits`
    pub fn validate(&self, width: u32, height: u32) -> Result<(), GenerationError> {
        if width == 0 || height == 0 {
            return Err(GenerationError::invalid(format!(
                "output resolution must be positive, got {width}x{height}"
            )));
        }
        if self.point_count < 4 {
            return Err(GenerationError::invalid(format!(
                "point_count must be at least 4, got {}",
                self.point_count
            )));
        }
        if !(self.graph_width.is_finite() && self.graph_width > 0.0) {
            return Err(GenerationError::invalid("graph_width must be positive"));
        }
        if !(1..=12).contains(&self.noise_octaves) {
            return Err(GenerationError::invalid("noise_octaves must be in 1..=12"));
        }
        if !(self.noise_persistence > 0.0 && self.noise_persistence <= 1.0) {
            return Err(GenerationError::invalid(
                "noise_persistence must be in (0, 1]",
            ));
        }
        if !(self.noise_lacunarity.is_finite() && self.noise_lacunarity >= 1.0) {
            return Err(GenerationError::invalid("noise_lacunarity must be >= 1"));
        }
        if !(self.noise_frequency.is_finite() && self.noise_frequency > 0.0) {
            return Err(GenerationError::invalid("noise_frequency must be positive"));
        }
        if !(0.0..=4.0).contains(&self.shape_bias) {
            return Err(GenerationError::invalid("shape_bias must be in [0, 4]"));
        }
        if !(0.0..=1.0).contains(&self.ocean_threshold) {
            return Err(GenerationError::invalid("ocean_threshold must be in [0, 1]"));
        }
        if !(self.river_flow_threshold.is_finite() && self.river_flow_threshold >= 1.0) {
            return Err(GenerationError::invalid(
                "river_flow_threshold must be >= 1",
            ));
        }
        if self.max_flow_hops == 0 || self.max_lake_corners == 0 {
            return Err(GenerationError::invalid(
                "max_flow_hops and max_lake_corners must be positive",
            ));
        }
        let m = &self.moisture;
        if !(m.moisture_decay > 0.0 && m.moisture_decay < 1.0) {
            return Err(GenerationError::invalid("moisture_decay must be in (0, 1)"));
        }
        for (name, v) in [
            ("ocean_moisture", m.ocean_moisture),
            ("lake_moisture", m.lake_moisture),
            ("river_moisture", m.river_moisture),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GenerationError::invalid(format!("{name} must be in [0, 1]")));
            }
        }
        let c = &self.climate;
        if !(-90.0..=90.0).contains(&c.latitude_top) || !(-90.0..=90.0).contains(&c.latitude_bottom)
        {
            return Err(GenerationError::invalid("latitudes must be in [-90, 90]"));
        }
        if !(c.elevation_cooling.is_finite() && c.temperature_offset.is_finite()) {
            return Err(GenerationError::invalid("climate values must be finite"));
        }
        if !(self.min_feature_spacing.is_finite() && self.min_feature_spacing >= 0.0) {
            return Err(GenerationError::invalid(
                "min_feature_spacing must be non-negative",
            ));
        }
        if !(self.settlement_spacing.is_finite() && self.settlement_spacing >= 0.0) {
            return Err(GenerationError::invalid(
                "settlement_spacing must be non-negative",
            ));
        }
        if !(0.0..=10.0).contains(&self.road_elevation_weight) {
            return Err(GenerationError::invalid(
                "road_elevation_weight must be in [0, 10]",
            ));
        }
        if self.max_road_neighbors > 8 {
            return Err(GenerationError::invalid("max_road_neighbors must be at most 8"));
        }
        self.biome_table.validate()?;
        self.feature_density_table.validate()?;
        self.name_grammar.validate()?;
        self.style_palette.validate()?;

        if self.point_count > self.limits.max_points {
            return Err(GenerationError::ResourceExhausted(format!(
                "point_count {} exceeds the ceiling of {}",
                self.point_count, self.limits.max_points
            )));
        }
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.limits.max_pixels {
            return Err(GenerationError::ResourceExhausted(format!(
                "{width}x{height} = {pixels} pixels exceeds the ceiling of {}",
                self.limits.max_pixels
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GenerationParams::default().validate(800, 600).unwrap();
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let params = GenerationParams::from_toml_str(
            r#"
            point_count = 300
            land_shape = "Archipelago"

            [climate]
            latitude_top = 80.0
            "#,
        )
        .unwrap();
        assert_eq!(params.point_count, 300);
        assert_eq!(params.land_shape, LandShape::Archipelago);
        assert!((params.climate.latitude_top - 80.0).abs() < f64::EPSILON);
        assert!((params.climate.latitude_bottom - 10.0).abs() < f64::EPSILON);
        assert_eq!(params.relaxation_iterations, 2);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = GenerationParams::from_toml_str("point_count = 300\nsea_level = 0.3\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));

        let nested = GenerationParams::from_toml_str("[climate]\nhumidity = 1.0\n");
        assert!(matches!(nested, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn too_few_points_is_invalid() {
        let params = GenerationParams {
            point_count: 2,
            ..GenerationParams::default()
        };
        assert!(matches!(
            params.validate(800, 600),
            Err(GenerationError::InvalidParameters(_))
        ));
    }

    #[test]
    fn zero_resolution_is_invalid() {
        assert!(matches!(
            GenerationParams::default().validate(0, 600),
            Err(GenerationError::InvalidParameters(_))
        ));
    }

    #[test]
    fn ceilings_report_resource_exhaustion() {
        let params = GenerationParams {
            limits: ResourceLimits {
                max_points: 100,
                max_pixels: 1_000,
            },
            point_count: 50,
            ..GenerationParams::default()
        };
        assert!(matches!(
            params.validate(100, 100),
            Err(GenerationError::ResourceExhausted(_))
        ));
        let many_points = GenerationParams {
            point_count: 500,
            ..params
        };
        assert!(matches!(
            many_points.validate(10, 10),
            Err(GenerationError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn road_settings_are_bounded() {
        let params = GenerationParams::from_toml_str("max_road_neighbors = 3
").unwrap();
        assert_eq!(params.max_road_neighbors, 3);
        assert!((params.road_elevation_weight - 1.0).abs() < f64::EPSILON);
        let params = GenerationParams {
            max_road_neighbors: 20,
            ..GenerationParams::default()
        };
        assert!(params.validate(800, 600).is_err());
        let params = GenerationParams {
            road_elevation_weight: -1.0,
            ..GenerationParams::default()
        };
        assert!(params.validate(800, 600).is_err());
    }

    #[test]
    fn graph_height_follows_aspect() {
        let params = GenerationParams::default();
        assert!((params.graph_height(800, 600) - 750.0).abs() < 1e-9);
    }
}
