//! Палитра отрисовки
//!
//! В конфигурации цвета задаются HEX-строками `#rrggbb` или `#rrggbbaa`; перед
//! отрисовкой палитра разбирается в `Palette` с готовыми `Rgba<u8>`.

use std::collections::BTreeMap;

use image::Rgba;
use serde::{Deserialize, Serialize};

use crate::biome::Biome;
use crate::error::GenerationError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StylePalette {
    #[serde(default = "default_background")]
    pub background: String,

    /// Переопределения цветов биомов; остальные берутся из `Biome::default_color`
    #[serde(default)]
    pub biome_colors: BTreeMap<Biome, String>,

    #[serde(default = "default_river")]
    pub river: String,
    #[serde(default = "default_coastline")]
    pub coastline: String,
    #[serde(default = "default_border")]
    pub border: String,
    #[serde(default = "default_road")]
    pub road: String,
    #[serde(default = "default_mountain")]
    pub mountain: String,
    #[serde(default = "default_hill")]
    pub hill: String,
    #[serde(default = "default_tree")]
    pub tree: String,
    #[serde(default = "default_settlement")]
    pub settlement: String,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_label_halo")]
    pub label_halo: String,

    /// Оттенки регионов; соседние регионы получают разные
    #[serde(default = "default_region_tints")]
    pub region_tints: Vec<String>,

    /// Доля оттенка региона в цвете ячейки (0 = без оттенков)
    #[serde(default = "default_region_tint_strength")]
    pub region_tint_strength: f64,

    /// Сила затенения по высоте (0 = плоская заливка)
    #[serde(default = "default_elevation_shading")]
    pub elevation_shading: f64,

    /// Толщины линий в пикселях
    #[serde(default = "default_river_width")]
    pub river_width: f64,
    #[serde(default = "default_coastline_width")]
    pub coastline_width: f64,
    #[serde(default = "default_border_width")]
    pub border_width: f64,
    #[serde(default = "default_road_width")]
    pub road_width: f64,

    /// Длина штриха дороги в пикселях (промежутки той же длины)
    #[serde(default = "default_road_dash")]
    pub road_dash: f64,

    /// Наименьший отрезок изломанных береговых линий и границ в пикселях; 0: прямые рёбра
    #[serde(default = "default_noisy_edge_length")]
    pub noisy_edge_length: f64,

    /// Увеличение пиксельного шрифта подписей поселений; регионы на единицу крупнее
    #[serde(default = "default_label_scale")]
    pub label_scale: u32,
}

fn default_background() -> String {
    "#e8dcb8".into()
}
fn default_river() -> String {
    "#225588".into()
}
fn default_coastline() -> String {
    "#2b2b3a".into()
}
fn default_border() -> String {
    "#7a1f1fcc".into()
}
fn default_road() -> String {
    "#6b4f2a".into()
}
fn default_mountain() -> String {
    "#5b4a3a".into()
}
fn default_hill() -> String {
    "#7d6b4f".into()
}
fn default_tree() -> String {
    "#2f5a2f".into()
}
fn default_settlement() -> String {
    "#1a1a1a".into()
}
fn default_label() -> String {
    "#1a1a1a".into()
}
fn default_label_halo() -> String {
    "#f4ecd8".into()
}
fn default_region_tints() -> Vec<String> {
    [
        "#d9a066", "#8fb3d9", "#b3d98f", "#d98fb3", "#d9d98f", "#8fd9c4", "#b38fd9", "#d98f8f",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}
fn default_region_tint_strength() -> f64 {
    0.2
}
fn default_elevation_shading() -> f64 {
    0.35
}
fn default_river_width() -> f64 {
    1.0
}
fn default_coastline_width() -> f64 {
    1.5
}
fn default_border_width() -> f64 {
    1.0
}
fn default_road_width() -> f64 {
    1.0
}
fn default_road_dash() -> f64 {
    4.0
}
fn default_noisy_edge_length() -> f64 {
    3.0
}
fn default_label_scale() -> u32 {
    1
}

impl Default for StylePalette {
    fn default() -> Self {
        Self {
            background: default_background(),
            biome_colors: BTreeMap::new(),
            river: default_river(),
            coastline: default_coastline(),
            border: default_border(),
            road: default_road(),
            mountain: default_mountain(),
            hill: default_hill(),
            tree: default_tree(),
            settlement: default_settlement(),
            label: default_label(),
            label_halo: default_label_halo(),
            region_tints: default_region_tints(),
            region_tint_strength: default_region_tint_strength(),
            elevation_shading: default_elevation_shading(),
            river_width: default_river_width(),
            coastline_width: default_coastline_width(),
            border_width: default_border_width(),
            road_width: default_road_width(),
            road_dash: default_road_dash(),
            noisy_edge_length: default_noisy_edge_length(),
            label_scale: default_label_scale(),
        }
    }
}

/// Разбирает `#rrggbb` или `#rrggbbaa`.
pub fn parse_hex(value: &str) -> Result<Rgba<u8>, GenerationError> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    let parsed = match hex.len() {
        6 => channel(0)
            .zip(channel(2))
            .zip(channel(4))
            .map(|((r, g), b)| [r, g, b, 255]),
        8 => channel(0)
            .zip(channel(2))
            .zip(channel(4))
            .zip(channel(6))
            .map(|(((r, g), b), a)| [r, g, b, a]),
        _ => None,
    };
    parsed
        .map(Rgba)
        .ok_or_else(|| GenerationError::invalid(format!("'{value}' is not a #rrggbb color")))
}

/// Разобранная палитра
#[derive(Debug, Clone)]
pub struct Palette {
    pub background: Rgba<u8>,
    pub biomes: BTreeMap<Biome, Rgba<u8>>,
    pub river: Rgba<u8>,
    pub coastline: Rgba<u8>,
    pub border: Rgba<u8>,
    pub road: Rgba<u8>,
    pub mountain: Rgba<u8>,
    pub hill: Rgba<u8>,
    pub tree: Rgba<u8>,
    pub settlement: Rgba<u8>,
    pub label: Rgba<u8>,
    pub label_halo: Rgba<u8>,
    pub region_tints: Vec<Rgba<u8>>,
    pub region_tint_strength: f64,
    pub elevation_shading: f64,
    pub river_width: f64,
    pub coastline_width: f64,
    pub border_width: f64,
    pub road_width: f64,
    pub road_dash: f64,
    pub noisy_edge_length: f64,
    pub label_scale: u32,
}

const ALL_BIOMES: [Biome; 16] = [
    Biome::Ocean,
    Biome::Lake,
    Biome::Snow,
    Biome::Tundra,
    Biome::Bare,
    Biome::Scorched,
    Biome::Taiga,
    Biome::Shrubland,
    Biome::Marsh,
    Biome::TemperateDesert,
    Biome::Grassland,
    Biome::TemperateDeciduousForest,
    Biome::TemperateRainForest,
    Biome::SubtropicalDesert,
    Biome::TropicalSeasonalForest,
    Biome::TropicalRainForest,
];

impl StylePalette {
    /// # Ошибки
    /// `InvalidParameters` при неверном цвете или числе вне диапазона.
    pub fn resolve(&self) -> Result<Palette, GenerationError> {
        for (name, v) in [
            ("region_tint_strength", self.region_tint_strength),
            ("elevation_shading", self.elevation_shading),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(GenerationError::invalid(format!(
                    "style_palette.{name} must be in [0, 1]"
                )));
            }
        }
        for (name, v) in [
            ("river_width", self.river_width),
            ("coastline_width", self.coastline_width),
            ("border_width", self.border_width),
            ("road_width", self.road_width),
            ("road_dash", self.road_dash),
        ] {
            if !(v.is_finite() && v > 0.0 && v <= 32.0) {
                return Err(GenerationError::invalid(format!(
                    "style_palette.{name} must be in (0, 32]"
                )));
            }
        }
        if !(0.0..=32.0).contains(&self.noisy_edge_length) {
            return Err(GenerationError::invalid(
                "style_palette.noisy_edge_length must be in [0, 32]",
            ));
        }
        if !(1..=8).contains(&self.label_scale) {
            return Err(GenerationError::invalid(
                "style_palette.label_scale must be in 1..=8",
            ));
        }

        let mut biomes = BTreeMap::new();
        for biome in ALL_BIOMES {
            let hex = self
                .biome_colors
                .get(&biome)
                .map_or(biome.default_color(), String::as_str);
            biomes.insert(biome, parse_hex(hex)?);
        }

        Ok(Palette {
            background: parse_hex(&self.background)?,
            biomes,
            river: parse_hex(&self.river)?,
            coastline: parse_hex(&self.coastline)?,
            border: parse_hex(&self.border)?,
            road: parse_hex(&self.road)?,
            mountain: parse_hex(&self.mountain)?,
            hill: parse_hex(&self.hill)?,
            tree: parse_hex(&self.tree)?,
            settlement: parse_hex(&self.settlement)?,
            label: parse_hex(&self.label)?,
            label_halo: parse_hex(&self.label_halo)?,
            region_tints: self
                .region_tints
                .iter()
                .map(|h| parse_hex(h))
                .collect::<Result<_, _>>()?,
            region_tint_strength: self.region_tint_strength,
            elevation_shading: self.elevation_shading,
            river_width: self.river_width,
            coastline_width: self.coastline_width,
            border_width: self.border_width,
            road_width: self.road_width,
            road_dash: self.road_dash,
            noisy_edge_length: self.noisy_edge_length,
            label_scale: self.label_scale,
        })
    }

    pub fn validate(&self) -> Result<(), GenerationError> {
        self.resolve().map(|_| ())
    }
}

impl Palette {
    #[must_use]
    pub fn biome(&self, biome: Biome) -> Rgba<u8> {
        self.biomes.get(&biome).copied().unwrap_or(self.background)
    }

    /// Оттенок для номера цвета раскраски. Если палитры не хватает, оттенки
    /// достраиваются поворотом тона на золотой угол.
    #[must_use]
    pub fn region_tint(&self, color: usize) -> Rgba<u8> {
        if let Some(&tint) = self.region_tints.get(color) {
            return tint;
        }
        let hue = (color as f64 * 0.618_033_988_75).fract() * 6.0;
        let x = 1.0 - (hue % 2.0 - 1.0).abs();
        let (r, g, b) = match hue as u32 {
            0 => (1.0, x, 0.0),
            1 => (x, 1.0, 0.0),
            2 => (0.0, 1.0, x),
            3 => (0.0, x, 1.0),
            4 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        let channel = |v: f64| (90.0 + v * 130.0) as u8;
        Rgba([channel(r), channel(g), channel(b), 255])
    }
}
