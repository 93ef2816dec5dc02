//! Биомы и их классификация по таблице
//!
//! Водные ячейки получают `Ocean`/`Lake` напрямую. Суша ищется в `BiomeTable` по паре
//! (корзина температуры, корзина влажности); значение, равное порогу, попадает в
//! верхнюю корзину.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::elevation::{ElevationField, WaterType};
use crate::error::GenerationError;
use crate::rivers::Hydrology;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Biome {
    Ocean,
    Lake,
    Snow,
    Tundra,
    Bare,
    Scorched,
    Taiga,
    Shrubland,
    Marsh,
    TemperateDesert,
    Grassland,
    TemperateDeciduousForest,
    TemperateRainForest,
    SubtropicalDesert,
    TropicalSeasonalForest,
    TropicalRainForest,
}

impl Biome {
    #[must_use]
    pub fn is_water(self) -> bool {
        matches!(self, Biome::Ocean | Biome::Lake)
    }

    /// Цвет по умолчанию в формате `#RRGGBB`
    #[must_use]
    pub fn default_color(self) -> &'static str {
        match self {
            Biome::Ocean => "#44447a",
            Biome::Lake => "#336699",
            Biome::Snow => "#f8f8f8",
            Biome::Tundra => "#bbbbaa",
            Biome::Bare => "#888888",
            Biome::Scorched => "#555555",
            Biome::Taiga => "#99aa77",
            Biome::Shrubland => "#889977",
            Biome::Marsh => "#2f6666",
            Biome::TemperateDesert => "#c9d29b",
            Biome::Grassland => "#88aa55",
            Biome::TemperateDeciduousForest => "#679459",
            Biome::TemperateRainForest => "#448855",
            Biome::SubtropicalDesert => "#d2b98b",
            Biome::TropicalSeasonalForest => "#559944",
            Biome::TropicalRainForest => "#337755",
        }
    }
}

/// Таблица Уиттекера: строки: корзины температуры (от холодной), столбцы: корзины
/// влажности (от сухой)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BiomeTable {
    pub temperature_thresholds: Vec<f64>,
    pub moisture_thresholds: Vec<f64>,
    pub rows: Vec<Vec<Biome>>,
}

impl Default for BiomeTable {
    fn default() -> Self {
        use Biome as B;
        Self {
            temperature_thresholds: vec![0.2, 0.4, 0.6],
            moisture_thresholds: vec![0.16, 0.33, 0.5, 0.66, 0.83],
            rows: vec![
                vec![B::Scorched, B::Bare, B::Tundra, B::Tundra, B::Snow, B::Snow],
                vec![
                    B::TemperateDesert,
                    B::TemperateDesert,
                    B::Shrubland,
                    B::Shrubland,
                    B::Taiga,
                    B::Marsh,
                ],
                vec![
                    B::TemperateDesert,
                    B::Grassland,
                    B::Grassland,
                    B::TemperateDeciduousForest,
                    B::TemperateDeciduousForest,
                    B::TemperateRainForest,
                ],
                vec![
                    B::SubtropicalDesert,
                    B::Grassland,
                    B::TropicalSeasonalForest,
                    B::TropicalSeasonalForest,
                    B::TropicalRainForest,
                    B::TropicalRainForest,
                ],
            ],
        }
    }
}

/// Номер корзины: число порогов, не превышающих значение.
fn bucket(thresholds: &[f64], value: f64) -> usize {
    thresholds.partition_point(|&t| t <= value)
}

fn check_thresholds(name: &str, thresholds: &[f64]) -> Result<(), GenerationError> {
    if thresholds.iter().any(|t| !(0.0..=1.0).contains(t)) {
        return Err(GenerationError::invalid(format!(
            "biome_table.{name} must lie in [0, 1]"
        )));
    }
    if thresholds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(GenerationError::invalid(format!(
            "biome_table.{name} must be strictly ascending"
        )));
    }
    Ok(())
}

impl BiomeTable {
    /// # Ошибки
    /// `InvalidParameters` при неверной форме таблицы, неупорядоченных порогах или
    /// водных биомах в строках.
    pub fn validate(&self) -> Result<(), GenerationError> {
        check_thresholds("temperature_thresholds", &self.temperature_thresholds)?;
        check_thresholds("moisture_thresholds", &self.moisture_thresholds)?;
        if self.rows.len() != self.temperature_thresholds.len() + 1 {
            return Err(GenerationError::invalid(format!(
                "biome_table needs {} rows, got {}",
                self.temperature_thresholds.len() + 1,
                self.rows.len()
            )));
        }
        let columns = self.moisture_thresholds.len() + 1;
        for (i, row) in self.rows.iter().enumerate() {
            if row.len() != columns {
                return Err(GenerationError::invalid(format!(
                    "biome_table row {i} needs {columns} entries, got {}",
                    row.len()
                )));
            }
            if let Some(b) = row.iter().find(|b| b.is_water()) {
                return Err(GenerationError::invalid(format!(
                    "biome_table row {i} contains water biome {b:?}"
                )));
            }
        }
        Ok(())
    }

    /// Биом суши для пары (температура, влажность).
    #[must_use]
    pub fn lookup(&self, temperature: f64, moisture: f64) -> Biome {
        let row = bucket(&self.temperature_thresholds, temperature);
        let column = bucket(&self.moisture_thresholds, moisture);
        self.rows[row][column]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeMap {
    pub cells: Vec<Biome>,
}

impl BiomeMap {
    #[must_use]
    pub fn get(&self, cell: usize) -> Biome {
        self.cells[cell]
    }
}

/// Назначает биомы всем ячейкам.
#[must_use]
pub fn assign_biomes(
    field: &ElevationField,
    hydrology: &Hydrology,
    temperature: &[f64],
    table: &BiomeTable,
) -> BiomeMap {
    let classify = |id: usize| match field.cell_water[id] {
        WaterType::Ocean => Biome::Ocean,
        WaterType::Lake => Biome::Lake,
        WaterType::Land if hydrology.cell_lake[id] => Biome::Lake,
        WaterType::Land => table.lookup(temperature[id], hydrology.cell_moisture[id]),
    };

    #[cfg(feature = "parallel")]
    let cells = (0..field.cell_water.len()).into_par_iter().map(classify).collect();
    #[cfg(not(feature = "parallel"))]
    let cells = (0..field.cell_water.len()).map(classify).collect();

    BiomeMap { cells }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        BiomeTable::default().validate().unwrap();
    }

    #[test]
    fn threshold_value_falls_into_upper_bucket() {
        let table = BiomeTable::default();
        assert_eq!(table.lookup(0.2, 0.0), Biome::TemperateDesert);
        assert_eq!(table.lookup(0.199, 0.0), Biome::Scorched);
        assert_eq!(table.lookup(0.9, 0.83), Biome::TropicalRainForest);
        assert_eq!(table.lookup(0.5, 0.16), Biome::Grassland);
    }

    #[test]
    fn extremes_map_to_corners() {
        let table = BiomeTable::default();
        assert_eq!(table.lookup(0.0, 0.0), Biome::Scorched);
        assert_eq!(table.lookup(0.0, 1.0), Biome::Snow);
        assert_eq!(table.lookup(1.0, 0.0), Biome::SubtropicalDesert);
        assert_eq!(table.lookup(1.0, 1.0), Biome::TropicalRainForest);
    }

    #[test]
    fn malformed_tables_are_rejected() {
        let mut table = BiomeTable::default();
        table.rows.pop();
        assert!(table.validate().is_err());

        let mut table = BiomeTable::default();
        table.moisture_thresholds = vec![0.5, 0.3, 0.6, 0.7, 0.8];
        assert!(table.validate().is_err());

        let mut table = BiomeTable::default();
        table.rows[1][0] = Biome::Ocean;
        assert!(table.validate().is_err());
    }

    #[test]
    fn table_parses_from_toml() {
        let table: BiomeTable = toml::from_str(
            r#"
            temperature_thresholds = [0.5]
            moisture_thresholds = []
            rows = [["Tundra"], ["Grassland"]]
            "#,
        )
        .unwrap();
        table.validate().unwrap();
        assert_eq!(table.lookup(0.7, 0.2), Biome::Grassland);
    }
}
