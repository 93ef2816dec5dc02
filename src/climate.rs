//! Температура ячеек
//!
//! Широта меняется линейно от `latitude_top` у верхнего края карты до
//! `latitude_bottom` у нижнего. Высота над уровнем моря охлаждает сушу.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::ClimateSettings;
use crate::elevation::ElevationField;
use crate::mesh::Graph;

/// Широта (в градусах) для вертикальной позиции `y` в пространстве графа.
#[must_use]
pub fn latitude_at(y: f64, height: f64, settings: &ClimateSettings) -> f64 {
    let t = if height > 0.0 {
        (y / height).clamp(0.0, 1.0)
    } else {
        0.5
    };
    settings.latitude_top + (settings.latitude_bottom - settings.latitude_top) * t
}

/// Температура одной ячейки в `[0, 1]`.
#[must_use]
pub fn temperature(
    latitude: f64,
    elevation: f64,
    ocean_threshold: f64,
    settings: &ClimateSettings,
) -> f64 {
    let base = 1.0 - latitude.abs() / 90.0;
    // Охлаждает только высота над уровнем моря
    let above_sea = (elevation - ocean_threshold).max(0.0);
    (base - settings.elevation_cooling * above_sea + settings.temperature_offset).clamp(0.0, 1.0)
}

/// Температуры всех ячеек, по центроидам.
#[must_use]
pub fn cell_temperatures(
    graph: &Graph,
    field: &ElevationField,
    ocean_threshold: f64,
    settings: &ClimateSettings,
) -> Vec<f64> {
    let compute = |id: usize| {
        let lat = latitude_at(graph.cells[id].centroid.y, graph.height, settings);
        temperature(lat, field.cell_elevation[id], ocean_threshold, settings)
    };

    #[cfg(feature = "parallel")]
    let temps = (0..graph.cells.len()).into_par_iter().map(compute).collect();
    #[cfg(not(feature = "parallel"))]
    let temps = (0..graph.cells.len()).map(compute).collect();

    temps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_interpolates_between_edges() {
        let settings = ClimateSettings::default();
        assert!((latitude_at(0.0, 100.0, &settings) - 60.0).abs() < 1e-12);
        assert!((latitude_at(100.0, 100.0, &settings) - 10.0).abs() < 1e-12);
        assert!((latitude_at(50.0, 100.0, &settings) - 35.0).abs() < 1e-12);
    }

    #[test]
    fn equator_at_sea_level_is_hottest() {
        let settings = ClimateSettings::default();
        assert!((temperature(0.0, 0.3, 0.45, &settings) - 1.0).abs() < 1e-12);
        assert!(temperature(90.0, 0.3, 0.45, &settings).abs() < 1e-12);
    }

    #[test]
    fn height_cools_and_offset_warms() {
        let settings = ClimateSettings::default();
        let low = temperature(30.0, 0.45, 0.45, &settings);
        let high = temperature(30.0, 0.95, 0.45, &settings);
        assert!((low - high - 0.25).abs() < 1e-12);

        let warm = ClimateSettings {
            temperature_offset: 0.1,
            ..ClimateSettings::default()
        };
        assert!(temperature(30.0, 0.45, 0.45, &warm) > low);
    }
}
