//! Размещение объектов: горы, холмы, деревья и поселения
//!
//! Сначала ставятся поселения (лучшие по оценке ячейки), затем для каждой ячейки по
//! возрастанию id и каждого подходящего правила таблицы: декоративные объекты.
//! Взаимоисключающие объекты никогда не оказываются ближе `min_feature_spacing`.

#[cfg(test)]
mod fixture;
pub mod roads;
pub mod spacing;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::biome::{Biome, BiomeMap};
use crate::elevation::ElevationField;
use crate::error::GenerationError;
use crate::mesh::{Graph, Point, cross};
use crate::region::RegionMap;
use crate::rivers::Hydrology;

pub use roads::{Road, RoadNetwork, RoadSettings, build_roads};
pub use spacing::SpacingIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Mountain,
    Hill,
    Tree,
    Settlement,
}

/// Правило плотности для одного вида объектов
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureRule {
    pub kind: FeatureKind,
    /// Биомы, где действует правило; пусто: любая суша
    #[serde(default)]
    pub biomes: Vec<Biome>,
    #[serde(default)]
    pub min_elevation: f64,
    #[serde(default = "default_max_elevation")]
    pub max_elevation: f64,
    /// Ожидаемое число объектов на ячейку
    pub density: f64,
    /// Объект участвует в проверке расстояния
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default = "default_scale")]
    pub min_scale: f64,
    #[serde(default = "default_scale")]
    pub max_scale: f64,
}

fn default_max_elevation() -> f64 {
    1.0
}
fn default_scale() -> f64 {
    1.0
}

impl FeatureRule {
    fn matches(&self, biome: Biome, elevation: f64) -> bool {
        (self.biomes.is_empty() || self.biomes.contains(&biome))
            && elevation >= self.min_elevation
            && elevation < self.max_elevation
    }
}

/// Верхний предел ожидаемого числа объектов одного правила на ячейку
pub const MAX_DENSITY: f64 = 64.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureDensityTable {
    pub rules: Vec<FeatureRule>,
}

impl Default for FeatureDensityTable {
    fn default() -> Self {
        let forests = vec![
            Biome::TemperateDeciduousForest,
            Biome::TemperateRainForest,
            Biome::Taiga,
            Biome::TropicalSeasonalForest,
            Biome::TropicalRainForest,
        ];
        Self {
            rules: vec![
                FeatureRule {
                    kind: FeatureKind::Mountain,
                    biomes: Vec::new(),
                    min_elevation: 0.78,
                    max_elevation: 1.01,
                    density: 1.0,
                    exclusive: true,
                    min_scale: 0.9,
                    max_scale: 1.3,
                },
                FeatureRule {
                    kind: FeatureKind::Hill,
                    biomes: Vec::new(),
                    min_elevation: 0.68,
                    max_elevation: 0.78,
                    density: 0.6,
                    exclusive: true,
                    min_scale: 0.7,
                    max_scale: 1.0,
                },
                FeatureRule {
                    kind: FeatureKind::Tree,
                    biomes: forests,
                    min_elevation: 0.0,
                    max_elevation: 0.78,
                    density: 2.5,
                    exclusive: false,
                    min_scale: 0.6,
                    max_scale: 1.0,
                },
                FeatureRule {
                    kind: FeatureKind::Tree,
                    biomes: vec![Biome::Shrubland, Biome::Grassland, Biome::Marsh],
                    min_elevation: 0.0,
                    max_elevation: 0.78,
                    density: 0.3,
                    exclusive: false,
                    min_scale: 0.5,
                    max_scale: 0.8,
                },
            ],
        }
    }
}

impl FeatureDensityTable {
    /// # Ошибки
    /// `InvalidParameters` при плотности вне `[0, MAX_DENSITY]`, пустом диапазоне высот или
    /// масштаба, водных биомах и правилах для поселений.
    pub fn validate(&self) -> Result<(), GenerationError> {
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.kind == FeatureKind::Settlement {
                return Err(GenerationError::invalid(format!(
                    "feature rule {i}: settlements are placed by settlement_count, not by density"
                )));
            }
            if !(0.0..=MAX_DENSITY).contains(&rule.density) {
                return Err(GenerationError::invalid(format!(
                    "feature rule {i}: density must be in [0, {MAX_DENSITY}]"
                )));
            }
            if !(rule.min_elevation <= rule.max_elevation) {
                return Err(GenerationError::invalid(format!(
                    "feature rule {i}: min_elevation exceeds max_elevation"
                )));
            }
            if !(rule.min_scale > 0.0 && rule.min_scale <= rule.max_scale) {
                return Err(GenerationError::invalid(format!(
                    "feature rule {i}: scale range must satisfy 0 < min_scale <= max_scale"
                )));
            }
            if rule.biomes.iter().any(|b| b.is_water()) {
                return Err(GenerationError::invalid(format!(
                    "feature rule {i}: features cannot be placed on water biomes"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInstance {
    pub kind: FeatureKind,
    pub position: Point,
    pub scale: f64,
    /// Поворот в радианах
    pub rotation: f64,
    pub cell: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    /// Поселения идут первыми, в порядке убывания оценки
    pub instances: Vec<FeatureInstance>,
    /// Столица каждого региона (индекс в `instances`)
    pub capitals: Vec<Option<usize>>,
}

#[derive(Debug, Clone, Copy)]
pub struct PlacementSettings {
    pub min_feature_spacing: f64,
    pub settlement_count: usize,
    pub settlement_spacing: f64,
}

/// Всё, что размещению нужно знать о карте.
pub struct PlacementContext<'a> {
    pub graph: &'a Graph,
    pub elevation: &'a ElevationField,
    pub hydrology: &'a Hydrology,
    pub biomes: &'a BiomeMap,
    pub regions: &'a RegionMap,
}

impl PlacementContext<'_> {
    fn is_land(&self, cell: usize) -> bool {
        !self.hydrology.is_water(self.elevation, cell)
    }

    /// Оценка ячейки для поселения без случайной добавки.
    fn settlement_score(&self, cell: usize) -> f64 {
        let c = &self.graph.cells[cell];
        let coast = c.neighbors.iter().any(|&n| !self.is_land(n));
        let river = c.corners.iter().any(|&k| self.hydrology.river_corner[k]);
        let (lo, hi) = c
            .corners
            .iter()
            .map(|&k| self.elevation.corner_elevation[k])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), e| {
                (lo.min(e), hi.max(e))
            });
        let flatness = (1.0 - (hi - lo) * 10.0).clamp(0.0, 1.0);

        let mut score = 0.5 * flatness;
        if coast {
            score += 1.0;
        }
        if river {
            score += 1.0;
        }
        score
    }
}

/// Случайная точка внутри выпуклого многоугольника ячейки.
fn sample_in_cell(graph: &Graph, cell: usize, rng: &mut ChaCha8Rng) -> Point {
    let c = &graph.cells[cell];
    let center = c.centroid;
    let n = c.corners.len();
    let triangles: Vec<(Point, Point, f64)> = (0..n)
        .map(|i| {
            let a = graph.corners[c.corners[i]].position;
            let b = graph.corners[c.corners[(i + 1) % n]].position;
            (a, b, cross(center, a, b).abs() * 0.5)
        })
        .collect();
    let total: f64 = triangles.iter().map(|t| t.2).sum();
    if total <= 0.0 {
        return center;
    }

    let mut pick = rng.gen_range(0.0..total);
    let (a, b, _) = triangles
        .iter()
        .copied()
        .find(|t| {
            if pick < t.2 {
                true
            } else {
                pick -= t.2;
                false
            }
        })
        .unwrap_or(triangles[n - 1]);

    let mut u: f64 = rng.gen_range(0.0..1.0);
    let mut v: f64 = rng.gen_range(0.0..1.0);
    if u + v > 1.0 {
        u = 1.0 - u;
        v = 1.0 - v;
    }
    Point::new(
        center.x + u * (a.x - center.x) + v * (b.x - center.x),
        center.y + u * (a.y - center.y) + v * (b.y - center.y),
    )
}

/// Целое число объектов с математическим ожиданием `density`.
fn expected_count(density: f64, rng: &mut ChaCha8Rng) -> usize {
    let whole = density.floor();
    let fraction = density - whole;
    whole as usize + usize::from(fraction > 0.0 && rng.gen_bool(fraction.min(1.0)))
}

/// Размещает все объекты.
#[must_use]
pub fn place_features(
    ctx: &PlacementContext<'_>,
    table: &FeatureDensityTable,
    settings: &PlacementSettings,
    rng: &mut ChaCha8Rng,
) -> FeatureLayout {
    let graph = ctx.graph;
    let mut exclusive = SpacingIndex::new(graph);
    let mut settlement_index = SpacingIndex::new(graph);
    let mut instances: Vec<FeatureInstance> = Vec::new();
    let mut capitals: Vec<Option<usize>> = vec![None; ctx.regions.regions.len()];

    // === 1. Поселения ===
    let mut candidates: Vec<(f64, usize)> = graph
        .cells
        .iter()
        .filter(|c| !c.border && ctx.is_land(c.id))
        .map(|c| (ctx.settlement_score(c.id) + rng.gen_range(0.0..0.25), c.id))
        .collect();
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

    let settlement_radius = settings.settlement_spacing.max(settings.min_feature_spacing);
    for &(_, cell) in &candidates {
        if instances.len() >= settings.settlement_count {
            break;
        }
        let p = graph.cells[cell].centroid;
        if !settlement_index.is_clear(graph, cell, p, settlement_radius)
            || !exclusive.is_clear(graph, cell, p, settings.min_feature_spacing)
        {
            continue;
        }
        settlement_index.insert(cell, p);
        exclusive.insert(cell, p);
        if let Some(region) = ctx.regions.cell_region[cell]
            && capitals[region].is_none()
        {
            capitals[region] = Some(instances.len());
        }
        instances.push(FeatureInstance {
            kind: FeatureKind::Settlement,
            position: p,
            scale: 1.0,
            rotation: 0.0,
            cell,
        });
    }
    if instances.len() < settings.settlement_count {
        log::warn!(
            "размещено поселений: {} из {} (не хватило места)",
            instances.len(),
            settings.settlement_count
        );
    }

    // === 2. Объекты по таблице ===
    let settlements = instances.len();
    for cell in graph.cells.iter().filter(|c| ctx.is_land(c.id)) {
        let biome = ctx.biomes.get(cell.id);
        let elevation = ctx.elevation.cell_elevation[cell.id];
        for rule in table.rules.iter().filter(|r| r.matches(biome, elevation)) {
            for _ in 0..expected_count(rule.density, rng) {
                let p = sample_in_cell(graph, cell.id, rng);
                let scale = rng.gen_range(rule.min_scale..=rule.max_scale);
                let rotation = rng.gen_range(-0.15..=0.15);
                if !exclusive.is_clear(graph, cell.id, p, settings.min_feature_spacing) {
                    continue;
                }
                if rule.exclusive {
                    exclusive.insert(cell.id, p);
                }
                instances.push(FeatureInstance {
                    kind: rule.kind,
                    position: p,
                    scale,
                    rotation,
                    cell: cell.id,
                });
            }
        }
    }

    log::debug!(
        "объекты: {} поселений, {} прочих",
        settlements,
        instances.len() - settlements
    );
    FeatureLayout {
        instances,
        capitals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_is_valid() {
        FeatureDensityTable::default().validate().unwrap();
    }

    #[test]
    fn settlement_rules_are_rejected() {
        let mut table = FeatureDensityTable::default();
        table.rules[0].kind = FeatureKind::Settlement;
        assert!(table.validate().is_err());

        let mut table = FeatureDensityTable::default();
        table.rules[1].density = -1.0;
        assert!(table.validate().is_err());
    }

    #[test]
    fn huge_density_is_rejected() {
        let mut table = FeatureDensityTable::default();
        table.rules[2].density = 1e18;
        assert!(table.validate().is_err());
        table.rules[2].density = f64::NAN;
        assert!(table.validate().is_err());
        table.rules[2].density = MAX_DENSITY;
        table.validate().unwrap();
    }

    #[test]
    fn expected_count_averages_to_density() {
        use rand::SeedableRng;
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let total: usize = (0..10_000).map(|_| expected_count(2.3, &mut rng)).sum();
        let mean = total as f64 / 10_000.0;
        assert!((mean - 2.3).abs() < 0.05, "mean {mean}");
        assert_eq!(expected_count(3.0, &mut rng), 3);
    }

    #[test]
    fn settlements_prefer_coast_river_and_flat_cells() {
        use rand::SeedableRng;
        let world = fixture::World::new(17);
        let ctx = world.context();
        let layout = place_features(
            &ctx,
            &FeatureDensityTable::default(),
            &fixture::settings(),
            &mut ChaCha8Rng::seed_from_u64(1),
        );

        let eligible: Vec<usize> = world
            .graph
            .cells
            .iter()
            .filter(|c| !c.border && ctx.is_land(c.id))
            .map(|c| c.id)
            .collect();
        let best = eligible
            .iter()
            .map(|&c| ctx.settlement_score(c))
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(best >= 1.0, "the world has a coast");

        let settlements: Vec<&FeatureInstance> = layout
            .instances
            .iter()
            .take_while(|f| f.kind == FeatureKind::Settlement)
            .collect();
        assert!(!settlements.is_empty());
        // Первое поселение уступает лучшей ячейке не больше, чем на случайную добавку
        let first = ctx.settlement_score(settlements[0].cell);
        assert!(first + 0.25 >= best);

        let graph = &world.graph;
        for settlement in &settlements {
            let c = &graph.cells[settlement.cell];
            let coast = c.neighbors.iter().any(|&n| !ctx.is_land(n));
            let river = c.corners.iter().any(|&k| world.hydrology.river_corner[k]);
            let score = ctx.settlement_score(c.id);
            assert_eq!(score >= 1.0, coast || river);
            assert!(score <= 0.5 + f64::from(u8::from(coast)) + f64::from(u8::from(river)));
        }
        let mean = |cells: &mut dyn Iterator<Item = usize>| {
            let scores: Vec<f64> = cells.map(|c| ctx.settlement_score(c)).collect();
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        assert!(
            mean(&mut settlements.iter().map(|f| f.cell)) > mean(&mut eligible.iter().copied())
        );
    }

    #[test]
    fn capital_is_the_first_and_best_settlement_of_its_region() {
        use rand::SeedableRng;
        let world = fixture::World::new(23);
        let ctx = world.context();
        let layout = place_features(
            &ctx,
            &FeatureDensityTable::default(),
            &fixture::settings(),
            &mut ChaCha8Rng::seed_from_u64(2),
        );
        assert_eq!(layout.capitals.len(), world.regions.regions.len());

        for (region, capital) in layout.capitals.iter().enumerate() {
            let members: Vec<usize> = layout
                .instances
                .iter()
                .enumerate()
                .filter(|(_, f)| {
                    f.kind == FeatureKind::Settlement
                        && world.regions.cell_region[f.cell] == Some(region)
                })
                .map(|(i, _)| i)
                .collect();
            assert_eq!(*capital, members.first().copied(), "region {region}");
            if let Some(capital) = capital {
                let top = ctx.settlement_score(layout.instances[*capital].cell);
                for &other in &members {
                    let score = ctx.settlement_score(layout.instances[other].cell);
                    assert!(top + 0.25 >= score);
                }
            }
        }
    }

    #[test]
    fn placement_is_deterministic_in_content_and_order() {
        use rand::SeedableRng;
        let world = fixture::World::new(5);
        let ctx = world.context();
        let place = |seed: u64| {
            place_features(
                &ctx,
                &FeatureDensityTable::default(),
                &fixture::settings(),
                &mut ChaCha8Rng::seed_from_u64(seed),
            )
        };
        let a = place(9);
        assert_eq!(a, place(9));
        assert!(a.instances.len() > a.capitals.iter().flatten().count());
        assert_ne!(a.instances, place(10).instances);
    }

    #[test]
    fn rule_elevation_range_is_half_open() {
        let rule = FeatureDensityTable::default().rules[1].clone();
        assert!(rule.matches(Biome::Grassland, 0.68));
        assert!(!rule.matches(Biome::Grassland, 0.78));
    }
}
