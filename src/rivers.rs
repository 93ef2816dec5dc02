//! Гидрология: сток по углам, котловины озёр, накопление потока, реки и влажность
//!
//! Вода течёт по углам графа. Сток: вниз к соседу с наименьшей парой
//! `(высота, id)`; углы без более низкого соседа (ямы) заполняются озёрами, пока
//! котловина не найдёт выход или не станет слишком большой (бессточное озеро).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::MoistureSettings;
use crate::elevation::{ElevationField, WaterType};
use crate::error::GenerationError;
use crate::mesh::Graph;

/// Параметры гидрологии
#[derive(Debug, Clone)]
pub struct HydrologySettings {
    pub river_flow_threshold: f64,
    pub max_flow_hops: usize,
    pub max_lake_corners: usize,
    pub moisture: MoistureSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct River {
    pub id: usize,
    /// Углы от истока к устью; высота не возрастает
    pub corners: Vec<usize>,
    /// Длина собственного русла: начальные углы до впадения в более полноводную реку
    /// (угол слияния включён). Дальше русло принадлежит главной реке.
    pub own_length: usize,
    /// Накопленный поток у устья
    pub discharge: f64,
    pub name: Option<String>,
}

/// Котловина, заполненная при обработке одной ямы
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LakeBasin {
    pub pit: usize,
    pub corners: Vec<usize>,
    /// Угол, через который вытекает озеро; `None`: бессточное озеро
    pub outlet: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hydrology {
    /// Сосед с наименьшей парой `(высота, id)`, если он ниже угла
    pub downslope: Vec<Option<usize>>,
    /// Итоговое направление стока с учётом выходов из озёр
    pub flow_target: Vec<Option<usize>>,
    pub flow: Vec<f64>,
    pub lake_corner: Vec<bool>,
    pub lakes: Vec<LakeBasin>,
    /// Индексы бессточных озёр в `lakes`
    pub endorheic_lakes: Vec<usize>,
    /// Ячейка: озеро (по классификации высот или по заполненной котловине)
    pub cell_lake: Vec<bool>,
    pub river_corner: Vec<bool>,
    pub rivers: Vec<River>,
    pub corner_moisture: Vec<f64>,
    pub cell_moisture: Vec<f64>,
    /// Сколько углов пришлось перенаправить при разрыве циклов стока
    pub rerouted_corners: usize,
}

impl Hydrology {
    /// Ячейка покрыта водой: океан, озеро по высотам или озеро котловины.
    #[must_use]
    pub fn is_water(&self, elevation: &ElevationField, cell: usize) -> bool {
        elevation.cell_water[cell].is_water() || self.cell_lake[cell]
    }
}

/// Элемент кучи с минимумом по `(высота, id)`
#[derive(Debug, Clone, Copy)]
struct Level {
    elevation: f64,
    corner: usize,
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Level {}

// Обратный порядок: BinaryHeap становится min-heap.
impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| other.corner.cmp(&self.corner))
    }
}

/// Элемент кучи с максимумом по влажности (при равенстве: меньший id)
#[derive(Debug, Clone, Copy)]
struct Wet {
    moisture: f64,
    corner: usize,
}

impl PartialEq for Wet {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Wet {}

impl PartialOrd for Wet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Wet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.moisture
            .total_cmp(&other.moisture)
            .then_with(|| other.corner.cmp(&self.corner))
    }
}

/// Строго ли угол `a` ниже угла `b` по паре `(высота, id)`.
fn lower(elevation: &[f64], a: usize, b: usize) -> bool {
    elevation[a]
        .total_cmp(&elevation[b])
        .then(a.cmp(&b))
        .is_lt()
}

/// Сток вниз для каждого угла, не являющегося стоком.
#[must_use]
pub fn compute_downslope(graph: &Graph, elevation: &[f64], sink: &[bool]) -> Vec<Option<usize>> {
    graph
        .corners
        .iter()
        .map(|corner| {
            if sink[corner.id] {
                return None;
            }
            let lowest = corner
                .adjacent
                .iter()
                .copied()
                .reduce(|best, a| if lower(elevation, a, best) { a } else { best })?;
            lower(elevation, lowest, corner.id).then_some(lowest)
        })
        .collect()
}

/// Заполнение ям озёрами.
struct LakeFiller<'a> {
    graph: &'a Graph,
    elevation: &'a [f64],
    sink: &'a [bool],
    max_flow_hops: usize,
    max_lake_corners: usize,
    flow_target: Vec<Option<usize>>,
    lake_of: Vec<Option<usize>>,
    lakes: Vec<LakeBasin>,
}

impl LakeFiller<'_> {
    /// Доходит ли сток из `start` до стока или уже решённого озера за `max_flow_hops`
    /// шагов, не заходя в текущую котловину.
    fn drains(&self, start: usize, basin: &HashSet<usize>) -> bool {
        let mut current = start;
        for _ in 0..=self.max_flow_hops {
            if basin.contains(&current) {
                return false;
            }
            if self.sink[current] || self.lake_of[current].is_some() {
                return true;
            }
            match self.flow_target[current] {
                Some(next) => current = next,
                None => return false,
            }
        }
        false
    }

    fn fill(&mut self, pit: usize) {
        let mut basin: HashSet<usize> = HashSet::new();
        let mut order: Vec<usize> = Vec::new();
        let mut seen: HashSet<usize> = HashSet::from([pit]);
        let mut heap = BinaryHeap::from([Level {
            elevation: self.elevation[pit],
            corner: pit,
        }]);

        let mut outlet = None;
        while let Some(Level { corner, .. }) = heap.pop() {
            if corner != pit && self.drains(corner, &basin) {
                outlet = Some(corner);
                break;
            }
            basin.insert(corner);
            order.push(corner);
            if order.len() > self.max_lake_corners {
                break;
            }
            for &a in &self.graph.corners[corner].adjacent {
                if seen.insert(a) {
                    heap.push(Level {
                        elevation: self.elevation[a],
                        corner: a,
                    });
                }
            }
        }

        let lake_id = self.lakes.len();
        for &c in &order {
            self.lake_of[c] = Some(lake_id);
            // Вложенные ямы уходят туда же, куда и главная
            if self.flow_target[c].is_none() && c != pit {
                self.flow_target[c] = Some(outlet.unwrap_or(pit));
            }
        }
        self.flow_target[pit] = outlet;
        self.lakes.push(LakeBasin {
            pit,
            corners: order,
            outlet,
        });
    }
}

/// Разрывает циклы стока: при повторном заходе на путь угол перенаправляется на самого
/// низкого соседа, которого ещё нет на пути.
///
/// # Возвращает
/// Количество перенаправленных углов.
///
/// # Ошибки
/// `GenerationFailure`, если такого соседа нет.
pub fn break_cycles(
    graph: &Graph,
    elevation: &[f64],
    flow_target: &mut [Option<usize>],
) -> Result<usize, GenerationError> {
    let total = flow_target.len();
    let mut done = vec![false; total];
    let mut rerouted = 0;

    for start in 0..total {
        if done[start] {
            continue;
        }
        let mut path: Vec<usize> = vec![start];
        let mut on_path: HashSet<usize> = HashSet::from([start]);
        let mut current = start;
        while let Some(next) = flow_target[current] {
            if done[next] {
                break;
            }
            if on_path.contains(&next) {
                let replacement = graph.corners[current]
                    .adjacent
                    .iter()
                    .copied()
                    .filter(|a| !on_path.contains(a))
                    .reduce(|best, a| if lower(elevation, a, best) { a } else { best })
                    .ok_or_else(|| {
                        GenerationError::failure(
                            "hydrology",
                            format!("flow cycle through corner {current} cannot be broken"),
                        )
                    })?;
                log::debug!("цикл стока через угол {current}, перенаправлен в {replacement}");
                flow_target[current] = Some(replacement);
                rerouted += 1;
                continue;
            }
            path.push(next);
            on_path.insert(next);
            current = next;
        }
        for c in path {
            done[c] = true;
        }
    }
    Ok(rerouted)
}

/// Накопление потока по Кану: `flow = 1 + Σ flow(выше по течению)`.
///
/// # Ошибки
/// `GenerationFailure`, если граф стока содержит цикл.
pub fn accumulate_flow(flow_target: &[Option<usize>]) -> Result<Vec<f64>, GenerationError> {
    let total = flow_target.len();
    let mut indegree = vec![0usize; total];
    for &t in flow_target.iter().flatten() {
        indegree[t] += 1;
    }
    let mut flow = vec![1.0; total];
    let mut queue: VecDeque<usize> = (0..total).filter(|&c| indegree[c] == 0).collect();
    let mut processed = 0;

    while let Some(c) = queue.pop_front() {
        processed += 1;
        if let Some(t) = flow_target[c] {
            flow[t] += flow[c];
            indegree[t] -= 1;
            if indegree[t] == 0 {
                queue.push_back(t);
            }
        }
    }

    if processed != total {
        return Err(GenerationError::failure(
            "hydrology",
            format!("{} corners are part of a flow cycle", total - processed),
        ));
    }
    Ok(flow)
}

/// Трассирует реки от каждого истока до первого стока или угла озера.
///
/// В каждом угле главным притоком считается речной угол с наибольшим потоком (при
/// равенстве: меньший id). Река, пришедшая в угол не главным притоком, там впадает в
/// другую: её собственное русло заканчивается, но путь прослеживается до устья.
fn trace_rivers(
    flow_target: &[Option<usize>],
    flow: &[f64],
    terminal: &[bool],
    river_corner: &[bool],
) -> Vec<River> {
    let total = flow_target.len();
    let mut main_upstream: Vec<Option<usize>> = vec![None; total];
    for c in (0..total).filter(|&c| river_corner[c]) {
        if let Some(t) = flow_target[c] {
            let better = match main_upstream[t] {
                None => true,
                Some(best) => flow[c] > flow[best],
            };
            if better {
                main_upstream[t] = Some(c);
            }
        }
    }

    let mut rivers = Vec::new();
    for source in (0..total).filter(|&c| river_corner[c] && main_upstream[c].is_none()) {
        let mut corners = vec![source];
        let mut own_length = None;
        let mut current = source;
        while let Some(next) = flow_target[current] {
            corners.push(next);
            if own_length.is_none() && main_upstream[next] != Some(current) {
                own_length = Some(corners.len());
            }
            if terminal[next] || corners.len() > total {
                break;
            }
            current = next;
        }
        if corners.len() < 2 {
            continue;
        }
        let discharge = corners.iter().map(|&c| flow[c]).fold(0.0, f64::max);
        rivers.push(River {
            id: rivers.len(),
            own_length: own_length.unwrap_or(corners.len()),
            corners,
            discharge,
            name: None,
        });
    }
    rivers
}

/// Распространение влажности от источников с затуханием `decay` на каждом шаге.
fn spread_moisture(graph: &Graph, sources: Vec<f64>, decay: f64) -> Vec<f64> {
    let mut moisture = sources;
    let mut heap: BinaryHeap<Wet> = moisture
        .iter()
        .enumerate()
        .filter(|&(_, &m)| m > 0.0)
        .map(|(corner, &m)| Wet {
            moisture: m,
            corner,
        })
        .collect();

    while let Some(Wet { moisture: m, corner }) = heap.pop() {
        if m < moisture[corner] {
            continue;
        }
        let spread = m * decay;
        if spread < 1e-4 {
            continue;
        }
        for &a in &graph.corners[corner].adjacent {
            if spread > moisture[a] {
                moisture[a] = spread;
                heap.push(Wet {
                    moisture: spread,
                    corner: a,
                });
            }
        }
    }
    moisture
}

/// Перераспределяет значения суши по рангу в `[0, 1]`; вода получает `1.0`.
fn redistribute_by_rank(values: &mut [f64], is_water: &[bool]) {
    let mut land: Vec<usize> = (0..values.len()).filter(|&i| !is_water[i]).collect();
    land.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then(a.cmp(&b)));
    let n = land.len();
    for (rank, &i) in land.iter().enumerate() {
        values[i] = if n > 1 {
            rank as f64 / (n - 1) as f64
        } else {
            0.5
        };
    }
    for (i, v) in values.iter_mut().enumerate() {
        if is_water[i] {
            *v = 1.0;
        }
    }
}

/// Полная стадия гидрологии.
///
/// # Ошибки
/// `GenerationFailure`, если цикл стока невозможно разорвать.
pub fn solve_hydrology(
    graph: &Graph,
    field: &ElevationField,
    settings: &HydrologySettings,
) -> Result<Hydrology, GenerationError> {
    let corner_count = graph.corners.len();
    let elevation = &field.corner_elevation;
    let sink: Vec<bool> = graph
        .corners
        .iter()
        .map(|c| c.border || field.corner_water[c.id])
        .collect();

    // === 1. Сток вниз ===
    let downslope = compute_downslope(graph, elevation, &sink);

    // === 2. Озёра в ямах ===
    let mut pits: Vec<usize> = (0..corner_count)
        .filter(|&c| !sink[c] && downslope[c].is_none())
        .collect();
    pits.sort_by(|&a, &b| elevation[a].total_cmp(&elevation[b]).then(a.cmp(&b)));

    let mut filler = LakeFiller {
        graph,
        elevation,
        sink: &sink,
        max_flow_hops: settings.max_flow_hops,
        max_lake_corners: settings.max_lake_corners,
        flow_target: downslope.clone(),
        lake_of: vec![None; corner_count],
        lakes: Vec::new(),
    };
    for &pit in &pits {
        if filler.lake_of[pit].is_none() {
            filler.fill(pit);
        }
    }
    let LakeFiller {
        mut flow_target,
        lake_of,
        lakes,
        ..
    } = filler;
    let lake_corner: Vec<bool> = lake_of.iter().map(Option::is_some).collect();
    let endorheic_lakes: Vec<usize> = lakes
        .iter()
        .enumerate()
        .filter(|(_, l)| l.outlet.is_none())
        .map(|(i, _)| i)
        .collect();

    // === 3. Защита от циклов и накопление ===
    let rerouted_corners = break_cycles(graph, elevation, &mut flow_target)?;
    let flow = accumulate_flow(&flow_target)?;

    // === 4. Ячейки-озёра ===
    let cell_lake: Vec<bool> = graph
        .cells
        .iter()
        .map(|cell| match field.cell_water[cell.id] {
            WaterType::Lake => true,
            WaterType::Ocean => false,
            WaterType::Land => {
                let lake_corners = cell.corners.iter().filter(|&&c| lake_corner[c]).count();
                let touches_ocean = cell
                    .neighbors
                    .iter()
                    .any(|&n| field.cell_water[n] == WaterType::Ocean);
                lake_corners * 2 > cell.corners.len() && !touches_ocean
            }
        })
        .collect();

    // === 5. Реки ===
    let river_corner: Vec<bool> = (0..corner_count)
        .map(|c| flow[c] > settings.river_flow_threshold && !sink[c] && !lake_corner[c])
        .collect();
    let terminal: Vec<bool> = (0..corner_count)
        .map(|c| sink[c] || lake_corner[c])
        .collect();
    let rivers = trace_rivers(&flow_target, &flow, &terminal, &river_corner);

    // === 6. Влажность ===
    let m = &settings.moisture;
    let sources: Vec<f64> = graph
        .corners
        .iter()
        .map(|corner| {
            let c = corner.id;
            let mut value: f64 = 0.0;
            if field.corner_ocean[c] {
                value = value.max(m.ocean_moisture);
            }
            let touches_lake = corner.touches.iter().any(|&t| cell_lake[t]);
            if lake_corner[c] || touches_lake {
                value = value.max(m.lake_moisture);
            }
            if river_corner[c] {
                value = value.max((0.2 * flow[c].sqrt()).min(1.0) * m.river_moisture);
            }
            value
        })
        .collect();
    let corner_moisture = spread_moisture(graph, sources, m.moisture_decay);

    let mut cell_moisture: Vec<f64> = graph
        .cells
        .iter()
        .map(|cell| {
            cell.corners.iter().map(|&c| corner_moisture[c]).sum::<f64>()
                / cell.corners.len().max(1) as f64
        })
        .collect();
    let cell_is_water: Vec<bool> = (0..graph.cells.len())
        .map(|i| field.cell_water[i].is_water() || cell_lake[i])
        .collect();
    redistribute_by_rank(&mut cell_moisture, &cell_is_water);

    log::debug!(
        "гидрология: {} рек, {} озёр ({} бессточных)",
        rivers.len(),
        lakes.len(),
        endorheic_lakes.len()
    );

    Ok(Hydrology {
        downslope,
        flow_target,
        flow,
        lake_corner,
        lakes,
        endorheic_lakes,
        cell_lake,
        river_corner,
        rivers,
        corner_moisture,
        cell_moisture,
        rerouted_corners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LandShape;
    use crate::elevation::{ElevationSettings, generate_elevation};
    use crate::mesh::{MeshSettings, generate_mesh};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world(seed: u64) -> (Graph, ElevationField) {
        let mesh = MeshSettings {
            point_count: 400,
            relaxation_iterations: 2,
            jittered_grid: false,
            width: 600.0,
            height: 450.0,
        };
        let graph = generate_mesh(&mesh, &mut ChaCha8Rng::seed_from_u64(seed)).unwrap();
        let field = generate_elevation(
            &graph,
            &ElevationSettings {
                noise_seed: seed as i32,
                octaves: 5,
                persistence: 0.5,
                lacunarity: 2.0,
                frequency: 3.0,
                land_shape: LandShape::Continent,
                shape_bias: 0.8,
                ocean_threshold: 0.4,
            },
        )
        .unwrap();
        (graph, field)
    }

    fn settings() -> HydrologySettings {
        HydrologySettings {
            river_flow_threshold: 4.0,
            max_flow_hops: 4096,
            max_lake_corners: 64,
            moisture: MoistureSettings::default(),
        }
    }

    #[test]
    fn equal_elevation_picks_lowest_id() {
        let (graph, _) = world(3);
        let corner = graph
            .corners
            .iter()
            .find(|c| !c.border && c.adjacent.len() >= 3)
            .unwrap();
        let mut elevation = vec![0.9; graph.corners.len()];
        for &a in &corner.adjacent {
            elevation[a] = 0.2;
        }
        let sink = vec![false; graph.corners.len()];
        let downslope = compute_downslope(&graph, &elevation, &sink);
        assert_eq!(downslope[corner.id], corner.adjacent.iter().copied().min());
    }

    #[test]
    fn rivers_run_downhill_to_water() {
        let (graph, field) = world(7);
        let hydro = solve_hydrology(&graph, &field, &settings()).unwrap();
        assert!(!hydro.rivers.is_empty());
        for river in &hydro.rivers {
            for pair in river.corners.windows(2) {
                assert!(
                    field.corner_elevation[pair[1]] <= field.corner_elevation[pair[0]],
                    "river {} climbs",
                    river.id
                );
            }
            let last = *river.corners.last().unwrap();
            assert!(
                field.corner_water[last]
                    || graph.corners[last].border
                    || hydro.lake_corner[last]
            );
        }
    }

    #[test]
    fn flow_is_at_least_one_and_conserved_downstream() {
        let (graph, field) = world(11);
        let hydro = solve_hydrology(&graph, &field, &settings()).unwrap();
        for c in 0..graph.corners.len() {
            assert!(hydro.flow[c] >= 1.0);
            if let Some(t) = hydro.flow_target[c] {
                assert!(hydro.flow[t] > hydro.flow[c]);
            }
        }
    }

    #[test]
    fn moisture_is_normalized_and_water_is_saturated() {
        let (graph, field) = world(5);
        let hydro = solve_hydrology(&graph, &field, &settings()).unwrap();
        for cell in &graph.cells {
            let m = hydro.cell_moisture[cell.id];
            assert!((0.0..=1.0).contains(&m));
            if hydro.is_water(&field, cell.id) {
                assert!((m - 1.0).abs() < f64::EPSILON);
            }
        }
    }

    #[test]
    fn each_river_segment_has_one_owner() {
        let (graph, field) = world(7);
        let hydro = solve_hydrology(&graph, &field, &settings()).unwrap();
        let mut owned: HashSet<(usize, usize)> = HashSet::new();
        for river in &hydro.rivers {
            assert!(river.own_length >= 2 && river.own_length <= river.corners.len());
            for pair in river.corners[..river.own_length].windows(2) {
                assert!(owned.insert((pair[0], pair[1])), "segment drawn twice");
            }
        }
        for river in &hydro.rivers {
            for pair in river.corners.windows(2) {
                if hydro.river_corner[pair[0]] {
                    assert!(owned.contains(&(pair[0], pair[1])));
                }
            }
        }
    }

    #[test]
    fn tributary_ends_its_course_at_the_confluence() {
        // 0 -> 2, 1 -> 2, 2 -> 3 (сток); приток 1 беднее притока 0
        let flow_target = vec![Some(2), Some(2), Some(3), None];
        let flow = vec![5.0, 3.0, 9.0, 10.0];
        let terminal = vec![false, false, false, true];
        let river_corner = vec![true, true, true, false];
        let rivers = trace_rivers(&flow_target, &flow, &terminal, &river_corner);
        assert_eq!(rivers.len(), 2);
        assert_eq!(rivers[0].corners, vec![0, 2, 3]);
        assert_eq!(rivers[0].own_length, 3);
        assert_eq!(rivers[1].corners, vec![1, 2, 3]);
        assert_eq!(rivers[1].own_length, 2);
    }

    #[test]
    fn kahn_detects_cycles() {
        let targets = vec![Some(1), Some(2), Some(0), None];
        assert!(accumulate_flow(&targets).is_err());
        let chain = vec![Some(1), Some(2), None];
        assert_eq!(accumulate_flow(&chain).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn cycle_guard_reroutes() {
        let (graph, _) = world(2);
        let a = graph.corners.iter().find(|c| !c.border).unwrap();
        let b = a.adjacent[0];
        let elevation = vec![0.5; graph.corners.len()];
        let mut targets = vec![None; graph.corners.len()];
        targets[a.id] = Some(b);
        targets[b] = Some(a.id);
        let rerouted = break_cycles(&graph, &elevation, &mut targets).unwrap();
        assert_eq!(rerouted, 1);
        assert!(accumulate_flow(&targets).is_ok());
    }

    #[test]
    fn hydrology_is_deterministic() {
        let (graph, field) = world(9);
        let a = solve_hydrology(&graph, &field, &settings()).unwrap();
        let b = solve_hydrology(&graph, &field, &settings()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.rerouted_corners, 0);
    }
}
