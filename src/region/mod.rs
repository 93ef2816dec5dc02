//! Политические регионы
//!
//! Суша делится на массивы (связные компоненты суши). Массивы меньше
//! `min_region_cells` остаются ничьими. Остальные получают зародыши регионов
//! пропорционально размеру (минимум один на массив), после чего регионы растут
//! одновременным обходом в ширину от всех зародышей.

pub mod graph;

use std::collections::VecDeque;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::mesh::{Graph, Point};

pub use graph::{build_region_graph, greedy_coloring};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: usize,
    /// Пусто до стадии имён
    pub name: String,
    /// Ячейки по возрастанию id
    pub cells: Vec<usize>,
    pub centroid: Point,
    /// Индекс столицы в списке объектов
    pub capital: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMap {
    pub regions: Vec<Region>,
    pub cell_region: Vec<Option<usize>>,
}

impl RegionMap {
    /// Рёбра, по обе стороны которых лежат разные регионы.
    #[must_use]
    pub fn boundary_edges(&self, graph: &Graph) -> Vec<usize> {
        graph
            .edges
            .iter()
            .filter(|e| match e.cells {
                [Some(a), Some(b)] => matches!(
                    (self.cell_region[a], self.cell_region[b]),
                    (Some(ra), Some(rb)) if ra != rb
                ),
                _ => false,
            })
            .map(|e| e.id)
            .collect()
    }
}

/// Связные компоненты суши в порядке наименьшего id.
#[must_use]
pub fn land_masses(graph: &Graph, is_land: &[bool]) -> Vec<Vec<usize>> {
    let mut seen = vec![false; graph.cells.len()];
    let mut masses = Vec::new();
    for start in 0..graph.cells.len() {
        if !is_land[start] || seen[start] {
            continue;
        }
        seen[start] = true;
        let mut mass = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            for &n in &graph.cells[id].neighbors {
                if is_land[n] && !seen[n] {
                    seen[n] = true;
                    mass.push(n);
                    queue.push_back(n);
                }
            }
        }
        mass.sort_unstable();
        masses.push(mass);
    }
    masses
}

/// Делит `total` зародышей между массивами пропорционально размеру, не меньше одного
/// на массив (метод наибольших остатков, при равенстве: меньший индекс).
#[must_use]
pub fn split_seeds(sizes: &[usize], total: usize) -> Vec<usize> {
    if sizes.is_empty() {
        return Vec::new();
    }
    let total = total.max(sizes.len());
    let sum: usize = sizes.iter().sum();
    let extra = total - sizes.len();
    let shares: Vec<f64> = sizes
        .iter()
        .map(|&s| extra as f64 * s as f64 / sum.max(1) as f64)
        .collect();
    let mut counts: Vec<usize> = shares.iter().map(|s| 1 + s.floor() as usize).collect();
    let mut remaining = total - counts.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = shares[a] - shares[a].floor();
        let rb = shares[b] - shares[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        counts[i] += 1;
        remaining -= 1;
    }
    // Регионов не больше, чем ячеек в массиве
    for (c, &s) in counts.iter_mut().zip(sizes) {
        *c = (*c).min(s);
    }
    counts
}

/// Расстояния в шагах по суше от набора источников.
fn hop_distances(graph: &Graph, is_land: &[bool], sources: &[usize]) -> Vec<usize> {
    let mut dist = vec![usize::MAX; graph.cells.len()];
    let mut queue = VecDeque::new();
    for &s in sources {
        dist[s] = 0;
        queue.push_back(s);
    }
    while let Some(id) = queue.pop_front() {
        for &n in &graph.cells[id].neighbors {
            if is_land[n] && dist[n] == usize::MAX {
                dist[n] = dist[id] + 1;
                queue.push_back(n);
            }
        }
    }
    dist
}

/// Зародыши внутри массива: первый случайный, каждый следующий: самая далёкая от уже
/// выбранных ячейка.
fn pick_seeds(
    graph: &Graph,
    is_land: &[bool],
    mass: &[usize],
    count: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<usize> {
    let mut seeds = vec![mass[rng.gen_range(0..mass.len())]];
    while seeds.len() < count {
        let dist = hop_distances(graph, is_land, &seeds);
        let farthest = mass
            .iter()
            .copied()
            .filter(|&c| dist[c] != usize::MAX)
            .max_by(|&a, &b| dist[a].cmp(&dist[b]).then(b.cmp(&a)));
        match farthest {
            Some(c) if dist[c] > 0 => seeds.push(c),
            _ => break,
        }
    }
    seeds
}

/// Строит регионы.
#[must_use]
pub fn build_regions(
    graph: &Graph,
    is_land: &[bool],
    region_count: usize,
    min_region_cells: usize,
    rng: &mut ChaCha8Rng,
) -> RegionMap {
    let masses: Vec<Vec<usize>> = land_masses(graph, is_land)
        .into_iter()
        .filter(|m| m.len() >= min_region_cells.max(1))
        .collect();
    let sizes: Vec<usize> = masses.iter().map(Vec::len).collect();
    let counts = split_seeds(&sizes, region_count);

    let mut cell_region: Vec<Option<usize>> = vec![None; graph.cells.len()];
    let mut queue = VecDeque::new();
    let mut region_total = 0;
    for (mass, &count) in masses.iter().zip(&counts) {
        for seed in pick_seeds(graph, is_land, mass, count, rng) {
            cell_region[seed] = Some(region_total);
            queue.push_back(seed);
            region_total += 1;
        }
    }

    while let Some(id) = queue.pop_front() {
        let region = cell_region[id];
        for &n in &graph.cells[id].neighbors {
            if is_land[n] && cell_region[n].is_none() {
                cell_region[n] = region;
                queue.push_back(n);
            }
        }
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); region_total];
    for (cell, region) in cell_region.iter().enumerate() {
        if let Some(r) = region {
            members[*r].push(cell);
        }
    }

    let regions = members
        .into_iter()
        .enumerate()
        .map(|(id, cells)| {
            let area: f64 = cells.iter().map(|&c| graph.cells[c].area).sum();
            let (sx, sy) = cells.iter().fold((0.0, 0.0), |(sx, sy), &c| {
                let cell = &graph.cells[c];
                (sx + cell.centroid.x * cell.area, sy + cell.centroid.y * cell.area)
            });
            Region {
                id,
                name: String::new(),
                cells,
                centroid: Point::new(sx / area.max(f64::MIN_POSITIVE), sy / area.max(f64::MIN_POSITIVE)),
                capital: None,
            }
        })
        .collect::<Vec<_>>();

    log::debug!(
        "регионы: {} на {} массивах суши",
        regions.len(),
        masses.len()
    );
    RegionMap {
        regions,
        cell_region,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshSettings, generate_mesh};
    use rand::SeedableRng;

    fn graph() -> Graph {
        let settings = MeshSettings {
            point_count: 300,
            relaxation_iterations: 1,
            jittered_grid: true,
            width: 600.0,
            height: 400.0,
        };
        generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(13)).unwrap()
    }

    #[test]
    fn seeds_follow_mass_size() {
        assert_eq!(split_seeds(&[100, 50, 50], 8), vec![4, 2, 2]);
        assert_eq!(split_seeds(&[10, 10], 1), vec![1, 1]);
        assert_eq!(split_seeds(&[3], 10), vec![3]);
        assert!(split_seeds(&[], 5).is_empty());
    }

    #[test]
    fn regions_are_connected_and_cover_large_masses() {
        let g = graph();
        let is_land: Vec<bool> = g.cells.iter().map(|c| !c.border).collect();
        let map = build_regions(&g, &is_land, 6, 4, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(map.regions.len(), 6);

        for (cell, region) in map.cell_region.iter().enumerate() {
            assert_eq!(region.is_some(), is_land[cell]);
        }
        for region in &map.regions {
            let inside: Vec<bool> = (0..g.cells.len())
                .map(|c| map.cell_region[c] == Some(region.id))
                .collect();
            let parts = land_masses(&g, &inside);
            assert_eq!(parts.len(), 1, "region {} is split", region.id);
        }
    }

    #[test]
    fn tiny_masses_get_no_region() {
        let g = graph();
        let island = g.cells.iter().find(|c| !c.border).unwrap().id;
        let mut is_land = vec![false; g.cells.len()];
        is_land[island] = true;
        let map = build_regions(&g, &is_land, 4, 2, &mut ChaCha8Rng::seed_from_u64(1));
        assert!(map.regions.is_empty());
        assert!(map.cell_region.iter().all(Option::is_none));
    }

    #[test]
    fn boundaries_separate_different_regions() {
        let g = graph();
        let is_land: Vec<bool> = g.cells.iter().map(|c| !c.border).collect();
        let map = build_regions(&g, &is_land, 5, 4, &mut ChaCha8Rng::seed_from_u64(2));
        let boundary = map.boundary_edges(&g);
        assert!(!boundary.is_empty());
        for e in boundary {
            let [Some(a), Some(b)] = g.edges[e].cells else {
                panic!("boundary edge without two cells");
            };
            assert_ne!(map.cell_region[a], map.cell_region[b]);
        }
    }
}
