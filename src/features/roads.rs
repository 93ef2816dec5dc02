//! Дороги между поселениями
//!
//! Дорога идёт от центроида к центроиду соседних ячеек суши. Вес перехода: длина,
//! увеличенная по крутизне, так что дороги обходят склоны. Ячейки с горами
//! непроходимы, если в них нет поселения. Каждое поселение соединяется с одним-двумя
//! ближайшими поселениями своей проходимой области.

use std::collections::{BTreeSet, HashSet};
use std::f64::consts::PI;

use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::features::{FeatureKind, FeatureLayout, PlacementContext};
use crate::mesh::Graph;

#[derive(Debug, Clone, Copy)]
pub struct RoadSettings {
    /// Насколько крутизна удлиняет переход (0 = только расстояние)
    pub elevation_weight: f64,
    /// Наибольшее число ближайших соседей, с которыми соединяется поселение
    pub max_neighbors: usize,
}

/// Дорога между двумя поселениями (индексы в `FeatureLayout::instances`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub from: usize,
    pub to: usize,
    /// Ячейки маршрута от `from` к `to`
    pub cells: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadNetwork {
    pub roads: Vec<Road>,
    /// Ребро графа пересекается дорогой
    pub road_edge: Vec<bool>,
}

/// Стоимость перехода между соседними ячейками: длина плюс доля длины по углу
/// между высотами.
fn step_cost(graph: &Graph, ctx: &PlacementContext<'_>, a: usize, b: usize, weight: f64) -> f64 {
    let distance = graph.cells[a].centroid.distance(graph.cells[b].centroid);
    let (ea, eb) = (
        ctx.elevation.cell_elevation[a],
        ctx.elevation.cell_elevation[b],
    );
    let angle = ea.max(eb).atan2(ea.min(eb)) / PI;
    distance + distance * angle * weight
}

/// Ребро между двумя соседними ячейками
fn shared_edge(graph: &Graph, a: usize, b: usize) -> Option<usize> {
    graph.cells[a]
        .edges
        .iter()
        .copied()
        .find(|&e| graph.edges[e].other_cell(a) == Some(b))
}

/// Прокладывает дороги между размещёнными поселениями.
#[must_use]
pub fn build_roads(
    ctx: &PlacementContext<'_>,
    layout: &FeatureLayout,
    settings: &RoadSettings,
    rng: &mut ChaCha8Rng,
) -> RoadNetwork {
    let graph = ctx.graph;
    let mut network = RoadNetwork {
        roads: Vec::new(),
        road_edge: vec![false; graph.edges.len()],
    };

    let settlements: Vec<(usize, usize)> = layout
        .instances
        .iter()
        .enumerate()
        .filter(|(_, f)| f.kind == FeatureKind::Settlement)
        .map(|(i, f)| (i, f.cell))
        .collect();
    if settlements.len() < 2 || settings.max_neighbors == 0 {
        return network;
    }

    let towns: HashSet<usize> = settlements.iter().map(|&(_, cell)| cell).collect();
    let mountains: HashSet<usize> = layout
        .instances
        .iter()
        .filter(|f| f.kind == FeatureKind::Mountain)
        .map(|f| f.cell)
        .collect();
    let passable: Vec<bool> = (0..graph.cells.len())
        .map(|c| ctx.is_land(c) && (towns.contains(&c) || !mountains.contains(&c)))
        .collect();

    // Узел графа дорог совпадает по индексу с id ячейки
    let mut roads_graph: UnGraph<usize, f64> =
        UnGraph::with_capacity(graph.cells.len(), graph.edges.len());
    for cell in &graph.cells {
        roads_graph.add_node(cell.id);
    }
    let mut areas = UnionFind::new(graph.cells.len());
    for edge in &graph.edges {
        let [Some(a), Some(b)] = edge.cells else {
            continue;
        };
        if passable[a] && passable[b] {
            let cost = step_cost(graph, ctx, a, b, settings.elevation_weight);
            roads_graph.add_edge(NodeIndex::new(a), NodeIndex::new(b), cost);
            areas.union(a, b);
        }
    }

    // Пары поселений, упорядоченные для детерминизма
    let mut pairs: BTreeSet<(usize, usize)> = BTreeSet::new();
    for &(index, cell) in &settlements {
        let origin = graph.cells[cell].centroid;
        let mut nearby: Vec<(f64, usize)> = settlements
            .iter()
            .filter(|&&(other, other_cell)| other != index && areas.equiv(cell, other_cell))
            .map(|&(other, other_cell)| (graph.cells[other_cell].centroid.distance(origin), other))
            .collect();
        nearby.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let wanted = rng.gen_range(1..=settings.max_neighbors);
        for &(_, other) in nearby.iter().take(wanted) {
            pairs.insert((index.min(other), index.max(other)));
        }
    }

    let cell_of = |index: usize| layout.instances[index].cell;
    for (from, to) in pairs {
        let (start, goal) = (cell_of(from), cell_of(to));
        let target = graph.cells[goal].centroid;
        let Some((_, path)) = astar(
            &roads_graph,
            NodeIndex::new(start),
            |n| n.index() == goal,
            |e| *e.weight(),
            |n| graph.cells[n.index()].centroid.distance(target),
        ) else {
            continue;
        };
        let cells: Vec<usize> = path.iter().map(|n| n.index()).collect();
        if cells.len() < 2 {
            continue;
        }
        for pair in cells.windows(2) {
            if let Some(edge) = shared_edge(graph, pair[0], pair[1]) {
                network.road_edge[edge] = true;
            }
        }
        network.roads.push(Road { from, to, cells });
    }

    log::debug!(
        "дороги: {} маршрутов, {} рёбер",
        network.roads.len(),
        network.road_edge.iter().filter(|&&r| r).count()
    );
    network
}
