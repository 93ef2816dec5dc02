use std::collections::HashSet;

use petgraph::graph::{NodeIndex, UnGraph};

use crate::mesh::Graph;
use crate::region::RegionMap;

/// Граф смежности регионов: вес узла: id региона, ребро: общая граница.
#[must_use]
pub fn build_region_graph(graph: &Graph, regions: &RegionMap) -> UnGraph<usize, ()> {
    let mut adjacency = UnGraph::new_undirected();
    let nodes: Vec<NodeIndex> = regions
        .regions
        .iter()
        .map(|r| adjacency.add_node(r.id))
        .collect();

    let mut edges = HashSet::new();
    for e in regions.boundary_edges(graph) {
        if let [Some(a), Some(b)] = graph.edges[e].cells
            && let (Some(ra), Some(rb)) = (regions.cell_region[a], regions.cell_region[b])
        {
            let key = (ra.min(rb), ra.max(rb));
            if edges.insert(key) {
                adjacency.add_edge(nodes[key.0], nodes[key.1], ());
            }
        }
    }
    adjacency
}

/// Жадная раскраска: узлы по убыванию степени (при равенстве: по id), каждому
/// наименьший цвет, не занятый соседями.
///
/// # Возвращает
/// Цвет для каждого узла в порядке индексов узлов.
#[must_use]
pub fn greedy_coloring(adjacency: &UnGraph<usize, ()>) -> Vec<usize> {
    let mut order: Vec<NodeIndex> = adjacency.node_indices().collect();
    order.sort_by(|&a, &b| {
        let da = adjacency.neighbors(a).count();
        let db = adjacency.neighbors(b).count();
        db.cmp(&da).then(a.index().cmp(&b.index()))
    });

    let mut colors: Vec<Option<usize>> = vec![None; adjacency.node_count()];
    for node in order {
        let taken: HashSet<usize> = adjacency
            .neighbors(node)
            .filter_map(|n| colors[n.index()])
            .collect();
        let color = (0..).find(|c| !taken.contains(c)).unwrap_or(0);
        colors[node.index()] = Some(color);
    }
    colors.into_iter().map(|c| c.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshSettings, generate_mesh};
    use crate::region::build_regions;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn neighbors_never_share_a_color() {
        let settings = MeshSettings {
            point_count: 400,
            relaxation_iterations: 1,
            jittered_grid: false,
            width: 500.0,
            height: 500.0,
        };
        let g = generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(6)).unwrap();
        let is_land: Vec<bool> = g.cells.iter().map(|c| !c.border).collect();
        let map = build_regions(&g, &is_land, 10, 4, &mut ChaCha8Rng::seed_from_u64(6));
        let adjacency = build_region_graph(&g, &map);
        assert_eq!(adjacency.node_count(), map.regions.len());
        assert!(adjacency.edge_count() > 0);

        let colors = greedy_coloring(&adjacency);
        for edge in adjacency.raw_edges() {
            assert_ne!(colors[edge.source().index()], colors[edge.target().index()]);
        }
    }

    #[test]
    fn triangle_needs_three_colors() {
        let mut g = UnGraph::<usize, ()>::new_undirected();
        let a = g.add_node(0);
        let b = g.add_node(1);
        let c = g.add_node(2);
        g.add_edge(a, b, ());
        g.add_edge(b, c, ());
        g.add_edge(c, a, ());
        let mut colors = greedy_coloring(&g);
        colors.sort_unstable();
        assert_eq!(colors, vec![0, 1, 2]);
    }
}
