//! Изломанные рёбра для береговых линий и границ
//!
//! Ребро между углами `v0` и `v1` с ячейками `a` и `b` рекурсивно делится внутри
//! четырёхугольника `v0 - site(a) - v1 - site(b)`. Каждая новая точка: выпуклая
//! комбинация вершин, так что ломаная не выходит из его выпуклой оболочки. У каждого
//! ребра собственный генератор, выведенный из сида и id ребра, так что результат не
//! зависит от того, какие ещё рёбра строятся.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::mesh::{Graph, Point};
use crate::rng::StageSeeds;

/// Насколько далеко к сайтам ячеек отходят опорные точки
const TRADEOFF: f64 = 0.5;
const MAX_DEPTH: u32 = 10;

#[derive(Debug, Clone, Default)]
pub struct NoisyEdges {
    paths: BTreeMap<usize, Vec<Point>>,
}

struct Subdivision<'a> {
    rng: &'a mut ChaCha8Rng,
    min_length: f64,
    out: &'a mut Vec<Point>,
}

impl Subdivision<'_> {
    /// Ломаная от `a` к `c` внутри четырёхугольника `a - b - c - d`; добавляет всё,
    /// кроме концов.
    fn split(&mut self, a: Point, b: Point, c: Point, d: Point, depth: u32) {
        if depth >= MAX_DEPTH
            || a.distance(c) < self.min_length
            || b.distance(d) < self.min_length
        {
            return;
        }
        let p = self.rng.gen_range(0.2..0.8);
        let q = self.rng.gen_range(0.2..0.8);

        let e = a.lerp(d, p);
        let f = b.lerp(c, p);
        let g = a.lerp(b, q);
        let i = d.lerp(c, q);
        let h = e.lerp(f, q);

        // Опорные точки подквадратов остаются на сторонах родителя
        let s = 1.0 - self.rng.gen_range(0.0..0.4);
        let t = 1.0 - self.rng.gen_range(0.0..0.4);

        self.split(a, b.lerp(g, s), h, d.lerp(e, t), depth + 1);
        self.out.push(h);
        self.split(h, c.lerp(f, s), c, d.lerp(i, t), depth + 1);
    }
}

/// Ломаная ребра от `corners[0]` к `corners[1]`; `None` для рёбер на краю карты.
fn noisy_path(
    graph: &Graph,
    edge: usize,
    seeds: &StageSeeds,
    min_length: f64,
) -> Option<Vec<Point>> {
    let e = &graph.edges[edge];
    let [Some(a), Some(b)] = e.cells else {
        return None;
    };
    let v0 = graph.corners[e.corners[0]].position;
    let v1 = graph.corners[e.corners[1]].position;
    let (site_a, site_b) = (graph.cells[a].site, graph.cells[b].site);
    let mid = v0.lerp(v1, 0.5);
    let mut rng = seeds.rng(edge as u64);

    let mut first = vec![v0];
    Subdivision {
        rng: &mut rng,
        min_length,
        out: &mut first,
    }
    .split(v0, v0.lerp(site_a, TRADEOFF), mid, v0.lerp(site_b, TRADEOFF), 0);

    let mut second = vec![v1];
    Subdivision {
        rng: &mut rng,
        min_length,
        out: &mut second,
    }
    .split(v1, v1.lerp(site_b, TRADEOFF), mid, v1.lerp(site_a, TRADEOFF), 0);

    first.push(mid);
    first.extend(second.into_iter().rev());
    Some(first)
}

impl NoisyEdges {
    /// Строит ломаные для `edges`. При `min_length <= 0` рёбра остаются прямыми.
    #[must_use]
    pub fn build(
        graph: &Graph,
        edges: impl IntoIterator<Item = usize>,
        seed: u64,
        min_length: f64,
    ) -> Self {
        if min_length <= 0.0 {
            return Self::default();
        }
        let seeds = StageSeeds::new(seed);
        let paths = edges
            .into_iter()
            .filter_map(|edge| noisy_path(graph, edge, &seeds, min_length).map(|p| (edge, p)))
            .collect();
        Self { paths }
    }

    /// Ломаная ребра; для не изломанного ребра: два его угла.
    #[must_use]
    pub fn path(&self, graph: &Graph, edge: usize) -> Vec<Point> {
        self.paths.get(&edge).cloned().unwrap_or_else(|| {
            let [p, q] = graph.edges[edge].corners;
            vec![graph.corners[p].position, graph.corners[q].position]
        })
    }

    /// Изломанные рёбра с их ломаными.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Point])> {
        self.paths.iter().map(|(&edge, path)| (edge, path.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshSettings, cross, generate_mesh};
    use rand::SeedableRng;

    fn graph() -> Graph {
        let settings = MeshSettings {
            point_count: 120,
            relaxation_iterations: 1,
            jittered_grid: false,
            width: 400.0,
            height: 300.0,
        };
        generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(6)).unwrap()
    }

    fn inner_edges(g: &Graph) -> Vec<usize> {
        g.edges
            .iter()
            .filter(|e| e.cells[1].is_some())
            .map(|e| e.id)
            .collect()
    }

    fn in_triangle(a: Point, b: Point, c: Point, p: Point) -> bool {
        let signs = [cross(a, b, p), cross(b, c, p), cross(c, a, p)];
        signs.iter().all(|&s| s >= -1e-6) || signs.iter().all(|&s| s <= 1e-6)
    }

    /// Выпуклая оболочка четырёх точек: объединение треугольников по любым трём из них
    fn in_hull(quad: [Point; 4], p: Point) -> bool {
        (0..4).any(|skip| {
            let rest: Vec<Point> = (0..4).filter(|&i| i != skip).map(|i| quad[i]).collect();
            in_triangle(rest[0], rest[1], rest[2], p)
        })
    }

    #[test]
    fn path_keeps_its_endpoints_and_stays_in_the_quad() {
        let g = graph();
        let edges = inner_edges(&g);
        let noisy = NoisyEdges::build(&g, edges.iter().copied(), 99, 2.0);
        let mut subdivided = 0;
        for &edge in &edges {
            let path = noisy.path(&g, edge);
            let e = &g.edges[edge];
            let v0 = g.corners[e.corners[0]].position;
            let v1 = g.corners[e.corners[1]].position;
            assert_eq!(path.first(), Some(&v0));
            assert_eq!(path.last(), Some(&v1));
            if path.len() > 3 {
                subdivided += 1;
            }
            let [Some(a), Some(b)] = e.cells else {
                unreachable!()
            };
            let quad = [v0, g.cells[a].site, v1, g.cells[b].site];
            assert!(path.iter().all(|&p| in_hull(quad, p)), "edge {edge}");
        }
        assert!(subdivided > 0);
    }

    #[test]
    fn each_edge_is_seeded_on_its_own() {
        let g = graph();
        let edges = inner_edges(&g);
        let length = |e: usize| {
            let [p, q] = g.edges[e].corners;
            g.corners[p].position.distance(g.corners[q].position)
        };
        let longest = edges
            .iter()
            .copied()
            .max_by(|&a, &b| length(a).total_cmp(&length(b)))
            .unwrap();
        let all = NoisyEdges::build(&g, edges.iter().copied(), 5, 2.0);
        let one = NoisyEdges::build(&g, [longest], 5, 2.0);
        assert_eq!(all.path(&g, longest), one.path(&g, longest));
        let other = NoisyEdges::build(&g, [longest], 6, 2.0);
        assert_ne!(all.path(&g, longest), other.path(&g, longest));
    }

    #[test]
    fn zero_length_keeps_edges_straight() {
        let g = graph();
        let edges = inner_edges(&g);
        let noisy = NoisyEdges::build(&g, edges.iter().copied(), 5, 0.0);
        assert_eq!(noisy.iter().count(), 0);
        assert_eq!(noisy.path(&g, edges[0]).len(), 2);
    }
}
