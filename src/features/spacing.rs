//! Проверка минимального расстояния через локальность графа
//!
//! Принятые объекты хранятся по ячейкам. Запрос обходит соседей в ширину, начиная с
//! ячейки кандидата, и заходит только в ячейки, чья описанная окружность пересекает
//! диск радиуса `radius` вокруг кандидата.

use std::collections::{HashSet, VecDeque};

use crate::mesh::{Graph, Point};

#[derive(Debug, Clone)]
pub struct SpacingIndex {
    buckets: Vec<Vec<Point>>,
    radii: Vec<f64>,
}

impl SpacingIndex {
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        Self {
            buckets: vec![Vec::new(); graph.cells.len()],
            radii: (0..graph.cells.len()).map(|c| graph.cell_radius(c)).collect(),
        }
    }

    pub fn insert(&mut self, cell: usize, p: Point) {
        self.buckets[cell].push(p);
    }

    /// Нет ли принятых точек ближе `radius` к `p` (точка `p` лежит в ячейке `cell`).
    #[must_use]
    pub fn is_clear(&self, graph: &Graph, cell: usize, p: Point, radius: f64) -> bool {
        self.search(graph, cell, p, radius).0
    }

    /// Обход соседей; второе значение: сколько ячеек было просмотрено.
    fn search(&self, graph: &Graph, cell: usize, p: Point, radius: f64) -> (bool, usize) {
        if radius <= 0.0 {
            return (true, 0);
        }
        let radius_sq = radius * radius;
        // Обход локален, поэтому множество посещённых маленькое
        let mut visited: HashSet<usize> = HashSet::from([cell]);
        let mut queue = VecDeque::from([cell]);

        while let Some(id) = queue.pop_front() {
            if self.buckets[id].iter().any(|q| q.distance_sq(p) < radius_sq) {
                return (false, visited.len());
            }
            for &n in &graph.cells[id].neighbors {
                if !visited.insert(n) {
                    continue;
                }
                let reach = radius + self.radii[n];
                if graph.cells[n].centroid.distance_sq(p) <= reach * reach {
                    queue.push_back(n);
                }
            }
        }
        (true, visited.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{MeshSettings, SiteIndex, generate_mesh};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn agrees_with_brute_force() {
        let settings = MeshSettings {
            point_count: 250,
            relaxation_iterations: 1,
            jittered_grid: false,
            width: 400.0,
            height: 400.0,
        };
        let g = generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(31)).unwrap();
        let sites = SiteIndex::new(&g);
        let mut index = SpacingIndex::new(&g);
        let mut accepted: Vec<Point> = Vec::new();

        for i in 0..400 {
            let p = Point::new((i * 97 % 400) as f64 + 0.3, (i * 61 % 400) as f64 + 0.7);
            let cell = sites.find_cell(p).unwrap();
            let brute = accepted.iter().all(|q| q.distance(p) >= 25.0);
            assert_eq!(index.is_clear(&g, cell, p, 25.0), brute);
            if brute {
                index.insert(cell, p);
                accepted.push(p);
            }
        }
        assert!(accepted.len() > 10);
    }

    #[test]
    fn query_stays_local_on_a_large_mesh() {
        let settings = MeshSettings {
            point_count: 3000,
            relaxation_iterations: 1,
            jittered_grid: true,
            width: 1000.0,
            height: 1000.0,
        };
        let g = generate_mesh(&settings, &mut ChaCha8Rng::seed_from_u64(4)).unwrap();
        let sites = SiteIndex::new(&g);
        let index = SpacingIndex::new(&g);
        let p = Point::new(500.0, 500.0);
        let cell = sites.find_cell(p).unwrap();
        // Ячейка около 18 единиц в поперечнике, диск радиуса 12 задевает только ближайших соседей
        let (clear, visited) = index.search(&g, cell, p, 12.0);
        assert!(clear);
        assert!(visited < 80, "visited {visited} of {} cells", g.cells.len());
    }
}
