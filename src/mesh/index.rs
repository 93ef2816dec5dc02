//! Равномерная сетка для поиска ближайшего сайта
//!
//! Ближайший сайт однозначно определяет ячейку Вороного, поэтому поиск ячейки по точке
//! (растеризация, попадание объекта в ячейку) сводится к поиску ближайшего соседа.

use crate::mesh::{Graph, Point};

#[derive(Debug, Clone)]
pub struct SiteIndex {
    cell_size: f64,
    cols: usize,
    rows: usize,
    buckets: Vec<Vec<usize>>,
    sites: Vec<Point>,
}

impl SiteIndex {
    #[must_use]
    pub fn new(graph: &Graph) -> Self {
        let sites: Vec<Point> = graph.cells.iter().map(|c| c.site).collect();
        let n = sites.len().max(1) as f64;
        let cell_size = (graph.width * graph.height / n).sqrt().max(f64::MIN_POSITIVE);
        let cols = ((graph.width / cell_size).ceil() as usize).max(1);
        let rows = ((graph.height / cell_size).ceil() as usize).max(1);
        let mut buckets = vec![Vec::new(); cols * rows];
        for (id, p) in sites.iter().enumerate() {
            let (cx, cy) = Self::bucket_of(*p, cell_size, cols, rows);
            buckets[cy * cols + cx].push(id);
        }
        Self {
            cell_size,
            cols,
            rows,
            buckets,
            sites,
        }
    }

    fn bucket_of(p: Point, cell_size: f64, cols: usize, rows: usize) -> (usize, usize) {
        let cx = ((p.x / cell_size).floor().max(0.0) as usize).min(cols - 1);
        let cy = ((p.y / cell_size).floor().max(0.0) as usize).min(rows - 1);
        (cx, cy)
    }

    /// Ячейка, которой принадлежит точка (ближайший сайт; при равенстве: меньший id).
    #[must_use]
    pub fn find_cell(&self, p: Point) -> Option<usize> {
        if self.sites.is_empty() {
            return None;
        }
        let (cx, cy) = Self::bucket_of(p, self.cell_size, self.cols, self.rows);
        let max_ring = self.cols.max(self.rows);
        let mut best: Option<(f64, usize)> = None;

        for ring in 0..=max_ring {
            let r = ring as isize;
            for gy in (cy as isize - r)..=(cy as isize + r) {
                for gx in (cx as isize - r)..=(cx as isize + r) {
                    let on_ring = (gy - cy as isize).abs() == r || (gx - cx as isize).abs() == r;
                    if !on_ring
                        || gx < 0
                        || gy < 0
                        || gx >= self.cols as isize
                        || gy >= self.rows as isize
                    {
                        continue;
                    }
                    for &id in &self.buckets[gy as usize * self.cols + gx as usize] {
                        let d = self.sites[id].distance_sq(p);
                        let better = match best {
                            None => true,
                            Some((bd, bid)) => d < bd || (d == bd && id < bid),
                        };
                        if better {
                            best = Some((d, id));
                        }
                    }
                }
            }
            // Всё, что дальше текущего кольца, не ближе `ring * cell_size`
            if let Some((bd, _)) = best {
                let reach = ring as f64 * self.cell_size;
                if bd < reach * reach {
                    break;
                }
            }
        }
        best.map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build_graph;
    use crate::mesh::points::scatter_points;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn matches_brute_force_nearest_site() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let sites = scatter_points(&mut rng, 90, 300.0, 200.0, true);
        let graph = build_graph(&sites, 300.0, 200.0).unwrap();
        let index = SiteIndex::new(&graph);
        for i in 0..60 {
            let p = Point::new((i * 37 % 300) as f64 + 0.5, (i * 53 % 200) as f64 + 0.25);
            let brute = graph
                .cells
                .iter()
                .min_by(|a, b| a.site.distance_sq(p).total_cmp(&b.site.distance_sq(p)))
                .map(|c| c.id);
            assert_eq!(index.find_cell(p), brute);
        }
    }
}
