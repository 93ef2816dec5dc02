//! Построение графа из обрезанной диаграммы Вороного
//!
//! Диаграмма строится крейтом `voronoice` (обрезка по прямоугольнику карты), после
//! чего вершины ячеек «свариваются» в общие углы через пространственный хеш с допуском.
//! Сварка не зависит от того, как библиотека делит вершины между ячейками: две вершины
//! ближе допуска считаются одним углом.

use std::collections::HashMap;

use voronoice::{BoundingBox, Point as VPoint, VoronoiBuilder};

use crate::error::GenerationError;
use crate::mesh::{Cell, Corner, Edge, Graph, Point, polygon_centroid, signed_area};

/// Многоугольники Вороного для каждого сайта, обрезанные по прямоугольнику карты.
///
/// Индекс результата совпадает с индексом сайта.
pub fn voronoi_polygons(
    sites: &[Point],
    width: f64,
    height: f64,
) -> Result<Vec<Vec<Point>>, GenerationError> {
    let voronoi = VoronoiBuilder::default()
        .set_sites(sites.iter().map(|p| VPoint { x: p.x, y: p.y }).collect())
        .set_bounding_box(BoundingBox::new(
            VPoint {
                x: width / 2.0,
                y: height / 2.0,
            },
            width,
            height,
        ))
        .build()
        .ok_or_else(|| {
            GenerationError::failure(
                "mesh",
                format!("voronoi diagram could not be built for {} sites", sites.len()),
            )
        })?;

    let mut polygons = vec![Vec::new(); sites.len()];
    for cell in voronoi.iter_cells() {
        let site = cell.site();
        if site < polygons.len() {
            polygons[site] = cell.iter_vertices().map(|v| Point::new(v.x, v.y)).collect();
        }
    }
    Ok(polygons)
}

/// Сварка вершин в углы с допуском `eps`.
struct Welder {
    eps: f64,
    width: f64,
    height: f64,
    buckets: HashMap<(i64, i64), Vec<usize>>,
    positions: Vec<Point>,
}

impl Welder {
    fn new(width: f64, height: f64) -> Self {
        Self {
            eps: 1e-6 * width.max(height),
            width,
            height,
            buckets: HashMap::new(),
            positions: Vec::new(),
        }
    }

    fn key(&self, p: Point) -> (i64, i64) {
        let size = self.eps * 2.0;
        ((p.x / size).floor() as i64, (p.y / size).floor() as i64)
    }

    /// Прижимает точки к границе прямоугольника, чтобы угловые флаги были точными.
    fn snap(&self, p: Point) -> Point {
        let snap_axis = |v: f64, max: f64| {
            if v.abs() <= self.eps {
                0.0
            } else if (v - max).abs() <= self.eps {
                max
            } else {
                v.clamp(0.0, max)
            }
        };
        Point::new(snap_axis(p.x, self.width), snap_axis(p.y, self.height))
    }

    fn weld(&mut self, p: Point) -> usize {
        let p = self.snap(p);
        let (kx, ky) = self.key(p);
        let eps_sq = self.eps * self.eps;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(ids) = self.buckets.get(&(kx + dx, ky + dy)) {
                    for &id in ids {
                        if self.positions[id].distance_sq(p) <= eps_sq {
                            return id;
                        }
                    }
                }
            }
        }
        let id = self.positions.len();
        self.positions.push(p);
        self.buckets.entry((kx, ky)).or_default().push(id);
        id
    }

    fn on_border(&self, p: Point) -> bool {
        p.x <= 0.0 || p.y <= 0.0 || p.x >= self.width || p.y >= self.height
    }
}

/// Строит двойственный граф по готовым сайтам.
///
/// # Ошибки
/// `GenerationFailure`, если диаграмма не строится или нарушены инварианты графа
/// (вырожденная ячейка, ребро более чем у двух ячеек).
pub fn build_graph(sites: &[Point], width: f64, height: f64) -> Result<Graph, GenerationError> {
    let polygons = voronoi_polygons(sites, width, height)?;
    let mut welder = Welder::new(width, height);

    // 1. Углы ячеек
    let mut cell_corners: Vec<Vec<usize>> = Vec::with_capacity(polygons.len());
    for (cell_id, poly) in polygons.iter().enumerate() {
        let mut ids: Vec<usize> = poly.iter().map(|&v| welder.weld(v)).collect();
        ids.dedup();
        while ids.len() > 1 && ids.first() == ids.last() {
            ids.pop();
        }
        if ids.len() < 3 {
            return Err(GenerationError::failure(
                "mesh",
                format!("cell {cell_id} collapsed to {} corners", ids.len()),
            ));
        }
        let welded: Vec<Point> = ids.iter().map(|&i| welder.positions[i]).collect();
        if signed_area(&welded) < 0.0 {
            ids.reverse();
        }
        cell_corners.push(ids);
    }

    let mut corners: Vec<Corner> = welder
        .positions
        .iter()
        .enumerate()
        .map(|(id, &position)| Corner {
            id,
            position,
            touches: Vec::new(),
            adjacent: Vec::new(),
            edges: Vec::new(),
            border: welder.on_border(position),
        })
        .collect();

    // 2. Рёбра
    let mut edge_lookup: HashMap<(usize, usize), usize> = HashMap::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut cell_edges: Vec<Vec<usize>> = vec![Vec::new(); cell_corners.len()];

    for (cell_id, ids) in cell_corners.iter().enumerate() {
        for i in 0..ids.len() {
            let a = ids[i];
            let b = ids[(i + 1) % ids.len()];
            let key = (a.min(b), a.max(b));
            let edge_id = match edge_lookup.get(&key) {
                Some(&edge_id) => {
                    let edge = &mut edges[edge_id];
                    if edge.cells[1].is_some() || edge.cells[0] == Some(cell_id) {
                        return Err(GenerationError::failure(
                            "mesh",
                            format!("edge {key:?} is shared by more than two cells"),
                        ));
                    }
                    edge.cells[1] = Some(cell_id);
                    edge_id
                }
                None => {
                    let edge_id = edges.len();
                    edges.push(Edge {
                        id: edge_id,
                        corners: [key.0, key.1],
                        cells: [Some(cell_id), None],
                    });
                    edge_lookup.insert(key, edge_id);
                    edge_id
                }
            };
            cell_edges[cell_id].push(edge_id);
        }
    }

    // 3. Связи углов
    for (cell_id, ids) in cell_corners.iter().enumerate() {
        for &c in ids {
            corners[c].touches.push(cell_id);
        }
    }
    for edge in &edges {
        let [a, b] = edge.corners;
        corners[a].adjacent.push(b);
        corners[b].adjacent.push(a);
        corners[a].edges.push(edge.id);
        corners[b].edges.push(edge.id);
    }
    for corner in &mut corners {
        corner.touches.sort_unstable();
        corner.touches.dedup();
        corner.adjacent.sort_unstable();
        corner.adjacent.dedup();
    }

    // 4. Ячейки
    let cells: Vec<Cell> = cell_corners
        .into_iter()
        .zip(cell_edges)
        .enumerate()
        .map(|(id, (corner_ids, edge_ids))| {
            let poly: Vec<Point> = corner_ids.iter().map(|&c| corners[c].position).collect();
            let mut neighbors: Vec<usize> = edge_ids
                .iter()
                .filter_map(|&e| edges[e].other_cell(id))
                .collect();
            neighbors.sort_unstable();
            neighbors.dedup();
            let border = edge_ids.iter().any(|&e| edges[e].cells[1].is_none());
            Cell {
                id,
                site: sites[id],
                centroid: polygon_centroid(&poly),
                area: signed_area(&poly),
                corners: corner_ids,
                edges: edge_ids,
                neighbors,
                border,
            }
        })
        .collect();

    let graph = Graph {
        width,
        height,
        corners,
        edges,
        cells,
    };
    graph.validate()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cross;
    use crate::mesh::points::{relax, scatter_points, separate_duplicates};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_graph(seed: u64, count: usize) -> Graph {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut sites = scatter_points(&mut rng, count, 400.0, 300.0, false);
        separate_duplicates(&mut sites, &mut rng, 400.0, 300.0);
        relax(&mut sites, 1, &mut rng, 400.0, 300.0).unwrap();
        build_graph(&sites, 400.0, 300.0).unwrap()
    }

    #[test]
    fn graph_has_one_cell_per_site() {
        let graph = sample_graph(5, 120);
        assert_eq!(graph.cells.len(), 120);
        graph.validate().unwrap();
    }

    #[test]
    fn cell_areas_cover_the_map() {
        let graph = sample_graph(11, 150);
        let total: f64 = graph.cells.iter().map(|c| c.area).sum();
        assert!((total - 400.0 * 300.0).abs() < 1e-3 * 400.0 * 300.0);
    }

    #[test]
    fn every_edge_touches_a_cell_and_border_edges_lie_on_border() {
        let graph = sample_graph(2, 100);
        for edge in &graph.edges {
            assert!(edge.cells[0].is_some());
            if edge.cells[1].is_none() {
                assert!(graph.corners[edge.corners[0]].border);
                assert!(graph.corners[edge.corners[1]].border);
            }
        }
        assert!(graph.cells.iter().any(|c| c.border));
        assert!(graph.cells.iter().any(|c| !c.border));
    }

    #[test]
    fn four_points_make_a_valid_graph() {
        let sites = vec![
            Point::new(25.0, 24.0),
            Point::new(76.0, 27.0),
            Point::new(22.0, 73.0),
            Point::new(74.0, 78.0),
        ];
        let graph = build_graph(&sites, 100.0, 100.0).unwrap();
        assert_eq!(graph.cells.len(), 4);
        let total: f64 = graph.cells.iter().map(|c| c.area).sum();
        assert!((total - 10_000.0).abs() < 1e-6);
        for cell in &graph.cells {
            assert!(cell.border);
            assert!(cell.neighbors.len() >= 2);
        }
    }

    #[test]
    fn sites_are_inside_their_cells() {
        let graph = sample_graph(8, 80);
        for cell in &graph.cells {
            let poly: Vec<Point> = graph.cell_polygon(cell.id).collect();
            let n = poly.len();
            assert!((0..n).all(|i| cross(poly[i], poly[(i + 1) % n], cell.site) >= 0.0));
        }
    }
}
