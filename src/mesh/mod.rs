//! Двойственный граф Вороного/Делоне
//!
//! Граф хранится как набор арен с целочисленными идентификаторами: индекс в векторе и
//! есть id сущности. Ссылок между структурами нет, только индексы, поэтому граф
//! целиком сериализуем и безопасно читается из нескольких потоков.
//!
//! - **`Cell`**: многоугольник Вороного вокруг исходной точки (сайта)
//! - **`Corner`**: вершина, общая для соседних ячеек
//! - **`Edge`**: отрезок между двумя углами, разделяющий одну или две ячейки
//!
//! После построения топология не меняется; поздние стадии хранят свои значения в
//! параллельных массивах, индексируемых теми же id.

pub mod builder;
pub mod index;
pub mod points;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

pub use builder::build_graph;
pub use index::SiteIndex;

/// Точка в пространстве графа
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_sq(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(self, other: Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    #[must_use]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corner {
    pub id: usize,
    pub position: Point,
    /// Ячейки, которым принадлежит угол
    pub touches: Vec<usize>,
    /// Соседние углы (через рёбра)
    pub adjacent: Vec<usize>,
    pub edges: Vec<usize>,
    /// Угол лежит на границе карты
    pub border: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: usize,
    pub corners: [usize; 2],
    /// `cells[0]` всегда задан; `cells[1] == None` только для рёбер на границе карты
    pub cells: [Option<usize>; 2],
}

impl Edge {
    /// Ячейка по другую сторону ребра.
    #[must_use]
    pub fn other_cell(&self, cell: usize) -> Option<usize> {
        match self.cells {
            [Some(a), b] if a == cell => b,
            [a, Some(b)] if b == cell => a,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: usize,
    /// Исходная точка (после релаксации)
    pub site: Point,
    pub centroid: Point,
    pub area: f64,
    /// Углы многоугольника в порядке положительной ориентации
    pub corners: Vec<usize>,
    pub edges: Vec<usize>,
    pub neighbors: Vec<usize>,
    /// Ячейка касается границы карты
    pub border: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Graph {
    pub width: f64,
    pub height: f64,
    pub corners: Vec<Corner>,
    pub edges: Vec<Edge>,
    pub cells: Vec<Cell>,
}

impl Graph {
    /// Координаты вершин многоугольника ячейки.
    pub fn cell_polygon(&self, cell: usize) -> impl Iterator<Item = Point> + '_ {
        self.cells[cell]
            .corners
            .iter()
            .map(move |&c| self.corners[c].position)
    }

    /// Радиус описанной вокруг центроида окружности ячейки.
    #[must_use]
    pub fn cell_radius(&self, cell: usize) -> f64 {
        let center = self.cells[cell].centroid;
        self.cell_polygon(cell)
            .map(|p| p.distance(center))
            .fold(0.0, f64::max)
    }

    /// Проверяет инварианты графа: простые многоугольники, отсутствие висячих рёбер,
    /// симметричность соседства.
    pub fn validate(&self) -> Result<(), GenerationError> {
        let tolerance = 1e-9 * (self.width * self.height);
        for cell in &self.cells {
            if cell.corners.len() < 3 {
                return Err(GenerationError::failure(
                    "mesh",
                    format!("cell {} has only {} corners", cell.id, cell.corners.len()),
                ));
            }
            let poly: Vec<Point> = self.cell_polygon(cell.id).collect();
            if signed_area(&poly) <= 0.0 {
                return Err(GenerationError::failure(
                    "mesh",
                    format!("cell {} has non-positive area", cell.id),
                ));
            }
            let n = poly.len();
            for i in 0..n {
                if cross(poly[i], poly[(i + 1) % n], poly[(i + 2) % n]) < -tolerance {
                    return Err(GenerationError::failure(
                        "mesh",
                        format!("cell {} polygon is not simple", cell.id),
                    ));
                }
            }
            for &nb in &cell.neighbors {
                if !self.cells[nb].neighbors.contains(&cell.id) {
                    return Err(GenerationError::failure(
                        "mesh",
                        format!("neighbor relation {} -> {nb} is not symmetric", cell.id),
                    ));
                }
            }
        }
        for edge in &self.edges {
            let Some(first) = edge.cells[0] else {
                return Err(GenerationError::failure(
                    "mesh",
                    format!("edge {} touches no cell", edge.id),
                ));
            };
            if edge.cells[1] == Some(first) {
                return Err(GenerationError::failure(
                    "mesh",
                    format!("edge {} lists cell {first} twice", edge.id),
                ));
            }
            if edge.cells[1].is_none()
                && !(self.corners[edge.corners[0]].border && self.corners[edge.corners[1]].border)
            {
                log::warn!("ребро {} с одной ячейкой не лежит на границе карты", edge.id);
            }
        }
        Ok(())
    }
}

/// Параметры построения сетки
#[derive(Debug, Clone, Copy)]
pub struct MeshSettings {
    pub point_count: usize,
    pub relaxation_iterations: usize,
    pub jittered_grid: bool,
    pub width: f64,
    pub height: f64,
}

/// Полный цикл стадии: разброс точек, разведение дубликатов, релаксация, граф.
///
/// # Ошибки
/// - `InvalidParameters`: меньше 4 точек или неположительные размеры
/// - `GenerationFailure`: диаграмма не построилась или граф нарушает инварианты
pub fn generate_mesh(
    settings: &MeshSettings,
    rng: &mut rand_chacha::ChaCha8Rng,
) -> Result<Graph, GenerationError> {
    if settings.point_count < 4 {
        return Err(GenerationError::invalid(format!(
            "point_count must be at least 4, got {}",
            settings.point_count
        )));
    }
    if !(settings.width > 0.0 && settings.height > 0.0) {
        return Err(GenerationError::invalid("mesh bounds must be positive"));
    }

    let mut sites = points::scatter_points(
        rng,
        settings.point_count,
        settings.width,
        settings.height,
        settings.jittered_grid,
    );
    let moved = points::separate_duplicates(&mut sites, rng, settings.width, settings.height);
    if moved > 0 {
        log::debug!("разведено {moved} совпадающих точек");
    }
    points::relax(
        &mut sites,
        settings.relaxation_iterations,
        rng,
        settings.width,
        settings.height,
    )?;

    let graph = build_graph(&sites, settings.width, settings.height)?;
    log::debug!(
        "граф: {} ячеек, {} углов, {} рёбер",
        graph.cells.len(),
        graph.corners.len(),
        graph.edges.len()
    );
    Ok(graph)
}

/// Векторное произведение `(b - a) × (c - a)`.
#[must_use]
pub fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Ориентированная площадь многоугольника (формула шнурования).
#[must_use]
pub fn signed_area(poly: &[Point]) -> f64 {
    let n = poly.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = poly[i];
            let b = poly[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice * 0.5
}

/// Центр масс многоугольника; для вырожденных: среднее вершин.
#[must_use]
pub fn polygon_centroid(poly: &[Point]) -> Point {
    let area = signed_area(poly);
    let n = poly.len();
    if n == 0 {
        return Point::default();
    }
    if area.abs() < f64::EPSILON {
        let (sx, sy) = poly
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Point::new(sx / n as f64, sy / n as f64);
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        let f = a.x * b.y - b.x * a.y;
        cx += (a.x + b.x) * f;
        cy += (a.y + b.y) * f;
    }
    Point::new(cx / (6.0 * area), cy / (6.0 * area))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn square_area_and_centroid() {
        let sq = square();
        assert!((signed_area(&sq) - 4.0).abs() < 1e-12);
        let c = polygon_centroid(&sq);
        assert!((c.x - 1.0).abs() < 1e-12 && (c.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reversed_polygon_has_negative_area() {
        let mut sq = square();
        sq.reverse();
        assert!(signed_area(&sq) < 0.0);
    }

    #[test]
    fn other_cell_on_shared_edge() {
        let edge = Edge {
            id: 0,
            corners: [0, 1],
            cells: [Some(3), Some(5)],
        };
        assert_eq!(edge.other_cell(3), Some(5));
        assert_eq!(edge.other_cell(5), Some(3));
        assert_eq!(edge.other_cell(4), None);
    }
}
