//! Линейные слои: реки, береговые линии, границы регионов, дороги

use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_antialiased_line_segment_mut, draw_filled_circle_mut};
use imageproc::pixelops::interpolate;

use crate::render::{Frame, RenderInput};

/// Смешивание сглаженной линии с прозрачным слоем: на пустом пикселе вес идёт в
/// альфу, на закрашенном цвет интерполируется.
fn blend(line: Rgba<u8>, under: Rgba<u8>, weight: f32) -> Rgba<u8> {
    let alpha = (f32::from(line[3]) * weight).round() as u8;
    if under[3] == 0 {
        return Rgba([line[0], line[1], line[2], alpha]);
    }
    let mut out = interpolate(line, under, weight);
    out[3] = under[3].max(alpha);
    out
}

/// Отрезок толщиной `width` пикселей: пучок параллельных сглаженных линий и
/// скруглённые концы.
pub fn stroke(img: &mut RgbaImage, a: (f32, f32), b: (f32, f32), width: f32, color: Rgba<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = dx.hypot(dy);
    if len <= f32::EPSILON {
        return;
    }
    let (nx, ny) = (-dy / len, dx / len);

    let half = (width - 1.0).max(0.0) * 0.5;
    let mut offset = -half;
    loop {
        let start = ((a.0 + nx * offset).round() as i32, (a.1 + ny * offset).round() as i32);
        let end = ((b.0 + nx * offset).round() as i32, (b.1 + ny * offset).round() as i32);
        draw_antialiased_line_segment_mut(img, start, end, color, blend);
        if offset >= half {
            break;
        }
        offset = (offset + 0.75).min(half);
    }

    if width >= 2.0 {
        let radius = (width * 0.5).floor() as i32;
        for p in [a, b] {
            draw_filled_circle_mut(img, (p.0.round() as i32, p.1.round() as i32), radius, color);
        }
    }
}

pub fn render_rivers(frame: &Frame<'_>) -> RgbaImage {
    let input = frame.input;
    let graph = input.graph;
    let hydrology = input.hydrology;
    let mut img = frame.blank();
    let threshold = input.river_flow_threshold.max(f64::MIN_POSITIVE);

    // Общее русло рисует только главная река
    for river in &hydrology.rivers {
        for pair in river.corners[..river.own_length.min(river.corners.len())].windows(2) {
            let (from, to) = (pair[0], pair[1]);
            // Толщина растёт логарифмически с расходом
            let growth = (hydrology.flow[from] / threshold).ln().max(0.0);
            let width = frame.palette.river_width * (1.0 + 0.5 * growth);
            stroke(
                &mut img,
                frame.transform.to_pixel(graph.corners[from].position),
                frame.transform.to_pixel(graph.corners[to].position),
                width as f32,
                frame.palette.river,
            );
        }
    }
    img
}

/// Рёбра между водой и сушей
#[must_use]
pub fn coast_edges(input: &RenderInput<'_>) -> Vec<usize> {
    let is_water = |cell| input.hydrology.is_water(input.elevation, cell);
    input
        .graph
        .edges
        .iter()
        .filter(|edge| match edge.cells {
            [Some(a), Some(b)] => is_water(a) != is_water(b),
            _ => false,
        })
        .map(|edge| edge.id)
        .collect()
}

/// Ломаная ребра с учётом излома
fn stroke_edge(frame: &Frame<'_>, img: &mut RgbaImage, edge: usize, width: f32, color: Rgba<u8>) {
    let path = frame.noisy.path(frame.input.graph, edge);
    for pair in path.windows(2) {
        stroke(
            img,
            frame.transform.to_pixel(pair[0]),
            frame.transform.to_pixel(pair[1]),
            width,
            color,
        );
    }
}

pub fn render_coastlines(frame: &Frame<'_>) -> RgbaImage {
    let mut img = frame.blank();
    for edge in coast_edges(frame.input) {
        stroke_edge(
            frame,
            &mut img,
            edge,
            frame.palette.coastline_width as f32,
            frame.palette.coastline,
        );
    }
    img
}

pub fn render_borders(frame: &Frame<'_>) -> RgbaImage {
    let input = frame.input;
    let mut img = frame.blank();
    for edge in input.regions.boundary_edges(input.graph) {
        stroke_edge(
            frame,
            &mut img,
            edge,
            frame.palette.border_width as f32,
            frame.palette.border,
        );
    }
    img
}

/// Пунктир от `a` к `b`: штрихи длиной `dash` через такие же промежутки.
pub fn dashed(
    img: &mut RgbaImage,
    a: (f32, f32),
    b: (f32, f32),
    dash: f32,
    width: f32,
    color: Rgba<u8>,
) {
    let len = (b.0 - a.0).hypot(b.1 - a.1);
    if len <= f32::EPSILON || dash <= 0.0 {
        return;
    }
    let at = |t: f32| (a.0 + (b.0 - a.0) * t / len, a.1 + (b.1 - a.1) * t / len);
    let mut t = 0.0;
    while t < len {
        stroke(img, at(t), at((t + dash).min(len)), width, color);
        t += dash * 2.0;
    }
}

/// Дорога проходит между центроидами ячеек по рёбрам, отмеченным в сети дорог.
pub fn render_roads(frame: &Frame<'_>) -> RgbaImage {
    let input = frame.input;
    let graph = input.graph;
    let mut img = frame.blank();
    for (edge, _) in input.roads.road_edge.iter().enumerate().filter(|(_, r)| **r) {
        let [Some(a), Some(b)] = graph.edges[edge].cells else {
            continue;
        };
        dashed(
            &mut img,
            frame.transform.to_pixel(graph.cells[a].centroid),
            frame.transform.to_pixel(graph.cells[b].centroid),
            frame.palette.road_dash as f32,
            frame.palette.road_width as f32,
            frame.palette.road,
        );
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thin_stroke_leaves_the_rest_transparent() {
        let mut img = RgbaImage::new(20, 20);
        stroke(&mut img, (2.0, 10.0), (17.0, 10.0), 1.0, Rgba([0, 0, 255, 255]));
        assert_eq!(img.get_pixel(10, 10)[3], 255);
        assert_eq!(img.get_pixel(10, 2)[3], 0);
    }

    #[test]
    fn wide_stroke_covers_its_width() {
        let mut img = RgbaImage::new(20, 20);
        stroke(&mut img, (2.0, 10.0), (17.0, 10.0), 5.0, Rgba([0, 0, 255, 255]));
        for y in 8..=12 {
            assert!(img.get_pixel(10, y)[3] > 0, "row {y}");
        }
        assert_eq!(img.get_pixel(10, 17)[3], 0);
    }

    #[test]
    fn dashes_leave_gaps() {
        let mut img = RgbaImage::new(40, 10);
        dashed(&mut img, (0.0, 5.0), (40.0, 5.0), 5.0, 1.0, Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(2, 5)[3], 255);
        assert_eq!(img.get_pixel(7, 5)[3], 0);
        assert_eq!(img.get_pixel(12, 5)[3], 255);
    }

    #[test]
    fn blend_over_paint_keeps_opacity() {
        let under = Rgba([255, 255, 255, 255]);
        let out = blend(Rgba([0, 0, 0, 255]), under, 0.5);
        assert_eq!(out[3], 255);
        assert!(out[0] > 100 && out[0] < 160);
    }
}
