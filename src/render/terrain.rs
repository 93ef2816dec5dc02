//! Заливка ячеек цветом биома с затенением по высоте и оттенком региона

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::GenerationError;
use crate::mesh::{Point, SiteIndex};
use crate::render::Frame;

fn mix(base: Rgba<u8>, tint: Rgba<u8>, t: f64) -> Rgba<u8> {
    let ch = |i: usize| (f64::from(base[i]) * (1.0 - t) + f64::from(tint[i]) * t).round() as u8;
    Rgba([ch(0), ch(1), ch(2), base[3]])
}

/// Цвет каждой ячейки
#[must_use]
pub fn cell_colors(frame: &Frame<'_>, tints: &[Option<Rgba<u8>>]) -> Vec<Rgba<u8>> {
    let input = frame.input;
    let palette = frame.palette;
    (0..input.graph.cells.len())
        .map(|cell| {
            let mut color = palette.biome(input.biomes.get(cell));
            let shade = 1.0 + palette.elevation_shading * (input.elevation.cell_elevation[cell] - 0.5);
            for i in 0..3 {
                color[i] = (f64::from(color[i]) * shade).round().clamp(0.0, 255.0) as u8;
            }
            match tints.get(cell).copied().flatten() {
                Some(tint) if !input.biomes.get(cell).is_water() => {
                    mix(color, tint, palette.region_tint_strength)
                }
                _ => color,
            }
        })
        .collect()
}

/// Каждый пиксель берёт цвет ячейки, в которую попадает его центр.
pub fn render_terrain(
    frame: &Frame<'_>,
    sites: &SiteIndex,
    tints: &[Option<Rgba<u8>>],
) -> Result<RgbaImage, GenerationError> {
    let colors = cell_colors(frame, tints);
    let graph = frame.input.graph;
    let width = frame.width as usize;
    let mut buffer = vec![0u8; width * frame.height as usize * 4];

    let fill_row = |(y, row): (usize, &mut [u8])| {
        for x in 0..width {
            let p = frame.transform.to_graph(x as u32, y as u32);
            // Поля при несовпадении пропорций остаются фоном
            if p.x < 0.0 || p.y < 0.0 || p.x > graph.width || p.y > graph.height {
                continue;
            }
            if let Some(cell) = sites.find_cell(p) {
                row[x * 4..x * 4 + 4].copy_from_slice(&colors[cell].0);
            }
        }
    };

    if width > 0 {
        #[cfg(feature = "parallel")]
        buffer.par_chunks_mut(width * 4).enumerate().for_each(fill_row);
        #[cfg(not(feature = "parallel"))]
        buffer.chunks_mut(width * 4).enumerate().for_each(fill_row);
    }

    let mut img = RgbaImage::from_raw(frame.width, frame.height, buffer)
        .ok_or_else(|| GenerationError::failure("compositing", "terrain buffer size mismatch"))?;

    // Изломанное ребро перекрашивает клинья между ломаной и сайтами обеих ячеек
    for (edge, path) in frame.noisy.iter() {
        let [Some(a), Some(b)] = graph.edges[edge].cells else {
            continue;
        };
        for cell in [a, b] {
            if let Some(polygon) = wedge(frame, path, graph.cells[cell].site) {
                draw_polygon_mut(&mut img, &polygon, colors[cell]);
            }
        }
    }
    Ok(img)
}

/// Многоугольник из ломаной и сайта в пикселях. `None`, если он вырождается.
fn wedge(frame: &Frame<'_>, path: &[Point], site: Point) -> Option<Vec<PixelPoint<i32>>> {
    let mut polygon: Vec<PixelPoint<i32>> = Vec::with_capacity(path.len() + 1);
    for &p in path.iter().chain(std::iter::once(&site)) {
        let (x, y) = frame.transform.to_pixel(p);
        let pixel = PixelPoint::new(x.round() as i32, y.round() as i32);
        if polygon.last() != Some(&pixel) {
            polygon.push(pixel);
        }
    }
    // draw_polygon_mut не принимает замкнутый контур
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    (polygon.len() >= 3).then_some(polygon)
}
