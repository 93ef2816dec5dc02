//! Разброс исходных точек, разведение дубликатов и релаксация Ллойда

use std::collections::HashMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::error::GenerationError;
use crate::mesh::builder::voronoi_polygons;
use crate::mesh::{Point, polygon_centroid};

/// Отступ от краёв, внутри которого сайты не размещаются.
fn margin(width: f64, height: f64) -> f64 {
    1e-3 * width.min(height)
}

/// Генерирует ровно `count` точек внутри прямоугольника `width × height`.
///
/// При `jittered` точки раскладываются по сетке с дрожанием внутри каждой клетки,
/// что даёт более равномерную плотность; иначе: равномерный случайный разброс.
pub fn scatter_points(
    rng: &mut ChaCha8Rng,
    count: usize,
    width: f64,
    height: f64,
    jittered: bool,
) -> Vec<Point> {
    let m = margin(width, height);
    if !jittered {
        return (0..count)
            .map(|_| {
                Point::new(
                    rng.gen_range(m..width - m),
                    rng.gen_range(m..height - m),
                )
            })
            .collect();
    }

    let cols = ((count as f64 * width / height).sqrt().ceil() as usize).max(1);
    let rows = count.div_ceil(cols);
    let cell_w = width / cols as f64;
    let cell_h = height / rows as f64;
    (0..count)
        .map(|k| {
            let (r, c) = (k / cols, k % cols);
            let jx = rng.gen_range(0.1..0.9);
            let jy = rng.gen_range(0.1..0.9);
            Point::new(
                ((c as f64 + jx) * cell_w).clamp(m, width - m),
                ((r as f64 + jy) * cell_h).clamp(m, height - m),
            )
        })
        .collect()
}

/// Разводит совпадающие и почти совпадающие точки детерминированными сдвигами.
///
/// Ни одна точка не отбрасывается: количество сохраняется точно.
///
/// # Возвращает
/// Количество сдвинутых точек.
pub fn separate_duplicates(
    points: &mut [Point],
    rng: &mut ChaCha8Rng,
    width: f64,
    height: f64,
) -> usize {
    if points.is_empty() {
        return 0;
    }
    let m = margin(width, height);
    let min_sep = 1e-4 * (width * height / points.len() as f64).sqrt();
    let bucket = min_sep.max(f64::MIN_POSITIVE);
    let key = |p: Point| ((p.x / bucket).floor() as i64, (p.y / bucket).floor() as i64);

    let mut grid: HashMap<(i64, i64), Vec<Point>> = HashMap::new();
    let mut moved = 0;

    for p in points.iter_mut() {
        let mut attempts = 0;
        while is_crowded(&grid, key(*p), *p, min_sep) && attempts < 64 {
            let step = min_sep * 4.0;
            p.x = (p.x + rng.gen_range(-step..step)).clamp(m, width - m);
            p.y = (p.y + rng.gen_range(-step..step)).clamp(m, height - m);
            attempts += 1;
        }
        if attempts > 0 {
            moved += 1;
        }
        grid.entry(key(*p)).or_default().push(*p);
    }
    moved
}

fn is_crowded(grid: &HashMap<(i64, i64), Vec<Point>>, key: (i64, i64), p: Point, min_sep: f64) -> bool {
    let min_sq = min_sep * min_sep;
    for dy in -1..=1 {
        for dx in -1..=1 {
            if let Some(bucket) = grid.get(&(key.0 + dx, key.1 + dy))
                && bucket.iter().any(|q| q.distance_sq(p) < min_sq)
            {
                return true;
            }
        }
    }
    false
}

/// Релаксация Ллойда: каждая точка переносится в центроид своей ячейки.
pub fn relax(
    points: &mut [Point],
    iterations: usize,
    rng: &mut ChaCha8Rng,
    width: f64,
    height: f64,
) -> Result<(), GenerationError> {
    let m = margin(width, height);
    for _ in 0..iterations {
        let polygons = voronoi_polygons(points, width, height)?;
        for (p, poly) in points.iter_mut().zip(&polygons) {
            if poly.len() >= 3 {
                let c = polygon_centroid(poly);
                p.x = c.x.clamp(m, width - m);
                p.y = c.y.clamp(m, height - m);
            }
        }
        separate_duplicates(points, rng, width, height);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn scatter_is_exact_and_in_bounds() {
        for jittered in [false, true] {
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            let pts = scatter_points(&mut rng, 301, 400.0, 300.0, jittered);
            assert_eq!(pts.len(), 301);
            assert!(
                pts.iter()
                    .all(|p| p.x > 0.0 && p.x < 400.0 && p.y > 0.0 && p.y < 300.0)
            );
        }
    }

    #[test]
    fn duplicates_are_moved_not_dropped() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut pts = vec![Point::new(50.0, 50.0); 5];
        pts.push(Point::new(10.0, 10.0));
        let moved = separate_duplicates(&mut pts, &mut rng, 100.0, 100.0);
        assert_eq!(pts.len(), 6);
        assert_eq!(moved, 4);
        for i in 0..pts.len() {
            for j in i + 1..pts.len() {
                assert!(pts[i].distance(pts[j]) > 0.0);
            }
        }
    }

    #[test]
    fn duplicate_separation_is_deterministic() {
        let run = || {
            let mut rng = ChaCha8Rng::seed_from_u64(3);
            let mut pts = vec![Point::new(20.0, 20.0); 4];
            separate_duplicates(&mut pts, &mut rng, 100.0, 100.0);
            pts
        };
        assert_eq!(run(), run());
    }
}
