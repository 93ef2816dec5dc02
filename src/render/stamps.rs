//! Значки объектов: горы, холмы, деревья, поселения
//!
//! Рисуются сверху вниз по экранной `y`, чтобы нижние значки перекрывали верхние.

use std::collections::HashSet;

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut, draw_hollow_rect_mut,
    draw_polygon_mut,
};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect;

use crate::features::{FeatureInstance, FeatureKind};
use crate::render::Frame;

fn darken(color: Rgba<u8>, factor: f32) -> Rgba<u8> {
    let ch = |v: u8| (f32::from(v) * factor) as u8;
    Rgba([ch(color[0]), ch(color[1]), ch(color[2]), color[3]])
}

fn mountain(img: &mut RgbaImage, x: f32, y: f32, size: f32, rotation: f32, color: Rgba<u8>) {
    let (sin, cos) = rotation.sin_cos();
    let vertex = |dx: f32, dy: f32| {
        PixelPoint::new(
            (x + dx * cos - dy * sin).round() as i32,
            (y + dx * sin + dy * cos).round() as i32,
        )
    };
    let outline = [
        vertex(-size, size * 0.5),
        vertex(0.0, -size),
        vertex(size, size * 0.5),
    ];
    if outline[0] == outline[2] || outline[0] == outline[1] || outline[1] == outline[2] {
        return;
    }
    draw_polygon_mut(img, &outline, color);
    // Теневой склон
    let shadow = [outline[1], outline[2], vertex(0.0, size * 0.5)];
    if shadow[0] != shadow[2] && shadow[1] != shadow[2] {
        draw_polygon_mut(img, &shadow, darken(color, 0.7));
    }
}

fn hill(img: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>) {
    let rx = size.round().max(1.0) as i32;
    let ry = (size * 0.5).round().max(1.0) as i32;
    draw_filled_ellipse_mut(img, (x, y), rx, ry, color);
}

fn tree(img: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>) {
    let crown = (size * 0.6).round().max(1.0) as i32;
    let trunk = (size * 0.25).round().max(1.0) as u32;
    draw_filled_rect_mut(
        img,
        Rect::at(x - trunk as i32 / 2, y).of_size(trunk, (crown as u32).max(1)),
        darken(color, 0.6),
    );
    draw_filled_circle_mut(img, (x, y - crown / 2), crown, color);
}

fn settlement(img: &mut RgbaImage, x: i32, y: i32, half: u32, capital: bool, frame: &Frame<'_>) {
    let palette = frame.palette;
    let side = half * 2 + 1;
    let at = Rect::at(x - half as i32, y - half as i32).of_size(side, side);
    draw_filled_rect_mut(img, at, palette.settlement);
    let outer = Rect::at(x - half as i32 - 1, y - half as i32 - 1).of_size(side + 2, side + 2);
    draw_hollow_rect_mut(img, outer, palette.label_halo);
    if capital && half >= 2 {
        let inner = Rect::at(x - half as i32 / 2, y - half as i32 / 2).of_size(half + 1, half + 1);
        draw_filled_rect_mut(img, inner, palette.label_halo);
    }
}

/// Полуразмер квадрата поселения в пикселях
#[must_use]
pub fn settlement_half_size(frame: &Frame<'_>, capital: bool) -> u32 {
    let base = frame.palette.label_scale + 1;
    if capital { base * 2 } else { base }
}

pub fn render_features(frame: &Frame<'_>) -> RgbaImage {
    let input = frame.input;
    let layout = input.features;
    let palette = frame.palette;
    let mut img = frame.blank();

    let capitals: HashSet<usize> = layout.capitals.iter().flatten().copied().collect();
    let unit = (input.min_feature_spacing * frame.transform.scale * 0.5).clamp(2.0, 24.0);

    let mut order: Vec<(usize, &FeatureInstance)> = layout.instances.iter().enumerate().collect();
    order.sort_by(|(ia, a), (ib, b)| a.position.y.total_cmp(&b.position.y).then(ia.cmp(ib)));

    for (index, instance) in order {
        let (x, y) = frame.transform.to_pixel(instance.position);
        let size = (unit * instance.scale) as f32;
        let (ix, iy) = (x.round() as i32, y.round() as i32);
        match instance.kind {
            FeatureKind::Mountain => {
                mountain(&mut img, x, y, size, instance.rotation as f32, palette.mountain);
            }
            FeatureKind::Hill => hill(&mut img, ix, iy, size * 0.8, palette.hill),
            FeatureKind::Tree => tree(&mut img, ix, iy, size * 0.6, palette.tree),
            FeatureKind::Settlement => {
                let capital = capitals.contains(&index);
                let half = settlement_half_size(frame, capital);
                settlement(&mut img, ix, iy, half, capital, frame);
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mountain_is_drawn_around_its_anchor() {
        let mut img = RgbaImage::new(40, 40);
        mountain(&mut img, 20.0, 20.0, 8.0, 0.0, Rgba([90, 70, 50, 255]));
        assert_eq!(img.get_pixel(20, 18)[3], 255);
        assert_eq!(img.get_pixel(2, 2)[3], 0);
    }

    #[test]
    fn tiny_mountain_is_skipped_instead_of_degenerate() {
        let mut img = RgbaImage::new(10, 10);
        mountain(&mut img, 5.0, 5.0, 0.1, 0.0, Rgba([1, 1, 1, 255]));
        assert!(img.pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn tree_stays_near_its_anchor() {
        let mut img = RgbaImage::new(40, 40);
        tree(&mut img, 20, 20, 6.0, Rgba([0, 120, 0, 255]));
        let painted: Vec<(u32, u32)> = img
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!painted.is_empty());
        assert!(painted.iter().all(|&(x, y)| x.abs_diff(20) <= 6 && y.abs_diff(20) <= 8));
    }
}
