//! Подписи регионов, поселений и рек
//!
//! Для каждой подписи перебирается короткий список позиций относительно якоря;
//! берётся первая, которая целиком лежит в растре и не пересекает уже поставленные
//! подписи. Если такой нет, подпись пропускается.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::render::Frame;
use crate::render::font::{draw_text_with_halo, text_size};
use crate::render::stamps::settlement_half_size;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    Region,
    Settlement,
    River,
}

/// Поставленная подпись и её прямоугольник в пикселях
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelPlacement {
    pub text: String,
    pub kind: LabelKind,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl LabelPlacement {
    /// Пересечение с зазором `margin` пикселей
    #[must_use]
    pub fn overlaps(&self, other: &LabelPlacement, margin: i32) -> bool {
        self.x - margin < other.x + other.width as i32
            && other.x - margin < self.x + self.width as i32
            && self.y - margin < other.y + other.height as i32
            && other.y - margin < self.y + self.height as i32
    }
}

struct Candidate {
    text: String,
    kind: LabelKind,
    scale: u32,
    /// Левые верхние углы в порядке предпочтения
    positions: Vec<(i32, i32)>,
}

/// Раскладывает подписи без пересечений.
fn place_labels(candidates: Vec<Candidate>, width: u32, height: u32) -> Vec<(LabelPlacement, u32)> {
    let mut placed: Vec<(LabelPlacement, u32)> = Vec::new();
    for candidate in candidates {
        let (w, h) = text_size(&candidate.text, candidate.scale);
        if w == 0 {
            continue;
        }
        let margin = candidate.scale as i32;
        let fits = |x: i32, y: i32| {
            x >= margin
                && y >= margin
                && x + w as i32 + margin <= width as i32
                && y + h as i32 + margin <= height as i32
        };
        for &(x, y) in &candidate.positions {
            if !fits(x, y) {
                continue;
            }
            let label = LabelPlacement {
                text: candidate.text.clone(),
                kind: candidate.kind,
                x,
                y,
                width: w,
                height: h,
            };
            if placed.iter().all(|(other, _)| !label.overlaps(other, 2)) {
                placed.push((label, candidate.scale));
                break;
            }
        }
    }
    placed
}

fn around(anchor: (f32, f32), w: u32, h: u32, gap: i32) -> [(i32, i32); 5] {
    let (ax, ay) = (anchor.0.round() as i32, anchor.1.round() as i32);
    let (w, h) = (w as i32, h as i32);
    [
        (ax - w / 2, ay - h / 2),
        (ax - w / 2, ay - h - gap),
        (ax - w / 2, ay + gap),
        (ax + gap, ay - h / 2),
        (ax - w - gap, ay - h / 2),
    ]
}

fn collect_candidates(frame: &Frame<'_>) -> Vec<Candidate> {
    let input = frame.input;
    let graph = input.graph;
    let label_scale = frame.palette.label_scale;
    let mut candidates = Vec::new();

    // Регионы крупнее и ставятся первыми
    for region in &input.regions.regions {
        if region.name.is_empty() {
            continue;
        }
        let scale = label_scale + 1;
        let text = region.name.to_uppercase();
        let (w, h) = text_size(&text, scale);
        candidates.push(Candidate {
            positions: around(frame.transform.to_pixel(region.centroid), w, h, h as i32).to_vec(),
            text,
            kind: LabelKind::Region,
            scale,
        });
    }

    let capitals: Vec<usize> = input.features.capitals.iter().flatten().copied().collect();
    for (&index, name) in input.settlement_names {
        let Some(instance) = input.features.instances.get(index) else {
            continue;
        };
        let half = settlement_half_size(frame, capitals.contains(&index)) as i32;
        let (w, h) = text_size(name, label_scale);
        let (ax, ay) = frame.transform.to_pixel(instance.position);
        let (ax, ay) = (ax.round() as i32, ay.round() as i32);
        let gap = half + 3;
        let (w, h) = (w as i32, h as i32);
        candidates.push(Candidate {
            text: name.clone(),
            kind: LabelKind::Settlement,
            scale: label_scale,
            positions: vec![
                (ax + gap, ay - h / 2),
                (ax - gap - w, ay - h / 2),
                (ax - w / 2, ay - gap - h),
                (ax - w / 2, ay + gap),
            ],
        });
    }

    for river in &input.hydrology.rivers {
        let Some(name) = &river.name else {
            continue;
        };
        let Some(&mid) = river.corners.get(river.own_length / 2) else {
            continue;
        };
        let (w, h) = text_size(name, label_scale);
        candidates.push(Candidate {
            positions: around(frame.transform.to_pixel(graph.corners[mid].position), w, h, 3)
                .to_vec(),
            text: name.clone(),
            kind: LabelKind::River,
            scale: label_scale,
        });
    }
    candidates
}

pub fn render_labels(frame: &Frame<'_>) -> (RgbaImage, Vec<LabelPlacement>) {
    let mut img = frame.blank();
    let placed = place_labels(collect_candidates(frame), frame.width, frame.height);
    for (label, scale) in &placed {
        draw_text_with_halo(
            &mut img,
            label.x,
            label.y,
            &label.text,
            *scale,
            frame.palette.label,
            frame.palette.label_halo,
        );
    }
    (img, placed.into_iter().map(|(label, _)| label).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, positions: Vec<(i32, i32)>) -> Candidate {
        Candidate {
            text: text.into(),
            kind: LabelKind::Settlement,
            scale: 1,
            positions,
        }
    }

    #[test]
    fn second_label_moves_to_a_free_position() {
        let placed = place_labels(
            vec![
                candidate("ALPHA", vec![(10, 10)]),
                candidate("BETA", vec![(12, 12), (10, 40)]),
            ],
            200,
            100,
        );
        assert_eq!(placed.len(), 2);
        assert_eq!((placed[1].0.x, placed[1].0.y), (10, 40));
    }

    #[test]
    fn labels_never_overlap_or_leave_the_raster() {
        let candidates = (0..40)
            .map(|i| candidate("NAME", vec![(i * 3, 20), (i * 3, 35), (190, 5)]))
            .collect();
        let placed = place_labels(candidates, 200, 60);
        for (i, (a, _)) in placed.iter().enumerate() {
            assert!(a.x >= 0 && a.y >= 0 && a.x + a.width as i32 <= 200 && a.y + a.height as i32 <= 60);
            for (b, _) in &placed[i + 1..] {
                assert!(!a.overlaps(b, 0));
            }
        }
    }

    #[test]
    fn label_without_room_is_dropped() {
        let placed = place_labels(vec![candidate("WIDE LABEL", vec![(0, 0)])], 20, 20);
        assert!(placed.is_empty());
    }
}
