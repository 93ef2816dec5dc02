//! Встроенный пиксельный шрифт 5×7 (заглавные латинские буквы, цифры, пунктуация)

use image::{Rgba, RgbaImage};

pub const GLYPH_WIDTH: u32 = 5;
pub const GLYPH_HEIGHT: u32 = 7;
/// Шаг между символами в единицах шрифта
pub const ADVANCE: u32 = 6;

const FONT_5X7: &[(char, [u8; 7])] = &[
    ('A', [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('B', [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110]),
    ('C', [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110]),
    ('D', [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110]),
    ('E', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111]),
    ('F', [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('G', [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01110]),
    ('H', [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001]),
    ('I', [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('J', [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100]),
    ('K', [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001]),
    ('L', [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111]),
    ('M', [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001]),
    ('N', [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001]),
    ('O', [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('P', [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000]),
    ('Q', [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101]),
    ('R', [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001]),
    ('S', [0b01110, 0b10001, 0b10000, 0b01110, 0b00001, 0b10001, 0b01110]),
    ('T', [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('U', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110]),
    ('V', [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100]),
    ('W', [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010]),
    ('X', [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001]),
    ('Y', [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100]),
    ('Z', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111]),
    ('0', [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
    ('1', [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
    ('2', [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
    ('3', [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110]),
    ('4', [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
    ('5', [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
    ('6', [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
    ('7', [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
    ('8', [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
    ('9', [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
    ('-', [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000]),
    ('.', [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100]),
    ('\'', [0b00100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000]),
];

/// Ширина и высота строки в пикселях при увеличении `scale`.
#[must_use]
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    let width = if chars == 0 {
        0
    } else {
        (chars * ADVANCE - (ADVANCE - GLYPH_WIDTH)) * scale
    };
    (width, GLYPH_HEIGHT * scale)
}

/// Рисует символ; неизвестные символы (и пробел) оставляют пустое место.
pub fn draw_char(img: &mut RgbaImage, x: i32, y: i32, ch: char, scale: u32, color: Rgba<u8>) {
    let upper = ch.to_ascii_uppercase();
    let Some((_, bits)) = FONT_5X7.iter().find(|(c, _)| *c == upper) else {
        return;
    };
    let s = scale as i32;
    for (row, &byte) in bits.iter().enumerate() {
        for col in 0..GLYPH_WIDTH as i32 {
            if byte & (0b10000 >> col) == 0 {
                continue;
            }
            for dy in 0..s {
                for dx in 0..s {
                    let px = x + col * s + dx;
                    let py = y + row as i32 * s + dy;
                    if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height()
                    {
                        img.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

pub fn draw_text(img: &mut RgbaImage, x: i32, y: i32, text: &str, scale: u32, color: Rgba<u8>) {
    let mut cx = x;
    for ch in text.chars() {
        draw_char(img, cx, y, ch, scale, color);
        cx += (ADVANCE * scale) as i32;
    }
}

/// Текст с ореолом: сначала контур во все восемь сторон, затем сам текст.
pub fn draw_text_with_halo(
    img: &mut RgbaImage,
    x: i32,
    y: i32,
    text: &str,
    scale: u32,
    color: Rgba<u8>,
    halo: Rgba<u8>,
) {
    let r = scale as i32;
    for dy in [-r, 0, r] {
        for dx in [-r, 0, r] {
            if dx != 0 || dy != 0 {
                draw_text(img, x + dx, y + dy, text, scale, halo);
            }
        }
    }
    draw_text(img, x, y, text, scale, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_accounts_for_spacing_and_scale() {
        assert_eq!(text_size("AB", 1), (11, 7));
        assert_eq!(text_size("AB", 2), (22, 14));
        assert_eq!(text_size("", 3), (0, 21));
    }

    #[test]
    fn lowercase_is_drawn_as_uppercase() {
        let mut a = RgbaImage::new(8, 8);
        let mut b = RgbaImage::new(8, 8);
        let ink = Rgba([0, 0, 0, 255]);
        draw_char(&mut a, 1, 0, 'q', 1, ink);
        draw_char(&mut b, 1, 0, 'Q', 1, ink);
        assert_eq!(a, b);
        assert!(a.pixels().any(|p| p[3] == 255));
    }

    #[test]
    fn drawing_outside_the_image_is_clipped() {
        let mut img = RgbaImage::new(4, 4);
        draw_text_with_halo(&mut img, -3, -3, "W", 2, Rgba([1, 2, 3, 255]), Rgba([9, 9, 9, 255]));
        assert!(img.pixels().any(|p| p[3] == 255));
    }
}
