use std::io::Cursor;

use anyhow::{bail, Context, Result};
use image::{ImageOutputFormat, Rgb, RgbImage};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const MARGIN_LEFT: i32 = 50;
const MARGIN_RIGHT: i32 = 20;
const MARGIN_TOP: i32 = 20;
const MARGIN_BOTTOM: i32 = 40;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const AXIS: Rgb<u8> = Rgb([90, 90, 90]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Рисует ломаную динамики количества полётов и кодирует её в PNG.
/// Пустой список точек — ошибка.
pub fn flights_trend_png(counts: &[i64]) -> Result<Vec<u8>> {
    if counts.is_empty() {
        bail!("нет точек для графика");
    }

    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let plot_w = WIDTH as i32 - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT as i32 - MARGIN_TOP - MARGIN_BOTTOM;
    let max = counts.iter().copied().max().unwrap_or(0).max(1);

    for step in 1..=4 {
        let y = MARGIN_TOP + plot_h - plot_h * step / 4;
        draw_line(&mut img, MARGIN_LEFT, y, MARGIN_LEFT + plot_w, y, GRID);
    }
    draw_line(
        &mut img,
        MARGIN_LEFT,
        MARGIN_TOP,
        MARGIN_LEFT,
        MARGIN_TOP + plot_h,
        AXIS,
    );
    draw_line(
        &mut img,
        MARGIN_LEFT,
        MARGIN_TOP + plot_h,
        MARGIN_LEFT + plot_w,
        MARGIN_TOP + plot_h,
        AXIS,
    );

    let points: Vec<(i32, i32)> = counts
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let x = if counts.len() == 1 {
                MARGIN_LEFT + plot_w / 2
            } else {
                MARGIN_LEFT + plot_w * i as i32 / (counts.len() as i32 - 1)
            };
            let clamped = value.max(0);
            let y = MARGIN_TOP + plot_h - (plot_h as i64 * clamped / max) as i32;
            (x, y)
        })
        .collect();

    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        // линия в два пикселя толщиной
        draw_line(&mut img, x0, y0, x1, y1, LINE);
        draw_line(&mut img, x0, y0 + 1, x1, y1 + 1, LINE);
    }
    for &(x, y) in &points {
        draw_marker(&mut img, x, y, LINE);
    }

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageOutputFormat::Png)
        .context("не удалось закодировать PNG")?;
    Ok(buf.into_inner())
}

fn draw_line(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y, mut err) = (x0, y0, dx + dy);
    loop {
        put_pixel_checked(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

fn draw_marker(img: &mut RgbImage, cx: i32, cy: i32, color: Rgb<u8>) {
    for x in cx - 2..=cx + 2 {
        for y in cy - 2..=cy + 2 {
            put_pixel_checked(img, x, y, color);
        }
    }
}

fn put_pixel_checked(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_png_for_monthly_counts() {
        let png = flights_trend_png(&[120, 150, 90, 0, 15]).unwrap();
        assert_eq!(png[..4], [0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn single_point_still_renders() {
        assert!(flights_trend_png(&[42]).is_ok());
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(flights_trend_png(&[]).is_err());
    }
}
