//! CPU drawing of the pose overlay and JPEG encoding for the video feed.

use anyhow::{Result, anyhow};
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use pose_core::{BodyLandmark, LandmarkSet, MetricsSnapshot, SKELETON};
use video_ingest::{Frame, FrameFormat};

const CONNECTION_COLOR: Rgb<u8> = Rgb([245, 245, 245]);
const JOINT_COLOR: Rgb<u8> = Rgb([230, 40, 40]);
const TRACKED_ARM_COLOR: Rgb<u8> = Rgb([40, 220, 90]);
const HUD_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const HUD_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

const TRACKED_ARM: [(BodyLandmark, BodyLandmark); 2] = [
    (BodyLandmark::LeftShoulder, BodyLandmark::LeftElbow),
    (BodyLandmark::LeftElbow, BodyLandmark::LeftWrist),
];

/// Convert a captured frame into an owned RGB image.
pub(crate) fn frame_to_rgb(frame: &Frame) -> Result<RgbImage> {
    let width = u32::try_from(frame.width).map_err(|_| anyhow!("negative frame width"))?;
    let height = u32::try_from(frame.height).map_err(|_| anyhow!("negative frame height"))?;
    let expected = Frame::expected_len(frame.width, frame.height, frame.format);
    if frame.data.len() != expected {
        return Err(anyhow!(
            "frame buffer has {} bytes, expected {expected} for {width}x{height}",
            frame.data.len()
        ));
    }
    let data = match frame.format {
        FrameFormat::Bgr8 => bgr_to_rgb(&frame.data),
        FrameFormat::Rgb8 => frame.data.clone(),
    };
    RgbImage::from_vec(width, height, data)
        .ok_or_else(|| anyhow!("failed to convert frame into image buffer"))
}

fn bgr_to_rgb(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks_exact(3) {
        output.extend_from_slice(&[chunk[2], chunk[1], chunk[0]]);
    }
    output
}

/// Draw skeleton connections and joints for every landmark present.
pub(crate) fn draw_skeleton(image: &mut RgbImage, landmarks: &LandmarkSet) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    for (from, to) in SKELETON {
        if let (Some(a), Some(b)) = (landmarks.get(*from), landmarks.get(*to)) {
            let color = if TRACKED_ARM.contains(&(*from, *to)) {
                TRACKED_ARM_COLOR
            } else {
                CONNECTION_COLOR
            };
            draw_line(
                image,
                a.to_pixel(width, height),
                b.to_pixel(width, height),
                color,
            );
        }
    }

    for (_, point) in landmarks.iter() {
        let (x, y) = point.to_pixel(width, height);
        fill_rect(image, x - 2, y - 2, x + 2, y + 2, JOINT_COLOR);
    }
}

/// Burn the rep count and elbow angle into the bottom-left corner.
pub(crate) fn draw_hud(image: &mut RgbImage, snapshot: &MetricsSnapshot) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    if width == 0 || height == 0 {
        return;
    }
    let stage = snapshot.stage.label().unwrap_or("-");
    let text = format!(
        "REPS {}  {}  ANGLE {:.0}",
        snapshot.reps, stage, snapshot.angle
    );
    let text_width = (text.chars().count() as i32 * 6).min(width);
    let x = 4;
    let y = (height - 12).max(0);
    fill_rect(image, x - 2, y - 2, x + text_width + 2, y + 8, HUD_BACKGROUND);
    draw_label(image, x, y, &text, HUD_TEXT);
}

/// Encode an RGB image as a baseline JPEG.
pub(crate) fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        return Err(anyhow!("cannot encode an empty image"));
    }
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(image)
        .map_err(|err| anyhow!("JPEG encode failed: {err}"))?;
    Ok(buffer)
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Two-pixel-wide Bresenham line.
fn draw_line(image: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let (x1, y1) = to;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(image, x, y, color);
        put_pixel(image, x + 1, y, color);
        put_pixel(image, x, y + 1, color);
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

fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.clamp(0, width.saturating_sub(1));
    let right = right.clamp(0, width.saturating_sub(1));
    let top = top.clamp(0, height.saturating_sub(1));
    let bottom = bottom.clamp(0, height.saturating_sub(1));

    for y in top..=bottom {
        for x in left..=right {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn draw_label(image: &mut RgbImage, mut x: i32, y: i32, text: &str, color: Rgb<u8>) {
    for ch in text.chars().flat_map(|c| c.to_uppercase()) {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        put_pixel(image, x + col, y + row as i32, color);
                    }
                }
            }
        }
        x += 6;
    }
}

/// 5x7 bitmap glyphs for the characters the HUD uses, one row per byte.
const GLYPHS: &[(char, [u8; 7])] = &[
    ('A', [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11]),
    ('D', [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C]),
    ('E', [0x1F, 0x10, 0x1E, 0x10, 0x10, 0x10, 0x1F]),
    ('G', [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F]),
    ('N', [0x11, 0x19, 0x15, 0x15, 0x13, 0x11, 0x11]),
    ('O', [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('P', [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10]),
    ('R', [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11]),
    ('S', [0x0F, 0x10, 0x0E, 0x01, 0x01, 0x11, 0x0E]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E]),
    ('W', [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A]),
    ('0', [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E]),
    ('1', [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E]),
    ('2', [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F]),
    ('3', [0x1E, 0x01, 0x01, 0x0E, 0x01, 0x01, 0x1E]),
    ('4', [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02]),
    ('5', [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E]),
    ('6', [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E]),
    ('7', [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08]),
    ('8', [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E]),
    ('9', [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C]),
    ('-', [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00]),
    (' ', [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]),
];

fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    GLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == ch)
        .map(|(_, rows)| *rows)
}
