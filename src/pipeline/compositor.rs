//! Pure raster transforms: circular crop, chroma-key transparency, opacity
//! fades, and the fills used to rasterise rectangle directives.
//!
//! ## Why per-call allocation?
//!
//! Every operation allocates its own output buffer and touches no shared
//! state, so the whole module is safe to call from any number of concurrent
//! tasks without synchronisation. Nothing here does I/O; decoding bytes into
//! a [`DynamicImage`] is the caller's single entry point ([`decode`]) and
//! everything downstream is deterministic — identical input always produces
//! byte-identical output.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Decode raw image bytes, sniffing the format from the content.
///
/// Returns `None` for anything undecodable; callers treat that the same as
/// a missing asset.
pub fn decode(bytes: &[u8]) -> Option<DynamicImage> {
    if bytes.is_empty() {
        return None;
    }
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .decode()
        .ok()
}

/// Crop `source` to a circle inscribed in a `diameter × quality_scale`
/// square canvas.
///
/// The source is cover-fitted (scaled by `max(side/w, side/h)`, centered) so
/// arbitrary aspect ratios fill the circle with no letterboxing, then masked
/// hard: every pixel whose center lies inside the inscribed circle is fully
/// opaque, every pixel outside is fully transparent. `quality_scale` (≥ 1)
/// renders at higher resolution than the final placement size so the
/// document layer can scale down without visible aliasing.
///
/// Returns `None` for degenerate inputs (zero-sized source or diameter).
pub fn circular_crop(
    source: &DynamicImage,
    diameter: u32,
    quality_scale: u32,
) -> Option<RgbaImage> {
    let side = diameter.checked_mul(quality_scale.max(1))?;
    if side == 0 || source.width() == 0 || source.height() == 0 {
        return None;
    }

    let mut out = cover_fit(source, side, side);

    let center = side as f64 / 2.0;
    let radius = side as f64 / 2.0;
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let dx = (x as f64 + 0.5) - center;
        let dy = (y as f64 + 0.5) - center;
        pixel.0[3] = if dx * dx + dy * dy <= radius * radius {
            255
        } else {
            0
        };
    }

    debug!("circular_crop: {}px canvas from {}x{} source", side, source.width(), source.height());
    Some(out)
}

/// Key near-white pixels to full transparency.
///
/// A pixel is keyed when R, G and B are all strictly above `threshold`;
/// every other pixel keeps its RGB exactly and becomes fully opaque. Output
/// dimensions always equal input dimensions — no resampling, so the keyed
/// image drops into the exact placement the un-keyed one would have had.
pub fn chroma_key(source: &DynamicImage, threshold: u8) -> Option<RgbaImage> {
    if source.width() == 0 || source.height() == 0 {
        return None;
    }

    let mut out = source.to_rgba8();
    for pixel in out.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        pixel.0[3] = if r > threshold && g > threshold && b > threshold {
            0
        } else {
            255
        };
    }
    Some(out)
}

/// Multiply every pixel's alpha by `opacity` (clamped to 0..=1).
///
/// Used for watermark placement; the image keeps its dimensions and colors.
pub fn fade(image: &mut RgbaImage, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    for pixel in image.pixels_mut() {
        pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
    }
}

/// Scale `source` so it covers a `width × height` box (aspect preserved,
/// centered, overflow cropped) — the raster equivalent of CSS
/// `object-fit: cover`.
pub fn cover_fit(source: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (sw, sh) = (source.width(), source.height());
    let scale = f64::max(width as f64 / sw as f64, height as f64 / sh as f64);
    let dw = ((sw as f64 * scale).ceil() as u32).max(width);
    let dh = ((sh as f64 * scale).ceil() as u32).max(height);

    let resized = source.resize_exact(dw, dh, FilterType::Triangle);
    let x0 = (dw - width) / 2;
    let y0 = (dh - height) / 2;
    imageops::crop_imm(&resized, x0, y0, width, height).to_image()
}

/// Scale `source` to exactly `width × height`, distorting aspect ratio if
/// needed — matching how backgrounds and barcode images are stretched into
/// their declared boxes.
pub fn stretch_fit(source: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    if source.width() == width && source.height() == height {
        return source.clone();
    }
    imageops::resize(source, width, height, FilterType::Triangle)
}

/// Fill an axis-aligned rectangle on `canvas`, clipped to the canvas bounds.
/// Alpha-opaque colors overwrite; translucent colors blend over.
pub fn fill_rect(canvas: &mut RgbaImage, x: i64, y: i64, width: u32, height: u32, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x1 = (x + width as i64).min(cw);
    let y1 = (y + height as i64).min(ch);
    for py in y.max(0)..y1.max(0) {
        for px in x.max(0)..x1.max(0) {
            let dst = canvas.get_pixel_mut(px as u32, py as u32);
            if color.0[3] == 255 {
                *dst = color;
            } else {
                blend(dst, color);
            }
        }
    }
}

/// Source-over blend of `src` onto `dst`.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = src.0[3] as f32 / 255.0;
    for i in 0..3 {
        let d = dst.0[i] as f32;
        let s = src.0[i] as f32;
        dst.0[i] = (s * sa + d * (1.0 - sa)).round() as u8;
    }
    let da = dst.0[3] as f32 / 255.0;
    dst.0[3] = ((sa + da * (1.0 - sa)) * 255.0).round() as u8;
}

/// Encode an image as PNG bytes. PNG is lossless, so the idempotence
/// guarantee extends to the encoded form.
pub fn png_bytes(image: &RgbaImage) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}
