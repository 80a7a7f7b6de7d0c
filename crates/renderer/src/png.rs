//! PNG encoding for RGBA image data.
//!
//! Supports two encoding modes:
//! - **Indexed PNG (color type 3)**: used for blank canvases, a single
//!   transparent palette entry.
//! - **RGBA PNG (color type 6)**: arbitrary pixel data.

use std::io::Write;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Create a fully transparent PNG of the given size.
///
/// Encoded as a one-entry palette image, so even large canvases stay a few
/// hundred bytes.
pub fn blank_canvas(width: usize, height: usize) -> Result<Vec<u8>, String> {
    if width == 0 || height == 0 {
        return Err(format!("invalid canvas size {}x{}", width, height));
    }
    png_dimensions(width, height)?;
    let indices = vec![0u8; pixel_count(width, height, 1)?];
    create_png_indexed(width, height, &[(0, 0, 0, 0)], &indices)
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[(u8, u8, u8, u8)],
    indices: &[u8],
) -> Result<Vec<u8>, String> {
    if palette.is_empty() || palette.len() > 256 {
        return Err(format!("palette must hold 1-256 colors, got {}", palette.len()));
    }
    let expected = pixel_count(width, height, 1)?;
    if indices.len() != expected {
        return Err(format!(
            "expected {} indices for {}x{}, got {}",
            expected,
            width,
            height,
            indices.len()
        ));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3)?);

    let plte_data: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS only if any color has alpha < 255
    if palette.iter().any(|(_, _, _, a)| *a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|(_, _, _, a)| *a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    let idat_data = deflate_scanlines(indices, width, height, 1)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    let expected = pixel_count(width, height, 4)?;
    if pixels.len() != expected {
        return Err(format!(
            "expected {} RGBA bytes for {}x{}, got {}",
            expected,
            width,
            height,
            pixels.len()
        ));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6)?);

    let idat_data = deflate_scanlines(pixels, width, height, 4)
        .map_err(|e| format!("IDAT compression failed: {}", e))?;
    write_chunk(&mut png, b"IDAT", &idat_data);

    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Bytes needed for a `width` x `height` image, failing on overflow.
fn pixel_count(width: usize, height: usize, bytes_per_pixel: usize) -> Result<usize, String> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(bytes_per_pixel))
        .ok_or_else(|| format!("image size {}x{} overflows", width, height))
}

/// PNG stores dimensions as u32.
fn png_dimensions(width: usize, height: usize) -> Result<(u32, u32), String> {
    let w = u32::try_from(width).map_err(|_| format!("width {} exceeds the PNG limit", width))?;
    let h = u32::try_from(height).map_err(|_| format!("height {} exceeds the PNG limit", height))?;
    Ok((w, h))
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Result<Vec<u8>, String> {
    let (w, h) = png_dimensions(width, height)?;

    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&w.to_be_bytes());
    data.extend_from_slice(&h.to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    Ok(data)
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Prefix each scanline with filter byte 0 and zlib-compress.
fn deflate_scanlines(
    data: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>, std::io::Error> {
    let stride = width * bytes_per_pixel;
    let mut uncompressed = Vec::with_capacity(height * (1 + stride));
    for row in data.chunks_exact(stride).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&uncompressed)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_and_ihdr() {
        let png = create_png(&[255, 0, 0, 255], 1, 1).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(png[25], 6);
        assert_eq!(&png[png.len() - 8..png.len() - 4], b"IEND");
    }

    #[test]
    fn test_rejects_short_buffer() {
        assert!(create_png(&[0, 0, 0], 1, 1).is_err());
        assert!(create_png_indexed(2, 2, &[(0, 0, 0, 0)], &[0]).is_err());
    }

    #[test]
    fn test_blank_canvas_zero_size() {
        assert!(blank_canvas(0, 10).is_err());
        assert!(blank_canvas(10, 0).is_err());
    }

    #[test]
    fn test_oversized_dimensions_are_errors() {
        assert!(pixel_count(usize::MAX / 2, 3, 1).is_err());
        assert!(create_png(&[], usize::MAX / 2, 3).is_err());
        assert!(ihdr(1 << 32, 1, 3).is_err());
        assert!(blank_canvas(1 << 32, 1).is_err());
        assert_eq!(pixel_count(4, 3, 4).unwrap(), 48);
    }
}
