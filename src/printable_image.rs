use crate::bitmap::{Bitmap, PixelFormat};
use crate::error::{Error, Result};
use crate::tape::TapeSpec;

/// Image reduced to ink/background, oriented so that its height spans the
/// printable pins of the tape
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrintableImage {
    width: u32,
    height: u32,
    ink: Vec<bool>,
}

impl PrintableImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.ink[y as usize * self.width as usize + x as usize]
    }
}

/// Fit `bitmap` to the tape and reduce it to one bit per pixel
///
/// An image whose width (instead of its height) matches the printable
/// height is rotated by 90 degrees.
pub fn prepare_image(bitmap: &Bitmap, tape_spec: &TapeSpec) -> Result<PrintableImage> {
    let expected_height = tape_spec.print_pins;

    let rotated;
    let fitted = if bitmap.height() == expected_height {
        bitmap
    } else if bitmap.width() == expected_height {
        rotated = bitmap.rotate_90();
        &rotated
    } else {
        return Err(Error::Dimension {
            expected: expected_height,
            width: bitmap.width(),
            height: bitmap.height(),
        });
    };

    select_raster_channel(fitted)
}

/// Per-pixel ink decision for the supported color spaces
fn select_raster_channel(bitmap: &Bitmap) -> Result<PrintableImage> {
    let is_ink: Box<dyn Fn(&[u8]) -> bool + '_> = match bitmap.format() {
        // Only pure white is background
        PixelFormat::Gray => Box::new(|px: &[u8]| px[0] < 0xFF),
        PixelFormat::Rgb => Box::new(|px: &[u8]| luma(px[0], px[1], px[2]) < 0x80),
        PixelFormat::Rgba => {
            Box::new(|px: &[u8]| luma_over_white(px[0], px[1], px[2], px[3]) < 0x80)
        }
        PixelFormat::Indexed { palette, alpha } if alpha.is_empty() => {
            Box::new(move |px: &[u8]| {
                let [r, g, b] = palette[px[0] as usize];
                luma(r, g, b) < 0x80
            })
        }
        PixelFormat::Indexed { palette, alpha } => Box::new(move |px: &[u8]| {
            let index = px[0] as usize;
            let [r, g, b] = palette[index];
            let a = alpha.get(index).copied().unwrap_or(0xFF);
            luma_over_white(r, g, b, a) < 0x80
        }),
        other => return Err(Error::UnsupportedColorSpace(other.to_string())),
    };

    let mut ink = Vec::with_capacity(bitmap.width() as usize * bitmap.height() as usize);
    for y in 0..bitmap.height() {
        for x in 0..bitmap.width() {
            ink.push(is_ink(bitmap.pixel(x, y)));
        }
    }

    Ok(PrintableImage {
        width: bitmap.width(),
        height: bitmap.height(),
        ink,
    })
}

/// ITU-R 601-2 luma
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000) as u8
}

/// Luma of the pixel composited over a white background
fn luma_over_white(r: u8, g: u8, b: u8, a: u8) -> u8 {
    let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
    luma(blend(r), blend(g), blend(b))
}

/// One byte per print-head pin, column by column
///
/// Each image column becomes one raster line: leading margin, one byte per
/// pixel row (`0xFF` for ink), trailing margin.
pub fn raster_image(image: &PrintableImage, tape_spec: &TapeSpec) -> Vec<u8> {
    let margin = tape_spec.margin_pins as usize;
    let line_length = margin * 2 + image.height() as usize;
    let mut buffer = Vec::with_capacity(line_length * image.width() as usize);

    for column in 0..image.width() {
        buffer.extend(std::iter::repeat_n(0x00, margin));
        for row in 0..image.height() {
            buffer.push(if image.is_ink(column, row) { 0xFF } else { 0x00 });
        }
        buffer.extend(std::iter::repeat_n(0x00, margin));
    }

    buffer
}

/// Pack every 8 bytes into one, first byte in the most significant bit
pub fn compress_buffer(buffer: &[u8]) -> Result<Vec<u8>> {
    if buffer.len() % 8 != 0 {
        return Err(Error::Alignment { len: buffer.len() });
    }

    Ok(buffer
        .chunks_exact(8)
        .map(|group| {
            group
                .iter()
                .enumerate()
                .filter(|(_, value)| **value != 0)
                .fold(0u8, |byte, (j, _)| byte | (1 << (7 - j)))
        })
        .collect())
}

/// Raster stream for `image`, ready for [`gen_raster_commands`](crate::raster_command::gen_raster_commands)
pub fn rasterize(image: &PrintableImage, tape_spec: &TapeSpec) -> Result<Vec<u8>> {
    if image.height() != tape_spec.print_pins {
        return Err(Error::Dimension {
            expected: tape_spec.print_pins,
            width: image.width(),
            height: image.height(),
        });
    }
    compress_buffer(&raster_image(image, tape_spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{LINE_LENGTH_BYTES, Tape};
    use pretty_assertions::assert_eq;

    fn decompress_buffer(bits: &[u8]) -> Vec<u8> {
        bits.iter()
            .flat_map(|&byte| {
                (0..8).map(move |j| if byte & (1 << (7 - j)) != 0 { 0xFF } else { 0x00 })
            })
            .collect()
    }

    fn gray(width: u32, height: u32, value: u8) -> Bitmap {
        let samples = vec![value; (width * height) as usize];
        Bitmap::new(width, height, PixelFormat::Gray, samples).unwrap()
    }

    #[test]
    fn test_height_match_passes_through() {
        let tape = TapeSpec::new(Tape::TZe12);
        let image = prepare_image(&gray(40, 70, 0x00), &tape).unwrap();
        assert_eq!((image.width(), image.height()), (40, 70));
    }

    #[test]
    fn test_width_match_rotates() {
        let tape = TapeSpec::new(Tape::TZe12);
        let mut samples = vec![0xFF; 70 * 40];
        // Ink only at the top-right pixel
        samples[69] = 0x00;
        let bitmap = Bitmap::new(70, 40, PixelFormat::Gray, samples).unwrap();

        let image = prepare_image(&bitmap, &tape).unwrap();
        assert_eq!((image.width(), image.height()), (40, 70));
        assert!(image.is_ink(0, 0));
        assert!(!image.is_ink(39, 69));
    }

    #[test]
    fn test_square_match_passes_through() {
        let tape = TapeSpec::new(Tape::TZe24);
        let image = prepare_image(&gray(128, 128, 0x00), &tape).unwrap();
        assert_eq!((image.width(), image.height()), (128, 128));
    }

    #[test]
    fn test_no_axis_matches() {
        let tape = TapeSpec::new(Tape::TZe12);
        let result = prepare_image(&gray(40, 30, 0x00), &tape);
        assert!(matches!(
            result,
            Err(Error::Dimension {
                expected: 70,
                width: 40,
                height: 30
            })
        ));
    }

    #[test]
    fn test_gray_threshold_only_white_is_background() {
        let tape = TapeSpec::new(Tape::TZe3);
        let samples: Vec<u8> = (0..24).map(|y| if y == 0 { 0xFF } else { 0xFE }).collect();
        let bitmap = Bitmap::new(1, 24, PixelFormat::Gray, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        assert!(!image.is_ink(0, 0));
        assert!((1..24).all(|y| image.is_ink(0, y)));
    }

    #[test]
    fn test_rgb_threshold_at_midpoint() {
        let tape = TapeSpec::new(Tape::TZe3);
        let mut samples = Vec::new();
        for y in 0..24u8 {
            let v = if y % 2 == 0 { 0x80 } else { 0x7F };
            samples.extend_from_slice(&[v, v, v]);
        }
        let bitmap = Bitmap::new(1, 24, PixelFormat::Rgb, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        assert!(!image.is_ink(0, 0));
        assert!(image.is_ink(0, 1));
    }

    #[test]
    fn test_rgba_transparent_is_background() {
        let tape = TapeSpec::new(Tape::TZe3);
        let mut samples = Vec::new();
        for y in 0..24u8 {
            let a = if y == 0 { 0x00 } else { 0xFF };
            samples.extend_from_slice(&[0, 0, 0, a]);
        }
        let bitmap = Bitmap::new(1, 24, PixelFormat::Rgba, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        assert!(!image.is_ink(0, 0));
        assert!(image.is_ink(0, 1));
    }

    #[test]
    fn test_indexed_with_transparency() {
        let tape = TapeSpec::new(Tape::TZe3);
        let format = PixelFormat::Indexed {
            palette: vec![[0, 0, 0], [0, 0, 0], [255, 255, 255]],
            alpha: vec![0x00],
        };
        let samples: Vec<u8> = (0..24).map(|y| (y % 3) as u8).collect();
        let bitmap = Bitmap::new(1, 24, format, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        // transparent black, opaque black, white
        assert!(!image.is_ink(0, 0));
        assert!(image.is_ink(0, 1));
        assert!(!image.is_ink(0, 2));
    }

    #[test]
    fn test_indexed_without_transparency() {
        let tape = TapeSpec::new(Tape::TZe3);
        let format = PixelFormat::Indexed {
            palette: vec![[0, 0, 0], [255, 255, 255]],
            alpha: vec![],
        };
        let samples: Vec<u8> = (0..24).map(|y| (y % 2) as u8).collect();
        let bitmap = Bitmap::new(1, 24, format, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        assert!(image.is_ink(0, 0));
        assert!(!image.is_ink(0, 1));
    }

    #[test]
    fn test_gray_png_with_transparency_is_thresholded() {
        let tape = TapeSpec::new(Tape::TZe3);
        let rows: Vec<u8> = (0..24).map(|y| if y % 2 == 0 { 0x00 } else { 0xFF }).collect();
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, 1, 24);
            encoder.set_color(png::ColorType::Grayscale);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_trns(vec![0x00, 0xFF]);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&rows).unwrap();
        }

        let bitmap = Bitmap::from_png_data(&png_data).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();
        for y in 0..24 {
            assert_eq!(image.is_ink(0, y), y % 2 == 0);
        }
    }

    #[test]
    fn test_gray_alpha_is_unsupported() {
        let tape = TapeSpec::new(Tape::TZe3);
        let bitmap = Bitmap::new(1, 24, PixelFormat::GrayAlpha, vec![0; 48]).unwrap();
        assert!(matches!(
            prepare_image(&bitmap, &tape),
            Err(Error::UnsupportedColorSpace(_))
        ));
    }

    #[test]
    fn test_raster_image_layout() {
        let tape = TapeSpec::new(Tape::TZe18);
        let mut samples = vec![0xFF; 2 * 112];
        // column 1, row 0 is ink
        samples[1] = 0x00;
        let bitmap = Bitmap::new(2, 112, PixelFormat::Gray, samples).unwrap();
        let image = prepare_image(&bitmap, &tape).unwrap();

        let buffer = raster_image(&image, &tape);
        assert_eq!(buffer.len(), 2 * 128);
        assert!(buffer[..128].iter().all(|&b| b == 0x00));
        let second = &buffer[128..];
        assert!(second[..8].iter().all(|&b| b == 0x00));
        assert_eq!(second[8], 0xFF);
        assert!(second[9..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_every_tape_packs_into_whole_lines() {
        for tape in [Tape::TZe3, Tape::TZe6, Tape::TZe9, Tape::TZe12, Tape::TZe18, Tape::TZe24] {
            let spec = TapeSpec::new(tape);
            let bitmap = gray(3, spec.print_pins, 0x00);
            let image = prepare_image(&bitmap, &spec).unwrap();
            let raster = rasterize(&image, &spec).unwrap();
            assert_eq!(raster.len(), 3 * LINE_LENGTH_BYTES);
        }
    }

    #[test]
    fn test_rasterize_places_ink_after_margin() {
        let spec = TapeSpec::new(Tape::TZe12);
        let image = prepare_image(&gray(1, 70, 0x00), &spec).unwrap();
        let raster = rasterize(&image, &spec).unwrap();
        // 29 margin bits, 70 ink bits, 29 margin bits
        let expected = decompress_buffer(&raster);
        assert!(expected[..29].iter().all(|&b| b == 0x00));
        assert!(expected[29..99].iter().all(|&b| b == 0xFF));
        assert!(expected[99..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_compress_buffer_msb_first() {
        let buffer = [0xFF, 0, 0, 0, 0, 0, 0, 0x01, 0, 0x10, 0, 0, 0, 0, 0, 0];
        assert_eq!(compress_buffer(&buffer).unwrap(), vec![0x81, 0x40]);
    }

    #[test]
    fn test_compress_buffer_inverse() {
        let patterns: [&[u8]; 3] = [&[0x00, 0xA5, 0xFF, 0x3C], &[0xFF; 16], &[]];
        for bits in patterns {
            let bytes = decompress_buffer(bits);
            assert_eq!(compress_buffer(&bytes).unwrap(), bits.to_vec());
        }
    }

    #[test]
    fn test_compress_buffer_alignment() {
        assert!(matches!(
            compress_buffer(&[0xFF; 12]),
            Err(Error::Alignment { len: 12 })
        ));
    }
}
