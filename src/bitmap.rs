use crate::error::{Error, Result};
use png::{BitDepth, ColorType, Transformations};
use std::path::Path;

/// Color space of a [`Bitmap`], 8 bits per sample
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
    /// One palette index per pixel; `alpha` holds per-entry transparency,
    /// entries past its end are opaque
    Indexed {
        palette: Vec<[u8; 3]>,
        alpha: Vec<u8>,
    },
}

impl PixelFormat {
    pub fn samples_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Gray | PixelFormat::Indexed { .. } => 1,
            PixelFormat::GrayAlpha => 2,
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelFormat::Gray => write!(f, "L"),
            PixelFormat::GrayAlpha => write!(f, "LA"),
            PixelFormat::Rgb => write!(f, "RGB"),
            PixelFormat::Rgba => write!(f, "RGBA"),
            PixelFormat::Indexed { .. } => write!(f, "P"),
        }
    }
}

/// Decoded image, row-major
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    samples: Vec<u8>,
}

impl Bitmap {
    pub fn new(width: u32, height: u32, format: PixelFormat, samples: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.samples_per_pixel();
        if samples.len() != expected {
            return Err(Error::Image(format!(
                "{}x{} {} bitmap needs {} samples, got {}",
                width,
                height,
                format,
                expected,
                samples.len()
            )));
        }
        if let PixelFormat::Indexed { palette, .. } = &format
            && let Some(&index) = samples.iter().find(|&&i| i as usize >= palette.len())
        {
            return Err(Error::Image(format!(
                "palette index {} out of range ({} entries)",
                index,
                palette.len()
            )));
        }
        Ok(Bitmap {
            width,
            height,
            format,
            samples,
        })
    }

    pub fn from_png_data(png_data: &[u8]) -> Result<Self> {
        let decoder = png::Decoder::new(png_data);
        let reader = decoder.read_info()?;
        let info = reader.info();

        // 8-bit paletted images keep their palette so transparency can be
        // resolved per entry; everything else is normalised to 8-bit samples
        if info.color_type == ColorType::Indexed && info.bit_depth == BitDepth::Eight {
            let palette = info
                .palette
                .as_ref()
                .ok_or_else(|| Error::Image("paletted PNG without palette".into()))?
                .chunks_exact(3)
                .map(|rgb| [rgb[0], rgb[1], rgb[2]])
                .collect();
            let alpha = info.trns.as_ref().map(|t| t.to_vec()).unwrap_or_default();
            let format = PixelFormat::Indexed { palette, alpha };
            return decode_png_frame(png_data, Transformations::IDENTITY, Some(format));
        }

        // Grayscale keeps only its gray level; a tRNS entry would otherwise
        // be expanded into an alpha channel
        let transparent_gray = info.color_type == ColorType::Grayscale && info.trns.is_some();

        let bitmap = decode_png_frame(png_data, Transformations::normalize_to_color8(), None)?;
        if transparent_gray {
            return Ok(bitmap.drop_gray_alpha());
        }
        Ok(bitmap)
    }

    fn drop_gray_alpha(self) -> Bitmap {
        if self.format != PixelFormat::GrayAlpha {
            return self;
        }
        Bitmap {
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray,
            samples: self.samples.chunks_exact(2).map(|la| la[0]).collect(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let png_data = std::fs::read(path)?;
        Self::from_png_data(&png_data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    /// Samples of the pixel at column `x`, row `y`
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let spp = self.format.samples_per_pixel();
        let start = (y as usize * self.width as usize + x as usize) * spp;
        &self.samples[start..start + spp]
    }

    /// Rotate 90 degrees counter-clockwise
    pub fn rotate_90(&self) -> Bitmap {
        let mut samples = Vec::with_capacity(self.samples.len());

        // New row y' is old column (width - 1 - y'), new column x' is old row x'
        for new_y in 0..self.width {
            for new_x in 0..self.height {
                samples.extend_from_slice(self.pixel(self.width - 1 - new_y, new_x));
            }
        }

        Bitmap {
            width: self.height,
            height: self.width,
            format: self.format.clone(),
            samples,
        }
    }
}

fn decode_png_frame(
    png_data: &[u8],
    transformations: Transformations,
    format: Option<PixelFormat>,
) -> Result<Bitmap> {
    let mut decoder = png::Decoder::new(png_data);
    decoder.set_transformations(transformations);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf)?;
    buf.truncate(info.buffer_size());

    let format = match format {
        Some(format) => format,
        None => match info.color_type {
            ColorType::Grayscale => PixelFormat::Gray,
            ColorType::GrayscaleAlpha => PixelFormat::GrayAlpha,
            ColorType::Rgb => PixelFormat::Rgb,
            ColorType::Rgba => PixelFormat::Rgba,
            ColorType::Indexed => {
                return Err(Error::UnsupportedColorSpace("P (unexpanded)".into()));
            }
        },
    };

    Bitmap::new(info.width, info.height, format, buf)
}
