//! Raster surfaces handed over by the renderer

use std::io::Cursor;

use crate::error::BalloonError;

/// 8-bit RGB pixels, row-major, no row padding
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl RasterSurface {
    pub fn from_rgb(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self, BalloonError> {
        if width == 0 || height == 0 {
            return Err(BalloonError::Image("surface has zero size".to_string()));
        }
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(BalloonError::Image(format!(
                "expected {} bytes for {}x{} RGB, got {}",
                expected,
                width,
                height,
                rgb.len()
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// RGBA input, composited over white
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self, BalloonError> {
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(BalloonError::Image(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                width as usize * height as usize * 4,
                width,
                height,
                rgba.len()
            )));
        }
        let rgb = rgba
            .chunks_exact(4)
            .flat_map(|px| {
                let alpha = px[3] as u32;
                let over_white = move |c: u8| ((c as u32 * alpha + 255 * (255 - alpha)) / 255) as u8;
                [over_white(px[0]), over_white(px[1]), over_white(px[2])]
            })
            .collect();
        Self::from_rgb(width, height, rgb)
    }

    /// Decode a PNG of any color type into RGB
    pub fn from_png(bytes: &[u8]) -> Result<Self, BalloonError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| BalloonError::Image(e.to_string()))?;
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| BalloonError::Image(e.to_string()))?;
        let data = &buf[..info.buffer_size()];
        let (width, height) = (info.width, info.height);

        match info.color_type {
            png::ColorType::Rgb => Self::from_rgb(width, height, data.to_vec()),
            png::ColorType::Rgba => Self::from_rgba(width, height, data),
            png::ColorType::Grayscale => {
                Self::from_rgb(width, height, data.iter().flat_map(|&g| [g, g, g]).collect())
            }
            png::ColorType::GrayscaleAlpha => {
                let rgba: Vec<u8> = data
                    .chunks_exact(2)
                    .flat_map(|px| [px[0], px[0], px[0], px[1]])
                    .collect();
                Self::from_rgba(width, height, &rgba)
            }
            other => Err(BalloonError::Image(format!(
                "unsupported PNG color type {:?}",
                other
            ))),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }
}
