//! B-mode Image Rendering
//!
//! Grayscale or colour-mapped views of a log image with PNG and ASCII output.
//! Pixels map linearly from `[-DR, 0] dB` onto `[0, 1]`; depth runs down the
//! image and lateral position left to right.

use crate::axis::AxisVectors;
use crate::types::LogImage;
use std::ops::Range;

/// Colormap for B-mode display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Colormap {
    /// Black to white, the conventional B-mode display
    #[default]
    Grayscale,
    /// Black through red and yellow to white
    Hot,
    /// Viridis (perceptually uniform, colorblind-friendly)
    Viridis,
}

impl Colormap {
    /// Map normalized value (0-1) to RGB color
    pub fn map(&self, value: f64) -> [u8; 3] {
        let t = value.clamp(0.0, 1.0);

        match self {
            Colormap::Grayscale => {
                let v = (t * 255.0) as u8;
                [v, v, v]
            }
            Colormap::Hot => {
                let r = (t * 3.0).min(1.0);
                let g = (t * 3.0 - 1.0).clamp(0.0, 1.0);
                let b = (t * 3.0 - 2.0).clamp(0.0, 1.0);
                [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
            }
            Colormap::Viridis => Self::viridis(t),
        }
    }

    /// Parse colormap from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "grayscale" | "gray" | "grey" => Some(Colormap::Grayscale),
            "hot" => Some(Colormap::Hot),
            "viridis" => Some(Colormap::Viridis),
            _ => None,
        }
    }

    // Polynomial approximation of the matplotlib colormap
    fn viridis(t: f64) -> [u8; 3] {
        let r = (0.267 + t * (0.329 + t * (1.451 + t * (-1.808 + t * 0.758)))).clamp(0.0, 1.0);
        let g = (0.004 + t * (1.513 + t * (-0.838 + t * (0.731 - t * 0.466)))).clamp(0.0, 1.0);
        let b = (0.329 + t * (1.442 + t * (-2.642 + t * (1.963 - t * 0.440)))).clamp(0.0, 1.0);
        [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
    }
}

/// Displayable window onto a log image
#[derive(Debug, Clone)]
pub struct BModeView<'a> {
    image: &'a LogImage,
    axes: &'a AxisVectors,
    rows: Range<usize>,
    dynamic_range_db: f64,
}

impl<'a> BModeView<'a> {
    /// Full-depth view
    pub fn new(image: &'a LogImage, axes: &'a AxisVectors, dynamic_range_db: f64) -> Self {
        let rows = 0..image.rows().min(axes.depth.len());
        Self {
            image,
            axes,
            rows,
            dynamic_range_db,
        }
    }

    /// Restrict the view to depths within `[start, end]` (m)
    pub fn cropped(mut self, start: f64, end: f64) -> Self {
        let range = self.axes.depth_rows(start, end);
        self.rows = range.start.min(self.rows.end)..range.end.min(self.rows.end);
        self
    }

    /// `(width, height)` = (scan lines, depth rows)
    pub fn dimensions(&self) -> (usize, usize) {
        (self.image.cols(), self.rows.len())
    }

    pub fn is_empty(&self) -> bool {
        let (w, h) = self.dimensions();
        w == 0 || h == 0
    }

    /// Depth span of the view (m)
    pub fn depth_span(&self) -> Option<(f64, f64)> {
        if self.rows.is_empty() {
            return None;
        }
        Some((self.axes.depth[self.rows.start], self.axes.depth[self.rows.end - 1]))
    }

    fn normalized(&self, db: f64) -> f64 {
        ((db + self.dynamic_range_db) / self.dynamic_range_db).clamp(0.0, 1.0)
    }

    /// Raw RGB pixel data, row-major from the shallowest row
    pub fn to_rgb_pixels(&self, colormap: Colormap) -> Vec<u8> {
        let (width, height) = self.dimensions();
        let mut pixels = Vec::with_capacity(width * height * 3);
        for row in self.rows.clone() {
            for col in 0..width {
                pixels.extend_from_slice(&colormap.map(self.normalized(self.image.get(row, col))));
            }
        }
        pixels
    }

    /// Encode the view as PNG
    #[cfg(feature = "image")]
    pub fn to_png(&self, colormap: Colormap) -> Result<Vec<u8>, image::ImageError> {
        use image::{codecs::png::PngEncoder, ExtendedColorType, ImageEncoder};

        let (width, height) = self.dimensions();
        let pixels = self.to_rgb_pixels(colormap);
        let mut buffer = Vec::new();
        PngEncoder::new(&mut buffer).write_image(
            &pixels,
            width as u32,
            height as u32,
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }

    /// ASCII art for terminal display
    pub fn to_ascii(&self, width: usize, height: usize) -> String {
        let mut output = String::new();
        let (cols, rows) = self.dimensions();

        // Unicode block characters for grayscale
        let chars = [' ', '░', '▒', '▓', '█'];
        let num_chars = chars.len();

        let width = width.max(1);
        let height = height.max(1);
        let rows_per_char = rows.div_ceil(height).max(1);
        let cols_per_char = cols.div_ceil(width).max(1);

        let (z0, z1) = self.depth_span().unwrap_or((0.0, 0.0));
        output.push_str(&format!(
            "B-mode: {} lines x {} samples, {:.0} dB range\n",
            cols, rows, self.dynamic_range_db
        ));
        output.push_str(&format!("Depth: {:.2} mm to {:.2} mm\n", z0 * 1e3, z1 * 1e3));
        output.push_str(&"─".repeat(width));
        output.push('\n');

        for row_idx in 0..height {
            let row_start = self.rows.start + row_idx * rows_per_char;
            let row_end = (row_start + rows_per_char).min(self.rows.end);
            if row_start >= self.rows.end {
                break;
            }

            for col_idx in 0..width {
                let col_start = col_idx * cols_per_char;
                let col_end = (col_start + cols_per_char).min(cols);
                if col_start >= cols {
                    break;
                }

                // Brightest pixel in this cell
                let mut max_db = f64::NEG_INFINITY;
                for r in row_start..row_end {
                    for c in col_start..col_end {
                        max_db = max_db.max(self.image.get(r, c));
                    }
                }

                let normalized = self.normalized(max_db);
                let char_idx = ((normalized * (num_chars - 1) as f64) as usize).min(num_chars - 1);
                output.push(chars[char_idx]);
            }
            output.push('\n');
        }

        output.push_str(&"─".repeat(width));
        output.push('\n');

        // Lateral axis
        let unit = self.axes.lateral_unit.suffix();
        let min_x = self.axes.lateral.first().unwrap_or(&0.0);
        let max_x = self.axes.lateral.last().unwrap_or(&0.0);
        output.push_str(&format!("{:<width$}", format!("{:.2}", min_x), width = width / 3));
        output.push_str(&format!("{:^width$}", unit, width = width / 3));
        output.push_str(&format!("{:>width$}", format!("{:.2}", max_x), width = width / 3));
        output.push('\n');

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::DisplayUnit;

    fn fixture() -> (LogImage, AxisVectors) {
        let image = LogImage::from_fn(100, 8, |r, c| if r == 50 && c == 4 { 0.0 } else { -60.0 });
        let axes = AxisVectors {
            depth: (0..100).map(|i| i as f64 * 1e-3).collect(),
            lateral: (0..8).map(|i| i as f64 - 3.5).collect(),
            lateral_unit: DisplayUnit::Millimeters,
        };
        (image, axes)
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(Colormap::Grayscale.map(0.0), [0, 0, 0]);
        assert_eq!(Colormap::Grayscale.map(1.0), [255, 255, 255]);
        assert_eq!(Colormap::Hot.map(0.0), [0, 0, 0]);
        assert_eq!(Colormap::Hot.map(1.0), [255, 255, 255]);
        assert_eq!(Colormap::Grayscale.map(2.0), [255, 255, 255]);
    }

    #[test]
    fn test_colormap_from_str() {
        assert_eq!(Colormap::from_str("gray"), Some(Colormap::Grayscale));
        assert_eq!(Colormap::from_str("HOT"), Some(Colormap::Hot));
        assert_eq!(Colormap::from_str("viridis"), Some(Colormap::Viridis));
        assert_eq!(Colormap::from_str("jet"), None);
    }

    #[test]
    fn test_crop_to_depth_range() {
        let (image, axes) = fixture();
        let view = BModeView::new(&image, &axes, 60.0).cropped(0.0295, 0.0605);
        assert_eq!(view.dimensions(), (8, 31));
        let (z0, z1) = view.depth_span().unwrap();
        assert!((z0 - 0.030).abs() < 1e-12);
        assert!((z1 - 0.060).abs() < 1e-12);

        let beyond = BModeView::new(&image, &axes, 60.0).cropped(0.2, 0.3);
        assert!(beyond.is_empty());
    }

    #[test]
    fn test_rgb_pixels_brightest_is_white() {
        let (image, axes) = fixture();
        let view = BModeView::new(&image, &axes, 60.0);
        let pixels = view.to_rgb_pixels(Colormap::Grayscale);
        assert_eq!(pixels.len(), 8 * 100 * 3);
        let idx = (50 * 8 + 4) * 3;
        assert_eq!(&pixels[idx..idx + 3], &[255, 255, 255]);
        assert_eq!(&pixels[0..3], &[0, 0, 0]);
    }

    #[test]
    fn test_ascii_marks_the_point() {
        let (image, axes) = fixture();
        let ascii = BModeView::new(&image, &axes, 60.0).to_ascii(8, 10);
        assert!(ascii.contains('█'));
        assert!(ascii.starts_with("B-mode: 8 lines x 100 samples"));
    }

    #[cfg(feature = "image")]
    #[test]
    fn test_png_signature() {
        let (image, axes) = fixture();
        let png = BModeView::new(&image, &axes, 60.0).to_png(Colormap::Hot).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}
