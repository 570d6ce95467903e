//! Narrow interfaces to the animation and labelling tools, with native implementations
//! on top of `image`, `imageproc` and `ab_glyph`. The simulation core never calls these.

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use diffusion_common::write_atomic;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{imageops, Delay, Frame, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use std::path::{Path, PathBuf};

/// Turns an ordered sequence of frame files into one animated artifact.
pub trait AnimationAssembler {
    fn assemble_animation(&self, frame_paths: &[PathBuf], output: &Path) -> Result<PathBuf>;
}

/// Draws literal text onto an image at a pixel offset.
pub trait Annotator {
    fn annotate(&self, image: RgbImage, text: &str, position: (i32, i32)) -> Result<RgbImage>;
}

/// Looping GIF with a fixed delay between frames.
#[derive(Debug, Clone, Copy)]
pub struct GifAssembler {
    pub frame_delay_ms: u32,
}

impl Default for GifAssembler {
    fn default() -> Self {
        // 5/100 s per frame
        Self { frame_delay_ms: 50 }
    }
}

impl GifAssembler {
    /// Encodes in-memory frames; used by `assemble_animation` once the files are loaded.
    pub fn encode_frames(&self, images: impl IntoIterator<Item = RgbImage>) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.set_repeat(Repeat::Infinite)?;
            let delay = Delay::from_numer_denom_ms(self.frame_delay_ms, 1);
            for image in images {
                let rgba = image::DynamicImage::ImageRgb8(image).to_rgba8();
                encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
            }
        }
        Ok(bytes)
    }
}

impl AnimationAssembler for GifAssembler {
    fn assemble_animation(&self, frame_paths: &[PathBuf], output: &Path) -> Result<PathBuf> {
        if frame_paths.is_empty() {
            anyhow::bail!("No frames to assemble into '{}'.", output.display());
        }
        let images = frame_paths
            .iter()
            .map(|path| {
                image::open(path)
                    .map(|image| image.to_rgb8())
                    .with_context(|| format!("Failed to read frame '{}'", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;
        let bytes = self.encode_frames(images)?;
        write_atomic(output, &bytes)?;
        Ok(output.to_path_buf())
    }
}

/// Text rendering with a TrueType font loaded at runtime.
pub struct GlyphAnnotator {
    font: FontVec,
    scale: PxScale,
    color: Rgb<u8>,
}

impl GlyphAnnotator {
    pub fn from_font_file(path: &Path, size_px: f32) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("Failed to read font '{}'", path.display()))?;
        Self::from_font_bytes(data, size_px)
    }

    pub fn from_font_bytes(data: Vec<u8>, size_px: f32) -> Result<Self> {
        let font = FontVec::try_from_vec(data).map_err(|e| anyhow::anyhow!("Invalid font data: {}", e))?;
        Ok(Self {
            font,
            scale: PxScale::from(size_px),
            color: Rgb([0, 0, 0]),
        })
    }
}

impl Annotator for GlyphAnnotator {
    fn annotate(&self, mut image: RgbImage, text: &str, position: (i32, i32)) -> Result<RgbImage> {
        draw_text_mut(&mut image, self.color, position.0, position.1, self.scale, &self.font, text);
        Ok(image)
    }
}

/// Centers every panel on a white `panel_size × panel_size` tile and lays the tiles out left to
/// right. Panels larger than a tile are cropped by the overlay.
pub fn compose_panels(panels: &[RgbImage], panel_size: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(panel_size * panels.len() as u32, panel_size, Rgb([255, 255, 255]));
    for (i, panel) in panels.iter().enumerate() {
        let left = i as i64 * panel_size as i64 + (panel_size as i64 - panel.width() as i64) / 2;
        let top = (panel_size as i64 - panel.height() as i64) / 2;
        imageops::overlay(&mut canvas, panel, left, top);
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([value, value, 255]))
    }

    #[test]
    fn compose_pads_and_appends_panels() {
        let canvas = compose_panels(&[solid(2, 2, 0), solid(2, 2, 100)], 4);
        assert_eq!(canvas.dimensions(), (8, 4));
        assert_eq!(canvas.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(canvas.get_pixel(1, 1).0, [0, 0, 255]);
        assert_eq!(canvas.get_pixel(2, 2).0, [0, 0, 255]);
        assert_eq!(canvas.get_pixel(5, 1).0, [100, 100, 255]);
        assert_eq!(canvas.get_pixel(7, 3).0, [255, 255, 255]);
    }

    #[test]
    fn gif_assembler_writes_all_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3u8 {
            let path = dir.path().join(format!("frame_{}.png", i));
            solid(3, 3, i * 80).save(&path).unwrap();
            paths.push(path);
        }
        let output = dir.path().join("anime.gif");
        let written = GifAssembler::default().assemble_animation(&paths, &output).unwrap();
        assert_eq!(written, output);

        use image::AnimationDecoder;
        let file = std::io::BufReader::new(std::fs::File::open(&output).unwrap());
        let frames = image::codecs::gif::GifDecoder::new(file)
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].buffer().dimensions(), (3, 3));
    }

    #[test]
    fn gif_assembler_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("anime.gif");
        assert!(GifAssembler::default().assemble_animation(&[], &output).is_err());
        assert!(!output.exists());
    }

    #[test]
    fn annotator_rejects_invalid_font_data() {
        assert!(GlyphAnnotator::from_font_bytes(vec![0, 1, 2, 3], 10.0).is_err());
    }
}
