use crate::render::RgbGrid;
use anyhow::Result;
use diffusion_common::write_atomic;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::Path;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

const BIT_DEPTH: u8 = 8;
const COLOR_TYPE_TRUECOLOR: u8 = 2;
const FILTER_NONE: u8 = 0;

/// Minimal truecolor PNG writer: signature, IHDR, a single IDAT holding unfiltered
/// scanlines in one zlib stream, and IEND.
#[derive(Debug, Clone, Copy)]
pub struct PngEncoder {
    compression: Compression,
}

impl Default for PngEncoder {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
        }
    }
}

impl PngEncoder {
    /// `level` is the zlib level, 0 (store) to 9 (best).
    pub fn new(level: u32) -> Self {
        Self {
            compression: Compression::new(level.min(9)),
        }
    }

    /// Serializes the grid. Output depends only on the grid and the compression level.
    pub fn encode(&self, grid: &RgbGrid) -> io::Result<Vec<u8>> {
        let mut png = Vec::with_capacity(PNG_SIGNATURE.len() + 64);
        png.extend_from_slice(&PNG_SIGNATURE);

        let mut header = Vec::with_capacity(13);
        header.extend_from_slice(&grid.width().to_be_bytes());
        header.extend_from_slice(&grid.height().to_be_bytes());
        // bit depth, color type, compression, filter, interlace
        header.extend_from_slice(&[BIT_DEPTH, COLOR_TYPE_TRUECOLOR, 0, 0, 0]);
        write_chunk(&mut png, b"IHDR", &header);

        write_chunk(&mut png, b"IDAT", &self.compress_scanlines(grid)?);
        write_chunk(&mut png, b"IEND", &[]);
        Ok(png)
    }

    /// Encodes the grid in memory, then moves the finished file into place.
    pub fn write_file(&self, path: &Path, grid: &RgbGrid) -> Result<()> {
        let bytes = self.encode(grid)?;
        write_atomic(path, &bytes)
    }

    fn compress_scanlines(&self, grid: &RgbGrid) -> io::Result<Vec<u8>> {
        let mut zlib = ZlibEncoder::new(Vec::new(), self.compression);
        for row in grid.rows().take(grid.height() as usize) {
            zlib.write_all(&[FILTER_NONE])?;
            for pixel in row {
                zlib.write_all(pixel)?;
            }
        }
        zlib.finish()
    }
}

/// Length (big-endian), type, data, then CRC-32 over type and data.
fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc = crc32fast::Hasher::new();
    crc.update(kind);
    crc.update(data);
    out.extend_from_slice(&crc.finalize().to_be_bytes());
}
