use diffusion_common::{Coord, Lattice, RenderPolicy, Rgb};
use image::RgbImage;

/// Row-major grid of RGB pixels. Row `x` of a rendered lattice holds the cells `(x, 0..W)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbGrid {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl RgbGrid {
    pub fn from_pixel(width: u32, height: u32, pixel: Rgb) -> Self {
        Self {
            width,
            height,
            pixels: vec![pixel; width as usize * height as usize],
        }
    }

    /// Builds a grid from rows of pixels. Returns `None` for ragged input.
    pub fn from_rows(rows: Vec<Vec<Rgb>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return None;
        }
        Some(Self {
            width: width as u32,
            height: height as u32,
            pixels: rows.into_iter().flatten().collect(),
        })
    }

    /// Copies an image buffer pixel by pixel, keeping its dimensions.
    pub fn from_image(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.pixels().map(|pixel| pixel.0).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, row: u32, column: u32) -> Rgb {
        self.pixels[(row * self.width + column) as usize]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Rgb]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }

    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |column, row| image::Rgb(self.get(row, column)))
    }
}

/// Color of one cell under `policy`.
pub fn cell_color(lattice: &Lattice, coord: Coord, policy: RenderPolicy) -> Rgb {
    let cell = lattice.cell(coord);
    match policy {
        RenderPolicy::Genotype => cell.consensus_color(),
        RenderPolicy::Density => cell.density_color(),
    }
}

/// One pixel per cell. Pure: the same lattice state always yields the same grid.
pub fn render(lattice: &Lattice, policy: RenderPolicy) -> RgbGrid {
    render_scaled(lattice, policy, 1)
}

/// Each cell becomes a `scale × scale` block of pixels.
pub fn render_scaled(lattice: &Lattice, policy: RenderPolicy, scale: u32) -> RgbGrid {
    let scale = scale.max(1) as usize;
    let cells = lattice.width();
    let side = cells * scale;
    let mut pixels = Vec::with_capacity(side * side);
    for x in 0..cells {
        let row: Vec<Rgb> = (0..cells)
            .flat_map(|y| std::iter::repeat(cell_color(lattice, Coord::new(x, y), policy)).take(scale))
            .collect();
        for _ in 0..scale {
            pixels.extend_from_slice(&row);
        }
    }
    RgbGrid {
        width: side as u32,
        height: side as u32,
        pixels,
    }
}
