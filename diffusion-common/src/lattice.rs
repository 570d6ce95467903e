use crate::cell::Cell;
use crate::genome::Genome;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A lattice position. `x` is the row, `y` the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: usize,
    pub y: usize,
}

impl Coord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// One of the four diagonal migration directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagonal {
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Diagonal {
    pub const ALL: [Diagonal; 4] = [
        Diagonal::UpLeft,
        Diagonal::UpRight,
        Diagonal::DownLeft,
        Diagonal::DownRight,
    ];

    /// Draws the x step, then the y step, each +1 or -1 with equal probability.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let down = rng.random_range(0..2) == 0;
        let right = rng.random_range(0..2) == 0;
        match (down, right) {
            (false, false) => Diagonal::UpLeft,
            (false, true) => Diagonal::UpRight,
            (true, false) => Diagonal::DownLeft,
            (true, true) => Diagonal::DownRight,
        }
    }

    pub fn offset(self) -> (isize, isize) {
        match self {
            Diagonal::UpLeft => (-1, -1),
            Diagonal::UpRight => (-1, 1),
            Diagonal::DownLeft => (1, -1),
            Diagonal::DownRight => (1, 1),
        }
    }
}

/// How the initial population is laid out on a fresh lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Seeding {
    /// Cells strictly closer than `radius` to the center `(W/2, W/2)`.
    Disk { radius: f64 },
    /// Cells with `W/4 < x < 3W/4` and `W/4 < y < 3W/4`.
    Square,
}

impl Seeding {
    pub fn covers(&self, coord: Coord, width: usize) -> bool {
        match *self {
            Seeding::Disk { radius } => {
                let center = (width / 2) as f64;
                let dx = coord.x as f64 - center;
                let dy = coord.y as f64 - center;
                (dx * dx + dy * dy).sqrt() < radius
            }
            Seeding::Square => {
                let low = width / 4;
                let high = width / 4 * 3;
                low < coord.x && coord.x < high && low < coord.y && coord.y < high
            }
        }
    }
}

/// Toroidal `width × width` grid of cells, stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lattice {
    width: usize,
    capacity: usize,
    cells: Vec<Cell>,
}

impl Lattice {
    pub fn new(width: usize, capacity: usize) -> Self {
        Self {
            width,
            capacity,
            cells: vec![Cell::new(capacity); width * width],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resolves any signed offset from `coord` to an in-bounds coordinate, wrapping at every edge.
    pub fn wrap(&self, coord: Coord, dx: isize, dy: isize) -> Coord {
        let w = self.width as isize;
        Coord {
            x: (coord.x as isize + dx).rem_euclid(w) as usize,
            y: (coord.y as isize + dy).rem_euclid(w) as usize,
        }
    }

    pub fn diagonal_neighbor(&self, coord: Coord, direction: Diagonal) -> Coord {
        let (dx, dy) = direction.offset();
        self.wrap(coord, dx, dy)
    }

    pub fn index_of(&self, coord: Coord) -> usize {
        coord.x * self.width + coord.y
    }

    pub fn coord_of(&self, index: usize) -> Coord {
        Coord::new(index / self.width, index % self.width)
    }

    pub fn cell(&self, coord: Coord) -> &Cell {
        &self.cells[self.index_of(coord)]
    }

    pub fn cell_mut(&mut self, coord: Coord) -> &mut Cell {
        let index = self.index_of(coord);
        &mut self.cells[index]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Swaps the cell at `coord` for `cell`, returning the previous occupant.
    pub fn replace_cell(&mut self, coord: Coord, cell: Cell) -> Cell {
        std::mem::replace(self.cell_mut(coord), cell)
    }

    /// All coordinates in raster order (row by row).
    pub fn coords(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.cells.len()).map(|index| self.coord_of(index))
    }

    pub fn total_population(&self) -> usize {
        self.cells.iter().map(Cell::len).sum()
    }

    /// Fills every covered cell with `capacity` freshly seeded genomes. Cells are visited in
    /// raster order so a given RNG state always produces the same lattice.
    pub fn seed<R: Rng + ?Sized>(&mut self, seeding: &Seeding, genome_length: usize, rng: &mut R) {
        let width = self.width;
        let capacity = self.capacity;
        for index in 0..self.cells.len() {
            let coord = Coord::new(index / width, index % width);
            let cell = &mut self.cells[index];
            if seeding.covers(coord, width) {
                cell.seed(capacity, || Genome::seed_random(genome_length, rng));
            } else {
                cell.clear();
            }
        }
    }
}
