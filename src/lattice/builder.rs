//! Triangular lattice point generation
//!
//! Rows are independent, so they are produced in parallel with rayon.

use rayon::prelude::*;

use crate::core::error::{Result, SimError};
use crate::lattice::coord::Coord;

/// A rectangular patch of the triangular lattice
#[derive(Debug, Clone)]
pub struct TriangularLattice {
    pub width: u32,
    pub height: u32,
    pub origin: Coord,
    rows: Vec<Vec<Coord>>,
}

impl TriangularLattice {
    /// Build a `width x height` patch anchored at the origin
    pub fn new(width: i64, height: i64) -> Result<Self> {
        Self::with_origin(width, height, Coord::default())
    }

    /// Build a `width x height` patch whose bottom-left point is `origin`
    ///
    /// Even rows start at `origin.x`, odd rows are shifted east by one unit.
    pub fn with_origin(width: i64, height: i64, origin: Coord) -> Result<Self> {
        if width < 1 || height < 1 || width > i32::MAX as i64 / 2 || height > i32::MAX as i64 {
            return Err(SimError::InvalidDimensions { width, height });
        }

        let (w, h) = (width as i32, height as i32);
        let rows: Vec<Vec<Coord>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let shift = row % 2;
                (0..w)
                    .map(|col| Coord::new(origin.x + 2 * col + shift, origin.y + row))
                    .collect()
            })
            .collect();

        Ok(Self {
            width: w as u32,
            height: h as u32,
            origin,
            rows,
        })
    }

    /// Points of one row, west to east
    pub fn row(&self, row: usize) -> Option<&[Coord]> {
        self.rows.get(row).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<Coord>] {
        &self.rows
    }

    /// All points, row by row
    pub fn points(&self) -> impl Iterator<Item = Coord> + '_ {
        self.rows.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, coord: &Coord) -> bool {
        let row = coord.y - self.origin.y;
        if row < 0 || row >= self.height as i32 {
            return false;
        }
        let offset = coord.x - self.origin.x - row % 2;
        offset >= 0 && offset % 2 == 0 && offset / 2 < self.width as i32
    }
}
