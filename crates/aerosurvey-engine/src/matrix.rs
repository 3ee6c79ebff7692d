//! Integer distance matrix over `[start] ++ waypoints`.

use crate::geo_math;
use crate::types::{Coordinate, EngineError};

/// Square, symmetric matrix of whole-metre distances.
///
/// Index 0 is the mission start; index `i > 0` is waypoint `i - 1`.
/// Only the upper triangle is evaluated and mirrored, so
/// `get(i, j) == get(j, i)` holds exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceMatrix {
    size: usize,
    cells: Vec<u32>,
}

impl DistanceMatrix {
    /// Build the matrix for a mission's start point and waypoints.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] when `start` is `None` while
    /// `waypoints` is non-empty (node 0 would be undefined).
    pub fn build(start: Option<Coordinate>, waypoints: &[Coordinate]) -> Result<Self, EngineError> {
        match start {
            Some(start) => {
                let mut points = Vec::with_capacity(waypoints.len() + 1);
                points.push(start);
                points.extend_from_slice(waypoints);
                Ok(Self::from_points(&points))
            }
            None if waypoints.is_empty() => Ok(Self::from_points(&[])),
            None => Err(EngineError::InvalidInput(
                "mission has waypoints but no start point".to_string(),
            )),
        }
    }

    /// Build the matrix over an arbitrary point list.
    #[must_use]
    pub fn from_points(points: &[Coordinate]) -> Self {
        let size = points.len();
        let mut cells = vec![0; size * size];
        for i in 0..size {
            for j in (i + 1)..size {
                let d = geo_math::distance(points[i], points[j]);
                cells[i * size + j] = d;
                cells[j * size + i] = d;
            }
        }
        Self { size, cells }
    }

    /// Build a matrix from explicit rows.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidInput`] if the rows are not square,
    /// the diagonal is non-zero, or the matrix is not symmetric.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self, EngineError> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(EngineError::InvalidInput(format!(
                    "row {i} has {} entries, expected {size}",
                    row.len()
                )));
            }
            cells.extend_from_slice(row);
        }
        let matrix = Self { size, cells };
        for i in 0..size {
            if matrix.get(i, i) != 0 {
                return Err(EngineError::InvalidInput(format!(
                    "diagonal entry ({i}, {i}) is non-zero"
                )));
            }
            for j in (i + 1)..size {
                if matrix.get(i, j) != matrix.get(j, i) {
                    return Err(EngineError::InvalidInput(format!(
                        "entries ({i}, {j}) and ({j}, {i}) differ"
                    )));
                }
            }
        }
        Ok(matrix)
    }

    /// Number of nodes (start plus waypoints).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.size
    }

    /// `true` if the matrix has no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Distance between nodes `i` and `j` in metres.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.size + j]
    }

    /// All distances from node `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[u32] {
        &self.cells[i * self.size..(i + 1) * self.size]
    }

    /// Closed cost of visiting `order` (node indices, depot excluded)
    /// starting and ending at node 0.
    #[must_use]
    pub fn tour_cost(&self, order: &[usize]) -> u64 {
        let Some((&first, &last)) = order.first().zip(order.last()) else {
            return 0;
        };
        let inner: u64 = order
            .windows(2)
            .map(|pair| u64::from(self.get(pair[0], pair[1])))
            .sum();
        u64::from(self.get(0, first)) + inner + u64::from(self.get(last, 0))
    }
}
