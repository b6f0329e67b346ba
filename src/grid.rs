//! Rate/angle search grid.
//!
//! Rates are in arc-seconds per hour and angles in degrees, matching the
//! units the detection tool expects on its `--rate-*` and `--angle-*` flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack for the last step so that `max` is still included when the step
/// does not divide the span exactly in binary floating point.
const STEP_TOLERANCE: f64 = 1e-9;

/// Precision printed values are snapped to.
const VALUE_PRECISION: f64 = 1e9;

/// Largest grid a sweep will enumerate.
pub const MAX_GRID_CELLS: usize = 1_000_000;

/// Inclusive arithmetic sequence `min, min + step, ...` not exceeding `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamRange {
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        ParamRange { min, max, step }
    }

    /// Number of values in the sequence; zero for a malformed range or one
    /// longer than [`MAX_GRID_CELLS`].
    pub fn count(&self) -> usize {
        self.checked_count().unwrap_or(0)
    }

    /// `None` when the range is malformed or too long to enumerate.
    pub fn checked_count(&self) -> Option<usize> {
        if !self.is_well_formed() {
            return None;
        }
        let steps = ((self.max - self.min) / self.step + STEP_TOLERANCE).floor();
        if !steps.is_finite() || steps >= MAX_GRID_CELLS as f64 {
            return None;
        }
        (steps as usize).checked_add(1)
    }

    pub fn values(&self) -> Vec<f64> {
        (0..self.count())
            .map(|i| snap(self.min + i as f64 * self.step))
            .collect()
    }

    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.step.is_finite()
            && self.step > 0.0
            && self.max >= self.min
    }
}

fn snap(value: f64) -> f64 {
    let snapped = (value * VALUE_PRECISION).round() / VALUE_PRECISION;
    // Avoid printing "-0" for a sequence that crosses zero.
    if snapped == 0.0 {
        0.0
    } else {
        snapped
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleOrder {
    #[default]
    Ascending,
    Descending,
}

/// One (rate, angle) combination; `index` is its position in sweep order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub index: usize,
    pub rate: f64,
    pub angle: f64,
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} rate={} angle={}", self.index, self.rate, self.angle)
    }
}

/// Cartesian product of the rate and angle sequences, rate outermost.
#[derive(Debug, Clone)]
pub struct Grid {
    rates: Vec<f64>,
    angles: Vec<f64>,
}

impl Grid {
    pub fn new(rates: &ParamRange, angles: &ParamRange, order: AngleOrder) -> Self {
        let mut angle_values = angles.values();
        if order == AngleOrder::Descending {
            angle_values.reverse();
        }
        Grid {
            rates: rates.values(),
            angles: angle_values,
        }
    }

    pub fn len(&self) -> usize {
        self.rates.len() * self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        self.rates.iter().enumerate().flat_map(move |(ri, &rate)| {
            self.angles
                .iter()
                .enumerate()
                .map(move |(ai, &angle)| GridCell {
                    index: ri * self.angles.len() + ai,
                    rate,
                    angle,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_range_counts() {
        assert_eq!(ParamRange::new(0.5, 3.5, 0.5).count(), 7);
        assert_eq!(ParamRange::new(-10.0, 10.0, 2.5).count(), 9);
        assert_eq!(ParamRange::new(1.0, 1.0, 0.25).count(), 1);
        // max not on a step boundary: stop before it
        assert_eq!(ParamRange::new(0.0, 1.0, 0.3).count(), 4);
    }

    #[test]
    fn test_inexact_steps_keep_final_value() {
        let values = ParamRange::new(0.0, 0.3, 0.1).values();
        assert_eq!(values, vec![0.0, 0.1, 0.2, 0.3]);

        let values = ParamRange::new(1.0, 5.0, 0.25).values();
        assert_eq!(values.len(), 17);
        assert_eq!(values.last(), Some(&5.0));
    }

    #[test]
    fn test_values_have_no_negative_zero() {
        let values = ParamRange::new(-0.2, 0.2, 0.1).values();
        assert_eq!(values[2].to_string(), "0");
    }

    #[test]
    fn test_oversized_ranges_do_not_overflow() {
        let tiny_step = ParamRange::new(0.0, 1.0, 1e-300);
        assert!(tiny_step.is_well_formed());
        assert_eq!(tiny_step.checked_count(), None);
        assert_eq!(tiny_step.count(), 0);
        assert!(tiny_step.values().is_empty());

        let huge = ParamRange::new(0.0, 1.0, 1e-10);
        assert_eq!(huge.checked_count(), None);

        let at_limit = ParamRange::new(0.0, (MAX_GRID_CELLS - 1) as f64, 1.0);
        assert_eq!(at_limit.checked_count(), Some(MAX_GRID_CELLS));
    }

    #[test]
    fn test_malformed_ranges_are_empty() {
        assert_eq!(ParamRange::new(1.0, 0.0, 0.5).count(), 0);
        assert_eq!(ParamRange::new(0.0, 1.0, 0.0).count(), 0);
        assert_eq!(ParamRange::new(0.0, 1.0, -0.5).count(), 0);
        assert_eq!(ParamRange::new(0.0, f64::NAN, 0.5).count(), 0);
    }

    #[test]
    fn test_grid_is_rate_major() {
        let grid = Grid::new(
            &ParamRange::new(0.5, 3.5, 0.5),
            &ParamRange::new(-10.0, 10.0, 2.5),
            AngleOrder::Ascending,
        );
        let cells: Vec<GridCell> = grid.cells().collect();
        assert_eq!(grid.len(), 63);
        assert_eq!(cells.len(), 63);

        assert_eq!((cells[0].rate, cells[0].angle), (0.5, -10.0));
        assert_eq!((cells[1].rate, cells[1].angle), (0.5, -7.5));
        assert_eq!((cells[9].rate, cells[9].angle), (1.0, -10.0));
        assert_eq!((cells[62].rate, cells[62].angle), (3.5, 10.0));
        assert!(cells.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn test_descending_angles_cover_the_same_cells() {
        let rates = ParamRange::new(0.5, 3.5, 0.5);
        let angles = ParamRange::new(-10.0, 10.0, 2.5);
        let pairs = |order| {
            let mut pairs: Vec<(String, String)> = Grid::new(&rates, &angles, order)
                .cells()
                .map(|c| (c.rate.to_string(), c.angle.to_string()))
                .collect();
            pairs.sort();
            pairs
        };

        let descending: Vec<GridCell> = Grid::new(&rates, &angles, AngleOrder::Descending)
            .cells()
            .collect();
        assert_eq!(descending[0].angle, 10.0);
        assert_eq!(pairs(AngleOrder::Ascending), pairs(AngleOrder::Descending));
    }

    #[test]
    fn test_cell_display() {
        let cell = GridCell {
            index: 4,
            rate: 2.0,
            angle: -7.5,
        };
        assert_eq!(cell.to_string(), "#4 rate=2 angle=-7.5");
    }
}
