//! Device launch grids.
//!
//! A device-class launch is a grid of workgroups, each holding a fixed number
//! of lanes. Devices bound the workgroup count along each grid dimension, so
//! the flat group count is folded into up to three dimensions:
//!
//! ```text
//! lanes = 1000, workgroup = 256      → 4 groups  → grid [4, 1, 1]
//! groups = 5, max per dimension = 2  → grid [2, 2, 2]  (8 launched, 3 masked)
//! ```
//!
//! Lanes past the requested count fill out the grid and run masked.

use tracing::debug;

use crate::config::DeviceLimits;
use crate::error::{Error, Result};

/// Physical grid covering a lane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGrid {
    workgroups: [u32; 3],
    workgroup_size: usize,
    lanes: usize,
}

impl LaunchGrid {
    /// Fold `lanes` into a grid of `workgroup_size`-lane workgroups.
    ///
    /// # Errors
    ///
    /// [`Error::LaunchTooLarge`] if even a three-dimensional grid exceeds
    /// `limits.max_workgroups_per_dimension` along some dimension.
    pub fn new(lanes: usize, workgroup_size: usize, limits: &DeviceLimits) -> Result<Self> {
        let max = limits.max_workgroups_per_dimension as usize;
        if max == 0 {
            return Err(Error::LaunchTooLarge {
                lanes,
                message: "device allows no workgroups per dimension".to_string(),
            });
        }
        let groups = lanes.div_ceil(workgroup_size.max(1));

        let x = groups.min(max);
        let rows = if x == 0 { 0 } else { groups.div_ceil(x) };
        let y = rows.min(max).max(1);
        let z = rows.div_ceil(max).max(1);

        if z > max {
            return Err(Error::LaunchTooLarge {
                lanes,
                message: format!(
                    "{groups} workgroups do not fit a grid of {max} per dimension"
                ),
            });
        }

        let grid = Self {
            workgroups: [x as u32, y as u32, z as u32],
            workgroup_size,
            lanes,
        };
        debug!(
            lanes,
            workgroup_size,
            grid = ?grid.workgroups,
            "launch grid"
        );
        Ok(grid)
    }

    /// Workgroup counts along x, y and z.
    pub fn workgroups(&self) -> [u32; 3] {
        self.workgroups
    }

    pub fn workgroup_size(&self) -> usize {
        self.workgroup_size
    }

    /// Workgroups that hold at least one live lane.
    pub fn active_groups(&self) -> usize {
        self.lanes.div_ceil(self.workgroup_size.max(1))
    }

    /// Total workgroups in the grid, masked ones included.
    pub fn group_count(&self) -> usize {
        self.workgroups.iter().map(|&n| n as usize).product()
    }

    /// Total lanes launched, masked ones included.
    pub fn launched_lanes(&self) -> usize {
        self.group_count() * self.workgroup_size
    }

    /// Lanes that map onto the iteration space.
    pub fn live_lanes(&self) -> usize {
        self.lanes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_per_dim: u32) -> DeviceLimits {
        DeviceLimits {
            max_workgroups_per_dimension: max_per_dim,
            ..Default::default()
        }
    }

    #[test]
    fn test_one_dimensional_grid() {
        let grid = LaunchGrid::new(1000, 256, &DeviceLimits::default()).unwrap();
        assert_eq!(grid.workgroups(), [4, 1, 1]);
        assert_eq!(grid.launched_lanes(), 1024);
        assert_eq!(grid.live_lanes(), 1000);
        assert_eq!(grid.active_groups(), 4);
    }

    #[test]
    fn test_fold_into_three_dimensions() {
        let grid = LaunchGrid::new(5, 1, &limits(2)).unwrap();
        assert_eq!(grid.workgroups(), [2, 2, 2]);
        assert_eq!(grid.group_count(), 8);
        assert_eq!(grid.active_groups(), 5);
    }

    #[test]
    fn test_too_large() {
        assert!(LaunchGrid::new(8, 1, &limits(2)).is_ok());
        assert!(matches!(
            LaunchGrid::new(9, 1, &limits(2)),
            Err(Error::LaunchTooLarge { lanes: 9, .. })
        ));
    }

    #[test]
    fn test_zero_grid_limit() {
        assert!(matches!(
            LaunchGrid::new(10, 4, &limits(0)),
            Err(Error::LaunchTooLarge { lanes: 10, .. })
        ));
        assert!(LaunchGrid::new(0, 4, &limits(0)).is_err());
    }

    #[test]
    fn test_empty_launch() {
        let grid = LaunchGrid::new(0, 64, &DeviceLimits::default()).unwrap();
        assert_eq!(grid.workgroups(), [0, 1, 1]);
        assert_eq!(grid.launched_lanes(), 0);
    }
}
