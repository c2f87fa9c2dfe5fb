//! Mapping of volume data onto the vertices of a cortical surface.
//!
//! For each vertex, the volumes are sampled along the line from the white surface to the pial surface,
//! at the requested depths (0 = white, 1 = pial), and the samples of each vertex are reduced to a single value.
//! Set the depths to `[0.5]` to sample only at the mid-gray surface.

use log::{debug, warn};
use ndarray::{Array2, ArrayView2};

use crate::error::{SurfmapError, Result};
use crate::fs_surface::BrainMesh;
use crate::reduce::{reduce_samples, Statistic};
use crate::sampling::{check_surface_coords, sample_geometry};
use crate::volume::VolumeRef;

/// The depths sampled by default: white surface, pial surface and 4 points in between.
pub const DEFAULT_DEPTHS: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];


/// Settings for [`map_volume_to_surface`].
#[derive(Debug, Clone)]
pub struct MappingOptions {
    /// Treat zero voxel values as missing data.
    pub ignore_zeros: bool,
    /// Threshold for excluding voxels that touch the surface in two distinct places, like both banks of a sulcus.
    /// This is not supported: any nonzero value is reset to `0` with a warning.
    pub exclude_threshold: f64,
    /// Relative positions between white (0) and pial (1) surface at which the volumes are sampled.
    pub depths: Vec<f64>,
    /// How the samples of a vertex across all depths are combined into one value.
    pub statistic: Statistic,
}


impl Default for MappingOptions {
    fn default() -> MappingOptions {
        MappingOptions {
            ignore_zeros: false,
            exclude_threshold: 0.0,
            depths: DEFAULT_DEPTHS.to_vec(),
            statistic: Statistic::NanMean,
        }
    }
}


impl MappingOptions {

    pub fn ignore_zeros(mut self, ignore_zeros: bool) -> MappingOptions {
        self.ignore_zeros = ignore_zeros;
        self
    }

    pub fn exclude_threshold(mut self, exclude_threshold: f64) -> MappingOptions {
        self.exclude_threshold = exclude_threshold;
        self
    }

    pub fn depths(mut self, depths: &[f64]) -> MappingOptions {
        self.depths = depths.to_vec();
        self
    }

    pub fn statistic(mut self, statistic: Statistic) -> MappingOptions {
        self.statistic = statistic;
        self
    }

    /// The options as they are applied: the unsupported exclusion threshold is reset to `0`.
    pub fn effective(&self) -> MappingOptions {
        MappingOptions {
            exclude_threshold: effective_exclude_threshold(self.exclude_threshold),
            ..self.clone()
        }
    }
}


/// Sulcal voxel exclusion is not supported. Warns about a nonzero threshold and returns the threshold in effect, always `0`.
pub fn effective_exclude_threshold(requested: f64) -> f64 {
    if requested != 0.0 {
        warn!("Option exclude_threshold is currently not supported, resetting it from {} to 0.", requested);
    }
    0.0
}


/// Map volume data onto the vertices of a surface, defined by its white and pial surface meshes.
///
/// Returns a matrix with one row per vertex and one column per entry of `volumes`, in the same order.
/// A volume that cannot be loaded is reported in the log and its column is NaN; the others are still mapped.
/// Vertices without any valid sample (outside the volume at all depths) are NaN as well.
///
/// The voxel indices are computed once, from the first volume that loads, and reused for all volumes.
/// All volumes must therefore share the voxel grid of that reference volume.
///
/// # Errors
///
/// * [`SurfmapError::VertexCountMismatch`] if white and pial surface differ in vertex count. This is checked
///   before any volume is loaded.
/// * [`SurfmapError::NoReadableVolume`] if none of the volumes can be loaded.
/// * [`SurfmapError::NoDepths`], [`SurfmapError::InvalidAffine`] and [`SurfmapError::InvalidStatisticOutput`] for unusable settings or inputs.
///
/// # Examples
///
/// ```no_run
/// use surfmap::{map_volume_to_surface, read_surf, MappingOptions, VolumeRef};
/// use std::path::PathBuf;
///
/// let white = read_surf("/path/to/subjects_dir/subject1/surf/lh.white").unwrap();
/// let pial = read_surf("/path/to/subjects_dir/subject1/surf/lh.pial").unwrap();
/// let volumes = vec![VolumeRef::Path(PathBuf::from("/path/to/subjects_dir/subject1/mri/T1.mgz"))];
///
/// let mapped = map_volume_to_surface(&volumes, &white.mesh, &pial.mesh, &MappingOptions::default()).unwrap();
/// assert_eq!(mapped.ncols(), 1);
/// ```
pub fn map_volume_to_surface(volumes: &[VolumeRef], white: &BrainMesh, pial: &BrainMesh, options: &MappingOptions) -> Result<Array2<f64>> {
    map_volume_to_coords(volumes, white.coords().view(), pial.coords().view(), options)
}


/// Like [`map_volume_to_surface`], but with the white and pial vertex coordinates given as N x 3 matrices.
pub fn map_volume_to_coords(volumes: &[VolumeRef], white: ArrayView2<f64>, pial: ArrayView2<f64>, options: &MappingOptions) -> Result<Array2<f64>> {
    let options = options.effective();
    check_surface_coords(white, pial)?;

    let loaded: Vec<_> = volumes.iter().enumerate().map(|(idx, vref)| {
        match vref.load() {
            Ok(vol) => Some(vol),
            Err(err) => {
                warn!("Volume {} ({}) could not be opened: {}", idx, vref.describe(), err);
                None
            }
        }
    }).collect();

    let (reference_idx, reference) = loaded.iter().enumerate()
        .find_map(|(idx, v)| v.as_deref().map(|vol| (idx, vol)))
        .ok_or(SurfmapError::NoReadableVolume)?;
    debug!("Using volume {} of {} as the reference for voxel indices.", reference_idx, volumes.len());

    let indices = sample_geometry(white, pial, &options.depths, reference)?;

    let volumes: Vec<_> = loaded.iter().map(|v| v.as_deref()).collect();
    reduce_samples(&volumes, &indices, &options.statistic, options.ignore_zeros)
}
