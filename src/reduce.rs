//! Sampling of volumes at precomputed voxel indices, and reduction of the depth samples to one value per vertex.
//!
//! Missing samples are NaN throughout: sample points outside the volume, zeros when requested, and vertices
//! for which a statistic cannot produce a value.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_stats::MaybeNanExt;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{SurfmapError, Result};
use crate::sampling::{voxel_at, VoxelIndices};
use crate::volume::Volume;


/// A custom reduction: maps a (depths x vertices) sample matrix to one value per vertex.
pub type ReduceFn = dyn Fn(ArrayView2<'_, f64>) -> Array1<f64> + Send + Sync;


/// How the samples at the different depths of a vertex are combined into one value.
#[derive(Clone)]
pub enum Statistic {
    /// Arithmetic mean of the non-missing samples. Use this for continuous data, like activation maps.
    NanMean,
    /// Most frequent non-missing sample. Use this for discrete label volumes.
    Mode,
    /// A caller-supplied reduction, see [`Statistic::custom`]. It must return one value per vertex.
    Custom(Arc<ReduceFn>),
}


impl Statistic {

    /// Wrap a closure as a custom statistic.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::Axis;
    /// let max = surfmap::Statistic::custom(|samples| samples.fold_axis(Axis(0), f64::NAN, |acc, x| acc.max(*x)));
    /// let samples = ndarray::arr2(&[[1.0, 5.0], [3.0, f64::NAN]]);
    /// assert_eq!(max.reduce(samples.view()).unwrap().to_vec(), vec![3.0, 5.0]);
    /// ```
    pub fn custom<F>(f: F) -> Statistic
    where
        F: Fn(ArrayView2<'_, f64>) -> Array1<f64> + Send + Sync + 'static,
    {
        Statistic::Custom(Arc::new(f))
    }

    /// Reduce a (depths x vertices) sample matrix to one value per vertex.
    pub fn reduce(&self, samples: ArrayView2<f64>) -> Result<Array1<f64>> {
        let num_verts = samples.ncols();
        match self {
            Statistic::NanMean => Ok(samples.map_axis(Axis(0), nanmean)),
            Statistic::Mode => Ok(samples.map_axis(Axis(0), nanmode)),
            Statistic::Custom(f) => {
                let reduced = f(samples);
                if reduced.len() != num_verts {
                    return Err(SurfmapError::InvalidStatisticOutput(num_verts, reduced.len()));
                }
                Ok(reduced)
            }
        }
    }
}


impl Default for Statistic {
    fn default() -> Statistic {
        Statistic::NanMean
    }
}

impl fmt::Debug for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statistic::NanMean => write!(f, "NanMean"),
            Statistic::Mode => write!(f, "Mode"),
            Statistic::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl FromStr for Statistic {
    type Err = SurfmapError;

    fn from_str(s: &str) -> Result<Statistic> {
        match s {
            "nanmean" => Ok(Statistic::NanMean),
            "mode" => Ok(Statistic::Mode),
            other => Err(SurfmapError::UnknownStatistic(String::from(other))),
        }
    }
}


/// Mean of the non-NaN values, or NaN if there are none.
pub fn nanmean(values: ArrayView1<f64>) -> f64 {
    let (sum, count) = values.fold_skipnan((0.0, 0usize), |(sum, count), x| (sum + x.raw(), count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}


/// Most frequent non-NaN value, the smallest one on ties, or NaN if there are no values.
pub fn nanmode(values: ArrayView1<f64>) -> f64 {
    let mut valid: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    valid.sort_by(|a, b| a.total_cmp(b));

    let mut best = f64::NAN;
    let mut best_count = 0;
    let mut run_start = 0;
    for idx in 1..=valid.len() {
        if idx == valid.len() || valid[idx] != valid[run_start] {
            if idx - run_start > best_count {
                best_count = idx - run_start;
                best = valid[run_start];
            }
            run_start = idx;
        }
    }
    best
}


/// Sample a volume at all voxel indices, giving a (depths x vertices) matrix.
///
/// Sample points outside the volume are NaN. If `ignore_zeros` is set, zero values are NaN as well.
pub fn gather_samples(volume: &Volume, indices: &VoxelIndices, ignore_zeros: bool) -> Array2<f64> {
    let (num_points, num_verts, _) = indices.dim();
    let dim = volume.dim();
    Array2::from_shape_fn((num_points, num_verts), |(p, v)| {
        match voxel_at(indices.slice(ndarray::s![p, v, ..]), dim) {
            Some(voxel) => {
                let value = volume.data[voxel];
                if ignore_zeros && value == 0.0 { f64::NAN } else { value }
            }
            None => f64::NAN,
        }
    })
}


/// Sample all volumes at the voxel indices and reduce each vertex's samples to one value.
///
/// The result has one row per vertex and one column per entry of `volumes`. Entries that are `None`
/// (volumes that could not be loaded) get a column of NaN. Volumes are processed in parallel.
///
/// # Errors
///
/// * [`SurfmapError::NoReadableVolume`] if every entry is `None`.
/// * [`SurfmapError::InvalidStatisticOutput`] if a custom statistic returns the wrong number of values.
pub fn reduce_samples(volumes: &[Option<&Volume>], indices: &VoxelIndices, statistic: &Statistic, ignore_zeros: bool) -> Result<Array2<f64>> {
    if volumes.iter().all(|v| v.is_none()) {
        return Err(SurfmapError::NoReadableVolume);
    }
    let num_verts = indices.dim().1;

    let columns: Vec<Option<Result<Array1<f64>>>> = volumes
        .par_iter()
        .map(|vol| vol.map(|vol| statistic.reduce(gather_samples(vol, indices, ignore_zeros).view())))
        .collect();

    let mut mapped = Array2::from_elem((num_verts, volumes.len()), f64::NAN);
    for (idx, column) in columns.into_iter().enumerate() {
        match column {
            Some(reduced) => mapped.column_mut(idx).assign(&reduced?),
            None => debug!("Volume {} is missing, its column is left empty.", idx),
        }
    }
    Ok(mapped)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::sampling::OUTSIDE;
    use approx::assert_abs_diff_eq;
    use nalgebra::Matrix4;
    use ndarray::{arr1, arr2, Array3};

    const NAN: f64 = f64::NAN;

    fn assert_nan_eq(actual: &Array1<f64>, expected: &[f64]) {
        assert_eq!(expected.len(), actual.len());
        for (a, e) in actual.iter().zip(expected) {
            if e.is_nan() {
                assert!(a.is_nan(), "expected NaN, got {}", a);
            } else {
                assert_abs_diff_eq!(*a, *e, epsilon = 1e-12);
            }
        }
    }

    /// A 3x1x1 volume with values 0, 2, 4 along the first axis.
    fn ramp_volume() -> Volume {
        Volume::new(Array3::from_shape_vec((3, 1, 1), vec![0.0, 2.0, 4.0]).unwrap(), Matrix4::identity())
    }

    /// Two depths, three vertices. Vertex 2 is outside the volume at depth 1.
    fn ramp_indices() -> VoxelIndices {
        Array3::from_shape_vec((2, 3, 3), vec![
            0, 0, 0,   1, 0, 0,   2, 0, 0,
            1, 0, 0,   2, 0, 0,   OUTSIDE, 0, 0,
        ]).unwrap()
    }

    #[test]
    fn nanmean_skips_missing_values() {
        assert_eq!(2.0, nanmean(arr1(&[1.0, NAN, 3.0]).view()));
        assert_eq!(5.0, nanmean(arr1(&[5.0]).view()));
        assert!(nanmean(arr1(&[NAN, NAN]).view()).is_nan());
        assert!(nanmean(arr1(&[]).view()).is_nan());
    }

    #[test]
    fn nanmode_prefers_the_most_frequent_then_the_smallest_value() {
        assert_eq!(3.0, nanmode(arr1(&[3.0, 1.0, 3.0, NAN, NAN, NAN]).view()));
        assert_eq!(1.0, nanmode(arr1(&[7.0, 1.0, 7.0, 1.0]).view()));
        assert_eq!(-2.0, nanmode(arr1(&[4.0, -2.0]).view()));
        assert!(nanmode(arr1(&[NAN]).view()).is_nan());
    }

    #[test]
    fn samples_outside_the_volume_are_missing() {
        let samples = gather_samples(&ramp_volume(), &ramp_indices(), false);
        assert_eq!(samples[[0, 0]], 0.0);
        assert_eq!(samples[[1, 1]], 4.0);
        assert!(samples[[1, 2]].is_nan());
    }

    #[test]
    fn zeros_are_missing_only_when_ignored() {
        let kept = gather_samples(&ramp_volume(), &ramp_indices(), false);
        let ignored = gather_samples(&ramp_volume(), &ramp_indices(), true);
        assert_eq!(kept[[0, 0]], 0.0);
        assert!(ignored[[0, 0]].is_nan());

        let stat = Statistic::NanMean;
        assert_nan_eq(&stat.reduce(kept.view()).unwrap(), &[1.0, 3.0, 4.0]);
        assert_nan_eq(&stat.reduce(ignored.view()).unwrap(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn failed_volumes_leave_a_missing_column() {
        let vol = ramp_volume();
        let mapped = reduce_samples(&[Some(&vol), None, Some(&vol)], &ramp_indices(), &Statistic::NanMean, false).unwrap();

        assert_eq!((3, 3), mapped.dim());
        assert_nan_eq(&mapped.column(0).to_owned(), &[1.0, 3.0, 4.0]);
        assert!(mapped.column(1).iter().all(|x| x.is_nan()));
        assert_eq!(mapped.column(0), mapped.column(2));
    }

    #[test]
    fn no_readable_volume_is_fatal() {
        let res = reduce_samples(&[None, None], &ramp_indices(), &Statistic::NanMean, false);
        assert!(matches!(res, Err(SurfmapError::NoReadableVolume)));
    }

    #[test]
    fn custom_statistics_are_called_with_all_samples() {
        let first = Statistic::custom(|samples| samples.row(0).to_owned());
        let vol = ramp_volume();
        let mapped = reduce_samples(&[Some(&vol)], &ramp_indices(), &first, false).unwrap();
        assert_nan_eq(&mapped.column(0).to_owned(), &[0.0, 2.0, 4.0]);

        let broken = Statistic::custom(|_| Array1::zeros(1));
        let res = reduce_samples(&[Some(&vol)], &ramp_indices(), &broken, false);
        assert!(matches!(res, Err(SurfmapError::InvalidStatisticOutput(3, 1))));
    }

    #[test]
    fn mode_maps_label_volumes() {
        let labels = arr2(&[[1.0, 2.0], [1.0, NAN], [3.0, NAN]]);
        assert_nan_eq(&Statistic::Mode.reduce(labels.view()).unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn statistics_are_parsed_by_name() {
        assert!(matches!("nanmean".parse::<Statistic>(), Ok(Statistic::NanMean)));
        assert!(matches!("mode".parse::<Statistic>(), Ok(Statistic::Mode)));
        assert!(matches!("median".parse::<Statistic>(), Err(SurfmapError::UnknownStatistic(_))));
    }
}
