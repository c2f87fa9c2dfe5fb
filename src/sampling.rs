//! Geometry of the mapping: points between the white and pial surfaces, and the voxels they fall into.
//!
//! The voxel indices are computed once per mapping from a reference volume and then shared by all volumes
//! of the batch, so every volume must live on the same voxel grid as the reference.

use approx::abs_diff_eq;
use log::debug;
use nalgebra::{Matrix4, Vector4};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

use crate::error::{SurfmapError, Result};
use crate::volume::Volume;

/// Index value of a voxel coordinate that lies outside the volume grid.
pub const OUTSIDE: i64 = -1;

/// Voxel indices of all sample points, indexed by [depth, vertex, {i, j, k}].
pub type VoxelIndices = Array3<i64>;


/// Convert an affine stored as an ndarray into a 4x4 matrix.
///
/// # Examples
///
/// ```
/// let affine = ndarray::Array2::<f64>::eye(4);
/// assert!(surfmap::sampling::affine_from_array(affine.view()).is_ok());
/// assert!(surfmap::sampling::affine_from_array(ndarray::Array2::<f64>::eye(3).view()).is_err());
/// ```
pub fn affine_from_array(affine: ArrayView2<f64>) -> Result<Matrix4<f64>> {
    if affine.dim() != (4, 4) {
        return Err(SurfmapError::InvalidAffine(format!("expected a 4x4 matrix, got {}x{}", affine.nrows(), affine.ncols())));
    }
    Ok(Matrix4::from_fn(|r, c| affine[[r, c]]))
}


/// Invert a voxel-to-world transform, so that world coordinates can be mapped to voxel coordinates.
pub fn ras2vox(vox2ras: &Matrix4<f64>) -> Result<Matrix4<f64>> {
    if vox2ras.iter().any(|x| !x.is_finite()) {
        return Err(SurfmapError::InvalidAffine(String::from("matrix contains non-finite values")));
    }
    if abs_diff_eq!(vox2ras.determinant(), 0.0, epsilon = 1e-12) {
        return Err(SurfmapError::InvalidAffine(String::from("matrix is singular")));
    }
    vox2ras.try_inverse().ok_or_else(|| SurfmapError::InvalidAffine(String::from("matrix is not invertible")))
}


/// Compute the points at the given depth between two surfaces, `(1 - depth) * white + depth * pial` per vertex.
///
/// Both inputs are N x 3 coordinate matrices with matching vertex order.
pub fn interpolate_depth(white: ArrayView2<f64>, pial: ArrayView2<f64>, depth: f64) -> Array2<f64> {
    &white * (1.0 - depth) + &pial * depth
}


/// Map world coordinates (N x 3) to the nearest voxel of a grid with the given dimensions.
///
/// Coordinates are rounded half to even. Each index component outside the grid is set to [`OUTSIDE`].
pub fn coords_to_voxel_indices(coords: ArrayView2<f64>, ras2vox: &Matrix4<f64>, dim: (usize, usize, usize)) -> Array2<i64> {
    let extent = [dim.0, dim.1, dim.2];
    let mut ijk = Array2::from_elem((coords.nrows(), 3), OUTSIDE);
    for (coord, mut out) in coords.outer_iter().zip(ijk.outer_iter_mut()) {
        let vox = ras2vox * Vector4::new(coord[0], coord[1], coord[2], 1.0);
        for c in 0..3 {
            let idx = vox[c].round_ties_even();
            if idx.is_finite() && idx >= 0.0 && idx < extent[c] as f64 {
                out[c] = idx as i64;
            }
        }
    }
    ijk
}


/// Get the voxel addressed by an (i, j, k) index triple, if it lies inside a grid of the given dimensions.
pub fn voxel_at(ijk: ArrayView1<i64>, dim: (usize, usize, usize)) -> Option<[usize; 3]> {
    let extent = [dim.0, dim.1, dim.2];
    let mut voxel = [0usize; 3];
    for c in 0..3 {
        if ijk[c] < 0 || ijk[c] as usize >= extent[c] {
            return None;
        }
        voxel[c] = ijk[c] as usize;
    }
    Some(voxel)
}


/// Compute the voxel indices of all sample points between the white and pial surface.
///
/// For each depth, the vertices are interpolated linearly between `white` (depth 0) and `pial` (depth 1),
/// and the resulting coordinates are mapped into the voxel grid of the `reference` volume.
/// The result has shape (depths, vertices, 3).
///
/// # Errors
///
/// * [`SurfmapError::InvalidCoordinates`] if a coordinate matrix does not have 3 columns.
/// * [`SurfmapError::VertexCountMismatch`] if the surfaces differ in vertex count.
/// * [`SurfmapError::NoDepths`] if `depths` is empty.
/// * [`SurfmapError::InvalidAffine`] if the reference transform cannot be inverted.
pub fn sample_geometry(white: ArrayView2<f64>, pial: ArrayView2<f64>, depths: &[f64], reference: &Volume) -> Result<VoxelIndices> {
    check_surface_coords(white, pial)?;
    if depths.is_empty() {
        return Err(SurfmapError::NoDepths);
    }
    let ras2vox = ras2vox(&reference.vox2ras)?;

    let num_verts = white.nrows();
    let mut indices = VoxelIndices::from_elem((depths.len(), num_verts, 3), OUTSIDE);
    for (point, depth) in depths.iter().enumerate() {
        let coords = interpolate_depth(white, pial, *depth);
        let ijk = coords_to_voxel_indices(coords.view(), &ras2vox, reference.dim());
        indices.index_axis_mut(Axis(0), point).assign(&ijk);
    }

    let num_outside = indices.outer_iter()
        .map(|ijk| ijk.outer_iter().filter(|v| v.iter().any(|x| *x < 0)).count())
        .sum::<usize>();
    debug!("Sampled {} vertices at {} depths, {} sample points fall outside the volume.", num_verts, depths.len(), num_outside);

    Ok(indices)
}


/// Check that the white and pial coordinates are N x 3 matrices with the same N.
pub(crate) fn check_surface_coords(white: ArrayView2<f64>, pial: ArrayView2<f64>) -> Result<()> {
    for cols in [white.ncols(), pial.ncols()].iter() {
        if *cols != 3 {
            return Err(SurfmapError::InvalidCoordinates(*cols));
        }
    }
    if white.nrows() != pial.nrows() {
        return Err(SurfmapError::VertexCountMismatch(white.nrows(), pial.nrows()));
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, s};

    /// A 4x4x4 grid with 2mm voxels whose origin sits at world (-1, -1, -1).
    fn grid_volume() -> Volume {
        let vox2ras = Matrix4::new(
            2., 0., 0., -1.,
            0., 2., 0., -1.,
            0., 0., 2., -1.,
            0., 0., 0., 1.,
        );
        Volume::new(Array3::zeros((4, 4, 4)), vox2ras)
    }

    #[test]
    fn depth_zero_and_one_reproduce_the_surfaces() {
        let white = arr2(&[[0.1, 0.2, 0.3], [-4.0, 5.5, 1e3]]);
        let pial = arr2(&[[1.7, -0.9, 2.25], [8.0, 0.125, -3.0]]);

        assert_abs_diff_eq!(interpolate_depth(white.view(), pial.view(), 0.0), white, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolate_depth(white.view(), pial.view(), 1.0), pial, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolate_depth(white.view(), pial.view(), 0.5), arr2(&[[0.9, -0.35, 1.275], [2.0, 2.8125, 498.5]]), epsilon = 1e-12);
    }

    #[test]
    fn voxel_indices_have_one_row_per_depth_and_vertex() {
        let white = Array2::zeros((5, 3));
        let pial = Array2::ones((5, 3));
        let depths = [0.0, 0.25, 0.5, 0.75, 1.0, 0.5, 0.0];

        let indices = sample_geometry(white.view(), pial.view(), &depths, &grid_volume()).unwrap();
        assert_eq!((7, 5, 3), indices.dim());

        let single = sample_geometry(white.view(), pial.view(), &[0.5], &grid_volume()).unwrap();
        assert_eq!((1, 5, 3), single.dim());
    }

    #[test]
    fn coordinates_are_rounded_into_the_reference_grid() {
        let ras2vox = ras2vox(&grid_volume().vox2ras).unwrap();
        // voxel = (world + 1) / 2
        let coords = arr2(&[[-1.0, 1.0, 5.0], [0.0, 2.0, 4.2], [7.0, -3.1, 0.0], [100.0, 0.0, 0.0]]);
        let ijk = coords_to_voxel_indices(coords.view(), &ras2vox, (4, 4, 4));

        assert_eq!(ijk.slice(s![0, ..]).to_vec(), vec![0, 1, 3]);
        // 0.5 and 1.5 round to the even neighbour, 2.6 rounds up
        assert_eq!(ijk.slice(s![1, ..]).to_vec(), vec![0, 2, 3]);
        // 4.0 is past the last voxel, -1.05 is before the first one
        assert_eq!(ijk.slice(s![2, ..]).to_vec(), vec![OUTSIDE, OUTSIDE, 0]);
        assert_eq!(ijk.slice(s![3, ..]).to_vec(), vec![OUTSIDE, 0, 0]);
    }

    #[test]
    fn voxel_lookup_rejects_any_invalid_component() {
        let ijk = arr2(&[[1, 2, 3], [1, OUTSIDE, 3], [4, 0, 0]]);
        assert_eq!(Some([1, 2, 3]), voxel_at(ijk.row(0), (4, 4, 4)));
        assert_eq!(None, voxel_at(ijk.row(1), (4, 4, 4)));
        assert_eq!(None, voxel_at(ijk.row(2), (4, 4, 4)));
        // indices valid for a larger reference grid are still rejected by a smaller volume
        assert_eq!(None, voxel_at(ijk.row(0), (2, 2, 2)));
    }

    #[test]
    fn mismatched_surfaces_are_rejected() {
        let white = Array2::zeros((5, 3));
        let pial = Array2::zeros((4, 3));
        let res = sample_geometry(white.view(), pial.view(), &[0.0], &grid_volume());
        assert!(matches!(res, Err(SurfmapError::VertexCountMismatch(5, 4))));

        let flat = Array2::zeros((5, 2));
        let res = sample_geometry(white.view(), flat.view(), &[0.0], &grid_volume());
        assert!(matches!(res, Err(SurfmapError::InvalidCoordinates(2))));
    }

    #[test]
    fn empty_depths_are_rejected() {
        let white = Array2::zeros((2, 3));
        let res = sample_geometry(white.view(), white.view(), &[], &grid_volume());
        assert!(matches!(res, Err(SurfmapError::NoDepths)));
    }

    #[test]
    fn singular_and_non_finite_transforms_are_rejected() {
        let mut singular = Matrix4::identity();
        singular[(2, 2)] = 0.0;
        assert!(matches!(ras2vox(&singular), Err(SurfmapError::InvalidAffine(_))));

        let mut nan = Matrix4::identity();
        nan[(0, 3)] = f64::NAN;
        assert!(matches!(ras2vox(&nan), Err(SurfmapError::InvalidAffine(_))));

        let white = Array2::zeros((2, 3));
        let vol = Volume::new(Array3::zeros((2, 2, 2)), singular);
        assert!(sample_geometry(white.view(), white.view(), &[0.0], &vol).is_err());
    }
}
