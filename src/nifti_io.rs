//! Reading of scalar volumes from NIfTI-1 files (`.nii` and `.nii.gz`).
//!
//! The voxel-to-world transform is taken from the sform if set, else from the qform, else from the voxel sizes alone.


use flate2::read::GzDecoder;
use log::warn;
use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::Array3;
use nifti::{InMemNiftiObject, NiftiHeader, NiftiObject, NiftiVolume, RandomAccessNiftiVolume};

use std::io::Cursor;
use std::path::Path;

use crate::error::{SurfmapError, Result};
use crate::volume::Volume;


/// Check whether the file is a NIfTI file, judging by its extension (".nii" or ".nii.gz").
pub fn is_nifti_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| {
            let name = a.to_string_lossy();
            name.ends_with(".nii") || name.ends_with(".nii.gz")
        })
        .unwrap_or(false)
}


fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}


fn nifti_error(err: nifti::NiftiError) -> SurfmapError {
    SurfmapError::InvalidNifti(err.to_string())
}


/// Read the first frame of a NIfTI-1 file as a volume, with world coordinates as given by the file's affine.
///
/// GZip compression is detected from the file content. Multi-frame files are accepted, but only their first frame is used.
///
/// # Examples
///
/// ```no_run
/// let vol = surfmap::read_nifti("/path/to/func/zmap.nii.gz").unwrap();
/// println!("{:?}", vol.dim());
/// ```
pub fn read_nifti<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let bytes = std::fs::read(&path)?;
    let obj = if is_gzip(&bytes) {
        InMemNiftiObject::from_reader(GzDecoder::new(Cursor::new(bytes))).map_err(nifti_error)?
    } else {
        InMemNiftiObject::from_reader(Cursor::new(bytes)).map_err(nifti_error)?
    };

    let header = obj.header();
    let ndim = header.dim[0] as usize;
    if ndim < 3 || ndim > 7 {
        return Err(SurfmapError::InvalidNifti(format!("expected a 3D or 4D volume, got {} dimensions", ndim)));
    }
    let num_frames: usize = header.dim[4..=ndim].iter().map(|d| *d as usize).product();
    if num_frames > 1 {
        warn!("Volume '{}' has {} frames, only the first one is mapped.", path.as_ref().display(), num_frames);
    }
    let vox2ras = nifti_affine(header);

    let volume = obj.volume();
    let dim = volume.dim();
    let mut data = Array3::zeros((dim[0] as usize, dim[1] as usize, dim[2] as usize));
    let mut coords = vec![0u16; dim.len()];
    for ((i, j, k), value) in data.indexed_iter_mut() {
        coords[0] = i as u16;
        coords[1] = j as u16;
        coords[2] = k as u16;
        *value = volume.get_f64(&coords).map_err(nifti_error)?;
    }
    Ok(Volume::new(data, vox2ras))
}


/// The voxel-to-world transform of a NIfTI header.
pub fn nifti_affine(header: &NiftiHeader) -> Matrix4<f64> {
    if header.sform_code > 0 {
        let rows = [&header.srow_x, &header.srow_y, &header.srow_z];
        return Matrix4::from_fn(|r, c| if r < 3 { rows[r][c] as f64 } else if c == 3 { 1.0 } else { 0.0 });
    }

    let pixdim = &header.pixdim;
    if header.qform_code > 0 {
        let (b, c, d) = (header.quatern_b as f64, header.quatern_c as f64, header.quatern_d as f64);
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let rot = Matrix3::new(
            a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c),
            2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b),
            2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b,
        );
        let qfac = if pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let scale = Matrix3::from_diagonal(&Vector3::new(pixdim[1] as f64, pixdim[2] as f64, qfac * pixdim[3] as f64));
        let mut affine = (rot * scale).to_homogeneous();
        affine[(0, 3)] = header.quatern_x as f64;
        affine[(1, 3)] = header.quatern_y as f64;
        affine[(2, 3)] = header.quatern_z as f64;
        return affine;
    }

    // Neither is set: voxel sizes only, as in the ANALYZE 7.5 format.
    Matrix4::new_nonuniform_scaling(&Vector3::new(pixdim[1] as f64, pixdim[2] as f64, pixdim[3] as f64))
}
