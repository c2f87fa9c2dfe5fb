//! Functions for managing FreeSurfer brain volumes in binary 'MGH' files.
//!
//! MGZ files are GZip compressed MGH files and are handled transparently.


use byteordered::{ByteOrdered};
use flate2::bufread::GzDecoder;
use nalgebra::{Matrix3, Matrix4, Vector3};
use ndarray::{Array3, Array4, ArrayView4, Axis, ShapeBuilder};


use std::{fs::File};
use std::io::{BufReader, Read};
use std::path::{Path};
use std::fmt;

use crate::util::{capped_capacity, is_gz_file, skip_bytes};
use crate::error::{SurfmapError, Result};

pub const MGH_VERSION: i32 = 1;

pub const MGH_DATATYPE_NAMES : [&str; 4] = ["MRI_UCHAR", "MRI_INT", "MRI_FLOAT", "MRI_SHORT"];
pub const MGH_DATATYPE_CODES : [i32; 4] = [0, 1, 3, 4];
pub const MGH_DATA_START : i32 = 284; // The index in bytes where the data part starts in an MGH file.

const MGH_HEADER_FIXED_BYTES : i32 = 30; // 7 x i32 + 1 x i16
const MGH_HEADER_RAS_BYTES : i32 = 60; // 15 x f32

// Orientation of a conformed FreeSurfer volume (LIA), used when the file has no valid RAS info.
const CONFORMED_MDC : [f32; 9] = [-1., 0., 0., 0., 0., -1., 0., 1., 0.];

/// Models the header of a FreeSurfer MGH file containing a brain volume.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMghHeader {
    pub mgh_format_version: i32,
    pub dim1len: i32,
    pub dim2len: i32,
    pub dim3len: i32,
    pub dim4len: i32,  // aka "num_frames"
    pub dtype: i32,
    pub dof: i32,
    pub is_ras_good: i16,
    pub delta: [f32; 3],
    pub mdc_raw: [f32; 9],
    pub p_xyz_c: [f32; 3],
}


/// Models a FreeSurfer MGH file. Exactly one of the data fields is set, depending on the `dtype` of the header.
#[derive(Debug, Clone, PartialEq)]
pub struct FsMgh {
    pub header: FsMghHeader,
    pub data_mri_uchar: Option<Array4<u8>>,
    pub data_mri_float: Option<Array4<f32>>,
    pub data_mri_int: Option<Array4<i32>>,
    pub data_mri_short: Option<Array4<i16>>,
}


impl Default for FsMghHeader {
    fn default() -> FsMghHeader {
        FsMghHeader {
            mgh_format_version: MGH_VERSION,
            dim1len: 0,
            dim2len: 0,
            dim3len: 0,
            dim4len: 0,
            dtype: 1,
            dof: 0,
            is_ras_good: 0,
            delta: [1.; 3],
            mdc_raw: CONFORMED_MDC,
            p_xyz_c: [0.; 3],
        }
    }
}

/// The header of an MGH/MGZ file.
impl FsMghHeader {

    /// Read an MGH header from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsMghHeader> {
        let gz = is_gz_file(&path);
        let mut file = BufReader::new(File::open(path)?);
        if gz {
            FsMghHeader::from_reader(&mut GzDecoder::new(file))
        } else {
            FsMghHeader::from_reader(&mut file)
        }
    }


    /// Read an MGH header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// header. Only the header fields are consumed, the input is not advanced to the data start.
    pub fn from_reader<S>(input: &mut S) -> Result<FsMghHeader>
    where
        S: Read,
    {
        let mut hdr = FsMghHeader::default();

        let mut input = ByteOrdered::be(input);

        hdr.mgh_format_version = input.read_i32()?;

        if hdr.mgh_format_version != MGH_VERSION {
            return Err(SurfmapError::InvalidFsMghFormat);
        }

        hdr.dim1len = input.read_i32()?;
        hdr.dim2len = input.read_i32()?;
        hdr.dim3len = input.read_i32()?;
        hdr.dim4len = input.read_i32()?;

        if hdr.dim1len < 1 || hdr.dim2len < 1 || hdr.dim3len < 1 || hdr.dim4len < 1 {
            return Err(SurfmapError::InvalidFsMghFormat);
        }

        hdr.dtype = input.read_i32()?;
        hdr.dof = input.read_i32()?;

        hdr.is_ras_good = input.read_i16()?;

        if hdr.is_ras_good == 1 {
            for idx in 0..3 { hdr.delta[idx] = input.read_f32()?; }
            for idx in 0..9 { hdr.mdc_raw[idx] = input.read_f32()?; }
            for idx in 0..3 { hdr.p_xyz_c[idx] = input.read_f32()?; }
        }
        Ok(hdr)
    }

    /// Number of header bytes consumed by [`FsMghHeader::from_reader`].
    fn num_bytes_read(&self) -> i32 {
        if self.is_ras_good == 1 { MGH_HEADER_FIXED_BYTES + MGH_HEADER_RAS_BYTES } else { MGH_HEADER_FIXED_BYTES }
    }

    /// The volume dimensions as (dim1, dim2, dim3, frames).
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        (self.dim1len as usize, self.dim2len as usize, self.dim3len as usize, self.dim4len as usize)
    }

    /// Get the data type name, like `MRI_FLOAT`, or `None` if the dtype code is not supported.
    pub fn dtype_name(&self) -> Option<&'static str> {
        MGH_DATATYPE_CODES.iter().position(|c| *c == self.dtype).map(|idx| MGH_DATATYPE_NAMES[idx])
    }

    /// Compute the voxel-to-RAS matrix of the volume (scanner RAS).
    ///
    /// This maps 0-based voxel indices (column, row, slice) to world coordinates in mm.
    /// Use this for data registered to scanner space.
    pub fn vox2ras(&self) -> Matrix4<f64> {
        let mdc = Matrix3::from_column_slice(&self.mdc_raw.map(|x| x as f64));
        let p_xyz_c = Vector3::new(self.p_xyz_c[0] as f64, self.p_xyz_c[1] as f64, self.p_xyz_c[2] as f64);
        self.vox2ras_with(&mdc, &p_xyz_c)
    }

    /// Compute the tkregister voxel-to-RAS matrix of the volume (FreeSurfer surface RAS).
    ///
    /// FreeSurfer surfaces like `lh.white` store vertex coordinates in this space: the volume
    /// center is at the origin and the orientation is fixed to the conformed one.
    pub fn vox2ras_tkr(&self) -> Matrix4<f64> {
        let mdc = Matrix3::from_column_slice(&CONFORMED_MDC.map(|x| x as f64));
        self.vox2ras_with(&mdc, &Vector3::zeros())
    }

    fn vox2ras_with(&self, mdc: &Matrix3<f64>, p_xyz_c: &Vector3<f64>) -> Matrix4<f64> {
        let delta = Vector3::new(self.delta[0] as f64, self.delta[1] as f64, self.delta[2] as f64);
        let m = mdc * Matrix3::from_diagonal(&delta);
        let p_crs_c = Vector3::new(self.dim1len as f64, self.dim2len as f64, self.dim3len as f64) / 2.0;
        let p_xyz_0 = p_xyz_c - m * p_crs_c;

        let mut vox2ras = Matrix4::identity();
        vox2ras.fixed_view_mut::<3, 3>(0, 0).copy_from(&m);
        vox2ras.fixed_view_mut::<3, 1>(0, 3).copy_from(&p_xyz_0);
        vox2ras
    }
}


impl FsMgh {

    /// Read an MGH or MGZ file. Files ending in '.mgz' or '.gz' are GZip decoded.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
        let gz = is_gz_file(&path);
        let mut file = BufReader::new(File::open(path)?);
        if gz {
            FsMgh::from_reader(&mut GzDecoder::new(file))
        } else {
            FsMgh::from_reader(&mut file)
        }
    }

    /// Read an MGH volume, header and data, from a byte stream positioned at the start of the header.
    pub fn from_reader<S>(input: &mut S) -> Result<FsMgh>
    where
        S: Read,
    {
        let hdr = FsMghHeader::from_reader(input)?;
        skip_bytes(input, (MGH_DATA_START - hdr.num_bytes_read()) as u64)?;

        let (d1, d2, d3, d4) = hdr.dim();
        let num_values = [d1, d2, d3, d4].iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d))
            .ok_or(SurfmapError::InvalidFsMghFormat)?;
        let shape = (d1, d2, d3, d4).f(); // MGH data is stored in column-major order.

        let mut input = ByteOrdered::be(input);

        let mut mgh = FsMgh {
            header: hdr.clone(),
            data_mri_uchar: None,
            data_mri_float: None,
            data_mri_int: None,
            data_mri_short: None,
        };

        match hdr.dtype {
            0 => {
                let mut data: Vec<u8> = Vec::with_capacity(capped_capacity(num_values));
                for _ in 0..num_values { data.push(input.read_u8()?); }
                mgh.data_mri_uchar = Some(Array4::from_shape_vec(shape, data).map_err(|_| SurfmapError::InvalidFsMghFormat)?);
            }
            1 => {
                let mut data: Vec<i32> = Vec::with_capacity(capped_capacity(num_values));
                for _ in 0..num_values { data.push(input.read_i32()?); }
                mgh.data_mri_int = Some(Array4::from_shape_vec(shape, data).map_err(|_| SurfmapError::InvalidFsMghFormat)?);
            }
            3 => {
                let mut data: Vec<f32> = Vec::with_capacity(capped_capacity(num_values));
                for _ in 0..num_values { data.push(input.read_f32()?); }
                mgh.data_mri_float = Some(Array4::from_shape_vec(shape, data).map_err(|_| SurfmapError::InvalidFsMghFormat)?);
            }
            4 => {
                let mut data: Vec<i16> = Vec::with_capacity(capped_capacity(num_values));
                for _ in 0..num_values { data.push(input.read_i16()?); }
                mgh.data_mri_short = Some(Array4::from_shape_vec(shape, data).map_err(|_| SurfmapError::InvalidFsMghFormat)?);
            }
            code => return Err(SurfmapError::UnsupportedMghDataType(code)),
        }
        Ok(mgh)
    }

    /// Get a single frame of the volume as 64 bit floats, or `None` if the frame does not exist.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// let mgh = surfmap::read_mgh("/path/to/subjects_dir/subject1/mri/brain.mgz").unwrap();
    /// let first = mgh.frame_f64(0).unwrap();
    /// assert_eq!(first.dim(), (256, 256, 256));
    /// ```
    pub fn frame_f64(&self, frame: usize) -> Option<Array3<f64>> {
        if frame >= self.header.dim().3 {
            return None;
        }
        fn to_f64<T: Copy + Into<f64>>(data: ArrayView4<T>, frame: usize) -> Array3<f64> {
            data.index_axis(Axis(3), frame).mapv(|x| x.into())
        }
        if let Some(data) = &self.data_mri_uchar {
            Some(to_f64(data.view(), frame))
        } else if let Some(data) = &self.data_mri_int {
            Some(to_f64(data.view(), frame))
        } else if let Some(data) = &self.data_mri_float {
            Some(to_f64(data.view(), frame))
        } else {
            self.data_mri_short.as_ref().map(|data| to_f64(data.view(), frame))
        }
    }
}


impl fmt::Display for FsMgh {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (d1, d2, d3, d4) = self.header.dim();
        write!(f, "MGH volume of {}x{}x{} voxels with {} frame(s), type {}.", d1, d2, d3, d4, self.header.dtype_name().unwrap_or("unknown"))
    }
}


/// Read an MGH or MGZ file.
///
/// # Examples
///
/// ```no_run
/// let mgh = surfmap::read_mgh("/path/to/subjects_dir/subject1/mri/brain.mgz").unwrap();
/// println!("{}", mgh);
/// ```
pub fn read_mgh<P: AsRef<Path>>(path: P) -> Result<FsMgh> {
    FsMgh::from_file(path)
}
