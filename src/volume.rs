//! Scalar brain volumes and the handles used to pass them to a mapping.
//!
//! A [`Volume`] pairs a 3D voxel grid with its voxel-to-world transform. A [`VolumeRef`] is what callers
//! hand to [`crate::map_volume_to_surface`]: a file to load, an already loaded volume, or a load that failed upstream.

use log::warn;
use nalgebra::Matrix4;
use ndarray::Array3;

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{SurfmapError, Result};
use crate::fs_mgh::{read_mgh, FsMgh};
use crate::nifti_io::{is_nifti_file, read_nifti};


/// The world coordinate system a volume's voxel transform maps into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSpace {
    /// Scanner RAS, as given by the direction cosines and center of the volume.
    Scanner,
    /// FreeSurfer surface RAS (tkregister space), the space of `lh.white`, `lh.pial` and friends.
    Tkr,
}


/// A 3D scalar volume with its voxel-to-world transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub data: Array3<f64>,
    /// Maps homogeneous voxel indices (i, j, k, 1) to world coordinates.
    pub vox2ras: Matrix4<f64>,
}


impl Volume {

    pub fn new(data: Array3<f64>, vox2ras: Matrix4<f64>) -> Volume {
        Volume { data, vox2ras }
    }

    /// Create a volume from one frame of an MGH file, with world coordinates in the given space.
    pub fn from_mgh(mgh: &FsMgh, frame: usize, space: CoordSpace) -> Result<Volume> {
        let data = mgh.frame_f64(frame).ok_or_else(|| {
            SurfmapError::Io(io::Error::new(io::ErrorKind::InvalidInput, format!("volume has no frame {}", frame)))
        })?;
        let vox2ras = match space {
            CoordSpace::Scanner => mgh.header.vox2ras(),
            CoordSpace::Tkr => mgh.header.vox2ras_tkr(),
        };
        Ok(Volume::new(data, vox2ras))
    }

    /// Load the first frame of a volume file.
    ///
    /// NIfTI files (".nii", ".nii.gz") keep the world coordinates of their affine. All other files are read as MGH or MGZ,
    /// with world coordinates in FreeSurfer surface space.
    /// Multi-frame files are accepted, but only their first frame is used.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Volume> {
        if is_nifti_file(&path) {
            return read_nifti(path);
        }
        let mgh = read_mgh(&path)?;
        if mgh.header.dim4len > 1 {
            warn!("Volume '{}' has {} frames, only the first one is mapped.", path.as_ref().display(), mgh.header.dim4len);
        }
        Volume::from_mgh(&mgh, 0, CoordSpace::Tkr)
    }

    /// The grid dimensions (i, j, k).
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }
}


/// A volume to be mapped: either a file path, an already loaded volume, or a failed load.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeRef {
    /// An MGH, MGZ or NIfTI file, loaded with [`Volume::from_file`].
    Path(PathBuf),
    Loaded(Volume),
    /// A volume the caller could not load. The message is reported when the mapping runs.
    Failed(String),
}


impl VolumeRef {

    /// Resolve this reference into a volume. Files are read once, there is no retry.
    pub fn load(&self) -> Result<Cow<'_, Volume>> {
        match self {
            VolumeRef::Path(path) => Volume::from_file(path).map(Cow::Owned),
            VolumeRef::Loaded(vol) => Ok(Cow::Borrowed(vol)),
            VolumeRef::Failed(msg) => Err(SurfmapError::Io(io::Error::new(io::ErrorKind::Other, msg.clone()))),
        }
    }

    /// A short description of the referenced volume, for log messages.
    pub fn describe(&self) -> String {
        match self {
            VolumeRef::Path(path) => format!("'{}'", path.display()),
            VolumeRef::Loaded(vol) => {
                let (i, j, k) = vol.dim();
                format!("<in-memory volume {}x{}x{}>", i, j, k)
            }
            VolumeRef::Failed(msg) => format!("<failed volume: {}>", msg),
        }
    }
}


impl From<Volume> for VolumeRef {
    fn from(vol: Volume) -> VolumeRef {
        VolumeRef::Loaded(vol)
    }
}

impl From<PathBuf> for VolumeRef {
    fn from(path: PathBuf) -> VolumeRef {
        VolumeRef::Path(path)
    }
}

impl From<&Path> for VolumeRef {
    fn from(path: &Path) -> VolumeRef {
        VolumeRef::Path(path.to_path_buf())
    }
}
