//! Mapping of volumetric brain imaging data onto cortical surface meshes.
//!
//! Each vertex of a surface is sampled along the line connecting the white and the pial surface,
//! at several relative depths, and the samples are reduced to one value per vertex. See [`map_volume_to_surface`].
//!
//! The package also reads the FreeSurfer file formats needed for this: surfaces, MGH/MGZ volumes and curv files.
//! Volumes can also be read from NIfTI-1 files (`.nii`, `.nii.gz`).

pub mod error;
pub mod util;
pub mod fs_surface;
pub mod fs_mgh;
pub mod fs_curv;
pub mod nifti_io;
pub mod volume;
pub mod sampling;
pub mod reduce;
pub mod vol2surf;

pub use error::{SurfmapError, Result};
pub use fs_surface::{read_surf, BrainMesh, FsSurface, FsSurfaceHeader};
pub use fs_mgh::{read_mgh, FsMgh, FsMghHeader};
pub use fs_curv::{read_curv, write_curv, CurvHeader, FsCurv};
pub use nifti_io::read_nifti;
pub use volume::{CoordSpace, Volume, VolumeRef};
pub use sampling::{sample_geometry, VoxelIndices};
pub use reduce::{reduce_samples, Statistic};
pub use vol2surf::{map_volume_to_coords, map_volume_to_surface, MappingOptions};
