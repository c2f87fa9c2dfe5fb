use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum SurfmapError {
        /// Invalid curv file: wrong magic number.
        InvalidCurvFormat {
            display("Invalid Curv file")
        }

        InvalidFsSurfaceFormat {
            display("Invalid FreeSurfer surf file")
        }

        InvalidFsMghFormat {
            display("Invalid FreeSurfer MGH file")
        }

        /// The MGH data type code is not one of MRI_UCHAR, MRI_INT, MRI_FLOAT, MRI_SHORT.
        UnsupportedMghDataType(code: i32) {
            display("Unsupported MGH data type code {}", code)
        }

        /// A NIfTI file that cannot be read or does not hold a volume.
        InvalidNifti(reason: String) {
            display("Invalid NIfTI file: {}", reason)
        }

        /// White and pial surfaces must describe the same vertices.
        VertexCountMismatch(white: usize, pial: usize) {
            display("White and pial surfaces should have the same number of vertices, got {} and {}", white, pial)
        }

        /// Vertex coordinates must be given as an N x 3 array.
        InvalidCoordinates(cols: usize) {
            display("Vertex coordinates must have 3 columns, got {}", cols)
        }

        NoDepths {
            display("At least one sampling depth is required")
        }

        /// The voxel-to-world transform cannot be used to compute voxel indices.
        InvalidAffine(reason: String) {
            display("Invalid voxel transform: {}", reason)
        }

        NoReadableVolume {
            display("None of the volumes could be opened")
        }

        /// A statistic name that is neither 'nanmean' nor 'mode'.
        UnknownStatistic(name: String) {
            display("Unknown statistic '{}', expected 'nanmean' or 'mode'", name)
        }

        /// A custom reduction returned the wrong number of per-vertex values.
        InvalidStatisticOutput(expected: usize, got: usize) {
            display("Reduction returned {} values, expected one per vertex ({})", got, expected)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, SurfmapError>;
