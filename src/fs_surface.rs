// Functions for managing FreeSurfer brain surface meshes in binary 'surf' files.
// These files store a triangular mesh, where each vertex if defined by its x,y,z coord and
// each face is defined by 3 vertices, stored as 3 indices into the vertices.


use byteordered::{ByteOrdered};
use flate2::bufread::GzDecoder;
use ndarray::{Array2};

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path};
use std::fmt;

use crate::util::{capped_capacity, is_gz_file};
use crate::error::{SurfmapError, Result};

pub const TRIS_MAGIC_FILE_TYPE_NUMBER: i32 = 16777214;

#[derive(Debug, Clone, PartialEq)]
pub struct FsSurfaceHeader {
    pub surf_magic: [u8; 3],
    pub info_line: String,
    pub num_vertices: i32,
    pub num_faces: i32,
}


impl Default for FsSurfaceHeader {
    fn default() -> FsSurfaceHeader {
        FsSurfaceHeader {
            surf_magic: [255; 3],
            info_line: String::from(""),
            num_vertices: 0,
            num_faces: 0
        }
    }
}

impl FsSurfaceHeader {

    /// Read an FsSurface header from a file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding. This is not typically the case
    /// for FreeSurfer Surf files, but very handy (and it helps us to reduce the size of our test data).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsSurfaceHeader> {
        let gz = is_gz_file(&path);
        let mut file = BufReader::new(File::open(path)?);
        if gz {
            FsSurfaceHeader::from_reader(&mut GzDecoder::new(file))
        } else {
            FsSurfaceHeader::from_reader(&mut file)
        }
    }


    /// Read an FsSurface header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// FsSurface header. After this call, the input is positioned at the start of the vertex data.
    pub fn from_reader<S>(input: &mut S) -> Result<FsSurfaceHeader>
    where
        S: Read,
    {
        let mut hdr = FsSurfaceHeader::default();

        let mut input = ByteOrdered::be(input);

        for v in &mut hdr.surf_magic {
            *v = input.read_u8()?;
        }

        let magic: i32 = interpret_fs_int24(hdr.surf_magic[0], hdr.surf_magic[1], hdr.surf_magic[2]);
        if magic != TRIS_MAGIC_FILE_TYPE_NUMBER {
            return Err(SurfmapError::InvalidFsSurfaceFormat);
        }

        // The 'created by' line is terminated by two newlines.
        let mut info_line = String::new();
        while !info_line.ends_with("\n\n") {
            info_line.push(input.read_u8()? as char);
        }

        hdr.info_line = info_line;
        hdr.num_vertices = input.read_i32()?;
        hdr.num_faces = input.read_i32()?;

        if hdr.num_vertices < 0 || hdr.num_faces < 0 {
            return Err(SurfmapError::InvalidFsSurfaceFormat);
        }
        Ok(hdr)
    }
}


/// Interpret three bytes as a single 24 bit integer, FreeSurfer style.
pub fn interpret_fs_int24(b1: u8, b2:u8, b3:u8) -> i32 {
    ((b1 as i32) << 16) + ((b2 as i32) << 8) + b3 as i32
}


/// An FsSurface object, as read from a FreeSurfer surf file like `lh.white` or `lh.pial`.
#[derive(Debug, PartialEq, Clone)]
pub struct FsSurface {
    pub header: FsSurfaceHeader,
    pub mesh: BrainMesh,
}

/// A triangular brain mesh. The `vertices` hold x,y,z per vertex, the `faces` hold 3 vertex indices per face.
#[derive(Debug, PartialEq, Clone)]
pub struct BrainMesh {
    pub vertices: Vec<f32>,
    pub faces: Vec<i32>,
}


impl BrainMesh {

    /// The number of vertices of this mesh.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn num_faces(&self) -> usize {
        self.faces.len() / 3
    }

    /// Get the vertex coordinates as an N x 3 matrix, one row per vertex.
    ///
    /// # Examples
    ///
    /// ```
    /// let mesh = surfmap::BrainMesh { vertices: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], faces: vec![] };
    /// let coords = mesh.coords();
    /// assert_eq!(coords.dim(), (2, 3));
    /// assert_eq!(coords[[1, 2]], 5.0);
    /// ```
    pub fn coords(&self) -> Array2<f64> {
        let num_verts = self.num_vertices();
        Array2::from_shape_fn((num_verts, 3), |(v, c)| self.vertices[v * 3 + c] as f64)
    }
}


impl fmt::Display for BrainMesh {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Brain trimesh with {} vertices and {} faces.", self.num_vertices(), self.num_faces())
    }
}


/// Read a brain surface mesh from a FreeSurfer surf file.
///
/// # Examples
///
/// ```no_run
/// let surf = surfmap::read_surf("/path/to/subjects_dir/subject1/surf/lh.white").unwrap();
/// println!("{}", surf.mesh);
/// ```
pub fn read_surf<P: AsRef<Path>>(path: P) -> Result<FsSurface> {
    FsSurface::from_file(path)
}


impl FsSurface {
    /// Read an FsSurface instance from a file.
    /// If the file's name ends with ".gz", the file is assumed to need GZip decoding. This is not typically the case
    /// for FreeSurfer Surface files, but very handy (and it helps us to reduce the size of our test data).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsSurface> {
        let gz = is_gz_file(&path);
        let mut file = BufReader::new(File::open(path)?);
        if gz {
            FsSurface::from_reader(&mut GzDecoder::new(file))
        } else {
            FsSurface::from_reader(&mut file)
        }
    }

    /// Read an FsSurface from a byte stream positioned at the start of the header.
    pub fn from_reader<S>(input: &mut S) -> Result<FsSurface>
    where
        S: Read,
    {
        let hdr = FsSurfaceHeader::from_reader(input)?;
        let mesh = FsSurface::mesh_from_reader(input, &hdr)?;

        Ok(FsSurface {
            header: hdr,
            mesh,
        })
    }

    /// Read the vertex and face data that follow the header.
    pub fn mesh_from_reader<S>(input: &mut S, hdr: &FsSurfaceHeader) -> Result<BrainMesh>
    where
        S: Read,
    {
        let mut input = ByteOrdered::be(input);

        // Header counts are non-negative, checked in FsSurfaceHeader::from_reader.
        let num_vertex_values = hdr.num_vertices as usize * 3;
        let mut vertex_data : Vec<f32> = Vec::with_capacity(capped_capacity(num_vertex_values));
        for _ in 0..num_vertex_values {
            vertex_data.push(input.read_f32()?);
        }

        let num_face_values = hdr.num_faces as usize * 3;
        let mut face_data : Vec<i32> = Vec::with_capacity(capped_capacity(num_face_values));
        for _ in 0..num_face_values {
            face_data.push(input.read_i32()?);
        }

        Ok(BrainMesh {
            vertices : vertex_data,
            faces : face_data
        })
    }
}
