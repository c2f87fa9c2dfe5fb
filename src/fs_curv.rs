// Functions for managing FreeSurfer per-vertex data in binary 'curv' files.
// These files store 1 scalar value (typically a morphological descriptor, like cortical thickness at that point,
// or a value mapped from a volume) for each vertex of the respective brain surface mesh.


use byteordered::{ByteOrdered};
use flate2::bufread::GzDecoder;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path};

use crate::util::{capped_capacity, is_gz_file};
use crate::error::{SurfmapError, Result};

pub const CURV_MAGIC_CODE_U8: u8 = 255;


#[derive(Debug, Clone, PartialEq)]
pub struct CurvHeader {
    pub curv_magic: [u8; 3],
    pub num_vertices: i32,
    pub num_faces: i32,
    pub num_values_per_vertex: i32,
}


impl Default for CurvHeader {
    fn default() -> CurvHeader {
        CurvHeader {
            curv_magic: [CURV_MAGIC_CODE_U8; 3],
            num_vertices: 0,
            num_faces: 0,
            num_values_per_vertex: 1,
        }
    }
}

impl CurvHeader {

    /// Read a Curv header from the given byte stream.
    /// It is assumed that the input is currently at the start of the
    /// Curv header.
    pub fn from_reader<S>(input: &mut S) -> Result<CurvHeader>
    where
        S: Read,
    {
        let mut hdr = CurvHeader::default();

        let mut input = ByteOrdered::be(input);

        for v in &mut hdr.curv_magic {
            *v = input.read_u8()?;
        }
        if hdr.curv_magic != [CURV_MAGIC_CODE_U8; 3] {
            return Err(SurfmapError::InvalidCurvFormat);
        }

        hdr.num_vertices = input.read_i32()?;
        hdr.num_faces = input.read_i32()?;
        hdr.num_values_per_vertex = input.read_i32()?;

        if hdr.num_vertices < 0 || hdr.num_values_per_vertex != 1 {
            return Err(SurfmapError::InvalidCurvFormat);
        }
        Ok(hdr)
    }
}


/// Per-vertex data from a FreeSurfer curv file.
#[derive(Debug, Clone, PartialEq)]
pub struct FsCurv {
    pub header: CurvHeader,
    pub data: Vec<f32>,
}


impl FsCurv {
    /// Read a curv file. If the file's name ends with ".gz", the file is assumed to need GZip decoding.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<FsCurv> {
        let gz = is_gz_file(&path);
        let mut file = BufReader::new(File::open(path)?);
        if gz {
            FsCurv::from_reader(&mut GzDecoder::new(file))
        } else {
            FsCurv::from_reader(&mut file)
        }
    }

    pub fn from_reader<S>(input: &mut S) -> Result<FsCurv>
    where
        S: Read,
    {
        let hdr = CurvHeader::from_reader(input)?;
        let mut input = ByteOrdered::be(input);

        let mut data: Vec<f32> = Vec::with_capacity(capped_capacity(hdr.num_vertices as usize));
        for _ in 0..hdr.num_vertices {
            data.push(input.read_f32()?);
        }
        Ok(FsCurv { header: hdr, data })
    }

    /// Write the curv data to a byte stream.
    pub fn to_writer<W>(&self, output: &mut W) -> Result<()>
    where
        W: Write,
    {
        let mut output = ByteOrdered::be(output);
        for m in self.header.curv_magic.iter() {
            output.write_u8(*m)?;
        }
        output.write_i32(self.data.len() as i32)?;
        output.write_i32(self.header.num_faces)?;
        output.write_i32(1)?;
        for v in self.data.iter() {
            output.write_f32(*v)?;
        }
        Ok(())
    }
}


/// Read per-vertex data from a FreeSurfer curv file.
///
/// # Examples
///
/// ```no_run
/// let curv = surfmap::read_curv("/path/to/subjects_dir/subject1/surf/lh.thickness").unwrap();
/// println!("Read {} values.", curv.data.len());
/// ```
pub fn read_curv<P: AsRef<Path>>(path: P) -> Result<FsCurv> {
    FsCurv::from_file(path)
}


/// Write per-vertex data, like one column of a volume-to-surface mapping, to a FreeSurfer curv file.
///
/// Missing values are written as NaN. The `num_faces` is stored in the header only, pass `0` if unknown.
///
/// # Examples
///
/// ```no_run
/// let values = vec![0.5_f32, 1.5, f32::NAN];
/// surfmap::write_curv("/tmp/lh.mapped", &values, 0).unwrap();
/// ```
pub fn write_curv<P: AsRef<Path>>(path: P, data: &[f32], num_faces: i32) -> Result<()> {
    let curv = FsCurv {
        header: CurvHeader { num_vertices: data.len() as i32, num_faces, ..CurvHeader::default() },
        data: data.to_vec(),
    };
    let mut file = BufWriter::new(File::create(path)?);
    curv.to_writer(&mut file)?;
    file.flush()?;
    Ok(())
}
