//! Utility functions used in all other surfmap modules.

use std::io::{self, Read};
use std::path::Path;

use crate::error::Result;

/// Largest number of elements preallocated for data whose length comes from a file header.
pub const MAX_PREALLOC: usize = 1 << 20;

/// Check whether the file is GZip compressed, judging by its extension (".gz" or ".mgz").
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| {
            let name = a.to_string_lossy();
            name.ends_with(".gz") || name.ends_with(".mgz")
        })
        .unwrap_or(false)
}


/// Read and discard exactly `num_bytes` bytes from the input.
///
/// Used instead of seeking, because GZip streams cannot seek.
pub fn skip_bytes<S>(input: &mut S, num_bytes: u64) -> Result<()>
where
    S: Read,
{
    let skipped = io::copy(&mut input.by_ref().take(num_bytes), &mut io::sink())?;
    if skipped != num_bytes {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stream ended early").into());
    }
    Ok(())
}


/// The capacity to reserve for `count` elements announced by a file header.
///
/// Header counts are not trusted: buffers for larger counts grow while the data is read, so a corrupt header
/// ends in a read error instead of a huge allocation.
pub fn capped_capacity(count: usize) -> usize {
    count.min(MAX_PREALLOC)
}


#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn gz_files_are_detected_by_extension() {
        assert!(is_gz_file("lh.white.gz"));
        assert!(is_gz_file("/data/subject1/mri/brain.mgz"));
        assert!(!is_gz_file("/data/subject1/mri/brain.mgh"));
        assert!(!is_gz_file("lh.white"));
    }

    #[test]
    fn skipping_past_the_end_fails() {
        let mut input = Cursor::new(vec![0u8; 4]);
        assert!(skip_bytes(&mut input, 2).is_ok());
        assert!(skip_bytes(&mut input, 3).is_err());
    }

    #[test]
    fn header_counts_do_not_size_buffers_beyond_the_cap() {
        assert_eq!(12, capped_capacity(12));
        assert_eq!(MAX_PREALLOC, capped_capacity(usize::MAX));
    }
}
