//! Timepoint extraction from the leading bytes of a gzip-compressed NIfTI-1 file.
//!
//! Only the fixed-size header is inflated. The payload may be a truncated gzip
//! stream, as produced by a range read, as long as it covers the header.

use std::io::Read;

use flate2::read::GzDecoder;
use nifti::NiftiHeader;

use crate::error::NiqueryError;

/// Size of a NIfTI-1 header on disk.
pub const NIFTI1_HEADER_LEN: usize = 348;

/// Bytes requested from a remote object by default. Comfortably covers the
/// compressed header plus the gzip member header.
pub const DEFAULT_RANGE_BYTES: u64 = 16 * 1024;

/// Inflates `payload` far enough to recover the NIfTI-1 header.
pub fn inflate_header(payload: &[u8]) -> Result<[u8; NIFTI1_HEADER_LEN], NiqueryError> {
    let mut decoder = GzDecoder::new(payload);
    let mut header = [0u8; NIFTI1_HEADER_LEN];
    decoder
        .read_exact(&mut header)
        .map_err(|err| NiqueryError::Decode(format!("gzip inflate: {err}")))?;
    Ok(header)
}

pub fn parse_header(raw: &[u8]) -> Result<NiftiHeader, NiqueryError> {
    NiftiHeader::from_reader(raw)
        .map_err(|err| NiqueryError::Decode(format!("nifti header: {err}")))
}

/// Number of volumes in the image, i.e. the 4th entry of the dimension array.
///
/// The on-disk fields are signed shorts; a rank outside `1..=7` or a negative
/// count is a malformed header.
pub fn timepoints_from_header(header: &NiftiHeader) -> Result<u64, NiqueryError> {
    let rank = header.dim[0] as i16;
    if !(1..=7).contains(&rank) {
        return Err(NiqueryError::Decode(format!(
            "nifti header: dim[0] = {rank} outside 1..=7"
        )));
    }
    let timepoints = header.dim[4] as i16;
    u64::try_from(timepoints).map_err(|_| {
        NiqueryError::Decode(format!("nifti header: negative dim[4] = {timepoints}"))
    })
}

pub fn decode_timepoints(payload: &[u8]) -> Result<u64, NiqueryError> {
    let raw = inflate_header(payload)?;
    let header = parse_header(&raw)?;
    timepoints_from_header(&header)
}
