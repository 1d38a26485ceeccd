//! Shared helpers for building synthetic pixel data in tests.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicom_pixel_core::adapters::ImageDataset;

/// A flat stand-in for the data set attribute lookup.
pub(crate) struct TestDataset {
    pub rows: u16,
    pub cols: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub planar_configuration: Option<u16>,
    pub number_of_frames: Option<u32>,
    pub photometric_interpretation: Option<&'static str>,
}

impl ImageDataset for TestDataset {
    fn rows(&self) -> Option<u16> {
        Some(self.rows)
    }
    fn cols(&self) -> Option<u16> {
        Some(self.cols)
    }
    fn samples_per_pixel(&self) -> Option<u16> {
        Some(self.samples_per_pixel)
    }
    fn bits_allocated(&self) -> Option<u16> {
        Some(self.bits_allocated)
    }
    fn pixel_representation(&self) -> Option<u16> {
        Some(0)
    }
    fn planar_configuration(&self) -> Option<u16> {
        self.planar_configuration
    }
    fn number_of_frames(&self) -> Option<u32> {
        self.number_of_frames
    }
    fn photometric_interpretation(&self) -> Option<&str> {
        self.photometric_interpretation
    }
    fn sop_instance_uid(&self) -> Option<&str> {
        Some("1.2.3.4.5.6.7.8")
    }
}

pub(crate) fn monochrome(rows: u16, cols: u16) -> TestDataset {
    TestDataset {
        rows,
        cols,
        samples_per_pixel: 1,
        bits_allocated: 8,
        planar_configuration: None,
        number_of_frames: None,
        photometric_interpretation: Some("MONOCHROME2"),
    }
}

/// Compress one segment with DICOM RLE runs.
pub(crate) fn rle_encode_segment(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        // measure the run of identical bytes starting here
        let mut run = 1;
        while pos + run < data.len() && data[pos + run] == data[pos] && run < 129 {
            run += 1;
        }
        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(data[pos]);
            pos += run;
        } else {
            // gather literals until the next run of 2 or the cap
            let start = pos;
            pos += 1;
            while pos < data.len()
                && pos - start < 128
                && !(pos + 1 < data.len() && data[pos + 1] == data[pos])
            {
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&data[start..pos]);
        }
    }
    out
}

/// Build one RLE frame fragment: the 64-byte header
/// followed by the already-compressed segments, even-padded.
pub(crate) fn rle_frame_fragment(segments: &[Vec<u8>]) -> Vec<u8> {
    assert!(segments.len() <= 15);
    let mut header = vec![0u8; 64];
    LittleEndian::write_u32(&mut header[0..4], segments.len() as u32);
    let mut offset = 64u32;
    for (i, segment) in segments.iter().enumerate() {
        LittleEndian::write_u32(&mut header[4 + 4 * i..8 + 4 * i], offset);
        offset += segment.len() as u32;
    }
    let mut fragment = header;
    for segment in segments {
        fragment.extend_from_slice(segment);
    }
    if fragment.len() % 2 != 0 {
        fragment.push(0);
    }
    fragment
}
