//! Shared support for reassembling frames out of pixel data fragments.
//!
//! Codecs delegate three concerns to this module:
//! gathering the image attributes a decode depends on,
//! locating the fragment where a frame starts,
//! and scattering decoded segment bytes into the destination raster.

use dicom_pixel_core::adapters::{decode_error, DecodeResult, ImageDataset};
use dicom_pixel_core::fragments::PixelSequence;
use dicom_pixel_core::parameters::{CodecParameters, PlanarConfigurationPolicy};
use dicom_pixel_core::snafu::prelude::*;
use tracing::debug;

/// Image-level attributes required to reassemble frames,
/// gathered once per decode operation.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub rows: usize,
    pub cols: usize,
    pub samples_per_pixel: usize,
    pub bytes_per_sample: usize,
    pub number_of_frames: usize,
    /// Planar configuration declared by the data set
    /// (0 unless the image is multi-sample).
    pub planar_configuration: u16,
    /// 0 for unsigned samples, 1 for two's complement.
    pub pixel_representation: u16,
    pub photometric_interpretation: String,
}

impl ImageInfo {
    /// Gather the required attributes from the data set,
    /// clamping an implausible number of frames
    /// to the number of available fragments.
    pub fn from_dataset(
        obj: &dyn ImageDataset,
        fragments: &PixelSequence,
    ) -> DecodeResult<Self> {
        let cols = obj
            .cols()
            .context(decode_error::MissingAttributeSnafu { name: "Columns" })?;
        let rows = obj
            .rows()
            .context(decode_error::MissingAttributeSnafu { name: "Rows" })?;
        let samples_per_pixel =
            obj.samples_per_pixel()
                .context(decode_error::MissingAttributeSnafu {
                    name: "SamplesPerPixel",
                })?;
        let bits_allocated = obj
            .bits_allocated()
            .context(decode_error::MissingAttributeSnafu {
                name: "BitsAllocated",
            })?;
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            decode_error::CannotChangeRepresentationSnafu {
                reason: "BitsAllocated other than 8 or 16 is not supported",
            }
        );
        let pixel_representation =
            obj.pixel_representation()
                .context(decode_error::MissingAttributeSnafu {
                    name: "PixelRepresentation",
                })?;
        let planar_configuration = if samples_per_pixel > 1 {
            obj.planar_configuration()
                .context(decode_error::MissingAttributeSnafu {
                    name: "PlanarConfiguration",
                })?
        } else {
            0
        };
        let photometric_interpretation = obj
            .photometric_interpretation()
            .context(decode_error::MissingAttributeSnafu {
                name: "PhotometricInterpretation",
            })?
            .trim()
            .to_string();
        ensure!(
            !photometric_interpretation.is_empty(),
            decode_error::MissingValueSnafu {
                name: "PhotometricInterpretation",
            }
        );

        let mut number_of_frames = obj.number_of_frames().unwrap_or(1).max(1) as usize;
        let available = fragments.number_of_fragments() as usize;
        if available > 0 && number_of_frames > available {
            // a frame needs at least one fragment
            debug!(
                "Number of Frames {} exceeds the {} available fragments, clamping",
                number_of_frames, available
            );
            number_of_frames = available;
        }

        Ok(ImageInfo {
            rows: rows as usize,
            cols: cols as usize,
            samples_per_pixel: samples_per_pixel as usize,
            bytes_per_sample: (bits_allocated / 8) as usize,
            number_of_frames,
            planar_configuration,
            pixel_representation,
            photometric_interpretation,
        })
    }

    /// The number of bytes one decoded segment covers:
    /// one byte plane of one frame.
    pub fn stripe_size(&self) -> usize {
        self.rows * self.cols
    }

    /// The total number of bytes of one decoded frame.
    pub fn frame_size(&self) -> usize {
        self.stripe_size() * self.samples_per_pixel * self.bytes_per_sample
    }
}

/// Resolve the planar configuration of the decoded output
/// from the parameter policy and the data set's declared value.
pub(crate) fn resolve_planar_configuration(
    info: &ImageInfo,
    parameters: &CodecParameters,
) -> u16 {
    match parameters.planar_configuration {
        PlanarConfigurationPolicy::Auto => info.planar_configuration,
        PlanarConfigurationPolicy::Interleaved => 0,
        PlanarConfigurationPolicy::Planar => 1,
    }
}

/// Find the first fragment of `frame` (0-based).
///
/// An explicit start fragment from a previous decode wins;
/// then the basic offset table;
/// otherwise fall back to assuming one fragment per frame,
/// which is only guaranteed for strictly increasing
/// sequential frame access.
pub(crate) fn locate_frame(
    fragments: &PixelSequence,
    frame: u32,
    start_fragment: Option<u32>,
) -> DecodeResult<u32> {
    let count = fragments.number_of_fragments();
    if let Some(hint) = start_fragment {
        ensure!(hint < count, decode_error::FrameRangeOutOfBoundsSnafu);
        return Ok(hint);
    }
    if let Some(index) = fragments.locate_frame(frame) {
        debug!("frame {} starts at fragment {} (offset table)", frame, index);
        return Ok(index);
    }
    ensure!(frame < count, decode_error::FrameRangeOutOfBoundsSnafu);
    Ok(frame)
}

/// Scatter one decoded segment into the destination raster
/// of a single frame.
///
/// Segment `segment_index` carries byte
/// `segment_index % bytes_per_sample` (most significant first)
/// of sample `segment_index / bytes_per_sample` for every pixel.
/// The decoded slice may be shorter than a stripe;
/// missing trailing bytes are filled with `pad`.
pub(crate) fn scatter_segment(
    info: &ImageInfo,
    parameters: &CodecParameters,
    planar_configuration: u16,
    segment_index: usize,
    decoded: &[u8],
    pad: u8,
    frame_out: &mut [u8],
) {
    let bps = info.bytes_per_sample;
    let sample = segment_index / bps;
    let byte_within_sample = segment_index % bps;
    // segments come most significant byte first; place them so that
    // each sample reads as a little-endian word, unless the encoder
    // already emitted the segments least significant byte first
    let position = if parameters.reverse_decompression_byte_order {
        byte_within_sample
    } else {
        bps - 1 - byte_within_sample
    };

    let (base, stride) = if planar_configuration == 1 {
        (sample * bps * info.stripe_size() + position, bps)
    } else {
        (sample * bps + position, info.samples_per_pixel * bps)
    };

    let mut src = decoded.iter();
    let mut index = base;
    for _ in 0..info.stripe_size() {
        frame_out[index] = src.next().copied().unwrap_or(pad);
        index += stride;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{monochrome, TestDataset};
    use dicom_pixel_core::adapters::DecodeError;

    #[test]
    fn gathers_and_computes_sizes() {
        let obj = TestDataset {
            rows: 4,
            cols: 3,
            samples_per_pixel: 3,
            bits_allocated: 16,
            planar_configuration: Some(0),
            number_of_frames: Some(2),
            photometric_interpretation: Some("RGB "),
        };
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8], vec![0; 8]]);
        let info = ImageInfo::from_dataset(&obj, &fragments).unwrap();
        assert_eq!(info.stripe_size(), 12);
        assert_eq!(info.frame_size(), 12 * 3 * 2);
        assert_eq!(info.number_of_frames, 2);
        // trailing space is trimmed
        assert_eq!(info.photometric_interpretation, "RGB");
    }

    #[test]
    fn implausible_frame_count_is_clamped() {
        let mut obj = monochrome(2, 2);
        obj.number_of_frames = Some(100);
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8], vec![0; 8]]);
        let info = ImageInfo::from_dataset(&obj, &fragments).unwrap();
        assert_eq!(info.number_of_frames, 2);
    }

    #[test]
    fn missing_photometric_interpretation() {
        let mut obj = monochrome(2, 2);
        obj.photometric_interpretation = None;
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let err = ImageInfo::from_dataset(&obj, &fragments).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingAttribute {
                name: "PhotometricInterpretation"
            }
        ));
    }

    #[test]
    fn blank_photometric_interpretation() {
        let mut obj = monochrome(2, 2);
        obj.photometric_interpretation = Some("  ");
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let err = ImageInfo::from_dataset(&obj, &fragments).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingValue {
                name: "PhotometricInterpretation"
            }
        ));
    }

    #[test]
    fn planar_configuration_required_for_color() {
        let obj = TestDataset {
            rows: 2,
            cols: 2,
            samples_per_pixel: 3,
            bits_allocated: 8,
            planar_configuration: None,
            number_of_frames: None,
            photometric_interpretation: Some("RGB"),
        };
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let err = ImageInfo::from_dataset(&obj, &fragments).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingAttribute {
                name: "PlanarConfiguration"
            }
        ));
    }

    #[test]
    fn unsupported_bit_depth() {
        let mut obj = monochrome(2, 2);
        obj.bits_allocated = 12;
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let err = ImageInfo::from_dataset(&obj, &fragments).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::CannotChangeRepresentation { .. }
        ));
    }

    #[test]
    fn scatter_interleaves_color_planes() {
        let obj = TestDataset {
            rows: 1,
            cols: 3,
            samples_per_pixel: 3,
            bits_allocated: 8,
            planar_configuration: Some(0),
            number_of_frames: None,
            photometric_interpretation: Some("RGB"),
        };
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let info = ImageInfo::from_dataset(&obj, &fragments).unwrap();
        let parameters = CodecParameters::default();

        let mut out = vec![0u8; info.frame_size()];
        scatter_segment(&info, &parameters, 0, 0, &[1, 2, 3], 0, &mut out);
        scatter_segment(&info, &parameters, 0, 1, &[4, 5, 6], 0, &mut out);
        scatter_segment(&info, &parameters, 0, 2, &[7, 8, 9], 0, &mut out);
        assert_eq!(out, vec![1, 4, 7, 2, 5, 8, 3, 6, 9]);

        // planar configuration 1 keeps the planes apart
        let mut out = vec![0u8; info.frame_size()];
        scatter_segment(&info, &parameters, 1, 0, &[1, 2, 3], 0, &mut out);
        scatter_segment(&info, &parameters, 1, 1, &[4, 5, 6], 0, &mut out);
        scatter_segment(&info, &parameters, 1, 2, &[7, 8, 9], 0, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn scatter_orders_sample_bytes_little_endian() {
        let obj = TestDataset {
            rows: 1,
            cols: 2,
            samples_per_pixel: 1,
            bits_allocated: 16,
            planar_configuration: None,
            number_of_frames: None,
            photometric_interpretation: Some("MONOCHROME2"),
        };
        let fragments = PixelSequence::from_fragments(vec![vec![0; 8]]);
        let info = ImageInfo::from_dataset(&obj, &fragments).unwrap();

        // segment 0 carries the most significant bytes
        let mut out = vec![0u8; info.frame_size()];
        let parameters = CodecParameters::default();
        scatter_segment(&info, &parameters, 0, 0, &[0x12, 0x34], 0, &mut out);
        scatter_segment(&info, &parameters, 0, 1, &[0xAB, 0xCD], 0, &mut out);
        assert_eq!(out, vec![0xAB, 0x12, 0xCD, 0x34]);

        // the compatibility flag reverses the segment order assumption
        let mut out = vec![0u8; info.frame_size()];
        let parameters = CodecParameters {
            reverse_decompression_byte_order: true,
            ..CodecParameters::default()
        };
        scatter_segment(&info, &parameters, 0, 0, &[0x12, 0x34], 0, &mut out);
        scatter_segment(&info, &parameters, 0, 1, &[0xAB, 0xCD], 0, &mut out);
        assert_eq!(out, vec![0x12, 0xAB, 0x34, 0xCD]);
    }

    #[test]
    fn scatter_pads_short_segments() {
        let info = ImageInfo::from_dataset(
            &monochrome(2, 2),
            &PixelSequence::from_fragments(vec![vec![0; 8]]),
        )
        .unwrap();
        let parameters = CodecParameters::default();
        let mut out = vec![0u8; info.frame_size()];
        scatter_segment(&info, &parameters, 0, 0, &[7, 9], 9, &mut out);
        assert_eq!(out, vec![7, 9, 9, 9]);
    }
}
