//! Support for RLE Lossless image decoding.
//!
//! See DICOM PS3.5 Annex G for the encoding:
//! each frame carries a 64-byte header of up to 15 little-endian
//! segment offsets, followed by one RLE-compressed byte plane
//! ("segment") per sample byte. A frame may span several fragments,
//! so segments are pulled from the fragment sequence one piece
//! at a time and fed to the suspendable [`RleDecoder`].

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicom_pixel_core::adapters::{
    decode_error, DatasetContext, DecodeProperties, DecodeResult, FrameDecodeOutcome,
    ImageDataset, PixelCodec,
};
use dicom_pixel_core::fragments::PixelSequence;
use dicom_pixel_core::parameters::{new_sop_instance_uid, CodecParameters, UidCreationPolicy};
use dicom_pixel_core::snafu::prelude::*;
use dicom_pixel_core::transfer_syntax::{entries, TransferSyntax};
use tracing::warn;

use crate::frames::{locate_frame, resolve_planar_configuration, scatter_segment, ImageInfo};
use crate::rle::{DecompressStatus, RleDecoder};

/// Size of the RLE header at the start of each frame.
const HEADER_SIZE: usize = 64;

/// Pixel data codec for the RLE Lossless transfer syntax
/// (UID `1.2.840.10008.1.2.5`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RleLosslessAdapter;

impl PixelCodec for RleLosslessAdapter {
    /// RLE Lossless can only be decoded into native pixel data,
    /// never transcoded to another encapsulated syntax.
    fn can_convert(&self, from: &TransferSyntax, to: &TransferSyntax) -> bool {
        *from == entries::RLE_LOSSLESS && !to.is_encapsulated()
    }

    fn decode(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
        context: DatasetContext,
        dst: &mut Vec<u8>,
    ) -> DecodeResult<DecodeProperties> {
        let info = ImageInfo::from_dataset(obj, fragments)?;
        let frame_size = info.frame_size();
        let total = frame_size * info.number_of_frames;

        let base = dst.len();
        dst.try_reserve(total)
            .context(decode_error::MemoryExhaustedSnafu)?;
        dst.resize(base + total, 0);

        let mut color_model = info.photometric_interpretation.clone();
        let mut start_fragment = None;
        for frame in 0..info.number_of_frames {
            let out = frame_size * frame;
            let outcome = self.decode_frame_into(
                parameters,
                fragments,
                &info,
                frame as u32,
                start_fragment,
                &mut dst[base + out..base + out + frame_size],
            )?;
            // consecutive frames continue at the next fragment
            start_fragment = Some(outcome.next_fragment);
            color_model = outcome.color_model;
        }

        let sop_instance_uid = if context == DatasetContext::MainDataset
            && parameters.uid_creation == UidCreationPolicy::Always
        {
            Some(new_sop_instance_uid())
        } else {
            None
        };

        Ok(DecodeProperties {
            color_model,
            planar_configuration: resolve_planar_configuration(&info, parameters),
            sop_instance_uid,
        })
    }

    fn decode_frame(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
        frame: u32,
        start_fragment: Option<u32>,
        dst: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome> {
        let info = ImageInfo::from_dataset(obj, fragments)?;
        ensure!(
            (frame as usize) < info.number_of_frames,
            decode_error::FrameRangeOutOfBoundsSnafu
        );
        let frame_size = info.frame_size();
        ensure!(
            dst.len() >= frame_size,
            decode_error::IllegalCallSnafu {
                reason: "output buffer is too small for one frame",
            }
        );
        self.decode_frame_into(
            parameters,
            fragments,
            &info,
            frame,
            start_fragment,
            &mut dst[..frame_size],
        )
    }

    fn decompressed_color_model(
        &self,
        _parameters: &CodecParameters,
        _fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
    ) -> DecodeResult<String> {
        // RLE is a bit-exact recompression of the sample planes,
        // the color model comes out as it went in
        let pi = obj
            .photometric_interpretation()
            .context(decode_error::MissingAttributeSnafu {
                name: "PhotometricInterpretation",
            })?
            .trim()
            .to_string();
        ensure!(
            !pi.is_empty(),
            decode_error::MissingValueSnafu {
                name: "PhotometricInterpretation",
            }
        );
        Ok(pi)
    }
}

impl RleLosslessAdapter {
    /// Decode one frame into a buffer of exactly one frame's size.
    fn decode_frame_into(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        info: &ImageInfo,
        frame: u32,
        start_fragment: Option<u32>,
        frame_out: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome> {
        let start = locate_frame(fragments, frame, start_fragment)? as usize;
        let stripe = info.stripe_size();
        let planar_configuration = resolve_planar_configuration(info, parameters);

        let offsets = read_rle_header(fragments, start, info)?;
        let segment_count = offsets.len();

        // `cursor` is the fragment currently being read and
        // `fragment_base` the frame-relative byte offset of its start,
        // i.e. the cumulative length of the fragments consumed before it
        let mut cursor = start;
        let mut fragment_base: u64 = 0;
        let mut decoder = RleDecoder::new(stripe);

        for segment in 0..segment_count {
            decoder.reset();
            let segment_start = u64::from(offsets[segment]);
            let segment_end = offsets.get(segment + 1).map(|&o| u64::from(o));

            // advance to the fragment containing the segment start
            loop {
                let len = fragments.fragment_len(cursor).context(
                    decode_error::CannotChangeRepresentationSnafu {
                        reason: "segment offset points past the compressed data",
                    },
                )?;
                if segment_start < fragment_base + len {
                    break;
                }
                fragment_base += len;
                cursor += 1;
            }

            // feed the decoder fragment by fragment
            loop {
                let data = fragments.fragment_data(cursor)?;
                let len = data.len() as u64;
                let begin = segment_start.saturating_sub(fragment_base) as usize;
                let end = match segment_end {
                    Some(e) => e.saturating_sub(fragment_base).min(len) as usize,
                    None => len as usize,
                };
                let status = decoder.decompress(&data[begin..end]);

                match segment_end {
                    Some(e) => {
                        ensure!(
                            status != DecompressStatus::Overflow,
                            decode_error::CannotChangeRepresentationSnafu {
                                reason: "RLE segment produced too many bytes",
                            }
                        );
                        if fragment_base + len >= e {
                            // the whole declared span was consumed
                            break;
                        }
                    }
                    None => {
                        // the last segment has no declared end:
                        // stop as soon as the stripe is filled
                        if decoder.written() >= stripe {
                            break;
                        }
                    }
                }

                if cursor + 1 >= fragments.number_of_fragments() as usize {
                    break;
                }
                fragment_base += len;
                cursor += 1;
            }

            let pad = if decoder.written() < stripe {
                if segment + 1 < segment_count {
                    // only the last segment may come up short
                    return decode_error::CannotChangeRepresentationSnafu {
                        reason: "RLE segment produced too few bytes",
                    }
                    .fail();
                }
                warn!(
                    "RLE segment {} of frame {} produced {} of {} bytes, \
                     padding with the last decoded byte",
                    segment,
                    frame,
                    decoder.written(),
                    stripe
                );
                decoder.output().last().copied().unwrap_or(0)
            } else {
                0
            };

            scatter_segment(
                info,
                parameters,
                planar_configuration,
                segment,
                decoder.output(),
                pad,
                frame_out,
            );
        }

        Ok(FrameDecodeOutcome {
            next_fragment: (cursor + 1) as u32,
            color_model: info.photometric_interpretation.clone(),
        })
    }
}

/// Parse and validate the 64-byte RLE header of a frame,
/// returning the frame-relative start offset of each segment.
fn read_rle_header(
    fragments: &mut PixelSequence,
    start: usize,
    info: &ImageInfo,
) -> DecodeResult<Vec<u32>> {
    let first = fragments.fragment_data(start)?;
    ensure!(
        first.len() >= HEADER_SIZE,
        decode_error::CannotChangeRepresentationSnafu {
            reason: "first fragment is shorter than the RLE header",
        }
    );
    let segment_count = LittleEndian::read_u32(&first[0..4]) as usize;
    ensure!(
        (1..=15).contains(&segment_count),
        decode_error::CannotChangeRepresentationSnafu {
            reason: "RLE segment count out of range",
        }
    );
    ensure!(
        segment_count == info.bytes_per_sample * info.samples_per_pixel,
        decode_error::CannotChangeRepresentationSnafu {
            reason: "RLE segment count does not match the sample layout",
        }
    );

    let mut offsets = vec![0u32; segment_count];
    LittleEndian::read_u32_into(&first[4..4 + 4 * segment_count], &mut offsets);
    let consistent = offsets[0] as usize >= HEADER_SIZE
        && offsets.windows(2).all(|pair| pair[0] < pair[1]);
    ensure!(
        consistent,
        decode_error::CannotChangeRepresentationSnafu {
            reason: "inconsistent RLE segment offsets",
        }
    );
    Ok(offsets)
}
