//! Generic codec framing for external byte-stream decoder engines.
//!
//! Formats of the JPEG family carry no fragment-level framing of
//! their own: a frame is one marker stream which may span any number
//! of fragments, and only the entropy decoder knows where it ends.
//! [`EngineAdapter`] owns everything around that boundary
//! (frame location, fragment feeding, output geometry,
//! color model reconciliation) and delegates the entropy decoding
//! itself to a [`DecoderEngine`] obtained from an [`EngineFactory`].

use byteordered::byteorder::{BigEndian, ByteOrder};
use dicom_pixel_core::adapters::{
    decode_error, DatasetContext, DecodeProperties, DecodeResult, FrameDecodeOutcome,
    ImageDataset, PixelCodec,
};
use dicom_pixel_core::fragments::PixelSequence;
use dicom_pixel_core::parameters::{
    new_sop_instance_uid, CodecParameters, ColorSpaceConversion, UidCreationPolicy,
};
use dicom_pixel_core::snafu::prelude::*;
use dicom_pixel_core::transfer_syntax::TransferSyntax;
use tracing::{debug, warn};

use crate::frames::{resolve_planar_configuration, ImageInfo};

/// How far a decoder engine got with the input it was given so far.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EngineProgress {
    /// The engine needs more compressed bytes before
    /// the current frame is complete.
    NeedMoreData,
    /// One full frame of samples is ready to be taken.
    FrameComplete,
}

/// An external decoder for one frame's compressed byte stream.
///
/// An engine value decodes exactly one frame and is then discarded;
/// the adapter creates a fresh engine per frame through the factory.
/// Decoded samples are interleaved, one little-endian word per sample.
pub trait DecoderEngine: Send {
    /// Feed the next chunk of compressed bytes.
    fn decode(&mut self, data: &[u8]) -> DecodeResult<EngineProgress>;

    /// Take the decoded frame out of the engine.
    ///
    /// Only meaningful after [`decode`](DecoderEngine::decode)
    /// reported [`EngineProgress::FrameComplete`].
    fn take_frame(&mut self) -> Vec<u8>;

    /// The photometric interpretation of the decoded samples
    /// as observed by the engine.
    fn color_model(&self) -> String;
}

/// A source of [`DecoderEngine`] values for a family
/// of transfer syntaxes.
pub trait EngineFactory: Send + Sync {
    type Engine: DecoderEngine;

    /// Whether engines from this factory decode
    /// the given transfer syntax.
    fn supports(&self, ts: &TransferSyntax) -> bool;

    /// Create an engine for one frame of an image
    /// with the given attributes.
    fn create(&self, info: &ImageInfo) -> DecodeResult<Self::Engine>;
}

/// Pixel data codec over an external decoder engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineAdapter<F> {
    factory: F,
}

impl<F> EngineAdapter<F> {
    pub fn new(factory: F) -> Self {
        EngineAdapter { factory }
    }
}

impl<F> PixelCodec for EngineAdapter<F>
where
    F: EngineFactory,
{
    fn can_convert(&self, from: &TransferSyntax, to: &TransferSyntax) -> bool {
        self.factory.supports(from) && !to.is_encapsulated()
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
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
    ) -> DecodeResult<String> {
        let info = ImageInfo::from_dataset(obj, fragments)?;
        if let Some(model) =
            reconcile_color_model(&info.photometric_interpretation, None, parameters)
        {
            return Ok(model);
        }
        // the declared value alone cannot answer,
        // decode the first frame just to observe the engine's output
        debug!("decoding frame 0 to determine the decompressed color model");
        let mut scratch = vec![0u8; info.frame_size()];
        let outcome =
            self.decode_frame_into(parameters, fragments, &info, 0, None, &mut scratch)?;
        Ok(outcome.color_model)
    }
}

impl<F> EngineAdapter<F>
where
    F: EngineFactory,
{
    fn decode_frame_into(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        info: &ImageInfo,
        frame: u32,
        start_fragment: Option<u32>,
        frame_out: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome> {
        let start = locate_marker_frame(fragments, frame, start_fragment)? as usize;
        let count = fragments.number_of_fragments() as usize;

        {
            let first = fragments.fragment_data(start)?;
            if let Some(precision) = sniff_sample_precision(first) {
                if precision as usize != info.bytes_per_sample * 8 {
                    warn!(
                        "frame {} declares {} bits allocated \
                         but its stream carries {}-bit samples",
                        frame,
                        info.bytes_per_sample * 8,
                        precision
                    );
                }
            }
        }

        let mut engine = self.factory.create(info)?;
        let mut cursor = start;
        loop {
            let data = fragments.fragment_data(cursor)?;
            let progress = engine.decode(data)?;
            cursor += 1;
            match progress {
                EngineProgress::FrameComplete => break,
                EngineProgress::NeedMoreData => {
                    ensure!(
                        cursor < count,
                        decode_error::CannotChangeRepresentationSnafu {
                            reason: "compressed data ended before the frame was complete",
                        }
                    );
                }
            }
        }

        let decoded = engine.take_frame();
        ensure!(
            decoded.len() == frame_out.len(),
            decode_error::CannotChangeRepresentationSnafu {
                reason: "the decoder engine produced a frame of unexpected size",
            }
        );
        if resolve_planar_configuration(info, parameters) == 1 && info.samples_per_pixel > 1 {
            interleaved_to_planar(&decoded, info, frame_out);
        } else {
            frame_out.copy_from_slice(&decoded);
        }

        let color_model =
            reconcile_color_model(&info.photometric_interpretation, Some(&engine.color_model()), parameters)
                .unwrap_or_else(|| engine.color_model());
        Ok(FrameDecodeOutcome {
            next_fragment: cursor as u32,
            color_model,
        })
    }
}

/// Find the first fragment of `frame` for marker-stream formats.
///
/// An explicit start fragment wins, then the basic offset table.
/// Without either, count Start-Of-Image markers at fragment
/// boundaries: the n-th fragment beginning with SOI starts frame n.
/// Only as a last resort assume one fragment per frame.
fn locate_marker_frame(
    fragments: &mut PixelSequence,
    frame: u32,
    start_fragment: Option<u32>,
) -> DecodeResult<u32> {
    let count = fragments.number_of_fragments();
    if let Some(hint) = start_fragment {
        ensure!(hint < count, decode_error::FrameRangeOutOfBoundsSnafu);
        return Ok(hint);
    }
    if let Some(index) = fragments.locate_frame(frame) {
        return Ok(index);
    }

    let mut soi = 0u32;
    for index in 0..count {
        let data = fragments.fragment_data(index as usize)?;
        if data.starts_with(&[0xFF, 0xD8]) {
            if soi == frame {
                debug!("frame {} starts at fragment {} (SOI scan)", frame, index);
                return Ok(index);
            }
            soi += 1;
        }
    }

    ensure!(frame < count, decode_error::FrameRangeOutOfBoundsSnafu);
    Ok(frame)
}

/// Walk a JPEG marker stream for the Start-Of-Frame segment
/// and return its sample precision in bits, if one is found.
///
/// SOF markers are `0xFFC0`..=`0xFFCF` except `C4`, `C8` and `CC`;
/// every non-standalone segment carries a big-endian 16-bit length
/// which includes its own two bytes.
pub(crate) fn sniff_sample_precision(data: &[u8]) -> Option<u8> {
    let mut pos = 0;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        match marker {
            // fill byte
            0xFF => {
                pos += 1;
                continue;
            }
            // SOI, TEM, RSTn: standalone, no length
            0xD8 | 0x01 | 0xD0..=0xD7 => {
                pos += 2;
                continue;
            }
            // EOI or entropy-coded data reached without a SOF
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                // precision is the first byte of the SOF payload
                return data.get(pos + 4).copied();
            }
            _ => {
                if pos + 3 >= data.len() {
                    return None;
                }
                let length = BigEndian::read_u16(&data[pos + 2..pos + 4]) as usize;
                if length < 2 {
                    return None;
                }
                pos += 2 + length;
            }
        }
    }
    None
}

/// Reconcile the color model of the decoded output
/// from the declared photometric interpretation.
///
/// Returns `None` when the declared value alone cannot answer
/// and the engine's observation (if absent) is required.
fn reconcile_color_model(
    declared: &str,
    observed: Option<&str>,
    parameters: &CodecParameters,
) -> Option<String> {
    let convert = match parameters.color_space_conversion {
        ColorSpaceConversion::Never => false,
        ColorSpaceConversion::Default | ColorSpaceConversion::Always => true,
    };
    match declared {
        // chroma subsampling cannot survive decoding
        "YBR_FULL_422" | "YBR_PARTIAL_422" | "YBR_PARTIAL_420" => {
            if convert {
                Some("RGB".to_string())
            } else {
                Some("YBR_FULL".to_string())
            }
        }
        "YBR_FULL" if convert && parameters.color_space_conversion == ColorSpaceConversion::Always => {
            Some("RGB".to_string())
        }
        "MONOCHROME1" | "MONOCHROME2" | "RGB" | "YBR_FULL" | "PALETTE COLOR" => {
            Some(declared.to_string())
        }
        _ => observed.map(|m| m.to_string()),
    }
}

/// Rearrange one interleaved frame into color-by-plane order.
fn interleaved_to_planar(decoded: &[u8], info: &ImageInfo, frame_out: &mut [u8]) {
    let bps = info.bytes_per_sample;
    let spp = info.samples_per_pixel;
    let pixels = info.stripe_size();
    for pixel in 0..pixels {
        for sample in 0..spp {
            let src = (pixel * spp + sample) * bps;
            let dst = (sample * pixels + pixel) * bps;
            frame_out[dst..dst + bps].copy_from_slice(&decoded[src..src + bps]);
        }
    }
}
