//! Core module for building pixel data codecs.
//!
//! This module contains the types and traits shared by
//! consumers and implementers of encapsulated pixel data encodings.
//!
//! A codec receives the fragments of one representation,
//! an [`ImageDataset`] view over the attributes of the enclosing
//! data set, and a parameter set,
//! and produces native pixel data plus a description of the
//! attribute values which apply to the decoded output.

use crate::fragments::PixelSequence;
use crate::parameters::CodecParameters;
use crate::transfer_syntax::TransferSyntax;
use snafu::Snafu;

/// The possible error conditions when decoding (reading) pixel data.
///
/// Users of this type are free to handle errors based on their
/// variant, but should not make decisions based on the display
/// message, since that is not considered part of the API
/// and may change on any new release.
///
/// Implementers of codecs are recommended to choose the most fitting
/// error variant for the tested condition.
/// When no suitable variant is available,
/// the [`Custom`](DecodeError::Custom) variant may be used.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub), module)]
pub enum DecodeError {
    /// A custom error occurred when decoding,
    /// reported as a dynamic error value with a message.
    ///
    /// The [`whatever!`](snafu::whatever) macro can be used
    /// to easily create an error of this kind.
    #[snafu(whatever, display("{}", message))]
    Custom {
        /// The error message.
        message: String,
        /// The underlying error cause, if any.
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The operation was misused by the caller:
    /// a buffer of the wrong size, or calls in the wrong order.
    #[snafu(display("Illegal call: {}", reason))]
    IllegalCall { reason: &'static str },

    /// The context object is not a container
    /// which the codec can operate on.
    InvalidTag,

    /// The codec-specific framing of the compressed data is
    /// malformed: a bad segment count, inconsistent offsets,
    /// or an undecodable marker stream.
    #[snafu(display("Cannot change representation: {}", reason))]
    CannotChangeRepresentation { reason: &'static str },

    /// A fragment's byte payload is absent or could not be read.
    #[snafu(display("Corrupted pixel data fragment #{}", fragment))]
    CorruptedData {
        /// The index of the affected data fragment.
        fragment: usize,
        /// The underlying read error.
        source: std::io::Error,
    },

    /// An allocation for decoded pixel data failed.
    #[snafu(display("Not enough memory for decoded pixel data"))]
    MemoryExhausted {
        source: std::collections::TryReserveError,
    },

    /// The requested representation neither exists
    /// nor can be derived from an existing one.
    RepresentationNotFound,

    /// A required attribute is missing
    /// from the data set describing the image.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute { name: &'static str },

    /// A required attribute is present but holds no usable value.
    #[snafu(display("Missing value for attribute `{}`", name))]
    MissingValue { name: &'static str },

    /// The requested frame range is outside
    /// the given object's frame range.
    FrameRangeOutOfBounds,
}

/// The result of decoding (reading) pixel data.
pub type DecodeResult<T, E = DecodeError> = Result<T, E>;

/// Where the pixel data element lives within the DICOM object.
///
/// UID regeneration policies only apply at the main data set level,
/// never to pixel data nested inside a sequence item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DatasetContext {
    /// The pixel data element of the main data set.
    MainDataset,
    /// A pixel data element inside a nested sequence item.
    NestedItem,
}

/// A view over the data set attributes which describe an image,
/// as consumed by pixel data codecs.
///
/// This trait is the boundary to the element tree:
/// codecs never search or mutate data set elements themselves,
/// they read the listed attributes through this capability
/// and report attribute updates through [`DecodeProperties`].
pub trait ImageDataset {
    /// Return the _Rows_, or `None` if it is not found.
    fn rows(&self) -> Option<u16>;

    /// Return the _Columns_, or `None` if it is not found.
    fn cols(&self) -> Option<u16>;

    /// Return the _Samples Per Pixel_, or `None` if it is not found.
    fn samples_per_pixel(&self) -> Option<u16>;

    /// Return the _Bits Allocated_, or `None` if it is not defined.
    fn bits_allocated(&self) -> Option<u16>;

    /// Return the _Pixel Representation_,
    /// or `None` if it is not defined.
    fn pixel_representation(&self) -> Option<u16>;

    /// Return the _Planar Configuration_,
    /// or `None` if it is not defined.
    fn planar_configuration(&self) -> Option<u16>;

    /// Return the _Number Of Frames_, or `None` if it is not defined.
    fn number_of_frames(&self) -> Option<u32>;

    /// Return the _Photometric Interpretation_,
    /// or `None` if it is not found.
    fn photometric_interpretation(&self) -> Option<&str>;

    /// Return the _SOP Instance UID_, or `None` if it is not found.
    fn sop_instance_uid(&self) -> Option<&str> {
        None
    }
}

/// Attribute values which apply to the data set
/// after a whole-attribute decode.
///
/// Decoding never mutates the data set as a side effect;
/// the caller applies these values to the respective attributes
/// when adopting the decoded pixel data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeProperties {
    /// The photometric interpretation of the decoded samples,
    /// which may differ from the one declared by the data set
    /// (subsampled color data becomes full after decoding).
    pub color_model: String,

    /// The planar configuration of the decoded samples.
    pub planar_configuration: u16,

    /// A new SOP Instance UID to assign,
    /// when the codec's UID creation policy requires one.
    pub sop_instance_uid: Option<String>,
}

/// The outcome of decoding a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDecodeOutcome {
    /// Index one past the last fragment consumed by this frame,
    /// to be passed back as the start fragment hint
    /// when frames are decoded in increasing order.
    pub next_fragment: u32,

    /// The photometric interpretation of the decoded samples.
    pub color_model: String,
}

/// Trait for a pixel data codec:
/// the uniform interface each encapsulated format implements
/// to plug into representation management and frame decoding.
///
/// All methods are synchronous and run to completion
/// on the calling thread.
/// Implementations hold no mutable state, so one codec value
/// may serve any number of independent decode operations.
pub trait PixelCodec {
    /// Whether this codec can convert pixel data
    /// from the representation under `from`
    /// to the representation under `to`.
    fn can_convert(&self, from: &TransferSyntax, to: &TransferSyntax) -> bool;

    /// Decode every frame of the given encapsulated pixel data
    /// into native little-endian pixel data,
    /// appending the bytes to `dst`.
    ///
    /// Only when `context` identifies the main data set level
    /// may the returned properties carry a regenerated
    /// SOP Instance UID, subject to the parameter set's
    /// UID creation policy.
    fn decode(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
        context: DatasetContext,
        dst: &mut Vec<u8>,
    ) -> DecodeResult<DecodeProperties>;

    /// Decode exactly one frame (0-based) into the caller-supplied
    /// buffer, which must hold at least one frame's worth of bytes
    /// (fails with [`DecodeError::IllegalCall`] otherwise).
    ///
    /// `start_fragment` is the index of the frame's first fragment
    /// when known, typically taken from a previous outcome's
    /// `next_fragment` during sequential access.
    /// Without it, the codec locates the frame through the offset
    /// table, or by a sequential scan which is only reliable for
    /// strictly increasing frame access.
    fn decode_frame(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
        frame: u32,
        start_fragment: Option<u32>,
        dst: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome>;

    /// Determine the photometric interpretation which decoding
    /// this pixel data would produce.
    ///
    /// This is a cheap query, but implementations may fall back to
    /// decoding frame 0 solely to observe the resulting color model.
    fn decompressed_color_model(
        &self,
        parameters: &CodecParameters,
        fragments: &mut PixelSequence,
        obj: &dyn ImageDataset,
    ) -> DecodeResult<String>;
}

/// Alias type for a dynamically dispatched pixel data codec.
pub type DynPixelCodec = Box<dyn PixelCodec + Send + Sync + 'static>;

/// An uninhabited codec.
///
/// Use this in type positions which require a [`PixelCodec`]
/// when no codec will ever be provided,
/// such as registering a transfer syntax as decode-incapable.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NeverCodec {}

impl PixelCodec for NeverCodec {
    fn can_convert(&self, _from: &TransferSyntax, _to: &TransferSyntax) -> bool {
        match *self {}
    }

    fn decode(
        &self,
        _parameters: &CodecParameters,
        _fragments: &mut PixelSequence,
        _obj: &dyn ImageDataset,
        _context: DatasetContext,
        _dst: &mut Vec<u8>,
    ) -> DecodeResult<DecodeProperties> {
        match *self {}
    }

    fn decode_frame(
        &self,
        _parameters: &CodecParameters,
        _fragments: &mut PixelSequence,
        _obj: &dyn ImageDataset,
        _frame: u32,
        _start_fragment: Option<u32>,
        _dst: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome> {
        match *self {}
    }

    fn decompressed_color_model(
        &self,
        _parameters: &CodecParameters,
        _fragments: &mut PixelSequence,
        _obj: &dyn ImageDataset,
    ) -> DecodeResult<String> {
        match *self {}
    }
}
