//! Data model and codec contracts for encapsulated DICOM pixel data.
//!
//! A compressed pixel data element carries its value as a sequence of
//! length-prefixed binary *fragments*, optionally preceded by a basic
//! offset table. This crate hosts the pieces shared by every consumer
//! and implementer of such data:
//!
//! - [`fragments`]: the [`PixelSequence`] and [`PixelItem`] containers,
//!   including support for fragments backed by not-yet-loaded storage;
//! - [`transfer_syntax`]: a transfer syntax descriptor reduced to the
//!   properties relevant for pixel data (identity, byte order,
//!   encapsulation);
//! - [`parameters`]: the codec parameter surface which identifies a
//!   pixel data representation together with its transfer syntax;
//! - [`adapters`]: the [`PixelCodec`] plugin contract and its error
//!   taxonomy.
//!
//! Codec implementations live in the `dicom-pixel-codecs` crate.
//!
//! [`PixelSequence`]: crate::fragments::PixelSequence
//! [`PixelItem`]: crate::fragments::PixelItem
//! [`PixelCodec`]: crate::adapters::PixelCodec

pub mod adapters;
pub mod fragments;
pub mod parameters;
pub mod transfer_syntax;

pub use adapters::{
    DatasetContext, DecodeError, DecodeProperties, DecodeResult, FrameDecodeOutcome, ImageDataset,
    PixelCodec,
};
pub use fragments::{FragmentSource, PixelItem, PixelSequence};
pub use parameters::CodecParameters;
pub use transfer_syntax::TransferSyntax;

// re-exported so that codec implementers can use the same version of
// these crates without adding independent dependencies
pub use byteordered;
pub use snafu;

/// The type of collection used throughout this crate
/// for fragment lists and offset tables.
pub type C<T> = smallvec::SmallVec<[T; 2]>;
