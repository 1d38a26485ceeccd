//! Pixel data codec implementations and representation management.
//!
//! This crate provides the concrete machinery for working with
//! encapsulated pixel data on top of the contracts
//! in [`dicom_pixel_core`]:
//!
//! - [`RleLosslessAdapter`](adapters::RleLosslessAdapter),
//!   a decoder for the DICOM RLE Lossless transfer syntax;
//! - [`EngineAdapter`](adapters::EngineAdapter), the framing logic
//!   for formats decoded by an external byte-stream engine
//!   (the JPEG family);
//! - [`PixelAttribute`](attribute::PixelAttribute), which tracks
//!   the representations of one pixel data element and
//!   switches between them on demand;
//! - [`CodecRegistry`], a lookup of codecs by transfer syntax UID.
//!
//! # Example
//!
//! Decode the pixel data of an object read under RLE Lossless:
//!
//! ```no_run
//! # use dicom_pixel_codecs::attribute::{PixelAttribute, VR};
//! # use dicom_pixel_codecs::get_registry;
//! # use dicom_pixel_core::adapters::DatasetContext;
//! # use dicom_pixel_core::fragments::PixelSequence;
//! # use dicom_pixel_core::transfer_syntax::entries;
//! # fn run(obj: &dyn dicom_pixel_core::adapters::ImageDataset, fragments: PixelSequence)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! let mut attribute = PixelAttribute::new(VR::OW);
//! attribute.put_original_representation(entries::RLE_LOSSLESS, None, fragments);
//!
//! let properties = attribute.choose_representation(
//!     get_registry(),
//!     &entries::EXPLICIT_VR_LITTLE_ENDIAN,
//!     None,
//!     obj,
//!     DatasetContext::MainDataset,
//! )?;
//! # let _ = properties;
//! # Ok(())
//! # }
//! ```
#![warn(missing_debug_implementations)]

use std::collections::HashMap;
use std::fmt;

use dicom_pixel_core::adapters::{DynPixelCodec, PixelCodec};
use lazy_static::lazy_static;

pub mod adapters;
pub mod attribute;
pub mod frames;
pub mod rle;

#[cfg(test)]
pub(crate) mod testdata;

pub use crate::adapters::{EngineAdapter, RleLosslessAdapter};
pub use crate::attribute::{PixelAttribute, Representation, VR};
pub use crate::frames::ImageInfo;
pub use crate::rle::{DecompressStatus, RleDecoder};

/// A lookup of pixel data codecs keyed by transfer syntax UID.
///
/// [`CodecRegistry::new`] comes with the built-in codecs;
/// applications embedding external decoder engines register their
/// [`EngineAdapter`]s on top.
pub struct CodecRegistry {
    codecs: HashMap<&'static str, DynPixelCodec>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut uids: Vec<_> = self.codecs.keys().collect();
        uids.sort();
        f.debug_struct("CodecRegistry").field("uids", &uids).finish()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        CodecRegistry::new()
    }
}

impl CodecRegistry {
    /// Create a registry holding the built-in codecs.
    pub fn new() -> Self {
        let mut codecs: HashMap<&'static str, DynPixelCodec> = HashMap::new();
        codecs.insert(
            dicom_pixel_core::transfer_syntax::entries::RLE_LOSSLESS.uid(),
            Box::new(RleLosslessAdapter),
        );
        CodecRegistry { codecs }
    }

    /// Register a codec under the given transfer syntax UID,
    /// replacing any previous codec under the same UID.
    pub fn register(
        &mut self,
        uid: &'static str,
        codec: impl PixelCodec + Send + Sync + 'static,
    ) {
        self.codecs.insert(uid, Box::new(codec));
    }

    /// Obtain the codec registered under the given transfer syntax
    /// UID, tolerating trailing padding in the key.
    pub fn get<U>(&self, uid: U) -> Option<&DynPixelCodec>
    where
        U: AsRef<str>,
    {
        let uid = uid.as_ref().trim_end_matches(|c| c == ' ' || c == '\0');
        self.codecs.get(uid)
    }

    /// The UIDs with a registered codec, in no particular order.
    pub fn uids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codecs.keys().copied()
    }
}

lazy_static! {
    static ref REGISTRY: CodecRegistry = CodecRegistry::new();
}

/// Obtain the shared registry of built-in codecs.
pub fn get_registry() -> &'static CodecRegistry {
    &REGISTRY
}
