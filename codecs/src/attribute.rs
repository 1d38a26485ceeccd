//! Representation management for one pixel data attribute.
//!
//! A [`PixelAttribute`] owns every representation of the same
//! pixel data value: the encapsulated representation it was read with,
//! the native (uncompressed) bytes once they are decoded,
//! and the notion of which representation is *current*.
//! Switching representations never discards the original bytes,
//! so a data set can always be written back exactly as it was read.

use dicom_pixel_core::adapters::{
    decode_error, DatasetContext, DecodeProperties, DecodeResult, FrameDecodeOutcome,
    ImageDataset,
};
use dicom_pixel_core::fragments::PixelSequence;
use dicom_pixel_core::parameters::{parameters_eq, CodecParameters};
use dicom_pixel_core::snafu::prelude::*;
use dicom_pixel_core::transfer_syntax::TransferSyntax;
use tracing::debug;

use crate::CodecRegistry;

/// The value representation under which the pixel data element
/// is encoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VR {
    /// Other Byte: encapsulated data, or native 8-bit samples.
    OB,
    /// Other Word: native 16-bit samples.
    OW,
}

/// One encapsulated representation of a pixel attribute:
/// a transfer syntax, the codec parameters it was produced with,
/// and the fragments carrying its bytes.
///
/// Two representations are the same when their transfer syntaxes
/// and parameter sets are equal; fragment contents do not
/// participate in identity.
#[derive(Debug)]
pub struct Representation {
    syntax: TransferSyntax,
    parameters: Option<CodecParameters>,
    fragments: PixelSequence,
}

impl Representation {
    pub fn new(
        syntax: TransferSyntax,
        parameters: Option<CodecParameters>,
        fragments: PixelSequence,
    ) -> Self {
        Representation {
            syntax,
            parameters,
            fragments,
        }
    }

    pub fn syntax(&self) -> &TransferSyntax {
        &self.syntax
    }

    pub fn parameters(&self) -> Option<&CodecParameters> {
        self.parameters.as_ref()
    }

    pub fn fragments(&self) -> &PixelSequence {
        &self.fragments
    }

    /// Whether this representation matches the given identity,
    /// absent parameters standing for the default parameter set.
    pub fn matches(&self, syntax: &TransferSyntax, parameters: Option<&CodecParameters>) -> bool {
        self.syntax == *syntax && parameters_eq(self.parameters.as_ref(), parameters)
    }
}

/// Which representation is active.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Selected {
    /// The implicit native (uncompressed) representation.
    Native,
    /// The encapsulated representation at this index.
    Encapsulated(usize),
}

/// A borrowed view of the current representation.
#[derive(Debug)]
pub enum CurrentRepresentation<'a> {
    /// Native little-endian pixel data.
    Native(&'a [u8]),
    /// An encapsulated representation.
    Encapsulated(&'a Representation),
}

/// The single pixel data element of a data set,
/// tracking every representation of its value.
///
/// There is at most one representation per distinct
/// (transfer syntax, parameters) pair,
/// and the native bytes form a single implicit representation
/// regardless of the sample word size.
#[derive(Debug)]
pub struct PixelAttribute {
    representations: Vec<Representation>,
    native: Option<Vec<u8>>,
    /// Index of the original encapsulated representation;
    /// `None` when the attribute was created from native data.
    original: Option<usize>,
    current: Option<Selected>,
    /// The VR the element takes when the current representation
    /// is the native one.
    unencapsulated_vr: VR,
    /// Force plain encoding on write
    /// even under an encapsulated transfer syntax.
    always_unencapsulated: bool,
    vr: VR,
}

impl PixelAttribute {
    /// Create an empty pixel attribute.
    ///
    /// `unencapsulated_vr` is the VR the element takes
    /// in its native form, OW for 16-bit samples.
    pub fn new(unencapsulated_vr: VR) -> Self {
        PixelAttribute {
            representations: Vec::new(),
            native: None,
            original: None,
            current: None,
            unencapsulated_vr,
            always_unencapsulated: false,
            vr: unencapsulated_vr,
        }
    }

    /// Attach native pixel data read directly from a data set,
    /// making the native representation original and current.
    ///
    /// `read_syntax` is the transfer syntax the data set was read
    /// under; native pixel data under an encapsulated syntax pins
    /// the attribute to plain encoding on write.
    pub fn put_native_data(&mut self, data: Vec<u8>, read_syntax: &TransferSyntax) {
        self.representations.clear();
        self.native = Some(data);
        self.original = None;
        self.current = Some(Selected::Native);
        self.always_unencapsulated = read_syntax.is_encapsulated();
        self.update_vr();
    }

    /// Attach an encapsulated representation read from a data set,
    /// replacing all existing representations.
    /// It becomes both the original and the current representation.
    pub fn put_original_representation(
        &mut self,
        syntax: TransferSyntax,
        parameters: Option<CodecParameters>,
        fragments: PixelSequence,
    ) {
        self.representations.clear();
        self.native = None;
        self.representations
            .push(Representation::new(syntax, parameters, fragments));
        self.original = Some(0);
        self.current = Some(Selected::Encapsulated(0));
        self.always_unencapsulated = false;
        self.update_vr();
    }

    /// Whether a representation under the given identity exists,
    /// the native one answering for any unencapsulated syntax.
    pub fn has_representation(
        &self,
        syntax: &TransferSyntax,
        parameters: Option<&CodecParameters>,
    ) -> bool {
        if !syntax.is_encapsulated() {
            return self.native.is_some();
        }
        self.representations
            .iter()
            .any(|r| r.matches(syntax, parameters))
    }

    /// Make the representation under the given identity current,
    /// synthesizing it first if it does not exist yet.
    ///
    /// Only decoding is available for synthesis:
    /// an unencapsulated target is produced by decoding the original
    /// (or current) encapsulated representation through the registry.
    /// An encapsulated target which does not already exist
    /// fails with `DecodeError::RepresentationNotFound`.
    ///
    /// Returns the decode properties when a decode took place,
    /// so the caller can apply them to the data set.
    pub fn choose_representation(
        &mut self,
        registry: &CodecRegistry,
        syntax: &TransferSyntax,
        parameters: Option<&CodecParameters>,
        obj: &dyn ImageDataset,
        context: DatasetContext,
    ) -> DecodeResult<Option<DecodeProperties>> {
        if !syntax.is_encapsulated() {
            if self.native.is_some() {
                self.current = Some(Selected::Native);
                self.update_vr();
                return Ok(None);
            }
            let source = self
                .original
                .or(match self.current {
                    Some(Selected::Encapsulated(i)) => Some(i),
                    _ => None,
                })
                .context(decode_error::RepresentationNotFoundSnafu)?;
            let properties = self.decode_native(registry, source, syntax, parameters, obj, context)?;
            self.current = Some(Selected::Native);
            self.update_vr();
            return Ok(Some(properties));
        }

        match self
            .representations
            .iter()
            .position(|r| r.matches(syntax, parameters))
        {
            Some(index) => {
                self.current = Some(Selected::Encapsulated(index));
                self.update_vr();
                Ok(None)
            }
            // encoding paths are not available,
            // a missing encapsulated representation cannot be derived
            None => decode_error::RepresentationNotFoundSnafu.fail(),
        }
    }

    fn decode_native(
        &mut self,
        registry: &CodecRegistry,
        source: usize,
        target: &TransferSyntax,
        parameters: Option<&CodecParameters>,
        obj: &dyn ImageDataset,
        context: DatasetContext,
    ) -> DecodeResult<DecodeProperties> {
        let rep = &mut self.representations[source];
        let codec = registry
            .get(rep.syntax.uid())
            .context(decode_error::RepresentationNotFoundSnafu)?;
        ensure!(
            codec.can_convert(&rep.syntax, target),
            decode_error::RepresentationNotFoundSnafu
        );
        debug!(
            "decoding pixel data from {} to its native form",
            rep.syntax.name()
        );
        let parameters = parameters
            .cloned()
            .or_else(|| rep.parameters.clone())
            .unwrap_or_default();
        let mut native = Vec::new();
        let properties = codec.decode(&parameters, &mut rep.fragments, obj, context, &mut native)?;
        self.native = Some(native);
        Ok(properties)
    }

    /// Decode one frame (0-based) of the current encapsulated
    /// representation into a caller-supplied buffer.
    ///
    /// Fails with `DecodeError::IllegalCall` when the current
    /// representation is the native one.
    pub fn decode_frame(
        &mut self,
        registry: &CodecRegistry,
        obj: &dyn ImageDataset,
        frame: u32,
        start_fragment: Option<u32>,
        dst: &mut [u8],
    ) -> DecodeResult<FrameDecodeOutcome> {
        let index = match self.current {
            Some(Selected::Encapsulated(index)) => index,
            _ => {
                return decode_error::IllegalCallSnafu {
                    reason: "the current representation is not encapsulated",
                }
                .fail()
            }
        };
        let rep = &mut self.representations[index];
        let codec = registry
            .get(rep.syntax.uid())
            .context(decode_error::RepresentationNotFoundSnafu)?;
        let parameters = rep.parameters.clone().unwrap_or_default();
        codec.decode_frame(&parameters, &mut rep.fragments, obj, frame, start_fragment, dst)
    }

    /// Drop the representation under the given identity.
    ///
    /// Fails with `DecodeError::IllegalCall` if it is the original
    /// representation; originals are only replaced through
    /// [`remove_original_representation`](Self::remove_original_representation).
    /// If the removed representation was current,
    /// the original becomes current again.
    pub fn remove_representation(
        &mut self,
        syntax: &TransferSyntax,
        parameters: Option<&CodecParameters>,
    ) -> DecodeResult<()> {
        let index = self
            .representations
            .iter()
            .position(|r| r.matches(syntax, parameters))
            .context(decode_error::RepresentationNotFoundSnafu)?;
        ensure!(
            self.original != Some(index),
            decode_error::IllegalCallSnafu {
                reason: "cannot remove the original representation",
            }
        );
        self.representations.remove(index);
        self.original = self.original.map(|o| if o > index { o - 1 } else { o });
        self.current = match self.current {
            Some(Selected::Encapsulated(c)) if c == index => self
                .original
                .map(Selected::Encapsulated)
                .or(self.native.as_ref().map(|_| Selected::Native)),
            Some(Selected::Encapsulated(c)) if c > index => {
                Some(Selected::Encapsulated(c - 1))
            }
            other => other,
        };
        self.update_vr();
        Ok(())
    }

    /// Drop the original encapsulated representation,
    /// promoting a successor in its place:
    /// the current representation when it is a different one,
    /// or the native data.
    ///
    /// Fails with `DecodeError::RepresentationNotFound` and leaves
    /// the attribute unchanged when no successor exists.
    pub fn remove_original_representation(&mut self) -> DecodeResult<()> {
        let index = self.original.context(decode_error::IllegalCallSnafu {
            reason: "there is no original encapsulated representation",
        })?;
        let successor = match self.current {
            Some(Selected::Encapsulated(c)) if c != index => Some(Selected::Encapsulated(c)),
            _ if self.native.is_some() => Some(Selected::Native),
            Some(Selected::Encapsulated(_)) | None => None,
            Some(Selected::Native) => None,
        };
        let successor = successor.context(decode_error::RepresentationNotFoundSnafu)?;

        self.representations.remove(index);
        match successor {
            Selected::Native => {
                self.original = None;
                self.current = Some(Selected::Native);
            }
            Selected::Encapsulated(c) => {
                let c = if c > index { c - 1 } else { c };
                self.original = Some(c);
                self.current = Some(Selected::Encapsulated(c));
            }
        }
        self.update_vr();
        Ok(())
    }

    /// Drop every encapsulated representation except the original.
    /// The native data is kept.
    pub fn remove_all_but_original(&mut self) {
        if let Some(index) = self.original {
            self.representations.swap(0, index);
            self.representations.truncate(1);
            self.original = Some(0);
            self.current = match self.current {
                Some(Selected::Encapsulated(c)) if c == index => {
                    Some(Selected::Encapsulated(0))
                }
                Some(Selected::Native) if self.native.is_some() => Some(Selected::Native),
                Some(_) => Some(Selected::Encapsulated(0)),
                None => None,
            };
        } else {
            self.representations.clear();
            self.current = self.native.as_ref().map(|_| Selected::Native);
        }
        self.update_vr();
    }

    /// Drop every representation except the current one,
    /// which also becomes the original.
    /// Used to shed memory after a one-time full decode.
    pub fn remove_all_but_current(&mut self) {
        match self.current {
            Some(Selected::Native) => {
                self.representations.clear();
                self.original = None;
            }
            Some(Selected::Encapsulated(index)) => {
                self.representations.swap(0, index);
                self.representations.truncate(1);
                self.native = None;
                self.original = Some(0);
                self.current = Some(Selected::Encapsulated(0));
            }
            None => {
                self.representations.clear();
                self.native = None;
                self.original = None;
            }
        }
        self.update_vr();
    }

    /// The current representation, if any.
    pub fn current(&self) -> Option<CurrentRepresentation<'_>> {
        match self.current? {
            Selected::Native => self
                .native
                .as_deref()
                .map(CurrentRepresentation::Native),
            Selected::Encapsulated(index) => self
                .representations
                .get(index)
                .map(CurrentRepresentation::Encapsulated),
        }
    }

    /// The VR under which the element currently reads.
    pub fn vr(&self) -> VR {
        self.vr
    }

    /// Whether the attribute is pinned to plain encoding on write.
    pub fn always_unencapsulated(&self) -> bool {
        self.always_unencapsulated
    }

    // recomputed on every representation switch:
    // native reads under the sample word VR,
    // any encapsulated representation reads as Other Byte
    fn update_vr(&mut self) {
        self.vr = match self.current {
            Some(Selected::Native) | None => self.unencapsulated_vr,
            Some(Selected::Encapsulated(_)) => VR::OB,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{monochrome, rle_encode_segment, rle_frame_fragment};
    use dicom_pixel_core::adapters::DecodeError;
    use dicom_pixel_core::parameters::PlanarConfigurationPolicy;
    use dicom_pixel_core::transfer_syntax::entries;

    fn rle_attribute(samples: &[u8]) -> PixelAttribute {
        let fragment = rle_frame_fragment(&[rle_encode_segment(samples)]);
        let mut attr = PixelAttribute::new(VR::OW);
        attr.put_original_representation(
            entries::RLE_LOSSLESS,
            None,
            PixelSequence::from_fragments(vec![fragment]),
        );
        attr
    }

    #[test]
    fn choosing_native_preserves_the_original() {
        let samples: Vec<u8> = (0..16).collect();
        let mut attr = rle_attribute(&samples);
        assert!(attr.has_representation(&entries::RLE_LOSSLESS, None));
        assert_eq!(attr.vr(), VR::OB);

        let registry = CodecRegistry::new();
        let obj = monochrome(4, 4);
        let properties = attr
            .choose_representation(
                &registry,
                &entries::EXPLICIT_VR_LITTLE_ENDIAN,
                None,
                &obj,
                DatasetContext::MainDataset,
            )
            .unwrap()
            .expect("a decode must have taken place");
        assert_eq!(properties.color_model, "MONOCHROME2");

        // the encapsulated original is still there
        assert!(attr.has_representation(&entries::RLE_LOSSLESS, None));
        assert!(attr.has_representation(&entries::EXPLICIT_VR_LITTLE_ENDIAN, None));
        match attr.current() {
            Some(CurrentRepresentation::Native(data)) => assert_eq!(data, &samples[..]),
            other => panic!("expected native current representation, got {:?}", other),
        }
        assert_eq!(attr.vr(), VR::OW);

        // a second switch needs no decode
        let properties = attr
            .choose_representation(
                &registry,
                &entries::IMPLICIT_VR_LITTLE_ENDIAN,
                None,
                &obj,
                DatasetContext::MainDataset,
            )
            .unwrap();
        assert!(properties.is_none());
    }

    #[test]
    fn absent_parameters_match_the_default_set() {
        let attr = rle_attribute(&[1, 2, 3, 4]);
        assert!(attr.has_representation(
            &entries::RLE_LOSSLESS,
            Some(&CodecParameters::default())
        ));
        let other = CodecParameters {
            planar_configuration: PlanarConfigurationPolicy::Planar,
            ..CodecParameters::default()
        };
        assert!(!attr.has_representation(&entries::RLE_LOSSLESS, Some(&other)));
    }

    #[test]
    fn encapsulated_target_cannot_be_synthesized() {
        let mut attr = rle_attribute(&[1, 2, 3, 4]);
        let registry = CodecRegistry::new();
        let obj = monochrome(2, 2);
        let err = attr
            .choose_representation(
                &registry,
                &entries::JPEG_BASELINE,
                None,
                &obj,
                DatasetContext::MainDataset,
            )
            .unwrap_err();
        assert!(matches!(err, DecodeError::RepresentationNotFound));
        // the failed attempt changes nothing
        assert!(matches!(
            attr.current(),
            Some(CurrentRepresentation::Encapsulated(_))
        ));
    }

    #[test]
    fn original_cannot_be_removed_directly() {
        let mut attr = rle_attribute(&[1, 2, 3, 4]);
        let err = attr
            .remove_representation(&entries::RLE_LOSSLESS, None)
            .unwrap_err();
        assert!(matches!(err, DecodeError::IllegalCall { .. }));
        assert!(attr.has_representation(&entries::RLE_LOSSLESS, None));
    }

    #[test]
    fn remove_original_without_successor_fails_unchanged() {
        let mut attr = rle_attribute(&[1, 2, 3, 4]);
        let err = attr.remove_original_representation().unwrap_err();
        assert!(matches!(err, DecodeError::RepresentationNotFound));
        assert!(attr.has_representation(&entries::RLE_LOSSLESS, None));
        assert!(matches!(
            attr.current(),
            Some(CurrentRepresentation::Encapsulated(_))
        ));
        assert_eq!(attr.vr(), VR::OB);
    }

    #[test]
    fn remove_original_promotes_the_native_data() {
        let samples: Vec<u8> = (0..16).collect();
        let mut attr = rle_attribute(&samples);
        let registry = CodecRegistry::new();
        let obj = monochrome(4, 4);
        attr.choose_representation(
            &registry,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            None,
            &obj,
            DatasetContext::MainDataset,
        )
        .unwrap();

        attr.remove_original_representation().unwrap();
        assert!(!attr.has_representation(&entries::RLE_LOSSLESS, None));
        assert!(matches!(
            attr.current(),
            Some(CurrentRepresentation::Native(_))
        ));
    }

    #[test]
    fn remove_all_but_current_redefines_the_original() {
        let samples: Vec<u8> = (0..16).collect();
        let mut attr = rle_attribute(&samples);
        let registry = CodecRegistry::new();
        let obj = monochrome(4, 4);
        attr.choose_representation(
            &registry,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            None,
            &obj,
            DatasetContext::MainDataset,
        )
        .unwrap();

        attr.remove_all_but_current();
        assert!(!attr.has_representation(&entries::RLE_LOSSLESS, None));
        assert!(attr.has_representation(&entries::EXPLICIT_VR_LITTLE_ENDIAN, None));
        assert_eq!(attr.vr(), VR::OW);

        // the native data can no longer fall back to anything else
        let err = attr.remove_original_representation().unwrap_err();
        assert!(matches!(err, DecodeError::IllegalCall { .. }));
    }

    #[test]
    fn native_data_under_encapsulated_syntax_pins_plain_encoding() {
        let mut attr = PixelAttribute::new(VR::OW);
        attr.put_native_data(vec![0; 8], &entries::RLE_LOSSLESS);
        assert!(attr.always_unencapsulated());
        assert_eq!(attr.vr(), VR::OW);

        let mut attr = PixelAttribute::new(VR::OB);
        attr.put_native_data(vec![0; 8], &entries::EXPLICIT_VR_LITTLE_ENDIAN);
        assert!(!attr.always_unencapsulated());
    }

    #[test]
    fn frame_decode_through_the_current_representation() {
        let frame0: Vec<u8> = vec![5; 16];
        let frame1: Vec<u8> = (0..16).collect();
        let mut attr = PixelAttribute::new(VR::OB);
        attr.put_original_representation(
            entries::RLE_LOSSLESS,
            None,
            PixelSequence::from_fragments(vec![
                rle_frame_fragment(&[rle_encode_segment(&frame0)]),
                rle_frame_fragment(&[rle_encode_segment(&frame1)]),
            ]),
        );
        let registry = CodecRegistry::new();
        let mut obj = monochrome(4, 4);
        obj.number_of_frames = Some(2);

        let mut dst = vec![0u8; 16];
        let outcome = attr
            .decode_frame(&registry, &obj, 0, None, &mut dst)
            .unwrap();
        assert_eq!(dst, frame0);
        attr.decode_frame(&registry, &obj, 1, Some(outcome.next_fragment), &mut dst)
            .unwrap();
        assert_eq!(dst, frame1);
    }
}
