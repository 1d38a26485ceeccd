//! Codec parameters for pixel data representations.
//!
//! A representation of a pixel data value is identified by
//! its transfer syntax *and* the parameter set it was created with.
//! Parameter sets are comparable so that a representation registry can
//! tell whether a requested representation already exists;
//! an absent parameter set compares equal to the default set.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Policy for regenerating the SOP Instance UID
/// when pixel data is decoded or otherwise modified.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UidCreationPolicy {
    /// Never create a new SOP Instance UID.
    #[default]
    Never,
    /// Create a new SOP Instance UID only if the pixel data
    /// was actually modified by the operation.
    WhenModified,
    /// Always create a new SOP Instance UID
    /// when pixel data passes through a codec.
    Always,
}

/// Policy for converting the color space during decompression.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorSpaceConversion {
    /// Never convert the color space.
    Never,
    /// Let the decoder engine decide based on the photometric
    /// interpretation of the compressed data.
    #[default]
    Default,
    /// Always convert color images to RGB.
    Always,
}

/// Policy for the planar configuration of decompressed color images.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PlanarConfigurationPolicy {
    /// Keep the planar configuration declared by the data set.
    #[default]
    Auto,
    /// Interleave samples per pixel (planar configuration 0).
    Interleaved,
    /// Group samples into per-sample planes (planar configuration 1).
    Planar,
}

/// The options recognized by pixel data codecs.
///
/// A parameter set given to `choose_representation`
/// or attached to a representation is compared with this type's
/// [`PartialEq`]; see [`parameters_eq`] for the treatment of
/// absent parameter sets.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    /// Workaround for encoders which emit the segments of a sample
    /// least significant byte first:
    /// when set, decompressed segment bytes are scattered
    /// in the reverse of the standard order.
    pub reverse_decompression_byte_order: bool,

    /// Whether decoding regenerates the SOP Instance UID.
    pub uid_creation: UidCreationPolicy,

    /// Whether decoding converts the color space.
    pub color_space_conversion: ColorSpaceConversion,

    /// The planar configuration of the decompressed output.
    pub planar_configuration: PlanarConfigurationPolicy,
}

impl CodecParameters {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compare two optional parameter sets for representation equality.
///
/// An absent parameter set stands for the codec's own defaults,
/// so `None` compares equal to `Some(&CodecParameters::default())`.
pub fn parameters_eq(a: Option<&CodecParameters>, b: Option<&CodecParameters>) -> bool {
    let default = CodecParameters::default();
    a.unwrap_or(&default) == b.unwrap_or(&default)
}

/// Organization root under which new SOP Instance UIDs are generated.
const UID_ROOT: &str = "1.2.826.0.1.3680043.10.1462";

static UID_SERIAL: AtomicU32 = AtomicU32::new(0);

/// Generate a new SOP Instance UID.
///
/// The UID is built from a fixed organization root,
/// the process identifier, the current time,
/// and a process-wide serial number,
/// so that repeated calls yield distinct identifiers.
pub fn new_sop_instance_uid() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let serial = UID_SERIAL.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}.{}.{}.{}",
        UID_ROOT,
        std::process::id(),
        now.as_secs(),
        serial
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_parameters_match_defaults() {
        let default = CodecParameters::default();
        assert!(parameters_eq(None, Some(&default)));
        assert!(parameters_eq(Some(&default), None));
        assert!(parameters_eq(None, None));

        let reversed = CodecParameters {
            reverse_decompression_byte_order: true,
            ..CodecParameters::default()
        };
        assert!(!parameters_eq(None, Some(&reversed)));
        assert!(parameters_eq(Some(&reversed), Some(&reversed)));
    }

    #[test]
    fn generated_uids_are_distinct_and_valid() {
        let a = new_sop_instance_uid();
        let b = new_sop_instance_uid();
        assert_ne!(a, b);
        assert!(a.len() <= 64, "UID too long: {}", a);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.'));
    }
}
