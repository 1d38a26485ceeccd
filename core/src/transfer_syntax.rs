//! Transfer syntax descriptors for pixel data handling.
//!
//! The descriptor in this module is deliberately small:
//! element-level encoding and decoding is the responsibility of
//! a full data set layer, whereas pixel data codecs only need to know
//! a transfer syntax' identity, its byte order,
//! and whether pixel data is encapsulated under it.

pub use byteordered::Endianness;

/// A DICOM transfer syntax descriptor,
/// reduced to the properties which matter for pixel data:
/// the unique identifier, the byte order of encoded data,
/// and whether the pixel data element is encapsulated.
///
/// Two descriptors are considered equal when their UIDs are equal.
#[derive(Debug, Clone)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: &'static str,
    /// The name of the transfer syntax.
    name: &'static str,
    /// The byte order of data.
    byte_order: Endianness,
    /// Whether pixel data is stored in an encapsulated pixel sequence.
    encapsulated: bool,
}

impl PartialEq for TransferSyntax {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for TransferSyntax {}

impl TransferSyntax {
    /// Create a new transfer syntax descriptor.
    ///
    /// Only transfer syntax implementers are expected to construct
    /// descriptors from scratch;
    /// consumers should use the constants in [`entries`].
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        encapsulated: bool,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            byte_order,
            encapsulated,
        }
    }

    /// Obtain this transfer syntax' unique identifier.
    pub const fn uid(&self) -> &'static str {
        self.uid
    }

    /// Obtain the name of this transfer syntax.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Obtain this transfer syntax' expected endianness.
    pub const fn endianness(&self) -> Endianness {
        self.byte_order
    }

    /// Whether pixel data under this transfer syntax is encapsulated.
    pub const fn is_encapsulated(&self) -> bool {
        self.encapsulated
    }
}

/// The transfer syntaxes which this subsystem knows about.
pub mod entries {
    use super::{Endianness, TransferSyntax};

    /// Implicit VR Little Endian: Default Transfer Syntax for DICOM
    pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2",
        "Implicit VR Little Endian",
        Endianness::Little,
        false,
    );

    /// Explicit VR Little Endian
    pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.1",
        "Explicit VR Little Endian",
        Endianness::Little,
        false,
    );

    /// Explicit VR Big Endian (retired)
    pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.2",
        "Explicit VR Big Endian",
        Endianness::Big,
        false,
    );

    /// RLE Lossless
    pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.5",
        "RLE Lossless",
        Endianness::Little,
        true,
    );

    /// JPEG Baseline (Process 1)
    pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.4.50",
        "JPEG Baseline (Process 1)",
        Endianness::Little,
        true,
    );

    /// JPEG Extended (Process 2 & 4)
    pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new(
        "1.2.840.10008.1.2.4.51",
        "JPEG Extended (Process 2 & 4)",
        Endianness::Little,
        true,
    );

    /// JPEG Lossless, Non-Hierarchical, First-Order Prediction
    /// (Process 14 [Selection Value 1])
    pub const JPEG_LOSSLESS_NON_HIERARCHICAL_FIRST_ORDER_PREDICTION: TransferSyntax =
        TransferSyntax::new(
            "1.2.840.10008.1.2.4.70",
            "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
            Endianness::Little,
            true,
        );
}
