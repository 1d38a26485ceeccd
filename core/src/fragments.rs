//! Containers for encapsulated pixel data fragments.
//!
//! An encapsulated pixel data value is a sequence of items:
//! by convention the first item is the basic offset table
//! (possibly empty), and each subsequent item carries a fragment of
//! compressed data. [`PixelSequence`] keeps the offset table apart
//! from the data fragments, so fragment index 0 is always
//! the first *data* fragment.
//!
//! Fragment payloads are immutable once read,
//! but may be backed by storage which has not been loaded yet
//! (see [`FragmentSource`]).

use std::fmt;

use crate::adapters::{decode_error, DecodeError, DecodeResult};
use crate::C;
use snafu::ResultExt;

/// A source of fragment bytes which might not be loaded yet,
/// such as a region of a file on disk.
///
/// Implementations may keep their storage handle open between calls,
/// so that repeated frame decodes over the same source
/// do not pay the cost of reopening it.
pub trait FragmentSource: Send {
    /// The length of the fragment payload in bytes,
    /// known without loading it.
    fn len(&self) -> u64;

    /// Whether the fragment payload is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the entire fragment payload.
    fn load(&mut self) -> std::io::Result<Vec<u8>>;
}

enum ItemData {
    InMem(Vec<u8>),
    Deferred(Box<dyn FragmentSource>),
}

/// A single item of an encapsulated pixel data sequence:
/// an immutable-once-read byte buffer plus its length.
pub struct PixelItem {
    data: ItemData,
}

impl fmt::Debug for PixelItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            ItemData::InMem(data) => f
                .debug_struct("PixelItem")
                .field("len", &data.len())
                .finish(),
            ItemData::Deferred(source) => f
                .debug_struct("PixelItem")
                .field("len", &source.len())
                .field("deferred", &true)
                .finish(),
        }
    }
}

impl From<Vec<u8>> for PixelItem {
    fn from(data: Vec<u8>) -> Self {
        PixelItem::new(data)
    }
}

impl PixelItem {
    /// Create a pixel item with its payload in memory.
    pub fn new(data: Vec<u8>) -> Self {
        PixelItem {
            data: ItemData::InMem(data),
        }
    }

    /// Create a pixel item backed by a source
    /// which is only loaded when the payload is first requested.
    pub fn new_deferred(source: Box<dyn FragmentSource>) -> Self {
        PixelItem {
            data: ItemData::Deferred(source),
        }
    }

    /// The length of the payload in bytes, without forcing a load.
    pub fn len(&self) -> u64 {
        match &self.data {
            ItemData::InMem(data) => data.len() as u64,
            ItemData::Deferred(source) => source.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload bytes, loading them first if necessary.
    ///
    /// `fragment` is the item's index within its sequence,
    /// used for error reporting only.
    /// Fails with [`DecodeError::CorruptedData`] if the backing source
    /// cannot be read.
    pub fn data(&mut self, fragment: usize) -> DecodeResult<&[u8]> {
        if let ItemData::Deferred(source) = &mut self.data {
            let bytes = source
                .load()
                .context(decode_error::CorruptedDataSnafu { fragment })?;
            self.data = ItemData::InMem(bytes);
        }
        match &self.data {
            ItemData::InMem(data) => Ok(data),
            ItemData::Deferred(_) => unreachable!(),
        }
    }
}

/// An encapsulated pixel data value:
/// a basic offset table plus an ordered sequence of data fragments.
///
/// The offset table maps frame numbers to the byte offset of
/// the frame's first fragment, counted from the first byte of
/// the first data fragment's item header (8 bytes per item header).
/// An empty offset table is legal and forces sequential
/// fragment location.
#[derive(Debug, Default)]
pub struct PixelSequence {
    offset_table: C<u32>,
    fragments: C<PixelItem>,
}

impl PixelSequence {
    /// Create a pixel sequence from an offset table and fragments.
    pub fn new(offset_table: C<u32>, fragments: C<PixelItem>) -> Self {
        PixelSequence {
            offset_table,
            fragments,
        }
    }

    /// Create a pixel sequence with an empty offset table
    /// from in-memory fragment payloads.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Vec<u8>>) -> Self {
        PixelSequence {
            offset_table: C::new(),
            fragments: fragments.into_iter().map(PixelItem::new).collect(),
        }
    }

    /// Append one fragment to the sequence.
    pub fn add_fragment(&mut self, item: impl Into<PixelItem>) {
        self.fragments.push(item.into());
    }

    /// The basic offset table, empty if there is none.
    pub fn offset_table(&self) -> &[u32] {
        &self.offset_table
    }

    /// The number of data fragments (the offset table not included).
    pub fn number_of_fragments(&self) -> u32 {
        self.fragments.len() as u32
    }

    /// The length in bytes of the fragment at the given index.
    pub fn fragment_len(&self, index: usize) -> Option<u64> {
        self.fragments.get(index).map(PixelItem::len)
    }

    /// Borrow the payload of the fragment at the given index,
    /// loading it first if necessary.
    ///
    /// Fails with [`DecodeError::CorruptedData`] if there is
    /// no such fragment or its backing source cannot be read.
    pub fn fragment_data(&mut self, index: usize) -> DecodeResult<&[u8]> {
        match self.fragments.get_mut(index) {
            Some(item) => item.data(index),
            None => Err(DecodeError::CorruptedData {
                fragment: index,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no fragment at this index",
                ),
            }),
        }
    }

    /// Determine the first fragment of the given frame (0-based)
    /// using the basic offset table.
    ///
    /// Returns `None` if the table is empty, has no entry for `frame`,
    /// or its entry does not fall on a fragment boundary.
    pub fn locate_frame(&self, frame: u32) -> Option<u32> {
        if self.offset_table.is_empty() {
            return None;
        }
        let target = *self.offset_table.get(frame as usize)?;
        let mut offset = 0u64;
        for (i, item) in self.fragments.iter().enumerate() {
            if offset == u64::from(target) {
                return Some(i as u32);
            }
            if offset > u64::from(target) {
                break;
            }
            // each item is preceded by an 8-byte item header
            offset += item.len() + 8;
        }
        None
    }
}
