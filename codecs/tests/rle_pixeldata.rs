//! End-to-end tests over synthetic RLE encapsulated pixel data.

use byteordered::byteorder::{ByteOrder, LittleEndian};
use dicom_pixel_codecs::attribute::{CurrentRepresentation, PixelAttribute, VR};
use dicom_pixel_codecs::{get_registry, RleLosslessAdapter};
use dicom_pixel_core::adapters::{DatasetContext, ImageDataset, PixelCodec};
use dicom_pixel_core::fragments::{PixelItem, PixelSequence};
use dicom_pixel_core::parameters::CodecParameters;
use dicom_pixel_core::transfer_syntax::entries;
use dicom_pixel_core::C;

struct Monochrome {
    rows: u16,
    cols: u16,
    frames: u32,
}

impl ImageDataset for Monochrome {
    fn rows(&self) -> Option<u16> {
        Some(self.rows)
    }
    fn cols(&self) -> Option<u16> {
        Some(self.cols)
    }
    fn samples_per_pixel(&self) -> Option<u16> {
        Some(1)
    }
    fn bits_allocated(&self) -> Option<u16> {
        Some(8)
    }
    fn pixel_representation(&self) -> Option<u16> {
        Some(0)
    }
    fn planar_configuration(&self) -> Option<u16> {
        None
    }
    fn number_of_frames(&self) -> Option<u32> {
        Some(self.frames)
    }
    fn photometric_interpretation(&self) -> Option<&str> {
        Some("MONOCHROME2")
    }
}

/// Compress one segment with DICOM RLE runs.
fn rle_encode_segment(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let mut run = 1;
        while pos + run < data.len() && data[pos + run] == data[pos] && run < 129 {
            run += 1;
        }
        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(data[pos]);
            pos += run;
        } else {
            let start = pos;
            pos += 1;
            while pos < data.len()
                && pos - start < 128
                && !(pos + 1 < data.len() && data[pos + 1] == data[pos])
            {
                pos += 1;
            }
            out.push((pos - start - 1) as u8);
            out.extend_from_slice(&data[start..pos]);
        }
    }
    out
}

/// Build a single-segment RLE frame fragment from raw samples.
fn rle_fragment(samples: &[u8]) -> Vec<u8> {
    let segment = rle_encode_segment(samples);
    let mut fragment = vec![0u8; 64];
    LittleEndian::write_u32(&mut fragment[0..4], 1);
    LittleEndian::write_u32(&mut fragment[4..8], 64);
    fragment.extend_from_slice(&segment);
    if fragment.len() % 2 != 0 {
        fragment.push(0);
    }
    fragment
}

/// Build a pixel sequence for the given frames
/// with one fragment per frame and a correct basic offset table.
fn encapsulate(frames: &[Vec<u8>]) -> PixelSequence {
    let fragments: Vec<Vec<u8>> = frames.iter().map(|f| rle_fragment(f)).collect();
    let mut offset_table: C<u32> = C::new();
    let mut offset = 0u32;
    for fragment in &fragments {
        offset_table.push(offset);
        offset += fragment.len() as u32 + 8;
    }
    PixelSequence::new(
        offset_table,
        fragments.into_iter().map(PixelItem::new).collect(),
    )
}

#[test]
fn frame_decode_agrees_with_whole_attribute_decode() {
    let frame0: Vec<u8> = (0..64).map(|i| (i * 3) as u8).collect();
    let frame1: Vec<u8> = (0..64).map(|i| (255 - i) as u8).collect();
    let obj = Monochrome {
        rows: 8,
        cols: 8,
        frames: 2,
    };
    let parameters = CodecParameters::default();

    let mut fragments = encapsulate(&[frame0.clone(), frame1.clone()]);
    let mut whole = Vec::new();
    RleLosslessAdapter
        .decode(
            &parameters,
            &mut fragments,
            &obj,
            DatasetContext::MainDataset,
            &mut whole,
        )
        .unwrap();
    assert_eq!(whole.len(), 128);

    // decoding frame 1 alone, located through the offset table,
    // must agree with the whole-attribute decode sliced at its offset
    let mut fragments = encapsulate(&[frame0, frame1]);
    let mut single = vec![0u8; 64];
    RleLosslessAdapter
        .decode_frame(&parameters, &mut fragments, &obj, 1, None, &mut single)
        .unwrap();
    assert_eq!(single, whole[64..]);
}

#[test]
fn representation_lifecycle_over_the_shared_registry() {
    let samples: Vec<u8> = (0..64).map(|i| (i ^ 0x5A) as u8).collect();
    let obj = Monochrome {
        rows: 8,
        cols: 8,
        frames: 1,
    };

    let mut attr = PixelAttribute::new(VR::OB);
    attr.put_original_representation(
        entries::RLE_LOSSLESS,
        None,
        encapsulate(&[samples.clone()]),
    );
    assert_eq!(attr.vr(), VR::OB);

    // frame access straight from the encapsulated representation
    let mut frame = vec![0u8; 64];
    attr.decode_frame(get_registry(), &obj, 0, None, &mut frame)
        .unwrap();
    assert_eq!(frame, samples);

    // full decode to the native representation
    let properties = attr
        .choose_representation(
            get_registry(),
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            None,
            &obj,
            DatasetContext::MainDataset,
        )
        .unwrap()
        .expect("first native switch decodes");
    assert_eq!(properties.color_model, "MONOCHROME2");
    assert_eq!(attr.vr(), VR::OB);
    match attr.current() {
        Some(CurrentRepresentation::Native(data)) => assert_eq!(data, &samples[..]),
        other => panic!("expected native data, got {:?}", other),
    }

    // the original survives until explicitly replaced
    assert!(attr.has_representation(&entries::RLE_LOSSLESS, None));
    attr.remove_original_representation().unwrap();
    assert!(!attr.has_representation(&entries::RLE_LOSSLESS, None));
}
