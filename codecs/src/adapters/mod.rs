//! Codec implementations for specific transfer syntaxes.

pub mod engine;
pub mod rle_lossless;

pub use engine::{DecoderEngine, EngineAdapter, EngineFactory, EngineProgress};
pub use rle_lossless::RleLosslessAdapter;
