//! Byte stream decoder for the DICOM RLE compression scheme.
//!
//! DICOM RLE compresses each byte plane ("segment") of a frame
//! with a PackBits-style run-length encoding:
//! a control byte `n` below 128 announces a literal run of `n + 1`
//! bytes copied verbatim, and a control byte of 128 or above
//! announces a replicate run of `257 - n` copies of the byte
//! which follows it. There is no end marker;
//! the segment is bounded externally by the RLE header offsets
//! or by the expected output size of the last segment.
//!
//! The decoder in this module is *resumable*:
//! compressed segments may cross fragment boundaries,
//! so a `decompress` call can end in the middle of a run.
//! The decoder records exactly where it stopped and picks the run
//! back up on the next call, which allows feeding it one fragment
//! at a time without concatenating the compressed stream first.

/// The outcome of one `decompress` call.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecompressStatus {
    /// All input was consumed and no run is pending.
    Complete,
    /// Input ended in the middle of a run;
    /// call `decompress` again with the continuation bytes.
    NeedMoreInput,
    /// The output would exceed the decoder's capacity.
    /// The failure is sticky: further input is consumed and ignored
    /// until [`reset`](RleDecoder::reset) is called.
    Overflow,
}

/// Pending state of a run which was split across calls.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Suspension {
    None,
    /// A replicate run's control byte was consumed,
    /// but the byte value to replicate has not arrived yet.
    Replicate { count: usize },
    /// A literal run with this many bytes still to be copied.
    Literal { remaining: usize },
}

/// A suspendable decoder for one RLE segment.
///
/// The decoder owns its output buffer and never produces more than
/// the capacity it was created with. It is meant to be created once
/// per frame and [`reset`](RleDecoder::reset) between segments,
/// reusing the output allocation.
#[derive(Debug)]
pub struct RleDecoder {
    output: Vec<u8>,
    capacity: usize,
    suspension: Suspension,
    failed: bool,
}

impl RleDecoder {
    /// Create a decoder which produces at most `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        RleDecoder {
            output: Vec::new(),
            capacity,
            suspension: Suspension::None,
            failed: false,
        }
    }

    /// The number of bytes written to the output so far.
    pub fn written(&self) -> usize {
        self.output.len()
    }

    /// The decoded bytes produced so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Whether the decoder entered the sticky overflow failure.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Whether a run is pending more input.
    pub fn suspended(&self) -> bool {
        self.suspension != Suspension::None
    }

    /// Prepare for a new segment:
    /// discard the output, the pending run, and the failure flag,
    /// keeping the output allocation for reuse.
    pub fn reset(&mut self) {
        self.output.clear();
        self.suspension = Suspension::None;
        self.failed = false;
    }

    /// Consume as much of `input` as fits in the output buffer.
    ///
    /// A zero-length call is a no-op reporting `Complete`.
    /// After an `Overflow`, all input is discarded until `reset`.
    pub fn decompress(&mut self, input: &[u8]) -> DecompressStatus {
        if input.is_empty() {
            return DecompressStatus::Complete;
        }
        if self.failed {
            return DecompressStatus::Overflow;
        }

        let mut pos = 0;

        // pick up a run which was split across calls
        match self.suspension {
            Suspension::Replicate { count } => {
                let value = input[pos];
                pos += 1;
                self.suspension = Suspension::None;
                if !self.replicate(value, count) {
                    return DecompressStatus::Overflow;
                }
            }
            Suspension::Literal { remaining } => {
                let n = remaining.min(input.len() - pos);
                if !self.literal(&input[pos..pos + n]) {
                    return DecompressStatus::Overflow;
                }
                pos += n;
                if n < remaining {
                    self.suspension = Suspension::Literal {
                        remaining: remaining - n,
                    };
                    return DecompressStatus::NeedMoreInput;
                }
                self.suspension = Suspension::None;
            }
            Suspension::None => {}
        }

        while pos < input.len() {
            let control = input[pos];
            pos += 1;
            if control >= 128 {
                let count = 257 - control as usize;
                if pos == input.len() {
                    // the replicated value is in a later call
                    self.suspension = Suspension::Replicate { count };
                    return DecompressStatus::NeedMoreInput;
                }
                let value = input[pos];
                pos += 1;
                if !self.replicate(value, count) {
                    return DecompressStatus::Overflow;
                }
            } else {
                let length = control as usize + 1;
                let n = length.min(input.len() - pos);
                if !self.literal(&input[pos..pos + n]) {
                    return DecompressStatus::Overflow;
                }
                pos += n;
                if n < length {
                    self.suspension = Suspension::Literal {
                        remaining: length - n,
                    };
                    return DecompressStatus::NeedMoreInput;
                }
            }
        }

        DecompressStatus::Complete
    }

    /// Emit `count` copies of `value`,
    /// truncating at capacity and failing on overflow.
    fn replicate(&mut self, value: u8, count: usize) -> bool {
        let available = self.capacity - self.output.len();
        if count > available {
            self.output.resize(self.capacity, value);
            self.failed = true;
            return false;
        }
        self.output.resize(self.output.len() + count, value);
        true
    }

    /// Copy `bytes` verbatim,
    /// truncating at capacity and failing on overflow.
    fn literal(&mut self, bytes: &[u8]) -> bool {
        let available = self.capacity - self.output.len();
        if bytes.len() > available {
            self.output.extend_from_slice(&bytes[..available]);
            self.failed = true;
            return false;
        }
        self.output.extend_from_slice(bytes);
        true
    }
}
