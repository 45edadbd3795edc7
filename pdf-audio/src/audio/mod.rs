//! Audio decoding, stitching and WAV output.

pub mod assembler;
pub mod decoder;
mod wav;

pub use assembler::{AssembleError, AudioAssembler, DEFAULT_SILENCE_SECS, MAX_SILENCE_SECS};
pub use wav::write_wav;
