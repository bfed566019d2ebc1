//! Video conversion
//!
//! Background batch that re-encodes source videos into the playable
//! format, with a polled status cell.

pub mod pipeline;
pub mod status;
pub mod transcoder;

pub use pipeline::{ConversionError, ConversionPipeline};
pub use status::{ConversionPhase, ConversionState, ConversionStatus, FileError};
pub use transcoder::{Transcoder, TranscoderError};
