pub mod analysis;
pub mod decode;
pub mod features;
pub mod mel;
pub mod meter;
pub mod microphone;
