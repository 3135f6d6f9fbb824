// Watermark state and persistence

pub mod store;
pub mod watermark;

pub use store::{MirrorWarning, StateMirror, StateOrigin, WatermarkStore};
pub use watermark::EntityWatermark;
