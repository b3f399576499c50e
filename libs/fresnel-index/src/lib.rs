pub mod elastic;
pub mod recording;

pub use elastic::ElasticIndex;
pub use recording::{RecordedKind, RecordedOp, RecordingIndex};
