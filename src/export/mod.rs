pub mod exporter;
pub mod pipeline;
pub mod sink;

pub use exporter::{snapshot, DualExporter};
pub use pipeline::{CancelFlag, ExportError, ExportOutcome, ExportProgress, ExportSettings};
pub use sink::FrameSink;
