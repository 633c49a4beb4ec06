pub mod mapping;
#[allow(clippy::module_inception)]
pub mod timeline;

pub use mapping::{PlayerTiming, TimeMapping};
pub use timeline::CommonTimeline;
