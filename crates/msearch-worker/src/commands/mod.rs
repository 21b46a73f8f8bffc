//! Pipeline steps.

pub mod assembly;
pub mod config_update;
pub mod content_type;
pub mod duration;
pub mod persist;
pub mod resize;
pub mod scenes;
pub mod summary;
pub mod trigger;

pub use assembly::MediaAssembly;
pub use config_update::ConfigUpdate;
pub use content_type::MediaContentType;
pub use duration::MediaLength;
pub use persist::MediaPersist;
pub use resize::VideoResize;
pub use scenes::SceneExtractor;
pub use summary::{MediaSummaryCreator, MediaSummaryParser};
pub use trigger::TriggerToObject;
