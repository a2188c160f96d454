pub mod entity_service;
pub mod merge;

pub use entity_service::{EntityService, Page};
pub use merge::{overlay, overlay_nullable, Merge};
