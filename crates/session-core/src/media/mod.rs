//! Frame sources
//!
//! The streaming core never decodes images. It pulls opaque frame bytes
//! from a [`FrameSource`] obtained through a [`MediaCatalog`]:
//!
//! - [`DirectoryCatalog`]: MJPEG files below a media root
//! - [`InMemoryCatalog`]: frames registered in memory

pub mod catalog;
pub mod mjpeg;
pub mod source;

pub use catalog::{DirectoryCatalog, InMemoryCatalog};
pub use mjpeg::{MjpegFileSource, MjpegFraming};
pub use source::{FrameSource, MediaCatalog, VecFrameSource};
