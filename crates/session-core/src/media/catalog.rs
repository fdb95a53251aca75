//! Media catalogs

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::mjpeg::MjpegFileSource;
use super::source::{FrameSource, MediaCatalog, VecFrameSource};
use crate::errors::{Error, Result};

/// Serves MJPEG files below a media root directory
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a media identifier to a path under the root. Absolute paths and
    /// `..` components resolve to nothing.
    fn resolve(&self, media: &str) -> Option<PathBuf> {
        let relative = Path::new(media);
        if media.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl MediaCatalog for DirectoryCatalog {
    async fn open(&self, media: &str) -> Result<Box<dyn FrameSource>> {
        let path = self.resolve(media).ok_or_else(|| {
            warn!("Rejected media identifier {:?}", media);
            Error::MediaNotFound(media.to_string())
        })?;

        let data = tokio::fs::read(&path).await.map_err(|e| {
            debug!("Failed to open {}: {}", path.display(), e);
            Error::MediaNotFound(media.to_string())
        })?;

        debug!("Opened {} ({} bytes)", path.display(), data.len());
        Ok(Box::new(MjpegFileSource::new(Bytes::from(data))))
    }
}

/// Catalog of frame lists held in memory
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    media: RwLock<HashMap<String, Vec<Bytes>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a media entry
    pub fn insert(&self, name: impl Into<String>, frames: Vec<Bytes>) {
        self.media.write().insert(name.into(), frames);
    }

    pub fn with_media(self, name: impl Into<String>, frames: Vec<Bytes>) -> Self {
        self.insert(name, frames);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.media.read().contains_key(name)
    }
}

#[async_trait]
impl MediaCatalog for InMemoryCatalog {
    async fn open(&self, media: &str) -> Result<Box<dyn FrameSource>> {
        let frames = self
            .media
            .read()
            .get(media)
            .cloned()
            .ok_or_else(|| Error::MediaNotFound(media.to_string()))?;
        Ok(Box::new(VecFrameSource::new(frames)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn length_prefixed(frames: &[&[u8]]) -> Vec<u8> {
        let mut file = Vec::new();
        for frame in frames {
            file.extend_from_slice(format!("{:05}", frame.len()).as_bytes());
            file.extend_from_slice(frame);
        }
        file
    }

    #[tokio::test]
    async fn test_directory_catalog_opens_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("movie.mjpeg")).unwrap();
        file.write_all(&length_prefixed(&[b"\xff\xd8aa\xff\xd9", b"\xff\xd8bb\xff\xd9"])).unwrap();

        let catalog = DirectoryCatalog::new(dir.path());
        let mut source = catalog.open("movie.mjpeg").await.unwrap();
        assert_eq!(source.next_frame().unwrap().as_ref(), b"\xff\xd8aa\xff\xd9");
        assert_eq!(source.next_frame().unwrap().as_ref(), b"\xff\xd8bb\xff\xd9");
        assert!(source.next_frame().is_none());
    }

    #[tokio::test]
    async fn test_directory_catalog_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new(dir.path());
        assert!(matches!(catalog.open("nope.mjpeg").await, Err(Error::MediaNotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_catalog_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("media");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(dir.path().join("secret.mjpeg"), b"00001x").unwrap();

        let catalog = DirectoryCatalog::new(&inner);
        assert!(matches!(catalog.open("../secret.mjpeg").await, Err(Error::MediaNotFound(_))));
        let absolute = dir.path().join("secret.mjpeg");
        assert!(matches!(
            catalog.open(absolute.to_str().unwrap()).await,
            Err(Error::MediaNotFound(_))
        ));
        assert!(matches!(catalog.open("").await, Err(Error::MediaNotFound(_))));
    }

    #[tokio::test]
    async fn test_in_memory_catalog() {
        let catalog = InMemoryCatalog::new().with_media("clip", vec![Bytes::from_static(b"f1")]);
        assert!(catalog.contains("clip"));

        let mut source = catalog.open("clip").await.unwrap();
        assert_eq!(source.next_frame().unwrap(), Bytes::from_static(b"f1"));
        assert!(source.next_frame().is_none());

        assert!(matches!(catalog.open("other").await, Err(Error::MediaNotFound(_))));
    }
}
