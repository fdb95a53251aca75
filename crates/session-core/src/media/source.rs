use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::Result;

/// A sequence of undecoded images
pub trait FrameSource: Send {
    /// Next frame, or `None` at end of media
    fn next_frame(&mut self) -> Option<Bytes>;

    /// Number of frames returned so far
    fn frame_number(&self) -> u64;

    /// Release whatever the source holds. Later calls to `next_frame`
    /// return `None`.
    fn close(&mut self) {}
}

/// Resolves media identifiers to frame sources
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Open `media`, failing with [`Error::MediaNotFound`] when it does not exist
    ///
    /// [`Error::MediaNotFound`]: crate::Error::MediaNotFound
    async fn open(&self, media: &str) -> Result<Box<dyn FrameSource>>;
}

/// Frame source over frames already in memory
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: Vec<Bytes>,
    position: usize,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Bytes>) -> Self {
        Self { frames, position: 0 }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Option<Bytes> {
        let frame = self.frames.get(self.position).cloned()?;
        self.position += 1;
        Some(frame)
    }

    fn frame_number(&self) -> u64 {
        self.position as u64
    }

    fn close(&mut self) {
        self.frames.clear();
        self.position = 0;
    }
}
