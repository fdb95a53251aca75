//! MJPEG file reader
//!
//! Two on-disk layouts are recognized when the file is opened:
//!
//! - length-prefixed: every frame is preceded by its size as 5 (or 6)
//!   ASCII digits, e.g. `01234<1234 bytes of JPEG>`;
//! - raw concatenated JPEG: frames are found by scanning for the SOI
//!   (`FF D8`) and EOI (`FF D9`) markers.
//!
//! If a length prefix stops being digits part-way through the file, the
//! reader falls back to marker scanning from that position.

use bytes::Bytes;
use tracing::debug;

use super::source::FrameSource;

const JPEG_MARKER: u8 = 0xFF;
const JPEG_SOI: u8 = 0xD8;
const JPEG_EOI: u8 = 0xD9;

/// Framing detected for an MJPEG file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MjpegFraming {
    /// Each frame preceded by `header_size` ASCII digits
    LengthPrefixed { header_size: usize },

    /// Frames delimited by JPEG SOI/EOI markers
    MarkerScan,
}

impl MjpegFraming {
    /// Inspect the start of a file
    pub fn detect(data: &[u8]) -> Self {
        let is_digits = |s: &[u8]| !s.is_empty() && s.iter().all(u8::is_ascii_digit);

        if data.len() >= 5 && is_digits(&data[..5]) {
            let header_size = if data.get(5).is_some_and(u8::is_ascii_digit) { 6 } else { 5 };
            MjpegFraming::LengthPrefixed { header_size }
        } else {
            MjpegFraming::MarkerScan
        }
    }
}

/// Frame source over the contents of an MJPEG file
#[derive(Debug, Clone)]
pub struct MjpegFileSource {
    data: Bytes,
    position: usize,
    framing: MjpegFraming,
    frame_number: u64,
}

impl MjpegFileSource {
    pub fn new(data: Bytes) -> Self {
        let framing = MjpegFraming::detect(&data);
        debug!("Detected MJPEG framing {:?} for {} bytes", framing, data.len());
        Self {
            data,
            position: 0,
            framing,
            frame_number: 0,
        }
    }

    pub fn framing(&self) -> MjpegFraming {
        self.framing
    }

    fn read_length_prefixed(&mut self, header_size: usize) -> Option<Bytes> {
        let header_end = self.position + header_size;
        if header_end > self.data.len() {
            return None;
        }

        let length = std::str::from_utf8(&self.data[self.position..header_end])
            .ok()
            .and_then(|digits| digits.parse::<usize>().ok());

        let Some(length) = length else {
            debug!("Length prefix at offset {} is not numeric, switching to marker scan", self.position);
            self.framing = MjpegFraming::MarkerScan;
            return self.read_marker_delimited();
        };

        let end = (header_end + length).min(self.data.len());
        self.position = end;
        Some(self.data.slice(header_end..end))
    }

    fn read_marker_delimited(&mut self) -> Option<Bytes> {
        let data = &self.data[..];

        // Find SOI
        let mut i = self.position;
        let start = loop {
            if i + 1 >= data.len() {
                self.position = data.len();
                return None;
            }
            if data[i] == JPEG_MARKER && data[i + 1] == JPEG_SOI {
                break i;
            }
            i += 1;
        };

        // Find EOI, or the next SOI if this image is truncated
        let mut i = start + 2;
        while i + 1 < data.len() {
            if data[i] == JPEG_MARKER {
                match data[i + 1] {
                    JPEG_EOI => {
                        self.position = i + 2;
                        return Some(self.data.slice(start..i + 2));
                    }
                    JPEG_SOI => {
                        self.position = i;
                        return Some(self.data.slice(start..i));
                    }
                    _ => {
                        i += 2;
                        continue;
                    }
                }
            }
            i += 1;
        }

        self.position = data.len();
        None
    }
}

impl FrameSource for MjpegFileSource {
    fn next_frame(&mut self) -> Option<Bytes> {
        let frame = match self.framing {
            MjpegFraming::LengthPrefixed { header_size } => self.read_length_prefixed(header_size),
            MjpegFraming::MarkerScan => self.read_marker_delimited(),
        }?;

        self.frame_number += 1;
        Some(frame)
    }

    fn frame_number(&self) -> u64 {
        self.frame_number
    }

    fn close(&mut self) {
        self.data = Bytes::new();
        self.position = 0;
    }
}
