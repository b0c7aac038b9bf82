//! Frame sources: the `FrameSource` contract and an HTTP MJPEG reader.
//!
//! MJPEG streams are split on JPEG start/end markers rather than on the
//! multipart boundary, so the reader also works on raw concatenated JPEGs.

use std::io::{ErrorKind, Read};
use std::time::Duration;

use image::ImageFormat;
use tracing::{debug, info, trace, warn};

use crate::error::CaptureError;
use crate::frame::Frame;

const CHUNK_SIZE: usize = 64 * 1024;
const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const MAX_CONSECUTIVE_DECODE_ERRORS: u32 = 8;

/// Anything that yields frames until it fails.
///
/// An error means the stream is over; callers do not retry.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        (**self).next_frame()
    }
}

/// Video ingress settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    pub connect_timeout: Duration,
    /// Max wait for stream bytes before the read is considered failed
    pub read_timeout: Duration,
    /// Skip to the newest complete frame when several are buffered
    pub drop_stale: bool,
}

impl StreamConfig {
    pub fn for_device(host: &str) -> Self {
        Self {
            url: format!("http://{host}:81/stream"),
            ..Self::default()
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.1.1:81/stream".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            drop_stale: true,
        }
    }
}

/// Motion-JPEG frame reader.
pub struct MjpegSource<R> {
    reader: R,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
    next_seq: u64,
    drop_stale: bool,
    dropped: u64,
}

impl MjpegSource<Box<dyn Read + Send + Sync + 'static>> {
    /// Open an HTTP MJPEG stream.
    pub fn connect(config: &StreamConfig) -> Result<Self, CaptureError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        let response = agent
            .get(&config.url)
            .call()
            .map_err(|source| CaptureError::Connect {
                url: config.url.clone(),
                source: Box::new(source),
            })?;

        let content_type = response.content_type().to_string();
        if !content_type.starts_with("multipart/") {
            warn!(url = %config.url, %content_type, "stream is not multipart, reading JPEGs anyway");
        }
        info!(url = %config.url, "connected to MJPEG stream");

        Ok(Self::from_reader(response.into_reader(), config.drop_stale))
    }
}

impl<R: Read> MjpegSource<R> {
    pub fn from_reader(reader: R, drop_stale: bool) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(CHUNK_SIZE * 2),
            chunk: vec![0; CHUNK_SIZE],
            next_seq: 0,
            drop_stale,
            dropped: 0,
        }
    }

    /// Frames skipped because a newer one was already buffered.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn read_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        loop {
            if let Some(mut jpeg) = extract_frame(&mut self.buffer) {
                if self.drop_stale {
                    while let Some(newer) = extract_frame(&mut self.buffer) {
                        self.dropped += 1;
                        jpeg = newer;
                    }
                }
                return Ok(jpeg);
            }

            match self.reader.read(&mut self.chunk) {
                Ok(0) => return Err(CaptureError::EndOfStream),
                Ok(n) => {
                    trace!("MJPEG read {n} bytes");
                    self.buffer.extend_from_slice(&self.chunk[..n]);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(CaptureError::Read(err)),
            }
        }
    }
}

impl<R: Read> FrameSource for MjpegSource<R> {
    fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        let mut failures = 0;
        loop {
            let jpeg = self.read_jpeg()?;
            match image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
                Ok(decoded) => {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    return Ok(Frame::new(seq, decoded.into_rgb8()));
                }
                Err(source) => {
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(CaptureError::Decode {
                            count: failures,
                            source,
                        });
                    }
                    debug!("skipping undecodable frame ({} bytes): {source}", jpeg.len());
                }
            }
        }
    }
}

/// Pop the first complete JPEG out of `buffer`, discarding bytes before it.
fn extract_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let Some(start) = find_marker(buffer, &SOI) else {
        // keep a trailing 0xFF in case the marker straddles two reads
        let keep = usize::from(buffer.last() == Some(&0xFF));
        buffer.drain(..buffer.len() - keep);
        return None;
    };

    if start > 0 {
        buffer.drain(..start);
    }

    let end = find_marker(&buffer[SOI.len()..], &EOI)? + SOI.len();
    let frame_end = end + EOI.len();
    Some(buffer.drain(..frame_end).collect())
}

fn find_marker(buffer: &[u8], marker: &[u8]) -> Option<usize> {
    buffer
        .windows(marker.len())
        .position(|window| window == marker)
}
