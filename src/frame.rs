//! Frame grabber for the live MJPEG video feed.
//!
//! The feed is a `multipart/x-mixed-replace` stream of JPEG frames. Grabbing
//! a still means reading the stream just long enough to see one complete
//! frame, then decoding and re-encoding it at capture quality.

use async_trait::async_trait;
use futures_util::StreamExt;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::DetectError;

/// Fallback capture dimensions when the feed reports unusable ones
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// JPEG quality for the submitted capture (0-100)
const JPEG_QUALITY: u8 = 80;

/// Upper bound on buffered feed bytes while scanning for one frame
const MAX_FRAME_SCAN_BYTES: usize = 8 * 1024 * 1024;

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// One encoded still image, consumed exactly once by the detection client
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    /// JPEG bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Source of still frames for the capture pipeline
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Produce one encoded still frame from the live feed.
    async fn grab(&self) -> Result<ImageBuffer, DetectError>;
}

/// Frame source backed by an MJPEG streaming endpoint
pub struct MjpegFrameGrabber {
    client: reqwest::Client,
    feed_url: String,
}

impl MjpegFrameGrabber {
    pub fn new(client: reqwest::Client, feed_url: impl Into<String>) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
        }
    }
}

#[async_trait]
impl FrameSource for MjpegFrameGrabber {
    async fn grab(&self) -> Result<ImageBuffer, DetectError> {
        let response = self
            .client
            .get(&self.feed_url)
            .send()
            .await
            .map_err(|e| DetectError::Capture(format!("video feed unavailable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DetectError::Capture(format!(
                "video feed returned {}",
                status
            )));
        }

        let mut stream = response.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| DetectError::Capture(format!("video feed read failed: {}", e)))?;
            buf.extend_from_slice(&chunk);

            if let Some(frame) = extract_jpeg(&buf) {
                debug!("Extracted {} byte frame from feed", frame.len());
                return encode_capture(frame);
            }

            if buf.len() > MAX_FRAME_SCAN_BYTES {
                return Err(DetectError::Capture(format!(
                    "no complete frame within {} bytes of feed data",
                    MAX_FRAME_SCAN_BYTES
                )));
            }
        }

        Err(DetectError::Capture(
            "video feed ended before a complete frame arrived".to_string(),
        ))
    }
}

/// Find the first complete JPEG (SOI..EOI) in a byte buffer.
///
/// MJPEG frames from the feed carry no embedded thumbnails, so the first
/// end-of-image marker after a start marker closes the frame.
fn extract_jpeg(buf: &[u8]) -> Option<&[u8]> {
    let start = find_marker(buf, &SOI, 0)?;
    let end = find_marker(buf, &EOI, start + SOI.len())?;
    Some(&buf[start..end + EOI.len()])
}

fn find_marker(buf: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    if buf.len() < from + marker.len() {
        return None;
    }
    buf[from..]
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|pos| from + pos)
}

/// Decode a raw feed frame and re-encode it as the capture JPEG.
///
/// Dimensions come from the decoded frame, falling back to 640x480 when the
/// decoder reports a zero dimension.
fn encode_capture(jpeg: &[u8]) -> Result<ImageBuffer, DetectError> {
    let decoded = image::load_from_memory(jpeg)
        .map_err(|e| DetectError::Capture(format!("failed to decode frame: {}", e)))?;

    let (native_w, native_h) = (decoded.width(), decoded.height());
    let (width, height) = if native_w == 0 || native_h == 0 {
        (DEFAULT_WIDTH, DEFAULT_HEIGHT)
    } else {
        (native_w, native_h)
    };

    let frame = if (width, height) != (native_w, native_h) {
        decoded.resize_exact(width, height, FilterType::Triangle)
    } else {
        decoded
    };

    let mut data = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut data, JPEG_QUALITY);
    encoder
        .encode_image(&frame.to_rgb8())
        .map_err(|e| DetectError::Capture(format!("JPEG encode failed: {}", e)))?;

    debug!("Encoded {}x{} capture ({} bytes)", width, height, data.len());

    Ok(ImageBuffer {
        data,
        width,
        height,
    })
}
