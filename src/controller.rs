//! Capture controller: the state machine tying the pipeline together.
//!
//! One user action, one pipeline run: grab a frame, submit it, interpret the
//! response, announce the result. The busy flag is set before the first
//! suspension point and cleared only after the pipeline fully resolves, so at
//! most one capture is ever in flight. Every pipeline error is caught here;
//! none propagate further.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::detect::Detector;
use crate::error::DetectError;
use crate::frame::FrameSource;
use crate::interpret::{interpret, Interpretation};
use crate::speech::{announce, Speak};

/// Message retained when any pipeline stage fails
pub const CAPTURE_FAILED_MESSAGE: &str = "Failed to detect emotion. Please try again.";

/// Message shown while a capture is in flight
const CAPTURING_MESSAGE: &str = "Capturing...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Capturing,
    Succeeded,
    Failed,
}

/// One capture attempt. Only the latest session is retained.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub status: CaptureStatus,
    pub message: String,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self {
            status: CaptureStatus::Idle,
            message: String::new(),
            started_at: None,
        }
    }
}

/// Owns the capture pipeline and its observable state
pub struct CaptureController {
    frames: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    speaker: Box<dyn Speak>,
    busy: Arc<AtomicBool>,
    session: Mutex<CaptureSession>,
}

impl CaptureController {
    pub fn new(
        frames: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        speaker: Box<dyn Speak>,
    ) -> Self {
        Self {
            frames,
            detector,
            speaker,
            busy: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(CaptureSession::default()),
        }
    }

    /// Whether a capture is currently in flight
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// The latest session state
    pub fn session(&self) -> CaptureSession {
        self.session.lock().unwrap().clone()
    }

    /// Run one capture. A trigger while a capture is already in flight is a
    /// no-op that leaves the in-flight session untouched.
    pub async fn capture(&self) -> CaptureSession {
        // Gate set before any suspension point
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Capture already in flight, ignoring trigger");
            return self.session();
        }

        self.set_session(CaptureStatus::Capturing, CAPTURING_MESSAGE, Some(Utc::now()));

        match self.run_pipeline().await {
            Ok(result) => {
                info!("Capture succeeded: {}", result.message);
                self.update_session(CaptureStatus::Succeeded, &result.message);
                announce(self.speaker.as_ref(), result.primary.as_deref());
            }
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.update_session(CaptureStatus::Failed, CAPTURE_FAILED_MESSAGE);
                announce(self.speaker.as_ref(), None);
            }
        }

        self.busy.store(false, Ordering::SeqCst);
        self.session()
    }

    async fn run_pipeline(&self) -> Result<Interpretation, DetectError> {
        let frame = self.frames.grab().await?;
        let envelope = self.detector.submit(frame).await?;
        Ok(interpret(&envelope))
    }

    fn set_session(&self, status: CaptureStatus, message: &str, started_at: Option<DateTime<Utc>>) {
        let mut session = self.session.lock().unwrap();
        *session = CaptureSession {
            status,
            message: message.to_string(),
            started_at,
        };
    }

    fn update_session(&self, status: CaptureStatus, message: &str) {
        let mut session = self.session.lock().unwrap();
        session.status = status;
        session.message = message.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DetectEnvelope;
    use crate::frame::ImageBuffer;
    use crate::speech::FALLBACK_UTTERANCE;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default, Clone)]
    struct RecordingSpeaker {
        utterances: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSpeaker {
        fn utterances(&self) -> Vec<String> {
            self.utterances.lock().unwrap().clone()
        }
    }

    impl Speak for RecordingSpeaker {
        fn speak(&self, text: &str) {
            self.utterances.lock().unwrap().push(text.to_string());
        }
    }

    struct StaticFrames;

    #[async_trait]
    impl FrameSource for StaticFrames {
        async fn grab(&self) -> Result<ImageBuffer, DetectError> {
            Ok(ImageBuffer {
                data: vec![0xFF, 0xD8, 0xFF, 0xD9],
                width: 640,
                height: 480,
            })
        }
    }

    struct FailingFrames;

    #[async_trait]
    impl FrameSource for FailingFrames {
        async fn grab(&self) -> Result<ImageBuffer, DetectError> {
            Err(DetectError::Capture("feed not yet loaded".to_string()))
        }
    }

    /// Returns a canned response body on every submit
    struct CannedDetector {
        body: String,
        calls: Arc<AtomicUsize>,
    }

    impl CannedDetector {
        fn new(body: &str) -> Self {
            Self {
                body: body.to_string(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Detector for CannedDetector {
        async fn submit(&self, _image: ImageBuffer) -> Result<DetectEnvelope, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(&self.body).unwrap())
        }
    }

    struct FailingDetector;

    #[async_trait]
    impl Detector for FailingDetector {
        async fn submit(&self, _image: ImageBuffer) -> Result<DetectEnvelope, DetectError> {
            Err(DetectError::Network("connection refused".to_string()))
        }
    }

    /// Blocks in submit until released, to hold the controller busy
    struct BlockingDetector {
        gate: Arc<Notify>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Detector for BlockingDetector {
        async fn submit(&self, _image: ImageBuffer) -> Result<DetectEnvelope, DetectError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(serde_json::from_str(r#"{"emotions":["happy"]}"#).unwrap())
        }
    }

    fn controller_with(
        frames: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
    ) -> (CaptureController, RecordingSpeaker) {
        let speaker = RecordingSpeaker::default();
        let controller = CaptureController::new(frames, detector, Box::new(speaker.clone()));
        (controller, speaker)
    }

    #[test]
    fn test_initial_state_is_idle() {
        let (controller, _) =
            controller_with(Box::new(StaticFrames), Box::new(FailingDetector));
        let session = controller.session();
        assert_eq!(session.status, CaptureStatus::Idle);
        assert!(session.message.is_empty());
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_capture_single_bare_label() {
        let (controller, speaker) = controller_with(
            Box::new(StaticFrames),
            Box::new(CannedDetector::new(r#"{"emotions":["happy"]}"#)),
        );

        let session = controller.capture().await;
        assert_eq!(session.status, CaptureStatus::Succeeded);
        assert_eq!(session.message, "Detected Emotions: happy");
        assert!(session.started_at.is_some());
        assert_eq!(speaker.utterances(), vec!["You look happy! Keep smiling!"]);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_capture_labeled_records() {
        let (controller, speaker) = controller_with(
            Box::new(StaticFrames),
            Box::new(CannedDetector::new(
                r#"{"emotions":[{"emotion":"sad"},{"emotion":"angry"}]}"#,
            )),
        );

        let session = controller.capture().await;
        assert_eq!(session.message, "Detected Emotions: sad, angry");
        // Utterance follows the first label
        assert_eq!(speaker.utterances(), vec!["Why are you sad? Cheer up!"]);
    }

    #[tokio::test]
    async fn test_capture_empty_list_announces_fallback() {
        let (controller, speaker) = controller_with(
            Box::new(StaticFrames),
            Box::new(CannedDetector::new(r#"{"emotions":[]}"#)),
        );

        let session = controller.capture().await;
        assert_eq!(session.status, CaptureStatus::Succeeded);
        assert_eq!(session.message, "No emotions detected.");
        assert_eq!(speaker.utterances(), vec![FALLBACK_UTTERANCE]);
    }

    #[tokio::test]
    async fn test_capture_invalid_format() {
        let (controller, speaker) = controller_with(
            Box::new(StaticFrames),
            Box::new(CannedDetector::new(r#"{"emotions":"not-a-list"}"#)),
        );

        let session = controller.capture().await;
        assert_eq!(session.status, CaptureStatus::Succeeded);
        assert_eq!(session.message, "Invalid emotion data format received.");
        assert_eq!(speaker.utterances(), vec![FALLBACK_UTTERANCE]);
    }

    #[tokio::test]
    async fn test_network_failure_sets_failed_and_announces() {
        let (controller, speaker) =
            controller_with(Box::new(StaticFrames), Box::new(FailingDetector));

        let session = controller.capture().await;
        assert_eq!(session.status, CaptureStatus::Failed);
        assert_eq!(session.message, CAPTURE_FAILED_MESSAGE);
        assert_eq!(speaker.utterances(), vec![FALLBACK_UTTERANCE]);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_frame_failure_sets_failed_and_announces() {
        let (controller, speaker) =
            controller_with(Box::new(FailingFrames), Box::new(FailingDetector));

        let session = controller.capture().await;
        assert_eq!(session.status, CaptureStatus::Failed);
        assert_eq!(session.message, CAPTURE_FAILED_MESSAGE);
        assert_eq!(speaker.utterances(), vec![FALLBACK_UTTERANCE]);
    }

    #[tokio::test]
    async fn test_second_trigger_while_busy_is_rejected() {
        let gate = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = BlockingDetector {
            gate: gate.clone(),
            calls: calls.clone(),
        };
        let speaker = RecordingSpeaker::default();
        let controller = Arc::new(CaptureController::new(
            Box::new(StaticFrames),
            Box::new(detector),
            Box::new(speaker.clone()),
        ));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.capture().await })
        };

        // Wait for the first capture to reach the detector
        while calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(controller.is_busy());

        // Second trigger is a no-op: in-flight session untouched, detector
        // not invoked again
        let rejected = controller.capture().await;
        assert_eq!(rejected.status, CaptureStatus::Capturing);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(controller.is_busy());

        gate.notify_one();
        let done = first.await.unwrap();
        assert_eq!(done.status, CaptureStatus::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!controller.is_busy());

        // Controller is reusable after the run
        gate.notify_one();
        let again = controller.capture().await;
        assert_eq!(again.status, CaptureStatus::Succeeded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
