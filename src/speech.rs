//! Spoken feedback for detection results.
//!
//! Speech goes through the narrow `Speak` trait so tests can record
//! utterances instead of producing audio. The host implementation hands the
//! utterance to the platform speech engine and forgets about it; synthesis
//! failures are the engine's concern.

use tracing::{debug, warn};

pub const FALLBACK_UTTERANCE: &str = "I can't detect your emotion right now.";

/// Narrow interface to a speech sink
pub trait Speak: Send + Sync {
    fn speak(&self, text: &str);
}

/// Pick the utterance for the primary emotion.
///
/// Matching is exact and case-sensitive; anything outside the known labels
/// (including no label at all) gets the generic fallback.
pub fn utterance_for(primary: Option<&str>) -> &'static str {
    match primary {
        Some("happy") => "You look happy! Keep smiling!",
        Some("sad") => "Why are you sad? Cheer up!",
        Some("surprise") => "You look surprised! What happened?",
        Some("fear") => "Why are you afraid?",
        Some("angry") => "Why are you angry?",
        _ => FALLBACK_UTTERANCE,
    }
}

/// Announce the primary emotion with one utterance
pub fn announce(speaker: &dyn Speak, primary: Option<&str>) {
    let utterance = utterance_for(primary);
    debug!("Announcing: {}", utterance);
    speaker.speak(utterance);
}

/// Speech via the host platform's text-to-speech engine
pub struct HostSpeaker;

impl Speak for HostSpeaker {
    fn speak(&self, text: &str) {
        if let Err(e) = spawn_host_speech(text) {
            warn!("Speech synthesis unavailable: {}", e);
        }
    }
}

#[cfg(target_os = "macos")]
fn spawn_host_speech(text: &str) -> Result<(), String> {
    let mut cmd = std::process::Command::new("say");
    cmd.arg(text);
    spawn_detached(cmd).map_err(|e| format!("failed to run say: {}", e))
}

#[cfg(target_os = "linux")]
fn spawn_host_speech(text: &str) -> Result<(), String> {
    // speech-dispatcher first, espeak as a fallback
    for engine in ["spd-say", "espeak"] {
        let mut cmd = std::process::Command::new(engine);
        cmd.arg(text);
        match spawn_detached(cmd) {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(format!("failed to run {}: {}", engine, e)),
        }
    }
    Err("no speech engine found (tried spd-say, espeak)".to_string())
}

/// Spawn a host command without waiting for it, handing the child to a
/// background thread so finished utterances don't linger as zombies.
#[cfg(any(target_os = "macos", target_os = "linux"))]
fn spawn_detached(mut cmd: std::process::Command) -> std::io::Result<()> {
    let mut child = cmd
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;
    std::thread::spawn(move || {
        let _ = child.wait();
    });
    Ok(())
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn spawn_host_speech(_text: &str) -> Result<(), String> {
    Err("speech synthesis is not supported on this platform".to_string())
}

/// Silent sink for --mute
pub struct NullSpeaker;

impl Speak for NullSpeaker {
    fn speak(&self, _text: &str) {}
}
