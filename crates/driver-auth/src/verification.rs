//! Bounded verification attempt
//!
//! The matcher answers one frame at a time. A verification attempt keeps
//! feeding frames until a driver is recognized or the frame budget runs out.

use tracing::{debug, info};
use video_frame::VideoFrame;

use crate::{AuthModule, AuthResult, FaceClassifier};

/// Default frame budget for one attempt
pub const DEFAULT_MAX_FRAMES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Keep supplying frames
    Pending,
    /// Driver recognized
    Verified(String),
    /// Frame budget used up without a match
    Exhausted,
}

/// One verification attempt over at most `max_frames` frames
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    max_frames: usize,
    frames_seen: usize,
    outcome: Option<VerificationStatus>,
}

impl Default for VerificationAttempt {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAMES)
    }
}

impl VerificationAttempt {
    pub fn new(max_frames: usize) -> Self {
        Self {
            max_frames: max_frames.max(1),
            frames_seen: 0,
            outcome: None,
        }
    }

    pub fn frames_seen(&self) -> usize {
        self.frames_seen
    }

    /// Feed one frame. Once the attempt has finished, the final status is
    /// returned again without consulting the matcher.
    pub fn observe<C: FaceClassifier>(
        &mut self,
        auth: &mut AuthModule<C>,
        frame: &VideoFrame,
    ) -> VerificationStatus {
        if let Some(done) = &self.outcome {
            return done.clone();
        }
        self.frames_seen += 1;

        let status = match auth.authenticate(frame) {
            AuthResult::Authenticated { identity, .. } => {
                info!("Verified '{}' after {} frame(s)", identity, self.frames_seen);
                VerificationStatus::Verified(identity)
            }
            other if self.frames_seen >= self.max_frames => {
                info!(
                    "Verification failed after {} frames (last result {:?})",
                    self.frames_seen, other
                );
                VerificationStatus::Exhausted
            }
            other => {
                debug!("Verification frame {}: {:?}", self.frames_seen, other);
                VerificationStatus::Pending
            }
        };

        if status != VerificationStatus::Pending {
            self.outcome = Some(status.clone());
        }
        status
    }
}
