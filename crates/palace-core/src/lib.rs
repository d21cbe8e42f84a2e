// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Palace proactive memory pipeline.
//!
//! Shared data model, the error taxonomy, collaborator traits and the
//! in-process trigger store. Every other palace crate depends on this one.

pub mod error;
pub mod protocol;
pub mod store;
pub mod traits;
pub mod types;

pub use error::PalaceError;
pub use store::{EngagementRecord, InMemoryCorpus, MarkOutcome, TriggerStore};
pub use traits::{
    Clock, Collaborator, CollaboratorKind, ConversationMode, MemoryCorpus, NarrationRequest,
    NarrationWriter, SceneScript, ShowScript, SignificanceScorer, SpeechSynthesizer,
    SynthesizedSpeech, SystemClock,
};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degradable_errors() {
        assert!(PalaceError::unavailable("tts", "down").is_degradable());
        assert!(
            PalaceError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }
            .is_degradable()
        );
        assert!(!PalaceError::AuthFailure("bad token".into()).is_degradable());
    }

    #[test]
    fn invalid_transition_message_names_states() {
        let err = PalaceError::InvalidTransition {
            id: TriggerId::from("t1"),
            from: DeliveryState::Dismissed,
            to: DeliveryState::Queued,
        };
        assert_eq!(
            err.to_string(),
            "trigger t1 cannot move from dismissed to queued"
        );
    }

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _scorer(_: &dyn SignificanceScorer) {}
        fn _synth(_: &dyn SpeechSynthesizer) {}
        fn _narrator(_: &dyn NarrationWriter) {}
        fn _corpus(_: &dyn MemoryCorpus) {}
        fn _clock(_: &dyn Clock) {}
    }
}
