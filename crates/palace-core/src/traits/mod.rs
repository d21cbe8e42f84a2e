// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Remote collaborators extend the [`Collaborator`] base trait and use
//! `#[async_trait]` so they can sit behind `Arc<dyn ...>`.

pub mod clock;
pub mod collaborator;
pub mod corpus;
pub mod narration;
pub mod scorer;
pub mod speech;

pub use clock::{Clock, SystemClock};
pub use collaborator::{Collaborator, CollaboratorKind};
pub use corpus::MemoryCorpus;
pub use narration::{ConversationMode, NarrationRequest, NarrationWriter, SceneScript, ShowScript};
pub use scorer::SignificanceScorer;
pub use speech::{SpeechSynthesizer, SynthesizedSpeech};
