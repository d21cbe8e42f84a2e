// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Director decides how a set of memories is presented: a plain
//! narrative reply, or a cinematic show with one narrated scene per memory.

pub mod director;
pub mod narration;

pub use director::{Director, DirectorSettings, Modality, RespondRequest};
pub use narration::{FALLBACK_MESSAGE, TemplateNarrator};
