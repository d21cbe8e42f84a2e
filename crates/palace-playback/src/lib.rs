// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Playback of director responses on the client.
//!
//! [`PlaybackController`] is a finite-state machine advanced by discrete
//! elapsed-time inputs. It never touches a clock or a media API; it emits
//! [`PlaybackEvent`]s the rendering layer acts on, so every timing rule can
//! be tested without real playback.
//!
//! ```text
//! Idle -> Intro(0) -> Playing(0) -> Transition(0, 1) -> Intro(1) -> ... -> Complete
//!            \______________\_______________\______________________________-> Dismissed
//! ```

pub mod config;
pub mod controller;

pub use config::PlaybackConfig;
pub use controller::{PlaybackController, PlaybackEvent, PlaybackState};
