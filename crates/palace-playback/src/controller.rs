// SPDX-FileCopyrightText: 2026 Palace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The playback state machine.

use std::time::Duration;

use tracing::debug;

use palace_core::{CinematicShow, DirectorResponse, Scene};

use crate::config::PlaybackConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Intro { scene: usize },
    Playing { scene: usize },
    Transition { from: usize, to: usize },
    Complete,
    Dismissed,
}

impl PlaybackState {
    /// Index of the scene on screen. `None` outside a show.
    pub fn scene(&self) -> Option<usize> {
        match *self {
            PlaybackState::Intro { scene } | PlaybackState::Playing { scene } => Some(scene),
            PlaybackState::Transition { from, .. } => Some(from),
            PlaybackState::Idle | PlaybackState::Complete | PlaybackState::Dismissed => None,
        }
    }

    /// A show is running.
    pub fn is_active(&self) -> bool {
        self.scene().is_some()
    }
}

/// Instructions for the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Show this text; no show is started.
    Narrative { message: String },
    ShowStarted {
        show_id: String,
        title: String,
        scene_count: usize,
    },
    /// Title/subtitle overlay for the upcoming scene.
    Intro { scene: usize, narration: String },
    /// Start media and, when present, narration audio. `hold` drives the
    /// progress indicator and may grow if the media reports a longer length.
    Playing {
        scene: usize,
        hold: Duration,
        content_ref: String,
        audio_ref: Option<String>,
    },
    /// Stop and free the audio/video started for `scene`.
    ReleaseMedia { scene: usize },
    Transition { from: usize, to: usize },
    Complete { show_id: String },
    Dismissed { show_id: String },
}

struct ActiveShow {
    id: String,
    show: CinematicShow,
    /// Time spent in the current phase.
    elapsed: Duration,
    /// Intrinsic media length reported for the current scene.
    media: Option<Duration>,
}

pub struct PlaybackController {
    config: PlaybackConfig,
    state: PlaybackState,
    active: Option<ActiveShow>,
}

impl PlaybackController {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            state: PlaybackState::Idle,
            active: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The scene currently on screen.
    pub fn current_scene(&self) -> Option<&Scene> {
        let index = self.state.scene()?;
        self.active.as_ref()?.show.scenes().get(index)
    }

    /// Fraction of the current scene's hold already played, while `Playing`.
    pub fn progress(&self) -> Option<f64> {
        let PlaybackState::Playing { scene } = self.state else {
            return None;
        };
        let active = self.active.as_ref()?;
        let hold = self.scene_hold(active, scene);
        if hold.is_zero() {
            return Some(1.0);
        }
        Some((active.elapsed.as_secs_f64() / hold.as_secs_f64()).min(1.0))
    }

    /// Take a director response. A show replaces whatever was playing and
    /// always starts at scene 0; a narrative only produces its text.
    pub fn accept(&mut self, show_id: impl Into<String>, response: &DirectorResponse) -> Vec<PlaybackEvent> {
        let show = match response {
            DirectorResponse::Narrative { message } => {
                return vec![PlaybackEvent::Narrative {
                    message: message.clone(),
                }];
            }
            DirectorResponse::CinematicShow(show) => show,
        };

        let mut events = self.release_current();
        let id = show_id.into();
        debug!(show_id = %id, scenes = show.len(), "show accepted");
        events.push(PlaybackEvent::ShowStarted {
            show_id: id.clone(),
            title: show.title().to_string(),
            scene_count: show.len(),
        });
        self.active = Some(ActiveShow {
            id,
            show: show.clone(),
            elapsed: Duration::ZERO,
            media: None,
        });
        events.push(self.enter_intro(0));
        events
    }

    /// Advance by `elapsed`, crossing as many phase boundaries as it covers.
    pub fn advance(&mut self, elapsed: Duration) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        let mut remaining = elapsed;
        while let Some(hold) = self.phase_hold() {
            let Some(active) = self.active.as_mut() else {
                break;
            };
            let left = hold.saturating_sub(active.elapsed);
            if remaining < left {
                active.elapsed += remaining;
                break;
            }
            remaining -= left;
            events.extend(self.finish_phase());
        }
        events
    }

    /// The media player learned the scene's intrinsic length. Ignored unless
    /// `scene` is the one being introduced or played.
    pub fn report_media_duration(&mut self, scene: usize, duration: Duration) -> bool {
        let current = match self.state {
            PlaybackState::Intro { scene } | PlaybackState::Playing { scene } => scene,
            _ => return false,
        };
        if current != scene {
            return false;
        }
        match self.active.as_mut() {
            Some(active) => {
                active.media = Some(duration);
                true
            }
            None => false,
        }
    }

    /// User dismissal. Ends any running show at once; a no-op otherwise.
    pub fn dismiss(&mut self) -> Vec<PlaybackEvent> {
        if !self.state.is_active() {
            return Vec::new();
        }
        let mut events = self.release_current();
        if let Some(active) = self.active.take() {
            debug!(show_id = %active.id, state = ?self.state, "show dismissed");
            events.push(PlaybackEvent::Dismissed { show_id: active.id });
        }
        self.state = PlaybackState::Dismissed;
        events
    }

    fn phase_hold(&self) -> Option<Duration> {
        let active = self.active.as_ref()?;
        match self.state {
            PlaybackState::Intro { .. } => Some(self.config.intro()),
            PlaybackState::Playing { scene } => Some(self.scene_hold(active, scene)),
            PlaybackState::Transition { .. } => Some(self.config.transition()),
            PlaybackState::Idle | PlaybackState::Complete | PlaybackState::Dismissed => None,
        }
    }

    /// `max(narration, media)`, or the configured minimum when neither is known.
    fn scene_hold(&self, active: &ActiveShow, scene: usize) -> Duration {
        let narration = active
            .show
            .scenes()
            .get(scene)
            .and_then(|s| s.narration_duration_ms)
            .map(Duration::from_millis);
        match (narration, active.media) {
            (Some(a), Some(b)) => a.max(b),
            (Some(d), None) | (None, Some(d)) => d,
            (None, None) => self.config.min_scene(),
        }
    }

    fn finish_phase(&mut self) -> Vec<PlaybackEvent> {
        match self.state {
            PlaybackState::Intro { scene } => vec![self.enter_playing(scene)],
            PlaybackState::Playing { scene } => {
                let mut events = vec![PlaybackEvent::ReleaseMedia { scene }];
                let count = self.active.as_ref().map_or(0, |a| a.show.len());
                if scene + 1 < count {
                    self.reset_phase(false);
                    self.state = PlaybackState::Transition {
                        from: scene,
                        to: scene + 1,
                    };
                    events.push(PlaybackEvent::Transition {
                        from: scene,
                        to: scene + 1,
                    });
                } else {
                    self.state = PlaybackState::Complete;
                    if let Some(active) = self.active.take() {
                        debug!(show_id = %active.id, "show complete");
                        events.push(PlaybackEvent::Complete { show_id: active.id });
                    }
                }
                events
            }
            PlaybackState::Transition { to, .. } => vec![self.enter_intro(to)],
            PlaybackState::Idle | PlaybackState::Complete | PlaybackState::Dismissed => Vec::new(),
        }
    }

    fn enter_intro(&mut self, scene: usize) -> PlaybackEvent {
        self.reset_phase(true);
        self.state = PlaybackState::Intro { scene };
        let narration = self
            .active
            .as_ref()
            .and_then(|a| a.show.scenes().get(scene))
            .map(|s| s.narration.clone())
            .unwrap_or_default();
        PlaybackEvent::Intro { scene, narration }
    }

    fn enter_playing(&mut self, scene: usize) -> PlaybackEvent {
        self.reset_phase(false);
        self.state = PlaybackState::Playing { scene };
        let (hold, content_ref, audio_ref) = match self.active.as_ref() {
            Some(active) => {
                let hold = self.scene_hold(active, scene);
                let current = active.show.scenes().get(scene);
                (
                    hold,
                    current.map(|s| s.memory.content_ref.clone()).unwrap_or_default(),
                    current.and_then(|s| s.narration_audio_ref.clone()),
                )
            }
            None => (self.config.min_scene(), String::new(), None),
        };
        PlaybackEvent::Playing {
            scene,
            hold,
            content_ref,
            audio_ref,
        }
    }

    /// Zero the phase clock; a new scene also forgets the old media length.
    fn reset_phase(&mut self, new_scene: bool) {
        if let Some(active) = self.active.as_mut() {
            active.elapsed = Duration::ZERO;
            if new_scene {
                active.media = None;
            }
        }
    }

    fn release_current(&mut self) -> Vec<PlaybackEvent> {
        match self.state {
            PlaybackState::Playing { scene } => vec![PlaybackEvent::ReleaseMedia { scene }],
            _ => Vec::new(),
        }
    }
}

impl Default for PlaybackController {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}
