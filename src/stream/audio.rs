//! Silent audio source for streams that must carry an audio track.
//!
//! Some recorders refuse a stream without audio, so every bootstrapped stream
//! gets a near-inaudible sine track. The graph behind it is built lazily on
//! first request and shared by every track it hands out.

use crate::stream::media::AudioTrack;
use anyhow::{bail, Result};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SilentAudioSettings {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

fn default_sample_rate() -> u32 {
    48_000
}

fn default_frequency_hz() -> f32 {
    440.0
}

fn default_amplitude() -> f32 {
    0.001
}

impl Default for SilentAudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            frequency_hz: default_frequency_hz(),
            amplitude: default_amplitude(),
        }
    }
}

impl SilentAudioSettings {
    pub fn sanitize(&mut self) {
        if !self.amplitude.is_finite() {
            self.amplitude = default_amplitude();
        }
        self.amplitude = self.amplitude.clamp(0.0, 1.0);
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            self.frequency_hz = default_frequency_hz();
        }
    }
}

#[derive(Debug)]
struct SineGraph {
    table: Arc<[f32]>,
    tracks: Vec<AudioTrack>,
    closed: bool,
}

impl SineGraph {
    /// One second of samples, so integral frequencies loop seamlessly.
    fn build(settings: &SilentAudioSettings) -> Result<Self> {
        let SilentAudioSettings {
            sample_rate,
            frequency_hz,
            amplitude,
        } = *settings;
        if sample_rate == 0 {
            bail!("audio sample rate must be positive");
        }
        let nyquist = sample_rate as f32 / 2.0;
        if !(frequency_hz > 0.0 && frequency_hz < nyquist) {
            bail!("tone frequency {frequency_hz} Hz outside (0, {nyquist}) Hz");
        }
        if !(0.0..=1.0).contains(&amplitude) {
            bail!("tone amplitude {amplitude} outside [0, 1]");
        }

        let table: Arc<[f32]> = (0..sample_rate)
            .map(|i| amplitude * (TAU * frequency_hz * i as f32 / sample_rate as f32).sin())
            .collect();
        tracing::debug!(sample_rate, frequency_hz, amplitude, "silent audio graph created");
        Ok(Self {
            table,
            tracks: Vec::new(),
            closed: false,
        })
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for track in self.tracks.drain(..) {
            track.stop();
        }
        tracing::debug!("silent audio graph closed");
    }
}

/// Hands out silent audio tracks backed by a lazily created sine graph.
#[derive(Debug)]
pub struct SilentAudioProvider {
    settings: SilentAudioSettings,
    graph: OnceCell<SineGraph>,
    issued: u64,
}

pub type SharedSilentAudio = Arc<Mutex<SilentAudioProvider>>;

impl Default for SilentAudioProvider {
    fn default() -> Self {
        Self::new(SilentAudioSettings::default())
    }
}

impl SilentAudioProvider {
    pub fn new(settings: SilentAudioSettings) -> Self {
        Self {
            settings,
            graph: OnceCell::new(),
            issued: 0,
        }
    }

    pub fn shared(self) -> SharedSilentAudio {
        Arc::new(Mutex::new(self))
    }

    /// A live track playing the silent tone. When the graph cannot be built
    /// the caller still gets a track: an inert placeholder.
    pub fn silent_track(&mut self) -> AudioTrack {
        self.issued += 1;
        let id = format!("silent-audio-{}", self.issued);

        let settings = &self.settings;
        if let Err(err) = self.graph.get_or_try_init(|| SineGraph::build(settings)) {
            tracing::warn!(error = %err, "silent audio unavailable, using placeholder track");
            return AudioTrack::placeholder(id);
        }
        let Some(graph) = self.graph.get_mut() else {
            return AudioTrack::placeholder(id);
        };
        graph.tracks.retain(AudioTrack::is_live);
        let track = AudioTrack::from_table(id, Arc::clone(&graph.table));
        graph.tracks.push(track.clone());
        track
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.get().is_some()
    }

    pub fn live_track_count(&self) -> usize {
        self.graph
            .get()
            .map(|graph| graph.tracks.iter().filter(|track| track.is_live()).count())
            .unwrap_or(0)
    }

    /// Closes the graph and stops every track it issued. Returns false when
    /// there was nothing to tear down.
    pub fn teardown(&mut self) -> bool {
        match self.graph.take() {
            Some(mut graph) => {
                graph.close();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SilentAudioProvider, SilentAudioSettings};

    #[test]
    fn graph_is_created_lazily_and_shared() {
        let mut provider = SilentAudioProvider::default();
        assert!(!provider.is_initialized());

        let first = provider.silent_track();
        let second = provider.silent_track();
        assert!(provider.is_initialized());
        assert_eq!(provider.live_track_count(), 2);
        assert!(!first.is_placeholder());
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn tone_stays_below_amplitude() {
        let mut provider = SilentAudioProvider::default();
        let track = provider.silent_track();
        let mut samples = vec![0.0f32; 480];
        track.read(&mut samples);

        assert!(samples.iter().all(|s| s.abs() <= 0.001 + f32::EPSILON));
        assert!(samples.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn teardown_stops_tracks_and_is_idempotent() {
        let mut provider = SilentAudioProvider::default();
        assert!(!provider.teardown());

        let track = provider.silent_track();
        assert!(provider.teardown());
        assert!(!track.is_live());
        assert!(!provider.teardown());
        assert!(!provider.is_initialized());

        let fresh = provider.silent_track();
        assert!(fresh.is_live());
        assert!(provider.is_initialized());
    }

    #[test]
    fn ended_tracks_are_pruned_on_issue() {
        let mut provider = SilentAudioProvider::default();
        for _ in 0..5 {
            provider.silent_track().stop();
        }
        let live = provider.silent_track();

        let graph = provider.graph.get().expect("graph built");
        assert_eq!(graph.tracks.len(), 1);
        assert_eq!(graph.tracks[0].id(), live.id());
        assert_eq!(provider.live_track_count(), 1);
    }

    #[test]
    fn invalid_graph_yields_placeholder() {
        let mut provider = SilentAudioProvider::new(SilentAudioSettings {
            sample_rate: 0,
            ..SilentAudioSettings::default()
        });
        let track = provider.silent_track();
        assert!(track.is_placeholder());
        assert!(track.is_live());
        assert!(!provider.is_initialized());
    }

    #[test]
    fn sanitize_repairs_non_finite_values() {
        let mut settings = SilentAudioSettings {
            sample_rate: 48_000,
            frequency_hz: f32::NAN,
            amplitude: 5.0,
        };
        settings.sanitize();
        assert_eq!(settings.frequency_hz, 440.0);
        assert_eq!(settings.amplitude, 1.0);
    }
}
