use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CHANNELS;
use crate::waveform::Waveform;

/// A fixed set of named channels, each holding one independent Waveform.
///
/// Channels are independent amplitude subspaces: normalization is per
/// channel, never joint. Unknown channel names are created empty on first
/// mutable access rather than failing.
/// Serializes as `{ channelName: WaveformJSON, ... }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MultiChannelWaveform {
    channels: BTreeMap<String, Waveform>,
}

impl MultiChannelWaveform {
    /// Container with the six default channels, all empty.
    pub fn new() -> Self {
        let mut channels = BTreeMap::new();
        for name in DEFAULT_CHANNELS {
            channels.insert(name.to_string(), Waveform::new());
        }
        Self { channels }
    }

    /// Container with no channels at all; channels appear lazily.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn channel(&self, name: &str) -> Option<&Waveform> {
        self.channels.get(name)
    }

    /// Mutable channel access, creating an empty Waveform for unknown names.
    pub fn channel_mut(&mut self, name: &str) -> &mut Waveform {
        self.channels.entry(name.to_string()).or_default()
    }

    pub fn set_channel(&mut self, name: impl Into<String>, waveform: Waveform) {
        self.channels.insert(name.into(), waveform);
    }

    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Waveform)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total squared magnitude of one channel, 0 when absent.
    pub fn energy(&self, name: &str) -> f64 {
        self.channels
            .get(name)
            .map(|w| w.total_magnitude_sq())
            .unwrap_or(0.0)
    }

    /// Normalize every channel independently. No cross-channel relationship
    /// holds afterward.
    pub fn normalize_all(&mut self) {
        for waveform in self.channels.values_mut() {
            waveform.normalize();
        }
    }
}
