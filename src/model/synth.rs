use serde::{Deserialize, Serialize};

use crate::constants::MIN_HARMONIC_ORDER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    A,
    B,
}

impl ChannelId {
    pub const BOTH: [ChannelId; 2] = [ChannelId::A, ChannelId::B];

    /// Single-character channel selector used by the device wire protocol.
    pub fn wire(&self) -> char {
        match self {
            ChannelId::A => 'a',
            ChannelId::B => 'b',
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelId::A => "A",
            ChannelId::B => "B",
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single overtone slot within a channel's harmonic list.
///
/// `id` is the stable identity: it is assigned once at creation and never
/// reused, so an operator changing `order` on an existing slot keeps editing
/// the same slot rather than spawning a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmonic {
    #[serde(default)]
    pub id: u64,
    pub order: u32,
    pub amplitude: f64,
    #[serde(default)]
    pub phase: f64,
}

impl Harmonic {
    /// Amplitude 0 or a sub-minimum order means the slot is logically
    /// deleted: it must be removed from the list, not merely zeroed.
    pub fn is_deleted(&self) -> bool {
        self.amplitude <= 0.0 || self.order < MIN_HARMONIC_ORDER
    }

    /// The device only addresses odd overtones at or above the minimum
    /// order; anything else is unrepresentable, not merely deleted.
    pub fn has_valid_order(&self) -> bool {
        self.order >= MIN_HARMONIC_ORDER && self.order % 2 == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelParams {
    pub amplitude: f64,
    pub frequency: f64,
    pub phase: f64,
    pub harmonics: Vec<Harmonic>,
}

impl ChannelParams {
    pub fn harmonic_by_id(&self, id: u64) -> Option<&Harmonic> {
        self.harmonics.iter().find(|h| h.id == id)
    }

    pub fn harmonic_by_id_mut(&mut self, id: u64) -> Option<&mut Harmonic> {
        self.harmonics.iter_mut().find(|h| h.id == id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthParams {
    pub a: ChannelParams,
    pub b: ChannelParams,
}

impl SynthParams {
    pub fn channel(&self, ch: ChannelId) -> &ChannelParams {
        match ch {
            ChannelId::A => &self.a,
            ChannelId::B => &self.b,
        }
    }

    pub fn channel_mut(&mut self, ch: ChannelId) -> &mut ChannelParams {
        match ch {
            ChannelId::A => &mut self.a,
            ChannelId::B => &mut self.b,
        }
    }
}
