use serde::{Deserialize, Serialize};

use crate::model::synth::ChannelId;
use crate::selection::SelectionSnapshot;
use crate::store::SynthRecord;

/// Command submitted by an external producer (dashboard backend), drained
/// once per control-loop tick and validated like encoder input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ExternalCommand {
    SetAmplitude {
        synth_id: usize,
        channel: ChannelId,
        value: f64,
    },
    SetFrequency {
        synth_id: usize,
        channel: ChannelId,
        value: f64,
    },
    SetPhase {
        synth_id: usize,
        channel: ChannelId,
        value: f64,
    },
    SetHarmonics {
        synth_id: usize,
        channel: ChannelId,
        value: HarmonicUpdate,
    },
    SetEnabled {
        synth_id: usize,
        channel: ChannelId,
        value: bool,
    },
}

impl ExternalCommand {
    pub fn synth_id(&self) -> usize {
        match self {
            ExternalCommand::SetAmplitude { synth_id, .. }
            | ExternalCommand::SetFrequency { synth_id, .. }
            | ExternalCommand::SetPhase { synth_id, .. }
            | ExternalCommand::SetHarmonics { synth_id, .. }
            | ExternalCommand::SetEnabled { synth_id, .. } => *synth_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonicUpdate {
    /// 0 means "no id supplied": a fresh slot id is allocated.
    #[serde(default)]
    pub id: u64,
    pub order: u32,
    pub amplitude: f64,
    #[serde(default)]
    pub phase: f64,
}

/// Full state pushed to subscribers, only on change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub synths: Vec<SynthRecord>,
    pub selection_mode: SelectionSnapshot,
}
