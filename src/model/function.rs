use serde::{Deserialize, Serialize};

use crate::config::StepConfig;
use crate::constants;
use crate::model::synth::ChannelId;

/// The five logical control channels, one per physical encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlFunction {
    AmplitudeA,
    AmplitudeB,
    Frequency,
    Phase,
    Harmonics,
}

pub const FUNCTIONS: [ControlFunction; 5] = [
    ControlFunction::AmplitudeA,
    ControlFunction::AmplitudeB,
    ControlFunction::Frequency,
    ControlFunction::Phase,
    ControlFunction::Harmonics,
];

/// How a short press cycles the function's selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Always drives every synth/channel; press does nothing.
    FixedAll,
    /// Individual mode varies the synth only, channel is fixed.
    CycleSynth(ChannelId),
    /// Individual mode varies both synth and channel.
    CycleSynthChannel,
}

/// Scalar parameter a function writes through the dispatcher. Harmonics is
/// the odd one out and is handled by its own path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarParam {
    Amplitude,
    Frequency,
    Phase,
}

impl ControlFunction {
    pub fn index(&self) -> usize {
        match self {
            ControlFunction::AmplitudeA => 0,
            ControlFunction::AmplitudeB => 1,
            ControlFunction::Frequency => 2,
            ControlFunction::Phase => 3,
            ControlFunction::Harmonics => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ControlFunction::AmplitudeA => "Amplitude A",
            ControlFunction::AmplitudeB => "Amplitude B",
            ControlFunction::Frequency => "Frequency",
            ControlFunction::Phase => "Phase",
            ControlFunction::Harmonics => "Harmonics",
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        match self {
            ControlFunction::AmplitudeA => SelectionPolicy::CycleSynth(ChannelId::A),
            ControlFunction::AmplitudeB => SelectionPolicy::CycleSynth(ChannelId::B),
            ControlFunction::Frequency => SelectionPolicy::FixedAll,
            ControlFunction::Phase => SelectionPolicy::CycleSynthChannel,
            ControlFunction::Harmonics => SelectionPolicy::CycleSynthChannel,
        }
    }

    pub fn scalar_param(&self) -> Option<ScalarParam> {
        match self {
            ControlFunction::AmplitudeA | ControlFunction::AmplitudeB => {
                Some(ScalarParam::Amplitude)
            }
            ControlFunction::Frequency => Some(ScalarParam::Frequency),
            ControlFunction::Phase => Some(ScalarParam::Phase),
            ControlFunction::Harmonics => None,
        }
    }

    /// Value delta for one encoder detent.
    pub fn step(&self, steps: &StepConfig) -> f64 {
        match self {
            ControlFunction::AmplitudeA | ControlFunction::AmplitudeB => steps.amplitude,
            ControlFunction::Frequency => steps.frequency,
            ControlFunction::Phase => steps.phase,
            ControlFunction::Harmonics => steps.harmonic,
        }
    }

    pub fn led_color(&self) -> (u8, u8, u8) {
        match self {
            ControlFunction::AmplitudeA => constants::LED_AMPLITUDE_A,
            ControlFunction::AmplitudeB => constants::LED_AMPLITUDE_B,
            ControlFunction::Frequency => constants::LED_FREQUENCY,
            ControlFunction::Phase => constants::LED_PHASE,
            ControlFunction::Harmonics => constants::LED_HARMONICS,
        }
    }
}

impl std::fmt::Display for ControlFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
