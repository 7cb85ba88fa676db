use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::model::function::{ControlFunction, SelectionPolicy, FUNCTIONS};
use crate::model::selection::SelectionMode;
use crate::model::synth::ChannelId;

/// The set of (synth, channel) pairs one operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    One { synth: usize, channel: ChannelId },
}

impl Scope {
    /// Expands to the concrete target list for `function` over `num_synths`
    /// devices. Under `All`, amplitude functions fix their channel; the rest
    /// cover both channels of every synth.
    pub fn targets(&self, function: ControlFunction, num_synths: usize) -> Vec<(usize, ChannelId)> {
        match *self {
            Scope::One { synth, channel } => vec![(synth, channel)],
            Scope::All => match function.policy() {
                SelectionPolicy::CycleSynth(ch) => (0..num_synths).map(|i| (i, ch)).collect(),
                SelectionPolicy::FixedAll | SelectionPolicy::CycleSynthChannel => (0..num_synths)
                    .flat_map(|i| ChannelId::BOTH.into_iter().map(move |ch| (i, ch)))
                    .collect(),
            },
        }
    }
}

/// Broadcast shape of the per-function selection modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub amplitude_a: SelectionMode,
    pub amplitude_b: SelectionMode,
    pub frequency: SelectionMode,
    pub phase: SelectionMode,
    pub harmonics: SelectionMode,
}

struct FunctionState {
    mode: SelectionMode,
    last_changed: Instant,
}

/// Per-function selection state machine with inactivity reversion.
pub struct SelectionController {
    num_synths: usize,
    timeout: Duration,
    states: Vec<FunctionState>,
}

impl SelectionController {
    pub fn new(num_synths: usize, timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            num_synths,
            timeout,
            states: FUNCTIONS
                .iter()
                .map(|_| FunctionState {
                    mode: SelectionMode::All,
                    last_changed: now,
                })
                .collect(),
        }
    }

    pub fn mode(&self, function: ControlFunction) -> SelectionMode {
        self.states[function.index()].mode
    }

    pub fn resolve_scope(&self, function: ControlFunction) -> Scope {
        match self.states[function.index()].mode {
            SelectionMode::All => Scope::All,
            SelectionMode::Individual { synth, channel } => Scope::One {
                synth,
                channel,
            },
        }
    }

    /// Ordered cycle of valid selection states for a function: `All` first,
    /// then every permitted (synth, channel) combination.
    fn cycle(&self, function: ControlFunction) -> Vec<SelectionMode> {
        let mut states = vec![SelectionMode::All];
        match function.policy() {
            SelectionPolicy::FixedAll => {}
            SelectionPolicy::CycleSynth(channel) => {
                for synth in 0..self.num_synths {
                    states.push(SelectionMode::Individual { synth, channel });
                }
            }
            SelectionPolicy::CycleSynthChannel => {
                for synth in 0..self.num_synths {
                    for channel in ChannelId::BOTH {
                        states.push(SelectionMode::Individual { synth, channel });
                    }
                }
            }
        }
        states
    }

    /// Short press: advance to the next state in the function's cycle.
    pub fn advance(&mut self, function: ControlFunction, now: Instant) {
        let cycle = self.cycle(function);
        if cycle.len() == 1 {
            log::info!("{function} always controls all synths simultaneously");
            return;
        }
        let state = &mut self.states[function.index()];
        let current = cycle.iter().position(|m| *m == state.mode).unwrap_or(0);
        state.mode = cycle[(current + 1) % cycle.len()];
        state.last_changed = now;
        log::info!("{function}: selection -> {}", state.mode);
    }

    /// Rotation counts as activity and staves off the timeout reversion.
    pub fn touch(&mut self, function: ControlFunction, now: Instant) {
        self.states[function.index()].last_changed = now;
    }

    /// Once-per-tick sweep reverting stale individual modes to `All`.
    pub fn sweep_timeouts(&mut self, now: Instant) {
        for function in FUNCTIONS {
            let state = &mut self.states[function.index()];
            if state.mode.is_individual()
                && now.duration_since(state.last_changed) > self.timeout
            {
                state.mode = SelectionMode::All;
                state.last_changed = now;
                log::info!("{function}: selection timeout, reverted to ALL");
            }
        }
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            amplitude_a: self.mode(ControlFunction::AmplitudeA),
            amplitude_b: self.mode(ControlFunction::AmplitudeB),
            frequency: self.mode(ControlFunction::Frequency),
            phase: self.mode(ControlFunction::Phase),
            harmonics: self.mode(ControlFunction::Harmonics),
        }
    }
}
