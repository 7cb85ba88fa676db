use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::{BoundsConfig, StepConfig};
use crate::constants::{
    AMPLITUDE_MAX, AMPLITUDE_MIN, HARMONIC_SEED_PHASE_A, HARMONIC_SEED_PHASE_B,
    MIN_HARMONIC_ORDER, PHASE_MAX, PHASE_MIN,
};
use crate::device::SynthDevice;
use crate::messages::{ExternalCommand, HarmonicUpdate};
use crate::model::function::{ControlFunction, ScalarParam};
use crate::model::synth::{ChannelId, Harmonic};
use crate::selection::Scope;
use crate::store::{round2, ParameterStore};

/// Validates proposed parameter changes, applies them to the store and
/// forwards device commands. Every mutation path (encoder rotation, hold
/// reset, external queue) funnels through here on the control-loop thread.
pub struct CommandDispatcher {
    store: Arc<Mutex<ParameterStore>>,
    devices: Vec<Box<dyn SynthDevice>>,
    steps: StepConfig,
    bounds: BoundsConfig,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<Mutex<ParameterStore>>,
        devices: Vec<Box<dyn SynthDevice>>,
        steps: StepConfig,
        bounds: BoundsConfig,
    ) -> Self {
        Self {
            store,
            devices,
            steps,
            bounds,
        }
    }

    pub fn num_synths(&self) -> usize {
        self.devices.len()
    }

    fn bounds_for(&self, param: ScalarParam) -> (f64, f64) {
        match param {
            ScalarParam::Amplitude => (AMPLITUDE_MIN, AMPLITUDE_MAX),
            ScalarParam::Frequency => (self.bounds.frequency_min, self.bounds.frequency_max),
            ScalarParam::Phase => (PHASE_MIN, PHASE_MAX),
        }
    }

    fn validate_scalar(&self, param: ScalarParam, value: f64) -> crate::error::Result<()> {
        let (min, max) = self.bounds_for(param);
        if value < min || value > max {
            return Err(crate::error::HostError::Validation(format!(
                "{param:?} {value:.2} outside limits ({min}-{max})"
            )));
        }
        Ok(())
    }

    /// Applies one encoder rotation to every target in scope. All-or-nothing:
    /// if any candidate value would leave its bound, nothing is mutated and
    /// no device command is sent.
    pub fn apply_rotation(&mut self, function: ControlFunction, scope: Scope, delta: i64) {
        match function.scalar_param() {
            Some(param) => self.rotate_scalar(function, param, scope, delta),
            None => self.rotate_harmonics(function, scope, delta),
        }
    }

    fn rotate_scalar(
        &mut self,
        function: ControlFunction,
        param: ScalarParam,
        scope: Scope,
        delta: i64,
    ) {
        let delta_val = delta as f64 * function.step(&self.steps);
        let targets = scope.targets(function, self.devices.len());

        let store = self.store.clone();
        let mut store = store.lock();

        let mut candidates = Vec::with_capacity(targets.len());
        for (synth, ch) in targets {
            let old = store.scalar(synth, ch, param);
            let new = old + delta_val;
            if let Err(e) = self.validate_scalar(param, new) {
                log::warn!(
                    "{function} update aborted at synth {} ch {ch}: {e}",
                    synth + 1
                );
                return;
            }
            candidates.push((synth, ch, old, new));
        }

        let mut committed = 0usize;
        for (synth, ch, old, new) in candidates {
            // No-op writes are skipped to keep serial traffic down.
            if round2(new) == round2(old) {
                continue;
            }
            match self.write_scalar(synth, ch, param, round2(new)) {
                Ok(()) => {
                    store.set_scalar(synth, ch, param, new);
                    committed += 1;
                }
                Err(e) => log::error!("{function}: device write failed: {e}"),
            }
        }
        if committed > 0 {
            log::info!(
                "{function}: {scope:?} adjusted by {delta_val:+.2} ({committed} channel(s))"
            );
        }
    }

    fn rotate_harmonics(&mut self, function: ControlFunction, scope: Scope, delta: i64) {
        let delta_val = delta as f64 * function.step(&self.steps);
        let targets = scope.targets(function, self.devices.len());

        let store = self.store.clone();
        let mut store = store.lock();

        // Validate existing slots across the whole scope before touching
        // anything; fresh slots clamp instead (there is no old value to
        // preserve).
        for &(synth, ch) in &targets {
            if let Some(slot) = store.harmonics(synth, ch).first() {
                let candidate = slot.amplitude + delta_val;
                if candidate < AMPLITUDE_MIN || candidate > AMPLITUDE_MAX {
                    log::warn!(
                        "{function} update aborted: synth {} ch {ch} slot would leave limits (0-100%)",
                        synth + 1
                    );
                    return;
                }
            }
        }

        let mut committed = 0usize;
        for (synth, ch) in targets {
            match store.harmonics(synth, ch).first().cloned() {
                None => {
                    let initial = delta_val.clamp(AMPLITUDE_MIN, AMPLITUDE_MAX);
                    if initial <= 0.0 {
                        continue;
                    }
                    let phase = match ch {
                        ChannelId::A => HARMONIC_SEED_PHASE_A,
                        ChannelId::B => HARMONIC_SEED_PHASE_B,
                    };
                    let id = store.alloc_harmonic_id();
                    match self.devices[synth].set_harmonic(
                        ch,
                        MIN_HARMONIC_ORDER,
                        round2(initial),
                        phase,
                    ) {
                        Ok(()) => {
                            store.upsert_harmonic(
                                synth,
                                ch,
                                Harmonic {
                                    id,
                                    order: MIN_HARMONIC_ORDER,
                                    amplitude: initial,
                                    phase,
                                },
                            );
                            committed += 1;
                        }
                        Err(e) => log::error!("{function}: device write failed: {e}"),
                    }
                }
                Some(slot) => {
                    let candidate = slot.amplitude + delta_val;
                    if round2(candidate) == round2(slot.amplitude) {
                        continue;
                    }
                    if candidate <= 0.0 {
                        // Silence on the device, then drop the slot.
                        match self.devices[synth].set_harmonic(ch, slot.order, 0.0, slot.phase) {
                            Ok(()) => {
                                store.remove_harmonic(synth, ch, slot.id);
                                committed += 1;
                            }
                            Err(e) => log::error!("{function}: device write failed: {e}"),
                        }
                    } else {
                        match self.devices[synth].set_harmonic(
                            ch,
                            slot.order,
                            round2(candidate),
                            slot.phase,
                        ) {
                            Ok(()) => {
                                store.set_harmonic_amplitude(synth, ch, slot.id, candidate);
                                committed += 1;
                            }
                            Err(e) => log::error!("{function}: device write failed: {e}"),
                        }
                    }
                }
            }
        }
        if committed > 0 {
            log::info!(
                "{function}: {scope:?} adjusted by {delta_val:+.2} ({committed} slot(s))"
            );
        }
    }

    /// Long press: reset the resolved scope's parameters to saved defaults.
    /// Selection mode is left untouched.
    pub fn apply_hold_reset(&mut self, function: ControlFunction, scope: Scope) {
        let targets = scope.targets(function, self.devices.len());
        let store = self.store.clone();
        let mut store = store.lock();

        match function.scalar_param() {
            Some(param) => {
                for (synth, ch) in targets {
                    let default = store.default_scalar(synth, ch, param);
                    if round2(default) == round2(store.scalar(synth, ch, param)) {
                        continue;
                    }
                    match self.write_scalar(synth, ch, param, round2(default)) {
                        Ok(()) => store.set_scalar(synth, ch, param, default),
                        Err(e) => log::error!("{function} reset: device write failed: {e}"),
                    }
                }
            }
            None => {
                for (synth, ch) in targets {
                    match self.devices[synth].clear_harmonics(ch) {
                        Ok(()) => store.clear_harmonics(synth, ch),
                        Err(e) => log::error!("{function} reset: device write failed: {e}"),
                    }
                }
            }
        }
        log::info!("{function} reset: {scope:?} restored to defaults");
    }

    /// Drains the external command queue in FIFO order, one tick's worth.
    pub fn drain_external(&mut self, rx: &crossbeam_channel::Receiver<ExternalCommand>) {
        while let Ok(cmd) = rx.try_recv() {
            self.apply_external(cmd);
        }
    }

    /// External commands name a single target, so validation is per-target;
    /// the bulk all-or-nothing rule does not apply here.
    pub fn apply_external(&mut self, cmd: ExternalCommand) {
        let synth_id = cmd.synth_id();
        if synth_id >= self.devices.len() {
            log::warn!("External command for unknown synth {synth_id}, dropped");
            return;
        }
        match cmd {
            ExternalCommand::SetAmplitude {
                synth_id,
                channel,
                value,
            } => self.external_scalar(synth_id, channel, ScalarParam::Amplitude, value),
            ExternalCommand::SetFrequency {
                synth_id,
                channel,
                value,
            } => self.external_scalar(synth_id, channel, ScalarParam::Frequency, value),
            ExternalCommand::SetPhase {
                synth_id,
                channel,
                value,
            } => self.external_scalar(synth_id, channel, ScalarParam::Phase, value),
            ExternalCommand::SetHarmonics {
                synth_id,
                channel,
                value,
            } => self.external_harmonic(synth_id, channel, value),
            ExternalCommand::SetEnabled {
                synth_id,
                channel,
                value,
            } => {
                if let Err(e) = self.devices[synth_id].set_enabled(channel, value) {
                    log::error!("set_enabled failed: {e}");
                }
            }
        }
    }

    fn external_scalar(&mut self, synth: usize, ch: ChannelId, param: ScalarParam, value: f64) {
        if let Err(e) = self.validate_scalar(param, value) {
            log::warn!("External command for synth {} ch {ch} rejected: {e}", synth + 1);
            return;
        }
        let store = self.store.clone();
        let mut store = store.lock();
        match self.write_scalar(synth, ch, param, round2(value)) {
            Ok(()) => store.set_scalar(synth, ch, param, value),
            Err(e) => log::error!("External {param:?} write failed: {e}"),
        }
    }

    fn external_harmonic(&mut self, synth: usize, ch: ChannelId, update: HarmonicUpdate) {
        // Lowering the order below the minimum or zeroing the amplitude both
        // mean "delete this slot".
        let delete = update.amplitude <= 0.0 || update.order < MIN_HARMONIC_ORDER;
        if !delete {
            if update.order % 2 == 0 {
                log::warn!("External harmonic order {} is even, rejected", update.order);
                return;
            }
            if update.amplitude > AMPLITUDE_MAX
                || !(PHASE_MIN..=PHASE_MAX).contains(&update.phase)
            {
                log::warn!("External harmonic update outside limits, rejected");
                return;
            }
        }

        let store = self.store.clone();
        let mut store = store.lock();
        let existing = store
            .harmonics(synth, ch)
            .iter()
            .find(|h| h.id == update.id && update.id != 0)
            .cloned();

        match existing {
            Some(old) => {
                if delete {
                    match self.devices[synth].set_harmonic(ch, old.order, 0.0, old.phase) {
                        Ok(()) => store.remove_harmonic(synth, ch, old.id),
                        Err(e) => log::error!("External harmonic delete failed: {e}"),
                    }
                    return;
                }
                if old.order != update.order {
                    // Silence the old order's slot first so the physical
                    // device is not left with a stuck partial harmonic.
                    if let Err(e) = self.devices[synth].set_harmonic(ch, old.order, 0.0, old.phase)
                    {
                        log::error!("External harmonic order change failed: {e}");
                        return;
                    }
                }
                match self.devices[synth].set_harmonic(
                    ch,
                    update.order,
                    round2(update.amplitude),
                    round2(update.phase),
                ) {
                    Ok(()) => store.upsert_harmonic(
                        synth,
                        ch,
                        Harmonic {
                            id: old.id,
                            order: update.order,
                            amplitude: update.amplitude,
                            phase: update.phase,
                        },
                    ),
                    Err(e) => log::error!("External harmonic write failed: {e}"),
                }
            }
            None => {
                if delete {
                    log::debug!("External delete for absent harmonic slot, ignored");
                    return;
                }
                let id = if update.id == 0 {
                    store.alloc_harmonic_id()
                } else {
                    update.id
                };
                match self.devices[synth].set_harmonic(
                    ch,
                    update.order,
                    round2(update.amplitude),
                    round2(update.phase),
                ) {
                    Ok(()) => store.upsert_harmonic(
                        synth,
                        ch,
                        Harmonic {
                            id,
                            order: update.order,
                            amplitude: update.amplitude,
                            phase: update.phase,
                        },
                    ),
                    Err(e) => log::error!("External harmonic write failed: {e}"),
                }
            }
        }
    }

    /// Shutdown courtesy: mute every output without touching stored state.
    pub fn silence_all(&mut self) {
        for device in &mut self.devices {
            for ch in ChannelId::BOTH {
                if let Err(e) = device.set_amplitude(ch, 0.0) {
                    log::error!("Could not silence synth {}: {e}", device.id());
                }
            }
        }
    }

    fn write_scalar(
        &mut self,
        synth: usize,
        ch: ChannelId,
        param: ScalarParam,
        value: f64,
    ) -> crate::error::Result<()> {
        let device = &mut self.devices[synth];
        match param {
            ScalarParam::Amplitude => device.set_amplitude(ch, value),
            ScalarParam::Frequency => device.set_frequency(ch, value),
            ScalarParam::Phase => device.set_phase(ch, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::{DeviceCall, RecordingSynth, SharedLog};
    use std::path::PathBuf;
    use std::sync::{Arc as StdArc, Mutex as StdMutex};

    struct Rig {
        dispatcher: CommandDispatcher,
        store: Arc<Mutex<ParameterStore>>,
        log: StdArc<StdMutex<SharedLog>>,
    }

    fn rig(num_synths: usize) -> Rig {
        rig_with_failures(num_synths, &[])
    }

    fn rig_with_failures(num_synths: usize, failing: &[usize]) -> Rig {
        let dir = std::env::temp_dir().join(format!(
            "nhp-host-dispatch-{}-{}",
            std::process::id(),
            rand_tag()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let store = Arc::new(Mutex::new(ParameterStore::load(
            num_synths,
            &dir.join("state.json"),
            &PathBuf::from(dir.join("defaults.json")),
        )));
        let log = StdArc::new(StdMutex::new(SharedLog::default()));
        let devices: Vec<Box<dyn SynthDevice>> = (0..num_synths)
            .map(|i| {
                let mut synth = RecordingSynth::new(i, log.clone());
                synth.fail_writes = failing.contains(&i);
                Box::new(synth) as Box<dyn SynthDevice>
            })
            .collect();
        let dispatcher = CommandDispatcher::new(
            store.clone(),
            devices,
            StepConfig::default(),
            BoundsConfig::default(),
        );
        Rig {
            dispatcher,
            store,
            log,
        }
    }

    fn rand_tag() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .subsec_nanos() as u64
    }

    fn calls(rig: &Rig) -> Vec<(usize, DeviceCall)> {
        rig.log.lock().unwrap().calls.clone()
    }

    #[test]
    fn all_mode_rejection_leaves_every_target_unchanged() {
        // 3 synths, synth 1 amplitude A at 98%, bulk delta +5 must reject.
        let mut r = rig(3);
        {
            let mut store = r.store.lock();
            store.set_scalar(0, ChannelId::A, ScalarParam::Amplitude, 50.0);
            store.set_scalar(1, ChannelId::A, ScalarParam::Amplitude, 98.0);
            store.set_scalar(2, ChannelId::A, ScalarParam::Amplitude, 50.0);
        }
        r.dispatcher
            .apply_rotation(ControlFunction::AmplitudeA, Scope::All, 5);

        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 50.0);
        assert_eq!(store.scalar(1, ChannelId::A, ScalarParam::Amplitude), 98.0);
        assert_eq!(store.scalar(2, ChannelId::A, ScalarParam::Amplitude), 50.0);
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn rejection_is_idempotent_across_repeated_rotations() {
        let mut r = rig(2);
        {
            let mut store = r.store.lock();
            store.set_scalar(0, ChannelId::B, ScalarParam::Amplitude, 99.0);
            store.set_scalar(1, ChannelId::B, ScalarParam::Amplitude, 10.0);
        }
        for _ in 0..5 {
            r.dispatcher
                .apply_rotation(ControlFunction::AmplitudeB, Scope::All, 2);
        }
        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::B, ScalarParam::Amplitude), 99.0);
        assert_eq!(store.scalar(1, ChannelId::B, ScalarParam::Amplitude), 10.0);
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn zero_delta_rotation_commits_nothing() {
        let mut r = rig(2);
        r.dispatcher
            .apply_rotation(ControlFunction::AmplitudeA, Scope::All, 0);
        r.dispatcher
            .apply_rotation(ControlFunction::Harmonics, Scope::All, 0);
        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 100.0);
        assert!(store.harmonics(0, ChannelId::A).is_empty());
        assert!(!store.is_dirty());
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn individual_phase_rotation_touches_one_channel_only() {
        let mut r = rig(3);
        r.dispatcher.apply_rotation(
            ControlFunction::Phase,
            Scope::One {
                synth: 1,
                channel: ChannelId::B,
            },
            -10,
        );

        let store = r.store.lock();
        assert_eq!(store.scalar(1, ChannelId::B, ScalarParam::Phase), -10.0);
        assert_eq!(store.scalar(1, ChannelId::A, ScalarParam::Phase), 0.0);
        assert_eq!(store.scalar(0, ChannelId::B, ScalarParam::Phase), 0.0);
        assert_eq!(store.scalar(2, ChannelId::B, ScalarParam::Phase), 0.0);
        assert_eq!(
            calls(&r),
            vec![(1, DeviceCall::Phase(ChannelId::B, -10.0))]
        );
    }

    #[test]
    fn frequency_rotation_drives_both_channels_of_every_synth() {
        let mut r = rig(2);
        r.dispatcher
            .apply_rotation(ControlFunction::Frequency, Scope::All, 5);

        let store = r.store.lock();
        for synth in 0..2 {
            for ch in ChannelId::BOTH {
                assert_eq!(store.scalar(synth, ch, ScalarParam::Frequency), 50.5);
            }
        }
        assert_eq!(calls(&r).len(), 4);
    }

    #[test]
    fn frequency_rotation_rejects_atomically_at_range_edge() {
        let mut r = rig(2);
        {
            let mut store = r.store.lock();
            store.set_scalar(1, ChannelId::B, ScalarParam::Frequency, 7999.95);
        }
        r.dispatcher
            .apply_rotation(ControlFunction::Frequency, Scope::All, 1);
        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Frequency), 50.0);
        assert_eq!(store.scalar(1, ChannelId::B, ScalarParam::Frequency), 7999.95);
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn harmonic_rotation_seeds_slot_with_channel_phase() {
        let mut r = rig(1);
        r.dispatcher.apply_rotation(
            ControlFunction::Harmonics,
            Scope::One {
                synth: 0,
                channel: ChannelId::B,
            },
            10,
        );
        let store = r.store.lock();
        let slots = store.harmonics(0, ChannelId::B);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].order, 3);
        assert_eq!(slots[0].amplitude, 10.0);
        assert_eq!(slots[0].phase, 180.0);
        assert_eq!(
            calls(&r),
            vec![(0, DeviceCall::Harmonic(ChannelId::B, 3, 10.0, 180.0))]
        );
    }

    #[test]
    fn harmonic_rotated_to_zero_is_silenced_then_removed() {
        let mut r = rig(1);
        {
            let mut store = r.store.lock();
            let id = store.alloc_harmonic_id();
            store.upsert_harmonic(
                0,
                ChannelId::A,
                Harmonic {
                    id,
                    order: 5,
                    amplitude: 10.0,
                    phase: 0.0,
                },
            );
        }
        r.dispatcher.apply_rotation(
            ControlFunction::Harmonics,
            Scope::One {
                synth: 0,
                channel: ChannelId::A,
            },
            -10,
        );
        let store = r.store.lock();
        assert!(store.harmonics(0, ChannelId::A).is_empty());
        assert_eq!(
            calls(&r),
            vec![(0, DeviceCall::Harmonic(ChannelId::A, 5, 0.0, 0.0))]
        );
    }

    #[test]
    fn hold_reset_individual_amplitude_b_touches_only_that_synth() {
        // Individual synth 2, amplitude B: only that channel resets,
        // amplitude A and the other synths stay put.
        let mut r = rig(3);
        {
            let mut store = r.store.lock();
            for i in 0..3 {
                store.set_scalar(i, ChannelId::A, ScalarParam::Amplitude, 70.0);
                store.set_scalar(i, ChannelId::B, ScalarParam::Amplitude, 70.0);
            }
        }
        r.dispatcher.apply_hold_reset(
            ControlFunction::AmplitudeB,
            Scope::One {
                synth: 2,
                channel: ChannelId::B,
            },
        );
        let store = r.store.lock();
        // Built-in default for amplitude B is 50.
        assert_eq!(store.scalar(2, ChannelId::B, ScalarParam::Amplitude), 50.0);
        assert_eq!(store.scalar(2, ChannelId::A, ScalarParam::Amplitude), 70.0);
        assert_eq!(store.scalar(0, ChannelId::B, ScalarParam::Amplitude), 70.0);
        assert_eq!(store.scalar(1, ChannelId::B, ScalarParam::Amplitude), 70.0);
    }

    #[test]
    fn hold_reset_harmonics_clears_device_and_store() {
        let mut r = rig(2);
        {
            let mut store = r.store.lock();
            let id = store.alloc_harmonic_id();
            store.upsert_harmonic(
                0,
                ChannelId::A,
                Harmonic {
                    id,
                    order: 3,
                    amplitude: 20.0,
                    phase: 0.0,
                },
            );
        }
        r.dispatcher
            .apply_hold_reset(ControlFunction::Harmonics, Scope::All);
        let store = r.store.lock();
        assert!(store.harmonics(0, ChannelId::A).is_empty());
        assert!(calls(&r)
            .iter()
            .all(|(_, c)| matches!(c, DeviceCall::ClearHarmonics(_))));
        assert_eq!(calls(&r).len(), 4);
    }

    #[test]
    fn device_failure_skips_store_mutation_for_that_synth_only() {
        let mut r = rig_with_failures(2, &[0]);
        r.dispatcher
            .apply_rotation(ControlFunction::AmplitudeA, Scope::All, -5);
        let store = r.store.lock();
        // Validation passed for both, but synth 0's write failed.
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 100.0);
        assert_eq!(store.scalar(1, ChannelId::A, ScalarParam::Amplitude), 95.0);
    }

    #[test]
    fn external_out_of_bounds_command_is_rejected() {
        let mut r = rig(1);
        r.dispatcher.apply_external(ExternalCommand::SetAmplitude {
            synth_id: 0,
            channel: ChannelId::A,
            value: 150.0,
        });
        r.dispatcher.apply_external(ExternalCommand::SetPhase {
            synth_id: 0,
            channel: ChannelId::B,
            value: -400.0,
        });
        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 100.0);
        assert_eq!(store.scalar(0, ChannelId::B, ScalarParam::Phase), 0.0);
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn external_command_for_unknown_synth_is_dropped() {
        let mut r = rig(1);
        r.dispatcher.apply_external(ExternalCommand::SetFrequency {
            synth_id: 7,
            channel: ChannelId::A,
            value: 60.0,
        });
        assert!(calls(&r).is_empty());
    }

    #[test]
    fn external_harmonic_order_change_silences_old_order_first() {
        let mut r = rig(1);
        {
            let mut store = r.store.lock();
            store.upsert_harmonic(
                0,
                ChannelId::A,
                Harmonic {
                    id: 42,
                    order: 3,
                    amplitude: 15.0,
                    phase: 0.0,
                },
            );
        }
        r.dispatcher.apply_external(ExternalCommand::SetHarmonics {
            synth_id: 0,
            channel: ChannelId::A,
            value: HarmonicUpdate {
                id: 42,
                order: 5,
                amplitude: 15.0,
                phase: 0.0,
            },
        });
        assert_eq!(
            calls(&r),
            vec![
                (0, DeviceCall::Harmonic(ChannelId::A, 3, 0.0, 0.0)),
                (0, DeviceCall::Harmonic(ChannelId::A, 5, 15.0, 0.0)),
            ]
        );
        let store = r.store.lock();
        let slots = store.harmonics(0, ChannelId::A);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, 42);
        assert_eq!(slots[0].order, 5);
    }

    #[test]
    fn external_harmonic_zero_amplitude_deletes_the_slot() {
        let mut r = rig(1);
        {
            let mut store = r.store.lock();
            store.upsert_harmonic(
                0,
                ChannelId::B,
                Harmonic {
                    id: 9,
                    order: 7,
                    amplitude: 30.0,
                    phase: 90.0,
                },
            );
        }
        r.dispatcher.apply_external(ExternalCommand::SetHarmonics {
            synth_id: 0,
            channel: ChannelId::B,
            value: HarmonicUpdate {
                id: 9,
                order: 7,
                amplitude: 0.0,
                phase: 90.0,
            },
        });
        let store = r.store.lock();
        assert!(store.harmonics(0, ChannelId::B).is_empty());
        assert_eq!(
            calls(&r),
            vec![(0, DeviceCall::Harmonic(ChannelId::B, 7, 0.0, 90.0))]
        );
    }

    #[test]
    fn external_harmonic_sub_minimum_order_deletes_the_slot() {
        let mut r = rig(1);
        {
            let mut store = r.store.lock();
            store.upsert_harmonic(
                0,
                ChannelId::A,
                Harmonic {
                    id: 3,
                    order: 5,
                    amplitude: 30.0,
                    phase: 0.0,
                },
            );
        }
        r.dispatcher.apply_external(ExternalCommand::SetHarmonics {
            synth_id: 0,
            channel: ChannelId::A,
            value: HarmonicUpdate {
                id: 3,
                order: 1,
                amplitude: 30.0,
                phase: 0.0,
            },
        });
        let store = r.store.lock();
        assert!(store.harmonics(0, ChannelId::A).is_empty());
    }

    #[test]
    fn external_harmonic_without_id_allocates_one() {
        let mut r = rig(1);
        r.dispatcher.apply_external(ExternalCommand::SetHarmonics {
            synth_id: 0,
            channel: ChannelId::A,
            value: HarmonicUpdate {
                id: 0,
                order: 3,
                amplitude: 12.0,
                phase: 0.0,
            },
        });
        let store = r.store.lock();
        let slots = store.harmonics(0, ChannelId::A);
        assert_eq!(slots.len(), 1);
        assert_ne!(slots[0].id, 0);
    }

    #[test]
    fn drain_processes_queue_in_fifo_order() {
        let mut r = rig(1);
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ExternalCommand::SetAmplitude {
            synth_id: 0,
            channel: ChannelId::A,
            value: 10.0,
        })
        .unwrap();
        tx.send(ExternalCommand::SetAmplitude {
            synth_id: 0,
            channel: ChannelId::A,
            value: 20.0,
        })
        .unwrap();
        r.dispatcher.drain_external(&rx);
        let store = r.store.lock();
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 20.0);
        assert_eq!(
            calls(&r),
            vec![
                (0, DeviceCall::Amplitude(ChannelId::A, 10.0)),
                (0, DeviceCall::Amplitude(ChannelId::A, 20.0)),
            ]
        );
    }
}
