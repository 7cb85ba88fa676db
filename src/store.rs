use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_AMPLITUDE_A, DEFAULT_AMPLITUDE_B, DEFAULT_FREQUENCY, DEFAULT_PHASE, MAX_STATE_BACKUPS,
};
use crate::model::function::ScalarParam;
use crate::model::synth::{ChannelId, ChannelParams, Harmonic, SynthParams};

/// Flat per-synth record as persisted and broadcast. The in-memory
/// representation groups the same values by channel instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthRecord {
    #[serde(default = "default_amplitude_a")]
    pub amplitude_a: f64,
    #[serde(default = "default_amplitude_b")]
    pub amplitude_b: f64,
    #[serde(default = "default_frequency")]
    pub frequency_a: f64,
    #[serde(default = "default_frequency")]
    pub frequency_b: f64,
    #[serde(default = "default_phase")]
    pub phase_a: f64,
    #[serde(default = "default_phase")]
    pub phase_b: f64,
    #[serde(default, deserialize_with = "lenient_harmonics")]
    pub harmonics_a: Vec<Harmonic>,
    #[serde(default, deserialize_with = "lenient_harmonics")]
    pub harmonics_b: Vec<Harmonic>,
}

fn default_amplitude_a() -> f64 {
    DEFAULT_AMPLITUDE_A
}
fn default_amplitude_b() -> f64 {
    DEFAULT_AMPLITUDE_B
}
fn default_frequency() -> f64 {
    DEFAULT_FREQUENCY
}
fn default_phase() -> f64 {
    DEFAULT_PHASE
}

/// Older defaults files carried scalar placeholders (`"harmonics_a": 0.0`)
/// and older state files sometimes held malformed entries; anything that is
/// not a list of well-formed harmonics normalizes to an empty list. Slots
/// that were logically deleted (zero amplitude, sub-minimum order) or that
/// carry an order the device cannot address (even) do not resurrect across a
/// restart.
fn lenient_harmonics<'de, D>(deserializer: D) -> std::result::Result<Vec<Harmonic>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Harmonic>(item).ok())
            .filter(|h| !h.is_deleted() && h.has_valid_order())
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    num_synths: usize,
    synths: Vec<SynthRecord>,
}

impl Default for SynthRecord {
    fn default() -> Self {
        Self {
            amplitude_a: DEFAULT_AMPLITUDE_A,
            amplitude_b: DEFAULT_AMPLITUDE_B,
            frequency_a: DEFAULT_FREQUENCY,
            frequency_b: DEFAULT_FREQUENCY,
            phase_a: DEFAULT_PHASE,
            phase_b: DEFAULT_PHASE,
            harmonics_a: Vec::new(),
            harmonics_b: Vec::new(),
        }
    }
}

impl From<&SynthParams> for SynthRecord {
    fn from(p: &SynthParams) -> Self {
        Self {
            amplitude_a: round2(p.a.amplitude),
            amplitude_b: round2(p.b.amplitude),
            frequency_a: round2(p.a.frequency),
            frequency_b: round2(p.b.frequency),
            phase_a: round2(p.a.phase),
            phase_b: round2(p.b.phase),
            harmonics_a: p.a.harmonics.clone(),
            harmonics_b: p.b.harmonics.clone(),
        }
    }
}

impl From<SynthRecord> for SynthParams {
    fn from(r: SynthRecord) -> Self {
        Self {
            a: ChannelParams {
                amplitude: r.amplitude_a,
                frequency: r.frequency_a,
                phase: r.phase_a,
                harmonics: r.harmonics_a,
            },
            b: ChannelParams {
                amplitude: r.amplitude_b,
                frequency: r.frequency_b,
                phase: r.phase_b,
                harmonics: r.harmonics_b,
            },
        }
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Authoritative in-memory parameter state for every enumerated synth, plus
/// the defaults table used for long-press resets and first-run
/// initialization. Mutated only through the dispatcher on the control-loop
/// thread.
pub struct ParameterStore {
    synths: Vec<SynthParams>,
    defaults: Vec<SynthParams>,
    next_harmonic_id: u64,
    state_path: PathBuf,
    dirty: bool,
}

impl ParameterStore {
    /// Builds the store for `num_synths` devices: defaults from the defaults
    /// file (or hardcoded fallbacks), live state from the state file when it
    /// is present and consistent with the discovered synth count.
    pub fn load(num_synths: usize, state_path: &Path, defaults_path: &Path) -> Self {
        let defaults = load_defaults(defaults_path, num_synths);

        let mut store = Self {
            synths: defaults.clone(),
            defaults,
            next_harmonic_id: 1,
            state_path: state_path.to_path_buf(),
            dirty: false,
        };

        match load_state_file(state_path) {
            Some(state) if state.num_synths == num_synths && state.synths.len() == num_synths => {
                store.synths = state.synths.into_iter().map(SynthParams::from).collect();
                log::info!("Loaded persisted state for {} synth(s)", num_synths);
            }
            Some(state) => {
                log::warn!(
                    "Persisted state has {} synth(s), {} discovered; using defaults",
                    state.num_synths,
                    num_synths
                );
            }
            None => {
                log::info!("No usable persisted state; initializing from defaults");
            }
        }

        store.reassign_invalid_harmonic_ids();
        store
    }

    pub fn num_synths(&self) -> usize {
        self.synths.len()
    }

    pub fn synth(&self, idx: usize) -> &SynthParams {
        &self.synths[idx]
    }

    pub fn channel(&self, synth: usize, ch: ChannelId) -> &ChannelParams {
        self.synths[synth].channel(ch)
    }

    pub fn scalar(&self, synth: usize, ch: ChannelId, param: ScalarParam) -> f64 {
        let c = self.channel(synth, ch);
        match param {
            ScalarParam::Amplitude => c.amplitude,
            ScalarParam::Frequency => c.frequency,
            ScalarParam::Phase => c.phase,
        }
    }

    pub fn set_scalar(&mut self, synth: usize, ch: ChannelId, param: ScalarParam, value: f64) {
        let c = self.synths[synth].channel_mut(ch);
        match param {
            ScalarParam::Amplitude => c.amplitude = value,
            ScalarParam::Frequency => c.frequency = value,
            ScalarParam::Phase => c.phase = value,
        }
        self.dirty = true;
    }

    pub fn default_scalar(&self, synth: usize, ch: ChannelId, param: ScalarParam) -> f64 {
        let c = self.defaults[synth].channel(ch);
        match param {
            ScalarParam::Amplitude => c.amplitude,
            ScalarParam::Frequency => c.frequency,
            ScalarParam::Phase => c.phase,
        }
    }

    pub fn harmonics(&self, synth: usize, ch: ChannelId) -> &[Harmonic] {
        &self.channel(synth, ch).harmonics
    }

    pub fn alloc_harmonic_id(&mut self) -> u64 {
        let id = self.next_harmonic_id;
        self.next_harmonic_id += 1;
        id
    }

    /// Inserts or replaces by id, keeping ids unique within the channel.
    pub fn upsert_harmonic(&mut self, synth: usize, ch: ChannelId, harmonic: Harmonic) {
        let list = &mut self.synths[synth].channel_mut(ch).harmonics;
        if let Some(existing) = list.iter_mut().find(|h| h.id == harmonic.id) {
            *existing = harmonic;
        } else {
            list.push(harmonic);
        }
        self.dirty = true;
    }

    pub fn set_harmonic_amplitude(&mut self, synth: usize, ch: ChannelId, id: u64, value: f64) {
        if let Some(h) = self.synths[synth].channel_mut(ch).harmonic_by_id_mut(id) {
            h.amplitude = value;
            self.dirty = true;
        }
    }

    pub fn remove_harmonic(&mut self, synth: usize, ch: ChannelId, id: u64) {
        let list = &mut self.synths[synth].channel_mut(ch).harmonics;
        let before = list.len();
        list.retain(|h| h.id != id);
        if list.len() != before {
            self.dirty = true;
        }
    }

    pub fn clear_harmonics(&mut self, synth: usize, ch: ChannelId) {
        let list = &mut self.synths[synth].channel_mut(ch).harmonics;
        if !list.is_empty() {
            list.clear();
            self.dirty = true;
        }
    }

    /// Deep copy of the current state in broadcast/persist shape.
    pub fn snapshot(&self) -> Vec<SynthRecord> {
        self.synths.iter().map(SynthRecord::from).collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Full-state overwrite of the state file. Write failures are logged and
    /// swallowed; the control loop must stay responsive.
    pub fn save(&mut self) {
        match self.try_save() {
            Ok(()) => {
                self.dirty = false;
                log::debug!("State saved to {}", self.state_path.display());
            }
            Err(e) => log::warn!("Could not save synth state: {e:#}"),
        }
    }

    fn try_save(&self) -> Result<()> {
        if let Some(parent) = self.state_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.state_path.exists() {
            if let Err(e) = self.rotate_backup() {
                log::warn!("State backup failed: {e:#}");
            }
        }
        let file = StateFile {
            num_synths: self.synths.len(),
            synths: self.snapshot(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&self.state_path, json)?;
        Ok(())
    }

    /// Copies the current state file into a `Backups/` sibling directory and
    /// prunes the oldest copies beyond the retention cap.
    fn rotate_backup(&self) -> Result<()> {
        let parent = match self.state_path.parent() {
            Some(p) => p,
            None => return Ok(()),
        };
        let backup_dir = parent.join("Backups");
        fs::create_dir_all(&backup_dir)?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let stem = self
            .state_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("synth_state");
        let backup_path = backup_dir.join(format!("{}_{}.json", stem, timestamp));
        fs::copy(&self.state_path, &backup_path)?;

        let mut backups: Vec<PathBuf> = Vec::new();
        if let Ok(entries) = fs::read_dir(&backup_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        if name.starts_with(stem) {
                            backups.push(path);
                        }
                    }
                }
            }
        }
        backups.sort_by_key(|p| p.metadata().and_then(|m| m.modified()).ok());
        if backups.len() > MAX_STATE_BACKUPS {
            let to_remove = backups.len() - MAX_STATE_BACKUPS;
            for path in backups.iter().take(to_remove) {
                let _ = fs::remove_file(path);
            }
        }
        Ok(())
    }

    /// Persisted lists may predate id-based identity (or collide); hand out
    /// fresh ids so the uniqueness invariant holds from boot.
    fn reassign_invalid_harmonic_ids(&mut self) {
        // Seed the allocator above any id already present.
        let max_seen = self
            .synths
            .iter()
            .flat_map(|s| s.a.harmonics.iter().chain(s.b.harmonics.iter()))
            .map(|h| h.id)
            .max()
            .unwrap_or(0);
        self.next_harmonic_id = max_seen + 1;

        for synth in &mut self.synths {
            for ch in ChannelId::BOTH {
                let mut seen = Vec::new();
                for h in &mut synth.channel_mut(ch).harmonics {
                    if h.id == 0 || seen.contains(&h.id) {
                        h.id = self.next_harmonic_id;
                        self.next_harmonic_id += 1;
                    }
                    seen.push(h.id);
                }
            }
        }
    }
}

fn load_state_file(path: &Path) -> Option<StateFile> {
    if !path.exists() {
        return None;
    }
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Could not read synth state: {e}");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(state) => Some(state),
        Err(e) => {
            log::warn!("Malformed synth state file, falling back to defaults: {e}");
            None
        }
    }
}

/// The defaults file accepts three shapes: a `{ "synths": [...] }` record, a
/// bare list, or a single record broadcast to every synth index. A synth
/// beyond the list's length inherits the first record.
fn load_defaults(path: &Path, num_synths: usize) -> Vec<SynthParams> {
    let records = read_default_records(path);
    (0..num_synths)
        .map(|i| {
            let record = records
                .get(i)
                .or_else(|| records.first())
                .cloned()
                .unwrap_or_default();
            SynthParams::from(record)
        })
        .collect()
}

fn read_default_records(path: &Path) -> Vec<SynthRecord> {
    if !path.exists() {
        log::info!("No defaults file at {}; using built-ins", path.display());
        return Vec::new();
    }
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Could not read defaults file: {e}");
            return Vec::new();
        }
    };
    let value: serde_json::Value = match serde_json::from_str(&contents) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Malformed defaults file, using built-ins: {e}");
            return Vec::new();
        }
    };

    let items = match value {
        serde_json::Value::Object(ref map) if map.contains_key("synths") => {
            match map.get("synths") {
                Some(serde_json::Value::Array(items)) => items.clone(),
                _ => {
                    log::warn!("Defaults file 'synths' key is not a list; using built-ins");
                    return Vec::new();
                }
            }
        }
        serde_json::Value::Array(items) => items,
        single @ serde_json::Value::Object(_) => vec![single],
        _ => {
            log::warn!("Unrecognized defaults file shape; using built-ins");
            return Vec::new();
        }
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value(item) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping malformed defaults record: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nhp-host-store-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_files_fall_back_to_builtin_defaults() {
        let dir = temp_dir("missing");
        let store = ParameterStore::load(2, &dir.join("state.json"), &dir.join("defaults.json"));
        assert_eq!(store.num_synths(), 2);
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 100.0);
        assert_eq!(store.scalar(1, ChannelId::B, ScalarParam::Amplitude), 50.0);
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Frequency), 50.0);
        assert!(store.harmonics(0, ChannelId::A).is_empty());
    }

    #[test]
    fn single_defaults_record_broadcasts_to_all_synths() {
        let dir = temp_dir("broadcast");
        let defaults = dir.join("defaults.json");
        fs::write(
            &defaults,
            r#"{"amplitude_a": 80.0, "amplitude_b": 40.0, "frequency_a": 60.0,
                "frequency_b": 60.0, "phase_a": 0.0, "phase_b": 0.0,
                "harmonics_a": 0.0, "harmonics_b": 0.0}"#,
        )
        .unwrap();
        let store = ParameterStore::load(3, &dir.join("state.json"), &defaults);
        for i in 0..3 {
            assert_eq!(store.default_scalar(i, ChannelId::A, ScalarParam::Amplitude), 80.0);
            assert_eq!(store.default_scalar(i, ChannelId::B, ScalarParam::Amplitude), 40.0);
        }
        // Scalar harmonics placeholders normalize to empty lists.
        assert!(store.harmonics(2, ChannelId::B).is_empty());
    }

    #[test]
    fn synth_count_mismatch_discards_persisted_state() {
        let dir = temp_dir("mismatch");
        let state = dir.join("state.json");
        fs::write(
            &state,
            r#"{"num_synths": 1, "synths": [{"amplitude_a": 10.0, "amplitude_b": 10.0,
                "frequency_a": 30.0, "frequency_b": 30.0, "phase_a": 0.0, "phase_b": 0.0,
                "harmonics_a": [], "harmonics_b": []}]}"#,
        )
        .unwrap();
        let store = ParameterStore::load(2, &state, &dir.join("defaults.json"));
        assert_eq!(store.scalar(0, ChannelId::A, ScalarParam::Amplitude), 100.0);
    }

    #[test]
    fn save_load_round_trip_preserves_values() {
        let dir = temp_dir("roundtrip");
        let state = dir.join("state.json");
        let defaults = dir.join("defaults.json");
        let mut store = ParameterStore::load(2, &state, &defaults);
        store.set_scalar(0, ChannelId::A, ScalarParam::Amplitude, 73.456);
        store.set_scalar(1, ChannelId::B, ScalarParam::Phase, -90.0);
        let id = store.alloc_harmonic_id();
        store.upsert_harmonic(
            0,
            ChannelId::A,
            Harmonic {
                id,
                order: 3,
                amplitude: 25.0,
                phase: 0.0,
            },
        );
        store.save();

        let reloaded = ParameterStore::load(2, &state, &defaults);
        // Values round to 2 decimal places on save.
        assert_eq!(reloaded.scalar(0, ChannelId::A, ScalarParam::Amplitude), 73.46);
        assert_eq!(reloaded.scalar(1, ChannelId::B, ScalarParam::Phase), -90.0);
        assert_eq!(reloaded.harmonics(0, ChannelId::A).len(), 1);
        assert_eq!(reloaded.harmonics(0, ChannelId::A)[0].order, 3);
        assert_eq!(reloaded.snapshot(), store.snapshot());
    }

    #[test]
    fn even_order_harmonics_are_dropped_on_load() {
        let dir = temp_dir("evenorder");
        let state = dir.join("state.json");
        fs::write(
            &state,
            r#"{"num_synths": 1, "synths": [{"amplitude_a": 10.0, "amplitude_b": 10.0,
                "frequency_a": 30.0, "frequency_b": 30.0, "phase_a": 0.0, "phase_b": 0.0,
                "harmonics_a": [{"id": 1, "order": 4, "amplitude": 10.0, "phase": 0.0},
                                {"id": 2, "order": 5, "amplitude": 10.0, "phase": 0.0},
                                {"id": 3, "order": 7, "amplitude": 0.0, "phase": 0.0}],
                "harmonics_b": []}]}"#,
        )
        .unwrap();
        let store = ParameterStore::load(1, &state, &dir.join("defaults.json"));
        // The even-order and zero-amplitude slots never enter the store.
        let slots = store.harmonics(0, ChannelId::A);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].order, 5);
    }

    #[test]
    fn duplicate_harmonic_ids_reassigned_on_load() {
        let dir = temp_dir("dupids");
        let state = dir.join("state.json");
        fs::write(
            &state,
            r#"{"num_synths": 1, "synths": [{"amplitude_a": 10.0, "amplitude_b": 10.0,
                "frequency_a": 30.0, "frequency_b": 30.0, "phase_a": 0.0, "phase_b": 0.0,
                "harmonics_a": [{"id": 7, "order": 3, "amplitude": 10.0, "phase": 0.0},
                                {"id": 7, "order": 5, "amplitude": 20.0, "phase": 0.0},
                                {"order": 7, "amplitude": 5.0, "phase": 0.0}],
                "harmonics_b": []}]}"#,
        )
        .unwrap();
        let store = ParameterStore::load(1, &state, &dir.join("defaults.json"));
        let ids: Vec<u64> = store
            .harmonics(0, ChannelId::A)
            .iter()
            .map(|h| h.id)
            .collect();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(ids.len(), 3);
        assert_eq!(unique.len(), 3);
        assert!(!ids.contains(&0));
    }
}
