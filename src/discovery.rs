use glob::glob;
use std::path::PathBuf;

use crate::constants::{SERIAL_BY_PATH_GLOB, SERIAL_PRIORITY_KEYWORDS};
use crate::device::{LineSynth, SynthDevice};
use crate::error::Result;
use crate::model::synth::ChannelId;

/// Enumerates candidate serial device nodes. `/dev/serial/by-path` names are
/// stable across reboots, so synth indices stay consistent run to run.
pub fn find_synth_ports() -> Vec<PathBuf> {
    let mut ports: Vec<PathBuf> = match glob(SERIAL_BY_PATH_GLOB) {
        Ok(paths) => paths.filter_map(|p| p.ok()).collect(),
        Err(e) => {
            log::warn!("Serial discovery glob failed: {e}");
            Vec::new()
        }
    };
    ports.sort();
    ports.retain(|p| {
        let name = p.to_string_lossy().to_lowercase();
        let keep = SERIAL_PRIORITY_KEYWORDS.iter().any(|k| name.contains(k));
        if !keep {
            log::debug!("Skipping non-USB serial node {}", p.display());
        }
        keep
    });
    log::info!("Discovered {} candidate serial port(s)", ports.len());
    ports
}

/// Opens every discovered port and keeps the ones that pass the comms check.
/// Device ids are assigned in port order, densely from 0.
pub fn open_synths() -> Vec<Box<dyn SynthDevice>> {
    let mut devices: Vec<Box<dyn SynthDevice>> = Vec::new();
    for path in find_synth_ports() {
        let id = devices.len();
        match LineSynth::connect(&path, id) {
            Ok(mut synth) => match verify_synth(&mut synth) {
                Ok(()) => {
                    log::info!("Synth {id} online at {}", path.display());
                    devices.push(Box::new(synth));
                }
                Err(e) => log::warn!("Port {} failed comms check: {e}", path.display()),
            },
            Err(e) => log::warn!("Could not open {}: {e}", path.display()),
        }
    }
    devices
}

/// Startup comms check: read back both channels' scalars, then round-trip a
/// frequency write to prove the device both parses and echoes commands.
pub fn verify_synth(synth: &mut dyn SynthDevice) -> Result<()> {
    for ch in ChannelId::BOTH {
        synth.get_amplitude(ch)?;
        synth.get_phase(ch)?;
    }
    let current = synth.get_frequency(ChannelId::A)?;
    synth.set_frequency(ChannelId::A, current)?;
    let echoed = synth.get_frequency(ChannelId::A)?;
    if (echoed - current).abs() > 0.01 {
        return Err(crate::error::HostError::Transport(format!(
            "synth {}: frequency round-trip mismatch ({current} vs {echoed})",
            synth.id()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::LineSynth;
    use std::io::{Read, Write};

    struct EchoPort {
        last_command: String,
        frequency: f64,
        pending: Vec<u8>,
    }

    impl EchoPort {
        fn new(frequency: f64) -> Self {
            Self {
                last_command: String::new(),
                frequency,
                pending: Vec::new(),
            }
        }
    }

    impl Write for EchoPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.last_command.push_str(&String::from_utf8_lossy(buf));
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            let cmd = self.last_command.trim().to_string();
            self.last_command.clear();
            if cmd.is_empty() {
                return Ok(());
            }
            let response = if let Some(rest) = cmd.strip_prefix("wf") {
                if let Ok(v) = rest[1..].parse::<f64>() {
                    self.frequency = v;
                }
                format!("{cmd}\n")
            } else if cmd.starts_with("rf") {
                format!("{cmd}{:.2}\n", self.frequency)
            } else if cmd.starts_with('r') {
                format!("{cmd}0.00\n")
            } else {
                format!("{cmd}\n")
            };
            self.pending.extend_from_slice(response.as_bytes());
            Ok(())
        }
    }

    impl Read for EchoPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.pending.len().min(buf.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn verification_passes_against_an_echoing_device() {
        let mut synth = LineSynth::over(EchoPort::new(50.0), 0);
        assert!(verify_synth(&mut synth).is_ok());
    }
}
