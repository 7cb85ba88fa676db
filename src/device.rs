use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use crate::error::{HostError, Result};
use crate::model::synth::ChannelId;

/// Request/response boundary to one synth over its own serial channel. Writes
/// are synchronous; a slow device stalls only its own dispatch.
pub trait SynthDevice: Send {
    fn id(&self) -> usize;

    fn set_amplitude(&mut self, ch: ChannelId, value: f64) -> Result<()>;
    fn set_frequency(&mut self, ch: ChannelId, value: f64) -> Result<()>;
    fn set_phase(&mut self, ch: ChannelId, value: f64) -> Result<()>;
    fn set_harmonic(&mut self, ch: ChannelId, order: u32, amplitude: f64, phase: f64)
        -> Result<()>;
    fn clear_harmonics(&mut self, ch: ChannelId) -> Result<()>;
    fn set_enabled(&mut self, ch: ChannelId, enabled: bool) -> Result<()>;

    // Startup verification reads.
    fn get_amplitude(&mut self, ch: ChannelId) -> Result<f64>;
    fn get_frequency(&mut self, ch: ChannelId) -> Result<f64>;
    fn get_phase(&mut self, ch: ChannelId) -> Result<f64>;
}

/// ASCII line-protocol client over any byte stream:
/// `w[f|p|a]{a|b}<value>` writes, `wh{a|b}<order>,<amp>,<phase>` harmonics,
/// `whcl{a|b}` clear, `wen{a|b}{0|1}` enable, `r..` reads echoing the value.
pub struct LineSynth<S: Read + Write + Send> {
    id: usize,
    reader: BufReader<S>,
}

impl LineSynth<File> {
    /// Opens a tty device node directly; line discipline/baud setup is the
    /// system's concern.
    pub fn connect(path: &Path, id: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| HostError::Transport(format!("{}: {e}", path.display())))?;
        Ok(Self::over(file, id))
    }
}

impl<S: Read + Write + Send> LineSynth<S> {
    pub fn over(stream: S, id: usize) -> Self {
        Self {
            id,
            reader: BufReader::new(stream),
        }
    }

    fn send_command(&mut self, command: &str) -> Result<String> {
        log::debug!("synth {} <- {command}", self.id);
        let stream = self.reader.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.write_all(b"\n")?;
        stream.flush()?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line)?;
        if n == 0 {
            return Err(HostError::Transport(format!(
                "synth {}: connection closed",
                self.id
            )));
        }
        let response = line.trim().to_string();
        log::debug!("synth {} -> {response}", self.id);
        Ok(response)
    }

    fn read_scalar(&mut self, command: &str) -> Result<f64> {
        let response = self.send_command(command)?;
        response
            .get(command.len()..)
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| {
                HostError::Transport(format!(
                    "synth {}: malformed response to {command}: {response:?}",
                    self.id
                ))
            })
    }
}

impl<S: Read + Write + Send> SynthDevice for LineSynth<S> {
    fn id(&self) -> usize {
        self.id
    }

    fn set_amplitude(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        self.send_command(&format!("wa{}{:.2}", ch.wire(), value))?;
        Ok(())
    }

    fn set_frequency(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        self.send_command(&format!("wf{}{:.2}", ch.wire(), value))?;
        Ok(())
    }

    fn set_phase(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        self.send_command(&format!("wp{}{:.2}", ch.wire(), value))?;
        Ok(())
    }

    fn set_harmonic(
        &mut self,
        ch: ChannelId,
        order: u32,
        amplitude: f64,
        phase: f64,
    ) -> Result<()> {
        self.send_command(&format!(
            "wh{}{},{:.2},{:.2}",
            ch.wire(),
            order,
            amplitude,
            phase
        ))?;
        Ok(())
    }

    fn clear_harmonics(&mut self, ch: ChannelId) -> Result<()> {
        self.send_command(&format!("whcl{}", ch.wire()))?;
        Ok(())
    }

    fn set_enabled(&mut self, ch: ChannelId, enabled: bool) -> Result<()> {
        self.send_command(&format!("wen{}{}", ch.wire(), if enabled { 1 } else { 0 }))?;
        Ok(())
    }

    fn get_amplitude(&mut self, ch: ChannelId) -> Result<f64> {
        self.read_scalar(&format!("ra{}", ch.wire()))
    }

    fn get_frequency(&mut self, ch: ChannelId) -> Result<f64> {
        self.read_scalar(&format!("rf{}", ch.wire()))
    }

    fn get_phase(&mut self, ch: ChannelId) -> Result<f64> {
        self.read_scalar(&format!("rp{}", ch.wire()))
    }
}

/// Log-only device for `--simulate` runs without hardware attached.
pub struct NullSynth {
    id: usize,
}

impl NullSynth {
    pub fn new(id: usize) -> Self {
        Self { id }
    }
}

impl SynthDevice for NullSynth {
    fn id(&self) -> usize {
        self.id
    }

    fn set_amplitude(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        log::debug!("synth {} (sim): amplitude {ch} = {value:.2}", self.id);
        Ok(())
    }

    fn set_frequency(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        log::debug!("synth {} (sim): frequency {ch} = {value:.2}", self.id);
        Ok(())
    }

    fn set_phase(&mut self, ch: ChannelId, value: f64) -> Result<()> {
        log::debug!("synth {} (sim): phase {ch} = {value:.2}", self.id);
        Ok(())
    }

    fn set_harmonic(
        &mut self,
        ch: ChannelId,
        order: u32,
        amplitude: f64,
        phase: f64,
    ) -> Result<()> {
        log::debug!(
            "synth {} (sim): harmonic {ch} order {order} = {amplitude:.2}% @ {phase:.2}",
            self.id
        );
        Ok(())
    }

    fn clear_harmonics(&mut self, ch: ChannelId) -> Result<()> {
        log::debug!("synth {} (sim): clear harmonics {ch}", self.id);
        Ok(())
    }

    fn set_enabled(&mut self, ch: ChannelId, enabled: bool) -> Result<()> {
        log::debug!("synth {} (sim): enabled {ch} = {enabled}", self.id);
        Ok(())
    }

    fn get_amplitude(&mut self, _ch: ChannelId) -> Result<f64> {
        Ok(0.0)
    }

    fn get_frequency(&mut self, _ch: ChannelId) -> Result<f64> {
        Ok(crate::constants::DEFAULT_FREQUENCY)
    }

    fn get_phase(&mut self, _ch: ChannelId) -> Result<f64> {
        Ok(0.0)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a recording device saw, for asserting on dispatch traffic.
    #[derive(Debug, Clone, PartialEq)]
    pub enum DeviceCall {
        Amplitude(ChannelId, f64),
        Frequency(ChannelId, f64),
        Phase(ChannelId, f64),
        Harmonic(ChannelId, u32, f64, f64),
        ClearHarmonics(ChannelId),
        Enabled(ChannelId, bool),
    }

    #[derive(Default)]
    pub struct SharedLog {
        pub calls: Vec<(usize, DeviceCall)>,
    }

    /// Test double recording every write; optionally fails all writes.
    pub struct RecordingSynth {
        id: usize,
        log: Arc<Mutex<SharedLog>>,
        pub fail_writes: bool,
    }

    impl RecordingSynth {
        pub fn new(id: usize, log: Arc<Mutex<SharedLog>>) -> Self {
            Self {
                id,
                log,
                fail_writes: false,
            }
        }

        fn record(&mut self, call: DeviceCall) -> Result<()> {
            if self.fail_writes {
                return Err(HostError::Transport(format!(
                    "synth {}: simulated write failure",
                    self.id
                )));
            }
            self.log.lock().unwrap().calls.push((self.id, call));
            Ok(())
        }
    }

    impl SynthDevice for RecordingSynth {
        fn id(&self) -> usize {
            self.id
        }

        fn set_amplitude(&mut self, ch: ChannelId, value: f64) -> Result<()> {
            self.record(DeviceCall::Amplitude(ch, value))
        }

        fn set_frequency(&mut self, ch: ChannelId, value: f64) -> Result<()> {
            self.record(DeviceCall::Frequency(ch, value))
        }

        fn set_phase(&mut self, ch: ChannelId, value: f64) -> Result<()> {
            self.record(DeviceCall::Phase(ch, value))
        }

        fn set_harmonic(
            &mut self,
            ch: ChannelId,
            order: u32,
            amplitude: f64,
            phase: f64,
        ) -> Result<()> {
            self.record(DeviceCall::Harmonic(ch, order, amplitude, phase))
        }

        fn clear_harmonics(&mut self, ch: ChannelId) -> Result<()> {
            self.record(DeviceCall::ClearHarmonics(ch))
        }

        fn set_enabled(&mut self, ch: ChannelId, enabled: bool) -> Result<()> {
            self.record(DeviceCall::Enabled(ch, enabled))
        }

        fn get_amplitude(&mut self, _ch: ChannelId) -> Result<f64> {
            Ok(0.0)
        }

        fn get_frequency(&mut self, _ch: ChannelId) -> Result<f64> {
            Ok(50.0)
        }

        fn get_phase(&mut self, _ch: ChannelId) -> Result<f64> {
            Ok(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Byte stream that records writes and replays scripted response lines.
    struct ScriptedPort {
        written: Vec<u8>,
        responses: Cursor<Vec<u8>>,
    }

    impl ScriptedPort {
        fn new(responses: &str) -> Self {
            Self {
                written: Vec::new(),
                responses: Cursor::new(responses.as_bytes().to_vec()),
            }
        }
    }

    impl Read for ScriptedPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.responses.read(buf)
        }
    }

    impl Write for ScriptedPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_commands_use_two_decimal_wire_format() {
        let port = ScriptedPort::new("ok\nok\nok\nok\n");
        let mut synth = LineSynth::over(port, 0);
        synth.set_amplitude(ChannelId::A, 73.456).unwrap();
        synth.set_frequency(ChannelId::B, 50.0).unwrap();
        synth.set_phase(ChannelId::A, -90.0).unwrap();
        synth.set_harmonic(ChannelId::B, 3, 10.0, 180.0).unwrap();
        let written = String::from_utf8(synth.reader.get_ref().written.clone()).unwrap();
        assert_eq!(written, "waa73.46\nwfb50.00\nwpa-90.00\nwhb3,10.00,180.00\n");
    }

    #[test]
    fn read_parses_echoed_value() {
        let port = ScriptedPort::new("rfa50.25\n");
        let mut synth = LineSynth::over(port, 1);
        assert_eq!(synth.get_frequency(ChannelId::A).unwrap(), 50.25);
    }

    #[test]
    fn closed_stream_is_a_transport_error() {
        let port = ScriptedPort::new("");
        let mut synth = LineSynth::over(port, 2);
        assert!(synth.set_amplitude(ChannelId::A, 1.0).is_err());
    }
}
