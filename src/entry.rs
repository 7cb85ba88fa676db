use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::control_loop::ControlLoop;
use crate::device::{NullSynth, SynthDevice};
use crate::discovery;
use crate::dispatcher::CommandDispatcher;
use crate::encoder_hw::EncoderBank;
use crate::messages::ExternalCommand;
use crate::notifier::{run_notifier, ChangeNotifier};
use crate::selection::SelectionController;
use crate::store::ParameterStore;

const SIMULATED_SYNTHS: usize = 3;

/// Process entry point: wire the whole engine together and run the control
/// loop on the calling thread until Ctrl-C.
pub fn run_app() -> Result<()> {
    env_logger::init();

    let simulate = std::env::args().any(|a| a == "--simulate");
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Could not load config, using defaults: {e:#}");
        Config::default()
    });

    let devices: Vec<Box<dyn SynthDevice>> = if simulate {
        log::info!("Simulation mode: {SIMULATED_SYNTHS} virtual synth(s), no hardware");
        (0..SIMULATED_SYNTHS)
            .map(|i| Box::new(NullSynth::new(i)) as Box<dyn SynthDevice>)
            .collect()
    } else {
        discovery::open_synths()
    };
    if devices.is_empty() {
        bail!("no synth devices found (use --simulate to run without hardware)");
    }

    // Physical encoder drivers register through `run_app_with`; the stock
    // binary runs headless and takes commands on stdin.
    run_app_with(EncoderBank::new(), devices, config)
}

/// Assembly seam for embedders that bring their own encoder drivers or
/// devices. Returns once the control loop has shut down cleanly.
pub fn run_app_with(
    bank: EncoderBank,
    devices: Vec<Box<dyn SynthDevice>>,
    config: Config,
) -> Result<()> {
    let num_synths = devices.len();
    let store = Arc::new(Mutex::new(ParameterStore::load(
        num_synths,
        &config.state_file(),
        &config.defaults_file(),
    )));
    let selection = Arc::new(Mutex::new(SelectionController::new(
        num_synths,
        config.selection_timeout(),
    )));
    let dispatcher = CommandDispatcher::new(
        store.clone(),
        devices,
        config.steps.clone(),
        config.bounds.clone(),
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
        })
        .context("could not install Ctrl-C handler")?;
    }

    let (external_tx, external_rx) = crossbeam_channel::unbounded::<ExternalCommand>();
    spawn_stdin_reader(external_tx);

    let (snapshot_tx, snapshot_rx) = crossbeam_channel::unbounded();
    let notifier = ChangeNotifier::new(store.clone(), selection.clone());
    let broadcast_interval = config.broadcast_interval();
    let notifier_shutdown = shutdown.clone();
    let notifier_handle = std::thread::Builder::new()
        .name("notifier".into())
        .spawn(move || run_notifier(notifier, snapshot_tx, broadcast_interval, notifier_shutdown))
        .context("could not spawn notifier thread")?;

    // Stand-in subscriber until a dashboard transport hangs off the channel.
    std::thread::Builder::new()
        .name("snapshot-log".into())
        .spawn(move || {
            for snapshot in snapshot_rx {
                log::info!(
                    "State changed: {} synth(s), selection {:?}",
                    snapshot.synths.len(),
                    snapshot.selection_mode
                );
                if let Ok(json) = serde_json::to_string(&snapshot) {
                    log::debug!("Snapshot: {json}");
                }
            }
        })
        .context("could not spawn snapshot subscriber thread")?;

    let mut control = ControlLoop::new(
        bank,
        dispatcher,
        selection,
        store,
        external_rx,
        shutdown,
        &config,
    );
    control.run();

    if notifier_handle.join().is_err() {
        log::warn!("Notifier thread panicked during shutdown");
    }
    Ok(())
}

/// One JSON command per stdin line, forwarded into the dispatch queue.
fn spawn_stdin_reader(tx: crossbeam_channel::Sender<ExternalCommand>) {
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        log::warn!("stdin read error: {e}");
                        break;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<ExternalCommand>(trimmed) {
                    Ok(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::warn!("Ignoring malformed command line: {e}"),
                }
            }
            log::debug!("stdin command reader exiting");
        });
    if let Err(e) = spawned {
        log::warn!("Could not spawn stdin command reader: {e}");
    }
}
