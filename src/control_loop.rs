use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::constants::LED_RESET_FLASH;
use crate::dispatcher::CommandDispatcher;
use crate::encoder_hw::EncoderBank;
use crate::encoder_input::{InputEvent, InputState};
use crate::messages::ExternalCommand;
use crate::model::function::FUNCTIONS;
use crate::selection::SelectionController;
use crate::store::ParameterStore;

const RESET_FLASH_DURATION: Duration = Duration::from_millis(200);

/// The single mutation path. Runs on the main thread at a fixed short tick:
/// sweep selection timeouts, fold encoder samples into events, route them,
/// drain the external queue, save dirty state on the save interval.
pub struct ControlLoop {
    bank: EncoderBank,
    inputs: Vec<InputState>,
    dispatcher: CommandDispatcher,
    selection: Arc<Mutex<SelectionController>>,
    store: Arc<Mutex<ParameterStore>>,
    external_rx: Receiver<ExternalCommand>,
    shutdown: Arc<AtomicBool>,
    tick: Duration,
    save_interval: Duration,
    last_save: Instant,
    flash_until: [Option<Instant>; 5],
}

impl ControlLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut bank: EncoderBank,
        dispatcher: CommandDispatcher,
        selection: Arc<Mutex<SelectionController>>,
        store: Arc<Mutex<ParameterStore>>,
        external_rx: Receiver<ExternalCommand>,
        shutdown: Arc<AtomicBool>,
        config: &Config,
    ) -> Self {
        let hold_threshold = config.hold_threshold();
        let inputs = FUNCTIONS
            .iter()
            .map(|&f| {
                let initial = bank.get_mut(f).map(|e| e.position()).unwrap_or(0);
                InputState::new(initial, hold_threshold)
            })
            .collect();
        bank.apply_function_leds();
        Self {
            bank,
            inputs,
            dispatcher,
            selection,
            store,
            external_rx,
            shutdown,
            tick: config.tick(),
            save_interval: config.save_interval(),
            last_save: Instant::now(),
            flash_until: [None; 5],
        }
    }

    pub fn run(&mut self) {
        log::info!(
            "Control loop running: {} synth(s), tick {:?}",
            self.dispatcher.num_synths(),
            self.tick
        );
        while !self.shutdown.load(Ordering::Relaxed) {
            self.step(Instant::now());
            std::thread::sleep(self.tick);
        }
        log::info!("Shutdown requested; silencing outputs and saving state");
        self.dispatcher.silence_all();
        for function in FUNCTIONS {
            if let Some(encoder) = self.bank.get_mut(function) {
                encoder.clear_led();
            }
        }
        self.store.lock().save();
    }

    /// One tick's worth of work, separated from `run` for deterministic
    /// stepping in tests.
    pub fn step(&mut self, now: Instant) {
        self.selection.lock().sweep_timeouts(now);

        for (idx, &function) in FUNCTIONS.iter().enumerate() {
            let sample = match self.bank.get_mut(function) {
                Some(encoder) => (encoder.position(), encoder.button_pressed()),
                None => continue,
            };
            let event = self.inputs[idx].update(sample.0, sample.1, now);
            match event {
                Some(InputEvent::Rotate(delta)) => {
                    let scope = {
                        let mut sel = self.selection.lock();
                        sel.touch(function, now);
                        sel.resolve_scope(function)
                    };
                    self.dispatcher.apply_rotation(function, scope, delta);
                }
                Some(InputEvent::Press) => {
                    self.selection.lock().advance(function, now);
                }
                Some(InputEvent::Hold) => {
                    let scope = self.selection.lock().resolve_scope(function);
                    self.dispatcher.apply_hold_reset(function, scope);
                    if let Some(encoder) = self.bank.get_mut(function) {
                        encoder.set_led(LED_RESET_FLASH);
                    }
                    self.flash_until[idx] = Some(now + RESET_FLASH_DURATION);
                }
                Some(InputEvent::ReleaseAfterHold) | None => {}
            }

            if let Some(deadline) = self.flash_until[idx] {
                if now >= deadline {
                    if let Some(encoder) = self.bank.get_mut(function) {
                        encoder.set_led(function.led_color());
                    }
                    self.flash_until[idx] = None;
                }
            }
        }

        self.dispatcher.drain_external(&self.external_rx);

        if now.duration_since(self.last_save) >= self.save_interval {
            let mut store = self.store.lock();
            if store.is_dirty() {
                store.save();
            }
            self.last_save = now;
        }
    }
}
