use crate::model::function::{ControlFunction, FUNCTIONS};

/// Polled view of one physical rotary encoder with push-button and RGB LED.
/// Implemented by the I2C driver layer; the engine only samples it.
pub trait Encoder: Send {
    /// Monotonic up/down detent counter.
    fn position(&mut self) -> i64;
    fn button_pressed(&mut self) -> bool;
    fn set_led(&mut self, rgb: (u8, u8, u8));
    fn clear_led(&mut self);
}

/// One optional encoder per function. A missing encoder means "no events for
/// that function", never an error.
#[derive(Default)]
pub struct EncoderBank {
    slots: [Option<Box<dyn Encoder>>; 5],
}

impl EncoderBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, function: ControlFunction, encoder: Box<dyn Encoder>) {
        self.slots[function.index()] = Some(encoder);
    }

    pub fn get_mut(&mut self, function: ControlFunction) -> Option<&mut (dyn Encoder + '_)> {
        self.slots[function.index()]
            .as_mut()
            .map(|b| b.as_mut() as &mut (dyn Encoder + '_))
    }

    /// Lights every present encoder with its function color.
    pub fn apply_function_leds(&mut self) {
        for function in FUNCTIONS {
            if let Some(encoder) = self.get_mut(function) {
                encoder.set_led(function.led_color());
            }
        }
    }
}
