pub mod function;
pub mod selection;
pub mod synth;

pub use function::{ControlFunction, ScalarParam, SelectionPolicy, FUNCTIONS};
pub use selection::SelectionMode;
pub use synth::{ChannelId, ChannelParams, Harmonic, SynthParams};
