// Control Loop Constants
pub const DEFAULT_TICK_MS: u64 = 10;
pub const DEFAULT_HOLD_THRESHOLD_SECS: f64 = 1.0;
pub const DEFAULT_SELECTION_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_BROADCAST_INTERVAL_MS: u64 = 100;
pub const DEFAULT_SAVE_INTERVAL_SECS: u64 = 5;

// Parameter Bounds
pub const AMPLITUDE_MIN: f64 = 0.0;
pub const AMPLITUDE_MAX: f64 = 100.0;
pub const PHASE_MIN: f64 = -360.0;
pub const PHASE_MAX: f64 = 360.0;
// Accepted range of the DDS firmware; one host revision narrowed this to
// 20-70 Hz, the device itself takes the full range.
pub const DEFAULT_FREQUENCY_MIN: f64 = 20.0;
pub const DEFAULT_FREQUENCY_MAX: f64 = 8000.0;
pub const MIN_HARMONIC_ORDER: u32 = 3;

// Per-step deltas (configurable, these are the defaults)
pub const DEFAULT_AMPLITUDE_STEP: f64 = 1.0;
pub const DEFAULT_FREQUENCY_STEP: f64 = 0.1;
pub const DEFAULT_PHASE_STEP: f64 = 1.0;
pub const DEFAULT_HARMONIC_STEP: f64 = 1.0;

// Hardcoded fallback defaults when defaults.json is absent or malformed
pub const DEFAULT_AMPLITUDE_A: f64 = 100.0;
pub const DEFAULT_AMPLITUDE_B: f64 = 50.0;
pub const DEFAULT_FREQUENCY: f64 = 50.0;
pub const DEFAULT_PHASE: f64 = 0.0;

// Seed slot phase offsets for a freshly created harmonic
pub const HARMONIC_SEED_PHASE_A: f64 = 0.0;
pub const HARMONIC_SEED_PHASE_B: f64 = 180.0;

// Encoder LED Colors
pub const LED_AMPLITUDE_A: (u8, u8, u8) = (255, 0, 0);
pub const LED_AMPLITUDE_B: (u8, u8, u8) = (255, 165, 0);
pub const LED_FREQUENCY: (u8, u8, u8) = (0, 255, 0);
pub const LED_PHASE: (u8, u8, u8) = (0, 0, 255);
pub const LED_HARMONICS: (u8, u8, u8) = (255, 0, 255);
pub const LED_RESET_FLASH: (u8, u8, u8) = (255, 255, 255);

// Files
pub const STATE_FILE_NAME: &str = "synth_state.json";
pub const DEFAULTS_FILE_NAME: &str = "defaults.json";
pub const MAX_STATE_BACKUPS: usize = 10;

// Serial discovery
pub const SERIAL_BY_PATH_GLOB: &str = "/dev/serial/by-path/*";
pub const SERIAL_PRIORITY_KEYWORDS: &[&str] = &["usb", "esp", "arduino", "ch34", "cp210", "ftdi"];
