pub mod config;
pub mod constants;
pub mod control_loop;
pub mod device;
pub mod discovery;
pub mod dispatcher;
pub mod encoder_hw;
pub mod encoder_input;
pub mod entry;
pub mod error;
pub mod messages;
pub mod model;
pub mod notifier;
pub mod paths;
pub mod selection;
pub mod store;
