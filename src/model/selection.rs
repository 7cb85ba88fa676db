use serde::{Deserialize, Serialize};

use crate::model::synth::ChannelId;

/// Which synth/channel an encoder currently drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SelectionMode {
    All,
    Individual { synth: usize, channel: ChannelId },
}

impl SelectionMode {
    pub fn is_individual(&self) -> bool {
        matches!(self, SelectionMode::Individual { .. })
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SelectionMode::All => write!(f, "ALL"),
            SelectionMode::Individual { synth, channel } => {
                write!(f, "Synth {} Ch {}", synth + 1, channel)
            }
        }
    }
}
