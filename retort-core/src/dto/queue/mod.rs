//! Queue control DTOs

use serde::{Deserialize, Serialize};

use crate::domain::queue::ControlState;

/// Response to a pause/resume/stop request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub state: ControlState,
    pub paused: bool,
    pub stop_immediate: bool,
}

impl From<ControlState> for ControlResponse {
    fn from(state: ControlState) -> Self {
        Self {
            state,
            paused: state.is_paused(),
            stop_immediate: state.is_stop_immediate(),
        }
    }
}
