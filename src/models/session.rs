// Session mode, UI control events and per-tick reports

use crate::models::classifier::{ClassIndex, Prediction};
use serde::Serialize;

/// What the control loop does with each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Idle,
    Recording(ClassIndex),
}

impl SessionMode {
    /// Button press: last press wins, even while another class is held
    pub fn press(self, class: ClassIndex) -> Self {
        SessionMode::Recording(class)
    }

    /// Button release: back to idle regardless of which button was released
    pub fn release(self) -> Self {
        SessionMode::Idle
    }

    pub fn recording_class(&self) -> Option<ClassIndex> {
        match self {
            SessionMode::Recording(class) => Some(*class),
            SessionMode::Idle => None,
        }
    }
}

/// Input edges from the class buttons and housekeeping controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Press(ClassIndex),
    /// Any button release; which button does not matter
    Release,
    ClearClass(ClassIndex),
    ClearAll,
    Quit,
}

/// Why a tick did neither recording nor prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LowPoseScore(f32),
}

/// Summary of one control-loop tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub mode: SessionMode,
    pub extracted: bool,
    pub recorded: Option<ClassIndex>,
    pub prediction: Option<Prediction>,
    pub skipped: Option<SkipReason>,
    pub fps: f32,
}

impl TickReport {
    pub fn new(tick: u64, mode: SessionMode) -> Self {
        Self {
            tick,
            mode,
            extracted: false,
            recorded: None,
            prediction: None,
            skipped: None,
            fps: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mode = SessionMode::default();
        assert_eq!(mode, SessionMode::Idle);

        let mode = mode.press(ClassIndex(1));
        assert_eq!(mode.recording_class(), Some(ClassIndex(1)));

        let mode = mode.release();
        assert_eq!(mode.recording_class(), None);
    }

    #[test]
    fn test_last_press_wins() {
        let mode = SessionMode::Idle.press(ClassIndex(0)).press(ClassIndex(2));
        assert_eq!(mode, SessionMode::Recording(ClassIndex(2)));

        // Releasing any button clears recording entirely
        assert_eq!(mode.release(), SessionMode::Idle);
    }
}
