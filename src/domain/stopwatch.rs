// OR View procedure stopwatch
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stopwatch {
    pub running: bool,
    pub elapsed_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopwatchAction {
    Start,
    Stop,
    Reset,
}

impl std::str::FromStr for StopwatchAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(StopwatchAction::Start),
            "stop" => Ok(StopwatchAction::Stop),
            "reset" => Ok(StopwatchAction::Reset),
            other => Err(format!("unknown stopwatch action: {}", other)),
        }
    }
}

impl Stopwatch {
    pub fn apply(&mut self, action: StopwatchAction) {
        match action {
            StopwatchAction::Start => self.running = true,
            StopwatchAction::Stop => self.running = false,
            StopwatchAction::Reset => {
                self.running = false;
                self.elapsed_secs = 0;
            }
        }
    }

    /// Advance one second. Returns the new elapsed time when running.
    pub fn tick(&mut self) -> Option<u64> {
        if !self.running {
            return None;
        }
        self.elapsed_secs += 1;
        Some(self.elapsed_secs)
    }
}
