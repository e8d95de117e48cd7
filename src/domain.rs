use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Gcmt3dError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventName(String);

impl EventName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventName {
    type Err = Gcmt3dError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !is_valid {
            return Err(Gcmt3dError::InvalidEventName(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IterationKey {
    pub iteration: u32,
    pub step: u32,
}

impl IterationKey {
    pub const INITIAL: IterationKey = IterationKey {
        iteration: 0,
        step: 0,
    };

    pub fn new(iteration: u32, step: u32) -> Self {
        Self { iteration, step }
    }

    pub fn file_stem(&self) -> String {
        format!("it{:05}_ls{:05}", self.iteration, self.step)
    }
}

impl fmt::Display for IterationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.iteration, self.step)
    }
}
