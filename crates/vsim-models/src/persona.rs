//! Persona panel data models.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A synthetic viewer profile used to condition a generated comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    /// Unique identifier within a batch
    pub id: String,
    /// Display name
    pub name: String,
    /// Username, stored without a leading "@"
    pub handle: String,
    /// Primary trait label (e.g. "Skeptical", "Fanboy", "Colorist")
    #[serde(rename = "trait")]
    pub trait_label: String,
    /// Perspective, obsession or area of expertise
    pub bio: String,
    /// Seed for generic avatar generation
    pub avatar_seed: String,
}

impl Persona {
    /// Strip leading "@" characters from a handle.
    ///
    /// Idempotent: a handle without a leading "@" is returned unchanged.
    pub fn normalize_handle(handle: &str) -> String {
        handle
            .trim_start_matches(|c: char| c == '@' || c.is_whitespace())
            .trim_end()
            .to_string()
    }

    /// Return this persona with its handle normalized.
    pub fn normalized(mut self) -> Self {
        self.handle = Self::normalize_handle(&self.handle);
        self
    }

    /// Handle as shown in log lines.
    pub fn display_handle(&self) -> String {
        format!("@{}", self.handle)
    }
}

/// Simulation mode: selects supportive vs adversarial framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Realistic, organic mix of viewers
    #[default]
    Standard,
    /// Adversarial stress test: critics, nitpickers, trolls
    Troll,
}

impl SimulationMode {
    /// Get string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            SimulationMode::Standard => "standard",
            SimulationMode::Troll => "troll",
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SimulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(SimulationMode::Standard),
            "troll" => Ok(SimulationMode::Troll),
            other => Err(format!("unknown simulation mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle_is_idempotent() {
        let once = Persona::normalize_handle("@pixel_peeper");
        assert_eq!(once, "pixel_peeper");
        assert_eq!(Persona::normalize_handle(&once), "pixel_peeper");
    }

    #[test]
    fn test_normalize_strips_every_leading_at() {
        assert_eq!(Persona::normalize_handle("@@double"), "double");
        assert_eq!(Persona::normalize_handle("@ spaced"), "spaced");
        assert_eq!(Persona::normalize_handle("mid@dle"), "mid@dle");
    }

    #[test]
    fn test_persona_wire_format() {
        let json = r#"{"id":"p1","name":"Dana","handle":"@dana_grades","trait":"Colorist",
            "bio":"Grades indie films","avatarSeed":"x9"}"#;
        let persona: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(persona.trait_label, "Colorist");
        assert_eq!(persona.normalized().display_handle(), "@dana_grades");
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("TROLL".parse::<SimulationMode>().unwrap(), SimulationMode::Troll);
        assert_eq!(SimulationMode::default().to_string(), "standard");
        assert!("chaos".parse::<SimulationMode>().is_err());
    }
}
