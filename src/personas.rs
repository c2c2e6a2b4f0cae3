//! Critic personas.
//!
//! The persona set is fixed. Canonical order (`vc`, `engineer`, `ethicist`,
//! `user`, `competitor`) is the derived `Ord`, which keeps critique maps,
//! prompt assembly and risk mentions in a stable order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed critique role with its own prompt and model binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    /// Skeptical venture capitalist: market size, moat, monetization.
    Vc,
    /// Senior engineer: scalability, edge cases, reliability.
    Engineer,
    /// Ethicist / safety reviewer: harm, bias, misuse, privacy.
    Ethicist,
    /// Impatient, skeptical end user: adoption friction, trust, workflow fit.
    User,
    /// Competitor strategy lead: copying and out-executing the idea.
    Competitor,
}

impl Persona {
    /// Every persona, in canonical order.
    pub const ALL: [Persona; 5] = [
        Persona::Vc,
        Persona::Engineer,
        Persona::Ethicist,
        Persona::User,
        Persona::Competitor,
    ];

    /// Wire name (`vc`, `engineer`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Vc => "vc",
            Persona::Engineer => "engineer",
            Persona::Ethicist => "ethicist",
            Persona::User => "user",
            Persona::Competitor => "competitor",
        }
    }

    /// Heading used when a critique is quoted back to the judge.
    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Vc => "VC",
            Persona::Engineer => "Engineer",
            Persona::Ethicist => "Ethicist",
            Persona::User => "User",
            Persona::Competitor => "Competitor",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "vc" => Ok(Persona::Vc),
            "engineer" => Ok(Persona::Engineer),
            "ethicist" => Ok(Persona::Ethicist),
            "user" => Ok(Persona::User),
            "competitor" => Ok(Persona::Competitor),
            other => Err(format!("Unknown persona: {}", other)),
        }
    }
}

/// Resolve a caller-supplied persona selection.
///
/// Unknown names are dropped and duplicates collapsed; the result is in
/// canonical order. An absent selection, or one that filters down to nothing,
/// widens back to every persona.
pub fn select_personas<S: AsRef<str>>(requested: Option<&[S]>) -> Vec<Persona> {
    let Some(requested) = requested else {
        return Persona::ALL.to_vec();
    };

    let mut selected: Vec<Persona> = requested
        .iter()
        .filter_map(|name| name.as_ref().parse::<Persona>().ok())
        .collect();
    selected.sort();
    selected.dedup();

    if selected.is_empty() {
        Persona::ALL.to_vec()
    } else {
        selected
    }
}
