use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Clinic role stored in `perfiles.tipo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "paciente")]
    Patient,
    #[serde(rename = "especialista")]
    Specialist,
    #[serde(rename = "administrador")]
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "paciente",
            Role::Specialist => "especialista",
            Role::Administrator => "administrador",
        }
    }

    /// Page a client lands on after logging in.
    pub fn landing(&self) -> &'static str {
        match self {
            Role::Patient => "dashboard-paciente",
            Role::Specialist => "dashboard-especialista",
            Role::Administrator => "dashboard-admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "paciente" | "patient" => Ok(Role::Patient),
            "especialista" | "specialist" => Ok(Role::Specialist),
            "administrador" | "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_profile_names_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Specialist).unwrap(), "\"especialista\"");
        let role: Role = serde_json::from_str("\"administrador\"").unwrap();
        assert_eq!(role, Role::Administrator);
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("Paciente".parse::<Role>().unwrap(), Role::Patient);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Administrator);
        assert!("doctor".parse::<Role>().is_err());
    }
}
