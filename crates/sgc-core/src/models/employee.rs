//! Employee model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmployeeRole {
    #[serde(rename = "COVEIRO")]
    Gravedigger,
    #[serde(rename = "SERVIÇOS GERAIS")]
    GeneralServices,
    #[serde(rename = "ADMINISTRATIVO")]
    Administrative,
    #[serde(rename = "VIGIA")]
    Watchman,
}

impl EmployeeRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gravedigger => "COVEIRO",
            Self::GeneralServices => "SERVIÇOS GERAIS",
            Self::Administrative => "ADMINISTRATIVO",
            Self::Watchman => "VIGIA",
        }
    }
}

impl fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmployeeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "COVEIRO" | "GRAVEDIGGER" => Ok(Self::Gravedigger),
            "SERVIÇOS GERAIS" | "SERVICOS GERAIS" | "GENERAL" => Ok(Self::GeneralServices),
            "ADMINISTRATIVO" | "ADMINISTRATIVE" => Ok(Self::Administrative),
            "VIGIA" | "WATCHMAN" => Ok(Self::Watchman),
            other => Err(format!("unknown employee role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "cargo")]
    pub role: EmployeeRole,
    /// Registration number, e.g. `COV-001`
    #[serde(rename = "matricula", default, deserialize_with = "super::null_as_default")]
    pub registration: String,
}

impl Record for Employee {
    fn record_id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEmployee {
    pub name: String,
    pub role: EmployeeRole,
    pub registration: String,
}
