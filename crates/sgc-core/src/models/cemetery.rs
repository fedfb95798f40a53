//! Cemetery model

use serde::{Deserialize, Serialize};

use super::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cemetery {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "endereco", default, deserialize_with = "super::null_as_default")]
    pub address: String,
    #[serde(rename = "cep", default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(rename = "telefone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Name of the person in charge of the cemetery
    #[serde(rename = "responsavel", default, skip_serializing_if = "Option::is_none")]
    pub manager: Option<String>,
}

impl Record for Cemetery {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// Input for registering a cemetery. Coordinates are raw user text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewCemetery {
    pub name: String,
    pub address: String,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub latitude: String,
    pub longitude: String,
    pub manager: String,
}
