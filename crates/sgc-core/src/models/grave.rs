//! Grave model
//!
//! A grave (sepultura) is the unit shown on the map. When occupied it embeds
//! the deceased, the responsible party and the burial record. Wire names
//! follow the remote `sepulturas` columns, which are camelCase.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Record;

/// Occupancy status of a grave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraveStatus {
    #[serde(rename = "LIVRE")]
    Free,
    #[serde(rename = "OCUPADO")]
    Occupied,
    #[serde(rename = "RESERVADO")]
    Reserved,
    #[serde(rename = "EXUMADO")]
    Exhumed,
    #[serde(rename = "CONSTRUÍDO")]
    Built,
    #[serde(rename = "EM MANUTENÇÃO")]
    UnderMaintenance,
    #[serde(rename = "DEMOLIDO")]
    Demolished,
}

/// Construction type of a grave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraveKind {
    #[serde(rename = "TÚMULO")]
    Tomb,
    #[serde(rename = "CAPELA TUMULAR")]
    Chapel,
    #[serde(rename = "JAZIGO")]
    Vault,
    #[serde(rename = "COVA (TERRA)")]
    EarthGrave,
    #[serde(rename = "OSSUÁRIO")]
    Ossuary,
}

impl GraveStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "LIVRE",
            Self::Occupied => "OCUPADO",
            Self::Reserved => "RESERVADO",
            Self::Exhumed => "EXUMADO",
            Self::Built => "CONSTRUÍDO",
            Self::UnderMaintenance => "EM MANUTENÇÃO",
            Self::Demolished => "DEMOLIDO",
        }
    }
}

impl fmt::Display for GraveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GraveKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tomb => "TÚMULO",
            Self::Chapel => "CAPELA TUMULAR",
            Self::Vault => "JAZIGO",
            Self::EarthGrave => "COVA (TERRA)",
            Self::Ossuary => "OSSUÁRIO",
        }
    }
}

impl FromStr for GraveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TÚMULO" | "TUMULO" | "TOMB" => Ok(Self::Tomb),
            "CAPELA TUMULAR" | "CAPELA" | "CHAPEL" => Ok(Self::Chapel),
            "JAZIGO" | "VAULT" => Ok(Self::Vault),
            "COVA (TERRA)" | "COVA" | "EARTH" => Ok(Self::EarthGrave),
            "OSSUÁRIO" | "OSSUARIO" | "OSSUARY" => Ok(Self::Ossuary),
            other => Err(format!("unknown grave type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A deceased person buried in a grave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deceased {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "dataNascimento", default, deserialize_with = "super::null_as_default")]
    pub birth_date: String,
    #[serde(rename = "dataObito", default, deserialize_with = "super::null_as_default")]
    pub death_date: String,
    #[serde(rename = "causaObito", default, deserialize_with = "super::null_as_default")]
    pub cause_of_death: String,
    #[serde(rename = "fichaAmarelaNro", default, deserialize_with = "super::null_as_default")]
    pub death_certificate_number: String,
    #[serde(rename = "orgaoEmissao", default, deserialize_with = "super::null_as_default")]
    pub issuing_body: String,
    #[serde(rename = "horaObito", default, skip_serializing_if = "Option::is_none")]
    pub time_of_death: Option<String>,
    #[serde(rename = "nomePai", default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(rename = "nomeMae", default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(rename = "familia", default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    /// Attributes this layer does not interpret but must carry through sync.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Person responsible for a burial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responsible {
    pub id: i64,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "documento", default, deserialize_with = "super::null_as_default")]
    pub document: String,
    #[serde(rename = "telefone", default, deserialize_with = "super::null_as_default")]
    pub phone: String,
    #[serde(rename = "endereco", default, deserialize_with = "super::null_as_default")]
    pub address: String,
    #[serde(rename = "testemunha1", default, skip_serializing_if = "Option::is_none")]
    pub witness1: Option<String>,
    #[serde(rename = "testemunha2", default, skip_serializing_if = "Option::is_none")]
    pub witness2: Option<String>,
}

/// The burial record linking deceased, grave and gravedigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burial {
    pub id: i64,
    #[serde(rename = "falecidoId")]
    pub deceased_id: i64,
    #[serde(rename = "localizacaoId")]
    pub grave_id: i64,
    #[serde(rename = "responsavelId")]
    pub responsible_id: i64,
    #[serde(rename = "coveiroId")]
    pub gravedigger_id: i64,
    #[serde(rename = "dataSepultamento")]
    pub burial_date: String,
    #[serde(rename = "autorizacaoNro")]
    pub authorization_number: String,
    #[serde(rename = "controleNro")]
    pub control_number: String,
}

/// A grave and, when occupied, its burial data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grave {
    pub id: i64,
    #[serde(rename = "cemiterioId")]
    pub cemetery_id: i64,
    #[serde(rename = "alameda", default, deserialize_with = "super::null_as_default")]
    pub alley: String,
    #[serde(rename = "quadra")]
    pub block: String,
    #[serde(rename = "lote")]
    pub lot: String,
    #[serde(rename = "sepultura")]
    pub plot: String,
    #[serde(rename = "tipoSepultura")]
    pub kind: GraveKind,
    #[serde(rename = "numGavetas", default, skip_serializing_if = "Option::is_none")]
    pub drawers: Option<u32>,
    pub status: GraveStatus,
    // Clearable columns are always written: an upsert merges by column, so
    // an omitted one would keep its old remote value.
    #[serde(rename = "nomeFamilia", default)]
    pub family_name: Option<String>,
    #[serde(rename = "coordenadas", default)]
    pub coordinates: Option<Coordinates>,
    #[serde(rename = "anexos", default, deserialize_with = "super::null_as_default")]
    pub attachments: Vec<String>,
    #[serde(rename = "falecido", default)]
    pub deceased: Option<Deceased>,
    #[serde(rename = "responsavel", default)]
    pub responsible: Option<Responsible>,
    #[serde(rename = "sepultamento", default)]
    pub burial: Option<Burial>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Grave {
    /// Create an empty grave at the given location.
    #[must_use]
    pub fn new(id: i64, location: GraveLocation, kind: GraveKind) -> Self {
        Self {
            id,
            cemetery_id: location.cemetery_id,
            alley: String::new(),
            block: location.block,
            lot: location.lot,
            plot: location.plot,
            kind,
            drawers: None,
            status: GraveStatus::Free,
            family_name: None,
            coordinates: None,
            attachments: Vec::new(),
            deceased: None,
            responsible: None,
            burial: None,
            extra: Map::new(),
        }
    }

    /// Check whether this grave sits at `location`.
    pub fn is_at(&self, location: &GraveLocation) -> bool {
        self.cemetery_id == location.cemetery_id
            && self.block == location.block
            && self.lot == location.lot
            && self.plot == location.plot
    }

    /// Short human-readable location, e.g. `Q:A L:12 S1`.
    pub fn label(&self) -> String {
        format!("Q:{} L:{} {}", self.block, self.lot, self.plot)
    }
}

impl Record for Grave {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// Address of a grave inside a cemetery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraveLocation {
    pub cemetery_id: i64,
    pub block: String,
    pub lot: String,
    pub plot: String,
}

/// Input for registering one grave or a multi-drawer vault.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGraves {
    pub cemetery_id: i64,
    pub block: String,
    pub lot: String,
    /// Plot name for single graves; defaults to `S1`.
    pub plot: Option<String>,
    pub kind: GraveKind,
    /// More than one drawer creates one grave per drawer (`G1..Gn`).
    pub drawers: u32,
    pub family_name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// Input for registering (or editing) a burial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurialForm {
    pub location: GraveLocation,
    pub deceased_name: String,
    pub birth_date: String,
    pub death_date: String,
    pub cause_of_death: String,
    pub death_certificate_number: String,
    pub issuing_body: String,
    pub responsible_name: String,
    pub responsible_document: String,
    pub responsible_phone: String,
    pub responsible_address: String,
    pub gravedigger_id: i64,
    pub authorization_number: String,
}
