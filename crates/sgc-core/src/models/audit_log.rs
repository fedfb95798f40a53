//! Audit log model

use serde::{Deserialize, Serialize};

use super::Record;

/// Action kinds recorded by the domain handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    GraveRegistered,
    Burial,
    BurialEdited,
    BurialRemoved,
    CemeteryRegistered,
    UserRegistered,
    UserEdited,
    UserRemoved,
}

impl AuditAction {
    /// Code stored in the `action` column.
    pub const fn code(self) -> &'static str {
        match self {
            Self::GraveRegistered => "CADASTRO_SEPULTURA",
            Self::Burial => "SEPULTAMENTO",
            Self::BurialEdited => "EDICAO_REGISTRO",
            Self::BurialRemoved => "EXCLUSAO_REGISTRO",
            Self::CemeteryRegistered => "CADASTRO_CEMITERIO",
            Self::UserRegistered => "CADASTRO_USUARIO",
            Self::UserEdited => "EDICAO_USUARIO",
            Self::UserRemoved => "EXCLUSAO_USUARIO",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub action: String,
    #[serde(rename = "targetId")]
    pub target_id: String,
    #[serde(default)]
    pub details: String,
    #[serde(rename = "performedBy")]
    pub performed_by: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl Record for AuditLog {
    fn record_id(&self) -> i64 {
        self.id
    }
}
