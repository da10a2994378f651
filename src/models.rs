use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use huka_extract::{EspecieCapturada, Modalidad, PartePesca};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Voice,
    Image,
    System,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Voice => write!(f, "voice"),
            Self::Image => write!(f, "image"),
            Self::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("unknown message kind {0:?}")]
#[diagnostic(code(huka::models::unknown_message_kind))]
pub struct UnknownMessageKind(pub String);

impl FromStr for MessageKind {
    type Err = UnknownMessageKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "voice" => Ok(Self::Voice),
            "image" => Ok(Self::Image),
            "system" => Ok(Self::System),
            other => Err(UnknownMessageKind(other.to_string())),
        }
    }
}

/// One line of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub from_user: bool,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, kind: MessageKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            from_user: true,
            kind,
            timestamp,
        }
    }

    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            from_user: false,
            kind: MessageKind::Text,
            timestamp,
        }
    }

    pub fn system(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            from_user: false,
            kind: MessageKind::System,
            timestamp,
        }
    }
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum DecodeRowError {
    #[error("stored species or photo list is not valid JSON")]
    #[diagnostic(code(huka::models::json))]
    Json(#[from] serde_json::Error),

    #[error("stored fishing mode is invalid")]
    #[diagnostic(code(huka::models::modalidad))]
    Modalidad(#[from] huka_extract::parte::UnknownModalidad),

    #[error("stored message kind is invalid")]
    #[diagnostic(code(huka::models::message_kind))]
    MessageKind(#[from] UnknownMessageKind),
}

#[derive(Debug, sqlx::FromRow)]
pub struct ParteRow {
    pub id: i64,
    pub usuario: String,
    pub fecha: NaiveDate,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub especies: String,
    pub provincia: Option<String>,
    pub lugar: Option<String>,
    pub modalidad: String,
    pub cantidad_canas: Option<i64>,
    pub fotos: String,
    pub observaciones: Option<String>,
    pub creado: DateTime<Utc>,
}

impl TryFrom<ParteRow> for PartePesca {
    type Error = DecodeRowError;

    fn try_from(row: ParteRow) -> Result<Self, Self::Error> {
        let especies: Vec<EspecieCapturada> = serde_json::from_str(&row.especies)?;
        let fotos: Vec<String> = serde_json::from_str(&row.fotos)?;

        Ok(Self {
            usuario: row.usuario,
            fecha: row.fecha,
            hora_inicio: row.hora_inicio,
            hora_fin: row.hora_fin,
            especies,
            provincia: row.provincia,
            lugar: row.lugar,
            modalidad: row.modalidad.parse::<Modalidad>()?,
            cantidad_canas: row.cantidad_canas.map(|n| n as u32),
            fotos,
            observaciones: row.observaciones,
            creado: row.creado,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PescadexRow {
    pub especie: String,
    pub primera_captura: NaiveDate,
    pub cantidad: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MessageRow {
    pub content: String,
    pub from_user: bool,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = DecodeRowError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            content: row.content,
            from_user: row.from_user,
            kind: row.kind.parse()?,
            timestamp: row.timestamp,
        })
    }
}
