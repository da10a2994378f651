use std::{fmt::Display, str::FromStr, time::Duration};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum FinalizeError {
    #[error("parte is missing required fields: {}", list_fields(.0))]
    #[diagnostic(code(huka_extract::parte::incomplete))]
    Incomplete(Vec<MissingField>),
}

fn list_fields(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(|field| field.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modalidad {
    Costa,
    Embarcado,
}

impl Display for Modalidad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Costa => write!(f, "costa"),
            Self::Embarcado => write!(f, "embarcado"),
        }
    }
}

impl FromStr for Modalidad {
    type Err = UnknownModalidad;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "costa" => Ok(Self::Costa),
            "embarcado" => Ok(Self::Embarcado),
            other => Err(UnknownModalidad(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("unknown fishing mode {0:?}")]
#[diagnostic(code(huka_extract::parte::unknown_modalidad))]
pub struct UnknownModalidad(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EspecieCapturada {
    pub nombre: String,
    pub cantidad: u32,
}

impl EspecieCapturada {
    pub fn new(nombre: impl Into<String>, cantidad: u32) -> Self {
        Self {
            nombre: nombre.into(),
            cantidad,
        }
    }
}

impl Display for EspecieCapturada {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} x{}", self.nombre, self.cantidad)
    }
}

/// Follow-up prompts for fields that are still empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingField {
    Date,
    StartTime,
    Species,
    Pieces,
    Location,
    Mode,
    Rods,
}

impl MissingField {
    pub fn question(&self) -> &'static str {
        match self {
            Self::Date => "¿Qué día fuiste a pescar?",
            Self::StartTime => "¿A qué hora empezaste a pescar?",
            Self::Species => "¿Qué especies sacaste y cuántas de cada una?",
            Self::Pieces => "¿Cuántas piezas sacaste?",
            Self::Location => "¿Dónde pescaste? Decime la provincia o el lugar.",
            Self::Mode => "¿Pescaste desde la costa o embarcado?",
            Self::Rods => "¿Con cuántas cañas pescaste?",
        }
    }

    /// Whether a parte can be finalized without this field.
    pub fn required(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Species | Self::Location | Self::Mode
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Date => "fecha",
            Self::StartTime => "hora de inicio",
            Self::Species => "especies",
            Self::Pieces => "piezas",
            Self::Location => "lugar",
            Self::Mode => "modalidad",
            Self::Rods => "cañas",
        }
    }
}

/// Concatenate species lists, letting `new` replace counts of names already
/// present in `existing` without moving them.
pub fn merge_species(
    mut existing: Vec<EspecieCapturada>,
    new: Vec<EspecieCapturada>,
) -> Vec<EspecieCapturada> {
    for especie in new {
        match existing.iter_mut().find(|e| e.nombre == especie.nombre) {
            Some(entry) => entry.cantidad = especie.cantidad,
            None => existing.push(especie),
        }
    }
    existing
}

/// Add `cantidad` to a species entry, creating it if needed.
pub fn add_species(especies: &mut Vec<EspecieCapturada>, nombre: &str, cantidad: u32) {
    match especies.iter_mut().find(|e| e.nombre == nombre) {
        Some(entry) => entry.cantidad += cantidad,
        None => especies.push(EspecieCapturada::new(nombre, cantidad)),
    }
}

fn merge_paths(mut existing: Vec<String>, new: Vec<String>) -> Vec<String> {
    for path in new {
        if !existing.contains(&path) {
            existing.push(path);
        }
    }
    existing
}

/// Current session record kept by the fishing-fact extractor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FishingData {
    pub fecha: Option<NaiveDate>,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub piezas: Option<u32>,
    pub canas: Option<u32>,
    pub tipo: Option<Modalidad>,
    pub especies: Vec<EspecieCapturada>,
    pub lugar: Option<String>,
    pub foto: Option<String>,
}

impl FishingData {
    pub fn merge(self, new: FishingData) -> FishingData {
        FishingData {
            fecha: new.fecha.or(self.fecha),
            hora_inicio: new.hora_inicio.or(self.hora_inicio),
            hora_fin: new.hora_fin.or(self.hora_fin),
            piezas: new.piezas.or(self.piezas),
            canas: new.canas.or(self.canas),
            tipo: new.tipo.or(self.tipo),
            especies: merge_species(self.especies, new.especies),
            lugar: new.lugar.or(self.lugar),
            foto: new.foto.or(self.foto),
        }
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.fecha.is_none() {
            missing.push(MissingField::Date);
        }
        if self.piezas.is_none() {
            missing.push(MissingField::Pieces);
        }
        if self.canas.is_none() {
            missing.push(MissingField::Rods);
        }
        if self.tipo.is_none() {
            missing.push(MissingField::Mode);
        }
        missing
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<FishingData> for ParteEnProgreso {
    fn from(data: FishingData) -> Self {
        Self {
            fecha: data.fecha,
            hora_inicio: data.hora_inicio,
            hora_fin: data.hora_fin,
            especies: data.especies,
            provincia: None,
            lugar: data.lugar,
            modalidad: data.tipo,
            cantidad_canas: data.canas,
            fotos: data.foto.into_iter().collect(),
            observaciones: None,
        }
    }
}

/// A parte built up across chat turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParteEnProgreso {
    pub fecha: Option<NaiveDate>,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub especies: Vec<EspecieCapturada>,
    pub provincia: Option<String>,
    pub lugar: Option<String>,
    pub modalidad: Option<Modalidad>,
    pub cantidad_canas: Option<u32>,
    pub fotos: Vec<String>,
    pub observaciones: Option<String>,
}

impl ParteEnProgreso {
    /// Fields present in `new` win; lists concatenate.
    pub fn merge(self, new: ParteEnProgreso) -> ParteEnProgreso {
        ParteEnProgreso {
            fecha: new.fecha.or(self.fecha),
            hora_inicio: new.hora_inicio.or(self.hora_inicio),
            hora_fin: new.hora_fin.or(self.hora_fin),
            especies: merge_species(self.especies, new.especies),
            provincia: new.provincia.or(self.provincia),
            lugar: new.lugar.or(self.lugar),
            modalidad: new.modalidad.or(self.modalidad),
            cantidad_canas: new.cantidad_canas.or(self.cantidad_canas),
            fotos: merge_paths(self.fotos, new.fotos),
            observaciones: new.observaciones.or(self.observaciones),
        }
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        let mut missing = Vec::new();
        if self.fecha.is_none() {
            missing.push(MissingField::Date);
        }
        if self.hora_inicio.is_none() {
            missing.push(MissingField::StartTime);
        }
        if self.especies.is_empty() {
            missing.push(MissingField::Species);
        }
        if self.provincia.is_none() && self.lugar.is_none() {
            missing.push(MissingField::Location);
        }
        if self.modalidad.is_none() {
            missing.push(MissingField::Mode);
        }
        if self.cantidad_canas.is_none() {
            missing.push(MissingField::Rods);
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().iter().all(|field| !field.required())
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn total_piezas(&self) -> u32 {
        self.especies.iter().map(|e| e.cantidad).sum()
    }
}

impl Display for ParteEnProgreso {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(fecha) = self.fecha {
            parts.push(format!("fecha {}", fecha.format("%d/%m/%Y")));
        }
        match (self.hora_inicio, self.hora_fin) {
            (Some(inicio), Some(fin)) => {
                parts.push(format!("de {} a {}", inicio.format("%H:%M"), fin.format("%H:%M")))
            }
            (Some(inicio), None) => parts.push(format!("desde las {}", inicio.format("%H:%M"))),
            (None, Some(fin)) => parts.push(format!("hasta las {}", fin.format("%H:%M"))),
            (None, None) => {}
        }
        if !self.especies.is_empty() {
            parts.push(
                self.especies
                    .iter()
                    .map(EspecieCapturada::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }
        match (&self.lugar, &self.provincia) {
            (Some(lugar), Some(provincia)) => parts.push(format!("en {lugar} ({provincia})")),
            (Some(lugar), None) => parts.push(format!("en {lugar}")),
            (None, Some(provincia)) => parts.push(format!("en {provincia}")),
            (None, None) => {}
        }
        if let Some(modalidad) = self.modalidad {
            parts.push(modalidad.to_string());
        }
        if let Some(canas) = self.cantidad_canas {
            parts.push(format!("{canas} cañas"));
        }
        if !self.fotos.is_empty() {
            parts.push(format!("{} fotos", self.fotos.len()));
        }

        if parts.is_empty() {
            write!(f, "parte vacío")
        } else {
            write!(f, "{}", parts.join(" · "))
        }
    }
}

/// A finalized fishing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartePesca {
    pub usuario: String,
    pub fecha: NaiveDate,
    pub hora_inicio: Option<NaiveTime>,
    pub hora_fin: Option<NaiveTime>,
    pub especies: Vec<EspecieCapturada>,
    pub provincia: Option<String>,
    pub lugar: Option<String>,
    pub modalidad: Modalidad,
    pub cantidad_canas: Option<u32>,
    pub fotos: Vec<String>,
    pub observaciones: Option<String>,
    pub creado: DateTime<Utc>,
}

impl PartePesca {
    pub fn finalize(
        parte: ParteEnProgreso,
        usuario: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, FinalizeError> {
        let missing = parte
            .missing_fields()
            .into_iter()
            .filter(MissingField::required)
            .collect::<Vec<_>>();

        match (parte.fecha, parte.modalidad) {
            (Some(fecha), Some(modalidad)) if missing.is_empty() => Ok(Self {
                usuario: usuario.into(),
                fecha,
                hora_inicio: parte.hora_inicio,
                hora_fin: parte.hora_fin,
                especies: parte.especies,
                provincia: parte.provincia,
                lugar: parte.lugar,
                modalidad,
                cantidad_canas: parte.cantidad_canas,
                fotos: parte.fotos,
                observaciones: parte.observaciones,
                creado: now,
            }),
            _ => Err(FinalizeError::Incomplete(missing)),
        }
    }

    pub fn total_piezas(&self) -> u32 {
        self.especies.iter().map(|e| e.cantidad).sum()
    }

    /// Length of the outing; an end before the start is taken to cross midnight.
    pub fn duracion(&self) -> Option<Duration> {
        let (inicio, fin) = (self.hora_inicio?, self.hora_fin?);
        let mut minutes = (fin - inicio).num_minutes();
        if minutes < 0 {
            minutes += 24 * 60;
        }
        Some(Duration::from_secs(minutes as u64 * 60))
    }
}
