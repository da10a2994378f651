use std::{collections::HashSet, ops::Range};

use chrono::{Local, NaiveDate, NaiveDateTime};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    fecha, hora,
    parte::{add_species, FishingData, MissingField},
    vocab::{
        find_locations, find_modes, find_species, overlaps, parse_number, Normalized,
        NUMBER_WORDS_PATTERN,
    },
};

/// Tokens further than this many bytes from every anchor are ignored.
pub const MAX_ANCHOR_DISTANCE: usize = 24;

static NUMBER_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b(?:\d{{1,3}}|{NUMBER_WORDS_PATTERN})\b")).unwrap());
static PIECES_ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:piezas?|pescados?|peces|pez|capturas?|ejemplares?)\b").unwrap()
});
static RODS_ANCHOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:ca[nñ]as?|equipos?|lineas?)\b").unwrap());
static EMPTY_HANDED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:no\s+(?:saque|sacamos|pesque|pescamos|agarre|agarramos)\s+nada|cero\s+piezas|bolsa\s+vacia|ni\s+un\s+pique)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Pieces,
    Species(&'static str),
    Rods,
}

impl Anchor {
    /// Species claim a tied token first; `pescado` is as often a verb as a count.
    fn priority(self) -> u8 {
        match self {
            Anchor::Species(_) => 0,
            Anchor::Rods => 1,
            Anchor::Pieces => 2,
        }
    }
}

fn gap(a: &Range<usize>, b: &Range<usize>) -> usize {
    if a.end <= b.start {
        b.start - a.end
    } else if b.end <= a.start {
        a.start - b.end
    } else {
        0
    }
}

/// Pair each anchor with its closest free numeric token, closest pairs first.
///
/// Equal distances go to the higher priority anchor, then to a token written
/// before its anchor ("3 dorados").
fn assign_tokens(
    tokens: &[(Range<usize>, u32)],
    anchors: &[(Range<usize>, Anchor)],
) -> Vec<Option<u32>> {
    let mut pairs = Vec::new();
    for (t, (token_span, _)) in tokens.iter().enumerate() {
        for (a, (anchor_span, anchor)) in anchors.iter().enumerate() {
            let distance = gap(token_span, anchor_span);
            if distance <= MAX_ANCHOR_DISTANCE {
                let trailing = token_span.start >= anchor_span.end;
                pairs.push((distance, anchor.priority(), trailing, t, a));
            }
        }
    }
    pairs.sort();

    let mut used_tokens = HashSet::new();
    let mut assigned = vec![None; anchors.len()];
    for (_, _, _, t, a) in pairs {
        if assigned[a].is_none() && !used_tokens.contains(&t) {
            used_tokens.insert(t);
            assigned[a] = Some(tokens[t].1);
        }
    }
    assigned
}

/// Extract what a single message says about the outing.
pub fn extract_fishing_data(message: &str, photo: Option<&str>, today: NaiveDate) -> FishingData {
    let normalized = Normalized::new(message);
    let text = normalized.as_str();

    let dates = fecha::find_dates(message, today);
    let times = hora::extract(message);
    let (hora_inicio, hora_fin) = hora::start_and_end(&times);
    let taken = dates
        .iter()
        .map(|d| d.span.clone())
        .chain(times.iter().map(|t| t.span.clone()))
        .collect::<Vec<_>>();

    let tokens = NUMBER_TOKEN_REGEX
        .find_iter(text)
        .filter(|m| {
            let original = normalized.original_span(m.range());
            !taken.iter().any(|span| overlaps(span, &original))
        })
        .filter_map(|m| parse_number(m.as_str()).map(|n| (m.range(), n)))
        .collect::<Vec<_>>();

    let mut anchors = PIECES_ANCHOR_REGEX
        .find_iter(text)
        .map(|m| (m.range(), Anchor::Pieces))
        .chain(
            find_species(text)
                .into_iter()
                .map(|(span, name)| (span, Anchor::Species(name))),
        )
        .chain(RODS_ANCHOR_REGEX.find_iter(text).map(|m| (m.range(), Anchor::Rods)))
        .collect::<Vec<_>>();
    anchors.sort_by_key(|(span, _)| span.start);

    let assigned = assign_tokens(&tokens, &anchors);

    let mut especies = Vec::new();
    let mut generic_pieces: Option<u32> = None;
    let mut canas = None;
    for ((_, anchor), count) in anchors.iter().zip(assigned) {
        match anchor {
            Anchor::Species(name) => add_species(&mut especies, name, count.unwrap_or(1)),
            Anchor::Pieces => {
                if let Some(count) = count {
                    *generic_pieces.get_or_insert(0) += count;
                }
            }
            Anchor::Rods => canas = canas.or(count),
        }
    }

    let piezas = if EMPTY_HANDED_REGEX.is_match(text) {
        Some(0)
    } else if generic_pieces.is_some() {
        generic_pieces
    } else if !especies.is_empty() {
        Some(especies.iter().map(|e| e.cantidad).sum())
    } else {
        None
    };

    let tipo = find_modes(text)
        .into_iter()
        .min_by_key(|(span, _)| span.start)
        .map(|(_, modalidad)| modalidad);

    FishingData {
        fecha: dates.first().map(|d| d.date),
        hora_inicio,
        hora_fin,
        piezas,
        canas,
        tipo,
        especies,
        lugar: find_locations(message).into_iter().next().map(|(_, name)| name),
        foto: photo.map(str::to_string),
    }
}

fn summary(data: &FishingData) -> String {
    let mut fields = Vec::new();
    if let Some(fecha) = data.fecha {
        fields.push(format!("fecha={fecha}"));
    }
    if let Some(inicio) = data.hora_inicio {
        fields.push(format!("inicio={}", inicio.format("%H:%M")));
    }
    if let Some(fin) = data.hora_fin {
        fields.push(format!("fin={}", fin.format("%H:%M")));
    }
    if let Some(piezas) = data.piezas {
        fields.push(format!("piezas={piezas}"));
    }
    if let Some(canas) = data.canas {
        fields.push(format!("canas={canas}"));
    }
    if let Some(tipo) = data.tipo {
        fields.push(format!("tipo={tipo}"));
    }
    if !data.especies.is_empty() {
        fields.push(format!(
            "especies=[{}]",
            data.especies
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    if let Some(lugar) = &data.lugar {
        fields.push(format!("lugar={lugar}"));
    }
    if let Some(foto) = &data.foto {
        fields.push(format!("foto={foto}"));
    }

    if fields.is_empty() {
        "sin datos".to_string()
    } else {
        fields.join(" ")
    }
}

/// Keeps the record of the outing being told in the current chat session.
#[derive(Debug, Default)]
pub struct FishingDataExtractor {
    current: FishingData,
    trace: Vec<String>,
}

impl FishingDataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> &FishingData {
        &self.current
    }

    pub fn process(&mut self, message: &str, photo: Option<&str>) -> FishingData {
        self.process_at(message, photo, Local::now().naive_local())
    }

    /// Merge what `message` says into the session and return a snapshot.
    pub fn process_at(
        &mut self,
        message: &str,
        photo: Option<&str>,
        now: NaiveDateTime,
    ) -> FishingData {
        let extracted = extract_fishing_data(message, photo, now.date());
        self.record(message, extracted, now).clone()
    }

    /// Merge data already extracted from `message` and trace it.
    pub fn record(
        &mut self,
        message: &str,
        extracted: FishingData,
        now: NaiveDateTime,
    ) -> &FishingData {
        self.current = std::mem::take(&mut self.current).merge(extracted);

        let line = format!(
            "[{}] {:?} -> {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            message,
            summary(&self.current)
        );
        debug!("{line}");
        self.trace.push(line);

        &self.current
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        self.current.missing_fields()
    }

    pub fn questions(&self) -> Vec<&'static str> {
        self.missing_fields()
            .iter()
            .map(MissingField::question)
            .collect()
    }

    /// Take the trace lines written since the last drain.
    pub fn drain_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }

    pub fn reset(&mut self) {
        self.current = FishingData::default();
    }
}
