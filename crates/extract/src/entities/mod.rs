//! Entity layer: generic date/time recognition plus fishing-domain patterns,
//! folded into a [`ParteEnProgreso`].

use std::ops::Range;

use chrono::{NaiveDate, NaiveTime};
use log::{trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::{
    parte::{add_species, Modalidad, ParteEnProgreso},
    vocab::{
        find_locations, find_modes, find_provinces, find_species, overlaps, Normalized,
        NUMBER_WORDS_PATTERN, SPECIES_PATTERN,
    },
};

mod recognizer;

pub use recognizer::{EntityRecognizer, RecognizerError, RuleRecognizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntityKind {
    Date,
    Time,
    Species,
    Quantity,
    Province,
    Mode,
    Rods,
    Location,
}

/// A typed span of the original message.
///
/// `value` is normalized per kind: ISO dates, `HH:MM` times (`HH:MM-HH:MM`
/// for ranges, `-HH:MM` for an end time alone), canonical species and
/// province names, `costa`/`embarcado`, and decimal counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub value: String,
    pub confidence: f32,
    pub start: usize,
    pub end: usize,
}

impl Entity {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

static QUANTITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?P<n>\d{{1,3}}|{NUMBER_WORDS_PATTERN})\s+(?:de\s+)?(?:{})\b",
        *SPECIES_PATTERN
    ))
    .unwrap()
});

static RODS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?P<n>\d{{1,2}}|{NUMBER_WORDS_PATTERN})\s+(?:ca[nñ]as?|equipos?)\b"
    ))
    .unwrap()
});

fn number_value(token: &str) -> Option<String> {
    crate::vocab::parse_number(token).map(|n| n.to_string())
}

/// Fishing-specific entities found without any recognizer.
fn domain_entities(text: &str) -> Vec<Entity> {
    let normalized = Normalized::new(text);
    let haystack = normalized.as_str();
    let mut entities = Vec::new();

    let mut push = |kind, value: String, confidence, span: Range<usize>| {
        let span = normalized.original_span(span);
        entities.push(Entity {
            kind,
            value,
            confidence,
            start: span.start,
            end: span.end,
        });
    };

    for (span, name) in find_species(haystack) {
        push(EntityKind::Species, name.to_string(), 0.9, span);
    }
    for captures in QUANTITY_REGEX.captures_iter(haystack) {
        if let Some(n) = captures.name("n") {
            if let Some(value) = number_value(n.as_str()) {
                push(EntityKind::Quantity, value, 0.85, n.range());
            }
        }
    }
    for (span, name) in find_provinces(haystack) {
        push(EntityKind::Province, name.to_string(), 0.9, span);
    }
    for (span, modalidad) in find_modes(haystack) {
        push(EntityKind::Mode, modalidad.to_string(), 0.8, span);
    }
    for captures in RODS_REGEX.captures_iter(haystack) {
        let (Some(whole), Some(n)) = (captures.get(0), captures.name("n")) else {
            continue;
        };
        if let Some(value) = number_value(n.as_str()) {
            push(EntityKind::Rods, value, 0.85, whole.range());
        }
    }

    // location names depend on capitalization, so these spans are already original
    for (span, name) in find_locations(text) {
        entities.push(Entity {
            kind: EntityKind::Location,
            value: name,
            confidence: 0.7,
            start: span.start,
            end: span.end,
        });
    }

    entities
}

/// Drop entities overlapping a stronger one. Ties go to the longer span, then
/// the earlier one. The result is ordered by position.
fn deduplicate(mut entities: Vec<Entity>) -> Vec<Entity> {
    entities.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut kept: Vec<Entity> = Vec::with_capacity(entities.len());
    for entity in entities {
        if kept.iter().any(|k| overlaps(&k.span(), &entity.span())) {
            trace!("dropping overlapped {:?} {:?}", entity.kind, entity.value);
            continue;
        }
        kept.push(entity);
    }

    kept.sort_by_key(|e| e.start);
    kept
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

fn parse_time_value(value: &str) -> (Option<NaiveTime>, Option<NaiveTime>) {
    match value.split_once('-') {
        Some(("", end)) => (None, parse_time(end)),
        Some((start, end)) => (parse_time(start), parse_time(end)),
        None => (parse_time(value), None),
    }
}

/// Fold position-ordered entities into a parte.
///
/// A quantity applies to the next species; species without one count as a
/// single piece. The first time mention opens the outing and a later one
/// closes it. Everything else keeps its first occurrence.
pub fn fold_entities(entities: &[Entity]) -> ParteEnProgreso {
    let mut parte = ParteEnProgreso::default();
    let mut pending_quantity: Option<u32> = None;

    for entity in entities {
        match entity.kind {
            EntityKind::Quantity => pending_quantity = entity.value.parse().ok(),
            EntityKind::Species => add_species(
                &mut parte.especies,
                &entity.value,
                pending_quantity.take().unwrap_or(1),
            ),
            EntityKind::Date => {
                if parte.fecha.is_none() {
                    parte.fecha = NaiveDate::parse_from_str(&entity.value, "%Y-%m-%d").ok();
                }
            }
            EntityKind::Time => match parse_time_value(&entity.value) {
                (Some(start), Some(end)) => {
                    parte.hora_inicio = Some(start);
                    parte.hora_fin = Some(end);
                }
                (Some(time), None) if parte.hora_inicio.is_none() => {
                    parte.hora_inicio = Some(time)
                }
                (Some(time), None) | (None, Some(time)) => parte.hora_fin = Some(time),
                (None, None) => {}
            },
            EntityKind::Province => {
                parte.provincia.get_or_insert_with(|| entity.value.clone());
            }
            EntityKind::Mode => {
                if parte.modalidad.is_none() {
                    parte.modalidad = entity.value.parse::<Modalidad>().ok();
                }
            }
            EntityKind::Rods => {
                if parte.cantidad_canas.is_none() {
                    parte.cantidad_canas = entity.value.parse().ok();
                }
            }
            EntityKind::Location => {
                parte.lugar.get_or_insert_with(|| entity.value.clone());
            }
        }
    }

    parte
}

/// Runs a recognizer and the domain passes over a message.
#[derive(Debug, Clone, Default)]
pub struct EntityManager<R = RuleRecognizer> {
    recognizer: R,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: EntityRecognizer> EntityManager<R> {
    pub fn with_recognizer(recognizer: R) -> Self {
        Self { recognizer }
    }

    /// Every entity in `text`, non-overlapping and ordered by position.
    ///
    /// A failing recognizer only costs the date and time entities.
    pub fn extract(&self, text: &str, today: NaiveDate) -> Vec<Entity> {
        let mut entities = match self.recognizer.recognize(text, today) {
            Ok(entities) => entities,
            Err(err) => {
                warn!("entity recognizer failed, using domain patterns only: {err}");
                Vec::new()
            }
        };
        entities.extend(domain_entities(text));
        deduplicate(entities)
    }

    pub fn analyze(&self, text: &str, today: NaiveDate) -> ParteEnProgreso {
        fold_entities(&self.extract(text, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parte::{EspecieCapturada, MissingField};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 14).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entity(kind: EntityKind, value: &str, start: usize, end: usize) -> Entity {
        Entity {
            kind,
            value: value.to_string(),
            confidence: 0.9,
            start,
            end,
        }
    }

    fn kinds(entities: &[Entity]) -> Vec<EntityKind> {
        entities.iter().map(|e| e.kind).collect()
    }

    struct BrokenRecognizer;

    impl EntityRecognizer for BrokenRecognizer {
        fn recognize(&self, _: &str, _: NaiveDate) -> Result<Vec<Entity>, RecognizerError> {
            Err(RecognizerError::ModelUnavailable)
        }
    }

    mod extract {
        use super::*;

        #[test]
        fn report_in_position_order() {
            let entities = EntityManager::new()
                .extract("Ayer pesqué 2 dorados y 1 pejerrey desde costa", today());

            assert_eq!(
                kinds(&entities),
                vec![
                    EntityKind::Date,
                    EntityKind::Quantity,
                    EntityKind::Species,
                    EntityKind::Quantity,
                    EntityKind::Species,
                    EntityKind::Mode,
                ]
            );
            assert_eq!(entities[0].value, "2026-10-13");
            assert_eq!(entities[2].value, "dorado");
            assert_eq!(entities[5].value, "costa");
        }

        #[test]
        fn spans_point_into_the_original() {
            let text = "Sacamos 3 surubíes en Corrientes";
            let entities = EntityManager::new().extract(text, today());

            let species = entities
                .iter()
                .find(|e| e.kind == EntityKind::Species)
                .unwrap();
            assert_eq!(&text[species.span()], "surubíes");
            let province = entities
                .iter()
                .find(|e| e.kind == EntityKind::Province)
                .unwrap();
            assert_eq!(&text[province.span()], "Corrientes");
        }

        #[test]
        fn province_beats_overlapping_location() {
            let entities = EntityManager::new().extract("pescamos en el río Negro", today());

            assert_eq!(kinds(&entities), vec![EntityKind::Province]);
            assert_eq!(entities[0].value, "Río Negro");
        }

        #[test]
        fn named_locations() {
            let entities =
                EntityManager::new().extract("fuimos a la laguna de Chascomús", today());

            assert_eq!(kinds(&entities), vec![EntityKind::Location]);
            assert_eq!(entities[0].value, "laguna de Chascomús");
        }

        #[test]
        fn rods_and_times() {
            let entities =
                EntityManager::new().extract("con 3 cañas desde las 6 hasta las 10", today());

            assert_eq!(kinds(&entities), vec![EntityKind::Rods, EntityKind::Time]);
            assert_eq!(entities[0].value, "3");
            assert_eq!(entities[1].value, "06:00-10:00");
        }

        #[test]
        fn no_entities_in_small_talk() {
            assert!(EntityManager::new()
                .extract("hola, todo bien?", today())
                .is_empty());
        }

        #[test]
        fn failing_recognizer_keeps_domain_entities() {
            let manager = EntityManager::with_recognizer(BrokenRecognizer);
            let entities = manager.extract("ayer 2 bagres en Santa Fe", today());

            assert_eq!(
                kinds(&entities),
                vec![
                    EntityKind::Quantity,
                    EntityKind::Species,
                    EntityKind::Province
                ]
            );
        }
    }

    mod deduplicate {
        use super::*;

        #[test]
        fn higher_confidence_wins() {
            let mut weak = entity(EntityKind::Location, "río Negro", 0, 9);
            weak.confidence = 0.7;
            let strong = entity(EntityKind::Province, "Río Negro", 0, 9);

            let kept = deduplicate(vec![weak, strong.clone()]);

            assert_eq!(kept, vec![strong]);
        }

        #[test]
        fn longer_span_breaks_ties() {
            let short = entity(EntityKind::Species, "dorado", 2, 8);
            let long = entity(EntityKind::Location, "dique Dorado", 0, 12);

            let kept = deduplicate(vec![short, long.clone()]);

            assert_eq!(kept, vec![long]);
        }

        #[test]
        fn earlier_span_breaks_remaining_ties() {
            let first = entity(EntityKind::Species, "boga", 0, 4);
            let second = entity(EntityKind::Species, "bagre", 2, 6);

            let kept = deduplicate(vec![second, first.clone()]);

            assert_eq!(kept, vec![first]);
        }

        #[test]
        fn disjoint_entities_are_sorted() {
            let a = entity(EntityKind::Species, "boga", 10, 14);
            let b = entity(EntityKind::Quantity, "2", 8, 9);

            let kept = deduplicate(vec![a.clone(), b.clone()]);

            assert_eq!(kept, vec![b, a]);
        }
    }

    mod fold_entities {
        use super::*;

        #[test]
        fn no_entities_miss_everything() {
            let parte = fold_entities(&[]);

            assert!(parte.is_empty());
            assert_eq!(
                parte.missing_fields(),
                vec![
                    MissingField::Date,
                    MissingField::StartTime,
                    MissingField::Species,
                    MissingField::Location,
                    MissingField::Mode,
                    MissingField::Rods,
                ]
            );
        }

        #[test]
        fn quantities_bind_to_the_next_species() {
            let parte = EntityManager::new()
                .analyze("Ayer pesqué 2 dorados y 1 pejerrey desde costa", today());

            assert_eq!(parte.fecha, NaiveDate::from_ymd_opt(2026, 10, 13));
            assert_eq!(
                parte.especies,
                vec![
                    EspecieCapturada::new("dorado", 2),
                    EspecieCapturada::new("pejerrey", 1),
                ]
            );
            assert_eq!(parte.modalidad, Some(Modalidad::Costa));
        }

        #[test]
        fn species_without_quantity_count_once() {
            let parte = fold_entities(&[
                entity(EntityKind::Species, "boga", 0, 4),
                entity(EntityKind::Species, "boga", 10, 14),
            ]);

            assert_eq!(parte.especies, vec![EspecieCapturada::new("boga", 2)]);
        }

        #[test]
        fn pending_quantity_survives_other_entities() {
            let parte = fold_entities(&[
                entity(EntityKind::Quantity, "3", 0, 1),
                entity(EntityKind::Province, "Entre Ríos", 2, 12),
                entity(EntityKind::Species, "bagre", 13, 18),
            ]);

            assert_eq!(parte.especies, vec![EspecieCapturada::new("bagre", 3)]);
            assert_eq!(parte.provincia.as_deref(), Some("Entre Ríos"));
        }

        #[test]
        fn first_time_opens_and_second_closes() {
            let parte = fold_entities(&[
                entity(EntityKind::Time, "06:30", 0, 5),
                entity(EntityKind::Time, "11:00", 10, 15),
            ]);

            assert_eq!(parte.hora_inicio, Some(hm(6, 30)));
            assert_eq!(parte.hora_fin, Some(hm(11, 0)));
        }

        #[test]
        fn ranges_and_end_times() {
            let range = fold_entities(&[entity(EntityKind::Time, "14:00-18:00", 0, 5)]);
            assert_eq!(range.hora_inicio, Some(hm(14, 0)));
            assert_eq!(range.hora_fin, Some(hm(18, 0)));

            let end_only = fold_entities(&[entity(EntityKind::Time, "-20:00", 0, 5)]);
            assert_eq!(end_only.hora_inicio, None);
            assert_eq!(end_only.hora_fin, Some(hm(20, 0)));
        }

        #[test]
        fn first_occurrence_wins() {
            let parte = fold_entities(&[
                entity(EntityKind::Mode, "embarcado", 0, 5),
                entity(EntityKind::Mode, "costa", 6, 10),
                entity(EntityKind::Rods, "2", 11, 12),
                entity(EntityKind::Rods, "4", 13, 14),
            ]);

            assert_eq!(parte.modalidad, Some(Modalidad::Embarcado));
            assert_eq!(parte.cantidad_canas, Some(2));
        }

        #[test]
        fn custom_recognizer_dates_are_used() {
            struct Fixed;

            impl EntityRecognizer for Fixed {
                fn recognize(
                    &self,
                    _: &str,
                    _: NaiveDate,
                ) -> Result<Vec<Entity>, RecognizerError> {
                    Ok(vec![entity(EntityKind::Date, "2026-10-01", 0, 3)])
                }
            }

            let parte =
                EntityManager::with_recognizer(Fixed).analyze("ese día 4 bogas", today());

            assert_eq!(parte.fecha, NaiveDate::from_ymd_opt(2026, 10, 1));
            assert_eq!(parte.especies, vec![EspecieCapturada::new("boga", 4)]);
        }
    }
}
