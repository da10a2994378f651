use chrono::NaiveDate;
use miette::Diagnostic;

use super::{Entity, EntityKind};
use crate::{
    fecha,
    hora::{self, TimeKind, TimeRole},
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum RecognizerError {
    #[error("entity recognizer model is not available")]
    #[diagnostic(code(huka_extract::entities::model_unavailable))]
    ModelUnavailable,
}

/// Generic date and time recognition.
///
/// This is where an on-device entity model plugs in. Implementations only
/// report `Date` and `Time` entities; domain entities are layered on top by
/// [`EntityManager`](super::EntityManager).
pub trait EntityRecognizer {
    fn recognize(&self, text: &str, today: NaiveDate) -> Result<Vec<Entity>, RecognizerError>;
}

/// Recognizer backed by the crate's own date and time patterns.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRecognizer;

impl EntityRecognizer for RuleRecognizer {
    fn recognize(&self, text: &str, today: NaiveDate) -> Result<Vec<Entity>, RecognizerError> {
        let dates = fecha::find_dates(text, today).into_iter().map(|mention| Entity {
            kind: EntityKind::Date,
            value: mention.date.format("%Y-%m-%d").to_string(),
            confidence: mention.confidence,
            start: mention.span.start,
            end: mention.span.end,
        });

        let times = hora::extract(text).into_iter().filter_map(|expression| {
            let value = match (expression.kind, expression.role, expression.start, expression.end) {
                (TimeKind::Range, _, Some(start), Some(end)) => {
                    format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))
                }
                (_, TimeRole::End, Some(end), _) => format!("-{}", end.format("%H:%M")),
                (_, _, Some(start), _) => start.format("%H:%M").to_string(),
                _ => return None,
            };
            Some(Entity {
                kind: EntityKind::Time,
                value,
                confidence: expression.confidence,
                start: expression.span.start,
                end: expression.span.end,
            })
        });

        Ok(dates.chain(times).collect())
    }
}
