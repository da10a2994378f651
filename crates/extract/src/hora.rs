//! Time expressions in Spanish free text.
//!
//! Patterns run as a cascade from most to least specific. A candidate whose
//! span overlaps a match accepted by an earlier pass is dropped, so
//! `a eso de las 7` stays approximate and `las 3 de la tarde` never yields a
//! separate `tarde` period.

use std::{fmt::Display, ops::Range};

use chrono::NaiveTime;
use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::vocab::{
    overlaps, parse_number, starts_with_unit, Normalized, MINUTE_WORDS, NUMBER_WORDS_PATTERN,
};

const HOUR_WORDS_PATTERN: &str = "una|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez|once|doce";
const MERIDIEM_PATTERN: &str = r"(?:\s+de\s+la\s+(?P<mer>ma[nñ]ana|tarde|noche|madrugada))?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeKind {
    Exact,
    Range,
    Period,
    Approximate,
}

/// Whether the text marks the time as the start or the end of the outing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeRole {
    Start,
    End,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DayPeriod {
    Madrugada,
    Amanecer,
    Manana,
    Mediodia,
    Tarde,
    Atardecer,
    Anochecer,
    Noche,
}

impl DayPeriod {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "madrugada" => Some(Self::Madrugada),
            "amanecer" => Some(Self::Amanecer),
            "manana" | "mañana" => Some(Self::Manana),
            "mediodia" | "mediodía" => Some(Self::Mediodia),
            "tarde" => Some(Self::Tarde),
            "atardecer" => Some(Self::Atardecer),
            "anochecer" => Some(Self::Anochecer),
            "noche" => Some(Self::Noche),
            _ => None,
        }
    }

    /// Typical window for the period.
    pub fn window(&self) -> (NaiveTime, NaiveTime) {
        let (start, end) = match self {
            Self::Madrugada => ((0, 0), (6, 0)),
            Self::Amanecer => ((5, 30), (7, 30)),
            Self::Manana => ((6, 0), (12, 0)),
            Self::Mediodia => ((12, 0), (14, 0)),
            Self::Tarde => ((14, 0), (19, 0)),
            Self::Atardecer => ((18, 0), (20, 0)),
            Self::Anochecer => ((19, 30), (21, 0)),
            Self::Noche => ((20, 0), (23, 59)),
        };
        (hm(start.0, start.1), hm(end.0, end.1))
    }
}

impl DayPeriod {
    /// "la tarde", "el mediodía".
    pub fn with_article(self) -> String {
        let article = match self {
            Self::Madrugada | Self::Manana | Self::Tarde | Self::Noche => "la",
            Self::Amanecer | Self::Mediodia | Self::Atardecer | Self::Anochecer => "el",
        };
        format!("{article} {self}")
    }
}

impl Display for DayPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Madrugada => "madrugada",
            Self::Amanecer => "amanecer",
            Self::Manana => "mañana",
            Self::Mediodia => "mediodía",
            Self::Tarde => "tarde",
            Self::Atardecer => "atardecer",
            Self::Anochecer => "anochecer",
            Self::Noche => "noche",
        };
        write!(f, "{name}")
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// A time reference found in a text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeExpression {
    pub kind: TimeKind,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub period: Option<DayPeriod>,
    pub role: TimeRole,
    pub confidence: f32,
    /// Byte span in the original text.
    pub span: Range<usize>,
    pub text: String,
}

#[derive(Debug)]
struct Parsed {
    kind: TimeKind,
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    period: Option<DayPeriod>,
    role: TimeRole,
    confidence: f32,
}

type Parser = fn(&Captures<'_>, &str) -> Option<Parsed>;

static CASCADE: Lazy<Vec<(&'static str, Regex, Parser)>> = Lazy::new(|| {
    let number = format!(r"\d{{1,2}}|{NUMBER_WORDS_PATTERN}");
    let fraction = r"(?:[:.](?P<m>\d{2})|\s+y\s+(?P<f>media|cuarto))?";

    vec![
        (
            "range",
            Regex::new(&format!(
                r"\b(?:de|desde|entre)\s+(?:las?\s+)?(?P<h1>{number})(?:[:.](?P<m1>\d{{2}})|\s+y\s+(?P<f1>media|cuarto))?\s*(?:hs|h)?\s+(?:a|hasta|y)\s+(?:las?\s+)?(?P<h2>{number})(?:[:.](?P<m2>\d{{2}})|\s+y\s+(?P<f2>media|cuarto))?(?:\s*(?:hs|h)\b)?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_range as Parser,
        ),
        (
            "approximate",
            Regex::new(&format!(
                r"\b(?:a\s+eso\s+de|alrededor\s+de|cerca\s+de|tipo|como\s+a|mas\s+o\s+menos\s+a)\s+(?:las?\s+)?(?P<h>{number}){fraction}(?:\s*(?:hs|h)\b)?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_approximate as Parser,
        ),
        (
            "clock",
            Regex::new(&format!(
                r"\b(?:(?P<role>desde|hasta)\s+)?(?:(?:a\s+)?las?\s+)?(?P<h>\d{{1,2}})[:.](?P<m>\d{{2}})(?:\s*(?:hs|h)\b)?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_clock as Parser,
        ),
        (
            "article",
            Regex::new(&format!(
                r"\b(?:(?P<role>desde|hasta)\s+)?(?:a\s+)?las?\s+(?P<h>\d{{1,2}})\b(?:\s*(?:hs|h|horas)\b)?(?:\s+y\s+(?P<f>media|cuarto))?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_article as Parser,
        ),
        (
            "suffix",
            Regex::new(&format!(
                r"\b(?P<h>\d{{1,2}})\s*(?:hs|h)\b(?:\s+y\s+(?P<f>media|cuarto))?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_suffix as Parser,
        ),
        (
            "words",
            Regex::new(&format!(
                r"\b(?:(?P<role>desde|hasta)\s+)?(?:a\s+)?las?\s+(?P<h>{HOUR_WORDS_PATTERN})\b(?:\s+y\s+(?P<f>media|cuarto))?{MERIDIEM_PATTERN}"
            ))
            .unwrap(),
            parse_words as Parser,
        ),
        (
            "period",
            Regex::new(
                r"\b(?:(?:(?:por|a|en|de|durante|toda)\s+)?la|esta)\s+(?P<p>madrugada|ma[nñ]ana|tarde|noche)\b|\bal\s+(?P<q>mediodia|atardecer|amanecer|anochecer)\b|\b(?P<r>mediodia|madrugada|atardecer|amanecer|anochecer)\b",
            )
            .unwrap(),
            parse_period as Parser,
        ),
    ]
});

/// Numbers followed by a unit or a species are quantities, not hours.
fn followed_by_unit(captures: &Captures<'_>, haystack: &str) -> bool {
    captures
        .get(0)
        .map_or(false, |m| starts_with_unit(&haystack[m.end()..]))
}

fn apply_meridiem(hour: u32, meridiem: Option<&str>) -> u32 {
    match meridiem {
        Some("tarde") if hour < 12 => hour + 12,
        Some("noche") if hour == 12 => 0,
        Some("noche") if (5..12).contains(&hour) => hour + 12,
        _ => hour,
    }
}

fn minutes(captures: &Captures<'_>, digits: &str, word: &str) -> Option<u32> {
    if let Some(m) = captures.name(digits) {
        m.as_str().parse().ok()
    } else if let Some(f) = captures.name(word) {
        MINUTE_WORDS.get(f.as_str()).copied()
    } else {
        Some(0)
    }
}

fn clock_time(captures: &Captures<'_>, hour: &str, digits: &str, word: &str) -> Option<NaiveTime> {
    let hour = parse_number(captures.name(hour)?.as_str())?;
    let minute = minutes(captures, digits, word)?;
    let hour = apply_meridiem(hour, captures.name("mer").map(|m| m.as_str()));
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn role(captures: &Captures<'_>) -> TimeRole {
    match captures.name("role").map(|m| m.as_str()) {
        Some("hasta") => TimeRole::End,
        Some(_) => TimeRole::Start,
        None => TimeRole::Unspecified,
    }
}

fn exact(captures: &Captures<'_>, confidence: f32) -> Option<Parsed> {
    Some(Parsed {
        kind: TimeKind::Exact,
        start: Some(clock_time(captures, "h", "m", "f")?),
        end: None,
        period: None,
        role: role(captures),
        confidence,
    })
}

fn parse_range(captures: &Captures<'_>, haystack: &str) -> Option<Parsed> {
    if followed_by_unit(captures, haystack) {
        return None;
    }
    let start = clock_time(captures, "h1", "m1", "f1")?;
    let end = clock_time(captures, "h2", "m2", "f2")?;
    let digits = ["h1", "h2"].iter().all(|name| {
        captures
            .name(name)
            .map_or(false, |m| m.as_str().chars().all(|c| c.is_ascii_digit()))
    });

    Some(Parsed {
        kind: TimeKind::Range,
        start: Some(start),
        end: Some(end),
        period: None,
        role: TimeRole::Unspecified,
        confidence: if digits { 0.95 } else { 0.85 },
    })
}

fn parse_approximate(captures: &Captures<'_>, haystack: &str) -> Option<Parsed> {
    if followed_by_unit(captures, haystack) {
        return None;
    }
    Some(Parsed {
        kind: TimeKind::Approximate,
        ..exact(captures, 0.6)?
    })
}

fn parse_clock(captures: &Captures<'_>, haystack: &str) -> Option<Parsed> {
    if followed_by_unit(captures, haystack) {
        return None;
    }
    exact(captures, 0.9)
}

fn parse_article(captures: &Captures<'_>, haystack: &str) -> Option<Parsed> {
    if followed_by_unit(captures, haystack) {
        return None;
    }
    exact(captures, 0.85)
}

fn parse_suffix(captures: &Captures<'_>, _haystack: &str) -> Option<Parsed> {
    exact(captures, 0.8)
}

fn parse_words(captures: &Captures<'_>, haystack: &str) -> Option<Parsed> {
    if followed_by_unit(captures, haystack) {
        return None;
    }
    exact(captures, 0.75)
}

fn parse_period(captures: &Captures<'_>, _haystack: &str) -> Option<Parsed> {
    let word = captures
        .name("p")
        .or_else(|| captures.name("q"))
        .or_else(|| captures.name("r"))?;
    let period = DayPeriod::from_word(word.as_str())?;
    let (start, end) = period.window();

    Some(Parsed {
        kind: TimeKind::Period,
        start: Some(start),
        end: Some(end),
        period: Some(period),
        role: TimeRole::Unspecified,
        confidence: 0.6,
    })
}

/// Find every time expression in `text`, ordered by position.
pub fn extract(text: &str) -> Vec<TimeExpression> {
    let normalized = Normalized::new(text);
    let haystack = normalized.as_str();
    let mut accepted: Vec<(Range<usize>, Parsed)> = Vec::new();

    for (name, regex, parse) in CASCADE.iter() {
        for captures in regex.captures_iter(haystack) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let span = whole.range();

            if accepted.iter().any(|(taken, _)| overlaps(taken, &span)) {
                trace!("{name} candidate {:?} overlaps an earlier match", whole.as_str());
                continue;
            }

            match parse(&captures, haystack) {
                Some(parsed) => {
                    trace!("{name} accepted {:?}", whole.as_str());
                    accepted.push((span, parsed));
                }
                None => trace!("{name} rejected {:?}", whole.as_str()),
            }
        }
    }

    accepted.sort_by_key(|(span, _)| span.start);
    accepted
        .into_iter()
        .map(|(span, parsed)| TimeExpression {
            kind: parsed.kind,
            start: parsed.start,
            end: parsed.end,
            period: parsed.period,
            role: parsed.role,
            confidence: parsed.confidence,
            text: normalized.original_text(span.clone()).to_string(),
            span: normalized.original_span(span),
        })
        .collect()
}

/// Best guess for the start and end of an outing.
///
/// A range wins outright. Otherwise exact and approximate times fill start
/// then end in order of appearance, honoring `desde`/`hasta`; a period only
/// provides a start when nothing more precise was said.
pub fn start_and_end(expressions: &[TimeExpression]) -> (Option<NaiveTime>, Option<NaiveTime>) {
    if let Some(range) = expressions
        .iter()
        .filter(|e| e.kind == TimeKind::Range)
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
    {
        return (range.start, range.end);
    }

    let mut start = None;
    let mut end = None;
    for expression in expressions
        .iter()
        .filter(|e| matches!(e.kind, TimeKind::Exact | TimeKind::Approximate))
    {
        match expression.role {
            TimeRole::End => end = end.or(expression.start),
            TimeRole::Start => start = start.or(expression.start),
            TimeRole::Unspecified if start.is_none() => start = expression.start,
            TimeRole::Unspecified => end = end.or(expression.start),
        }
    }

    if start.is_none() {
        start = expressions
            .iter()
            .find(|e| e.kind == TimeKind::Period)
            .and_then(|e| e.start);
    }

    (start, end)
}
