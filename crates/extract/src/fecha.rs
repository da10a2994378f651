//! Day references: `hoy`, `ayer`, weekdays and literal dates.

use std::ops::Range;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::vocab::{overlaps, starts_with_unit, Normalized};

#[derive(Debug, Clone, PartialEq)]
pub struct DateMention {
    pub date: NaiveDate,
    pub confidence: f32,
    /// Byte span in the original text.
    pub span: Range<usize>,
    pub text: String,
}

type Resolver = fn(&Captures<'_>, NaiveDate) -> Option<NaiveDate>;

static PATTERNS: Lazy<Vec<(Regex, f32, Resolver)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"\b(?P<y>\d{4})-(?P<m>\d{1,2})-(?P<d>\d{1,2})\b").unwrap(),
            0.95,
            resolve_iso as Resolver,
        ),
        (
            Regex::new(r"\b(?P<d>\d{1,2})/(?P<m>\d{1,2})(?:/(?P<y>\d{2}|\d{4}))?\b").unwrap(),
            0.9,
            resolve_numeric as Resolver,
        ),
        (
            Regex::new(r"\b(?:el\s+)?(?P<d>\d{1,2})\s+de\s+(?P<month>enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)(?:\s+(?:de|del)\s+(?P<y>\d{4}))?\b").unwrap(),
            0.9,
            resolve_month_name as Resolver,
        ),
        (
            Regex::new(r"\b(?:anteayer|antes\s+de\s+ayer|antier)\b").unwrap(),
            0.9,
            resolve_anteayer as Resolver,
        ),
        (
            Regex::new(r"\bayer\b").unwrap(),
            0.9,
            resolve_ayer as Resolver,
        ),
        (
            Regex::new(r"\bhoy\b").unwrap(),
            0.9,
            resolve_hoy as Resolver,
        ),
        (
            Regex::new(r"\b(?:el\s+)?(?P<wd>lunes|martes|miercoles|jueves|viernes|sabado|domingo)\b(?:\s+pasado)?").unwrap(),
            0.7,
            resolve_weekday as Resolver,
        ),
    ]
});

fn resolve_hoy(_captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    Some(today)
}

fn resolve_ayer(_captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    Some(today - Duration::days(1))
}

fn resolve_anteayer(_captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    Some(today - Duration::days(2))
}

fn number(captures: &Captures<'_>, name: &str) -> Option<u32> {
    captures.name(name)?.as_str().parse().ok()
}

/// Leap days recur at most this many years apart.
const LEAP_DAY_GAP: i32 = 8;

/// Dates without a year belong to the last year in which they exist and are
/// not in the future, so "29/02" walks back to the latest leap year.
fn without_year(today: NaiveDate, month: u32, day: u32) -> Option<NaiveDate> {
    (0..=LEAP_DAY_GAP)
        .filter_map(|back| NaiveDate::from_ymd_opt(today.year() - back, month, day))
        .find(|candidate| *candidate <= today)
}

fn with_optional_year(
    captures: &Captures<'_>,
    today: NaiveDate,
    month: u32,
    day: u32,
) -> Option<NaiveDate> {
    match captures.name("y") {
        Some(year) => {
            let year: i32 = year.as_str().parse().ok()?;
            let year = if year < 100 { 2000 + year } else { year };
            NaiveDate::from_ymd_opt(year, month, day)
        }
        None => without_year(today, month, day),
    }
}

fn resolve_iso(captures: &Captures<'_>, _today: NaiveDate) -> Option<NaiveDate> {
    let year = captures.name("y")?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, number(captures, "m")?, number(captures, "d")?)
}

fn resolve_numeric(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    with_optional_year(captures, today, number(captures, "m")?, number(captures, "d")?)
}

fn resolve_month_name(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let month = match captures.name("month")?.as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => return None,
    };
    with_optional_year(captures, today, month, number(captures, "d")?)
}

/// The most recent given weekday strictly before `today`.
fn resolve_weekday(captures: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    let weekday = match captures.name("wd")?.as_str() {
        "lunes" => Weekday::Mon,
        "martes" => Weekday::Tue,
        "miercoles" => Weekday::Wed,
        "jueves" => Weekday::Thu,
        "viernes" => Weekday::Fri,
        "sabado" => Weekday::Sat,
        "domingo" => Weekday::Sun,
        _ => return None,
    };
    let mut days_back = (7 + today.weekday().num_days_from_monday()
        - weekday.num_days_from_monday())
        % 7;
    if days_back == 0 {
        days_back = 7;
    }
    Some(today - Duration::days(days_back.into()))
}

/// Every day reference in `text`, ordered by position.
pub fn find_dates(text: &str, today: NaiveDate) -> Vec<DateMention> {
    let normalized = Normalized::new(text);
    let haystack = normalized.as_str();
    let mut accepted: Vec<(Range<usize>, NaiveDate, f32)> = Vec::new();

    for (regex, confidence, resolve) in PATTERNS.iter() {
        for captures in regex.captures_iter(haystack) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let span = whole.range();
            if accepted.iter().any(|(taken, _, _)| overlaps(taken, &span))
                || starts_with_unit(&haystack[span.end..])
            {
                continue;
            }

            match resolve(&captures, today) {
                Some(date) => {
                    trace!("{:?} resolved to {date}", whole.as_str());
                    accepted.push((span, date, *confidence));
                }
                None => trace!("{:?} is not a valid date", whole.as_str()),
            }
        }
    }

    accepted.sort_by_key(|(span, _, _)| span.start);
    accepted
        .into_iter()
        .map(|(span, date, confidence)| DateMention {
            date,
            confidence,
            text: normalized.original_text(span.clone()).to_string(),
            span: normalized.original_span(span),
        })
        .collect()
}

/// First day reference in `text`, relative to `today`.
pub fn resolve_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    find_dates(text, today).into_iter().next().map(|m| m.date)
}
