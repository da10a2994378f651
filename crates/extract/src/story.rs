//! Keyword scoring of free-form fishing stories.

use std::fmt::Display;

use log::{trace, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera};

use crate::{
    hora::{self, DayPeriod},
    vocab::{
        find_species, parse_number, species_plural, Normalized, NUMBER_WORDS_PATTERN,
        SPECIES_PATTERN,
    },
};

const TECHNIQUES: &[&str] = &[
    "spinning",
    "baitcasting",
    "casting",
    "mosca",
    "fly",
    "trolling",
    "currican",
    "fondo",
    "flote",
    "boya",
    "correntino",
    "al golpe",
    "a la deriva",
];

const BAITS: &[&str] = &[
    "carnada",
    "lombriz",
    "lombrices",
    "mojarra",
    "mojarras",
    "anguila",
    "morena",
    "masa",
    "filet",
    "camaron",
    "langostino",
    "señuelo",
    "señuelos",
    "cucharita",
    "cucharitas",
    "rapala",
    "popper",
    "jig",
    "paseante",
];

const WEATHER: &[&str] = &[
    "viento",
    "lluvia",
    "llovio",
    "llovizna",
    "sol",
    "soleado",
    "nublado",
    "frio",
    "calor",
    "tormenta",
    "niebla",
    "helada",
    "calma",
];

const POSITIVE: &[&str] = &[
    "espectacular",
    "excelente",
    "genial",
    "buenisimo",
    "buenisima",
    "increible",
    "impresionante",
    "barbaro",
    "de lujo",
    "muy bueno",
    "muy buena",
    "buen pique",
    "hermoso",
    "hermosa",
    "enorme",
];

const NEGATIVE: &[&str] = &[
    "malo",
    "mala",
    "nada",
    "fatal",
    "horrible",
    "flojo",
    "floja",
    "pesimo",
    "pesima",
    "frustrante",
    "sin pique",
    "no pico",
    "bolsa vacia",
];

fn keyword_regex(words: &[&str]) -> Regex {
    let alternation = words
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).unwrap()
}

static TECHNIQUE_REGEX: Lazy<Regex> = Lazy::new(|| keyword_regex(TECHNIQUES));
static BAIT_REGEX: Lazy<Regex> = Lazy::new(|| keyword_regex(BAITS));
static WEATHER_REGEX: Lazy<Regex> = Lazy::new(|| keyword_regex(WEATHER));
static POSITIVE_REGEX: Lazy<Regex> = Lazy::new(|| keyword_regex(POSITIVE));
static NEGATIVE_REGEX: Lazy<Regex> = Lazy::new(|| keyword_regex(NEGATIVE));

static QUANTIFIED_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:(?P<n>\d{{1,3}}|{NUMBER_WORDS_PATTERN})|(?P<vague>varios|varias|unos|unas|algunos|algunas|un\s+monton\s+de))\s+(?:de\s+)?(?P<sp>{})\b",
        *SPECIES_PATTERN
    ))
    .unwrap()
});

const SUMMARY_TEMPLATE: &str = "\
{% if especies %}Sacaste {% for e in especies %}{% if e.cantidad %}{{ e.cantidad }} {% endif %}{{ e.nombre }}{% if not loop.last %}, {% endif %}{% endfor %}\
{% else %}No hubo capturas{% endif %}\
{% if momentos %} durante {{ momentos | join(sep=\" y \") }}{% endif %}\
{% if tecnicas %} pescando a {{ tecnicas | join(sep=\", \") }}{% endif %}\
{% if carnadas %} con {{ carnadas | join(sep=\", \") }}{% endif %}\
{% if clima %} ({{ clima | join(sep=\", \") }}){% endif %}. Jornada {{ resultado }}.";

static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_template("resumen", SUMMARY_TEMPLATE).unwrap();
    tera
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Exitosa,
    Regular,
    Mala,
    Tecnica,
}

impl Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exitosa => write!(f, "exitosa"),
            Self::Regular => write!(f, "regular"),
            Self::Mala => write!(f, "mala"),
            Self::Tecnica => write!(f, "técnica"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesMention {
    pub nombre: &'static str,
    /// `None` when the story never gives a number for it.
    pub cantidad: Option<u32>,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryAnalysis {
    pub especies: Vec<SpeciesMention>,
    pub tecnicas: Vec<String>,
    pub carnadas: Vec<String>,
    pub momentos: Vec<DayPeriod>,
    pub clima: Vec<String>,
    /// Positive minus negative sentiment hits.
    pub sentimiento: i32,
    pub resultado: Outcome,
    pub resumen: String,
}

impl StoryAnalysis {
    pub fn total_piezas(&self) -> u32 {
        self.especies.iter().filter_map(|e| e.cantidad).sum()
    }
}

fn distinct_matches(regex: &Regex, haystack: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in regex.find_iter(haystack) {
        let word = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
        if !found.contains(&word) {
            found.push(word);
        }
    }
    found
}

fn mention_species(haystack: &str) -> Vec<SpeciesMention> {
    let quantified: Vec<_> = QUANTIFIED_REGEX.captures_iter(haystack).collect();
    let mut especies: Vec<SpeciesMention> = Vec::new();

    for (span, nombre) in find_species(haystack) {
        let qualifier = quantified
            .iter()
            .find(|c| c.name("sp").map(|m| m.range()) == Some(span.clone()));
        let (cantidad, confidence) = match qualifier {
            Some(c) => match c.name("n").and_then(|n| parse_number(n.as_str())) {
                Some(n) => (Some(n), 0.9),
                None => (None, 0.7),
            },
            None => (None, 0.5),
        };

        match especies.iter_mut().find(|e| e.nombre == nombre) {
            Some(entry) => {
                entry.cantidad = match (entry.cantidad, cantidad) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
                entry.confidence = entry.confidence.max(confidence);
            }
            None => especies.push(SpeciesMention {
                nombre,
                cantidad,
                confidence,
            }),
        }
    }

    especies
}

fn classify(
    especies: &[SpeciesMention],
    technique_mentions: usize,
    sentimiento: i32,
    total: u32,
) -> Outcome {
    let counted = especies.iter().any(|e| e.cantidad.is_some());

    if technique_mentions >= 3 && !counted && sentimiento == 0 {
        Outcome::Tecnica
    } else if total >= 5 || sentimiento >= 2 {
        Outcome::Exitosa
    } else if sentimiento <= -1 || (especies.is_empty() && sentimiento <= 0) {
        Outcome::Mala
    } else {
        Outcome::Regular
    }
}

fn plain_summary(analysis: &StoryAnalysis) -> String {
    format!(
        "{} especies, {} piezas. Jornada {}.",
        analysis.especies.len(),
        analysis.total_piezas(),
        analysis.resultado
    )
}

#[derive(Serialize)]
struct SummaryLine {
    cantidad: Option<u32>,
    nombre: String,
}

impl From<&SpeciesMention> for SummaryLine {
    fn from(mention: &SpeciesMention) -> Self {
        let nombre = match mention.cantidad {
            Some(1) => mention.nombre.to_string(),
            _ => species_plural(mention.nombre),
        };
        Self {
            cantidad: mention.cantidad,
            nombre,
        }
    }
}

fn render_summary(analysis: &StoryAnalysis) -> String {
    let especies: Vec<SummaryLine> = analysis.especies.iter().map(SummaryLine::from).collect();
    let momentos: Vec<String> = analysis.momentos.iter().map(|p| p.with_article()).collect();

    let mut context = Context::new();
    context.insert("especies", &especies);
    context.insert("momentos", &momentos);
    context.insert("tecnicas", &analysis.tecnicas);
    context.insert("carnadas", &analysis.carnadas);
    context.insert("clima", &analysis.clima);
    context.insert("resultado", &analysis.resultado.to_string());

    match TEMPLATES.render("resumen", &context) {
        Ok(summary) => summary,
        Err(err) => {
            warn!("could not render story summary: {err}");
            plain_summary(analysis)
        }
    }
}

/// Score a story and summarize it.
pub fn analyze_story(text: &str) -> StoryAnalysis {
    let normalized = Normalized::new(text);
    let haystack = normalized.as_str();

    let especies = mention_species(haystack);
    let tecnicas = distinct_matches(&TECHNIQUE_REGEX, haystack);
    let carnadas = distinct_matches(&BAIT_REGEX, haystack);
    let clima = distinct_matches(&WEATHER_REGEX, haystack);

    let mut momentos = Vec::new();
    for period in hora::extract(text).into_iter().filter_map(|e| e.period) {
        if !momentos.contains(&period) {
            momentos.push(period);
        }
    }

    let positive = POSITIVE_REGEX.find_iter(haystack).count() as i32;
    let negative = NEGATIVE_REGEX.find_iter(haystack).count() as i32;
    let sentimiento = positive - negative;

    let total = especies.iter().filter_map(|e| e.cantidad).sum();
    let resultado = classify(
        &especies,
        tecnicas.len() + carnadas.len(),
        sentimiento,
        total,
    );
    trace!("story scored {sentimiento:+} with {total} pieces -> {resultado}");

    let mut analysis = StoryAnalysis {
        especies,
        tecnicas,
        carnadas,
        momentos,
        clima,
        sentimiento,
        resultado,
        resumen: String::new(),
    };
    analysis.resumen = render_summary(&analysis);
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    mod species {
        use approx::assert_relative_eq;
        use test_case::test_case;

        use super::*;

        #[test]
        fn explicit_counts_are_confident() {
            let story = analyze_story("Sacamos 3 dorados y dos bogas");

            assert_eq!(story.especies.len(), 2);
            assert_eq!(story.especies[0].nombre, "dorado");
            assert_eq!(story.especies[0].cantidad, Some(3));
            assert_relative_eq!(story.especies[0].confidence, 0.9);
            assert_eq!(story.especies[1].cantidad, Some(2));
            assert_eq!(story.total_piezas(), 5);
        }

        #[test_case("salieron varios pejerreyes"; "varios")]
        #[test_case("sacamos unos pejerreyes"; "unos")]
        #[test_case("un montón de pejerreyes"; "un monton")]
        #[test_case("algunos pejerreyes chicos"; "algunos")]
        fn vague_quantifiers(text: &str) {
            let story = analyze_story(text);

            assert_eq!(story.especies[0].nombre, "pejerrey");
            assert_eq!(story.especies[0].cantidad, None);
            assert_relative_eq!(story.especies[0].confidence, 0.7);
        }

        #[test]
        fn bare_mentions_are_weak() {
            let story = analyze_story("buscábamos tarariras en el juncal");

            assert_eq!(story.especies[0].nombre, "tararira");
            assert_relative_eq!(story.especies[0].confidence, 0.5);
        }

        #[test]
        fn repeated_species_add_up() {
            let story = analyze_story("a la mañana 2 bagres y a la tarde 3 bagres más");

            assert_eq!(story.especies.len(), 1);
            assert_eq!(story.especies[0].cantidad, Some(5));
        }
    }

    mod keywords {
        use super::*;

        #[test]
        fn techniques_baits_and_weather() {
            let story = analyze_story(
                "Pescamos a fondo con lombriz y después spinning con cucharita, mucho viento",
            );

            assert_eq!(story.tecnicas, vec!["fondo", "spinning"]);
            assert_eq!(story.carnadas, vec!["lombriz", "cucharita"]);
            assert_eq!(story.clima, vec!["viento"]);
        }

        #[test]
        fn times_of_day() {
            let story = analyze_story("Fuimos a la mañana y volvimos al atardecer");

            assert_eq!(story.momentos, vec![DayPeriod::Manana, DayPeriod::Atardecer]);
        }

        #[test]
        fn sentiment_balance() {
            assert_eq!(analyze_story("día espectacular, excelente pique").sentimiento, 2);
            assert_eq!(analyze_story("horrible, no pico nada").sentimiento, -3);
        }
    }

    mod outcome {
        use test_case::test_case;

        use super::*;

        #[test_case("Sacamos 6 dorados", Outcome::Exitosa; "many pieces")]
        #[test_case("un día espectacular, genial", Outcome::Exitosa; "very positive")]
        #[test_case("fatal, no sacamos nada", Outcome::Mala; "negative")]
        #[test_case("fuimos al río y volvimos", Outcome::Mala; "nothing caught")]
        #[test_case("Sacamos 2 bogas", Outcome::Regular; "few pieces")]
        #[test_case("probamos spinning, flote y carnada de lombriz", Outcome::Tecnica; "technique talk")]
        fn classified(text: &str, expected: Outcome) {
            assert_eq!(analyze_story(text).resultado, expected);
        }

        #[test]
        fn counted_catch_is_not_technique_talk() {
            let story = analyze_story("con spinning, flote y lombriz saqué 2 bogas");

            assert_eq!(story.resultado, Outcome::Regular);
        }
    }

    mod summary {
        use super::*;

        #[test]
        fn rendered_from_the_story() {
            let story = analyze_story("Ayer saqué 3 dorados y 2 bogas a la tarde con spinning");

            assert_eq!(
                story.resumen,
                "Sacaste 3 dorados, 2 bogas durante la tarde pescando a spinning. Jornada exitosa."
            );
        }

        #[test]
        fn single_pieces_and_masculine_periods() {
            let story = analyze_story("Saqué un surubí al mediodía");

            assert_eq!(
                story.resumen,
                "Sacaste 1 surubí durante el mediodía. Jornada regular."
            );
        }

        #[test]
        fn vague_amounts_read_plural() {
            let story = analyze_story("salieron varios pejerreyes");

            assert!(story.resumen.starts_with("Sacaste pejerreyes"));
        }

        #[test]
        fn empty_story() {
            let story = analyze_story("hola");

            assert_eq!(story.resumen, "No hubo capturas. Jornada mala.");
        }

        #[test]
        fn plain_fallback() {
            let story = analyze_story("Sacamos 2 bogas");

            assert_eq!(plain_summary(&story), "1 especies, 2 piezas. Jornada regular.");
        }
    }
}
