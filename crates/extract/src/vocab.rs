//! Fixed vocabulary the extractors match against.
//!
//! All tables are keyed by *normalized* text: lowercase with accents folded
//! (`ñ` is kept). [`Normalized`] keeps a byte map back to the original text so
//! spans found on the normalized form can be reported against what the user
//! actually wrote.

use std::ops::Range;

use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;

use crate::parte::Modalidad;

/// Alternation of the number words understood as quantities or hours.
///
/// Longer words come first so `uno`/`una` win over `un`.
pub const NUMBER_WORDS_PATTERN: &str = "una|uno|un|dos|tres|cuatro|cinco|seis|siete|ocho|nueve|diez|once|doce|trece|catorce|quince|veinte|treinta";

pub static NUMBER_WORDS: phf::Map<&'static str, u32> = phf_map! {
    "un" => 1,
    "uno" => 1,
    "una" => 1,
    "dos" => 2,
    "tres" => 3,
    "cuatro" => 4,
    "cinco" => 5,
    "seis" => 6,
    "siete" => 7,
    "ocho" => 8,
    "nueve" => 9,
    "diez" => 10,
    "once" => 11,
    "doce" => 12,
    "trece" => 13,
    "catorce" => 14,
    "quince" => 15,
    "veinte" => 20,
    "treinta" => 30,
};

pub static MINUTE_WORDS: phf::Map<&'static str, u32> = phf_map! {
    "media" => 30,
    "cuarto" => 15,
};

/// Normalized alias (singular and plural) to canonical species name.
pub static SPECIES: phf::Map<&'static str, &'static str> = phf_map! {
    "dorado" => "dorado",
    "dorados" => "dorado",
    "pejerrey" => "pejerrey",
    "pejerreyes" => "pejerrey",
    "pejes" => "pejerrey",
    "surubi" => "surubí",
    "surubis" => "surubí",
    "surubies" => "surubí",
    "pacu" => "pacú",
    "pacus" => "pacú",
    "pacues" => "pacú",
    "boga" => "boga",
    "bogas" => "boga",
    "sabalo" => "sábalo",
    "sabalos" => "sábalo",
    "tararira" => "tararira",
    "tarariras" => "tararira",
    "bagre" => "bagre",
    "bagres" => "bagre",
    "pati" => "patí",
    "patis" => "patí",
    "paties" => "patí",
    "manguruyu" => "manguruyú",
    "manguruyus" => "manguruyú",
    "manguruyues" => "manguruyú",
    "palometa" => "palometa",
    "palometas" => "palometa",
    "carpa" => "carpa",
    "carpas" => "carpa",
    "trucha" => "trucha",
    "truchas" => "trucha",
    "perca" => "perca",
    "percas" => "perca",
    "corvina" => "corvina",
    "corvinas" => "corvina",
    "lenguado" => "lenguado",
    "lenguados" => "lenguado",
    "pescadilla" => "pescadilla",
    "pescadillas" => "pescadilla",
    "chanchita" => "chanchita",
    "chanchitas" => "chanchita",
    "salmon" => "salmón",
    "salmones" => "salmón",
    "raya" => "raya",
    "rayas" => "raya",
    "brotola" => "brótola",
    "brotolas" => "brótola",
    "anchoa" => "anchoa",
    "anchoas" => "anchoa",
    "mero" => "mero",
    "meros" => "mero",
    "besugo" => "besugo",
    "besugos" => "besugo",
};

/// Every canonical species, in the order the Pescadex lists them.
pub const SPECIES_NAMES: [&str; 24] = [
    "dorado",
    "pejerrey",
    "surubí",
    "pacú",
    "boga",
    "sábalo",
    "tararira",
    "bagre",
    "patí",
    "manguruyú",
    "palometa",
    "carpa",
    "trucha",
    "perca",
    "corvina",
    "lenguado",
    "pescadilla",
    "chanchita",
    "salmón",
    "raya",
    "brótola",
    "anchoa",
    "mero",
    "besugo",
];

pub static PROVINCES: phf::Map<&'static str, &'static str> = phf_map! {
    "buenos aires" => "Buenos Aires",
    "caba" => "CABA",
    "capital federal" => "CABA",
    "catamarca" => "Catamarca",
    "chaco" => "Chaco",
    "chubut" => "Chubut",
    "cordoba" => "Córdoba",
    "corrientes" => "Corrientes",
    "entre rios" => "Entre Ríos",
    "formosa" => "Formosa",
    "jujuy" => "Jujuy",
    "la pampa" => "La Pampa",
    "la rioja" => "La Rioja",
    "mendoza" => "Mendoza",
    "misiones" => "Misiones",
    "neuquen" => "Neuquén",
    "rio negro" => "Río Negro",
    "salta" => "Salta",
    "san juan" => "San Juan",
    "san luis" => "San Luis",
    "santa cruz" => "Santa Cruz",
    "santa fe" => "Santa Fe",
    "santiago del estero" => "Santiago del Estero",
    "tierra del fuego" => "Tierra del Fuego",
    "tucuman" => "Tucumán",
};

pub const COSTA_KEYWORDS: &[&str] = &[
    "costa",
    "orilla",
    "muelle",
    "barranca",
    "playa",
    "escollera",
    "espigon",
    "desde tierra",
];

pub const EMBARCADO_KEYWORDS: &[&str] = &[
    "embarcado",
    "embarcados",
    "embarcada",
    "embarcadas",
    "embarcacion",
    "lancha",
    "bote",
    "kayak",
    "barco",
    "canoa",
];

fn alternation<'a>(words: impl Iterator<Item = &'a str>) -> String {
    let mut words: Vec<&str> = words.collect();
    // longest first so an alias never shadows a longer one sharing its prefix
    words.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    words
        .iter()
        .map(|word| regex::escape(word).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Alternation of every species alias, for embedding in larger patterns.
pub static SPECIES_PATTERN: Lazy<String> = Lazy::new(|| alternation(SPECIES.keys().copied()));

static SPECIES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b(?:{})\b", *SPECIES_PATTERN)).unwrap());

static PROVINCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:{})\b",
        alternation(PROVINCES.keys().copied())
    ))
    .unwrap()
});

static MODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:(?P<costa>{})|(?P<embarcado>{}))\b",
        alternation(COSTA_KEYWORDS.iter().copied()),
        alternation(EMBARCADO_KEYWORDS.iter().copied())
    ))
    .unwrap()
});

static UNIT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^\s*(?:de\s+)?(?:{}|piezas?|pescados?|peces|pez|ca[nñ]as?|kilos?|kg|gramos|grs?|metros?|cm|centimetros?)\b",
        *SPECIES_PATTERN
    ))
    .unwrap()
});

/// Whether normalized `rest` opens with a species name or a measuring unit.
pub fn starts_with_unit(rest: &str) -> bool {
    UNIT_REGEX.is_match(rest)
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        other => other,
    }
}

/// Lowercase and fold accents.
pub fn normalize(text: &str) -> String {
    Normalized::new(text).text
}

/// Normalized copy of a text together with a byte map into the original.
#[derive(Debug, Clone)]
pub struct Normalized<'a> {
    original: &'a str,
    text: String,
    /// `offsets[i]` is the original byte offset of the char that produced
    /// normalized byte `i`; one extra entry maps the end of the text.
    offsets: Vec<usize>,
}

impl<'a> Normalized<'a> {
    pub fn new(original: &'a str) -> Self {
        let mut text = String::with_capacity(original.len());
        let mut offsets = Vec::with_capacity(original.len() + 1);

        for (position, c) in original.char_indices() {
            for lower in c.to_lowercase() {
                let before = text.len();
                text.push(fold_accent(lower));
                offsets.extend(std::iter::repeat(position).take(text.len() - before));
            }
        }
        offsets.push(original.len());

        Self {
            original,
            text,
            offsets,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn original(&self) -> &'a str {
        self.original
    }

    /// Map a span of the normalized text to the matching span of the original.
    pub fn original_span(&self, span: Range<usize>) -> Range<usize> {
        self.offsets[span.start]..self.offsets[span.end]
    }

    /// Original text covered by a normalized span.
    pub fn original_text(&self, span: Range<usize>) -> &'a str {
        let span = self.original_span(span);
        &self.original[span]
    }
}

/// Parse a digit run or a number word.
pub fn parse_number(token: &str) -> Option<u32> {
    let token = token.trim();
    if token.chars().all(|c| c.is_ascii_digit()) {
        token.parse().ok()
    } else {
        NUMBER_WORDS.get(normalize(token).as_str()).copied()
    }
}

/// Canonical species name for a normalized alias.
pub fn canonical_species(alias: &str) -> Option<&'static str> {
    SPECIES.get(alias).copied()
}

/// Plural of a canonical species name: "bogas", "pejerreyes", "surubíes", "salmones".
pub fn species_plural(name: &str) -> String {
    match name.strip_suffix("ón") {
        Some(stem) => format!("{stem}ones"),
        None if name.ends_with(&['a', 'e', 'i', 'o', 'u'][..]) => format!("{name}s"),
        None => format!("{name}es"),
    }
}

/// Species mentions in normalized text as `(span, canonical name)`.
pub fn find_species(normalized: &str) -> Vec<(Range<usize>, &'static str)> {
    SPECIES_REGEX
        .find_iter(normalized)
        .filter_map(|m| canonical_species(m.as_str()).map(|name| (m.range(), name)))
        .collect()
}

/// Province mentions in normalized text as `(span, display name)`.
pub fn find_provinces(normalized: &str) -> Vec<(Range<usize>, &'static str)> {
    PROVINCE_REGEX
        .find_iter(normalized)
        .filter_map(|m| {
            let key = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            PROVINCES.get(key.as_str()).map(|name| (m.range(), *name))
        })
        .collect()
}

/// Shore/boat keywords in normalized text.
pub fn find_modes(normalized: &str) -> Vec<(Range<usize>, Modalidad)> {
    MODE_REGEX
        .captures_iter(normalized)
        .filter_map(|captures| {
            if let Some(m) = captures.name("costa") {
                Some((m.range(), Modalidad::Costa))
            } else {
                captures
                    .name("embarcado")
                    .map(|m| (m.range(), Modalidad::Embarcado))
            }
        })
        .collect()
}

static LOCATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:laguna|r[ií]o|dique|embalse|lago|arroyo|riacho|represa|puerto|bah[ií]a|costanera)\b)(?:\s+(?i:de\s+la|de\s+los|de\s+las|del|de))?\s+\p{Lu}\p{L}*(?:\s+(?:(?i:de|del)\s+)?\p{Lu}\p{L}*)*",
    )
    .unwrap()
});

/// Named water bodies and places (`laguna de Chascomús`, `río Paraná`) in the
/// original, non-normalized text, since proper names rely on capitalization.
pub fn find_locations(original: &str) -> Vec<(Range<usize>, String)> {
    LOCATION_REGEX
        .find_iter(original)
        .map(|m| (m.range(), m.as_str().split_whitespace().collect::<Vec<_>>().join(" ")))
        .collect()
}

/// Whether two half-open spans share at least one byte.
pub fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
