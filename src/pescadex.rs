use std::fmt::Display;

use chrono::NaiveDate;
use huka_extract::{vocab::SPECIES_NAMES, PartePesca};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PescadexEntry {
    pub especie: String,
    pub primera_captura: NaiveDate,
    pub cantidad: u32,
}

/// Species a user has caught so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pescadex {
    entries: Vec<PescadexEntry>,
}

impl Pescadex {
    pub fn from_entries(entries: Vec<PescadexEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[PescadexEntry] {
        &self.entries
    }

    pub fn get(&self, especie: &str) -> Option<&PescadexEntry> {
        self.entries.iter().find(|e| e.especie == especie)
    }

    /// Record every species of `parte`, returning those never seen before.
    pub fn register(&mut self, parte: &PartePesca) -> Vec<String> {
        let mut discovered = Vec::new();

        for capturada in &parte.especies {
            match self
                .entries
                .iter_mut()
                .find(|e| e.especie == capturada.nombre)
            {
                Some(entry) => {
                    entry.cantidad += capturada.cantidad;
                    entry.primera_captura = entry.primera_captura.min(parte.fecha);
                }
                None => {
                    info!("{} discovered {}", parte.usuario, capturada.nombre);
                    self.entries.push(PescadexEntry {
                        especie: capturada.nombre.clone(),
                        primera_captura: parte.fecha,
                        cantidad: capturada.cantidad,
                    });
                    discovered.push(capturada.nombre.clone());
                }
            }
        }

        discovered
    }

    /// `(discovered, total)` over the known species.
    pub fn progress(&self) -> (usize, usize) {
        let discovered = SPECIES_NAMES
            .iter()
            .filter(|name| self.get(name).is_some())
            .count();
        (discovered, SPECIES_NAMES.len())
    }

    pub fn missing(&self) -> Vec<&'static str> {
        SPECIES_NAMES
            .iter()
            .copied()
            .filter(|name| self.get(name).is_none())
            .collect()
    }
}

impl Display for Pescadex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (discovered, total) = self.progress();
        write!(f, "Pescadex: {discovered}/{total} especies")?;
        for entry in &self.entries {
            write!(
                f,
                "\n  {} x{} (desde el {})",
                entry.especie,
                entry.cantidad,
                entry.primera_captura.format("%d/%m/%Y")
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use huka_extract::{EspecieCapturada, Modalidad};

    use super::*;

    fn parte(day: u32, especies: Vec<EspecieCapturada>) -> PartePesca {
        PartePesca {
            usuario: "lucas".to_string(),
            fecha: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            hora_inicio: None,
            hora_fin: None,
            especies,
            provincia: Some("Entre Ríos".to_string()),
            lugar: None,
            modalidad: Modalidad::Costa,
            cantidad_canas: None,
            fotos: Vec::new(),
            observaciones: None,
            creado: Utc.with_ymd_and_hms(2026, 10, day, 20, 0, 0).unwrap(),
        }
    }

    mod register {
        use super::*;

        #[test]
        fn reports_new_species_once() {
            let mut pescadex = Pescadex::default();

            let first = pescadex.register(&parte(
                10,
                vec![
                    EspecieCapturada::new("dorado", 2),
                    EspecieCapturada::new("boga", 1),
                ],
            ));
            let second = pescadex.register(&parte(12, vec![EspecieCapturada::new("dorado", 3)]));

            assert_eq!(first, vec!["dorado", "boga"]);
            assert!(second.is_empty());
            let dorado = pescadex.get("dorado").unwrap();
            assert_eq!(dorado.cantidad, 5);
            assert_eq!(dorado.primera_captura, NaiveDate::from_ymd_opt(2026, 10, 10).unwrap());
        }

        #[test]
        fn keeps_the_earliest_capture() {
            let mut pescadex = Pescadex::default();
            pescadex.register(&parte(12, vec![EspecieCapturada::new("bagre", 1)]));
            pescadex.register(&parte(3, vec![EspecieCapturada::new("bagre", 1)]));

            assert_eq!(
                pescadex.get("bagre").unwrap().primera_captura,
                NaiveDate::from_ymd_opt(2026, 10, 3).unwrap()
            );
        }
    }

    #[test]
    fn progress_and_missing() {
        let mut pescadex = Pescadex::default();
        assert_eq!(pescadex.progress(), (0, SPECIES_NAMES.len()));

        pescadex.register(&parte(10, vec![EspecieCapturada::new("surubí", 1)]));

        assert_eq!(pescadex.progress(), (1, SPECIES_NAMES.len()));
        let missing = pescadex.missing();
        assert_eq!(missing.len(), SPECIES_NAMES.len() - 1);
        assert!(!missing.contains(&"surubí"));
        assert!(missing.contains(&"dorado"));
    }

    #[test]
    fn display() {
        let mut pescadex = Pescadex::default();
        pescadex.register(&parte(10, vec![EspecieCapturada::new("pacú", 2)]));

        assert_eq!(
            pescadex.to_string(),
            format!(
                "Pescadex: 1/{} especies\n  pacú x2 (desde el 10/10/2026)",
                SPECIES_NAMES.len()
            )
        );
    }
}
