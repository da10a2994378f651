use chrono::{DateTime, Local, Utc};
use huka_extract::{
    analyze_story, extract_fishing_data, vocab::normalize, EntityManager, FinalizeError,
    FishingDataExtractor, MissingField, ParteEnProgreso, PartePesca,
};
use log::{debug, info};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::models::{ChatMessage, MessageKind};

const ACKNOWLEDGEMENTS: &[&str] = &[
    "¡Buenísimo!",
    "¡Anotado!",
    "¡Qué lindo!",
    "Perfecto, lo anoto.",
    "¡Bien ahí!",
    "Dale, sumado al parte.",
];

pub const GREETING: &str = "¡Hola! Contame cómo te fue pescando y armo el parte.";

/// Messages with at least this many words also get a story summary.
const STORY_MIN_WORDS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Finish,
    Cancel,
    Missing,
    Summary,
}

impl Command {
    fn parse(text: &str) -> Option<Self> {
        let normalized = normalize(text);
        match normalized.trim_matches(|c: char| !c.is_alphanumeric()) {
            "listo" | "guardar" | "termine" => Some(Self::Finish),
            "cancelar" => Some(Self::Cancel),
            "faltan" => Some(Self::Missing),
            "resumen" => Some(Self::Summary),
            _ => None,
        }
    }
}

/// Answer to one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    /// Set when the message finished a parte.
    pub parte: Option<PartePesca>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parte: None,
        }
    }
}

fn list_questions(fields: &[MissingField]) -> String {
    fields
        .iter()
        .map(|field| format!("- {}", field.question()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One conversation building one parte at a time.
pub struct ChatSession {
    usuario: String,
    messages: Vec<ChatMessage>,
    parte: ParteEnProgreso,
    fishing: FishingDataExtractor,
    entities: EntityManager,
    rng: StdRng,
}

impl ChatSession {
    pub fn new(usuario: impl Into<String>, seed: Option<u64>) -> Self {
        Self {
            usuario: usuario.into(),
            messages: Vec::new(),
            parte: ParteEnProgreso::default(),
            fishing: FishingDataExtractor::new(),
            entities: EntityManager::new(),
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        }
    }

    pub fn usuario(&self) -> &str {
        &self.usuario
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn parte(&self) -> &ParteEnProgreso {
        &self.parte
    }

    pub fn missing_fields(&self) -> Vec<MissingField> {
        self.parte.missing_fields()
    }

    /// Extractor trace lines produced since the last call.
    pub fn drain_trace(&mut self) -> Vec<String> {
        self.fishing.drain_trace()
    }

    pub fn handle_message(&mut self, text: &str, photo: Option<&str>) -> Reply {
        self.handle_message_at(text, photo, Local::now())
    }

    pub fn handle_message_at(
        &mut self,
        text: &str,
        photo: Option<&str>,
        now: DateTime<Local>,
    ) -> Reply {
        let timestamp = now.with_timezone(&Utc);
        let kind = if photo.is_some() {
            MessageKind::Image
        } else {
            MessageKind::Text
        };
        self.messages.push(ChatMessage::user(text, kind, timestamp));

        let reply = match Command::parse(text).filter(|_| photo.is_none()) {
            Some(command) => self.run_command(command, timestamp),
            None => self.absorb(text, photo, now),
        };

        self.messages
            .push(ChatMessage::assistant(reply.text.clone(), timestamp));
        reply
    }

    fn absorb(&mut self, text: &str, photo: Option<&str>, now: DateTime<Local>) -> Reply {
        let today = now.date_naive();

        let mut data = extract_fishing_data(text, photo, today);
        let found = self.entities.analyze(text, today);
        // "río Negro" is the province, not a place inside it.
        let names_province = match (&data.lugar, &found.provincia) {
            (Some(lugar), Some(provincia)) => normalize(lugar).contains(&normalize(provincia)),
            _ => false,
        };
        if names_province {
            data.lugar = None;
        }
        let nothing_new = found.is_empty() && data.is_empty();

        self.fishing.record(text, data.clone(), now.naive_local());
        self.parte = std::mem::take(&mut self.parte)
            .merge(ParteEnProgreso::from(data))
            .merge(found);
        debug!("parte of {}: {}", self.usuario, self.parte);

        let mut reply = if nothing_new {
            "No encontré datos de pesca en ese mensaje.".to_string()
        } else {
            ACKNOWLEDGEMENTS
                .choose(&mut self.rng)
                .copied()
                .unwrap_or("¡Anotado!")
                .to_string()
        };

        match self.parte.missing_fields().first() {
            Some(field) => {
                reply.push(' ');
                reply.push_str(field.question());
            }
            None => reply.push_str(" Ya tengo todo, escribí «listo» para guardar el parte."),
        }

        if text.split_whitespace().count() >= STORY_MIN_WORDS {
            let story = analyze_story(text);
            reply.push('\n');
            reply.push_str(&story.resumen);
            if self.parte.observaciones.is_none() {
                self.parte.observaciones = Some(text.trim().to_string());
            }
        }

        Reply::text(reply)
    }

    fn run_command(&mut self, command: Command, now: DateTime<Utc>) -> Reply {
        match command {
            Command::Finish => {
                match PartePesca::finalize(self.parte.clone(), self.usuario.clone(), now) {
                    Ok(parte) => {
                        info!("{} finished a parte with {} pieces", self.usuario, parte.total_piezas());
                        self.reset();
                        Reply {
                            text: format!("¡Parte guardado! {} piezas en total.", parte.total_piezas()),
                            parte: Some(parte),
                        }
                    }
                    Err(FinalizeError::Incomplete(missing)) => Reply::text(format!(
                        "Todavía me falta:\n{}",
                        list_questions(&missing)
                    )),
                }
            }
            Command::Cancel => {
                self.reset();
                Reply::text("Listo, descarté el parte.")
            }
            Command::Missing => {
                let missing = self.parte.missing_fields();
                if missing.is_empty() {
                    Reply::text("No falta nada, escribí «listo» para guardar el parte.")
                } else {
                    Reply::text(list_questions(&missing))
                }
            }
            Command::Summary => Reply::text(self.parte.to_string()),
        }
    }

    fn reset(&mut self) {
        self.parte = ParteEnProgreso::default();
        self.fishing.reset();
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use huka_extract::{EspecieCapturada, Modalidad};

    use super::*;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 14, 20, 0, 0).unwrap()
    }

    fn session() -> ChatSession {
        ChatSession::new("lucas", Some(7))
    }

    fn say(session: &mut ChatSession, text: &str) -> Reply {
        session.handle_message_at(text, None, now())
    }

    mod command {
        use super::*;

        #[test]
        fn parses_with_accents_and_punctuation() {
            assert_eq!(Command::parse("¡Terminé!"), Some(Command::Finish));
            assert_eq!(Command::parse(" listo. "), Some(Command::Finish));
            assert_eq!(Command::parse("Guardar"), Some(Command::Finish));
            assert_eq!(Command::parse("cancelar"), Some(Command::Cancel));
            assert_eq!(Command::parse("faltan?"), Some(Command::Missing));
            assert_eq!(Command::parse("resumen"), Some(Command::Summary));
            assert_eq!(Command::parse("listo el pollo"), None);
        }
    }

    mod messages {
        use super::*;

        #[test]
        fn report_fills_the_parte() {
            let mut session = session();

            let reply = say(&mut session, "Ayer pesqué 2 dorados y 1 pejerrey desde costa");

            let parte = session.parte();
            assert_eq!(parte.fecha, NaiveDate::from_ymd_opt(2026, 10, 13));
            assert_eq!(
                parte.especies,
                vec![
                    EspecieCapturada::new("dorado", 2),
                    EspecieCapturada::new("pejerrey", 1),
                ]
            );
            assert_eq!(parte.modalidad, Some(Modalidad::Costa));
            assert!(reply.text.ends_with(MissingField::StartTime.question()));
            assert!(ACKNOWLEDGEMENTS.iter().any(|ack| reply.text.starts_with(ack)));
            assert!(reply.parte.is_none());
        }

        #[test]
        fn small_talk_gets_the_first_question() {
            let mut session = session();

            let reply = say(&mut session, "hola");

            assert_eq!(
                reply.text,
                format!(
                    "No encontré datos de pesca en ese mensaje. {}",
                    MissingField::Date.question()
                )
            );
            assert!(session.parte().is_empty());
        }

        #[test]
        fn small_talk_after_a_report_is_not_data() {
            let mut session = session();
            say(&mut session, "saqué 2 bogas");

            let reply = say(&mut session, "jaja sí");

            assert!(reply.text.starts_with("No encontré datos de pesca"));
        }

        #[test]
        fn both_sides_are_recorded() {
            let mut session = session();

            say(&mut session, "hola");

            let messages = session.messages();
            assert_eq!(messages.len(), 2);
            assert!(messages[0].from_user);
            assert_eq!(messages[0].content, "hola");
            assert!(!messages[1].from_user);
        }

        #[test]
        fn photos_are_attached() {
            let mut session = session();

            session.handle_message_at("", Some("fotos/dorado.jpg"), now());

            assert_eq!(session.parte().fotos, vec!["fotos/dorado.jpg"]);
            assert_eq!(session.messages()[0].kind, MessageKind::Image);
        }

        #[test]
        fn long_messages_get_a_story_summary() {
            let mut session = session();
            let story =
                "Ayer fuimos con mi viejo al río y sacamos 3 dorados y 2 bogas con carnada a la tarde";

            let reply = say(&mut session, story);

            assert!(reply.text.ends_with("Jornada exitosa."));
            assert_eq!(session.parte().observaciones.as_deref(), Some(story));
        }

        #[test]
        fn parte_is_stable_across_turns() {
            let mut session = session();
            say(&mut session, "Salimos a la mañana y volvimos a las 13");
            say(&mut session, "hoy he pescado 3 dorados");

            let reply = say(&mut session, "fue en Santa Fe");

            let parte = session.parte();
            assert!(!reply.text.starts_with("No encontré datos de pesca"));
            assert_eq!(parte.hora_inicio, NaiveTime::from_hms_opt(6, 0, 0));
            assert_eq!(parte.hora_fin, NaiveTime::from_hms_opt(13, 0, 0));
            assert_eq!(parte.especies, vec![EspecieCapturada::new("dorado", 3)]);
            assert_eq!(parte.provincia.as_deref(), Some("Santa Fe"));

            say(&mut session, "jaja sí");

            assert_eq!(session.parte().hora_inicio, NaiveTime::from_hms_opt(6, 0, 0));
            assert_eq!(
                session.parte().especies,
                vec![EspecieCapturada::new("dorado", 3)]
            );
        }

        #[test]
        fn province_is_not_also_the_place() {
            let mut session = session();

            say(&mut session, "pescamos en el río Negro");

            assert_eq!(session.parte().provincia.as_deref(), Some("Río Negro"));
            assert_eq!(session.parte().lugar, None);
        }

        #[test]
        fn trace_follows_the_messages() {
            let mut session = session();

            say(&mut session, "hola");
            say(&mut session, "saqué 2 bogas");

            assert_eq!(session.drain_trace().len(), 2);
            assert!(session.drain_trace().is_empty());
        }
    }

    mod finish {
        use super::*;

        #[test]
        fn incomplete_parte_lists_what_is_missing() {
            let mut session = session();
            say(&mut session, "Ayer pesqué 2 dorados desde costa");

            let reply = say(&mut session, "listo");

            assert!(reply.parte.is_none());
            assert!(reply.text.contains(MissingField::Location.question()));
            assert!(!reply.text.contains(MissingField::Date.question()));
            assert!(!session.parte().is_empty());
        }

        #[test]
        fn complete_parte_is_returned_and_cleared() {
            let mut session = session();
            say(&mut session, "Ayer pesqué 2 dorados y 1 pejerrey desde costa");
            say(&mut session, "fue en Entre Ríos");

            let reply = say(&mut session, "listo");

            let parte = reply.parte.unwrap();
            assert_eq!(parte.usuario, "lucas");
            assert_eq!(parte.provincia.as_deref(), Some("Entre Ríos"));
            assert_eq!(parte.total_piezas(), 3);
            assert_eq!(reply.text, "¡Parte guardado! 3 piezas en total.");
            assert!(session.parte().is_empty());
        }

        #[test]
        fn nothing_missing_is_announced() {
            let mut session = session();
            say(
                &mut session,
                "Ayer desde las 6 con 2 cañas saqué 2 bogas embarcado en Santa Fe",
            );

            assert_eq!(
                say(&mut session, "faltan").text,
                "No falta nada, escribí «listo» para guardar el parte."
            );
        }
    }

    #[test]
    fn cancel_discards_the_parte() {
        let mut session = session();
        say(&mut session, "saqué 2 bogas");

        let reply = say(&mut session, "cancelar");

        assert_eq!(reply.text, "Listo, descarté el parte.");
        assert!(session.parte().is_empty());
    }

    #[test]
    fn summary_describes_the_parte() {
        let mut session = session();
        say(&mut session, "saqué 2 bogas");

        assert_eq!(say(&mut session, "resumen").text, "boga x2");
    }
}
