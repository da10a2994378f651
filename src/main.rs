#![forbid(unsafe_code)]

use huka::{
    chat::{ChatSession, GREETING},
    config::Config,
    store::{ParteStore, SqliteStore},
    transcript::{TraceLog, Transcript},
};
use huka_extract::PartePesca;
use log::{error, info, warn};
use miette::{IntoDiagnostic, Result, WrapErr};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

static PHOTO_COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/foto\s+(?P<ruta>\S+)(?:\s+(?P<texto>.*))?$").unwrap());

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message {
        text: &'a str,
        photo: Option<&'a str>,
    },
    Pescadex,
    Partes,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    if let Some(captures) = PHOTO_COMMAND.captures(line) {
        return Input::Message {
            text: captures.name("texto").map_or("", |m| m.as_str().trim()),
            photo: captures.name("ruta").map(|m| m.as_str()),
        };
    }

    match line.split_whitespace().next() {
        Some("/pescadex") => Input::Pescadex,
        Some("/partes") => Input::Partes,
        Some("/salir") => Input::Quit,
        Some(command) if command.starts_with('/') => Input::Unknown(command),
        _ => Input::Message {
            text: line,
            photo: None,
        },
    }
}

fn describe_parte(parte: &PartePesca) -> String {
    let mut line = format!(
        "{} · {} · {} · {} piezas",
        parte.fecha.format("%d/%m/%Y"),
        parte
            .lugar
            .as_deref()
            .or(parte.provincia.as_deref())
            .unwrap_or("sin lugar"),
        parte.modalidad,
        parte.total_piezas()
    );
    if let Some(duracion) = parte.duracion() {
        line.push_str(&format!(" · {}", humantime::format_duration(duracion)));
    }
    line
}

/// Store a finished parte and return the species it added to the Pescadex.
async fn save_parte(store: &impl ParteStore, parte: &PartePesca) -> Result<Vec<String>> {
    store
        .save_parte(parte)
        .await
        .wrap_err("Could not save parte")?;

    let mut pescadex = store
        .pescadex(&parte.usuario)
        .await
        .wrap_err("Could not load Pescadex")?;
    let discovered = pescadex.register(parte);
    store
        .save_pescadex(&parte.usuario, &pescadex)
        .await
        .wrap_err("Could not save Pescadex")?;

    Ok(discovered)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    pretty_env_logger::init_timed();

    let config = Config::load().wrap_err("Could not load configuration")?;
    info!("Chatting as {}", config.usuario);

    let store = SqliteStore::open(&config.database_url)
        .await
        .wrap_err("Could not open database")?;
    let transcript = Transcript::for_user(&config.data_dir, &config.usuario);
    let trace = TraceLog::for_user(&config.data_dir, &config.usuario);

    let mut session = ChatSession::new(config.usuario.clone(), config.seed);
    let mut recorded = 0;
    println!("{GREETING}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .into_diagnostic()
        .wrap_err("Could not read from stdin")?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (text, photo) = match parse_input(line) {
            Input::Message { text, photo } => (text, photo),
            Input::Quit => break,
            Input::Pescadex => {
                match store.pescadex(&config.usuario).await {
                    Ok(pescadex) => {
                        println!("{pescadex}");
                        println!("Te faltan: {}", pescadex.missing().join(", "));
                    }
                    Err(err) => error!("Could not load Pescadex: {err}"),
                }
                continue;
            }
            Input::Partes => {
                match store.partes(&config.usuario).await {
                    Ok(partes) if partes.is_empty() => println!("Todavía no guardaste partes."),
                    Ok(partes) => partes
                        .iter()
                        .for_each(|parte| println!("{}", describe_parte(parte))),
                    Err(err) => error!("Could not load partes: {err}"),
                }
                continue;
            }
            Input::Unknown(command) => {
                println!("No conozco {command}. Probá /foto, /pescadex, /partes o /salir.");
                continue;
            }
        };

        let reply = session.handle_message(text, photo);
        println!("{}", reply.text);

        for message in &session.messages()[recorded..] {
            if let Err(err) = store.append_message(&config.usuario, message).await {
                warn!("Could not store message: {err}");
            }
            if let Err(err) = transcript.append(message) {
                warn!("Could not write transcript: {err}");
            }
        }
        recorded = session.messages().len();

        let trace_lines = session.drain_trace();
        if config.trace {
            if let Err(err) = trace.append(&trace_lines) {
                warn!("Could not write trace: {err}");
            }
        }

        if let Some(parte) = reply.parte {
            match save_parte(&store, &parte).await {
                Ok(discovered) => {
                    for especie in discovered {
                        println!("¡Nueva especie en tu Pescadex: {especie}!");
                    }
                }
                Err(err) => error!("{err:?}"),
            }
        }
    }

    info!("Closing database");
    store.close().await.wrap_err("Could not close database")?;
    Ok(())
}
