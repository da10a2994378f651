use async_trait::async_trait;
use huka_extract::PartePesca;
use log::debug;
use miette::Diagnostic;
use sqlx::{Connection, SqliteConnection};
use tokio::sync::Mutex;

use crate::{
    db_conn,
    models::{ChatMessage, DecodeRowError, MessageRow, ParteRow, PescadexRow},
    pescadex::{Pescadex, PescadexEntry},
    OpenDatabaseError,
};

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum StoreError {
    #[error("Could not open the store")]
    #[diagnostic(code(huka::store::open))]
    Open(#[from] OpenDatabaseError),

    #[error("Could not query the database")]
    #[diagnostic(code(huka::store::query))]
    Query(#[from] sqlx::Error),

    #[error("Could not encode parte")]
    #[diagnostic(code(huka::store::encode))]
    Encode(#[from] serde_json::Error),

    #[error("Could not decode stored row")]
    #[diagnostic(code(huka::store::decode))]
    Decode(#[from] DecodeRowError),
}

/// Persistence for finished partes, Pescadex catalogs and chat history.
#[async_trait]
pub trait ParteStore: Send + Sync {
    /// Returns the id of the stored parte.
    async fn save_parte(&self, parte: &PartePesca) -> Result<i64, StoreError>;

    /// Partes of `usuario`, oldest outing first.
    async fn partes(&self, usuario: &str) -> Result<Vec<PartePesca>, StoreError>;

    async fn pescadex(&self, usuario: &str) -> Result<Pescadex, StoreError>;

    async fn save_pescadex(&self, usuario: &str, pescadex: &Pescadex) -> Result<(), StoreError>;

    async fn append_message(&self, usuario: &str, message: &ChatMessage)
        -> Result<(), StoreError>;

    /// The last `limit` messages of `usuario` in the order they were sent.
    async fn history(&self, usuario: &str, limit: u32) -> Result<Vec<ChatMessage>, StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<SqliteConnection>,
}

impl SqliteStore {
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        Ok(Self::from_connection(db_conn(url).await?))
    }

    /// Wrap an already migrated connection.
    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub async fn close(self) -> Result<(), StoreError> {
        self.conn.into_inner().close().await?;
        Ok(())
    }
}

#[async_trait]
impl ParteStore for SqliteStore {
    async fn save_parte(&self, parte: &PartePesca) -> Result<i64, StoreError> {
        let especies = serde_json::to_string(&parte.especies)?;
        let fotos = serde_json::to_string(&parte.fotos)?;

        let mut conn = self.conn.lock().await;
        let id = sqlx::query(
            "INSERT INTO partes (usuario, fecha, hora_inicio, hora_fin, especies, provincia, \
             lugar, modalidad, cantidad_canas, fotos, observaciones, creado) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&parte.usuario)
        .bind(parte.fecha)
        .bind(parte.hora_inicio)
        .bind(parte.hora_fin)
        .bind(especies)
        .bind(&parte.provincia)
        .bind(&parte.lugar)
        .bind(parte.modalidad.to_string())
        .bind(parte.cantidad_canas.map(i64::from))
        .bind(fotos)
        .bind(&parte.observaciones)
        .bind(parte.creado)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        debug!("Stored parte {id} of {}", parte.usuario);
        Ok(id)
    }

    async fn partes(&self, usuario: &str) -> Result<Vec<PartePesca>, StoreError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<ParteRow> =
            sqlx::query_as("SELECT * FROM partes WHERE usuario = ? ORDER BY fecha, id")
                .bind(usuario)
                .fetch_all(&mut *conn)
                .await?;

        rows.into_iter()
            .map(|row| PartePesca::try_from(row).map_err(StoreError::from))
            .collect()
    }

    async fn pescadex(&self, usuario: &str) -> Result<Pescadex, StoreError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<PescadexRow> = sqlx::query_as(
            "SELECT especie, primera_captura, cantidad FROM pescadex WHERE usuario = ? ORDER BY rowid",
        )
        .bind(usuario)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Pescadex::from_entries(
            rows.into_iter()
                .map(|row| PescadexEntry {
                    especie: row.especie,
                    primera_captura: row.primera_captura,
                    cantidad: row.cantidad as u32,
                })
                .collect(),
        ))
    }

    async fn save_pescadex(&self, usuario: &str, pescadex: &Pescadex) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        let mut tx = conn.begin().await?;

        for entry in pescadex.entries() {
            sqlx::query(
                "INSERT INTO pescadex (usuario, especie, primera_captura, cantidad) \
                 VALUES (?, ?, ?, ?) \
                 ON CONFLICT (usuario, especie) DO UPDATE \
                 SET primera_captura = excluded.primera_captura, cantidad = excluded.cantidad",
            )
            .bind(usuario)
            .bind(&entry.especie)
            .bind(entry.primera_captura)
            .bind(i64::from(entry.cantidad))
            .execute(&mut tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_message(
        &self,
        usuario: &str,
        message: &ChatMessage,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO mensajes (usuario, content, from_user, kind, timestamp) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(usuario)
        .bind(&message.content)
        .bind(message.from_user)
        .bind(message.kind.to_string())
        .bind(message.timestamp)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn history(&self, usuario: &str, limit: u32) -> Result<Vec<ChatMessage>, StoreError> {
        let mut conn = self.conn.lock().await;
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT content, from_user, kind, timestamp FROM \
             (SELECT id, content, from_user, kind, timestamp FROM mensajes \
              WHERE usuario = ? ORDER BY id DESC LIMIT ?) \
             ORDER BY id",
        )
        .bind(usuario)
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter()
            .map(|row| ChatMessage::try_from(row).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
    use huka_extract::{EspecieCapturada, Modalidad};

    use super::*;
    use crate::models::MessageKind;

    async fn store() -> SqliteStore {
        SqliteStore::open("sqlite::memory:").await.unwrap()
    }

    fn parte(usuario: &str, day: u32) -> PartePesca {
        PartePesca {
            usuario: usuario.to_string(),
            fecha: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
            hora_inicio: NaiveTime::from_hms_opt(6, 30, 0),
            hora_fin: None,
            especies: vec![
                EspecieCapturada::new("dorado", 2),
                EspecieCapturada::new("pejerrey", 1),
            ],
            provincia: Some("Entre Ríos".to_string()),
            lugar: Some("río Paraná".to_string()),
            modalidad: Modalidad::Embarcado,
            cantidad_canas: Some(3),
            fotos: vec!["fotos/dorado.jpg".to_string()],
            observaciones: None,
            creado: Utc.with_ymd_and_hms(2026, 10, day, 21, 0, 0).unwrap(),
        }
    }

    mod partes {
        use super::*;

        #[tokio::test]
        async fn saved_partes_come_back() {
            let store = store().await;
            let saved = parte("lucas", 13);

            let id = store.save_parte(&saved).await.unwrap();
            let partes = store.partes("lucas").await.unwrap();

            assert!(id > 0);
            assert_eq!(partes, vec![saved]);
        }

        #[tokio::test]
        async fn scoped_per_user_and_ordered_by_date() {
            let store = store().await;
            store.save_parte(&parte("lucas", 13)).await.unwrap();
            store.save_parte(&parte("lucas", 2)).await.unwrap();
            store.save_parte(&parte("sofi", 5)).await.unwrap();

            let fechas: Vec<_> = store
                .partes("lucas")
                .await
                .unwrap()
                .into_iter()
                .map(|p| p.fecha.day())
                .collect();

            assert_eq!(fechas, vec![2, 13]);
            assert!(store.partes("nadie").await.unwrap().is_empty());
        }
    }

    mod pescadex {
        use super::*;

        #[tokio::test]
        async fn empty_for_new_users() {
            let store = store().await;

            assert_eq!(store.pescadex("lucas").await.unwrap(), Pescadex::default());
        }

        #[tokio::test]
        async fn saving_twice_updates_entries() {
            let store = store().await;
            let mut pescadex = Pescadex::default();
            pescadex.register(&parte("lucas", 13));
            store.save_pescadex("lucas", &pescadex).await.unwrap();

            let mut second = parte("lucas", 14);
            second.especies = vec![
                EspecieCapturada::new("dorado", 1),
                EspecieCapturada::new("boga", 4),
            ];
            pescadex.register(&second);
            store.save_pescadex("lucas", &pescadex).await.unwrap();

            let loaded = store.pescadex("lucas").await.unwrap();
            assert_eq!(loaded, pescadex);
            assert_eq!(loaded.get("dorado").unwrap().cantidad, 3);
        }
    }

    mod history {
        use super::*;

        #[tokio::test]
        async fn returns_the_latest_messages_in_order() {
            let store = store().await;
            let start = Utc.with_ymd_and_hms(2026, 10, 14, 20, 0, 0).unwrap();
            for i in 0..5 {
                let message = ChatMessage::user(
                    format!("mensaje {i}"),
                    MessageKind::Text,
                    start + Duration::minutes(i),
                );
                store.append_message("lucas", &message).await.unwrap();
            }
            store
                .append_message("sofi", &ChatMessage::assistant("hola", start))
                .await
                .unwrap();

            let history = store.history("lucas", 3).await.unwrap();

            let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(contents, vec!["mensaje 2", "mensaje 3", "mensaje 4"]);
            assert!(history.iter().all(|m| m.from_user));
            assert_eq!(history[0].timestamp, start + Duration::minutes(2));
        }
    }
}
