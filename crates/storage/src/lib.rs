//! SQLite-backed document collections for session records.
//!
//! Every collection is a set of rows in the `documents` table keyed by
//! `(collection, id)`. Listing returns rows in insertion order, which is the
//! document order snapshots are built from.

use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use uuid::Uuid;

use shared::domain::{Estado, EventFields, EventId, EventPatch, EventRecord};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn insert_event(&self, collection: &str, fields: &EventFields) -> Result<EventId> {
        let id = EventId(Uuid::new_v4().to_string());
        sqlx::query(
            "INSERT INTO documents (collection, id, nombre, expo, hora, track, estado)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(id.as_str())
        .bind(&fields.nombre)
        .bind(&fields.expo)
        .bind(&fields.hora)
        .bind(&fields.track)
        .bind(fields.estado.as_wire())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert event into collection '{collection}'"))?;
        Ok(id)
    }

    pub async fn list_events(&self, collection: &str) -> Result<Vec<EventRecord>> {
        let rows = sqlx::query(
            "SELECT id, nombre, expo, hora, track, estado
             FROM documents
             WHERE collection = ?
             ORDER BY seq ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("failed to list collection '{collection}'"))?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn get_event(&self, collection: &str, id: &EventId) -> Result<Option<EventRecord>> {
        let row = sqlx::query(
            "SELECT id, nombre, expo, hora, track, estado
             FROM documents
             WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// Writes only the fields present in `patch`. Returns `false` when no such
    /// document exists.
    pub async fn update_event_partial(
        &self,
        collection: &str,
        id: &EventId,
        patch: &EventPatch,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET
                nombre = COALESCE(?, nombre),
                expo = COALESCE(?, expo),
                hora = COALESCE(?, hora),
                track = COALESCE(?, track),
                estado = COALESCE(?, estado),
                updated_at = CURRENT_TIMESTAMP
             WHERE collection = ? AND id = ?",
        )
        .bind(patch.nombre.as_deref())
        .bind(patch.expo.as_deref())
        .bind(patch.hora.as_deref())
        .bind(patch.track.as_deref())
        .bind(patch.estado.map(Estado::as_wire))
        .bind(collection)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to patch event '{id}' in '{collection}'"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Overwrites every data field. Returns `false` when no such document
    /// exists.
    pub async fn update_event_full(
        &self,
        collection: &str,
        id: &EventId,
        fields: &EventFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET
                nombre = ?, expo = ?, hora = ?, track = ?, estado = ?,
                updated_at = CURRENT_TIMESTAMP
             WHERE collection = ? AND id = ?",
        )
        .bind(&fields.nombre)
        .bind(&fields.expo)
        .bind(&fields.hora)
        .bind(&fields.track)
        .bind(fields.estado.as_wire())
        .bind(collection)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to overwrite event '{id}' in '{collection}'"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a document was removed.
    pub async fn delete_event(&self, collection: &str, id: &EventId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete event '{id}' from '{collection}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn record_from_row(row: &SqliteRow) -> Result<EventRecord> {
    let raw_estado: String = row.try_get("estado")?;
    let estado = Estado::from_str(&raw_estado)
        .map_err(|err| anyhow!("corrupt estado column: {err}"))?;
    Ok(EventRecord {
        id: EventId(row.try_get("id")?),
        fields: EventFields {
            nombre: row.try_get("nombre")?,
            expo: row.try_get("expo")?,
            hora: row.try_get("hora")?,
            track: row.try_get("track")?,
            estado,
        },
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
