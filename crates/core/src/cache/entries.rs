//! SQLite implementation of the cache store.
//!
//! Generations live in one table and entries in another, linked by a
//! cascading foreign key so dropping a generation drops its entries.

use async_trait::async_trait;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection as SqliteConnection, OptionalExtension};

use super::connection::CacheDb;
use super::store::{CacheStore, CachedEntry, Generation};
use crate::Error;

const ENTRY_COLUMNS: &str = "key, url, method, status, status_text, headers_json, body, stored_at";

fn ensure_generation(conn: &SqliteConnection, name: &str) -> Result<Generation, Error> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    let created_at: String =
        conn.query_row("SELECT created_at FROM generations WHERE name = ?1", params![name], |row| row.get(0))?;
    Ok(Generation { name: name.to_string(), created_at })
}

fn upsert_entry(conn: &SqliteConnection, generation: &str, entry: &CachedEntry) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT INTO entries (
            generation, key, url, method, status, status_text, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(generation, key) DO UPDATE SET
            url = excluded.url,
            method = excluded.method,
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            &entry.key,
            &entry.url,
            &entry.method,
            entry.status,
            &entry.status_text,
            headers_json,
            &entry.body,
            entry.stored_at,
        ],
    )?;
    Ok(())
}

type EntryRow = (String, String, String, u16, String, String, Vec<u8>, i64);

fn read_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn into_entry(row: EntryRow) -> Result<CachedEntry, Error> {
    let (key, url, method, status, status_text, headers_json, body, stored_at) = row;
    let headers = serde_json::from_str(&headers_json)?;
    Ok(CachedEntry { key, url, method, status, status_text, headers, body, stored_at })
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn open(&self, name: &str) -> Result<Generation, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Generation, Error> { ensure_generation(conn, &name) })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, generation: &Generation, entry: CachedEntry) -> Result<(), Error> {
        let name = generation.name.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_generation(&tx, &name)?;
                upsert_entry(&tx, &name, &entry)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn commit(&self, name: &str, entries: Vec<CachedEntry>) -> Result<Generation, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Generation, Error> {
                let tx = conn.transaction()?;
                let generation = ensure_generation(&tx, &name)?;
                for entry in &entries {
                    upsert_entry(&tx, &name, entry)?;
                }
                tx.commit()?;
                Ok(generation)
            })
            .await
            .map_err(Error::from)
    }

    async fn lookup(&self, key: &str, scope: Option<&str>) -> Result<Option<CachedEntry>, Error> {
        let key = key.to_string();
        let scope = scope.map(str::to_string);
        self.conn
            .call(move |conn| -> Result<Option<CachedEntry>, Error> {
                let row = match scope {
                    Some(generation) => conn
                        .query_row(
                            &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE generation = ?1 AND key = ?2"),
                            params![generation, key],
                            read_entry_row,
                        )
                        .optional()?,
                    None => conn
                        .query_row(
                            &format!(
                                "SELECT {ENTRY_COLUMNS} FROM entries
                                 JOIN generations g ON g.name = entries.generation
                                 WHERE entries.key = ?1
                                 ORDER BY entries.stored_at DESC, g.rowid DESC LIMIT 1"
                            ),
                            params![key],
                            read_entry_row,
                        )
                        .optional()?,
                };

                row.map(into_entry).transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
