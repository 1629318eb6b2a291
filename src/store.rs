// Copyright 2026 PhraseFinder Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use anyhow::Context;
use anyhow::Result;
use fs2::FileExt;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use sha2::Digest;
use sha2::Sha256;
use time::Date;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::model::ANY;
use crate::model::Candidate;
use crate::model::Finding;
use crate::model::Keyword;
use crate::model::ResultItem;

const SCHEMA_VERSION: i64 = 1;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Persistence contract consumed by the crawl engine and the aggregator.
///
/// Every write is an upsert: a repeated observation touches the `updated`
/// timestamp of the existing row and still reports one affected row.
pub trait ResultStore {
    /// Keywords matching `category`/`language` (`"any"` matches everything),
    /// capped at `limit` when given.
    fn keywords(&self, category: &str, language: &str, limit: Option<usize>)
    -> Result<Vec<Keyword>>;

    fn store_item(
        &self,
        domain: &str,
        url: &str,
        phrase: &str,
        keyword_id: i64,
        title: &str,
        provider: &str,
    ) -> Result<usize>;

    /// Distinct domains first seen inside `[start 00:00:00, end 23:59:59]`
    /// that are not findings yet, each paired with the keyword of its most
    /// recent observation.
    fn new_entries(&self, start: Date, end: Date, provider: Option<&str>)
    -> Result<Vec<Candidate>>;

    fn upsert_finding(&self, domain: &str, keyword_id: i64) -> Result<usize>;
}

pub struct Store {
    pub conn: Connection,
    _lock: Option<StoreLock>,
}

/// Advisory lock on a per-store file under the temp dir. The file is never
/// unlinked, so every process contends on the same inode.
struct StoreLock {
    _file: File,
}

#[derive(Debug, Clone, Copy)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub keyword_count: i64,
    pub result_count: i64,
    pub finding_count: i64,
}

impl Store {
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("store already exists at {}", path.display());
        }
        let _lock = Self::acquire_lock(path, StoreMode::ReadWrite)?;
        let conn = Self::open_connection(path, StoreMode::ReadWrite)?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    pub fn open(path: &Path, mode: StoreMode) -> Result<Self> {
        let lock = Self::acquire_lock(path, mode)?;
        let conn = Self::open_connection(path, mode)?;
        Self::apply_pragmas(&conn, mode)?;
        if matches!(mode, StoreMode::ReadWrite) {
            Self::create_schema(&conn)?;
            Self::migrate(&conn)?;
        } else {
            let version = Self::schema_version(&conn)?;
            if version != SCHEMA_VERSION {
                anyhow::bail!(
                    "store schema version {version} does not match {SCHEMA_VERSION}; open it read-write once to migrate"
                );
            }
        }
        Ok(Self {
            conn,
            _lock: Some(lock),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory store")?;
        Self::apply_pragmas(&conn, StoreMode::ReadWrite)?;
        Self::create_schema(&conn)?;
        Self::set_meta(&conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(Self { conn, _lock: None })
    }

    fn open_connection(path: &Path, mode: StoreMode) -> Result<Connection> {
        let flags = match mode {
            StoreMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            StoreMode::ReadWrite => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        let conn = Connection::open_with_flags(path, flags)
            .with_context(|| format!("open {}", path.display()))?;
        conn.busy_timeout(Duration::from_millis(5000))
            .context("set busy timeout")?;
        Ok(conn)
    }

    fn apply_pragmas(conn: &Connection, mode: StoreMode) -> Result<()> {
        let mut batch = String::from("PRAGMA foreign_keys=ON;");
        if matches!(mode, StoreMode::ReadWrite) {
            batch = format!("PRAGMA journal_mode=DELETE;\nPRAGMA synchronous=NORMAL;\n{batch}");
        }
        conn.execute_batch(&batch).context("apply pragmas")?;
        Ok(())
    }

    fn lock_path_for(path: &Path) -> Result<PathBuf> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string_lossy().as_bytes());
        let hash = hex::encode(hasher.finalize());
        let mut dir = std::env::temp_dir();
        dir.push("phrasefinder");
        fs::create_dir_all(&dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        Ok(dir.join(format!("phrasefinder-{hash}.lock")))
    }

    fn acquire_lock(path: &Path, mode: StoreMode) -> Result<StoreLock> {
        let lock_path = Self::lock_path_for(path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;
        let deadline = Instant::now() + Duration::from_millis(5000);
        loop {
            let locked = match mode {
                StoreMode::ReadOnly => {
                    FileExt::try_lock_shared(&file).map_err(|err| err.to_string())
                }
                StoreMode::ReadWrite => {
                    FileExt::try_lock_exclusive(&file).map_err(|err| err.to_string())
                }
            };
            match locked {
                Ok(()) => return Ok(StoreLock { _file: file }),
                Err(_) if Instant::now() >= deadline => {
                    let mode_label = match mode {
                        StoreMode::ReadOnly => "read",
                        StoreMode::ReadWrite => "write",
                    };
                    anyhow::bail!(
                        "store is locked for {mode_label} access; another crawl or store run may be using {}",
                        path.display()
                    );
                }
                Err(_) => sleep(Duration::from_millis(50)),
            }
        }
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value TEXT
);

CREATE TABLE IF NOT EXISTS wi_keywords (
  keyword_id INTEGER PRIMARY KEY,
  keyword TEXT NOT NULL,
  category TEXT NOT NULL DEFAULT 'any',
  language TEXT NOT NULL DEFAULT 'any'
);

CREATE TABLE IF NOT EXISTS wi_search_engine_result (
  id INTEGER PRIMARY KEY,
  domain TEXT NOT NULL,
  url TEXT NOT NULL,
  last_keyword TEXT NOT NULL,
  last_keywordid INTEGER NOT NULL,
  last_title TEXT,
  search_engine TEXT NOT NULL,
  inserted TEXT NOT NULL,
  updated TEXT,
  UNIQUE (domain, url, last_keyword, search_engine)
);

CREATE INDEX IF NOT EXISTS idx_result_inserted ON wi_search_engine_result(inserted);
CREATE INDEX IF NOT EXISTS idx_result_domain ON wi_search_engine_result(domain);

CREATE TABLE IF NOT EXISTS wi_findings (
  domain TEXT PRIMARY KEY,
  keyword_id INTEGER NOT NULL,
  inserted TEXT NOT NULL,
  updated TEXT
);",
        )
        .context("create schema")?;
        Ok(())
    }

    fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .context("set meta")?;
        Ok(())
    }

    fn schema_version(conn: &Connection) -> Result<i64> {
        let has_meta: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get(0),
            )
            .context("check meta table")?;
        if has_meta == 0 {
            return Ok(0);
        }
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key='schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("read schema_version")?;
        Ok(value.and_then(|v| v.parse::<i64>().ok()).unwrap_or(0))
    }

    fn migrate(conn: &Connection) -> Result<()> {
        let version = Self::schema_version(conn)?;
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "store schema version {} is newer than supported {}",
                version,
                SCHEMA_VERSION
            );
        }
        if version < SCHEMA_VERSION {
            Self::set_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
        }
        Ok(())
    }

    pub fn add_keyword(&self, phrase: &str, category: &str, language: &str) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO wi_keywords (keyword, category, language) VALUES (?1, ?2, ?3)",
                params![phrase, category, language],
            )
            .context("insert keyword")?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Upserts a result row stamped with `at` instead of the current time.
    #[allow(clippy::too_many_arguments)]
    pub fn store_item_at(
        &self,
        domain: &str,
        url: &str,
        phrase: &str,
        keyword_id: i64,
        title: &str,
        provider: &str,
        at: OffsetDateTime,
    ) -> Result<usize> {
        let stamp = timestamp(at)?;
        let rows = self
            .conn
            .execute(
                "INSERT INTO wi_search_engine_result
                   (domain, url, last_keyword, last_keywordid, last_title, search_engine, inserted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (domain, url, last_keyword, search_engine)
                 DO UPDATE SET updated = excluded.inserted",
                params![domain, url, phrase, keyword_id, title, provider, stamp],
            )
            .with_context(|| format!("store result {url}"))?;
        Ok(rows)
    }

    pub fn upsert_finding_at(
        &self,
        domain: &str,
        keyword_id: i64,
        at: OffsetDateTime,
    ) -> Result<usize> {
        let stamp = timestamp(at)?;
        let rows = self
            .conn
            .execute(
                "INSERT INTO wi_findings (domain, keyword_id, inserted) VALUES (?1, ?2, ?3)
                 ON CONFLICT (domain) DO UPDATE SET updated = excluded.inserted",
                params![domain, keyword_id, stamp],
            )
            .with_context(|| format!("upsert finding {domain}"))?;
        Ok(rows)
    }

    pub fn results(&self) -> Result<Vec<ResultItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, url, last_keyword, last_keywordid, last_title, search_engine, inserted, updated
             FROM wi_search_engine_result ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ResultItem {
                domain: row.get(0)?,
                url: row.get(1)?,
                phrase: row.get(2)?,
                keyword_id: row.get(3)?,
                title: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                provider: row.get(5)?,
                inserted: row.get(6)?,
                updated: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn findings(&self) -> Result<Vec<Finding>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, keyword_id, inserted, updated FROM wi_findings ORDER BY domain ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Finding {
                domain: row.get(0)?,
                keyword_id: row.get(1)?,
                inserted: row.get(2)?,
                updated: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let count = |table: &str| -> Result<i64> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .with_context(|| format!("count {table}"))
        };
        Ok(StoreStats {
            keyword_count: count("wi_keywords")?,
            result_count: count("wi_search_engine_result")?,
            finding_count: count("wi_findings")?,
        })
    }
}

impl ResultStore for Store {
    fn keywords(
        &self,
        category: &str,
        language: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Keyword>> {
        let mut sql =
            String::from("SELECT keyword_id, keyword, category, language FROM wi_keywords");
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if category != ANY {
            values.push(Value::Text(category.to_string()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if language != ANY {
            values.push(Value::Text(language.to_string()));
            clauses.push(format!("language = ?{}", values.len()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY keyword_id ASC");
        if let Some(limit) = limit {
            values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let mut stmt = self.conn.prepare(&sql).context("prepare keyword query")?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(Keyword {
                id: row.get(0)?,
                phrase: row.get(1)?,
                category: row.get(2)?,
                language: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn store_item(
        &self,
        domain: &str,
        url: &str,
        phrase: &str,
        keyword_id: i64,
        title: &str,
        provider: &str,
    ) -> Result<usize> {
        self.store_item_at(
            domain,
            url,
            phrase,
            keyword_id,
            title,
            provider,
            OffsetDateTime::now_utc(),
        )
    }

    fn new_entries(
        &self,
        start: Date,
        end: Date,
        provider: Option<&str>,
    ) -> Result<Vec<Candidate>> {
        let lower = format!("{} 00:00:00", start.format(DATE_FORMAT)?);
        let upper = format!("{} 23:59:59", end.format(DATE_FORMAT)?);
        let mut values = vec![Value::Text(lower), Value::Text(upper)];
        let mut sql = String::from(
            "SELECT domain, last_keywordid, MAX(COALESCE(updated, inserted))
             FROM wi_search_engine_result
             WHERE inserted >= ?1 AND inserted <= ?2",
        );
        if let Some(provider) = provider {
            values.push(Value::Text(provider.to_string()));
            sql.push_str(" AND search_engine = ?3");
        }
        sql.push_str(
            " AND domain NOT IN (SELECT domain FROM wi_findings)
             GROUP BY domain ORDER BY domain ASC",
        );

        let mut stmt = self.conn.prepare(&sql).context("prepare new entries query")?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok(Candidate {
                domain: row.get(0)?,
                keyword_id: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn upsert_finding(&self, domain: &str, keyword_id: i64) -> Result<usize> {
        self.upsert_finding_at(domain, keyword_id, OffsetDateTime::now_utc())
    }
}

fn timestamp(at: OffsetDateTime) -> Result<String> {
    at.to_offset(time::UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .context("format timestamp")
}
