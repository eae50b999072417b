use std::collections::HashSet;
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use darkgather_core::config::StorageConfig;
use darkgather_core::PageItem;
use darkgather_parser::has_sensitive_identifiers;

use crate::crypto::Cipher;
use crate::error::{ExportError, StoreError, WipeError};
use crate::export::{export_records, ExportFormat};
use crate::fingerprint::fingerprint;

/// Stands in for content that could not be decrypted on load.
pub const ENCRYPTED_PLACEHOLDER: &str = "[ENCRYPTED CONTENT]";

const SIDECAR_SUFFIXES: &[&str] = &["-journal", "-wal", "-shm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    pub saved: usize,
    pub attempted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub data_type: String,
    pub title: String,
    pub url: String,
    /// Decrypted text, the placeholder on failure, `None` when not requested.
    pub content: Option<String>,
    #[serde(skip)]
    pub encrypted_content: Vec<u8>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub sensitive_flag: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub id: i64,
    pub scan_start: DateTime<Utc>,
    pub scan_end: DateTime<Utc>,
    pub items_collected: i64,
    pub domains_scanned: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub domains: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

type RecordRow = (i64, String, String, String, Vec<u8>, String, DateTime<Utc>, bool);

/// Deduplicated, encrypted item store over one SQLite file and one key file.
pub struct DataStore {
    pool: SqlitePool,
    cipher: Cipher,
    db_path: PathBuf,
    key_path: PathBuf,
    domains_per_scan: usize,
}

impl DataStore {
    pub async fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let db_path = PathBuf::from(&config.database_path);
        let key_path = PathBuf::from(&config.key_path);

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let cipher = Cipher::load_or_create(&key_path)?;

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            cipher,
            db_path,
            key_path,
            domains_per_scan: config.domains_per_scan,
        };
        store.run_migrations().await?;
        info!(path = %store.db_path.display(), "data store ready");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../migrations/001_init.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Inserts every new item, silently skipping known urls/fingerprints and
    /// items that fail to encrypt. Always appends one scan_metadata row.
    pub async fn save(&self, items: &[PageItem]) -> Result<SaveReport, StoreError> {
        let scan_start = Utc::now();
        let mut report = SaveReport {
            saved: 0,
            attempted: items.len(),
        };
        let mut domains: Vec<String> = Vec::new();

        let mut tx = self.pool.begin().await?;
        for item in items {
            let domain = item.domain();
            if domains.len() < self.domains_per_scan && !domains.contains(&domain) {
                domains.push(domain);
            }

            let fp = fingerprint(&item.url, &item.content);
            let sealed = match self.cipher.encrypt(&item.content) {
                Ok(sealed) => sealed,
                Err(e) => {
                    warn!(url = %item.url, error = %e, "skipping item");
                    continue;
                }
            };

            let inserted = sqlx::query(
                "INSERT OR IGNORE INTO collected_data
                 (data_type, title, url, encrypted_content, fingerprint, created_at, sensitive_flag)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(item.kind.as_str())
            .bind(&item.title)
            .bind(&item.url)
            .bind(&sealed)
            .bind(&fp)
            .bind(Utc::now())
            .bind(has_sensitive_identifiers(&item.content))
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) if result.rows_affected() > 0 => report.saved += 1,
                Ok(_) => debug!(url = %item.url, "already stored"),
                Err(e) => warn!(url = %item.url, error = %e, "insert failed, skipping item"),
            }
        }

        let domains_json = serde_json::to_string(&domains).unwrap_or_else(|_| "[]".into());
        sqlx::query(
            "INSERT INTO scan_metadata (scan_start, scan_end, items_collected, domains_scanned)
             VALUES (?, ?, ?, ?)",
        )
        .bind(scan_start)
        .bind(Utc::now())
        .bind(report.saved as i64)
        .bind(domains_json)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!(
            saved = report.saved,
            attempted = report.attempted,
            domains = domains.len(),
            "saved {}/{} items from {} domains",
            report.saved,
            report.attempted,
            domains.len()
        );
        Ok(report)
    }

    /// Most recent first. With `decrypt`, unreadable content becomes
    /// [`ENCRYPTED_PLACEHOLDER`] instead of failing the load.
    pub async fn load(&self, limit: usize, decrypt: bool) -> Result<Vec<StoredRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT id, data_type, title, url, encrypted_content, fingerprint, created_at, sensitive_flag
             FROM collected_data
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .into_iter()
            .map(
                |(id, data_type, title, url, encrypted_content, fingerprint, created_at, sensitive_flag)| {
                    let content = decrypt.then(|| match self.cipher.decrypt(&encrypted_content) {
                        Ok(text) => text,
                        Err(e) => {
                            debug!(id, error = %e, "content left encrypted");
                            ENCRYPTED_PLACEHOLDER.to_string()
                        }
                    });
                    StoredRecord {
                        id,
                        data_type,
                        title,
                        url,
                        content,
                        encrypted_content,
                        fingerprint,
                        created_at,
                        sensitive_flag,
                    }
                },
            )
            .collect();
        Ok(records)
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collected_data")
            .fetch_one(&self.pool)
            .await?;

        let urls: Vec<(String,)> = sqlx::query_as("SELECT url FROM collected_data")
            .fetch_all(&self.pool)
            .await?;
        let domains: HashSet<String> = urls
            .iter()
            .filter_map(|(u,)| url::Url::parse(u).ok())
            .filter_map(|u| u.host_str().map(str::to_string))
            .collect();

        let last: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT created_at FROM collected_data ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(StoreStats {
            total: total.max(0) as usize,
            domains: domains.len(),
            last_updated: last.map(|(t,)| t),
        })
    }

    pub async fn recent_scans(&self, limit: usize) -> Result<Vec<ScanRecord>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(i64, DateTime<Utc>, DateTime<Utc>, i64, String)> = sqlx::query_as(
            "SELECT id, scan_start, scan_end, items_collected, domains_scanned
             FROM scan_metadata ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, scan_start, scan_end, items_collected, domains)| ScanRecord {
                id,
                scan_start,
                scan_end,
                items_collected,
                domains_scanned: serde_json::from_str(&domains).unwrap_or_default(),
            })
            .collect())
    }

    /// Decrypts every record and writes it to `path`. Returns the record count.
    pub async fn export(&self, format: ExportFormat, path: &Path) -> Result<usize, ExportError> {
        let records = self.load(usize::MAX, true).await?;
        export_records(&records, format, path)
    }

    /// Destroys the database (and any journal sidecars) and then the key.
    /// Every file is overwritten with random bytes and synced before it is
    /// unlinked. Consumes the store; open a new one to start over.
    pub async fn wipe(self) -> Result<(), WipeError> {
        self.pool.close().await;

        let mut targets = vec![self.db_path.clone()];
        for suffix in SIDECAR_SUFFIXES {
            let mut name = self.db_path.clone().into_os_string();
            name.push(suffix);
            targets.push(PathBuf::from(name));
        }
        // Key last, once no ciphertext is left on disk.
        targets.push(self.key_path.clone());

        let shredded = tokio::task::spawn_blocking(move || -> Result<usize, WipeError> {
            let mut count = 0;
            for path in &targets {
                if path.exists() {
                    shred_file(path)?;
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
        .map_err(|e| WipeError::Io {
            path: self.db_path.clone(),
            source: std::io::Error::other(e),
        })??;

        warn!(files = shredded, path = %self.db_path.display(), "all collected data wiped");
        Ok(())
    }
}

fn shred_file(path: &Path) -> Result<(), WipeError> {
    let io_err = |source: std::io::Error| WipeError::Io {
        path: path.to_path_buf(),
        source,
    };

    let len = fs::metadata(path).map_err(io_err)?.len();
    let mut file = fs::OpenOptions::new().write(true).open(path).map_err(io_err)?;
    file.seek(SeekFrom::Start(0)).map_err(io_err)?;

    let mut rng = rand::thread_rng();
    let mut chunk = vec![0u8; 64 * 1024];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(chunk.len() as u64) as usize;
        rng.fill_bytes(&mut chunk[..n]);
        file.write_all(&chunk[..n]).map_err(io_err)?;
        remaining -= n as u64;
    }
    file.sync_all().map_err(io_err)?;
    drop(file);

    fs::remove_file(path).map_err(io_err)?;
    debug!(path = %path.display(), bytes = len, "shredded");
    Ok(())
}
