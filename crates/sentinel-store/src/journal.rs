//! JSON Lines journal store.
//!
//! Every mutation is appended as one JSON object per line:
//!
//! ```text
//! {"op":"seq","next_id":7}
//! {"op":"create","alert":{"id":5,"email":"a@x.com","targetPrice":"50000.5",...}}
//! {"op":"delete","id":5}
//! ```
//!
//! Opening the store replays the journal and rewrites it compacted (one
//! `create` per live alert, preceded by the ID sequence). A line that fails
//! to parse is skipped, so an interrupted write only loses that line.
//!
//! Target prices are journaled as decimal strings so they replay exactly.

use crate::error::StoreResult;
use crate::store::{AlertStore, AlertTable};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sentinel_core::{Alert, AlertId, Direction, NewAlert, Price, Symbol};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum JournalRecord {
    Seq { next_id: u64 },
    Create { alert: JournaledAlert },
    Delete { id: AlertId },
}

/// Journal form of an `Alert`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JournaledAlert {
    id: AlertId,
    email: String,
    symbol: Symbol,
    #[serde(with = "rust_decimal::serde::str")]
    target_price: Decimal,
    direction: Direction,
    created_at: DateTime<Utc>,
}

impl From<Alert> for JournaledAlert {
    fn from(alert: Alert) -> Self {
        Self {
            id: alert.id,
            email: alert.email,
            symbol: alert.symbol,
            target_price: alert.target_price.inner(),
            direction: alert.direction,
            created_at: alert.created_at,
        }
    }
}

impl From<JournaledAlert> for Alert {
    fn from(stored: JournaledAlert) -> Self {
        Self {
            id: stored.id,
            email: stored.email,
            symbol: stored.symbol,
            target_price: Price::new(stored.target_price),
            direction: stored.direction,
            created_at: stored.created_at,
        }
    }
}

struct JournalInner {
    table: AlertTable,
    writer: BufWriter<File>,
}

impl JournalInner {
    fn append(&mut self, record: &JournalRecord) -> StoreResult<()> {
        let json = serde_json::to_string(record)?;
        writeln!(self.writer, "{json}")?;
        // Durable before the caller observes the change.
        self.writer.flush()?;
        Ok(())
    }
}

/// Append-only journal store.
pub struct JournalStore {
    path: PathBuf,
    inner: Mutex<JournalInner>,
}

impl JournalStore {
    /// Open (or initialize) the journal at `path`.
    ///
    /// Creates parent directories and the file if missing.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let table = if path.exists() {
            replay(&path)?
        } else {
            info!(path = %path.display(), "Initializing new alert journal");
            AlertTable::default()
        };

        compact(&path, &table)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(
            path = %path.display(),
            alerts = table.all().len(),
            next_id = table.next_id(),
            "Alert journal opened"
        );

        Ok(Self {
            path,
            inner: Mutex::new(JournalInner {
                table,
                writer: BufWriter::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertStore for JournalStore {
    fn create(&self, new: NewAlert) -> StoreResult<Alert> {
        let mut inner = self.inner.lock();
        let alert = inner.table.prepare(new)?;
        inner.append(&JournalRecord::Create {
            alert: alert.clone().into(),
        })?;
        inner.table.insert(alert.clone());
        debug!(alert_id = %alert.id, symbol = %alert.symbol, "Alert journaled");
        Ok(alert)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Vec<Alert>> {
        Ok(self.inner.lock().table.by_email(email))
    }

    fn find_by_id(&self, id: AlertId) -> StoreResult<Option<Alert>> {
        Ok(self.inner.lock().table.get(id))
    }

    fn delete(&self, id: AlertId) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        if !inner.table.contains(id) {
            return Ok(false);
        }
        inner.append(&JournalRecord::Delete { id })?;
        inner.table.remove(id);
        debug!(alert_id = %id, "Alert deletion journaled");
        Ok(true)
    }

    fn load_all(&self) -> StoreResult<Vec<Alert>> {
        Ok(self.inner.lock().table.all())
    }
}

fn replay(path: &Path) -> StoreResult<AlertTable> {
    let reader = BufReader::new(File::open(path)?);
    let mut table = AlertTable::default();
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(&line) {
            Ok(JournalRecord::Seq { next_id }) => table.observe_id(next_id),
            Ok(JournalRecord::Create { alert }) => table.insert(alert.into()),
            Ok(JournalRecord::Delete { id }) => {
                table.remove(id);
            }
            Err(e) => {
                skipped += 1;
                warn!(line = line_no + 1, error = %e, "Skipping corrupt journal line");
            }
        }
    }

    if skipped > 0 {
        warn!(skipped, path = %path.display(), "Journal replay skipped corrupt lines");
    }
    Ok(table)
}

/// Rewrite the journal as the minimal record set for `table`.
fn compact(path: &Path, table: &AlertTable) -> StoreResult<()> {
    let tmp = path.with_extension("compact.tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        let seq = JournalRecord::Seq {
            next_id: table.next_id(),
        };
        writeln!(writer, "{}", serde_json::to_string(&seq)?)?;
        for alert in table.all() {
            writeln!(
                writer,
                "{}",
                serde_json::to_string(&JournalRecord::Create {
                    alert: alert.into()
                })?
            )?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
