//! Evidence storage: vault metadata, items and custody events.
//!
//! Records are stored as JSON payloads next to the key columns the queries
//! need. The store is always passed explicitly; append serialization per
//! item falls out of exclusive (`&mut`) access, which is the single-writer
//! assumption the custody chain depends on.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{CustodyEvent, EvidenceItem, VaultMeta, PRIMARY_VAULT_ID};

pub trait EvidenceStore {
    fn vault_meta(&self) -> Result<Option<VaultMeta>>;

    fn put_vault_meta(&mut self, meta: &VaultMeta) -> Result<()>;

    /// Persist the learned signing public key back into the vault metadata.
    fn set_signing_public_key(&mut self, public_key: &str, updated_at: i64) -> Result<()>;

    /// Insert or replace an item. Replacement is how a redacted copy is
    /// saved; the original encrypted blob inside the payload is not touched
    /// by the store.
    fn put_item(&mut self, item: &EvidenceItem) -> Result<()>;

    fn item(&self, id: &str) -> Result<Option<EvidenceItem>>;

    fn items(&self) -> Result<Vec<EvidenceItem>>;

    /// Remove an item record. Its custody events are retained; the chain
    /// outlives the evidence it describes.
    fn delete_item(&mut self, id: &str) -> Result<()>;

    fn add_custody_event(&mut self, event: &CustodyEvent) -> Result<()>;

    /// All custody events for one item, ordered by `ts` (insertion order
    /// breaks ties).
    fn custody_events_for_item(&self, item_id: &str) -> Result<Vec<CustodyEvent>>;
}

pub struct SqliteEvidenceStore {
    conn: Connection,
}

impl SqliteEvidenceStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS vault_meta (
              id TEXT PRIMARY KEY,
              payload_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS evidence_items (
              id TEXT PRIMARY KEY,
              created_at INTEGER NOT NULL,
              payload_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS custody_events (
              id TEXT PRIMARY KEY,
              item_id TEXT NOT NULL,
              ts INTEGER NOT NULL,
              payload_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_created ON evidence_items(created_at);
            CREATE INDEX IF NOT EXISTS idx_custody_item_ts ON custody_events(item_id, ts);
            "#,
        )?;
        Ok(())
    }
}

impl EvidenceStore for SqliteEvidenceStore {
    fn vault_meta(&self) -> Result<Option<VaultMeta>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM vault_meta WHERE id = ?1",
                params![PRIMARY_VAULT_ID],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put_vault_meta(&mut self, meta: &VaultMeta) -> Result<()> {
        let payload_json = serde_json::to_string(meta)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO vault_meta(id, payload_json) VALUES (?1, ?2)",
            params![meta.id, payload_json],
        )?;
        Ok(())
    }

    fn set_signing_public_key(&mut self, public_key: &str, updated_at: i64) -> Result<()> {
        if let Some(mut meta) = self.vault_meta()? {
            meta.signing_public_key = Some(public_key.to_string());
            meta.updated_at = updated_at;
            self.put_vault_meta(&meta)?;
        }
        Ok(())
    }

    fn put_item(&mut self, item: &EvidenceItem) -> Result<()> {
        let payload_json = serde_json::to_string(item)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO evidence_items(id, created_at, payload_json) VALUES (?1, ?2, ?3)",
            params![item.id, item.created_at, payload_json],
        )?;
        Ok(())
    }

    fn item(&self, id: &str) -> Result<Option<EvidenceItem>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload_json FROM evidence_items WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn items(&self) -> Result<Vec<EvidenceItem>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload_json FROM evidence_items ORDER BY created_at ASC, id ASC")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            out.push(serde_json::from_str(&payload)?);
        }
        Ok(out)
    }

    fn delete_item(&mut self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM evidence_items WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn add_custody_event(&mut self, event: &CustodyEvent) -> Result<()> {
        let payload_json = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO custody_events(id, item_id, ts, payload_json) VALUES (?1, ?2, ?3, ?4)",
            params![event.id, event.item_id, event.ts, payload_json],
        )?;
        Ok(())
    }

    fn custody_events_for_item(&self, item_id: &str) -> Result<Vec<CustodyEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json FROM custody_events WHERE item_id = ?1 ORDER BY ts ASC, rowid ASC",
        )?;
        let mut rows = stmt.query(params![item_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            out.push(serde_json::from_str(&payload)?);
        }
        Ok(out)
    }
}

/// Heap-backed store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    meta: Option<VaultMeta>,
    items: Vec<EvidenceItem>,
    events: Vec<CustodyEvent>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn vault_meta(&self) -> Result<Option<VaultMeta>> {
        Ok(self.meta.clone())
    }

    fn put_vault_meta(&mut self, meta: &VaultMeta) -> Result<()> {
        self.meta = Some(meta.clone());
        Ok(())
    }

    fn set_signing_public_key(&mut self, public_key: &str, updated_at: i64) -> Result<()> {
        if let Some(meta) = self.meta.as_mut() {
            meta.signing_public_key = Some(public_key.to_string());
            meta.updated_at = updated_at;
        }
        Ok(())
    }

    fn put_item(&mut self, item: &EvidenceItem) -> Result<()> {
        if let Some(existing) = self.items.iter_mut().find(|i| i.id == item.id) {
            *existing = item.clone();
        } else {
            self.items.push(item.clone());
        }
        Ok(())
    }

    fn item(&self, id: &str) -> Result<Option<EvidenceItem>> {
        Ok(self.items.iter().find(|i| i.id == id).cloned())
    }

    fn items(&self) -> Result<Vec<EvidenceItem>> {
        Ok(self.items.clone())
    }

    fn delete_item(&mut self, id: &str) -> Result<()> {
        self.items.retain(|i| i.id != id);
        Ok(())
    }

    fn add_custody_event(&mut self, event: &CustodyEvent) -> Result<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn custody_events_for_item(&self, item_id: &str) -> Result<Vec<CustodyEvent>> {
        let mut out: Vec<CustodyEvent> = self
            .events
            .iter()
            .filter(|e| e.item_id == item_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.ts);
        Ok(out)
    }
}
