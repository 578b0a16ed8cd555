// SQLite-backed document store
//
// Documents are stored as JSON text in a single `documents` table, one row per
// document, tagged with their collection. Filters are evaluated over the
// decoded documents.
//
// Identity vs change detection:
// - (collection, doc_id) identifies a row; doc_id is the document's `_id`
//   (a UUID v4 is assigned when missing)
// - content_hash (SHA-256 of collection + body) tells an unchanged document
//   from an updated one, and identifies documents that arrive without `_id`

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{parse_dump, Document, DocumentStore, Filter};

/// Outcome of a snapshot import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    /// Same `_id`, changed content
    pub updated: usize,
    /// Unchanged since the last import
    pub duplicates: usize,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }

    /// Upsert documents into `collection`.
    ///
    /// A document with an `_id` replaces the stored row with the same id when
    /// its content changed. A document without one is matched by content hash
    /// and gets a fresh UUID when new.
    pub fn insert_documents(&self, collection: &str, docs: &[Document]) -> Result<ImportSummary> {
        let conn = self.connection()?;
        let mut summary = ImportSummary::default();

        for doc in docs {
            let hash = content_hash(collection, doc)?;

            match document_id(doc) {
                Some(doc_id) => {
                    let stored_hash: Option<String> = conn
                        .query_row(
                            "SELECT content_hash FROM documents WHERE collection = ?1 AND doc_id = ?2",
                            params![collection, doc_id],
                            |row| row.get(0),
                        )
                        .optional()?;

                    match stored_hash {
                        Some(stored) if stored == hash => {
                            summary.duplicates += 1;
                            continue;
                        }
                        Some(_) => summary.updated += 1,
                        None => summary.inserted += 1,
                    }

                    conn.execute(
                        "INSERT INTO documents (collection, doc_id, content_hash, body)
                         VALUES (?1, ?2, ?3, ?4)
                         ON CONFLICT(collection, doc_id) DO UPDATE SET
                             content_hash = excluded.content_hash,
                             body = excluded.body,
                             imported_at = CURRENT_TIMESTAMP",
                        params![collection, doc_id, hash, serde_json::to_string(doc)?],
                    )?;
                }
                None => {
                    let seen: Option<i64> = conn
                        .query_row(
                            "SELECT id FROM documents WHERE collection = ?1 AND content_hash = ?2",
                            params![collection, hash],
                            |row| row.get(0),
                        )
                        .optional()?;
                    if seen.is_some() {
                        summary.duplicates += 1;
                        continue;
                    }

                    let mut body = doc.clone();
                    let doc_id = assign_id(&mut body);
                    conn.execute(
                        "INSERT INTO documents (collection, doc_id, content_hash, body)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![collection, doc_id, hash, serde_json::to_string(&body)?],
                    )?;
                    summary.inserted += 1;
                }
            }
        }

        tracing::debug!(
            collection,
            inserted = summary.inserted,
            updated = summary.updated,
            duplicates = summary.duplicates,
            "documents imported"
        );

        Ok(summary)
    }

    /// Import a snapshot dump (JSON object keyed by collection name).
    pub fn import_dump(&self, json: &str) -> Result<ImportSummary> {
        let mut total = ImportSummary::default();
        for (collection, docs) in parse_dump(json)? {
            let summary = self.insert_documents(&collection, &docs)?;
            total.inserted += summary.inserted;
            total.updated += summary.updated;
            total.duplicates += summary.duplicates;
        }
        Ok(total)
    }

    pub fn import_dump_file(&self, path: &Path) -> Result<ImportSummary> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot dump {}", path.display()))?;
        self.import_dump(&json)
    }

    /// Total documents stored in `collection`.
    pub fn count_documents(&self, collection: &str) -> Result<u64> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn scan(&self, collection: &str, filter: &Filter, limit: Option<usize>) -> Result<Vec<Document>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare_cached(
            "SELECT body FROM documents WHERE collection = ?1 ORDER BY id",
        )?;

        let mut rows = stmt.query([collection])?;
        let mut matched = Vec::new();

        while let Some(row) = rows.next()? {
            let body: String = row.get(0)?;
            let doc: Document = serde_json::from_str(&body)
                .with_context(|| format!("Corrupt document body in '{}'", collection))?;

            if filter.matches(&doc) {
                matched.push(doc);
                if limit.map_or(false, |limit| matched.len() >= limit) {
                    break;
                }
            }
        }

        Ok(matched)
    }
}

impl DocumentStore for SqliteStore {
    fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.scan(collection, filter, None)
    }

    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.scan(collection, filter, Some(1))?.into_iter().next())
    }
}

fn setup_database(conn: &Connection) -> Result<()> {
    // WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            body TEXT NOT NULL,
            imported_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(collection, doc_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(collection, content_hash)",
        [],
    )?;

    Ok(())
}

fn content_hash(collection: &str, doc: &Document) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(b"\n");
    hasher.update(serde_json::to_string(doc)?.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// The document's `_id` as a string, if it has a usable one.
fn document_id(doc: &Document) -> Option<String> {
    match doc.get("_id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Give an id-less document a UUID `_id` and return it.
fn assign_id(doc: &mut Document) -> String {
    let id = uuid::Uuid::new_v4().to_string();
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("_id".to_string(), Value::String(id.clone()));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DUMP: &str = r#"{
        "merchants": [
            { "_id": { "$oid": "m-a" }, "name": "GymA" },
            { "_id": { "$oid": "m-b" }, "name": "GymB" }
        ],
        "boletas": [
            { "merchant_id": "m-a", "status": "approved", "charges_detail": { "final_price": 1000 } }
        ]
    }"#;

    #[test]
    fn test_idempotency_import_twice() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store.import_dump(DUMP).unwrap();
        let second = store.import_dump(DUMP).unwrap();

        assert_eq!(first.inserted, 3, "First import should insert 3 documents");
        assert_eq!(first.duplicates, 0);
        assert_eq!(second.inserted, 0, "Second import should insert nothing");
        assert_eq!(second.updated, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(store.count_documents("merchants").unwrap(), 2);
        assert_eq!(store.count_documents("boletas").unwrap(), 1);
    }

    const MEMBERS_V1: &str = r#"{
        "merchants": [{ "_id": "m-a", "name": "GymA" }],
        "planes": [{ "_id": "p1", "merchant_id": "m-a", "cobro": "Mensual" }],
        "clientes": [
            { "_id": "c1", "history": [
                { "event": "alta", "date_created": "2023-03-05T00:00:00", "plan": "p1" }
            ] }
        ],
        "boletas": [
            { "_id": "r1", "merchant_id": "m-a", "plan_id": "p1", "source": "checkout",
              "status": "approved", "date_created": "2023-03-05T00:00:00",
              "charges_detail": { "final_price": 1000 } }
        ]
    }"#;

    const MEMBERS_V2: &str = r#"{
        "merchants": [{ "_id": "m-a", "name": "GymA" }],
        "planes": [{ "_id": "p1", "merchant_id": "m-a", "cobro": "Mensual" }],
        "clientes": [
            { "_id": "c1", "history": [
                { "event": "alta", "date_created": "2023-03-05T00:00:00", "plan": "p1" },
                { "event": "baja", "date_created": "2023-03-20T00:00:00", "plan": "p1" }
            ] }
        ],
        "boletas": [
            { "_id": "r1", "merchant_id": "m-a", "plan_id": "p1", "source": "checkout",
              "status": "approved", "date_created": "2023-03-05T00:00:00",
              "charges_detail": { "final_price": 1200 } }
        ]
    }"#;

    #[test]
    fn test_reimport_replaces_changed_documents() {
        use crate::calendar::Month;
        use crate::entities::MerchantId;
        use crate::lifecycle::{LifecycleAggregator, LifecycleKind};
        use crate::payments::{PaymentAggregator, PaymentCategory};
        use std::sync::Arc;

        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.import_dump(MEMBERS_V1).unwrap();

        let second = store.import_dump(MEMBERS_V2).unwrap();
        assert_eq!(second.inserted, 0, "No new ids in the second dump");
        assert_eq!(second.updated, 2, "Member c1 and receipt r1 changed");
        assert_eq!(second.duplicates, 2);

        assert_eq!(store.count_documents("clientes").unwrap(), 1, "One row per _id");
        assert_eq!(store.count_documents("boletas").unwrap(), 1);

        let member = store.find_one("clientes", &Filter::eq("_id", "c1")).unwrap().unwrap();
        assert_eq!(member["history"].as_array().unwrap().len(), 2);

        let gym_a = MerchantId::new("m-a");
        let march = Month::parse("03-2023").unwrap();
        let lifecycle = LifecycleAggregator::new(store.clone());
        assert_eq!(lifecycle.count(&gym_a, march, LifecycleKind::Active).unwrap(), 1);
        assert_eq!(lifecycle.count(&gym_a, march, LifecycleKind::Cancelled).unwrap(), 1);

        let payments = PaymentAggregator::new(store.clone());
        assert_eq!(
            payments.sum_amount(&gym_a, march, PaymentCategory::NewSignup).unwrap(),
            1200,
            "Updated amount replaces the old one"
        );

        // Importing v2 again changes nothing
        let third = store.import_dump(MEMBERS_V2).unwrap();
        assert_eq!((third.inserted, third.updated, third.duplicates), (0, 0, 4));
    }

    #[test]
    fn test_missing_id_gets_uuid() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.import_dump(DUMP).unwrap();

        let receipt = store.find_one("boletas", &Filter::All).unwrap().unwrap();
        let id = receipt["_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok(), "assigned id should be a UUID: {}", id);
    }

    #[test]
    fn test_find_filters_documents() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_documents(
                "planes",
                &[
                    json!({ "_id": "p1", "merchant_id": "m-a", "cobro": "Mensual" }),
                    json!({ "_id": "p2", "merchant_id": "m-a", "cobro": "Anual" }),
                    json!({ "_id": "p3", "merchant_id": "m-b", "cobro": "Mensual" }),
                ],
            )
            .unwrap();

        let plans = store.find("planes", &Filter::eq("merchant_id", "m-a")).unwrap();
        let ids: Vec<&str> = plans.iter().map(|p| p["_id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);

        assert_eq!(store.count("planes", &Filter::eq("cobro", "Mensual")).unwrap(), 2);
        assert!(store.find_one("planes", &Filter::eq("_id", "p9")).unwrap().is_none());
        assert!(store.find("clientes", &Filter::All).unwrap().is_empty());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let doc = json!({ "b": 2, "a": 1 });
        let hash1 = content_hash("planes", &doc).unwrap();
        let hash2 = content_hash("planes", &json!({ "a": 1, "b": 2 })).unwrap();
        assert_eq!(hash1, hash2, "key order should not change the hash");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
        assert_ne!(hash1, content_hash("boletas", &doc).unwrap());
    }
}
