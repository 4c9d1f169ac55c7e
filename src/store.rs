use crate::document::DocumentRecord;
use rusqlite::types::Type;
use rusqlite::{Connection, Result as SqliteResult, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

/// SQLite-backed document store. One row per extracted document; the
/// field mapping and embedding travel as JSON text.
pub struct DocumentStore {
    conn: Connection,
}

impl DocumentStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                doc_type TEXT NOT NULL,
                fields TEXT NOT NULL,
                embedding TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_doc_type ON documents(doc_type)",
            [],
        )?;

        info!("Document store initialized");
        Ok(Self { conn })
    }

    /// Stable storage key for a document extracted from `source`.
    pub fn generate_id(source: &str, doc_type: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        hasher.update(doc_type.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Insert or update a document; returns its storage key.
    pub fn save_document(&self, doc: &DocumentRecord) -> SqliteResult<String> {
        let fields_json = serde_json::to_string(&doc.fields).map_err(json_to_sql_error)?;
        let embedding_json = doc
            .embedding
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(json_to_sql_error)?;

        self.conn.execute(
            "INSERT INTO documents (id, doc_type, fields, embedding)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                doc_type = excluded.doc_type,
                fields = excluded.fields,
                embedding = excluded.embedding",
            params![doc.id, doc.doc_type, fields_json, embedding_json],
        )?;
        info!(id = %doc.id, doc_type = %doc.doc_type, "Document stored");
        Ok(doc.id.clone())
    }

    /// Fetch documents, optionally restricted to one extraction type.
    /// `None` means every document in the store.
    pub fn get_documents(&self, doc_type: Option<&str>) -> SqliteResult<Vec<DocumentRecord>> {
        match doc_type {
            Some(doc_type) => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, doc_type, fields, embedding
                     FROM documents
                     WHERE doc_type = ?1
                     ORDER BY created_at",
                )?;
                let rows = stmt.query_map(params![doc_type], Self::row_to_document)?;
                rows.collect()
            }
            None => {
                let mut stmt = self.conn.prepare(
                    "SELECT id, doc_type, fields, embedding
                     FROM documents
                     ORDER BY created_at",
                )?;
                let rows = stmt.query_map([], Self::row_to_document)?;
                rows.collect()
            }
        }
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let fields_json: String = row.get(2)?;
        let fields = serde_json::from_str(&fields_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        let embedding_json: Option<String> = row.get(3)?;
        let embedding = embedding_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;

        Ok(DocumentRecord {
            id: row.get(0)?,
            doc_type: row.get(1)?,
            fields,
            embedding,
        })
    }

    /// (total documents, documents carrying an embedding)
    pub fn get_counts(&self) -> SqliteResult<(usize, usize)> {
        let total: usize =
            self.conn
                .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        let embedded: usize = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok((total, embedded))
    }
}

fn json_to_sql_error(e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_doc(id: &str) -> DocumentRecord {
        DocumentRecord::new(
            id,
            "leminar_invoice",
            json!({ "Invoice number": "LACO-39", "Total weight": 500 })
                .as_object()
                .unwrap()
                .clone(),
        )
    }

    #[test]
    fn test_id_generation() {
        let id1 = DocumentStore::generate_id("invoice.pdf", "leminar_invoice");
        let id2 = DocumentStore::generate_id("invoice.pdf", "leminar_invoice");
        let id3 = DocumentStore::generate_id("invoice.pdf", "customs_declaration");

        assert_eq!(id1, id2); // Same inputs = same hash
        assert_ne!(id1, id3); // Different inputs = different hash
    }

    #[test]
    fn save_and_fetch_round_trip() {
        let store = DocumentStore::new(":memory:").unwrap();
        let mut doc = sample_doc("doc-1");
        doc.embedding = Some(vec![0.1, 0.2, 0.3]);
        store.save_document(&doc).unwrap();

        let fetched = store.get_documents(None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, "doc-1");
        assert_eq!(fetched[0].fields, doc.fields);
        assert_eq!(fetched[0].embedding, Some(vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn save_is_an_upsert() {
        let store = DocumentStore::new(":memory:").unwrap();
        store.save_document(&sample_doc("doc-1")).unwrap();

        let mut updated = sample_doc("doc-1");
        updated
            .fields
            .insert("CRN No.".to_string(), json!("319303"));
        store.save_document(&updated).unwrap();

        let fetched = store.get_documents(None).unwrap();
        assert_eq!(fetched.len(), 1);
        assert!(fetched[0].fields.contains_key("CRN No."));
    }

    #[test]
    fn type_filter_restricts_results() {
        let store = DocumentStore::new(":memory:").unwrap();
        store.save_document(&sample_doc("doc-1")).unwrap();
        let mut dec = sample_doc("doc-2");
        dec.doc_type = "customs_declaration".to_string();
        store.save_document(&dec).unwrap();

        let invoices = store.get_documents(Some("leminar_invoice")).unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].id, "doc-1");

        let (total, embedded) = store.get_counts().unwrap();
        assert_eq!(total, 2);
        assert_eq!(embedded, 0);
    }
}
