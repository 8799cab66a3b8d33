use rusqlite::{Connection, OptionalExtension};

use super::{Backend, Document, Fields};
use crate::error::Result;

pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            [],
        )?;
        Ok(SqliteBackend { conn })
    }
}

impl Backend for SqliteBackend {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fields FROM documents WHERE collection = ?1 AND id = ?2")?;
        let fields: Option<String> = stmt
            .query_row((collection, id), |row| row.get(0))
            .optional()?;
        match fields {
            Some(json) => Ok(Some(Document {
                id: id.to_string(),
                fields: serde_json::from_str::<Fields>(&json)?,
            })),
            None => Ok(None),
        }
    }

    fn put(&mut self, collection: &str, doc: &Document) -> Result<()> {
        let json = serde_json::to_string(&doc.fields)?;
        self.conn.execute(
            "INSERT INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO UPDATE SET fields = excluded.fields",
            (collection, &doc.id, &json),
        )?;
        Ok(())
    }

    fn scan(&self, collection: &str) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, json) = row?;
            docs.push(Document {
                id,
                fields: serde_json::from_str(&json)?,
            });
        }
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup_in_memory_db() -> SqliteBackend {
        SqliteBackend::open(":memory:").unwrap()
    }

    fn doc(id: &str, fields: serde_json::Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap(),
        }
    }

    #[test]
    fn test_put_and_get_document() {
        let mut backend = setup_in_memory_db();
        let kitchen = doc("seller-1", json!({"kitchenName": "Amma's Kitchen"}));
        backend.put("kitchens", &kitchen).unwrap();

        let retrieved = backend.get("kitchens", "seller-1").unwrap().unwrap();
        assert_eq!(retrieved, kitchen);
    }

    #[test]
    fn test_put_replaces_existing() {
        let mut backend = setup_in_memory_db();
        backend.put("order", &doc("o1", json!({"OrderStatus": "Pending"}))).unwrap();
        backend.put("order", &doc("o1", json!({"OrderStatus": "Process"}))).unwrap();

        let docs = backend.scan("order").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("OrderStatus"), Some(&json!("Process")));
    }

    #[test]
    fn test_get_nonexistent_document() {
        let backend = setup_in_memory_db();
        assert!(backend.get("kitchens", "nobody").unwrap().is_none());
    }

    #[test]
    fn test_scan_is_scoped_to_collection() {
        let mut backend = setup_in_memory_db();
        backend.put("chats", &doc("t1", json!({"users": ["a", "b"]}))).unwrap();
        backend.put("chats/t1/messages", &doc("m1", json!({"text": "hi"}))).unwrap();

        let chats = backend.scan("chats").unwrap();
        assert_eq!(chats.len(), 1);
        assert_eq!(chats[0].id, "t1");
    }

    #[test]
    fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("market.db");
        let path = path.to_str().unwrap();
        {
            let mut backend = SqliteBackend::open(path).unwrap();
            backend.put("kitchens", &doc("s1", json!({"kitchenName": "Dosa Hut"}))).unwrap();
        }
        let backend = SqliteBackend::open(path).unwrap();
        let kitchen = backend.get("kitchens", "s1").unwrap().unwrap();
        assert_eq!(kitchen.get("kitchenName"), Some(&json!("Dosa Hut")));
    }
}
