//! File-backed document store.
//!
//! ## Storage layout
//!
//! ```text
//! <root>/
//!   <collection>/
//!     <s1>/
//!       <s2>/
//!         <id>/
//!           document.json
//! ```
//!
//! where `s1` and `s2` are the first four characters of the document id. Writes land in a
//! temporary file that is renamed over `document.json`, so readers observe either the old
//! or the new document and a failed write never leaves a partial one behind.

use super::{
    Document, DocumentStore, ServerClock, StoreError, StoreResult, StoredDocument, Write,
};
use crate::constants::{DOCUMENT_FILENAME, DOCUMENT_TMP_FILENAME};
use crate::uuid::DocumentId;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Reverse;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

const MAX_ID_ALLOCATION_ATTEMPTS: usize = 5;

/// Document store persisting JSON files under a root directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
    clock: ServerClock,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
            clock: ServerClock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> StoreResult<PathBuf> {
        let valid = !collection.is_empty()
            && collection
                .bytes()
                .all(|b| matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_'));
        if !valid {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(self.root.join(collection))
    }

    fn document_dir(&self, collection: &str, id: &DocumentId) -> StoreResult<PathBuf> {
        Ok(id.sharded_dir(&self.collection_dir(collection)?))
    }

    async fn read_document(path: &Path) -> StoreResult<Option<Document>> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Object(fields)) => Ok(Some(fields)),
            Ok(_) => Err(StoreError::NotAnObject),
            Err(source) => Err(StoreError::Deserialization {
                id: path.display().to_string(),
                source,
            }),
        }
    }

    async fn write_document(dir: &Path, fields: &Document) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(fields).map_err(StoreError::Serialization)?;
        fs::create_dir_all(dir).await?;

        let tmp_path = dir.join(DOCUMENT_TMP_FILENAME);
        fs::write(&tmp_path, &body).await?;
        if let Err(e) = fs::rename(&tmp_path, dir.join(DOCUMENT_FILENAME)).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    fn not_found(collection: &str, id: &DocumentId) -> StoreError {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Lists the document directories of a collection: `<collection>/<s1>/<s2>/<id>/`.
    async fn document_dirs(collection_dir: &Path) -> StoreResult<Vec<PathBuf>> {
        let mut dirs = Vec::new();

        let mut s1_iter = match fs::read_dir(collection_dir).await {
            Ok(it) => it,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(StoreError::Io(e)),
        };
        while let Some(s1) = s1_iter.next_entry().await? {
            if !s1.file_type().await?.is_dir() {
                continue;
            }
            let mut s2_iter = fs::read_dir(s1.path()).await?;
            while let Some(s2) = s2_iter.next_entry().await? {
                if !s2.file_type().await?.is_dir() {
                    continue;
                }
                let mut id_iter = fs::read_dir(s2.path()).await?;
                while let Some(id_ent) = id_iter.next_entry().await? {
                    if id_ent.file_type().await?.is_dir() {
                        dirs.push(id_ent.path());
                    }
                }
            }
        }

        Ok(dirs)
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn create(&self, collection: &str, write: Write) -> StoreResult<String> {
        let _guard = self.write_lock.lock().await;

        // Guard against id collisions or directories left behind by external interference.
        let mut allocated = None;
        for _attempt in 0..MAX_ID_ALLOCATION_ATTEMPTS {
            let id = DocumentId::new();
            let dir = self.document_dir(collection, &id)?;
            if !fs::try_exists(&dir).await? {
                allocated = Some((id, dir));
                break;
            }
        }
        let (id, dir) = allocated.ok_or_else(|| {
            StoreError::Unavailable(format!(
                "could not allocate a document id in '{collection}'"
            ))
        })?;

        let fields = write.resolve(self.clock.now());
        Self::write_document(&dir, &fields).await?;

        tracing::debug!(collection, id = %id, "document created");
        Ok(id.to_string())
    }

    async fn set(&self, collection: &str, id: &str, write: Write) -> StoreResult<()> {
        let id = DocumentId::parse(id)?;
        let dir = self.document_dir(collection, &id)?;

        let _guard = self.write_lock.lock().await;
        let fields = write.resolve(self.clock.now());
        Self::write_document(&dir, &fields).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<StoredDocument>> {
        let id = DocumentId::parse(id)?;
        let dir = self.document_dir(collection, &id)?;

        Ok(Self::read_document(&dir.join(DOCUMENT_FILENAME))
            .await?
            .map(|fields| StoredDocument {
                id: id.to_string(),
                fields,
            }))
    }

    async fn update(&self, collection: &str, id: &str, write: Write) -> StoreResult<()> {
        let id = DocumentId::parse(id)?;
        let dir = self.document_dir(collection, &id)?;

        let _guard = self.write_lock.lock().await;
        let mut fields = Self::read_document(&dir.join(DOCUMENT_FILENAME))
            .await?
            .ok_or_else(|| Self::not_found(collection, &id))?;
        fields.extend(write.resolve(self.clock.now()));
        Self::write_document(&dir, &fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let id = DocumentId::parse(id)?;
        let dir = self.document_dir(collection, &id)?;

        let _guard = self.write_lock.lock().await;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Self::not_found(collection, &id)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn query_eq_desc(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        order_by: &str,
    ) -> StoreResult<Vec<StoredDocument>> {
        let collection_dir = self.collection_dir(collection)?;
        let mut matches = Vec::new();

        for dir in Self::document_dirs(&collection_dir).await? {
            let Some(id) = dir.file_name().and_then(|os| os.to_str()).map(str::to_string)
            else {
                continue;
            };
            let fields = match Self::read_document(&dir.join(DOCUMENT_FILENAME)).await {
                Ok(Some(fields)) => fields,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("skipping unreadable document {}: {}", dir.display(), e);
                    continue;
                }
            };
            if fields.get(field).and_then(Value::as_str) == Some(value) {
                matches.push(StoredDocument { id, fields });
            }
        }

        matches.sort_by_key(|doc| Reverse(doc.timestamp(order_by)));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn fields(pairs: &[(&str, Value)]) -> Write {
        let mut doc = Document::new();
        for (k, v) in pairs {
            doc.insert((*k).to_string(), v.clone());
        }
        Write::new(doc)
    }

    #[tokio::test]
    async fn test_create_then_get_returns_document() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::new(temp_dir.path());

        let id = store
            .create(
                "patients",
                fields(&[("name", json!("John Doe"))]).with_server_timestamp("createdAt"),
            )
            .await
            .expect("create should succeed");

        let doc = store
            .get("patients", &id)
            .await
            .expect("get should succeed")
            .expect("document should exist");
        assert_eq!(doc.id, id);
        assert_eq!(doc.fields["name"], json!("John Doe"));
        assert!(doc.timestamp("createdAt").is_some());

        let on_disk = DocumentId::parse(&id)
            .unwrap()
            .sharded_dir(&temp_dir.path().join("patients"))
            .join(DOCUMENT_FILENAME);
        assert!(on_disk.is_file(), "document.json should exist in sharded dir");
    }

    #[tokio::test]
    async fn test_get_missing_document_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let missing = DocumentId::new();

        assert!(store.get("patients", missing.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let id = store
            .create(
                "patients",
                fields(&[("name", json!("Jane")), ("age", json!(40))]),
            )
            .await
            .unwrap();

        store
            .update("patients", &id, fields(&[("age", json!(41))]))
            .await
            .unwrap();

        let doc = store.get("patients", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("Jane"));
        assert_eq!(doc.fields["age"], json!(41));
    }

    #[tokio::test]
    async fn test_update_missing_document_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let missing = DocumentId::new();

        let err = store
            .update("patients", missing.as_str(), fields(&[("age", json!(1))]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());
        let id = store
            .create("patients", fields(&[("name", json!("Jane"))]))
            .await
            .unwrap();

        store.delete("patients", &id).await.unwrap();

        assert!(store.get("patients", &id).await.unwrap().is_none());
        assert!(matches!(
            store.delete("patients", &id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_filters_and_orders_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let mut created = Vec::new();
        for name in ["first", "second", "third"] {
            let id = store
                .create(
                    "patients",
                    fields(&[("doctorId", json!("doc-a")), ("name", json!(name))])
                        .with_server_timestamp("createdAt"),
                )
                .await
                .unwrap();
            created.push(id);
        }
        store
            .create(
                "patients",
                fields(&[("doctorId", json!("doc-b")), ("name", json!("other"))])
                    .with_server_timestamp("createdAt"),
            )
            .await
            .unwrap();

        let docs = store
            .query_eq_desc("patients", "doctorId", "doc-a", "createdAt")
            .await
            .unwrap();

        let names: Vec<_> = docs
            .iter()
            .map(|d| d.fields["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_query_on_empty_collection_returns_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let docs = store
            .query_eq_desc("patients", "doctorId", "doc-a", "createdAt")
            .await
            .unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_collection_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        let err = store
            .create("../escape", fields(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidCollection(_)));
    }

    #[tokio::test]
    async fn test_set_uses_caller_supplied_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path());

        store
            .set("doctors", "uid-Xk3fQ9aB", fields(&[("name", json!("Doctor"))]))
            .await
            .unwrap();

        let doc = store.get("doctors", "uid-Xk3fQ9aB").await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("Doctor"));
    }
}
