//! Relational store for users, tags and links
//!
//! All operations are scoped to a single owner; no query ever spans
//! owners. Multi-row writes (rename, cascade delete) run inside one
//! transaction so a link's tag always matches an existing tag name
//! for its owner.

use crate::error::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// A stored link row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Link {
    /// Row id, used as the delete-link choice target
    pub id: i64,
    /// The stored URL
    pub url: String,
    /// Tag name the link is filed under
    pub tag: String,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

/// Outcome of a cascade tag deletion
#[derive(Debug, Clone, Copy)]
pub struct TagRemoval {
    /// Whether the tag row existed
    pub deleted: bool,
    /// Number of links removed with it
    pub removed_links: u64,
}

/// Database connection pool for TagIt storage
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (creating if missing) the database and apply migrations
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)
            .map_err(|e| Error::Config(format!("Invalid database path: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        tracing::info!("Connected to SQLite database at {}", db_path.display());

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Apply the embedded schema migration
    async fn run_migrations(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_create_tables.sql");

        // Strip comment lines and split on semicolons; sqlx executes one
        // statement per query.
        let cleaned: String = migration_sql
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("--"))
            .collect::<Vec<_>>()
            .join(" ");

        for statement in cleaned.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        tracing::debug!("Database migrations applied");
        Ok(())
    }

    /// Register an owner if not already present
    pub async fn upsert_user(
        &self,
        owner: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO users (id, username, first_name) VALUES (?, ?, ?)")
            .bind(owner)
            .bind(username)
            .bind(first_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List the owner's tag names in insertion order
    pub async fn list_tag_names(&self, owner: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM tags WHERE user_id = ? ORDER BY id")
                .bind(owner)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Create a tag if it does not exist; returns whether a new row was
    /// inserted. Duplicate creation is a no-op and never touches links.
    pub async fn upsert_tag(&self, owner: i64, name: &str) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO tags (user_id, name) VALUES (?, ?)")
            .bind(owner)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rename a tag and rewrite all links filed under it, atomically.
    /// Returns the number of links moved.
    pub async fn rename_tag(&self, owner: i64, old: &str, new: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let collision: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM tags WHERE user_id = ? AND name = ?")
                .bind(owner)
                .bind(new)
                .fetch_optional(&mut *tx)
                .await?;
        if collision.is_some() {
            return Err(Error::InvalidInput(format!("tag '{}' already exists", new)));
        }

        let renamed = sqlx::query("UPDATE tags SET name = ? WHERE user_id = ? AND name = ?")
            .bind(new)
            .bind(owner)
            .bind(old)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if renamed == 0 {
            return Err(Error::NotFound(format!("tag '{}'", old)));
        }

        let moved = sqlx::query("UPDATE links SET tag = ? WHERE user_id = ? AND tag = ?")
            .bind(new)
            .bind(owner)
            .bind(old)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        tracing::debug!(owner, old, new, moved, "Renamed tag");
        Ok(moved)
    }

    /// File a link under a tag; returns the new row id
    pub async fn insert_link(&self, owner: i64, url: &str, tag: &str) -> Result<i64> {
        let created_at = chrono::Utc::now().timestamp();
        let result =
            sqlx::query("INSERT INTO links (user_id, url, tag, created_at) VALUES (?, ?, ?, ?)")
                .bind(owner)
                .bind(url)
                .bind(tag)
                .bind(created_at)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// List the owner's links under a tag, oldest first
    pub async fn list_links(&self, owner: i64, tag: &str) -> Result<Vec<Link>> {
        let links = sqlx::query_as::<_, Link>(
            "SELECT id, url, tag, created_at FROM links WHERE user_id = ? AND tag = ? ORDER BY id",
        )
        .bind(owner)
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;
        Ok(links)
    }

    /// Delete a tag and every link filed under it, atomically
    pub async fn delete_tag(&self, owner: i64, name: &str) -> Result<TagRemoval> {
        let mut tx = self.pool.begin().await?;

        let removed_links = sqlx::query("DELETE FROM links WHERE user_id = ? AND tag = ?")
            .bind(owner)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query("DELETE FROM tags WHERE user_id = ? AND name = ?")
            .bind(owner)
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;

        tracing::debug!(owner, name, removed_links, "Deleted tag");
        Ok(TagRemoval {
            deleted,
            removed_links,
        })
    }

    /// Delete a single link by row id; owner-scoped.
    /// Returns whether a row was removed.
    pub async fn delete_link(&self, owner: i64, link_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM links WHERE id = ? AND user_id = ?")
            .bind(link_id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Total number of links the owner has stored
    pub async fn count_links(&self, owner: i64) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM links WHERE user_id = ?")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_storage() -> (Storage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::connect(&dir.path().join("test.db")).await.unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn test_upsert_user_idempotent() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, Some("alice"), Some("Alice")).await.unwrap();
        storage.upsert_user(1, Some("alice"), Some("Alice")).await.unwrap();
        // No error, no duplicate primary key
    }

    #[tokio::test]
    async fn test_upsert_tag_reports_new_vs_existing() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();

        assert!(storage.upsert_tag(1, "news").await.unwrap());
        assert!(!storage.upsert_tag(1, "news").await.unwrap());
        assert_eq!(storage.list_tag_names(1).await.unwrap(), vec!["news"]);
    }

    #[tokio::test]
    async fn test_duplicate_tag_keeps_links() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        storage.insert_link(1, "https://example.com", "news").await.unwrap();

        storage.upsert_tag(1, "news").await.unwrap();

        let links = storage.list_links(1, "news").await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com");
    }

    #[tokio::test]
    async fn test_tags_are_owner_scoped() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_user(2, None, None).await.unwrap();

        // Same name for two owners is two rows
        assert!(storage.upsert_tag(1, "news").await.unwrap());
        assert!(storage.upsert_tag(2, "news").await.unwrap());

        assert_eq!(storage.list_tag_names(1).await.unwrap().len(), 1);
        assert_eq!(storage.list_tag_names(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_moves_all_links() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        storage.upsert_tag(1, "tools").await.unwrap();
        storage.insert_link(1, "https://a.example", "news").await.unwrap();
        storage.insert_link(1, "https://b.example", "news").await.unwrap();
        storage.insert_link(1, "https://c.example", "tools").await.unwrap();

        let moved = storage.rename_tag(1, "news", "press").await.unwrap();
        assert_eq!(moved, 2);

        assert!(storage.list_links(1, "news").await.unwrap().is_empty());
        assert_eq!(storage.list_links(1, "press").await.unwrap().len(), 2);
        // Unrelated tag untouched
        assert_eq!(storage.list_links(1, "tools").await.unwrap().len(), 1);
        assert_eq!(
            storage.list_tag_names(1).await.unwrap(),
            vec!["press", "tools"]
        );
    }

    #[tokio::test]
    async fn test_rename_collision_changes_nothing() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        storage.upsert_tag(1, "tools").await.unwrap();
        storage.insert_link(1, "https://a.example", "news").await.unwrap();

        let err = storage.rename_tag(1, "news", "tools").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // Both tags still present, link still under the old name
        assert_eq!(
            storage.list_tag_names(1).await.unwrap(),
            vec!["news", "tools"]
        );
        assert_eq!(storage.list_links(1, "news").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rename_missing_tag_is_not_found() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();

        let err = storage.rename_tag(1, "ghost", "spirit").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_is_owner_scoped() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_user(2, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        storage.upsert_tag(2, "news").await.unwrap();
        storage.insert_link(2, "https://other.example", "news").await.unwrap();

        storage.rename_tag(1, "news", "press").await.unwrap();

        // Owner 2 keeps their tag and link under the old name
        assert_eq!(storage.list_tag_names(2).await.unwrap(), vec!["news"]);
        assert_eq!(storage.list_links(2, "news").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_links_empty_is_ok() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();

        let links = storage.list_links(1, "news").await.unwrap();
        assert!(links.is_empty());
    }

    #[tokio::test]
    async fn test_delete_tag_cascades_links() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        storage.upsert_tag(1, "tools").await.unwrap();
        storage.insert_link(1, "https://a.example", "news").await.unwrap();
        storage.insert_link(1, "https://b.example", "news").await.unwrap();
        storage.insert_link(1, "https://c.example", "tools").await.unwrap();

        let removal = storage.delete_tag(1, "news").await.unwrap();
        assert!(removal.deleted);
        assert_eq!(removal.removed_links, 2);

        assert_eq!(storage.list_tag_names(1).await.unwrap(), vec!["tools"]);
        assert_eq!(storage.list_links(1, "tools").await.unwrap().len(), 1);
        assert_eq!(storage.count_links(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_tag_reports_not_deleted() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();

        let removal = storage.delete_tag(1, "ghost").await.unwrap();
        assert!(!removal.deleted);
        assert_eq!(removal.removed_links, 0);
    }

    #[tokio::test]
    async fn test_delete_link_is_owner_scoped() {
        let (storage, _dir) = test_storage().await;
        storage.upsert_user(1, None, None).await.unwrap();
        storage.upsert_user(2, None, None).await.unwrap();
        storage.upsert_tag(1, "news").await.unwrap();
        let id = storage.insert_link(1, "https://a.example", "news").await.unwrap();

        // Another owner cannot delete it
        assert!(!storage.delete_link(2, id).await.unwrap());
        assert_eq!(storage.list_links(1, "news").await.unwrap().len(), 1);

        // The owner can
        assert!(storage.delete_link(1, id).await.unwrap());
        assert!(storage.list_links(1, "news").await.unwrap().is_empty());
    }
}
