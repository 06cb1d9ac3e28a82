//! Feed registry and item log storage.

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;
use crate::date::{from_storage, to_storage};

/// A registered feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    /// Feed id, also the inbox local part.
    pub id: String,
    /// Human-readable title.
    pub name: String,
    /// Registration time, to the second.
    pub created: DateTime<Utc>,
}

impl FeedRecord {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let created: String = row.get("created");
        Ok(Self {
            id: row.get("id"),
            name: row.get("name"),
            created: from_storage(&created)?,
        })
    }
}

/// A persisted feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    /// Row id; increases with insertion order.
    pub id: i64,
    /// Owning feed.
    pub feed_id: String,
    /// Item title.
    pub subject: String,
    /// Item body.
    pub body: String,
    /// Message date.
    pub date: DateTime<Utc>,
}

/// Audit record of one ingested message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailRecord {
    /// Server UID.
    pub id: u32,
    /// Message date.
    pub date: DateTime<Utc>,
    /// Raw `To` header.
    pub recipient: String,
    /// Raw `From` header.
    pub sender: String,
    /// Decoded subject.
    pub subject: String,
    /// Selected body text.
    pub body: String,
}

/// Repository for feeds, feed items and email audit records.
#[derive(Debug, Clone)]
pub struct FeedRepository {
    pool: SqlitePool,
}

impl FeedRepository {
    /// Opens (creating if needed) the database at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS feed (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        self.add_feed_created_column().await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS feed_item (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                feed_id TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                date TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_feed_item_feed ON feed_item(feed_id, id)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS email (
                id INTEGER PRIMARY KEY,
                date TEXT NOT NULL,
                recipient TEXT NOT NULL,
                sender TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Databases written before feeds carried a creation time get the
    /// column, stamped with the time of the upgrade.
    async fn add_feed_created_column(&self) -> Result<()> {
        let columns = sqlx::query("PRAGMA table_info(feed)")
            .fetch_all(&self.pool)
            .await?;
        if columns
            .iter()
            .any(|column| column.get::<String, _>("name") == "created")
        {
            return Ok(());
        }

        sqlx::query("ALTER TABLE feed ADD COLUMN created TEXT NOT NULL DEFAULT ''")
            .execute(&self.pool)
            .await?;
        sqlx::query("UPDATE feed SET created = ?")
            .bind(to_storage(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Registers a feed, stamped with the current time. Returns `None` if
    /// the id is already taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create_feed(&self, id: &str, name: &str) -> Result<Option<FeedRecord>> {
        let created = Utc::now().trunc_subsecs(0);
        let result = sqlx::query(
            r"
            INSERT INTO feed (id, name, created) VALUES (?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(id)
        .bind(name)
        .bind(to_storage(created))
        .execute(&self.pool)
        .await?;

        Ok((result.rows_affected() == 1).then(|| FeedRecord {
            id: id.to_string(),
            name: name.to_string(),
            created,
        }))
    }

    /// Looks up a feed by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the stored creation
    /// time is malformed.
    pub async fn get_feed(&self, id: &str) -> Result<Option<FeedRecord>> {
        let row = sqlx::query("SELECT id, name, created FROM feed WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(FeedRecord::from_row).transpose()
    }

    /// True if a feed with this id is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn feed_exists(&self, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM feed WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        let count: i64 = row.get("count");
        Ok(count > 0)
    }

    /// All registered feeds, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored creation
    /// time is malformed.
    pub async fn list_feeds(&self) -> Result<Vec<FeedRecord>> {
        let rows = sqlx::query("SELECT id, name, created FROM feed ORDER BY rowid ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(FeedRecord::from_row).collect()
    }

    /// Appends an item to a feed's log and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create_feed_item(
        &self,
        feed_id: &str,
        subject: &str,
        body: &str,
        date: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            r"
            INSERT INTO feed_item (feed_id, subject, body, date)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(feed_id)
        .bind(subject)
        .bind(body)
        .bind(to_storage(date))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// A feed's items in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored date is not in the
    /// storage layout.
    pub async fn list_feed_items(&self, feed_id: &str) -> Result<Vec<StoredItem>> {
        let rows = sqlx::query(
            r"
            SELECT id, feed_id, subject, body, date
            FROM feed_item
            WHERE feed_id = ?
            ORDER BY id ASC
            ",
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let date: String = row.get("date");
                Ok(StoredItem {
                    id: row.get("id"),
                    feed_id: row.get("feed_id"),
                    subject: row.get("subject"),
                    body: row.get("body"),
                    date: from_storage(&date)?,
                })
            })
            .collect()
    }

    /// Records an ingested message. Returns `false` if the UID was already
    /// recorded; the existing row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create_email(&self, email: &EmailRecord) -> Result<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO email (id, date, recipient, sender, subject, body)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(i64::from(email.id))
        .bind(to_storage(email.date))
        .bind(&email.recipient)
        .bind(&email.sender)
        .bind(&email.subject)
        .bind(&email.body)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[cfg(test)]
    async fn corrupt_item_date(&self, item_id: i64, date: &str) -> Result<()> {
        sqlx::query("UPDATE feed_item SET date = ? WHERE id = ?")
            .bind(date)
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
