use crate::{
    error::RepositoryError,
    models::{ChecklistItem, Folder, Note, NoteFilter, NoteRequest, User},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only ever see
/// `Arc<dyn Repository>`, so the Postgres store and the in-memory store are
/// interchangeable.
///
/// Write methods that take an `owner_username` only touch records owned by that
/// user; a mismatch behaves like a missing record.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Accounts ---
    async fn find_user(&self, username: &str) -> RepoResult<Option<User>>;
    // Fails with `RepositoryError::Conflict` if the username is taken.
    async fn create_user(&self, user: User) -> RepoResult<User>;
    // Usernames of every child linked to `parent_username`, sorted.
    async fn list_children(&self, parent_username: &str) -> RepoResult<Vec<String>>;

    // --- Folders ---
    async fn create_folder(&self, owner_username: &str, name: &str) -> RepoResult<Folder>;
    async fn get_folder(&self, id: Uuid) -> RepoResult<Option<Folder>>;
    // Folders of any of `owners`, ordered by name.
    async fn list_folders(&self, owners: &[String]) -> RepoResult<Vec<Folder>>;
    // Notes filed in the folder survive with their `folder_id` cleared.
    async fn delete_folder(&self, id: Uuid, owner_username: &str) -> RepoResult<bool>;

    // --- Notes ---
    async fn create_note(&self, owner_username: &str, req: NoteRequest) -> RepoResult<Note>;
    async fn get_note(&self, id: Uuid) -> RepoResult<Option<Note>>;
    // Notes of any of `owners` passing `filter`, newest first.
    async fn list_notes(&self, owners: &[String], filter: &NoteFilter) -> RepoResult<Vec<Note>>;
    // Replaces every editable field and bumps `updated_at`.
    async fn update_note(
        &self,
        id: Uuid,
        owner_username: &str,
        req: NoteRequest,
    ) -> RepoResult<Option<Note>>;
    async fn delete_note(&self, id: Uuid, owner_username: &str) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// Idempotent DDL, run once at startup. Mirrors the indexes the service relies on:
// unique usernames, owner lookups and the parent link.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        username TEXT PRIMARY KEY,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('parent', 'child')),
        parent_username TEXT REFERENCES users (username)
    )"#,
    "CREATE INDEX IF NOT EXISTS users_parent_username_idx ON users (parent_username)",
    r#"CREATE TABLE IF NOT EXISTS folders (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        owner_username TEXT NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS folders_owner_username_idx ON folders (owner_username)",
    r#"CREATE TABLE IF NOT EXISTS notes (
        id UUID PRIMARY KEY,
        owner_username TEXT NOT NULL REFERENCES users (username) ON DELETE CASCADE,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        tags TEXT[] NOT NULL DEFAULT '{}',
        checkbox_items JSONB NOT NULL DEFAULT '[]',
        folder_id UUID REFERENCES folders (id) ON DELETE SET NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    "CREATE INDEX IF NOT EXISTS notes_owner_username_idx ON notes (owner_username)",
];

const NOTE_COLUMNS: &str =
    "id, owner_username, title, content, tags, checkbox_items, folder_id, created_at, updated_at";

#[derive(FromRow)]
struct UserRow {
    username: String,
    password_hash: String,
    role: String,
    parent_username: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: row.role.parse().map_err(RepositoryError::Corrupt)?,
            username: row.username,
            password_hash: row.password_hash,
            parent_username: row.parent_username,
        })
    }
}

#[derive(FromRow)]
struct NoteRow {
    id: Uuid,
    owner_username: String,
    title: String,
    content: String,
    tags: Vec<String>,
    checkbox_items: Json<Vec<ChecklistItem>>,
    folder_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            owner_username: row.owner_username,
            title: row.title,
            content: row.content,
            tags: row.tags,
            checkbox_items: row.checkbox_items.0,
            folder_id: row.folder_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct FolderRow {
    id: Uuid,
    name: String,
    owner_username: String,
    created_at: DateTime<Utc>,
}

impl From<FolderRow> for Folder {
    fn from(row: FolderRow) -> Self {
        Folder {
            id: row.id,
            name: row.name,
            owner_username: row.owner_username,
            created_at: row.created_at,
        }
    }
}

/// PostgresRepository
///
/// The production implementation. Notes are stored document-style: tags as a
/// `TEXT[]` column and the checklist as `JSONB`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates tables and indexes if they do not exist yet. Safe to call on every start.
    pub async fn init_schema(&self) -> RepoResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_user(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, UserRow>(
            "SELECT username, password_hash, role, parent_username FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    /// create_user
    ///
    /// Relies on the primary key for uniqueness, so concurrent signups for the same
    /// name cannot both succeed.
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, role, parent_username) VALUES ($1, $2, $3, $4)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.parent_username)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("Username '{}' already exists", user.username)),
            ),
            Err(e) => {
                tracing::error!("create_user error: {:?}", e);
                Err(e.into())
            }
        }
    }

    async fn list_children(&self, parent_username: &str) -> RepoResult<Vec<String>> {
        let children = sqlx::query_scalar::<_, String>(
            "SELECT username FROM users WHERE parent_username = $1 ORDER BY username",
        )
        .bind(parent_username)
        .fetch_all(&self.pool)
        .await?;
        Ok(children)
    }

    async fn create_folder(&self, owner_username: &str, name: &str) -> RepoResult<Folder> {
        let folder = sqlx::query_as::<_, FolderRow>(
            r#"INSERT INTO folders (id, name, owner_username, created_at)
               VALUES ($1, $2, $3, NOW())
               RETURNING id, name, owner_username, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner_username)
        .fetch_one(&self.pool)
        .await?;
        Ok(folder.into())
    }

    async fn get_folder(&self, id: Uuid) -> RepoResult<Option<Folder>> {
        let folder = sqlx::query_as::<_, FolderRow>(
            "SELECT id, name, owner_username, created_at FROM folders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(folder.map(Folder::from))
    }

    async fn list_folders(&self, owners: &[String]) -> RepoResult<Vec<Folder>> {
        if owners.is_empty() {
            return Ok(vec![]);
        }
        let folders = sqlx::query_as::<_, FolderRow>(
            r#"SELECT id, name, owner_username, created_at FROM folders
               WHERE owner_username = ANY($1)
               ORDER BY name ASC, created_at ASC"#,
        )
        .bind(owners.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(folders.into_iter().map(Folder::from).collect())
    }

    /// delete_folder
    ///
    /// The `ON DELETE SET NULL` foreign key detaches the folder's notes.
    async fn delete_folder(&self, id: Uuid, owner_username: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM folders WHERE id = $1 AND owner_username = $2")
            .bind(id)
            .bind(owner_username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_note(&self, owner_username: &str, req: NoteRequest) -> RepoResult<Note> {
        let sql = format!(
            r#"INSERT INTO notes (id, owner_username, title, content, tags, checkbox_items, folder_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
               RETURNING {}"#,
            NOTE_COLUMNS
        );
        let row = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(owner_username)
            .bind(&req.title)
            .bind(&req.content)
            .bind(&req.tags)
            .bind(Json(&req.checkbox_items))
            .bind(req.folder_id)
            .fetch_one(&self.pool)
            .await
            .map_err(folder_reference_error)?;
        Ok(row.into())
    }

    async fn get_note(&self, id: Uuid) -> RepoResult<Option<Note>> {
        let sql = format!("SELECT {} FROM notes WHERE id = $1", NOTE_COLUMNS);
        let row = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Note::from))
    }

    /// list_notes
    ///
    /// Both filter clauses collapse to `TRUE` when their parameter is NULL.
    async fn list_notes(&self, owners: &[String], filter: &NoteFilter) -> RepoResult<Vec<Note>> {
        if owners.is_empty() {
            return Ok(vec![]);
        }
        let sql = format!(
            r#"SELECT {} FROM notes
               WHERE owner_username = ANY($1)
                 AND ($2::uuid IS NULL OR folder_id = $2)
                 AND ($3::text IS NULL OR $3 = ANY(tags))
               ORDER BY created_at DESC, id ASC"#,
            NOTE_COLUMNS
        );
        let rows = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(owners.to_vec())
            .bind(filter.folder_id)
            .bind(filter.tag.as_deref())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Note::from).collect())
    }

    async fn update_note(
        &self,
        id: Uuid,
        owner_username: &str,
        req: NoteRequest,
    ) -> RepoResult<Option<Note>> {
        let sql = format!(
            r#"UPDATE notes
               SET title = $3, content = $4, tags = $5, checkbox_items = $6, folder_id = $7,
                   updated_at = NOW()
               WHERE id = $1 AND owner_username = $2
               RETURNING {}"#,
            NOTE_COLUMNS
        );
        let row = sqlx::query_as::<_, NoteRow>(&sql)
            .bind(id)
            .bind(owner_username)
            .bind(&req.title)
            .bind(&req.content)
            .bind(&req.tags)
            .bind(Json(&req.checkbox_items))
            .bind(req.folder_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(folder_reference_error)?;
        Ok(row.map(Note::from))
    }

    async fn delete_note(&self, id: Uuid, owner_username: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND owner_username = $2")
            .bind(id)
            .bind(owner_username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// A note write whose folder disappeared after the ownership check trips the
/// `folders(id)` foreign key. That is the caller's mistake, not a server fault.
fn folder_reference_error(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            RepositoryError::MissingReference(
                "folder_id does not name one of your folders".to_string(),
            )
        }
        other => other.into(),
    }
}
