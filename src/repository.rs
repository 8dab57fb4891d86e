use crate::models::{Item, ItemChanges, NewItem, NewUser, User, UserChanges};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Entity
///
/// Anything the generic CRUD layer can manage: it has an id, an owner used for the
/// ownership check, and dedicated create/update input types.
pub trait Entity: Clone + Send + Sync + 'static {
    type Create: Send + 'static;
    type Update: Send + 'static;

    /// Human-readable name used in "not found" messages.
    const NAME: &'static str;

    fn id(&self) -> Uuid;

    /// The user allowed to mutate this entity besides superusers.
    fn owner_id(&self) -> Uuid;
}

impl Entity for User {
    type Create = NewUser;
    type Update = UserChanges;
    const NAME: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }

    // A user record is owned by the user itself.
    fn owner_id(&self) -> Uuid {
        self.id
    }
}

impl Entity for Item {
    type Create = NewItem;
    type Update = ItemChanges;
    const NAME: &'static str = "Item";

    fn id(&self) -> Uuid {
        self.id
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}

/// A resolved (already clamped) page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: u32,
    pub limit: u32,
}

#[derive(Debug, Error)]
pub enum RepoError {
    /// A unique constraint rejected the write; carries the offending field name.
    #[error("duplicate value for unique field {0}")]
    UniqueViolation(&'static str),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Repository Trait
///
/// The generic persistence contract, implemented once per entity type and backend.
/// Lists come back in insertion order. `update` and `delete` return `None` when the id
/// does not resolve, leaving the NotFound decision to the service layer.
///
/// **Send + Sync + async_trait** make the trait objects shareable across Axum's tasks.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn list(&self, page: Page) -> Result<Vec<T>, RepoError>;
    async fn get(&self, id: Uuid) -> Result<Option<T>, RepoError>;
    async fn create(&self, data: T::Create) -> Result<T, RepoError>;
    async fn update(&self, id: Uuid, data: T::Update) -> Result<Option<T>, RepoError>;
    async fn delete(&self, id: Uuid) -> Result<Option<T>, RepoError>;
}

/// The credential store: users plus lookup by (lowercased) email.
#[async_trait]
pub trait UserRepository: Repository<User> {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
}

#[async_trait]
pub trait ItemRepository: Repository<Item> {
    async fn list_by_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Item>, RepoError>;
}

/// Shared handles stored in the application state.
pub type UserRepoState = Arc<dyn UserRepository>;
pub type ItemRepoState = Arc<dyn ItemRepository>;

const USER_COLUMNS: &str = "id, email, hashed_password, first_name, last_name, is_active, is_superuser, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, title, description, owner_id, is_active, created_at, updated_at";

/// Listing query in insertion order. `seq` is an identity column, so ties are impossible.
fn list_sql(columns: &str, table: &str, filter: Option<&str>) -> String {
    match filter {
        Some(filter) => format!(
            "SELECT {columns} FROM {table} WHERE {filter} ORDER BY seq ASC LIMIT $2 OFFSET $3"
        ),
        None => format!("SELECT {columns} FROM {table} ORDER BY seq ASC LIMIT $1 OFFSET $2"),
    }
}

/// PostgresRepository
///
/// The concrete `sqlx` implementation for both entity types, sharing one pool.
/// Queries are checked at runtime so the crate builds without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Translates constraint violations into typed errors; everything else stays opaque.
fn classify(err: sqlx::Error, unique_field: &'static str) -> RepoError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepoError::UniqueViolation(unique_field);
        }
        if db_err.is_foreign_key_violation() {
            return RepoError::ForeignKeyViolation(db_err.message().to_string());
        }
    }
    RepoError::Database(err)
}

#[async_trait]
impl Repository<User> for PostgresRepository {
    async fn list(&self, page: Page) -> Result<Vec<User>, RepoError> {
        let sql = list_sql(USER_COLUMNS, "users", None);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.skip))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, data: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"INSERT INTO users (id, email, hashed_password, first_name, last_name, is_active, is_superuser, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(data.email)
            .bind(data.hashed_password)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.is_active)
            .bind(data.is_superuser)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "email"))
    }

    /// Uses `COALESCE` so only the fields present in `data` are written.
    async fn update(&self, id: Uuid, data: UserChanges) -> Result<Option<User>, RepoError> {
        let sql = format!(
            r#"UPDATE users
               SET email = COALESCE($2, email),
                   hashed_password = COALESCE($3, hashed_password),
                   first_name = COALESCE($4, first_name),
                   last_name = COALESCE($5, last_name),
                   is_active = COALESCE($6, is_active),
                   is_superuser = COALESCE($7, is_superuser),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(data.email)
            .bind(data.hashed_password)
            .bind(data.first_name)
            .bind(data.last_name)
            .bind(data.is_active)
            .bind(data.is_superuser)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "email"))
    }

    /// Users are never hard-deleted: "deleting" one deactivates it.
    async fn delete(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let changes = UserChanges {
            is_active: Some(false),
            ..UserChanges::default()
        };
        Repository::<User>::update(self, id, changes).await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl Repository<Item> for PostgresRepository {
    async fn list(&self, page: Page) -> Result<Vec<Item>, RepoError> {
        let sql = list_sql(ITEM_COLUMNS, "items", None);
        Ok(sqlx::query_as::<_, Item>(&sql)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.skip))
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Item>, RepoError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
        Ok(sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, data: NewItem) -> Result<Item, RepoError> {
        let sql = format!(
            r#"INSERT INTO items (id, title, description, owner_id, is_active, created_at, updated_at)
               VALUES ($1, $2, $3, $4, true, NOW(), NOW())
               RETURNING {ITEM_COLUMNS}"#
        );
        sqlx::query_as::<_, Item>(&sql)
            .bind(Uuid::new_v4())
            .bind(data.title)
            .bind(data.description)
            .bind(data.owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "id"))
    }

    async fn update(&self, id: Uuid, data: ItemChanges) -> Result<Option<Item>, RepoError> {
        let sql = format!(
            r#"UPDATE items
               SET title = COALESCE($2, title),
                   description = COALESCE($3, description),
                   is_active = COALESCE($4, is_active),
                   updated_at = NOW()
               WHERE id = $1
               RETURNING {ITEM_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .bind(data.title)
            .bind(data.description)
            .bind(data.is_active)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete(&self, id: Uuid) -> Result<Option<Item>, RepoError> {
        let sql = format!("DELETE FROM items WHERE id = $1 RETURNING {ITEM_COLUMNS}");
        Ok(sqlx::query_as::<_, Item>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

#[async_trait]
impl ItemRepository for PostgresRepository {
    async fn list_by_owner(&self, owner_id: Uuid, page: Page) -> Result<Vec<Item>, RepoError> {
        let sql = list_sql(ITEM_COLUMNS, "items", Some("owner_id = $1"));
        Ok(sqlx::query_as::<_, Item>(&sql)
            .bind(owner_id)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.skip))
            .fetch_all(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listings_order_by_identity_column() {
        let sql = list_sql(USER_COLUMNS, "users", None);
        assert!(sql.ends_with("FROM users ORDER BY seq ASC LIMIT $1 OFFSET $2"));

        let sql = list_sql(ITEM_COLUMNS, "items", Some("owner_id = $1"));
        assert!(sql.ends_with("WHERE owner_id = $1 ORDER BY seq ASC LIMIT $2 OFFSET $3"));
        assert!(!sql.contains("created_at ASC"));
    }

    #[test]
    fn identity_column_migration_exists() {
        let migration = include_str!("../migrations/20250201000000_insertion_order.sql");
        for table in ["users", "items"] {
            let clause = format!("{table} ADD COLUMN IF NOT EXISTS seq BIGINT GENERATED ALWAYS AS IDENTITY");
            assert!(migration.contains(&clause), "{table} lacks an identity column");
        }
    }
}
