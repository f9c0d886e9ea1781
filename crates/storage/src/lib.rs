use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{migrate::MigrateError, sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;

use grainstore_core::{EntityKind, LocaleIndex, LocaleMap};

const SQLITE_CONSTRAINT_FOREIGNKEY: &str = "787";
const SQLITE_CONSTRAINT_PRIMARYKEY: &str = "1555";
const SQLITE_CONSTRAINT_UNIQUE: &str = "2067";

/// Top-level database handle that owns the SQLite connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Establishes a new SQLite connection pool for the provided connection string.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(StorageError::Connect)?;

        apply_pragmas(&pool).await?;

        Ok(Self { pool })
    }

    /// Applies migrations located under `migrations/`.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(StorageError::Migration)?;
        Ok(())
    }

    /// Returns a handle for tenant records.
    pub fn tenants(&self) -> TenantRepository {
        TenantRepository {
            pool: self.pool.clone(),
        }
    }

    /// Returns a handle for per-field localized text.
    pub fn localized_texts(&self) -> LocalizedTextRepository {
        LocalizedTextRepository {
            pool: self.pool.clone(),
        }
    }

    /// Exposes the inner pool when lower level access is required.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn apply_pragmas(pool: &SqlitePool) -> Result<(), StorageError> {
    sqlx::query("PRAGMA foreign_keys = ON;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA journal_mode = WAL;")
        .fetch_one(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA synchronous = NORMAL;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    sqlx::query("PRAGMA busy_timeout = 5000;")
        .execute(pool)
        .await
        .map_err(StorageError::Pragma)?;

    Ok(())
}

/// General storage level errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to connect to sqlite: {0}")]
    Connect(sqlx::Error),
    #[error("failed to apply pragma: {0}")]
    Pragma(sqlx::Error),
    #[error("failed to run database migrations: {0}")]
    Migration(MigrateError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Tenant owning a set of entities.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Tenant {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Data required to register a tenant.
pub struct NewTenant<'a> {
    pub id: Cow<'a, str>,
    pub name: Cow<'a, str>,
    pub created_at: DateTime<Utc>,
}

/// Repository used to register and look up tenants.
#[derive(Clone)]
pub struct TenantRepository {
    pool: SqlitePool,
}

impl TenantRepository {
    /// Inserts a tenant, rejecting identifiers that already exist.
    pub async fn create(&self, tenant: NewTenant<'_>) -> Result<Tenant, TenantError> {
        sqlx::query("INSERT INTO tenants (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&*tenant.id)
            .bind(&*tenant.name)
            .bind(to_rfc3339(tenant.created_at))
            .execute(&self.pool)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db_err)
                    if matches!(
                        db_err.code().as_deref(),
                        Some(SQLITE_CONSTRAINT_PRIMARYKEY) | Some(SQLITE_CONSTRAINT_UNIQUE)
                    ) =>
                {
                    TenantError::AlreadyExists
                }
                other => TenantError::Database(other),
            })?;

        self.fetch(&tenant.id).await
    }

    /// Loads a tenant by identifier.
    pub async fn fetch(&self, tenant_id: &str) -> Result<Tenant, TenantError> {
        sqlx::query_as::<_, Tenant>("SELECT id, name, created_at FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(TenantError::NotFound)
    }
}

/// Errors that can occur while reading or writing tenants.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("tenant not found")]
    NotFound,
    #[error("tenant already exists")]
    AlreadyExists,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Payload required to store the translations of one entity field.
pub struct NewLocalizedText<'a> {
    pub tenant_id: &'a str,
    pub kind: EntityKind,
    pub entity_id: &'a str,
    pub field: &'a str,
    pub texts: &'a LocaleMap,
    pub updated_at: DateTime<Utc>,
}

/// Stored translations row.
#[derive(Debug, sqlx::FromRow)]
pub struct LocalizedTextRow {
    pub entity_kind: String,
    pub entity_id: String,
    pub field: String,
    pub en: Option<String>,
    pub he: Option<String>,
    pub ar: Option<String>,
    pub th: Option<String>,
}

impl LocalizedTextRow {
    fn locale_map(&self) -> LocaleMap {
        LocaleMap {
            en: self.en.clone(),
            he: self.he.clone(),
            ar: self.ar.clone(),
            th: self.th.clone(),
        }
    }

    /// Converts the row into its entity kind and locale map.
    pub fn into_domain(
        self,
    ) -> Result<(EntityKind, String, String, LocaleMap), LocalizedTextError> {
        let Ok(kind) = self.entity_kind.parse() else {
            return Err(LocalizedTextError::UnknownKind(self.entity_kind));
        };
        let map = self.locale_map();
        Ok((kind, self.entity_id, self.field, map))
    }
}

/// Repository for per-field locale maps.
#[derive(Clone)]
pub struct LocalizedTextRepository {
    pool: SqlitePool,
}

impl LocalizedTextRepository {
    /// Inserts or replaces the translations stored for an entity field.
    pub async fn upsert(&self, record: &NewLocalizedText<'_>) -> Result<(), LocalizedTextError> {
        sqlx::query(
            "INSERT INTO localized_texts \
             (tenant_id, entity_kind, entity_id, field, en, he, ar, th, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(tenant_id, entity_kind, entity_id, field) DO UPDATE \
             SET en = excluded.en, he = excluded.he, ar = excluded.ar, th = excluded.th, \
                 updated_at = excluded.updated_at",
        )
        .bind(record.tenant_id)
        .bind(record.kind.as_str())
        .bind(record.entity_id)
        .bind(record.field)
        .bind(record.texts.en.as_deref())
        .bind(record.texts.he.as_deref())
        .bind(record.texts.ar.as_deref())
        .bind(record.texts.th.as_deref())
        .bind(to_rfc3339(record.updated_at))
        .execute(&self.pool)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(SQLITE_CONSTRAINT_FOREIGNKEY) =>
            {
                LocalizedTextError::MissingTenant
            }
            other => LocalizedTextError::Database(other),
        })?;

        Ok(())
    }

    /// Loads the locale map for a single entity field, if one was stored.
    pub async fn fetch(
        &self,
        tenant_id: &str,
        kind: EntityKind,
        entity_id: &str,
        field: &str,
    ) -> Result<Option<LocaleMap>, LocalizedTextError> {
        let row = sqlx::query_as::<_, LocalizedTextRow>(
            "SELECT entity_kind, entity_id, field, en, he, ar, th \
               FROM localized_texts \
              WHERE tenant_id = ? AND entity_kind = ? AND entity_id = ? AND field = ?",
        )
        .bind(tenant_id)
        .bind(kind.as_str())
        .bind(entity_id)
        .bind(field)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.locale_map()))
    }

    /// Loads every stored locale map for a tenant into a lookup index.
    pub async fn load_index(&self, tenant_id: &str) -> Result<LocaleIndex, LocalizedTextError> {
        let rows = sqlx::query_as::<_, LocalizedTextRow>(
            "SELECT entity_kind, entity_id, field, en, he, ar, th \
               FROM localized_texts \
              WHERE tenant_id = ? \
              ORDER BY entity_kind, entity_id, field",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut index = LocaleIndex::new();
        for row in rows {
            let (kind, entity_id, field, map) = row.into_domain()?;
            index.insert(kind, entity_id, field, map);
        }
        Ok(index)
    }
}

/// Errors that can occur while reading or writing localized text.
#[derive(Debug, Error)]
pub enum LocalizedTextError {
    #[error("tenant is missing for localized text")]
    MissingTenant,
    #[error("stored entity kind '{0}' is not recognised")]
    UnknownKind(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn to_rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}
