//! postgres-adapter: PostgreSQL implementation of the `BookRepository` port.
//!
//! Purpose
//! - Persist books in the `books` table of the `books` database on the
//!   configured server, using an `sqlx` connection pool.
//! - Ids are the table's `SERIAL` primary key rendered as decimal text.
//!
//! Notes
//! - Every call issues a single parameterized statement bounded by
//!   `QUERY_TIMEOUT`; on expiry the call fails with `CoreError::Timeout`.
//! - Update/delete check the affected-row count and report `NotFound` when
//!   nothing matched.

use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Book, BookRepository, CoreError};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

/// Per-call deadline for every statement.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Database the adapter targets on the configured server.
pub const DATABASE_NAME: &str = "books";

const MAX_CONNECTIONS: u32 = 10;

/// PostgreSQL-backed book repository.
#[derive(Clone)]
pub struct PostgresRepo {
    pool: PgPool,
}

impl PostgresRepo {
    /// Connect to the server named by `conn_string`, select the `books`
    /// database and ensure the table exists.
    ///
    /// Fails if the string does not parse or the server is unreachable.
    pub async fn connect(conn_string: &str) -> Result<Self, CoreError> {
        let opts = connect_options(conn_string)?;
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(QUERY_TIMEOUT)
            .connect_with(opts)
            .await
            .map_err(|e| CoreError::Repository(format!("failed to connect: {e}")))?;
        let repo = Self::from_pool(pool).await?;
        info!(database = DATABASE_NAME, "postgres repository ready");
        Ok(repo)
    }

    /// Wrap an existing pool and ensure the table exists.
    pub async fn from_pool(pool: PgPool) -> Result<Self, CoreError> {
        let repo = Self { pool };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), CoreError> {
        bounded(
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS books (
                    id SERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    author TEXT NOT NULL
                )
                "#,
            )
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Parse the connection string and point it at the `books` database.
fn connect_options(conn_string: &str) -> Result<PgConnectOptions, CoreError> {
    let opts = PgConnectOptions::from_str(conn_string)
        .map_err(|e| CoreError::Repository(format!("invalid connection string: {e}")))?;
    Ok(opts.database(DATABASE_NAME))
}

fn parse_id(id: &str) -> Result<i32, CoreError> {
    id.parse::<i32>()
        .map_err(|_| CoreError::InvalidId(id.to_string()))
}

fn map_pgerr(e: sqlx::Error) -> CoreError {
    match e {
        sqlx::Error::RowNotFound => CoreError::NotFound,
        sqlx::Error::PoolTimedOut => CoreError::Timeout(QUERY_TIMEOUT),
        sqlx::Error::Database(ref db) if db.is_unique_violation() => CoreError::AlreadyExists,
        other => CoreError::Repository(format!("postgres error: {other}")),
    }
}

/// Run a single statement under `QUERY_TIMEOUT`.
async fn bounded<T, F>(fut: F) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(res) => res.map_err(map_pgerr),
        Err(_) => Err(CoreError::Timeout(QUERY_TIMEOUT)),
    }
}

fn row_to_book(row: &PgRow) -> Result<Book, CoreError> {
    let id: i32 = row.try_get("id").map_err(map_pgerr)?;
    let name: String = row.try_get("name").map_err(map_pgerr)?;
    let author: String = row.try_get("author").map_err(map_pgerr)?;
    Ok(Book::new(name, author).with_id(id.to_string()))
}

#[async_trait]
impl BookRepository for PostgresRepo {
    async fn get_all_books(&self) -> Result<Vec<Book>, CoreError> {
        let rows = bounded(
            sqlx::query("SELECT id, name, author FROM books ORDER BY id").fetch_all(&self.pool),
        )
        .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(row_to_book(row)?);
        }
        Ok(out)
    }

    async fn get_book(&self, id: &str) -> Result<Book, CoreError> {
        let key = parse_id(id)?;
        let row = bounded(
            sqlx::query("SELECT id, name, author FROM books WHERE id = $1")
                .bind(key)
                .fetch_optional(&self.pool),
        )
        .await?;
        match row {
            Some(row) => row_to_book(&row),
            None => Err(CoreError::NotFound),
        }
    }

    async fn add_book(&self, book: Book) -> Result<Book, CoreError> {
        let new_id: i32 = bounded(
            sqlx::query_scalar("INSERT INTO books (name, author) VALUES ($1, $2) RETURNING id")
                .bind(&book.name)
                .bind(&book.author)
                .fetch_one(&self.pool),
        )
        .await?;
        debug!(id = new_id, "book inserted");
        Ok(Book::new(book.name, book.author).with_id(new_id.to_string()))
    }

    async fn update_book(&self, id: &str, book: Book) -> Result<(), CoreError> {
        let key = parse_id(id)?;
        let res = bounded(
            sqlx::query("UPDATE books SET name = $2, author = $3 WHERE id = $1")
                .bind(key)
                .bind(&book.name)
                .bind(&book.author)
                .execute(&self.pool),
        )
        .await?;
        if res.rows_affected() == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_book(&self, id: &str) -> Result<(), CoreError> {
        let key = parse_id(id)?;
        let res = bounded(
            sqlx::query("DELETE FROM books WHERE id = $1")
                .bind(key)
                .execute(&self.pool),
        )
        .await?;
        if res.rows_affected() == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_all_books(&self) -> Result<(), CoreError> {
        bounded(sqlx::query("DELETE FROM books").execute(&self.pool)).await?;
        Ok(())
    }
}
