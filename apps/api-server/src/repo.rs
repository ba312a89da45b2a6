//! Backend selection. The concrete adapter is chosen once at startup and held
//! as a tagged enum; no trait objects on the request path.

use async_trait::async_trait;
use domain::adapters::memory_repo::InMemoryBookRepo;
use domain::{Book, BookRepository, CoreError};

use crate::config::{Config, DbType};

pub enum AnyRepo {
    Memory(InMemoryBookRepo),
    #[cfg(feature = "postgres")]
    Postgres(postgres_adapter::PostgresRepo),
    #[cfg(feature = "mongodb")]
    Mongo(mongo_adapter::MongoRepo),
}

impl AnyRepo {
    /// Open the backend named by the config. Unreachable storage is an error;
    /// the caller treats it as fatal.
    pub async fn connect(cfg: &Config) -> Result<Self, CoreError> {
        match cfg.db_type {
            DbType::Memory => Ok(Self::Memory(InMemoryBookRepo::new())),
            #[cfg(feature = "postgres")]
            DbType::Postgresql => Ok(Self::Postgres(
                postgres_adapter::PostgresRepo::connect(&cfg.conn_string).await?,
            )),
            #[cfg(feature = "mongodb")]
            DbType::Mongodb => Ok(Self::Mongo(
                mongo_adapter::MongoRepo::connect(&cfg.conn_string).await?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(CoreError::Repository(format!(
                "backend '{}' is not enabled in this build",
                other.as_str()
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnyRepo::Memory(_) => "memory",
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(_) => "postgresql",
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(_) => "mongodb",
        }
    }
}

#[async_trait]
impl BookRepository for AnyRepo {
    async fn get_all_books(&self) -> Result<Vec<Book>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get_all_books().await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.get_all_books().await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.get_all_books().await,
        }
    }

    async fn get_book(&self, id: &str) -> Result<Book, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.get_book(id).await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.get_book(id).await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.get_book(id).await,
        }
    }

    async fn add_book(&self, book: Book) -> Result<Book, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.add_book(book).await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.add_book(book).await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.add_book(book).await,
        }
    }

    async fn update_book(&self, id: &str, book: Book) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.update_book(id, book).await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.update_book(id, book).await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.update_book(id, book).await,
        }
    }

    async fn delete_book(&self, id: &str) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.delete_book(id).await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.delete_book(id).await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.delete_book(id).await,
        }
    }

    async fn delete_all_books(&self) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.delete_all_books().await,
            #[cfg(feature = "postgres")]
            AnyRepo::Postgres(r) => r.delete_all_books().await,
            #[cfg(feature = "mongodb")]
            AnyRepo::Mongo(r) => r.delete_all_books().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn memory_backend_connects_without_database() {
        let cfg = Config::try_parse_from(["api-server", "--db-type", "memory"]).unwrap();
        let repo = AnyRepo::connect(&cfg).await.unwrap();
        assert_eq!(repo.kind(), "memory");
        assert!(repo.get_all_books().await.unwrap().is_empty());
        let created = repo.add_book(Book::new("Dune", "Herbert")).await.unwrap();
        assert_eq!(repo.get_book(&created.id).await.unwrap().name, "Dune");
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn unreachable_postgres_fails_to_connect() {
        // Port 1 on localhost is never a PostgreSQL server.
        let cfg = Config::try_parse_from([
            "api-server",
            "--db-type",
            "postgresql",
            "--conn-string",
            "postgresql://postgres:pw@127.0.0.1:1",
        ])
        .unwrap();
        assert!(AnyRepo::connect(&cfg).await.is_err());
    }
}
