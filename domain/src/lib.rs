//! Domain library for the book service.
//!
//! Holds the `Book` entity, the `BookRepository` port implemented by every
//! storage adapter, and the error type shared across layers. Keep database
//! drivers and HTTP concerns out of this crate.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;

/// A stored book.
///
/// `id` is assigned by the storage adapter on creation and its format depends
/// on the backend (decimal integer for PostgreSQL, 24-char hex ObjectId for
/// MongoDB). An empty `id` means "not yet persisted".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Book {
    pub id: String,
    pub name: String,
    pub author: String,
    /// Set by the document adapter only.
    pub created_at: Option<SystemTime>,
    /// Set by the document adapter only; bumped on every update.
    pub updated_at: Option<SystemTime>,
}

impl Book {
    /// Create an unsaved book with no id and no timestamps.
    pub fn new<N: Into<String>, A: Into<String>>(name: N, author: A) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            author: author.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Same book with the given id attached.
    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    /// True when name and author match, ignoring id and timestamps.
    pub fn same_content(&self, other: &Book) -> bool {
        self.name == other.name && self.author == other.author
    }
}

/// Repository port for persisting and loading books.
///
/// Every adapter must behave identically from the caller's point of view:
/// - `get_all_books` returns an empty `Vec` for an empty store.
/// - ids that are malformed for the backend yield `CoreError::InvalidId`
///   without touching storage.
/// - `update_book`/`delete_book` yield `CoreError::NotFound` when nothing
///   matched, and leave storage unchanged.
#[async_trait]
pub trait BookRepository: Send + Sync {
    async fn get_all_books(&self) -> Result<Vec<Book>, CoreError>;

    async fn get_book(&self, id: &str) -> Result<Book, CoreError>;

    /// Persist a new book. Any id on the input is ignored; the returned book
    /// carries the id assigned by storage.
    async fn add_book(&self, book: Book) -> Result<Book, CoreError>;

    /// Replace name and author of the book with the given id.
    async fn update_book(&self, id: &str, book: Book) -> Result<(), CoreError>;

    async fn delete_book(&self, id: &str) -> Result<(), CoreError>;

    /// Remove every book. Succeeds on an empty store.
    async fn delete_all_books(&self) -> Result<(), CoreError>;
}

/// Core domain errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid book id: {0}")]
    InvalidId(String),
    #[error("book not found")]
    NotFound,
    #[error("book already exists")]
    AlreadyExists,
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),
    #[error("repository error: {0}")]
    Repository(String),
}

impl CoreError {
    /// Not-found-style failure: no record matched, or the id could never match.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound | CoreError::InvalidId(_))
    }
}

pub mod adapters;
