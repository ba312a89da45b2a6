//! MongoDB adapter implementing the `BookRepository` port.
//!
//! - Stores books in the `books` collection of the `db` database.
//! - Ids are server-generated `ObjectId`s exchanged as 24-char hex strings; an
//!   id that does not parse fails with `CoreError::InvalidId` before any query.
//! - Tracks `created_at`/`updated_at` on every document.
//! - Every driver call is bounded by `OPERATION_TIMEOUT`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Book, BookRepository, CoreError};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Per-call deadline for every driver operation.
pub const OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

pub const DATABASE_NAME: &str = "db";
pub const COLLECTION_NAME: &str = "books";

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Stored shape of a book in the collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct BookDocument {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<BsonDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated_at: Option<BsonDateTime>,
}

impl BookDocument {
    /// Fresh document for insertion; the server assigns `_id`.
    fn new_for_insert(book: &Book, now: BsonDateTime) -> Self {
        Self {
            id: None,
            name: book.name.clone(),
            author: book.author.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    fn into_book(self) -> Book {
        Book {
            id: self.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            name: self.name,
            author: self.author,
            created_at: self.created_at.map(BsonDateTime::to_system_time),
            updated_at: self.updated_at.map(BsonDateTime::to_system_time),
        }
    }
}

/// Repository backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoRepo {
    collection: Collection<BookDocument>,
}

impl MongoRepo {
    /// Parse `uri`, connect and ping the server.
    ///
    /// Fails if the URI is invalid or the server does not answer in time.
    pub async fn connect(uri: &str) -> Result<Self, CoreError> {
        let mut opts = bounded(ClientOptions::parse(uri)).await?;
        opts.server_selection_timeout = Some(OPERATION_TIMEOUT);
        let client = Client::with_options(opts).map_err(map_mongoerr)?;
        bounded(
            client
                .database("admin")
                .run_command(doc! { "ping": 1 }, None),
        )
        .await?;
        info!(
            database = DATABASE_NAME,
            collection = COLLECTION_NAME,
            "mongodb repository ready"
        );
        Ok(Self::from_client(&client))
    }

    /// Use the default `db.books` collection of an existing client.
    pub fn from_client(client: &Client) -> Self {
        Self::from_database(&client.database(DATABASE_NAME))
    }

    /// Use the `books` collection of the given database.
    pub fn from_database(db: &Database) -> Self {
        Self {
            collection: db.collection::<BookDocument>(COLLECTION_NAME),
        }
    }
}

fn parse_object_id(id: &str) -> Result<ObjectId, CoreError> {
    ObjectId::parse_str(id).map_err(|_| CoreError::InvalidId(id.to_string()))
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        e.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY_CODE
    )
}

fn map_mongoerr(e: mongodb::error::Error) -> CoreError {
    if is_duplicate_key(&e) {
        return CoreError::AlreadyExists;
    }
    CoreError::Repository(format!("mongodb error: {e}"))
}

/// Run a single driver call under `OPERATION_TIMEOUT`.
async fn bounded<T, F>(fut: F) -> Result<T, CoreError>
where
    F: Future<Output = mongodb::error::Result<T>>,
{
    match tokio::time::timeout(OPERATION_TIMEOUT, fut).await {
        Ok(res) => res.map_err(map_mongoerr),
        Err(_) => Err(CoreError::Timeout(OPERATION_TIMEOUT)),
    }
}

#[async_trait]
impl BookRepository for MongoRepo {
    async fn get_all_books(&self) -> Result<Vec<Book>, CoreError> {
        let cursor = bounded(self.collection.find(doc! {}, None)).await?;
        let docs: Vec<BookDocument> = bounded(cursor.try_collect()).await?;
        Ok(docs.into_iter().map(BookDocument::into_book).collect())
    }

    async fn get_book(&self, id: &str) -> Result<Book, CoreError> {
        let oid = parse_object_id(id)?;
        let found = bounded(self.collection.find_one(doc! { "_id": oid }, None)).await?;
        found.map(BookDocument::into_book).ok_or(CoreError::NotFound)
    }

    async fn add_book(&self, book: Book) -> Result<Book, CoreError> {
        let document = BookDocument::new_for_insert(&book, BsonDateTime::now());
        let res = bounded(self.collection.insert_one(&document, None)).await?;
        let oid = res.inserted_id.as_object_id().ok_or_else(|| {
            CoreError::Repository("insert did not return an object id".into())
        })?;
        debug!(id = %oid, "book inserted");
        Ok(BookDocument {
            id: Some(oid),
            ..document
        }
        .into_book())
    }

    async fn update_book(&self, id: &str, book: Book) -> Result<(), CoreError> {
        let oid = parse_object_id(id)?;
        let update = doc! {
            "$set": {
                "name": book.name.as_str(),
                "author": book.author.as_str(),
                "updated_at": BsonDateTime::now(),
            }
        };
        let res = bounded(self.collection.update_one(doc! { "_id": oid }, update, None)).await?;
        if res.matched_count == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_book(&self, id: &str) -> Result<(), CoreError> {
        let oid = parse_object_id(id)?;
        let res = bounded(self.collection.delete_one(doc! { "_id": oid }, None)).await?;
        if res.deleted_count == 0 {
            Err(CoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_all_books(&self) -> Result<(), CoreError> {
        bounded(self.collection.delete_many(doc! {}, None)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;
    use std::time::SystemTime;

    #[test]
    fn parse_object_id_accepts_24_hex_chars() {
        let oid = parse_object_id("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(oid.to_hex(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn parse_object_id_rejects_other_shapes() {
        for bad in ["", "1", "-1", "507f1f77bcf86cd79943901", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            assert!(
                matches!(parse_object_id(bad), Err(CoreError::InvalidId(_))),
                "expected InvalidId for {bad:?}"
            );
        }
    }

    #[test]
    fn insert_document_omits_id_and_sets_timestamps() {
        let now = BsonDateTime::from_system_time(SystemTime::UNIX_EPOCH);
        let book = Book::new("Dune", "Herbert").with_id("client-supplied");
        let document = BookDocument::new_for_insert(&book, now);

        let raw = bson::to_document(&document).unwrap();
        assert!(!raw.contains_key("_id"));
        assert_eq!(raw.get_str("name").unwrap(), "Dune");
        assert_eq!(raw.get_str("author").unwrap(), "Herbert");
        assert_eq!(*raw.get_datetime("created_at").unwrap(), now);
        assert_eq!(*raw.get_datetime("updated_at").unwrap(), now);
    }

    #[test]
    fn stored_document_maps_to_book_with_hex_id() {
        let oid = ObjectId::parse_str("111111111111111111111111").unwrap();
        let raw = doc! { "_id": oid, "name": "Book1", "author": "Author1" };
        let document: BookDocument = bson::from_document(raw).unwrap();
        let book = document.into_book();
        assert_eq!(book.id, "111111111111111111111111");
        assert_eq!(book.name, "Book1");
        assert_eq!(book.author, "Author1");
        assert!(book.created_at.is_none());
    }

    #[tokio::test]
    async fn bounded_times_out_stalled_calls() {
        tokio::time::pause();
        let stalled = std::future::pending::<mongodb::error::Result<()>>();
        let err = bounded(stalled).await.unwrap_err();
        assert!(matches!(err, CoreError::Timeout(d) if d == OPERATION_TIMEOUT));
    }

    /// Live-database contract check. Runs only when `BOOKS_TEST_MONGODB_URI`
    /// points at a server; uses a separate database so real data is untouched.
    #[tokio::test]
    async fn live_contract() {
        let Ok(uri) = std::env::var("BOOKS_TEST_MONGODB_URI") else {
            return;
        };
        let client = Client::with_uri_str(&uri).await.unwrap();
        let repo = MongoRepo::from_database(&client.database("books_service_test"));

        repo.delete_all_books().await.unwrap();
        assert!(repo.get_all_books().await.unwrap().is_empty());

        let input = Book::new("Dune", "Herbert").with_id("111111111111111111111111");
        let a = repo.add_book(input.clone()).await.unwrap();
        let b = repo.add_book(Book::new("Emma", "Austen")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, input.id);
        assert!(a.created_at.is_some());
        assert_eq!(a.created_at, a.updated_at);
        assert!(repo.get_book(&a.id).await.unwrap().same_content(&input));

        repo.update_book(&a.id, Book::new("Dune Messiah", "Herbert"))
            .await
            .unwrap();
        let updated = repo.get_book(&a.id).await.unwrap();
        assert_eq!(updated.name, "Dune Messiah");
        assert!(updated.updated_at >= a.updated_at);

        assert!(matches!(repo.get_book("1").await, Err(CoreError::InvalidId(_))));
        let missing = ObjectId::new().to_hex();
        assert!(matches!(
            repo.update_book(&missing, Book::new("x", "y")).await,
            Err(CoreError::NotFound)
        ));
        assert!(matches!(repo.delete_book(&missing).await, Err(CoreError::NotFound)));
        assert_eq!(repo.get_all_books().await.unwrap().len(), 2);

        repo.delete_book(&b.id).await.unwrap();
        assert!(matches!(repo.get_book(&b.id).await, Err(CoreError::NotFound)));

        repo.delete_all_books().await.unwrap();
        assert!(repo.get_all_books().await.unwrap().is_empty());
        drop(repo);
        client.shutdown().await;
    }
}
