use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Book, BookRepository, CoreError};

/// Simple in-memory repository. Ids are decimal integers handed out in
/// increasing order, like an auto-increment primary key.
pub struct InMemoryBookRepo {
    inner: Mutex<State>,
}

struct State {
    books: BTreeMap<u64, Book>,
    next_id: u64,
}

impl InMemoryBookRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                books: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    fn key(id: &str) -> Result<u64, CoreError> {
        id.parse::<u64>()
            .map_err(|_| CoreError::InvalidId(id.to_string()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryBookRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepo {
    async fn get_all_books(&self) -> Result<Vec<Book>, CoreError> {
        let state = self.lock()?;
        Ok(state.books.values().cloned().collect())
    }

    async fn get_book(&self, id: &str) -> Result<Book, CoreError> {
        let key = Self::key(id)?;
        let state = self.lock()?;
        state.books.get(&key).cloned().ok_or(CoreError::NotFound)
    }

    async fn add_book(&self, book: Book) -> Result<Book, CoreError> {
        let mut state = self.lock()?;
        let key = state.next_id;
        if state.books.contains_key(&key) {
            return Err(CoreError::AlreadyExists);
        }
        state.next_id += 1;
        let stored = Book::new(book.name, book.author).with_id(key.to_string());
        state.books.insert(key, stored.clone());
        Ok(stored)
    }

    async fn update_book(&self, id: &str, book: Book) -> Result<(), CoreError> {
        let key = Self::key(id)?;
        let mut state = self.lock()?;
        match state.books.get_mut(&key) {
            Some(existing) => {
                existing.name = book.name;
                existing.author = book.author;
                Ok(())
            }
            None => Err(CoreError::NotFound),
        }
    }

    async fn delete_book(&self, id: &str) -> Result<(), CoreError> {
        let key = Self::key(id)?;
        let mut state = self.lock()?;
        state
            .books
            .remove(&key)
            .map(|_| ())
            .ok_or(CoreError::NotFound)
    }

    async fn delete_all_books(&self) -> Result<(), CoreError> {
        let mut state = self.lock()?;
        state.books.clear();
        Ok(())
    }
}
