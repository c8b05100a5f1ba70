//! In-process adapters with the same contracts as the database-backed ones.
//!
//! Used by the test suites, and handy for running the service without a
//! database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    error::{AppError, Result},
    models::{
        account::Account,
        library::{BorrowRecord, BorrowRequest, Library},
    },
    repositories::{
        account::AccountStore,
        document::new_object_id,
        library::{Circulation, LibraryStore},
    },
    store::{parse_serial_key, AggregateStore, DurableStore, Entity},
};

/// How a `MemoryStore` assigns keys.
enum KeyScheme {
    Serial(AtomicI64),
    ObjectId,
}

/// Keyed entity storage in a map.
///
/// Keys are matched exactly as given.
pub struct MemoryStore<E> {
    rows: RwLock<BTreeMap<String, E>>,
    keys: KeyScheme,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> MemoryStore<E> {
    /// A store assigning sequential integer keys starting at 1.
    pub fn serial() -> Self {
        Self::with_keys(KeyScheme::Serial(AtomicI64::new(1)))
    }

    /// A store assigning generated object ids.
    pub fn object_id() -> Self {
        Self::with_keys(KeyScheme::ObjectId)
    }

    fn with_keys(keys: KeyScheme) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            keys,
            _entity: PhantomData,
        }
    }

    fn next_key(&self) -> String {
        match &self.keys {
            KeyScheme::Serial(next) => next.fetch_add(1, Ordering::SeqCst).to_string(),
            KeyScheme::ObjectId => new_object_id(),
        }
    }

    /// Number of stored entities.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait]
impl<E: Entity> DurableStore<E> for MemoryStore<E> {
    async fn insert(&self, entity: &E) -> Result<String> {
        let key = self.next_key();
        let mut stored = entity.clone();
        stored.set_key(&key)?;
        self.rows.write().await.insert(key.clone(), stored);
        Ok(key)
    }

    async fn fetch(&self, key: &str) -> Result<Option<E>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn update(&self, key: &str, entity: &E) -> Result<u64> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(key) {
            Some(slot) => {
                let mut stored = entity.clone();
                stored.set_key(key)?;
                *slot = stored;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        Ok(self.rows.write().await.remove(key).map_or(0, |_| 1))
    }
}

#[derive(Default)]
struct Circulating {
    libraries: BTreeMap<i64, Library>,
    borrows: Vec<BorrowRecord>,
    next_library: i64,
    next_borrow: i64,
}

impl Circulating {
    /// Book ids must be unique across all libraries, author ids within one.
    fn check_children(&self, library: &Library, replacing: Option<i64>) -> Result<()> {
        let mut books = HashSet::new();
        for book in &library.book {
            let shelved_elsewhere = self
                .libraries
                .iter()
                .filter(|(id, _)| Some(**id) != replacing)
                .any(|(_, l)| l.book.iter().any(|b| b.book_id == book.book_id));
            if shelved_elsewhere || !books.insert(book.book_id) {
                return Err(AppError::Conflict(format!(
                    "Book {} already exists",
                    book.book_id
                )));
            }
        }

        let mut authors = HashSet::new();
        for author in &library.author {
            if !authors.insert(author.author_id) {
                return Err(AppError::Conflict(format!(
                    "Author {} listed twice",
                    author.author_id
                )));
            }
        }
        Ok(())
    }

    fn shelf_of(&mut self, book_id: i64) -> Option<(i64, &mut i32)> {
        self.libraries.iter_mut().find_map(|(id, library)| {
            library
                .book
                .iter_mut()
                .find(|b| b.book_id == book_id)
                .map(|b| (*id, &mut b.available_copies))
        })
    }
}

/// Libraries with their books, authors and borrow records.
#[derive(Default)]
pub struct MemoryLibraryStore {
    state: RwLock<Circulating>,
}

impl MemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any library shelves `book_id`.
    pub async fn has_book(&self, book_id: i64) -> bool {
        self.state
            .read()
            .await
            .libraries
            .values()
            .any(|l| l.book.iter().any(|b| b.book_id == book_id))
    }

    /// All borrow records, oldest first.
    pub async fn borrows(&self) -> Vec<BorrowRecord> {
        self.state.read().await.borrows.clone()
    }
}

#[async_trait]
impl DurableStore<Library> for MemoryLibraryStore {
    async fn insert(&self, library: &Library) -> Result<String> {
        self.insert_with_children(library).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<Library>> {
        let id = parse_serial_key(key)?;
        Ok(self.state.read().await.libraries.get(&id).cloned())
    }

    async fn update(&self, key: &str, library: &Library) -> Result<u64> {
        let id = parse_serial_key(key)?;
        let mut state = self.state.write().await;
        if !state.libraries.contains_key(&id) {
            return Ok(0);
        }
        state.check_children(library, Some(id))?;

        let mut stored = library.clone();
        stored.library_id = Some(id);
        state.libraries.insert(id, stored);
        Ok(1)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let id = parse_serial_key(key)?;
        Ok(self
            .state
            .write()
            .await
            .libraries
            .remove(&id)
            .map_or(0, |_| 1))
    }
}

#[async_trait]
impl AggregateStore<Library> for MemoryLibraryStore {
    async fn insert_with_children(&self, library: &Library) -> Result<String> {
        let mut state = self.state.write().await;
        // validated before anything is stored, so a rejected insert leaves no trace
        state.check_children(library, None)?;

        state.next_library += 1;
        let id = state.next_library;
        let mut stored = library.clone();
        stored.library_id = Some(id);
        state.libraries.insert(id, stored);
        Ok(id.to_string())
    }
}

#[async_trait]
impl LibraryStore for MemoryLibraryStore {
    async fn borrow(&self, request: &BorrowRequest) -> Result<Circulation> {
        let mut state = self.state.write().await;
        let (library_id, copies) = state.shelf_of(request.book_id).ok_or(AppError::NotFound)?;
        if *copies <= 0 {
            return Err(AppError::Validation("Book not available".to_string()));
        }
        *copies -= 1;

        state.next_borrow += 1;
        let record = BorrowRecord {
            borrow_id: state.next_borrow,
            user_id: request.user_id,
            user_type: request.user_type,
            book_id: request.book_id,
            borrow_date: Utc::now().date_naive(),
            return_date: None,
        };
        state.borrows.push(record.clone());
        Ok(Circulation { record, library_id })
    }

    async fn return_book(&self, request: &BorrowRequest) -> Result<Circulation> {
        let mut state = self.state.write().await;
        let index = state
            .borrows
            .iter()
            .rposition(|r| {
                r.user_id == request.user_id
                    && r.user_type == request.user_type
                    && r.book_id == request.book_id
                    && r.return_date.is_none()
            })
            .ok_or(AppError::NotFound)?;

        let (library_id, copies) = state.shelf_of(request.book_id).ok_or(AppError::NotFound)?;
        *copies += 1;

        let record = &mut state.borrows[index];
        record.return_date = Some(Utc::now().date_naive());
        Ok(Circulation {
            record: record.clone(),
            library_id,
        })
    }
}

/// Accounts in a map keyed by email.
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(email).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(AppError::Conflict(format!("Account {} already exists", email)));
        }
        let account = Account {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        accounts.insert(email.to_string(), account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::library::{Book, UserType};

    fn library(book_ids: &[i64], copies: i32) -> Library {
        Library {
            library_id: None,
            title: "Central".to_string(),
            available_copies: copies,
            book: book_ids
                .iter()
                .map(|id| Book {
                    book_id: *id,
                    book_name: format!("Book {}", id),
                    available_copies: copies,
                })
                .collect(),
            author: vec![],
        }
    }

    fn request(book_id: i64) -> BorrowRequest {
        BorrowRequest {
            user_id: 3,
            user_type: UserType::Student,
            book_id,
        }
    }

    #[tokio::test]
    async fn serial_keys_are_sequential_and_exact() {
        let store = MemoryStore::<crate::models::student::Student>::serial();
        let student = crate::models::student::Student {
            id: None,
            name: "Ada".to_string(),
            age: 20,
            email: "ada@gmail.com".to_string(),
            dept: "CS".to_string(),
        };

        assert_eq!(store.insert(&student).await.ok().as_deref(), Some("1"));
        assert_eq!(store.insert(&student).await.ok().as_deref(), Some("2"));
        assert!(store.fetch("01").await.unwrap().is_none());
        assert_eq!(store.fetch("1").await.unwrap().and_then(|s| s.id), Some(1));
    }

    #[tokio::test]
    async fn borrow_and_return_move_copies() {
        let store = MemoryLibraryStore::new();
        store.insert_with_children(&library(&[10], 1)).await.unwrap();

        let lent = store.borrow(&request(10)).await.unwrap();
        assert_eq!(lent.library_id, 1);
        assert!(lent.record.return_date.is_none());

        // no copies left
        assert!(matches!(
            store.borrow(&request(10)).await,
            Err(AppError::Validation(_))
        ));

        let returned = store.return_book(&request(10)).await.unwrap();
        assert_eq!(returned.record.borrow_id, lent.record.borrow_id);
        assert!(returned.record.return_date.is_some());

        let shelved = store.fetch("1").await.unwrap().unwrap();
        assert_eq!(shelved.book[0].available_copies, 1);
    }

    #[tokio::test]
    async fn return_without_open_borrow_is_not_found() {
        let store = MemoryLibraryStore::new();
        store.insert_with_children(&library(&[10], 2)).await.unwrap();

        assert!(matches!(
            store.return_book(&request(10)).await,
            Err(AppError::NotFound)
        ));
        assert!(matches!(
            store.borrow(&request(99)).await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_accounts_conflict() {
        let store = MemoryAccountStore::new();
        store.create("a@b.c", "hash").await.unwrap();
        assert!(matches!(
            store.create("a@b.c", "hash").await,
            Err(AppError::Conflict(_))
        ));
    }
}
