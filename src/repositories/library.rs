use async_trait::async_trait;
use deadpool_postgres::{Pool, Transaction};

use crate::{
    error::{AppError, Result},
    models::library::{Author, Book, BorrowRecord, BorrowRequest, Library, UserType},
    store::{parse_serial_key, AggregateStore, DurableStore},
};

/// The result of a borrow or return: the affected record and the library
/// whose copy counts changed.
#[derive(Debug, Clone)]
pub struct Circulation {
    pub record: BorrowRecord,
    pub library_id: i64,
}

/// Library aggregate store with book circulation.
#[async_trait]
pub trait LibraryStore: AggregateStore<Library> {
    /// Lends one copy of a book. Fails with `Validation` when no copy is left.
    async fn borrow(&self, request: &BorrowRequest) -> Result<Circulation>;

    /// Closes the caller's most recent open borrow of a book.
    async fn return_book(&self, request: &BorrowRequest) -> Result<Circulation>;
}

/// Relational adapter for libraries and their books and authors.
#[derive(Clone)]
pub struct LibraryRepository {
    pool: Pool,
}

impl LibraryRepository {
    /// Creates a new `LibraryRepository`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn insert_children(
    client: &Transaction<'_>,
    library_id: i64,
    library: &Library,
) -> Result<()> {
    for book in &library.book {
        client
            .execute(
                r#"
                INSERT INTO books (book_id, book_name, available_copies, library_id)
                VALUES ($1, $2, $3, $4)
                "#,
                &[&book.book_id, &book.book_name, &book.available_copies, &library_id],
            )
            .await?;
    }
    for author in &library.author {
        client
            .execute(
                r#"
                INSERT INTO authors (author_id, author_name, library_id)
                VALUES ($1, $2, $3)
                "#,
                &[&author.author_id, &author.author_name, &library_id],
            )
            .await?;
    }
    Ok(())
}

fn parse_user_type(raw: &str) -> Result<UserType> {
    match raw {
        "student" => Ok(UserType::Student),
        "lecturer" => Ok(UserType::Lecturer),
        other => Err(AppError::Internal(format!("Unknown user type: {}", other))),
    }
}

#[async_trait]
impl DurableStore<Library> for LibraryRepository {
    async fn insert(&self, library: &Library) -> Result<String> {
        self.insert_with_children(library).await
    }

    async fn fetch(&self, key: &str) -> Result<Option<Library>> {
        let id = parse_serial_key(key)?;
        let client = self.pool.get().await?;

        let Some(row) = client
            .query_opt(
                "SELECT library_id, title, available_copies FROM libraries WHERE library_id = $1",
                &[&id],
            )
            .await?
        else {
            return Ok(None);
        };

        let book = client
            .query(
                r#"
                SELECT book_id, book_name, available_copies
                FROM books
                WHERE library_id = $1
                ORDER BY book_id
                "#,
                &[&id],
            )
            .await?
            .iter()
            .map(|r| Book {
                book_id: r.get("book_id"),
                book_name: r.get("book_name"),
                available_copies: r.get("available_copies"),
            })
            .collect();

        let author = client
            .query(
                r#"
                SELECT author_id, author_name
                FROM authors
                WHERE library_id = $1
                ORDER BY author_id
                "#,
                &[&id],
            )
            .await?
            .iter()
            .map(|r| Author {
                author_id: r.get("author_id"),
                author_name: r.get("author_name"),
            })
            .collect();

        Ok(Some(Library {
            library_id: Some(row.get("library_id")),
            title: row.get("title"),
            available_copies: row.get("available_copies"),
            book,
            author,
        }))
    }

    async fn update(&self, key: &str, library: &Library) -> Result<u64> {
        let id = parse_serial_key(key)?;
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let rows = tx
            .execute(
                "UPDATE libraries SET title = $1, available_copies = $2 WHERE library_id = $3",
                &[&library.title, &library.available_copies, &id],
            )
            .await?;
        if rows == 0 {
            return Ok(0);
        }

        tx.execute("DELETE FROM books WHERE library_id = $1", &[&id])
            .await?;
        tx.execute("DELETE FROM authors WHERE library_id = $1", &[&id])
            .await?;
        insert_children(&tx, id, library).await?;

        tx.commit().await?;
        Ok(rows)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let id = parse_serial_key(key)?;
        let client = self.pool.get().await?;
        // books and authors go with it (ON DELETE CASCADE)
        let rows = client
            .execute("DELETE FROM libraries WHERE library_id = $1", &[&id])
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl AggregateStore<Library> for LibraryRepository {
    async fn insert_with_children(&self, library: &Library) -> Result<String> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                r#"
                INSERT INTO libraries (title, available_copies)
                VALUES ($1, $2)
                RETURNING library_id
                "#,
                &[&library.title, &library.available_copies],
            )
            .await?;
        let id: i64 = row.get("library_id");

        // Any failure below drops `tx`, which rolls the parent back too.
        insert_children(&tx, id, library).await?;
        tx.commit().await?;

        tracing::debug!(
            "Inserted library {} with {} books and {} authors",
            id,
            library.book.len(),
            library.author.len()
        );
        Ok(id.to_string())
    }
}

#[async_trait]
impl LibraryStore for LibraryRepository {
    async fn borrow(&self, request: &BorrowRequest) -> Result<Circulation> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let book = tx
            .query_opt(
                "SELECT library_id, available_copies FROM books WHERE book_id = $1 FOR UPDATE",
                &[&request.book_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        let library_id: i64 = book.get("library_id");
        let available: i32 = book.get("available_copies");
        if available <= 0 {
            return Err(AppError::Validation("Book not available".to_string()));
        }

        let row = tx
            .query_one(
                r#"
                INSERT INTO borrow_records (user_id, user_type, book_id, borrow_date)
                VALUES ($1, $2, $3, CURRENT_DATE)
                RETURNING borrow_id, borrow_date, return_date
                "#,
                &[&request.user_id, &request.user_type.as_str(), &request.book_id],
            )
            .await?;
        tx.execute(
            "UPDATE books SET available_copies = available_copies - 1 WHERE book_id = $1",
            &[&request.book_id],
        )
        .await?;
        tx.commit().await?;

        Ok(Circulation {
            record: BorrowRecord {
                borrow_id: row.get("borrow_id"),
                user_id: request.user_id,
                user_type: request.user_type,
                book_id: request.book_id,
                borrow_date: row.get("borrow_date"),
                return_date: row.get("return_date"),
            },
            library_id,
        })
    }

    async fn return_book(&self, request: &BorrowRequest) -> Result<Circulation> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                r#"
                UPDATE borrow_records
                SET return_date = CURRENT_DATE
                WHERE borrow_id = (
                    SELECT borrow_id
                    FROM borrow_records
                    WHERE user_id = $1 AND user_type = $2 AND book_id = $3
                      AND return_date IS NULL
                    ORDER BY borrow_date DESC, borrow_id DESC
                    LIMIT 1
                    FOR UPDATE
                )
                RETURNING borrow_id, user_type, borrow_date, return_date
                "#,
                &[&request.user_id, &request.user_type.as_str(), &request.book_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;

        let book = tx
            .query_opt(
                r#"
                UPDATE books
                SET available_copies = available_copies + 1
                WHERE book_id = $1
                RETURNING library_id
                "#,
                &[&request.book_id],
            )
            .await?
            .ok_or(AppError::NotFound)?;
        tx.commit().await?;

        let user_type: String = row.get("user_type");
        Ok(Circulation {
            record: BorrowRecord {
                borrow_id: row.get("borrow_id"),
                user_id: request.user_id,
                user_type: parse_user_type(&user_type)?,
                book_id: request.book_id,
                borrow_date: row.get("borrow_date"),
                return_date: row.get("return_date"),
            },
            library_id: book.get("library_id"),
        })
    }
}
