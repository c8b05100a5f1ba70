use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    store::{parse_serial_key, Entity},
};

fn default_copies() -> i32 {
    1
}

/// A book shelved in a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: i64,
    pub book_name: String,
    /// Copies on the shelf right now.
    #[serde(default = "default_copies")]
    pub available_copies: i32,
}

/// An author listed for a library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub author_id: i64,
    pub author_name: String,
}

/// A library together with its books and authors.
///
/// The books and authors are child rows; they are written in the same
/// transaction as the library and are only ever cached as part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_id: Option<i64>,
    pub title: String,
    pub available_copies: i32,
    #[serde(default)]
    pub book: Vec<Book>,
    #[serde(default)]
    pub author: Vec<Author>,
}

impl Entity for Library {
    const NAMESPACE: &'static str = "library";

    fn key(&self) -> Option<String> {
        self.library_id.map(|id| id.to_string())
    }

    fn set_key(&mut self, key: &str) -> Result<()> {
        self.library_id = Some(parse_serial_key(key)?);
        Ok(())
    }
}

/// Who is borrowing a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Student,
    Lecturer,
}

impl UserType {
    /// The value stored in the `user_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Student => "student",
            UserType::Lecturer => "lecturer",
        }
    }
}

/// The request payload for borrowing or returning a book.
#[derive(Debug, Clone, Deserialize)]
pub struct BorrowRequest {
    pub user_id: i64,
    pub user_type: UserType,
    pub book_id: i64,
}

/// A borrowing transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowRecord {
    pub borrow_id: i64,
    pub user_id: i64,
    pub user_type: UserType,
    pub book_id: i64,
    pub borrow_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
}
