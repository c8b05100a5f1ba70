use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::{
    error::Result,
    store::{parse_serial_key, Entity},
};

/// A student held in the relational store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// The store-assigned id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// The student's full name.
    pub name: String,
    /// The student's age in years.
    pub age: i32,
    /// The student's email address.
    pub email: String,
    /// The department the student belongs to.
    pub dept: String,
}

impl From<&Row> for Student {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            name: row.get("name"),
            age: row.get("age"),
            email: row.get("email"),
            dept: row.get("dept"),
        }
    }
}

impl Entity for Student {
    const NAMESPACE: &'static str = "student";

    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn set_key(&mut self, key: &str) -> Result<()> {
        self.id = Some(parse_serial_key(key)?);
        Ok(())
    }
}
