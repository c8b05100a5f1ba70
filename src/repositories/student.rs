use async_trait::async_trait;
use deadpool_postgres::Pool;

use crate::{
    error::Result,
    models::student::Student,
    store::{parse_serial_key, DurableStore},
};

/// Relational adapter for the `students` table.
#[derive(Clone)]
pub struct StudentRepository {
    pool: Pool,
}

impl StudentRepository {
    /// Creates a new `StudentRepository`.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableStore<Student> for StudentRepository {
    async fn insert(&self, student: &Student) -> Result<String> {
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                INSERT INTO students (name, age, email, dept)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .await?;
        let row = client
            .query_one(&stmt, &[&student.name, &student.age, &student.email, &student.dept])
            .await?;
        let id: i64 = row.get("id");
        tracing::debug!("Inserted student {}", id);
        Ok(id.to_string())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Student>> {
        let id = parse_serial_key(key)?;
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                SELECT id, name, age, email, dept
                FROM students
                WHERE id = $1
                "#,
            )
            .await?;
        let row = client.query_opt(&stmt, &[&id]).await?;
        Ok(row.as_ref().map(Student::from))
    }

    async fn update(&self, key: &str, student: &Student) -> Result<u64> {
        let id = parse_serial_key(key)?;
        let client = self.pool.get().await?;
        let stmt = client
            .prepare_cached(
                r#"
                UPDATE students
                SET name = $1, age = $2, email = $3, dept = $4
                WHERE id = $5
                "#,
            )
            .await?;
        let rows = client
            .execute(
                &stmt,
                &[&student.name, &student.age, &student.email, &student.dept, &id],
            )
            .await?;
        Ok(rows)
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let id = parse_serial_key(key)?;
        let client = self.pool.get().await?;
        let rows = client
            .execute("DELETE FROM students WHERE id = $1", &[&id])
            .await?;
        Ok(rows)
    }
}
