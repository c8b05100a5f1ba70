use crate::error::{AppError, Result};
use crate::models::{lecturer::Lecturer, library::Library, student::Student};

/// The only mail domain accepted for people records.
const MAIL_DOMAIN: &str = "@gmail.com";

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} cannot be empty", field)));
    }
    Ok(())
}

fn validate_person(name: &str, age: i32, email: &str) -> Result<()> {
    require("name", name)?;
    require("email", email)?;

    match email.strip_suffix(MAIL_DOMAIN) {
        None => return Err(invalid(format!("email must end with {}", MAIL_DOMAIN))),
        Some("") => return Err(invalid(format!("email needs a name before {}", MAIL_DOMAIN))),
        Some(_) => {}
    }

    if age <= 0 || age >= 100 {
        return Err(invalid("age must be between 1 and 99"));
    }
    Ok(())
}

pub fn validate_student(student: &Student) -> Result<()> {
    validate_person(&student.name, student.age, &student.email)?;
    require("dept", &student.dept)
}

pub fn validate_lecturer(lecturer: &Lecturer) -> Result<()> {
    validate_person(&lecturer.name, lecturer.age, &lecturer.email)?;
    require("designation", &lecturer.designation)
}

/// A library needs a title and at least one book; every child needs a
/// positive id and a name.
pub fn validate_library(library: &Library) -> Result<()> {
    require("title", &library.title)?;

    if library.book.is_empty() {
        return Err(invalid("at least one book is required"));
    }
    if library.available_copies < 0 {
        return Err(invalid("available_copies cannot be negative"));
    }

    for book in &library.book {
        if book.book_id <= 0 {
            return Err(invalid(format!("invalid book_id: {}", book.book_id)));
        }
        require("book_name", &book.book_name)?;
        if book.available_copies < 0 {
            return Err(invalid(format!(
                "available_copies of book {} cannot be negative",
                book.book_id
            )));
        }
    }

    for author in &library.author {
        if author.author_id <= 0 {
            return Err(invalid(format!("invalid author_id: {}", author.author_id)));
        }
        require("author_name", &author.author_name)?;
    }
    Ok(())
}

pub fn validate_borrow_user(user_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(invalid("invalid user_id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::library::{Author, Book};

    fn student(email: &str, age: i32) -> Student {
        Student {
            id: None,
            name: "Ada".to_string(),
            age,
            email: email.to_string(),
            dept: "CS".to_string(),
        }
    }

    #[test]
    fn people_need_a_gmail_address_with_a_name() {
        assert!(validate_student(&student("ada@gmail.com", 20)).is_ok());
        assert!(validate_student(&student("@gmail.com", 20)).is_err());
        assert!(validate_student(&student("ada@yahoo.com", 20)).is_err());
        assert!(validate_student(&student("", 20)).is_err());
    }

    #[test]
    fn age_is_bounded() {
        assert!(validate_student(&student("ada@gmail.com", 0)).is_err());
        assert!(validate_student(&student("ada@gmail.com", 1)).is_ok());
        assert!(validate_student(&student("ada@gmail.com", 99)).is_ok());
        assert!(validate_student(&student("ada@gmail.com", 100)).is_err());
    }

    #[test]
    fn lecturers_need_a_designation() {
        let lecturer = Lecturer {
            id: None,
            name: "Grace".to_string(),
            age: 45,
            email: "grace@gmail.com".to_string(),
            designation: " ".to_string(),
        };
        assert!(matches!(validate_lecturer(&lecturer), Err(AppError::Validation(_))));
    }

    #[test]
    fn libraries_need_books_with_valid_ids() {
        let mut library = Library {
            library_id: None,
            title: "Central".to_string(),
            available_copies: 3,
            book: vec![],
            author: vec![Author {
                author_id: 1,
                author_name: "Tagore".to_string(),
            }],
        };
        assert!(validate_library(&library).is_err());

        library.book.push(Book {
            book_id: 0,
            book_name: "Gitanjali".to_string(),
            available_copies: 1,
        });
        assert!(validate_library(&library).is_err());

        library.book[0].book_id = 7;
        assert!(validate_library(&library).is_ok());
    }
}
