use thiserror::Error;

use crate::types::{Book, Isbn};

/// Errors that can occur while applying shelf operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShelfMergeError {
    /// An operation referenced a book that is not on the shelf.
    #[error("book '{0}' is not on this shelf")]
    MissingBook(Isbn),
}

/// Local edit applied to a shelf after the backend confirmed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShelfOp {
    /// Add a book; a book already present is replaced in place.
    Add(Book),
    Remove { isbn: Isbn },
    Replace { isbn: Isbn, book: Book },
    Clear,
}

/// Local copy of one shelf's books, kept in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShelfBuffer {
    books: Vec<Book>,
}

impl ShelfBuffer {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn contains(&self, isbn: &Isbn) -> bool {
        self.books.iter().any(|book| &book.isbn == isbn)
    }

    /// Apply shelf operations in order; stops at the first failing one.
    pub fn apply_ops(&mut self, ops: &[ShelfOp]) -> Result<(), ShelfMergeError> {
        for op in ops {
            match op {
                ShelfOp::Add(book) => match self.position(&book.isbn) {
                    Some(idx) => self.books[idx] = book.clone(),
                    None => self.books.push(book.clone()),
                },
                ShelfOp::Remove { isbn } => {
                    let idx = self
                        .position(isbn)
                        .ok_or_else(|| ShelfMergeError::MissingBook(isbn.clone()))?;
                    self.books.remove(idx);
                }
                ShelfOp::Replace { isbn, book } => {
                    let idx = self
                        .position(isbn)
                        .ok_or_else(|| ShelfMergeError::MissingBook(isbn.clone()))?;
                    self.books[idx] = book.clone();
                }
                ShelfOp::Clear => self.books.clear(),
            }
        }

        Ok(())
    }

    fn position(&self, isbn: &Isbn) -> Option<usize> {
        self.books.iter().position(|book| &book.isbn == isbn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_add_replace_remove_sequence() {
        let mut shelf = ShelfBuffer::default();
        shelf
            .apply_ops(&[
                ShelfOp::Add(Book::new("111", "Kokoro")),
                ShelfOp::Add(Book::new("222", "Sanshiro")),
                ShelfOp::Replace {
                    isbn: Isbn::new("222"),
                    book: Book::new("222", "Sanshiro (revised)"),
                },
                ShelfOp::Remove {
                    isbn: Isbn::new("111"),
                },
            ])
            .expect("ops should be valid");

        assert_eq!(shelf.books().len(), 1);
        assert_eq!(shelf.books()[0].title, "Sanshiro (revised)");
    }

    #[test]
    fn adding_a_present_book_does_not_duplicate_it() {
        let mut shelf = ShelfBuffer::new(vec![Book::new("111", "Kokoro")]);
        shelf
            .apply_ops(&[ShelfOp::Add(Book::new("111", "Kokoro").with_author("Soseki"))])
            .expect("add should work");
        assert_eq!(shelf.books().len(), 1);
        assert_eq!(shelf.books()[0].authors, vec!["Soseki".to_owned()]);
    }

    #[test]
    fn fails_when_removed_book_is_missing() {
        let mut shelf = ShelfBuffer::default();
        let err = shelf
            .apply_ops(&[ShelfOp::Remove {
                isbn: Isbn::new("404"),
            }])
            .expect_err("should reject removal of unknown book");
        assert_eq!(err, ShelfMergeError::MissingBook(Isbn::new("404")));
    }

    #[test]
    fn clear_empties_the_shelf() {
        let mut shelf = ShelfBuffer::new(vec![Book::new("111", "Kokoro")]);
        shelf.apply_ops(&[ShelfOp::Clear]).expect("clear should work");
        assert!(shelf.books().is_empty());
        assert!(!shelf.contains(&Isbn::new("111")));
    }
}
