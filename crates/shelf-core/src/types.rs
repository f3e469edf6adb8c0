use std::fmt;

use serde::{Deserialize, Serialize};

/// ISBN used as the stable book identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Isbn(String);

impl Isbn {
    /// Wrap an ISBN, dropping hyphens and surrounding whitespace.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(
            value
                .as_ref()
                .trim()
                .chars()
                .filter(|ch| *ch != '-')
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signed-in user identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// Memo identifier assigned by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct MemoId(pub u64);

/// Bookshelf identifier assigned by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ShelfId(pub u64);

/// Book as returned by search and shelf listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub isbn: Isbn,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl Book {
    pub fn new(isbn: impl AsRef<str>, title: impl Into<String>) -> Self {
        Self {
            isbn: Isbn::new(isbn),
            title: title.into(),
            authors: Vec::new(),
            thumbnail_url: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.authors.push(author.into());
        self
    }
}

/// Response of the favorite-status endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStatus {
    pub is_favorite: bool,
}

/// Reading progress for one book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    #[default]
    Unread,
    Reading,
    Finished,
}

/// Memo attached to a book.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    pub id: MemoId,
    pub isbn: Isbn,
    pub body: String,
}

/// Input for creating a memo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoDraft {
    pub isbn: Isbn,
    pub body: String,
}

/// Named collection of books.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bookshelf {
    pub id: ShelfId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub books: Vec<Book>,
}

/// Input for creating a bookshelf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookshelfDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Navigation targets resolved by the injected [`crate::api::Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Search { query: String },
    BookDetail(Isbn),
    Bookshelf(ShelfId),
    Favorites,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_isbn_hyphens_and_whitespace() {
        assert_eq!(Isbn::new(" 978-4-06-293480-4 ").as_str(), "9784062934804");
    }

    #[test]
    fn favorite_status_uses_camel_case_wire_name() {
        let status: FavoriteStatus =
            serde_json::from_str(r#"{"isFavorite":true}"#).expect("status should decode");
        assert!(status.is_favorite);
    }

    #[test]
    fn book_decodes_with_missing_optional_fields() {
        let book: Book = serde_json::from_str(r#"{"isbn":"9784101010014","title":"Kokoro"}"#)
            .expect("book should decode");
        assert_eq!(book.isbn, Isbn::new("9784101010014"));
        assert!(book.authors.is_empty());
        assert_eq!(book.thumbnail_url, None);
    }
}
