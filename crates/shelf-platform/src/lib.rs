//! In-memory backend and session for the reading tracker.
//!
//! Stands in for the REST backend in the smoke app and feature tests: same status codes and
//! error bodies, no network.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, RwLock},
    time::Duration,
};

use serde_json::{Map, Value, json};
use shelf_core::{
    Book, Bookshelf, BookshelfDraft, FavoriteStatus, HttpError, Isbn, Memo, MemoDraft, MemoId,
    ReadStatus, ReadingApi, RemoteError, Route, Session, ShelfId, UserId,
};
use tracing::debug;

/// Remote operations, used to target fault injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOp {
    SearchBooks,
    FavoriteStatus,
    ToggleFavorite,
    ReadStatus,
    UpdateReadStatus,
    ListMemos,
    CreateMemo,
    UpdateMemo,
    DeleteMemo,
    ListBookshelves,
    CreateBookshelf,
    AddToBookshelf,
    RemoveFromBookshelf,
    DeleteBookshelf,
}

#[derive(Debug, Default)]
struct Library {
    catalog: BTreeMap<Isbn, Book>,
    favorites: HashSet<Isbn>,
    statuses: HashMap<Isbn, ReadStatus>,
    memos: BTreeMap<MemoId, Memo>,
    shelves: BTreeMap<ShelfId, Bookshelf>,
    next_id: u64,
    faults: HashMap<ApiOp, VecDeque<RemoteError>>,
    calls: HashMap<ApiOp, usize>,
}

impl Library {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn book(&self, isbn: &Isbn) -> Result<&Book, RemoteError> {
        self.catalog
            .get(isbn)
            .ok_or_else(|| not_found(format!("No book with ISBN {isbn}.")))
    }

    fn shelf_mut(&mut self, shelf: ShelfId) -> Result<&mut Bookshelf, RemoteError> {
        self.shelves
            .get_mut(&shelf)
            .ok_or_else(|| not_found("The bookshelf does not exist."))
    }
}

/// Cloneable in-memory library; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReadingApi {
    library: Arc<RwLock<Library>>,
    latency: Duration,
}

impl InMemoryReadingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it touches the library.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_books(self, books: impl IntoIterator<Item = Book>) -> Self {
        if let Ok(mut library) = self.library.write() {
            for book in books {
                library.catalog.insert(book.isbn.clone(), book);
            }
        }
        self
    }

    /// Make the next call of `op` fail with `error`. Queued faults are consumed in order.
    pub fn fail_next(&self, op: ApiOp, error: RemoteError) {
        if let Ok(mut library) = self.library.write() {
            library.faults.entry(op).or_default().push_back(error);
        }
    }

    /// Number of calls of `op` that reached the library, failed ones included.
    pub fn calls(&self, op: ApiOp) -> usize {
        self.library
            .read()
            .map(|library| library.calls.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn server_favorite(&self, isbn: &Isbn) -> bool {
        self.library
            .read()
            .is_ok_and(|library| library.favorites.contains(isbn))
    }

    pub fn server_memos(&self, isbn: &Isbn) -> Vec<Memo> {
        self.library
            .read()
            .map(|library| {
                library
                    .memos
                    .values()
                    .filter(|memo| &memo.isbn == isbn)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn call<T>(
        &self,
        op: ApiOp,
        handler: impl FnOnce(&mut Library) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut library = self
            .library
            .write()
            .map_err(|_| RemoteError::Transport("library lock poisoned".to_owned()))?;
        *library.calls.entry(op).or_default() += 1;
        if let Some(fault) = library.faults.get_mut(&op).and_then(VecDeque::pop_front) {
            debug!(?op, error = %fault, "injected fault");
            return Err(fault);
        }
        handler(&mut library)
    }
}

fn not_found(message: impl Into<String>) -> RemoteError {
    error_with_body(404, json!({ "message": message.into() }))
}

fn invalid(field: &str, message: &str) -> RemoteError {
    let mut fields = Map::new();
    fields.insert(field.to_owned(), json!([message]));
    error_with_body(422, json!({ "errors": Value::Object(fields) }))
}

fn error_with_body(status: u16, body: Value) -> RemoteError {
    RemoteError::Http(HttpError::new(status).with_body(body))
}

impl ReadingApi for InMemoryReadingApi {
    async fn search_books(&self, query: &str) -> Result<Vec<Book>, RemoteError> {
        let needle = query.trim().to_lowercase();
        self.call(ApiOp::SearchBooks, |library| {
            Ok(library
                .catalog
                .values()
                .filter(|book| {
                    book.title.to_lowercase().contains(&needle)
                        || book.isbn.as_str() == needle
                        || book
                            .authors
                            .iter()
                            .any(|author| author.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect())
        })
        .await
    }

    async fn favorite_status(&self, isbn: &Isbn) -> Result<FavoriteStatus, RemoteError> {
        self.call(ApiOp::FavoriteStatus, |library| {
            library.book(isbn)?;
            Ok(FavoriteStatus {
                is_favorite: library.favorites.contains(isbn),
            })
        })
        .await
    }

    async fn toggle_favorite(&self, book: &Book) -> Result<(), RemoteError> {
        self.call(ApiOp::ToggleFavorite, |library| {
            library
                .catalog
                .entry(book.isbn.clone())
                .or_insert_with(|| book.clone());
            if !library.favorites.remove(&book.isbn) {
                library.favorites.insert(book.isbn.clone());
            }
            Ok(())
        })
        .await
    }

    async fn read_status(&self, isbn: &Isbn) -> Result<ReadStatus, RemoteError> {
        self.call(ApiOp::ReadStatus, |library| {
            library.book(isbn)?;
            Ok(library.statuses.get(isbn).copied().unwrap_or_default())
        })
        .await
    }

    async fn update_read_status(&self, isbn: &Isbn, status: ReadStatus) -> Result<(), RemoteError> {
        self.call(ApiOp::UpdateReadStatus, |library| {
            library.book(isbn)?;
            library.statuses.insert(isbn.clone(), status);
            Ok(())
        })
        .await
    }

    async fn list_memos(&self, isbn: &Isbn) -> Result<Vec<Memo>, RemoteError> {
        self.call(ApiOp::ListMemos, |library| {
            Ok(library
                .memos
                .values()
                .filter(|memo| &memo.isbn == isbn)
                .cloned()
                .collect())
        })
        .await
    }

    async fn create_memo(&self, draft: &MemoDraft) -> Result<MemoId, RemoteError> {
        self.call(ApiOp::CreateMemo, |library| {
            if draft.body.trim().is_empty() {
                return Err(invalid("body", "The memo field is required."));
            }
            library.book(&draft.isbn)?;
            let id = MemoId(library.allocate_id());
            library.memos.insert(
                id,
                Memo {
                    id,
                    isbn: draft.isbn.clone(),
                    body: draft.body.clone(),
                },
            );
            Ok(id)
        })
        .await
    }

    async fn update_memo(&self, id: MemoId, body: &str) -> Result<(), RemoteError> {
        self.call(ApiOp::UpdateMemo, |library| {
            if body.trim().is_empty() {
                return Err(invalid("body", "The memo field is required."));
            }
            let memo = library
                .memos
                .get_mut(&id)
                .ok_or_else(|| not_found("The memo does not exist."))?;
            memo.body = body.to_owned();
            Ok(())
        })
        .await
    }

    async fn delete_memo(&self, id: MemoId) -> Result<(), RemoteError> {
        self.call(ApiOp::DeleteMemo, |library| {
            library
                .memos
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| not_found("The memo does not exist."))
        })
        .await
    }

    async fn list_bookshelves(&self) -> Result<Vec<Bookshelf>, RemoteError> {
        self.call(ApiOp::ListBookshelves, |library| {
            Ok(library.shelves.values().cloned().collect())
        })
        .await
    }

    async fn create_bookshelf(&self, draft: &BookshelfDraft) -> Result<ShelfId, RemoteError> {
        self.call(ApiOp::CreateBookshelf, |library| {
            let name = draft.name.trim();
            if name.is_empty() {
                return Err(invalid("name", "The name field is required."));
            }
            if library.shelves.values().any(|shelf| shelf.name == name) {
                return Err(invalid("name", "A bookshelf with this name already exists."));
            }
            let id = ShelfId(library.allocate_id());
            library.shelves.insert(
                id,
                Bookshelf {
                    id,
                    name: name.to_owned(),
                    description: draft.description.clone(),
                    books: Vec::new(),
                },
            );
            Ok(id)
        })
        .await
    }

    async fn add_to_bookshelf(&self, shelf: ShelfId, book: &Book) -> Result<(), RemoteError> {
        self.call(ApiOp::AddToBookshelf, |library| {
            library
                .catalog
                .entry(book.isbn.clone())
                .or_insert_with(|| book.clone());
            let shelf = library.shelf_mut(shelf)?;
            if !shelf.books.iter().any(|entry| entry.isbn == book.isbn) {
                shelf.books.push(book.clone());
            }
            Ok(())
        })
        .await
    }

    async fn remove_from_bookshelf(&self, shelf: ShelfId, isbn: &Isbn) -> Result<(), RemoteError> {
        self.call(ApiOp::RemoveFromBookshelf, |library| {
            let shelf = library.shelf_mut(shelf)?;
            let before = shelf.books.len();
            shelf.books.retain(|book| &book.isbn != isbn);
            if shelf.books.len() == before {
                return Err(not_found("The book is not on this bookshelf."));
            }
            Ok(())
        })
        .await
    }

    async fn delete_bookshelf(&self, shelf: ShelfId) -> Result<(), RemoteError> {
        self.call(ApiOp::DeleteBookshelf, |library| {
            library
                .shelves
                .remove(&shelf)
                .map(|_| ())
                .ok_or_else(|| not_found("The bookshelf does not exist."))
        })
        .await
    }
}

/// Session with a fixed user and path-style routes.
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Option<UserId>,
    base_path: String,
}

impl StaticSession {
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: Some(user),
            base_path: String::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Prefix every route, e.g. `/app`.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_end_matches('/').to_owned();
        self
    }
}

impl Session for StaticSession {
    fn current_user(&self) -> Option<UserId> {
        self.user.clone()
    }

    fn route(&self, route: &Route) -> String {
        let path = match route {
            Route::Search { query } => {
                let query = query.split_whitespace().collect::<Vec<_>>().join("+");
                format!("/books/search?q={query}")
            }
            Route::BookDetail(isbn) => format!("/books/{isbn}"),
            Route::Bookshelf(shelf) => format!("/bookshelves/{}", shelf.0),
            Route::Favorites => "/favorites".to_owned(),
        };
        format!("{}{path}", self.base_path)
    }
}
