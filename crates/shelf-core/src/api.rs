//! Collaborator interfaces the feature layer is handed at construction time.

use std::future::Future;

use crate::{
    error::RemoteError,
    types::{
        Book, Bookshelf, BookshelfDraft, FavoriteStatus, Isbn, Memo, MemoDraft, MemoId, ReadStatus,
        Route, ShelfId, UserId,
    },
};

/// Remote call surface of the reading-tracker backend.
///
/// Transport, auth headers and serialization live behind this trait.
pub trait ReadingApi: Send + Sync {
    fn search_books(&self, query: &str)
    -> impl Future<Output = Result<Vec<Book>, RemoteError>> + Send;

    fn favorite_status(
        &self,
        isbn: &Isbn,
    ) -> impl Future<Output = Result<FavoriteStatus, RemoteError>> + Send;

    fn toggle_favorite(&self, book: &Book) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn read_status(&self, isbn: &Isbn)
    -> impl Future<Output = Result<ReadStatus, RemoteError>> + Send;

    fn update_read_status(
        &self,
        isbn: &Isbn,
        status: ReadStatus,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn list_memos(&self, isbn: &Isbn) -> impl Future<Output = Result<Vec<Memo>, RemoteError>> + Send;

    fn create_memo(
        &self,
        draft: &MemoDraft,
    ) -> impl Future<Output = Result<MemoId, RemoteError>> + Send;

    fn update_memo(
        &self,
        id: MemoId,
        body: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete_memo(&self, id: MemoId) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn list_bookshelves(&self) -> impl Future<Output = Result<Vec<Bookshelf>, RemoteError>> + Send;

    fn create_bookshelf(
        &self,
        draft: &BookshelfDraft,
    ) -> impl Future<Output = Result<ShelfId, RemoteError>> + Send;

    fn add_to_bookshelf(
        &self,
        shelf: ShelfId,
        book: &Book,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn remove_from_bookshelf(
        &self,
        shelf: ShelfId,
        isbn: &Isbn,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete_bookshelf(&self, shelf: ShelfId)
    -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Current user and route resolution, passed down explicitly instead of read from globals.
pub trait Session: Send + Sync {
    fn current_user(&self) -> Option<UserId>;

    fn route(&self, route: &Route) -> String;

    fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}
