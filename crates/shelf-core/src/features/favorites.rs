use tracing::debug;

use super::ShelfContext;
use crate::{
    api::{ReadingApi, Session},
    error::{RemoteError, classify_error},
    operation::AsyncOperation,
    toggle::{OptimisticToggle, ToggleOutcome},
    types::{Book, FavoriteStatus, Isbn},
};

const LOAD_ACTION: &str = "favorite.status";
const TOGGLE_ACTION: &str = "favorite.toggle";

/// Favorite marks for the books shown on one page.
#[derive(Debug)]
pub struct Favorites<A, S> {
    ctx: ShelfContext<A, S>,
    marks: OptimisticToggle<Isbn>,
    status: AsyncOperation<FavoriteStatus>,
}

impl<A: ReadingApi, S: Session> Favorites<A, S> {
    pub fn new(ctx: ShelfContext<A, S>) -> Self {
        Self {
            ctx,
            marks: OptimisticToggle::new("favorite"),
            status: AsyncOperation::new(LOAD_ACTION),
        }
    }

    /// Fetch the server's favorite flag for `isbn` and record it as confirmed.
    pub async fn load(&self, isbn: &Isbn) -> Result<bool, RemoteError> {
        let api = self.ctx.api();
        let status = self
            .status
            .execute(|| api.favorite_status(isbn))
            .await
            .inspect_err(|err| self.ctx.report(LOAD_ACTION, err))?;
        self.marks.seed(isbn.clone(), status.is_favorite);
        Ok(status.is_favorite)
    }

    /// Flip the favorite mark for `book` and confirm it with the backend.
    ///
    /// Anonymous users get an `Auth` rollback without any flip or remote call.
    pub async fn toggle(&self, book: &Book) -> ToggleOutcome<bool> {
        if !self.ctx.session().is_signed_in() {
            let error = classify_error(&RemoteError::status(401));
            self.ctx.notices().report(TOGGLE_ACTION, &error);
            return ToggleOutcome::RolledBack(error);
        }

        let api = self.ctx.api();
        let outcome = self
            .marks
            .toggle(book.isbn.clone(), || api.toggle_favorite(book))
            .await;
        match &outcome {
            ToggleOutcome::RolledBack(error) => self.ctx.notices().report(TOGGLE_ACTION, error),
            ToggleOutcome::Superseded => {
                debug!(isbn = %book.isbn, "favorite toggle superseded by a newer one");
            }
            ToggleOutcome::Applied(_) => {}
        }
        outcome
    }

    pub fn is_favorite(&self, isbn: &Isbn) -> bool {
        self.marks.is_on(isbn)
    }

    pub fn is_pending(&self, isbn: &Isbn) -> bool {
        self.marks.is_pending(isbn)
    }

    /// Lifecycle of the most recent status fetch.
    pub fn status_operation(&self) -> &AsyncOperation<FavoriteStatus> {
        &self.status
    }

    /// Drop local state for a card that went away.
    pub fn forget(&self, isbn: &Isbn) {
        self.marks.forget(isbn);
    }
}
