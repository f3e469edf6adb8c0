use super::ShelfContext;
use crate::{
    api::{ReadingApi, Session},
    error::RemoteError,
    operation::AsyncOperation,
    toggle::{OptimisticMap, ToggleOutcome},
    types::{Isbn, ReadStatus},
};

const LOAD_ACTION: &str = "read_status.load";
const UPDATE_ACTION: &str = "read_status.update";

/// Optimistic reading-progress tracker.
#[derive(Debug)]
pub struct ReadStatusTracker<A, S> {
    ctx: ShelfContext<A, S>,
    statuses: OptimisticMap<Isbn, ReadStatus>,
    load: AsyncOperation<ReadStatus>,
}

impl<A: ReadingApi, S: Session> ReadStatusTracker<A, S> {
    pub fn new(ctx: ShelfContext<A, S>) -> Self {
        Self {
            ctx,
            statuses: OptimisticMap::new("read_status"),
            load: AsyncOperation::new(LOAD_ACTION),
        }
    }

    pub async fn load(&self, isbn: &Isbn) -> Result<ReadStatus, RemoteError> {
        let api = self.ctx.api();
        let status = self
            .load
            .execute(|| api.read_status(isbn))
            .await
            .inspect_err(|err| self.ctx.report(LOAD_ACTION, err))?;
        self.statuses.seed(isbn.clone(), status);
        Ok(status)
    }

    /// Show `status` right away and roll back if the backend rejects it.
    pub async fn set(&self, isbn: &Isbn, status: ReadStatus) -> ToggleOutcome<ReadStatus> {
        let api = self.ctx.api();
        let outcome = self
            .statuses
            .apply(isbn.clone(), status, || api.update_read_status(isbn, status))
            .await;
        if let Some(error) = outcome.error() {
            self.ctx.notices().report(UPDATE_ACTION, error);
        }
        outcome
    }

    /// Displayed status; `Unread` for books never loaded.
    pub fn status(&self, isbn: &Isbn) -> ReadStatus {
        self.statuses.value(isbn)
    }

    pub fn is_pending(&self, isbn: &Isbn) -> bool {
        self.statuses.is_pending(isbn)
    }
}
