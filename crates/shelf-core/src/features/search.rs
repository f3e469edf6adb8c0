use super::ShelfContext;
use crate::{
    api::{ReadingApi, Session},
    error::RemoteError,
    operation::AsyncOperation,
    types::Book,
};

/// Book search box state.
#[derive(Debug)]
pub struct BookSearch<A, S> {
    ctx: ShelfContext<A, S>,
    results: AsyncOperation<Vec<Book>>,
}

impl<A: ReadingApi, S: Session> BookSearch<A, S> {
    pub fn new(ctx: ShelfContext<A, S>) -> Self {
        Self {
            ctx,
            results: AsyncOperation::new("book.search"),
        }
    }

    /// Run a search; a blank query clears the results without a remote call.
    pub async fn search(&self, query: &str) -> Result<Vec<Book>, RemoteError> {
        let query = query.trim();
        if query.is_empty() {
            self.results.reset();
            return Ok(Vec::new());
        }

        let api = self.ctx.api();
        self.results
            .execute(|| api.search_books(query))
            .await
            .inspect_err(|err| self.ctx.report(self.results.label(), err))
    }

    pub fn results(&self) -> Vec<Book> {
        self.results.data().unwrap_or_default()
    }

    pub fn operation(&self) -> &AsyncOperation<Vec<Book>> {
        &self.results
    }
}
