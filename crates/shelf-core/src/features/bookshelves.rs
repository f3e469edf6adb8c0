use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, warn};

use super::{ShelfContext, rejected_field};
use crate::{
    api::{ReadingApi, Session},
    error::RemoteError,
    operation::AsyncOperation,
    shelf::{ShelfBuffer, ShelfOp},
    types::{Book, Bookshelf, BookshelfDraft, Isbn, ShelfId},
};

const LIST_ACTION: &str = "bookshelf.list";
const CREATE_ACTION: &str = "bookshelf.create";
const ADD_ACTION: &str = "bookshelf.add_book";
const REMOVE_ACTION: &str = "bookshelf.remove_book";
const DELETE_ACTION: &str = "bookshelf.delete";

/// The user's bookshelves.
///
/// Confirmed mutations are applied to local shelf buffers. If a buffer turns out to be out of
/// sync with the confirmed change, the shelf list is fetched again.
#[derive(Debug)]
pub struct Bookshelves<A, S> {
    ctx: ShelfContext<A, S>,
    list: AsyncOperation<Vec<Bookshelf>>,
    create: AsyncOperation<ShelfId>,
    mutation: AsyncOperation<()>,
    contents: Mutex<HashMap<ShelfId, ShelfBuffer>>,
}

impl<A: ReadingApi, S: Session> Bookshelves<A, S> {
    pub fn new(ctx: ShelfContext<A, S>) -> Self {
        Self {
            ctx,
            list: AsyncOperation::new(LIST_ACTION),
            create: AsyncOperation::new(CREATE_ACTION),
            mutation: AsyncOperation::new("bookshelf.mutation"),
            contents: Mutex::new(HashMap::new()),
        }
    }

    /// Shelves without their books; see [`Self::books`].
    pub fn shelves(&self) -> Vec<Bookshelf> {
        self.list.data().unwrap_or_default()
    }

    pub fn books(&self, shelf: ShelfId) -> Vec<Book> {
        self.contents()
            .get(&shelf)
            .map(|buffer| buffer.books().to_vec())
            .unwrap_or_default()
    }

    pub fn list_operation(&self) -> &AsyncOperation<Vec<Bookshelf>> {
        &self.list
    }

    pub fn mutation_operation(&self) -> &AsyncOperation<()> {
        &self.mutation
    }

    pub async fn load(&self) -> Result<Vec<Bookshelf>, RemoteError> {
        let api = self.ctx.api();
        let shelves = self
            .list
            .execute(|| api.list_bookshelves())
            .await
            .inspect_err(|err| self.ctx.report(LIST_ACTION, err))?;

        let mut contents = self.contents();
        contents.clear();
        for shelf in &shelves {
            contents.insert(shelf.id, ShelfBuffer::new(shelf.books.clone()));
        }
        drop(contents);

        self.list.update_data(|data| {
            for shelf in data.iter_mut().flatten() {
                shelf.books.clear();
            }
        });
        debug!(shelves = shelves.len(), "bookshelves loaded");
        Ok(self.shelves())
    }

    pub async fn create(&self, draft: BookshelfDraft) -> Result<Bookshelf, RemoteError> {
        let draft = BookshelfDraft {
            name: draft.name.trim().to_owned(),
            description: draft
                .description
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
        };
        let api = self.ctx.api();
        let id = self
            .create
            .execute(|| async {
                if draft.name.is_empty() {
                    return Err(rejected_field("name", "Shelf name must not be empty."));
                }
                api.create_bookshelf(&draft).await
            })
            .await
            .inspect_err(|err| self.ctx.report(CREATE_ACTION, err))?;

        let shelf = Bookshelf {
            id,
            name: draft.name,
            description: draft.description,
            books: Vec::new(),
        };
        self.contents().insert(id, ShelfBuffer::default());
        self.list
            .update_data(|data| data.get_or_insert_with(Vec::new).push(shelf.clone()));
        Ok(shelf)
    }

    pub async fn add_book(&self, shelf: ShelfId, book: &Book) -> Result<(), RemoteError> {
        let api = self.ctx.api();
        self.mutation
            .execute(|| api.add_to_bookshelf(shelf, book))
            .await
            .inspect_err(|err| self.ctx.report(ADD_ACTION, err))?;
        self.apply_local(shelf, ShelfOp::Add(book.clone())).await
    }

    pub async fn remove_book(&self, shelf: ShelfId, isbn: &Isbn) -> Result<(), RemoteError> {
        let api = self.ctx.api();
        self.mutation
            .execute(|| api.remove_from_bookshelf(shelf, isbn))
            .await
            .inspect_err(|err| self.ctx.report(REMOVE_ACTION, err))?;
        self.apply_local(shelf, ShelfOp::Remove { isbn: isbn.clone() })
            .await
    }

    pub async fn delete(&self, shelf: ShelfId) -> Result<(), RemoteError> {
        let api = self.ctx.api();
        self.mutation
            .execute(|| api.delete_bookshelf(shelf))
            .await
            .inspect_err(|err| self.ctx.report(DELETE_ACTION, err))?;

        self.contents().remove(&shelf);
        self.list.update_data(|data| {
            if let Some(shelves) = data {
                shelves.retain(|entry| entry.id != shelf);
            }
        });
        Ok(())
    }

    /// Merge a confirmed change into the local shelf, reloading when the buffer is out of sync.
    ///
    /// An error here means the server accepted the change but the local view could not be
    /// refreshed.
    async fn apply_local(&self, shelf: ShelfId, op: ShelfOp) -> Result<(), RemoteError> {
        let merged = self
            .contents()
            .get_mut(&shelf)
            .map(|buffer| buffer.apply_ops(std::slice::from_ref(&op)));

        match merged {
            Some(Ok(())) => return Ok(()),
            Some(Err(err)) => {
                warn!(shelf = shelf.0, error = %err, "local shelf out of sync, reloading");
            }
            None => {
                warn!(shelf = shelf.0, "shelf not loaded locally, reloading");
            }
        }

        self.load().await.map(drop).inspect_err(|err| {
            warn!(shelf = shelf.0, error = %err, "reload after shelf change failed");
        })
    }

    fn contents(&self) -> MutexGuard<'_, HashMap<ShelfId, ShelfBuffer>> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
