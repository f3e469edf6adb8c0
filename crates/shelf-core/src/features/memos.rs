use super::{ShelfContext, rejected_field};
use crate::{
    api::{ReadingApi, Session},
    error::RemoteError,
    operation::AsyncOperation,
    types::{Isbn, Memo, MemoDraft, MemoId},
};

const EMPTY_BODY: &str = "Memo text must not be empty.";

/// Memos attached to one book.
///
/// Each mutation has its own operation so a failed edit does not mark the list as failed.
/// Successful mutations edit the local list instead of refetching it.
#[derive(Debug)]
pub struct Memos<A, S> {
    ctx: ShelfContext<A, S>,
    isbn: Isbn,
    list: AsyncOperation<Vec<Memo>>,
    create: AsyncOperation<MemoId>,
    update: AsyncOperation<()>,
    delete: AsyncOperation<()>,
}

impl<A: ReadingApi, S: Session> Memos<A, S> {
    pub fn new(ctx: ShelfContext<A, S>, isbn: Isbn) -> Self {
        Self {
            ctx,
            isbn,
            list: AsyncOperation::new("memo.list"),
            create: AsyncOperation::new("memo.create"),
            update: AsyncOperation::new("memo.update"),
            delete: AsyncOperation::new("memo.delete"),
        }
    }

    pub fn isbn(&self) -> &Isbn {
        &self.isbn
    }

    pub fn memos(&self) -> Vec<Memo> {
        self.list.data().unwrap_or_default()
    }

    pub fn list_operation(&self) -> &AsyncOperation<Vec<Memo>> {
        &self.list
    }

    pub fn create_operation(&self) -> &AsyncOperation<MemoId> {
        &self.create
    }

    pub fn update_operation(&self) -> &AsyncOperation<()> {
        &self.update
    }

    pub fn delete_operation(&self) -> &AsyncOperation<()> {
        &self.delete
    }

    pub async fn load(&self) -> Result<Vec<Memo>, RemoteError> {
        let api = self.ctx.api();
        self.list
            .execute(|| api.list_memos(&self.isbn))
            .await
            .inspect_err(|err| self.ctx.report(self.list.label(), err))
    }

    pub async fn create(&self, body: &str) -> Result<Memo, RemoteError> {
        let draft = MemoDraft {
            isbn: self.isbn.clone(),
            body: body.trim().to_owned(),
        };
        let api = self.ctx.api();
        let id = self
            .create
            .execute(|| async {
                if draft.body.is_empty() {
                    return Err(rejected_field("body", EMPTY_BODY));
                }
                api.create_memo(&draft).await
            })
            .await
            .inspect_err(|err| self.ctx.report(self.create.label(), err))?;

        let memo = Memo {
            id,
            isbn: draft.isbn,
            body: draft.body,
        };
        self.list
            .update_data(|data| data.get_or_insert_with(Vec::new).push(memo.clone()));
        Ok(memo)
    }

    pub async fn update(&self, id: MemoId, body: &str) -> Result<(), RemoteError> {
        let body = body.trim();
        let api = self.ctx.api();
        self.update
            .execute(|| async {
                if body.is_empty() {
                    return Err(rejected_field("body", EMPTY_BODY));
                }
                api.update_memo(id, body).await
            })
            .await
            .inspect_err(|err| self.ctx.report(self.update.label(), err))?;

        self.list.update_data(|data| {
            if let Some(memo) = data
                .iter_mut()
                .flatten()
                .find(|memo| memo.id == id)
            {
                memo.body = body.to_owned();
            }
        });
        Ok(())
    }

    pub async fn delete(&self, id: MemoId) -> Result<(), RemoteError> {
        let api = self.ctx.api();
        self.delete
            .execute(|| api.delete_memo(id))
            .await
            .inspect_err(|err| self.ctx.report(self.delete.label(), err))?;

        self.list.update_data(|data| {
            if let Some(memos) = data {
                memos.retain(|memo| memo.id != id);
            }
        });
        Ok(())
    }
}
