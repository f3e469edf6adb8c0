//! Feature actions built from the operation, toggle and dialog primitives.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::{
    api::{ReadingApi, Session},
    error::{HttpError, RemoteError, classify_error},
    notice::NoticeChannel,
};

pub mod bookshelves;
pub mod card;
pub mod favorites;
pub mod memos;
pub mod read_status;
pub mod search;

pub use bookshelves::Bookshelves;
pub use card::{BookCard, CardDialog, CardPayload, CardVariant};
pub use favorites::Favorites;
pub use memos::Memos;
pub use read_status::ReadStatusTracker;
pub use search::BookSearch;

/// Collaborators shared by every feature of one page.
#[derive(Debug)]
pub struct ShelfContext<A, S> {
    api: Arc<A>,
    session: Arc<S>,
    notices: NoticeChannel,
}

impl<A, S> Clone for ShelfContext<A, S> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            session: Arc::clone(&self.session),
            notices: self.notices.clone(),
        }
    }
}

impl<A: ReadingApi, S: Session> ShelfContext<A, S> {
    pub fn new(api: Arc<A>, session: Arc<S>, notices: NoticeChannel) -> Self {
        Self {
            api,
            session,
            notices,
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn notices(&self) -> &NoticeChannel {
        &self.notices
    }

    /// Classify `err` and emit it as a notice for `action`.
    pub(crate) fn report(&self, action: &str, err: &RemoteError) {
        self.notices.report(action, &classify_error(err));
    }
}

/// Client-side rejection shaped like a server 422 so it flows through the same classification.
pub(crate) fn rejected_field(field: &str, message: &str) -> RemoteError {
    let mut fields = Map::new();
    fields.insert(field.to_owned(), json!([message]));
    RemoteError::Http(HttpError::new(422).with_body(json!({ "errors": Value::Object(fields) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn local_rejection_classifies_as_validation_with_field_message() {
        let err = rejected_field("body", "Memo text must not be empty.");
        let classified = classify_error(&err);
        assert_eq!(classified.kind, ErrorKind::Validation);
        assert_eq!(classified.message, "Memo text must not be empty.");
    }
}
