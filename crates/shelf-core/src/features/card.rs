use tracing::debug;

use super::{Bookshelves, Favorites, Memos};
use crate::{
    api::{ReadingApi, Session},
    dialog::DialogRegistry,
    error::RemoteError,
    toggle::ToggleOutcome,
    types::{Book, Memo, ReadStatus, Route, ShelfId},
};

/// Dialogs a book card can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardDialog {
    Detail,
    EditStatus,
    CreateMemo,
    EditMemo,
    DeleteMemo,
    DeleteBook,
}

const COMMON_DIALOGS: [CardDialog; 5] = [
    CardDialog::Detail,
    CardDialog::EditStatus,
    CardDialog::CreateMemo,
    CardDialog::EditMemo,
    CardDialog::DeleteMemo,
];

/// What a card dialog is currently about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardPayload {
    Memo(Memo),
    Status(ReadStatus),
}

/// Where a card is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardVariant {
    /// Search results and detail pages.
    Default,
    /// The favorites list; unfavoriting removes the card.
    Favorite,
    /// A bookshelf page; the card can remove the book from the shelf.
    Bookshelf(ShelfId),
}

impl CardVariant {
    pub fn dialogs(self) -> Vec<CardDialog> {
        let mut dialogs = COMMON_DIALOGS.to_vec();
        if matches!(self, Self::Bookshelf(_)) {
            dialogs.push(CardDialog::DeleteBook);
        }
        dialogs
    }

    pub fn removes_on_unfavorite(self) -> bool {
        matches!(self, Self::Favorite)
    }

    pub fn shelf(self) -> Option<ShelfId> {
        match self {
            Self::Bookshelf(shelf) => Some(shelf),
            Self::Default | Self::Favorite => None,
        }
    }
}

/// One book card with its dialogs, built once per variant.
#[derive(Debug)]
pub struct BookCard {
    book: Book,
    variant: CardVariant,
    dialogs: DialogRegistry<CardDialog, CardPayload>,
    removed: bool,
}

impl BookCard {
    pub fn new(variant: CardVariant, book: Book) -> Self {
        Self {
            book,
            variant,
            dialogs: DialogRegistry::new(variant.dialogs()),
            removed: false,
        }
    }

    /// Set once a favorites-list card has been unfavorited; the list drops it.
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    pub fn variant(&self) -> CardVariant {
        self.variant
    }

    pub fn dialogs(&self) -> &DialogRegistry<CardDialog, CardPayload> {
        &self.dialogs
    }

    pub fn dialogs_mut(&mut self) -> &mut DialogRegistry<CardDialog, CardPayload> {
        &mut self.dialogs
    }

    pub fn detail_href(&self, session: &impl Session) -> String {
        session.route(&Route::BookDetail(self.book.isbn.clone()))
    }

    pub fn begin_memo_edit(&mut self, memo: Memo) {
        self.dialogs
            .open(&CardDialog::EditMemo, Some(CardPayload::Memo(memo)));
    }

    /// Toggle the favorite mark from the card.
    ///
    /// On the favorites list a confirmed unfavorite removes the card and forgets the mark.
    pub async fn toggle_favorite<A, S>(
        &mut self,
        favorites: &Favorites<A, S>,
    ) -> ToggleOutcome<bool>
    where
        A: ReadingApi,
        S: Session,
    {
        let outcome = favorites.toggle(&self.book).await;
        if self.variant.removes_on_unfavorite() && outcome == ToggleOutcome::Applied(false) {
            debug!(isbn = %self.book.isbn, "unfavorited card removed from favorites list");
            favorites.forget(&self.book.isbn);
            self.removed = true;
        }
        outcome
    }

    /// Confirm the memo dialog: updates the memo under edit, or creates a new one.
    ///
    /// The dialog closes on success and stays open on failure so the input is kept.
    pub async fn submit_memo<A, S>(
        &mut self,
        memos: &Memos<A, S>,
        body: &str,
    ) -> Result<(), RemoteError>
    where
        A: ReadingApi,
        S: Session,
    {
        let editing = match self.dialogs.payload_of(&CardDialog::EditMemo) {
            Some(CardPayload::Memo(memo)) if self.dialogs.is_open(&CardDialog::EditMemo) => {
                Some(memo.id)
            }
            _ => None,
        };

        match editing {
            Some(id) => {
                memos.update(id, body).await?;
                self.dialogs.close(&CardDialog::EditMemo);
            }
            None => {
                memos.create(body).await?;
                self.dialogs.close(&CardDialog::CreateMemo);
            }
        }
        Ok(())
    }

    /// Confirm the delete-memo dialog for the memo it carries.
    pub async fn confirm_memo_delete<A, S>(&mut self, memos: &Memos<A, S>) -> Result<(), RemoteError>
    where
        A: ReadingApi,
        S: Session,
    {
        let Some(CardPayload::Memo(memo)) = self.dialogs.payload_of(&CardDialog::DeleteMemo) else {
            debug!(isbn = %self.book.isbn, "delete-memo dialog confirmed without a memo");
            self.dialogs.close(&CardDialog::DeleteMemo);
            return Ok(());
        };
        let id = memo.id;
        memos.delete(id).await?;
        self.dialogs.close(&CardDialog::DeleteMemo);
        Ok(())
    }

    /// Confirm the delete-book dialog: removes the book from the card's shelf.
    ///
    /// Cards outside a bookshelf have no such dialog and do nothing.
    pub async fn confirm_remove_from_shelf<A, S>(
        &mut self,
        shelves: &Bookshelves<A, S>,
    ) -> Result<(), RemoteError>
    where
        A: ReadingApi,
        S: Session,
    {
        let Some(shelf) = self.variant.shelf() else {
            return Ok(());
        };
        shelves.remove_book(shelf, &self.book.isbn).await?;
        self.dialogs.close(&CardDialog::DeleteBook);
        Ok(())
    }
}
