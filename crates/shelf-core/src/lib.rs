//! Client-side action and coordination layer of the reading tracker.
//!
//! This crate holds the primitives every feature builds on: tracked remote operations,
//! optimistic keyed state with stale-result suppression, named dialog registries and the
//! failure taxonomy, plus the feature actions composed from them.

/// Remote call surface and session capability consumed by the feature layer.
pub mod api;
/// Named dialog open/close/payload controllers.
pub mod dialog;
/// Failure classification and user-facing presentation.
pub mod error;
/// Favorites, read status, memos, bookshelves, search and book cards.
pub mod features;
/// Broadcast channel for user-facing failure notices.
pub mod notice;
/// Lifecycle tracking for one remote call.
pub mod operation;
/// Local shelf contents updated after confirmed mutations.
pub mod shelf;
/// Optimistic keyed values with generation-guarded settlement.
pub mod toggle;
/// Domain types shared with the backend.
pub mod types;

pub use api::{ReadingApi, Session};
pub use dialog::{DialogController, DialogEntry, DialogRegistry};
pub use error::{
    DomainError, ErrorKind, HttpError, Presentation, RemoteError, Severity, classify_error,
    classify_http_status, classify_value, present_error,
};
pub use features::{
    BookCard, BookSearch, Bookshelves, CardDialog, CardPayload, CardVariant, Favorites, Memos,
    ReadStatusTracker, ShelfContext,
};
pub use notice::{Notice, NoticeChannel, NoticeStream};
pub use operation::{AsyncOperation, OperationState, OperationStatus};
pub use shelf::{ShelfBuffer, ShelfMergeError, ShelfOp};
pub use toggle::{
    OptimisticMap, OptimisticState, OptimisticToggle, PendingChange, ToggleOutcome, ToggleState,
};
pub use types::{
    Book, Bookshelf, BookshelfDraft, FavoriteStatus, Isbn, Memo, MemoDraft, MemoId, ReadStatus,
    Route, ShelfId, UserId,
};
