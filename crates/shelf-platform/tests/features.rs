use std::{sync::Arc, time::Duration};

use shelf_core::{
    Book, BookCard, BookSearch, BookshelfDraft, Bookshelves, CardDialog, CardPayload, CardVariant,
    ErrorKind, Favorites, Isbn, Memos, NoticeChannel, OperationStatus, ReadStatus,
    ReadStatusTracker, RemoteError, Severity, ShelfContext, ToggleOutcome, UserId,
};
use shelf_platform::{ApiOp, InMemoryReadingApi, StaticSession};
use tokio::sync::broadcast::error::TryRecvError;

fn kokoro() -> Book {
    Book::new("9784101010137", "Kokoro").with_author("Natsume Soseki")
}

fn botchan() -> Book {
    Book::new("9784101010014", "Botchan").with_author("Natsume Soseki")
}

fn context(
    api: &InMemoryReadingApi,
    session: StaticSession,
) -> (ShelfContext<InMemoryReadingApi, StaticSession>, NoticeChannel) {
    let notices = NoticeChannel::new(16);
    let ctx = ShelfContext::new(Arc::new(api.clone()), Arc::new(session), notices.clone());
    (ctx, notices)
}

fn signed_in() -> StaticSession {
    StaticSession::signed_in(UserId(1))
}

#[tokio::test]
async fn failed_then_successful_favorite_ends_favorited_without_stale_banner() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, notices) = context(&api, signed_in());
    let mut banners = notices.subscribe();
    let favorites = Favorites::new(ctx);
    let isbn = kokoro().isbn;

    assert!(!favorites.load(&isbn).await.expect("status should load"));

    api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(500));
    let first = favorites.toggle(&kokoro()).await;
    assert_eq!(first.error().map(|e| e.kind), Some(ErrorKind::ServerFault));
    assert!(!favorites.is_favorite(&isbn));
    assert!(!favorites.is_pending(&isbn));

    let banner = banners.try_recv().expect("first failure should raise a notice");
    assert_eq!(banner.action, "favorite.toggle");
    assert_eq!(banner.presentation.severity, Severity::Error);

    let second = favorites.toggle(&kokoro()).await;
    assert_eq!(second, ToggleOutcome::Applied(true));
    assert!(favorites.is_favorite(&isbn));
    assert!(api.server_favorite(&isbn));
    assert!(matches!(banners.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn quick_double_favorite_with_failed_first_call_ends_favorited() {
    let api = InMemoryReadingApi::new()
        .with_latency(Duration::from_millis(20))
        .with_books([kokoro()]);
    let (ctx, notices) = context(&api, signed_in());
    let mut banners = notices.subscribe();
    let favorites = Favorites::new(ctx);
    let book = kokoro();

    favorites.load(&book.isbn).await.expect("status should load");
    api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(500));

    let (first, second) = tokio::join!(favorites.toggle(&book), async {
        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(favorites.is_pending(&book.isbn));
        favorites.toggle(&book).await
    });

    assert_eq!(first, ToggleOutcome::Superseded);
    assert_eq!(second, ToggleOutcome::Applied(true));
    assert!(favorites.is_favorite(&book.isbn));
    assert_eq!(favorites.is_favorite(&book.isbn), api.server_favorite(&book.isbn));
    assert!(!favorites.is_pending(&book.isbn));
    assert_eq!(api.calls(ApiOp::ToggleFavorite), 2);
    assert!(matches!(banners.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn quick_double_favorite_with_both_calls_failing_shows_server_value() {
    let api = InMemoryReadingApi::new()
        .with_latency(Duration::from_millis(20))
        .with_books([kokoro()]);
    let (ctx, notices) = context(&api, signed_in());
    let mut banners = notices.subscribe();
    let favorites = Favorites::new(ctx);
    let book = kokoro();

    favorites.load(&book.isbn).await.expect("status should load");
    api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(500));
    api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(503));

    let (first, second) = tokio::join!(favorites.toggle(&book), async {
        tokio::time::sleep(Duration::from_millis(2)).await;
        favorites.toggle(&book).await
    });

    assert_eq!(first, ToggleOutcome::Superseded);
    assert_eq!(second.error().map(|e| e.kind), Some(ErrorKind::ServerFault));
    assert!(!favorites.is_favorite(&book.isbn));
    assert!(!api.server_favorite(&book.isbn));

    banners.try_recv().expect("the current failure should raise a notice");
    assert!(matches!(banners.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn anonymous_favorite_is_rejected_without_remote_call() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, notices) = context(&api, StaticSession::anonymous());
    let mut banners = notices.subscribe();
    let favorites = Favorites::new(ctx);

    let outcome = favorites.toggle(&kokoro()).await;
    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Auth));
    assert!(!favorites.is_favorite(&kokoro().isbn));
    assert_eq!(api.calls(ApiOp::ToggleFavorite), 0);

    let banner = banners.try_recv().expect("auth failure should raise a notice");
    assert_eq!(banner.presentation.severity, Severity::Warning);
}

#[tokio::test]
async fn unfavoriting_on_favorites_list_removes_the_card() {
    let api = InMemoryReadingApi::new().with_books([kokoro(), botchan()]);
    let (ctx, _notices) = context(&api, signed_in());
    let favorites = Favorites::new(ctx);
    for book in [kokoro(), botchan()] {
        assert_eq!(favorites.toggle(&book).await, ToggleOutcome::Applied(true));
    }

    let mut listed = BookCard::new(CardVariant::Favorite, kokoro());
    let mut searched = BookCard::new(CardVariant::Default, botchan());

    assert_eq!(
        listed.toggle_favorite(&favorites).await,
        ToggleOutcome::Applied(false)
    );
    assert_eq!(
        searched.toggle_favorite(&favorites).await,
        ToggleOutcome::Applied(false)
    );

    assert!(listed.is_removed());
    assert!(!favorites.is_favorite(&kokoro().isbn));
    assert!(!searched.is_removed());
    assert!(!api.server_favorite(&kokoro().isbn));
}

#[tokio::test]
async fn failed_unfavorite_keeps_the_card_listed() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let favorites = Favorites::new(ctx);
    assert!(favorites.toggle(&kokoro()).await.is_applied());

    api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(500));
    let mut listed = BookCard::new(CardVariant::Favorite, kokoro());
    let outcome = listed.toggle_favorite(&favorites).await;

    assert!(outcome.error().is_some());
    assert!(!listed.is_removed());
    assert!(favorites.is_favorite(&kokoro().isbn));
}

#[tokio::test]
async fn failed_status_load_keeps_previous_data() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let favorites = Favorites::new(ctx);

    favorites.load(&kokoro().isbn).await.expect("status should load");
    let before = favorites.status_operation().data();

    let err = favorites
        .load(&Isbn::new("0000000000"))
        .await
        .expect_err("unknown book must fail");
    assert!(matches!(err, RemoteError::Http(_)));
    assert_eq!(favorites.status_operation().data(), before);
    assert_eq!(
        favorites.status_operation().status(),
        OperationStatus::Failed
    );
}

#[tokio::test]
async fn read_status_rolls_back_on_failure() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let tracker = ReadStatusTracker::new(ctx);
    let isbn = kokoro().isbn;

    assert_eq!(
        tracker.load(&isbn).await.expect("status should load"),
        ReadStatus::Unread
    );
    assert!(tracker.set(&isbn, ReadStatus::Reading).await.is_applied());
    assert_eq!(tracker.status(&isbn), ReadStatus::Reading);

    api.fail_next(ApiOp::UpdateReadStatus, RemoteError::status(403));
    let outcome = tracker.set(&isbn, ReadStatus::Finished).await;
    assert_eq!(outcome.error().map(|e| e.kind), Some(ErrorKind::Auth));
    assert_eq!(tracker.status(&isbn), ReadStatus::Reading);
    assert!(!tracker.is_pending(&isbn));
}

#[tokio::test]
async fn memo_dialogs_drive_create_and_edit() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let memos = Memos::new(ctx, kokoro().isbn);
    let mut card = BookCard::new(CardVariant::Default, kokoro());

    card.dialogs_mut().open(&CardDialog::CreateMemo, None);
    card.submit_memo(&memos, "  Sensei's letter  ")
        .await
        .expect("memo should be created");
    assert!(!card.dialogs().is_open(&CardDialog::CreateMemo));

    let created = memos.memos();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].body, "Sensei's letter");

    card.begin_memo_edit(created[0].clone());
    card.submit_memo(&memos, "Sensei's last letter")
        .await
        .expect("memo should be updated");
    assert!(!card.dialogs().is_open(&CardDialog::EditMemo));
    assert_eq!(card.dialogs().payload_of(&CardDialog::EditMemo), None);
    assert_eq!(memos.memos()[0].body, "Sensei's last letter");
    assert_eq!(
        api.server_memos(&kokoro().isbn)[0].body,
        "Sensei's last letter"
    );
}

#[tokio::test]
async fn empty_memo_is_rejected_locally_and_dialog_stays_open() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, notices) = context(&api, signed_in());
    let mut banners = notices.subscribe();
    let memos = Memos::new(ctx, kokoro().isbn);
    let mut card = BookCard::new(CardVariant::Default, kokoro());

    card.dialogs_mut().open(&CardDialog::CreateMemo, None);
    card.submit_memo(&memos, "   ")
        .await
        .expect_err("empty memo must be rejected");

    assert!(card.dialogs().is_open(&CardDialog::CreateMemo));
    assert_eq!(api.calls(ApiOp::CreateMemo), 0);
    let error = memos
        .create_operation()
        .error()
        .expect("validation error should be stored");
    assert_eq!(error.kind, ErrorKind::Validation);
    assert_eq!(error.message, "Memo text must not be empty.");

    let banner = banners.try_recv().expect("validation should raise a notice");
    assert_eq!(banner.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn deleting_memo_through_dialog_updates_local_list() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let memos = Memos::new(ctx, kokoro().isbn);
    let mut card = BookCard::new(CardVariant::Default, kokoro());

    let first = memos.create("first").await.expect("memo should be created");
    let second = memos.create("second").await.expect("memo should be created");

    card.begin_memo_edit(first.clone());
    card.dialogs_mut()
        .open(&CardDialog::DeleteMemo, Some(CardPayload::Memo(second.clone())));
    card.confirm_memo_delete(&memos)
        .await
        .expect("memo should be deleted");

    assert_eq!(memos.memos(), vec![first.clone()]);
    assert!(!card.dialogs().is_open(&CardDialog::DeleteMemo));
    assert_eq!(
        card.dialogs().payload_of(&CardDialog::EditMemo),
        Some(&CardPayload::Memo(first))
    );

    let reloaded = memos.load().await.expect("memos should reload");
    assert_eq!(reloaded.len(), 1);
}

#[tokio::test]
async fn removing_book_from_shelf_updates_local_contents_without_reload() {
    let api = InMemoryReadingApi::new().with_books([kokoro(), botchan()]);
    let (ctx, _notices) = context(&api, signed_in());
    let shelves = Bookshelves::new(ctx);

    let shelf = shelves
        .create(BookshelfDraft {
            name: "Soseki".into(),
            description: Some("  ".into()),
        })
        .await
        .expect("shelf should be created");
    assert_eq!(shelf.description, None);
    shelves
        .add_book(shelf.id, &kokoro())
        .await
        .expect("add should work");
    shelves
        .add_book(shelf.id, &botchan())
        .await
        .expect("add should work");
    assert_eq!(shelves.books(shelf.id).len(), 2);

    let mut card = BookCard::new(CardVariant::Bookshelf(shelf.id), kokoro());
    card.dialogs_mut().open(&CardDialog::DeleteBook, None);
    card.confirm_remove_from_shelf(&shelves)
        .await
        .expect("remove should work");

    assert!(!card.dialogs().is_open(&CardDialog::DeleteBook));
    assert_eq!(shelves.books(shelf.id), vec![botchan()]);
    assert_eq!(api.calls(ApiOp::ListBookshelves), 0);
}

#[tokio::test]
async fn failed_shelf_removal_keeps_dialog_open_and_contents() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let shelves = Bookshelves::new(ctx);
    let shelf = shelves
        .create(BookshelfDraft {
            name: "Later".into(),
            description: None,
        })
        .await
        .expect("shelf should be created");
    shelves
        .add_book(shelf.id, &kokoro())
        .await
        .expect("add should work");

    api.fail_next(
        ApiOp::RemoveFromBookshelf,
        RemoteError::Transport("connection reset".into()),
    );
    let mut card = BookCard::new(CardVariant::Bookshelf(shelf.id), kokoro());
    card.dialogs_mut().open(&CardDialog::DeleteBook, None);
    card.confirm_remove_from_shelf(&shelves)
        .await
        .expect_err("remove must fail");

    assert!(card.dialogs().is_open(&CardDialog::DeleteBook));
    assert_eq!(shelves.books(shelf.id), vec![kokoro()]);
    let error = shelves
        .mutation_operation()
        .error()
        .expect("error should be stored");
    assert_eq!(error.kind, ErrorKind::Network);
}

#[tokio::test]
async fn out_of_sync_shelf_falls_back_to_reload() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, _notices) = context(&api, signed_in());
    let shelves = Bookshelves::new(ctx.clone());
    let shelf = shelves
        .create(BookshelfDraft {
            name: "Shared".into(),
            description: None,
        })
        .await
        .expect("shelf should be created");

    let other_tab = Bookshelves::new(ctx);
    other_tab
        .load()
        .await
        .expect("second view should load shelves");
    other_tab
        .add_book(shelf.id, &kokoro())
        .await
        .expect("add should work");

    shelves
        .remove_book(shelf.id, &kokoro().isbn)
        .await
        .expect("server-side removal should work");
    assert_eq!(api.calls(ApiOp::ListBookshelves), 2);
    assert!(shelves.books(shelf.id).is_empty());
}

#[tokio::test]
async fn failed_reload_after_out_of_sync_change_is_returned() {
    let api = InMemoryReadingApi::new().with_books([kokoro()]);
    let (ctx, notices) = context(&api, signed_in());
    let mut banners = notices.subscribe();
    let shelves = Bookshelves::new(ctx.clone());
    let shelf = shelves
        .create(BookshelfDraft {
            name: "Shared".into(),
            description: None,
        })
        .await
        .expect("shelf should be created");

    Bookshelves::new(ctx)
        .add_book(shelf.id, &kokoro())
        .await
        .expect("add from another view should work");

    api.fail_next(ApiOp::ListBookshelves, RemoteError::status(503));
    let err = shelves
        .remove_book(shelf.id, &kokoro().isbn)
        .await
        .expect_err("stale local view must be reported");

    assert!(matches!(err, RemoteError::Http(_)));
    assert_eq!(api.calls(ApiOp::RemoveFromBookshelf), 1);
    assert_eq!(shelves.list_operation().status(), OperationStatus::Failed);
    assert!(shelves.mutation_operation().error().is_none());
    let banner = banners.try_recv().expect("failed reload should raise a notice");
    assert_eq!(banner.action, "bookshelf.list");
}

#[tokio::test]
async fn duplicate_shelf_name_surfaces_server_validation() {
    let api = InMemoryReadingApi::new();
    let (ctx, _notices) = context(&api, signed_in());
    let shelves = Bookshelves::new(ctx);
    let draft = BookshelfDraft {
        name: "Favorites".into(),
        description: None,
    };
    shelves
        .create(draft.clone())
        .await
        .expect("first create should work");
    shelves
        .create(draft)
        .await
        .expect_err("duplicate must fail");

    let shelves_now = shelves.shelves();
    assert_eq!(shelves_now.len(), 1);
    assert_eq!(api.calls(ApiOp::CreateBookshelf), 2);
}

#[tokio::test]
async fn blank_search_clears_results_without_calling_backend() {
    let api = InMemoryReadingApi::new().with_books([kokoro(), botchan()]);
    let (ctx, _notices) = context(&api, signed_in());
    let search = BookSearch::new(ctx);

    let found = search.search("soseki").await.expect("search should work");
    assert_eq!(found.len(), 2);
    assert_eq!(search.results().len(), 2);

    let cleared = search.search("   ").await.expect("blank search should work");
    assert!(cleared.is_empty());
    assert!(search.results().is_empty());
    assert_eq!(search.operation().status(), OperationStatus::Idle);
    assert_eq!(api.calls(ApiOp::SearchBooks), 1);
}

#[tokio::test]
async fn card_resolves_detail_route_through_session() {
    let session = StaticSession::signed_in(UserId(3)).with_base_path("/app");
    let card = BookCard::new(CardVariant::Favorite, kokoro());
    assert_eq!(card.detail_href(&session), "/app/books/9784101010137");
}
