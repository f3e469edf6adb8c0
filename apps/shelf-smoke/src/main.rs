//! Runs the reading-tracker flows end to end against the in-memory library.

mod config;
mod logging;

use std::{process::ExitCode, sync::Arc, time::Duration};

use shelf_core::{
    Book, BookCard, BookSearch, BookshelfDraft, Bookshelves, CardDialog, CardVariant, Favorites,
    Memos, NoticeChannel, NoticeStream, ReadStatus, ReadStatusTracker, RemoteError, Route,
    Session, ShelfContext,
};
use shelf_platform::{ApiOp, InMemoryReadingApi, StaticSession};
use thiserror::Error;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info, warn};

use crate::config::{ConfigError, SmokeConfig};

type Context = ShelfContext<InMemoryReadingApi, StaticSession>;

const DOUBLE_TAP_GAP: Duration = Duration::from_millis(2);

#[derive(Debug, Error)]
enum SmokeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: RemoteError,
    },
}

trait StepExt<T> {
    fn step(self, step: &'static str) -> Result<T, SmokeError>;
}

impl<T> StepExt<T> for Result<T, RemoteError> {
    fn step(self, step: &'static str) -> Result<T, SmokeError> {
        self.map_err(|source| SmokeError::Step { step, source })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "smoke run failed");
            eprintln!("shelf-smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), SmokeError> {
    let config = SmokeConfig::from_env()?;
    info!(
        user = ?config.user,
        latency_ms = config.latency.as_millis() as u64,
        fail_first_favorite = config.fail_first_favorite,
        "starting smoke run"
    );

    let api = InMemoryReadingApi::new()
        .with_latency(config.latency)
        .with_books(catalog());
    let session = match config.user {
        Some(user) => StaticSession::signed_in(user),
        None => StaticSession::anonymous(),
    };
    let notices = NoticeChannel::new(config.notice_buffer);
    let mut stream = notices.subscribe();
    let ctx = ShelfContext::new(Arc::new(api.clone()), Arc::new(session), notices);

    let found = search(&ctx).await?;
    let Some(book) = found.into_iter().next() else {
        warn!("search returned nothing, stopping");
        return Ok(());
    };

    favorite_flow(&ctx, &api, &book, config.fail_first_favorite).await?;
    drain_notices(&mut stream);

    if !ctx.session().is_signed_in() {
        info!("anonymous session, skipping account flows");
        return Ok(());
    }

    read_status_flow(&ctx, &book).await?;
    memo_flow(&ctx, &book).await?;
    shelf_flow(&ctx, &book).await?;
    drain_notices(&mut stream);
    Ok(())
}

fn catalog() -> Vec<Book> {
    vec![
        Book::new("978-4-10-101013-7", "Kokoro").with_author("Natsume Soseki"),
        Book::new("978-4-10-101001-4", "Botchan").with_author("Natsume Soseki"),
        Book::new("978-4-10-101005-2", "Sanshiro").with_author("Natsume Soseki"),
        Book::new("978-4-00-310101-8", "Rashomon").with_author("Akutagawa Ryunosuke"),
    ]
}

async fn search(ctx: &Context) -> Result<Vec<Book>, SmokeError> {
    let search = BookSearch::new(ctx.clone());
    let query = "soseki";
    let found = search.search(query).await.step("search")?;
    println!(
        "search {:?} -> {} result(s) at {}",
        query,
        found.len(),
        ctx.session().route(&Route::Search {
            query: query.to_owned()
        })
    );
    for book in &found {
        println!("  {} {}", book.isbn, book.title);
    }
    Ok(found)
}

async fn favorite_flow(
    ctx: &Context,
    api: &InMemoryReadingApi,
    book: &Book,
    fail_first: bool,
) -> Result<(), SmokeError> {
    let favorites = Favorites::new(ctx.clone());
    if ctx.session().is_signed_in() {
        favorites.load(&book.isbn).await.step("favorite status")?;
    }

    if fail_first {
        api.fail_next(ApiOp::ToggleFavorite, RemoteError::status(500));
    }
    let (first, second) = tokio::join!(favorites.toggle(book), async {
        tokio::time::sleep(DOUBLE_TAP_GAP).await;
        favorites.toggle(book).await
    });
    println!("favorite toggle #1 -> {first:?}");
    println!("favorite toggle #2 -> {second:?}");

    println!(
        "favorite {}: displayed={} server={}",
        book.isbn,
        favorites.is_favorite(&book.isbn),
        api.server_favorite(&book.isbn)
    );
    Ok(())
}

async fn read_status_flow(ctx: &Context, book: &Book) -> Result<(), SmokeError> {
    let tracker = ReadStatusTracker::new(ctx.clone());
    tracker.load(&book.isbn).await.step("read status")?;
    let outcome = tracker.set(&book.isbn, ReadStatus::Reading).await;
    println!(
        "read status -> {outcome:?}, now {:?}",
        tracker.status(&book.isbn)
    );
    Ok(())
}

async fn memo_flow(ctx: &Context, book: &Book) -> Result<(), SmokeError> {
    let memos = Memos::new(ctx.clone(), book.isbn.clone());
    memos.load().await.step("memo list")?;
    let mut card = BookCard::new(CardVariant::Default, book.clone());

    card.dialogs_mut().open(&CardDialog::CreateMemo, None);
    if card.submit_memo(&memos, "   ").await.is_err() {
        println!(
            "empty memo rejected, create dialog open={}",
            card.dialogs().is_open(&CardDialog::CreateMemo)
        );
    }
    card.submit_memo(&memos, "The letter in part three.")
        .await
        .step("memo create")?;

    if let Some(memo) = memos.memos().first().cloned() {
        card.begin_memo_edit(memo);
        card.submit_memo(&memos, "Sensei's letter in part three.")
            .await
            .step("memo edit")?;
    }

    for memo in memos.memos() {
        println!("memo {}: {}", memo.id.0, memo.body);
    }
    let open: Vec<_> = card.dialogs().open_dialogs().collect();
    println!("open dialogs: {open:?}");
    Ok(())
}

async fn shelf_flow(ctx: &Context, book: &Book) -> Result<(), SmokeError> {
    let shelves = Bookshelves::new(ctx.clone());
    shelves.load().await.step("shelf list")?;
    let shelf = shelves
        .create(BookshelfDraft {
            name: "To reread".to_owned(),
            description: Some("Soseki novels".to_owned()),
        })
        .await
        .step("shelf create")?;
    shelves.add_book(shelf.id, book).await.step("shelf add")?;
    println!(
        "shelf {:?} at {} holds {} book(s)",
        shelf.name,
        ctx.session().route(&Route::Bookshelf(shelf.id)),
        shelves.books(shelf.id).len()
    );

    let mut card = BookCard::new(CardVariant::Bookshelf(shelf.id), book.clone());
    card.dialogs_mut().open(&CardDialog::DeleteBook, None);
    card.confirm_remove_from_shelf(&shelves)
        .await
        .step("shelf remove")?;
    println!(
        "after removal shelf {:?} holds {} book(s)",
        shelf.name,
        shelves.books(shelf.id).len()
    );
    Ok(())
}

fn drain_notices(stream: &mut NoticeStream) {
    loop {
        match stream.try_recv() {
            Ok(notice) => println!(
                "notice [{}] {}: {}",
                notice.action, notice.presentation.title, notice.presentation.message
            ),
            Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "notice stream lagged"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}
