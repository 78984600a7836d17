mod common;
use std::sync::atomic::Ordering;

use _notekeep_core::error::NoteError;
use _notekeep_core::filter::FilterKey;
use _notekeep_core::image::ImageUpload;
use _notekeep_core::note::Note;
use _notekeep_core::session::{NoteSession, SaveOutcome, SaveRequest};
use _notekeep_core::store::NoteStore;
use common::{setup_store, FlakyStore};

fn titles(notes: &[Note]) -> Vec<String> {
    notes.iter().map(|n| n.title.clone()).collect()
}

fn saved(outcome: SaveOutcome) -> Note {
    match outcome {
        SaveOutcome::Saved(note) => note,
        SaveOutcome::Skipped => panic!("expected the note to be saved"),
    }
}

#[tokio::test]
async fn test_blank_save_is_skipped() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;

    let outcome = session.save_note(SaveRequest::new("  ", "\n")).await?;
    assert_eq!(outcome, SaveOutcome::Skipped);
    assert!(session.store().fetch_all().await?.is_empty());
    assert!(session.visible().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_save_creates_then_edits() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;

    let created = saved(session.save_note(SaveRequest::new("Shopping", "milk")).await?);
    assert!(created.is_persisted());
    assert_eq!(titles(session.visible()), vec!["Shopping"]);

    let favorite = session.toggle_favorite(&created).await?;
    assert!(favorite.is_favorite);

    let edited = saved(
        session
            .save_note(
                SaveRequest::new("Shopping list", "milk, bread")
                    .for_note(&created.id)
                    .with_images(vec!["notekeep://blob/images/1_a.png".to_string()]),
            )
            .await?,
    );
    assert_eq!(edited.id, created.id);
    assert!(edited.is_favorite, "editing keeps flags");
    assert!(edited.timestamp >= created.timestamp);
    assert_eq!(edited.image_urls.len(), 1);

    assert_eq!(session.visible().len(), 1);
    assert_eq!(session.visible()[0], edited);

    Ok(())
}

#[tokio::test]
async fn test_editing_missing_note_is_not_found() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;

    let err = session
        .save_note(SaveRequest::new("t", "c").for_note("gone"))
        .await
        .unwrap_err();
    assert!(matches!(err, NoteError::NotFound(_)));
    assert!(session.store().fetch_all().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_toggles_refresh_visible_list() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;
    let a = saved(session.save_note(SaveRequest::new("A", "")).await?);
    saved(session.save_note(SaveRequest::new("B", "")).await?);

    session.toggle_filter(FilterKey::Favorite).await?;
    assert!(session.visible().is_empty());

    session.toggle_favorite(&a).await?;
    assert_eq!(titles(session.visible()), vec!["A"]);

    session.toggle_filter(FilterKey::Favorite).await?;
    session.toggle_filter(FilterKey::Completed).await?;
    assert!(session.visible().is_empty());

    let a = session.note(&a.id).await?.expect("note exists");
    let done = session.toggle_complete(&a).await?;
    assert!(done.is_completed);
    assert!(done.is_favorite);
    assert_eq!(titles(session.visible()), vec!["A"]);

    session.toggle_filter(FilterKey::All).await?;
    assert_eq!(session.visible().len(), 2);
    assert_eq!(session.filters().active_keys(), vec![FilterKey::All]);

    Ok(())
}

#[tokio::test]
async fn test_query_and_sort_apply_after_every_change() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;
    for title in ["cherry", "Apple", "banana"] {
        session.save_note(SaveRequest::new(title, "")).await?;
    }

    session.toggle_filter(FilterKey::TitleAz).await?;
    assert_eq!(titles(session.visible()), vec!["Apple", "banana", "cherry"]);

    session.set_query("an").await?;
    assert_eq!(session.query(), "an");
    assert_eq!(titles(session.visible()), vec!["banana"]);

    session.save_note(SaveRequest::new("Mango", "")).await?;
    assert_eq!(titles(session.visible()), vec!["banana", "Mango"]);

    session.set_query("").await?;
    assert_eq!(session.visible().len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_delete_removes_note_and_images() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;
    let urls = session
        .store()
        .upload_images(vec![
            ImageUpload::new("a.png", b"aaa".to_vec()),
            ImageUpload::new("b.png", b"bbb".to_vec()),
        ])
        .await?;
    let note = saved(
        session
            .save_note(SaveRequest::new("with pictures", "").with_images(urls.clone()))
            .await?,
    );

    session.delete_note(&note.id).await?;
    assert!(session.visible().is_empty());
    assert_eq!(session.note(&note.id).await?, None);

    let op = session.store().operator();
    for url in &urls {
        let path = url.trim_start_matches("notekeep://blob/");
        assert!(!op.exists(path).await?, "{} should be gone", path);
    }

    Ok(())
}

#[tokio::test]
async fn test_save_with_images_replaces_old_images() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;

    let first = saved(
        session
            .save_with_images(
                SaveRequest::new("Trip", "day 1"),
                vec![ImageUpload::new("beach.jpg", b"sand".to_vec())],
            )
            .await?,
    );
    assert_eq!(first.image_urls.len(), 1);
    let old_url = first.image_urls[0].clone();

    // Text-only edit keeps the images.
    let second = saved(
        session
            .save_with_images(
                SaveRequest::new("Trip", "day 2")
                    .for_note(&first.id)
                    .with_images(first.image_urls.clone()),
                vec![],
            )
            .await?,
    );
    assert_eq!(second.image_urls, vec![old_url.clone()]);

    let third = saved(
        session
            .save_with_images(
                SaveRequest::new("Trip", "day 3")
                    .for_note(&first.id)
                    .with_images(second.image_urls.clone()),
                vec![
                    ImageUpload::new("hill.jpg", b"grass".to_vec()),
                    ImageUpload::new("lake.jpg", b"water".to_vec()),
                ],
            )
            .await?,
    );
    assert_eq!(third.image_urls.len(), 2);
    assert!(third.image_urls[0].contains("hill.jpg"));
    assert!(third.image_urls[1].contains("lake.jpg"));

    let op = session.store().operator();
    assert!(
        !op.exists(old_url.trim_start_matches("notekeep://blob/"))
            .await?
    );
    for url in &third.image_urls {
        assert!(op.exists(url.trim_start_matches("notekeep://blob/")).await?);
    }

    Ok(())
}

#[tokio::test]
async fn test_partial_upload_leaves_note_untouched() -> anyhow::Result<()> {
    let flaky = FlakyStore::new(setup_store().await?);
    let mut session = NoteSession::open(flaky).await?;
    let note = saved(session.save_note(SaveRequest::new("Album", "")).await?);

    session
        .store()
        .uploads_before_failure
        .store(1, Ordering::SeqCst);
    let err = session
        .save_with_images(
            SaveRequest::new("Album", "more").for_note(&note.id),
            vec![
                ImageUpload::new("one.png", b"1".to_vec()),
                ImageUpload::new("two.png", b"2".to_vec()),
            ],
        )
        .await
        .unwrap_err();

    match err {
        NoteError::PartialUploadFailure { uploaded, .. } => {
            assert_eq!(uploaded.len(), 1);
            assert!(uploaded[0].contains("one.png"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let stored = session.note(&note.id).await?.expect("note exists");
    assert_eq!(stored.content, "");
    assert!(stored.image_urls.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_refresh_failure_keeps_last_notes() -> anyhow::Result<()> {
    let flaky = FlakyStore::new(setup_store().await?);
    let mut session = NoteSession::open(flaky).await?;
    let a = saved(session.save_note(SaveRequest::new("A", "")).await?);
    session.save_note(SaveRequest::new("B", "")).await?;
    session.toggle_favorite(&a).await?;

    session.store().fail_fetch_all.store(true, Ordering::SeqCst);
    let err = session.toggle_filter(FilterKey::Favorite).await.unwrap_err();
    assert_eq!(err.kind(), "REMOTE_UNAVAILABLE");

    // The new filter still applies to what was fetched last.
    assert_eq!(titles(session.visible()), vec!["A"]);

    session.store().fail_fetch_all.store(false, Ordering::SeqCst);
    session.refresh().await?;
    assert_eq!(titles(session.visible()), vec!["A"]);

    Ok(())
}

#[tokio::test]
async fn test_failed_upsert_is_reported() -> anyhow::Result<()> {
    let flaky = FlakyStore::new(setup_store().await?);
    let mut session = NoteSession::open(flaky).await?;
    let a = saved(session.save_note(SaveRequest::new("A", "")).await?);

    session.store().fail_upsert.store(true, Ordering::SeqCst);
    let err = session.toggle_favorite(&a).await.unwrap_err();
    assert!(matches!(err, NoteError::RemoteUnavailable(_)));

    let stored = session.note(&a.id).await?.expect("note exists");
    assert!(!stored.is_favorite);

    Ok(())
}

#[tokio::test]
async fn test_delete_image_reports_foreign_url() -> anyhow::Result<()> {
    let session = NoteSession::new(setup_store().await?);
    assert!(!session.delete_image("https://elsewhere.example/x.png").await);

    let urls = session
        .store()
        .upload_images(vec![ImageUpload::new("x.png", b"x".to_vec())])
        .await?;
    assert!(session.delete_image(&urls[0]).await);

    Ok(())
}

async fn stored_image_count(op: &opendal::Operator) -> anyhow::Result<usize> {
    let entries = op.list("images/").await?;
    Ok(entries.iter().filter(|e| e.metadata().is_file()).count())
}

#[tokio::test]
async fn test_text_only_edit_keeps_stored_images() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;
    let first = saved(
        session
            .save_with_images(
                SaveRequest::new("Trip", "day 1"),
                vec![ImageUpload::new("beach.jpg", b"sand".to_vec())],
            )
            .await?,
    );

    let second = saved(
        session
            .save_with_images(SaveRequest::new("Trip", "day 2").for_note(&first.id), vec![])
            .await?,
    );
    assert_eq!(second.content, "day 2");
    assert_eq!(second.image_urls, first.image_urls);

    let third = saved(
        session
            .save_note(SaveRequest::new("Trip", "day 3").for_note(&first.id))
            .await?,
    );
    assert_eq!(third.image_urls, first.image_urls);

    let op = session.store().operator().clone();
    assert!(
        op.exists(first.image_urls[0].trim_start_matches("notekeep://blob/"))
            .await?
    );

    // An explicit empty list still clears the images.
    let cleared = saved(
        session
            .save_note(
                SaveRequest::new("Trip", "day 4")
                    .for_note(&first.id)
                    .with_images(vec![]),
            )
            .await?,
    );
    assert!(cleared.image_urls.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_new_images_replace_stored_ones_without_resending_urls() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;
    let first = saved(
        session
            .save_with_images(
                SaveRequest::new("Garden", ""),
                vec![
                    ImageUpload::new("rose.png", b"red".to_vec()),
                    ImageUpload::new("tulip.png", b"yellow".to_vec()),
                ],
            )
            .await?,
    );
    assert_eq!(first.image_urls.len(), 2);

    let second = saved(
        session
            .save_with_images(
                SaveRequest::new("Garden", "spring").for_note(&first.id),
                vec![ImageUpload::new("daisy.png", b"white".to_vec())],
            )
            .await?,
    );
    assert_eq!(second.image_urls.len(), 1);
    assert!(second.image_urls[0].ends_with("_daisy.png"));

    let op = session.store().operator().clone();
    for url in &first.image_urls {
        assert!(!op.exists(url.trim_start_matches("notekeep://blob/")).await?);
    }
    assert_eq!(stored_image_count(&op).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_images_for_missing_note_are_not_uploaded() -> anyhow::Result<()> {
    let mut session = NoteSession::open(setup_store().await?).await?;

    let err = session
        .save_with_images(
            SaveRequest::new("Ghost", "").for_note("gone"),
            vec![ImageUpload::new("boo.png", b"!".to_vec())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, NoteError::NotFound(_)));

    let op = session.store().operator().clone();
    assert_eq!(stored_image_count(&op).await?, 0);

    Ok(())
}
