use std::cmp::Ordering;

use crate::error::NoteResult;
use crate::filter::{FilterKey, FilterState};
use crate::note::Note;
use crate::store::NoteStore;

fn matches_query(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle)
}

fn keyword_filter(notes: &[Note], query: &str) -> Vec<Note> {
    if query.trim().is_empty() {
        return notes.to_vec();
    }
    let needle = query.to_lowercase();
    notes
        .iter()
        .filter(|note| matches_query(note, &needle))
        .cloned()
        .collect()
}

/// Computes the visible list for `filters` and `query`.
///
/// Search narrows by title first. `ALL` stops there. Otherwise `FAVORITE`
/// and `COMPLETED` narrow further, then a stable sort orders by: completed
/// first (when `COMPLETED` is on), favorites first (when `FAVORITE` is on),
/// lowercased title ascending (`TITLE_A-Z`), newest first (`TIME`).
pub fn apply(notes: &[Note], filters: &FilterState, query: &str) -> Vec<Note> {
    let mut result = keyword_filter(notes, query);

    if filters.is_active(FilterKey::All) {
        return result;
    }

    let favorite = filters.is_active(FilterKey::Favorite);
    let completed = filters.is_active(FilterKey::Completed);
    let by_title = filters.is_active(FilterKey::TitleAz);
    let by_time = filters.is_active(FilterKey::Time);

    if favorite {
        result.retain(|note| note.is_favorite);
    }
    if completed {
        result.retain(|note| note.is_completed);
    }

    // `sort_by` is stable; ties keep their input order.
    result.sort_by(|a, b| {
        let done = |n: &Note| completed && n.is_completed;
        let fav = |n: &Note| favorite && n.is_favorite;

        done(b)
            .cmp(&done(a))
            .then_with(|| fav(b).cmp(&fav(a)))
            .then_with(|| {
                if by_title {
                    a.title.to_lowercase().cmp(&b.title.to_lowercase())
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| {
                if by_time {
                    b.timestamp.cmp(&a.timestamp)
                } else {
                    Ordering::Equal
                }
            })
    });

    result
}

/// Keyword search over the whole collection, in store order.
pub async fn search_notes<S: NoteStore + ?Sized>(store: &S, query: &str) -> NoteResult<Vec<Note>> {
    let notes = store.fetch_all().await?;
    Ok(keyword_filter(&notes, query))
}
