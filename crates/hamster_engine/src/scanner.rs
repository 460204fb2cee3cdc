use hamster_core::{
    matches_filter, normalize_last_downloaded, FileEntry, FilterQuery, RowState,
};
use hamster_logging::{hamster_debug, hamster_info};

use crate::page::{AssetsPage, PageRow};

/// Scans the page for file rows, hiding the rows that fail the filter.
///
/// A filter shorter than three characters shows and returns every file row.
/// Rows without a title anchor are left alone and never returned.
pub fn scan(page: &mut dyn AssetsPage, filter_text: &str) -> Vec<FileEntry> {
    let query = FilterQuery::parse(filter_text);
    let mut files = Vec::new();
    let mut visibility = Vec::new();

    for row in page.rows() {
        let Some(entry) = file_entry(row) else {
            hamster_debug!("Row {} has no title anchor; skipping", row.id);
            continue;
        };
        let keep = matches_filter(query.as_ref(), &row.title_cell_text);
        visibility.push((row.id.clone(), !keep));
        if keep {
            files.push(entry);
        }
    }

    for (id, hidden) in visibility {
        page.set_hidden(&id, hidden);
    }
    hamster_info!("Found {} downloadable files", files.len());
    files
}

/// Applies only the visibility side of the filter and returns the number of
/// visible rows. Rows without a second cell are untouched and not counted.
pub fn filter_rows(page: &mut dyn AssetsPage, filter_text: &str) -> usize {
    let query = FilterQuery::parse(filter_text);
    let decisions = page
        .rows()
        .iter()
        .filter(|row| row.has_title_cell)
        .map(|row| {
            (
                row.id.clone(),
                !matches_filter(query.as_ref(), &row.title_cell_text),
            )
        })
        .collect::<Vec<_>>();

    let mut visible = 0;
    for (id, hidden) in decisions {
        page.set_hidden(&id, hidden);
        if !hidden {
            visible += 1;
        }
    }
    visible
}

/// Current processing state of a row, or `None` if the row is gone.
pub fn row_state(page: &dyn AssetsPage, id: &str) -> Option<RowState> {
    page.row(id).map(|row| RowState::from_row_text(&row.text))
}

fn file_entry(row: &PageRow) -> Option<FileEntry> {
    let anchor = row.anchor.as_ref()?;
    if row.id.is_empty() || anchor.text.is_empty() {
        return None;
    }
    Some(FileEntry {
        id: row.id.clone(),
        title: anchor.text.clone(),
        date_updated: row.date_updated_text.clone(),
        last_downloaded: normalize_last_downloaded(&row.last_downloaded_text),
        href: anchor.href.clone(),
        status: RowState::from_row_text(&row.text),
    })
}
