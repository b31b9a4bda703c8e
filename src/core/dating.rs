//! Scene acquisition dates.
//!
//! Scenes are dated from their file name when possible (`site_20230115.tif`,
//! `site_2023-01-15_b4.tif`); otherwise the file's creation time is used.

use crate::domain::model::DateSource;
use crate::utils::error::Result;
use chrono::{DateTime, Local, NaiveDate};
use std::path::Path;

/// Find the first `_`-separated token in a file stem that is a date.
///
/// Accepted token forms are `YYYYMMDD` and `YYYY-MM-DD`. A token with the
/// right shape but an impossible date (`20231345`) is skipped and the scan
/// continues.
pub fn date_from_stem(stem: &str) -> Option<NaiveDate> {
    stem.split('_').find_map(|part| {
        if part.len() == 8 && part.bytes().all(|b| b.is_ascii_digit()) {
            NaiveDate::parse_from_str(part, "%Y%m%d").ok()
        } else if part.len() == 10 && part.matches('-').count() == 2 {
            NaiveDate::parse_from_str(part, "%Y-%m-%d").ok()
        } else {
            None
        }
    })
}

pub fn scene_date(path: &Path) -> Result<(NaiveDate, DateSource)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    if let Some(date) = date_from_stem(stem) {
        return Ok((date, DateSource::Filename));
    }

    let metadata = std::fs::metadata(path)?;
    // 部分檔案系統不提供建立時間，退回修改時間
    let file_time = metadata.created().or_else(|_| metadata.modified())?;
    let date = DateTime::<Local>::from(file_time).date_naive();

    tracing::warn!(
        "Could not extract date from filename {}, using file creation time ({}) instead",
        stem,
        date
    );

    Ok((date, DateSource::FileTime))
}
