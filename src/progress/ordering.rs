/*!
 * Output ordering of translated chapters.
 *
 * Extracted books use `partN` ids: single digits are top-level parts,
 * two digits are dividers belonging to the part with the same number, and
 * three or more digits encode `group * 10 + section_type` where section
 * type 2 is a part header and 1 is part content. Chapters complete in any
 * order, so assembly sorts by this key instead of completion time.
 *
 * Ids outside the `partN` scheme (such as the `chapterN` ids of split text
 * books) are ordered by their source position alone, in a band after all
 * `partN` chapters. A mixed book never interleaves the two kinds.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{ChapterState, JobState};

static PART_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^part(\d+)$").unwrap());

/// Id of the book metadata chapter, never emitted
pub const METADATA_CHAPTER_ID: &str = "part1";

const HEADER_SECTION: u64 = 2;

const PART_BAND: u8 = 0;
const SOURCE_ORDER_BAND: u8 = 1;

/// `(band, group, header_flag, original_index)`, compared lexicographically
pub type OrderKey = (u8, u64, u8, usize);

/// Sort key for a chapter id. Lower flag sorts first within a group.
pub fn order_key(chapter_id: &str, original_index: usize) -> OrderKey {
    let number = PART_ID
        .captures(chapter_id)
        .and_then(|caps| caps[1].parse::<u64>().ok());

    match number {
        Some(n) if n < 10 => (PART_BAND, n, 0, original_index),
        Some(n) if n < 100 => (PART_BAND, n, 2, original_index),
        Some(n) if n % 10 == HEADER_SECTION => (PART_BAND, n / 10, 0, original_index),
        Some(n) => (PART_BAND, n / 10, 1, original_index),
        None => (SOURCE_ORDER_BAND, 0, 0, original_index),
    }
}

pub fn is_metadata_chapter(chapter_id: &str) -> bool {
    chapter_id == METADATA_CHAPTER_ID
}

/// Chapters of a job in output order, metadata excluded
pub fn ordered_chapters(job: &JobState) -> Vec<&ChapterState> {
    let mut chapters: Vec<&ChapterState> = job
        .chapters
        .values()
        .filter(|c| !is_metadata_chapter(&c.chapter_id))
        .collect();
    chapters.sort_by_key(|c| order_key(&c.chapter_id, c.original_index));
    chapters
}
