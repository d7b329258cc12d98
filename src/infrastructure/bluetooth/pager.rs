//! Text Pager
//!
//! Turns arbitrary UTF-8 text into the on-device line/page geometry: lines
//! wrapped at a fixed character budget (preferring whitespace breaks), pages
//! of a fixed line count, and per-page byte chunks bounded by the wire
//! payload ceiling. Pure layout logic; delivery is the coordinator's job.

use crate::infrastructure::bluetooth::protocol::{
    DisplayStatus, LINES_PER_PAGE, MAX_CHUNK_PAYLOAD,
};

/// Wrap text into display lines of at most `width` characters.
///
/// Paragraphs (split on `'\n'`) wrap independently. A break lands on the
/// last whitespace inside the budget when one exists; a run with no
/// whitespace is hard-broken at the budget.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let chars: Vec<char> = paragraph.chars().collect();
        let mut start = 0;
        while chars.len() - start > width {
            let window = &chars[start..start + width];
            let break_at = window.iter().rposition(|c| c.is_whitespace());
            let (end, next) = match break_at {
                // Break on whitespace; the whitespace itself is dropped.
                Some(pos) if pos > 0 => (start + pos, start + pos + 1),
                _ => (start + width, start + width),
            };
            lines.push(chars[start..end].iter().collect());
            start = next;
        }
        lines.push(chars[start..].iter().collect());
    }
    lines
}

/// Split a page's UTF-8 bytes into wire-sized chunks.
///
/// The device reassembles all chunks of a page before rendering, so chunk
/// boundaries need not fall on character boundaries.
pub fn chunk_payload(text: &str) -> Vec<Vec<u8>> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes
        .chunks(MAX_CHUNK_PAYLOAD)
        .map(|c| c.to_vec())
        .collect()
}

/// An in-progress multi-page text transfer awaiting device-driven page
/// navigation. Dropped on completion, on failure, or on exit-all-functions.
#[derive(Debug, Clone)]
pub struct PendingText {
    lines: Vec<String>,
    current_page: u8,
    max_pages: u8,
    status: DisplayStatus,
    top_margin: bool,
}

impl PendingText {
    pub fn new(lines: Vec<String>, status: DisplayStatus) -> Self {
        let max_pages = lines.len().div_ceil(LINES_PER_PAGE).max(1) as u8;
        Self {
            lines,
            current_page: 1,
            max_pages,
            status,
            top_margin: false,
        }
    }

    pub fn current_page(&self) -> u8 {
        self.current_page
    }

    pub fn max_pages(&self) -> u8 {
        self.max_pages
    }

    pub fn status(&self) -> DisplayStatus {
        self.status
    }

    pub fn is_multi_page(&self) -> bool {
        self.max_pages > 1
    }

    /// Lines of the current page, joined for display. Single-page texts
    /// carry a two-line top margin so they sit mid-display.
    pub fn page_text(&self) -> String {
        let start = (self.current_page as usize - 1) * LINES_PER_PAGE;
        let end = (start + LINES_PER_PAGE).min(self.lines.len());
        let body = self.lines[start..end].join("\n");
        if self.top_margin {
            format!("\n\n{body}")
        } else {
            body
        }
    }

    /// Advance to the next page. A no-op (returns `false`) on the last page.
    pub fn forward(&mut self) -> bool {
        if self.current_page < self.max_pages {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Go back one page. A no-op (returns `false`) on the first page.
    pub fn backward(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// The device sends a single page-change order; advance when possible,
    /// otherwise fall back to going backward from the last page.
    pub fn change_page(&mut self) -> bool {
        if self.forward() {
            return true;
        }
        self.backward()
    }
}

/// Layout a text payload: wrapped lines plus single-page/multi-page intent.
///
/// Single-page payloads get a two-line top margin so short texts sit in the
/// middle of the display, and render with `FinalText` status. Larger
/// payloads become a [`PendingText`] in `ManualPage` status whose pages are
/// delivered one at a time.
pub fn layout(text: &str, width: usize) -> PendingText {
    let lines = wrap_lines(text, width);
    if lines.len() <= LINES_PER_PAGE {
        let mut pending = PendingText::new(lines, DisplayStatus::FinalText);
        pending.top_margin = true;
        pending
    } else {
        PendingText::new(lines, DisplayStatus::ManualPage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::DISPLAY_WIDTH;

    #[test]
    fn short_text_is_one_line() {
        assert_eq!(wrap_lines("hello", 40), vec!["hello"]);
    }

    #[test]
    fn wrap_prefers_whitespace_breaks() {
        let lines = wrap_lines("alpha beta gamma delta", 12);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        for line in &lines {
            assert!(line.chars().count() <= 12);
        }
    }

    #[test]
    fn wrap_hard_breaks_without_whitespace() {
        let text = "x".repeat(200);
        let lines = wrap_lines(&text, DISPLAY_WIDTH);
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l.chars().count() <= 40));
    }

    #[test]
    fn paragraphs_wrap_independently() {
        let lines = wrap_lines("one\ntwo three", 40);
        assert_eq!(lines, vec!["one", "two three"]);
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        let text = "あ".repeat(45); // 3 bytes per char
        let lines = wrap_lines(&text, 40);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().count(), 40);
        assert_eq!(lines[1].chars().count(), 5);
    }

    #[test]
    fn two_hundred_chars_make_five_lines_two_pages() {
        let text = "x".repeat(200);
        let pending = layout(&text, DISPLAY_WIDTH);
        assert_eq!(pending.max_pages(), 2);
        assert_eq!(pending.current_page(), 1);
        assert_eq!(pending.status(), DisplayStatus::ManualPage);
        assert!(pending.is_multi_page());
    }

    #[test]
    fn single_page_layout_is_final_with_top_margin() {
        let pending = layout("hi", DISPLAY_WIDTH);
        assert_eq!(pending.max_pages(), 1);
        assert_eq!(pending.status(), DisplayStatus::FinalText);
        assert_eq!(pending.page_text(), "\n\nhi");
    }

    #[test]
    fn forward_stops_at_last_page() {
        let text = "x".repeat(200); // 5 lines, 2 pages
        let mut pending = layout(&text, DISPLAY_WIDTH);
        assert!(pending.forward());
        assert_eq!(pending.current_page(), 2);
        // Out of range is a no-op, not an error
        assert!(!pending.forward());
        assert_eq!(pending.current_page(), 2);
    }

    #[test]
    fn backward_stops_at_first_page() {
        let text = "x".repeat(200);
        let mut pending = layout(&text, DISPLAY_WIDTH);
        assert!(!pending.backward());
        assert_eq!(pending.current_page(), 1);
    }

    #[test]
    fn page_text_takes_four_lines_per_page() {
        let lines: Vec<String> = (0..5).map(|i| format!("line{i}")).collect();
        let mut pending = PendingText::new(lines, DisplayStatus::ManualPage);
        assert_eq!(pending.page_text(), "line0\nline1\nline2\nline3");
        pending.forward();
        assert_eq!(pending.page_text(), "line4");
    }

    #[test]
    fn chunking_respects_wire_ceiling() {
        let text = "a".repeat(MAX_CHUNK_PAYLOAD * 2 + 10);
        let chunks = chunk_payload(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), MAX_CHUNK_PAYLOAD);
        assert_eq!(chunks[2].len(), 10);
    }

    #[test]
    fn empty_text_still_produces_one_chunk() {
        assert_eq!(chunk_payload("").len(), 1);
    }
}
