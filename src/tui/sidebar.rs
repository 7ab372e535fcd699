//! Session sidebar rendering: banner, scrollable session list, footer.

use chrono::{DateTime, Utc};
use crossterm::style::Color;
use unicode_width::UnicodeWidthStr;

use crate::history::ChatSession;

use super::text::{LineBuilder, StyledLine, StyledSpan, truncate_width};

pub const SIDEBAR_WIDTH: usize = 26;

/// Rows available for session entries at a given terminal height. The
/// banner and footer each take a text row plus a rule.
pub fn list_height(height: usize) -> usize {
    height.saturating_sub(4)
}

/// Format a timestamp as a relative time string.
pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (now - at).num_seconds().max(0);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{}m ago", diff / 60)
    } else if diff < 86_400 {
        format!("{}h ago", diff / 3600)
    } else if diff < 604_800 {
        format!("{}d ago", diff / 86_400)
    } else {
        format!("{}w ago", diff / 604_800)
    }
}

fn session_row(
    session: &ChatSession,
    active: bool,
    selected: bool,
    width: usize,
    now: DateTime<Utc>,
) -> StyledLine {
    let time = format_relative_time(session.created_at, now);
    let time_width = time.width();

    let title_budget = width.saturating_sub(2 + time_width + 1).max(1);
    let title = truncate_width(&session.title, title_budget);
    let pad = width.saturating_sub(2 + title.width() + time_width).max(1);

    let marker = if active {
        StyledSpan::colored("▸ ", Color::Cyan)
    } else {
        StyledSpan::raw("  ")
    };
    let mut line = LineBuilder::new()
        .styled(marker)
        .raw(title)
        .raw(" ".repeat(pad))
        .dim(time)
        .build();

    if selected {
        line.spans = line.spans.into_iter().map(StyledSpan::with_reverse).collect();
    }
    line
}

/// Build the full sidebar column as exactly `height` lines.
#[allow(clippy::too_many_arguments)]
pub fn build_sidebar_lines(
    sessions: &[ChatSession],
    active_id: Option<&str>,
    cursor: usize,
    offset: usize,
    focused: bool,
    width: usize,
    height: usize,
    now: DateTime<Utc>,
) -> Vec<StyledLine> {
    let mut lines = vec![
        LineBuilder::new().bold(" WaleBquit").build(),
        StyledLine::dim("─".repeat(width)),
    ];

    for (index, session) in sessions
        .iter()
        .enumerate()
        .skip(offset)
        .take(list_height(height))
    {
        let active = active_id == Some(session.id.as_str());
        let selected = focused && index == cursor;
        lines.push(session_row(session, active, selected, width, now));
    }

    while lines.len() + 2 < height {
        lines.push(StyledLine::empty());
    }
    lines.push(StyledLine::dim("─".repeat(width)));
    lines.push(StyledLine::dim(" by GOD_OF_ENTITIES"));
    lines.truncate(height);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crossterm::style::Attribute;

    fn plain(line: &StyledLine) -> String {
        line.spans.iter().map(|s| s.content.as_str()).collect()
    }

    fn sessions(titles: &[&str]) -> Vec<ChatSession> {
        titles
            .iter()
            .map(|t| {
                let mut s = ChatSession::seeded(None);
                s.title = (*t).to_string();
                s
            })
            .collect()
    }

    #[test]
    fn test_format_relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(format_relative_time(now, now), "just now");
        assert_eq!(format_relative_time(now - Duration::seconds(59), now), "just now");
        assert_eq!(format_relative_time(now - Duration::minutes(5), now), "5m ago");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
        assert_eq!(format_relative_time(now - Duration::weeks(6), now), "6w ago");
        // Clock skew never renders a negative duration.
        assert_eq!(format_relative_time(now + Duration::minutes(2), now), "just now");
    }

    #[test]
    fn test_active_session_marked() {
        let list = sessions(&["alpha", "beta"]);
        let lines = build_sidebar_lines(
            &list,
            Some(list[1].id.as_str()),
            0,
            0,
            false,
            SIDEBAR_WIDTH,
            10,
            Utc::now(),
        );

        assert!(plain(&lines[2]).starts_with("  alpha"));
        assert!(plain(&lines[3]).starts_with("▸ beta"));
    }

    #[test]
    fn test_selection_reversed_only_when_focused() {
        let list = sessions(&["alpha"]);
        let now = Utc::now();

        let focused = build_sidebar_lines(&list, None, 0, 0, true, SIDEBAR_WIDTH, 10, now);
        assert!(
            focused[2]
                .spans
                .iter()
                .all(|s| s.style.attributes.has(Attribute::Reverse))
        );

        let unfocused = build_sidebar_lines(&list, None, 0, 0, false, SIDEBAR_WIDTH, 10, now);
        assert!(
            unfocused[2]
                .spans
                .iter()
                .all(|s| !s.style.attributes.has(Attribute::Reverse))
        );
    }

    #[test]
    fn test_offset_windows_the_list() {
        let list = sessions(&["one", "two", "three", "four"]);
        // height 6 leaves two list rows.
        let lines = build_sidebar_lines(&list, None, 1, 1, false, SIDEBAR_WIDTH, 6, Utc::now());

        assert_eq!(lines.len(), 6);
        assert!(plain(&lines[2]).contains("two"));
        assert!(plain(&lines[3]).contains("three"));
        assert!(!lines.iter().any(|l| plain(l).contains("four")));
    }

    #[test]
    fn test_column_is_exactly_height_with_footer_last() {
        let lines =
            build_sidebar_lines(&sessions(&["a"]), None, 0, 0, false, SIDEBAR_WIDTH, 12, Utc::now());

        assert_eq!(lines.len(), 12);
        assert!(plain(&lines[0]).contains("WaleBquit"));
        assert!(plain(&lines[11]).contains("GOD_OF_ENTITIES"));
    }

    #[test]
    fn test_long_title_truncated_with_time_kept() {
        let list = sessions(&["a very long session title that cannot fit"]);
        let lines = build_sidebar_lines(&list, None, 0, 0, false, SIDEBAR_WIDTH, 10, Utc::now());

        let row = plain(&lines[2]);
        assert!(row.contains('…'));
        assert!(row.ends_with("just now"));
        assert!(row.width() <= SIDEBAR_WIDTH);
    }
}
