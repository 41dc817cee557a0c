//! Terminal rendering of presentation rows.

use live_logs::{highlight_segments, PresentationRow, Segment};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const REVERSE: &str = "\x1b[7m";

/// How rows are written to the terminal.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Emit ANSI colors
    pub color: bool,
    /// Highlight this term in messages
    pub search: Option<String>,
    /// Include the container column
    pub show_container: bool,
}

/// Parses `#RRGGBB`.
pub fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn paint(text: &str, style: &str, enabled: bool) -> String {
    if enabled {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

/// Renders one row as a single line.
pub fn render_row(row: &PresentationRow, options: &RenderOptions) -> String {
    let mut line = String::new();

    line.push_str(&paint(&row.time, DIM, options.color));
    line.push_str("  ");

    let pod = format!("{:<5}", row.pod_short.as_deref().unwrap_or("-"));
    let pod_style = hex_to_rgb(row.color.hex)
        .map(|(r, g, b)| format!("\x1b[38;2;{r};{g};{b}m"))
        .unwrap_or_default();
    line.push_str(&paint(&pod, &pod_style, options.color));
    line.push_str("  ");

    if options.show_container {
        line.push_str(&format!("[{}] ", row.container.as_deref().unwrap_or("-")));
    }

    let term = options.search.as_deref().unwrap_or_default();
    let message: String = highlight_segments(&row.message, term)
        .into_iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.to_string(),
            Segment::Match(text) if options.color => paint(text, REVERSE, true),
            Segment::Match(text) => format!("*{text}*"),
        })
        .collect();

    if row.placeholder {
        line.push_str(&paint(&message, DIM, options.color));
    } else {
        line.push_str(&message);
    }
    line
}
