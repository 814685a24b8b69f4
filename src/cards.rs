//! Shareable SVG cards for generated commentary.

use serde::Deserialize;

use crate::models::share::ShareRecord;
use crate::web::escape_html;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardTemplate {
    #[default]
    Minimal,
    Vinyl,
    Receipt,
}

impl CardTemplate {
    /// Maximum number of characters of commentary shown on the card.
    pub fn cutoff(&self) -> usize {
        match self {
            CardTemplate::Minimal => 150,
            CardTemplate::Vinyl => 200,
            CardTemplate::Receipt => 300,
        }
    }

    fn line_width(&self) -> usize {
        match self {
            CardTemplate::Minimal => 34,
            CardTemplate::Vinyl => 38,
            CardTemplate::Receipt => 30,
        }
    }

    fn palette(&self) -> (&'static str, &'static str, &'static str) {
        // background, foreground, accent
        match self {
            CardTemplate::Minimal => ("#0f0f0f", "#f5f5f5", "#1db954"),
            CardTemplate::Vinyl => ("#1a1423", "#f2e9e4", "#e76f51"),
            CardTemplate::Receipt => ("#fbfbf8", "#222222", "#888888"),
        }
    }
}

/// Shortens `text` to at most `cutoff` characters, ending in `...` when cut.
pub fn truncate(text: &str, cutoff: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= cutoff {
        return text.to_string();
    }
    let keep = cutoff.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Greedy word wrap on character counts. Words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() { word.chars().count() } else { current.chars().count() + 1 + word.chars().count() };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

pub fn render_svg(template: CardTemplate, record: &ShareRecord) -> String {
    let (bg, fg, accent) = template.palette();
    let text = truncate(&record.text, template.cutoff());
    let lines = wrap(&text, template.line_width());

    let line_height = 34;
    let top = 150;
    let height = (top + lines.len() * line_height + 120).max(630);

    let tspans: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                r#"<tspan x="60" y="{y}">{text}</tspan>"#,
                y = top + i * line_height,
                text = escape_html(line)
            )
        })
        .collect();

    let disc = if template == CardTemplate::Vinyl {
        format!(
            r#"<circle cx="1020" cy="120" r="90" fill="{fg}" fill-opacity="0.08"/><circle cx="1020" cy="120" r="22" fill="{accent}"/>"#,
            fg = fg,
            accent = accent
        )
    } else {
        String::new()
    };

    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="1200" height="{height}" viewBox="0 0 1200 {height}">
  <rect width="1200" height="{height}" fill="{bg}"/>
  {disc}
  <text x="60" y="90" font-family="Helvetica, Arial, sans-serif" font-size="22" font-weight="700" fill="{accent}" letter-spacing="4">{label}</text>
  <text font-family="Helvetica, Arial, sans-serif" font-size="28" fill="{fg}">{tspans}</text>
  <text x="60" y="{footer_y}" font-family="Helvetica, Arial, sans-serif" font-size="18" fill="{accent}">roastify</text>
</svg>"#,
        height = height,
        bg = bg,
        fg = fg,
        accent = accent,
        disc = disc,
        label = record.assistant_type.as_str().to_uppercase(),
        tspans = tspans,
        footer_y = height - 50,
    )
}
