//! Human-readable summary of a diff, sized for chat delivery.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use unicode_segmentation::UnicodeSegmentation;

use crate::models::NotifyConfig;
use crate::pipeline::diff::Diff;

/// Appended to summaries that had to be cut.
pub const TRUNCATION_MARKER: &str = "\n...(truncated)";

/// Formats diff summaries according to [`NotifyConfig`].
#[derive(Debug, Clone)]
pub struct SummaryFormatter {
    title: String,
    max_items: usize,
    max_chars: usize,
    currency: String,
    offset: FixedOffset,
    timezone_label: String,
}

impl SummaryFormatter {
    pub fn new(config: &NotifyConfig) -> Self {
        let offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| {
                log::warn!(
                    "Invalid notify.utc_offset_hours {}; falling back to UTC",
                    config.utc_offset_hours
                );
                Utc.fix()
            });

        Self {
            title: config.title.clone(),
            max_items: config.max_items,
            max_chars: config.max_chars,
            currency: config.currency.clone(),
            offset,
            timezone_label: config.timezone_label.clone(),
        }
    }

    /// `at` in the configured offset, suffixed with the timezone label.
    pub fn local_timestamp(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.offset);
        format!(
            "{} {}",
            local.format("%Y-%m-%d %H:%M:%S"),
            self.timezone_label
        )
    }

    /// Render the summary for one run.
    pub fn format(
        &self,
        diff: &Diff,
        total_count: usize,
        reference_url: Option<&str>,
        at: DateTime<Utc>,
    ) -> String {
        let mut lines = vec![
            self.title.clone(),
            format!("Updated: {}", self.local_timestamp(at)),
            format!("Items tracked: {total_count}"),
            format!(
                "Changes: {} new products, {} newly available sizes",
                diff.new_products.len(),
                diff.added_sizes.len()
            ),
        ];

        if !diff.new_products.is_empty() {
            lines.push(String::new());
            lines.push("New products:".to_string());
            for item in diff.new_products.iter().take(self.max_items) {
                let discount = item
                    .discount_percent
                    .map_or_else(|| "-".to_string(), |d| format!("{d:.1}"));
                let mut line = format!("- {} | {}%", item.display_name(), discount);
                if let Some(price) = item.sale_price {
                    line.push_str(&format!(" | {}{}", self.currency, format_amount(price)));
                }
                lines.push(line);
            }
            if diff.new_products.len() > self.max_items {
                lines.push(format!(
                    "... and {} more new products",
                    diff.new_products.len() - self.max_items
                ));
            }
        }

        if !diff.added_sizes.is_empty() {
            lines.push(String::new());
            lines.push("Newly available sizes:".to_string());
            for entry in diff.added_sizes.iter().take(self.max_items) {
                lines.push(format!(
                    "- {} | +{}",
                    entry.item.display_name(),
                    entry.sizes.join(" / ")
                ));
            }
            if diff.added_sizes.len() > self.max_items {
                lines.push(format!(
                    "... and {} more size updates",
                    diff.added_sizes.len() - self.max_items
                ));
            }
        }

        if let Some(url) = reference_url.filter(|u| !u.is_empty()) {
            lines.push(format!("Details: {url}"));
        }

        truncate_message(&lines.join("\n"), self.max_chars)
    }
}

impl Default for SummaryFormatter {
    fn default() -> Self {
        Self::new(&NotifyConfig::default())
    }
}

/// Format a summary with default settings at the current time.
pub fn format_summary(diff: &Diff, total_count: usize, reference_url: Option<&str>) -> String {
    SummaryFormatter::default().format(diff, total_count, reference_url, Utc::now())
}

/// Cut `text` to at most `max_chars` characters, ending with [`TRUNCATION_MARKER`].
///
/// Cuts only on grapheme cluster boundaries.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let budget = max_chars.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut used = 0;
    let mut out = String::with_capacity(text.len().min(max_chars * 4));
    for grapheme in text.graphemes(true) {
        let width = grapheme.chars().count();
        if used + width > budget {
            break;
        }
        out.push_str(grapheme);
        used += width;
    }
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Format an amount with thousands separators (`8250.0` → `8,250`).
///
/// Fractional amounts keep two decimals.
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let abs = value.abs();
    let (whole, fraction) = if abs.fract() == 0.0 {
        (format!("{abs:.0}"), String::new())
    } else {
        let fixed = format!("{abs:.2}");
        match fixed.split_once('.') {
            Some((w, f)) => (w.to_string(), format!(".{f}")),
            None => (fixed, String::new()),
        }
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{}{}", if negative { "-" } else { "" }, grouped, fraction)
}
