//! `%name%` placeholder substitution for user-editable note templates.
use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, TimeZone};

const MARKER: char = '%';
const FALLBACK_DATE_FMT: &str = "%Y-%m-%d %H-%M-%S";

/// Placeholder values for one note. Keys are placeholder names without markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    values: BTreeMap<String, String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// Replace every `%name%` whose name is present in `context`.
///
/// Unknown placeholders and stray markers are copied through verbatim.
/// Substituted values are never rescanned, so content containing `%x%`
/// text cannot trigger further replacement.
pub fn render(template: &str, context: &RenderContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(MARKER) {
        out.push_str(&rest[..start]);
        let after = &rest[start + MARKER.len_utf8()..];
        if let Some(end) = after.find(MARKER) {
            let name = &after[..end];
            if let Some(value) = is_placeholder_name(name).then(|| context.get(name)).flatten() {
                out.push_str(value);
                rest = &after[end + MARKER.len_utf8()..];
                continue;
            }
        }
        // Not a placeholder: keep the marker, the closing one may open the next.
        out.push(MARKER);
        rest = after;
    }
    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Format `when` with a user-supplied strftime string, falling back to a
/// fixed format when the string holds an invalid specifier.
pub fn format_date<Tz>(when: &DateTime<Tz>, fmt: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    if write!(out, "{}", when.format(fmt)).is_ok() {
        return out;
    }
    readitlater_logging::engine_warn!("invalid date format {:?}, using {:?}", fmt, FALLBACK_DATE_FMT);
    when.format(FALLBACK_DATE_FMT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_placeholders_pass_through() {
        let ctx = RenderContext::new().with("bar", "X");
        assert_eq!(render("%foo% %bar%", &ctx), "%foo% X");
    }

    #[test]
    fn replacement_is_global() {
        let ctx = RenderContext::new().with("articleURL", "https://example.com/a");
        assert_eq!(
            render("[%articleURL%](%articleURL%)", &ctx),
            "[https://example.com/a](https://example.com/a)"
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let ctx = RenderContext::new()
            .with("content", "100% of %title%")
            .with("title", "T");
        assert_eq!(render("%title%: %content%", &ctx), "T: 100% of %title%");
    }

    #[test]
    fn stray_markers_are_kept() {
        let ctx = RenderContext::new().with("n", "5");
        assert_eq!(render("50% off, %n% left, 100%", &ctx), "50% off, 5 left, 100%");
        assert_eq!(render("%%n%%", &ctx), "%5%");
    }

    #[test]
    fn template_without_markers_is_unchanged() {
        assert_eq!(render("plain text", &RenderContext::new()), "plain text");
        assert_eq!(render("", &RenderContext::new()), "");
    }

    #[test]
    fn non_ascii_text_around_placeholders_survives() {
        let ctx = RenderContext::new().with("title", "Grüße");
        assert_eq!(render("« %title% » — ok", &ctx), "« Grüße » — ok");
    }

    #[test]
    fn date_formatting_falls_back_on_bad_format() {
        let when = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 7, 8, 9)
            .unwrap();
        assert_eq!(format_date(&when, "%Y-%m-%d"), "2024-03-05");
        assert_eq!(format_date(&when, "%Q"), "2024-03-05 07-08-09");
    }
}
