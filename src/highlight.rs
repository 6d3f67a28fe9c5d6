use ratatui::style::Style;
use ratatui::text::Span;
use regex::{Regex, RegexBuilder};

/// Case-insensitive matcher for the table search box, which filters on the
/// whole trimmed phrase.
pub fn search_regex(query: &str) -> Option<Regex> {
    let phrase = query.trim();
    if phrase.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .ok()
}

pub fn highlight_spans(
    text: &str,
    regex: Option<&Regex>,
    highlight_style: Style,
    base_style: Style,
) -> Vec<Span<'static>> {
    let Some(re) = regex else {
        return vec![Span::styled(text.to_string(), base_style)];
    };
    let mut spans = Vec::new();
    let mut last = 0;
    for mat in re.find_iter(text) {
        if mat.start() > last {
            spans.push(Span::styled(text[last..mat.start()].to_string(), base_style));
        }
        spans.push(Span::styled(mat.as_str().to_string(), highlight_style));
        last = mat.end();
    }
    if last < text.len() {
        spans.push(Span::styled(text[last..].to_string(), base_style));
    }
    if spans.is_empty() {
        spans.push(Span::styled(text.to_string(), base_style));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(spans: &[Span<'static>]) -> Vec<String> {
        spans
            .iter()
            .map(|span| span.content.clone().into_owned())
            .collect()
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let regex = search_regex("m8 (x2)").expect("regex");
        assert!(regex.is_match("Bolt M8 (X2)"));
        assert!(!regex.is_match("Bolt M8 x2"));
    }

    #[test]
    fn search_phrase_matches_case_insensitively() {
        let regex = search_regex(" hex b ").expect("regex");
        let spans = highlight_spans("M8 Hex Bolt", Some(&regex), Style::default(), Style::default());
        assert_eq!(texts(&spans), vec!["M8 ", "Hex B", "olt"]);
        assert!(search_regex("   ").is_none());
    }

    #[test]
    fn no_regex_keeps_text_whole() {
        let spans = highlight_spans("Axle", None, Style::default(), Style::default());
        assert_eq!(texts(&spans), vec!["Axle"]);
    }
}
