//! Utility functions for record cleanup

use scraper::Html;

/// Convert an HTML description into single-spaced plain text
///
/// Text nodes are joined with a space, entities are decoded, and every run of
/// whitespace (including non-breaking spaces) collapses to one space. `None` or
/// empty markup yields an empty string.
///
/// # Examples
///
/// ```
/// use product_harvest::utils::clean_description;
///
/// assert_eq!(clean_description(Some("<p>Hello <b>world</b></p>")), "Hello world");
/// assert_eq!(clean_description(None), "");
/// ```
pub fn clean_description(markup: Option<&str>) -> String {
    let Some(markup) = markup.filter(|m| !m.trim().is_empty()) else {
        return String::new();
    };

    let fragment = Html::parse_fragment(markup);
    let mut text = String::with_capacity(markup.len());
    for chunk in fragment.root_element().text() {
        for word in chunk.split_whitespace() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(word);
        }
    }
    text
}

/// Percent-encode an identifier for use as a URL path segment
pub fn encode_path_segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}
