use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use super::{errors::DomainError, preferences::Category};

pub const QUERY_PLACEHOLDER: &str = "{q}";

/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, matching
/// `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A site template with the user's query substituted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLink {
    pub site_name: String,
    pub url: String,
}

/// Replaces every `{q}` in `template` with the percent-encoded query.
///
/// The query is trimmed and percent-encoded with spaces as `%20`, the way the
/// browser client builds tab URLs. A template without a placeholder is
/// returned untouched.
pub fn render_search_url(template: &str, query: &str) -> String {
    if !template.contains(QUERY_PLACEHOLDER) {
        return template.to_string();
    }
    template.replace(QUERY_PLACEHOLDER, &encode_component(query.trim()))
}

/// Renders every enabled site of `category` for `query`.
pub fn build_search_links(category: &Category, query: &str) -> Result<Vec<SearchLink>, DomainError> {
    if query.trim().is_empty() {
        return Err(DomainError::validation("query must not be blank"));
    }

    Ok(category
        .enabled_sites()
        .map(|site| SearchLink {
            site_name: site.site_name.clone(),
            url: render_search_url(&site.site_url, query),
        })
        .collect())
}

fn encode_component(raw: &str) -> String {
    utf8_percent_encode(raw, URI_COMPONENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::SiteEntry;

    fn site(name: &str, url: &str, checked: bool) -> SiteEntry {
        SiteEntry {
            site_name: name.to_string(),
            site_url: url.to_string(),
            icon: None,
            is_checked: checked,
        }
    }

    #[test]
    fn substitutes_every_placeholder() {
        assert_eq!(
            render_search_url("https://a.example/?q={q}&again={q}", "rust"),
            "https://a.example/?q=rust&again=rust"
        );
    }

    #[test]
    fn encodes_like_encode_uri_component() {
        assert_eq!(
            render_search_url("https://a.example/?q={q}", "  c++ & rust  "),
            "https://a.example/?q=c%2B%2B%20%26%20rust"
        );
    }

    #[test]
    fn leaves_uri_component_marks_unescaped() {
        assert_eq!(
            render_search_url("https://a.example/?q={q}", "it's (fun)!~"),
            "https://a.example/?q=it's%20(fun)!~"
        );
        assert_eq!(
            render_search_url("https://a.example/?q={q}", "a*b_c-d.e"),
            "https://a.example/?q=a*b_c-d.e"
        );
        assert_eq!(
            render_search_url("https://a.example/?q={q}", "café/#?"),
            "https://a.example/?q=caf%C3%A9%2F%23%3F"
        );
    }

    #[test]
    fn template_without_placeholder_is_unchanged() {
        assert_eq!(
            render_search_url("https://claude.ai/", "anything"),
            "https://claude.ai/"
        );
    }

    #[test]
    fn only_enabled_sites_are_rendered() {
        let mut category = Category::new("Search", "");
        category.url = vec![
            site("on", "https://on.example/?q={q}", true),
            site("off", "https://off.example/?q={q}", false),
        ];

        let links = build_search_links(&category, "tea").expect("links should render");
        assert_eq!(
            links,
            vec![SearchLink {
                site_name: "on".to_string(),
                url: "https://on.example/?q=tea".to_string(),
            }]
        );
    }

    #[test]
    fn blank_query_is_rejected() {
        let category = Category::new("Search", "");
        assert!(matches!(
            build_search_links(&category, "   "),
            Err(DomainError::Validation(_))
        ));
    }
}
