//! Web search through DuckDuckGo's HTML endpoint with a spoken summary
//!
//! The top result is remembered for the `open_last` skill.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{Intent, ResultStore, SearchResult, Skill};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) leo-daemon";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RESULTS: usize = 5;

const SUMMARY_SENTENCES: usize = 4;
const MIN_SENTENCE_CHARS: usize = 60;
const MAX_SUMMARY_CHARS: usize = 600;

/// Page regions that never hold article text
const BOILERPLATE: [&str; 8] = [
    "script", "style", "noscript", "header", "footer", "aside", "form", "nav",
];

pub fn skill(results: ResultStore) -> Skill {
    Skill::new(
        "web_search",
        vec![Intent::new(
            [
                "search the web for",
                "search the web",
                "search for",
                // trailing space keeps a bare "research" from matching
                "search ",
                "web search",
                "what is",
                "who is",
                "tell me about",
                "news on",
            ],
            move |text, speak| {
                let Some(query) = extract_query(text) else {
                    speak.say("What should I search for?");
                    return Ok(());
                };

                speak.say(&format!("Searching the web for {query}"));
                let client = Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .user_agent(USER_AGENT)
                    .build()?;

                let hits = search(&client, &query).unwrap_or_else(|e| {
                    warn!(%query, error = %e, "web search failed");
                    Vec::new()
                });
                let Some(top) = hits.into_iter().next() else {
                    speak.say("I couldn't find anything right now.");
                    return Ok(());
                };

                info!(title = %top.title, url = %top.url, "top search result");
                results.set(top.clone());

                let content = fetch_text(&client, &top.url).unwrap_or_else(|e| {
                    debug!(url = %top.url, error = %e, "could not fetch result page");
                    String::new()
                });
                match summarize(&content) {
                    Some(summary) => speak.say(&format!("{}. Summary: {summary}", top.title)),
                    None => speak.say(&format!(
                        "I found {}, but couldn't extract the article text.",
                        top.title
                    )),
                }
                Ok(())
            },
        )
        .named("web_search")],
    )
}

/// Query following a spoken search form
///
/// Leading forms are preferred; a search phrase anywhere in the text is
/// accepted as a fallback.
fn extract_query(text: &str) -> Option<String> {
    static PATTERNS: OnceLock<(Vec<Regex>, Vec<Regex>)> = OnceLock::new();
    let (leading, anywhere) = PATTERNS.get_or_init(|| {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
        };
        (
            compile(&[
                r"(?i)^search the web for\s+(.+)$",
                r"(?i)^search the web\s+(.+)$",
                r"(?i)^(?:search for|web search|search)\s+(.+)$",
                r"(?i)^(?:what is|who is|tell me about|news on)\s+(.+)$",
            ]),
            compile(&[
                r"(?i)search the web for\s+(.+)",
                r"(?i)search the web\s+(.+)",
                r"(?i)(?:search for|web search|search)\s+(.+)",
            ]),
        )
    });

    let text = text.trim();
    leading
        .iter()
        .chain(anywhere.iter())
        .find_map(|re| re.captures(text))
        .map(|c| c[1].trim().to_string())
        .filter(|q| !q.is_empty())
}

/// Top organic results for `query`
fn search(client: &Client, query: &str) -> anyhow::Result<Vec<SearchResult>> {
    let url = format!("{SEARCH_ENDPOINT}?q={}", urlencoding::encode(query));
    let html = client.get(url).send()?.error_for_status()?.text()?;
    Ok(parse_results(&html))
}

fn parse_results(html: &str) -> Vec<SearchResult> {
    let Ok(selector) = Selector::parse("a.result__a") else {
        return Vec::new();
    };

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|link| {
            let url = resolve_href(link.value().attr("href")?)?;
            let title = collapse_whitespace(&link.text().collect::<String>());
            Some(SearchResult {
                title: if title.is_empty() { "result".to_string() } else { title },
                url,
            })
        })
        .take(MAX_RESULTS)
        .collect()
}

/// Unwrap DuckDuckGo's redirect links to the target URL
fn resolve_href(href: &str) -> Option<String> {
    let href = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    if let Some((_, query)) = href.split_once("/l/?") {
        let target = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("uddg="))?;
        return urlencoding::decode(target).ok().map(|s| s.into_owned());
    }

    (href.starts_with("http://") || href.starts_with("https://")).then_some(href)
}

/// Readable text of a page, boilerplate removed
fn fetch_text(client: &Client, url: &str) -> anyhow::Result<String> {
    let html = client.get(url).send()?.error_for_status()?.text()?;
    Ok(extract_text(&html))
}

fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = ["article", "main", "body"]
        .iter()
        .filter_map(|name| Selector::parse(name).ok())
        .find_map(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(root, &mut text);
    collapse_whitespace(&text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(fragment) = child.value().as_text() {
            out.push_str(fragment);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            if !BOILERPLATE.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First few substantial sentences, capped in length
fn summarize(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }

    let sentences = split_sentences(text);
    let mut picked: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| s.chars().count() >= MIN_SENTENCE_CHARS)
        .take(SUMMARY_SENTENCES)
        .collect();
    if picked.is_empty() {
        picked = sentences.iter().copied().take(SUMMARY_SENTENCES).collect();
    }

    let summary = picked.join(" ");
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        return Some(summary);
    }

    let cut: String = summary.chars().take(MAX_SUMMARY_CHARS).collect();
    let cut = cut.rsplit_once(' ').map_or(cut.as_str(), |(head, _)| head);
    Some(format!("{cut}…"))
}

/// Split after `.`, `!` or `?` followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next, n)) = chars.peek() {
                if n.is_whitespace() {
                    let sentence = text[start..next].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next;
                }
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_query_forms() {
        assert_eq!(
            extract_query("search the web for rust traits"),
            Some("rust traits".into())
        );
        assert_eq!(extract_query("search for mars rover"), Some("mars rover".into()));
        assert_eq!(extract_query("who is ada lovelace"), Some("ada lovelace".into()));
        assert_eq!(
            extract_query("could you search for tide tables"),
            Some("tide tables".into())
        );
        assert_eq!(extract_query("what is"), None);
    }

    #[test]
    fn test_parse_results_unwraps_redirects() {
        let html = r#"
            <div class="result">
              <a class="result__a"
                href="//duckduckgo.com/l/?uddg=https%3A%2F%2Frust-lang.org%2F&amp;rut=1">
                Rust   Programming Language
              </a>
            </div>
            <div class="result">
              <a class="result__a" href="https://example.com/direct">Direct</a>
            </div>
            <a class="result__a" href="/relative">Skipped</a>
        "#;

        let results = parse_results(html);
        assert_eq!(
            results,
            vec![
                SearchResult {
                    url: "https://rust-lang.org/".into(),
                    title: "Rust Programming Language".into()
                },
                SearchResult {
                    url: "https://example.com/direct".into(),
                    title: "Direct".into()
                },
            ]
        );
    }

    #[test]
    fn test_extract_text_skips_boilerplate() {
        let html = r#"
            <html><body>
              <nav>Home About</nav>
              <article>
                <h1>Title</h1>
                <script>var x = 1;</script>
                <p>First   paragraph.</p>
                <aside>Related links</aside>
              </article>
            </body></html>
        "#;
        assert_eq!(extract_text(html), "Title First paragraph.");
    }

    #[test]
    fn test_summarize_prefers_long_sentences() {
        let long = "Rust is a general-purpose programming language emphasizing performance.";
        let text = format!("Short one. {long} Tiny! {long}");
        assert_eq!(summarize(&text), Some(format!("{long} {long}")));

        assert_eq!(summarize("Hi. There."), Some("Hi. There.".into()));
        assert_eq!(summarize("   "), None);
    }

    #[test]
    fn test_summarize_caps_length() {
        let sentence = format!("{}.", "word ".repeat(40).trim());
        let text = [sentence.as_str(); 4].join(" ");
        let summary = summarize(&text).unwrap();

        assert!(summary.ends_with('…'));
        assert!(summary.chars().count() <= MAX_SUMMARY_CHARS + 1);
    }
}
