use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

const TWEET_URL_BASE: &str = "https://x.com/elonmusk/status/";

static TWEET_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[link\]\(#tweet=(\d+)\)").expect("tweet link pattern"));

/// Rewrite upstream `[link](#tweet=<id>)` anchors into absolute status URLs.
pub fn rewrite_tweet_links(text: &str) -> Cow<'_, str> {
    if !text.contains("#tweet=") {
        return Cow::Borrowed(text);
    }
    TWEET_LINK.replace_all(text, format!("[link]({TWEET_URL_BASE}${{1}})").as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_every_link() {
        let text = "see [link](#tweet=123) and [link](#tweet=456).";
        assert_eq!(
            rewrite_tweet_links(text),
            "see [link](https://x.com/elonmusk/status/123) and \
             [link](https://x.com/elonmusk/status/456)."
        );
    }

    #[test]
    fn test_leaves_other_text_alone() {
        assert!(matches!(rewrite_tweet_links("plain"), Cow::Borrowed("plain")));
        assert_eq!(
            rewrite_tweet_links("[link](#tweet=abc)"),
            "[link](#tweet=abc)"
        );
        assert_eq!(rewrite_tweet_links("[other](#tweet=1)"), "[other](#tweet=1)");
    }
}
