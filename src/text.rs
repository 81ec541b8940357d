//! Line-level text cleanup used by the prepare and process stages.

use std::sync::LazyLock;

use regex::Regex;

static RE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b((?:https?://|www\d{0,3}[.]|[a-z0-9.\-]+[.][a-z]{2,4}/)(?:[^\s()<>]+|\(([^\s()<>]+|(\([^\s()<>]+\)))*\))+(?:\(([^\s()<>]+|(\([^\s()<>]+\)))*\)|[^\s`!()\[\]{};:'".,<>?«»“”‘’]))"#,
    )
    .expect("Error compiling link pattern")
});

const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Strips URL-like substrings: `http(s)://`, `www.` prefixes and bare
/// domains followed by a path.
pub fn remove_links(text: &str) -> String {
    RE_LINK.replace_all(text, "").into_owned()
}

/// Strips the ASCII punctuation set.
pub fn remove_punctuation(text: &str) -> String {
    text.chars().filter(|c| !PUNCTUATION.contains(*c)).collect()
}

/// Strips decimal digits.
pub fn remove_digits(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Splits cleaned text into word tokens on whitespace.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_http_and_bare_links() {
        assert_eq!(
            remove_links("see https://example.com/a/b for details"),
            "see  for details"
        );
        assert_eq!(remove_links("go to www.example.org now"), "go to  now");
        assert_eq!(
            remove_links("docs at example.com/path end"),
            "docs at  end"
        );
    }

    #[test]
    fn leaves_plain_text_alone() {
        assert_eq!(remove_links("no links here"), "no links here");
    }

    #[test]
    fn strips_ascii_punctuation() {
        assert_eq!(remove_punctuation("it's done, right?"), "its done right");
        assert_eq!(remove_punctuation("a-b_c"), "abc");
    }

    #[test]
    fn strips_digits_only() {
        assert_eq!(remove_digits("agent 007 reporting"), "agent  reporting");
    }

    #[test]
    fn tokenizes_on_whitespace() {
        let tokens: Vec<&str> = tokenize("  the quick\tbrown\nfox ").collect();
        assert_eq!(tokens, vec!["the", "quick", "brown", "fox"]);
    }
}
