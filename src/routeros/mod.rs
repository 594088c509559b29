//! Minimal RouterOS API client
mod client;
pub mod proto;

pub use client::{Client, Stream};

/// A single reply sentence, e.g. one `!re` row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sentence {
    /// Reply word such as `!re`, `!done` or `!trap`
    pub word: String,
    /// Request tag, when the request carried one
    pub tag: Option<String>,
    /// Attribute words in the order the device sent them
    pub attributes: Vec<(String, String)>,
}

impl Sentence {
    /// Build a sentence from raw API words
    pub fn parse(words: &[String]) -> Self {
        let mut sentence = Sentence::default();
        let mut iter = words.iter();

        if let Some(word) = iter.next() {
            sentence.word = word.clone();
        }

        for word in iter {
            if let Some(tag) = word.strip_prefix(".tag=") {
                sentence.tag = Some(tag.to_string());
            } else if let Some(attribute) = word.strip_prefix('=') {
                let (key, value) = attribute.split_once('=').unwrap_or((attribute, ""));
                sentence.attributes.push((key.to_string(), value.to_string()));
            }
        }

        sentence
    }

    /// Attribute value by key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value by key, empty when missing
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.get(key).unwrap_or_default()
    }
}

/// The complete answer to one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Data rows
    pub re: Vec<Sentence>,
    /// Terminating `!done` sentence
    pub done: Sentence,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_attributes_keep_embedded_equals() {
        let sentence = Sentence::parse(&words(&[
            "!re",
            "=name=ether1",
            "=comment=a=b",
            "=disabled=",
            ".tag=7",
        ]));

        assert_eq!(sentence.word, "!re");
        assert_eq!(sentence.tag.as_deref(), Some("7"));
        assert_eq!(sentence.get("name"), Some("ether1"));
        assert_eq!(sentence.get("comment"), Some("a=b"));
        assert_eq!(sentence.get("disabled"), Some(""));
        assert_eq!(sentence.get_or_empty("running"), "");
    }
}
