use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry of a fetched feed, reduced to its textual properties.
///
/// Every field is optional because RSS and Atom disagree on what an item must
/// carry. Properties are looked up by name through [`FeedEntry::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    /// RFC 2822 timestamp
    pub published: Option<String>,
    /// RFC 2822 timestamp
    pub updated: Option<String>,
    pub category: Option<String>,
}

impl FeedEntry {
    /// Returns the value of a named property, if the entry has it.
    ///
    /// Names are matched case-sensitively. `description` is an alias for
    /// `summary` and `guid` for `id`, matching the RSS element names.
    /// Unknown names yield `None`, same as a missing value.
    pub fn get(&self, property: &str) -> Option<&str> {
        let value = match property {
            "id" | "guid" => &self.id,
            "title" => &self.title,
            "summary" | "description" => &self.summary,
            "content" => &self.content,
            "link" => &self.link,
            "author" => &self.author,
            "published" => &self.published,
            "updated" => &self.updated,
            "category" => &self.category,
            _ => return None,
        };
        value.as_deref()
    }
}

/// Parses RSS or Atom bytes into entries, preserving feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let id = if entry.id.trim().is_empty() {
                None
            } else {
                Some(entry.id.trim().to_string())
            };

            FeedEntry {
                id,
                title: entry.title.map(|t| t.content),
                summary: entry.summary.map(|s| s.content),
                content: entry.content.and_then(|c| c.body),
                link: entry.links.first().map(|l| l.href.clone()),
                author: entry.authors.first().map(|p| p.name.clone()),
                published: entry.published.map(spoken_timestamp),
                updated: entry.updated.map(spoken_timestamp),
                category: entry.categories.first().map(|c| c.term.clone()),
            }
        })
        .collect();

    Ok(entries)
}

fn spoken_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>News</title>
    <item>
        <guid>story-1</guid>
        <title>First headline</title>
        <description>Summary one</description>
        <link>https://example.com/1</link>
        <category>World</category>
        <pubDate>Mon, 06 Nov 2023 09:30:00 GMT</pubDate>
    </item>
    <item>
        <guid>story-2</guid>
        <title>Second headline</title>
    </item>
</channel></rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Blog</title>
    <id>urn:blog</id>
    <updated>2023-11-06T09:30:00Z</updated>
    <entry>
        <id>urn:post:1</id>
        <title>Atom post</title>
        <updated>2023-11-06T09:30:00Z</updated>
        <author><name>Ada</name></author>
        <summary>Short summary</summary>
        <link href="https://example.com/post"/>
    </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_entries_in_order() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("First headline"));
        assert_eq!(entries[1].title.as_deref(), Some("Second headline"));
    }

    #[test]
    fn test_parse_rss_fields() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        let first = &entries[0];
        assert_eq!(first.id.as_deref(), Some("story-1"));
        assert_eq!(first.summary.as_deref(), Some("Summary one"));
        assert_eq!(first.link.as_deref(), Some("https://example.com/1"));
        assert_eq!(first.category.as_deref(), Some("World"));
        assert!(first.published.as_deref().unwrap().contains("Nov 2023"));

        let second = &entries[1];
        assert_eq!(second.summary, None);
        assert_eq!(second.link, None);
    }

    #[test]
    fn test_parse_atom_fields() {
        let entries = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title.as_deref(), Some("Atom post"));
        assert_eq!(entry.author.as_deref(), Some("Ada"));
        assert_eq!(entry.summary.as_deref(), Some("Short summary"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/post"));
        assert!(entry.updated.is_some());
    }

    #[test]
    fn test_parse_empty_channel() {
        let empty = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        assert!(parse_feed(empty.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_xml_is_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }

    #[test]
    fn test_get_by_name_and_alias() {
        let entry = FeedEntry {
            id: Some("abc".into()),
            title: Some("Title".into()),
            summary: Some("Summary".into()),
            ..Default::default()
        };
        assert_eq!(entry.get("title"), Some("Title"));
        assert_eq!(entry.get("summary"), Some("Summary"));
        assert_eq!(entry.get("description"), Some("Summary"));
        assert_eq!(entry.get("guid"), Some("abc"));
        assert_eq!(entry.get("link"), None);
        assert_eq!(entry.get("title_b"), None);
        assert_eq!(entry.get("Title"), None);
    }
}
