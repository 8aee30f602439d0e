//! Document metadata captured while rendering.

use serde::Serialize;

use super::node::{escape_attribute, escape_text};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaTag {
    /// `name` or `property` attribute, whichever the tag is keyed by.
    pub key_attribute: &'static str,
    pub key: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkTag {
    pub rel: String,
    pub href: String,
}

/// Title, meta and link tags for the document head. Later writes win: a nested
/// component can override what its ancestors declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeadTags {
    title: Option<String>,
    meta: Vec<MetaTag>,
    links: Vec<LinkTag>,
}

impl HeadTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, title: impl Into<String>) -> &mut Self {
        self.title = Some(title.into());
        self
    }

    pub fn meta(&mut self, name: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.upsert_meta("name", name.into(), content.into());
        self
    }

    pub fn property(
        &mut self,
        property: impl Into<String>,
        content: impl Into<String>,
    ) -> &mut Self {
        self.upsert_meta("property", property.into(), content.into());
        self
    }

    pub fn link(&mut self, rel: impl Into<String>, href: impl Into<String>) -> &mut Self {
        let rel = rel.into();
        let href = href.into();
        if !self.links.iter().any(|link| link.rel == rel && link.href == href) {
            self.links.push(LinkTag { rel, href });
        }
        self
    }

    fn upsert_meta(&mut self, key_attribute: &'static str, key: String, content: String) {
        match self
            .meta
            .iter_mut()
            .find(|tag| tag.key_attribute == key_attribute && tag.key == key)
        {
            Some(existing) => existing.content = content,
            None => self.meta.push(MetaTag {
                key_attribute,
                key,
                content,
            }),
        }
    }

    pub fn title_text(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.meta.is_empty() && self.links.is_empty()
    }

    /// Concatenated tag markup, title first.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        if let Some(title) = &self.title {
            html.push_str("<title>");
            html.push_str(&escape_text(title));
            html.push_str("</title>");
        }
        for tag in &self.meta {
            html.push_str(&format!(
                "<meta {}=\"{}\" content=\"{}\">",
                tag.key_attribute,
                escape_attribute(&tag.key),
                escape_attribute(&tag.content)
            ));
        }
        for link in &self.links {
            html.push_str(&format!(
                "<link rel=\"{}\" href=\"{}\">",
                escape_attribute(&link.rel),
                escape_attribute(&link.href)
            ));
        }
        html
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_title_and_meta_override_earlier_ones() {
        let mut head = HeadTags::new();
        head.title("Community").meta("description", "all threads");
        head.title("Thread 1").meta("description", "one thread");

        assert_eq!(
            head.to_html(),
            "<title>Thread 1</title><meta name=\"description\" content=\"one thread\">"
        );
    }

    #[test]
    fn links_are_deduplicated() {
        let mut head = HeadTags::new();
        head.link("canonical", "/thread/1").link("canonical", "/thread/1");
        assert_eq!(head.to_html(), "<link rel=\"canonical\" href=\"/thread/1\">");
    }

    #[test]
    fn values_are_escaped() {
        let mut head = HeadTags::new();
        head.title("<script>").property("og:title", "\"quoted\"");
        assert_eq!(
            head.to_html(),
            concat!(
                "<title>&lt;script&gt;</title>",
                "<meta property=\"og:title\" content=\"&quot;quoted&quot;\">",
            )
        );
    }
}
