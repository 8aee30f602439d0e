//! CSS rules collected from components during a render pass.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    rules: Vec<String>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule unless an identical one is already collected.
    pub fn add(&mut self, rule: impl Into<String>) {
        let rule = rule.into();
        let trimmed = rule.trim();
        if trimmed.is_empty() || self.rules.iter().any(|existing| existing == trimmed) {
            return;
        }
        self.rules.push(trimmed.to_string());
    }

    pub fn rules(&self) -> &[String] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// A single `<style>` element holding every rule, or an empty string.
    pub fn to_style_tag(&self) -> String {
        if self.rules.is_empty() {
            return String::new();
        }
        let css = self.rules.join("");
        // Rules must not be able to close the element early.
        format!("<style data-trellis>{}</style>", css.replace("</", "<\\/"))
    }
}
