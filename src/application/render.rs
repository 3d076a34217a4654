//! Markdown rendering for post bodies and comments.
//!
//! Comrak produces the HTML, ammonia strips anything unsafe afterwards. The
//! sanitizer is the trust boundary: author input is never assumed clean.

use std::collections::HashSet;

use ammonia::Builder;
use comrak::{Options, markdown_to_html};
use once_cell::sync::Lazy;

static COMMENT_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "a", "p", "em", "strong", "code", "pre", "blockquote", "ul", "ol", "li", "br",
    ])
});

#[derive(Clone)]
pub struct RenderService {
    options: Options<'static>,
}

impl Default for RenderService {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderService {
    pub fn new() -> Self {
        let mut options = Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.autolink = true;
        options.extension.tasklist = true;
        options.extension.footnotes = true;
        options.render.r#unsafe = true; // sanitized below
        Self { options }
    }

    /// Render a post body: full extension set, sanitized HTML out.
    pub fn render_markdown(&self, markdown: &str) -> String {
        let raw = markdown_to_html(markdown, &self.options);
        Builder::default()
            .add_generic_attributes(["class"])
            .clean(&raw)
            .to_string()
    }

    /// Render a comment: links and emphasis only, no headings or images.
    pub fn render_comment(&self, markdown: &str) -> String {
        let raw = markdown_to_html(markdown, &self.options);
        Builder::default()
            .tags(COMMENT_TAGS.clone())
            .clean(&raw)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_tables_and_sanitizes_scripts() {
        let service = RenderService::new();
        let html = service.render_markdown("| a |\n|---|\n| b |\n\n<script>alert(1)</script>");
        assert!(html.contains("<table>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn comments_drop_images() {
        let service = RenderService::new();
        let html = service.render_comment("![x](https://example.com/x.png) *fine*");
        assert!(!html.contains("<img"));
        assert!(html.contains("<em>fine</em>"));
    }
}
