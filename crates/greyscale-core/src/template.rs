//! Gallery page templates.
//!
//! The template language is deliberately tiny:
//! - `{{count}}` renders the number of images
//! - `{{#images}} ... {{/images}}` repeats its body once per image URL
//! - `{{url}}` inside that block renders the current URL, HTML-escaped
//!
//! A newline directly after a block tag is dropped so block tags can sit on
//! their own lines. Anything else between `{{` and `}}` is a parse error.

use std::path::Path;

use crate::error::TemplateError;

/// Built-in gallery page.
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/gallery.html");

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Count,
    Url,
    Images(Vec<Segment>),
}

/// A parsed gallery template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryTemplate {
    segments: Vec<Segment>,
}

impl GalleryTemplate {
    /// Parse template source.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut block: Option<Vec<Segment>> = None;
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            let text = &rest[..start];
            let after_open = &rest[start + 2..];
            let end = after_open.find("}}").ok_or(TemplateError::UnclosedTag {
                offset: source.len() - rest.len() + start,
            })?;
            let tag = after_open[..end].trim();
            rest = &after_open[end + 2..];

            let target = block.as_mut().unwrap_or(&mut segments);
            if !text.is_empty() {
                target.push(Segment::Text(text.to_string()));
            }

            match tag {
                "count" => target.push(Segment::Count),
                "url" => match block.as_mut() {
                    Some(body) => body.push(Segment::Url),
                    None => return Err(TemplateError::UrlOutsideBlock),
                },
                "#images" => {
                    if block.is_some() {
                        return Err(TemplateError::NestedBlock);
                    }
                    block = Some(Vec::new());
                    rest = rest.strip_prefix('\n').unwrap_or(rest);
                }
                "/images" => {
                    let body = block.take().ok_or(TemplateError::UnmatchedClose)?;
                    segments.push(Segment::Images(body));
                    rest = rest.strip_prefix('\n').unwrap_or(rest);
                }
                other => return Err(TemplateError::UnknownTag(other.to_string())),
            }
        }

        if block.is_some() {
            return Err(TemplateError::UnclosedBlock);
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }
        Ok(Self { segments })
    }

    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&source)
    }

    /// The built-in template.
    pub fn builtin() -> Result<Self, TemplateError> {
        Self::parse(DEFAULT_TEMPLATE)
    }

    /// Render with the given URLs. Pure: same input, same bytes.
    pub fn render(&self, urls: &[String]) -> String {
        let mut out = String::new();
        render_segments(&self.segments, urls, None, &mut out);
        out
    }
}

fn render_segments(segments: &[Segment], urls: &[String], current: Option<&str>, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Count => out.push_str(&urls.len().to_string()),
            Segment::Url => out.push_str(&escape_html(current.unwrap_or_default())),
            Segment::Images(body) => {
                for url in urls {
                    render_segments(body, urls, Some(url), out);
                }
            }
        }
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_template_parses() {
        let page = GalleryTemplate::builtin()
            .unwrap()
            .render(&urls(&["https://a/1.jpg", "https://a/2.jpg"]));
        assert!(page.contains(r#"<img src="https://a/1.jpg""#));
        assert!(page.contains(r#"<img src="https://a/2.jpg""#));
        assert!(page.contains("2 image(s)"));
    }

    #[test]
    fn test_render_repeats_block_in_order() {
        let tpl = GalleryTemplate::parse("[{{count}}]{{#images}}\n<{{url}}>{{/images}}\n.").unwrap();
        assert_eq!(tpl.render(&urls(&["a", "b"])), "[2]<a><b>.");
        assert_eq!(tpl.render(&[]), "[0].");
    }

    #[test]
    fn test_render_escapes_urls() {
        let tpl = GalleryTemplate::parse("{{#images}}{{url}}{{/images}}").unwrap();
        assert_eq!(
            tpl.render(&urls(&[r#"https://x/a"b<c>&d"#])),
            "https://x/a&quot;b&lt;c&gt;&amp;d"
        );
    }

    #[test]
    fn test_render_is_deterministic() {
        let tpl = GalleryTemplate::builtin().unwrap();
        let list = urls(&["u1", "u2", "u3"]);
        assert_eq!(tpl.render(&list), tpl.render(&list));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            GalleryTemplate::parse("{{#images}}x"),
            Err(TemplateError::UnclosedBlock)
        ));
        assert!(matches!(
            GalleryTemplate::parse("{{/images}}"),
            Err(TemplateError::UnmatchedClose)
        ));
        assert!(matches!(
            GalleryTemplate::parse("{{url}}"),
            Err(TemplateError::UrlOutsideBlock)
        ));
        assert!(matches!(
            GalleryTemplate::parse("{{title}}"),
            Err(TemplateError::UnknownTag(tag)) if tag == "title"
        ));
        assert!(matches!(
            GalleryTemplate::parse("ab{{count"),
            Err(TemplateError::UnclosedTag { offset: 2 })
        ));
        assert!(matches!(
            GalleryTemplate::parse("{{#images}}{{#images}}{{/images}}{{/images}}"),
            Err(TemplateError::NestedBlock)
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = GalleryTemplate::load(&dir.path().join("nope.html")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
        assert!(err.to_string().contains("cannot read"));
    }
}
