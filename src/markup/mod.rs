//! Canonical form of the editable surface's markup.
//!
//! Normalization is a structural transform over a [`Container`]; the live
//! element in the browser and the in-memory [`Fragment`] go through the same
//! algorithm. Sanitizing is a separate step ([`sanitize`]).

mod dom;
mod fragment;

pub use fragment::{Fragment, FragmentNode};

/// Wrapper used to group loose children into one block.
pub const BLOCK_TAG: &str = "div";

/// Canonical markup of an empty note.
pub const EMPTY_BLOCK: &str = "<div><br></div>";

/// Attribute set on the container while it is effectively empty.
pub const EMPTY_MARKER: &str = "data-empty";

/// Title used when the note has no text line.
pub const DEFAULT_TITLE: &str = "Note";

/// Elements that count as content even without any text.
pub const EMBEDDED_TAGS: &[&str] = &[
    "img", "picture", "video", "audio", "canvas", "svg", "iframe", "object", "embed", "hr",
];

/// `EMBEDDED_TAGS` as a CSS selector list.
pub(crate) fn embedded_selector() -> String {
    EMBEDDED_TAGS.join(",")
}

pub(crate) fn is_embedded_tag(tag: &str) -> bool {
    EMBEDDED_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// What normalization needs to know about one direct child element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChildSummary {
    pub text: String,
    /// The child is, or contains, embedded non-text content.
    pub embedded: bool,
}

/// A live editable container, as seen by the normalizer.
///
/// Methods take `&self`; implementations mutate through the DOM or interior
/// mutability, the way element handles do.
pub trait Container {
    fn text_content(&self) -> String;
    fn contains_embedded(&self) -> bool;
    fn element_children(&self) -> Vec<ChildSummary>;
    fn inner_html(&self) -> String;
    fn set_inner_html(&self, markup: &str);
    /// Move every child into one new `tag` element appended to the container.
    fn wrap_children(&self, tag: &str);
    fn set_marker(&self, name: &str, value: &str);
    fn remove_marker(&self, name: &str);
    fn has_marker(&self, name: &str) -> bool;
}

pub fn strip_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{FEFF}'))
        .collect()
}

fn has_meaningful_text(text: &str) -> bool {
    !strip_zero_width(text).trim().is_empty()
}

/// Bring `container` into canonical form in place and return its markup.
pub fn normalize<C: Container + ?Sized>(container: &C) -> String {
    if !has_meaningful_text(&container.text_content()) && !container.contains_embedded() {
        container.set_inner_html(EMPTY_BLOCK);
        container.set_marker(EMPTY_MARKER, "true");
        return container.inner_html();
    }

    container.remove_marker(EMPTY_MARKER);

    let grouped = container
        .element_children()
        .iter()
        .any(|child| child.embedded || has_meaningful_text(&child.text));
    if !grouped {
        container.wrap_children(BLOCK_TAG);
    }

    container.inner_html()
}

/// Normalized markup plus its emptiness verdict.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Canonical {
    pub markup: String,
    pub empty: bool,
}

/// Normalize detached markup (no live element involved).
pub fn canonicalize(markup: &str) -> Canonical {
    let fragment = Fragment::parse(markup);
    let markup = normalize(&fragment);
    Canonical {
        empty: fragment.has_marker(EMPTY_MARKER),
        markup,
    }
}

pub fn is_effectively_empty(markup: &str) -> bool {
    let fragment = Fragment::parse(markup);
    !has_meaningful_text(&fragment.text_content()) && !fragment.contains_embedded()
}

/// Filter untrusted markup down to what may be assigned to `innerHTML`.
///
/// Keeps editability and link-target attributes; anything script-bearing is
/// dropped. Input that sanitizes to nothing is simply empty content.
pub fn sanitize(markup: &str) -> String {
    let mut builder = ammonia::Builder::default();
    builder
        .add_tags(&["video", "audio", "source", "picture", "canvas"])
        .add_generic_attributes(&["contenteditable", "spellcheck"])
        .add_tag_attributes("a", &["target"])
        .add_tag_attributes("video", &["src", "controls", "poster"])
        .add_tag_attributes("audio", &["src", "controls"])
        .add_tag_attributes("source", &["src", "type"])
        .add_url_schemes(&["data", "blob"])
        .link_rel(None);
    builder.clean(markup).to_string()
}

/// Text of the note with block boundaries turned into line breaks.
pub fn plain_text(markup: &str) -> String {
    strip_zero_width(&Fragment::parse(markup).plain_text())
}

/// First non-empty line of the note's text, or [`DEFAULT_TITLE`].
pub fn derive_title(markup: &str) -> String {
    plain_text(markup)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(DEFAULT_TITLE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_wrapped_in_one_block() {
        let c = canonicalize("hello");
        assert_eq!(c.markup, "<div>hello</div>");
        assert!(!c.empty);
    }

    #[test]
    fn test_whitespace_and_zero_width_collapse_to_empty_block() {
        for input in ["", "   ", "\u{200B}", "<div>\u{200B} </div>", "<div><br></div>", "&nbsp;"] {
            let c = canonicalize(input);
            assert_eq!(c.markup, EMPTY_BLOCK, "input {input:?}");
            assert!(c.empty, "input {input:?}");
        }
    }

    #[test]
    fn test_image_only_note_is_not_empty() {
        let c = canonicalize(r#"<img src="a.png">"#);
        assert!(!c.empty);
        // A direct embedded child already counts as grouped content.
        assert_eq!(c.markup, r#"<img src="a.png">"#);
    }

    #[test]
    fn test_grouped_children_are_left_alone() {
        let markup = "<div>one</div><div>two</div>";
        assert_eq!(canonicalize(markup).markup, markup);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "hello",
            "a<br>b",
            "<div>x</div>tail",
            "<span> </span>text",
            "<p>para</p>",
            "",
            "<div><img src=\"x.png\"></div>",
            "a &amp; b &lt;c&gt;",
            "\u{200B}word",
        ];
        for input in inputs {
            let once = canonicalize(input).markup;
            let twice = canonicalize(&once).markup;
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn test_marker_cleared_once_content_arrives() {
        let f = Fragment::parse("");
        normalize(&f);
        assert!(f.has_marker(EMPTY_MARKER));

        f.set_inner_html("typed");
        normalize(&f);
        assert!(!f.has_marker(EMPTY_MARKER));
        assert_eq!(f.inner_html(), "<div>typed</div>");
    }

    #[test]
    fn test_sanitize_strips_scripts_and_handlers() {
        let out = sanitize(r#"<div onclick="x()">hi<script>alert(1)</script></div>"#);
        assert_eq!(out, "<div>hi</div>");
    }

    #[test]
    fn test_sanitize_keeps_link_target_and_editability() {
        let out = sanitize(concat!(
            r#"<a href="https://a.b" target="_blank">l</a>"#,
            r#"<span contenteditable="false">x</span>"#,
        ));
        assert!(out.contains(r#"target="_blank""#), "{out}");
        assert!(out.contains(r#"contenteditable="false""#), "{out}");
        assert!(!out.contains("rel="), "{out}");
    }

    #[test]
    fn test_sanitize_malformed_input_is_just_empty() {
        let out = sanitize("<script>only</script>");
        assert!(is_effectively_empty(&out));
    }

    #[test]
    fn test_derive_title_first_non_empty_line() {
        assert_eq!(derive_title("<div><br></div><div>  first </div><div>second</div>"), "first");
        assert_eq!(derive_title("line one<br>line two"), "line one");
        assert_eq!(derive_title(EMPTY_BLOCK), DEFAULT_TITLE);
        assert_eq!(derive_title(r#"<div><img src="a.png"></div>"#), DEFAULT_TITLE);
    }
}
