//! The one editable surface, and where derived titles go.

use crate::markup::{ChildSummary, Container, Fragment};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::JsCast;

/// The editable surface as the synchronizer sees it.
pub trait Surface: Container {
    /// Whether the user is typing into it right now.
    fn is_focused(&self) -> bool;
}

/// Headless surface over a [`Fragment`].
#[derive(Debug, Default)]
pub struct MemorySurface {
    content: Fragment,
    focused: Cell<bool>,
}

impl MemorySurface {
    pub fn new(markup: &str) -> Self {
        Self {
            content: Fragment::parse(markup),
            focused: Cell::new(false),
        }
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.set(focused);
    }
}

impl Container for MemorySurface {
    fn text_content(&self) -> String {
        self.content.text_content()
    }
    fn contains_embedded(&self) -> bool {
        self.content.contains_embedded()
    }
    fn element_children(&self) -> Vec<ChildSummary> {
        self.content.element_children()
    }
    fn inner_html(&self) -> String {
        self.content.inner_html()
    }
    fn set_inner_html(&self, markup: &str) {
        self.content.set_inner_html(markup)
    }
    fn wrap_children(&self, tag: &str) {
        self.content.wrap_children(tag)
    }
    fn set_marker(&self, name: &str, value: &str) {
        self.content.set_marker(name, value)
    }
    fn remove_marker(&self, name: &str) {
        self.content.remove_marker(name)
    }
    fn has_marker(&self, name: &str) -> bool {
        self.content.has_marker(name)
    }
}

impl Surface for MemorySurface {
    fn is_focused(&self) -> bool {
        self.focused.get()
    }
}

/// The live `contenteditable` element.
#[derive(Clone, Debug)]
pub struct DomSurface {
    element: web_sys::HtmlElement,
}

impl DomSurface {
    pub fn new(element: web_sys::HtmlElement) -> Self {
        Self { element }
    }

    pub fn element(&self) -> &web_sys::HtmlElement {
        &self.element
    }

    fn as_element(&self) -> &web_sys::Element {
        self.element.unchecked_ref()
    }
}

impl Container for DomSurface {
    fn text_content(&self) -> String {
        Container::text_content(self.as_element())
    }
    fn contains_embedded(&self) -> bool {
        Container::contains_embedded(self.as_element())
    }
    fn element_children(&self) -> Vec<ChildSummary> {
        Container::element_children(self.as_element())
    }
    fn inner_html(&self) -> String {
        Container::inner_html(self.as_element())
    }
    fn set_inner_html(&self, markup: &str) {
        Container::set_inner_html(self.as_element(), markup)
    }
    fn wrap_children(&self, tag: &str) {
        Container::wrap_children(self.as_element(), tag)
    }
    fn set_marker(&self, name: &str, value: &str) {
        Container::set_marker(self.as_element(), name, value)
    }
    fn remove_marker(&self, name: &str) {
        Container::remove_marker(self.as_element(), name)
    }
    fn has_marker(&self, name: &str) -> bool {
        Container::has_marker(self.as_element(), name)
    }
}

impl Surface for DomSurface {
    // Asks the element's current document, which differs from the main one
    // while the surface sits in a detached view.
    fn is_focused(&self) -> bool {
        self.element
            .owner_document()
            .and_then(|doc| doc.active_element())
            .is_some_and(|active| active.is_same_node(Some(self.element.as_ref())))
    }
}

pub trait TitleSink {
    fn set_title(&self, title: &str);
}

/// Writes `document.title` of the main page.
#[derive(Clone, Copy, Debug, Default)]
pub struct DocumentTitle;

impl TitleSink for DocumentTitle {
    fn set_title(&self, title: &str) {
        if let Ok(doc) = crate::util::document() {
            doc.set_title(title);
        }
    }
}

/// Records every title it is given.
#[derive(Clone, Debug, Default)]
pub struct MemoryTitle {
    titles: Rc<RefCell<Vec<String>>>,
}

impl MemoryTitle {
    pub fn current(&self) -> Option<String> {
        self.titles.borrow().last().cloned()
    }

    pub fn history(&self) -> Vec<String> {
        self.titles.borrow().clone()
    }
}

impl TitleSink for MemoryTitle {
    fn set_title(&self, title: &str) {
        self.titles.borrow_mut().push(title.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{normalize, EMPTY_MARKER};

    #[test]
    fn test_memory_surface_normalizes_like_a_container() {
        let s = MemorySurface::new("hello");
        assert_eq!(normalize(&s), "<div>hello</div>");
        assert!(!s.has_marker(EMPTY_MARKER));

        s.set_inner_html("  ");
        normalize(&s);
        assert!(s.has_marker(EMPTY_MARKER));
    }

    #[test]
    fn test_memory_title_keeps_history() {
        let t = MemoryTitle::default();
        assert_eq!(t.current(), None);
        t.set_title("a");
        t.set_title("b");
        assert_eq!(t.current().as_deref(), Some("b"));
        assert_eq!(t.history(), vec!["a", "b"]);
    }
}
