use super::{embedded_selector, is_embedded_tag, ChildSummary, Container};

impl Container for web_sys::Element {
    fn text_content(&self) -> String {
        web_sys::Node::text_content(self).unwrap_or_default()
    }

    fn contains_embedded(&self) -> bool {
        self.query_selector(&embedded_selector())
            .ok()
            .flatten()
            .is_some()
    }

    fn element_children(&self) -> Vec<ChildSummary> {
        let children = self.children();
        let selector = embedded_selector();
        (0..children.length())
            .filter_map(|i| children.item(i))
            .map(|child| ChildSummary {
                text: web_sys::Node::text_content(&child).unwrap_or_default(),
                embedded: is_embedded_tag(&child.local_name())
                    || child.query_selector(&selector).ok().flatten().is_some(),
            })
            .collect()
    }

    fn inner_html(&self) -> String {
        web_sys::Element::inner_html(self)
    }

    fn set_inner_html(&self, markup: &str) {
        web_sys::Element::set_inner_html(self, markup);
    }

    fn wrap_children(&self, tag: &str) {
        let Some(doc) = self.owner_document() else {
            return;
        };
        let Ok(wrapper) = doc.create_element(tag) else {
            return;
        };
        while let Some(child) = self.first_child() {
            if wrapper.append_child(&child).is_err() {
                break;
            }
        }
        let _ = self.append_child(&wrapper);
    }

    fn set_marker(&self, name: &str, value: &str) {
        let _ = self.set_attribute(name, value);
    }

    fn remove_marker(&self, name: &str) {
        let _ = self.remove_attribute(name);
    }

    fn has_marker(&self, name: &str) -> bool {
        self.has_attribute(name)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use crate::markup::{normalize, Container, EMPTY_BLOCK, EMPTY_MARKER};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn element() -> web_sys::Element {
        let doc = web_sys::window()
            .and_then(|w| w.document())
            .expect("document should exist");
        doc.create_element("div").expect("should create div")
    }

    #[wasm_bindgen_test]
    fn test_live_element_wraps_loose_text() {
        let el = element();
        Container::set_inner_html(&el, "hello");
        assert_eq!(normalize(&el), "<div>hello</div>");
        assert!(!el.has_attribute(EMPTY_MARKER));
    }

    #[wasm_bindgen_test]
    fn test_live_element_marks_empty() {
        let el = element();
        Container::set_inner_html(&el, "\u{200B} ");
        assert_eq!(normalize(&el), EMPTY_BLOCK);
        assert!(el.has_attribute(EMPTY_MARKER));
    }
}
