//! Headless document: elements, attributes, focus and handler slots.

use std::collections::BTreeMap;

use hostlink_abi::event::EventKind;

use crate::closure::FunctionRef;
use crate::config::CanvasConfig;
use crate::host::gl::ContextId;
use crate::value::HostException;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u32);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasState {
    pub width: u32,
    pub height: u32,
    pub context: Option<ContextId>,
}

#[derive(Debug, Default)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    pub client_width: i32,
    pub client_height: i32,
    canvas: Option<CanvasState>,
    handlers: [Option<FunctionRef>; EventKind::COUNT],
}

impl Element {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn canvas(&self) -> Option<&CanvasState> {
        self.canvas.as_ref()
    }

    pub fn canvas_mut(&mut self) -> Option<&mut CanvasState> {
        self.canvas.as_mut()
    }

    pub fn is_canvas(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn handler(&self, kind: EventKind) -> Option<&FunctionRef> {
        self.handlers[kind.index()].as_ref()
    }

    /// Keyboard focus needs an explicit `tabindex` on everything but
    /// natively focusable controls.
    fn is_focusable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "button" | "textarea" | "select" | "a")
            || self.attributes.contains_key("tabindex")
    }
}

#[derive(Debug)]
pub struct Document {
    elements: Vec<Element>,
    focused: Option<ElementId>,
    device_pixel_ratio: f64,
}

impl Document {
    pub fn new(device_pixel_ratio: f64) -> Self {
        Self {
            elements: Vec::new(),
            focused: None,
            device_pixel_ratio,
        }
    }

    /// A document holding the configured canvas.
    pub fn from_config(canvas: &CanvasConfig) -> Self {
        let mut doc = Self::new(canvas.device_pixel_ratio);
        let el = doc.create_element("canvas");
        if let Some(element) = doc.element_mut(el) {
            element
                .attributes
                .insert("id".to_string(), canvas.id.clone());
            element.client_width = canvas.client_width;
            element.client_height = canvas.client_height;
            element.canvas = Some(CanvasState {
                width: canvas.width,
                height: canvas.height,
                context: None,
            });
        }
        doc
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn create_element(&mut self, tag: &str) -> ElementId {
        let tag = tag.to_ascii_lowercase();
        let canvas = (tag == "canvas").then(|| CanvasState {
            width: 300,
            height: 150,
            context: None,
        });
        self.elements.push(Element {
            tag,
            canvas,
            ..Element::default()
        });
        ElementId(self.elements.len() as u32 - 1)
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(id.0 as usize)
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.elements.get_mut(id.0 as usize)
    }

    pub fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.elements
            .iter()
            .position(|el| el.id() == Some(id))
            .map(|index| ElementId(index as u32))
    }

    pub fn set_attribute(
        &mut self,
        el: ElementId,
        name: &str,
        value: &str,
    ) -> Result<(), HostException> {
        if !is_valid_attribute_name(name) {
            return Err(HostException::invalid_character(format!(
                "Failed to execute 'setAttribute' on 'Element': '{name}' is not a valid attribute name."
            )));
        }
        let element = self
            .element_mut(el)
            .ok_or_else(|| HostException::type_error("element is not attached"))?;
        let name = name.to_ascii_lowercase();

        // width/height reflect into the canvas drawing buffer
        if let Some(canvas) = element.canvas.as_mut() {
            match name.as_str() {
                "width" => canvas.width = value.trim().parse().unwrap_or(300),
                "height" => canvas.height = value.trim().parse().unwrap_or(150),
                _ => {}
            }
        }
        element.attributes.insert(name, value.to_string());
        Ok(())
    }

    pub fn get_attribute(&self, el: ElementId, name: &str) -> Option<&str> {
        self.element(el)?.attribute(name)
    }

    /// Moves focus to `el` when it can take focus; otherwise does nothing.
    pub fn focus(&mut self, el: ElementId) -> bool {
        let focusable = self.element(el).is_some_and(Element::is_focusable);
        if focusable {
            self.focused = Some(el);
        }
        focusable
    }

    pub fn focused(&self) -> Option<ElementId> {
        self.focused
    }

    /// Installs (or clears) the handler for `kind`, returning the previous
    /// one.
    pub fn set_handler(
        &mut self,
        el: ElementId,
        kind: EventKind,
        handler: Option<FunctionRef>,
    ) -> Option<FunctionRef> {
        let element = self.element_mut(el)?;
        std::mem::replace(&mut element.handlers[kind.index()], handler)
    }

    pub fn handler(&self, el: ElementId, kind: EventKind) -> Option<&FunctionRef> {
        self.element(el)?.handler(kind)
    }

    /// Drops every installed handler.
    pub fn clear_handlers(&mut self) {
        for element in &mut self.elements {
            element.handlers = Default::default();
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

fn is_valid_attribute_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == ':')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ClosureTable;

    fn doc() -> Document {
        Document::from_config(&CanvasConfig::default())
    }

    #[test]
    fn test_configured_canvas() {
        let doc = doc();
        let canvas = doc.element_by_id("canvas").unwrap();
        let el = doc.element(canvas).unwrap();
        assert_eq!(el.tag(), "canvas");
        assert_eq!(el.canvas().unwrap().width, 300);
        assert!(doc.element_by_id("missing").is_none());
    }

    #[test]
    fn test_attributes() {
        let mut doc = doc();
        let canvas = doc.element_by_id("canvas").unwrap();
        doc.set_attribute(canvas, "tabIndex", "0").unwrap();
        assert_eq!(doc.get_attribute(canvas, "tabindex"), Some("0"));

        doc.set_attribute(canvas, "width", "640").unwrap();
        assert_eq!(doc.element(canvas).unwrap().canvas().unwrap().width, 640);

        let err = doc.set_attribute(canvas, "1bad name", "x").unwrap_err();
        assert_eq!(err.name, "InvalidCharacterError");
        assert!(doc.set_attribute(canvas, "", "x").is_err());
    }

    #[test]
    fn test_focus_requires_tabindex() {
        let mut doc = doc();
        let canvas = doc.element_by_id("canvas").unwrap();
        assert!(!doc.focus(canvas));
        assert_eq!(doc.focused(), None);
        doc.set_attribute(canvas, "tabindex", "0").unwrap();
        assert!(doc.focus(canvas));
        assert_eq!(doc.focused(), Some(canvas));
    }

    #[test]
    fn test_handler_slots() {
        let mut doc = doc();
        let mut closures = ClosureTable::new();
        let canvas = doc.element_by_id("canvas").unwrap();
        let f = closures.create(1, 1, 0);

        assert!(doc.set_handler(canvas, EventKind::KeyDown, Some(f.clone())).is_none());
        assert_eq!(doc.handler(canvas, EventKind::KeyDown), Some(&f));
        assert!(doc.handler(canvas, EventKind::KeyUp).is_none());

        let previous = doc.set_handler(canvas, EventKind::KeyDown, None);
        assert_eq!(previous, Some(f));
        doc.set_handler(canvas, EventKind::Wheel, previous);
        doc.clear_handlers();
        assert!(doc.handler(canvas, EventKind::Wheel).is_none());
    }

    #[test]
    fn test_create_element() {
        let mut doc = Document::new(2.0);
        let div = doc.create_element("DIV");
        assert_eq!(doc.element(div).unwrap().tag(), "div");
        assert!(!doc.element(div).unwrap().is_canvas());
        assert_eq!(doc.device_pixel_ratio(), 2.0);
        assert_eq!(doc.len(), 1);
    }
}
