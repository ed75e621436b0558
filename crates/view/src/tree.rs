use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::domain::ElementId;

/// Serialized form of a view fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    #[serde(default = "default_tag")]
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

fn default_tag() -> String {
    "div".to_string()
}

impl ElementSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            text: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

/// Arena of elements rooted at a host element. Loaded fragments live in the
/// arena detached until attached under the host. Slots freed by
/// [`DisplayTree::remove_subtree`] are reused by later elements.
#[derive(Debug, Clone)]
pub struct DisplayTree {
    slots: Vec<Option<Element>>,
    free: Vec<ElementId>,
    host: ElementId,
}

impl Default for DisplayTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayTree {
    pub fn new() -> Self {
        let mut host = Element::new("div");
        host.attributes
            .insert("id".to_string(), "shell-host".to_string());
        Self {
            slots: vec![Some(host)],
            free: Vec::new(),
            host: ElementId(0),
        }
    }

    pub fn host(&self) -> ElementId {
        self.host
    }

    /// Number of live elements, host included.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create(&mut self, tag: impl Into<String>) -> ElementId {
        let element = Element::new(tag);
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Some(element);
            return id;
        }
        let id = ElementId(self.slots.len() as u32);
        self.slots.push(Some(element));
        id
    }

    /// Detaches `root` and frees it together with all of its descendants.
    /// The host cannot be removed.
    pub fn remove_subtree(&mut self, root: ElementId) -> usize {
        if root == self.host || self.element(root).is_none() {
            return 0;
        }
        self.detach(root);
        let removed = self.descendants(root);
        for id in &removed {
            if let Some(slot) = self.slots.get_mut(id.index()) {
                *slot = None;
                self.free.push(*id);
            }
        }
        removed.len()
    }

    /// Builds a detached subtree from `spec` and returns its root.
    pub fn materialize(&mut self, spec: &ElementSpec) -> ElementId {
        let id = self.create(spec.tag.clone());
        if let Some(element) = self.element_mut(id) {
            element.classes = spec.classes.clone();
            element.attributes = spec.attributes.clone();
            element.text = spec.text.clone();
        }
        for child in &spec.children {
            let child_id = self.materialize(child);
            self.append_child(id, child_id);
        }
        id
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.slots.get(id.index())?.as_ref()
    }

    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.slots.get_mut(id.index())?.as_mut()
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.element(id)?.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: impl Into<String>) {
        if let Some(element) = self.element_mut(id) {
            element.attributes.insert(name.to_string(), value.into());
        }
    }

    pub fn add_class(&mut self, id: ElementId, class: impl Into<String>) {
        let class = class.into();
        if let Some(element) = self.element_mut(id) {
            if !element.classes.contains(&class) {
                element.classes.push(class);
            }
        }
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.element(id)?.parent
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.element(id)
            .map(|element| element.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, id: ElementId) -> Option<ElementId> {
        self.children(id).first().copied()
    }

    /// Moves `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        if parent == child || self.element(parent).is_none() || self.element(child).is_none() {
            return;
        }
        if self.ancestors(parent).any(|ancestor| ancestor == child) {
            tracing::warn!(parent = %parent, child = %child, "refusing to create element cycle");
            return;
        }
        self.detach(child);
        if let Some(element) = self.element_mut(child) {
            element.parent = Some(parent);
        }
        if let Some(element) = self.element_mut(parent) {
            element.children.push(child);
        }
    }

    pub fn detach(&mut self, id: ElementId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(element) = self.element_mut(parent) {
            element.children.retain(|child| *child != id);
        }
        if let Some(element) = self.element_mut(id) {
            element.parent = None;
        }
    }

    /// `id` itself followed by each ancestor up to the root.
    pub fn ancestors(&self, id: ElementId) -> impl Iterator<Item = ElementId> + '_ {
        let start = self.element(id).map(|_| id);
        std::iter::successors(start, move |current| self.parent(*current))
    }

    /// Pre-order walk of the subtree rooted at `root`, root included.
    pub fn descendants(&self, root: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.element(id).is_none() {
                continue;
            }
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn is_attached(&self, id: ElementId) -> bool {
        self.ancestors(id).any(|ancestor| ancestor == self.host)
    }
}
