//! Host page model.
//!
//! The harness only needs a sliver of a document: elements with a tag and
//! attributes, a parent/child tree, a measured width on containers, a few
//! style properties on surfaces, and a page-level resize signal. Embedders
//! drive widths and resizes; the harness and glue code create, move and
//! remove elements.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::broadcast;

/// Tag given to visual surfaces.
pub const SURFACE_TAG: &str = "canvas";

/// Attribute carrying a surface's marker.
pub const MARKER_ATTR: &str = "alt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Style {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub border_radius: Option<String>,
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: HashMap<String, String>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    client_width: f64,
    style: Style,
}

struct PageInner {
    elements: DashMap<ElementId, Element>,
    next_id: AtomicU64,
    body: ElementId,
    resize_tx: broadcast::Sender<()>,
}

/// Shared handle to one page. Clones refer to the same page.
#[derive(Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

/// Non-owning handle; does not keep the page or its resize signal alive.
#[derive(Clone)]
pub(crate) struct WeakPage {
    inner: Weak<PageInner>,
}

impl WeakPage {
    pub(crate) fn upgrade(&self) -> Option<Page> {
        self.inner.upgrade().map(|inner| Page { inner })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        let (resize_tx, _) = broadcast::channel(16);
        let body = ElementId(0);
        let elements = DashMap::new();
        elements.insert(body, Element::new("body", &[]));
        Self {
            inner: Arc::new(PageInner {
                elements,
                next_id: AtomicU64::new(1),
                body,
                resize_tx,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakPage {
        WeakPage {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Root element. New surfaces land here until something claims them.
    pub fn body(&self) -> ElementId {
        self.inner.body
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str, attrs: &[(&str, &str)]) -> ElementId {
        let id = ElementId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.elements.insert(id, Element::new(tag, attrs));
        id
    }

    /// Create a container under the body with the given measured width.
    pub fn create_container(&self, width: f64) -> ElementId {
        let id = self.create_element("div", &[]);
        self.set_client_width(id, width);
        self.append_child(self.inner.body, id);
        id
    }

    /// Move `child` under `parent`, detaching it from any previous parent.
    /// Returns false if either element is gone.
    pub fn append_child(&self, parent: ElementId, child: ElementId) -> bool {
        if parent == child || !self.contains(parent) {
            return false;
        }
        let previous = match self.inner.elements.get_mut(&child) {
            Some(mut element) => element.parent.replace(parent),
            None => return false,
        };
        if let Some(previous) = previous {
            if let Some(mut old) = self.inner.elements.get_mut(&previous) {
                old.children.retain(|c| *c != child);
            }
        }
        if let Some(mut element) = self.inner.elements.get_mut(&parent) {
            element.children.push(child);
        }
        true
    }

    /// Detach and drop an element and everything under it. Removing an
    /// element that no longer exists is a no-op.
    pub fn remove(&self, id: ElementId) {
        if id == self.inner.body {
            return;
        }
        let Some((_, element)) = self.inner.elements.remove(&id) else {
            return;
        };
        if let Some(parent) = element.parent {
            if let Some(mut p) = self.inner.elements.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for child in element.children {
            self.remove(child);
        }
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.inner.elements.contains_key(&id)
    }

    pub fn parent_of(&self, id: ElementId) -> Option<ElementId> {
        self.inner.elements.get(&id).and_then(|e| e.parent)
    }

    pub fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.inner
            .elements
            .get(&id)
            .map(|e| e.children.clone())
            .unwrap_or_default()
    }

    pub fn tag(&self, id: ElementId) -> Option<String> {
        self.inner.elements.get(&id).map(|e| e.tag.clone())
    }

    pub fn attr(&self, id: ElementId, name: &str) -> Option<String> {
        self.inner
            .elements
            .get(&id)
            .and_then(|e| e.attrs.get(name).cloned())
    }

    pub fn client_width(&self, id: ElementId) -> Option<f64> {
        self.inner.elements.get(&id).map(|e| e.client_width)
    }

    pub fn set_client_width(&self, id: ElementId, width: f64) {
        if let Some(mut element) = self.inner.elements.get_mut(&id) {
            element.client_width = width;
        }
    }

    pub fn style(&self, id: ElementId) -> Option<Style> {
        self.inner.elements.get(&id).map(|e| e.style.clone())
    }

    pub fn set_style<F>(&self, id: ElementId, update: F) -> bool
    where
        F: FnOnce(&mut Style),
    {
        match self.inner.elements.get_mut(&id) {
            Some(mut element) => {
                update(&mut element.style);
                true
            }
            None => false,
        }
    }

    /// Newest unclaimed surface carrying the first marker that matches
    /// anything. A surface is unclaimed while it is detached or sits
    /// directly under the body; one moved under a mount belongs to that
    /// mount and is never returned.
    pub fn find_surface<S: AsRef<str>>(&self, markers: &[S]) -> Option<ElementId> {
        let body = self.inner.body;
        markers.iter().find_map(|marker| {
            self.inner
                .elements
                .iter()
                .filter(|e| {
                    e.tag == SURFACE_TAG
                        && e.parent.is_none_or(|parent| parent == body)
                        && e.attrs.get(MARKER_ATTR).map(String::as_str) == Some(marker.as_ref())
                })
                .map(|e| *e.key())
                .max()
        })
    }

    /// Every surface currently on the page, in creation order.
    pub fn surfaces(&self) -> Vec<ElementId> {
        let mut found: Vec<_> = self
            .inner
            .elements
            .iter()
            .filter(|e| e.tag == SURFACE_TAG)
            .map(|e| *e.key())
            .collect();
        found.sort();
        found
    }

    /// Signal that the page was resized.
    pub fn resize(&self) {
        // No receivers just means nothing is mounted.
        let _ = self.inner.resize_tx.send(());
    }

    pub fn subscribe_resize(&self) -> broadcast::Receiver<()> {
        self.inner.resize_tx.subscribe()
    }
}

impl Element {
    fn new(tag: &str, attrs: &[(&str, &str)]) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            parent: None,
            children: Vec::new(),
            client_width: 0.0,
            style: Style::default(),
        }
    }
}
