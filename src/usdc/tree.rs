//! In-memory USD scene tree.
//!
//! The tree is built fully, finalized once (path indices + jump offsets),
//! serialized once, then discarded. The pseudo-root is a [`Prim`] with an
//! empty name, always at path index 0.

use std::collections::HashMap;

use crate::usdc::value::{Meta, MetaMap, Specifier, Value};

/// Named node of the scene tree.
#[derive(Clone, Debug, Default)]
pub struct Prim {
    pub name: String,
    pub specifier: Specifier,
    /// Type-name token, e.g. "Xform", "Scope", "Mesh", "Material", "Shader".
    pub type_name: String,
    pub metadata: MetaMap,
    pub children: Vec<Prim>,
    pub attributes: Vec<Attribute>,
    pub(crate) path_index: u32,
    pub(crate) jump: i32,
}

/// Named leaf value attached to a prim.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    /// Type-name string, e.g. "color3f", "point3f[]".
    pub type_name: String,
    pub value: Option<Value>,
    /// Qualifier strings, e.g. "uniform", "custom".
    pub qualifiers: Vec<String>,
    pub metadata: MetaMap,
    /// Ordered time samples; empty for static attributes.
    pub samples: Vec<(f64, Value)>,
    pub(crate) path_index: u32,
    pub(crate) jump: i32,
}

impl Attribute {
    /// Create an attribute with an optional default value.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            value,
            qualifiers: Vec::new(),
            metadata: MetaMap::new(),
            samples: Vec::new(),
            path_index: 0,
            jump: 0,
        }
    }

    /// Create a connection to another attribute, addressed by the path of
    /// the prim owning the target.
    pub fn connection(
        name: impl Into<String>,
        type_name: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(name, type_name, Some(Value::Connection(target.into())))
    }

    /// Create a relationship to a prim.
    pub fn relationship(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, "", Some(Value::Relationship(target.into())))
    }

    /// Mark the attribute `uniform`.
    pub fn uniform(mut self) -> Self {
        self.qualifiers.push("uniform".to_string());
        self
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: Meta) -> Self {
        self.metadata.set(key, value);
        self
    }

    /// Path index assigned by the finalize pass (the owning prim's index).
    #[inline]
    pub fn path_index(&self) -> u32 {
        self.path_index
    }

    /// Jump offset assigned by the finalize pass.
    #[inline]
    pub fn jump(&self) -> i32 {
        self.jump
    }
}

impl Prim {
    /// Create a prim with the `Def` specifier.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Create the pseudo-root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Whether this prim is the pseudo-root.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Add a child prim and return it for further construction.
    pub fn add_child(&mut self, child: Prim) -> &mut Prim {
        self.children.push(child);
        self.children.last_mut().unwrap()
    }

    /// Add an attribute and return it.
    pub fn add_attribute(&mut self, attribute: Attribute) -> &mut Attribute {
        self.attributes.push(attribute);
        self.attributes.last_mut().unwrap()
    }

    /// Path index assigned by [`Prim::finalize`].
    #[inline]
    pub fn path_index(&self) -> u32 {
        self.path_index
    }

    /// Jump offset assigned by [`Prim::finalize`].
    #[inline]
    pub fn jump(&self) -> i32 {
        self.jump
    }

    /// Assign path indices and jump offsets for the whole tree.
    ///
    /// Must run on the root exactly once, after construction and before
    /// serialization.
    pub fn finalize(&mut self) {
        let mut next = 0u32;
        self.assign_indices(&mut next);
        self.assign_jumps(false, true, false);
    }

    /// Path entries contributed by this prim's subtree, excluding the prim
    /// itself: every descendant prim plus every attribute in the subtree.
    pub(crate) fn subtree_entries(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.subtree_entries())
            .sum::<usize>()
            + self.attributes.len()
    }

    /// Map absolute prim paths to their indices, for resolving connection
    /// and relationship targets. Valid after [`Prim::finalize`].
    pub(crate) fn collect_paths(&self) -> HashMap<String, u32> {
        let mut map = HashMap::new();
        map.insert("/".to_string(), self.path_index);
        for child in &self.children {
            child.collect_paths_into("", &mut map);
        }
        map
    }

    fn collect_paths_into(&self, prefix: &str, map: &mut HashMap<String, u32>) {
        let path = format!("{}/{}", prefix, self.name);
        map.insert(path.clone(), self.path_index);
        for child in &self.children {
            child.collect_paths_into(&path, map);
        }
    }

    /// Depth-first numbering: the prim itself, then children recursively.
    /// Attributes take their owning prim's index.
    fn assign_indices(&mut self, next: &mut u32) {
        self.path_index = *next;
        *next += 1;
        for child in &mut self.children {
            child.assign_indices(next);
        }
        for attribute in &mut self.attributes {
            attribute.path_index = self.path_index;
        }
    }

    fn assign_jumps(&mut self, has_parent: bool, is_last_child: bool, parent_has_attrs: bool) {
        // A last child is still followed by a path entry when the parent has
        // attributes, since attributes are written after children.
        let has_sibling = has_parent && (!is_last_child || parent_has_attrs);
        let has_child = !self.children.is_empty() || !self.attributes.is_empty();
        self.jump = match (has_sibling, has_child) {
            (true, true) => self.subtree_entries() as i32 + 1,
            (true, false) => 0,
            (false, true) => -1,
            (false, false) => -2,
        };

        let child_count = self.children.len();
        let own_attrs = !self.attributes.is_empty();
        for (i, child) in self.children.iter_mut().enumerate() {
            child.assign_jumps(true, i + 1 == child_count, own_attrs);
        }
        let attr_count = self.attributes.len();
        for (i, attribute) in self.attributes.iter_mut().enumerate() {
            attribute.jump = if i + 1 == attr_count { -2 } else { 0 };
        }
    }
}
