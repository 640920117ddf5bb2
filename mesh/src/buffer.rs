//! Named attribute buffers destined for the GPU.
//!
//! An [`AttributeBuffer`] is one contiguous allocation of `element_count *
//! components` scalars. A [`BufferCollection`] maps stable binding names to
//! buffers and notifies registered [`BufferListener`]s whenever a binding is
//! added, replaced or removed, so a rendering backend can re-upload only what
//! changed.
//!
//! The compiler never talks to a GPU. Backends read buffers through
//! [`AttributeBuffer::as_bytes`] and bind them by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Stable binding names for buffers emitted by the compiler.
pub mod bindings {
    /// Vertex positions (float3).
    pub const POSITION: &str = "position";
    /// Vertex normals (float3).
    pub const NORMAL: &str = "normal";
    /// Vertex tangents (float4).
    pub const TANGENT: &str = "tangent";
    /// Prefix of color set buffers (`color0`, `color1`, ...).
    pub const COLOR_PREFIX: &str = "color";
    /// Prefix of texture coordinate set buffers (`uv0`, `uv1`, ...).
    pub const UV_PREFIX: &str = "uv";

    /// Fixed layout: four bone indices per vertex (ordinal + 1, 0 = unused).
    pub const BONE_INDICES: &str = "bone_indices";
    /// Fixed layout: four bone weights per vertex.
    pub const BONE_WEIGHTS: &str = "bone_weights";
    /// Variable layout: first pool slot of each vertex.
    pub const BONE_OFFSETS: &str = "bone_offsets";
    /// Variable layout: number of pool slots of each vertex.
    pub const BONE_COUNTS: &str = "bone_counts";
    /// Variable layout: pooled bone indices (ordinal + 1).
    pub const BONE_INDEX_POOL: &str = "bone_index_pool";
    /// Variable layout: pooled bone weights.
    pub const BONE_WEIGHT_POOL: &str = "bone_weight_pool";

    /// First tuple of each vertex in [`BLENDSHAPE_INDICES`].
    pub const BLENDSHAPE_OFFSETS: &str = "blendshape_offsets";
    /// Number of tuples of each vertex.
    pub const BLENDSHAPE_COUNTS: &str = "blendshape_counts";
    /// `(shape, position, normal, tangent)` pool index tuples.
    pub const BLENDSHAPE_INDICES: &str = "blendshape_indices";
    /// Shared delta pool, xyz + padding.
    pub const BLENDSHAPE_DELTAS: &str = "blendshape_deltas";

    /// Binding name of color set `set`.
    pub fn color(set: usize) -> String {
        format!("{COLOR_PREFIX}{set}")
    }

    /// Binding name of texture coordinate set `set`.
    pub fn uv(set: usize) -> String {
        format!("{UV_PREFIX}{set}")
    }

    /// All skinning bindings, for clearing a previous layout.
    pub const SKINNING: [&str; 6] = [
        BONE_INDICES,
        BONE_WEIGHTS,
        BONE_OFFSETS,
        BONE_COUNTS,
        BONE_INDEX_POOL,
        BONE_WEIGHT_POOL,
    ];
}

/// Scalar type of buffer components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// 32-bit float.
    Float,
    /// 32-bit signed integer.
    Int,
}

/// Backing storage of a buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BufferData {
    /// Float components.
    Float(Vec<f32>),
    /// Integer components.
    Int(Vec<i32>),
}

impl BufferData {
    fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
        }
    }

    fn component_type(&self) -> ComponentType {
        match self {
            Self::Float(_) => ComponentType::Float,
            Self::Int(_) => ComponentType::Int,
        }
    }
}

/// A named, typed, fixed-length attribute buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeBuffer {
    name: String,
    components: u8,
    element_count: usize,
    data: BufferData,
}

impl AttributeBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// `components` is clamped to `1..=4`.
    pub fn zeroed(
        name: impl Into<String>,
        component_type: ComponentType,
        components: u8,
        element_count: usize,
    ) -> Self {
        let components = components.clamp(1, 4);
        let len = element_count * components as usize;
        let data = match component_type {
            ComponentType::Float => BufferData::Float(vec![0.0; len]),
            ComponentType::Int => BufferData::Int(vec![0; len]),
        };
        Self {
            name: name.into(),
            components,
            element_count,
            data,
        }
    }

    /// Wrap float data; its length must be a multiple of `components`.
    pub fn from_f32(
        name: impl Into<String>,
        components: u8,
        data: Vec<f32>,
    ) -> Result<Self, MeshError> {
        Self::from_data(name.into(), components, BufferData::Float(data))
    }

    /// Wrap integer data; its length must be a multiple of `components`.
    pub fn from_i32(
        name: impl Into<String>,
        components: u8,
        data: Vec<i32>,
    ) -> Result<Self, MeshError> {
        Self::from_data(name.into(), components, BufferData::Int(data))
    }

    /// Build a buffer of `component_type` from integral values.
    ///
    /// Used for index/offset/count buffers whose storage depends on renderer
    /// capabilities.
    pub fn from_indices(
        name: impl Into<String>,
        component_type: ComponentType,
        components: u8,
        values: &[u32],
    ) -> Result<Self, MeshError> {
        let data = match component_type {
            ComponentType::Int => BufferData::Int(values.iter().map(|&v| v as i32).collect()),
            ComponentType::Float => BufferData::Float(values.iter().map(|&v| v as f32).collect()),
        };
        Self::from_data(name.into(), components, data)
    }

    fn from_data(name: String, components: u8, data: BufferData) -> Result<Self, MeshError> {
        if !(1..=4).contains(&components) {
            return Err(MeshError::InvalidBuffer {
                name,
                message: format!("component count {components} is outside 1..=4"),
            });
        }
        if data.len() % components as usize != 0 {
            return Err(MeshError::InvalidBuffer {
                name,
                message: format!(
                    "{} scalars is not a multiple of {components} components",
                    data.len()
                ),
            });
        }
        Ok(Self {
            name,
            components,
            element_count: data.len() / components as usize,
            data,
        })
    }

    /// Check that the storage length matches the declared shape.
    ///
    /// Buffers built through the constructors always pass; deserialized ones
    /// may not.
    pub fn validate(&self) -> Result<(), MeshError> {
        if !(1..=4).contains(&self.components) {
            return Err(MeshError::InvalidBuffer {
                name: self.name.clone(),
                message: format!("component count {} is outside 1..=4", self.components),
            });
        }
        let expected = self.element_count * self.components as usize;
        if self.data.len() != expected {
            return Err(MeshError::InvalidBuffer {
                name: self.name.clone(),
                message: format!("{} scalars, expected {expected}", self.data.len()),
            });
        }
        Ok(())
    }

    /// Binding name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Scalar type.
    pub fn component_type(&self) -> ComponentType {
        self.data.component_type()
    }

    /// Components per element (1–4).
    pub fn components(&self) -> u8 {
        self.components
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.element_count
    }

    /// Stride of one element in bytes.
    pub fn stride(&self) -> usize {
        self.components as usize * 4
    }

    /// Raw backing storage.
    pub fn data(&self) -> &BufferData {
        &self.data
    }

    /// Float contents, if this is a float buffer.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            BufferData::Float(v) => Some(v),
            BufferData::Int(_) => None,
        }
    }

    /// Integer contents, if this is an integer buffer.
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            BufferData::Int(v) => Some(v),
            BufferData::Float(_) => None,
        }
    }

    /// Mutable float contents.
    pub fn as_f32_mut(&mut self) -> Option<&mut [f32]> {
        match &mut self.data {
            BufferData::Float(v) => Some(v),
            BufferData::Int(_) => None,
        }
    }

    /// Mutable integer contents.
    pub fn as_i32_mut(&mut self) -> Option<&mut [i32]> {
        match &mut self.data {
            BufferData::Int(v) => Some(v),
            BufferData::Float(_) => None,
        }
    }

    /// Components of one element.
    pub fn element_f32(&self, index: usize) -> Option<&[f32]> {
        let c = self.components as usize;
        self.as_f32()?.get(index * c..index * c + c)
    }

    /// Components of one element.
    pub fn element_i32(&self, index: usize) -> Option<&[i32]> {
        let c = self.components as usize;
        self.as_i32()?.get(index * c..index * c + c)
    }

    /// Read one component as an integer, whatever the storage type.
    ///
    /// Convenient for index buffers written with [`IndexStorage::Float`](crate::IndexStorage).
    pub fn index_at(&self, element: usize, component: usize) -> Option<u32> {
        let i = element * self.components as usize + component;
        match &self.data {
            BufferData::Int(v) => v.get(i).map(|&x| x as u32),
            BufferData::Float(v) => v.get(i).map(|&x| x as u32),
        }
    }

    /// Contents as bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.data {
            BufferData::Float(v) => bytemuck::cast_slice(v),
            BufferData::Int(v) => bytemuck::cast_slice(v),
        }
    }
}

/// Kind of change reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferChange {
    /// A new binding was registered.
    Added,
    /// An existing binding now points at a different buffer.
    Replaced,
    /// A binding was removed.
    Removed,
}

/// Receives change notifications from a [`BufferCollection`].
pub trait BufferListener: Send + Sync {
    /// Called after `name` changed.
    fn on_buffer_changed(&self, name: &str, change: BufferChange);
}

/// Registry of attribute buffers keyed by binding name.
///
/// Iteration is in binding-name order, so uploads are deterministic.
#[derive(Default, Clone)]
pub struct BufferCollection {
    buffers: BTreeMap<String, AttributeBuffer>,
    listeners: Vec<Arc<dyn BufferListener>>,
}

impl BufferCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for subsequent changes.
    pub fn subscribe(&mut self, listener: Arc<dyn BufferListener>) {
        self.listeners.push(listener);
    }

    /// Add a buffer under its own name; fails if the name is taken.
    pub fn add(&mut self, buffer: AttributeBuffer) -> Result<(), MeshError> {
        if self.buffers.contains_key(buffer.name()) {
            return Err(MeshError::DuplicateBuffer(buffer.name().to_string()));
        }
        let name = buffer.name().to_string();
        self.buffers.insert(name.clone(), buffer);
        self.notify(&name, BufferChange::Added);
        Ok(())
    }

    /// Add or replace a buffer, returning the previous one.
    pub fn insert(&mut self, buffer: AttributeBuffer) -> Option<AttributeBuffer> {
        let name = buffer.name().to_string();
        let previous = self.buffers.insert(name.clone(), buffer);
        let change = if previous.is_some() {
            BufferChange::Replaced
        } else {
            BufferChange::Added
        };
        self.notify(&name, change);
        previous
    }

    /// Remove a buffer.
    pub fn remove(&mut self, name: &str) -> Option<AttributeBuffer> {
        let removed = self.buffers.remove(name);
        if removed.is_some() {
            self.notify(name, BufferChange::Removed);
        }
        removed
    }

    /// Look up a buffer.
    pub fn get(&self, name: &str) -> Option<&AttributeBuffer> {
        self.buffers.get(name)
    }

    /// Look up a buffer that must exist.
    pub fn require(&self, name: &str) -> Result<&AttributeBuffer, MeshError> {
        self.get(name)
            .ok_or_else(|| MeshError::MissingBuffer(name.to_string()))
    }

    /// True if a buffer is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.buffers.contains_key(name)
    }

    /// Number of buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True if there are no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Binding names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Buffers in binding-name order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeBuffer> {
        self.buffers.values()
    }

    /// Total size of all buffers in bytes.
    pub fn total_bytes(&self) -> usize {
        self.buffers.values().map(|b| b.as_bytes().len()).sum()
    }

    pub(crate) fn into_buffers(self) -> Vec<AttributeBuffer> {
        self.buffers.into_values().collect()
    }

    fn notify(&self, name: &str, change: BufferChange) {
        log::trace!("Buffer '{name}' {change:?}");
        for listener in &self.listeners {
            listener.on_buffer_changed(name, change);
        }
    }
}

impl std::fmt::Debug for BufferCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferCollection")
            .field("buffers", &self.buffers.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, BufferChange)>>,
    }

    impl BufferListener for Recorder {
        fn on_buffer_changed(&self, name: &str, change: BufferChange) {
            self.events.lock().push((name.to_string(), change));
        }
    }

    #[test]
    fn zeroed_shape() {
        let buffer = AttributeBuffer::zeroed("position", ComponentType::Float, 3, 4);
        assert_eq!(buffer.element_count(), 4);
        assert_eq!(buffer.components(), 3);
        assert_eq!(buffer.stride(), 12);
        assert_eq!(buffer.as_f32().map(<[f32]>::len), Some(12));
        assert_eq!(buffer.as_bytes().len(), 48);
    }

    #[test]
    fn from_data_validates_shape() {
        assert!(AttributeBuffer::from_f32("x", 3, vec![0.0; 7]).is_err());
        assert!(AttributeBuffer::from_i32("x", 5, vec![0; 10]).is_err());
        let ok = AttributeBuffer::from_i32("x", 2, vec![1, 2, 3, 4]).unwrap();
        assert_eq!(ok.element_count(), 2);
        assert_eq!(ok.element_i32(1), Some(&[3, 4][..]));
    }

    #[test]
    fn validate_detects_inconsistent_shape() {
        let mut buffer = AttributeBuffer::zeroed("uv0", ComponentType::Float, 2, 3);
        assert!(buffer.validate().is_ok());
        buffer.element_count = 4;
        assert!(matches!(
            buffer.validate(),
            Err(MeshError::InvalidBuffer { .. })
        ));
    }

    #[test]
    fn index_buffers_follow_storage() {
        let ints = AttributeBuffer::from_indices("i", ComponentType::Int, 1, &[3, 4]).unwrap();
        let floats = AttributeBuffer::from_indices("f", ComponentType::Float, 1, &[3, 4]).unwrap();
        assert_eq!(ints.as_i32(), Some(&[3, 4][..]));
        assert_eq!(floats.as_f32(), Some(&[3.0, 4.0][..]));
        assert_eq!(floats.index_at(1, 0), Some(4));
    }

    #[test]
    fn add_replace_remove_notify() {
        let recorder = Arc::new(Recorder::default());
        let mut collection = BufferCollection::new();
        collection.subscribe(recorder.clone());

        collection
            .add(AttributeBuffer::zeroed("a", ComponentType::Float, 1, 2))
            .unwrap();
        assert!(matches!(
            collection.add(AttributeBuffer::zeroed("a", ComponentType::Float, 1, 2)),
            Err(MeshError::DuplicateBuffer(_))
        ));
        let previous = collection.insert(AttributeBuffer::zeroed("a", ComponentType::Int, 1, 3));
        assert!(previous.is_some());
        assert!(collection.remove("a").is_some());
        assert!(collection.remove("a").is_none());

        let events = recorder.events.lock();
        assert_eq!(
            *events,
            vec![
                ("a".to_string(), BufferChange::Added),
                ("a".to_string(), BufferChange::Replaced),
                ("a".to_string(), BufferChange::Removed),
            ]
        );
    }

    #[test]
    fn require_reports_missing() {
        let collection = BufferCollection::new();
        assert!(matches!(
            collection.require("position"),
            Err(MeshError::MissingBuffer(name)) if name == "position"
        ));
    }

    #[test]
    fn names_are_sorted() {
        let mut collection = BufferCollection::new();
        collection.insert(AttributeBuffer::zeroed("uv0", ComponentType::Float, 2, 1));
        collection.insert(AttributeBuffer::zeroed("normal", ComponentType::Float, 3, 1));
        collection.insert(AttributeBuffer::zeroed("position", ComponentType::Float, 3, 1));
        let names: Vec<&str> = collection.names().collect();
        assert_eq!(names, vec!["normal", "position", "uv0"]);
        assert_eq!(collection.total_bytes(), 8 + 12 + 12);
    }

    #[test]
    fn binding_names() {
        assert_eq!(bindings::color(1), "color1");
        assert_eq!(bindings::uv(0), "uv0");
    }
}
