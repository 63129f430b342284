//! Component bitmasks and the registry that hands out stable bit ids.
//!
//! The scheduler never looks inside component storage; all it needs is a
//! stable small integer per component type so that a system's declared
//! access collapses into a pair of 64-bit masks.

use std::ops::BitOr;

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Upper bound on distinct component types, fixed by the mask width.
pub const MAX_COMPONENT_TYPES: usize = 64;

/// Stable bit index for one component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentId(u8);

impl ComponentId {
    /// The bit index backing this id.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Bitset over component type ids: which components a system touches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The mask touching nothing.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Builds a mask from raw bits.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn bits(self) -> u64 {
        self.0
    }

    /// This mask plus `id`.
    pub fn with(self, id: ComponentId) -> Self {
        Self(self.0 | (1u64 << id.0))
    }

    /// Whether `id` is set.
    pub fn contains(self, id: ComponentId) -> bool {
        self.0 & (1u64 << id.0) != 0
    }

    /// Whether the two masks share any component.
    pub fn intersects(self, other: ComponentMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Number of components set.
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether no component is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentMask) -> ComponentMask {
        ComponentMask(self.0 | rhs.0)
    }
}

/// Errors from [`ComponentRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// All mask bits are taken.
    #[error("component registry is full (max {MAX_COMPONENT_TYPES} types)")]
    RegistryFull,
    /// A mask was requested over a name that was never registered.
    #[error("unknown component type: {0}")]
    UnknownComponent(String),
}

/// Maps component type names to stable bit ids, in registration order.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    by_name: FxHashMap<String, ComponentId>,
    names: Vec<String>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, allocating the next bit on first sight.
    pub fn register(&mut self, name: &str) -> Result<ComponentId, RegistryError> {
        if let Some(id) = self.by_name.get(name) {
            return Ok(*id);
        }
        if self.names.len() >= MAX_COMPONENT_TYPES {
            return Err(RegistryError::RegistryFull);
        }
        let id = ComponentId(self.names.len() as u8);
        self.by_name.insert(name.to_string(), id);
        self.names.push(name.to_string());
        Ok(id)
    }

    /// The id previously allocated for `name`, if any.
    pub fn get(&self, name: &str) -> Option<ComponentId> {
        self.by_name.get(name).copied()
    }

    /// The name behind an id.
    pub fn name(&self, id: ComponentId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    /// Builds a mask over already-registered component names.
    pub fn mask_of(&self, names: &[&str]) -> Result<ComponentMask, RegistryError> {
        let mut mask = ComponentMask::EMPTY;
        for name in names {
            let id = self
                .get(name)
                .ok_or_else(|| RegistryError::UnknownComponent((*name).to_string()))?;
            mask = mask.with(id);
        }
        Ok(mask)
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
