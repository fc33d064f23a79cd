//! Fixed-capacity texture table with stable integer handles.
//!
//! Handle 0 is always a 1x1 opaque white texture so untextured geometry can
//! share the textured shader path. Handles are slot indices; a slot is never
//! reused, so a handle stays valid until its texture is removed.

use std::fmt;

use canvas_rhi::texture::Texture;
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};

/// Number of sampler slots in the descriptor array, dummy included.
pub const MAX_TEXTURES: usize = 10;

/// Stable identifier of a registered texture. Doubles as the per-vertex
/// sampler index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u32);

impl TextureHandle {
    /// The white 1x1 texture seeded at registry construction.
    pub const DUMMY: Self = Self(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn id(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Value written into [`Vertex2D::sampler_id`](canvas_rhi::vertex::Vertex2D).
    #[inline]
    pub const fn sampler_id(self) -> i32 {
        self.0 as i32
    }
}

impl fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the registry needs to know about a GPU texture.
pub trait TextureResource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl TextureResource for Texture {
    fn width(&self) -> u32 {
        Texture::width(self)
    }

    fn height(&self) -> u32 {
        Texture::height(self)
    }
}

/// Owner of every registered texture.
pub struct TextureRegistry<T> {
    slots: Vec<Option<T>>,
    capacity: usize,
    current: TextureHandle,
}

impl<T: TextureResource> TextureRegistry<T> {
    /// Creates a registry holding `dummy` at [`TextureHandle::DUMMY`].
    pub fn new(capacity: usize, dummy: T) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.push(Some(dummy));
        Self {
            slots,
            capacity,
            current: TextureHandle::DUMMY,
        }
    }

    /// Registers `texture` under the next free handle.
    ///
    /// # Errors
    ///
    /// [`RenderError::TextureCapacity`] when every slot has been handed out.
    /// The registry is left untouched.
    pub fn add(&mut self, texture: T) -> RenderResult<TextureHandle> {
        if self.is_full() {
            warn!("Maximum texture count reached ({})", self.capacity);
            return Err(RenderError::TextureCapacity {
                capacity: self.capacity,
            });
        }

        let handle = TextureHandle::new(self.slots.len() as u32);
        debug!(
            "Registered texture {} ({}x{})",
            handle,
            texture.width(),
            texture.height()
        );
        self.slots.push(Some(texture));
        Ok(handle)
    }

    /// Makes `handle` the current texture. Unknown or removed handles are
    /// ignored and `false` is returned.
    pub fn set_current(&mut self, handle: TextureHandle) -> bool {
        if self.get(handle).is_none() {
            return false;
        }
        self.current = handle;
        true
    }

    #[inline]
    pub fn current(&self) -> TextureHandle {
        self.current
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&T> {
        self.slots.get(handle.index()).and_then(Option::as_ref)
    }

    /// Like [`get`](Self::get), but reports unknown or removed handles.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidTexture`] if `handle` holds no texture.
    pub fn require(&self, handle: TextureHandle) -> RenderResult<&T> {
        self.get(handle).ok_or_else(|| {
            warn!("Invalid texture ID {}", handle);
            RenderError::InvalidTexture(handle)
        })
    }

    pub fn dimensions(&self, handle: TextureHandle) -> Option<(u32, u32)> {
        self.get(handle).map(|t| (t.width(), t.height()))
    }

    pub fn contains(&self, handle: TextureHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Takes the texture out of its slot. The slot stays reserved so the
    /// handle is never given to another texture. The dummy cannot be removed.
    pub fn remove(&mut self, handle: TextureHandle) -> Option<T> {
        if handle == TextureHandle::DUMMY {
            warn!("Refusing to remove the fallback texture");
            return None;
        }
        let texture = self.slots.get_mut(handle.index())?.take()?;
        if self.current == handle {
            self.current = TextureHandle::DUMMY;
        }
        debug!("Removed texture {}", handle);
        Some(texture)
    }

    /// Handle bound to each descriptor array element. Empty or removed slots
    /// fall back to the dummy.
    pub fn descriptor_slots(&self) -> Vec<TextureHandle> {
        (0..self.capacity)
            .map(|i| {
                let handle = TextureHandle::new(i as u32);
                if self.contains(handle) {
                    handle
                } else {
                    TextureHandle::DUMMY
                }
            })
            .collect()
    }

    /// Resolves [`descriptor_slots`](Self::descriptor_slots) to textures.
    pub fn descriptor_textures(&self) -> Vec<&T> {
        self.descriptor_slots()
            .into_iter()
            .filter_map(|handle| self.get(handle))
            .collect()
    }

    /// Number of handles issued, removed ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Number of slots still holding a texture.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Drops every texture in one pass over the table. Returns how many were
    /// released.
    pub fn clear(&mut self) -> usize {
        let released = self.slots.drain(..).flatten().count();
        self.current = TextureHandle::DUMMY;
        debug!("Texture registry cleared ({} textures)", released);
        released
    }
}
