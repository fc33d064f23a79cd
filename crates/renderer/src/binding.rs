//! Scoped texture binding.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::texture_registry::TextureHandle;

/// Anything holding a "current texture" selection.
pub trait TextureBinding {
    fn current_texture(&self) -> TextureHandle;

    /// Selects `handle`. Returns `false` and keeps the selection if the
    /// handle is not registered.
    fn set_texture(&mut self, handle: TextureHandle) -> bool;
}

/// Binds a texture for the guard's lifetime and restores the previous
/// selection on drop, on every exit path.
///
/// The guard dereferences to the wrapped target so drawing can continue
/// through it.
pub struct TextureBindingGuard<'a, B: TextureBinding> {
    target: &'a mut B,
    previous: TextureHandle,
}

impl<'a, B: TextureBinding> TextureBindingGuard<'a, B> {
    pub fn new(target: &'a mut B, handle: TextureHandle) -> Self {
        let previous = target.current_texture();
        if !target.set_texture(handle) {
            warn!("Cannot bind unknown texture {}", handle);
        }
        Self { target, previous }
    }

    /// Selection that will be restored on drop.
    #[inline]
    pub fn previous(&self) -> TextureHandle {
        self.previous
    }
}

impl<B: TextureBinding> Deref for TextureBindingGuard<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.target
    }
}

impl<B: TextureBinding> DerefMut for TextureBindingGuard<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.target
    }
}

impl<B: TextureBinding> Drop for TextureBindingGuard<'_, B> {
    fn drop(&mut self) {
        self.target.set_texture(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slots {
        current: TextureHandle,
        known: u32,
        history: Vec<TextureHandle>,
    }

    impl TextureBinding for Slots {
        fn current_texture(&self) -> TextureHandle {
            self.current
        }

        fn set_texture(&mut self, handle: TextureHandle) -> bool {
            if handle.id() >= self.known {
                return false;
            }
            self.current = handle;
            self.history.push(handle);
            true
        }
    }

    fn slots() -> Slots {
        Slots {
            current: TextureHandle::new(1),
            known: 4,
            history: Vec::new(),
        }
    }

    #[test]
    fn restores_previous_on_drop() {
        let mut target = slots();
        {
            let guard = TextureBindingGuard::new(&mut target, TextureHandle::new(3));
            assert_eq!(guard.current_texture(), TextureHandle::new(3));
            assert_eq!(guard.previous(), TextureHandle::new(1));
        }
        assert_eq!(target.current, TextureHandle::new(1));
        assert_eq!(
            target.history,
            vec![TextureHandle::new(3), TextureHandle::new(1)]
        );
    }

    #[test]
    fn restores_on_early_return() {
        fn draw(target: &mut Slots) -> Result<(), &'static str> {
            let _guard = TextureBindingGuard::new(target, TextureHandle::new(2));
            Err("bail")
        }

        let mut target = slots();
        assert!(draw(&mut target).is_err());
        assert_eq!(target.current, TextureHandle::new(1));
    }

    #[test]
    fn unknown_handle_keeps_selection() {
        let mut target = slots();
        {
            let guard = TextureBindingGuard::new(&mut target, TextureHandle::new(9));
            assert_eq!(guard.current_texture(), TextureHandle::new(1));
        }
        assert_eq!(target.current, TextureHandle::new(1));
    }

    #[test]
    fn guard_gives_mutable_access() {
        let mut target = slots();
        let mut guard = TextureBindingGuard::new(&mut target, TextureHandle::new(2));
        guard.known = 8;
        assert!(guard.set_texture(TextureHandle::new(7)));
        drop(guard);
        assert_eq!(target.current, TextureHandle::new(1));
        assert_eq!(target.known, 8);
    }
}
