//! Synchronization primitives.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering between acquire, submit and present.
//! - [`Fence`]: GPU-to-CPU completion, used as the frame backpressure point.
//! - [`FrameSync`]: the semaphore/semaphore/fence triple owned by one frame slot.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use canvas_rhi::device::Device;
//! use canvas_rhi::sync::{FRAMES_IN_FLIGHT, FrameSync};
//!
//! # fn example(device: Arc<Device>) -> Result<(), canvas_rhi::RhiError> {
//! let slots: Vec<FrameSync> = (0..FRAMES_IN_FLIGHT)
//!     .map(|_| FrameSync::new(device.clone()))
//!     .collect::<Result<_, _>>()?;
//!
//! let slot = &slots[0];
//! slot.fence().wait(u64::MAX)?;
//! slot.fence().reset()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Number of frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Owned binary semaphore, created unsignaled.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Owned fence.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally already signaled so the first wait on it
    /// returns immediately.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self { device, fence })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled or `timeout` nanoseconds pass.
    ///
    /// Pass `u64::MAX` to wait without bound.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout)?
        };
        Ok(())
    }

    /// Returns the fence to the unsignaled state.
    ///
    /// The fence must not be pending on any queue.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.fence])? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one frame-in-flight slot.
///
/// ```text
/// fence.wait -> fence.reset -> acquire(signal acquire_semaphore)
///   -> submit(wait acquire_semaphore, signal present_semaphore + fence)
///   -> present(wait present_semaphore)
/// ```
pub struct FrameSync {
    acquire_semaphore: Semaphore,
    present_semaphore: Semaphore,
    fence: Fence,
}

impl FrameSync {
    /// Creates the slot with its fence signaled so the first frame does not block.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let acquire_semaphore = Semaphore::new(device.clone())?;
        let present_semaphore = Semaphore::new(device.clone())?;
        let fence = Fence::new(device, true)?;
        debug!("Created frame slot sync objects");

        Ok(Self {
            acquire_semaphore,
            present_semaphore,
            fence,
        })
    }

    /// Signaled when the acquired swapchain image is ready to be rendered to.
    #[inline]
    pub fn acquire_semaphore(&self) -> vk::Semaphore {
        self.acquire_semaphore.handle()
    }

    /// Signaled when rendering finishes; presentation waits on it.
    #[inline]
    pub fn present_semaphore(&self) -> vk::Semaphore {
        self.present_semaphore.handle()
    }

    #[inline]
    pub fn fence(&self) -> &Fence {
        &self.fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_buffered() {
        assert_eq!(FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn sync_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }
}
