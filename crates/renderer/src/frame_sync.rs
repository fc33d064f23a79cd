//! Frames-in-flight synchronization for the batch submission path.
//!
//! ```text
//! wait(fence) -> acquire(signal acquire_sem) -> reset(fence)
//!   -> submit(wait acquire_sem, signal present_sem + fence)
//!   -> present(wait present_sem) -> advance
//! ```
//!
//! The fence is reset only after a successful acquire, so an out-of-date
//! swapchain never leaves the slot with an unsignaled fence that nothing
//! will signal.

use std::sync::Arc;

use canvas_rhi::command::CommandBuffer;
use canvas_rhi::device::Device;
use canvas_rhi::swapchain::Swapchain;
use canvas_rhi::sync::{FRAMES_IN_FLIGHT, FrameSync};
use canvas_rhi::{RhiResult, vk};
use tracing::{debug, info};

/// Result of acquiring a swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(u32),
    /// The swapchain no longer matches the surface and must be recreated
    /// before anything can be presented.
    OutOfDate,
}

/// Maps a raw acquire result; suboptimal images are still rendered to.
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((index, _suboptimal)) => Ok(AcquireOutcome::Acquired(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
            debug!("Swapchain out of date during acquire");
            Ok(AcquireOutcome::OutOfDate)
        }
        Err(e) => Err(e.into()),
    }
}

/// Maps a raw present result to "needs recreation".
pub fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<bool> {
    match result {
        Ok(suboptimal) => {
            if suboptimal {
                debug!("Swapchain suboptimal during present");
            }
            Ok(suboptimal)
        }
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => {
            debug!("Swapchain out of date during present");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Round-robin owner of the per-slot semaphores and fences.
pub struct FrameSynchronizer {
    device: Arc<Device>,
    frames: Vec<FrameSync>,
    current_frame: usize,
    image_index: u32,
}

impl FrameSynchronizer {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let frames = (0..FRAMES_IN_FLIGHT)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;

        info!("Frame sync created with {} frames in flight", FRAMES_IN_FLIGHT);

        Ok(Self {
            device,
            frames,
            current_frame: 0,
            image_index: 0,
        })
    }

    #[inline]
    pub fn current_frame_index(&self) -> usize {
        self.current_frame
    }

    /// Swapchain image index from the last successful acquire.
    #[inline]
    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    #[inline]
    fn current(&self) -> &FrameSync {
        &self.frames[self.current_frame]
    }

    /// Blocks until the last submission from this slot has completed.
    pub fn wait(&self) -> RhiResult<()> {
        self.current().fence().wait(u64::MAX)
    }

    pub fn acquire(&mut self, swapchain: &Swapchain) -> RhiResult<AcquireOutcome> {
        let outcome =
            classify_acquire(swapchain.acquire_next_image(self.current().acquire_semaphore()))?;
        if let AcquireOutcome::Acquired(index) = outcome {
            self.image_index = index;
        }
        Ok(outcome)
    }

    pub fn reset_fence(&self) -> RhiResult<()> {
        self.current().fence().reset()
    }

    /// Submits `cmd` to the graphics queue, waiting on this slot's acquire
    /// semaphore at color output and signaling its present semaphore and
    /// fence.
    pub fn submit(&self, cmd: &CommandBuffer) -> RhiResult<()> {
        let frame = self.current();

        let wait_semaphores = [frame.acquire_semaphore()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [frame.present_semaphore()];
        let command_buffers = [cmd.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device
                .submit_graphics(&[submit_info], frame.fence().handle())?;
        }
        Ok(())
    }

    /// Presents the acquired image. Returns `true` when the swapchain should
    /// be recreated.
    pub fn present(&self, swapchain: &Swapchain) -> RhiResult<bool> {
        classify_present(swapchain.present(
            self.device.present_queue(),
            self.image_index,
            self.current().present_semaphore(),
        ))
    }

    pub fn advance(&mut self) {
        self.current_frame = next_frame(self.current_frame);
    }

    /// Blocks until every slot's last submission has completed.
    pub fn wait_all(&self) -> RhiResult<()> {
        let fences: Vec<vk::Fence> = self.frames.iter().map(|f| f.fence().handle()).collect();
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&fences, true, u64::MAX)?;
        }
        Ok(())
    }

    /// Replaces every slot's sync objects. Used after swapchain recreation,
    /// when an acquire semaphore may have been signaled with no matching
    /// submit.
    pub fn reset(&mut self) -> RhiResult<()> {
        for frame in &mut self.frames {
            *frame = FrameSync::new(self.device.clone())?;
        }
        self.current_frame = 0;
        debug!("Reset frame sync objects");
        Ok(())
    }
}

#[inline]
fn next_frame(current: usize) -> usize {
    (current + 1) % FRAMES_IN_FLIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_alternate() {
        assert_eq!(next_frame(0), 1);
        assert_eq!(next_frame(1), 0);
    }

    #[test]
    fn acquire_classification() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Acquired(2)
        );
        assert_eq!(
            classify_acquire(Ok((1, true))).unwrap(),
            AcquireOutcome::Acquired(1)
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).is_err());
    }

    #[test]
    fn present_classification() {
        assert!(!classify_present(Ok(false)).unwrap());
        assert!(classify_present(Ok(true)).unwrap());
        assert!(classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap());
        assert!(classify_present(Err(vk::Result::SUBOPTIMAL_KHR)).unwrap());
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }
}
