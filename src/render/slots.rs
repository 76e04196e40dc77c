//! Frame slot pool: one slot per in-flight frame, each pairing a presentable
//! copy-target texture with a dedicated copy stream.
//!
//! wgpu exposes a single hardware queue, so a "stream" here is a per-slot
//! labeled encoder plus the submission index of its last submit; waiting on
//! that index is the stream synchronize. The interop map/unmap discipline of
//! the underlying APIs is kept as an explicit ledger: a slot must be acquired
//! before the compositor writes to it, released before presentation reads it,
//! and never acquired twice.

use super::layout::TileLayout;
use super::DisplayError;

/// Per-slot copy stream. Submissions for one slot always go through its own
/// stream so a frame's copies can be awaited without draining the queue.
#[derive(Debug)]
pub struct CopyStream {
    label: String,
    last_submission: Option<wgpu::SubmissionIndex>,
}

impl CopyStream {
    fn new(slot: usize) -> Self {
        Self {
            label: format!("copy stream {slot}"),
            last_submission: None,
        }
    }

    pub fn begin(&self, device: &wgpu::Device) -> wgpu::CommandEncoder {
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&self.label),
        })
    }

    pub fn submit(&mut self, queue: &wgpu::Queue, encoder: wgpu::CommandEncoder) {
        self.last_submission = Some(queue.submit(Some(encoder.finish())));
    }

    /// Blocks until the last submitted work on this stream has completed.
    pub fn synchronize(&mut self, device: &wgpu::Device) -> Result<(), DisplayError> {
        let Some(index) = self.last_submission.take() else {
            return Ok(());
        };
        device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout: None,
            })
            .map_err(|err| DisplayError::StreamSync(err.to_string()))?;
        Ok(())
    }
}

/// Tracks which slots are currently mapped for copy.
#[derive(Debug)]
pub(super) struct MapLedger {
    mapped: Vec<bool>,
}

impl MapLedger {
    pub(super) fn new(slot_count: usize) -> Self {
        Self {
            mapped: vec![false; slot_count],
        }
    }

    pub(super) fn acquire(&mut self, slot: usize) -> Result<(), DisplayError> {
        if self.mapped[slot] {
            return Err(DisplayError::SlotAlreadyMapped(slot));
        }
        self.mapped[slot] = true;
        Ok(())
    }

    pub(super) fn release(&mut self, slot: usize) {
        self.mapped[slot] = false;
    }

    pub(super) fn ensure_released(&self, slot: usize) -> Result<(), DisplayError> {
        if self.mapped[slot] {
            return Err(DisplayError::SlotStillMapped(slot));
        }
        Ok(())
    }

    pub(super) fn any_mapped(&self) -> bool {
        self.mapped.iter().any(|&mapped| mapped)
    }
}

pub struct SlotPool {
    textures: Vec<wgpu::Texture>,
    streams: Vec<CopyStream>,
    ledger: MapLedger,
}

impl SlotPool {
    /// Creates `slot_count` slots sized to the full presentation image.
    ///
    /// `format` must be copy-compatible with the surface format (same format
    /// modulo the sRGB suffix) or the present blit is rejected by validation.
    pub fn new(
        device: &wgpu::Device,
        layout: &TileLayout,
        slot_count: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let mut textures = Vec::with_capacity(slot_count as usize);
        let mut streams = Vec::with_capacity(slot_count as usize);
        for slot in 0..slot_count as usize {
            let label = format!("frame slot {slot}");
            textures.push(device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&label),
                size: wgpu::Extent3d {
                    width: layout.image_dim.x,
                    height: layout.image_dim.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            }));
            streams.push(CopyStream::new(slot));
        }
        Self {
            textures,
            streams,
            ledger: MapLedger::new(slot_count as usize),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.textures.len()
    }

    /// Maps a slot for the tile copy. The returned guard releases the slot on
    /// every exit path; the slot cannot be presented or re-acquired while the
    /// guard lives.
    pub fn acquire_for_copy(&mut self, slot: usize) -> Result<MappedSlot<'_>, DisplayError> {
        self.ledger.acquire(slot)?;
        Ok(MappedSlot { pool: self, slot })
    }

    /// The slot's texture for the presentation blit. Fails while the slot is
    /// mapped: presenting a mapped slot is exactly the race the map ledger
    /// exists to prevent.
    pub fn presentable_texture(&self, slot: usize) -> Result<&wgpu::Texture, DisplayError> {
        self.ledger.ensure_released(slot)?;
        Ok(&self.textures[slot])
    }
}

impl Drop for SlotPool {
    fn drop(&mut self) {
        if self.ledger.any_mapped() {
            log::warn!("frame slot still mapped at teardown");
        }
    }
}

/// Scoped access to a mapped slot.
pub struct MappedSlot<'a> {
    pool: &'a mut SlotPool,
    slot: usize,
}

impl MappedSlot<'_> {
    pub fn texture(&self) -> &wgpu::Texture {
        &self.pool.textures[self.slot]
    }

    pub fn begin(&self, device: &wgpu::Device) -> wgpu::CommandEncoder {
        self.pool.streams[self.slot].begin(device)
    }

    /// Submits the copy encoder on this slot's stream and blocks until the
    /// copies complete. The synchronize is mandatory: presenting before the
    /// stream drains shows a partially written image.
    pub fn submit_and_sync(
        &mut self,
        queue: &wgpu::Queue,
        device: &wgpu::Device,
        encoder: wgpu::CommandEncoder,
    ) -> Result<(), DisplayError> {
        let stream = &mut self.pool.streams[self.slot];
        stream.submit(queue, encoder);
        stream.synchronize(device)
    }
}

impl Drop for MappedSlot<'_> {
    fn drop(&mut self) {
        self.pool.ledger.release(self.slot);
    }
}
