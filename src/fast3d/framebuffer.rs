use log::{trace, warn};

use super::{
    graphics::{GraphicsDevice, TextureId},
    utils::{memory::Rdram, texture::ImageSize},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthBuffer {
    pub address: u32,
    pub texture: Option<TextureId>,
}

/// A color image the RDP renders into, backed by a GPU render target.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBuffer {
    pub start_address: u32,
    pub end_address: u32,
    pub width: u32,
    pub height: u32,
    pub size: ImageSize,
    pub scale_x: f32,
    pub scale_y: f32,
    pub texture: Option<TextureId>,
    pub depth_buffer: Option<DepthBuffer>,
    pub cleared: bool,
}

impl FrameBuffer {
    pub fn new(address: u32, width: u32, height: u32, size: ImageSize) -> Self {
        let bytes = size.bytes_for(width * height).max(1);
        FrameBuffer {
            start_address: address,
            end_address: address + bytes - 1,
            width,
            height,
            size,
            scale_x: 1.0,
            scale_y: 1.0,
            texture: None,
            depth_buffer: None,
            cleared: false,
        }
    }

    pub fn contains(&self, address: u32) -> bool {
        (self.start_address..=self.end_address).contains(&address)
    }

    pub fn overlaps(&self, start: u32, end: u32) -> bool {
        start <= self.end_address && end >= self.start_address
    }
}

#[derive(Default)]
pub struct FrameBufferList {
    buffers: Vec<FrameBuffer>,
    current: Option<u32>,
}

impl FrameBufferList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the buffer at `buffer.start_address` and makes it current.
    pub fn add_buffer(&mut self, buffer: FrameBuffer) {
        let address = buffer.start_address;
        self.buffers.retain(|b| b.start_address != address);
        self.buffers.push(buffer);
        self.current = Some(address);
    }

    pub fn set_current(&mut self, address: u32) -> bool {
        if self.buffers.iter().any(|b| b.start_address == address) {
            self.current = Some(address);
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<&FrameBuffer> {
        let address = self.current?;
        self.buffers.iter().find(|b| b.start_address == address)
    }

    pub fn current_mut(&mut self) -> Option<&mut FrameBuffer> {
        let address = self.current?;
        self.buffers.iter_mut().find(|b| b.start_address == address)
    }

    pub fn get(&self, start_address: u32) -> Option<&FrameBuffer> {
        self.buffers
            .iter()
            .find(|b| b.start_address == start_address)
    }

    /// The buffer whose memory range holds `address`.
    pub fn find(&self, address: u32) -> Option<&FrameBuffer> {
        self.buffers.iter().rev().find(|b| b.contains(address))
    }

    pub fn remove_buffer(&mut self, start_address: u32) -> Option<FrameBuffer> {
        let index = self
            .buffers
            .iter()
            .position(|b| b.start_address == start_address)?;
        if self.current == Some(start_address) {
            self.current = None;
        }
        Some(self.buffers.remove(index))
    }

    pub fn buffers(&self) -> &[FrameBuffer] {
        &self.buffers
    }

    pub fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        for buffer in self.buffers.drain(..) {
            if let Some(id) = buffer.texture {
                device.delete_texture(id);
            }
            if let Some(id) = buffer.depth_buffer.and_then(|d| d.texture) {
                device.delete_texture(id);
            }
        }
        self.current = None;
    }

    /// Reads back the depth attachment of the buffer rendered at `color_address` and
    /// stores it big-endian at that buffer's depth image in RDRAM.
    pub fn copy_depth_buffer(
        &self,
        device: &mut dyn GraphicsDevice,
        rdram: &mut Rdram,
        color_address: u32,
    ) -> bool {
        let Some(buffer) = self.find(color_address) else {
            return false;
        };
        let Some(DepthBuffer {
            address,
            texture: Some(texture),
        }) = buffer.depth_buffer
        else {
            return false;
        };

        let Some(depth) = device.read_depth_buffer(texture, buffer.width, buffer.height) else {
            warn!("Depth readback of {:#x} failed", address);
            return false;
        };

        let bytes: Vec<u8> = depth.iter().flat_map(|z| z.to_be_bytes()).collect();
        if !rdram.write(address, &bytes) {
            warn!("Depth buffer at {:#x} does not fit in RDRAM", address);
            return false;
        }

        trace!("Copied {} depth values to {:#x}", depth.len(), address);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fast3d::graphics::dummy_device::DummyGraphicsDevice;

    #[test]
    fn test_find_by_contained_address() {
        let mut list = FrameBufferList::new();
        list.add_buffer(FrameBuffer::new(0x1000, 320, 240, ImageSize::G_IM_SIZ_16b));

        assert!(list.find(0x1000).is_some());
        assert!(list.find(0x1000 + 320 * 240 * 2 - 1).is_some());
        assert!(list.find(0x1000 + 320 * 240 * 2).is_none());
        assert_eq!(list.current().map(|b| b.width), Some(320));
    }

    #[test]
    fn test_remove_current_buffer() {
        let mut list = FrameBufferList::new();
        list.add_buffer(FrameBuffer::new(0x1000, 8, 8, ImageSize::G_IM_SIZ_16b));
        assert!(list.remove_buffer(0x1000).is_some());
        assert!(list.current().is_none());
        assert!(list.remove_buffer(0x1000).is_none());
    }

    #[test]
    fn test_copy_depth_buffer_is_big_endian() {
        let mut list = FrameBufferList::new();
        let mut buffer = FrameBuffer::new(0x1000, 2, 1, ImageSize::G_IM_SIZ_16b);
        buffer.depth_buffer = Some(DepthBuffer {
            address: 0x40,
            texture: Some(9),
        });
        list.add_buffer(buffer);

        let mut device = DummyGraphicsDevice::new();
        device.depth_readback = Some(vec![0x1234, 0xABCD]);
        let mut rdram = Rdram::new(0x2000);

        assert!(list.copy_depth_buffer(&mut device, &mut rdram, 0x1000));
        assert_eq!(rdram.read(0x40, 4), Some(&[0x12, 0x34, 0xAB, 0xCD][..]));
        // the color image itself is untouched
        assert_eq!(rdram.read(0x1000, 4), Some(&[0; 4][..]));
        assert!(!list.copy_depth_buffer(&mut device, &mut rdram, 0x80));
    }

    #[test]
    fn test_copy_depth_buffer_needs_depth_texture() {
        let mut list = FrameBufferList::new();
        let mut buffer = FrameBuffer::new(0x1000, 2, 1, ImageSize::G_IM_SIZ_16b);
        buffer.depth_buffer = Some(DepthBuffer {
            address: 0x40,
            texture: None,
        });
        list.add_buffer(buffer);

        let mut device = DummyGraphicsDevice::new();
        device.depth_readback = Some(vec![0x1234, 0xABCD]);
        let mut rdram = Rdram::new(0x2000);

        assert!(!list.copy_depth_buffer(&mut device, &mut rdram, 0x1000));
        assert!(device.calls.is_empty());
    }
}
