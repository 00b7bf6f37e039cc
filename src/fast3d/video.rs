use log::trace;

use super::config::{AspectRatio, FrameBufferEmulationConfig};

/// Output surface geometry and the N64 to screen mapping.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoState {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Area of the screen the N64 image is drawn into.
    pub width: u32,
    pub height: u32,
    pub vi_width: u32,
    pub vi_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Draw 4:3 content centered inside a wider screen.
    pub adjust_screen: bool,
    pub adjust_scale: f32,
    /// Letterbox offset from the bottom of the screen.
    pub height_offset: u32,
    pub buffers_swap_count: u64,
}

impl Default for VideoState {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoState {
    pub fn new() -> Self {
        VideoState {
            screen_width: 320,
            screen_height: 240,
            width: 320,
            height: 240,
            vi_width: 320,
            vi_height: 240,
            scale_x: 1.0,
            scale_y: 1.0,
            adjust_screen: false,
            adjust_scale: 1.0,
            height_offset: 0,
            buffers_swap_count: 0,
        }
    }

    pub fn set_screen_size(
        &mut self,
        screen_width: u32,
        screen_height: u32,
        config: &FrameBufferEmulationConfig,
    ) {
        self.screen_width = screen_width;
        self.screen_height = screen_height;
        self.adjust_screen = false;
        self.adjust_scale = 1.0;

        let (w, h) = (screen_width, screen_height);
        let (width, height) = match config.aspect {
            AspectRatio::Stretch => (w, h),
            AspectRatio::Ratio4_3 => {
                if w * 3 / 4 > h {
                    (h * 4 / 3, h)
                } else {
                    (w, w * 3 / 4)
                }
            }
            AspectRatio::Ratio16_9 => {
                if w * 9 / 16 > h {
                    (h * 16 / 9, h)
                } else {
                    (w, w * 9 / 16)
                }
            }
            AspectRatio::Adjust => {
                if w * 3 / 4 > h {
                    self.adjust_screen = true;
                    self.adjust_scale = (h as f32 * 4.0 / 3.0) / w as f32;
                }
                (w, h)
            }
        };

        self.width = width.max(1);
        self.height = height.max(1);
        self.height_offset = screen_height.saturating_sub(self.height) / 2;
        self.update_scale();
        trace!(
            "Screen {}x{} renders at {}x{} (adjust {})",
            screen_width,
            screen_height,
            self.width,
            self.height,
            self.adjust_scale
        );
    }

    pub fn set_vi_size(&mut self, vi_width: u32, vi_height: u32) {
        self.vi_width = vi_width.max(1);
        self.vi_height = vi_height.max(1);
        self.update_scale();
    }

    fn update_scale(&mut self) {
        self.scale_x = self.width as f32 / self.vi_width as f32;
        self.scale_y = self.height as f32 / self.vi_height as f32;
    }
}
