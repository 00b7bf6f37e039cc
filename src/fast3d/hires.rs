use bitflags::bitflags;
use log::{info, warn};

use super::{
    config::TextureFilterConfig,
    utils::texture::{ImageFormat, ImageSize},
};

bitflags! {
    /// Option word handed to a hi-res texture pack.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TextureFilterOptions: u32 {
        const FILTER_MASK = 0x0000_00ff;
        const ENHANCEMENT_MASK = 0x0000_0f00;
        const RICE_HIRESTEXTURES = 0x0002_0000;
        const GZ_TEXCACHE = 0x0040_0000;
        const GZ_HIRESTEXCACHE = 0x0080_0000;
        const DUMP_TEXCACHE = 0x0100_0000;
        const DUMP_HIRESTEXCACHE = 0x0200_0000;
        const FORCE16BPP_HIRESTEX = 0x1000_0000;
        const FORCE16BPP_TEX = 0x2000_0000;
        const LET_TEXARTISTS_FLY = 0x4000_0000;
        const DUMP_TEX = 0x8000_0000;
    }
}

const FILTERS: [u32; 7] = [0x00, 0x01, 0x02, 0x03, 0x04, 0x10, 0x20];

impl TextureFilterOptions {
    pub fn from_config(config: &TextureFilterConfig) -> Self {
        let filter = FILTERS
            .get(config.filter as usize)
            .copied()
            .unwrap_or_default();
        let enhancement = (config.enhancement & 0xf) << 8;

        let mut options = Self::from_bits_retain(filter | enhancement);
        if config.hires_enable {
            options |= Self::RICE_HIRESTEXTURES;
        }
        if config.force_16bpp {
            options |= Self::FORCE16BPP_TEX | Self::FORCE16BPP_HIRESTEX;
        }
        if config.compress {
            options |= Self::GZ_TEXCACHE | Self::GZ_HIRESTEXCACHE;
        }
        if config.full_alpha_channel {
            options |= Self::LET_TEXARTISTS_FLY;
        }
        if config.dump {
            options |= Self::DUMP_TEX;
        }
        options
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HiresKey {
    pub rom_name: String,
    pub fingerprint: u64,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size: ImageSize,
}

/// Replacement RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HiresImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub trait HiresTextureProvider {
    fn init(&mut self, options: &TextureFilterOptions) -> anyhow::Result<()>;
    fn lookup(&mut self, key: &HiresKey) -> Option<HiresImage>;
}

#[derive(Default)]
pub struct TextureFilterHandler {
    options: TextureFilterOptions,
    rom_name: String,
    provider: Option<Box<dyn HiresTextureProvider>>,
}

impl TextureFilterHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands the configured options to `provider`. The handler stays disabled if
    /// nothing is enabled or the provider refuses them.
    pub fn init(
        &mut self,
        config: &TextureFilterConfig,
        rom_name: &str,
        mut provider: Box<dyn HiresTextureProvider>,
    ) -> bool {
        self.shutdown();

        if config.filter == 0 && config.enhancement == 0 && !config.hires_enable {
            return false;
        }

        let options = TextureFilterOptions::from_config(config);
        if let Err(error) = provider.init(&options) {
            warn!("Texture pack for {} failed to initialize: {:#}", rom_name, error);
            return false;
        }

        info!("Texture pack enabled for {} ({:#010x})", rom_name, options.bits());
        self.options = options;
        self.rom_name = rom_name.to_string();
        self.provider = Some(provider);
        true
    }

    pub fn shutdown(&mut self) {
        self.provider = None;
        self.options = TextureFilterOptions::empty();
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    pub fn options(&self) -> TextureFilterOptions {
        self.options
    }

    pub fn lookup(
        &mut self,
        fingerprint: u64,
        width: u32,
        height: u32,
        format: ImageFormat,
        size: ImageSize,
    ) -> Option<HiresImage> {
        let provider = self.provider.as_mut()?;
        provider.lookup(&HiresKey {
            rom_name: self.rom_name.clone(),
            fingerprint,
            width,
            height,
            format,
            size,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Answers every lookup for `fingerprint` with a 1x1 white texel.
    pub(crate) struct SinglePack {
        pub fingerprint: u64,
        pub fail_init: bool,
    }

    impl HiresTextureProvider for SinglePack {
        fn init(&mut self, _options: &TextureFilterOptions) -> anyhow::Result<()> {
            if self.fail_init {
                anyhow::bail!("pack missing");
            }
            Ok(())
        }

        fn lookup(&mut self, key: &HiresKey) -> Option<HiresImage> {
            (key.fingerprint == self.fingerprint).then(|| HiresImage {
                width: 1,
                height: 1,
                data: vec![0xFF; 4],
            })
        }
    }

    fn hires_config() -> TextureFilterConfig {
        TextureFilterConfig {
            hires_enable: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_options_from_config() {
        let config = TextureFilterConfig {
            filter: 5,
            enhancement: 2,
            force_16bpp: true,
            dump: true,
            ..Default::default()
        };
        let options = TextureFilterOptions::from_config(&config);

        assert_eq!(options.bits() & 0xff, 0x10);
        assert_eq!(options.bits() & 0xf00, 0x200);
        assert!(options.contains(TextureFilterOptions::FORCE16BPP_TEX));
        assert!(options.contains(TextureFilterOptions::DUMP_TEX));
        assert!(!options.contains(TextureFilterOptions::RICE_HIRESTEXTURES));
    }

    #[test]
    fn test_failed_init_stays_disabled() {
        let mut handler = TextureFilterHandler::new();
        let pack = SinglePack {
            fingerprint: 1,
            fail_init: true,
        };

        assert!(!handler.init(&hires_config(), "ZELDA", Box::new(pack)));
        assert!(!handler.is_enabled());
    }

    #[test]
    fn test_disabled_config_skips_provider() {
        let mut handler = TextureFilterHandler::new();
        let pack = SinglePack {
            fingerprint: 1,
            fail_init: false,
        };

        assert!(!handler.init(&TextureFilterConfig::default(), "ZELDA", Box::new(pack)));
    }

    #[test]
    fn test_lookup_by_fingerprint() {
        let mut handler = TextureFilterHandler::new();
        let pack = SinglePack {
            fingerprint: 42,
            fail_init: false,
        };
        assert!(handler.init(&hires_config(), "ZELDA", Box::new(pack)));

        let format = ImageFormat::G_IM_FMT_RGBA;
        let size = ImageSize::G_IM_SIZ_16b;
        assert!(handler.lookup(42, 8, 8, format, size).is_some());
        assert!(handler.lookup(43, 8, 8, format, size).is_none());
    }
}
