//! Flash persistence for the configuration image.
//!
//! The whole [`ConfigImage`] is kept as one item of a `sequential-storage`
//! key-value map in internal flash. Writes go through [`ConfigStore::commit`]
//! after the in-memory image has been patched with
//! [`ConfigImage::write_region`], so an update touches only the bytes of
//! the region that changed. `sequential-storage` takes care of wear
//! levelling and page reuse.
//!
//! A failed commit is logged and the in-memory configuration stays as it
//! is; the next successful commit writes the full image again.

use crate::config::{CONFIG_IMAGE_SIZE, STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use crate::error::Error;
use crate::settings::{ConfigImage, ConfigRegion, PersistedConfig};
use defmt::{debug, error, info, warn};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Map key of the configuration image.
const KEY_CONFIG_IMAGE: u8 = 0x01;

/// Image plus key and item header, rounded up to the flash word size.
const ITEM_BUFFER_SIZE: usize = CONFIG_IMAGE_SIZE + 32;

/// Owns the flash and the last committed image.
pub struct ConfigStore<F> {
    flash: F,
    image: ConfigImage,
}

impl<F: NorFlash> ConfigStore<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            image: ConfigImage::erased(),
        }
    }

    /// Read the image from flash and decode it with per-field fallbacks.
    ///
    /// Missing or unreadable storage yields the defaults.
    pub async fn load(&mut self) -> PersistedConfig {
        let mut buf = [0u8; ITEM_BUFFER_SIZE];

        match fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_CONFIG_IMAGE,
        )
        .await
        {
            Ok(Some(data)) => {
                if data.len() != CONFIG_IMAGE_SIZE {
                    warn!("config image is {} bytes, padding as erased", data.len());
                }
                self.image = ConfigImage::from_bytes(data);
                info!("config image loaded");
            }
            Ok(None) => {
                info!("no config image in flash, using defaults");
                self.image = ConfigImage::erased();
            }
            Err(e) => {
                error!("flash read error: {:?}", defmt::Debug2Format(&e));
                self.image = ConfigImage::erased();
            }
        }

        PersistedConfig::load(&self.image)
    }

    /// Patch `region` from `config` into the image and write it out.
    pub async fn commit(
        &mut self,
        region: ConfigRegion,
        config: &PersistedConfig,
    ) -> Result<(), Error> {
        let mut next = self.image.clone();
        next.write_region(region, config);
        if next == self.image {
            debug!("config region {:?} unchanged, skipping commit", region);
            return Ok(());
        }

        let mut buf = [0u8; ITEM_BUFFER_SIZE];
        let item: &[u8] = next.as_bytes();

        match store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_CONFIG_IMAGE,
            &item,
        )
        .await
        {
            Ok(()) => {
                info!("config region {:?} committed", region);
                self.image = next;
                Ok(())
            }
            Err(e) => {
                error!("flash write error: {:?}", defmt::Debug2Format(&e));
                Err(Error::Storage)
            }
        }
    }
}
