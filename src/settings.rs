//! Persisted configuration and its flat byte layout.
//!
//! The configuration lives in a fixed 512-byte image. Fields sit at
//! cumulative offsets, little-endian:
//!
//! | offset | field                         |
//! |-------:|-------------------------------|
//! |      0 | home latitude `f64`           |
//! |      8 | home longitude `f64`          |
//! |     16 | POI latitudes `[f64; 3]`      |
//! |     40 | POI longitudes `[f64; 3]`     |
//! |     64 | POI enabled `[u8; 3]`         |
//! |     67 | legacy POI latitude `f64`     |
//! |     75 | legacy POI longitude `f64`    |
//! |     83 | legacy POI enabled `u8`       |
//! |     84 | fuel level `f64`              |
//! |     92 | burn rate `f64`               |
//! |    100 | operation mode `i32`          |
//!
//! POI slot 0 is canonical. The legacy single-POI fields are written as a
//! copy of slot 0 and only read when slot 0 was never initialised (images
//! from firmware that predates the POI array).
//!
//! Changing any field size moves every later offset and invalidates stored
//! images.

use crate::config::CONFIG_IMAGE_SIZE;
use crate::fuel::FuelModel;
use crate::nav::GeoPoint;

pub const POI_COUNT: usize = 3;

const F64: usize = 8;

pub const HOME_LAT_OFFSET: usize = 0;
pub const HOME_LON_OFFSET: usize = HOME_LAT_OFFSET + F64;
pub const POI_LAT_OFFSET: usize = HOME_LON_OFFSET + F64;
pub const POI_LON_OFFSET: usize = POI_LAT_OFFSET + POI_COUNT * F64;
pub const POI_ENABLED_OFFSET: usize = POI_LON_OFFSET + POI_COUNT * F64;
pub const LEGACY_LAT_OFFSET: usize = POI_ENABLED_OFFSET + POI_COUNT;
pub const LEGACY_LON_OFFSET: usize = LEGACY_LAT_OFFSET + F64;
pub const LEGACY_ENABLED_OFFSET: usize = LEGACY_LON_OFFSET + F64;
pub const FUEL_LEVEL_OFFSET: usize = LEGACY_ENABLED_OFFSET + 1;
pub const BURN_RATE_OFFSET: usize = FUEL_LEVEL_OFFSET + F64;
pub const MODE_OFFSET: usize = BURN_RATE_OFFSET + F64;
pub const LAYOUT_END: usize = MODE_OFFSET + 4;

const _: () = assert!(LAYOUT_END <= CONFIG_IMAGE_SIZE);

/// Operating mode. Affects iconography and the idle power-off policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    #[default]
    Flying,
    Walking,
}

impl OperationMode {
    /// Wire and storage code.
    pub fn code(self) -> i32 {
        match self {
            OperationMode::Flying => 1,
            OperationMode::Walking => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(OperationMode::Flying),
            2 => Some(OperationMode::Walking),
            _ => None,
        }
    }
}

/// One configurable destination besides home.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PointOfInterest {
    pub location: GeoPoint,
    pub enabled: bool,
}

/// Independently persisted groups of fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigRegion {
    Home,
    Pois,
    Fuel,
    Mode,
}

/// Everything that survives sleep and reboot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PersistedConfig {
    pub home: GeoPoint,
    pub pois: [PointOfInterest; POI_COUNT],
    pub fuel: FuelModel,
    pub mode: OperationMode,
}

impl PersistedConfig {
    /// Decode an image, replacing every invalid field with its default.
    pub fn load(image: &ConfigImage) -> Self {
        let home = image
            .point(HOME_LAT_OFFSET, HOME_LON_OFFSET)
            .unwrap_or_else(|| {
                log_warn!("stored home point invalid, using 0,0");
                GeoPoint::default()
            });

        let mut pois = [PointOfInterest::default(); POI_COUNT];
        for (slot, poi) in pois.iter_mut().enumerate() {
            let location = image.point(
                POI_LAT_OFFSET + slot * F64,
                POI_LON_OFFSET + slot * F64,
            );
            let enabled = image.flag(POI_ENABLED_OFFSET + slot);
            *poi = match (location, enabled) {
                (Some(location), Some(enabled)) => PointOfInterest { location, enabled },
                _ => PointOfInterest::default(),
            };
        }

        // Images written before the POI array only carry the legacy copy.
        if !image.slot_initialised(0) {
            if let (Some(location), Some(enabled)) = (
                image.point(LEGACY_LAT_OFFSET, LEGACY_LON_OFFSET),
                image.flag(LEGACY_ENABLED_OFFSET),
            ) {
                log_info!("POI 1 restored from legacy fields");
                pois[0] = PointOfInterest { location, enabled };
            }
        }

        let fuel = FuelModel::from_stored(
            image.f64_at(FUEL_LEVEL_OFFSET),
            image.f64_at(BURN_RATE_OFFSET),
        );

        let mode = OperationMode::from_code(image.i32_at(MODE_OFFSET)).unwrap_or_else(|| {
            log_warn!("stored operation mode invalid, using Flying");
            OperationMode::default()
        });

        Self {
            home,
            pois,
            fuel,
            mode,
        }
    }
}

/// The raw persisted bytes. Region writes only touch their own fields.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigImage {
    bytes: [u8; CONFIG_IMAGE_SIZE],
}

impl ConfigImage {
    /// Image as read from erased flash.
    pub const fn erased() -> Self {
        Self {
            bytes: [0xFF; CONFIG_IMAGE_SIZE],
        }
    }

    /// Wrap bytes read from storage. Short reads are padded as erased.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut image = Self::erased();
        let len = data.len().min(CONFIG_IMAGE_SIZE);
        image.bytes[..len].copy_from_slice(&data[..len]);
        image
    }

    /// Image holding every region of `config`.
    pub fn from_config(config: &PersistedConfig) -> Self {
        let mut image = Self::erased();
        for region in [
            ConfigRegion::Home,
            ConfigRegion::Pois,
            ConfigRegion::Fuel,
            ConfigRegion::Mode,
        ] {
            image.write_region(region, config);
        }
        image
    }

    pub fn as_bytes(&self) -> &[u8; CONFIG_IMAGE_SIZE] {
        &self.bytes
    }

    /// Copy one region of `config` into the image.
    pub fn write_region(&mut self, region: ConfigRegion, config: &PersistedConfig) {
        match region {
            ConfigRegion::Home => {
                self.put_f64(HOME_LAT_OFFSET, config.home.latitude);
                self.put_f64(HOME_LON_OFFSET, config.home.longitude);
            }
            ConfigRegion::Pois => {
                for (slot, poi) in config.pois.iter().enumerate() {
                    self.put_f64(POI_LAT_OFFSET + slot * F64, poi.location.latitude);
                    self.put_f64(POI_LON_OFFSET + slot * F64, poi.location.longitude);
                    self.bytes[POI_ENABLED_OFFSET + slot] = poi.enabled as u8;
                }
                // The legacy copy is derived from slot 0, never edited on its own.
                let first = &config.pois[0];
                self.put_f64(LEGACY_LAT_OFFSET, first.location.latitude);
                self.put_f64(LEGACY_LON_OFFSET, first.location.longitude);
                self.bytes[LEGACY_ENABLED_OFFSET] = first.enabled as u8;
            }
            ConfigRegion::Fuel => {
                self.put_f64(FUEL_LEVEL_OFFSET, config.fuel.level_liters);
                self.put_f64(BURN_RATE_OFFSET, config.fuel.burn_rate_lph);
            }
            ConfigRegion::Mode => {
                self.bytes[MODE_OFFSET..MODE_OFFSET + 4]
                    .copy_from_slice(&config.mode.code().to_le_bytes());
            }
        }
    }

    fn put_f64(&mut self, offset: usize, value: f64) {
        self.bytes[offset..offset + F64].copy_from_slice(&value.to_le_bytes());
    }

    fn f64_at(&self, offset: usize) -> f64 {
        let mut raw = [0u8; F64];
        raw.copy_from_slice(&self.bytes[offset..offset + F64]);
        f64::from_le_bytes(raw)
    }

    fn i32_at(&self, offset: usize) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[offset..offset + 4]);
        i32::from_le_bytes(raw)
    }

    fn point(&self, lat_offset: usize, lon_offset: usize) -> Option<GeoPoint> {
        GeoPoint::new(self.f64_at(lat_offset), self.f64_at(lon_offset))
    }

    fn flag(&self, offset: usize) -> Option<bool> {
        match self.bytes[offset] {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    fn slot_initialised(&self, slot: usize) -> bool {
        let lat = POI_LAT_OFFSET + slot * F64;
        let lon = POI_LON_OFFSET + slot * F64;
        self.bytes[lat..lat + F64].iter().any(|&b| b != 0xFF)
            || self.bytes[lon..lon + F64].iter().any(|&b| b != 0xFF)
            || self.bytes[POI_ENABLED_OFFSET + slot] != 0xFF
    }
}

impl Default for ConfigImage {
    fn default() -> Self {
        Self::erased()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_cumulative() {
        assert_eq!(HOME_LON_OFFSET, 8);
        assert_eq!(POI_LAT_OFFSET, 16);
        assert_eq!(POI_LON_OFFSET, 40);
        assert_eq!(POI_ENABLED_OFFSET, 64);
        assert_eq!(LEGACY_LAT_OFFSET, 67);
        assert_eq!(LEGACY_LON_OFFSET, 75);
        assert_eq!(LEGACY_ENABLED_OFFSET, 83);
        assert_eq!(FUEL_LEVEL_OFFSET, 84);
        assert_eq!(BURN_RATE_OFFSET, 92);
        assert_eq!(MODE_OFFSET, 100);
        assert_eq!(LAYOUT_END, 104);
    }

    #[test]
    fn erased_image_loads_defaults() {
        let config = PersistedConfig::load(&ConfigImage::erased());
        assert_eq!(config, PersistedConfig::default());
        assert_eq!(config.fuel.level_liters, 12.0);
        assert_eq!(config.fuel.burn_rate_lph, 4.5);
        assert_eq!(config.mode, OperationMode::Flying);
    }

    #[test]
    fn written_image_loads_back() {
        let mut config = PersistedConfig::default();
        config.home = GeoPoint::new(64.1466, -21.9426).unwrap();
        config.pois[1] = PointOfInterest {
            location: GeoPoint::new(63.4186, -19.006).unwrap(),
            enabled: true,
        };
        config.fuel = FuelModel {
            level_liters: 40.0,
            burn_rate_lph: 6.0,
        };
        config.mode = OperationMode::Walking;

        let image = ConfigImage::from_config(&config);
        assert_eq!(PersistedConfig::load(&image), config);
    }

    #[test]
    fn region_write_leaves_other_fields_alone() {
        let mut config = PersistedConfig::default();
        config.home = GeoPoint::new(10.0, 20.0).unwrap();
        let mut image = ConfigImage::erased();
        image.write_region(ConfigRegion::Home, &config);

        assert_eq!(&image.as_bytes()[0..8], &10.0f64.to_le_bytes());
        assert!(image.as_bytes()[POI_LAT_OFFSET..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn legacy_mirror_tracks_slot_zero() {
        let mut config = PersistedConfig::default();
        config.pois[0] = PointOfInterest {
            location: GeoPoint::new(1.5, 2.5).unwrap(),
            enabled: true,
        };
        let mut image = ConfigImage::erased();
        image.write_region(ConfigRegion::Pois, &config);

        let bytes = image.as_bytes();
        assert_eq!(&bytes[LEGACY_LAT_OFFSET..LEGACY_LAT_OFFSET + 8], &1.5f64.to_le_bytes());
        assert_eq!(&bytes[LEGACY_LON_OFFSET..LEGACY_LON_OFFSET + 8], &2.5f64.to_le_bytes());
        assert_eq!(bytes[LEGACY_ENABLED_OFFSET], 1);
    }

    #[test]
    fn legacy_only_image_restores_slot_zero() {
        let mut raw = [0xFFu8; CONFIG_IMAGE_SIZE];
        raw[LEGACY_LAT_OFFSET..LEGACY_LAT_OFFSET + 8].copy_from_slice(&45.0f64.to_le_bytes());
        raw[LEGACY_LON_OFFSET..LEGACY_LON_OFFSET + 8].copy_from_slice(&7.0f64.to_le_bytes());
        raw[LEGACY_ENABLED_OFFSET] = 1;

        let config = PersistedConfig::load(&ConfigImage::from_bytes(&raw));
        assert_eq!(config.pois[0].location, GeoPoint::new(45.0, 7.0).unwrap());
        assert!(config.pois[0].enabled);
    }

    #[test]
    fn invalid_fields_fall_back_individually() {
        let mut config = PersistedConfig::default();
        config.home = GeoPoint::new(50.0, 8.0).unwrap();
        let image = ConfigImage::from_config(&config);

        let mut raw = *image.as_bytes();
        raw[MODE_OFFSET..MODE_OFFSET + 4].copy_from_slice(&7i32.to_le_bytes());
        raw[POI_ENABLED_OFFSET + 2] = 9;
        raw[POI_LAT_OFFSET + 16..POI_LAT_OFFSET + 24].copy_from_slice(&123.0f64.to_le_bytes());

        let loaded = PersistedConfig::load(&ConfigImage::from_bytes(&raw));
        assert_eq!(loaded.home, config.home);
        assert_eq!(loaded.mode, OperationMode::Flying);
        assert_eq!(loaded.pois[2], PointOfInterest::default());
    }

    #[test]
    fn mode_codes() {
        assert_eq!(OperationMode::from_code(1), Some(OperationMode::Flying));
        assert_eq!(OperationMode::from_code(2), Some(OperationMode::Walking));
        assert_eq!(OperationMode::from_code(0), None);
        assert_eq!(OperationMode::Walking.code(), 2);
    }
}
