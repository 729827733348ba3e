//! Device and handle configuration
//!
//! Defaults are detected from the host; every field can be overridden through
//! the environment (see [`HandleConfig::from_env`]) or set directly.

use crate::constants::DEFAULT_WAVEFRONT_SIZE;

/// How scalar arguments (`alpha`, `beta`) are passed to a routine
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerMode {
    /// Scalars are host values and may be inspected before launching
    #[default]
    Host = 0,
    /// Scalars live in device memory and are only read by the kernels
    Device = 1,
}

impl TryFrom<i32> for PointerMode {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PointerMode::Host),
            1 => Ok(PointerMode::Device),
            _ => Err(()),
        }
    }
}

/// Logging layers enabled on a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerMode(u32);

impl LayerMode {
    /// No logging
    pub const NONE: LayerMode = LayerMode(0);
    /// Trace record per routine call
    pub const LOG_TRACE: LayerMode = LayerMode(1);

    /// Builds a layer mode from raw bits
    pub fn from_bits(bits: u32) -> Self {
        LayerMode(bits & Self::LOG_TRACE.0)
    }

    /// Raw bits
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Whether every layer of `other` is enabled
    pub fn contains(&self, other: LayerMode) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Properties of the compute device behind a handle
#[derive(Debug, Clone)]
pub struct DeviceProperties {
    /// Number of compute units (worker threads)
    pub compute_units: usize,
    /// Lanes per wavefront
    pub wavefront_size: u32,
    /// Whether spin-waits back off instead of busy-looping
    pub spin_backoff: bool,
}

impl Default for DeviceProperties {
    fn default() -> Self {
        Self {
            compute_units: num_cpus::get(), // Use all available cores
            wavefront_size: detect_wavefront_size(),
            spin_backoff: true,
        }
    }
}

impl DeviceProperties {
    /// Whether the kernels support this device's wavefront size
    pub fn supports_wavefront(&self) -> bool {
        matches!(self.wavefront_size, 32 | 64)
    }
}

/// Configuration used when creating a [`Handle`](crate::Handle)
#[derive(Debug, Clone, Default)]
pub struct HandleConfig {
    /// Device properties
    pub device: DeviceProperties,
    /// Initial pointer mode
    pub pointer_mode: PointerMode,
    /// Enabled logging layers
    pub layer_mode: LayerMode,
}

impl HandleConfig {
    /// Reads the configuration from the environment
    ///
    /// Recognized variables:
    /// - `CSRKIT_LAYER`: layer bits (`1` enables trace logging)
    /// - `CSRKIT_WAVEFRONT_SIZE`: lanes per wavefront
    /// - `CSRKIT_COMPUTE_UNITS`: number of worker threads
    /// - `CSRKIT_SPIN_BACKOFF`: `0` disables spin-wait backoff
    ///
    /// Unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(bits) = env_parse::<u32>("CSRKIT_LAYER") {
            config.layer_mode = LayerMode::from_bits(bits);
        }
        if let Some(units) = env_parse::<usize>("CSRKIT_COMPUTE_UNITS") {
            config.device.compute_units = units.max(1);
        }
        if let Some(backoff) = env_parse::<u32>("CSRKIT_SPIN_BACKOFF") {
            config.device.spin_backoff = backoff != 0;
        }

        config
    }

    /// Config for a device with the given number of compute units and wavefront size
    pub fn with_device(compute_units: usize, wavefront_size: u32) -> Self {
        Self {
            device: DeviceProperties {
                compute_units: compute_units.max(1),
                wavefront_size,
                spin_backoff: true,
            },
            ..Self::default()
        }
    }
}

/// Detects the wavefront size of the device
///
/// The host device has no native wavefront; `CSRKIT_WAVEFRONT_SIZE` overrides
/// the default of 64 lanes.
pub fn detect_wavefront_size() -> u32 {
    env_parse::<u32>("CSRKIT_WAVEFRONT_SIZE").unwrap_or(DEFAULT_WAVEFRONT_SIZE)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}
