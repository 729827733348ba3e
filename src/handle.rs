//! Library handle and per-matrix analysis info
//!
//! A [`Handle`] binds routines to a [`Stream`] and carries the pointer mode
//! and logging layers. A [`MatInfo`] caches analysis results (row blocks,
//! dependency maps, SpGEMM flags) for one matrix structure.

use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::constants::NO_ZERO_PIVOT;
use crate::csrgemm::CsrgemmInfo;
use crate::csrsm::CsrsmInfo;
use crate::device::{HandleConfig, LayerMode, PointerMode, Stream};
use crate::error::{Result, SparseError};
use crate::matrix::FillMode;
use crate::spmv::CsrmvInfo;

/// Library context: stream, pointer mode and logging layers
#[derive(Debug)]
pub struct Handle {
    stream: Stream,
    pointer_mode: PointerMode,
    layer_mode: LayerMode,
}

impl Handle {
    /// Creates a handle configured from the environment
    pub fn new() -> Result<Self> {
        Self::with_config(HandleConfig::from_env())
    }

    /// Creates a handle from an explicit configuration
    pub fn with_config(config: HandleConfig) -> Result<Self> {
        let stream = Stream::new(config.device)?;
        log::debug!(
            "csrkit handle created: {} compute units, wavefront {}",
            stream.compute_units(),
            stream.properties().wavefront_size
        );

        Ok(Self {
            stream,
            pointer_mode: config.pointer_mode,
            layer_mode: config.layer_mode,
        })
    }

    /// Stream that routines on this handle launch on
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Current pointer mode
    pub fn pointer_mode(&self) -> PointerMode {
        self.pointer_mode
    }

    /// Sets the pointer mode for subsequent calls
    pub fn set_pointer_mode(&mut self, mode: PointerMode) {
        self.pointer_mode = mode;
    }

    /// Enabled logging layers
    pub fn layer_mode(&self) -> LayerMode {
        self.layer_mode
    }

    /// Sets the logging layers
    pub fn set_layer_mode(&mut self, mode: LayerMode) {
        self.layer_mode = mode;
    }

    /// Lanes per wavefront of the device
    pub fn wavefront_size(&self) -> u32 {
        self.stream.properties().wavefront_size
    }

    pub(crate) fn ensure_wavefront(&self) -> Result<()> {
        if self.stream.properties().supports_wavefront() {
            Ok(())
        } else {
            Err(SparseError::ArchMismatch {
                wavefront_size: self.wavefront_size(),
            })
        }
    }

    pub(crate) fn spin_backoff(&self) -> bool {
        self.stream.properties().spin_backoff
    }

    /// Emits a trace record when the trace layer is enabled
    pub(crate) fn log_trace(&self, args: fmt::Arguments<'_>) {
        if self.layer_mode.contains(LayerMode::LOG_TRACE) {
            log::trace!(target: "csrkit::trace", "{}", args);
        }
    }
}

/// Analysis data attached to one matrix structure
#[derive(Debug)]
pub struct MatInfo {
    pub(crate) csrmv: Option<CsrmvInfo>,
    pub(crate) csrsm_lower: Option<CsrsmInfo>,
    pub(crate) csrsm_upper: Option<CsrsmInfo>,
    pub(crate) csrgemm: Option<CsrgemmInfo>,
    pub(crate) zero_pivot: AtomicI32,
}

impl Default for MatInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl MatInfo {
    /// Creates an empty info
    pub fn new() -> Self {
        Self {
            csrmv: None,
            csrsm_lower: None,
            csrsm_upper: None,
            csrgemm: None,
            zero_pivot: AtomicI32::new(NO_ZERO_PIVOT),
        }
    }

    /// CSRMV analysis, if built
    pub fn csrmv(&self) -> Option<&CsrmvInfo> {
        self.csrmv.as_ref()
    }

    /// CSRSM analysis for `fill_mode`, if built
    pub fn csrsm(&self, fill_mode: FillMode) -> Option<&CsrsmInfo> {
        match fill_mode {
            FillMode::Lower => self.csrsm_lower.as_ref(),
            FillMode::Upper => self.csrsm_upper.as_ref(),
        }
    }

    pub(crate) fn csrsm_slot(&mut self, fill_mode: FillMode) -> &mut Option<CsrsmInfo> {
        match fill_mode {
            FillMode::Lower => &mut self.csrsm_lower,
            FillMode::Upper => &mut self.csrsm_upper,
        }
    }

    /// CSRGEMM flags recorded by the buffer-size query, if any
    pub fn csrgemm(&self) -> Option<&CsrgemmInfo> {
        self.csrgemm.as_ref()
    }

    /// Position (including index base) of the last detected zero pivot
    pub fn zero_pivot(&self) -> Option<i32> {
        match self.zero_pivot.load(Ordering::Acquire) {
            NO_ZERO_PIVOT => None,
            position => Some(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_defaults() {
        let handle = Handle::with_config(HandleConfig::with_device(2, 64)).unwrap();
        assert_eq!(handle.pointer_mode(), PointerMode::Host);
        assert_eq!(handle.wavefront_size(), 64);
        assert_eq!(handle.stream().compute_units(), 2);
        assert!(handle.ensure_wavefront().is_ok());
    }

    #[test]
    fn test_unsupported_wavefront() {
        let handle = Handle::with_config(HandleConfig::with_device(1, 16)).unwrap();
        assert_eq!(
            handle.ensure_wavefront(),
            Err(SparseError::ArchMismatch { wavefront_size: 16 })
        );
    }

    #[test]
    fn test_mat_info_starts_empty() {
        let info = MatInfo::new();
        assert!(info.csrmv().is_none());
        assert!(info.csrsm(FillMode::Lower).is_none());
        assert!(info.csrgemm().is_none());
        assert_eq!(info.zero_pivot(), None);
    }
}
