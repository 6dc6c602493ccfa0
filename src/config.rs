//! Configuration resolved once at startup and injected into the engine,
//! pipeline and server.

use crate::engine::OutputRange;
use crate::padding::PaddingAdapter;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Compute device the model handles are bound to for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

impl FromStr for Device {
    type Err = String;

    /// Accepts `cpu`, `cuda` (device 0) and `cuda:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        if lower == "cpu" {
            return Ok(Device::Cpu);
        }
        if lower == "cuda" {
            return Ok(Device::Cuda(0));
        }
        if let Some(id) = lower.strip_prefix("cuda:") {
            return id.parse::<u32>().map(Device::Cuda).map_err(|_| {
                format!(
                    "Invalid CUDA device ID: {}. Expected format: 'cuda' or 'cuda:N'",
                    s
                )
            });
        }
        Err(format!(
            "Invalid device: {}. Expected 'cpu', 'cuda' or 'cuda:N'",
            s
        ))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

/// Everything needed to load the model handles.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model_path: PathBuf,
    pub device: Device,
    /// Number of interchangeable model handles (at least 1)
    pub pool_size: usize,
    pub intra_threads: usize,
    /// Mask samples strictly above this value are inpainted
    pub mask_threshold: u8,
    pub output_range: OutputRange,
    /// Padding applied before inference; restoration must use the same adapter
    pub padding: PaddingAdapter,
    pub image_input: String,
    pub mask_input: String,
    pub output_name: String,
}

impl EngineConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            device: Device::Cpu,
            pool_size: 1,
            intra_threads: 4,
            mask_threshold: 0,
            output_range: OutputRange::Unit,
            padding: PaddingAdapter::default(),
            image_input: "image".to_string(),
            mask_input: "mask".to_string(),
            output_name: "output".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
        assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("cuda:2".parse::<Device>().unwrap(), Device::Cuda(2));
        assert!("cuda:x".parse::<Device>().is_err());
        assert!("tpu".parse::<Device>().is_err());
    }

    #[test]
    fn test_device_display_round_trips() {
        for device in [Device::Cpu, Device::Cuda(3)] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }
}
