use std::fmt;
use serde::Serialize;
use tracing::warn;

use crate::config::DeviceConfig;

/// GPU backends llama.cpp was compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backends {
    pub cuda: bool,
    pub metal: bool,
}

impl Backends {
    /// Backends enabled through cargo features at build time.
    pub fn compiled() -> Self {
        Self {
            cuda: cfg!(feature = "cuda"),
            metal: cfg!(feature = "metal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Device {
    Cpu,
    Cuda,
    Metal,
}

impl Device {
    /// Picks the compute device for the configured preference.
    pub fn select(config: &DeviceConfig, backends: Backends) -> Device {
        let gpu = if backends.cuda {
            Some(Device::Cuda)
        } else if backends.metal {
            Some(Device::Metal)
        } else {
            None
        };

        match config.preference.to_lowercase().as_str() {
            "cpu" => Device::Cpu,
            "gpu" => gpu.unwrap_or_else(|| {
                warn!("GPU requested but no GPU backend was compiled in, falling back to CPU");
                Device::Cpu
            }),
            _ => gpu.unwrap_or(Device::Cpu),
        }
    }

    /// Number of layers handed to llama.cpp for offloading.
    pub fn gpu_layers(&self, config: &DeviceConfig) -> u32 {
        match self {
            Device::Cpu => 0,
            Device::Cuda | Device::Metal => config.gpu_layers,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Device::Cpu => "CPU",
            Device::Cuda => "CUDA",
            Device::Metal => "METAL",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(preference: &str) -> DeviceConfig {
        DeviceConfig {
            preference: preference.to_string(),
            gpu_layers: 40,
            use_mlock: false,
        }
    }

    const NONE: Backends = Backends { cuda: false, metal: false };
    const CUDA: Backends = Backends { cuda: true, metal: false };
    const METAL: Backends = Backends { cuda: false, metal: true };

    #[test]
    fn test_auto_prefers_gpu_when_available() {
        assert_eq!(Device::select(&config("auto"), CUDA), Device::Cuda);
        assert_eq!(Device::select(&config("auto"), METAL), Device::Metal);
        assert_eq!(Device::select(&config("auto"), Backends { cuda: true, metal: true }), Device::Cuda);
        assert_eq!(Device::select(&config("auto"), NONE), Device::Cpu);
    }

    #[test]
    fn test_cpu_preference_ignores_gpu() {
        assert_eq!(Device::select(&config("CPU"), CUDA), Device::Cpu);
    }

    #[test]
    fn test_gpu_preference_falls_back_to_cpu() {
        assert_eq!(Device::select(&config("gpu"), NONE), Device::Cpu);
        assert_eq!(Device::select(&config("gpu"), METAL), Device::Metal);
    }

    #[test]
    fn test_gpu_layers() {
        let cfg = config("auto");
        assert_eq!(Device::Cpu.gpu_layers(&cfg), 0);
        assert_eq!(Device::Cuda.gpu_layers(&cfg), 40);
        assert_eq!(Device::Metal.to_string(), "METAL");
    }
}
