//! Compute device selection.
//!
//! Evaluation runs small forward passes, so every policy executes on the
//! host. The selected device is still threaded through to the policies so
//! runs are labelled consistently in logs and result files.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
}

impl Device {
    /// Picks CUDA only when it was requested and the environment actually
    /// advertises a visible GPU; otherwise falls back to the CPU.
    pub fn pick(use_gpu: bool) -> Device {
        if use_gpu && cuda_available() {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }
}

fn cuda_available() -> bool {
    matches!(std::env::var_os("CUDA_VISIBLE_DEVICES"), Some(v) if !v.is_empty())
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda:0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_when_gpu_not_requested() {
        assert_eq!(Device::pick(false), Device::Cpu);
    }

    #[test]
    fn display_names() {
        assert_eq!(Device::Cpu.to_string(), "cpu");
        assert_eq!(Device::Cuda.to_string(), "cuda:0");
    }
}
