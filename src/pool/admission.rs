//! Memory-pressure admission control for new browser launches
//!
//! Reusing a pooled browser is always allowed; only the creation of a new
//! one is gated. The controller reads a pressure metric through a
//! [`MemoryProbe`] and denies admission at or above the configured
//! threshold. When the probe itself fails the controller fails open:
//! a broken metric must not starve the pool.

use std::sync::Mutex;
use sysinfo::{Pid, System};
use tracing::warn;

use crate::config::PoolConfig;

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A new browser may be launched
    Allowed,
    /// Launching is refused; `reason` describes the pressure condition
    Denied { reason: String },
}

/// Source of the memory-pressure metric
pub trait MemoryProbe: Send + Sync + 'static {
    /// Current memory utilization as a percentage in `0.0..=100.0`
    fn utilization_percent(&self) -> anyhow::Result<f32>;
}

/// Whole-system RAM utilization via sysinfo
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    #[must_use]
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn utilization_percent(&self) -> anyhow::Result<f32> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("memory probe mutex poisoned"))?;
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            anyhow::bail!("system reports zero total memory");
        }
        Ok((system.used_memory() as f64 / total as f64 * 100.0) as f32)
    }
}

/// Process RSS measured against an externally supplied ceiling.
///
/// For container platforms that cap the process without exposing host
/// metrics; the ceiling typically comes from the platform environment
/// (e.g. a dyno's advertised memory quota).
pub struct ProcessCeilingProbe {
    system: Mutex<System>,
    pid: Pid,
    ceiling_bytes: u64,
}

impl ProcessCeilingProbe {
    pub fn new(ceiling_bytes: u64) -> anyhow::Result<Self> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| anyhow::anyhow!("could not determine current pid: {e}"))?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
            ceiling_bytes,
        })
    }
}

impl MemoryProbe for ProcessCeilingProbe {
    fn utilization_percent(&self) -> anyhow::Result<f32> {
        if self.ceiling_bytes == 0 {
            anyhow::bail!("memory ceiling is zero");
        }
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow::anyhow!("memory probe mutex poisoned"))?;
        system.refresh_process(self.pid);
        let process = system
            .process(self.pid)
            .ok_or_else(|| anyhow::anyhow!("process {} not visible to sysinfo", self.pid))?;
        Ok((process.memory() as f64 / self.ceiling_bytes as f64 * 100.0) as f32)
    }
}

/// Decides whether a new browser launch is admitted under current pressure
pub struct AdmissionController {
    probe: Box<dyn MemoryProbe>,
    threshold_percent: f32,
}

impl AdmissionController {
    /// Build a controller from pool configuration.
    ///
    /// A configured memory ceiling selects the process-local probe;
    /// otherwise whole-system utilization is used.
    pub fn from_config(config: &PoolConfig) -> Self {
        let probe: Box<dyn MemoryProbe> = match config.memory_ceiling_bytes {
            Some(ceiling) => match ProcessCeilingProbe::new(ceiling) {
                Ok(probe) => Box::new(probe),
                Err(e) => {
                    warn!("Process memory probe unavailable ({e}), falling back to system probe");
                    Box::new(SystemMemoryProbe::new())
                }
            },
            None => Box::new(SystemMemoryProbe::new()),
        };
        Self::with_probe(probe, config.memory_threshold_percent)
    }

    /// Build a controller with an explicit probe and threshold
    pub fn with_probe(probe: Box<dyn MemoryProbe>, threshold_percent: f32) -> Self {
        Self {
            probe,
            threshold_percent,
        }
    }

    /// Check whether a new browser may be launched right now.
    ///
    /// Fails open on probe errors: a wrong deny would starve the pool for
    /// as long as telemetry stays broken, while a wrong allow only risks
    /// transient pressure.
    pub fn may_admit(&self) -> Admission {
        match self.probe.utilization_percent() {
            Ok(percent) if percent >= self.threshold_percent => Admission::Denied {
                reason: format!(
                    "memory utilization {percent:.1}% at or above threshold {:.1}%",
                    self.threshold_percent
                ),
            },
            Ok(_) => Admission::Allowed,
            Err(e) => {
                warn!("Memory check failed: {e:#}. Admitting anyway.");
                Admission::Allowed
            }
        }
    }
}
