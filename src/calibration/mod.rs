pub mod layout;
pub mod orchestrator;
pub mod sampler;

pub use layout::{point_index_for, resolve_layout, DEFAULT_LAYOUT};
pub use orchestrator::{CalibrationBatch, CalibrationError, CalibrationOrchestrator};
pub use sampler::{CalibrationSampler, SamplerConfig, SamplerError, TargetReport};
