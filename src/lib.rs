pub mod config;
pub mod error;
pub mod interactive;
pub mod media;
pub mod pipeline;
pub mod recognize;
pub mod sampler;

pub use config::Config;
pub use error::{ClipmatchError, Result};
pub use pipeline::{
    identify_asset, identify_clip, print_summary, PipelineConfig, PipelineResult, PipelineStats,
};
pub use recognize::{best_of, AcrCloudClient, Credentials, MatchCandidate};
pub use sampler::{sample, SamplingPolicy, SegmentWindow};
