//! # podsplice core
//!
//! Size-preserving ad splicing:
//! - Bitrate planning against a byte budget
//! - Crossfaded insertion timeline (fixed-point ticks)
//! - Encoding engine contract and ffmpeg implementation
//! - Exact-size ID3v2 padding
//! - Bounded result cache
//! - Media catalog and configuration

pub mod asset;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod fade_curves;
pub mod padder;
pub mod planner;
pub mod splicer;
pub mod timeline;
pub mod timing;

pub use asset::{AudioAsset, AudioFormat};
pub use cache::{CacheStats, ResultCache};
pub use catalog::{FfprobeProber, MediaCatalog, MediaProber};
pub use config::Config;
pub use engine::{EncodeJob, EncodingEngine, FfmpegEngine, SplicePlan};
pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use padder::pad_to_exact_size;
pub use planner::{plan_bitrate, EncodingPlan};
pub use splicer::{SpliceSettings, Splicer};
pub use timeline::{SegmentRole, SpliceTimeline};
