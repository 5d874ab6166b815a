pub mod asset_downloader;
pub mod etl;
pub mod pipeline;
pub mod rate_limiter;
pub mod trait_grouper;
pub mod unit_resolver;

pub use crate::domain::model::{PendingUnit, Trait, Unit};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
