pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod intake;
pub mod normalize;
pub mod pipeline;
pub mod preprocess;
pub mod storage;

pub use codec::Decimal;
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{
    InferenceError, NormalizeError, PreprocessError, Result, ScanpipeError, StoreError,
};
pub use pipeline::{JobOutcome, Orchestrator, UploadEvent};
pub use storage::FsObjectStore;
