//! Boy or Girl? - name to gender prediction service
//!
//! Free text naming one or more people goes in; a deduplicated prediction
//! table and a ranked bar chart come out, both derived from the same cycle.
//!
//! # Architecture
//!
//! ```text
//! raw text
//!     │
//!     ▼
//! ┌──────────────────────────────────────────┐
//! │  input::parse_names                      │
//! │  \w+ tokens, first 10 kept               │
//! └──────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌──────────────────────────────────────────┐
//! │  PredictionService (shared, read-only)   │
//! │  bounded by a timeout                    │
//! └──────────────────────────────────────────┘
//!     │
//!     ▼
//! ┌──────────────────────────────────────────┐
//! │  aggregate::aggregate                    │
//! │  full-row dedup, first occurrence wins   │
//! └──────────────────────────────────────────┘
//!     │
//!     ├──► TableView ──► SubmissionOrderStore (publish order)
//!     │                         │
//!     ▼                         ▼
//! ┌──────────────────────────────────────────┐
//! │  ChartSpec (rows + stored order)         │
//! └──────────────────────────────────────────┘
//!     │
//!     ▼
//! Session commit (table + chart in one write)
//! ```

pub mod aggregate;
pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod input;
pub mod pipeline;
pub mod prediction;
pub mod session;
pub mod table;

pub use aggregate::{aggregate, Aggregated};
pub use chart::ChartSpec;
pub use config::AppConfig;
pub use error::{ConfigError, PipelineError, PredictError, TableError};
pub use input::{parse_names, ParsedInput, MAX_CANDIDATES};
pub use pipeline::SubmissionPipeline;
pub use prediction::{Label, Prediction, PredictionService, SuffixModelPredictor};
pub use session::{CycleView, Session, SessionRegistry};
pub use table::{TablePage, TableQuery, TableView};
