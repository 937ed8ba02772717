pub mod chain;
pub mod executor;
pub mod parser;

pub use chain::Chain;
pub use executor::{run_pipeline, run_pipeline_file, validate_pipeline_file, Pipeline};
pub use parser::{load_pipeline, parse_all, validate_pipeline, Expression, IntoExpressions, PipelineFile};
