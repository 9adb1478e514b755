//! dcintel planner: chains catalog calls into a cross-border due-diligence run
//!
//! The planner turns a list of target countries into a dependency-free call
//! set, fans it out through one shared [`Dispatcher`](dcintel_dispatch::Dispatcher)
//! under a session deadline, and drives the analysis stages over whatever
//! arrived.
//!
//! ```ignore
//! use dcintel_planner::{Planner, PlannerConfig, Target};
//!
//! let config = PlannerConfig::load(None)?;
//! let planner = Planner::new(config, transport)?;
//! let report = planner.run(&[Target::country("DE")?, Target::country("SG")?]).await?;
//! ```

pub mod config;
pub mod error;
pub mod plan;
pub mod report;
pub mod run;

pub use config::{plannable, AuthScheme, PlannerConfig};
pub use error::{ConfigError, RunError, TargetError};
pub use plan::{plan, PlannedCall, Site, Target};
pub use report::AnalysisReport;
pub use run::Planner;
