//! NutriScan - On-device engine for circadian nutrient bioavailability
//!
//! NutriScan scores how efficiently a food's nutrients will be absorbed at the
//! time it is eaten. The scoring engine is a pure function:
//! nutrient profile + consumption time + circadian rules → score, where 100 is
//! the neutral baseline.
//!
//! ## Modules
//!
//! - **Engine**: Rule evaluation and the multiplicative score fold
//! - **Analysis**: Validation of the AI provider's untrusted JSON payload
//! - **Interactions**: Synergy/antagonism classification and graph layout
//! - **Pipeline**: Per-request orchestration over an injected provider

pub mod analysis;
pub mod engine;
pub mod error;
pub mod interactions;
pub mod pipeline;
pub mod record;
pub mod rules;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analysis::FoodAnalysis;
pub use engine::{score, BioavailabilityEngine, OUT_OF_WINDOW_PENALTY};
pub use error::{NutriError, ProviderError};
pub use interactions::{classify, InteractionCatalog, InteractionGraph};
pub use pipeline::{score_payload, AnalysisProvider, MealReport, ScoringPipeline};
pub use rules::RuleSet;
pub use types::{CircadianRule, InteractionType, Nutrient, NutrientProfile, Score};

/// Library version
pub const NUTRISCAN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name embedded in reports
pub const PRODUCER_NAME: &str = "nutriscan";
