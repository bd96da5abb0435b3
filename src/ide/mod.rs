//! Usage search on top of the semantic model.
//!
//! A search runs in four stages:
//!
//! 1. **Query**: parse the query string and bind it to a declared symbol
//! 2. **Filter**: cheap text scan that drops files which cannot reference it
//! 3. **Visit**: walk each candidate AST, resolving names and tracing values
//! 4. **Score**: grade every site `CERTAIN`, `PROBABLE`, `POSSIBLE` or `DYNAMIC`
//!
//! ## Usage
//!
//! Everything goes through [`AnalysisHost`]:
//!
//! ```ignore
//! use usages::ide::AnalysisHost;
//!
//! let mut host = AnalysisHost::new();
//! host.set_file(front_end.parse("src/Widget.php")?);
//!
//! let analysis = host.analysis();
//! let result = analysis.find_usages("App\\Widget")?;
//! ```

mod analysis;
mod config;
mod filter;
mod query;
mod score;
mod trace;
mod visitor;

pub use analysis::{Analysis, AnalysisHost, ContextWindow, ScoredUsage, SearchError, SearchResult};
pub use config::SearchConfig;
pub use filter::{Patterns, filter_candidates};
pub use query::{ParsedQuery, Query, QueryError, parse_query};
pub use score::{Confidence, score};
pub use trace::{Env, Origin, Value};
pub use visitor::{
    ANONYMOUS_CLASS, Evidence, MemberEvidence, RawUsage, Resolution, UsageKind, UsageSink,
    UsageVisitor,
};
