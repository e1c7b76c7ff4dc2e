pub mod backoff;
pub mod boundary;
pub mod error;
pub mod guardian;
pub mod policy_expr;
pub mod rate_limit;

pub use backoff::delay_ms;
pub use boundary::{check_boundary, BoundaryOutcome, BoundaryViolation, RequestContext};
pub use error::GuardianError;
pub use guardian::{Guardian, GuardianOutcome, ProposedAction};
pub use policy_expr::{canonical_error, evaluate as evaluate_policy, Literal, PolicyError, PolicyErrorCode, PolicyExpr};
pub use rate_limit::RateLimiter;
