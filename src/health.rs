//! Health status reports emitted per call by the health-reporting layer.

// self
use crate::_prelude::*;

/// Callback invoked for every health report.
pub type HealthListener = Arc<dyn Fn(&HealthReport) + Send + Sync>;

/// Binary health status of the wrapped source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthStatus {
	/// The wrapped source answered the call.
	Healthy,
	/// The wrapped source failed the call.
	NotHealthy,
}

/// Outcome of a single call through the health-reporting layer.
///
/// Health is observed per call; there is no background polling. The constructors uphold the
/// invariant that a healthy report carries no error.
#[derive(Clone, Debug)]
pub struct HealthReport {
	/// Observed status.
	pub status: HealthStatus,
	/// Failure behind an unhealthy report.
	pub error: Option<Arc<Error>>,
	/// Caller-supplied epoch-millisecond time of the observation.
	pub timestamp: i64,
	/// Context of the call that produced the report.
	pub context: SecurityContext,
}
impl HealthReport {
	/// Report a successful call.
	pub fn healthy(timestamp: i64, context: &SecurityContext) -> Self {
		Self { status: HealthStatus::Healthy, error: None, timestamp, context: context.clone() }
	}

	/// Report a failed call.
	pub fn unhealthy(error: Arc<Error>, timestamp: i64, context: &SecurityContext) -> Self {
		Self {
			status: HealthStatus::NotHealthy,
			error: Some(error),
			timestamp,
			context: context.clone(),
		}
	}

	/// Whether the report is healthy.
	pub fn is_healthy(&self) -> bool {
		self.status == HealthStatus::Healthy
	}
}
