//! Verification capability hook.
//!
//! Safety-relevant properties can carry a verification strategy (bit-flip
//! detection, shadow copies, whatever the integrator provides). The registry
//! only ever talks to it through this trait; no strategy is implemented
//! here. A property without a verifier is simply never verified.

/// Outcome of a verification pass, four-valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
	/// The value passed verification.
	Succeeded,
	/// The value failed verification.
	Failed,
	/// No verification has run (no verifier, or not yet initialized).
	Inactive,
	/// Verification was explicitly switched off by the caller.
	ManuallyDeactivated,
}

/// Verification strategy attached to a property cell.
///
/// All methods have no-op defaults so integrators implement only what their
/// strategy needs. Strategies that keep state use interior mutability; the
/// registry calls these through `&self`.
pub trait Verify {
	/// Actively verify the current value.
	fn verify(&self) -> VerificationStatus {
		VerificationStatus::Inactive
	}

	/// Hook invoked on every typed read of the value.
	fn verify_on_read(&self) {}

	/// Set the precision level for floating-point comparison; `None`
	/// restores the default precision.
	fn set_precision(&self, _precision: Option<f64>) {}

	/// Switch verification off until re-initialized.
	fn deactivate(&self) {}

	/// Result of the most recent verification, manual or automatic.
	fn last_status(&self) -> VerificationStatus {
		VerificationStatus::Inactive
	}

	/// Observe a committed value together with its origin.
	fn handle_value(&self, _file: &str, _section: &str, _key: &str, _encoded: &str) {}
}
