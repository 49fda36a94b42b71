//! Error taxonomy shared by every component (§7).
//!
//! Mirrors the shape of the teacher's `SaveError`: a flat `thiserror` enum
//! plus a small helper predicate callers use to decide whether to retry.

use thiserror::Error;

/// Machine-readable reason a tournament entry was rejected (§7, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotEligibleReason {
    WrongDivision,
    InsufficientCredits,
    InsufficientGems,
    RegistrationClosed,
    AlreadyEntered,
    MissingEntryItem,
    TournamentFull,
}

impl NotEligibleReason {
    /// The machine-readable code surfaced to HTTP callers, verbatim from §7.
    pub fn code(&self) -> &'static str {
        match self {
            Self::WrongDivision => "WRONG_DIVISION",
            Self::InsufficientCredits => "INSUFFICIENT_CREDITS",
            Self::InsufficientGems => "INSUFFICIENT_GEMS",
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::AlreadyEntered => "ALREADY_ENTERED",
            Self::MissingEntryItem => "MISSING_ENTRY_ITEM",
            Self::TournamentFull => "TOURNAMENT_FULL",
        }
    }
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("conflict: compare-and-set failed on {entity}")]
    Conflict { entity: String },

    #[error("not eligible: {0:?}")]
    NotEligible(NotEligibleReason),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Transient and Conflict errors are retried by the caller (§7); everything
    /// else is surfaced or logged-and-skipped.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::Conflict { .. })
    }

    pub fn not_eligible(reason: NotEligibleReason) -> Self {
        CoreError::NotEligible(reason)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Retries `f` up to `max_attempts` times while it returns a retryable error,
/// per the "caller retries ≤ 3×" contract in §4.2 and §7.
pub async fn retry_with_backoff<T, F, Fut>(max_attempts: u32, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                let backoff_ms = 10u64 * 2u64.pow(attempt.saturating_sub(1));
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                continue;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_eligible_reason_codes_match_spec() {
        assert_eq!(NotEligibleReason::WrongDivision.code(), "WRONG_DIVISION");
        assert_eq!(NotEligibleReason::InsufficientCredits.code(), "INSUFFICIENT_CREDITS");
        assert_eq!(NotEligibleReason::TournamentFull.code(), "TOURNAMENT_FULL");
    }

    #[test]
    fn retryable_classification() {
        assert!(CoreError::Transient("x".into()).is_retryable());
        assert!(CoreError::Conflict { entity: "Team".into() }.is_retryable());
        assert!(!CoreError::NotFound("x".into()).is_retryable());
        assert!(!CoreError::Integrity("x".into()).is_retryable());
    }

    #[tokio::test]
    async fn retry_with_backoff_gives_up_after_max_attempts() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(3, || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(CoreError::Transient("still down".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    }
}
