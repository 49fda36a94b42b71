//! Pure eligibility check (§4.6): "team in correct division... sufficient
//! credits AND gems... registration open... not already entered... holds
//! entry item (daily cups)... tournament not full." Each violation maps to
//! a distinct [`NotEligibleReason`].

use crate::domain::{Team, Tournament, TournamentStatus};
use crate::error::{CoreError, NotEligibleReason, Result};
use chrono::{DateTime, Utc};

/// Whether the caller's team holds the one-per-team entry item required by
/// Daily Divisional Cups. Entry-item inventory belongs to the marketplace
/// system (Non-goal), so this is supplied by the caller rather than looked
/// up here.
pub fn check_eligibility(
    team: &Team,
    tournament: &Tournament,
    already_entered: bool,
    current_entry_count: usize,
    has_entry_item: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    if let Some(division) = tournament.division {
        if team.division != division {
            return Err(CoreError::not_eligible(NotEligibleReason::WrongDivision));
        }
    }

    if team.credits < tournament.entry_fee_credits {
        return Err(CoreError::not_eligible(NotEligibleReason::InsufficientCredits));
    }
    if team.gems < tournament.entry_fee_gems {
        return Err(CoreError::not_eligible(NotEligibleReason::InsufficientGems));
    }

    if tournament.status != TournamentStatus::RegistrationOpen || now >= tournament.registration_deadline {
        return Err(CoreError::not_eligible(NotEligibleReason::RegistrationClosed));
    }

    if already_entered {
        return Err(CoreError::not_eligible(NotEligibleReason::AlreadyEntered));
    }

    if tournament.requires_entry_item && !has_entry_item {
        return Err(CoreError::not_eligible(NotEligibleReason::MissingEntryItem));
    }

    if current_entry_count >= tournament.max_participants {
        return Err(CoreError::not_eligible(NotEligibleReason::TournamentFull));
    }

    Ok(())
}
