//! Daily allowance reset. Runs as a long-lived background task; the last
//! reset date is persisted in the meta table so a restart across midnight
//! still triggers exactly one reset.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

use crate::ledger::{Ledger, LedgerError, META_LAST_RESET};

const CHECK_INTERVAL: Duration = Duration::from_secs(3600);

pub struct ResetSchedule {
    pub timezone: Tz,
    pub allowance: f64,
    /// Operator account and its allowance multiplier.
    pub admin: Option<(i64, f64)>,
}

pub async fn run(ledger: Arc<Ledger>, schedule: ResetSchedule) {
    loop {
        if let Err(e) = tick(&ledger, &schedule).await {
            tracing::error!("Daily reset check failed: {e}");
        }
        tokio::time::sleep(CHECK_INTERVAL).await;
    }
}

/// A reset is due only when a marker exists and names a different date. An
/// absent marker means a fresh deployment; the first tick records today
/// without resetting anything.
pub(crate) fn should_reset(last_reset: Option<NaiveDate>, today: NaiveDate) -> bool {
    match last_reset {
        Some(last) => last != today,
        None => false,
    }
}

async fn tick(ledger: &Ledger, schedule: &ResetSchedule) -> Result<(), LedgerError> {
    let today = Utc::now().with_timezone(&schedule.timezone).date_naive();
    let last_reset = ledger
        .meta_get(META_LAST_RESET)
        .await?
        .and_then(|raw| raw.parse::<NaiveDate>().ok());

    if should_reset(last_reset, today) {
        ledger.reset_usage(schedule.allowance).await?;
        if let Some((admin_id, multiplier)) = schedule.admin {
            ledger
                .set_usage_balance(admin_id, schedule.allowance * multiplier)
                .await?;
        }
        ledger.meta_set(META_LAST_RESET, &today.to_string()).await?;
        tracing::info!("Usage balances reset for {today}");
    } else if last_reset.is_none() {
        ledger.meta_set(META_LAST_RESET, &today.to_string()).await?;
    }

    Ok(())
}
