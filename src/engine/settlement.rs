use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::identity::{Identity, Role};
use crate::state::AppState;
use crate::store::Collection;

/// Bounded retries against concurrent balance movement before giving up.
const SETTLE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReceipt {
    pub vendor_id: Uuid,
    pub amount: f64,
    pub total_withdrawn: f64,
}

/// Zeroes the vendor's accrued commission and credits lifetime withdrawn by
/// the same amount. The write is a compare-and-swap on the balance read, so
/// two concurrent settlements cannot both clear the same money; the loser
/// retries against the fresh balance or surfaces `Conflict`.
pub fn settle(
    state: &AppState,
    actor: &Identity,
    vendor_id: Uuid,
) -> Result<SettlementReceipt, AppError> {
    if !actor.role.is_admin() && actor.id != vendor_id {
        return Err(AppError::WriteDenied(
            "only admins or the vendor can settle commission".to_string(),
        ));
    }

    for _ in 0..SETTLE_ATTEMPTS {
        let vendor: Identity = state.store.get_as(Collection::Users, vendor_id)?;
        if vendor.role != Role::Vendor {
            return Err(AppError::ValidationFailed(
                "account is not a vendor".to_string(),
            ));
        }

        let balance = vendor.commission_balance.unwrap_or(0.0);
        if balance <= 0.0 {
            return Err(AppError::ValidationFailed(
                "no commission to settle".to_string(),
            ));
        }
        let total = vendor.total_withdrawn.unwrap_or(0.0) + balance;

        match state.store.update_if(
            Collection::Users,
            vendor_id,
            "commission_balance",
            &json!(balance),
            json!({ "commission_balance": 0.0, "total_withdrawn": total }),
        ) {
            Ok(()) => {
                state
                    .metrics
                    .settlements_total
                    .with_label_values(&["success"])
                    .inc();
                info!(vendor_id = %vendor_id, amount = balance, "commission settled");
                return Ok(SettlementReceipt {
                    vendor_id,
                    amount: balance,
                    total_withdrawn: total,
                });
            }
            Err(AppError::Conflict(_)) => {
                warn!(vendor_id = %vendor_id, "settlement lost a balance race; retrying");
                continue;
            }
            Err(err) => {
                state
                    .metrics
                    .settlements_total
                    .with_label_values(&["error"])
                    .inc();
                return Err(err);
            }
        }
    }

    state
        .metrics
        .settlements_total
        .with_label_values(&["error"])
        .inc();
    Err(AppError::Conflict(
        "settlement kept losing the balance race".to_string(),
    ))
}
