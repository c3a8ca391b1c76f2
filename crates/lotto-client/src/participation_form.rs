//! Number picker state for one participation.
//!
//! The form owns the selection and the latest eligibility check. A check is
//! only trusted while its key (numbers, account, chain, binding generation)
//! still matches the live session; anything else is treated as not checked.

use tracing::{debug, info};

use lotto_session_core::gateway::MSG_TX_CANCELLED;
use lotto_session_core::participation::{
    eligibility_key, is_complete, toggle_number, EligibilityKey, MAX_SELECTIONS,
};
use lotto_session_core::{
    ActiveChain, ClockPort, ContractGateway, CorrelationId, DryRunResult, NotifierPort,
    ParticipationRecord, RpcPort, Session, StoragePort, TxIntent, TxResult, WalletError,
    WalletPort,
};

#[derive(Debug, Clone, Default)]
pub struct ParticipationForm {
    selected: Vec<u8>,
    checked: Option<(EligibilityKey, DryRunResult)>,
    last_participation: Option<ParticipationRecord>,
    last_error: Option<String>,
}

impl ParticipationForm {
    pub fn selected(&self) -> &[u8] {
        &self.selected
    }

    pub fn last_participation(&self) -> Option<&ParticipationRecord> {
        self.last_participation.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn toggle(&mut self, number: u8) -> bool {
        let changed = toggle_number(&mut self.selected, number);
        if changed {
            self.last_error = None;
        }
        changed
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.checked = None;
    }

    /// The dry-run outcome for the current selection, if one was computed
    /// against the live session.
    pub fn eligibility(&self, session: &Session) -> Option<&DryRunResult> {
        let key = eligibility_key(&self.selected, session)?;
        match &self.checked {
            Some((checked, result)) if *checked == key => Some(result),
            _ => None,
        }
    }

    /// Custom error name of the latest failed check, e.g. `AlreadyParticipated`.
    pub fn eligibility_error(&self, session: &Session) -> Option<String> {
        self.eligibility(session)?.classified_error()
    }

    pub fn can_submit(&self, session: &Session) -> bool {
        self.eligibility(session).is_some_and(|r| r.success)
    }

    /// Re-runs the dry-run when the eligibility key changed since the last
    /// check. Results computed for a key that went stale meanwhile are
    /// dropped.
    pub async fn refresh_eligibility<W, S, R, N, C>(
        &mut self,
        gateway: &ContractGateway<W, S, R, N, C>,
    ) -> Result<Option<DryRunResult>, WalletError>
    where
        W: WalletPort,
        S: StoragePort,
        R: RpcPort,
        N: NotifierPort,
        C: ClockPort,
    {
        let session = gateway.session().snapshot()?;
        let Some(key) = eligibility_key(&self.selected, &session) else {
            self.checked = None;
            return Ok(None);
        };
        if let Some((checked, result)) = &self.checked {
            if *checked == key {
                return Ok(Some(result.clone()));
            }
        }

        let result = gateway.dry_run(&key.call()).await;

        let now = gateway.session().snapshot()?;
        let current = eligibility_key(&self.selected, &now);
        if current.as_ref() != Some(&key) || result.generation != key.generation {
            debug!(
                generation = result.generation,
                current = now.binding_generation,
                "discarding stale eligibility check"
            );
            self.checked = None;
            return Ok(None);
        }

        debug!(numbers = ?key.numbers, success = result.success, "eligibility checked");
        self.checked = Some((key, result.clone()));
        Ok(Some(result))
    }

    /// Sends the participation for the checked selection. On success the
    /// selection is cleared and the decoded participation is kept.
    pub async fn submit<W, S, R, N, C>(
        &mut self,
        gateway: &ContractGateway<W, S, R, N, C>,
        correlation_id: CorrelationId,
    ) -> Result<TxResult, WalletError>
    where
        W: WalletPort,
        S: StoragePort,
        R: RpcPort,
        N: NotifierPort,
        C: ClockPort,
    {
        let session = gateway.session().snapshot()?;
        let key = match eligibility_key(&self.selected, &session) {
            Some(key) => key,
            None if !session.is_connected() => return Err(WalletError::WalletNotConnected),
            None if !is_complete(&self.selected) => {
                return Err(WalletError::Unexpected(format!(
                    "selection has {} of {MAX_SELECTIONS} numbers",
                    self.selected.len()
                )))
            }
            None => {
                return Err(match session.active_chain {
                    ActiveChain::Unresolved(chain_id) => WalletError::ChainUnresolved(chain_id),
                    ActiveChain::Resolved(_) => WalletError::ProviderNotInitialized,
                })
            }
        };
        match self.eligibility(&session) {
            Some(result) if result.success => {}
            Some(result) => {
                return Err(result
                    .error
                    .clone()
                    .unwrap_or_else(|| WalletError::Unexpected("eligibility failed".to_owned())))
            }
            None => {
                return Err(WalletError::Unexpected(
                    "eligibility not checked for this selection".to_owned(),
                ))
            }
        }

        match gateway
            .submit_and_confirm(TxIntent::new(key.call(), correlation_id))
            .await
        {
            Ok(tx) => {
                info!(hash = %tx.hash, "participation confirmed");
                self.clear();
                self.last_error = None;
                self.last_participation = tx.participation.clone();
                Ok(tx)
            }
            Err(err) => {
                self.last_error = Some(match err {
                    WalletError::UserRejected => MSG_TX_CANCELLED.to_owned(),
                    ref other => other.user_message(),
                });
                Err(err)
            }
        }
    }
}
