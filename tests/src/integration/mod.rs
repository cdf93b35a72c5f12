//! Integration flows across the ledger session, identity, token, bridge and
//! reconciliation components.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod deposit_flows;
#[cfg(test)]
mod reconcile_flows;
#[cfg(test)]
mod token_flows;
#[cfg(test)]
mod withdrawal_flows;
