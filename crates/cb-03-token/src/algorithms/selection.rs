//! Multi-Input Holding Selection
//!
//! Greedy, order-preserving: walk the holdings as the ledger returned them,
//! skip locked ones, pin the instrument of the first eligible holding and
//! accumulate until the running total covers the requested amount.

use crate::domain::{Holding, InstrumentId, TokenError, TokenResult};
use shared_types::{Amount, ContractId};
use tracing::warn;

/// Holdings chosen for a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    /// Selected holdings, in input order.
    pub contract_ids: Vec<ContractId>,
    /// Instrument shared by every selected holding.
    pub instrument: InstrumentId,
    /// Sum of the selected amounts (>= requested).
    pub total: Amount,
}

impl Selection {
    /// Amount left over for the sender after the transfer.
    pub fn change(&self, required: &Amount) -> Amount {
        self.total.saturating_sub(required)
    }
}

/// Select holdings covering `required`.
///
/// Fails with `InvalidAmount` for a non-positive request and with
/// `InsufficientBalance` when the unlocked holdings of the pinned instrument
/// fall short. Holdings with an unparseable amount are skipped.
pub fn select_holdings(holdings: &[Holding], required: &Amount) -> TokenResult<Selection> {
    if !required.is_positive() {
        return Err(TokenError::InvalidAmount(required.to_string()));
    }

    let mut instrument: Option<&InstrumentId> = None;
    let mut contract_ids = Vec::new();
    let mut total = Amount::zero();

    for holding in holdings {
        if holding.locked {
            continue;
        }
        if instrument.is_some_and(|pinned| pinned != &holding.instrument) {
            continue;
        }
        let amount = match holding.amount() {
            Ok(amount) => amount,
            Err(err) => {
                warn!(
                    contract_id = %holding.contract_id,
                    amount = %holding.amount,
                    error = %err,
                    "[cb-03] Skipping holding with invalid amount"
                );
                continue;
            }
        };

        instrument.get_or_insert(&holding.instrument);
        contract_ids.push(holding.contract_id.clone());
        total += &amount;

        if &total >= required {
            return Ok(Selection {
                contract_ids,
                instrument: holding.instrument.clone(),
                total,
            });
        }
    }

    Err(TokenError::InsufficientBalance {
        required: required.clone(),
        shortfall: required - &total,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(cid: &str, amount: &str) -> Holding {
        Holding {
            contract_id: cid.into(),
            issuer: "issuer".into(),
            owner: "alice".into(),
            amount: amount.into(),
            instrument: InstrumentId::new("issuer", "DEMO"),
            symbol: "DEMO".into(),
            locked: false,
        }
    }

    fn amount(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    #[test]
    fn test_selects_minimal_prefix() {
        let holdings = vec![holding("a", "30"), holding("b", "40"), holding("c", "50")];
        let selection = select_holdings(&holdings, &amount("65")).unwrap();
        assert_eq!(selection.contract_ids, vec!["a", "b"]);
        assert_eq!(selection.total, amount("70"));
        assert_eq!(selection.change(&amount("65")), amount("5"));
    }

    #[test]
    fn test_exact_cover() {
        let holdings = vec![holding("a", "30"), holding("b", "40")];
        let selection = select_holdings(&holdings, &amount("30")).unwrap();
        assert_eq!(selection.contract_ids, vec!["a"]);
        assert!(selection.change(&amount("30")).is_zero());
    }

    #[test]
    fn test_locked_never_selected() {
        let mut locked = holding("a", "100");
        locked.locked = true;
        let holdings = vec![locked, holding("b", "40"), holding("c", "50")];
        let selection = select_holdings(&holdings, &amount("60")).unwrap();
        assert_eq!(selection.contract_ids, vec!["b", "c"]);
    }

    #[test]
    fn test_instrument_pinned_by_first_eligible() {
        let mut other = holding("b", "100");
        other.instrument = InstrumentId::new("issuer", "OTHER");
        let holdings = vec![holding("a", "10"), other, holding("c", "20")];
        let selection = select_holdings(&holdings, &amount("25")).unwrap();
        assert_eq!(selection.contract_ids, vec!["a", "c"]);
        assert_eq!(selection.instrument, InstrumentId::new("issuer", "DEMO"));
    }

    #[test]
    fn test_insufficient_balance_reports_shortfall() {
        let holdings = vec![holding("a", "10"), holding("b", "5")];
        match select_holdings(&holdings, &amount("100")) {
            Err(TokenError::InsufficientBalance {
                required,
                total,
                shortfall,
            }) => {
                assert_eq!(required, amount("100"));
                assert_eq!(total, amount("15"));
                assert_eq!(shortfall, amount("85"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(matches!(
            select_holdings(&[holding("a", "10")], &Amount::zero()),
            Err(TokenError::InvalidAmount(_))
        ));

        let holdings = vec![holding("bad", "1.2.3"), holding("b", "10")];
        let selection = select_holdings(&holdings, &amount("10")).unwrap();
        assert_eq!(selection.contract_ids, vec!["b"]);
    }

    #[test]
    fn test_empty_holdings() {
        assert!(matches!(
            select_holdings(&[], &amount("1")),
            Err(TokenError::InsufficientBalance { .. })
        ));
    }
}
