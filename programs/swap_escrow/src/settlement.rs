//! Validation half of make, take and refund.
//!
//! Each operation first turns read-only snapshots into a plan. Building the
//! plan performs every precondition check; instruction handlers only issue
//! transfers for a plan that was built successfully.

use anchor_lang::prelude::*;
use anchor_spl::token::TokenAccount;

use crate::{errors::EscrowError, state::EscrowRecord};

/// Balance of a token account at validation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Holding {
    pub mint: Pubkey,
    pub amount: u64,
}

impl Holding {
    pub fn of(account: &TokenAccount) -> Self {
        Self {
            mint: account.mint,
            amount: account.amount,
        }
    }

    /// A leg paying exactly `amount` of `mint` out of this holding.
    fn cover(&self, mint: &Pubkey, amount: u64) -> Result<Leg> {
        require_keys_eq!(self.mint, *mint, EscrowError::InvalidMint);
        require!(self.amount >= amount, EscrowError::InsufficientFunds);
        Ok(Leg {
            mint: *mint,
            amount,
        })
    }

    /// A leg paying out the whole holding.
    fn drain(&self, mint: &Pubkey) -> Result<Leg> {
        self.cover(mint, self.amount)
    }
}

/// One transfer of a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Leg {
    pub mint: Pubkey,
    pub amount: u64,
}

/// Validated terms of a new escrow.
#[derive(Debug, PartialEq, Eq)]
pub struct DepositPlan {
    pub receive: u64,
    pub deposit: Leg,
}

impl DepositPlan {
    pub fn prepare(
        receive: u64,
        deposit: u64,
        mint_a: &Pubkey,
        funding: Holding,
    ) -> Result<Self> {
        require_gt!(receive, 0, EscrowError::InvalidAmount);
        require_gt!(deposit, 0, EscrowError::InvalidAmount);

        Ok(Self {
            receive,
            deposit: funding.cover(mint_a, deposit)?,
        })
    }
}

/// Both legs of a take. Exists only when both can be paid.
#[derive(Debug, PartialEq, Eq)]
pub struct SwapPlan {
    /// Taker pays the maker `receive` of `mint_b`
    pub to_maker: Leg,
    /// Vault pays the taker its whole `mint_a` balance
    pub to_taker: Leg,
}

impl SwapPlan {
    pub fn prepare(
        record: &EscrowRecord,
        mint_a: &Pubkey,
        mint_b: &Pubkey,
        payment: Holding,
        vault: Holding,
    ) -> Result<Self> {
        record.validate_mints(mint_a, mint_b)?;
        require_keys_eq!(payment.mint, record.mint_b, EscrowError::MintMismatch);

        Ok(Self {
            to_maker: payment.cover(&record.mint_b, record.receive)?,
            to_taker: vault.drain(&record.mint_a)?,
        })
    }
}

/// Vault payout of a refund.
#[derive(Debug, PartialEq, Eq)]
pub struct RefundPlan {
    pub to_maker: Leg,
}

impl RefundPlan {
    pub fn prepare(
        record: &EscrowRecord,
        signer: &Pubkey,
        mint_a: &Pubkey,
        vault: Holding,
    ) -> Result<Self> {
        record.validate_maker(signer)?;
        require_keys_eq!(record.mint_a, *mint_a, EscrowError::MintMismatch);

        Ok(Self {
            to_maker: vault.drain(&record.mint_a)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::errors::assert_escrow_err;

    fn record(receive: u64) -> EscrowRecord {
        let maker = Pubkey::new_unique();
        let (_, bump) = EscrowRecord::derive_address(&maker, 1);
        EscrowRecord {
            seed: 1,
            maker,
            mint_a: Pubkey::new_unique(),
            mint_b: Pubkey::new_unique(),
            receive,
            bump,
        }
    }

    #[test]
    fn deposit_rejects_zero_amounts() {
        let mint = Pubkey::new_unique();
        let funding = Holding { mint, amount: 10 };

        for (receive, deposit) in [(0, 5), (5, 0), (0, 0)] {
            assert_escrow_err(
                DepositPlan::prepare(receive, deposit, &mint, funding),
                EscrowError::InvalidAmount,
            );
        }
    }

    #[test]
    fn deposit_checks_funding_mint_and_balance() {
        let mint = Pubkey::new_unique();

        let wrong_mint = Holding {
            mint: Pubkey::new_unique(),
            amount: 1_000_000,
        };
        assert_escrow_err(
            DepositPlan::prepare(2_000_000, 1_000_000, &mint, wrong_mint),
            EscrowError::InvalidMint,
        );

        let short = Holding {
            mint,
            amount: 999_999,
        };
        assert_escrow_err(
            DepositPlan::prepare(2_000_000, 1_000_000, &mint, short),
            EscrowError::InsufficientFunds,
        );

        let exact = Holding {
            mint,
            amount: 1_000_000,
        };
        let plan = DepositPlan::prepare(2_000_000, 1_000_000, &mint, exact).unwrap();
        assert_eq!(
            plan,
            DepositPlan {
                receive: 2_000_000,
                deposit: Leg {
                    mint,
                    amount: 1_000_000
                },
            }
        );
    }

    #[test]
    fn swap_rejects_swapped_mints() {
        let record = record(2_000_000);
        let payment = Holding {
            mint: record.mint_b,
            amount: 2_000_000,
        };
        let vault = Holding {
            mint: record.mint_a,
            amount: 1_000_000,
        };

        assert_escrow_err(
            SwapPlan::prepare(&record, &record.mint_b, &record.mint_a, payment, vault),
            EscrowError::MintMismatch,
        );
    }

    #[test]
    fn swap_requires_payment_in_mint_b() {
        let record = record(2_000_000);
        let payment = Holding {
            mint: record.mint_a,
            amount: u64::MAX,
        };
        let vault = Holding {
            mint: record.mint_a,
            amount: 1_000_000,
        };

        assert_escrow_err(
            SwapPlan::prepare(&record, &record.mint_a, &record.mint_b, payment, vault),
            EscrowError::MintMismatch,
        );
    }

    #[test]
    fn refund_is_maker_only() {
        let record = record(2_000_000);
        let vault = Holding {
            mint: record.mint_a,
            amount: 1_000_000,
        };

        assert_escrow_err(
            RefundPlan::prepare(&record, &Pubkey::new_unique(), &record.mint_a, vault),
            EscrowError::Unauthorized,
        );

        assert_escrow_err(
            RefundPlan::prepare(&record, &record.maker, &record.mint_b, vault),
            EscrowError::MintMismatch,
        );

        let plan = RefundPlan::prepare(&record, &record.maker, &record.mint_a, vault).unwrap();
        assert_eq!(
            plan.to_maker,
            Leg {
                mint: record.mint_a,
                amount: 1_000_000
            }
        );
    }

    proptest! {
        #[test]
        fn swap_moves_exactly_the_agreed_amounts(
            deposit in 1u64..,
            receive in 1u64..,
            surplus in 0u64..1_000_000,
        ) {
            let record = record(receive);
            let payment = Holding { mint: record.mint_b, amount: receive.saturating_add(surplus) };
            let vault = Holding { mint: record.mint_a, amount: deposit };

            let plan = SwapPlan::prepare(&record, &record.mint_a, &record.mint_b, payment, vault).unwrap();
            prop_assert_eq!(plan.to_maker, Leg { mint: record.mint_b, amount: receive });
            prop_assert_eq!(plan.to_taker, Leg { mint: record.mint_a, amount: deposit });
        }

        #[test]
        fn underfunded_taker_gets_no_leg_at_all(
            receive in 2u64..,
            shortfall in 1u64..,
            deposit in 1u64..,
        ) {
            let record = record(receive);
            let balance = receive.saturating_sub(shortfall).min(receive - 1);
            let payment = Holding { mint: record.mint_b, amount: balance };
            let vault = Holding { mint: record.mint_a, amount: deposit };

            let err = SwapPlan::prepare(&record, &record.mint_a, &record.mint_b, payment, vault).unwrap_err();
            prop_assert_eq!(
                ProgramError::from(err),
                ProgramError::Custom(EscrowError::InsufficientFunds.into())
            );
        }
    }
}
