use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token::{Mint, Token, TokenAccount},
};

use crate::{
    errors::EscrowError,
    settlement::{DepositPlan, Holding, Leg},
    state::EscrowRecord,
    vault::{vault_address, Custody},
};

#[derive(Accounts)]
pub struct Make<'info> {
    /// The maker who sets exchange terms and deposits Token A
    #[account(mut)]
    pub maker: Signer<'info>,

    /// CHECK: must be the vacant record address derived from `maker` and
    /// `seed`; allocated by the handler.
    #[account(mut)]
    pub escrow: UncheckedAccount<'info>,

    /// Token A mint (the token the maker will deposit)
    pub mint_a: Account<'info, Mint>,

    /// Token B mint (the token the maker wants to receive)
    pub mint_b: Account<'info, Mint>,

    /// Maker's token account funding the deposit
    #[account(
        mut,
        token::authority = maker,
    )]
    pub maker_ata_a: Account<'info, TokenAccount>,

    /// CHECK: must be the escrow's associated token account for `mint_a`;
    /// created by the handler.
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

impl<'info> Make<'info> {
    /// Check the record and vault addresses, then write the escrow terms
    pub fn init_escrow(&mut self, seed: u64, receive: u64) -> Result<Pubkey> {
        let maker = self.maker.key();
        let (address, bump) = EscrowRecord::derive_address(&maker, seed);
        require_keys_eq!(self.escrow.key(), address, EscrowError::AddressMismatch);
        require_keys_eq!(
            self.vault.key(),
            vault_address(&address, &self.mint_a.key()),
            EscrowError::AddressMismatch
        );
        EscrowRecord::ensure_vacant(self.escrow.owner, &self.escrow.try_borrow_data()?[..])?;

        let record = EscrowRecord {
            seed,
            maker,
            mint_a: self.mint_a.key(),
            mint_b: self.mint_b.key(),
            receive,
            bump,
        };
        record.create(
            &self.escrow.to_account_info(),
            &self.maker.to_account_info(),
            &self.system_program.to_account_info(),
        )?;

        Ok(address)
    }

    /// Open the vault and move Token A into it
    pub fn deposit(&mut self, deposit: Leg) -> Result<()> {
        let custody = Custody {
            vault: &self.vault,
            escrow: &self.escrow,
            mint: &self.mint_a,
            token_program: &self.token_program,
        };

        custody.open(
            &self.maker,
            &self.maker_ata_a,
            &self.system_program,
            &self.associated_token_program,
            deposit,
        )
    }
}

/// Handler for the make instruction
pub fn handler(ctx: Context<Make>, seed: u64, receive: u64, amount: u64) -> Result<()> {
    let plan = DepositPlan::prepare(
        receive,
        amount,
        &ctx.accounts.mint_a.key(),
        Holding::of(&ctx.accounts.maker_ata_a),
    )?;

    let escrow = ctx.accounts.init_escrow(seed, plan.receive)?;
    ctx.accounts.deposit(plan.deposit)?;

    msg!(
        "escrow {} opened: {} deposited for {}",
        escrow,
        plan.deposit.amount,
        plan.receive
    );
    Ok(())
}
