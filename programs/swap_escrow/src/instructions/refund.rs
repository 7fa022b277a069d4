use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token::{Mint, Token, TokenAccount},
};

use crate::{
    settlement::RefundPlan,
    state::EscrowRecord,
    vault::{load_holding, Custody},
};

#[derive(Accounts)]
pub struct Refund<'info> {
    /// The maker who originally created the escrow (can refund)
    #[account(mut)]
    pub maker: Signer<'info>,

    /// CHECK: decoded and checked against its derived address by
    /// `EscrowRecord::load`; closed by the handler.
    #[account(mut)]
    pub escrow: UncheckedAccount<'info>,

    /// Token A mint
    pub mint_a: Account<'info, Mint>,

    /// CHECK: validated against the record by `vault::load_holding`.
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,

    /// Maker's associated token account for Token A (receives refund)
    #[account(
        init_if_needed,
        payer = maker,
        associated_token::mint = mint_a,
        associated_token::authority = maker,
    )]
    pub maker_ata_a: Account<'info, TokenAccount>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

impl<'info> Refund<'info> {
    /// Load the escrow and confirm the signer owns it
    pub fn refund_terms(&self) -> Result<(EscrowRecord, RefundPlan)> {
        let record = EscrowRecord::load(&self.escrow)?;
        record.verify_address(&self.escrow.key())?;

        let vault = load_holding(&self.vault, &self.escrow.key(), &record.mint_a)?;
        let plan = RefundPlan::prepare(&record, &self.maker.key(), &self.mint_a.key(), vault)?;

        Ok((record, plan))
    }

    /// Return all Token A to the maker and close vault and record
    pub fn refund_and_close_vault(
        &mut self,
        record: &EscrowRecord,
        plan: RefundPlan,
    ) -> Result<()> {
        let custody = Custody {
            vault: &self.vault,
            escrow: &self.escrow,
            mint: &self.mint_a,
            token_program: &self.token_program,
        };
        custody.release(
            &record.authority(),
            &self.maker_ata_a.to_account_info(),
            &self.maker.to_account_info(),
            plan.to_maker,
        )?;

        EscrowRecord::close(&self.escrow.to_account_info(), &self.maker.to_account_info())
    }
}

/// Handler for the refund instruction
pub fn handler(ctx: Context<Refund>) -> Result<()> {
    let (record, plan) = ctx.accounts.refund_terms()?;
    let refunded = plan.to_maker.amount;

    ctx.accounts.refund_and_close_vault(&record, plan)?;

    msg!("escrow {} refunded: {} returned", ctx.accounts.escrow.key(), refunded);
    Ok(())
}
