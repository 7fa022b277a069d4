use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token::{transfer_checked, Mint, Token, TokenAccount, TransferChecked},
};

use crate::{
    errors::EscrowError,
    settlement::{Holding, SwapPlan},
    state::EscrowRecord,
    vault::{load_holding, Custody},
};

#[derive(Accounts)]
pub struct Take<'info> {
    /// The taker who accepts the exchange terms
    #[account(mut)]
    pub taker: Signer<'info>,

    /// The original maker, paid in Token B and refunded both rent deposits
    #[account(mut)]
    pub maker: SystemAccount<'info>,

    /// CHECK: decoded and checked against its derived address by
    /// `EscrowRecord::load`; closed by the handler.
    #[account(mut)]
    pub escrow: UncheckedAccount<'info>,

    /// Token A mint
    pub mint_a: Box<Account<'info, Mint>>,

    /// Token B mint
    pub mint_b: Box<Account<'info, Mint>>,

    /// CHECK: validated against the record by `vault::load_holding`.
    #[account(mut)]
    pub vault: UncheckedAccount<'info>,

    /// Taker's associated token account for Token A (receives Token A)
    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = mint_a,
        associated_token::authority = taker,
    )]
    pub taker_ata_a: Box<Account<'info, TokenAccount>>,

    /// Taker's token account paying Token B
    #[account(
        mut,
        token::authority = taker,
    )]
    pub taker_ata_b: Box<Account<'info, TokenAccount>>,

    /// Maker's associated token account for Token B (receives Token B)
    #[account(
        init_if_needed,
        payer = taker,
        associated_token::mint = mint_b,
        associated_token::authority = maker,
    )]
    pub maker_ata_b: Box<Account<'info, TokenAccount>>,

    pub associated_token_program: Program<'info, AssociatedToken>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

impl<'info> Take<'info> {
    /// Load the escrow and validate both legs before anything moves
    pub fn settle_terms(&self) -> Result<(EscrowRecord, SwapPlan)> {
        let record = EscrowRecord::load(&self.escrow)?;
        record.verify_address(&self.escrow.key())?;
        require_keys_eq!(record.maker, self.maker.key(), EscrowError::InvalidMaker);

        let vault = load_holding(&self.vault, &self.escrow.key(), &record.mint_a)?;
        let plan = SwapPlan::prepare(
            &record,
            &self.mint_a.key(),
            &self.mint_b.key(),
            Holding::of(&self.taker_ata_b),
            vault,
        )?;

        Ok((record, plan))
    }

    /// Pay the maker, empty the vault to the taker, close vault and record
    pub fn swap(&mut self, record: &EscrowRecord, plan: SwapPlan) -> Result<()> {
        let cpi_accounts = TransferChecked {
            from: self.taker_ata_b.to_account_info(),
            mint: self.mint_b.to_account_info(),
            to: self.maker_ata_b.to_account_info(),
            authority: self.taker.to_account_info(),
        };
        let cpi_program = self.token_program.to_account_info();
        let cpi_ctx = CpiContext::new(cpi_program, cpi_accounts);

        transfer_checked(cpi_ctx, plan.to_maker.amount, self.mint_b.decimals)?;

        let custody = Custody {
            vault: &self.vault,
            escrow: &self.escrow,
            mint: &self.mint_a,
            token_program: &self.token_program,
        };
        custody.release(
            &record.authority(),
            &self.taker_ata_a.to_account_info(),
            &self.maker.to_account_info(),
            plan.to_taker,
        )?;

        EscrowRecord::close(&self.escrow.to_account_info(), &self.maker.to_account_info())
    }
}

/// Handler for the take instruction
pub fn handler(ctx: Context<Take>) -> Result<()> {
    let (record, plan) = ctx.accounts.settle_terms()?;
    let (paid, released) = (plan.to_maker.amount, plan.to_taker.amount);

    ctx.accounts.swap(&record, plan)?;

    msg!(
        "escrow {} taken by {}: {} paid, {} released",
        ctx.accounts.escrow.key(),
        ctx.accounts.taker.key(),
        paid,
        released
    );
    Ok(())
}
