use anchor_lang::prelude::*;

pub mod constants;
pub mod errors;
mod instructions;
pub mod settlement;
pub mod state;
pub mod vault;

use instructions::*;

declare_id!("BCJHzH9wtSAQncDeFmVVZnHdDEJdaLsznPPqE4cBJWn2");

#[program]
pub mod swap_escrow {
    use super::*;

    /// Create a new escrow: maker deposits Token A and sets exchange terms
    #[instruction(discriminator = 0)]
    pub fn make(ctx: Context<Make>, seed: u64, receive: u64, amount: u64) -> Result<()> {
        instructions::make::handler(ctx, seed, receive, amount)
    }

    /// Accept the escrow: taker sends Token B, receives Token A
    #[instruction(discriminator = 1)]
    pub fn take(ctx: Context<Take>) -> Result<()> {
        instructions::take::handler(ctx)
    }

    /// Refund the escrow: maker cancels and reclaims Token A
    #[instruction(discriminator = 2)]
    pub fn refund(ctx: Context<Refund>) -> Result<()> {
        instructions::refund::handler(ctx)
    }
}
