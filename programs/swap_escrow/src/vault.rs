use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::{create_idempotent, get_associated_token_address, AssociatedToken, Create},
    token::{
        self, close_account, transfer_checked, CloseAccount, Mint, Token, TokenAccount,
        TransferChecked,
    },
};

use crate::{
    constants::ESCROW_SEED,
    errors::EscrowError,
    settlement::{Holding, Leg},
};

/// Signing capability of an escrow's derived address.
///
/// Rebuilt from the record whenever the vault has to move funds. Nothing
/// about it is stored or secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VaultAuthority {
    maker: Pubkey,
    seed: [u8; 8],
    bump: [u8; 1],
}

impl VaultAuthority {
    pub fn new(maker: Pubkey, seed: u64, bump: u8) -> Self {
        Self {
            maker,
            seed: seed.to_le_bytes(),
            bump: [bump],
        }
    }

    pub fn signer_seeds(&self) -> [&[u8]; 4] {
        [ESCROW_SEED, self.maker.as_ref(), &self.seed, &self.bump]
    }

    /// The escrow address this capability signs for.
    pub fn address(&self) -> Result<Pubkey> {
        Pubkey::create_program_address(&self.signer_seeds(), &crate::ID)
            .map_err(|_| error!(EscrowError::AddressMismatch))
    }
}

/// Vault of `escrow` for `mint`: the escrow's associated token account.
pub fn vault_address(escrow: &Pubkey, mint: &Pubkey) -> Pubkey {
    get_associated_token_address(escrow, mint)
}

/// Validate raw vault state against the escrow it belongs to.
pub fn read_holding(
    owner: &Pubkey,
    data: &[u8],
    key: &Pubkey,
    escrow: &Pubkey,
    mint: &Pubkey,
) -> Result<Holding> {
    require_keys_eq!(*key, vault_address(escrow, mint), EscrowError::AddressMismatch);
    require!(
        *owner == token::ID && !data.is_empty(),
        EscrowError::EscrowNotFound
    );

    let account = TokenAccount::try_deserialize(&mut &data[..])?;
    require_keys_eq!(account.owner, *escrow, EscrowError::AddressMismatch);
    require_keys_eq!(account.mint, *mint, EscrowError::InvalidMint);

    Ok(Holding::of(&account))
}

pub fn load_holding(vault: &AccountInfo, escrow: &Pubkey, mint: &Pubkey) -> Result<Holding> {
    let data = vault.try_borrow_data()?;
    read_holding(vault.owner, &data[..], vault.key, escrow, mint)
}

/// Token accounts needed to move funds in or out of one vault.
pub struct Custody<'a, 'info> {
    pub vault: &'a AccountInfo<'info>,
    pub escrow: &'a AccountInfo<'info>,
    pub mint: &'a Account<'info, Mint>,
    pub token_program: &'a Program<'info, Token>,
}

impl<'a, 'info> Custody<'a, 'info> {
    /// Create the vault and move the deposit in under the maker's signature.
    pub fn open(
        &self,
        maker: &Signer<'info>,
        funding: &Account<'info, TokenAccount>,
        system_program: &Program<'info, System>,
        associated_token_program: &Program<'info, AssociatedToken>,
        deposit: Leg,
    ) -> Result<()> {
        require_keys_eq!(deposit.mint, self.mint.key(), EscrowError::InvalidMint);

        create_idempotent(CpiContext::new(
            associated_token_program.to_account_info(),
            Create {
                payer: maker.to_account_info(),
                associated_token: self.vault.clone(),
                authority: self.escrow.clone(),
                mint: self.mint.to_account_info(),
                system_program: system_program.to_account_info(),
                token_program: self.token_program.to_account_info(),
            },
        ))?;

        let cpi_accounts = TransferChecked {
            from: funding.to_account_info(),
            mint: self.mint.to_account_info(),
            to: self.vault.clone(),
            authority: maker.to_account_info(),
        };
        let cpi_ctx = CpiContext::new(self.token_program.to_account_info(), cpi_accounts);

        transfer_checked(cpi_ctx, deposit.amount, self.mint.decimals)
    }

    /// Pay the vault out to `destination` and close it.
    ///
    /// Only the derived authority signs; this is the sole outflow of a vault.
    pub fn release(
        &self,
        authority: &VaultAuthority,
        destination: &AccountInfo<'info>,
        rent_recipient: &AccountInfo<'info>,
        payout: Leg,
    ) -> Result<()> {
        require_keys_eq!(payout.mint, self.mint.key(), EscrowError::InvalidMint);

        let seeds = authority.signer_seeds();
        let signer_seeds: &[&[&[u8]]] = &[&seeds];

        let cpi_accounts = TransferChecked {
            from: self.vault.clone(),
            mint: self.mint.to_account_info(),
            to: destination.clone(),
            authority: self.escrow.clone(),
        };
        let cpi_program = self.token_program.to_account_info();
        let cpi_ctx = CpiContext::new_with_signer(cpi_program, cpi_accounts, signer_seeds);

        transfer_checked(cpi_ctx, payout.amount, self.mint.decimals)?;

        let cpi_accounts = CloseAccount {
            account: self.vault.clone(),
            destination: rent_recipient.clone(),
            authority: self.escrow.clone(),
        };
        let cpi_program = self.token_program.to_account_info();
        let cpi_ctx = CpiContext::new_with_signer(cpi_program, cpi_accounts, signer_seeds);

        close_account(cpi_ctx)
    }
}

#[cfg(test)]
mod tests {
    use anchor_lang::solana_program::program_pack::Pack;
    use anchor_spl::token::spl_token::state::{Account as SplAccount, AccountState};

    use super::*;
    use crate::{errors::assert_escrow_err, state::EscrowRecord};

    fn token_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
        let account = SplAccount {
            mint: *mint,
            owner: *owner,
            amount,
            state: AccountState::Initialized,
            ..SplAccount::default()
        };
        let mut data = vec![0u8; SplAccount::LEN];
        SplAccount::pack(account, &mut data).unwrap();
        data
    }

    #[test]
    fn authority_signs_for_the_record_address() {
        let maker = Pubkey::new_unique();
        let (escrow, bump) = EscrowRecord::derive_address(&maker, 11);
        let authority = VaultAuthority::new(maker, 11, bump);

        assert_eq!(authority.address().unwrap(), escrow);
        assert_eq!(authority.signer_seeds()[2], &11u64.to_le_bytes()[..]);
    }

    #[test]
    fn vault_is_per_escrow_and_mint() {
        let mint = Pubkey::new_unique();
        let (first, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 1);
        let (second, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 1);

        assert_eq!(vault_address(&first, &mint), vault_address(&first, &mint));
        assert_ne!(vault_address(&first, &mint), vault_address(&second, &mint));
        assert_ne!(
            vault_address(&first, &mint),
            vault_address(&first, &Pubkey::new_unique())
        );
    }

    #[test]
    fn read_holding_reports_vault_balance() {
        let mint = Pubkey::new_unique();
        let (escrow, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 5);
        let key = vault_address(&escrow, &mint);
        let data = token_account(&mint, &escrow, 1_000_000);

        let holding = read_holding(&token::ID, &data, &key, &escrow, &mint).unwrap();
        assert_eq!(
            holding,
            Holding {
                mint,
                amount: 1_000_000
            }
        );
    }

    #[test]
    fn closed_vault_reads_as_missing_escrow() {
        let mint = Pubkey::new_unique();
        let (escrow, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 5);
        let key = vault_address(&escrow, &mint);

        assert_escrow_err(
            read_holding(&anchor_lang::system_program::ID, &[], &key, &escrow, &mint),
            EscrowError::EscrowNotFound,
        );
    }

    #[test]
    fn foreign_token_account_is_rejected() {
        let mint = Pubkey::new_unique();
        let (escrow, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 5);
        let attacker = Pubkey::new_unique();
        let key = vault_address(&attacker, &mint);
        let data = token_account(&mint, &attacker, 1_000_000);

        assert_escrow_err(
            read_holding(&token::ID, &data, &key, &escrow, &mint),
            EscrowError::AddressMismatch,
        );
    }

    #[test]
    fn vault_of_another_mint_is_rejected() {
        let mint = Pubkey::new_unique();
        let (escrow, _) = EscrowRecord::derive_address(&Pubkey::new_unique(), 5);
        let key = vault_address(&escrow, &mint);
        let data = token_account(&Pubkey::new_unique(), &escrow, 1_000_000);

        assert_escrow_err(
            read_holding(&token::ID, &data, &key, &escrow, &mint),
            EscrowError::InvalidMint,
        );
    }
}
