use anchor_lang::{
    prelude::*,
    system_program::{
        allocate, assign, create_account, transfer, Allocate, Assign, CreateAccount, Transfer,
    },
};

use crate::{constants::ESCROW_SEED, errors::EscrowError, vault::VaultAuthority};

/// Terms of one open trade, stored at `["escrow", maker, seed]`.
///
/// Written once by `make` and never mutated; `take` or `refund` closes it.
#[account(discriminator = 1)]
#[derive(InitSpace, Debug, PartialEq, Eq)]
pub struct EscrowRecord {
    /// Maker-chosen nonce, lets one maker keep several escrows open
    pub seed: u64,
    /// The maker's wallet address (creator of the escrow)
    pub maker: Pubkey,
    /// Mint deposited into the vault
    pub mint_a: Pubkey,
    /// Mint the maker wants in return
    pub mint_b: Pubkey,
    /// Amount of `mint_b` that releases the deposit
    pub receive: u64,
    /// Canonical bump of the record address
    pub bump: u8,
}

impl EscrowRecord {
    /// Account size including the discriminator.
    pub const SPACE: usize = Self::DISCRIMINATOR.len() + Self::INIT_SPACE;

    /// Address and canonical bump of the record for `(maker, seed)`.
    ///
    /// Clients can compute this offline to find an escrow without a lookup.
    pub fn derive_address(maker: &Pubkey, seed: u64) -> (Pubkey, u8) {
        Pubkey::find_program_address(
            &[ESCROW_SEED, maker.as_ref(), &seed.to_le_bytes()],
            &crate::ID,
        )
    }

    /// Derived signing capability of this record, used for the vault and
    /// for allocating the record itself.
    pub fn authority(&self) -> VaultAuthority {
        VaultAuthority::new(self.maker, self.seed, self.bump)
    }

    /// Check that `key` is this record's own derived address.
    pub fn verify_address(&self, key: &Pubkey) -> Result<()> {
        let derived = self.authority().address()?;
        require_keys_eq!(derived, *key, EscrowError::AddressMismatch);
        Ok(())
    }

    pub fn validate_mints(&self, mint_a: &Pubkey, mint_b: &Pubkey) -> Result<()> {
        require!(
            self.mint_a == *mint_a && self.mint_b == *mint_b,
            EscrowError::MintMismatch
        );
        Ok(())
    }

    pub fn validate_maker(&self, signer: &Pubkey) -> Result<()> {
        require_keys_eq!(self.maker, *signer, EscrowError::Unauthorized);
        Ok(())
    }

    /// Fails unless nothing has been written at the record address yet.
    pub fn ensure_vacant(owner: &Pubkey, data: &[u8]) -> Result<()> {
        require!(
            *owner != crate::ID && data.is_empty(),
            EscrowError::DuplicateEscrow
        );
        Ok(())
    }

    /// Decode a record from raw account state.
    ///
    /// Anything that is not a live, program-owned record reads as absent.
    pub fn load_from(owner: &Pubkey, data: &[u8]) -> Result<Self> {
        require_keys_eq!(*owner, crate::ID, EscrowError::EscrowNotFound);
        require!(
            data.starts_with(Self::DISCRIMINATOR),
            EscrowError::EscrowNotFound
        );
        Self::try_deserialize(&mut &data[..])
    }

    pub fn load(info: &AccountInfo) -> Result<Self> {
        let data = info.try_borrow_data()?;
        Self::load_from(info.owner, &data[..])
    }

    /// Allocate the record account at its derived address and write `self`.
    ///
    /// Lamports already sitting at the address are topped up to rent
    /// exemption instead of failing the create.
    pub fn create<'info>(
        &self,
        record: &AccountInfo<'info>,
        payer: &AccountInfo<'info>,
        system_program: &AccountInfo<'info>,
    ) -> Result<()> {
        let authority = self.authority();
        let seeds = authority.signer_seeds();
        let signer_seeds: &[&[&[u8]]] = &[&seeds];

        let space = Self::SPACE as u64;
        let rent = Rent::get()?.minimum_balance(Self::SPACE);
        let current = record.lamports();

        if current == 0 {
            create_account(
                CpiContext::new_with_signer(
                    system_program.clone(),
                    CreateAccount {
                        from: payer.clone(),
                        to: record.clone(),
                    },
                    signer_seeds,
                ),
                rent,
                space,
                &crate::ID,
            )?;
        } else {
            let top_up = rent.saturating_sub(current);
            if top_up > 0 {
                transfer(
                    CpiContext::new(
                        system_program.clone(),
                        Transfer {
                            from: payer.clone(),
                            to: record.clone(),
                        },
                    ),
                    top_up,
                )?;
            }
            allocate(
                CpiContext::new_with_signer(
                    system_program.clone(),
                    Allocate {
                        account_to_allocate: record.clone(),
                    },
                    signer_seeds,
                ),
                space,
            )?;
            assign(
                CpiContext::new_with_signer(
                    system_program.clone(),
                    Assign {
                        account_to_assign: record.clone(),
                    },
                    signer_seeds,
                ),
                &crate::ID,
            )?;
        }

        let mut data = record.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        self.try_serialize(&mut writer)
    }

    /// Close the record, sending its rent to `destination`.
    ///
    /// The account is left system-owned and empty, so its address reads as
    /// vacant again for the rest of the transaction.
    pub fn close<'info>(
        record: &AccountInfo<'info>,
        destination: &AccountInfo<'info>,
    ) -> Result<()> {
        let credited = destination
            .lamports()
            .checked_add(record.lamports())
            .ok_or(ProgramError::ArithmeticOverflow)?;

        **destination.try_borrow_mut_lamports()? = credited;
        **record.try_borrow_mut_lamports()? = 0;

        record.assign(&anchor_lang::system_program::ID);
        record.resize(0).map_err(Into::into)
    }
}
