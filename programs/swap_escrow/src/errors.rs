use anchor_lang::prelude::*;

#[error_code]
pub enum EscrowError {
    #[msg("Invalid amount: amount must be greater than zero")]
    InvalidAmount,
    #[msg("Insufficient funds: source balance is below the requested transfer")]
    InsufficientFunds,
    #[msg("Duplicate escrow: an escrow already exists for this maker and seed")]
    DuplicateEscrow,
    #[msg("Escrow not found: no open escrow at this address")]
    EscrowNotFound,
    #[msg("Mint mismatch: supplied mints disagree with the escrow terms")]
    MintMismatch,
    #[msg("Unauthorized: signer is not allowed to perform this operation")]
    Unauthorized,
    #[msg("Invalid mint: token account holds a different mint")]
    InvalidMint,
    #[msg("Invalid maker: maker does not match escrow maker")]
    InvalidMaker,
    #[msg("Address mismatch: account is not at its derived address")]
    AddressMismatch,
}

/// Fails the calling test unless `result` is the escrow error `expected`.
#[cfg(test)]
#[track_caller]
pub(crate) fn assert_escrow_err<T: std::fmt::Debug>(result: Result<T>, expected: EscrowError) {
    let err = result.expect_err("operation should have failed");
    assert_eq!(
        ProgramError::from(err),
        ProgramError::Custom(expected.into())
    );
}
