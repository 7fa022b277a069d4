/// Seed prefix of every escrow record address.
pub const ESCROW_SEED: &[u8] = b"escrow";
