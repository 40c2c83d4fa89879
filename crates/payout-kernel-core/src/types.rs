//! Strong type definitions for the Payout Kernel.
//!
//! Amounts and checkpoints are newtypes so they cannot be mixed up with
//! positions, counters or arbitrary hashes at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain tag prepended to every chain hash.
pub const LOG_DOMAIN: &[u8] = b"payout-log-v0:";

/// A payout amount in base units.
///
/// One whole unit is [`Amount::UNIT`] base units, so a cap of 1.5 is
/// `Amount(1_500_000_000)`.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u64);

impl Amount {
    /// Base units per whole unit.
    pub const UNIT: u64 = 1_000_000_000;

    pub const ZERO: Self = Self(0);

    pub const fn new(base_units: u64) -> Self {
        Self(base_units)
    }

    /// Whole units.
    ///
    /// # Panics
    ///
    /// If `whole` does not fit in `u64` base units. Use
    /// [`Amount::checked_units`] for values that are not constants.
    pub const fn units(whole: u64) -> Self {
        match Self::checked_units(whole) {
            Some(amount) => amount,
            None => panic!("whole units overflow u64 base units"),
        }
    }

    /// Whole plus thousandths, e.g. `Amount::milli_units(1_500)` is 1.5.
    ///
    /// # Panics
    ///
    /// If `milli` does not fit in `u64` base units.
    pub const fn milli_units(milli: u64) -> Self {
        match Self::checked_milli_units(milli) {
            Some(amount) => amount,
            None => panic!("milli units overflow u64 base units"),
        }
    }

    pub const fn checked_units(whole: u64) -> Option<Self> {
        match whole.checked_mul(Self::UNIT) {
            Some(base) => Some(Self(base)),
            None => None,
        }
    }

    pub const fn checked_milli_units(milli: u64) -> Option<Self> {
        match milli.checked_mul(Self::UNIT / 1_000) {
            Some(base) => Some(Self(base)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::UNIT;
        let frac = self.0 % Self::UNIT;
        if frac == 0 {
            write!(f, "{whole}")
        } else {
            let digits = format!("{frac:09}");
            write!(f, "{whole}.{}", digits.trim_end_matches('0'))
        }
    }
}

impl From<u64> for Amount {
    fn from(base_units: u64) -> Self {
        Self(base_units)
    }
}

/// A 32-byte content hash identifying a prefix of the action log.
///
/// `C_0` is [`Checkpoint::genesis`]; each appended entry extends the chain.
/// Checkpoints are compared bit-for-bit and used as lookup keys, never parsed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checkpoint(pub [u8; 32]);

impl Checkpoint {
    /// The checkpoint of the empty log.
    pub fn genesis() -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(LOG_DOMAIN);
        hasher.update(b"genesis");
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_genesis(&self) -> bool {
        *self == Self::genesis()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for Checkpoint {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Checkpoint {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Checkpoint {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}
