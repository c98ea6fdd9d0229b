use serde::{Deserialize, Serialize};

use super::PrimeField;

/// BabyBear prime: 15 * 2^27 + 1.
pub const MODULUS: u64 = 2_013_265_921;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BabyBear(pub u32);

impl PrimeField for BabyBear {
    const MODULUS: u64 = MODULUS;
    const ZERO: Self = BabyBear(0);
    const ONE: Self = BabyBear(1);

    fn from_u64(v: u64) -> Self {
        BabyBear((v % MODULUS) as u32)
    }

    fn to_u64(self) -> u64 {
        self.0 as u64
    }

    fn add(self, rhs: Self) -> Self {
        BabyBear(((self.0 as u64 + rhs.0 as u64) % MODULUS) as u32)
    }

    fn sub(self, rhs: Self) -> Self {
        BabyBear(((self.0 as u64 + MODULUS - rhs.0 as u64) % MODULUS) as u32)
    }

    fn mul(self, rhs: Self) -> Self {
        BabyBear(((self.0 as u64 * rhs.0 as u64) % MODULUS) as u32)
    }

    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            BabyBear((MODULUS - self.0 as u64) as u32)
        }
    }
}

impl std::fmt::Display for BabyBear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
