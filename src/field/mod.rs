//! Prime field arithmetic for the constant interpreter.
//!
//! Circuits are written over BabyBear (p = 15 * 2^27 + 1). The interpreter
//! only folds ring operations, so the trait stops at `pow`.

pub mod babybear;

pub use babybear::BabyBear;

pub trait PrimeField: Copy + Eq + Ord + std::fmt::Debug {
    const MODULUS: u64;
    const ZERO: Self;
    const ONE: Self;

    /// Reduces `v` mod p.
    fn from_u64(v: u64) -> Self;
    fn to_u64(self) -> u64;

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn neg(self) -> Self;

    fn pow(self, mut exp: u64) -> Self {
        let (mut base, mut acc) = (self, Self::ONE);
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(base);
            }
            base = base.mul(base);
            exp >>= 1;
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Selector arithmetic the switch lowering relies on.
    fn selector_sums<F: PrimeField>() {
        let (s0, s1) = (F::ONE, F::ZERO);
        let arms = [F::from_u64(10), F::from_u64(20)];
        let picked = s0.mul(arms[0]).add(s1.mul(arms[1]));
        assert_eq!(picked, arms[0]);
        assert_eq!(F::ONE.sub(s0), F::ZERO);
    }

    fn wraps_at_modulus<F: PrimeField>() {
        let top = F::from_u64(F::MODULUS - 1);
        assert_eq!(top.add(F::ONE), F::ZERO);
        assert_eq!(F::ZERO.sub(F::ONE), top);
        assert_eq!(F::from_u64(F::MODULUS + 4).to_u64(), 4);
        assert_eq!(top.neg(), F::ONE);
        assert_eq!(F::ZERO.neg(), F::ZERO);
        assert_eq!(top.pow(2), F::ONE);
        assert_eq!(F::from_u64(7).pow(0), F::ONE);
    }

    #[test]
    fn babybear_selector_sums() {
        selector_sums::<BabyBear>();
    }

    #[test]
    fn babybear_wraps_at_modulus() {
        wraps_at_modulus::<BabyBear>();
    }
}
