/// Fixed-width 256-bit unsigned integer, four u64 limbs, little-endian.
///
/// Wide enough for the BN254 scalar field modulus with headroom for
/// carry-free comparison. All arithmetic is constant-width; nothing here
/// allocates.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct U256(pub [u64; 4]);

impl U256 {
    pub const ZERO: U256 = U256([0, 0, 0, 0]);
    pub const ONE: U256 = U256([1, 0, 0, 0]);

    pub fn from_u64(v: u64) -> Self {
        U256([v, 0, 0, 0])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0, 0, 0, 0]
    }

    /// Bit `i` (little-endian, 0 = least significant).
    pub fn bit(&self, i: usize) -> bool {
        (self.0[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Number of significant bits (0 for zero).
    pub fn bits(&self) -> usize {
        for limb in (0..4).rev() {
            if self.0[limb] != 0 {
                return limb * 64 + (64 - self.0[limb].leading_zeros() as usize);
            }
        }
        0
    }

    pub fn is_even(&self) -> bool {
        self.0[0] & 1 == 0
    }

    /// `self + rhs`, returning the sum modulo 2^256 and the carry-out.
    pub fn overflowing_add(self, rhs: U256) -> (U256, bool) {
        let mut out = [0u64; 4];
        let mut carry = false;
        for i in 0..4 {
            let (s1, c1) = self.0[i].overflowing_add(rhs.0[i]);
            let (s2, c2) = s1.overflowing_add(carry as u64);
            out[i] = s2;
            carry = c1 || c2;
        }
        (U256(out), carry)
    }

    /// `self - rhs`, returning the difference modulo 2^256 and the borrow-out.
    pub fn borrowing_sub(self, rhs: U256) -> (U256, bool) {
        let mut out = [0u64; 4];
        let mut borrow = false;
        for i in 0..4 {
            let (d1, b1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (d2, b2) = d1.overflowing_sub(borrow as u64);
            out[i] = d2;
            borrow = b1 || b2;
        }
        (U256(out), borrow)
    }

    pub fn wrapping_sub(self, rhs: U256) -> U256 {
        self.borrowing_sub(rhs).0
    }

    /// Logical right shift by one bit.
    pub fn shr1(self) -> U256 {
        let mut out = [0u64; 4];
        for i in 0..4 {
            out[i] = self.0[i] >> 1;
            if i < 3 {
                out[i] |= self.0[i + 1] << 63;
            }
        }
        U256(out)
    }

    /// `self mod m` by binary long division. `m` must be nonzero.
    pub fn rem(self, m: U256) -> U256 {
        if self < m {
            return self;
        }
        let mut r = U256::ZERO;
        for i in (0..self.bits()).rev() {
            // r = r * 2 + bit; one conditional subtraction keeps r < m
            let carry = r.bit(255);
            let mut shifted = [0u64; 4];
            for limb in 0..4 {
                shifted[limb] = r.0[limb] << 1;
                if limb > 0 {
                    shifted[limb] |= r.0[limb - 1] >> 63;
                }
            }
            shifted[0] |= self.bit(i) as u64;
            r = U256(shifted);
            if carry || r >= m {
                r = r.wrapping_sub(m);
            }
        }
        r
    }

    /// Parse a decimal string. Returns `None` on empty input, a non-digit
    /// character, or overflow past 2^256.
    pub fn from_dec(s: &str) -> Option<U256> {
        if s.is_empty() {
            return None;
        }
        let mut acc = U256::ZERO;
        for ch in s.bytes() {
            if !ch.is_ascii_digit() {
                return None;
            }
            let (times_ten, overflow) = acc.mul_u64(10);
            if overflow {
                return None;
            }
            let (next, carry) = times_ten.overflowing_add(U256::from_u64((ch - b'0') as u64));
            if carry {
                return None;
            }
            acc = next;
        }
        Some(acc)
    }

    /// `self * rhs` for a small multiplier, returning overflow past 2^256.
    fn mul_u64(self, rhs: u64) -> (U256, bool) {
        let mut out = [0u64; 4];
        let mut carry = 0u64;
        for i in 0..4 {
            let wide = self.0[i] as u128 * rhs as u128 + carry as u128;
            out[i] = wide as u64;
            carry = (wide >> 64) as u64;
        }
        (U256(out), carry != 0)
    }

    /// `(self / d, self % d)` for a small divisor. `d` must be nonzero.
    fn div_rem_u64(self, d: u64) -> (U256, u64) {
        let mut out = [0u64; 4];
        let mut rem = 0u128;
        for i in (0..4).rev() {
            let cur = (rem << 64) | self.0[i] as u128;
            out[i] = (cur / d as u128) as u64;
            rem = cur % d as u128;
        }
        (U256(out), rem as u64)
    }
}

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                std::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl std::fmt::Display for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let mut digits = Vec::new();
        let mut n = *self;
        while !n.is_zero() {
            let (q, r) = n.div_rem_u64(10);
            digits.push(b'0' + r as u8);
            n = q;
        }
        digits.reverse();
        f.write_str(std::str::from_utf8(&digits).unwrap())
    }
}

impl std::fmt::Debug for U256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "U256({})", self)
    }
}
