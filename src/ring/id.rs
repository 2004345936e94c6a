use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;

/// Width of the identifier space in bits.
pub const ID_BITS: usize = 160;
const ID_BYTES: usize = ID_BITS / 8;

/// A point on the ring.
///
/// Stored big-endian so that the derived `Ord` matches numeric order.
/// Serialised as a 40 character hex string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RingId(pub [u8; ID_BYTES]);

impl RingId {
    pub const ZERO: RingId = RingId([0u8; ID_BYTES]);
    pub const MAX: RingId = RingId([0xffu8; ID_BYTES]);

    /// Hashes an address or key into the ring. Stable across calls and processes.
    pub fn hash(input: &str) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(input.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Returns `(self + 2^exp) mod 2^160`.
    pub fn add_pow2(&self, exp: usize) -> Self {
        debug_assert!(exp < ID_BITS);
        let mut out = self.0;
        let mut idx = ID_BYTES - 1 - exp / 8;
        let mut carry = 1u16 << (exp % 8);

        loop {
            let sum = out[idx] as u16 + carry;
            out[idx] = sum as u8;
            carry = sum >> 8;
            if carry == 0 || idx == 0 {
                break;
            }
            idx -= 1;
        }

        Self(out)
    }
}

/// Circular interval membership: is `x` in `(start, end)`, or `(start, end]`
/// when `inclusive_end` is set?
///
/// When `start >= end` the interval wraps through zero. `start == end` denotes
/// the whole ring except `start` itself (plus `end` when inclusive, i.e. the
/// whole ring).
pub fn between(start: &RingId, x: &RingId, end: &RingId, inclusive_end: bool) -> bool {
    if inclusive_end && x == end {
        return true;
    }
    if start < end {
        start < x && x < end
    } else {
        x > start || x < end
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 8 hex digits are plenty to tell nodes apart in logs
        write!(f, "RingId({}..)", &hex::encode(&self.0[..4]))
    }
}

impl From<RingId> for String {
    fn from(id: RingId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RingId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&value).map_err(|e| format!("invalid ring id {value:?}: {e}"))?;
        let bytes: [u8; ID_BYTES] = bytes
            .try_into()
            .map_err(|_| format!("ring id {value:?} is not {ID_BYTES} bytes"))?;
        Ok(Self(bytes))
    }
}
