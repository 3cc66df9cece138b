use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Low bits reserved for ids handed out within the same millisecond.
const SEQUENCE_BITS: u32 = 12;

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one websocket connection.
///
/// Ids are derived from the wall clock in milliseconds and strictly increase within the
/// process, so no id is ever handed out twice. They print as short base-62 tokens.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    pub fn next() -> Self {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or_default();
        let floor = now << SEQUENCE_BITS;

        let previous = LAST_ID
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| Some(floor.max(last + 1)))
            .unwrap_or_else(|last| last);
        SocketId(floor.max(previous + 1))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = [0u8; 11];
        let mut value = self.0;
        let mut start = digits.len();
        loop {
            start -= 1;
            digits[start] = ALPHABET[(value % 62) as usize];
            value /= 62;
            if value == 0 {
                break;
            }
        }
        // digits only holds ASCII from ALPHABET
        f.write_str(std::str::from_utf8(&digits[start..]).map_err(|_| fmt::Error)?)
    }
}
