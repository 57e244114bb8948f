//! # Login Verification Codes
//!
//! Second factor for the login flow.
//!
//! - User posts username + password, we mail a 6-digit numeric code to the address on file
//! - Code is kept as a string so leading zeroes survive
//! - Each digit is drawn on its own from the OS random source (no formatting of one big integer)
//! - Codes live for 5 minutes and can be redeemed exactly once
//! - Asking again overwrites the previous code for that address
//!
//! ## Storage
//!
//! In-process map behind one mutex, keyed by the recipient's email. Redemption checks and deletes
//! inside a single lock acquisition so two concurrent requests can never both succeed.
//!
//! A background sweeper removes expired entries every minute. It is started explicitly and stops
//! when its [`SweeperHandle`] is stopped or dropped.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{RngCore, rngs::OsRng};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};
use tracing::{debug, warn};

use crate::error::AppError;

pub const CODE_LENGTH: usize = 6;
pub const CODE_TTL: Duration = Duration::from_secs(5 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Largest multiple of 10 that fits in a byte. Bytes at or above it are
/// discarded so every digit stays uniform.
const DIGIT_CUTOFF: u8 = 250;

pub trait RandomSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error>;
}

pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        OsRng.try_fill_bytes(dest)
    }
}

struct VerificationEntry {
    code: String,
    expires_at: Instant,
}

pub struct VerificationStore {
    entries: Mutex<HashMap<String, VerificationEntry>>,
    random: Box<dyn RandomSource>,
    ttl: Duration,
}

impl Default for VerificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VerificationStore {
    pub fn new() -> Self {
        Self::with_random(OsRandom)
    }

    pub fn with_random(random: impl RandomSource + 'static) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            random: Box::new(random),
            ttl: CODE_TTL,
        }
    }

    /// Issues a fresh code for `recipient_key`, replacing any earlier one.
    pub fn issue_code(&self, recipient_key: &str) -> Result<String, AppError> {
        let code = self.generate()?;

        let entry = VerificationEntry {
            code: code.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.lock().insert(recipient_key.to_string(), entry);

        Ok(code)
    }

    /// True at most once per issued code. Unknown key, expired entry and wrong
    /// code all look the same to the caller.
    pub fn redeem_code(&self, recipient_key: &str, supplied_code: &str) -> bool {
        let mut entries = self.lock();

        let valid = entries.get(recipient_key).is_some_and(|entry| {
            Instant::now() <= entry.expires_at && codes_match(&entry.code, supplied_code)
        });

        if valid {
            entries.remove(recipient_key);
        }

        valid
    }

    /// Drops expired entries, returns how many went away.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();

        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);

        before - entries.len()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn start_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        let store = Arc::clone(self);
        let (stop, mut stopped) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            debug!(removed, "Swept expired verification codes");
                        }
                    }
                }
            }
        });

        SweeperHandle { stop, task }
    }

    fn generate(&self) -> Result<String, AppError> {
        let mut code = String::with_capacity(CODE_LENGTH);
        let mut buffer = [0u8; 16];

        while code.len() < CODE_LENGTH {
            self.random.fill(&mut buffer)?;

            for byte in buffer {
                if byte < DIGIT_CUTOFF && code.len() < CODE_LENGTH {
                    code.push(char::from(b'0' + byte % 10));
                }
            }
        }

        Ok(code)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VerificationEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Compares without bailing out on the first differing byte.
fn codes_match(expected: &str, supplied: &str) -> bool {
    if expected.len() != supplied.len() {
        return false;
    }

    expected
        .bytes()
        .zip(supplied.bytes())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

pub struct SweeperHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        let _ = self.stop.send(());

        if let Err(e) = self.task.await {
            warn!("Verification sweeper ended abnormally: {e}");
        }
    }
}
