//! Pluggable generation of session codes and session keys.
//!
//! The manager never decides HOW codes are made. It asks a
//! [`CodeGenerator`] for the next value, so production can use the OS
//! random source while tests pin the output to a known string.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::GenerationError;

/// Produces unique, opaque strings on demand.
///
/// Used for both session ids (returned to the browser as the code) and
/// session keys. Production implementations must be unpredictable.
///
/// # Example
///
/// ```rust
/// use passage_session::{CodeGenerator, GenerationError};
///
/// /// Hands out codes from a fixed list, then fails.
/// struct Scripted(std::sync::Mutex<Vec<&'static str>>);
///
/// impl CodeGenerator for Scripted {
///     fn generate(&self) -> Result<String, GenerationError> {
///         self.0
///             .lock()
///             .map_err(|_| GenerationError::new("poisoned"))?
///             .pop()
///             .map(str::to_owned)
///             .ok_or_else(|| GenerationError::new("script exhausted"))
///     }
/// }
///
/// let g = Scripted(std::sync::Mutex::new(vec!["b", "a"]));
/// assert_eq!(g.generate().unwrap(), "a");
/// assert_eq!(g.generate().unwrap(), "b");
/// assert!(g.generate().is_err());
/// ```
pub trait CodeGenerator: Send + Sync + 'static {
    /// Returns the next value.
    ///
    /// # Errors
    /// [`GenerationError`] if no value could be produced (entropy source
    /// unavailable, test script exhausted, ...).
    fn generate(&self) -> Result<String, GenerationError>;
}

// ---------------------------------------------------------------------------
// RandomCodeGenerator
// ---------------------------------------------------------------------------

/// Default number of random bytes per code (256 bits).
pub const DEFAULT_CODE_BYTES: usize = 32;

/// Reads bytes from the operating system's CSPRNG and hex-encodes them.
#[derive(Debug, Clone, Copy)]
pub struct RandomCodeGenerator {
    bytes: usize,
}

impl RandomCodeGenerator {
    /// Creates a generator producing `bytes` random bytes per code
    /// (`2 * bytes` hex characters).
    pub fn new(bytes: usize) -> Self {
        Self { bytes }
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_BYTES)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> Result<String, GenerationError> {
        if self.bytes == 0 {
            return Err(GenerationError::new("code length must be non-zero"));
        }
        let mut buf = vec![0u8; self.bytes];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| GenerationError::new(e.to_string()))?;
        Ok(buf.iter().map(|b| format!("{b:02x}")).collect())
    }
}

// ---------------------------------------------------------------------------
// StaticCodeGenerator
// ---------------------------------------------------------------------------

/// Always returns the same string. For tests only.
#[derive(Debug, Clone)]
pub struct StaticCodeGenerator(String);

impl StaticCodeGenerator {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl CodeGenerator for StaticCodeGenerator {
    fn generate(&self) -> Result<String, GenerationError> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------------
// SequenceCodeGenerator
// ---------------------------------------------------------------------------

/// Returns `prefix-1`, `prefix-2`, ... For tests that need distinct but
/// predictable values.
#[derive(Debug)]
pub struct SequenceCodeGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequenceCodeGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl CodeGenerator for SequenceCodeGenerator {
    fn generate(&self) -> Result<String, GenerationError> {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        Ok(format!("{}-{n}", self.prefix))
    }
}
