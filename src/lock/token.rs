/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 17/10/26
******************************************************************************/

//! Holder tokens.

use std::fmt;

/// Opaque proof of lease ownership returned by
/// [`DistributedLock::try_lock`](super::DistributedLock::try_lock).
///
/// Tokens are unique per acquisition: a process-wide random prefix followed by
/// a per-lock acquisition counter. Presenting the token is the only way to
/// release the lease early.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub(crate) fn new(value: String) -> Self {
        Self(value)
    }

    /// The value stored in the lease key.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
