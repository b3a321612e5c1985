//! Detached-signature verification against the bundled keyring.
//!
//! Only the keyring shipped with the tool is consulted: `gpg` is told to
//! ignore the user's default keyring, and nothing is ever imported or
//! fetched from a keyserver.

use crate::error::{ForgeError, Result};
use crate::exec::{CommandExecutor, Invocation, combined_output};
use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;

/// File name of the keyring once copied into a workspace.
pub const WORKSPACE_KEYRING: &str = "trusted-keys.gpg";

/// The fixed set of public keys that authenticates source archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    keyring: Utf8PathBuf,
}

impl TrustAnchor {
    /// Refer to the keyring at `keyring`.
    #[must_use]
    pub fn new(keyring: impl Into<Utf8PathBuf>) -> Self {
        Self {
            keyring: keyring.into(),
        }
    }

    /// Location of the keyring file.
    #[must_use]
    pub fn keyring(&self) -> &Utf8Path {
        &self.keyring
    }

    /// Copy the keyring into `workspace` and return the copy's path.
    ///
    /// The original is only read.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::TrustAnchorMissing`] if the keyring does not
    /// exist, [`ForgeError::InvalidRequest`] if it lies inside `workspace`,
    /// or an I/O error if the copy fails.
    pub fn install_into(&self, workspace: &Utf8Path) -> Result<Utf8PathBuf> {
        self.ensure_present()?;
        self.ensure_outside(workspace)?;
        let copy = workspace.join(WORKSPACE_KEYRING);
        std::fs::copy(&self.keyring, &copy)?;
        Ok(copy)
    }

    /// Reject a keyring stored inside `workspace`, which is written to and
    /// may be deleted wholesale.
    ///
    /// Paths that exist are compared after resolving symlinks.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::InvalidRequest`] naming both paths.
    pub fn ensure_outside(&self, workspace: &Utf8Path) -> Result<()> {
        if resolved(&self.keyring).starts_with(resolved(workspace)) {
            return Err(ForgeError::InvalidRequest {
                reason: format!("keyring {} lies inside workspace {workspace}", self.keyring),
            });
        }
        Ok(())
    }

    /// Fail early when the keyring is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::TrustAnchorMissing`].
    pub fn ensure_present(&self) -> Result<()> {
        if self.keyring.is_file() {
            Ok(())
        } else {
            Err(ForgeError::TrustAnchorMissing {
                path: self.keyring.clone(),
            })
        }
    }
}

fn resolved(path: &Utf8Path) -> PathBuf {
    path.as_std_path()
        .canonicalize()
        .unwrap_or_else(|_| path.as_std_path().to_path_buf())
}

/// Checks detached signatures with `gpg` against one keyring.
pub struct SignatureVerifier<'a> {
    executor: &'a dyn CommandExecutor,
    keyring: &'a Utf8Path,
}

impl<'a> SignatureVerifier<'a> {
    /// Create a verifier that trusts only `keyring`.
    #[must_use]
    pub fn new(executor: &'a dyn CommandExecutor, keyring: &'a Utf8Path) -> Self {
        Self { executor, keyring }
    }

    /// The `gpg` command that checks `signature` over `archive`.
    #[must_use]
    pub fn invocation(&self, archive: &Utf8Path, signature: &Utf8Path) -> Invocation {
        Invocation::new("gpg").args([
            "--batch",
            "--no-default-keyring",
            "--keyring",
            self.keyring.as_str(),
            "--verify",
            signature.as_str(),
            archive.as_str(),
        ])
    }

    /// Verify `signature` over `archive`.
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::Authentication`] carrying gpg's output when the
    /// signature does not verify. The failure is never downgraded.
    pub fn verify(&self, archive: &Utf8Path, signature: &Utf8Path) -> Result<()> {
        let output = self.executor.run(&self.invocation(archive, signature))?;
        if !output.status.success() {
            return Err(ForgeError::Authentication {
                archive: archive.to_owned(),
                output: combined_output(&output),
            });
        }
        log::info!("verified signature of {archive}");
        Ok(())
    }
}
