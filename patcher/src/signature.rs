//! Detached signature verification for downloaded artifacts.
//!
//! A payload `X` is accompanied by its armoured signature `X.asc`. The
//! verifier reads both and hands the bytes to a [`VerificationBackend`].
//! Verification is advisory: callers log the outcome and carry on.

use std::io::Write;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::command::{describe_failure, run_with_input};

/// Extension appended to a payload's file name to locate its signature.
pub const SIGNATURE_EXTENSION: &str = "asc";

/// Checks a payload against a detached signature.
#[cfg_attr(test, mockall::automock)]
pub trait VerificationBackend {
    /// Returns true only if `signature` is a valid signature over `payload`.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;

    /// Returns true if this backend never verifies anything.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Backend used when verification is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBackend;

impl VerificationBackend for NoopBackend {
    fn verify(&self, _payload: &[u8], _signature: &[u8]) -> bool {
        warn!("no signature verification backend is configured; treating signature as unverified");
        false
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Verifies signatures with GnuPG against the user's keyring.
#[derive(Debug, Clone)]
pub struct GpgBackend {
    program: String,
    timeout: Duration,
}

impl GpgBackend {
    /// Use `program` (usually `gpg`), killing it after `timeout`.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn run(&self, payload: &[u8], signature: &[u8]) -> std::io::Result<bool> {
        let mut sig_file = NamedTempFile::new()?;
        sig_file.write_all(signature)?;
        sig_file.flush()?;
        let sig_path = sig_file.path().to_string_lossy().into_owned();

        let args = ["--batch", "--verify", sig_path.as_str(), "-"];
        match run_with_input(&self.program, &args, Some(payload.to_vec()), Some(self.timeout)) {
            Ok(output) if output.status.success() => Ok(true),
            Ok(output) => {
                debug!("{} rejected signature: {}", self.program, describe_failure(&output));
                Ok(false)
            }
            Err(e) => Err(std::io::Error::other(e.to_string())),
        }
    }
}

impl VerificationBackend for GpgBackend {
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
        self.run(payload, signature).unwrap_or_else(|e| {
            warn!("could not run {}: {e}", self.program);
            false
        })
    }
}

/// Verifies payloads on disk against their sibling `.asc` files.
pub struct SignatureVerifier {
    backend: Box<dyn VerificationBackend>,
}

impl SignatureVerifier {
    /// Wrap `backend`.
    #[must_use]
    pub fn new(backend: Box<dyn VerificationBackend>) -> Self {
        Self { backend }
    }

    /// A verifier that never verifies.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Box::new(NoopBackend))
    }

    /// Returns true unless the backend is the no-op backend.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.backend.is_noop()
    }

    /// Path of the detached signature for `payload`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use revanced_assist::signature::SignatureVerifier;
    ///
    /// let sig = SignatureVerifier::signature_path(Utf8Path::new("tools/revanced-cli-4.6.0.jar"));
    /// assert_eq!(sig.as_str(), "tools/revanced-cli-4.6.0.jar.asc");
    /// ```
    #[must_use]
    pub fn signature_path(payload: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{payload}.{SIGNATURE_EXTENSION}"))
    }

    /// Verify `payload` against its detached signature.
    ///
    /// Returns false when the signature is missing, a file cannot be read,
    /// or the backend rejects the pair. Never retries.
    #[must_use]
    pub fn verify(&self, payload: &Utf8Path) -> bool {
        let sig_path = Self::signature_path(payload);
        let payload_bytes = match std::fs::read(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("cannot read {payload} for verification: {e}");
                return false;
            }
        };
        let signature = match std::fs::read(&sig_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("no usable signature {sig_path} for {payload}: {e}");
                return false;
            }
        };
        self.backend.verify(&payload_bytes, &signature)
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn store() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        (dir, root)
    }

    #[test]
    fn backend_receives_payload_and_signature_bytes() {
        let (_dir, root) = store();
        let payload = root.join("revanced-cli-4.6.0.jar");
        std::fs::write(&payload, b"jar bytes").expect("payload");
        std::fs::write(SignatureVerifier::signature_path(&payload), b"sig bytes").expect("sig");

        let mut backend = MockVerificationBackend::new();
        backend
            .expect_verify()
            .with(eq(b"jar bytes".to_vec()), eq(b"sig bytes".to_vec()))
            .times(1)
            .returning(|_, _| true);
        backend.expect_is_noop().return_const(false);

        let verifier = SignatureVerifier::new(Box::new(backend));
        assert!(verifier.is_enabled());
        assert!(verifier.verify(&payload));
    }

    #[test]
    fn missing_signature_fails_closed_without_consulting_backend() {
        let (_dir, root) = store();
        let payload = root.join("revanced-patches-4.10.0.jar");
        std::fs::write(&payload, b"jar").expect("payload");

        let mut backend = MockVerificationBackend::new();
        backend.expect_verify().never();
        let verifier = SignatureVerifier::new(Box::new(backend));
        assert!(!verifier.verify(&payload));
    }

    #[test]
    fn missing_payload_fails_closed() {
        let verifier = SignatureVerifier::disabled();
        assert!(!verifier.verify(Utf8Path::new("/nonexistent/revanced-cli-1.0.0.jar")));
    }

    #[test]
    fn noop_backend_always_rejects_and_logs() {
        let mut logger = logtest::Logger::start();
        assert!(!NoopBackend.verify(b"payload", b"signature"));

        let mut warned = false;
        while let Some(record) = logger.pop() {
            if record
                .args()
                .to_string()
                .contains("no signature verification backend")
            {
                warned = true;
            }
        }
        assert!(warned, "expected a warning about the missing backend");
    }

    #[test]
    fn disabled_verifier_reports_itself() {
        assert!(!SignatureVerifier::disabled().is_enabled());
    }

    #[test]
    fn unlaunchable_gpg_is_treated_as_unverified() {
        let backend = GpgBackend::new("definitely-not-gpg-7f3a", Duration::from_secs(5));
        assert!(!backend.verify(b"payload", b"signature"));
    }
}
