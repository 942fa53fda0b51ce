//! Shared configuration constants and helpers.

use std::path::Path;

/// Protocol and deployment defaults.
pub mod defaults {
    use std::time::Duration;

    pub const ORCHESTRATOR_HOST: &str = "localhost";
    pub const ORCHESTRATOR_PORT: u16 = 8080;
    /// Port an extension server listens on unless told otherwise.
    pub const EXTENSION_PORT: u16 = 8888;
    /// Hostname an extension advertises in its callback URL.
    pub const EXTENSION_HOSTNAME: &str = "localhost";
    /// Self-registration retries after the first failed attempt.
    pub const REGISTRATION_MAX_RETRIES: u32 = 10;
    pub const REGISTRATION_RETRY_DELAY: Duration = Duration::from_secs(5);
    pub const WORKER_POOL_SIZE: usize = 10;
    pub const MAX_CALL_DEPTH: u32 = 8;
    pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;
    pub const SECRET_FILE: &str = ".secret";
}

/// Environment variable names.
pub mod env_vars {
    pub const PORT: &str = "BABYLON_PORT";
    pub const HOSTNAME: &str = "BABYLON_HOSTNAME";
    pub const ORCHESTRATOR_HOST: &str = "BABYLON_ORCHESTRATOR_HOST";
    pub const ORCHESTRATOR_PORT: &str = "BABYLON_ORCHESTRATOR_PORT";
    pub const WORKER_POOL_SIZE: &str = "BABYLON_WORKER_POOL_SIZE";
    pub const MAX_CALL_DEPTH: &str = "BABYLON_MAX_CALL_DEPTH";
    pub const LOG_JSON: &str = "BABYLON_LOG_JSON";
    pub const SECRET: &str = "BABYLON_SECRET";
    pub const SECRET_FILE: &str = "BABYLON_SECRET_FILE";
}

/// Header carrying the nesting depth of a re-entrant call.
pub const CALL_DEPTH_HEADER: &str = "x-babylon-call-depth";

/// Resolve the shared secret an extension presents to the orchestrator.
///
/// `BABYLON_SECRET` wins when set and non-blank, then the trimmed content of
/// the file named by `BABYLON_SECRET_FILE` (default `.secret`), then `fallback`.
pub fn resolve_secret(fallback: &str) -> String {
    resolve_secret_from(
        std::env::var(env_vars::SECRET).ok(),
        std::env::var(env_vars::SECRET_FILE).ok(),
        fallback,
    )
}

/// [`resolve_secret`] with the environment passed in explicitly.
pub fn resolve_secret_from(
    secret: Option<String>,
    secret_file: Option<String>,
    fallback: &str,
) -> String {
    if let Some(secret) = secret.filter(|s| !s.trim().is_empty()) {
        return secret;
    }

    let path = secret_file.unwrap_or_else(|| defaults::SECRET_FILE.to_string());
    match read_secret_file(Path::new(&path)) {
        Some(secret) => secret,
        None => {
            tracing::debug!(category = "config", path = %path, "No secret configured, using fallback");
            fallback.to_string()
        }
    }
}

fn read_secret_file(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|content| content.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_secret_wins() {
        let secret = resolve_secret_from(Some("abc".into()), Some("/nonexistent".into()), "dflt");
        assert_eq!(secret, "abc");
    }

    #[test]
    fn test_secret_file_is_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        let path = file.path().to_string_lossy().to_string();

        assert_eq!(resolve_secret_from(Some("   ".into()), Some(path), "dflt"), "from-file");
    }

    #[test]
    fn test_fallback_when_nothing_configured() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").to_string_lossy().to_string();
        assert_eq!(resolve_secret_from(None, Some(missing), "dflt"), "dflt");
    }
}
