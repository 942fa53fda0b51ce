use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use babylon_extension::Reporter;
use parking_lot::Mutex;

use super::is_safe_file_stem;

/// Live reporter appending every event to `<dir>/<session>.live.txt`.
pub struct LiveLogReporter {
    dir: PathBuf,
    secret: String,
    connect_on_startup: bool,
    // Serializes appends so lines from concurrent events do not interleave.
    writer: Mutex<()>,
}

impl LiveLogReporter {
    pub fn new(dir: impl Into<PathBuf>, secret: impl Into<String>, connect_on_startup: bool) -> Self {
        Self {
            dir: dir.into(),
            secret: secret.into(),
            connect_on_startup,
            writer: Mutex::new(()),
        }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.live.txt", session_id))
    }

    fn append(&self, session_id: &str, line: &str) -> std::io::Result<()> {
        let _guard = self.writer.lock();
        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(session_id))?;
        writeln!(file, "{}", line)
    }
}

#[async_trait]
impl Reporter for LiveLogReporter {
    fn name(&self) -> &str {
        "LiveLog"
    }

    fn secret(&self) -> &str {
        &self.secret
    }

    fn is_live(&self) -> bool {
        true
    }

    fn connect_on_startup(&self) -> bool {
        self.connect_on_startup
    }

    async fn live_log(&self, session_id: &str, category: &str, message: &str) -> u16 {
        if !is_safe_file_stem(session_id) {
            tracing::warn!(category = "reporter", session = %session_id, "Refusing unsafe session id");
            return 400;
        }

        tracing::info!(
            category = "reporter",
            session = %session_id,
            kind = %category,
            "{}",
            message
        );

        let line = format!("[{}] {}: {}", chrono::Local::now().to_rfc3339(), category, message);
        match self.append(session_id, &line) {
            Ok(()) => 200,
            Err(e) => {
                tracing::error!(category = "reporter", session = %session_id, error = %e, "Failed to append live log");
                500
            }
        }
    }
}
