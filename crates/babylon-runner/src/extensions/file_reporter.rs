use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use babylon_extension::{Reporter, Session};

use super::is_safe_file_stem;

/// End-of-session reporter writing `<dir>/<uuid>.txt`.
pub struct FileReporter {
    dir: PathBuf,
    secret: String,
    connect_on_startup: bool,
}

impl FileReporter {
    pub fn new(dir: impl Into<PathBuf>, secret: impl Into<String>, connect_on_startup: bool) -> Self {
        Self {
            dir: dir.into(),
            secret: secret.into(),
            connect_on_startup,
        }
    }

    pub fn path_for(&self, session: &Session) -> PathBuf {
        self.dir.join(format!("{}.txt", session.uuid))
    }

    fn write(&self, path: &Path, session: &Session) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        for entry in session.log() {
            writeln!(
                file,
                "[{}] {}: {}",
                entry.timestamp.to_rfc3339(),
                entry.category,
                entry.message
            )?;
        }
        file.flush()
    }
}

#[async_trait]
impl Reporter for FileReporter {
    fn name(&self) -> &str {
        "FileReporter"
    }

    fn secret(&self) -> &str {
        &self.secret
    }

    fn is_live(&self) -> bool {
        false
    }

    fn connect_on_startup(&self) -> bool {
        self.connect_on_startup
    }

    async fn session_end_log(&self, session: &Session) -> u16 {
        tracing::info!(
            category = "reporter",
            session = %session.uuid,
            entries = session.log().len(),
            "Processing session end log"
        );

        if !is_safe_file_stem(&session.uuid) {
            tracing::warn!(category = "reporter", session = %session.uuid, "Refusing unsafe session id");
            return 400;
        }

        let path = self.path_for(session);
        match self.write(&path, session) {
            Ok(()) => {
                tracing::info!(category = "reporter", path = %path.display(), "Session log written");
                200
            }
            Err(e) => {
                tracing::error!(category = "reporter", path = %path.display(), error = %e, "Failed to write session log");
                500
            }
        }
    }
}
