use std::{fmt, path::Path};

use chrono::{Local, Utc};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use tracing::{debug, info, warn};

extern crate strip_ansi_escapes;

use crate::Result;

/// Counters of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Totals {
    pub unchanged: usize,
    pub skipped: usize,
    pub updated: usize,
    pub new: usize,
    pub err: usize,
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unchanged \x1b[90m{}\x1b[0m / Skipped \x1b[33m{}\x1b[0m / Updated \x1b[34m{}\x1b[0m / New \x1b[32m{}\x1b[0m / Err \x1b[31m{}\x1b[0m",
            self.unchanged, self.skipped, self.updated, self.new, self.err
        )
    }
}

#[derive(Debug, Default)]
struct State {
    totals: Totals,
    log: Vec<String>,
}

/// Records what happened to every node during a run
#[derive(Debug, Default)]
pub struct StatusBar {
    state: Mutex<State>,
}

/// Where and how large the run log may grow
#[derive(Debug, Clone, PartialEq)]
pub struct LogRotation {
    /// Rotate once the log reaches this size
    pub max_bytes: u64,
    /// Number of rotated files kept (`run.log.1` .. `run.log.N`)
    pub backups: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            backups: 5,
        }
    }
}

impl StatusBar {
    fn get_current_time() -> String {
        Utc::now().with_timezone(&Local).to_rfc3339()
    }

    async fn create_log_entry(&self, message: &str, log_type: &str) -> String {
        // Create log entry contents for both tracing and log file
        let mut log_entry_contents = log_type.to_string();
        log_entry_contents.push_str(message);

        // Create entry for log file
        let log_entry = format!("{} {}", StatusBar::get_current_time(), log_entry_contents);
        self.state.lock().await.log.push(log_entry);

        log_entry_contents
    }

    pub async fn register_unchanged(&self) {
        self.state.lock().await.totals.unchanged += 1;
    }
    pub async fn register_skipped(&self) {
        self.state.lock().await.totals.skipped += 1;
    }
    pub async fn register_updated(&self, message: &str) {
        self.state.lock().await.totals.updated += 1;
        let entry = self.create_log_entry(message, "\x1b[34mUpdated\x1b[0m: ").await;
        info!("{}", entry);
    }
    pub async fn register_new(&self, message: &str) {
        self.state.lock().await.totals.new += 1;
        let entry = self.create_log_entry(message, "\x1b[32mNew\x1b[0m: ").await;
        info!("{}", entry);
    }
    pub async fn register_err(&self, message: &str) {
        self.state.lock().await.totals.err += 1;
        let entry = self.create_log_entry(message, "\x1b[31mErr\x1b[0m: ").await;
        warn!("{}", entry);
    }

    pub async fn totals(&self) -> Totals {
        self.state.lock().await.totals.clone()
    }

    /// Appends the collected entries to a log file, rotating it first if it grew too large
    pub async fn write_log_to_file(&self, file_path: &Path, rotation: &LogRotation) -> Result<()> {
        rotate_log(file_path, rotation).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)
            .await?;

        let state = self.state.lock().await;
        let mut buffer = Vec::new();

        for log_entry in &state.log {
            buffer.extend_from_slice(&strip_ansi_escapes::strip(log_entry.as_bytes()));
            buffer.extend_from_slice(b"\n");
        }

        buffer.extend_from_slice(b"Total: ");
        buffer.extend_from_slice(&strip_ansi_escapes::strip(state.totals.to_string().as_bytes()));
        buffer.extend_from_slice(b"     (Log generated at: ");
        buffer.extend_from_slice(StatusBar::get_current_time().as_bytes());
        buffer.extend_from_slice(b")\n\n");

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Shifts `log` -> `log.1` -> `log.2` ... dropping the oldest backup
async fn rotate_log(file_path: &Path, rotation: &LogRotation) -> Result<()> {
    let size = match fs::metadata(file_path).await {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if size < rotation.max_bytes {
        return Ok(());
    }

    debug!("Rotating log file {}", file_path.display());
    if rotation.backups == 0 {
        fs::remove_file(file_path).await?;
        return Ok(());
    }

    let backup = |n: usize| {
        let mut name = file_path.as_os_str().to_owned();
        name.push(format!(".{}", n));
        std::path::PathBuf::from(name)
    };
    let _ = fs::remove_file(backup(rotation.backups)).await;
    for n in (1..rotation.backups).rev() {
        let from = backup(n);
        if fs::try_exists(&from).await? {
            fs::rename(&from, backup(n + 1)).await?;
        }
    }
    fs::rename(file_path, backup(1)).await?;
    Ok(())
}
