//! Daily-rotating log file writer.
//!
//! Each writer owns one severity tier. Files are named by calendar date plus
//! tier (`<directory>/<YYYY-MM-DD>_<tier>.log`), a symbolic link always points
//! at the current file, and files older than the retention window are pruned
//! on rotation. Rotation is wall-clock-driven: the first write on a new
//! calendar day opens the new file.
//!
//! Writes are best-effort. Once the writer is constructed, I/O failures are
//! swallowed so logging can never fail the operation that triggered it. The
//! internal mutex serializes writes, so a formatted record handed over in one
//! `write` call is never interleaved with another.

use anyhow::Context;
use chrono::{Local, NaiveDate};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Retention window for rotated files.
const MAX_AGE_DAYS: i64 = 7;

/// A cloneable handle to a daily-rotating file for one log tier.
#[derive(Clone)]
pub struct RotatingFileWriter {
    inner: Arc<Inner>,
}

struct Inner {
    directory: PathBuf,
    tier: &'static str,
    link_path: PathBuf,
    state: Mutex<State>,
}

struct State {
    file: File,
    day: NaiveDate,
}

impl RotatingFileWriter {
    /// Opens the current day's file for the given tier.
    ///
    /// Creates the directory if needed and points `<directory>/<link_name>`
    /// at the opened file. Failure here is a startup failure: a sink that
    /// cannot open its destination must not be built.
    pub fn new(
        directory: impl Into<PathBuf>,
        tier: &'static str,
        link_name: &str,
    ) -> anyhow::Result<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory)
            .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

        let day = Local::now().date_naive();
        let file_name = dated_file_name(day, tier);
        let file = open_log_file(&directory.join(&file_name))
            .with_context(|| format!("Failed to open log file {}", file_name))?;

        let link_path = directory.join(link_name);
        update_link(&link_path, &file_name);

        Ok(RotatingFileWriter {
            inner: Arc::new(Inner {
                directory,
                tier,
                link_path,
                state: Mutex::new(State { file, day }),
            }),
        })
    }

    /// The path of the file currently being written.
    pub fn current_path(&self) -> PathBuf {
        let day = match self.inner.state.lock() {
            Ok(state) => state.day,
            Err(poisoned) => poisoned.into_inner().day,
        };
        self.inner
            .directory
            .join(dated_file_name(day, self.inner.tier))
    }

    /// Writes a formatted record, rotating first if `day` has moved past the
    /// current file's date. Failures are swallowed.
    fn write_for_day(&self, buf: &[u8], day: NaiveDate) {
        let mut state = match self.inner.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if day != state.day {
            self.rotate(&mut state, day);
        }

        let _ = state.file.write_all(buf);
        let _ = state.file.flush();
    }

    /// Opens the new day's file, repoints the link, and prunes expired files.
    ///
    /// If the new file cannot be opened, the old one stays in place and
    /// writes keep going there.
    fn rotate(&self, state: &mut State, day: NaiveDate) {
        let file_name = dated_file_name(day, self.inner.tier);
        match open_log_file(&self.inner.directory.join(&file_name)) {
            Ok(file) => {
                state.file = file;
                state.day = day;
                update_link(&self.inner.link_path, &file_name);
                self.prune_expired(day);
            }
            Err(_) => {
                // Best effort: keep writing to the previous day's file.
            }
        }
    }

    /// Removes this tier's files older than the retention window.
    fn prune_expired(&self, today: NaiveDate) {
        let Ok(entries) = fs::read_dir(&self.inner.directory) else {
            return;
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(day) = parse_dated_file_name(name, self.inner.tier) else {
                continue;
            };

            if (today - day).num_days() > MAX_AGE_DAYS {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

impl io::Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_for_day(buf, Local::now().date_naive());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RotatingFileWriter {
    type Writer = RotatingFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn dated_file_name(day: NaiveDate, tier: &str) -> String {
    format!("{}_{}.log", day.format("%Y-%m-%d"), tier)
}

/// Parses `<YYYY-MM-DD>_<tier>.log` back into its date, rejecting files that
/// belong to other tiers.
fn parse_dated_file_name(name: &str, tier: &str) -> Option<NaiveDate> {
    let date_part = name.strip_suffix(&format!("_{}.log", tier))?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn open_log_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Repoints the stable link at the current file. Best effort: a filesystem
/// without symlink support just loses the convenience pointer.
fn update_link(link_path: &Path, file_name: &str) {
    #[cfg(unix)]
    {
        let _ = fs::remove_file(link_path);
        let _ = std::os::unix::fs::symlink(file_name, link_path);
    }
    #[cfg(not(unix))]
    {
        let _ = (link_path, file_name);
    }
}
