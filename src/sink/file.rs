// SPDX-License-Identifier: Apache-2.0 OR MIT
// Rotating file sink: size/time triggered rotation, background compression,
// bounded backup retention

use super::{Compress, Sink};
use crate::error::LogError;
use chrono::{Datelike, Days, Local, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

const MIB: u64 = 1_048_576;
const ARCHIVE_TIMESTAMP: &str = "%Y-%m-%dT%H-%M-%S";

/// Wall-clock rotation cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotateInterval {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

struct FileState {
    /// None only between a failed reopen and the next write attempt.
    writer: Option<BufWriter<File>>,
    size: u64,
    next_rotation: Option<NaiveDateTime>,
}

/// Appends newline-terminated records to a file, rotating it by size and/or
/// wall-clock schedule. Rotated files are renamed to
/// `<path>.<YYYY-MM-DDTHH-MM-SS>`, optionally compressed in the background,
/// and pruned down to `max_backups` archives.
pub struct FileSink {
    path: PathBuf,
    max_size: u64,
    max_backups: usize,
    interval: RotateInterval,
    compressor: Option<Arc<dyn Compress>>,
    state: Mutex<FileState>,
}

impl FileSink {
    /// Open (or create) the target file in append mode.
    ///
    /// `max_size_mb` of 0 disables size-based rotation; `max_backups` of 0
    /// disables retention pruning.
    pub fn new(
        path: impl Into<PathBuf>,
        max_size_mb: u64,
        max_backups: usize,
        interval: RotateInterval,
        compressor: Option<Arc<dyn Compress>>,
    ) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            max_size: max_size_mb * MIB,
            max_backups,
            interval,
            compressor,
            state: Mutex::new(FileState {
                writer: Some(BufWriter::new(file)),
                size,
                next_rotation: next_rotation_after(Local::now().naive_local(), interval),
            }),
        })
    }

    /// Flush and close the underlying file. Further writes reopen it.
    pub fn close(&self) -> Result<(), LogError> {
        let mut state = self.lock_state();
        if let Some(mut writer) = state.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reopen(&self, state: &mut FileState) -> Result<(), LogError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        state.size = file.metadata()?.len();
        state.writer = Some(BufWriter::new(file));
        Ok(())
    }

    fn rotate(&self, state: &mut FileState, now: NaiveDateTime) -> Result<(), LogError> {
        // Close the active file before renaming it.
        if let Some(mut writer) = state.writer.take() {
            let _ = writer.flush();
        }

        let archived = archive_name(&self.path, now);
        fs::rename(&self.path, &archived).map_err(LogError::Rotation)?;

        if let Some(compressor) = &self.compressor {
            let compressor = Arc::clone(compressor);
            let src = archived;
            std::thread::spawn(move || {
                let mut dst = src.clone().into_os_string();
                dst.push(compressor.extension());
                let dst = PathBuf::from(dst);
                // Best effort: a failure leaves the uncompressed archive.
                if compressor.compress(&src, &dst).is_ok() {
                    let _ = fs::remove_file(&src);
                }
            });
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(LogError::Rotation)?;
        state.writer = Some(BufWriter::new(file));
        state.size = 0;
        state.next_rotation = next_rotation_after(now, self.interval);

        self.cleanup_backups();
        Ok(())
    }

    fn cleanup_backups(&self) {
        if self.max_backups == 0 {
            return;
        }
        let Some(base) = self.path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let prefix = format!("{base}.");
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };

        let mut backups: Vec<PathBuf> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let name = name.to_str()?;
                name.starts_with(&prefix).then(|| entry.path())
            })
            .collect();

        if backups.len() <= self.max_backups {
            return;
        }

        // Archive names embed the timestamp, so name order is age order.
        backups.sort();
        let excess = backups.len() - self.max_backups;
        for old in &backups[..excess] {
            let _ = fs::remove_file(old);
        }
    }
}

impl Sink for FileSink {
    fn write(&self, bytes: &[u8]) -> Result<(), LogError> {
        let mut state = self.lock_state();
        let now = Local::now().naive_local();

        let due_by_time = state.next_rotation.is_some_and(|at| now > at);
        let due_by_size =
            self.max_size > 0 && state.size + bytes.len() as u64 > self.max_size;
        if due_by_time || due_by_size {
            self.rotate(&mut state, now)?;
        }

        if state.writer.is_none() {
            self.reopen(&mut state)?;
        }
        if let Some(writer) = state.writer.as_mut() {
            writer.write_all(bytes)?;
            writer.write_all(b"\n")?;
            state.size += bytes.len() as u64 + 1;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), LogError> {
        let mut state = self.lock_state();
        if let Some(writer) = state.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

fn archive_name(path: &Path, now: NaiveDateTime) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", now.format(ARCHIVE_TIMESTAMP)));
    PathBuf::from(name)
}

/// The next wall-clock instant at which the file should rotate.
fn next_rotation_after(now: NaiveDateTime, interval: RotateInterval) -> Option<NaiveDateTime> {
    match interval {
        RotateInterval::None => None,
        RotateInterval::Daily => now
            .date()
            .checked_add_days(Days::new(1))
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        RotateInterval::Weekly => {
            let to_monday = 7 - u64::from(now.date().weekday().num_days_from_monday());
            now.date()
                .checked_add_days(Days::new(to_monday))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
        RotateInterval::Monthly => now
            .date()
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
    }
}
