// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Segment-file backing store
//!
//! One append-only segment per agent:
//!
//! ```text
//! {dir}/agent-{agent_id:020}.seg
//! ┌──────────────┬──────────────────────────┐
//! │ len: u32 LE  │ bincode(MonitoringRecord) │  repeated
//! └──────────────┴──────────────────────────┘
//! ```
//!
//! A frame cut short by a crash during append is dropped on load and cut
//! off the file, so later appends land right after the last good frame.

use crate::backing::BackingStore;
use apmindex_core::{MonitoringRecord, Result, StorageSettings};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SEGMENT_PREFIX: &str = "agent-";
const SEGMENT_SUFFIX: &str = ".seg";
const FRAME_HEADER_LEN: u64 = 4;
/// Larger length prefixes are treated as corruption.
const MAX_FRAME_LEN: u64 = 16 * 1024 * 1024;

/// Per-agent segment files under one directory.
pub struct SegmentFileStore {
    dir: PathBuf,
    sync_writes: bool,
    /// Serialises appends so frames from concurrent writers never interleave.
    write_lock: Mutex<()>,
}

impl SegmentFileStore {
    /// Open (and create if needed) a segment directory.
    pub fn open<P: AsRef<Path>>(dir: P, sync_writes: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), sync_writes, "Opened segment store");

        Ok(Self {
            dir,
            sync_writes,
            write_lock: Mutex::new(()),
        })
    }

    /// Open the directory named by the settings, if any.
    pub fn from_settings(settings: &StorageSettings) -> Result<Option<Self>> {
        settings
            .segment_dir
            .as_ref()
            .map(|dir| Self::open(dir, settings.sync_writes))
            .transpose()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn segment_path(&self, agent_id: u64) -> PathBuf {
        self.dir
            .join(format!("{}{:020}{}", SEGMENT_PREFIX, agent_id, SEGMENT_SUFFIX))
    }

    fn parse_agent_id(file_name: &str) -> Option<u64> {
        file_name
            .strip_prefix(SEGMENT_PREFIX)?
            .strip_suffix(SEGMENT_SUFFIX)?
            .parse()
            .ok()
    }
}

impl BackingStore for SegmentFileStore {
    fn agent_ids(&self) -> Result<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(Self::parse_agent_id) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    fn load_agent(&self, agent_id: u64) -> Result<Vec<MonitoringRecord>> {
        let path = self.segment_path(agent_id);
        // Held for the whole load: a frame being appended must not look torn.
        let _guard = self.write_lock.lock();
        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(&file);
        let mut records = Vec::new();
        let mut frame = Vec::new();
        let mut good_len = 0u64;

        while good_len < file_len {
            let remaining = file_len - good_len;
            if remaining < FRAME_HEADER_LEN {
                break;
            }

            let len = u64::from(reader.read_u32::<LittleEndian>()?);
            if len > MAX_FRAME_LEN || len > remaining - FRAME_HEADER_LEN {
                break;
            }

            frame.resize(len as usize, 0);
            reader.read_exact(&mut frame)?;
            records.push(bincode::deserialize(&frame)?);
            good_len += FRAME_HEADER_LEN + len;
        }
        drop(reader);

        if good_len < file_len {
            warn!(
                agent_id,
                loaded = records.len(),
                dropped_bytes = file_len - good_len,
                "Cutting truncated frame off end of segment"
            );
            file.set_len(good_len)?;
            if self.sync_writes {
                file.sync_data()?;
            }
        }

        debug!(agent_id, records = records.len(), "Loaded segment");
        Ok(records)
    }

    fn append(&self, record: &MonitoringRecord) -> Result<()> {
        let bytes = bincode::serialize(record)?;
        let mut frame = Vec::with_capacity(4 + bytes.len());
        frame.write_u32::<LittleEndian>(bytes.len() as u32)?;
        frame.extend_from_slice(&bytes);

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.segment_path(record.agent_id))?;
        file.write_all(&frame)?;

        if self.sync_writes {
            file.sync_data()?;
        }

        Ok(())
    }

    fn remove_agent(&self, agent_id: u64) -> Result<()> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.segment_path(agent_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
