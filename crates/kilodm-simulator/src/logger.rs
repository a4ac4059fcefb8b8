use anyhow::{Context, Result};
use kilodm_agent::{DebugInfo, Tick};
use kilodm_protocol::RESOURCE_COUNT;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One snapshot of the whole swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub tick:        Tick,
    pub populations: [f64; RESOURCE_COUNT],
    pub agents:      Vec<DebugInfo>,
}

/// Append-only CBOR trace of a run.
///
/// Each entry is length-prefixed (4-byte LE u32) followed by the CBOR
/// encoding of a [`TraceEntry`]. Written to `kilodm-run-{seed:06}.cbor`.
pub struct TraceLogger {
    log_dir: PathBuf,
    seed:    u64,
    buffer:  Vec<u8>,
    entries: u32,
}

impl TraceLogger {
    pub fn new(log_dir: PathBuf, seed: u64) -> Self {
        Self { log_dir, seed, buffer: Vec::new(), entries: 0 }
    }

    pub fn log(&mut self, entry: &TraceEntry) -> Result<()> {
        let mut cbor = Vec::new();
        ciborium::into_writer(entry, &mut cbor).context("encoding trace entry")?;

        let len = (cbor.len() as u32).to_le_bytes();
        self.buffer.extend_from_slice(&len);
        self.buffer.extend_from_slice(&cbor);
        self.entries += 1;
        Ok(())
    }

    pub fn entry_count(&self) -> u32 {
        self.entries
    }

    /// Append buffered entries to the run file and clear the buffer.
    pub fn flush(&mut self) -> Result<PathBuf> {
        let path = Self::run_path(&self.log_dir, self.seed);
        if self.buffer.is_empty() {
            return Ok(path);
        }
        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("creating {}", self.log_dir.display()))?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        file.write_all(&self.buffer)?;
        self.buffer.clear();
        Ok(path)
    }

    pub fn run_path(log_dir: &Path, seed: u64) -> PathBuf {
        log_dir.join(format!("kilodm-run-{seed:06}.cbor"))
    }

    /// Read back every entry of a run file.
    #[cfg(test)]
    pub fn read_run(log_dir: &Path, seed: u64) -> Result<Vec<TraceEntry>> {
        let path = Self::run_path(log_dir, seed);
        let data = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut entries = Vec::new();
        let mut pos = 0;
        while pos + 4 <= data.len() {
            let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
            pos += 4;
            if pos + len > data.len() {
                break;
            }
            let entry: TraceEntry =
                ciborium::from_reader(&data[pos..pos + len]).context("decoding trace entry")?;
            entries.push(entry);
            pos += len;
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kilodm_agent::{Agent, AgentParams};
    use kilodm_protocol::AgentId;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kilodm-trace-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn entries_round_trip_through_file() {
        let dir = temp_dir("roundtrip");
        let agent = Agent::new(AgentId::new(3).unwrap(), AgentParams { seed: Some(1), ..Default::default() }).unwrap();
        let entry = TraceEntry { tick: 42, populations: [0.5, 0.25, 1.0], agents: vec![agent.debug_info()] };

        let mut logger = TraceLogger::new(dir.clone(), 7);
        logger.log(&entry).unwrap();
        logger.log(&TraceEntry { tick: 43, ..entry.clone() }).unwrap();
        assert_eq!(logger.entry_count(), 2);
        let path = logger.flush().unwrap();
        assert!(path.ends_with("kilodm-run-000007.cbor"));

        let back = TraceLogger::read_run(&dir, 7).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0], entry);
        assert_eq!(back[1].tick, 43);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let dir = temp_dir("empty");
        let path = TraceLogger::new(dir.clone(), 1).flush().unwrap();
        assert!(!path.exists());
    }
}
