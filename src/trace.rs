use crate::address;
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::Path;

/// Kind of a memory instruction.
#[derive(
    Debug, strum::Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    #[strum(serialize = "LOAD")]
    Load,
    #[strum(serialize = "STORE")]
    Store,
    #[strum(serialize = "FENCE")]
    Fence,
    #[strum(serialize = "PREFETCH")]
    Prefetch,
}

impl AccessKind {
    #[must_use]
    pub fn is_store(self) -> bool {
        self == Self::Store
    }
}

/// Address and size of one block of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemAccess {
    pub addr: address,
    pub size: u32,
}

/// Blocks touched by one access.
pub type Blocks = SmallVec<[MemAccess; 4]>;

/// Memory instruction trace flowing through the pipeline.
///
/// Traces are produced upstream and only read by the bounds checking unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryTrace {
    /// Unique sequence id.
    pub uuid: u64,
    /// Originating core.
    #[serde(default)]
    pub core_id: usize,
    pub kind: AccessKind,
    /// Per-lane accesses, each made of one or more blocks.
    #[serde(default)]
    pub mem_addrs: Vec<Blocks>,
}

impl MemoryTrace {
    #[must_use]
    pub fn new(uuid: u64, kind: AccessKind) -> Self {
        Self {
            uuid,
            core_id: 0,
            kind,
            mem_addrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn load(uuid: u64, addr: address, size: u32) -> Self {
        Self::new(uuid, AccessKind::Load).with_access(addr, size)
    }

    #[must_use]
    pub fn store(uuid: u64, addr: address, size: u32) -> Self {
        Self::new(uuid, AccessKind::Store).with_access(addr, size)
    }

    /// Add an access made of a single block.
    #[must_use]
    pub fn with_access(mut self, addr: address, size: u32) -> Self {
        self.mem_addrs
            .push(smallvec::smallvec![MemAccess { addr, size }]);
        self
    }

    #[must_use]
    pub fn with_core_id(mut self, core_id: usize) -> Self {
        self.core_id = core_id;
        self
    }

    /// First block of the first access.
    #[must_use]
    pub fn first_access(&self) -> Option<&MemAccess> {
        self.mem_addrs.first()?.first()
    }

    #[must_use]
    pub fn is_store(&self) -> bool {
        self.kind.is_store()
    }
}

impl std::fmt::Display for MemoryTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(access) = self.first_access() {
            write!(f, "[{:#x}+{}]", access.addr, access.size)?;
        }
        write!(f, " core={} (#{})", self.core_id, self.uuid)
    }
}

/// Parse a JSON list of traces.
pub fn parse_traces(path: &Path) -> eyre::Result<Vec<MemoryTrace>> {
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("failed to open traces {}", path.display()))?;
    let reader = std::io::BufReader::new(file);
    let traces = serde_json::from_reader(reader)
        .wrap_err_with(|| format!("failed to parse traces {}", path.display()))?;
    Ok(traces)
}
