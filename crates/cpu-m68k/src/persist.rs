//! Saving and restoring the register file in a session file.
//!
//! The registers are stored as one fixed-layout, big-endian chunk so that
//! session files move between hosts of either byte order.
//!
//! | offset | size | field |
//! |-------:|-----:|-------|
//! | 0      | 32   | D0-D7 |
//! | 32     | 32   | A0-A7 |
//! | 64     | 4    | USP |
//! | 68     | 4    | ISP |
//! | 72     | 4    | PC |
//! | 76     | 2    | SR |
//! | 78     | 1    | stopped |
//! | 79     | 1    | padding |
//! | 80     | 24   | VBR, SFC, DFC, FPCR, FPSR, FPIAR |

use std::collections::HashMap;

use tracing::debug;

use crate::bus::M68kBus;
use crate::cpu::Cpu68k;
use crate::error::{PersistError, Result};
use crate::flags::SpecialFlags;
use crate::registers::{Registers, StatusFields};

/// Four-character chunk identifier.
pub type ChunkTag = [u8; 4];

/// Chunk holding the CPU register file.
pub const CPU_REGISTERS: ChunkTag = *b"Creg";

/// Size of the canonical register blob.
pub const REGISTER_BLOB_LEN: usize = 104;

/// Chunked session storage.
pub trait SessionFile {
    fn write_chunk(&mut self, tag: ChunkTag, bytes: &[u8]) -> Result<()>;

    /// The chunk's contents, or `None` if the file has no such chunk.
    fn read_chunk(&mut self, tag: ChunkTag) -> Result<Option<Vec<u8>>>;
}

/// A [`SessionFile`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionFile {
    chunks: HashMap<ChunkTag, Vec<u8>>,
}

impl MemorySessionFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunk(&self, tag: ChunkTag) -> Option<&[u8]> {
        self.chunks.get(&tag).map(Vec::as_slice)
    }

    pub fn insert_chunk(&mut self, tag: ChunkTag, bytes: Vec<u8>) {
        self.chunks.insert(tag, bytes);
    }
}

impl SessionFile for MemorySessionFile {
    fn write_chunk(&mut self, tag: ChunkTag, bytes: &[u8]) -> Result<()> {
        self.chunks.insert(tag, bytes.to_vec());
        Ok(())
    }

    fn read_chunk(&mut self, tag: ChunkTag) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.get(&tag).cloned())
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn long(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }
}

struct Reader<'a>(&'a [u8]);

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let (head, rest) = self.0.split_at(N);
        self.0 = rest;
        let mut out = [0; N];
        out.copy_from_slice(head);
        out
    }

    fn long(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn word(&mut self) -> u16 {
        u16::from_be_bytes(self.take())
    }

    fn byte(&mut self) -> u8 {
        self.take::<1>()[0]
    }
}

impl Registers {
    /// Encode in the session-file layout. SR is taken from `sr` as is, so
    /// pack it first if the fields may be newer.
    #[must_use]
    pub fn to_canonical_bytes(&self) -> [u8; REGISTER_BLOB_LEN] {
        let mut w = Writer(Vec::with_capacity(REGISTER_BLOB_LEN));
        for &d in &self.d {
            w.long(d);
        }
        for &a in &self.a {
            w.long(a);
        }
        w.long(self.usp);
        w.long(self.isp);
        w.long(self.pc);
        w.0.extend_from_slice(&self.sr.to_be_bytes());
        w.0.push(u8::from(self.stopped));
        w.0.push(0);
        for v in [self.vbr, self.sfc, self.dfc, self.fpcr, self.fpsr, self.fpiar] {
            w.long(v);
        }

        let mut out = [0; REGISTER_BLOB_LEN];
        out.copy_from_slice(&w.0);
        out
    }

    /// Decode the session-file layout.
    ///
    /// The broken-out status fields are derived from the stored SR. A
    /// stopped CPU comes back with STOP pending; no other special flag is
    /// restored.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != REGISTER_BLOB_LEN {
            return Err(PersistError::BadLength {
                expected: REGISTER_BLOB_LEN,
                actual: bytes.len(),
            });
        }

        let mut r = Reader(bytes);
        let mut regs = Self::new();
        for d in &mut regs.d {
            *d = r.long();
        }
        for a in &mut regs.a {
            *a = r.long();
        }
        regs.usp = r.long();
        regs.isp = r.long();
        regs.pc = r.long();
        regs.sr = r.word();
        regs.stopped = r.byte() != 0;
        let _pad = r.byte();
        regs.vbr = r.long();
        regs.sfc = r.long();
        regs.dfc = r.long();
        regs.fpcr = r.long();
        regs.fpsr = r.long();
        regs.fpiar = r.long();

        regs.status = StatusFields::from_sr(regs.sr);
        regs.spcflags = if regs.stopped {
            SpecialFlags::STOP
        } else {
            SpecialFlags::empty()
        };
        Ok(regs)
    }
}

impl<B: M68kBus> Cpu68k<B> {
    /// Write the register file to `file`.
    pub fn save(&mut self, file: &mut dyn SessionFile) -> Result<()> {
        let regs = self.get_registers();
        file.write_chunk(CPU_REGISTERS, &regs.to_canonical_bytes())
    }

    /// Replace the register file with the one stored in `file`.
    pub fn load(&mut self, bus: &mut B, file: &mut dyn SessionFile) -> Result<()> {
        let bytes = file
            .read_chunk(CPU_REGISTERS)?
            .ok_or(PersistError::MissingChunk)?;
        let regs = Registers::from_canonical_bytes(&bytes)?;
        debug!(
            pc = format_args!("{:#010x}", regs.pc),
            sr = format_args!("{:#06x}", regs.sr),
            stopped = regs.stopped,
            "registers loaded"
        );
        self.set_registers(bus, &regs);
        Ok(())
    }
}
