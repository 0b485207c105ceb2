//! ELF32 executable parsing
//!
//! Accepts exactly the image format the loader honors: 32-bit
//! little-endian `EXEC` for i386, `PT_LOAD` segments only. Every
//! loadable segment must lie wholly inside the user window and satisfy
//! `filesz <= memsz`; the `memsz` tail beyond `filesz` is zero-filled
//! by the loader. Parsing only reads the byte slice — mapping and
//! copying belong to the process loader.

use alloc::vec::Vec;

use crate::error::{KernelError, KernelResult};
use crate::mm::{USER_SPACE_END, USER_SPACE_START};

pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELF_CLASS_32: u8 = 1;
const ELF_DATA_LSB: u8 = 1;
const ELF_TYPE_EXEC: u16 = 2;
const ELF_MACHINE_386: u16 = 3;

const PT_LOAD: u32 = 1;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

/// One loadable segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfSegment {
    pub vaddr: u32,
    pub offset: u32,
    pub filesz: u32,
    pub memsz: u32,
}

/// A validated executable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfImage {
    pub entry: u32,
    pub segments: Vec<ElfSegment>,
    pub min_vaddr: u32,
    pub max_vaddr: u32,
}

fn read_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([data[off], data[off + 1]])
}

fn read_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

fn bad(reason: &'static str) -> KernelError {
    KernelError::BadExecutable { reason }
}

/// Parse and validate an executable image.
pub fn parse(data: &[u8]) -> KernelResult<ElfImage> {
    if data.len() < EHDR_SIZE {
        return Err(bad("file smaller than the ELF header"));
    }
    if data[..4] != ELF_MAGIC {
        return Err(bad("bad magic"));
    }
    if data[4] != ELF_CLASS_32 || data[5] != ELF_DATA_LSB {
        return Err(bad("not 32-bit little-endian"));
    }
    if read_u16(data, 16) != ELF_TYPE_EXEC {
        return Err(bad("not an EXEC image"));
    }
    if read_u16(data, 18) != ELF_MACHINE_386 {
        return Err(bad("not an i386 image"));
    }

    let entry = read_u32(data, 24);
    let phoff = read_u32(data, 28) as usize;
    let phentsize = read_u16(data, 42) as usize;
    let phnum = read_u16(data, 44) as usize;

    if phentsize != PHDR_SIZE {
        return Err(bad("unexpected program header size"));
    }
    let ph_end = phoff
        .checked_add(phnum.checked_mul(PHDR_SIZE).ok_or_else(|| bad("header count overflow"))?)
        .ok_or_else(|| bad("header offset overflow"))?;
    if ph_end > data.len() {
        return Err(bad("program headers out of range"));
    }

    let mut segments = Vec::new();
    let mut min_vaddr = u32::MAX;
    let mut max_vaddr = 0u32;

    for i in 0..phnum {
        let ph = phoff + i * PHDR_SIZE;
        if read_u32(data, ph) != PT_LOAD {
            continue;
        }
        let offset = read_u32(data, ph + 4);
        let vaddr = read_u32(data, ph + 8);
        let filesz = read_u32(data, ph + 16);
        let memsz = read_u32(data, ph + 20);

        if filesz > memsz {
            return Err(bad("segment filesz exceeds memsz"));
        }
        let file_end = offset
            .checked_add(filesz)
            .ok_or_else(|| bad("segment file range overflow"))?;
        if file_end as usize > data.len() {
            return Err(bad("segment data out of range"));
        }
        if vaddr < USER_SPACE_START {
            return Err(bad("segment below the user window"));
        }
        let mem_end = vaddr
            .checked_add(memsz)
            .ok_or_else(|| bad("segment address overflow"))?;
        if mem_end > USER_SPACE_END {
            return Err(bad("segment beyond the user window"));
        }

        min_vaddr = min_vaddr.min(vaddr);
        max_vaddr = max_vaddr.max(mem_end);
        segments.push(ElfSegment {
            vaddr,
            offset,
            filesz,
            memsz,
        });
    }

    if segments.is_empty() {
        return Err(bad("no loadable segments"));
    }

    Ok(ElfImage {
        entry,
        segments,
        min_vaddr,
        max_vaddr,
    })
}

/// Build a minimal valid image in memory; used by the boot-time
/// filesystem seeding helpers and by tests.
pub fn build_exec_image(entry: u32, segments: &[(u32, &[u8], u32)]) -> Vec<u8> {
    let phnum = segments.len();
    let mut data = Vec::new();

    // ELF header.
    data.extend_from_slice(&ELF_MAGIC);
    data.push(ELF_CLASS_32);
    data.push(ELF_DATA_LSB);
    data.push(1); // version
    data.extend_from_slice(&[0; 9]); // abi + padding
    data.extend_from_slice(&ELF_TYPE_EXEC.to_le_bytes());
    data.extend_from_slice(&ELF_MACHINE_386.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes()); // version
    data.extend_from_slice(&entry.to_le_bytes());
    data.extend_from_slice(&(EHDR_SIZE as u32).to_le_bytes()); // phoff
    data.extend_from_slice(&0u32.to_le_bytes()); // shoff
    data.extend_from_slice(&0u32.to_le_bytes()); // flags
    data.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
    data.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
    data.extend_from_slice(&(phnum as u16).to_le_bytes());
    data.extend_from_slice(&0u16.to_le_bytes()); // shentsize
    data.extend_from_slice(&0u16.to_le_bytes()); // shnum
    data.extend_from_slice(&0u16.to_le_bytes()); // shstrndx
    debug_assert_eq!(data.len(), EHDR_SIZE);

    // Program headers, then the segment payloads.
    let mut payload_off = EHDR_SIZE + phnum * PHDR_SIZE;
    for (vaddr, bytes, memsz) in segments {
        data.extend_from_slice(&PT_LOAD.to_le_bytes());
        data.extend_from_slice(&(payload_off as u32).to_le_bytes());
        data.extend_from_slice(&vaddr.to_le_bytes());
        data.extend_from_slice(&vaddr.to_le_bytes()); // paddr
        data.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        data.extend_from_slice(&memsz.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes()); // flags R+X
        data.extend_from_slice(&0x1000u32.to_le_bytes()); // align
        payload_off += bytes.len();
    }
    for (_, bytes, _) in segments {
        data.extend_from_slice(bytes);
    }
    data
}
