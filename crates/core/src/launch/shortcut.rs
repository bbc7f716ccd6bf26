//! Minimal reader for Windows shell links (`.lnk`).
//!
//! Only the parts needed to relaunch the target are decoded: the local base
//! path from the link info block and the working directory and arguments
//! from the string data section.

use std::{fs, path::Path};

use crate::error::{LibraryError, Result};

const HEADER_SIZE: u32 = 0x4C;
const LINK_CLSID: [u8; 16] = [
    0x01, 0x14, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46,
];

const HAS_TARGET_ID_LIST: u32 = 0x0000_0001;
const HAS_LINK_INFO: u32 = 0x0000_0002;
const HAS_NAME: u32 = 0x0000_0004;
const HAS_RELATIVE_PATH: u32 = 0x0000_0008;
const HAS_WORKING_DIR: u32 = 0x0000_0010;
const HAS_ARGUMENTS: u32 = 0x0000_0020;
const IS_UNICODE: u32 = 0x0000_0080;

const VOLUME_ID_AND_LOCAL_BASE_PATH: u32 = 0x0000_0001;
/// Link info headers this large carry Unicode path offsets.
const UNICODE_LINK_INFO_HEADER: u32 = 0x24;

/// The launch-relevant contents of a shell link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellLink {
    /// Program the link points at.
    pub target: String,
    /// Raw command line arguments.
    pub arguments: String,
    /// Directory to start in, when the link declares one.
    pub working_dir: Option<String>,
}

/// Read and decode the shell link at `path`.
pub fn read_shell_link(path: &Path) -> Result<ShellLink> {
    let bytes = fs::read(path)?;
    parse_shell_link(&bytes).map_err(|reason| LibraryError::Shortcut {
        path: path.to_path_buf(),
        reason,
    })
}

/// Decode shell link bytes.
pub fn parse_shell_link(bytes: &[u8]) -> std::result::Result<ShellLink, String> {
    let mut reader = Reader::new(bytes);
    if reader.u32()? != HEADER_SIZE {
        return Err("bad header size".to_string());
    }
    if reader.take(16)? != LINK_CLSID.as_slice() {
        return Err("not a shell link".to_string());
    }
    let flags = reader.u32()?;
    reader.seek(HEADER_SIZE as usize)?;

    if flags & HAS_TARGET_ID_LIST != 0 {
        let size = reader.u16()? as usize;
        reader.take(size)?;
    }

    let mut target = None;
    if flags & HAS_LINK_INFO != 0 {
        let start = reader.pos;
        let size = reader.u32()? as usize;
        let info = bytes
            .get(start..start + size)
            .ok_or_else(|| "truncated link info".to_string())?;
        target = local_base_path(info)?;
        reader.seek(start + size)?;
    }

    let unicode = flags & IS_UNICODE != 0;
    let mut relative_path = None;
    let mut working_dir = None;
    let mut arguments = None;
    if flags & HAS_NAME != 0 {
        reader.string(unicode)?;
    }
    if flags & HAS_RELATIVE_PATH != 0 {
        relative_path = Some(reader.string(unicode)?);
    }
    if flags & HAS_WORKING_DIR != 0 {
        working_dir = Some(reader.string(unicode)?);
    }
    if flags & HAS_ARGUMENTS != 0 {
        arguments = Some(reader.string(unicode)?);
    }

    let target = target
        .or(relative_path)
        .filter(|path| !path.is_empty())
        .ok_or_else(|| "link has no target path".to_string())?;

    Ok(ShellLink {
        target,
        arguments: arguments.unwrap_or_default(),
        working_dir,
    })
}

fn local_base_path(info: &[u8]) -> std::result::Result<Option<String>, String> {
    let mut reader = Reader::new(info);
    reader.u32()?;
    let header_size = reader.u32()?;
    let info_flags = reader.u32()?;
    if info_flags & VOLUME_ID_AND_LOCAL_BASE_PATH == 0 {
        return Ok(None);
    }
    let _volume_id_offset = reader.u32()?;
    let base_offset = reader.u32()? as usize;
    let _network_offset = reader.u32()?;
    let suffix_offset = reader.u32()? as usize;

    if header_size >= UNICODE_LINK_INFO_HEADER {
        let unicode_base = reader.u32()? as usize;
        let unicode_suffix = reader.u32()? as usize;
        if unicode_base != 0 {
            let mut path = utf16_z(info, unicode_base)?;
            if unicode_suffix != 0 {
                path.push_str(&utf16_z(info, unicode_suffix)?);
            }
            return Ok(Some(path));
        }
    }

    let mut path = ansi_z(info, base_offset)?;
    if suffix_offset != 0 {
        path.push_str(&ansi_z(info, suffix_offset)?);
    }
    Ok(Some(path))
}

fn ansi_z(bytes: &[u8], offset: usize) -> std::result::Result<String, String> {
    let tail = bytes
        .get(offset..)
        .ok_or_else(|| "string offset out of range".to_string())?;
    let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}

fn utf16_z(bytes: &[u8], offset: usize) -> std::result::Result<String, String> {
    let tail = bytes
        .get(offset..)
        .ok_or_else(|| "string offset out of range".to_string())?;
    let units: Vec<u16> = tail
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|unit| *unit != 0)
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> std::result::Result<&'a [u8], String> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or_else(|| format!("unexpected end of data at byte {}", self.pos))?;
        self.pos += len;
        Ok(slice)
    }

    fn seek(&mut self, pos: usize) -> std::result::Result<(), String> {
        if pos > self.bytes.len() {
            return Err(format!("offset {pos} past end of data"));
        }
        self.pos = pos;
        Ok(())
    }

    fn u16(&mut self) -> std::result::Result<u16, String> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> std::result::Result<u32, String> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Counted string from the string data section.
    fn string(&mut self, unicode: bool) -> std::result::Result<String, String> {
        let count = self.u16()? as usize;
        if unicode {
            let raw = self.take(count * 2)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        } else {
            Ok(String::from_utf8_lossy(self.take(count)?).into_owned())
        }
    }
}

/// Split a Windows style command line into arguments.
///
/// Whitespace separates arguments, double quotes group them and `\"` is a
/// literal quote.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_arg = true;
            }
            '"' => {
                quoted = !quoted;
                in_arg = true;
            }
            ch if ch.is_whitespace() && !quoted => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            ch => {
                current.push(ch);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}
