//! Turning sampled addresses into something readable.
//!
//! Full resolution (DWARF line tables) lives outside this crate behind the
//! [`Symbolizer`] trait. Two resolvers ship here: [`NullSymbolizer`], and
//! [`MapsSymbolizer`], which maps an address to `module+offset` using the
//! traced process's `/proc/<pid>/maps` snapshot.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

/// What an address resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Symbol {
    SourceLine { file: String, line: u32, column: u32 },
    ModuleOffset { module: String, offset: u64 },
    Unresolved,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::SourceLine { file, line, column } => write!(f, "{file}:{line}:{column}"),
            Symbol::ModuleOffset { module, offset } => write!(f, "{module}+{offset:#x}"),
            Symbol::Unresolved => f.write_str("???"),
        }
    }
}

/// Resolves a batch of addresses.
///
/// Addresses missing from the result are treated as [`Symbol::Unresolved`].
pub trait Symbolizer {
    fn resolve(&self, addresses: &BTreeSet<u64>) -> HashMap<u64, Symbol>;
}

/// Resolves nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSymbolizer;

impl Symbolizer for NullSymbolizer {
    fn resolve(&self, _addresses: &BTreeSet<u64>) -> HashMap<u64, Symbol> {
        HashMap::new()
    }
}

/// A precomputed table, e.g. from an offline resolver.
impl Symbolizer for HashMap<u64, Symbol> {
    fn resolve(&self, addresses: &BTreeSet<u64>) -> HashMap<u64, Symbol> {
        addresses
            .iter()
            .filter_map(|addr| Some((*addr, self.get(addr)?.clone())))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Mapping {
    start: u64,
    end: u64,
    file_offset: u64,
    path: String,
}

/// Module+offset resolution from a `/proc/<pid>/maps` listing.
///
/// Only executable, file-backed mappings are kept.
#[derive(Debug, Clone, Default)]
pub struct MapsSymbolizer {
    /// Sorted by `start`; mappings never overlap
    mappings: Vec<Mapping>,
}

impl MapsSymbolizer {
    /// Parse `start-end perms offset dev inode path` lines; others are skipped.
    pub fn parse(maps: &str) -> Self {
        let mut mappings: Vec<Mapping> = maps.lines().filter_map(parse_maps_line).collect();
        mappings.sort_by_key(|m| m.start);
        log::debug!("Loaded {} executable mapping(s)", mappings.len());
        Self { mappings }
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    fn lookup(&self, address: u64) -> Option<Symbol> {
        let idx = self.mappings.partition_point(|m| m.start <= address);
        let mapping = self.mappings[..idx].last()?;
        (address < mapping.end).then(|| Symbol::ModuleOffset {
            module: mapping.path.clone(),
            offset: mapping.file_offset + (address - mapping.start),
        })
    }
}

impl Symbolizer for MapsSymbolizer {
    fn resolve(&self, addresses: &BTreeSet<u64>) -> HashMap<u64, Symbol> {
        addresses
            .iter()
            .filter_map(|addr| Some((*addr, self.lookup(*addr)?)))
            .collect()
    }
}

fn parse_maps_line(line: &str) -> Option<Mapping> {
    let mut fields = line.split_whitespace();
    let (start, end) = fields.next()?.split_once('-')?;
    let perms = fields.next()?;
    let offset = fields.next()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    // Paths may contain spaces
    let path = fields.collect::<Vec<_>>().join(" ");

    if !perms.contains('x') || !path.starts_with('/') {
        return None;
    }

    Some(Mapping {
        start: u64::from_str_radix(start, 16).ok()?,
        end: u64::from_str_radix(end, 16).ok()?,
        file_offset: u64::from_str_radix(offset, 16).ok()?,
        path,
    })
}
