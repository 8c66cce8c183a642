//! Accumulated planning decisions ("wisdom").
//!
//! Every measured line length leaves an entry recording which algorithm won
//! and how rigorously it was measured. Later plans of the same precision and
//! length reuse the entry instead of measuring again, as long as it was
//! produced with at least the rigor they ask for. Wisdom can be exported to
//! text and imported into another engine; the text ends with a `blake3`
//! checksum so truncated or edited files are rejected as a whole.

use core::fmt;
use std::path::Path;

use hashbrown::HashMap;

use crate::engine::dft::Algorithm;
use crate::flags::Flags;
use crate::num::Precision;

const HEADER: &str = "fftplan-wisdom 1";
const CHECKSUM_PREFIX: &str = "blake3 ";

/// How hard the planner looked before settling on an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rigor {
    Measure,
    Patient,
    Exhaustive,
}

impl Rigor {
    pub fn from_flags(flags: Flags) -> Self {
        if flags.contains(Flags::EXHAUSTIVE) {
            Rigor::Exhaustive
        } else if flags.contains(Flags::PATIENT) {
            Rigor::Patient
        } else {
            Rigor::Measure
        }
    }

    /// Multiplier applied to trial counts and to the direct-DFT length limit.
    pub fn effort(self) -> usize {
        match self {
            Rigor::Measure => 1,
            Rigor::Patient => 4,
            Rigor::Exhaustive => 16,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rigor::Measure => "measure",
            Rigor::Patient => "patient",
            Rigor::Exhaustive => "exhaustive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "measure" => Some(Rigor::Measure),
            "patient" => Some(Rigor::Patient),
            "exhaustive" => Some(Rigor::Exhaustive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WisdomEntry {
    pub algorithm: Algorithm,
    pub rigor: Rigor,
}

#[derive(Debug)]
pub enum WisdomError {
    MissingHeader,
    MissingChecksum,
    ChecksumMismatch,
    /// 1-based line number of the first entry that does not parse.
    Malformed { line: usize },
    Io(std::io::Error),
}

impl fmt::Display for WisdomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WisdomError::MissingHeader => write!(f, "wisdom does not start with {HEADER:?}"),
            WisdomError::MissingChecksum => write!(f, "wisdom has no trailing checksum line"),
            WisdomError::ChecksumMismatch => write!(f, "wisdom checksum does not match its contents"),
            WisdomError::Malformed { line } => write!(f, "malformed wisdom entry on line {line}"),
            WisdomError::Io(e) => write!(f, "wisdom i/o failed: {e}"),
        }
    }
}

impl std::error::Error for WisdomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WisdomError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WisdomError {
    fn from(e: std::io::Error) -> Self {
        WisdomError::Io(e)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Wisdom {
    entries: HashMap<(Precision, usize), WisdomEntry>,
}

impl Wisdom {
    pub fn lookup(&self, precision: Precision, n: usize) -> Option<WisdomEntry> {
        self.entries.get(&(precision, n)).copied()
    }

    /// Record a decision unless a more rigorous one is already known.
    pub fn record(&mut self, precision: Precision, n: usize, entry: WisdomEntry) {
        match self.entries.get(&(precision, n)) {
            Some(existing) if existing.rigor > entry.rigor => {}
            _ => {
                self.entries.insert((precision, n), entry);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Deterministic text form: entries sorted by precision then length.
    pub fn export(&self) -> String {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort();
        let mut body = String::new();
        body.push_str(HEADER);
        body.push('\n');
        for key in keys {
            let entry = self.entries[&key];
            body.push_str(&format!(
                "{} {} {} {}\n",
                key.0.as_str(),
                key.1,
                entry.algorithm.as_str(),
                entry.rigor.as_str()
            ));
        }
        let checksum = blake3::hash(body.as_bytes());
        body.push_str(CHECKSUM_PREFIX);
        body.push_str(&checksum.to_hex());
        body.push('\n');
        body
    }

    /// Merge exported wisdom. Nothing is merged unless the whole text
    /// verifies. Returns the number of entries read.
    pub fn import(&mut self, text: &str) -> Result<usize, WisdomError> {
        let trimmed = text.trim_end_matches('\n');
        let (body, checksum_line) = match trimmed.rfind('\n') {
            Some(idx) => (&trimmed[..=idx], &trimmed[idx + 1..]),
            None if trimmed.starts_with(HEADER) => return Err(WisdomError::MissingChecksum),
            None => return Err(WisdomError::MissingHeader),
        };
        if body.lines().next() != Some(HEADER) {
            return Err(WisdomError::MissingHeader);
        }
        let Some(expected) = checksum_line.strip_prefix(CHECKSUM_PREFIX) else {
            return Err(WisdomError::MissingChecksum);
        };
        if blake3::hash(body.as_bytes()).to_hex().as_str() != expected.trim() {
            return Err(WisdomError::ChecksumMismatch);
        }

        let mut parsed = Vec::new();
        for (idx, line) in body.lines().enumerate().skip(1) {
            let entry = parse_entry(line).ok_or(WisdomError::Malformed { line: idx + 1 })?;
            parsed.push(entry);
        }
        let count = parsed.len();
        for (precision, n, entry) in parsed {
            self.record(precision, n, entry);
        }
        Ok(count)
    }

    pub fn export_to_file(&self, path: impl AsRef<Path>) -> Result<(), WisdomError> {
        std::fs::write(path, self.export())?;
        Ok(())
    }

    pub fn import_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, WisdomError> {
        let text = std::fs::read_to_string(path)?;
        self.import(&text)
    }
}

fn parse_entry(line: &str) -> Option<(Precision, usize, WisdomEntry)> {
    let mut fields = line.split_whitespace();
    let precision = Precision::parse(fields.next()?)?;
    let n = fields.next()?.parse::<usize>().ok()?;
    let algorithm = Algorithm::parse(fields.next()?)?;
    let rigor = Rigor::parse(fields.next()?)?;
    if fields.next().is_some() || !algorithm.supports(n) {
        return None;
    }
    Some((precision, n, WisdomEntry { algorithm, rigor }))
}
