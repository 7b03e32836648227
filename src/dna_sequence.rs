use crate::{
    error::{EngineError, EngineResult},
    iupac_code::{IupacCode, reverse_complement, reverse_complement_bytes},
};
use anyhow::{Result, anyhow};
use bio::io::fasta;
use gb_io::seq::{Feature, Seq, Topology};
use serde::{Deserialize, Serialize};
use std::{fmt, fs::File};

type DNAstring = Vec<u8>;

/// Single-stranded ends of a fragment, each written 5'->3' on its own strand.
/// `forward_5`/`reverse_3` sit on the left end, `forward_3`/`reverse_5` on the
/// right end.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DNAoverhang {
    pub forward_3: String,
    pub forward_5: String,
    pub reverse_3: String,
    pub reverse_5: String,
}

impl DNAoverhang {
    pub fn is_blunt(&self) -> bool {
        self.left_is_blunt() && self.right_is_blunt()
    }

    pub fn is_sticky(&self) -> bool {
        !self.left_is_blunt() && !self.right_is_blunt()
    }

    pub fn left_is_blunt(&self) -> bool {
        self.forward_5.is_empty() && self.reverse_3.is_empty()
    }

    pub fn right_is_blunt(&self) -> bool {
        self.forward_3.is_empty() && self.reverse_5.is_empty()
    }

    /// The same ends seen from the other strand.
    pub fn flipped(&self) -> Self {
        Self {
            forward_5: self.reverse_5.clone(),
            reverse_3: self.forward_3.clone(),
            forward_3: self.reverse_3.clone(),
            reverse_5: self.forward_5.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "StoredSequence")]
pub struct DNAsequence {
    seq: Seq,
}

/// Serialized shape of `DNAsequence`; bases are re-validated on load.
#[derive(Deserialize)]
struct StoredSequence {
    seq: Seq,
}

impl TryFrom<StoredSequence> for DNAsequence {
    type Error = EngineError;

    fn try_from(stored: StoredSequence) -> EngineResult<Self> {
        Self::from_genbank_seq(stored.seq)
    }
}

impl DNAsequence {
    pub fn from_sequence(sequence: &str) -> EngineResult<DNAsequence> {
        Self::new(None, sequence, false)
    }

    pub fn new(name: Option<&str>, bases: &str, circular: bool) -> EngineResult<DNAsequence> {
        let bases = Self::validate_dna_sequence(name, bases.as_bytes())?;
        let mut ret = Self::from_u8(&bases);
        ret.seq.name = name.map(|n| n.to_string());
        ret.set_circular(circular);
        Ok(ret)
    }

    pub fn from_fasta_file(filename: &str) -> Result<Vec<DNAsequence>> {
        let file = File::open(filename)?;
        fasta::Reader::new(file)
            .records()
            .map(|record| {
                let record = record?;
                DNAsequence::from_fasta_record(&record).map_err(|e| anyhow!("{e}"))
            })
            .collect()
    }

    pub fn from_genbank_file(filename: &str) -> Result<Vec<DNAsequence>> {
        gb_io::reader::parse_file(filename)?
            .into_iter()
            .map(|seq| DNAsequence::from_genbank_seq(seq).map_err(|e| anyhow!("{e}")))
            .collect()
    }

    pub fn from_genbank_seq(mut seq: Seq) -> EngineResult<Self> {
        seq.seq = Self::validate_dna_sequence(seq.name.as_deref(), &seq.seq)?;
        seq.len = Some(seq.seq.len());
        Ok(Self { seq })
    }

    pub fn from_fasta_record(record: &fasta::Record) -> EngineResult<Self> {
        let name = record.id().to_string();
        let bases = Self::validate_dna_sequence(Some(&name), record.seq())?;
        let mut ret = Self::from_u8(&bases);
        ret.seq.name = Some(name);
        if let Some(desc) = record.desc() {
            ret.seq.comments.push(desc.to_string())
        }
        Ok(ret)
    }

    fn from_u8(s: &[u8]) -> Self {
        let seq = Seq {
            name: None,
            topology: Topology::Linear,
            date: None,
            len: Some(s.len()),
            molecule_type: None,
            division: String::new(),
            definition: None,
            accession: None,
            version: None,
            source: None,
            dblink: None,
            keywords: None,
            references: vec![],
            comments: vec![],
            seq: s.to_vec(),
            contig: None,
            features: vec![],
        };
        Self { seq }
    }

    /// Strips whitespace and upper-cases; anything that is not an IUPAC
    /// nucleotide letter is rejected.
    pub fn validate_dna_sequence(name: Option<&str>, v: &[u8]) -> EngineResult<DNAstring> {
        let mut ret = Vec::with_capacity(v.len());
        for (i, c) in v.iter().enumerate() {
            if c.is_ascii_whitespace() {
                continue;
            }
            if !IupacCode::is_valid_letter(*c) {
                return Err(EngineError::invalid_input(format!(
                    "Sequence '{}' contains invalid nucleotide '{}' at offset {i}",
                    name.unwrap_or("unnamed"),
                    *c as char
                )));
            }
            ret.push(c.to_ascii_uppercase());
        }
        Ok(ret)
    }

    /// Slice between two top-strand boundaries. On a circular sequence the
    /// boundaries may lie up to one full length outside `0..=len` and wrap
    /// once; anything further is a double wrap. On a linear sequence they must
    /// stay within `0..=len`.
    pub fn slice_wrapped(&self, start: isize, end: isize) -> EngineResult<String> {
        let len = self.len() as isize;
        if end < start {
            return Err(EngineError::geometry(format!(
                "Slice {start}..{end} of '{}' is reversed",
                self.display_name()
            )));
        }
        if !self.is_circular() {
            if start < 0 || end > len {
                return Err(EngineError::geometry(format!(
                    "Slice {start}..{end} is outside linear sequence '{}' of length {len}",
                    self.display_name()
                )));
            }
            return Ok(String::from_utf8_lossy(&self.forward()[start as usize..end as usize])
                .to_string());
        }
        if start < -len || end > 2 * len || end - start > len {
            return Err(EngineError::geometry(format!(
                "Slice {start}..{end} wraps more than once around circular sequence '{}' of length {len}",
                self.display_name()
            )));
        }
        let ret: Vec<u8> = (start..end)
            .map(|i| self.forward()[i.rem_euclid(len) as usize])
            .collect();
        Ok(String::from_utf8_lossy(&ret).to_string())
    }

    /// Circular left-shift so that `origin` becomes position 0. Feature
    /// locations are re-anchored by gb-io.
    pub fn rotated(&self, origin: usize) -> DNAsequence {
        if !self.is_circular() || self.is_empty() || origin % self.len() == 0 {
            return self.clone();
        }
        let seq = self.seq.set_origin((origin % self.len()) as i64);
        Self { seq }
    }

    pub fn reverse_complement(&self) -> DNAsequence {
        let mut ret = self.clone();
        ret.seq.seq = reverse_complement_bytes(self.forward());
        ret.seq.features = vec![];
        ret
    }

    /// Whether `needle` occurs on either strand, across the origin for
    /// circular sequences.
    pub fn contains_either_strand(&self, needle: &str) -> bool {
        let needle = needle.to_ascii_uppercase();
        if needle.is_empty() {
            return true;
        }
        let haystack = self.search_haystack(needle.len());
        haystack.contains(&needle) || haystack.contains(&reverse_complement(&needle))
    }

    /// Number of start positions where `needle` matches on either strand.
    pub fn count_either_strand(&self, needle: &str) -> usize {
        let needle = needle.to_ascii_uppercase();
        if needle.is_empty() || needle.len() > self.len() {
            return 0;
        }
        let haystack = self.search_haystack(needle.len());
        let rc = reverse_complement(&needle);
        let count = |pattern: &str| {
            (0..=haystack.len() - pattern.len())
                .filter(|i| haystack[*i..].starts_with(pattern))
                .count()
        };
        let forward = count(&needle);
        if rc == needle {
            forward
        } else {
            forward + count(&rc)
        }
    }

    /// The forward string, extended by `extra - 1` bases from the origin when
    /// circular so that matches spanning the origin are found.
    pub(crate) fn search_haystack(&self, extra: usize) -> String {
        let mut ret = self.get_forward_string();
        if self.is_circular() && extra > 1 {
            let wrap = (extra - 1).min(self.len());
            ret.push_str(&String::from_utf8_lossy(&self.forward()[..wrap]));
        }
        ret
    }

    /// Identical for every rotation and for both strands of a circular
    /// sequence; the plain forward string for a linear one.
    pub fn canonical_key(&self) -> String {
        if !self.is_circular() {
            return self.get_forward_string();
        }
        let forward = least_rotation_string(self.forward());
        let reverse = least_rotation_string(&reverse_complement_bytes(self.forward()));
        forward.min(reverse)
    }

    #[inline(always)]
    fn forward(&self) -> &Vec<u8> {
        &self.seq.seq
    }

    pub fn bases(&self) -> &[u8] {
        self.forward()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.forward().len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward().is_empty()
    }

    pub fn features(&self) -> &Vec<Feature> {
        &self.seq.features
    }

    pub fn features_mut(&mut self) -> &mut Vec<Feature> {
        &mut self.seq.features
    }

    pub fn name(&self) -> &Option<String> {
        &self.seq.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.seq.name = Some(name.to_string());
    }

    pub fn display_name(&self) -> String {
        self.seq.name.clone().unwrap_or_else(|| "unnamed".to_string())
    }

    pub fn description(&self) -> &Vec<String> {
        &self.seq.comments
    }

    pub fn get_forward_string(&self) -> String {
        String::from_utf8_lossy(self.forward()).to_string()
    }

    pub fn is_circular(&self) -> bool {
        self.seq.topology == Topology::Circular
    }

    pub fn set_circular(&mut self, is_circular: bool) {
        self.seq.topology = match is_circular {
            true => Topology::Circular,
            false => Topology::Linear,
        };
    }
}

impl fmt::Display for DNAsequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_forward_string())
    }
}

impl PartialEq for DNAsequence {
    fn eq(&self, other: &Self) -> bool {
        self.is_circular() == other.is_circular() && self.forward() == other.forward()
    }
}

/// Booth's least-rotation algorithm
fn least_rotation(s: &[u8]) -> usize {
    let n = s.len() as isize;
    if n == 0 {
        return 0;
    }
    let at = |i: isize| s[(i % n) as usize];
    let mut f: Vec<isize> = vec![-1; 2 * n as usize];
    let mut k: isize = 0;
    for j in 1..2 * n {
        let sj = at(j);
        let mut i = f[(j - k - 1) as usize];
        while i != -1 && sj != at(k + i + 1) {
            if sj < at(k + i + 1) {
                k = j - i - 1;
            }
            i = f[i as usize];
        }
        if i == -1 && sj != at(k) {
            if sj < at(k) {
                k = j;
            }
            f[(j - k) as usize] = -1;
        } else {
            f[(j - k) as usize] = i + 1;
        }
    }
    k as usize
}

fn least_rotation_string(s: &[u8]) -> String {
    let k = least_rotation(s);
    let rotated: Vec<u8> = s[k..].iter().chain(s[..k].iter()).copied().collect();
    String::from_utf8_lossy(&rotated).to_string()
}
