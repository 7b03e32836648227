const DNA_BITMASK_A: u8 = 1;
const DNA_BITMASK_C: u8 = 2;
const DNA_BITMASK_G: u8 = 4;
const DNA_BITMASK_T: u8 = 8;
const DNA_BITMASK_N: u8 = DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T;

/// A bitmasked IUPAC code for DNA bases, eg DNA_BITMASK_A|DNA_BITMASK_C
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IupacCode(u8);

impl IupacCode {
    #[inline(always)]
    pub fn from_letter(letter: u8) -> Self {
        match letter.to_ascii_uppercase() {
            b'A' => Self(DNA_BITMASK_A),
            b'C' => Self(DNA_BITMASK_C),
            b'G' => Self(DNA_BITMASK_G),
            b'T' => Self(DNA_BITMASK_T),
            b'U' => Self(DNA_BITMASK_T),
            b'W' => Self(DNA_BITMASK_A | DNA_BITMASK_T),
            b'S' => Self(DNA_BITMASK_C | DNA_BITMASK_G),
            b'M' => Self(DNA_BITMASK_A | DNA_BITMASK_C),
            b'K' => Self(DNA_BITMASK_G | DNA_BITMASK_T),
            b'R' => Self(DNA_BITMASK_A | DNA_BITMASK_G),
            b'Y' => Self(DNA_BITMASK_C | DNA_BITMASK_T),
            b'B' => Self(DNA_BITMASK_C | DNA_BITMASK_G | DNA_BITMASK_T),
            b'D' => Self(DNA_BITMASK_A | DNA_BITMASK_G | DNA_BITMASK_T),
            b'H' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_T),
            b'V' => Self(DNA_BITMASK_A | DNA_BITMASK_C | DNA_BITMASK_G),
            b'N' => Self(DNA_BITMASK_N),
            _ => Self(0),
        }
    }

    /// Inverse of `from_letter`; the empty code maps to `N`.
    pub fn to_letter(self) -> u8 {
        match self.0 {
            DNA_BITMASK_A => b'A',
            DNA_BITMASK_C => b'C',
            DNA_BITMASK_G => b'G',
            DNA_BITMASK_T => b'T',
            0b1001 => b'W',
            0b0110 => b'S',
            0b0011 => b'M',
            0b1100 => b'K',
            0b0101 => b'R',
            0b1010 => b'Y',
            0b1110 => b'B',
            0b1101 => b'D',
            0b1011 => b'H',
            0b0111 => b'V',
            _ => b'N',
        }
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of concrete bases this code stands for.
    #[inline(always)]
    pub fn degeneracy(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Swaps A<->T and C<->G inside the bitmask.
    pub fn complement(self) -> Self {
        let mut ret = 0;
        if self.0 & DNA_BITMASK_A != 0 {
            ret |= DNA_BITMASK_T;
        }
        if self.0 & DNA_BITMASK_T != 0 {
            ret |= DNA_BITMASK_A;
        }
        if self.0 & DNA_BITMASK_C != 0 {
            ret |= DNA_BITMASK_G;
        }
        if self.0 & DNA_BITMASK_G != 0 {
            ret |= DNA_BITMASK_C;
        }
        Self(ret)
    }

    #[inline(always)]
    pub fn is_valid_letter(letter: u8) -> bool {
        !Self::from_letter(letter).is_empty()
    }

    #[inline(always)]
    pub fn to_vec(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(4);
        if self.0 & DNA_BITMASK_A != 0 {
            ret.push(b'A');
        }
        if self.0 & DNA_BITMASK_C != 0 {
            ret.push(b'C');
        }
        if self.0 & DNA_BITMASK_G != 0 {
            ret.push(b'G');
        }
        if self.0 & DNA_BITMASK_T != 0 {
            ret.push(b'T');
        }
        ret
    }

    #[inline(always)]
    pub fn letter_complement(letter: u8) -> u8 {
        let code = Self::from_letter(letter);
        if code.is_empty() {
            return b'N';
        }
        code.complement().to_letter()
    }

    /// Number of concrete strings a (possibly degenerate) pattern expands to,
    /// saturating instead of overflowing.
    pub fn expansion_count(pattern: &[u8]) -> usize {
        pattern.iter().fold(1usize, |acc, letter| {
            acc.saturating_mul(Self::from_letter(*letter).degeneracy().max(1))
        })
    }

    /// Every concrete A/C/G/T string implied by `pattern`. Returns `None` when
    /// more than `max` strings would be produced, or the pattern holds a
    /// non-IUPAC letter.
    pub fn expand_pattern(pattern: &[u8], max: usize) -> Option<Vec<Vec<u8>>> {
        if Self::expansion_count(pattern) > max {
            return None;
        }
        let mut ret: Vec<Vec<u8>> = vec![Vec::with_capacity(pattern.len())];
        for letter in pattern {
            let options = Self::from_letter(*letter).to_vec();
            if options.is_empty() {
                return None;
            }
            ret = ret
                .into_iter()
                .flat_map(|prefix| {
                    options.iter().map(move |base| {
                        let mut next = prefix.clone();
                        next.push(*base);
                        next
                    })
                })
                .collect();
        }
        Some(ret)
    }
}

pub fn reverse_complement_bytes(seq: &[u8]) -> Vec<u8> {
    seq.iter()
        .rev()
        .map(|c| IupacCode::letter_complement(*c))
        .collect()
}

pub fn reverse_complement(seq: &str) -> String {
    seq.as_bytes()
        .iter()
        .rev()
        .map(|c| IupacCode::letter_complement(*c))
        .map(char::from)
        .collect()
}
