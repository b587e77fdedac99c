//! Fidel decomposition tables.
//!
//! Every syllabic glyph of the Amharic Fidel is written as a consonant carrying
//! a vowel order. The decomposition table splits a glyph into base units:
//!
//! - the consonant, written as its 6th-order (vowelless) glyph, e.g. `ል`
//! - the vowel carrier for orders 1-5 and 7: `አ ኡ ኢ ኣ ኤ ኦ`
//! - the labialization mark `ʷ` for `wa`-forms and the labiovelar rows
//!
//! ```text
//! ለ → ል አ      ሉ → ል ኡ      ል → ል      ሏ → ል ʷ ኣ      ቋ → ቅ ʷ ኣ
//! ```
//!
//! Vowel glyphs decompose through the glottal consonant (`አ → እ አ`), so a
//! vowel carrier never starts a glyph's sequence. That makes every glyph
//! sequence uniquely recoverable by the longest-match scan in
//! [`FidelTable::reconstruct_word`]; [`FidelTable::validate`] checks it.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use crate::error::TableError;

/// Reserved end-of-word marker appended to every preprocessed word.
pub const EOW: &str = "<eow>";

/// Reserved marker for tokens and IDs outside the registry.
pub const UNK: &str = "<unk>";

/// Labialization mark used by `wa`-forms and labiovelar glyphs.
pub const LABIAL_MARK: char = 'ʷ';

/// Consonant rows in vowel-order sequence (ä u i a e ə o), followed by the
/// labialized `wa` glyph where Unicode defines one.
const SYLLABLE_ROWS: &[&str] = &[
    "ሀሁሂሃሄህሆ",
    "ለሉሊላሌልሎሏ",
    "ሐሑሒሓሔሕሖሗ",
    "መሙሚማሜምሞሟ",
    "ሠሡሢሣሤሥሦሧ",
    "ረሩሪራሬርሮሯ",
    "ሰሱሲሳሴስሶሷ",
    "ሸሹሺሻሼሽሾሿ",
    "ቀቁቂቃቄቅቆ",
    "በቡቢባቤብቦቧ",
    "ቨቩቪቫቬቭቮቯ",
    "ተቱቲታቴትቶቷ",
    "ቸቹቺቻቼችቾቿ",
    "ኀኁኂኃኄኅኆ",
    "ነኑኒናኔንኖኗ",
    "ኘኙኚኛኜኝኞኟ",
    "አኡኢኣኤእኦኧ",
    "ከኩኪካኬክኮ",
    "ኸኹኺኻኼኽኾ",
    "ወዉዊዋዌውዎ",
    "ዐዑዒዓዔዕዖ",
    "ዘዙዚዛዜዝዞዟ",
    "ዠዡዢዣዤዥዦዧ",
    "የዩዪያዬይዮ",
    "ደዱዲዳዴድዶዷ",
    "ጀጁጂጃጄጅጆጇ",
    "ገጉጊጋጌግጎ",
    "ጠጡጢጣጤጥጦጧ",
    "ጨጩጪጫጬጭጮጯ",
    "ጰጱጲጳጴጵጶጷ",
    "ጸጹጺጻጼጽጾጿ",
    "ፀፁፂፃፄፅፆ",
    "ፈፉፊፋፌፍፎፏ",
    "ፐፑፒፓፔፕፖፗ",
];

/// Labiovelar rows (orders ä i a e ə) keyed by their plain consonant.
const LABIOVELAR_ROWS: &[(char, &str)] = &[
    ('ቅ', "ቈቊቋቌቍ"),
    ('ኅ', "ኈኊኋኌኍ"),
    ('ክ', "ኰኲኳኴኵ"),
    ('ግ', "ጐጒጓጔጕ"),
];

/// Vowel carrier per order of a [`SYLLABLE_ROWS`] entry; the 6th order has none.
const ORDER_VOWELS: [Option<char>; 7] = [
    Some('አ'),
    Some('ኡ'),
    Some('ኢ'),
    Some('ኣ'),
    Some('ኤ'),
    None,
    Some('ኦ'),
];

/// Vowel carrier per order of a [`LABIOVELAR_ROWS`] entry.
const LABIOVELAR_VOWELS: [Option<char>; 5] = [Some('አ'), Some('ኢ'), Some('ኣ'), Some('ኤ'), None];

/// Vowel carried by every 8th-order `wa` glyph.
const WA_VOWEL: char = 'ኣ';

/// First and last code point of the Ethiopic block.
const ETHIOPIC_BLOCK: std::ops::RangeInclusive<char> = '\u{1200}'..='\u{137F}';

static TABLE: LazyLock<FidelTable> = LazyLock::new(FidelTable::build);

/// The process-wide decomposition table.
pub fn table() -> &'static FidelTable {
    &TABLE
}

/// Glyph ↔ base-unit tables.
#[derive(Debug)]
pub struct FidelTable {
    /// Entries in authoring order, kept for validation.
    entries: Vec<(char, Vec<char>)>,
    decompositions: HashMap<char, Vec<char>>,
    reverse: HashMap<String, char>,
    max_key_chars: usize,
}

impl FidelTable {
    fn build() -> Self {
        let mut entries = Vec::new();

        for row in SYLLABLE_ROWS {
            let glyphs: Vec<char> = row.chars().collect();
            let consonant = glyphs[5];
            for (glyph, vowel) in glyphs.iter().zip(ORDER_VOWELS) {
                let mut units = vec![consonant];
                units.extend(vowel);
                entries.push((*glyph, units));
            }
            if let Some(&wa) = glyphs.get(7) {
                entries.push((wa, vec![consonant, LABIAL_MARK, WA_VOWEL]));
            }
        }

        for &(consonant, row) in LABIOVELAR_ROWS {
            for (glyph, vowel) in row.chars().zip(LABIOVELAR_VOWELS) {
                let mut units = vec![consonant, LABIAL_MARK];
                units.extend(vowel);
                entries.push((glyph, units));
            }
        }

        Self::from_entries(entries)
    }

    /// Build a table from explicit `(glyph, units)` entries.
    ///
    /// Later entries win on duplicate keys; [`validate`](Self::validate)
    /// reports such overlaps.
    pub fn from_entries(entries: Vec<(char, Vec<char>)>) -> Self {
        let mut decompositions = HashMap::with_capacity(entries.len());
        let mut reverse = HashMap::with_capacity(entries.len());
        let mut max_key_chars = 0;

        for (glyph, units) in &entries {
            decompositions.insert(*glyph, units.clone());
            reverse.insert(units.iter().collect::<String>(), *glyph);
            max_key_chars = max_key_chars.max(units.len());
        }

        Self {
            entries,
            decompositions,
            reverse,
            max_key_chars,
        }
    }

    /// Number of glyphs in the table.
    pub fn len(&self) -> usize {
        self.decompositions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decompositions.is_empty()
    }

    /// Base units of `glyph`, or `None` if the glyph is not in the table.
    pub fn decompose(&self, glyph: char) -> Option<&[char]> {
        self.decompositions.get(&glyph).map(Vec::as_slice)
    }

    /// Glyph whose units concatenate to `units`.
    pub fn compose(&self, units: &str) -> Option<char> {
        self.reverse.get(units).copied()
    }

    /// Longest reverse-table key, in characters.
    pub fn max_key_chars(&self) -> usize {
        self.max_key_chars
    }

    /// Every distinct base unit used by the table.
    pub fn base_units(&self) -> BTreeSet<String> {
        self.decompositions
            .values()
            .flatten()
            .map(|unit| unit.to_string())
            .collect()
    }

    /// Decompose one whitespace-free word into base units plus [`EOW`].
    ///
    /// Characters outside the table pass through as single literal units.
    pub fn preprocess_word(&self, word: &str) -> Vec<String> {
        let mut units = Vec::with_capacity(word.len() + 1);
        for ch in word.chars() {
            match self.decompose(ch) {
                Some(parts) => units.extend(parts.iter().map(|u| u.to_string())),
                None => units.push(ch.to_string()),
            }
        }
        units.push(EOW.to_string());
        units
    }

    /// Split `text` on whitespace and decompose each word.
    pub fn preprocess(&self, text: &str) -> Vec<Vec<String>> {
        text.split_whitespace()
            .map(|word| self.preprocess_word(word))
            .collect()
    }

    /// Rebuild glyphs from a concatenated unit string by longest match.
    ///
    /// At each position the longest reverse-table key wins; unmatched
    /// characters are emitted as-is.
    pub fn reconstruct_word(&self, units: &str) -> String {
        let chars: Vec<char> = units.chars().collect();
        let mut out = String::with_capacity(units.len());
        let mut i = 0;

        while i < chars.len() {
            let longest = self.max_key_chars.min(chars.len() - i);
            let matched = (1..=longest).rev().find_map(|len| {
                let key: String = chars[i..i + len].iter().collect();
                self.compose(&key).map(|glyph| (glyph, len))
            });

            match matched {
                Some((glyph, len)) => {
                    out.push(glyph);
                    i += len;
                }
                None => {
                    out.push(chars[i]);
                    i += 1;
                }
            }
        }

        out
    }

    /// Check the table for authoring defects.
    ///
    /// Rejects empty sequences and two glyphs sharing one concatenation, then
    /// reads back every glyph sequence short enough to fall inside one
    /// longest-match window and rejects any that rebuilds differently.
    pub fn validate(&self) -> Result<(), TableError> {
        let mut seen: HashMap<String, char> = HashMap::with_capacity(self.entries.len());

        for (glyph, units) in &self.entries {
            if units.is_empty() {
                return Err(TableError::EmptySequence(*glyph));
            }
            let key: String = units.iter().collect();
            if let Some(&first) = seen.get(&key) {
                return Err(TableError::Collision {
                    first,
                    second: *glyph,
                    units: key,
                });
            }
            seen.insert(key, *glyph);
        }

        let keys: Vec<(char, &[char])> = self
            .entries
            .iter()
            .map(|(glyph, units)| (*glyph, units.as_slice()))
            .collect();

        for &(first, first_units) in &keys {
            self.check_reads_back(&[(first, first_units)])?;
            for &(second, second_units) in &keys {
                let pair = [(first, first_units), (second, second_units)];
                self.check_reads_back(&pair)?;
                if first_units.len() + second_units.len() < self.max_key_chars {
                    for &third in &keys {
                        self.check_reads_back(&[pair[0], pair[1], third])?;
                    }
                }
            }
        }

        Ok(())
    }

    fn check_reads_back(&self, glyphs: &[(char, &[char])]) -> Result<(), TableError> {
        let units: String = glyphs.iter().flat_map(|(_, u)| u.iter()).collect();
        let expected: String = glyphs.iter().map(|(g, _)| *g).collect();
        let reconstructed = self.reconstruct_word(&units);
        if reconstructed != expected {
            return Err(TableError::Ambiguous {
                expected,
                reconstructed,
            });
        }
        Ok(())
    }
}

/// Validate the built-in table.
pub fn validate_table() -> Result<(), TableError> {
    table().validate()
}

/// Reduce raw text to Ethiopic characters separated by single spaces.
///
/// Latin letters, digits and anything outside U+1200..=U+137F are dropped.
pub fn normalize_corpus(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| ETHIOPIC_BLOCK.contains(c) || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
