//! Scripture reference files and verse-reference statistics.
//!
//! A scripture file holds one verse per line, aligned line-for-line with the
//! versification file (`vref.txt`), whose lines are references like `GEN 1:1`.
//! An empty line is a missing verse; `<range>` marks a verse merged into the
//! previous one.

use std::{
  collections::BTreeMap,
  fmt,
  path::{Path, PathBuf},
};

use serde::Serialize;

/// Marker line for a verse merged into the preceding verse
pub const RANGE_MARKER: &str = "<range>";

/// Book ids in canonical order: Old Testament, New Testament, then deuterocanon.
pub const CANONICAL_BOOKS: &[&str] = &[
  // Old Testament
  "GEN", "EXO", "LEV", "NUM", "DEU", "JOS", "JDG", "RUT", "1SA", "2SA", "1KI", "2KI", "1CH", "2CH", "EZR", "NEH",
  "EST", "JOB", "PSA", "PRO", "ECC", "SNG", "ISA", "JER", "LAM", "EZK", "DAN", "HOS", "JOL", "AMO", "OBA", "JON",
  "MIC", "NAM", "HAB", "ZEP", "HAG", "ZEC", "MAL",
  // New Testament
  "MAT", "MRK", "LUK", "JHN", "ACT", "ROM", "1CO", "2CO", "GAL", "EPH", "PHP", "COL", "1TH", "2TH", "1TI", "2TI",
  "TIT", "PHM", "HEB", "JAS", "1PE", "2PE", "1JN", "2JN", "3JN", "JUD", "REV",
  // Deuterocanon
  "TOB", "JDT", "ESG", "WIS", "SIR", "BAR", "LJE", "S3Y", "SUS", "BEL", "1MA", "2MA", "3MA", "4MA", "1ES", "2ES",
  "MAN", "PS2", "ODA", "PSS", "JSA", "JDB", "TBS", "SST", "DNT", "BLT", "EZA", "5EZ", "6EZ", "DAG", "PS3", "2BA",
  "LBA", "JUB", "ENO", "1MQ", "2MQ", "3MQ", "REP", "4BA", "LAO",
];

const OT_BOOKS: usize = 39;
const NT_BOOKS: usize = 27;

/// Zero-based canonical position of a book id.
pub fn book_number(id: &str) -> Option<usize> {
  CANONICAL_BOOKS.iter().position(|b| *b == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Testament {
  #[serde(rename = "OT")]
  Old,
  #[serde(rename = "NT")]
  New,
  #[serde(rename = "DT")]
  Deuterocanon,
}

impl Testament {
  pub fn of_book(number: usize) -> Self {
    if number < OT_BOOKS {
      Testament::Old
    } else if number < OT_BOOKS + NT_BOOKS {
      Testament::New
    } else {
      Testament::Deuterocanon
    }
  }
}

// ============================================================================
// Versification
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum VersificationError {
  #[error("failed to read versification {}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("line {line}: invalid verse reference '{text}'")]
  InvalidReference { line: usize, text: String },
  #[error("line {line}: unknown book '{book}'")]
  UnknownBook { line: usize, book: String },
  #[error("versification is empty")]
  Empty,
}

/// A single parsed verse reference such as `GEN 1:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerseRef {
  /// Canonical book number (see [`CANONICAL_BOOKS`])
  pub book: usize,
  pub chapter: u32,
  pub verse: u32,
}

impl VerseRef {
  /// Parse `BOOK C:V`. Verse segments like `3a` keep their leading number.
  pub fn parse(text: &str, line: usize) -> Result<Self, VersificationError> {
    let invalid = || VersificationError::InvalidReference {
      line,
      text: text.to_string(),
    };

    let (book, rest) = text.trim().split_once(' ').ok_or_else(invalid)?;
    let (chapter, verse) = rest.trim().split_once(':').ok_or_else(invalid)?;
    let chapter: u32 = chapter.parse().map_err(|_| invalid())?;
    let digits: String = verse.chars().take_while(|c| c.is_ascii_digit()).collect();
    let verse: u32 = digits.parse().map_err(|_| invalid())?;

    let book = book_number(book).ok_or_else(|| VersificationError::UnknownBook {
      line,
      book: book.to_string(),
    })?;

    Ok(Self { book, chapter, verse })
  }

  pub fn book_id(&self) -> &'static str {
    CANONICAL_BOOKS[self.book]
  }
}

impl fmt::Display for VerseRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}:{}", self.book_id(), self.chapter, self.verse)
  }
}

/// Line-indexed verse references, shared by every scripture file.
#[derive(Debug, Clone)]
pub struct Versification {
  refs: Vec<VerseRef>,
  book_totals: BTreeMap<usize, usize>,
}

impl Versification {
  pub fn parse(content: &str) -> Result<Self, VersificationError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut refs = Vec::new();
    let mut book_totals = BTreeMap::new();

    for (idx, line) in content.lines().enumerate() {
      let verse = VerseRef::parse(line, idx + 1)?;
      *book_totals.entry(verse.book).or_insert(0) += 1;
      refs.push(verse);
    }

    if refs.is_empty() {
      return Err(VersificationError::Empty);
    }

    Ok(Self { refs, book_totals })
  }

  pub fn load(path: &Path) -> Result<Self, VersificationError> {
    let content = std::fs::read_to_string(path).map_err(|source| VersificationError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content)
  }

  pub fn len(&self) -> usize {
    self.refs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.refs.is_empty()
  }

  pub fn get(&self, line: usize) -> Option<&VerseRef> {
    self.refs.get(line)
  }

  /// Number of verses the versification assigns to a book.
  pub fn book_total(&self, book: usize) -> usize {
    self.book_totals.get(&book).copied().unwrap_or(0)
  }
}

// ============================================================================
// Statistics
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptureError {
  #[error("file is empty")]
  Empty,
  #[error("has {found} lines but the versification has {expected}")]
  Misaligned { found: usize, expected: usize },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestamentCounts {
  #[serde(rename = "OT")]
  pub ot: usize,
  #[serde(rename = "NT")]
  pub nt: usize,
  #[serde(rename = "DT")]
  pub dt: usize,
}

impl TestamentCounts {
  fn add(&mut self, testament: Testament) {
    match testament {
      Testament::Old => self.ot += 1,
      Testament::New => self.nt += 1,
      Testament::Deuterocanon => self.dt += 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookCoverage {
  pub book: String,
  /// Lines with text (including range markers)
  pub verses: usize,
  /// Lines the versification assigns to the book
  pub total: usize,
}

/// Statistics for one scripture file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptureStats {
  pub name: String,
  pub lang_code: String,
  pub path: PathBuf,
  pub line_count: usize,
  pub verse_count: usize,
  pub range_count: usize,
  /// Fraction of lines that carry text
  pub coverage: f64,
  pub testaments: TestamentCounts,
  /// Books with at least one verse, in canonical order
  pub books: Vec<BookCoverage>,
  pub complete_books: Vec<String>,
}

impl ScriptureStats {
  /// Compute statistics for a file's contents.
  ///
  /// Without a versification only the line-level counts are filled in.
  pub fn compute(
    name: &str,
    path: &Path,
    content: &str,
    versification: Option<&Versification>,
  ) -> Result<Self, ScriptureError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    if content.trim().is_empty() {
      return Err(ScriptureError::Empty);
    }

    let lines: Vec<&str> = content.lines().collect();
    if let Some(vref) = versification
      && lines.len() != vref.len()
    {
      return Err(ScriptureError::Misaligned {
        found: lines.len(),
        expected: vref.len(),
      });
    }

    let mut verse_count = 0;
    let mut range_count = 0;
    let mut testaments = TestamentCounts::default();
    let mut per_book: BTreeMap<usize, usize> = BTreeMap::new();

    for (idx, line) in lines.iter().enumerate() {
      let text = line.trim();
      if text.is_empty() {
        continue;
      }
      if text == RANGE_MARKER {
        range_count += 1;
      } else {
        verse_count += 1;
      }

      if let Some(verse) = versification.and_then(|v| v.get(idx)) {
        *per_book.entry(verse.book).or_insert(0) += 1;
        testaments.add(Testament::of_book(verse.book));
      }
    }

    let mut books = Vec::with_capacity(per_book.len());
    let mut complete_books = Vec::new();
    if let Some(vref) = versification {
      for (book, verses) in per_book {
        let total = vref.book_total(book);
        let id = CANONICAL_BOOKS[book].to_string();
        if verses == total {
          complete_books.push(id.clone());
        }
        books.push(BookCoverage { book: id, verses, total });
      }
    }

    let line_count = lines.len();
    let coverage = (verse_count + range_count) as f64 / line_count as f64;

    Ok(Self {
      name: name.to_string(),
      lang_code: name.split('-').next().unwrap_or(name).to_string(),
      path: path.to_path_buf(),
      line_count,
      verse_count,
      range_count,
      coverage,
      testaments,
      books,
      complete_books,
    })
  }
}
