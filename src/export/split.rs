//! Date-based train / validation / test split.
//!
//! Two cutoffs define three half-open ranges, so every date lands in exactly
//! one partition:
//!
//! ```text
//! train:  date <  valid_start
//! valid:  valid_start <= date < test_start
//! test:   test_start  <= date
//! ```

use crate::error::parse_date;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One of the three dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Train,
    Valid,
    Test,
}

impl Partition {
    pub fn all() -> [Partition; 3] {
        [Partition::Train, Partition::Valid, Partition::Test]
    }

    /// File stem used for exported arrays.
    pub fn name(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Valid => "valid",
            Partition::Test => "test",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Partition cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// First validation date
    pub valid_start: NaiveDate,

    /// First test date
    pub test_start: NaiveDate,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            valid_start: NaiveDate::from_ymd_opt(2012, 1, 1).unwrap_or_default(),
            test_start: NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or_default(),
        }
    }
}

impl SplitConfig {
    pub fn new(valid_start: NaiveDate, test_start: NaiveDate) -> Self {
        Self {
            valid_start,
            test_start,
        }
    }

    /// Parse both cutoffs from `YYYY-MM-DD` strings.
    pub fn parse(valid_start: &str, test_start: &str) -> crate::error::Result<Self> {
        Ok(Self::new(parse_date(valid_start)?, parse_date(test_start)?))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.valid_start >= self.test_start {
            return Err(format!(
                "valid_start ({}) must be before test_start ({})",
                self.valid_start, self.test_start
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn partition_of(&self, date: NaiveDate) -> Partition {
        if date < self.valid_start {
            Partition::Train
        } else if date < self.test_start {
            Partition::Valid
        } else {
            Partition::Test
        }
    }

    /// Row ranges of each partition over chronologically sorted dates.
    pub fn split_indices(&self, dates: &[NaiveDate]) -> PartitionRanges {
        let valid_from = dates.partition_point(|d| *d < self.valid_start);
        let test_from = dates.partition_point(|d| *d < self.test_start);
        PartitionRanges {
            train: 0..valid_from,
            valid: valid_from..test_from,
            test: test_from..dates.len(),
        }
    }
}

/// Contiguous row ranges of the three partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRanges {
    pub train: Range<usize>,
    pub valid: Range<usize>,
    pub test: Range<usize>,
}

impl PartitionRanges {
    pub fn get(&self, partition: Partition) -> Range<usize> {
        match partition {
            Partition::Train => self.train.clone(),
            Partition::Valid => self.valid.clone(),
            Partition::Test => self.test.clone(),
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }
}
