//! Collector experiment flags
//!
//! A process-wide bitmask that selects tuned collector behaviors. The flags are set once at
//! runtime start from external configuration and are read-only afterwards. Bits that no
//! consumer recognizes are kept but ignored.

use std::{fmt, str::FromStr};

use bitflags::bitflags;
use once_cell::sync::OnceCell;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExperimentFlags: u32 {
        /// Sequential access advice for the main heap
        const MADVISE_SEQUENTIAL = 1 << 2;
        /// Random access advice for the main heap
        const MADVISE_RANDOM = 1 << 3;
        /// Sequential access advice for string storage
        const MADVISE_STRINGS_SEQUENTIAL = 1 << 4;
        /// Random access advice for string storage
        const MADVISE_STRINGS_RANDOM = 1 << 5;
        /// Prefetch advice for string storage
        const MADVISE_STRINGS_WILL_NEED = 1 << 6;
        /// Verify bytecode checksums when loading
        const VERIFY_BYTECODE_CHECKSUM = 1 << 7;
        /// Do not warn on memory pressure
        const IGNORE_MEMORY_WARNINGS = 1 << 9;
        /// Use the compacting strategy of the concurrent collector
        const HADES_COMPACTION = 1 << 10;
    }
}

/// Kebab-case names accepted by `FromStr` and printed by `Display`.
const FLAG_NAMES: [(&str, ExperimentFlags); 8] = [
    ("madvise-sequential", ExperimentFlags::MADVISE_SEQUENTIAL),
    ("madvise-random", ExperimentFlags::MADVISE_RANDOM),
    ("madvise-strings-sequential", ExperimentFlags::MADVISE_STRINGS_SEQUENTIAL),
    ("madvise-strings-random", ExperimentFlags::MADVISE_STRINGS_RANDOM),
    ("madvise-strings-will-need", ExperimentFlags::MADVISE_STRINGS_WILL_NEED),
    ("verify-bytecode-checksum", ExperimentFlags::VERIFY_BYTECODE_CHECKSUM),
    ("ignore-memory-warnings", ExperimentFlags::IGNORE_MEMORY_WARNINGS),
    ("hades-compaction", ExperimentFlags::HADES_COMPACTION),
];

/// Memory access advice for a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAdvice {
    Normal,
    Sequential,
    Random,
    WillNeed,
}

impl ExperimentFlags {
    /// No experiments enabled.
    pub const DEFAULT: ExperimentFlags = ExperimentFlags::empty();

    /// Build from a raw bitmask, keeping bits that are not defined here.
    #[inline]
    pub const fn from_raw(bits: u32) -> ExperimentFlags {
        ExperimentFlags::from_bits_retain(bits)
    }

    /// Access advice for the main heap.
    pub fn heap_advice(&self) -> MemoryAdvice {
        if self.contains(ExperimentFlags::MADVISE_SEQUENTIAL) {
            MemoryAdvice::Sequential
        } else if self.contains(ExperimentFlags::MADVISE_RANDOM) {
            MemoryAdvice::Random
        } else {
            MemoryAdvice::Normal
        }
    }

    /// Access advice for string storage.
    pub fn string_advice(&self) -> MemoryAdvice {
        if self.contains(ExperimentFlags::MADVISE_STRINGS_SEQUENTIAL) {
            MemoryAdvice::Sequential
        } else if self.contains(ExperimentFlags::MADVISE_STRINGS_RANDOM) {
            MemoryAdvice::Random
        } else if self.contains(ExperimentFlags::MADVISE_STRINGS_WILL_NEED) {
            MemoryAdvice::WillNeed
        } else {
            MemoryAdvice::Normal
        }
    }
}

impl fmt::Display for ExperimentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, flag) in FLAG_NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(",")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        let unknown = self.bits() & !ExperimentFlags::all().bits();
        if unknown != 0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{:#x}", unknown)?;
            first = false;
        }

        if first {
            f.write_str("default")?;
        }

        Ok(())
    }
}

/// An experiment name that is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseExperimentError {
    pub name: String,
}

impl fmt::Display for ParseExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown collector experiment `{}`", self.name)
    }
}

impl std::error::Error for ParseExperimentError {}

impl FromStr for ExperimentFlags {
    type Err = ParseExperimentError;

    /// Parse a list of experiment names separated by `,` or `|`. A term may also be a raw
    /// decimal or `0x` hex bitmask. `default` and the empty string are no experiments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = ExperimentFlags::DEFAULT;

        for term in s.split([',', '|']).map(str::trim).filter(|t| !t.is_empty()) {
            if term == "default" {
                continue;
            }

            if let Some((_, flag)) = FLAG_NAMES.iter().find(|(name, _)| *name == term) {
                flags |= *flag;
                continue;
            }

            let raw = match term.strip_prefix("0x").or_else(|| term.strip_prefix("0X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => term.parse::<u32>().ok(),
            };

            match raw {
                Some(bits) => flags |= ExperimentFlags::from_raw(bits),
                None => {
                    return Err(ParseExperimentError {
                        name: String::from(term),
                    })
                }
            }
        }

        Ok(flags)
    }
}

static EXPERIMENT_FLAGS: OnceCell<ExperimentFlags> = OnceCell::new();

/// The process-wide flags were already set (or already read) before initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentsAlreadySet {
    /// The flags that are in effect
    pub current: ExperimentFlags,
}

impl fmt::Display for ExperimentsAlreadySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collector experiments already set to {}", self.current)
    }
}

impl std::error::Error for ExperimentsAlreadySet {}

/// Set the process-wide experiment flags. Succeeds at most once.
pub fn init_experiment_flags(flags: ExperimentFlags) -> Result<(), ExperimentsAlreadySet> {
    EXPERIMENT_FLAGS.set(flags).map_err(|_| ExperimentsAlreadySet {
        current: experiment_flags(),
    })?;

    log::debug!("collector experiments: {}", flags);
    Ok(())
}

/// The process-wide experiment flags.
///
/// Reading before `init_experiment_flags` fixes the flags at `DEFAULT` for the rest of the
/// process.
#[inline]
pub fn experiment_flags() -> ExperimentFlags {
    *EXPERIMENT_FLAGS.get_or_init(|| ExperimentFlags::DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_DEFINED: [ExperimentFlags; 8] = [
        ExperimentFlags::MADVISE_SEQUENTIAL,
        ExperimentFlags::MADVISE_RANDOM,
        ExperimentFlags::MADVISE_STRINGS_SEQUENTIAL,
        ExperimentFlags::MADVISE_STRINGS_RANDOM,
        ExperimentFlags::MADVISE_STRINGS_WILL_NEED,
        ExperimentFlags::VERIFY_BYTECODE_CHECKSUM,
        ExperimentFlags::IGNORE_MEMORY_WARNINGS,
        ExperimentFlags::HADES_COMPACTION,
    ];

    #[test]
    fn test_bit_values() {
        assert_eq!(ExperimentFlags::DEFAULT.bits(), 0);
        assert_eq!(ExperimentFlags::MADVISE_SEQUENTIAL.bits(), 4);
        assert_eq!(ExperimentFlags::VERIFY_BYTECODE_CHECKSUM.bits(), 128);
        assert_eq!(ExperimentFlags::IGNORE_MEMORY_WARNINGS.bits(), 512);
        assert_eq!(ExperimentFlags::HADES_COMPACTION.bits(), 1024);
    }

    #[test]
    fn test_composition() {
        let flags = ExperimentFlags::MADVISE_SEQUENTIAL | ExperimentFlags::VERIFY_BYTECODE_CHECKSUM;

        for flag in ALL_DEFINED {
            let set = flag == ExperimentFlags::MADVISE_SEQUENTIAL
                || flag == ExperimentFlags::VERIFY_BYTECODE_CHECKSUM;
            assert_eq!((flags & flag).bits() != 0, set, "{:?}", flag);
        }
    }

    #[test]
    fn test_unknown_bits_retained_and_ignored() {
        let flags = ExperimentFlags::from_raw((1 << 31) | (1 << 7));
        assert!(flags.contains(ExperimentFlags::VERIFY_BYTECODE_CHECKSUM));
        assert_eq!(flags.bits(), (1 << 31) | (1 << 7));
        assert_eq!(flags.heap_advice(), MemoryAdvice::Normal);
    }

    #[test]
    fn test_advice() {
        assert_eq!(ExperimentFlags::DEFAULT.heap_advice(), MemoryAdvice::Normal);
        assert_eq!(
            ExperimentFlags::MADVISE_RANDOM.heap_advice(),
            MemoryAdvice::Random
        );
        assert_eq!(
            (ExperimentFlags::MADVISE_SEQUENTIAL | ExperimentFlags::MADVISE_RANDOM).heap_advice(),
            MemoryAdvice::Sequential
        );
        assert_eq!(
            ExperimentFlags::MADVISE_STRINGS_WILL_NEED.string_advice(),
            MemoryAdvice::WillNeed
        );
        assert_eq!(
            ExperimentFlags::MADVISE_SEQUENTIAL.string_advice(),
            MemoryAdvice::Normal
        );
    }

    #[test]
    fn test_parse() {
        let flags: ExperimentFlags = "madvise-sequential, verify-bytecode-checksum"
            .parse()
            .unwrap();
        assert_eq!(
            flags,
            ExperimentFlags::MADVISE_SEQUENTIAL | ExperimentFlags::VERIFY_BYTECODE_CHECKSUM
        );

        let flags: ExperimentFlags = "hades-compaction|0x200".parse().unwrap();
        assert_eq!(
            flags,
            ExperimentFlags::HADES_COMPACTION | ExperimentFlags::IGNORE_MEMORY_WARNINGS
        );

        assert_eq!("".parse::<ExperimentFlags>().unwrap(), ExperimentFlags::DEFAULT);
        assert_eq!("default".parse::<ExperimentFlags>().unwrap(), ExperimentFlags::DEFAULT);
        assert_eq!("132".parse::<ExperimentFlags>().unwrap().bits(), 132);
    }

    #[test]
    fn test_parse_hex_prefix_case() {
        let lower: ExperimentFlags = "0x400".parse().unwrap();
        let upper: ExperimentFlags = "0X400".parse().unwrap();
        assert_eq!(lower, ExperimentFlags::HADES_COMPACTION);
        assert_eq!(upper, lower);
        assert!("0Xzz".parse::<ExperimentFlags>().is_err());
    }

    #[test]
    fn test_parse_unknown_name() {
        let err = "madvise-sideways".parse::<ExperimentFlags>().unwrap_err();
        assert_eq!(err.name, "madvise-sideways");
    }

    #[test]
    fn test_display() {
        assert_eq!(ExperimentFlags::DEFAULT.to_string(), "default");
        assert_eq!(
            (ExperimentFlags::MADVISE_RANDOM | ExperimentFlags::HADES_COMPACTION).to_string(),
            "madvise-random,hades-compaction"
        );
        assert_eq!(ExperimentFlags::from_raw(1).to_string(), "0x1");
    }

    #[test]
    fn test_process_wide_flags_are_write_once() {
        // The only test touching the global.
        let flags = ExperimentFlags::IGNORE_MEMORY_WARNINGS;
        init_experiment_flags(flags).unwrap();
        assert_eq!(experiment_flags(), flags);

        let err = init_experiment_flags(ExperimentFlags::HADES_COMPACTION).unwrap_err();
        assert_eq!(err.current, flags);
        assert_eq!(experiment_flags(), flags);
    }
}
