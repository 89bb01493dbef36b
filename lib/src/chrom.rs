use bimap::BiMap;

use crate::error::{CoordError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromEntry {
    pub name: String,
    pub length: u64,
    pub cumulative_start: u64,
}

impl ChromEntry {
    pub fn cumulative_end(&self) -> u64 {
        self.cumulative_start + self.length
    }
}

/// Cumulative-offset index over the chromosomes of one assembly, in
/// assembly order. Maps between absolute positions (over the
/// concatenation of all chromosomes) and `(chromosome, offset)` loci.
///
/// A space is never mutated after construction; switching assemblies
/// means building a new one.
#[derive(Debug, Clone)]
pub struct CoordSpace {
    entries: Vec<ChromEntry>,
    // lower-cased name <-> entry index
    name_index: BiMap<String, usize>,
    total_len: u64,
}

impl CoordSpace {
    pub fn build<S: Into<String>>(
        chroms: impl IntoIterator<Item = (S, u64)>,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        let mut name_index = BiMap::new();
        let mut total_len = 0u64;

        for (name, length) in chroms {
            let name = name.into();

            if length == 0 {
                return Err(CoordError::InvalidAssemblyData(format!(
                    "chromosome `{name}` has non-positive length"
                )));
            }

            let ix = entries.len();
            if name_index
                .insert_no_overwrite(name.to_lowercase(), ix)
                .is_err()
            {
                return Err(CoordError::InvalidAssemblyData(format!(
                    "duplicate chromosome `{name}`"
                )));
            }

            entries.push(ChromEntry {
                name,
                length,
                cumulative_start: total_len,
            });
            total_len += length;
        }

        if entries.is_empty() {
            return Err(CoordError::InvalidAssemblyData(
                "empty chromosome list".to_string(),
            ));
        }

        Ok(Self {
            entries,
            name_index,
            total_len,
        })
    }

    /// Builds a space from the text served by chrom-size sources.
    pub fn from_chrom_sizes(text: &str) -> Result<Self> {
        Self::build(parse_chrom_sizes(text)?)
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    pub fn entries(&self) -> &[ChromEntry] {
        &self.entries
    }

    pub fn chrom_count(&self) -> usize {
        self.entries.len()
    }

    /// Case-insensitive lookup.
    pub fn chrom(&self, name: &str) -> Option<&ChromEntry> {
        let ix = self.name_index.get_by_left(&name.to_lowercase())?;
        self.entries.get(*ix)
    }

    fn clamped_ix(&self, ix: usize) -> usize {
        ix.saturating_sub(1).min(self.entries.len() - 1)
    }

    /// Returns the chromosome containing `pos` and the offset into it.
    ///
    /// Positions before the genome clamp to the first chromosome and
    /// positions past it to the last; the offset is not clamped, so it
    /// can be negative or exceed the chromosome length in those cases.
    pub fn absolute_to_locus(&self, pos: i64) -> (&str, i64) {
        // last entry starting at or before `pos`
        let ix = self
            .entries
            .partition_point(|e| e.cumulative_start as i64 <= pos);
        let entry = &self.entries[self.clamped_ix(ix)];
        (&entry.name, pos - entry.cumulative_start as i64)
    }

    /// Like `absolute_to_locus`, but treats `pos` as an exclusive range
    /// end: a position on a chromosome boundary belongs to the end of
    /// the preceding chromosome rather than the start of the next one.
    pub fn absolute_to_locus_end(&self, pos: i64) -> (&str, i64) {
        let ix = self
            .entries
            .partition_point(|e| (e.cumulative_start as i64) < pos);
        let entry = &self.entries[self.clamped_ix(ix)];
        (&entry.name, pos - entry.cumulative_start as i64)
    }

    pub fn locus_to_absolute(&self, name: &str, offset: u64) -> Result<u64> {
        let entry = self
            .chrom(name)
            .ok_or_else(|| CoordError::UnknownChromosome(name.to_string()))?;
        Ok(entry.cumulative_start + offset)
    }
}

/// Parses the two-column `name<TAB>length` text served by chrom-size
/// sources. Blank lines and `#` comments are skipped.
pub fn parse_chrom_sizes(text: &str) -> Result<Vec<(String, u64)>> {
    let mut chroms = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');

        let Some((name, len)) = fields.next().and_then(|name| {
            let len = fields.next()?;
            Some((name.trim(), len.trim()))
        }) else {
            return Err(CoordError::InvalidAssemblyData(format!(
                "line {}: expected `name<TAB>length`",
                line_no + 1
            )));
        };

        let len = btoi::btou::<u64>(len.as_bytes()).map_err(|e| {
            CoordError::InvalidAssemblyData(format!(
                "line {}: bad length `{len}`: {e}",
                line_no + 1
            ))
        })?;

        chroms.push((name.to_string(), len));
    }

    Ok(chroms)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use proptest::prelude::*;

    pub(crate) fn test_space() -> CoordSpace {
        CoordSpace::build([
            ("chr1", 248_956_422u64),
            ("chr2", 242_193_529),
            ("chr4", 190_214_555 + 1_000_000),
            ("chrX", 156_040_895),
        ])
        .unwrap()
    }

    #[test]
    fn two_chromosomes() {
        let space =
            CoordSpace::build([("chr1", 1000u64), ("chr2", 2000)]).unwrap();

        assert_eq!(space.total_len(), 3000);
        assert_eq!(space.absolute_to_locus(1500), ("chr2", 500));
        assert_eq!(space.absolute_to_locus(0), ("chr1", 0));
        assert_eq!(space.absolute_to_locus(1000), ("chr2", 0));
        assert_eq!(space.absolute_to_locus_end(1000), ("chr1", 1000));
        assert_eq!(space.absolute_to_locus_end(3000), ("chr2", 2000));
    }

    #[test]
    fn out_of_range_positions_clamp_chromosome() {
        let space =
            CoordSpace::build([("chr1", 1000u64), ("chr2", 2000)]).unwrap();

        assert_eq!(space.absolute_to_locus(-200), ("chr1", -200));
        assert_eq!(space.absolute_to_locus(3500), ("chr2", 2500));
        assert_eq!(space.absolute_to_locus_end(-5), ("chr1", -5));
    }

    #[test]
    fn invalid_assembly_data() {
        let empty: Vec<(&str, u64)> = Vec::new();
        assert!(matches!(
            CoordSpace::build(empty),
            Err(CoordError::InvalidAssemblyData(_))
        ));
        assert!(matches!(
            CoordSpace::build([("chr1", 10u64), ("chr2", 0)]),
            Err(CoordError::InvalidAssemblyData(_))
        ));
        assert!(matches!(
            CoordSpace::build([("chr1", 10u64), ("CHR1", 5)]),
            Err(CoordError::InvalidAssemblyData(_))
        ));
    }

    #[test]
    fn locus_to_absolute_lookup() {
        let space = test_space();
        let chr2 = space.chrom("chr2").unwrap().cumulative_start;
        assert_eq!(chr2, 248_956_422);
        assert_eq!(space.locus_to_absolute("CHR2", 10).unwrap(), chr2 + 10);
        assert_eq!(
            space.locus_to_absolute("chr3", 10),
            Err(CoordError::UnknownChromosome("chr3".to_string()))
        );
    }

    #[test]
    fn parse_chrom_sizes_tsv() {
        let tsv = "# hg-test\nchr1\t1000\nchr2\t2000\r\n\nchrM\t16\n";
        let space = CoordSpace::from_chrom_sizes(tsv).unwrap();
        let names = space
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["chr1", "chr2", "chrM"]);
        assert_eq!(space.total_len(), 3016);

        assert!(CoordSpace::from_chrom_sizes("chr1 1000\n").is_err());
        assert!(CoordSpace::from_chrom_sizes("chr1\tabc\n").is_err());
        assert!(CoordSpace::from_chrom_sizes("").is_err());
    }

    proptest! {
        #[test]
        fn locus_roundtrip(
            lens in prop::collection::vec(1u64..5_000_000, 1..40),
            pick in any::<prop::sample::Index>(),
            frac in 0.0f64..1.0,
        ) {
            let chroms = lens
                .iter()
                .enumerate()
                .map(|(i, &l)| (format!("chr{i}"), l))
                .collect::<Vec<_>>();
            let space = CoordSpace::build(chroms).unwrap();

            let entry = &space.entries()[pick.index(lens.len())];
            let offset = ((entry.length as f64 * frac) as u64)
                .min(entry.length - 1);

            let abs = space.locus_to_absolute(&entry.name, offset).unwrap();
            let (name, local) = space.absolute_to_locus(abs as i64);
            prop_assert_eq!(name, entry.name.as_str());
            prop_assert_eq!(local, offset as i64);
        }
    }
}
