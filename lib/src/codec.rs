//! Parsing and formatting of position expressions such as
//! `chr4:190,998,876-191,000,255` or `chr1:1-500 and chr2:1-500`.

use crate::chrom::CoordSpace;
use crate::error::{CoordError, Result};
use crate::tokens::AXIS_SEPARATOR;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locus {
    pub chromosome: String,
    pub offset: u64,
}

impl Locus {
    pub fn new(chromosome: impl Into<String>, offset: u64) -> Self {
        Self {
            chromosome: chromosome.into(),
            offset,
        }
    }

    pub fn to_absolute(&self, space: &CoordSpace) -> Result<u64> {
        space.locus_to_absolute(&self.chromosome, self.offset)
    }
}

/// A range between two loci; usually both on the same chromosome, but
/// a range may span chromosome boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionRange {
    pub start: Locus,
    pub end: Locus,
}

impl PositionRange {
    pub fn new(chromosome: &str, start: u64, end: u64) -> Self {
        Self {
            start: Locus::new(chromosome, start),
            end: Locus::new(chromosome, end),
        }
    }

    pub fn point(locus: Locus) -> Self {
        Self {
            start: locus.clone(),
            end: locus,
        }
    }

    /// The shared chromosome, if both endpoints are on the same one.
    pub fn chromosome(&self) -> Option<&str> {
        (self.start.chromosome == self.end.chromosome)
            .then_some(self.start.chromosome.as_str())
    }

    pub fn to_absolute(
        &self,
        space: &CoordSpace,
    ) -> Result<std::ops::Range<u64>> {
        let start = self.start.to_absolute(space)?;
        let end = self.end.to_absolute(space)?;
        Ok(start..end)
    }

    /// Converts a viewport domain (absolute, possibly fractional and
    /// outside the genome) into a range, flooring the start and
    /// ceiling the end. Returns `None` for non-finite domains.
    pub fn from_domain(space: &CoordSpace, domain: [f64; 2]) -> Option<Self> {
        let [a, b] = domain;
        if !a.is_finite() || !b.is_finite() {
            return None;
        }

        let total = space.total_len() as f64;
        let left = a.min(b).clamp(0.0, total).floor() as i64;
        let right = a.max(b).clamp(0.0, total).ceil() as i64;

        let (start_chrom, start) = space.absolute_to_locus(left);
        let (end_chrom, end) = space.absolute_to_locus_end(right);

        Some(Self {
            start: Locus::new(start_chrom, start.max(0) as u64),
            end: Locus::new(end_chrom, end.max(0) as u64),
        })
    }
}

/// One axis, or two axes for a 2-D view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionExpr {
    pub axis1: PositionRange,
    pub axis2: Option<PositionRange>,
}

impl PositionExpr {
    pub fn one(axis1: PositionRange) -> Self {
        Self { axis1, axis2: None }
    }

    pub fn two(axis1: PositionRange, axis2: PositionRange) -> Self {
        Self {
            axis1,
            axis2: Some(axis2),
        }
    }
}

/// The interpretation of a single endpoint token. Parsing a token never
/// fails; anything not recognizable as a position is `Unresolved` and
/// presumed to be a gene symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedToken {
    Locus { chromosome: String, offset: u64 },
    ChromosomeOnly { chromosome: String },
    /// A bare number: an offset on an inherited chromosome, or an
    /// absolute position if no chromosome is in scope.
    Offset(u64),
    Unresolved(String),
}

impl ParsedToken {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ParsedToken::Unresolved(_))
    }
}

/// Parses a non-negative integer, ignoring `,` and `_` separators.
pub fn parse_offset(text: &str) -> Option<u64> {
    let digits = text
        .bytes()
        .filter(|&b| b != b',' && b != b'_')
        .collect::<Vec<_>>();

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    btoi::btou::<u64>(&digits).ok()
}

pub fn parse_token(text: &str, space: &CoordSpace) -> ParsedToken {
    let text = text.trim();

    if let Some((chrom, offset)) = text.split_once(':') {
        let parsed = space.chrom(chrom).and_then(|entry| {
            let offset = parse_offset(offset)?;
            Some(ParsedToken::Locus {
                chromosome: entry.name.clone(),
                offset: offset.min(entry.length),
            })
        });
        return parsed
            .unwrap_or_else(|| ParsedToken::Unresolved(text.to_string()));
    }

    if let Some(entry) = space.chrom(text) {
        return ParsedToken::ChromosomeOnly {
            chromosome: entry.name.clone(),
        };
    }

    if let Some(offset) = parse_offset(text) {
        return ParsedToken::Offset(offset);
    }

    ParsedToken::Unresolved(text.to_string())
}

pub fn parse_expression(
    text: &str,
    space: &CoordSpace,
    two_d: bool,
) -> Result<PositionExpr> {
    let trimmed = text.trim();

    let parts = if two_d {
        trimmed.split(AXIS_SEPARATOR).collect::<Vec<_>>()
    } else {
        vec![trimmed]
    };

    match parts.as_slice() {
        [axis1] => Ok(PositionExpr::one(parse_range(text, axis1, space)?)),
        [axis1, axis2] => Ok(PositionExpr::two(
            parse_range(text, axis1, space)?,
            parse_range(text, axis2, space)?,
        )),
        _ => Err(CoordError::parse(text, "more than two axes")),
    }
}

fn parse_range(
    text: &str,
    range: &str,
    space: &CoordSpace,
) -> Result<PositionRange> {
    let endpoints = range.trim().split('-').collect::<Vec<_>>();

    if endpoints.len() > 2 {
        return Err(CoordError::parse(text, "more than two endpoints"));
    }

    let unresolved = |token: &str| {
        CoordError::parse(text, format!("unresolved token `{token}`"))
    };

    let total = space.total_len();

    let (start, absolute) = match parse_token(endpoints[0], space) {
        ParsedToken::Locus { chromosome, offset } => {
            (Locus::new(chromosome, offset), false)
        }
        ParsedToken::ChromosomeOnly { chromosome } => {
            (Locus::new(chromosome, 0), false)
        }
        ParsedToken::Offset(pos) => {
            let (chrom, offset) =
                space.absolute_to_locus(pos.min(total) as i64);
            (Locus::new(chrom, offset as u64), true)
        }
        ParsedToken::Unresolved(token) => return Err(unresolved(&token)),
    };

    let Some(end_token) = endpoints.get(1) else {
        return Ok(PositionRange::point(start));
    };

    let end = match parse_token(end_token, space) {
        ParsedToken::Locus { chromosome, offset } => {
            Locus::new(chromosome, offset)
        }
        ParsedToken::ChromosomeOnly { chromosome } => Locus::new(chromosome, 0),
        ParsedToken::Offset(pos) if absolute => {
            let (chrom, offset) =
                space.absolute_to_locus_end(pos.min(total) as i64);
            Locus::new(chrom, offset as u64)
        }
        ParsedToken::Offset(offset) => {
            let length = space
                .chrom(&start.chromosome)
                .map(|e| e.length)
                .unwrap_or(offset);
            Locus::new(start.chromosome.clone(), offset.min(length))
        }
        ParsedToken::Unresolved(token) => return Err(unresolved(&token)),
    };

    if start.to_absolute(space)? > end.to_absolute(space)? {
        log::debug!("reversed range in `{text}`, swapping endpoints");
        return Ok(PositionRange {
            start: end,
            end: start,
        });
    }

    Ok(PositionRange { start, end })
}

/// `1234567` -> `1,234,567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

pub fn format_range(range: &PositionRange) -> String {
    let start = format_thousands(range.start.offset);
    let end = format_thousands(range.end.offset);

    match range.chromosome() {
        Some(chrom) => format!("{chrom}:{start}-{end}"),
        None => format!(
            "{}:{start}-{}:{end}",
            range.start.chromosome, range.end.chromosome
        ),
    }
}

pub fn format_expression(expr: &PositionExpr, two_d: bool) -> String {
    let mut out = format_range(&expr.axis1);

    if let (true, Some(axis2)) = (two_d, expr.axis2.as_ref()) {
        out.push_str(AXIS_SEPARATOR);
        out.push_str(&format_range(axis2));
    }

    out
}
