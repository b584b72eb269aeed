/*!
# Coordinates
Translation between the two coordinate conventions used in the knowledge base.

Callers speak 0-based, half-open intervals (`[start, end)`), which is what genome browsers and BED files use.
The store keeps 1-based, fully-closed spans (`[start, end]`), the VCF/noodles convention.
The mapping is `internal_start = start + 1`, `internal_end = end`, and `to_external` undoes it exactly.
*/
use noodles::core::Position;

/// Largest coordinate we accept; the lookup trees are built on `i32` ranges.
pub const MAX_COORDINATE: u64 = i32::MAX as u64;

#[derive(thiserror::Error, Clone, Debug, Eq, PartialEq)]
pub enum CoordinateError {
    #[error("end ({end}) must be greater than start ({start})")]
    EmptySpan { start: u64, end: u64 },
    #[error("coordinate {value} is larger than the maximum supported value ({MAX_COORDINATE})")]
    OutOfRange { value: u64 },
}

/// A 1-based, fully-closed span as stored internally.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InternalSpan {
    /// First included base, 1-based
    start: Position,
    /// Last included base, 1-based
    end: Position,
}

impl InternalSpan {
    /// Builds a span from raw 1-based values, usually when reading a stored document back.
    /// # Errors
    /// * if `start` is 0 or `end < start`
    /// * if either value is above `MAX_COORDINATE`
    pub fn from_one_based(start: u64, end: u64) -> Result<Self, CoordinateError> {
        check_range(end)?;
        let start_pos = to_position(start)
            .ok_or(CoordinateError::EmptySpan { start, end })?;
        let end_pos = to_position(end)
            .ok_or(CoordinateError::EmptySpan { start, end })?;
        if end_pos < start_pos {
            return Err(CoordinateError::EmptySpan { start, end });
        }
        Ok(Self {
            start: start_pos,
            end: end_pos
        })
    }

    // getters
    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }
}

/// Converts an external 0-based half-open interval into the internal 1-based closed span.
/// # Arguments
/// * `start` - first included base, 0-based
/// * `end` - first excluded base, 0-based
/// # Errors
/// * if `end <= start`
/// * if `end` is above `MAX_COORDINATE`
pub fn to_internal(start: u64, end: u64) -> Result<InternalSpan, CoordinateError> {
    if end <= start {
        return Err(CoordinateError::EmptySpan { start, end });
    }
    check_range(end)?;

    // end > start >= 0, so both of these are non-zero
    let start_pos = to_position(start + 1).ok_or(CoordinateError::OutOfRange { value: start })?;
    let end_pos = to_position(end).ok_or(CoordinateError::OutOfRange { value: end })?;
    Ok(InternalSpan {
        start: start_pos,
        end: end_pos
    })
}

/// Inverse of `to_internal`, returns `(start, end)` as a 0-based half-open interval.
pub fn to_external(span: &InternalSpan) -> (u64, u64) {
    let start = span.start.get() as u64 - 1;
    let end = span.end.get() as u64;
    (start, end)
}

/// Converts a query interval into an internal span.
/// Unlike `to_internal`, this never fails: empty or unreachable queries return `None`, and overly large ends are clamped.
pub fn query_span(start: u64, end: u64) -> Option<InternalSpan> {
    if end <= start || start >= MAX_COORDINATE {
        return None;
    }
    to_internal(start, end.min(MAX_COORDINATE)).ok()
}

fn check_range(value: u64) -> Result<(), CoordinateError> {
    if value > MAX_COORDINATE {
        Err(CoordinateError::OutOfRange { value })
    } else {
        Ok(())
    }
}

fn to_position(value: u64) -> Option<Position> {
    usize::try_from(value).ok().and_then(Position::new)
}

/// A named, 0-based half-open region on a chromosome.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Coordinates {
    chrom: String,
    start: u64,
    end: u64
}

impl Coordinates {
    pub fn new(chrom: String, start: u64, end: u64) -> Self {
        Self { chrom, start, end }
    }

    // getters
    pub fn chrom(&self) -> &str {
        &self.chrom
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}
