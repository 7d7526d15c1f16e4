//! Rectangular sub-array selection: one [`Range`] per dimension.

use crate::error::{CdmError, CdmResult};

/// A strided index selection along one dimension.
///
/// Selects `start, start + stride, ..., start + (length-1)*stride`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    start: usize,
    stride: usize,
    length: usize,
}

impl Range {
    /// Create a range. Requires `stride >= 1` and `length >= 1`; the upper
    /// bound against a dimension length is checked when the containing
    /// [`Section`] is validated.
    pub fn new(start: usize, stride: usize, length: usize) -> CdmResult<Self> {
        if stride < 1 {
            return Err(CdmError::InvalidSection(format!(
                "stride must be >= 1, got {}",
                stride
            )));
        }
        if length < 1 {
            return Err(CdmError::InvalidSection(format!(
                "length must be >= 1, got {}",
                length
            )));
        }
        Ok(Range {
            start,
            stride,
            length,
        })
    }

    /// The full selection over a dimension of the given length.
    pub fn all(dim_length: usize) -> CdmResult<Self> {
        Range::new(0, 1, dim_length)
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// The last index selected by this range.
    pub fn last(&self) -> usize {
        self.start + (self.length - 1) * self.stride
    }

    /// Whether this range selects every index of a dimension of
    /// `dim_length`, in order, without gaps.
    pub fn is_full(&self, dim_length: usize) -> bool {
        self.start == 0 && self.stride == 1 && self.length == dim_length
    }
}

/// A per-dimension selection identifying a sub-array of a variable.
///
/// The rank must equal the variable's rank exactly; there are no omitted
/// ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    ranges: Vec<Range>,
}

impl Section {
    pub fn new(ranges: Vec<Range>) -> Self {
        Section { ranges }
    }

    /// The full selection over the given shape.
    pub fn full(shape: &[usize]) -> CdmResult<Self> {
        let ranges = shape
            .iter()
            .map(|&len| Range::all(len))
            .collect::<CdmResult<Vec<_>>>()?;
        Ok(Section { ranges })
    }

    /// Parse the textual form `"first:last[:stride]"` per dimension,
    /// comma-separated, with `last` inclusive. A bare index selects one
    /// element; `:` selects the whole dimension. The shape supplies the
    /// lengths for `:` entries and is NOT used for bounds checking here;
    /// call [`Section::validate`] for that.
    pub fn parse(spec: &str, shape: &[usize]) -> CdmResult<Self> {
        let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
        if parts.len() != shape.len() {
            return Err(CdmError::InvalidSection(format!(
                "section '{}' has {} dims, variable has {}",
                spec,
                parts.len(),
                shape.len()
            )));
        }
        let mut ranges = Vec::with_capacity(parts.len());
        for (part, &dim_len) in parts.iter().zip(shape) {
            if *part == ":" || part.is_empty() {
                ranges.push(Range::all(dim_len)?);
                continue;
            }
            let pieces: Vec<&str> = part.split(':').collect();
            let parse_idx = |s: &str| -> CdmResult<usize> {
                s.parse::<usize>().map_err(|_| {
                    CdmError::InvalidSection(format!("bad index '{}' in '{}'", s, spec))
                })
            };
            match pieces.len() {
                1 => {
                    let idx = parse_idx(pieces[0])?;
                    ranges.push(Range::new(idx, 1, 1)?);
                }
                2 | 3 => {
                    let first = parse_idx(pieces[0])?;
                    let last = parse_idx(pieces[1])?;
                    let stride = if pieces.len() == 3 {
                        parse_idx(pieces[2])?
                    } else {
                        1
                    };
                    if last < first {
                        return Err(CdmError::InvalidSection(format!(
                            "last < first in '{}'",
                            part
                        )));
                    }
                    if stride < 1 {
                        return Err(CdmError::InvalidSection(format!(
                            "stride must be >= 1 in '{}'",
                            part
                        )));
                    }
                    let length = (last - first) / stride + 1;
                    ranges.push(Range::new(first, stride, length)?);
                }
                _ => {
                    return Err(CdmError::InvalidSection(format!(
                        "bad range '{}' in '{}'",
                        part, spec
                    )));
                }
            }
        }
        Ok(Section { ranges })
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    pub fn range(&self, dim: usize) -> &Range {
        &self.ranges[dim]
    }

    pub fn rank(&self) -> usize {
        self.ranges.len()
    }

    /// Number of elements this section selects.
    pub fn total_elements(&self) -> u64 {
        self.ranges.iter().map(|r| r.length as u64).product()
    }

    /// The selected shape: one length per dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.ranges.iter().map(|r| r.length).collect()
    }

    /// Check rank and per-dimension bounds against the variable's full
    /// shape. Every range must satisfy `last() < dim_length`.
    pub fn validate(&self, full_shape: &[usize]) -> CdmResult<()> {
        if self.rank() != full_shape.len() {
            return Err(CdmError::InvalidSection(format!(
                "rank mismatch: section has {}, variable has {}",
                self.rank(),
                full_shape.len()
            )));
        }
        for (dim, (range, &dim_len)) in self.ranges.iter().zip(full_shape).enumerate() {
            if range.last() >= dim_len {
                return Err(CdmError::InvalidSection(format!(
                    "dim {}: last index {} exceeds length {}",
                    dim,
                    range.last(),
                    dim_len
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_zero_stride() {
        assert!(Range::new(0, 0, 5).is_err());
    }

    #[test]
    fn test_range_rejects_zero_length() {
        assert!(Range::new(0, 1, 0).is_err());
    }

    #[test]
    fn test_range_last() {
        let r = Range::new(2, 3, 4).unwrap();
        // 2, 5, 8, 11
        assert_eq!(r.last(), 11);
    }

    #[test]
    fn test_range_is_full() {
        assert!(Range::all(7).unwrap().is_full(7));
        assert!(!Range::new(0, 1, 6).unwrap().is_full(7));
        assert!(!Range::new(1, 1, 6).unwrap().is_full(7));
        assert!(!Range::new(0, 2, 4).unwrap().is_full(7));
    }

    #[test]
    fn test_full_section() {
        let s = Section::full(&[3, 4, 5]).unwrap();
        assert_eq!(s.rank(), 3);
        assert_eq!(s.total_elements(), 60);
        assert_eq!(s.shape(), vec![3, 4, 5]);
    }

    #[test]
    fn test_validate_rank_mismatch() {
        let s = Section::full(&[3, 4]).unwrap();
        let err = s.validate(&[3, 4, 5]).unwrap_err();
        assert!(err.to_string().contains("rank mismatch"));
    }

    #[test]
    fn test_validate_out_of_bounds() {
        let s = Section::new(vec![Range::new(0, 2, 3).unwrap()]);
        // selects 0, 2, 4 over length 4
        assert!(s.validate(&[4]).is_err());
        assert!(s.validate(&[5]).is_ok());
    }

    #[test]
    fn test_parse_full_and_single() {
        let s = Section::parse(":,3", &[10, 6]).unwrap();
        assert_eq!(s.range(0), &Range::all(10).unwrap());
        assert_eq!(s.range(1), &Range::new(3, 1, 1).unwrap());
    }

    #[test]
    fn test_parse_strided() {
        let s = Section::parse("1:9:2", &[10]).unwrap();
        assert_eq!(s.range(0), &Range::new(1, 2, 5).unwrap());
        // inclusive last not on stride still lands inside
        let s = Section::parse("0:9:4", &[10]).unwrap();
        // 0, 4, 8
        assert_eq!(s.range(0).length(), 3);
        assert_eq!(s.range(0).last(), 8);
    }

    #[test]
    fn test_parse_wrong_rank() {
        assert!(Section::parse("0:3", &[10, 10]).is_err());
    }

    #[test]
    fn test_parse_backwards_range() {
        assert!(Section::parse("5:2", &[10]).is_err());
    }
}
