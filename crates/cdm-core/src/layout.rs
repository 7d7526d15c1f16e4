//! Maps a section request over a row-major array onto contiguous byte runs.
//!
//! [`RegularLayout`] is the planning step between a logical read request and
//! physical I/O: instead of touching one element at a time, a decoder walks
//! the produced [`Chunk`]s and issues one read per chunk. The backing data
//! must be row-major with a fixed element size and no gaps other than the
//! strides implied by the full shape.

use crate::error::CdmResult;
use crate::section::{Range, Section};

/// A contiguous run of elements: where they start in the source, where they
/// land in the destination, and how many there are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Absolute byte offset of the first element in the backing source.
    pub src_offset: u64,
    /// Element index of the first element in the destination array.
    pub dest_elem: u64,
    /// Number of contiguous elements in this run.
    pub nelems: u64,
}

/// Lazy chunk iterator for a strided section over a regularly laid out
/// array.
///
/// Chunks come out in row-major destination order, so `dest_elem` increases
/// monotonically by `nelems` per chunk. Construction validates the section;
/// iteration itself cannot fail. Each instance is an independent single-pass
/// iterator; build a new one to restart.
#[derive(Debug)]
pub struct RegularLayout {
    elem_size: u64,
    base_offset: u64,
    /// Elements per produced chunk (the merged contiguous run).
    chunk_elems: u64,
    total_elems: u64,
    /// Element offset contributed by the starts of non-iterated dimensions.
    fixed_src_elem: u64,
    /// Outer dimensions iterated one index per chunk.
    iter_ranges: Vec<Range>,
    /// Element stride of each iterated dimension in the full array.
    iter_strides: Vec<u64>,
    /// Current position (0..length) within each iterated range.
    odometer: Vec<usize>,
    dest_next: u64,
    done: bool,
}

impl RegularLayout {
    /// Plan the chunks for `section` over an array of `full_shape` whose
    /// element data begins at `base_offset` in the source.
    ///
    /// Fails with `InvalidSection` on rank mismatch or any range exceeding
    /// its dimension.
    pub fn new(
        full_shape: &[usize],
        elem_size: usize,
        base_offset: u64,
        section: &Section,
    ) -> CdmResult<Self> {
        section.validate(full_shape)?;

        let rank = full_shape.len();

        // Element stride of each dimension: product of all faster-varying
        // dimension lengths.
        let mut dim_strides = vec![1u64; rank];
        for i in (0..rank.saturating_sub(1)).rev() {
            dim_strides[i] = dim_strides[i + 1] * full_shape[i + 1] as u64;
        }

        // Maximal suffix of fully selected dimensions collapses into the
        // contiguous run.
        let mut suffix_start = rank;
        let mut chunk_elems = 1u64;
        while suffix_start > 0 {
            let d = suffix_start - 1;
            if !section.range(d).is_full(full_shape[d]) {
                break;
            }
            chunk_elems *= full_shape[d] as u64;
            suffix_start = d;
        }

        let mut fixed_src_elem = 0u64;
        let iter_end; // dims [0..iter_end) are odometer dims
        if suffix_start == 0 {
            // Everything is fully selected: a single chunk.
            iter_end = 0;
        } else {
            let m = suffix_start - 1;
            let r = section.range(m);
            if r.stride() == 1 {
                // A stride-1 partial range over dim m extends the run:
                // consecutive indices of m are adjacent blocks of the full
                // suffix.
                chunk_elems *= r.length() as u64;
                fixed_src_elem = r.start() as u64 * dim_strides[m];
                iter_end = m;
            } else {
                iter_end = m + 1;
            }
        }

        let iter_ranges: Vec<Range> = (0..iter_end).map(|d| section.range(d).clone()).collect();
        let iter_strides: Vec<u64> = (0..iter_end).map(|d| dim_strides[d]).collect();
        let odometer = vec![0usize; iter_end];

        Ok(RegularLayout {
            elem_size: elem_size as u64,
            base_offset,
            chunk_elems,
            total_elems: section.total_elements(),
            fixed_src_elem,
            iter_ranges,
            iter_strides,
            odometer,
            dest_next: 0,
            done: false,
        })
    }

    /// Total elements the iteration will cover; equals the section's
    /// element count.
    pub fn total_elems(&self) -> u64 {
        self.total_elems
    }

    /// Elements in each produced chunk.
    pub fn chunk_elems(&self) -> u64 {
        self.chunk_elems
    }

    fn src_elem_at_odometer(&self) -> u64 {
        let mut elem = self.fixed_src_elem;
        for (i, range) in self.iter_ranges.iter().enumerate() {
            let idx = range.start() + self.odometer[i] * range.stride();
            elem += idx as u64 * self.iter_strides[i];
        }
        elem
    }

    fn advance_odometer(&mut self) {
        for i in (0..self.odometer.len()).rev() {
            self.odometer[i] += 1;
            if self.odometer[i] < self.iter_ranges[i].length() {
                return;
            }
            self.odometer[i] = 0;
        }
        self.done = true;
    }
}

impl Iterator for RegularLayout {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }
        let src_elem = self.src_elem_at_odometer();
        let chunk = Chunk {
            src_offset: self.base_offset + src_elem * self.elem_size,
            dest_elem: self.dest_next,
            nelems: self.chunk_elems,
        };
        self.dest_next += self.chunk_elems;
        if self.odometer.is_empty() {
            self.done = true;
        } else {
            self.advance_odometer();
        }
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(shape: &[usize], elem_size: usize, base: u64, section: &Section) -> Vec<Chunk> {
        RegularLayout::new(shape, elem_size, base, section)
            .unwrap()
            .collect()
    }

    #[test]
    fn test_full_array_is_one_chunk() {
        let section = Section::full(&[4, 5]).unwrap();
        let got = chunks(&[4, 5], 4, 100, &section);
        assert_eq!(
            got,
            vec![Chunk {
                src_offset: 100,
                dest_elem: 0,
                nelems: 20
            }]
        );
    }

    #[test]
    fn test_scalar_shape() {
        let section = Section::full(&[]).unwrap();
        let got = chunks(&[], 8, 16, &section);
        assert_eq!(
            got,
            vec![Chunk {
                src_offset: 16,
                dest_elem: 0,
                nelems: 1
            }]
        );
    }

    #[test]
    fn test_inner_stride_one_merges_with_partial_start() {
        // rows 1..3 of a 4x6 array, all columns: contiguous rows merge
        // into a single run.
        let section = Section::new(vec![
            Range::new(1, 1, 2).unwrap(),
            Range::all(6).unwrap(),
        ]);
        let got = chunks(&[4, 6], 2, 0, &section);
        assert_eq!(
            got,
            vec![Chunk {
                src_offset: 12, // element 6, 2 bytes each
                dest_elem: 0,
                nelems: 12
            }]
        );
    }

    #[test]
    fn test_partial_columns_one_chunk_per_row() {
        // columns 1..5 of each selected row cannot merge across rows.
        let section = Section::new(vec![
            Range::new(0, 1, 3).unwrap(),
            Range::new(1, 1, 4).unwrap(),
        ]);
        let got = chunks(&[3, 6], 1, 0, &section);
        assert_eq!(
            got,
            vec![
                Chunk { src_offset: 1, dest_elem: 0, nelems: 4 },
                Chunk { src_offset: 7, dest_elem: 4, nelems: 4 },
                Chunk { src_offset: 13, dest_elem: 8, nelems: 4 },
            ]
        );
    }

    #[test]
    fn test_strided_inner_dim_single_elements() {
        // stride 2 along the only dimension: one chunk per selected index.
        let section = Section::new(vec![Range::new(1, 2, 3).unwrap()]);
        let got = chunks(&[8], 4, 0, &section);
        assert_eq!(
            got,
            vec![
                Chunk { src_offset: 4, dest_elem: 0, nelems: 1 },
                Chunk { src_offset: 12, dest_elem: 1, nelems: 1 },
                Chunk { src_offset: 20, dest_elem: 2, nelems: 1 },
            ]
        );
    }

    #[test]
    fn test_strided_row_selection_full_rows() {
        // every other row, all columns: full rows stay whole chunks.
        let section = Section::new(vec![
            Range::new(0, 2, 2).unwrap(),
            Range::all(5).unwrap(),
        ]);
        let got = chunks(&[4, 5], 4, 1000, &section);
        assert_eq!(
            got,
            vec![
                Chunk { src_offset: 1000, dest_elem: 0, nelems: 5 },
                Chunk { src_offset: 1040, dest_elem: 5, nelems: 5 },
            ]
        );
    }

    #[test]
    fn test_three_rank_merge_depth() {
        // [2, 3, 4], select [0:1, full, full]: suffix merges dims 1 and 2,
        // then the stride-1 leading range merges too -> single chunk.
        let section = Section::new(vec![
            Range::new(0, 1, 2).unwrap(),
            Range::all(3).unwrap(),
            Range::all(4).unwrap(),
        ]);
        let got = chunks(&[2, 3, 4], 1, 0, &section);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].nelems, 24);
    }

    #[test]
    fn test_total_elems_matches_section() {
        let section = Section::new(vec![
            Range::new(0, 3, 2).unwrap(),
            Range::new(1, 2, 2).unwrap(),
        ]);
        let layout = RegularLayout::new(&[7, 6], 4, 0, &section).unwrap();
        assert_eq!(layout.total_elems(), 4);
        let total: u64 = layout.map(|c| c.nelems).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_rank_mismatch_rejected() {
        let section = Section::full(&[4]).unwrap();
        assert!(RegularLayout::new(&[4, 5], 4, 0, &section).is_err());
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let section = Section::new(vec![Range::new(2, 1, 4).unwrap()]);
        assert!(RegularLayout::new(&[5], 4, 0, &section).is_err());
    }
}
