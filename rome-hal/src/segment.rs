//! Splitting a download into fixed-size segments.
//!
//! A payload of `total` bytes goes out as `total / max` full segments followed
//! by one remainder segment of `total % max` bytes when that is non-zero.

/// One segment of a download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Segment {
    /// 0-based position in the plan.
    pub index: usize,
    /// Byte offset into the payload.
    pub offset: usize,
    /// Bytes carried.
    pub size: usize,
    /// Final segment of the download.
    pub is_last: bool,
}

/// Iterator over the segments of a payload.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    total: usize,
    max: usize,
    next: usize,
}

impl SegmentPlan {
    /// Plan `total` bytes in segments of at most `max` bytes. `max` must be non-zero.
    pub const fn new(total: usize, max: usize) -> Self {
        Self { total, max, next: 0 }
    }

    /// Number of segments carrying exactly `max` bytes.
    pub const fn full_segments(&self) -> usize {
        if self.max == 0 {
            0
        } else {
            self.total / self.max
        }
    }

    /// Size of the trailing short segment, zero if there is none.
    pub const fn remainder(&self) -> usize {
        if self.max == 0 {
            0
        } else {
            self.total % self.max
        }
    }

    /// Total number of segments.
    pub const fn segment_count(&self) -> usize {
        self.full_segments() + (self.remainder() != 0) as usize
    }
}

impl Iterator for SegmentPlan {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let count = self.segment_count();
        if self.next >= count {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let offset = index * self.max;
        let size = if index < self.full_segments() { self.max } else { self.remainder() };
        Some(Segment {
            index,
            offset,
            size,
            is_last: index + 1 == count,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.segment_count().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for SegmentPlan {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_division() {
        for total in [0usize, 1, 238, 239, 240, 477, 478, 479, 500, 4096] {
            let plan = SegmentPlan::new(total, 239);
            let segs: Vec<_> = plan.clone().collect();
            assert_eq!(segs.len(), total / 239 + usize::from(total % 239 != 0), "total {total}");
            assert_eq!(segs.iter().map(|s| s.size).sum::<usize>(), total);
            assert!(segs.iter().all(|s| s.size <= 239 && s.size > 0));
            if let Some(last) = segs.last() {
                assert!(last.is_last);
                assert_eq!(last.offset + last.size, total);
            }
            assert_eq!(segs.iter().filter(|s| s.is_last).count(), usize::from(total != 0));
        }
    }

    #[test]
    fn offsets_are_contiguous() {
        let segs: Vec<_> = SegmentPlan::new(500, 243).collect();
        assert_eq!(
            segs,
            [
                Segment { index: 0, offset: 0, size: 243, is_last: false },
                Segment { index: 1, offset: 243, size: 243, is_last: false },
                Segment { index: 2, offset: 486, size: 14, is_last: true },
            ]
        );
    }

    #[test]
    fn exact_multiple_has_no_remainder() {
        let plan = SegmentPlan::new(486, 243);
        assert_eq!(plan.full_segments(), 2);
        assert_eq!(plan.remainder(), 0);
        let last = plan.last().unwrap();
        assert_eq!(last.size, 243);
        assert!(last.is_last);
    }
}
