//! Bounded per-metric point buffer

use std::collections::VecDeque;

use telesync_core::SeriesPoint;

/// Result of appending a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Append {
    Stored,
    /// Stored after evicting the oldest point
    Evicted(SeriesPoint),
    /// Older than the newest stored point; not stored
    Stale,
}

/// Ascending, capacity-bounded sequence of points for one trace.
///
/// Overflow evicts the oldest point.
#[derive(Debug, Clone)]
pub struct ChartBuffer {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
}

impl ChartBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Build from ascending points, keeping the newest `capacity` of them
    pub fn with_points(points: Vec<SeriesPoint>, capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        let skip = points.len().saturating_sub(buffer.capacity);
        buffer.points.extend(points.into_iter().skip(skip));
        buffer
    }

    pub fn push(&mut self, point: SeriesPoint) -> Append {
        if let Some(last) = self.points.back() {
            if point.timestamp < last.timestamp {
                return Append::Stale;
            }
        }

        let evicted = if self.points.len() >= self.capacity {
            self.points.pop_front()
        } else {
            None
        };
        self.points.push_back(point);

        match evicted {
            Some(old) => Append::Evicted(old),
            None => Append::Stored,
        }
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<SeriesPoint> {
        self.points.iter().copied().collect()
    }
}
