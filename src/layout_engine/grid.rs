use thiserror::Error;
use tracing::trace;

use crate::common::config::LayoutSettings;
use crate::sys::geometry::Rect;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    #[error("cannot lay out {0} windows without any monitor")]
    NoMonitors(usize),
}

/// Tiles preview cells over one or more monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub margin: i32,
    pub padding: i32,
}

impl Default for GridLayout {
    fn default() -> Self { GridLayout::from(LayoutSettings::default()) }
}

impl From<LayoutSettings> for GridLayout {
    fn from(settings: LayoutSettings) -> Self {
        GridLayout {
            margin: settings.margin.min(i32::MAX as u32) as i32,
            padding: settings.padding.min(i32::MAX as u32) as i32,
        }
    }
}

/// Rows and columns for `count` cells: rows = ceil(sqrt(n)), cols = ceil(n / rows).
pub fn grid_dimensions(count: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let mut rows = count.isqrt();
    if rows * rows < count {
        rows += 1;
    }
    let cols = count.div_ceil(rows);
    (rows, cols)
}

/// Splits `count` items over `areas` in proportion to each area, using the
/// largest-remainder method. Ties go to the earlier monitor. When every area
/// is zero the items are split evenly.
pub fn distribute(count: usize, areas: &[u64]) -> Vec<usize> {
    if areas.is_empty() {
        return Vec::new();
    }
    let total: u128 = areas.iter().map(|&a| a as u128).sum();
    if total == 0 {
        let base = count / areas.len();
        let extra = count % areas.len();
        return (0..areas.len()).map(|i| base + usize::from(i < extra)).collect();
    }

    let mut shares = Vec::with_capacity(areas.len());
    let mut remainders = Vec::with_capacity(areas.len());
    for (idx, &area) in areas.iter().enumerate() {
        let quota = count as u128 * area as u128;
        shares.push((quota / total) as usize);
        remainders.push((quota % total, idx));
    }

    let assigned: usize = shares.iter().sum();
    remainders.sort_by(|(ra, ia), (rb, ib)| rb.cmp(ra).then(ia.cmp(ib)));
    for &(_, idx) in remainders.iter().take(count - assigned) {
        shares[idx] += 1;
    }
    shares
}

impl GridLayout {
    pub fn new(margin: i32, padding: i32) -> Self {
        GridLayout { margin: margin.max(0), padding: padding.max(0) }
    }

    /// Computes one destination rectangle per candidate.
    ///
    /// Candidates are assigned to monitors in order: the first share of
    /// candidates goes to `monitors[0]`, and so on. Within a monitor the grid
    /// is filled row by row, and trailing cells stay empty rather than
    /// stretching the last row.
    pub fn compute(&self, count: usize, monitors: &[Rect]) -> Result<Vec<Rect>, LayoutError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if monitors.is_empty() {
            return Err(LayoutError::NoMonitors(count));
        }

        let areas: Vec<u64> = monitors.iter().map(Rect::area).collect();
        let shares = distribute(count, &areas);
        trace!(?shares, "distributed candidates over monitors");

        let mut rects = Vec::with_capacity(count);
        for (monitor, &share) in monitors.iter().zip(&shares) {
            self.tile(*monitor, share, &mut rects);
        }
        Ok(rects)
    }

    fn tile(&self, monitor: Rect, count: usize, out: &mut Vec<Rect>) {
        if count == 0 {
            return;
        }
        let (rows, cols) = grid_dimensions(count);
        let bounds = monitor.inset(self.padding);

        let gaps_x = self.margin.saturating_mul((cols - 1) as i32);
        let gaps_y = self.margin.saturating_mul((rows - 1) as i32);
        let cell_w = (bounds.width.saturating_sub(gaps_x) / cols as i32).max(0);
        let cell_h = (bounds.height.saturating_sub(gaps_y) / rows as i32).max(0);
        // With cells squeezed to nothing the margins no longer fit either.
        let step_x = if cell_w == 0 { 0 } else { cell_w.saturating_add(self.margin) };
        let step_y = if cell_h == 0 { 0 } else { cell_h.saturating_add(self.margin) };

        for idx in 0..count {
            let row = idx / cols;
            let col = idx % cols;
            out.push(Rect::new(
                bounds.x.saturating_add(step_x.saturating_mul(col as i32)),
                bounds.y.saturating_add(step_y.saturating_mul(row as i32)),
                cell_w,
                cell_h,
            ));
        }
    }
}

/// [`GridLayout::compute`] with the default margins.
pub fn compute(count: usize, monitors: &[Rect]) -> Result<Vec<Rect>, LayoutError> {
    GridLayout::default().compute(count, monitors)
}
