use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::sys::geometry::{Point, Rect};
use crate::sys::platform::{Monitor, Platform, PlatformError};

/// Returns the connected monitors in the order slots are distributed over them.
///
/// The primary monitor (if any) is always first. The rest are ordered by
/// physical position, left-to-right and then top-to-bottom. Note that there
/// may be no monitors.
pub fn ordered_monitors(platform: &dyn Platform) -> Result<Vec<Monitor>, PlatformError> {
    let monitors = platform.monitors()?;
    debug!(?monitors);
    Ok(order_monitors(monitors))
}

pub fn order_monitors(mut monitors: Vec<Monitor>) -> Vec<Monitor> {
    monitors.sort_by(|a, b| {
        let x_order = a.bounds.x.cmp(&b.bounds.x);
        if x_order == Ordering::Equal { a.bounds.y.cmp(&b.bounds.y) } else { x_order }
    });

    let primary = monitors
        .iter()
        .position(|m| m.primary)
        .or_else(|| monitors.iter().position(|m| m.bounds.origin() == Point::ZERO));
    match primary {
        Some(idx) => {
            let main = monitors.remove(idx);
            monitors.insert(0, main);
        }
        None if !monitors.is_empty() => {
            warn!("Could not find primary monitor. monitors={monitors:?}");
        }
        None => {}
    }
    monitors
}

/// The whole virtual desktop: the union of every monitor's full bounds.
pub fn desktop_bounds(monitors: &[Monitor]) -> Option<Rect> {
    monitors.iter().map(|m| m.bounds).reduce(|a, b| a.union(&b))
}

/// The monitor containing `point`, or the one closest to it.
pub fn monitor_nearest(monitors: &[Monitor], point: Point) -> Option<&Monitor> {
    if let Some(m) = monitors.iter().find(|m| m.bounds.contains(point)) {
        return Some(m);
    }
    monitors.iter().min_by_key(|m| distance_squared(&m.bounds, point))
}

fn distance_squared(rect: &Rect, point: Point) -> i64 {
    let dx = if point.x < rect.x {
        rect.x - point.x
    } else if point.x >= rect.max_x() {
        point.x - rect.max_x() + 1
    } else {
        0
    } as i64;
    let dy = if point.y < rect.y {
        rect.y - point.y
    } else if point.y >= rect.max_y() {
        point.y - rect.max_y() + 1
    } else {
        0
    } as i64;
    dx * dx + dy * dy
}
