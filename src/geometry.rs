//! Hex rotation and anchor utilities.
//!
//! Shapes are stored in odd-q offset coordinates (odd columns shifted down by
//! half a cell). Rotation happens in axial coordinates, where a 60 degree
//! clockwise turn is the linear map `(q, r) -> (-r, q + r)`; six turns return
//! every cell to where it started.

use crate::grid::GridMap;

/// Number of distinct hex orientations.
pub const NUM_ROTATIONS: u8 = 6;

/// An axial hex coordinate `(q, r)`.
pub type Axial = (i32, i32);

/// Converts odd-q offset coordinates to axial coordinates.
#[inline(always)]
pub const fn offset_to_axial(col: i32, row: i32) -> Axial {
    (col, row - (col - (col & 1)) / 2)
}

/// Converts axial coordinates to odd-q offset coordinates.
#[inline(always)]
pub const fn axial_to_offset(q: i32, r: i32) -> (i32, i32) {
    (q, r + (q - (q & 1)) / 2)
}

/// Rotates an axial coordinate 60 degrees clockwise around the origin.
#[inline(always)]
pub const fn rotate_cw((q, r): Axial) -> Axial {
    (-r, q + r)
}

/// Returns the shape rotated by `rotation * 60` degrees clockwise.
///
/// Rotation 0 (and any multiple of six) returns the shape unchanged. Other
/// rotations are normalized so that the smallest enabled column and row are
/// both zero; the bounding box is tight around the enabled cells.
pub fn rotate_map(map: &GridMap, rotation: u8) -> GridMap {
    let turns = rotation % NUM_ROTATIONS;
    if turns == 0 || map.enabled_count() == 0 {
        return map.clone();
    }

    let rotated: Vec<Axial> = map
        .enabled_cells()
        .map(|(col, row)| {
            let mut hex = offset_to_axial(col, row);
            for _ in 0..turns {
                hex = rotate_cw(hex);
            }
            hex
        })
        .collect();

    // translating along q keeps the shape intact in axial space; the row
    // shift afterwards is a pure vertical translation in offset space
    let min_q = rotated.iter().map(|&(q, _)| q).min().unwrap_or(0);
    let offsets: Vec<(i32, i32)> = rotated
        .iter()
        .map(|&(q, r)| axial_to_offset(q - min_q, r))
        .collect();
    let min_row = offsets.iter().map(|&(_, row)| row).min().unwrap_or(0);

    let width = offsets.iter().map(|&(col, _)| col).max().unwrap_or(0) as usize + 1;
    let height = offsets.iter().map(|&(_, row)| row - min_row).max().unwrap_or(0) as usize + 1;

    let mut nodes = vec![false; width * height];
    for &(col, row) in &offsets {
        nodes[(row - min_row) as usize * width + col as usize] = true;
    }

    // dimensions are derived from the cells themselves, so this cannot fail
    GridMap::new(width, height, nodes).unwrap_or_else(|| map.clone())
}

/// Generates all six orientations of a shape, indexed by rotation.
pub fn all_rotations(map: &GridMap) -> [GridMap; NUM_ROTATIONS as usize] {
    std::array::from_fn(|rotation| rotate_map(map, rotation as u8))
}

/// Computes the cell-independent part of the anchor offset for a rotated shape.
///
/// Scans the middle column (`width / 2`) and averages the rows of its enabled
/// nodes with truncating integer division. The result places the shape's
/// top-left so that the middle column is centered over the target cell. Odd
/// middle columns are shifted up one more row to match the hex column parity.
pub fn anchor_base_offset(rotated: &GridMap) -> (i32, i32) {
    let half_width = (rotated.width() / 2) as i32;

    let mut sum_y = 0;
    let mut enabled_count = 0;
    for row in 0..rotated.height() as i32 {
        if rotated.is_enabled(half_width, row) {
            sum_y += row;
            enabled_count += 1;
        }
    }

    let avg_y = if enabled_count > 0 {
        sum_y / enabled_count
    } else {
        0
    };
    let mut offset_y = -avg_y;
    if half_width % 2 == 1 {
        offset_y -= 1;
    }

    (-half_width, offset_y)
}
