// atlas_core/src/mapping/raycast.rs

use crate::types::CellCoord;

/// Bresenham line iterator over grid cells, both end cells included.
///
/// Consecutive cells are 8-connected, so a ray never skips a cell it crosses
/// diagonally.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i32,
    y: i32,
    end: CellCoord,
    dx: i32,
    dy: i32,
    step_x: i32,
    step_y: i32,
    error: i32,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: CellCoord, end: CellCoord) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = -(end.y - start.y).abs();
        Self {
            x: start.x,
            y: start.y,
            end,
            dx,
            dy,
            step_x: if start.x < end.x { 1 } else { -1 },
            step_y: if start.y < end.y { 1 } else { -1 },
            error: dx + dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = CellCoord;

    fn next(&mut self) -> Option<CellCoord> {
        if self.done {
            return None;
        }
        let current = CellCoord::new(self.x, self.y);
        if current == self.end {
            self.done = true;
            return Some(current);
        }

        let e2 = 2 * self.error;
        if e2 >= self.dy {
            self.error += self.dy;
            self.x += self.step_x;
        }
        if e2 <= self.dx {
            self.error += self.dx;
            self.y += self.step_y;
        }
        Some(current)
    }
}
