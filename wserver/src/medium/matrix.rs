//! Square table of directional link SNR values.

/// Row-major `size × size` table; the cell `(from, to)` holds the SNR seen
/// by `to` when `from` transmits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnrMatrix {
    size: usize,
    cells: Vec<i32>,
}

impl SnrMatrix {
    /// Creates a matrix for `size` stations with every cell set to `fill`.
    #[must_use]
    pub fn new(size: usize, fill: i32) -> Self {
        Self {
            size,
            cells: vec![fill; size * size],
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn get(&self, from: usize, to: usize) -> Option<i32> {
        self.offset(from, to).map(|i| self.cells[i])
    }

    /// Writes one cell. Returns `false` if either index is out of range.
    pub fn set(&mut self, from: usize, to: usize, value: i32) -> bool {
        match self.offset(from, to) {
            Some(i) => {
                self.cells[i] = value;
                true
            }
            None => false,
        }
    }

    /// Appends one row and one column filled with `fill`.
    pub fn grow(&mut self, fill: i32) {
        let new_size = self.size + 1;
        let mut cells = Vec::with_capacity(new_size * new_size);
        if self.size > 0 {
            for row in self.cells.chunks_exact(self.size) {
                cells.extend_from_slice(row);
                cells.push(fill);
            }
        }
        cells.resize(new_size * new_size, fill);
        self.size = new_size;
        self.cells = cells;
    }

    /// Drops the row and column of `index`, shifting later indices down.
    pub fn remove(&mut self, index: usize) {
        if index >= self.size {
            return;
        }
        let new_size = self.size - 1;
        let mut cells = Vec::with_capacity(new_size * new_size);
        for (row_idx, row) in self.cells.chunks_exact(self.size).enumerate() {
            if row_idx == index {
                continue;
            }
            cells.extend(
                row.iter()
                    .enumerate()
                    .filter(|&(col, _)| col != index)
                    .map(|(_, &v)| v),
            );
        }
        self.size = new_size;
        self.cells = cells;
    }

    const fn offset(&self, from: usize, to: usize) -> Option<usize> {
        if from < self.size && to < self.size {
            Some(from * self.size + to)
        } else {
            None
        }
    }
}
