//! Reusable per-row value slots
//!
//! The cursor scans into the buffer, the sink serializes from it. Slots keep
//! their allocations between rows.

#[derive(Debug, Default, Clone)]
struct Slot {
    text: String,
    null: bool,
}

/// One row of rendered column values
#[derive(Debug, Default, Clone)]
pub struct RowBuffer {
    slots: Vec<Slot>,
}

impl RowBuffer {
    /// Creates a buffer sized for `columns` values
    pub fn with_columns(columns: usize) -> Self {
        let mut buffer = Self::default();
        buffer.reset(columns);
        buffer
    }

    /// Resizes to `columns` slots and marks every slot NULL
    pub fn reset(&mut self, columns: usize) {
        self.slots.resize_with(columns, Slot::default);
        for slot in &mut self.slots {
            slot.text.clear();
            slot.null = true;
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the buffer has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Stores a text value in a slot
    pub fn set(&mut self, idx: usize, value: &str) {
        self.slot_mut(idx).push_str(value);
    }

    /// Clears a slot, marks it non-NULL, and returns it for writing
    ///
    /// Grows the buffer if `idx` is past the end.
    pub fn slot_mut(&mut self, idx: usize) -> &mut String {
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, Slot::default);
        }
        let slot = &mut self.slots[idx];
        slot.text.clear();
        slot.null = false;
        &mut slot.text
    }

    /// Marks a slot NULL
    pub fn set_null(&mut self, idx: usize) {
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, Slot::default);
        }
        let slot = &mut self.slots[idx];
        slot.text.clear();
        slot.null = true;
    }

    /// Whether a slot holds NULL
    pub fn is_null(&self, idx: usize) -> bool {
        self.slots.get(idx).map_or(true, |s| s.null)
    }

    /// Value of a slot, `None` for NULL
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.slots
            .get(idx)
            .filter(|s| !s.null)
            .map(|s| s.text.as_str())
    }

    /// Field texts in column order; NULL renders as an empty string
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.text.as_str())
    }
}
