use crate::state::ImageKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(usize);

#[derive(Debug, Clone)]
/// One loaded image in the history strip.
pub struct HistoryEntry {
    pub id: EntryId,
    pub key: ImageKey,
    pub name: String,
}

#[derive(Debug, Default)]
/// Ordered list of loaded images with at most one selected entry.
pub struct History {
    entries: Vec<HistoryEntry>,
    selected: Option<EntryId>,
    next_id: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry without selecting it.
    pub fn add_entry(&mut self, key: ImageKey, name: impl Into<String>) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(HistoryEntry {
            id,
            key,
            name: name.into(),
        });
        id
    }

    /// Moves the selection to `id`. Returns `None` and leaves the selection
    /// untouched when `id` is unknown.
    pub fn select(&mut self, id: EntryId) -> Option<&HistoryEntry> {
        let entry = self.entries.iter().find(|e| e.id == id)?;
        self.selected = Some(id);
        Some(entry)
    }

    pub fn selected(&self) -> Option<&HistoryEntry> {
        let id = self.selected?;
        self.get(id)
    }

    pub fn is_selected(&self, id: EntryId) -> bool {
        self.selected == Some(id)
    }

    pub fn get(&self, id: EntryId) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn find_by_key(&self, key: ImageKey) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
