/// Selection list used by player-list filters.
///
/// Slot 0 is always the blank "no filter" entry, so `ids[i]` and `names[i]`
/// line up with the entries a selector shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerFilter<Id> {
    pub ids: Vec<Option<Id>>,
    pub names: Vec<String>,
    /// Number of real entries, excluding the blank slot.
    pub total: usize,
}

impl<Id: Copy> PlayerFilter<Id> {
    /// Build from `(id, name)` pairs in display order.
    pub fn build<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Id, &'a str)>,
    {
        let mut ids = vec![None];
        let mut names = vec![String::new()];
        for (id, name) in entries {
            ids.push(Some(id));
            names.push(name.to_string());
        }
        Self {
            total: ids.len() - 1,
            ids,
            names,
        }
    }

    /// Id at selector position `index`; `None` for the blank slot or out of
    /// range.
    pub fn id_at(&self, index: usize) -> Option<Id> {
        self.ids.get(index).copied().flatten()
    }
}

impl<Id> Default for PlayerFilter<Id> {
    fn default() -> Self {
        Self {
            ids: vec![None],
            names: vec![String::new()],
            total: 0,
        }
    }
}

/// Prefix a name list with the blank entry.
pub(crate) fn with_blank(names: &[String]) -> Vec<String> {
    std::iter::once(String::new())
        .chain(names.iter().cloned())
        .collect()
}
