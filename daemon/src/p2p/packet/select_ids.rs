use arcadia_common::serializer::{Reader, ReaderError, Serializer, Writer};
use indexmap::IndexSet;
use std::hash::Hash as StdHash;

// Operating mode of an id list inside a notice or request
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum IdListMode {
    #[default]
    None,
    CatchUp,
    LastIrrCatchUp,
    Normal,
}

impl IdListMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::CatchUp => "catch up",
            Self::LastIrrCatchUp => "last irreversible",
            Self::Normal => "normal",
        }
    }

    // True for the modes that signal a catch-up exchange and must be
    // forwarded to the sync controller
    pub fn is_catch_up(&self) -> bool {
        matches!(self, Self::CatchUp | Self::LastIrrCatchUp)
    }

    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::None,
            1 => Self::CatchUp,
            2 => Self::LastIrrCatchUp,
            3 => Self::Normal,
            _ => return None,
        })
    }
}

impl Serializer for IdListMode {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Self::from_u8(reader.read_u8()?).ok_or(ReaderError::InvalidValue)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self as u8);
    }

    fn size(&self) -> usize {
        1
    }
}

// An ordered, deduplicated id advertisement.
// `pending` carries the count of ids the sender holds beyond this list
// during catch-up exchanges.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SelectIds<T: StdHash + Eq> {
    pub mode: IdListMode,
    pub pending: u32,
    pub ids: IndexSet<T>,
}

impl<T: StdHash + Eq> SelectIds<T> {
    pub fn new(mode: IdListMode, pending: u32, ids: IndexSet<T>) -> Self {
        Self { mode, pending, ids }
    }

    pub fn normal(ids: IndexSet<T>) -> Self {
        Self {
            mode: IdListMode::Normal,
            pending: 0,
            ids,
        }
    }

    pub fn empty(&self) -> bool {
        self.mode == IdListMode::None || self.ids.is_empty()
    }
}

impl<T: StdHash + Eq> Default for SelectIds<T> {
    fn default() -> Self {
        Self {
            mode: IdListMode::None,
            pending: 0,
            ids: IndexSet::new(),
        }
    }
}

impl<T: Serializer + StdHash + Eq> Serializer for SelectIds<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let mode = IdListMode::read(reader)?;
        let pending = reader.read_u32()?;
        let ids = IndexSet::read(reader)?;
        Ok(Self { mode, pending, ids })
    }

    fn write(&self, writer: &mut Writer) {
        self.mode.write(writer);
        writer.write_u32(&self.pending);
        self.ids.write(writer);
    }

    fn size(&self) -> usize {
        self.mode.size() + 4 + self.ids.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcadia_common::crypto::{hash, Hash};

    #[test]
    fn test_mode_strings() {
        assert_eq!(IdListMode::None.as_str(), "none");
        assert_eq!(IdListMode::CatchUp.as_str(), "catch up");
        assert_eq!(IdListMode::LastIrrCatchUp.as_str(), "last irreversible");
        assert_eq!(IdListMode::Normal.as_str(), "normal");
    }

    #[test]
    fn test_empty_invariant() {
        let no_mode: SelectIds<Hash> = SelectIds::default();
        assert!(no_mode.empty());

        let mut ids = IndexSet::new();
        ids.insert(hash(b"tx"));
        let with_ids = SelectIds::normal(ids.clone());
        assert!(!with_ids.empty());

        // mode none makes the list empty even when ids are present
        let none_with_ids = SelectIds::new(IdListMode::None, 0, ids);
        assert!(none_with_ids.empty());

        // ids empty makes the list empty in any mode
        let normal_no_ids: SelectIds<Hash> = SelectIds::normal(IndexSet::new());
        assert!(normal_no_ids.empty());
    }

    #[test]
    fn test_roundtrip() {
        let mut ids = IndexSet::new();
        ids.insert(hash(b"a"));
        ids.insert(hash(b"b"));
        let list = SelectIds::new(IdListMode::CatchUp, 7, ids);
        let decoded = SelectIds::from_bytes(&list.to_bytes()).unwrap();
        assert_eq!(list, decoded);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(IdListMode::from_u8(4).is_none());
        let mut bytes = SelectIds::<Hash>::default().to_bytes();
        bytes[0] = 9;
        assert!(SelectIds::<Hash>::from_bytes(&bytes).is_err());
    }
}
