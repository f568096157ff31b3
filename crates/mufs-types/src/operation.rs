//! Optional operations and the capability set advertising them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// An operation a file object may or may not implement.
///
/// Core queries (existence, size, listing metadata) are always available and
/// are not listed here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FileOperation {
    ReadFile,
    RandomReadFile,
    WriteFile,
    AppendFile,
    RandomWriteFile,
    CreateDirectory,
    ListChildren,
    Delete,
    Rename,
    ChangeDate,
    ChangePermission,
    GetFreeSpace,
    GetTotalSpace,
    CopyRemotely,
    GetReplication,
    GetBlocksize,
    ChangeReplication,
}

bitflags::bitflags! {
    /// Set of [`FileOperation`]s supported by one file object.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const READ_FILE = 1 << 0;
        const RANDOM_READ_FILE = 1 << 1;
        const WRITE_FILE = 1 << 2;
        const APPEND_FILE = 1 << 3;
        const RANDOM_WRITE_FILE = 1 << 4;
        const CREATE_DIRECTORY = 1 << 5;
        const LIST_CHILDREN = 1 << 6;
        const DELETE = 1 << 7;
        const RENAME = 1 << 8;
        const CHANGE_DATE = 1 << 9;
        const CHANGE_PERMISSION = 1 << 10;
        const GET_FREE_SPACE = 1 << 11;
        const GET_TOTAL_SPACE = 1 << 12;
        const COPY_REMOTELY = 1 << 13;
        const GET_REPLICATION = 1 << 14;
        const GET_BLOCKSIZE = 1 << 15;
        const CHANGE_REPLICATION = 1 << 16;
    }
}

impl Capabilities {
    /// The flag for a single operation.
    pub const fn of(op: FileOperation) -> Self {
        match op {
            FileOperation::ReadFile => Self::READ_FILE,
            FileOperation::RandomReadFile => Self::RANDOM_READ_FILE,
            FileOperation::WriteFile => Self::WRITE_FILE,
            FileOperation::AppendFile => Self::APPEND_FILE,
            FileOperation::RandomWriteFile => Self::RANDOM_WRITE_FILE,
            FileOperation::CreateDirectory => Self::CREATE_DIRECTORY,
            FileOperation::ListChildren => Self::LIST_CHILDREN,
            FileOperation::Delete => Self::DELETE,
            FileOperation::Rename => Self::RENAME,
            FileOperation::ChangeDate => Self::CHANGE_DATE,
            FileOperation::ChangePermission => Self::CHANGE_PERMISSION,
            FileOperation::GetFreeSpace => Self::GET_FREE_SPACE,
            FileOperation::GetTotalSpace => Self::GET_TOTAL_SPACE,
            FileOperation::CopyRemotely => Self::COPY_REMOTELY,
            FileOperation::GetReplication => Self::GET_REPLICATION,
            FileOperation::GetBlocksize => Self::GET_BLOCKSIZE,
            FileOperation::ChangeReplication => Self::CHANGE_REPLICATION,
        }
    }

    pub const fn supports(self, op: FileOperation) -> bool {
        self.contains(Self::of(op))
    }

    /// Operations in this set, in declaration order.
    pub fn operations(self) -> impl Iterator<Item = FileOperation> {
        use strum::IntoEnumIterator;

        FileOperation::iter().filter(move |op| self.supports(*op))
    }
}

impl From<FileOperation> for Capabilities {
    fn from(op: FileOperation) -> Self {
        Self::of(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_every_operation_has_a_distinct_flag() {
        let mut seen = Capabilities::empty();
        for op in FileOperation::iter() {
            let flag = Capabilities::of(op);
            assert_eq!(flag.bits().count_ones(), 1, "{op}");
            assert!(!seen.intersects(flag), "{op} overlaps");
            seen |= flag;
        }
        assert_eq!(seen, Capabilities::all());
    }

    #[test]
    fn test_operations_roundtrip() {
        let caps = Capabilities::READ_FILE | Capabilities::RENAME | Capabilities::GET_BLOCKSIZE;
        let ops: Vec<_> = caps.operations().collect();
        assert_eq!(
            ops,
            vec![FileOperation::ReadFile, FileOperation::Rename, FileOperation::GetBlocksize]
        );
        assert!(!caps.supports(FileOperation::Delete));
    }

    #[test]
    fn test_display_is_snake_case() {
        assert_eq!(FileOperation::GetFreeSpace.to_string(), "get_free_space");
    }
}
