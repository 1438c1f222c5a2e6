use thiserror::Error;

/// Problems found while building or checking a block-sparse matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SparseError {
    #[error("column count {cols} is not a multiple of the block size {block}")]
    ColumnsNotBlockAligned { cols: usize, block: usize },

    #[error("dense buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },

    #[error("{cols} columns need more than {max_blocks} blocks per row")]
    TooWide { cols: usize, max_blocks: usize },

    #[error("row {row}: ledger lists {count} blocks but a row only has {blocks_per_row}")]
    TooManyBlocks { row: usize, count: usize, blocks_per_row: usize },

    #[error("ledger ends inside row {row}")]
    LedgerTruncated { row: usize },

    #[error("row {row}: block index {block} is out of range (row has {blocks_per_row} blocks)")]
    BlockOutOfRange { row: usize, block: u8, blocks_per_row: usize },

    #[error("row {row}: block index {block} is not strictly increasing")]
    BlockOrder { row: usize, block: u8 },

    #[error("ledger has {extra} trailing bytes")]
    TrailingLedgerBytes { extra: usize },

    #[error("value buffer holds {actual} values, ledger describes {expected}")]
    ValueCount { expected: usize, actual: usize },
}

pub type SparseResult<T> = Result<T, SparseError>;
