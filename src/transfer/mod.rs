//! Transfer extraction output types, grouping and fee separation

pub mod grouper;
pub mod types;

pub use grouper::{separate_fee, SeparatedGroup};
pub use types::{
    group_transfers, Direction, RawTransfer, TransferGroup, NATIVE_MINT, NATIVE_SYMBOL,
    UNKNOWN_SYMBOL,
};
