/// Database keys are raw byte strings
pub type Key = Vec<u8>;

/// Database values are raw byte strings
pub type Value = Vec<u8>;

/// An absolute byte position in the write-ahead log
pub type WalOffset = u64;

/// Durability level applied to WAL appends
///
/// Mirrors the classic trade between throughput and durability:
///
/// - `None`: leave data in the process buffer; fastest, least durable
/// - `Normal`: flush to the OS after each append
/// - `Full`: flush and fsync after each append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    None,
    Normal,
    Full,
}
