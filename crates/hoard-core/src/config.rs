//! Configuration for a Hoard store
//!
//! The defaults match the store's documented on-disk contract: the initial
//! slot count is stable across open/close cycles, and the append-only log
//! trusts the OS page cache unless `durable_aol` is set.

/// Default slot count: 8 MiB of slot heads on a 64-bit host.
pub const DEFAULT_SLOT_COUNT: usize = 1 << 20;

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial slot count for the hash table. Must be a power of two and
    /// at least 1024. The table doubles whenever the record count reaches
    /// the slot count.
    pub initial_slots: usize,
    /// Sync the append-only log to persistent storage after every command.
    /// Off by default: each command is still written and flushed
    /// immediately, but the OS decides when it reaches the platter.
    pub durable_aol: bool,
}

impl Config {
    /// Standard sizing: a million slots up front, OS-paced log durability.
    pub fn standard() -> Self {
        Self {
            initial_slots: DEFAULT_SLOT_COUNT,
            durable_aol: false,
        }
    }

    /// Minimal footprint for embedding in small processes: the smallest
    /// permitted table, grown on demand.
    pub fn compact() -> Self {
        Self {
            initial_slots: 1024,
            durable_aol: false,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !self.initial_slots.is_power_of_two() {
            return Err("initial_slots must be a power of two".into());
        }
        if self.initial_slots < 1024 {
            return Err("initial_slots must be >= 1024".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::standard()
    }
}
