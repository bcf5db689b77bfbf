//! Mock implementations of the memory-side interfaces.

use mockall::mock;
use ooo_core::mem::FilterCache;

mock! {
    /// Scriptable L1 filter cache.
    pub L1Filter {}
    impl FilterCache for L1Filter {
        fn load(&mut self, addr: u64, req_cycle: u64) -> u64;
        fn store(&mut self, addr: u64, req_cycle: u64) -> u64;
        fn context_switch(&mut self);
    }
}
