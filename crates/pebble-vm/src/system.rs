//! The host dependency the VM calls out through (spec §6.1).
//!
//! Scoped to exactly the operations the execution unit itself invokes:
//! formatted output, a monotonic clock for the scheduler, and a device
//! name used in diagnostics. `fileSystem`/`gpio`/`taskManager`/
//! `createTCP`/`createUDP` name host-side peripherals this engine never
//! touches directly (spec §1 scopes the core engine away from them), so
//! they are omitted here rather than carried as unused stub methods.

pub trait SystemInterface {
    fn printf(&mut self, s: &str);
    fn current_microseconds(&self) -> u64;
    fn set_device_name(&mut self, name: &str);
}

/// In-memory double for tests: captures everything written through
/// `printf` instead of touching a real console.
#[derive(Debug, Default)]
pub struct TestSystemInterface {
    pub output: String,
    pub micros: u64,
    pub device_name: String,
}

impl TestSystemInterface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SystemInterface for TestSystemInterface {
    fn printf(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn current_microseconds(&self) -> u64 {
        self.micros
    }

    fn set_device_name(&mut self, name: &str) {
        self.device_name = name.to_string();
    }
}
