//! Shared helpers for storage integration tests.

use std::cell::Cell;
use std::rc::Rc;

/// Routes `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Component that counts its drops.
pub struct DropCounter {
    pub value: i32,
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new(value: i32, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            value,
            drops: Rc::clone(drops),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}
