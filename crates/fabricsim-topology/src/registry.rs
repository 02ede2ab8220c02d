//! Per-device routing-mode registry.
//!
//! [`SwitchOrExpander`](crate::SwitchOrExpander) picks its inner topology
//! per query from a shared map of device id → MoE flag. The registry is a
//! cheaply clonable handle injected at construction; the harness writes it
//! between simulation runs, never while a simulation is draining.

use crate::types::DeviceId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle over the per-device MoE routing flags. Unset devices
/// default to `false` (switch routing).
#[derive(Debug, Clone, Default)]
pub struct RoutingModeRegistry {
    flags: Rc<RefCell<HashMap<DeviceId, bool>>>,
}

impl RoutingModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the given device routes MoE traffic over the expander.
    pub fn is_moe(&self, device: DeviceId) -> bool {
        self.flags.borrow().get(&device).copied().unwrap_or(false)
    }

    /// Set one device's routing mode.
    pub fn set(&self, device: DeviceId, moe: bool) {
        self.flags.borrow_mut().insert(device, moe);
    }

    /// Set the routing mode of every device in `[0, devices_count)`.
    pub fn set_all(&self, devices_count: usize, moe: bool) {
        let mut flags = self.flags.borrow_mut();
        for device in 0..devices_count {
            flags.insert(device, moe);
        }
    }
}
