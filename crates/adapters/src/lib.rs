// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ne-adapters: seams to the two external systems every engine touches:
//! the TagBus key-value bus and the host's service manager.

pub mod bus;
pub mod service;

pub use bus::{callback, keys, BusCallback, BusError, MemoryTagBus, TagBus, TagValue};
pub use service::{
    service_name, ServiceManager, SystemdManager, UnitError, UnitSpec, UnitWriter,
    DEFAULT_UNIT_DIR,
};

#[cfg(any(test, feature = "test-support"))]
pub use service::{FakeServiceManager, ServiceCall};
