// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The standard helper set for the Veneer template engine: comparison
//! predicates for section gating, string transforms, and list utilities.
//!
//! Helpers are deliberately small and pure. Predicates return
//! `HelperOutcome::Bool` so a `false` diverts the section to its
//! else-body (or skips the entry when iterating); transforms return
//! `HelperOutcome::Value` to replace the working value for the rest of
//! the chain.

#![forbid(unsafe_code)]

use once_cell::sync::Lazy;
use veneer_engine::{HelperRegistry, HelperRegistryBuilder};

mod functions;

static DEFAULTS: Lazy<HelperRegistry> = Lazy::new(|| {
    let mut builder = HelperRegistryBuilder::new();
    install_default_helpers(&mut builder);
    builder.build()
});

/// Registers the standard helpers into an existing registry builder.
pub fn install_default_helpers(builder: &mut HelperRegistryBuilder) {
    functions::install_all(builder);
}

/// Returns the shared registry of standard helpers. The registry is built
/// once and cheap to clone.
pub fn default_helpers() -> HelperRegistry {
    DEFAULTS.clone()
}
