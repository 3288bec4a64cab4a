use rig_vars::{Result, Slot, Variables};

/// A configuration helper without `#[track_caller]`, so the store sees this
/// file as the call site.
#[inline(never)]
pub fn assign(vars: &mut Variables, key: &str, value: impl Into<Slot>) -> Result<()> {
    vars.set(key, value)
}
