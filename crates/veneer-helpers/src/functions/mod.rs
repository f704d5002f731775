// SPDX-License-Identifier: Apache-2.0 OR MIT
use serde_json::Value;
use veneer_engine::{value_to_string, Error, HelperRegistryBuilder};

mod flow;
mod lists;
mod strings;

pub fn install_all(builder: &mut HelperRegistryBuilder) {
    flow::register(builder);
    strings::register(builder);
    lists::register(builder);
}

pub(crate) fn expect_exact_args(
    name: &'static str,
    args: &[Value],
    expected: usize,
) -> Result<(), Error> {
    if args.len() != expected {
        return Err(Error::render(
            format!(
                "{name} expected {expected} argument{}, got {}",
                if expected == 1 { "" } else { "s" },
                args.len()
            ),
            None,
        ));
    }
    Ok(())
}

pub(crate) fn expect_no_args(name: &'static str, args: &[Value]) -> Result<(), Error> {
    expect_exact_args(name, args, 0)
}

pub(crate) fn expect_number(
    name: &'static str,
    value: &Value,
    position: usize,
) -> Result<f64, Error> {
    value.as_f64().ok_or_else(|| {
        Error::render(
            format!("{name} argument {position} must be a number, got {value:?}"),
            None,
        )
    })
}

/// The working value as a string, for transforms that operate on text.
pub(crate) fn working_string(value: &Value) -> String {
    value_to_string(value)
}
