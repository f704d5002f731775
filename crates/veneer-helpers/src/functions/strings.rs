// SPDX-License-Identifier: Apache-2.0 OR MIT
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase};
use serde_json::{json, Value};
use veneer_engine::{Error, HelperMeta, HelperOutcome, HelperRegistryBuilder};

use super::{expect_no_args, working_string};

pub fn register(builder: &mut HelperRegistryBuilder) {
    builder
        .register("upper", upper)
        .register("lower", lower)
        .register("trim", trim)
        .register("snakecase", snakecase)
        .register("camelcase", camelcase)
        .register("kebabcase", kebabcase);
}

pub fn upper(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("upper", args)?;
    Ok(HelperOutcome::Value(json!(working_string(value).to_uppercase())))
}

pub fn lower(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("lower", args)?;
    Ok(HelperOutcome::Value(json!(working_string(value).to_lowercase())))
}

pub fn trim(value: &Value, args: &[Value], _meta: &HelperMeta) -> Result<HelperOutcome, Error> {
    expect_no_args("trim", args)?;
    Ok(HelperOutcome::Value(json!(working_string(value).trim())))
}

pub fn snakecase(
    value: &Value,
    args: &[Value],
    _meta: &HelperMeta,
) -> Result<HelperOutcome, Error> {
    expect_no_args("snakecase", args)?;
    Ok(HelperOutcome::Value(json!(working_string(value).to_snake_case())))
}

pub fn camelcase(
    value: &Value,
    args: &[Value],
    _meta: &HelperMeta,
) -> Result<HelperOutcome, Error> {
    expect_no_args("camelcase", args)?;
    Ok(HelperOutcome::Value(json!(
        working_string(value).to_lower_camel_case()
    )))
}

pub fn kebabcase(
    value: &Value,
    args: &[Value],
    _meta: &HelperMeta,
) -> Result<HelperOutcome, Error> {
    expect_no_args("kebabcase", args)?;
    Ok(HelperOutcome::Value(json!(working_string(value).to_kebab_case())))
}
