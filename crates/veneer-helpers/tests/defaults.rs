// SPDX-License-Identifier: Apache-2.0 OR MIT
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;
use veneer_engine::{Engine, ViewRegistry};
use veneer_helpers::default_helpers;

#[derive(Debug, Deserialize)]
struct Fixture {
    name: String,
    template: String,
    #[serde(default)]
    data: Value,
    expected: String,
}

#[test]
fn default_helper_fixtures_render_as_recorded() {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let root = manifest_dir
        .parent()
        .expect("workspace root missing")
        .parent()
        .expect("workspace root missing again");
    let path = root.join("test-cases/veneer-helpers.json");
    let bytes = fs::read(&path).expect("test cases file missing");
    let cases: Vec<Fixture> = serde_json::from_slice(&bytes).expect("invalid test cases json");

    let engine = Engine::with_registries(default_helpers(), ViewRegistry::default());
    for case in cases {
        let output = engine
            .render(&case.template, &case.data)
            .unwrap_or_else(|err| panic!("render {} failed: {}", case.name, err));
        assert_eq!(
            output, case.expected,
            "fixture {} rendered incorrectly",
            case.name
        );
    }
}
