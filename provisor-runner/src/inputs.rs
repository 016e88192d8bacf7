//! Assembling a resource configuration from command line flags.

use anyhow::{bail, Context, Result};
use provisor_core::Config;
use serde_json::Value;

// NOTE (loss of ordering):
//
// clap_derive appears incapable of preserving the order of flags, as it
// rejects a Vec of enums that would allow for this. This means that we can't
// tell which input was specified last, and so we can't make later inputs
// override earlier ones. Eventually this may be supported, so we carve out
// this possibility by rejecting duplicate inputs. Otherwise, this improvement
// would be a breaking change.

/// Merge `--inputs-json`, `--input-json NAME JSON` and `--input-str NAME STR`
/// into one configuration. The pair slices hold names and values
/// alternately.
pub fn collect(
    inputs_json: Option<&str>,
    input_json: &[String],
    input_str: &[String],
) -> Result<Config> {
    let mut inputs = match inputs_json {
        Some(json_string) => {
            let value: Value = serde_json::from_str(json_string)
                .with_context(|| "failed to parse value of --inputs-json")?;
            Config::from_value(value)
                .ok_or_else(|| anyhow::anyhow!("--inputs-json must be a JSON object"))?
        }
        None => Config::new(),
    };

    for pair in input_json.chunks(2) {
        let [k, v] = pair else {
            bail!("--input-json takes a name and a value");
        };
        insert_new(
            &mut inputs,
            k,
            serde_json::from_str(v)
                .with_context(|| format!("failed to parse JSON value for input: {}", k))?,
        )?;
    }
    for pair in input_str.chunks(2) {
        let [k, v] = pair else {
            bail!("--input-str takes a name and a value");
        };
        insert_new(&mut inputs, k, Value::String(v.clone()))?;
    }

    Ok(inputs)
}

fn insert_new(inputs: &mut Config, k: &str, v: Value) -> Result<()> {
    if inputs.contains_key(k) {
        // No overriding; see note "loss of ordering"
        bail!("duplicate input: {}", k);
    }
    inputs.insert(k.to_string(), v);
    Ok(())
}
