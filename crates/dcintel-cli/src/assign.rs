//! `key=value` arguments for `dcintel call`, typed by the tool's schema.

use anyhow::{anyhow, bail, Result};
use dcintel_core::{ParamKind, Parameters, Scalar, ToolId};

pub fn parse_all(tool: ToolId, args: &[String]) -> Result<Parameters> {
    let mut out = Parameters::new();
    for arg in args {
        let (key, value) = parse_one(tool, arg)?;
        if out.insert(key.clone(), value).is_some() {
            bail!("parameter '{key}' given twice");
        }
    }
    Ok(out)
}

fn parse_one(tool: ToolId, arg: &str) -> Result<(String, Scalar)> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{arg}'"))?;
    let key = key.trim();
    let kind = tool
        .params()
        .iter()
        .find(|p| p.name == key)
        .map(|p| p.kind)
        .ok_or_else(|| anyhow!("{tool} has no parameter '{key}'"))?;

    let value = match kind {
        ParamKind::Str => Scalar::Str(raw.to_string()),
        ParamKind::Int => Scalar::Int(
            raw.trim()
                .parse()
                .map_err(|_| anyhow!("{key} expects an integer, got '{raw}'"))?,
        ),
        ParamKind::Float => Scalar::Float(
            raw.trim()
                .parse()
                .map_err(|_| anyhow!("{key} expects a number, got '{raw}'"))?,
        ),
    };
    Ok((key.to_string(), value))
}
