//! `${VAR}` references in `navtree.toml` string settings.

use std::env::VarError;

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` in an optional setting in place.
///
/// Unset settings stay unset. Bare `$VAR` is kept literally, since
/// generated file names may contain `$`.
pub(crate) fn expand_setting(value: &mut Option<String>, field: &str) -> Result<(), ConfigError> {
    if let Some(raw) = value.as_deref().filter(|raw| raw.contains("${")) {
        *value = Some(expand_env(raw, field)?);
    }
    Ok(())
}

fn expand_env(raw: &str, field: &str) -> Result<String, ConfigError> {
    let expanded = shellexpand::env_with_context(raw, |name| std::env::var(name).map(Some))
        .map_err(|e| {
            let reason = match e.cause {
                VarError::NotPresent => "not set",
                VarError::NotUnicode(_) => "not valid UTF-8",
            };
            ConfigError::EnvVar {
                field: field.to_owned(),
                message: format!("${{{}}} {reason}", e.var_name),
            }
        })?;
    Ok(expanded.into_owned())
}
