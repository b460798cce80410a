//! Plugin parameters
//!
//! protoc passes everything after `--twirp-template_opt=` as one comma
//! separated string of `key=value` pairs.

use twirp_template::{KeyStyle, TemplateOptions};

use crate::error::PluginError;

/// Parse the plugin parameter string into generation options
pub fn parse(param: &str) -> Result<TemplateOptions, PluginError> {
    let mut options = TemplateOptions::default();
    let parts = param.split(',').map(str::trim);
    for part in parts.filter(|part| !part.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(PluginError::Parameter(part.to_string()));
        };
        options = match key {
            "keys" => {
                let style = value.parse::<KeyStyle>().map_err(PluginError::Parameter)?;
                options.key_style(style)
            }
            "max_depth" => options.max_depth(bound(key, value)?),
            "recursion_limit" => options.recursion_limit(bound(key, value)?),
            "expansion_limit" => options.expansion_limit(bound(key, value)?),
            _ => return Err(PluginError::Parameter(part.to_string())),
        };
    }
    Ok(options)
}

fn bound(key: &str, value: &str) -> Result<usize, PluginError> {
    value
        .parse()
        .map_err(|e| PluginError::Parameter(format!("{key}={value}: {e}")))
}
