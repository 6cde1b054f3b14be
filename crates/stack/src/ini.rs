//! Deterministic INI rendering for Grafana's main config.
//!
//! Takes a JSON settings tree (two levels of sections at most, matching
//! Grafana's `[section]` / `[section.sub]` layout) and renders sorted
//! `key = value` lines. Output is a wire format the running software parses;
//! determinism matters more than generality here.

use std::fmt::Write as _;

/// Render a settings tree. Top-level object values become sections; nested
/// object values become dotted subsections; scalars render as `key = value`.
pub fn encode(settings: &serde_json::Value) -> String {
    let mut out = String::new();
    let Some(sections) = settings.as_object() else {
        return out;
    };
    for (section, body) in sections {
        write_section(&mut out, section, body);
    }
    out
}

fn write_section(out: &mut String, path: &str, body: &serde_json::Value) {
    let Some(map) = body.as_object() else {
        return;
    };
    let _ = writeln!(out, "[{path}]");
    let mut nested = Vec::new();
    for (key, value) in map {
        match value {
            serde_json::Value::Object(_) => nested.push((key, value)),
            serde_json::Value::String(s) => {
                let _ = writeln!(out, "{key} = {s}");
            }
            other => {
                let _ = writeln!(out, "{key} = {other}");
            }
        }
    }
    for (key, value) in nested {
        write_section(out, &format!("{path}.{key}"), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_scalars_and_subsections() {
        let settings = serde_json::json!({
            "server": { "enable_gzip": true, "root_url": "http://localhost:3000" },
            "auth": {
                "disable_login_form": true,
                "anonymous": { "enabled": true, "org_role": "Admin" },
            },
        });
        let ini = encode(&settings);
        assert_eq!(
            ini,
            "[auth]\n\
             disable_login_form = true\n\
             [auth.anonymous]\n\
             enabled = true\n\
             org_role = Admin\n\
             [server]\n\
             enable_gzip = true\n\
             root_url = http://localhost:3000\n"
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let settings = serde_json::json!({ "b": { "x": 1 }, "a": { "y": 2 } });
        assert_eq!(encode(&settings), encode(&settings));
        // serde_json maps are sorted, so section order is stable too.
        assert!(encode(&settings).starts_with("[a]"));
    }
}
