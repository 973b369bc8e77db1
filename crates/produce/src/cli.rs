//! Core logic of the `produce-patch` binary.

use std::path::PathBuf;

use produce_value::Value;
use thiserror::Error;

use crate::codec::json::from_json_patch;
use crate::engine::Engine;
use crate::error::PatchError;

pub const USAGE: &str = "\
usage: produce-patch [--compact] (<patches> | --file <path>)

Reads a JSON document on stdin, applies the patch list and prints the result.

A patch list is a JSON array of {\"op\", \"path\", \"value\"} objects. `op` is
add, remove or replace. `path` is either an array of steps such as
[\"users\", 0, \"name\"] or a JSON Pointer such as \"/users/0/name\"; the
empty path [] addresses the whole document. `-` as the last step appends
to a sequence. A set remove may name its member in `value`.

options:
  -f, --file <path>  read the patch list from a file
  -c, --compact      print the result on one line
  -h, --help         print this text";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Patch(#[from] PatchError),
}

/// Where the patch list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub patches: PatchSource,
    pub compact: bool,
}

impl Options {
    /// Parses the arguments after the program name. `--help` is left to
    /// the caller.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Options, CliError> {
        let mut patches = None;
        let mut compact = false;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let source = match arg.as_str() {
                "-c" | "--compact" => {
                    compact = true;
                    continue;
                }
                "-f" | "--file" => {
                    let path = args.next().ok_or_else(|| usage("--file needs a path"))?;
                    PatchSource::File(path.into())
                }
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(usage(format!("unknown option {flag}")));
                }
                _ => PatchSource::Inline(arg),
            };
            if patches.replace(source).is_some() {
                return Err(usage("more than one patch list given"));
            }
        }
        let patches = patches.ok_or_else(|| usage("missing patch list"))?;
        Ok(Options { patches, compact })
    }

    pub fn read_patches(&self) -> Result<String, CliError> {
        match &self.patches {
            PatchSource::Inline(json) => Ok(json.clone()),
            PatchSource::File(path) => Ok(std::fs::read_to_string(path)?),
        }
    }
}

fn usage(msg: impl Into<String>) -> CliError {
    CliError::Usage(msg.into())
}

/// Applies a JSON patch list to a JSON document.
pub fn patch_document(doc_json: &str, patch_json: &str) -> Result<Value, CliError> {
    let doc: Value = serde_json::from_str(doc_json)?;
    let patches = from_json_patch(&serde_json::from_str(patch_json)?)?;
    Ok(Engine::default().apply_patches(&doc, &patches)?)
}

pub fn render(value: &Value, compact: bool) -> Result<String, CliError> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(text)
}

/// Applies a JSON patch list to a JSON document.
///
/// Returns the patched document as pretty-printed JSON.
pub fn apply_json_patch(doc_json: &str, patch_json: &str) -> Result<String, CliError> {
    render(&patch_document(doc_json, patch_json)?, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn run(doc: &str, patch: &str) -> Json {
        serde_json::from_str(&apply_json_patch(doc, patch).unwrap()).unwrap()
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn patch_add_key() {
        let v = run(r#"{"a":1}"#, r#"[{"op":"add","path":["b"],"value":2}]"#);
        assert_eq!(v["b"], 2);
    }

    #[test]
    fn patch_with_pointer_path() {
        let v = run(r#"{"list":[1,2,3]}"#, r#"[{"op":"remove","path":"/list/0"}]"#);
        assert_eq!(v["list"], serde_json::json!([2, 3]));
    }

    #[test]
    fn array_and_pointer_paths_mix() {
        let patch = r#"[
            {"op":"replace","path":["users",0,"name"],"value":"Bo"},
            {"op":"add","path":"/users/-","value":{"name":"Cy"}}
        ]"#;
        let v = run(r#"{"users":[{"name":"Al"}]}"#, patch);
        assert_eq!(v, serde_json::json!({"users": [{"name": "Bo"}, {"name": "Cy"}]}));
    }

    #[test]
    fn missing_target_fails() {
        let err = apply_json_patch(r#"{"a":1}"#, r#"[{"op":"remove","path":["b"]}]"#).unwrap_err();
        assert!(matches!(err, CliError::Patch(PatchError::NotFound)));
        assert_eq!(err.to_string(), "NOT_FOUND");
    }

    #[test]
    fn invalid_json_fails() {
        assert!(matches!(apply_json_patch("{", "[]"), Err(CliError::Json(_))));
    }

    #[test]
    fn compact_output_is_one_line() {
        let doc = patch_document(r#"{"a":[1,2]}"#, "[]").unwrap();
        assert_eq!(render(&doc, true).unwrap(), r#"{"a":[1,2]}"#);
        assert!(render(&doc, false).unwrap().contains('\n'));
    }

    #[test]
    fn options_parse() {
        let inline = Options::parse(args(&["-c", "[]"])).unwrap();
        assert_eq!(inline, Options { patches: PatchSource::Inline("[]".into()), compact: true });
        let file = Options::parse(args(&["--file", "ops.json"])).unwrap();
        assert_eq!(file.patches, PatchSource::File("ops.json".into()));
        assert!(!file.compact);
    }

    #[test]
    fn bad_arguments_are_usage_errors() {
        let cases: [&[&str]; 4] = [&[], &["--file"], &["[]", "[]"], &["--inverse", "[]"]];
        for bad in cases {
            assert!(matches!(Options::parse(args(bad)), Err(CliError::Usage(_))), "{bad:?}");
        }
    }

    #[test]
    fn unreadable_patch_file_is_io_error() {
        let options = Options { patches: PatchSource::File("/nonexistent/patches.json".into()), compact: false };
        assert!(matches!(options.read_patches(), Err(CliError::Io(_))));
    }
}
