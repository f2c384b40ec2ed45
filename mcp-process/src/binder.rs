//! The `x-process-args` parameter binder.
//!
//! A binding vector maps the incoming MCP arguments (and, for resources, the
//! request URI and its parameters) onto the positional argument list of the
//! host handler:
//!
//! | spec               | binds |
//! |--------------------|-------|
//! | `":arguments"`     | the whole arguments object |
//! | `":uri"`           | the original URI string (resources) |
//! | `":parameters"`    | the merged parameter map (resources) |
//! | `"$name"`, `"$args.name"`, `"$args.a.b.c"` | a (nested) field of the arguments |
//! | `"$uri.name"`      | a URI template capture (resources) |
//! | `"$query.name"`    | a query-string parameter (resources) |
//! | anything else      | the literal string |

use std::collections::HashMap;

use mcp_types::McpError;
use mcp_types::Result;
use serde_json::Value;
use serde_json::json;

/// Bind tool arguments. An empty spec vector defaults to `[arguments]`.
pub fn bind_tool_args(specs: &[String], arguments: &Value) -> Result<Vec<Value>> {
    if specs.is_empty() {
        return Ok(vec![arguments.clone()]);
    }
    specs
        .iter()
        .map(|spec| bind_one(spec, arguments, None))
        .collect()
}

/// Bind resource arguments. An empty spec vector defaults to `[uri]`.
/// URI-template captures and query-string parameters stay separate so
/// `$uri.name` and `$query.name` each read from their own source;
/// `:parameters` sees the merged map with URI captures winning.
pub fn bind_resource_args(
    specs: &[String],
    arguments: &Value,
    uri: &str,
    uri_params: &HashMap<String, String>,
    query_params: &HashMap<String, String>,
) -> Result<Vec<Value>> {
    if specs.is_empty() {
        return Ok(vec![Value::String(uri.to_string())]);
    }
    let context = ResourceContext {
        uri,
        uri_params,
        query_params,
    };
    specs
        .iter()
        .map(|spec| bind_one(spec, arguments, Some(&context)))
        .collect()
}

struct ResourceContext<'a> {
    uri: &'a str,
    uri_params: &'a HashMap<String, String>,
    query_params: &'a HashMap<String, String>,
}

impl ResourceContext<'_> {
    fn merged_parameters(&self) -> HashMap<String, String> {
        let mut merged = self.query_params.clone();
        merged.extend(
            self.uri_params
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        merged
    }
}

fn bind_one(spec: &str, arguments: &Value, resource: Option<&ResourceContext>) -> Result<Value> {
    match spec {
        ":arguments" => return Ok(arguments.clone()),
        ":uri" => {
            return match resource {
                Some(context) => Ok(Value::String(context.uri.to_string())),
                None => Err(McpError::Bind(
                    "`:uri` is only valid for resources".to_string(),
                )),
            };
        }
        ":parameters" => {
            return match resource {
                Some(context) => Ok(json!(context.merged_parameters())),
                None => Err(McpError::Bind(
                    "`:parameters` is only valid for resources".to_string(),
                )),
            };
        }
        _ => {}
    }

    let Some(reference) = spec.strip_prefix('$') else {
        // Literal value, passed through unchanged.
        return Ok(Value::String(spec.to_string()));
    };

    let segments: Vec<&str> = reference.split('.').collect();
    match segments.as_slice() {
        ["args"] => Ok(arguments.clone()),
        ["args", rest @ ..] => lookup_path(arguments, rest),
        ["uri", name] => match resource {
            Some(context) => Ok(parameter_value(context.uri_params, name)),
            None => Err(McpError::Bind(format!(
                "`{spec}` is only valid for resources"
            ))),
        },
        ["query", name] => match resource {
            Some(context) => Ok(parameter_value(context.query_params, name)),
            None => Err(McpError::Bind(format!(
                "`{spec}` is only valid for resources"
            ))),
        },
        path => lookup_path(arguments, path),
    }
}

fn parameter_value(parameters: &HashMap<String, String>, name: &str) -> Value {
    parameters
        .get(name)
        .map(|value| Value::String(value.clone()))
        .unwrap_or(Value::Null)
}

/// Walk a dotted path through the arguments object. A missing field binds
/// to null; a non-object value in the middle of the path is an error.
fn lookup_path(arguments: &Value, path: &[&str]) -> Result<Value> {
    if !arguments.is_object() {
        return Err(McpError::Bind(
            "arguments must be an object for field extraction".to_string(),
        ));
    }

    let mut current = arguments;
    for (depth, segment) in path.iter().enumerate() {
        let Value::Object(map) = current else {
            return Err(McpError::Bind(format!(
                "`{}` is not an object",
                path[..depth].join(".")
            )));
        };
        match map.get(*segment) {
            Some(next) => current = next,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_specs_default_to_arguments() {
        let arguments = json!({"a": 1});
        assert_eq!(
            bind_tool_args(&[], &arguments).expect("bind"),
            vec![arguments.clone()]
        );
    }

    #[test]
    fn positional_field_extraction() {
        let specs: Vec<String> = ["$name", "$email", "$phone", "$status"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let arguments = json!({
            "name": "A",
            "email": "a@x",
            "phone": "1",
            "status": "active"
        });
        assert_eq!(
            bind_tool_args(&specs, &arguments).expect("bind"),
            vec![json!("A"), json!("a@x"), json!("1"), json!("active")]
        );
    }

    #[test]
    fn nested_paths_follow_the_contract() {
        let specs = vec!["$args.a.b.c".to_string()];

        let hit = json!({"a": {"b": {"c": "v"}}});
        assert_eq!(
            bind_tool_args(&specs, &hit).expect("bind"),
            vec![json!("v")]
        );

        let missing_leaf = json!({"a": {"b": {}}});
        assert_eq!(
            bind_tool_args(&specs, &missing_leaf).expect("bind"),
            vec![Value::Null]
        );

        let non_object_mid_path = json!({"a": {"b": "x"}});
        let err = bind_tool_args(&specs, &non_object_mid_path).expect_err("must fail");
        assert!(matches!(err, McpError::Bind(_)));
    }

    #[test]
    fn non_object_arguments_cannot_be_indexed() {
        let err = bind_tool_args(&["$name".to_string()], &json!([1, 2])).expect_err("must fail");
        assert!(matches!(err, McpError::Bind(_)));
    }

    #[test]
    fn literals_and_whole_argument_forms() {
        let arguments = json!({"k": 1});
        let specs: Vec<String> = [":arguments", "$args", "constant"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            bind_tool_args(&specs, &arguments).expect("bind"),
            vec![arguments.clone(), arguments.clone(), json!("constant")]
        );
    }

    #[test]
    fn resource_forms_bind_uri_and_parameters() {
        let uri_params = HashMap::from([("id".to_string(), "123".to_string())]);
        let query_params = HashMap::from([("limit".to_string(), "10".to_string())]);
        let specs: Vec<String> = [":uri", "$uri.id", "$query.limit", "$query.absent", ":parameters"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let bound = bind_resource_args(
            &specs,
            &json!({}),
            "customers://123?limit=10",
            &uri_params,
            &query_params,
        )
        .expect("bind");
        assert_eq!(bound[0], json!("customers://123?limit=10"));
        assert_eq!(bound[1], json!("123"));
        assert_eq!(bound[2], json!("10"));
        assert_eq!(bound[3], Value::Null);
        assert_eq!(bound[4], json!({"id": "123", "limit": "10"}));
    }

    #[test]
    fn uri_and_query_sources_stay_distinct() {
        // The same key in both sources: each form reads its own map, and
        // the merged `:parameters` view prefers the URI capture.
        let uri_params = HashMap::from([("id".to_string(), "from-uri".to_string())]);
        let query_params = HashMap::from([("id".to_string(), "from-query".to_string())]);
        let specs: Vec<String> = ["$uri.id", "$query.id", ":parameters"]
            .iter()
            .map(ToString::to_string)
            .collect();
        let bound = bind_resource_args(
            &specs,
            &json!({}),
            "customers://from-uri?id=from-query",
            &uri_params,
            &query_params,
        )
        .expect("bind");
        assert_eq!(bound[0], json!("from-uri"));
        assert_eq!(bound[1], json!("from-query"));
        assert_eq!(bound[2], json!({"id": "from-uri"}));

        // A capture name absent from the query map binds null there, and
        // vice versa.
        let bound = bind_resource_args(
            &["$query.missing".to_string(), "$uri.missing".to_string()],
            &json!({}),
            "customers://from-uri",
            &uri_params,
            &query_params,
        )
        .expect("bind");
        assert_eq!(bound, vec![Value::Null, Value::Null]);
    }

    #[test]
    fn resource_only_forms_fail_for_tools() {
        for spec in [":uri", ":parameters", "$uri.id", "$query.limit"] {
            let err =
                bind_tool_args(&[spec.to_string()], &json!({})).expect_err("resource-only");
            assert!(matches!(err, McpError::Bind(_)), "{spec}");
        }
    }

    #[test]
    fn empty_resource_specs_default_to_uri() {
        let bound = bind_resource_args(
            &[],
            &json!({}),
            "config://app",
            &HashMap::new(),
            &HashMap::new(),
        )
        .expect("bind");
        assert_eq!(bound, vec![json!("config://app")]);
    }
}
