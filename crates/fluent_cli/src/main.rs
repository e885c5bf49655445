use std::{env, fs, process::ExitCode};

use fluent_core::{parse, Bundle, FluentValue};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = match args.get(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: fluentc <file.ftl> <message-id> [attr] [args-json]");
            return ExitCode::FAILURE;
        }
    };
    let Some(message_id) = args.get(2) else {
        eprintln!("usage: fluentc <file.ftl> <message-id> [attr] [args-json]");
        return ExitCode::FAILURE;
    };
    let attr = args.get(3).map(String::as_str).filter(|s| !s.is_empty());
    let fluent_args = match args.get(4) {
        Some(json) => match parse_args_json(json) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => indexmap::IndexMap::new(),
    };

    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (resource, parse_errors) = parse(&source);
    for err in &parse_errors {
        eprintln!("parse error: {err}");
    }

    let bundle = Bundle::new(vec!["en".to_string()]);
    let validation_errors = bundle.validate_resource(&resource);
    for err in &validation_errors {
        eprintln!("validation warning: {err}");
    }
    if let Err(err) = bundle.add_resource(resource) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }

    let (text, format_errors) = bundle.format_pattern(message_id, attr, &fluent_args);
    for err in &format_errors {
        eprintln!("format error: {err}");
    }
    println!("{text}");

    if format_errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    match fs::metadata(file_path) {
        Ok(metadata) if !metadata.is_file() => return Err(format!("{file_path} is not a file")),
        Err(err) => return Err(format!("reading {file_path}: {err}")),
        Ok(_) => {}
    }
    fs::read_to_string(file_path).map_err(|err| format!("reading {file_path}: {err}"))
}

fn parse_args_json(json: &str) -> Result<indexmap::IndexMap<String, FluentValue<'static>>, String> {
    let value: serde_json::Value = serde_json::from_str(json).map_err(|err| format!("invalid args json: {err}"))?;
    let serde_json::Value::Object(map) = value else {
        return Err("args json must be an object".to_string());
    };
    let mut out = indexmap::IndexMap::new();
    for (key, value) in map {
        out.insert(key, json_value_to_fluent(value)?);
    }
    Ok(out)
}

fn json_value_to_fluent(value: serde_json::Value) -> Result<FluentValue<'static>, String> {
    match value {
        serde_json::Value::Null => Ok(FluentValue::None),
        serde_json::Value::Bool(b) => Ok(FluentValue::from(b)),
        serde_json::Value::String(s) => Ok(FluentValue::from(s)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(FluentValue::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(FluentValue::from(f))
            } else {
                Err(format!("unrepresentable number: {n}"))
            }
        }
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Err("arrays and nested objects are not supported as format arguments".to_string())
        }
    }
}
