//! Shell scripts standing in for the backend CLI

/// Consume stdin, then print each line verbatim
pub fn printing(lines: &[&str]) -> String {
    let mut script = String::from("cat > /dev/null\n");
    for line in lines {
        script.push_str(&format!("printf '%s\\n' '{line}'\n"));
    }
    script
}

/// Print stdin followed by one generated argument per line
pub fn echo_input_and_args() -> String {
    "cat; printf '%s\\n' \"$@\"".to_owned()
}

/// `assistant` event carrying one text block per fragment
pub fn assistant_event(fragments: &[&str]) -> String {
    let content: Vec<serde_json::Value> = fragments
        .iter()
        .map(|text| serde_json::json!({"type": "text", "text": text}))
        .collect();

    serde_json::json!({"type": "assistant", "message": {"content": content}}).to_string()
}

/// Closing `result` event
pub fn result_event(result: &str) -> String {
    serde_json::json!({"type": "result", "subtype": "success", "result": result}).to_string()
}
