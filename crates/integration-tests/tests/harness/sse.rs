//! Helpers for reading downstream SSE bodies

/// `data:` payloads of an SSE body, in order
pub fn data_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(str::to_owned)
        .collect()
}

/// JSON chunks, skipping the `[DONE]` terminator
pub fn chunks(lines: &[String]) -> Vec<serde_json::Value> {
    lines
        .iter()
        .filter(|line| line.as_str() != "[DONE]")
        .map(|line| serde_json::from_str(line).expect("chunk is JSON"))
        .collect()
}

/// Concatenated `delta.content` across chunks
pub fn content(chunks: &[serde_json::Value]) -> String {
    chunks
        .iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"]["content"].as_str())
        .collect()
}

/// Concatenated tool-call arguments per tool-call index
pub fn tool_arguments(chunks: &[serde_json::Value]) -> Vec<String> {
    let mut arguments: Vec<String> = Vec::new();
    for call in chunks
        .iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"]["tool_calls"].as_array())
        .flatten()
    {
        let index = usize::try_from(call["index"].as_u64().unwrap_or(0)).unwrap_or(0);
        if arguments.len() <= index {
            arguments.resize(index + 1, String::new());
        }
        if let Some(fragment) = call["function"]["arguments"].as_str() {
            arguments[index].push_str(fragment);
        }
    }
    arguments
}

/// Tool-call names in the order they were announced
pub fn tool_names(chunks: &[serde_json::Value]) -> Vec<String> {
    chunks
        .iter()
        .filter_map(|chunk| chunk["choices"][0]["delta"]["tool_calls"].as_array())
        .flatten()
        .filter_map(|call| call["function"]["name"].as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}
