//! Adversarial bodies. Built as strings so arbitrary depth never recurses.

use serde_json::json;

/// User name carried by the deep-nesting probe.
pub const DEPTH_PROBE_USER: &str = "depth_attacker";

/// A message envelope whose text is `filler` bytes of `A`.
pub fn oversized_body(filler: usize) -> String {
    json!({
        "type": "message",
        "text": "A".repeat(filler),
        "note": "buffer limit probe"
    })
    .to_string()
}

/// A join envelope carrying `depth` nested `{"child": ...}` objects.
pub fn nested_body(depth: usize) -> String {
    let head = r#"{"child":"#;
    let mut out = String::with_capacity(96 + depth * (head.len() + 1));
    out.push_str(r#"{"type":"join","user_name":""#);
    out.push_str(DEPTH_PROBE_USER);
    out.push_str(r#"","channel_id":1,"attack_data":"#);
    for _ in 0..depth {
        out.push_str(head);
    }
    out.push_str("{}");
    for _ in 0..depth {
        out.push('}');
    }
    out.push('}');
    out
}
