//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Strip a surrounding markdown code fence (```lang ... ```) if the model added one anyway.
pub fn strip_code_fences(s: &str) -> String {
  let t = s.trim();
  let Some(rest) = t.strip_prefix("```") else { return t.to_string() };
  let body = match rest.find('\n') {
    Some(i) => &rest[i + 1..],
    None => return t.to_string(),
  };
  body.trim_end().strip_suffix("```").unwrap_or(body).trim_end().to_string()
}

/// Log-safe truncation for large strings, on a char boundary.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}
