use std::collections;

/// Case-insensitive, multi-valued header map (`Received` and friends repeat).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Headers {
  // Preserves insertion order per-name and across names via a side index would be nicer, but a
  // plain ordered Vec of pairs keeps this simple and is what callers iterate most often anyway.
  entries: Vec<(String, String)>,
}

impl Headers {
  pub fn get_all(&self, name: &str) -> Vec<&str> {
    self
      .entries
      .iter()
      .filter(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
      .collect()
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.get_all(name).into_iter().next()
  }

  pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.entries.push((name.into(), value.into()));
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
  }
}

/// Joins CRLF+WSP continuation lines into a single logical line per header, replacing the fold
/// with a single space. `block` is the raw header section, CRLF-terminated lines, ending at the
/// blank line separating headers from body (not included).
pub fn unfold(block: &str) -> Headers {
  let mut headers = Headers::default();
  let mut current: Option<(String, String)> = None;
  for line in block.split("\r\n").flat_map(|l| l.split('\n')) {
    if line.is_empty() {
      continue;
    }
    if (line.starts_with(' ') || line.starts_with('\t')) && current.is_some() {
      let (_, value) = current.as_mut().unwrap();
      value.push(' ');
      value.push_str(line.trim_start());
    } else {
      if let Some((name, value)) = current.take() {
        headers.push(name, value);
      }
      match line.split_once(':') {
        Some((name, value)) => current = Some((name.to_string(), value.trim_start().to_string())),
        None => continue, // malformed line, drop rather than panic
      }
    }
  }
  if let Some((name, value)) = current {
    headers.push(name, value);
  }
  headers
}

/// The encode direction of unfold: wraps a single logical header value across multiple physical
/// lines so no line exceeds 78 columns, folding at a whitespace boundary and prefixing
/// continuations with a single space, per RFC 5322 section 2.2.3.
pub fn fold(name: &str, value: &str) -> String {
  const LIMIT: usize = 78;
  let prefix = format!("{name}: ");
  let mut lines = Vec::new();
  let mut current = prefix.clone();
  for word in value.split(' ') {
    let candidate_len = current.len() + if current.ends_with(' ') || current == prefix {
      word.len()
    } else {
      1 + word.len()
    };
    if candidate_len > LIMIT && current != prefix {
      lines.push(current);
      current = format!(" {word}");
    } else {
      if current != prefix && !current.ends_with(' ') {
        current.push(' ');
      }
      current.push_str(word);
    }
  }
  lines.push(current);
  lines.join("\r\n")
}

/// Splits `text/plain; charset="utf-8"; name=x` into the bare value and its parameters.
pub fn split_params(value: &str) -> (String, collections::BTreeMap<String, String>) {
  let mut parts = value.split(';');
  let head = parts.next().unwrap_or("").trim().to_string();
  let mut params = collections::BTreeMap::new();
  for part in parts {
    let part = part.trim();
    if part.is_empty() {
      continue;
    }
    let Some((key, raw)) = part.split_once('=') else {
      continue;
    };
    let key = key.trim().to_ascii_lowercase();
    let raw = raw.trim();
    let value = if let Some(stripped) = raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
      stripped.to_string()
    } else {
      raw.to_string()
    };
    params.insert(key, value);
  }
  (head, params)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unfolds_continuation_lines() {
    let block = "Subject: Hello\r\n World\r\nFrom: a@b\r\n";
    let headers = unfold(block);
    assert_eq!(headers.get("Subject"), Some("Hello World"));
    assert_eq!(headers.get("from"), Some("a@b"));
  }

  #[test]
  fn multi_valued_headers_preserved() {
    let block = "Received: one\r\nReceived: two\r\n";
    let headers = unfold(block);
    assert_eq!(headers.get_all("received"), vec!["one", "two"]);
  }

  #[test]
  fn fold_unfold_round_trip() {
    let value = "a ".repeat(40);
    let folded = fold("Subject", value.trim());
    let reblocked = format!("{folded}\r\n");
    let headers = unfold(&reblocked);
    assert_eq!(headers.get("Subject").unwrap(), value.trim());
  }

  #[test]
  fn params_quoted_and_unquoted() {
    let (value, params) = split_params(r#"text/plain; charset="utf-8"; name=x"#);
    assert_eq!(value, "text/plain");
    assert_eq!(params.get("charset"), Some(&"utf-8".to_string()));
    assert_eq!(params.get("name"), Some(&"x".to_string()));
  }
}
