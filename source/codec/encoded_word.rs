// https://www.rfc-editor.org/rfc/rfc2047
//
// encoded-word = "=?" charset "?" encoding "?" encoded-text "?="

use super::{base64, quoted_printable};

fn decode_charset(charset: &str, bytes: &[u8]) -> String {
  match encoding_rs::Encoding::for_label(charset.as_bytes()) {
    Some(encoding) => encoding.decode(bytes).0.into_owned(),
    // Unknown charset: pass through with substitution rather than failing the whole header.
    None => String::from_utf8_lossy(bytes).into_owned(),
  }
}

fn decode_qword(text: &[u8]) -> Vec<u8> {
  // https://www.rfc-editor.org/rfc/rfc2047#section-4.2 - '_' stands for a space in the Q encoding.
  let substituted: Vec<u8> = text
    .iter()
    .map(|&b| if b == b'_' { b' ' } else { b })
    .collect();
  quoted_printable::decode(&substituted)
}

struct Word<'a> {
  charset: &'a str,
  text: String,
}

fn find_word(input: &[u8]) -> Option<(Word<'_>, usize)> {
  if !input.starts_with(b"=?") {
    return None;
  }
  let rest = &input[2..];
  let charset_end = rest.iter().position(|&b| b == b'?')?;
  let charset = std::str::from_utf8(&rest[..charset_end]).ok()?;
  let after_charset = &rest[charset_end + 1..];
  if after_charset.len() < 2 || after_charset.as_bytes().get(1) != Some(&b'?') {
    return None;
  }
  let encoding = after_charset[0].to_ascii_uppercase();
  let text_start = &after_charset[2..];
  let text_end = find_subsequence(text_start, b"?=")?;
  let encoded_text = &text_start[..text_end];
  let decoded = match encoding {
    b'Q' => decode_charset(charset, &decode_qword(encoded_text)),
    b'B' => decode_charset(charset, &base64::decode(encoded_text).unwrap_or_default()),
    _ => return None,
  };
  let total_len = 2 /* =? */ + charset_end + 1 /* ? */ + 2 /* Q? or B? */ + text_end + 2 /* ?= */;
  Some((
    Word {
      charset,
      text: decoded,
    },
    total_len,
  ))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  haystack
    .windows(needle.len())
    .position(|window| window == needle)
}

/// Decodes all encoded-words in `input`, concatenating them with literal runs. Whitespace that
/// only separates two adjacent encoded-words is dropped, per RFC 2047 section 6.2.
pub fn decode(input: &str) -> String {
  let bytes = input.as_bytes();
  let mut out = String::new();
  let mut i = 0;
  let mut last_was_word = false;
  while i < bytes.len() {
    if bytes[i] == b'=' {
      if let Some((word, len)) = find_word(&bytes[i..]) {
        let _ = word.charset;
        out.push_str(&word.text);
        i += len;
        last_was_word = true;
        continue;
      }
    }
    if bytes[i].is_ascii_whitespace() && last_was_word {
      // Peek ahead: if the rest of the whitespace run is followed by another encoded-word, drop it.
      let mut j = i;
      while j < bytes.len() && bytes[j].is_ascii_whitespace() {
        j += 1;
      }
      if find_word(&bytes[j..]).is_some() {
        i = j;
        continue;
      }
    }
    last_was_word = false;
    // Copy one literal byte (ASCII header text is guaranteed here by the wire grammar).
    out.push(bytes[i] as char);
    i += 1;
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_q_and_b() {
    assert_eq!(decode("=?utf-8?Q?caf=C3=A9?="), "café");
    assert_eq!(decode("=?iso-8859-1?Q?Keith_Moore?="), "Keith Moore");
    assert_eq!(
      decode("=?UTF-8?B?SGVsbG8sIElNQVA=?="),
      "Hello, IMAP"
    );
  }

  #[test]
  fn drops_whitespace_between_adjacent_words() {
    assert_eq!(
      decode("=?utf-8?Q?Hello=2C?= =?utf-8?Q?_World?="),
      "Hello, World"
    );
  }

  #[test]
  fn literal_runs_pass_through() {
    assert_eq!(decode("plain text =?utf-8?Q?caf=C3=A9?= more"), "plain text café more");
  }

  #[test]
  fn malformed_word_returned_verbatim() {
    assert_eq!(decode("=?utf-8?X?broken?="), "=?utf-8?X?broken?=");
  }

  #[test]
  fn unknown_charset_substitutes() {
    let decoded = decode("=?made-up-charset-9000?Q?abc?=");
    assert_eq!(decoded, "abc");
  }
}
