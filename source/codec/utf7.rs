// https://www.rfc-editor.org/rfc/rfc3501#section-5.1.3
// Modified UTF-7: printable US-ASCII (0x20-0x7e) other than '&' represents itself; '&' shifts to
// modified BASE64 (UTF-16BE, no padding, ',' instead of '/'), '-' shifts back.

use base64::Engine as _;

fn engine() -> base64::engine::GeneralPurpose {
  base64::engine::GeneralPurpose::new(
    &base64::alphabet::IMAP_MUTF7,
    base64::engine::general_purpose::NO_PAD,
  )
}

pub fn decode(input: &[u8]) -> Option<String> {
  let engine = engine();
  let mut buffer = Vec::new();
  let mut output = String::new();
  let mut i = 0;
  while i < input.len() {
    match input[i] {
      b'&' => {
        let start = i;
        loop {
          i += 1;
          if i == input.len() {
            return None;
          }
          if input[i] == b'-' {
            break;
          }
        }
        if start + 1 == i {
          // "&-" is a literal '&'.
          output.push('&');
        } else {
          buffer.clear();
          engine.decode_vec(&input[start + 1..i], &mut buffer).ok()?;
          let mut decoder = encoding_rs::UTF_16BE.new_decoder_without_bom_handling();
          let mut chunk = String::with_capacity(buffer.len());
          let (result, _) = decoder.decode_to_string_without_replacement(&buffer, &mut chunk, true);
          match result {
            encoding_rs::DecoderResult::InputEmpty => output.push_str(&chunk),
            _ => return None,
          }
        }
      }
      c @ 0x20..=0x25 | c @ 0x27..=0x7e => output.push(c as char),
      _ => return None,
    }
    i += 1;
  }
  Some(output)
}

/// Encode direction, needed whenever the Command Builder emits a mailbox name that isn't plain
/// ASCII (SELECT/LIST/APPEND/COPY/MOVE all take mailbox names on the wire).
pub fn encode(input: &str) -> String {
  let engine = engine();
  let mut output = String::new();
  let mut pending_utf16: Vec<u16> = Vec::new();

  fn flush(output: &mut String, pending_utf16: &mut Vec<u16>, engine: &base64::engine::GeneralPurpose) {
    if pending_utf16.is_empty() {
      return;
    }
    let mut bytes = Vec::with_capacity(pending_utf16.len() * 2);
    for unit in pending_utf16.drain(..) {
      bytes.extend_from_slice(&unit.to_be_bytes());
    }
    output.push('&');
    output.push_str(&engine.encode(bytes));
    output.push('-');
  }

  for c in input.chars() {
    if c == '&' {
      flush(&mut output, &mut pending_utf16, &engine);
      output.push_str("&-");
    } else if (0x20..=0x7e).contains(&(c as u32)) {
      flush(&mut output, &mut pending_utf16, &engine);
      output.push(c);
    } else {
      let mut units = [0u16; 2];
      pending_utf16.extend_from_slice(c.encode_utf16(&mut units));
    }
  }
  flush(&mut output, &mut pending_utf16, &engine);
  output
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_examples_from_rfc() {
    assert_eq!("", decode(b"").unwrap());
    assert_eq!("&", decode(b"&-").unwrap());
    assert_eq!(
      "~peter/mail/台北/日本語",
      decode(b"~peter/mail/&U,BTFw-/&ZeVnLIqe-").unwrap()
    );
    assert_eq!(None, decode(b"&Jjo!"));
    assert_eq!("☺!", decode(b"&Jjo-!").unwrap());
  }

  #[test]
  fn round_trip() {
    for sample in ["INBOX", "Sent Items", "台北/日本語", "&weird&"] {
      let encoded = encode(sample);
      assert_eq!(decode(encoded.as_bytes()).unwrap(), sample);
    }
  }
}
