use base64::Engine as _;

fn engine() -> base64::engine::GeneralPurpose {
  base64::engine::GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    base64::engine::general_purpose::PAD,
  )
}

pub fn encode(bytes: &[u8]) -> String {
  engine().encode(bytes)
}

/// Tolerates any whitespace interspersed in `input` (MIME folds base64 every 76 characters with a
/// CRLF; some servers also emit bare LF).
pub fn decode(input: &[u8]) -> Option<Vec<u8>> {
  let filtered: Vec<u8> = input
    .iter()
    .copied()
    .filter(|b| !b.is_ascii_whitespace())
    .collect();
  engine().decode(filtered).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip() {
    for sample in [
      &b""[..],
      b"Hello, IMAP",
      b"\x00\x01\x02\xff",
      "café".as_bytes(),
    ] {
      assert_eq!(decode(encode(sample).as_bytes()).unwrap(), sample);
    }
  }

  #[test]
  fn encode_decode_round_trip_ascii_message() {
    assert_eq!(encode(b"Hello, IMAP"), "SGVsbG8sIElNQVA=");
    assert_eq!(decode(b"SGVsbG8sIElNQVA=").unwrap(), b"Hello, IMAP");
  }

  #[test]
  fn ignores_folded_crlf() {
    let encoded = encode(&vec![b'A'; 200]);
    let mut folded = String::new();
    for (i, c) in encoded.chars().enumerate() {
      if i > 0 && i % 76 == 0 {
        folded.push_str("\r\n");
      }
      folded.push(c);
    }
    assert_eq!(decode(folded.as_bytes()).unwrap(), vec![b'A'; 200]);
  }
}
