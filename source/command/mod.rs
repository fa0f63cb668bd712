//! Builds the wire bytes for client commands.
//!
//! Mirrors the way command bytes were assembled: a flat sequence of byte slices concatenated in
//! order, with non-ASCII or otherwise risky values (mailbox names, search strings) sent as
//! literals instead of quoted strings, so no quoting/escaping bugs on the wire. When the server
//! has advertised `LITERAL+` (RFC 7888), a literal is sent eagerly as `{N+}\r\n<bytes>`; otherwise
//! it falls back to a synchronizing literal (`{N}\r\n`), which must pause for the server's `+`
//! continuation before the payload bytes can follow. A command is always `<tag> <command>\r\n`,
//! built up with a small `Builder` and handed back as a [`Wire`]: a sequence of byte chunks to
//! send, interleaved with continuation waits.

use crate::codec::utf7;
use crate::types::Range;
use chrono::Datelike;

/// One piece of a command's wire representation. A synchronizing literal splits a command into
/// multiple `Send` chunks separated by `AwaitContinuation` markers; a command with no
/// synchronizing literal is always a single `Send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Send(Vec<u8>),
  AwaitContinuation,
}

pub type Wire = Vec<Segment>;

pub struct Builder {
  buf: Vec<u8>,
  segments: Vec<Segment>,
  literal_plus: bool,
}

impl Builder {
  /// Assumes `LITERAL+` is available (the common case); call [`Self::literal_plus`] with `false`
  /// before adding any content if the server hasn't advertised it.
  pub fn new(tag: &str) -> Self {
    let mut buf = Vec::new();
    buf.extend_from_slice(tag.as_bytes());
    Self { buf, segments: Vec::new(), literal_plus: true }
  }

  pub fn literal_plus(mut self, value: bool) -> Self {
    self.literal_plus = value;
    self
  }

  /// Every token (atom, string, list, nested group) is preceded by exactly one space, per IMAP's
  /// single-SP-as-separator rule.
  fn sep(&mut self) {
    match self.buf.last() {
      None | Some(b' ') | Some(b'(') => {}
      Some(_) => self.buf.push(b' '),
    }
  }

  pub fn atom(&mut self, s: &str) -> &mut Self {
    self.sep();
    self.buf.extend_from_slice(s.as_bytes());
    self
  }

  /// Appends `s` verbatim with no separator — for building compound tokens (nested lists,
  /// bracketed sections) a call at a time.
  pub fn raw(&mut self, s: &str) -> &mut Self {
    self.buf.extend_from_slice(s.as_bytes());
    self
  }

  /// Sends `s` as a quoted string if it's plain ASCII without specials, else as a non-synchronizing
  /// literal (RFC 7888) so arbitrary bytes never need escaping.
  pub fn string(&mut self, s: &str) -> &mut Self {
    self.sep();
    if s.bytes().all(|b| matches!(b, 0x20..=0x7e) && !s.contains(['"', '\\'])) {
      self.buf.push(b'"');
      self.buf.extend_from_slice(s.as_bytes());
      self.buf.push(b'"');
    } else {
      self.literal(s.as_bytes());
    }
    self
  }

  pub fn literal(&mut self, bytes: &[u8]) -> &mut Self {
    if self.literal_plus {
      self.buf.extend_from_slice(format!("{{{}+}}\r\n", bytes.len()).as_bytes());
      self.buf.extend_from_slice(bytes);
    } else {
      self.buf.extend_from_slice(format!("{{{}}}\r\n", bytes.len()).as_bytes());
      self.segments.push(Segment::Send(std::mem::take(&mut self.buf)));
      self.segments.push(Segment::AwaitContinuation);
      self.buf.extend_from_slice(bytes);
    }
    self
  }

  /// Mailbox names travel the wire in modified UTF-7; ASCII-only names are sent as plain quoted
  /// strings, anything else goes through [`utf7::encode`] first.
  pub fn mailbox(&mut self, name: &str) -> &mut Self {
    if name.eq_ignore_ascii_case("inbox") {
      self.atom("INBOX");
      self
    } else if name.is_ascii() {
      self.string(name)
    } else {
      let encoded = utf7::encode(name);
      self.string(&encoded)
    }
  }

  pub fn list(&mut self, items: impl IntoIterator<Item = String>) -> &mut Self {
    self.sep();
    self.buf.push(b'(');
    let mut first = true;
    for item in items {
      if !first {
        self.buf.push(b' ');
      }
      self.buf.extend_from_slice(item.as_bytes());
      first = false;
    }
    self.buf.push(b')');
    self
  }

  pub fn sequence_set(&mut self, ranges: &[Range]) -> &mut Self {
    self.sep();
    let rendered: Vec<String> = ranges
      .iter()
      .map(|r| {
        if r.0 == r.1 {
          r.0.to_string()
        } else if r.1 == u32::MAX {
          format!("{}:*", r.0)
        } else {
          format!("{}:{}", r.0, r.1)
        }
      })
      .collect();
    self.buf.extend_from_slice(rendered.join(",").as_bytes());
    self
  }

  pub fn finish(mut self) -> Wire {
    self.buf.extend_from_slice(b"\r\n");
    self.segments.push(Segment::Send(self.buf));
    self.segments
  }
}

pub fn capability(tag: &str) -> Wire {
  Builder::new(tag).atom("CAPABILITY").finish()
}

pub fn noop(tag: &str) -> Wire {
  Builder::new(tag).atom("NOOP").finish()
}

pub fn logout(tag: &str) -> Wire {
  Builder::new(tag).atom("LOGOUT").finish()
}

pub fn starttls(tag: &str) -> Wire {
  Builder::new(tag).atom("STARTTLS").finish()
}

pub fn login(tag: &str, user: &str, password: &str, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("LOGIN");
  builder.string(user);
  builder.string(password);
  builder.finish()
}

/// AUTHENTICATE with the initial response (SASL-IR, RFC 4959) inlined so there's no
/// server-continuation round trip for the mechanisms this client speaks.
pub fn authenticate_plain(tag: &str, user: &str, password: &str) -> Wire {
  let mut builder = Builder::new(tag);
  builder.atom("AUTHENTICATE").atom("PLAIN");
  let initial = crate::codec::base64::encode(format!("\0{user}\0{password}").as_bytes());
  builder.atom(&initial);
  builder.finish()
}

pub fn authenticate_xoauth2(tag: &str, user: &str, access_token: &str) -> Wire {
  let mut builder = Builder::new(tag);
  builder.atom("AUTHENTICATE").atom("XOAUTH2");
  let raw = format!("user={user}\x01auth=Bearer {access_token}\x01\x01");
  let initial = crate::codec::base64::encode(raw.as_bytes());
  builder.atom(&initial);
  builder.finish()
}

pub fn enable(tag: &str, capabilities: &[&str]) -> Wire {
  let mut builder = Builder::new(tag);
  builder.atom("ENABLE");
  for capability in capabilities {
    builder.atom(capability);
  }
  builder.finish()
}

pub fn id(tag: &str, fields: &[(&str, &str)], literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("ID");
  if fields.is_empty() {
    builder.atom("NIL");
  } else {
    builder.sep();
    builder.raw("(");
    for (i, (k, v)) in fields.iter().enumerate() {
      if i > 0 {
        builder.raw(" ");
      }
      builder.string(k);
      builder.raw(" ");
      builder.string(v);
    }
    builder.raw(")");
  }
  builder.finish()
}

pub struct SelectOptions {
  pub qresync: Option<(u32, u64, Vec<Range>)>,
  pub condstore: bool,
}

fn select_or_examine(tag: &str, verb: &str, mailbox: &str, options: &SelectOptions, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom(verb);
  builder.mailbox(mailbox);
  if let Some((uidvalidity, highestmodseq, known_uids)) = &options.qresync {
    builder.sep();
    builder.raw("(QRESYNC (");
    builder.raw(&uidvalidity.to_string());
    builder.raw(" ");
    builder.raw(&highestmodseq.to_string());
    if !known_uids.is_empty() {
      builder.raw(" ");
      let rendered: Vec<String> = known_uids
        .iter()
        .map(|r| if r.0 == r.1 { r.0.to_string() } else { format!("{}:{}", r.0, r.1) })
        .collect();
      builder.raw(&rendered.join(","));
    }
    builder.raw("))");
  } else if options.condstore {
    builder.sep();
    builder.raw("(CONDSTORE)");
  }
  builder.finish()
}

pub fn select(tag: &str, mailbox: &str, options: &SelectOptions, literal_plus: bool) -> Wire {
  select_or_examine(tag, "SELECT", mailbox, options, literal_plus)
}

pub fn examine(tag: &str, mailbox: &str, options: &SelectOptions, literal_plus: bool) -> Wire {
  select_or_examine(tag, "EXAMINE", mailbox, options, literal_plus)
}

pub fn close(tag: &str) -> Wire {
  Builder::new(tag).atom("CLOSE").finish()
}

pub fn unselect(tag: &str) -> Wire {
  Builder::new(tag).atom("UNSELECT").finish()
}

pub fn expunge(tag: &str) -> Wire {
  Builder::new(tag).atom("EXPUNGE").finish()
}

pub fn uid_expunge(tag: &str, ranges: &[Range]) -> Wire {
  let mut builder = Builder::new(tag);
  builder.atom("UID").atom("EXPUNGE").sequence_set(ranges);
  builder.finish()
}

pub fn list(tag: &str, reference: &str, pattern: &str, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("LIST");
  builder.mailbox(reference);
  builder.mailbox(pattern);
  builder.finish()
}

pub fn lsub(tag: &str, reference: &str, pattern: &str, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("LSUB");
  builder.mailbox(reference);
  builder.mailbox(pattern);
  builder.finish()
}

pub const STATUS_ATTRS: &[&str] = &["MESSAGES", "RECENT", "UIDNEXT", "UIDVALIDITY", "UNSEEN", "HIGHESTMODSEQ"];

pub fn status(tag: &str, mailbox: &str, attrs: &[&str], literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("STATUS");
  builder.mailbox(mailbox);
  builder.list(attrs.iter().map(|s| s.to_string()));
  builder.finish()
}

#[derive(Debug, Clone)]
pub enum SearchCriteria {
  All,
  Answered,
  Deleted,
  Flagged,
  Seen,
  Unanswered,
  Undeleted,
  Unflagged,
  Unseen,
  From(String),
  To(String),
  Subject(String),
  Body(String),
  Text(String),
  Since(chrono::NaiveDate),
  Before(chrono::NaiveDate),
  On(chrono::NaiveDate),
  Header(String, String),
  Larger(u32),
  Smaller(u32),
  Uid(Vec<Range>),
  ModSeq(u64),
  Not(Box<SearchCriteria>),
  Or(Box<SearchCriteria>, Box<SearchCriteria>),
  And(Vec<SearchCriteria>),
}

fn format_date(date: &chrono::NaiveDate) -> String {
  const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
  ];
  format!("{}-{}-{}", date.day(), MONTHS[date.month0() as usize], date.year())
}

fn render_criteria(builder: &mut Builder, criteria: &SearchCriteria) {
  match criteria {
    SearchCriteria::All => {
      builder.atom("ALL");
    }
    SearchCriteria::Answered => {
      builder.atom("ANSWERED");
    }
    SearchCriteria::Deleted => {
      builder.atom("DELETED");
    }
    SearchCriteria::Flagged => {
      builder.atom("FLAGGED");
    }
    SearchCriteria::Seen => {
      builder.atom("SEEN");
    }
    SearchCriteria::Unanswered => {
      builder.atom("UNANSWERED");
    }
    SearchCriteria::Undeleted => {
      builder.atom("UNDELETED");
    }
    SearchCriteria::Unflagged => {
      builder.atom("UNFLAGGED");
    }
    SearchCriteria::Unseen => {
      builder.atom("UNSEEN");
    }
    SearchCriteria::From(v) => {
      builder.atom("FROM");
      builder.string(v);
    }
    SearchCriteria::To(v) => {
      builder.atom("TO");
      builder.string(v);
    }
    SearchCriteria::Subject(v) => {
      builder.atom("SUBJECT");
      builder.string(v);
    }
    SearchCriteria::Body(v) => {
      builder.atom("BODY");
      builder.string(v);
    }
    SearchCriteria::Text(v) => {
      builder.atom("TEXT");
      builder.string(v);
    }
    SearchCriteria::Since(d) => {
      builder.atom("SINCE");
      builder.string(&format_date(d));
    }
    SearchCriteria::Before(d) => {
      builder.atom("BEFORE");
      builder.string(&format_date(d));
    }
    SearchCriteria::On(d) => {
      builder.atom("ON");
      builder.string(&format_date(d));
    }
    SearchCriteria::Header(name, value) => {
      builder.atom("HEADER");
      builder.string(name);
      builder.string(value);
    }
    SearchCriteria::Larger(n) => {
      builder.atom("LARGER");
      builder.atom(&n.to_string());
    }
    SearchCriteria::Smaller(n) => {
      builder.atom("SMALLER");
      builder.atom(&n.to_string());
    }
    SearchCriteria::Uid(ranges) => {
      builder.atom("UID");
      builder.sequence_set(ranges);
    }
    SearchCriteria::ModSeq(modseq) => {
      builder.atom("MODSEQ");
      builder.atom(&modseq.to_string());
    }
    SearchCriteria::Not(inner) => {
      builder.atom("NOT");
      render_criteria(builder, inner);
    }
    SearchCriteria::Or(a, b) => {
      builder.atom("OR");
      render_criteria(builder, a);
      render_criteria(builder, b);
    }
    SearchCriteria::And(all) => {
      for (i, criterion) in all.iter().enumerate() {
        if i > 0 {
          builder.sep();
        }
        render_criteria(builder, criterion);
      }
    }
  }
}

fn needs_utf8_charset(criteria: &[SearchCriteria]) -> bool {
  fn text_is_ascii(c: &SearchCriteria) -> bool {
    match c {
      SearchCriteria::From(v)
      | SearchCriteria::To(v)
      | SearchCriteria::Subject(v)
      | SearchCriteria::Body(v)
      | SearchCriteria::Text(v) => v.is_ascii(),
      SearchCriteria::Header(_, v) => v.is_ascii(),
      SearchCriteria::Not(inner) => text_is_ascii(inner),
      SearchCriteria::Or(a, b) => text_is_ascii(a) && text_is_ascii(b),
      SearchCriteria::And(all) => all.iter().all(text_is_ascii),
      _ => true,
    }
  }
  !criteria.iter().all(text_is_ascii)
}

fn search_or_uid_search(tag: &str, uid: bool, criteria: &[SearchCriteria], modseq: bool, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  if uid {
    builder.atom("UID");
  }
  builder.atom("SEARCH");
  if modseq {
    builder.atom("RETURN").list(["MODSEQ".to_string()]);
  }
  if needs_utf8_charset(criteria) {
    builder.atom("CHARSET").atom("UTF-8");
  }
  if criteria.is_empty() {
    builder.atom("ALL");
  } else {
    for criterion in criteria {
      render_criteria(&mut builder, criterion);
    }
  }
  builder.finish()
}

pub fn search(tag: &str, criteria: &[SearchCriteria], literal_plus: bool) -> Wire {
  search_or_uid_search(tag, false, criteria, false, literal_plus)
}

pub fn uid_search(tag: &str, criteria: &[SearchCriteria], literal_plus: bool) -> Wire {
  search_or_uid_search(tag, true, criteria, false, literal_plus)
}

/// A CONDSTORE search that also wants the MODSEQ of the highest matching message, per RFC 7162
/// section 3.1.5 ("SEARCH RETURN (MODSEQ)").
pub fn search_modseq(tag: &str, criteria: &[SearchCriteria], literal_plus: bool) -> Wire {
  search_or_uid_search(tag, false, criteria, true, literal_plus)
}

#[derive(Debug, Clone)]
pub enum FetchItem {
  Flags,
  Uid,
  InternalDate,
  Rfc822Size,
  Envelope,
  BodyStructure,
  /// `peek = true` sends `BODY.PEEK[...]`, never setting `\Seen`.
  Body { section: String, peek: bool, partial: Option<(u32, u32)> },
}

fn render_fetch_item(builder: &mut Builder, item: &FetchItem) {
  match item {
    FetchItem::Flags => {
      builder.atom("FLAGS");
    }
    FetchItem::Uid => {
      builder.atom("UID");
    }
    FetchItem::InternalDate => {
      builder.atom("INTERNALDATE");
    }
    FetchItem::Rfc822Size => {
      builder.atom("RFC822.SIZE");
    }
    FetchItem::Envelope => {
      builder.atom("ENVELOPE");
    }
    FetchItem::BodyStructure => {
      builder.atom("BODYSTRUCTURE");
    }
    FetchItem::Body { section, peek, partial } => {
      builder.sep();
      builder.raw(if *peek { "BODY.PEEK[" } else { "BODY[" });
      builder.raw(section);
      builder.raw("]");
      if let Some((offset, len)) = partial {
        builder.raw(&format!("<{offset}.{len}>"));
      }
    }
  }
}

fn fetch_or_uid_fetch(
  tag: &str,
  uid: bool,
  ranges: &[Range],
  items: &[FetchItem],
  changedsince: Option<u64>,
) -> Wire {
  let mut builder = Builder::new(tag);
  if uid {
    builder.atom("UID");
  }
  builder.atom("FETCH");
  builder.sequence_set(ranges);
  builder.sep();
  builder.raw("(");
  for (i, item) in items.iter().enumerate() {
    if i > 0 {
      builder.raw(" ");
    }
    render_fetch_item(&mut builder, item);
  }
  builder.raw(")");
  if let Some(modseq) = changedsince {
    builder.sep();
    builder.raw(&format!("(CHANGEDSINCE {modseq})"));
  }
  builder.finish()
}

pub fn fetch(tag: &str, ranges: &[Range], items: &[FetchItem], changedsince: Option<u64>) -> Wire {
  fetch_or_uid_fetch(tag, false, ranges, items, changedsince)
}

pub fn uid_fetch(tag: &str, ranges: &[Range], items: &[FetchItem], changedsince: Option<u64>) -> Wire {
  fetch_or_uid_fetch(tag, true, ranges, items, changedsince)
}

#[derive(Debug, Clone, Copy)]
pub enum StoreOp {
  Set,
  Add,
  Remove,
}

fn store_or_uid_store(
  tag: &str,
  uid: bool,
  ranges: &[Range],
  op: StoreOp,
  flags: &[String],
  silent: bool,
  unchangedsince: Option<u64>,
) -> Wire {
  let mut builder = Builder::new(tag);
  if uid {
    builder.atom("UID");
  }
  builder.atom("STORE");
  builder.sequence_set(ranges);
  if let Some(modseq) = unchangedsince {
    builder.sep();
    builder.raw(&format!("(UNCHANGEDSINCE {modseq})"));
  }
  let verb = match op {
    StoreOp::Set => "FLAGS",
    StoreOp::Add => "+FLAGS",
    StoreOp::Remove => "-FLAGS",
  };
  builder.sep();
  builder.raw(verb);
  if silent {
    builder.raw(".SILENT");
  }
  builder.list(flags.iter().cloned());
  builder.finish()
}

pub fn store(
  tag: &str,
  ranges: &[Range],
  op: StoreOp,
  flags: &[String],
  silent: bool,
  unchangedsince: Option<u64>,
) -> Wire {
  store_or_uid_store(tag, false, ranges, op, flags, silent, unchangedsince)
}

pub fn uid_store(
  tag: &str,
  ranges: &[Range],
  op: StoreOp,
  flags: &[String],
  silent: bool,
  unchangedsince: Option<u64>,
) -> Wire {
  store_or_uid_store(tag, true, ranges, op, flags, silent, unchangedsince)
}

pub fn uid_copy(tag: &str, ranges: &[Range], mailbox: &str, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("UID").atom("COPY").sequence_set(ranges);
  builder.mailbox(mailbox);
  builder.finish()
}

pub fn uid_move(tag: &str, ranges: &[Range], mailbox: &str, literal_plus: bool) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("UID").atom("MOVE").sequence_set(ranges);
  builder.mailbox(mailbox);
  builder.finish()
}

pub fn append(
  tag: &str,
  mailbox: &str,
  flags: &[String],
  internal_date: Option<&str>,
  message: &[u8],
  literal_plus: bool,
) -> Wire {
  let mut builder = Builder::new(tag).literal_plus(literal_plus);
  builder.atom("APPEND");
  builder.mailbox(mailbox);
  if !flags.is_empty() {
    builder.list(flags.iter().cloned());
  }
  if let Some(date) = internal_date {
    builder.string(date);
  }
  builder.sep();
  builder.literal(message);
  builder.finish()
}

pub fn idle(tag: &str) -> Wire {
  Builder::new(tag).atom("IDLE").finish()
}

/// IDLE is terminated by a bare `DONE` line, untagged (no command tag, per RFC 2177 section 3).
pub fn done() -> Vec<u8> {
  b"DONE\r\n".to_vec()
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Flattens a `Wire` with no `AwaitContinuation` markers into its bytes, for asserting on
  /// commands that never hit a synchronizing literal.
  fn flatten(wire: Wire) -> Vec<u8> {
    wire
      .into_iter()
      .map(|segment| match segment {
        Segment::Send(bytes) => bytes,
        Segment::AwaitContinuation => panic!("unexpected continuation boundary in a supposedly single-segment wire"),
      })
      .fold(Vec::new(), |mut acc, chunk| {
        acc.extend_from_slice(&chunk);
        acc
      })
  }

  #[test]
  fn login_quotes_plain_credentials() {
    let cmd = flatten(login("A1", "user", "pass", true));
    assert_eq!(cmd, b"A1 LOGIN \"user\" \"pass\"\r\n");
  }

  #[test]
  fn select_plain() {
    let cmd = flatten(select(
      "A2",
      "INBOX",
      &SelectOptions { qresync: None, condstore: false },
      true,
    ));
    assert_eq!(cmd, b"A2 SELECT INBOX\r\n");
  }

  #[test]
  fn select_with_qresync() {
    let cmd = flatten(select(
      "A3",
      "INBOX",
      &SelectOptions {
        qresync: Some((67890007, 90060115, vec![Range(1, 3)])),
        condstore: false,
      },
      true,
    ));
    assert_eq!(cmd, b"A3 SELECT INBOX (QRESYNC (67890007 90060115 1:3))\r\n");
  }

  #[test]
  fn non_ascii_mailbox_name_goes_through_utf7_then_quoting() {
    let cmd = flatten(select("A4", "台北", &SelectOptions { qresync: None, condstore: false }, true));
    // Modified UTF-7 output is printable ASCII, so it travels as an ordinary quoted string unless
    // it happens to contain '"' or '\'.
    assert_eq!(cmd, format!("A4 SELECT \"{}\"\r\n", utf7::encode("台北")).into_bytes());
  }

  #[test]
  fn mailbox_name_with_quote_forces_a_non_synchronizing_literal_when_literal_plus_is_on() {
    let mut builder = Builder::new("A11");
    builder.mailbox("weird\"name");
    let cmd = flatten(builder.finish());
    assert_eq!(cmd, b"A11 {10+}\r\nweird\"name\r\n");
  }

  #[test]
  fn mailbox_name_with_quote_forces_a_synchronizing_literal_when_literal_plus_is_off() {
    let mut builder = Builder::new("A11").literal_plus(false);
    builder.mailbox("weird\"name");
    let wire = builder.finish();
    assert_eq!(
      wire,
      vec![
        Segment::Send(b"A11 {10}\r\n".to_vec()),
        Segment::AwaitContinuation,
        Segment::Send(b"weird\"name\r\n".to_vec()),
      ]
    );
  }

  #[test]
  fn search_non_ascii_forces_utf8_charset() {
    let cmd = flatten(search("A5", &[SearchCriteria::Subject("café".to_string())], true));
    let text = String::from_utf8(cmd).unwrap();
    assert!(text.starts_with("A5 SEARCH CHARSET UTF-8 SUBJECT "));
  }

  #[test]
  fn search_ascii_skips_charset() {
    let cmd = flatten(search("A6", &[SearchCriteria::Unseen], true));
    assert_eq!(cmd, b"A6 SEARCH UNSEEN\r\n");
  }

  #[test]
  fn search_with_no_criteria_means_all() {
    let cmd = flatten(search("A9", &[], true));
    assert_eq!(cmd, b"A9 SEARCH ALL\r\n");
  }

  #[test]
  fn fetch_with_body_peek_and_changedsince() {
    let cmd = flatten(fetch(
      "A7",
      &[Range(1, 5)],
      &[FetchItem::Uid, FetchItem::Body { section: String::new(), peek: true, partial: None }],
      Some(12345),
    ));
    assert_eq!(cmd, b"A7 FETCH 1:5 (UID BODY.PEEK[]) (CHANGEDSINCE 12345)\r\n");
  }

  #[test]
  fn store_silent_add_flags() {
    let cmd = flatten(store("A8", &[Range(3, 3)], StoreOp::Add, &["\\Seen".to_string()], true, Some(99)));
    assert_eq!(cmd, b"A8 STORE 3 (UNCHANGEDSINCE 99) +FLAGS.SILENT (\\Seen)\r\n");
  }

  #[test]
  fn append_with_literal_plus() {
    let cmd = flatten(append("A9", "INBOX", &["\\Seen".to_string()], None, b"hi", true));
    assert_eq!(cmd, b"A9 APPEND INBOX (\\Seen) {2+}\r\nhi\r\n");
  }

  #[test]
  fn append_without_literal_plus_waits_for_continuation_before_the_message_bytes() {
    let wire = append("A9", "INBOX", &["\\Seen".to_string()], None, b"hi", false);
    assert_eq!(
      wire,
      vec![
        Segment::Send(b"A9 APPEND INBOX (\\Seen) {2}\r\n".to_vec()),
        Segment::AwaitContinuation,
        Segment::Send(b"hi\r\n".to_vec()),
      ]
    );
  }

  #[test]
  fn idle_and_done() {
    assert_eq!(flatten(idle("A10")), b"A10 IDLE\r\n");
    assert_eq!(done(), b"DONE\r\n");
  }
}
