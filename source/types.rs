//! The data model shared by the response parser, command builder and session engine.
//!
//! A `Message`/`BodyStructure`/`Envelope` is always produced by copy from parsed wire data; callers
//! get independent ownership, per the engine's ownership model.

use std::collections;

/// Inclusive sequence-number or UID range. `2:4` and `4:2` are equivalent, both normalized here to
/// the ascending form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range(pub u32, pub u32);

impl Range {
  pub fn single(n: u32) -> Self {
    Range(n, n)
  }

  pub fn contains(&self, n: u32) -> bool {
    self.0 <= n && n <= self.1
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
  None,
  Implicit,
  StartTls,
}

#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
  pub reject_unauthorized: bool,
  pub ca: Option<Vec<u8>>,
  pub cert: Option<Vec<u8>>,
  pub key: Option<Vec<u8>>,
  pub servername: Option<String>,
}

impl Default for TlsMode {
  fn default() -> Self {
    TlsMode::Implicit
  }
}

#[derive(Debug, Clone)]
pub enum Credential {
  Password { user: String, password: String },
  XOAuth2 { user: String, access_token: String },
}

#[derive(Debug, Clone, Default)]
pub struct Extensions {
  pub idle: bool,
  pub condstore: bool,
  pub qresync: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub host: String,
  pub port: u16,
  pub tls: TlsMode,
  pub tls_options: TlsOptions,
  pub credential: Credential,
  pub connect_timeout: std::time::Duration,
  pub auth_timeout: std::time::Duration,
  pub extensions: Extensions,
  /// RFC 3501 section 6.2.1: sending any credential before TLS is active is a fatal configuration
  /// error unless this debug-only escape hatch is set (open question 3 in DESIGN.md).
  pub allow_insecure_auth: bool,
}

impl Config {
  pub fn default_port(tls: TlsMode) -> u16 {
    match tls {
      TlsMode::Implicit => 993,
      TlsMode::None | TlsMode::StartTls => 143,
    }
  }
}

/// `{name, mailbox, host}` per RFC 3501 section 7.4.2's `address` production. `route` (obsolete
/// source routing) is parsed and discarded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
  pub name: Option<String>,
  pub mailbox: Option<String>,
  pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
  pub date: Option<String>,
  pub subject: Option<String>,
  pub from: Vec<Address>,
  pub sender: Vec<Address>,
  pub reply_to: Vec<Address>,
  pub to: Vec<Address>,
  pub cc: Vec<Address>,
  pub bcc: Vec<Address>,
  pub in_reply_to: Option<String>,
  pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disposition {
  pub kind: String,
  pub params: collections::BTreeMap<String, String>,
}

/// A leaf (non-multipart) body part. `type=text` parts carry `lines`; `message/rfc822` parts carry
/// a nested envelope/bodystructure/lines triple in `embedded_message`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Basic {
  pub media_type: String,
  pub media_subtype: String,
  pub params: collections::BTreeMap<String, String>,
  pub id: Option<String>,
  pub description: Option<String>,
  pub encoding: String,
  pub size: u32,
  pub lines: Option<u32>,
  pub md5: Option<String>,
  pub disposition: Option<Disposition>,
  pub language: Vec<String>,
  pub location: Option<String>,
  pub embedded_message: Option<Box<EmbeddedMessage>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedMessage {
  pub envelope: Envelope,
  pub body: BodyStructure,
  pub lines: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Multipart {
  pub media_subtype: String,
  pub parts: Vec<BodyStructure>,
  pub params: collections::BTreeMap<String, String>,
  pub disposition: Option<Disposition>,
  pub language: Vec<String>,
  pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyStructure {
  Basic(Basic),
  Multipart(Multipart),
}

impl BodyStructure {
  pub fn media_type(&self) -> (&str, &str) {
    match self {
      BodyStructure::Basic(b) => (&b.media_type, &b.media_subtype),
      BodyStructure::Multipart(m) => ("multipart", &m.media_subtype),
    }
  }
}

/// A `BODY[<section>]`/`BODY[<section>]<partial>` fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
  pub spec: String,
  pub partial_offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
  pub section: Section,
  pub size: u32,
  pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
  pub seqno: u32,
  pub uid: Option<u32>,
  pub flags: Vec<String>,
  pub size: Option<u32>,
  pub internal_date: Option<String>,
  pub envelope: Option<Envelope>,
  pub bodystructure: Option<BodyStructure>,
  pub parts: Vec<Part>,
  pub modseq: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct MessageCounts {
  pub total: u32,
  pub recent: u32,
  pub unseen: u32,
}

/// Server state collected from SELECT/EXAMINE's untagged responses, see [MODULE 4.3].
#[derive(Debug, Clone, Default)]
pub struct MailboxSnapshot {
  pub name: String,
  pub read_only: bool,
  pub uidvalidity: u32,
  pub uidnext: u32,
  pub flags: Vec<String>,
  pub perm_flags: Vec<String>,
  pub messages: MessageCounts,
  pub highest_modseq: Option<u64>,
}

/// One node of the server-advertised mailbox hierarchy. Names are plain owned strings (never a
/// reflective/dynamic map) so a server can't smuggle a name that collides with a host-language
/// identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxNode {
  pub attribs: Vec<String>,
  pub delimiter: Option<char>,
  pub children: collections::BTreeMap<String, MailboxNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxTree {
  pub root: MailboxNode,
}

impl MailboxTree {
  /// Inserts `path` (split on `delimiter`, defaulting to `/`) into the tree, attaching `attribs`
  /// to the leaf node.
  pub fn insert(&mut self, path: &str, delimiter: Option<char>, attribs: Vec<String>) {
    let sep = delimiter.unwrap_or('/');
    let mut node = &mut self.root;
    let components: Vec<&str> = path.split(sep).filter(|c| !c.is_empty()).collect();
    for (i, component) in components.iter().enumerate() {
      node = node.children.entry(component.to_string()).or_default();
      if i + 1 == components.len() {
        node.attribs = attribs.clone();
        node.delimiter = delimiter;
      }
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct StatusAttrs {
  pub messages: Option<u32>,
  pub recent: Option<u32>,
  pub uidnext: Option<u32>,
  pub uidvalidity: Option<u32>,
  pub unseen: Option<u32>,
  pub highest_modseq: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Disconnected,
  Connecting,
  NotAuthenticated,
  Authenticated,
  Selected,
  Idling,
  LoggingOut,
  Closed,
}

impl std::fmt::Display for SessionState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{self:?}")
  }
}

/// RFC 4315 UIDPLUS response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendUid {
  pub uidvalidity: u32,
  pub uid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyUid {
  pub uidvalidity: u32,
  pub from: Vec<Range>,
  pub to: Vec<Range>,
}
