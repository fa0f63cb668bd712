//! The stateful engine driving one IMAP connection: tag allocation, command/response pairing,
//! mailbox/capability bookkeeping and the IDLE lifecycle.
//!
//! Like the wire layer it sits on, this is entirely blocking/synchronous — one command is ever
//! in flight at a time, matching how every command here was actually driven historically (write,
//! then block reading until the tagged completion). Pipelining multiple tags concurrently isn't
//! implemented; see DESIGN.md for why that line was drawn here.

use crate::codec::utf7;
use crate::command::{self, SelectOptions};
use crate::error::{Error, Result};
use crate::framer::Framer;
use crate::parser::{self, FetchAttr, Response, ResponseCode, Status, Untagged};
use crate::types::{
  AppendUid, Config, Credential, CopyUid, MailboxSnapshot, MailboxTree, Message, Range,
  SessionState, StatusAttrs, TlsMode,
};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Instant;
use zeroize::Zeroize as _;

/// An unsolicited mailbox update, surfaced either as the direct result of a command or, while
/// idling, drained through [`Session::poll_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
  Exists(u32),
  Recent(u32),
  Expunge(u32),
  Flags(Vec<String>),
  Fetch { seqno: u32, attrs: Vec<FetchAttr> },
  Vanished { earlier: bool, uids: Vec<Range> },
  Bye(String),
  Alert(String),
}

const MAX_CONSECUTIVE_PARSE_ERRORS: u32 = 3;
/// RFC 2177 section 3's recommended maximum: clients SHOULD terminate IDLE at least this often to
/// avoid being timed out by an unaware intermediary.
const IDLE_MAX: std::time::Duration = std::time::Duration::from_secs(29 * 60);

pub struct Session<RW> {
  transport: RW,
  framer: Framer,
  state: SessionState,
  next_tag: u32,
  capabilities: Vec<String>,
  mailbox: Option<MailboxSnapshot>,
  events: VecDeque<Event>,
  parse_error_streak: u32,
  config: Config,
  idle_tag: Option<String>,
  idle_started: Option<Instant>,
}

fn require_capability(capabilities: &[String], name: &str) -> Result<()> {
  if capabilities.iter().any(|c| c.eq_ignore_ascii_case(name)) {
    Ok(())
  } else {
    Err(Error::protocol(
      "CAPABILITY",
      format!("server doesn't advertise required capability {name}"),
    ))
  }
}

impl<RW> Session<RW>
where
  RW: Read + Write,
{
  /// Reads the server greeting (`OK`/`PREAUTH`/`BYE`) and, for `OK`/`PREAUTH`, the inline
  /// capability list if present (fetching it explicitly otherwise). `LITERAL+` isn't required:
  /// commands that need a literal fall back to the synchronizing form (`{N}` + wait for the
  /// server's `+`) whenever it's absent.
  pub fn connect(transport: RW, config: Config) -> Result<Self> {
    let mut session = Self {
      transport,
      framer: Framer::new(),
      state: SessionState::Connecting,
      next_tag: 0,
      capabilities: Vec::new(),
      mailbox: None,
      events: VecDeque::new(),
      parse_error_streak: 0,
      config,
      idle_tag: None,
      idle_started: None,
    };
    let response = session.read_response()?;
    match response {
      Response::Untagged(Untagged::Ok { code, .. }) => {
        session.state = SessionState::NotAuthenticated;
        if let Some(ResponseCode::Capability(caps)) = code {
          session.capabilities = caps;
        } else {
          session.refresh_capabilities()?;
        }
      }
      Response::Untagged(Untagged::Bye { text, .. }) => {
        session.state = SessionState::Closed;
        return Err(Error::protocol("CONNECT", format!("server refused connection: {text}")));
      }
      other => return Err(Error::protocol("CONNECT", format!("unexpected greeting {other:?}"))),
    }
    Ok(session)
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn capabilities(&self) -> &[String] {
    &self.capabilities
  }

  pub fn mailbox(&self) -> Option<&MailboxSnapshot> {
    self.mailbox.as_ref()
  }

  /// Drains one queued unsolicited update, if any. Never blocks or touches the network; new
  /// events only arrive as a side effect of [`Self::command`] or, while idling, of
  /// [`Self::idle_wait`].
  pub fn poll_event(&mut self) -> Option<Event> {
    self.events.pop_front()
  }

  fn require_state(&self, required: SessionState) -> Result<()> {
    if self.state == required {
      Ok(())
    } else {
      Err(Error::InvalidState {
        required: required.to_string(),
        actual: self.state.to_string(),
      })
    }
  }

  fn next_tag(&mut self) -> String {
    self.next_tag += 1;
    format!("A{:04}", self.next_tag)
  }

  /// Whether commands built for this connection may use non-synchronizing (`{N+}`) literals.
  /// `false` means any literal must fall back to the synchronizing form and wait for the server's
  /// `+` continuation.
  fn literal_plus(&self) -> bool {
    self.capabilities.iter().any(|c| c.eq_ignore_ascii_case("LITERAL+"))
  }

  fn fill(&mut self) -> Result<()> {
    let mut buf = [0u8; 8192];
    match self.transport.read(&mut buf) {
      Ok(0) => {
        self.framer.note_eof()?;
        self.state = SessionState::Closed;
        Err(Error::Network {
          host: self.config.host.clone(),
          port: self.config.port,
          source: anyhow::anyhow!("connection closed by peer"),
        })
      }
      Ok(n) => {
        self.framer.feed(&buf[..n]);
        Ok(())
      }
      Err(source) => Err(Error::Network { host: self.config.host.clone(), port: self.config.port, source: source.into() }),
    }
  }

  fn read_response(&mut self) -> Result<Response> {
    self.read_response_before(None)
  }

  /// Like [`Self::read_response`], but fails with `Error::Timeout` once `deadline` passes. Only
  /// catches timeouts between reads (when the server trickles data); a single `read()` call that
  /// blocks forever on a silent peer isn't interrupted, since the transport is bound to blocking
  /// `Read + Write` with no portable cross-platform deadline. Used for `authTimeout`, which in
  /// practice only needs to bound a slow-but-responsive auth exchange.
  fn read_response_before(&mut self, deadline: Option<Instant>) -> Result<Response> {
    loop {
      if let Some(line) = self.framer.next_line() {
        return match parser::parse(&line) {
          Ok(response) => {
            self.parse_error_streak = 0;
            Ok(response)
          }
          Err(error) => {
            self.parse_error_streak += 1;
            if self.parse_error_streak >= MAX_CONSECUTIVE_PARSE_ERRORS {
              self.state = SessionState::Closed;
            }
            Err(error)
          }
        };
      }
      if let Some(deadline) = deadline {
        if Instant::now() >= deadline {
          return Err(Error::Timeout { operation: "AUTHENTICATE".to_string(), duration: self.config.auth_timeout });
        }
      }
      self.fill()?;
    }
  }

  /// Applies a server-sent untagged response to session-local bookkeeping (capabilities, mailbox
  /// counts, flags) and, for the updates a caller might care about outside the command that
  /// triggered them, queues an [`Event`].
  fn apply_untagged(&mut self, untagged: &Untagged) {
    match untagged {
      Untagged::Capability(caps) => self.capabilities = caps.clone(),
      Untagged::Exists(n) => {
        if let Some(mailbox) = &mut self.mailbox {
          mailbox.messages.total = *n;
        }
        self.events.push_back(Event::Exists(*n));
      }
      Untagged::Recent(n) => {
        if let Some(mailbox) = &mut self.mailbox {
          mailbox.messages.recent = *n;
        }
        self.events.push_back(Event::Recent(*n));
      }
      Untagged::Expunge(n) => {
        if let Some(mailbox) = &mut self.mailbox {
          mailbox.messages.total = mailbox.messages.total.saturating_sub(1);
        }
        self.events.push_back(Event::Expunge(*n));
      }
      Untagged::Flags(flags) => {
        if let Some(mailbox) = &mut self.mailbox {
          mailbox.flags = flags.clone();
        }
        self.events.push_back(Event::Flags(flags.clone()));
      }
      Untagged::Fetch { seqno, attrs } => {
        self.events.push_back(Event::Fetch { seqno: *seqno, attrs: attrs.clone() });
      }
      Untagged::Vanished { earlier, uids } => {
        self.events.push_back(Event::Vanished { earlier: *earlier, uids: uids.clone() });
      }
      Untagged::Bye { text, .. } => {
        self.state = SessionState::Closed;
        self.events.push_back(Event::Bye(text.clone()));
      }
      Untagged::Ok { code: Some(ResponseCode::Alert), text } => {
        self.events.push_back(Event::Alert(text.clone()));
      }
      _ => {}
    }
  }

  /// Sends `wire` tagged `tag`, collects every untagged response until the matching tagged
  /// completion, applies their side effects and returns `(status, code, text, untagged)`.
  fn command(&mut self, tag: &str, wire: command::Wire) -> Result<(Status, Option<ResponseCode>, String, Vec<Untagged>)> {
    self.command_before(tag, wire, None)
  }

  fn command_before(
    &mut self,
    tag: &str,
    wire: command::Wire,
    deadline: Option<Instant>,
  ) -> Result<(Status, Option<ResponseCode>, String, Vec<Untagged>)> {
    self.send_wire(tag, wire, deadline)?;
    let mut untagged = Vec::new();
    loop {
      match self.read_response_before(deadline)? {
        Response::Tagged { tag: got, status, code, text } => {
          if got != tag {
            return Err(Error::protocol(tag, format!("out-of-order tag {got}")));
          }
          // A NO leaves the session state untouched — the command failed, nothing else did. A BAD
          // is a protocol-level complaint from the server (malformed command, unknown tag) and the
          // session is no longer trustworthy afterwards.
          if status == Status::Bad {
            self.state = SessionState::Closed;
          }
          if status != Status::Ok {
            return Err(Error::protocol(tag.to_string(), text));
          }
          return Ok((status, code, text, untagged));
        }
        Response::Untagged(u) => {
          self.apply_untagged(&u);
          untagged.push(u);
        }
        Response::Continuation(_) => {
          return Err(Error::protocol(tag, "unexpected continuation after the command was fully sent"));
        }
      }
    }
  }

  /// Writes every chunk of `wire` in order, pausing at each `AwaitContinuation` boundary (emitted
  /// around a synchronizing literal) until the server sends its `+`. If the server instead rejects
  /// the command outright with a tagged completion before the literal is even sent (e.g. `NO`
  /// mailbox doesn't exist), that's surfaced as the command's result.
  fn send_wire(&mut self, tag: &str, wire: command::Wire, deadline: Option<Instant>) -> Result<()> {
    for segment in wire {
      match segment {
        command::Segment::Send(bytes) => {
          self.transport.write_all(&bytes).map_err(|source| Error::Network {
            host: self.config.host.clone(),
            port: self.config.port,
            source: source.into(),
          })?;
        }
        command::Segment::AwaitContinuation => match self.read_response_before(deadline)? {
          Response::Continuation(_) => {}
          Response::Tagged { tag: got, status, text, .. } => {
            if got != tag {
              return Err(Error::protocol(tag, format!("out-of-order tag {got}")));
            }
            if status == Status::Bad {
              self.state = SessionState::Closed;
            }
            return Err(Error::protocol(tag.to_string(), text));
          }
          other => {
            return Err(Error::protocol(tag, format!("expected a continuation before sending the literal, got {other:?}")));
          }
        },
      }
    }
    Ok(())
  }

  fn assert_tls_before_credentials(&self) -> Result<()> {
    if matches!(self.config.tls, TlsMode::None) && !self.config.allow_insecure_auth {
      Err(Error::InsecureAuth)
    } else {
      Ok(())
    }
  }

  /// Picks XOAUTH2 over PLAIN/LOGIN whenever the configured credential is an access token — a
  /// server-side session is more expensive to leak than a short-lived bearer token, but more to
  /// the point, an XOAUTH2 credential was explicitly provided because password auth isn't
  /// available for this account.
  pub fn authenticate(&mut self) -> Result<()> {
    self.require_state(SessionState::NotAuthenticated)?;
    self.assert_tls_before_credentials()?;
    let tag = self.next_tag();
    let mut credential = self.config.credential.clone();
    let bytes = match &credential {
      Credential::XOAuth2 { user, access_token } => {
        require_capability(&self.capabilities, "AUTH=XOAUTH2")?;
        command::authenticate_xoauth2(&tag, user, access_token)
      }
      Credential::Password { user, password } => {
        if self.capabilities.iter().any(|c| c.eq_ignore_ascii_case("AUTH=PLAIN")) {
          command::authenticate_plain(&tag, user, password)
        } else {
          command::login(&tag, user, password, self.literal_plus())
        }
      }
    };
    let deadline = Instant::now() + self.config.auth_timeout;
    let result = self.command_before(&tag, bytes, Some(deadline));
    match &mut credential {
      Credential::Password { password, .. } => password.zeroize(),
      Credential::XOAuth2 { access_token, .. } => access_token.zeroize(),
    }
    let (_, code, _, _) = result?;
    self.state = SessionState::Authenticated;
    if let Some(ResponseCode::Capability(caps)) = code {
      self.capabilities = caps;
    } else {
      self.refresh_capabilities()?;
    }
    Ok(())
  }

  pub fn refresh_capabilities(&mut self) -> Result<()> {
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::capability(&tag))?;
    for u in untagged {
      if let Untagged::Capability(caps) = u {
        self.capabilities = caps;
      }
    }
    Ok(())
  }

  pub fn enable(&mut self, capabilities: &[&str]) -> Result<Vec<String>> {
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::enable(&tag, capabilities))?;
    for u in untagged {
      if let Untagged::Enabled(enabled) = u {
        return Ok(enabled);
      }
    }
    Ok(Vec::new())
  }

  /// Begins a STARTTLS upgrade: sends the command, awaits the tagged `OK`, and per RFC 3501
  /// section 6.2.1 discards the capability list the server advertised pre-TLS (it MUST NOT be
  /// trusted — an attacker could have injected it before negotiation). The caller is responsible
  /// for performing the actual TLS handshake over the same byte stream and calling
  /// [`Self::finish_starttls`] with the fresh capabilities.
  pub fn starttls(&mut self) -> Result<()> {
    self.require_state(SessionState::NotAuthenticated)?;
    let tag = self.next_tag();
    self.command(&tag, command::starttls(&tag))?;
    self.capabilities.clear();
    self.framer = Framer::new();
    Ok(())
  }

  pub fn finish_starttls(&mut self) -> Result<()> {
    self.refresh_capabilities()
  }

  /// Rewraps the transport after a STARTTLS handshake: `f` receives the raw stream [`Self::starttls`]
  /// was called on and returns the TLS-wrapped replacement. Session/tag/mailbox state carries over
  /// unchanged; the caller still owes a [`Self::finish_starttls`] call afterwards to re-fetch
  /// capabilities over the now-encrypted channel.
  pub fn upgrade<RW2>(self, f: impl FnOnce(RW) -> Result<RW2>) -> Result<Session<RW2>>
  where
    RW2: Read + Write,
  {
    Ok(Session {
      transport: f(self.transport)?,
      framer: self.framer,
      state: self.state,
      next_tag: self.next_tag,
      capabilities: self.capabilities,
      mailbox: self.mailbox,
      events: self.events,
      parse_error_streak: self.parse_error_streak,
      config: self.config,
      idle_tag: self.idle_tag,
      idle_started: self.idle_started,
    })
  }

  pub fn list(&mut self, reference: &str, pattern: &str) -> Result<MailboxTree> {
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::list(&tag, reference, pattern, self.literal_plus()))?;
    let mut tree = MailboxTree::default();
    for u in untagged {
      if let Untagged::List(listing) = u {
        let name = utf7::decode(listing.name.as_bytes()).unwrap_or(listing.name);
        tree.insert(&name, listing.delimiter, listing.attribs);
      }
    }
    Ok(tree)
  }

  pub fn lsub(&mut self, reference: &str, pattern: &str) -> Result<MailboxTree> {
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::lsub(&tag, reference, pattern, self.literal_plus()))?;
    let mut tree = MailboxTree::default();
    for u in untagged {
      if let Untagged::Lsub(listing) = u {
        let name = utf7::decode(listing.name.as_bytes()).unwrap_or(listing.name);
        tree.insert(&name, listing.delimiter, listing.attribs);
      }
    }
    Ok(tree)
  }

  pub fn status(&mut self, mailbox: &str, attrs: &[&str]) -> Result<StatusAttrs> {
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::status(&tag, mailbox, attrs, self.literal_plus()))?;
    for u in untagged {
      if let Untagged::Status { attrs, .. } = u {
        return Ok(attrs);
      }
    }
    Err(Error::protocol("STATUS", "server didn't return a STATUS response"))
  }

  fn select_or_examine(&mut self, mailbox: &str, read_only: bool, options: SelectOptions) -> Result<&MailboxSnapshot> {
    self.require_state(SessionState::Authenticated)?;
    let tag = self.next_tag();
    let literal_plus = self.literal_plus();
    let bytes = if read_only {
      command::examine(&tag, mailbox, &options, literal_plus)
    } else {
      command::select(&tag, mailbox, &options, literal_plus)
    };
    let (_, code, _, untagged) = self.command(&tag, bytes)?;
    let mut snapshot = MailboxSnapshot { name: mailbox.to_string(), read_only, ..Default::default() };
    for u in untagged {
      match u {
        Untagged::Flags(flags) => snapshot.flags = flags,
        Untagged::Exists(n) => snapshot.messages.total = n,
        Untagged::Recent(n) => snapshot.messages.recent = n,
        Untagged::Ok { code: Some(ResponseCode::PermanentFlags(flags)), .. } => snapshot.perm_flags = flags,
        Untagged::Ok { code: Some(ResponseCode::UidValidity(n)), .. } => snapshot.uidvalidity = n,
        Untagged::Ok { code: Some(ResponseCode::UidNext(n)), .. } => snapshot.uidnext = n,
        Untagged::Ok { code: Some(ResponseCode::Unseen(n)), .. } => snapshot.messages.unseen = n,
        Untagged::Ok { code: Some(ResponseCode::HighestModSeq(n)), .. } => snapshot.highest_modseq = Some(n),
        Untagged::Ok { code: Some(ResponseCode::ReadOnly), .. } => snapshot.read_only = true,
        Untagged::Ok { code: Some(ResponseCode::ReadWrite), .. } => snapshot.read_only = false,
        Untagged::Vanished { earlier, uids } => {
          self.events.push_back(Event::Vanished { earlier, uids });
        }
        Untagged::Fetch { seqno, attrs } => {
          self.events.push_back(Event::Fetch { seqno, attrs });
        }
        _ => {}
      }
    }
    if let Some(ResponseCode::ReadOnly) = code {
      snapshot.read_only = true;
    }
    self.mailbox = Some(snapshot);
    self.state = SessionState::Selected;
    Ok(self.mailbox.as_ref().unwrap())
  }

  pub fn select(&mut self, mailbox: &str) -> Result<&MailboxSnapshot> {
    self.select_or_examine(mailbox, false, SelectOptions { qresync: None, condstore: self.config.extensions.condstore })
  }

  pub fn examine(&mut self, mailbox: &str) -> Result<&MailboxSnapshot> {
    self.select_or_examine(mailbox, true, SelectOptions { qresync: None, condstore: self.config.extensions.condstore })
  }

  /// SELECT with QRESYNC (RFC 7162 section 3.2.5): resumes a mailbox from a previously observed
  /// `(uidvalidity, highestmodseq)` pair, optionally restricting the VANISHED set the server
  /// computes to `known_uids`.
  pub fn select_qresync(&mut self, mailbox: &str, uidvalidity: u32, highestmodseq: u64, known_uids: Vec<Range>) -> Result<&MailboxSnapshot> {
    require_capability(&self.capabilities, "QRESYNC")?;
    self.select_or_examine(
      mailbox,
      false,
      SelectOptions { qresync: Some((uidvalidity, highestmodseq, known_uids)), condstore: false },
    )
  }

  pub fn close(&mut self) -> Result<()> {
    self.require_state(SessionState::Selected)?;
    let tag = self.next_tag();
    self.command(&tag, command::close(&tag))?;
    self.mailbox = None;
    self.state = SessionState::Authenticated;
    Ok(())
  }

  pub fn unselect(&mut self) -> Result<()> {
    self.require_state(SessionState::Selected)?;
    require_capability(&self.capabilities, "UNSELECT")?;
    let tag = self.next_tag();
    self.command(&tag, command::unselect(&tag))?;
    self.mailbox = None;
    self.state = SessionState::Authenticated;
    Ok(())
  }

  pub fn expunge(&mut self) -> Result<Vec<u32>> {
    self.require_state(SessionState::Selected)?;
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::expunge(&tag))?;
    Ok(untagged.into_iter().filter_map(|u| match u { Untagged::Expunge(n) => Some(n), _ => None }).collect())
  }

  pub fn uid_expunge(&mut self, ranges: &[Range]) -> Result<Vec<u32>> {
    self.require_state(SessionState::Selected)?;
    require_capability(&self.capabilities, "UIDPLUS")?;
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::uid_expunge(&tag, ranges))?;
    Ok(untagged.into_iter().filter_map(|u| match u { Untagged::Expunge(n) => Some(n), _ => None }).collect())
  }

  pub fn search(&mut self, criteria: &[command::SearchCriteria]) -> Result<Vec<u32>> {
    self.require_state(SessionState::Selected)?;
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::search(&tag, criteria, self.literal_plus()))?;
    for u in untagged {
      if let Untagged::Search { ids, .. } = u {
        return Ok(ids);
      }
    }
    Ok(Vec::new())
  }

  pub fn uid_search(&mut self, criteria: &[command::SearchCriteria]) -> Result<Vec<u32>> {
    self.require_state(SessionState::Selected)?;
    let tag = self.next_tag();
    let (_, _, _, untagged) = self.command(&tag, command::uid_search(&tag, criteria, self.literal_plus()))?;
    for u in untagged {
      if let Untagged::Search { ids, .. } = u {
        return Ok(ids);
      }
    }
    Ok(Vec::new())
  }

  fn attrs_to_message(seqno: u32, attrs: Vec<FetchAttr>) -> Message {
    let mut message = Message { seqno, ..Default::default() };
    for attr in attrs {
      match attr {
        FetchAttr::Flags(f) => message.flags = f,
        FetchAttr::Uid(u) => message.uid = Some(u),
        FetchAttr::InternalDate(d) => message.internal_date = Some(d),
        FetchAttr::Rfc822Size(n) => message.size = Some(n),
        FetchAttr::Envelope(e) => message.envelope = Some(e),
        FetchAttr::BodyStructure(b) => message.bodystructure = Some(b),
        FetchAttr::Body(part) => message.parts.push(part),
        FetchAttr::ModSeq(m) => message.modseq = Some(m),
      }
    }
    message
  }

  fn fetch_or_uid(
    &mut self,
    uid: bool,
    ranges: &[Range],
    items: &[command::FetchItem],
    changedsince: Option<u64>,
  ) -> Result<Vec<Message>> {
    self.require_state(SessionState::Selected)?;
    if changedsince.is_some() {
      require_capability(&self.capabilities, "CONDSTORE")?;
    }
    let tag = self.next_tag();
    let bytes = if uid {
      command::uid_fetch(&tag, ranges, items, changedsince)
    } else {
      command::fetch(&tag, ranges, items, changedsince)
    };
    let (_, code, _, untagged) = self.command(&tag, bytes)?;
    if let Some(ResponseCode::Modified(_)) = code {
      // CONDSTORE conditional FETCH: some messages weren't returned because they didn't change.
      // That's not a failure, the caller just gets fewer messages than sequence numbers asked.
    }
    Ok(
      untagged
        .into_iter()
        .filter_map(|u| match u {
          Untagged::Fetch { seqno, attrs } => Some(Self::attrs_to_message(seqno, attrs)),
          _ => None,
        })
        .collect(),
    )
  }

  pub fn fetch(&mut self, ranges: &[Range], items: &[command::FetchItem], changedsince: Option<u64>) -> Result<Vec<Message>> {
    self.fetch_or_uid(false, ranges, items, changedsince)
  }

  pub fn uid_fetch(&mut self, ranges: &[Range], items: &[command::FetchItem], changedsince: Option<u64>) -> Result<Vec<Message>> {
    self.fetch_or_uid(true, ranges, items, changedsince)
  }

  fn store_or_uid(
    &mut self,
    uid: bool,
    ranges: &[Range],
    op: command::StoreOp,
    flags: &[String],
    silent: bool,
    unchangedsince: Option<u64>,
  ) -> Result<Vec<Message>> {
    self.require_state(SessionState::Selected)?;
    if unchangedsince.is_some() {
      require_capability(&self.capabilities, "CONDSTORE")?;
    }
    let tag = self.next_tag();
    let bytes = if uid {
      command::uid_store(&tag, ranges, op, flags, silent, unchangedsince)
    } else {
      command::store(&tag, ranges, op, flags, silent, unchangedsince)
    };
    let (_, code, text, untagged) = self.command(&tag, bytes)?;
    if let Some(ResponseCode::Modified(conflicted)) = code {
      return Err(Error::protocol("STORE", format!("conditional STORE failed on {conflicted:?}: {text}")));
    }
    Ok(
      untagged
        .into_iter()
        .filter_map(|u| match u {
          Untagged::Fetch { seqno, attrs } => Some(Self::attrs_to_message(seqno, attrs)),
          _ => None,
        })
        .collect(),
    )
  }

  pub fn store(&mut self, ranges: &[Range], op: command::StoreOp, flags: &[String], silent: bool, unchangedsince: Option<u64>) -> Result<Vec<Message>> {
    self.store_or_uid(false, ranges, op, flags, silent, unchangedsince)
  }

  pub fn uid_store(&mut self, ranges: &[Range], op: command::StoreOp, flags: &[String], silent: bool, unchangedsince: Option<u64>) -> Result<Vec<Message>> {
    self.store_or_uid(true, ranges, op, flags, silent, unchangedsince)
  }

  pub fn add_flags(&mut self, ranges: &[Range], flags: &[String]) -> Result<Vec<Message>> {
    self.store(ranges, command::StoreOp::Add, flags, false, None)
  }

  pub fn remove_flags(&mut self, ranges: &[Range], flags: &[String]) -> Result<Vec<Message>> {
    self.store(ranges, command::StoreOp::Remove, flags, false, None)
  }

  pub fn set_flags(&mut self, ranges: &[Range], flags: &[String]) -> Result<Vec<Message>> {
    self.store(ranges, command::StoreOp::Set, flags, false, None)
  }

  pub fn uid_copy(&mut self, ranges: &[Range], mailbox: &str) -> Result<Option<CopyUid>> {
    self.require_state(SessionState::Selected)?;
    let tag = self.next_tag();
    let (_, code, _, _) = self.command(&tag, command::uid_copy(&tag, ranges, mailbox, self.literal_plus()))?;
    Ok(match code {
      Some(ResponseCode::CopyUid(c)) => Some(c),
      _ => None,
    })
  }

  pub fn uid_move(&mut self, ranges: &[Range], mailbox: &str) -> Result<Option<CopyUid>> {
    self.require_state(SessionState::Selected)?;
    require_capability(&self.capabilities, "MOVE")?;
    let tag = self.next_tag();
    let (_, code, _, _) = self.command(&tag, command::uid_move(&tag, ranges, mailbox, self.literal_plus()))?;
    Ok(match code {
      Some(ResponseCode::CopyUid(c)) => Some(c),
      _ => None,
    })
  }

  pub fn append(&mut self, mailbox: &str, flags: &[String], internal_date: Option<&str>, message: &[u8]) -> Result<Option<AppendUid>> {
    let tag = self.next_tag();
    let (_, code, _, _) = self.command(&tag, command::append(&tag, mailbox, flags, internal_date, message, self.literal_plus()))?;
    Ok(match code {
      Some(ResponseCode::AppendUid(a)) => Some(a),
      _ => None,
    })
  }

  pub fn noop(&mut self) -> Result<()> {
    let tag = self.next_tag();
    self.command(&tag, command::noop(&tag))?;
    Ok(())
  }

  /// Starts IDLE (RFC 2177): blocks until the server's `+` continuation, then returns.
  pub fn idle(&mut self) -> Result<()> {
    self.require_state(SessionState::Selected)?;
    require_capability(&self.capabilities, "IDLE")?;
    let tag = self.next_tag();
    self.send_wire(&tag, command::idle(&tag), None)?;
    match self.read_response()? {
      Response::Continuation(_) => {
        self.state = SessionState::Idling;
        self.idle_tag = Some(tag);
        self.idle_started = Some(Instant::now());
        Ok(())
      }
      other => Err(Error::protocol(tag, format!("expected IDLE continuation, got {other:?}"))),
    }
  }

  /// Blocks until at least one untagged update arrives while idling, applying and returning it.
  /// Per RFC 2177 section 3, a client SHOULD re-issue IDLE at least every 29 minutes to avoid
  /// being timed out by an unaware intermediary; this is checked (and, if due, silently performed
  /// via `DONE` + `IDLE`) at the top of every call, so a caller looping on `idle_wait` gets the
  /// refresh for free. A caller that blocks here for longer than 29 minutes without the server
  /// sending anything at all won't be refreshed until the next call returns — the transport has no
  /// portable read deadline to preempt that single blocking read.
  pub fn idle_wait(&mut self) -> Result<Event> {
    self.require_state(SessionState::Idling)?;
    if self.idle_started.is_some_and(|started| started.elapsed() >= IDLE_MAX) {
      self.idle_done()?;
      self.idle()?;
    }
    loop {
      match self.read_response()? {
        Response::Untagged(u) => {
          self.apply_untagged(&u);
          if let Some(event) = self.events.pop_front() {
            return Ok(event);
          }
        }
        other => return Err(Error::protocol("IDLE", format!("unexpected response while idling: {other:?}"))),
      }
    }
  }

  pub fn idle_done(&mut self) -> Result<()> {
    self.require_state(SessionState::Idling)?;
    let tag = self.idle_tag.take().ok_or_else(|| Error::protocol("DONE", "no IDLE in progress"))?;
    self.transport.write_all(&command::done()).map_err(|source| Error::Network {
      host: self.config.host.clone(),
      port: self.config.port,
      source: source.into(),
    })?;
    loop {
      match self.read_response()? {
        Response::Tagged { tag: got, status, text, .. } => {
          if got != tag {
            return Err(Error::protocol(tag, format!("out-of-order tag {got}")));
          }
          self.state = SessionState::Selected;
          self.idle_started = None;
          return if status == Status::Ok { Ok(()) } else { Err(Error::protocol(tag, text)) };
        }
        Response::Untagged(u) => self.apply_untagged(&u),
        Response::Continuation(_) => {}
      }
    }
  }

  pub fn logout(&mut self) -> Result<()> {
    self.state = SessionState::LoggingOut;
    let tag = self.next_tag();
    let result = self.command(&tag, command::logout(&tag));
    self.state = SessionState::Closed;
    result.map(|_| ())
  }
}
