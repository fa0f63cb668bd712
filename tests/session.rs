mod common;

use imap_flow::{Config, Credential, Event, Extensions, SessionState, TlsMode, TlsOptions};
use test_log::test;

fn config() -> Config {
  Config {
    host: "imap.example.com".to_string(),
    port: 993,
    tls: TlsMode::None,
    tls_options: TlsOptions::default(),
    credential: Credential::Password { user: "alice".to_string(), password: "hunter2".to_string() },
    connect_timeout: std::time::Duration::from_secs(5),
    auth_timeout: std::time::Duration::from_secs(5),
    extensions: Extensions::default(),
    allow_insecure_auth: true,
  }
}

#[test]
fn full_session_connect_auth_select_fetch_logout() {
  let script = "* OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN IDLE] Dovecot ready\r\n\
                A0001 OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN IDLE] authenticated\r\n\
                * FLAGS (\\Seen \\Answered \\Flagged)\r\n\
                * 2 EXISTS\r\n\
                * 0 RECENT\r\n\
                * OK [UIDVALIDITY 1690000000] ok\r\n\
                * OK [UIDNEXT 3] ok\r\n\
                * OK [PERMANENTFLAGS (\\Seen \\Answered \\*)] ok\r\n\
                A0002 OK [READ-WRITE] SELECT completed\r\n\
                * 1 FETCH (UID 1 FLAGS (\\Seen))\r\n\
                * 2 FETCH (UID 2 FLAGS ())\r\n\
                A0003 OK FETCH completed\r\n\
                A0004 OK LOGOUT completed\r\n";
  let (transport, outgoing) = common::Scripted::new(script);

  let mut session = imap_flow::Session::connect(transport, config()).unwrap();
  assert_eq!(session.state(), SessionState::NotAuthenticated);
  assert!(session.capabilities().iter().any(|c| c == "LITERAL+"));

  session.authenticate().unwrap();
  assert_eq!(session.state(), SessionState::Authenticated);

  let snapshot = session.select("INBOX").unwrap();
  assert_eq!(snapshot.messages.total, 2);
  assert_eq!(snapshot.uidvalidity, 1690000000);
  assert!(snapshot.perm_flags.iter().any(|f| f == "\\*"));

  let messages = session.fetch(&[imap_flow::Range(1, 2)], &[imap_flow::FetchItem::Uid, imap_flow::FetchItem::Flags], None).unwrap();
  assert_eq!(messages.len(), 2);
  assert_eq!(messages[0].uid, Some(1));
  assert_eq!(messages[1].flags, Vec::<String>::new());

  session.logout().unwrap();
  assert_eq!(session.state(), SessionState::Closed);

  let sent = common::sent(&outgoing);
  assert!(sent.contains("AUTHENTICATE PLAIN"));
  assert!(sent.contains("A0002 SELECT INBOX"));
  assert!(sent.contains("A0004 LOGOUT"));
}

#[test]
fn tags_stay_in_lockstep_across_many_commands() {
  let script = "* OK [CAPABILITY IMAP4rev1 LITERAL+] ready\r\n\
                A0001 OK NOOP completed\r\n\
                A0002 OK NOOP completed\r\n\
                A0003 OK NOOP completed\r\n";
  let (transport, _outgoing) = common::Scripted::new(script);
  let mut session = imap_flow::Session::connect(transport, config()).unwrap();

  // Each NOOP below only succeeds because the session tracks the matching scripted tag
  // (A0001..A0003) in lockstep; any skipped or repeated tag would desync and fail the `unwrap`.
  for _ in 0..3 {
    session.noop().unwrap();
  }
  assert_eq!(session.state(), SessionState::NotAuthenticated);
}

#[test]
fn events_queue_while_idling_and_drain_in_order() {
  let script = "* OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN IDLE] ready\r\n\
                A0001 OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN IDLE] authenticated\r\n\
                * FLAGS (\\Seen)\r\n\
                * 2 EXISTS\r\n\
                * 0 RECENT\r\n\
                A0002 OK [READ-WRITE] SELECT completed\r\n\
                + idling\r\n\
                * 3 EXISTS\r\n\
                * 1 RECENT\r\n\
                A0003 OK IDLE completed\r\n";
  let (transport, _outgoing) = common::Scripted::new(script);
  let mut session = imap_flow::Session::connect(transport, config()).unwrap();
  session.authenticate().unwrap();
  session.select("INBOX").unwrap();

  session.idle().unwrap();
  let first = session.idle_wait().unwrap();
  assert_eq!(first, Event::Exists(3));
  let second = session.idle_wait().unwrap();
  assert_eq!(second, Event::Recent(1));
  assert_eq!(session.poll_event(), None);
  session.idle_done().unwrap();
  assert_eq!(session.state(), SessionState::Selected);
}
